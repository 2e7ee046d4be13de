//! Response types for the Steam Store `appdetails` endpoint.

use serde::{Deserialize, Serialize};

/// Per-app envelope in an `appdetails` response.
///
/// The response is an object keyed by app ID string. On a negative lookup
/// Steam sends `success: false` and often `data: []`, so `data` is kept
/// untyped until `success` has been checked.
#[derive(Debug, Clone, Deserialize)]
pub struct AppDetailsEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl AppDetailsEnvelope {
    /// Returns the details if the lookup succeeded and the payload decodes.
    pub fn into_details(self) -> Option<AppDetails> {
        if !self.success {
            return None;
        }
        serde_json::from_value(self.data).ok()
    }
}

/// Descriptive metadata for a Steam app.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppDetails {
    /// Store classification: `game`, `dlc`, `demo`, `tool`, `application`...
    #[serde(rename = "type", default)]
    pub app_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steam_appid: u32,
    #[serde(default)]
    pub is_free: bool,
}

impl AppDetails {
    /// Returns details with only the type set.
    pub fn with_type(app_type: impl Into<String>) -> Self {
        Self {
            app_type: app_type.into(),
            ..Self::default()
        }
    }
}
