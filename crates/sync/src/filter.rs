//! Eligibility rules for library entries.
//!
//! [`FilterPolicy::check_local`] runs first and needs nothing but the
//! manifest; only entries it accepts are looked up in the store and passed
//! to [`FilterPolicy::check_playable`].

use regex::{Regex, RegexBuilder};
use steamshine_steam::CatalogEntry;
use steamshine_store::AppDetails;

use crate::error::SyncError;

/// Name patterns for Steam runtimes and tooling that show up as installed apps.
pub const DEFAULT_EXCLUDED_PATTERNS: &[&str] = &[
    r"^Proton.*",
    r"^SteamLinuxRuntime.*",
    r"^Steam.*Tools",
    r"^Steamworks Common.*",
    r"^Steamworks SDK.*",
];

/// Store types that are never launched on their own.
const NON_PLAYABLE_TYPES: &[&str] = &["dlc", "demo", "tool", "config", "application"];

const MIB: u64 = 1024 * 1024;

/// Outcome of a filter check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Exclude { reason: String },
}

impl Decision {
    pub fn is_excluded(&self) -> bool {
        matches!(self, Decision::Exclude { .. })
    }

    fn exclude(reason: impl Into<String>) -> Self {
        Decision::Exclude {
            reason: reason.into(),
        }
    }
}

/// Filtering thresholds and switches.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    min_size_mb: u64,
    exclude_tools: bool,
    exclude_dlc: bool,
    patterns: Vec<(String, Regex)>,
}

impl FilterPolicy {
    /// Builds a policy with the default name patterns.
    pub fn new(min_size_mb: u64, exclude_tools: bool, exclude_dlc: bool) -> Self {
        let patterns = DEFAULT_EXCLUDED_PATTERNS
            .iter()
            .filter_map(|p| compile(p).ok().map(|re| (p.to_string(), re)))
            .collect();

        Self {
            min_size_mb,
            exclude_tools,
            exclude_dlc,
            patterns,
        }
    }

    /// Replaces the name patterns. Fails on the first invalid pattern.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                compile(p)
                    .map(|re| (p.to_string(), re))
                    .map_err(|source| SyncError::Pattern {
                        pattern: p.to_string(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn min_size_mb(&self) -> u64 {
        self.min_size_mb
    }

    /// Checks size and name. Never touches the network.
    pub fn check_local(&self, entry: &CatalogEntry) -> Decision {
        let min_bytes = self.min_size_mb.saturating_mul(MIB);
        if entry.size_bytes < min_bytes {
            return Decision::exclude(format!(
                "too small ({:.1}MB < {:.1}MB)",
                entry.size_bytes as f64 / MIB as f64,
                self.min_size_mb as f64
            ));
        }

        if self.exclude_tools
            && let Some((pattern, _)) = self.patterns.iter().find(|(_, re)| re.is_match(&entry.name))
        {
            return Decision::exclude(format!("matches excluded pattern: {pattern}"));
        }

        Decision::Accept
    }

    /// Checks the store type. Missing metadata is accepted.
    pub fn check_playable(&self, details: Option<&AppDetails>) -> Decision {
        let Some(details) = details else {
            return Decision::Accept;
        };
        if !self.exclude_dlc {
            return Decision::Accept;
        }

        let app_type = details.app_type.to_lowercase();
        if NON_PLAYABLE_TYPES.contains(&app_type.as_str()) {
            return Decision::exclude(format!("type is '{app_type}'"));
        }
        Decision::Accept
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self::new(50, true, true)
    }
}

/// Compiles a case-insensitive pattern anchored at the start of the name.
fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let anchored = if pattern.starts_with('^') {
        pattern.to_string()
    } else {
        format!("^(?:{pattern})")
    };
    RegexBuilder::new(&anchored).case_insensitive(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn entry(name: &str, size_bytes: u64) -> CatalogEntry {
        CatalogEntry {
            app_id: 1,
            name: name.into(),
            install_dir: String::new(),
            size_bytes,
            manifest_path: PathBuf::from("/lib/appmanifest_1.acf"),
        }
    }

    #[test]
    fn size_threshold_is_inclusive() {
        let policy = FilterPolicy::new(50, true, true);
        assert_eq!(policy.check_local(&entry("Game", 50 * MIB)), Decision::Accept);
        assert_eq!(
            policy.check_local(&entry("Game", 50 * MIB - 1)),
            Decision::Exclude {
                reason: "too small (50.0MB < 50.0MB)".into()
            }
        );
    }

    #[test]
    fn small_entry_reason_formats_megabytes() {
        let policy = FilterPolicy::new(50, true, true);
        let d = policy.check_local(&entry("Game", 10 * MIB + MIB / 2));
        assert_eq!(
            d,
            Decision::Exclude {
                reason: "too small (10.5MB < 50.0MB)".into()
            }
        );
    }

    #[test]
    fn zero_threshold_accepts_empty() {
        let policy = FilterPolicy::new(0, false, false);
        assert_eq!(policy.check_local(&entry("Game", 0)), Decision::Accept);
    }

    #[test]
    fn tool_names_are_excluded_case_insensitively() {
        let policy = FilterPolicy::new(0, true, true);
        let big = 100 * MIB;

        for name in [
            "Proton 8.0",
            "proton experimental",
            "SteamLinuxRuntime_sniper",
            "Steamworks Common Redistributables",
            "Steam Linux Runtime Tools",
            "Steamworks SDK Redist",
        ] {
            assert!(policy.check_local(&entry(name, big)).is_excluded(), "{name}");
        }

        let d = policy.check_local(&entry("Proton 9.0", big));
        assert_eq!(
            d,
            Decision::Exclude {
                reason: "matches excluded pattern: ^Proton.*".into()
            }
        );
    }

    #[test]
    fn patterns_only_match_at_start() {
        let policy = FilterPolicy::new(0, true, true);
        assert_eq!(
            policy.check_local(&entry("Not Proton", 100 * MIB)),
            Decision::Accept
        );
    }

    #[test]
    fn tool_patterns_disabled() {
        let policy = FilterPolicy::new(0, false, true);
        assert_eq!(
            policy.check_local(&entry("Proton 8.0", 100 * MIB)),
            Decision::Accept
        );
    }

    #[test]
    fn custom_patterns() {
        let policy = FilterPolicy::new(0, true, true)
            .with_patterns(["Benchmark", "^Test.*"])
            .unwrap();
        assert!(policy.check_local(&entry("benchmark suite", 1)).is_excluded());
        assert!(policy.check_local(&entry("Testing Grounds", 1)).is_excluded());
        assert!(!policy.check_local(&entry("My Benchmark", 1)).is_excluded());
        assert!(!policy.check_local(&entry("Proton 8.0", 1)).is_excluded());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = FilterPolicy::default().with_patterns(["(unclosed"]).unwrap_err();
        assert!(matches!(err, SyncError::Pattern { ref pattern, .. } if pattern == "(unclosed"));
    }

    #[test]
    fn non_playable_types_are_excluded() {
        let policy = FilterPolicy::default();
        for t in ["dlc", "DLC", "demo", "tool", "config", "application"] {
            let d = policy.check_playable(Some(&AppDetails::with_type(t)));
            assert_eq!(
                d,
                Decision::Exclude {
                    reason: format!("type is '{}'", t.to_lowercase())
                }
            );
        }
        assert_eq!(
            policy.check_playable(Some(&AppDetails::with_type("game"))),
            Decision::Accept
        );
    }

    #[test]
    fn missing_metadata_is_accepted() {
        assert_eq!(FilterPolicy::default().check_playable(None), Decision::Accept);
    }

    #[test]
    fn dlc_filter_disabled() {
        let policy = FilterPolicy::new(50, true, false);
        assert_eq!(
            policy.check_playable(Some(&AppDetails::with_type("dlc"))),
            Decision::Accept
        );
    }
}
