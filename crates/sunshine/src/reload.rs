//! Asks the Sunshine service to re-read its configuration.
//!
//! A reload failure never fails the sync that triggered it: the config file
//! is already written and Sunshine picks it up on its next start.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

/// Boxed future returned by [`Reloader::reload`]. Resolves to `true` on success.
pub type ReloadFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Something that can signal Sunshine to reload.
pub trait Reloader: Send + Sync {
    fn reload(&self) -> ReloadFuture<'_>;
}

impl<T: Reloader + ?Sized> Reloader for Box<T> {
    fn reload(&self) -> ReloadFuture<'_> {
        (**self).reload()
    }
}

/// Default time allowed for the reload command.
pub const DEFAULT_RELOAD_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs an external command, e.g. `systemctl --user reload-or-restart sunshine`.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandReloader {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Reloads (or restarts) a systemd user unit.
    pub fn systemd_user(unit: &str) -> Self {
        Self::new(
            "systemctl",
            vec![
                "--user".into(),
                "reload-or-restart".into(),
                unit.to_string(),
            ],
            DEFAULT_RELOAD_TIMEOUT,
        )
    }

    async fn run(&self) -> bool {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                tracing::info!(program = %self.program, "sunshine reloaded");
                true
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::warn!(
                    program = %self.program,
                    status = %output.status,
                    stderr = %stderr.trim(),
                    "sunshine reload returned non-zero"
                );
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(program = %self.program, error = %e, "failed to run sunshine reload");
                false
            }
            Err(_) => {
                tracing::warn!(
                    program = %self.program,
                    timeout = ?self.timeout,
                    "sunshine reload timed out"
                );
                false
            }
        }
    }
}

impl Reloader for CommandReloader {
    fn reload(&self) -> ReloadFuture<'_> {
        Box::pin(self.run())
    }
}

/// Reloader that does nothing, for setups where Sunshine is not a systemd unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReloader;

impl Reloader for NoopReloader {
    fn reload(&self) -> ReloadFuture<'_> {
        Box::pin(async {
            tracing::debug!("sunshine reload disabled");
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> CommandReloader {
        CommandReloader::new("sh", vec!["-c".into(), script.into()], timeout)
    }

    #[test]
    fn systemd_user_command() {
        let r = CommandReloader::systemd_user("sunshine.service");
        assert_eq!(r.program, "systemctl");
        assert_eq!(r.args, ["--user", "reload-or-restart", "sunshine.service"]);
        assert_eq!(r.timeout, DEFAULT_RELOAD_TIMEOUT);
    }

    #[tokio::test]
    async fn successful_command() {
        assert!(sh("exit 0", Duration::from_secs(5)).reload().await);
    }

    #[tokio::test]
    async fn failing_command_is_reported() {
        assert!(!sh("echo boom >&2; exit 3", Duration::from_secs(5)).reload().await);
    }

    #[tokio::test]
    async fn missing_program_is_reported() {
        let r = CommandReloader::new(
            "steamshine-no-such-program",
            Vec::new(),
            Duration::from_secs(5),
        );
        assert!(!r.reload().await);
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let start = std::time::Instant::now();
        assert!(!sh("sleep 10", Duration::from_millis(200)).reload().await);
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn noop_always_succeeds() {
        assert!(NoopReloader.reload().await);
    }
}
