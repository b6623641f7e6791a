//! Exit diagnostics.
//!
//! When the policy is deactivated (clean unload, fatal internal error, or
//! the host replacing it), the reason is recorded once and kept for
//! inspection after teardown. `report()` prints the reason for normal
//! exits and turns error exits into hard failures, so a binary's main can
//! simply propagate it.

use anyhow::{bail, Result};

/// Why the scheduler exited.
///
/// Ordered so that anything above `Unreg` is an error exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ExitKind {
    /// The scheduler has not exited.
    #[default]
    None,
    /// The workload ran to completion.
    Done,
    /// Unregistered from the host (explicit unload or replacement).
    Unreg,
    /// Fatal internal error.
    Error,
}

/// Exit reason recorded by `exit()`, retrievable after teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitInfo {
    kind: ExitKind,
    reason: Option<String>,
}

impl ExitInfo {
    pub fn new(kind: ExitKind, reason: impl Into<String>) -> Self {
        ExitInfo {
            kind,
            reason: Some(reason.into()).filter(|s| !s.is_empty()),
        }
    }

    pub fn kind(&self) -> ExitKind {
        self.kind
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Whether this records an error exit.
    pub fn is_error(&self) -> bool {
        self.kind > ExitKind::Unreg
    }

    /// Print the exit reason to stderr if the exit was normal. After an
    /// error exit, return an error carrying the reason instead.
    pub fn report(&self) -> Result<()> {
        if self.kind == ExitKind::None {
            return Ok(());
        }

        let why = match &self.reason {
            Some(reason) => format!("EXIT: {}", reason),
            None => "EXIT: <unknown>".into(),
        };

        if self.kind <= ExitKind::Unreg {
            eprintln!("{}", why);
            Ok(())
        } else {
            bail!("{}", why)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_ordering_splits_errors() {
        assert!(!ExitInfo::new(ExitKind::Done, "done").is_error());
        assert!(!ExitInfo::new(ExitKind::Unreg, "unregistered").is_error());
        assert!(ExitInfo::new(ExitKind::Error, "boom").is_error());
    }

    #[test]
    fn test_report_ok_for_normal_exit() {
        assert!(ExitInfo::new(ExitKind::Done, "workload complete")
            .report()
            .is_ok());
        assert!(ExitInfo::default().report().is_ok());
    }

    #[test]
    fn test_report_fails_for_error_exit() {
        let err = ExitInfo::new(ExitKind::Error, "queue stall")
            .report()
            .unwrap_err();
        assert!(err.to_string().contains("queue stall"));
    }
}
