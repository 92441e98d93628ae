//! Per-call deadline checked before every external call.

use std::time::{Duration, Instant};

use hippograph_core::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self { expires_at: None }
    }

    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + timeout),
        }
    }

    pub fn from_timeout_ms(timeout_ms: Option<u64>) -> Self {
        match timeout_ms {
            Some(ms) => Self::after(Duration::from_millis(ms)),
            None => Self::none(),
        }
    }

    /// Fail with `Error::Timeout` naming `stage` if the deadline passed.
    pub fn check(&self, stage: &str) -> Result<()> {
        match self.expires_at {
            Some(t) if Instant::now() >= t => {
                Err(Error::Timeout(format!("deadline exceeded before {}", stage)))
            }
            _ => Ok(()),
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|t| t.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_expires() {
        assert!(Deadline::none().check("anything").is_ok());
        assert!(Deadline::from_timeout_ms(None).remaining().is_none());
    }

    #[test]
    fn test_expired_deadline() {
        let d = Deadline::after(Duration::ZERO);
        let err = d.check("rerank").unwrap_err();
        assert!(matches!(err, Error::Timeout(ref m) if m.contains("rerank")));
    }
}
