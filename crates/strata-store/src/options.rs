use tokio_util::sync::CancellationToken;

use crate::error::{StoreError, StoreResult};

/// Per-call options for bulk operations, queries, and batch commits.
#[derive(Clone, Debug, Default)]
pub struct Options {
    /// Cooperative cancellation signal, checked between elements.
    pub signal: Option<CancellationToken>,
}

impl Options {
    /// Options with no cancellation signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that abort once `signal` is cancelled.
    pub fn with_signal(signal: CancellationToken) -> Self {
        Self {
            signal: Some(signal),
        }
    }

    /// Returns `true` if the attached signal has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail with [`StoreError::Aborted`] if the attached signal has been cancelled.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            Err(StoreError::Aborted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_never_aborts() {
        assert!(Options::new().check().is_ok());
    }

    #[test]
    fn cancelled_signal_aborts() {
        let token = CancellationToken::new();
        let options = Options::with_signal(token.clone());
        assert!(options.check().is_ok());
        token.cancel();
        assert!(options.check().unwrap_err().is_aborted());
    }
}
