//! Error recovery classification

use tracing::Level;
use super::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// The connection is suspect; re-verify or rebuild it before the next statement.
    Reconnect,
    /// The failure is local to this call; log it and carry on.
    Skip { log_level: Level },
}

impl StoreError {
    pub fn recovery_action(&self) -> RecoveryAction {
        match self {
            StoreError::Connection { .. } | StoreError::Timeout { .. } | StoreError::NotConnected => {
                RecoveryAction::Reconnect
            }
            StoreError::Statement { .. } => RecoveryAction::Skip {
                log_level: Level::ERROR,
            },
            StoreError::Io(_) | StoreError::Csv(_) => RecoveryAction::Skip {
                log_level: Level::WARN,
            },
        }
    }

    pub fn requires_reconnect(&self) -> bool {
        self.recovery_action() == RecoveryAction::Reconnect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeouts_are_treated_like_connection_failures() {
        assert!(StoreError::timeout("query", Duration::from_secs(10)).requires_reconnect());
        assert!(StoreError::connection("refused").requires_reconnect());
        assert!(StoreError::NotConnected.requires_reconnect());
    }

    #[test]
    fn test_statement_errors_do_not_reconnect() {
        let err = StoreError::statement("SELECT nope", "unknown column");
        assert_eq!(
            err.recovery_action(),
            RecoveryAction::Skip { log_level: Level::ERROR }
        );
    }
}
