use thiserror::Error;

use crate::types::{MoteId, Timestamp};

/// Room tracker error types
#[derive(Error, Debug)]
pub enum LocatorError {
    #[error(
        "Observation for mote {found_receiver} at t={found_time} does not belong to container of mote {expected_receiver} at t={expected_time}"
    )]
    Integrity {
        expected_receiver: MoteId,
        expected_time: Timestamp,
        found_receiver: MoteId,
        found_time: Timestamp,
    },

    #[error("Cannot classify sender {sender} as mobile or stationary")]
    UnknownSignalKind { sender: i64 },

    #[error("Stationary mote {sender} reported invalid raw reading {reading}")]
    InvalidReading { sender: MoteId, reading: i64 },

    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Smoothing for mote {receiver} still correcting after {passes} passes")]
    NotConverged { receiver: MoteId, passes: usize },

    #[error("Worker thread panicked while locating receivers")]
    WorkerPanicked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LocatorError {
    /// Errors that only invalidate a single input record.
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            LocatorError::Integrity { .. }
                | LocatorError::UnknownSignalKind { .. }
                | LocatorError::InvalidReading { .. }
                | LocatorError::Parse { .. }
        )
    }
}

/// Result type for locator operations
pub type Result<T> = std::result::Result<T, LocatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_level_classification() {
        assert!(LocatorError::UnknownSignalKind { sender: -3 }.is_record_level());
        assert!(LocatorError::Parse {
            line: 4,
            reason: "too few fields".to_string()
        }
        .is_record_level());
        assert!(!LocatorError::InvalidConfig("empty kernel".to_string()).is_record_level());
        assert!(!LocatorError::NotConverged {
            receiver: 1,
            passes: 10
        }
        .is_record_level());
    }

    #[test]
    fn test_integrity_message_names_both_sides() {
        let err = LocatorError::Integrity {
            expected_receiver: 7,
            expected_time: 600,
            found_receiver: 8,
            found_time: 601,
        };
        let message = err.to_string();
        assert!(message.contains("mote 8 at t=601"));
        assert!(message.contains("mote 7"));
    }
}
