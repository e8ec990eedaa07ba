//! Error types and handling for the surge library.

use thiserror::Error;

/// Result type alias for surge operations
pub type Result<T> = std::result::Result<T, SurgeError>;

/// Main error type for the surge library
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurgeError {
    /// Queue capacity is not a power of two or is below the minimum
    #[error("invalid capacity {capacity}: must be a power of two and at least 2")]
    InvalidCapacity {
        /// The rejected capacity value
        capacity: u32,
    },

    /// The CPU lacks the 16-byte compare-exchange required by
    /// multi-producer queues
    #[error("cpu does not support 16-byte compare-exchange (cmpxchg16b)")]
    UnsupportedCpu,

    /// Enqueue failed because the queue is full
    #[error("queue is full")]
    Full,

    /// Dequeue failed because the queue is empty
    #[error("queue is empty")]
    Empty,

    /// The queue has been closed; for dequeue this also means it has
    /// been fully drained
    #[error("queue is closed")]
    Closed,
}

impl SurgeError {
    /// Check if this error is recoverable by retrying the operation later
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Full | Self::Empty)
    }

    /// Check if this error marks the terminal state of the queue
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(SurgeError::Full.is_recoverable());
        assert!(SurgeError::Empty.is_recoverable());
        assert!(!SurgeError::Closed.is_recoverable());
        assert!(SurgeError::Closed.is_terminal());
        assert!(!SurgeError::InvalidCapacity { capacity: 7 }.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = SurgeError::InvalidCapacity { capacity: 7 };
        assert!(err.to_string().contains('7'));
        assert_eq!(SurgeError::Full.to_string(), "queue is full");
    }
}
