//! Error handling for the EEG analysis service
//!
//! One crate-wide error enum shared by every stage of the pipeline; the
//! orchestrator converts these into a persisted terminal state at the
//! request boundary.

use thiserror::Error;

/// Result type alias for EEG service operations
pub type EegResult<T> = Result<T, EegError>;

/// Error type covering the request lifecycle and the processing pipeline
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EegError {
    /// Request id missing from the store; no side effects
    #[error("analysis request not found: {id}")]
    NotFound { id: String },

    /// Unsupported or corrupt recording payload
    #[error("failed to decode recording: {reason}")]
    Decode { reason: String },

    /// Failure inside filtering, feature extraction, or classification
    #[error("signal processing failed: {reason}")]
    Processing { reason: String },

    /// Persistent store operation failed
    #[error("store operation failed: {reason}")]
    Store { reason: String },

    /// Invalid service or pipeline configuration
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Signal container constraint violated
    #[error("invalid signal data: {reason}")]
    InvalidSignal { reason: String },

    /// Cooperative cancellation was requested mid-pipeline
    #[error("processing cancelled")]
    Cancelled,
}

impl EegError {
    pub fn decode(reason: impl Into<String>) -> Self {
        EegError::Decode { reason: reason.into() }
    }

    pub fn processing(reason: impl Into<String>) -> Self {
        EegError::Processing { reason: reason.into() }
    }

    pub fn store(reason: impl Into<String>) -> Self {
        EegError::Store { reason: reason.into() }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        EegError::Config { reason: reason.into() }
    }

    pub fn invalid_signal(reason: impl Into<String>) -> Self {
        EegError::InvalidSignal { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = EegError::NotFound { id: "abc123".to_string() };
        let display = format!("{}", error);
        assert!(display.contains("not found"));
        assert!(display.contains("abc123"));
    }

    #[test]
    fn test_decode_error_carries_reason() {
        let error = EegError::decode("unsupported format: xyz");
        assert!(format!("{}", error).contains("unsupported format: xyz"));
    }
}
