// Window error types and constants

use crate::error::ErrorCode;
use log::error;
use thiserror::Error;

/// Window error code constants
///
/// Single source of truth for the numeric codes attached to window
/// construction and derivation failures.
///
/// Error code range: 2001-2006
pub struct WindowErrorCodes {}

impl WindowErrorCodes {
    /// Malformed construction or derivation parameter
    pub const INVALID_ARGUMENT: i32 = 2001;

    /// Operation not supported for the requested mode (e.g. NoPad growth)
    pub const UNSUPPORTED_OPERATION: i32 = 2002;

    /// Independent data or payload length does not match the sample count
    pub const LENGTH_MISMATCH: i32 = 2003;

    /// Explicit sample indices are inverted or beyond the window
    pub const INDEX_OUT_OF_RANGE: i32 = 2004;

    /// Windows with different sampling rates were combined
    pub const RATE_MISMATCH: i32 = 2005;

    /// PCM byte layout or format is invalid
    pub const INVALID_FORMAT: i32 = 2006;
}

/// Log a window error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_window_error(err: &WindowError, context: &str) {
    error!(
        "Window error in {}: code={}, component=DataWindow, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Window construction and derivation errors
///
/// Everything except `UnsupportedOperation` is an invalid-argument class
/// failure: it is raised synchronously before any window exists.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WindowError {
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Unsupported operation: {reason}")]
    UnsupportedOperation { reason: String },

    #[error("{what} length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Sample indices [{start}, {end}) out of range for {sample_count} samples")]
    IndexOutOfRange {
        start: usize,
        end: usize,
        sample_count: usize,
    },

    #[error("Sampling rate mismatch: expected {expected}, got {actual}")]
    RateMismatch { expected: f64, actual: f64 },

    #[error("Invalid PCM format: {reason}")]
    InvalidFormat { reason: String },
}

impl WindowError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        WindowError::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        WindowError::UnsupportedOperation {
            reason: reason.into(),
        }
    }

    /// True for every malformed-parameter failure
    pub fn is_invalid_argument(&self) -> bool {
        !matches!(self, WindowError::UnsupportedOperation { .. })
    }
}

impl ErrorCode for WindowError {
    fn code(&self) -> i32 {
        match self {
            WindowError::InvalidArgument { .. } => WindowErrorCodes::INVALID_ARGUMENT,
            WindowError::UnsupportedOperation { .. } => WindowErrorCodes::UNSUPPORTED_OPERATION,
            WindowError::LengthMismatch { .. } => WindowErrorCodes::LENGTH_MISMATCH,
            WindowError::IndexOutOfRange { .. } => WindowErrorCodes::INDEX_OUT_OF_RANGE,
            WindowError::RateMismatch { .. } => WindowErrorCodes::RATE_MISMATCH,
            WindowError::InvalidFormat { .. } => WindowErrorCodes::INVALID_FORMAT,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_error_codes() {
        assert_eq!(
            WindowError::invalid("x").code(),
            WindowErrorCodes::INVALID_ARGUMENT
        );
        assert_eq!(
            WindowError::unsupported("x").code(),
            WindowErrorCodes::UNSUPPORTED_OPERATION
        );
        assert_eq!(
            WindowError::LengthMismatch {
                what: "independent data",
                expected: 10,
                actual: 9
            }
            .code(),
            WindowErrorCodes::LENGTH_MISMATCH
        );
        assert_eq!(
            WindowError::IndexOutOfRange {
                start: 5,
                end: 2,
                sample_count: 10
            }
            .code(),
            WindowErrorCodes::INDEX_OUT_OF_RANGE
        );
        assert_eq!(
            WindowError::RateMismatch {
                expected: 100.0,
                actual: 200.0
            }
            .code(),
            WindowErrorCodes::RATE_MISMATCH
        );
        assert_eq!(
            WindowError::InvalidFormat {
                reason: "x".to_string()
            }
            .code(),
            WindowErrorCodes::INVALID_FORMAT
        );
    }

    #[test]
    fn test_window_error_messages() {
        let err = WindowError::LengthMismatch {
            what: "independent data",
            expected: 10,
            actual: 9,
        };
        assert_eq!(
            err.message(),
            "independent data length mismatch: expected 10, got 9"
        );

        let err = WindowError::invalid("end before start");
        assert_eq!(err.message(), "Invalid argument: end before start");
    }

    #[test]
    fn test_invalid_argument_classification() {
        assert!(WindowError::invalid("x").is_invalid_argument());
        assert!(WindowError::RateMismatch {
            expected: 1.0,
            actual: 2.0
        }
        .is_invalid_argument());
        assert!(!WindowError::unsupported("x").is_invalid_argument());
    }
}
