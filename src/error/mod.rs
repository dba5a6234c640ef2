// Error types for the signal window engine
//
// This module defines typed errors for window construction/derivation and
// for feature extraction, each carrying a numeric code so callers can
// handle failures programmatically.

mod feature;
mod window;

pub use feature::{log_feature_error, FeatureError, FeatureErrorCodes};
pub use window::{log_window_error, WindowError, WindowErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the crate boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
