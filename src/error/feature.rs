// Feature extraction error types and constants

use crate::error::{ErrorCode, WindowError};
use log::error;
use thiserror::Error;

/// Feature extraction error code constants
///
/// Error code range: 3001-3005
pub struct FeatureErrorCodes {}

impl FeatureErrorCodes {
    /// Extractor, processor or descriptor configured with invalid values
    pub const INVALID_CONFIG: i32 = 3001;

    /// A window operation failed while extracting features
    pub const WINDOW: i32 = 3002;

    /// The signal has no samples to extract from
    pub const EMPTY_SIGNAL: i32 = 3003;

    /// Feature vectors in a gram have differing lengths
    pub const DIMENSION_MISMATCH: i32 = 3004;

    /// A processor needs more feature vectors than the gram holds
    pub const INSUFFICIENT_FEATURES: i32 = 3005;
}

/// Log a feature error with structured context
pub fn log_feature_error(err: &FeatureError, context: &str) {
    error!(
        "Feature error in {}: code={}, component=FeaturePipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Feature extraction errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("Cannot extract {extractor} from an empty signal")]
    EmptySignal { extractor: String },

    #[error("Feature dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Insufficient features: need {required}, got {actual}")]
    InsufficientFeatures { required: usize, actual: usize },
}

impl FeatureError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        FeatureError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl ErrorCode for FeatureError {
    fn code(&self) -> i32 {
        match self {
            FeatureError::InvalidConfig { .. } => FeatureErrorCodes::INVALID_CONFIG,
            FeatureError::Window(_) => FeatureErrorCodes::WINDOW,
            FeatureError::EmptySignal { .. } => FeatureErrorCodes::EMPTY_SIGNAL,
            FeatureError::DimensionMismatch { .. } => FeatureErrorCodes::DIMENSION_MISMATCH,
            FeatureError::InsufficientFeatures { .. } => FeatureErrorCodes::INSUFFICIENT_FEATURES,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }
}
