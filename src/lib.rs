// Signal Windows Core - immutable signal windows with identity-keyed caching
// Sub-windowing, padding and splitting of sampled signals plus a caching
// feature extraction pipeline built on window identity

// Module declarations
pub mod cache;
pub mod config;
pub mod error;
pub mod features;
pub mod identity;
pub mod pipeline;
pub mod telemetry;
pub mod vector;
pub mod window;

// Re-exports for convenience
pub use cache::{CacheContext, CacheKey, KeyPart, MultiKeyCache};
pub use config::EngineConfig;
pub use error::{ErrorCode, FeatureError, WindowError};
pub use features::{Feature, FeatureExtractor, FeatureGram, FeatureProcessor};
pub use identity::InstanceId;
pub use pipeline::{
    CachingFeatureExtractionPipeline, FeatureExtractionPipeline, FeatureGramDescriptor,
    WindowFeaturePipeline,
};
pub use vector::Vector;
pub use window::{
    DataWindow, LabeledWindow, PadType, PcmWindow, ScalarWindow, SignalView, WindowPayload,
};

/// Install a `tracing` fmt subscriber that also receives `log` records.
///
/// Safe to call more than once; later calls leave the installed subscriber in place.
pub fn init_logging() {
    if tracing_subscriber::fmt().try_init().is_ok() {
        log::info!("[SignalWindows] Logging initialized");
    }
}
