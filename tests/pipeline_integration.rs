//! Integration tests for the caching feature extraction pipeline
//!
//! These tests run complete extraction flows through the public API:
//! - Spectral and temporal extractors over sliding sub-windows
//! - Cache hits across repeated extraction and across pipelines
//! - Streamed labeled window sources with memory caching
//! - Configuration loaded from a JSON file

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use rand::Rng;

use signal_windows::config::EngineConfig;
use signal_windows::features::{
    DeltaMode, DeltaProcessor, FftExtractor, MelExtractor, NormalizingProcessor, StatsExtractor,
};
use signal_windows::pipeline::{
    CachingStrategy, FeatureGramIterable, LabeledWindowSource, StreamedWindows,
};
use signal_windows::window::ScalarPayload;
use signal_windows::{
    CacheContext, CachingFeatureExtractionPipeline, FeatureGramDescriptor, LabeledWindow,
    ScalarWindow, WindowFeaturePipeline,
};

fn noise(ctx: &CacheContext, samples: usize, rate: f64) -> Result<Arc<ScalarWindow>> {
    let mut rng = rand::thread_rng();
    let data = (0..samples).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Ok(Arc::new(ScalarWindow::with_rate(ctx, 0.0, rate, data)?))
}

fn spectral_descriptors() -> Result<Vec<FeatureGramDescriptor>> {
    let fft = FeatureGramDescriptor::new(64.0, 32.0, Arc::new(FftExtractor::new(
        50.0, 4000.0, 16, false, true,
    )?))?
    .with_processor(Arc::new(NormalizingProcessor::default()));
    let mel = FeatureGramDescriptor::new(64.0, 32.0, Arc::new(MelExtractor::new(
        50.0, 4000.0, 12, true,
    )?))?
    .with_processor(Arc::new(DeltaProcessor::new(2, DeltaMode::Append)?));
    Ok(vec![fft, mel])
}

#[test]
fn test_spectral_extraction_is_cached_per_window() -> Result<()> {
    let ctx = Arc::new(CacheContext::default());
    let pipeline = CachingFeatureExtractionPipeline::new(Arc::clone(&ctx), spectral_descriptors()?)?;
    let window = noise(&ctx, 8000, 8000.0)?;

    let first = pipeline.extract(&window)?;
    assert_eq!(first.len(), 2);
    // 1000 ms in 64 ms windows every 32 ms
    assert_eq!(first[0].len(), 30);
    assert_eq!(first[0].dimensions(), 16);
    assert_eq!(first[1].dimensions(), 24);

    let second = pipeline.extract(&window)?;
    for (a, b) in first.iter().zip(&second) {
        assert!(Arc::ptr_eq(a, b));
    }

    let gram_stats = ctx
        .stats()
        .into_iter()
        .find(|s| s.name == "processed-features")
        .expect("processed cache registered");
    assert_eq!(gram_stats.inserts, 2);
    assert!(gram_stats.hits >= 2);
    Ok(())
}

#[test]
fn test_pipelines_sharing_a_context_share_features() -> Result<()> {
    let ctx = Arc::new(CacheContext::default());
    let window = noise(&ctx, 4000, 8000.0)?;
    let a = CachingFeatureExtractionPipeline::new(Arc::clone(&ctx), spectral_descriptors()?)?;
    let b = CachingFeatureExtractionPipeline::new(Arc::clone(&ctx), spectral_descriptors()?)?;

    let from_a = a.extract(&window)?;
    let from_b = b.extract(&window)?;
    assert!(Arc::ptr_eq(&from_a[0], &from_b[0]));

    let isolated = ctx.new_scope();
    assert!(isolated.gram_cache().is_empty());
    Ok(())
}

#[test]
fn test_streamed_labeled_windows_with_memory_cache() -> Result<()> {
    let ctx = Arc::new(CacheContext::default());
    let descriptor = FeatureGramDescriptor::new(100.0, 0.0, Arc::new(StatsExtractor))?;
    let pipeline = Arc::new(CachingFeatureExtractionPipeline::new(
        Arc::clone(&ctx),
        vec![descriptor],
    )?);

    let stream = {
        let ctx = Arc::clone(&ctx);
        StreamedWindows::new(move || {
            let ctx = Arc::clone(&ctx);
            (0..5).filter_map(move |i| {
                let window = ScalarWindow::with_rate(&ctx, 0.0, 100.0, vec![i as f64; 100]).ok()?;
                let class = if i % 2 == 0 { "even" } else { "odd" };
                LabeledWindow::with_label(Arc::new(window), "class", class).ok()
            })
        })
    };
    let source: LabeledWindowSource<ScalarPayload> = stream.into();
    let iterable = pipeline.extract_all(source, true, false);
    assert!(iterable.is_streamed());

    let first: Vec<_> = iterable.iter().collect::<Result<_, _>>()?;
    assert_eq!(first.len(), 5);
    for (i, item) in first.iter().enumerate() {
        let expected = if i % 2 == 0 { "even" } else { "odd" };
        assert_eq!(item.labels()["class"].as_text(), Some(expected));
        assert_eq!(item.grams()[0].len(), 10);
        assert_eq!(item.grams()[0].features()[0].values()[0], i as f64);
    }

    let second: Vec<_> = iterable.iter().collect::<Result<_, _>>()?;
    for (a, b) in first.iter().zip(&second) {
        assert!(Arc::ptr_eq(a, b));
    }
    Ok(())
}

#[test]
fn test_configuration_file_disables_caching() -> Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        r#"{{ "cache": {{ "enabled": false }}, "features": {{ "window_locks": 4 }} }}"#
    )?;
    let config = EngineConfig::load_from_file(file.path());
    assert!(!config.cache.enabled);
    assert_eq!(config.features.window_locks, 4);
    assert!(config.features.gram_caching_enabled);

    let ctx = Arc::new(CacheContext::new(config));
    let pipeline = CachingFeatureExtractionPipeline::new(Arc::clone(&ctx), spectral_descriptors()?)?;
    assert_eq!(pipeline.gram_strategy(), CachingStrategy::Uncached);

    let window = noise(&ctx, 2000, 8000.0)?;
    let first = pipeline.extract(&window)?;
    let second = pipeline.extract(&window)?;
    assert!(!Arc::ptr_eq(&first[0], &second[0]));
    assert_eq!(first[0].len(), second[0].len());
    assert_eq!(ctx.advisories().emitted(), 1);
    Ok(())
}
