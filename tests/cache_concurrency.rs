//! Concurrency tests for window derivation and feature caching
//!
//! Worker threads hammer the same window with identical and distinct
//! requests and check that identical requests converge on one instance.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::Result;

use signal_windows::cache_key;
use signal_windows::features::RmsExtractor;
use signal_windows::{
    CacheContext, CachingFeatureExtractionPipeline, FeatureGramDescriptor, MultiKeyCache,
    PadType, ScalarWindow, WindowFeaturePipeline,
};

const WORKERS: usize = 16;

fn window(ctx: &CacheContext) -> Result<Arc<ScalarWindow>> {
    let data = (0..10_000).map(|i| (i as f64 * 0.01).sin()).collect();
    Ok(Arc::new(ScalarWindow::with_rate(ctx, 0.0, 1000.0, data)?))
}

#[test]
fn test_concurrent_sub_windows_converge() -> Result<()> {
    let ctx = CacheContext::default();
    let window = window(&ctx)?;
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let window = Arc::clone(&window);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let sub = window.sub_window(1500.0, 4500.0).ok().flatten();
                let padded = window.resize(20_000.0, PadType::DuplicatePad).ok();
                (sub.map(|w| w.id()), padded.map(|w| w.id()))
            })
        })
        .collect();

    let mut sub_ids = HashSet::new();
    let mut pad_ids = HashSet::new();
    for handle in handles {
        let (sub, padded) = handle.join().expect("worker panicked");
        sub_ids.insert(sub.expect("sub-window in range"));
        pad_ids.insert(padded.expect("padding succeeds"));
    }
    assert_eq!(sub_ids.len(), 1);
    assert_eq!(pad_ids.len(), 1);
    Ok(())
}

#[test]
fn test_distinct_keys_do_not_interfere() -> Result<()> {
    let cache = Arc::new(MultiKeyCache::new("concurrency", 100_000, 8));
    let handles: Vec<_> = (0..WORKERS)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500usize {
                    cache.put(cache_key!(worker, i), Arc::new(worker * 1000 + i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(cache.len(), WORKERS * 500);
    for worker in 0..WORKERS {
        for i in (0..500usize).step_by(97) {
            let value = cache.get::<usize>(&cache_key!(worker, i));
            assert_eq!(value.as_deref(), Some(&(worker * 1000 + i)));
        }
    }
    Ok(())
}

#[test]
fn test_concurrent_extraction_computes_each_gram_once() -> Result<()> {
    let ctx = Arc::new(CacheContext::default());
    let descriptor = FeatureGramDescriptor::new(50.0, 25.0, Arc::new(RmsExtractor))?;
    let pipeline = Arc::new(CachingFeatureExtractionPipeline::new(
        Arc::clone(&ctx),
        vec![descriptor],
    )?);
    let window = window(&ctx)?;
    let barrier = Arc::new(Barrier::new(WORKERS));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let window = Arc::clone(&window);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pipeline.extract(&window).map(|grams| grams[0].id())
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        ids.insert(handle.join().expect("worker panicked")?);
    }
    assert_eq!(ids.len(), 1);

    let unprocessed = ctx
        .stats()
        .into_iter()
        .find(|s| s.name == "unprocessed-features")
        .expect("unprocessed cache registered");
    assert_eq!(unprocessed.inserts, 1);
    Ok(())
}
