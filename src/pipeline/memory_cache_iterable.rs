// Memory caching iterable - keeps the items of a streamed feature iterable in memory
//
// Items are cached under (iterable id, position). The first pass fills the
// cache while reading the source. Later passes serve items from the cache;
// an item that was evicted meanwhile is re-derived by iterating the source
// again up to its position.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::cache::MultiKeyCache;
use crate::cache_key;
use crate::identity::InstanceId;

use super::iterable::{FeatureGramIterable, FeatureItem};
use super::LabeledFeatureGram;

pub struct MemoryCachingIterable {
    id: InstanceId,
    source: Arc<dyn FeatureGramIterable>,
    cache: Arc<MultiKeyCache>,
    len: OnceCell<usize>,
}

impl MemoryCachingIterable {
    pub fn new(source: Arc<dyn FeatureGramIterable>, cache: Arc<MultiKeyCache>) -> Self {
        Self {
            id: InstanceId::next(),
            source,
            cache,
            len: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &Arc<dyn FeatureGramIterable> {
        &self.source
    }

    /// Number of items, known once a full pass has completed
    pub fn known_len(&self) -> Option<usize> {
        self.len.get().copied()
    }
}

impl FeatureGramIterable for MemoryCachingIterable {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn is_streamed(&self) -> bool {
        self.source.is_streamed()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = FeatureItem> + '_> {
        Box::new(CachingIter {
            owner: self,
            index: 0,
            cursor: None,
        })
    }
}

impl fmt::Debug for MemoryCachingIterable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCachingIterable")
            .field("id", &self.id)
            .field("source", &self.source.id())
            .field("cache", &self.cache.name())
            .field("len", &self.len.get())
            .finish()
    }
}

/// Source iterator positioned before item `position`
struct Cursor<'a> {
    position: usize,
    items: Box<dyn Iterator<Item = FeatureItem> + 'a>,
}

struct CachingIter<'a> {
    owner: &'a MemoryCachingIterable,
    index: usize,
    cursor: Option<Cursor<'a>>,
}

impl<'a> CachingIter<'a> {
    fn store(&self, position: usize, item: &FeatureItem) {
        if let Ok(gram) = item {
            self.owner
                .cache
                .put(cache_key!(self.owner.id, position), Arc::clone(gram));
        }
    }

    /// Read item `self.index` from the source, restarting it when the cursor is past it.
    fn read_source(&mut self) -> Option<FeatureItem> {
        let owner = self.owner;
        let target = self.index;
        let restart = self
            .cursor
            .as_ref()
            .map_or(true, |cursor| cursor.position > target);
        if restart {
            if self.cursor.is_some() {
                tracing::debug!(
                    iterable = %owner.id,
                    position = target,
                    "evicted item, re-reading source"
                );
            }
            self.cursor = Some(Cursor {
                position: 0,
                items: owner.source.iter(),
            });
        }

        loop {
            let cursor = self.cursor.as_mut()?;
            let position = cursor.position;
            let item = cursor.items.next();
            cursor.position += 1;
            match item {
                None => {
                    let _ = owner.len.set(position);
                    self.cursor = None;
                    return None;
                }
                Some(item) if position == target => {
                    self.store(position, &item);
                    return Some(item);
                }
                Some(_) => {}
            }
        }
    }
}

impl Iterator for CachingIter<'_> {
    type Item = FeatureItem;

    fn next(&mut self) -> Option<FeatureItem> {
        if let Some(&len) = self.owner.len.get() {
            if self.index >= len {
                return None;
            }
        }

        let key = cache_key!(self.owner.id, self.index);
        if let Some(gram) = self.owner.cache.get::<LabeledFeatureGram>(&key) {
            tracing::trace!(iterable = %self.owner.id, position = self.index, "memory cache hit");
            self.index += 1;
            return Some(Ok(gram));
        }

        let item = self.read_source()?;
        self.index += 1;
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheContext;
    use crate::config::FeatureConfig;
    use crate::features::StatsExtractor;
    use crate::pipeline::{FeatureExtractionPipeline, FeatureGramDescriptor, StreamedWindows};
    use crate::window::{LabeledWindow, ScalarWindow};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn streamed(ctx: &Arc<CacheContext>, passes: &Arc<AtomicUsize>) -> Arc<dyn FeatureGramIterable> {
        let descriptor = FeatureGramDescriptor::whole(Arc::new(StatsExtractor));
        let pipeline = Arc::new(
            FeatureExtractionPipeline::new(vec![descriptor], &FeatureConfig::default()).unwrap(),
        );
        let ctx = Arc::clone(ctx);
        let passes = Arc::clone(passes);
        let stream = StreamedWindows::new(move || {
            passes.fetch_add(1, Ordering::SeqCst);
            let ctx = Arc::clone(&ctx);
            (0..4).map(move |i| {
                let window =
                    Arc::new(ScalarWindow::with_rate(&ctx, 0.0, 10.0, vec![i as f64; 10]).unwrap());
                LabeledWindow::with_label(window, "index", i as f64).unwrap()
            })
        });
        Arc::new(pipeline.extract_all(stream.into(), true))
    }

    #[test]
    fn test_second_pass_served_from_cache() {
        let ctx = Arc::new(CacheContext::default());
        let passes = Arc::new(AtomicUsize::new(0));
        let cached = MemoryCachingIterable::new(streamed(&ctx, &passes), Arc::clone(ctx.labeled_cache()));

        let first: Vec<_> = cached.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(cached.known_len(), Some(4));
        let second: Vec<_> = cached.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(passes.load(Ordering::SeqCst), 1);
        for (a, b) in first.iter().zip(&second) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn test_evicted_item_is_rederived() {
        let ctx = Arc::new(CacheContext::default());
        let passes = Arc::new(AtomicUsize::new(0));
        let cached = MemoryCachingIterable::new(streamed(&ctx, &passes), Arc::clone(ctx.labeled_cache()));
        assert_eq!(cached.iter().count(), 4);

        ctx.labeled_cache().remove(&cache_key!(cached.id(), 2usize));
        let labels: Vec<f64> = cached
            .iter()
            .map(|item| item.unwrap().labels()["index"].as_number().unwrap())
            .collect();
        assert_eq!(labels, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(passes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_disabled_cache_reads_source_each_pass() {
        let ctx = Arc::new(CacheContext::default());
        let passes = Arc::new(AtomicUsize::new(0));
        let disabled = Arc::new(MultiKeyCache::disabled("labeled"));
        let cached = MemoryCachingIterable::new(streamed(&ctx, &passes), disabled);
        assert_eq!(cached.iter().count(), 4);
        assert_eq!(cached.iter().count(), 4);
        assert_eq!(passes.load(Ordering::SeqCst), 2);
    }
}
