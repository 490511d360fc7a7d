use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

/// Thread-safe LRU cache of text embeddings
///
/// Keyed by the embedded text (question or relation name). Bounded by
/// capacity with least-recently-used eviction.
pub struct EmbeddingCache {
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl EmbeddingCache {
    /// Create a cache holding up to `capacity` embeddings (at least one).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    // Every critical section is a single LRU call; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, LruCache<String, Vec<f32>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.lock().get(text).cloned()
    }

    pub fn put(&self, text: String, embedding: Vec<f32>) {
        self.lock().put(text, embedding);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
