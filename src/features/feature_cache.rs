// src/features/feature_cache.rs
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use crate::models::CandidatePair;

/// LRU cache of pair feature vectors, so pairs scored repeatedly during a
/// labeling session or calibration are compared only once.
pub struct FeatureCache {
    cache: LruCache<String, Vec<f64>>,
    hits: usize,
    misses: usize,
}

impl FeatureCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        debug!("Initializing FeatureCache with capacity: {}", capacity);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, pair: &CandidatePair) -> Option<Vec<f64>> {
        match self.cache.get(&pair.key()).cloned() {
            Some(features) => {
                self.hits += 1;
                if self.hits % 1000 == 0 {
                    debug!(
                        "FeatureCache stats - hits: {}, misses: {}, hit rate: {:.2}%",
                        self.hits,
                        self.misses,
                        self.hit_rate() * 100.0
                    );
                }
                Some(features)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, pair: &CandidatePair, features: Vec<f64>) {
        self.cache.put(pair.key(), features);
    }

    /// (hits, misses)
    pub fn get_stats(&self) -> (usize, usize) {
        (self.hits, self.misses)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// (entries, capacity)
    pub fn get_cache_info(&self) -> (usize, usize) {
        (self.cache.len(), self.cache.cap().get())
    }
}

pub type SharedFeatureCache = Arc<Mutex<FeatureCache>>;

pub fn create_shared_cache(capacity: usize) -> SharedFeatureCache {
    Arc::new(Mutex::new(FeatureCache::new(capacity)))
}
