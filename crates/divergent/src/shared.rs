use std::sync::Arc;
use std::sync::Mutex;

use crate::cache::AggregateRecord;
use crate::cache::DivergenceCache;
use crate::cache::ResetMode;
use crate::sample::Sample;

/// Cloneable handle to a [`DivergenceCache`] behind a single mutex.
///
/// Every call holds the lock for its whole duration, so a flush observes and
/// re-anchors a consistent cache. An ingest racing a flush lands either fully
/// before it (and is emitted in this period) or fully after it.
#[derive(Debug, Clone, Default)]
pub struct SharedDivergenceCache {
    inner: Arc<Mutex<DivergenceCache>>,
}

impl SharedDivergenceCache {
    pub fn new(cache: DivergenceCache) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cache)),
        }
    }

    pub fn with_reset_mode(reset_mode: ResetMode) -> Self {
        Self::new(DivergenceCache::with_reset_mode(reset_mode))
    }

    pub fn ingest(&self, sample: &Sample) {
        self.inner.lock().expect("poisoned").ingest(sample);
    }

    pub fn flush(&self) -> Vec<AggregateRecord> {
        self.inner.lock().expect("poisoned").flush()
    }

    pub fn reset(&self) {
        self.inner.lock().expect("poisoned").reset();
    }

    /// Number of tracked series.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
