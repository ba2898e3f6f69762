//! Published configuration snapshot.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::generator::model::CacheConfig;

/// Holder of the last successfully generated configuration.
///
/// Readers get an `Arc` to an immutable value; publishing swaps the whole
/// reference. Cloning the holder shares the same slot.
#[derive(Clone, Default)]
pub struct ConfigSnapshot {
    inner: Arc<ArcSwapOption<CacheConfig>>,
}

impl ConfigSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until the first successful load.
    pub fn load(&self) -> Option<Arc<CacheConfig>> {
        self.inner.load_full()
    }

    /// Replace the published configuration. The generator is the only
    /// production caller.
    pub fn publish(&self, config: CacheConfig) {
        self.inner.store(Some(Arc::new(config)));
    }
}
