//! Binding of configuration loads to process reloads.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::observability::metrics;
use crate::reload::{Loader, Reloader};

/// Calls the reloader after, and only after, a successful load.
pub struct ReloadCoordinator<L, R> {
    loader: L,
    reloader: R,
}

impl<L: Loader, R: Reloader> ReloadCoordinator<L, R> {
    pub fn new(loader: L, reloader: R) -> Self {
        Self { loader, reloader }
    }
}

#[async_trait]
impl<L: Loader, R: Reloader> Loader for ReloadCoordinator<L, R> {
    async fn load(&self, paths: &[PathBuf]) -> Result<()> {
        self.loader.load(paths).await?;

        let result = self.reloader.reload().await;
        metrics::record_reload(result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeLoader {
        fail: AtomicBool,
        reloads_seen: Arc<AtomicU32>,
        observed: AtomicU32,
    }

    #[async_trait]
    impl Loader for FakeLoader {
        async fn load(&self, _paths: &[PathBuf]) -> Result<()> {
            self.observed
                .store(self.reloads_seen.load(Ordering::SeqCst), Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(MirrorError::Render("boom".to_string()));
            }
            Ok(())
        }
    }

    struct CountingReloader(Arc<AtomicU32>);

    #[async_trait]
    impl Reloader for CountingReloader {
        async fn reload(&self) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reload_follows_successful_load() {
        let reloads = Arc::new(AtomicU32::new(0));
        let loader = Arc::new(FakeLoader {
            reloads_seen: reloads.clone(),
            ..Default::default()
        });
        let coordinator = ReloadCoordinator::new(loader.clone(), CountingReloader(reloads.clone()));

        coordinator.load(&[]).await.unwrap();
        coordinator.load(&[]).await.unwrap();

        assert_eq!(reloads.load(Ordering::SeqCst), 2);
        // The second load ran after the first reload, not concurrently with it.
        assert_eq!(loader.observed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_load_does_not_reload() {
        let reloads = Arc::new(AtomicU32::new(0));
        let loader = Arc::new(FakeLoader::default());
        loader.fail.store(true, Ordering::SeqCst);
        let coordinator = ReloadCoordinator::new(loader, CountingReloader(reloads.clone()));

        let err = coordinator.load(&[]).await.unwrap_err();

        assert!(matches!(err, MirrorError::Render(_)));
        assert_eq!(reloads.load(Ordering::SeqCst), 0);
    }
}
