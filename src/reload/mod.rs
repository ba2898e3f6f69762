//! Reload pipeline.
//!
//! # Data Flow
//! ```text
//! notify events (watcher.rs)
//!     → mpsc queue
//!     → coalescer.rs (Idle → Pending → Fire)
//!     → coordinator.rs (load, then reload on success)
//!     → generator + process supervisor
//! ```
//!
//! # Design Decisions
//! - At most one load per burst, and the next burst waits for it
//! - Reload is never issued for a configuration that failed to load
//! - Failures wait for the next real change; nothing retries on a timer

pub mod coalescer;
pub mod coordinator;
pub mod watcher;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

pub use coalescer::{ChangeCoalescer, CoalescerConfig};
pub use coordinator::ReloadCoordinator;
pub use watcher::DefinitionWatcher;

/// Reads and generates a configuration for the given paths.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, paths: &[PathBuf]) -> Result<()>;
}

/// Asks the proxy process to pick up a new configuration gracefully.
#[async_trait]
pub trait Reloader: Send + Sync {
    async fn reload(&self) -> Result<()>;
}

/// Terminates the proxy process so it is started from scratch.
#[async_trait]
pub trait Restarter: Send + Sync {
    async fn restart(&self) -> Result<()>;
}

#[async_trait]
impl<T: Loader + ?Sized> Loader for std::sync::Arc<T> {
    async fn load(&self, paths: &[PathBuf]) -> Result<()> {
        (**self).load(paths).await
    }
}

#[async_trait]
impl<T: Reloader + ?Sized> Reloader for std::sync::Arc<T> {
    async fn reload(&self) -> Result<()> {
        (**self).reload().await
    }
}

#[async_trait]
impl<T: Restarter + ?Sized> Restarter for std::sync::Arc<T> {
    async fn restart(&self) -> Result<()> {
        (**self).restart().await
    }
}
