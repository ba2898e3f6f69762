//! RPM repository mirror.
//!
//! Generates nginx configuration from `.repo` definitions, keeps it in
//! sync with definition changes and restarts nginx when a previously
//! reachable upstream stops answering.

pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod process;
pub mod reload;
pub mod repo;

pub use config::MirrorConfig;
pub use error::MirrorError;
pub use generator::{CacheConfig, ConfigGenerator, ConfigSnapshot};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
