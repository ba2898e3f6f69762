//! Runtime settings of the mirror itself.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → command line overrides (cli.rs)
//!     → validation.rs (semantic checks, all errors at once)
//!     → MirrorConfig (immutable for the life of the process)
//! ```
//!
//! Repository definitions are not part of this: they are re-read on every
//! reload by the generator.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{check_config, load_config, ConfigError};
pub use schema::{
    CacheSection, HttpSection, MirrorConfig, MonitorSection, ObservabilitySection, ProcessSection,
    TlsSection, WatchSection,
};
