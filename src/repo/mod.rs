//! Repository definition subsystem.
//!
//! # Data Flow
//! ```text
//! watched paths
//!     → parser::definition_files (expand directories to *.repo)
//!     → ini.rs (sections, keys, continuation lines)
//!     → parser.rs (credentials, base URL consistency, TLS paths)
//!     → (Vec<Upstream>, Vec<RepoProxy>)
//! ```
//!
//! # Design Decisions
//! - Stateless: every reload cycle re-reads every file
//! - Any structural error fails the whole file, never a partial result
//! - Base URLs that disagree on the path are dropped, not fatal

pub mod ini;
pub mod parser;

pub use parser::{definition_files, load_rpm_repo_upstreams};
