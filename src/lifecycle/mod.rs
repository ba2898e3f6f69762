//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → coalescer, monitor, supervisor, HTTP server exit their loops
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
