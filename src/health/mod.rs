//! Upstream reachability subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (monitor.rs)
//!     → latest snapshot's repo proxies
//!     → probe.rs (GET with client identity / Authorization)
//!     → reachability map (reachable URLs)
//!     → drift: Restarter::restart, pass ends
//! ```
//!
//! # Design Decisions
//! - A URL never seen reachable cannot drift; failures are only retried
//! - One observed reachable→unreachable transition is enough to act
//! - The monitor is the only writer of the reachability map

pub mod monitor;
pub mod probe;

pub use monitor::{CycleOutcome, ReachabilityMonitor};
pub use probe::{HttpProber, Prober};
