//! Supervision of the external reverse-proxy process.
//!
//! # Lifecycle
//! ```text
//! run():      spawn → wait for exit → relaunch after delay → ...
//! reload():   SIGHUP to the running process (graceful, same workers' upstreams)
//! restart():  SIGTERM to the running process; run() relaunches it
//! ```

pub mod supervisor;

pub use supervisor::ProcessSupervisor;
