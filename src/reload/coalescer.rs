//! Debouncing of filesystem change notifications.
//!
//! # States
//! ```text
//! Idle ──event──▶ Pending { first, last } ──event──▶ Pending { first, last' }
//!                        │
//!                        └── min(last + min_interval, first + max_delay) passes
//!                            ──▶ Fire (one load with every watched path) ──▶ Idle
//! ```
//!
//! `min_interval` keeps bulk writes from causing a reload storm; `max_delay`
//! keeps continuous churn from starving reloads.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep_until, Instant};

use crate::reload::Loader;

/// Debounce timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerConfig {
    /// Quiet time required after the last event.
    pub min_interval: Duration,
    /// Upper bound between the first event of a burst and the load.
    pub max_delay: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescerState {
    Idle,
    Pending { first: Instant, last: Instant },
}

impl CoalescerState {
    /// Transition for a change notification observed at `now`.
    pub fn on_event(self, now: Instant) -> Self {
        match self {
            CoalescerState::Idle => CoalescerState::Pending { first: now, last: now },
            CoalescerState::Pending { first, .. } => CoalescerState::Pending { first, last: now },
        }
    }

    /// When a pending burst fires.
    pub fn deadline(&self, config: &CoalescerConfig) -> Option<Instant> {
        match self {
            CoalescerState::Idle => None,
            CoalescerState::Pending { first, last } => {
                Some((*last + config.min_interval).min(*first + config.max_delay))
            }
        }
    }
}

/// Collapses bursts of change events into single loads.
pub struct ChangeCoalescer<L> {
    config: CoalescerConfig,
    paths: Vec<PathBuf>,
    loader: L,
    events: mpsc::UnboundedReceiver<PathBuf>,
}

impl<L: Loader> ChangeCoalescer<L> {
    pub fn new(
        config: CoalescerConfig,
        paths: Vec<PathBuf>,
        loader: L,
        events: mpsc::UnboundedReceiver<PathBuf>,
    ) -> Self {
        Self {
            config,
            paths,
            loader,
            events,
        }
    }

    /// Run until the event queue closes or shutdown is signalled.
    ///
    /// A burst still pending when the queue closes is fired; one pending at
    /// shutdown is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            min_interval = ?self.config.min_interval,
            max_delay = ?self.config.max_delay,
            paths = ?self.paths,
            "Change coalescer starting"
        );

        let mut state = CoalescerState::Idle;
        loop {
            match state.deadline(&self.config) {
                None => {
                    tokio::select! {
                        event = self.events.recv() => match event {
                            Some(path) => {
                                tracing::debug!(path = ?path, "Change detected");
                                state = state.on_event(Instant::now());
                            }
                            None => break,
                        },
                        _ = shutdown.recv() => break,
                    }
                }
                Some(deadline) => {
                    tokio::select! {
                        event = self.events.recv() => match event {
                            Some(path) => {
                                tracing::trace!(path = ?path, "Change coalesced");
                                state = state.on_event(Instant::now());
                            }
                            None => {
                                self.fire().await;
                                break;
                            }
                        },
                        _ = sleep_until(deadline) => {
                            self.fire().await;
                            state = CoalescerState::Idle;
                        }
                        _ = shutdown.recv() => break,
                    }
                }
            }
        }

        tracing::info!("Change coalescer stopped");
    }

    async fn fire(&self) {
        match self.loader.load(&self.paths).await {
            Ok(()) => tracing::info!("Configuration reloaded"),
            Err(e) => tracing::error!(
                error = %e,
                kind = e.kind(),
                "Failed to reload configuration, keeping the current one"
            ),
        }
    }
}
