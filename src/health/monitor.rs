//! Reachability monitoring and drift detection.
//!
//! # Responsibilities
//! - Periodically probe every repo proxy of the latest snapshot
//! - Record URLs that answered in the snapshot's reachability map
//! - Force a proxy restart when a previously reachable URL stops answering
//!
//! A name that keeps resolving while its address moves leaves nginx with
//! stale upstream addresses that a reload does not refresh, hence the
//! restart instead of a reload.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::generator::ConfigSnapshot;
use crate::health::probe::Prober;
use crate::observability::metrics;
use crate::reload::Restarter;

/// Result of one probing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No configuration has been published yet.
    NotReady,
    Completed { probed: usize, reachable: usize },
    /// Drift detected on `url`; remaining proxies were skipped.
    Restarted { url: String },
}

pub struct ReachabilityMonitor<P, R> {
    snapshot: ConfigSnapshot,
    prober: P,
    restarter: R,
    interval: Duration,
}

impl<P: Prober, R: Restarter> ReachabilityMonitor<P, R> {
    pub fn new(snapshot: ConfigSnapshot, prober: P, restarter: R, interval: Duration) -> Self {
        Self {
            snapshot,
            prober,
            restarter,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Reachability monitor starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.check_all().await;
                    tracing::debug!(outcome = ?outcome, "Reachability pass finished");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Reachability monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every repo proxy of the current snapshot once.
    pub async fn check_all(&self) -> CycleOutcome {
        let Some(config) = self.snapshot.load() else {
            return CycleOutcome::NotReady;
        };

        let mut probed = 0;
        let mut reachable = 0;
        for repo in &config.repo_proxies {
            let url = repo.url.as_str();
            probed += 1;

            match self.prober.probe(repo).await {
                Ok(()) => {
                    metrics::record_probe(true);
                    config.reachability.mark_reachable(url);
                    reachable += 1;
                }
                Err(e) => {
                    metrics::record_probe(false);
                    if config.reachability.get(url).is_none() {
                        tracing::debug!(url = %url, error = %e, "Upstream not reachable yet");
                        continue;
                    }

                    tracing::warn!(
                        repo = %repo.repo_id,
                        url = %url,
                        error = %e,
                        "Previously reachable upstream stopped answering, restarting proxy"
                    );
                    metrics::record_restart();
                    if let Err(e) = self.restarter.restart().await {
                        tracing::error!(error = %e, "Failed to restart proxy process");
                    }
                    return CycleOutcome::Restarted {
                        url: url.to_string(),
                    };
                }
            }
        }

        CycleOutcome::Completed { probed, reachable }
    }
}
