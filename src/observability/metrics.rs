//! Metrics collection and exposition.
//!
//! # Metrics
//! - `mirror_loads_total` (counter): configuration loads by result
//! - `mirror_reloads_total` (counter): proxy reload signals by result
//! - `mirror_restarts_total` (counter): drift-triggered restarts
//! - `mirror_probes_total` (counter): reachability probes by result
//! - `mirror_repo_proxies` (gauge): repo proxies in the published snapshot
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

fn result_label(ok: bool) -> &'static str {
    if ok {
        "success"
    } else {
        "failure"
    }
}

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_load(ok: bool) {
    counter!("mirror_loads_total", "result" => result_label(ok)).increment(1);
}

pub fn record_reload(ok: bool) {
    counter!("mirror_reloads_total", "result" => result_label(ok)).increment(1);
}

pub fn record_restart() {
    counter!("mirror_restarts_total").increment(1);
}

pub fn record_probe(reachable: bool) {
    let result = if reachable { "reachable" } else { "unreachable" };
    counter!("mirror_probes_total", "result" => result).increment(1);
}

pub fn set_repo_proxies(count: usize) {
    gauge!("mirror_repo_proxies").set(count as f64);
}
