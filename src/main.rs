//! repo-mirror
//!
//! # Architecture Overview
//!
//! ```text
//!   *.repo files ──notify──▶ watcher ──▶ coalescer ──▶ coordinator
//!                                                       │
//!                               ┌───────────────────────┴──────────┐
//!                               ▼                                  ▼
//!                          generator ──write──▶ nginx.conf     supervisor ──SIGHUP──▶ nginx
//!                               │                                  ▲
//!                            snapshot ◀── monitor ──drift/SIGTERM──┘
//!                               │
//!                          HTTP /, /{id}.repo, /healthz
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use repo_mirror::cli::Cli;
use repo_mirror::config::check_config;
use repo_mirror::generator::{ConfigGenerator, NginxTemplate};
use repo_mirror::health::{HttpProber, ReachabilityMonitor};
use repo_mirror::http::server::ServerTls;
use repo_mirror::http::HttpServer;
use repo_mirror::lifecycle::{signals::termination_signal, Shutdown};
use repo_mirror::observability::{logging, metrics};
use repo_mirror::process::ProcessSupervisor;
use repo_mirror::reload::{ChangeCoalescer, DefinitionWatcher, Loader, ReloadCoordinator};
use repo_mirror::MirrorError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    logging::init_logging(config.observability.verbose);
    check_config(&config)?;

    tracing::info!(
        paths = ?config.watch.paths,
        config_path = ?config.process.config_path,
        cache_dir = ?config.cache.dir,
        local_port = config.http.local_port,
        "repo-mirror starting"
    );

    if let Some(addr) = &config.observability.metrics_address {
        metrics::init_metrics(addr.parse()?);
    }

    let shutdown = Shutdown::new();
    let paths = config.watch.paths.clone();
    let generator = Arc::new(ConfigGenerator::new(
        config.process.config_path.clone(),
        NginxTemplate,
        config.cache_settings(logging::proxy_log_level(config.observability.verbose)),
    ));
    let snapshot = generator.snapshot();

    // The proxy needs a file to start from; bad client certificates are a
    // configuration error, anything else may be fixed by a later change.
    match generator.load(&paths).await {
        Ok(()) => {}
        Err(e @ MirrorError::TlsConfig { .. }) => return Err(e.into()),
        Err(e) => tracing::error!(error = %e, "Initial configuration load failed, waiting for changes"),
    }

    let mut tasks = Vec::new();

    let supervisor = config.process.config_path.as_ref().map(|config_path| {
        Arc::new(ProcessSupervisor::nginx(
            &config.process.nginx_binary,
            config_path,
            Duration::from_secs(config.process.relaunch_delay_secs),
        ))
    });

    let loader: Arc<dyn Loader> = match &supervisor {
        Some(supervisor) => Arc::new(ReloadCoordinator::new(generator.clone(), supervisor.clone())),
        None => generator.clone(),
    };

    if let Some(supervisor) = &supervisor {
        tasks.push(tokio::spawn(supervisor.clone().run(shutdown.subscribe())));

        let monitor = ReachabilityMonitor::new(
            snapshot.clone(),
            HttpProber::new(Duration::from_secs(config.monitor.timeout_secs)),
            supervisor.clone(),
            Duration::from_secs(config.monitor.interval_secs),
        );
        tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));
    }

    let (watcher, events) = DefinitionWatcher::new(&paths);
    let _watch_handle = watcher.run()?;
    let coalescer = ChangeCoalescer::new(config.coalescer(), paths, loader, events);
    tasks.push(tokio::spawn(coalescer.run(shutdown.subscribe())));

    if config.http.local_port > 0 {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.http.local_port));
        let listener = TcpListener::bind(addr).await?;
        let tls = config.http.tls.as_ref().map(|tls| ServerTls {
            cert_path: tls.cert_path.clone(),
            key_path: tls.key_path.clone(),
        });
        let server = HttpServer::new(
            snapshot.clone(),
            tls,
            Duration::from_secs(config.http.health_timeout_secs),
        );
        let server_shutdown = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = server.run(listener, server_shutdown).await {
                tracing::error!(error = %e, "HTTP server exited");
            }
        }));
    }

    termination_signal().await;
    shutdown.trigger();
    for task in tasks {
        let _ = tokio::time::timeout(Duration::from_secs(10), task).await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
