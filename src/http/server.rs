//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router over the shared snapshot
//! - Serve plain HTTP, or TLS through axum-server when configured
//! - Stop on the shutdown broadcast

use std::path::PathBuf;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::generator::ConfigSnapshot;
use crate::http::handlers;
use crate::net::tls::load_tls_config;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub snapshot: ConfigSnapshot,
    /// Plain client for `/healthz`.
    pub client: reqwest::Client,
    /// Whether this server terminates TLS itself.
    pub tls: bool,
}

/// Certificate and key for serving the local surface over TLS.
#[derive(Debug, Clone)]
pub struct ServerTls {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

pub struct HttpServer {
    router: Router,
    tls: Option<ServerTls>,
}

impl HttpServer {
    pub fn new(snapshot: ConfigSnapshot, tls: Option<ServerTls>, health_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(health_timeout)
            .build()
            .unwrap_or_default();

        let state = AppState {
            snapshot,
            client,
            tls: tls.is_some(),
        };

        Self {
            router: Self::build_router(state),
            tls,
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", get(handlers::index))
            .route("/healthz", get(handlers::healthz))
            .route("/{file}", get(handlers::repo_file))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until shutdown is signalled.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;

        match self.tls {
            None => {
                tracing::info!(address = %addr, "HTTP server starting");
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await?;
            }
            Some(tls) => {
                tracing::info!(address = %addr, "HTTPS server starting");
                let rustls = load_tls_config(&tls.cert_path, &tls.key_path).await?;
                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
                });
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(self.router.into_make_service())
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
