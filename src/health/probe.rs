//! HTTP probing of repo proxy URLs.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;

use crate::error::{MirrorError, Result};
use crate::generator::model::RepoProxy;
use crate::net::tls::load_client_identity;

/// Checks whether a repo proxy's upstream answers.
#[async_trait]
pub trait Prober: Send + Sync {
    /// `Ok` only for an HTTP 200 answer.
    async fn probe(&self, repo: &RepoProxy) -> Result<()>;
}

#[async_trait]
impl<T: Prober + ?Sized> Prober for std::sync::Arc<T> {
    async fn probe(&self, repo: &RepoProxy) -> Result<()> {
        (**self).probe(repo).await
    }
}

type ClientKey = (Option<(PathBuf, PathBuf)>, bool);

/// Prober backed by `reqwest`, one cached client per TLS identity.
pub struct HttpProber {
    timeout: Duration,
    clients: DashMap<ClientKey, reqwest::Client>,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            clients: DashMap::new(),
        }
    }

    fn client_for(&self, repo: &RepoProxy) -> Result<reqwest::Client> {
        let key: ClientKey = (
            repo.client_identity()
                .map(|(cert, key)| (cert.clone(), key.clone())),
            repo.verify_tls,
        );
        if let Some(client) = self.clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!repo.verify_tls);
        if let Some((cert, key)) = &key.0 {
            builder = builder.identity(load_client_identity(&repo.repo_id, cert, key)?);
        }
        let client = builder.build().map_err(|e| MirrorError::Probe {
            url: repo.url.to_string(),
            message: e.to_string(),
        })?;

        self.clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, repo: &RepoProxy) -> Result<()> {
        let client = self.client_for(repo)?;
        let mut request = client
            .get(repo.url.clone())
            .header("user-agent", "repo-mirror-reachability");
        if let Some(header) = &repo.auth_header {
            request = request.header(AUTHORIZATION, header);
        }

        let response = request.send().await.map_err(|e| MirrorError::Probe {
            url: repo.url.to_string(),
            message: e.to_string(),
        })?;
        if response.status() != StatusCode::OK {
            return Err(MirrorError::Probe {
                url: repo.url.to_string(),
                message: format!("unexpected status {}", response.status()),
            });
        }
        Ok(())
    }
}
