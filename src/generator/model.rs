//! Configuration model handed to the template and to readers.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// An operator supplied listener for the generated proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Frontend {
    /// `host:port`, `host` or `port`, passed verbatim to `listen`.
    pub listen: String,
    #[serde(default)]
    pub certificate_path: Option<PathBuf>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl Frontend {
    pub fn plain(listen: impl Into<String>) -> Self {
        Self {
            listen: listen.into(),
            certificate_path: None,
            key_path: None,
        }
    }

    pub fn is_tls(&self) -> bool {
        self.certificate_path.is_some() && self.key_path.is_some()
    }
}

/// A named group of `host:port` targets.
///
/// The name is the hostname of the first target so that TLS connections
/// carry the right SNI value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub name: String,
    pub hosts: Vec<String>,
    pub repo: bool,
}

/// A proxying rule for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoProxy {
    pub repo_id: String,
    /// Canonical source URL, host replaced by the upstream name.
    pub url: Url,
    pub upstream: String,

    pub tls: bool,
    pub certificate_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub verify_tls: bool,
    /// `Basic <base64(user:pass)>`.
    pub auth_header: Option<String>,
}

impl RepoProxy {
    /// Path shared by every host of the owning upstream, always ending in `/`.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn client_identity(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.certificate_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }
}

/// Last known reachability of each repo proxy URL.
///
/// Shared across snapshots; only the reachability monitor writes to it.
#[derive(Debug, Default)]
pub struct ReachabilityMap {
    inner: DashMap<String, bool>,
}

impl ReachabilityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_reachable(&self, url: &str) {
        self.inner.insert(url.to_string(), true);
    }

    /// `None` when the URL was never observed reachable.
    pub fn get(&self, url: &str) -> Option<bool> {
        self.inner.get(url).map(|entry| *entry.value())
    }

    /// Forget every URL for which `keep` is false.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) {
        self.inner.retain(|url, _| keep(url));
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Static settings that are not derived from repository definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub log_level: String,
    /// Port of the local index/health server, 0 when disabled.
    pub local_port: u16,
    pub cache_dir: PathBuf,
    pub max_cache_size: String,
    pub inactive_duration: String,
    pub frontends: Vec<Frontend>,
}

/// A fully generated configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub settings: CacheSettings,
    pub upstreams: Vec<Upstream>,
    pub repo_proxies: Vec<RepoProxy>,
    pub reachability: Arc<ReachabilityMap>,
}

impl CacheConfig {
    pub fn repo(&self, repo_id: &str) -> Option<&RepoProxy> {
        self.repo_proxies.iter().find(|r| r.repo_id == repo_id)
    }
}
