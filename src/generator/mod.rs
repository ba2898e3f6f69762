//! Configuration generation subsystem.
//!
//! # Data Flow
//! ```text
//! watched paths
//!     → repo::parser (fresh parse, every cycle)
//!     → net::tls (client identities must load)
//!     → model::CacheConfig (static settings + parsed records)
//!     → template.rs (nginx text)
//!     → temp file, fsync, rename over target
//!     → snapshot.rs publish (whole Arc replaced)
//! ```
//!
//! # Design Decisions
//! - A failed load never touches the published snapshot or the target file
//! - The reachability map is carried from one snapshot to the next
//! - Readers never lock: `ArcSwapOption` hands out `Arc<CacheConfig>`

pub mod model;
pub mod snapshot;
pub mod template;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{MirrorError, Result};
use crate::net::tls::load_client_identity;
use crate::observability::metrics;
use crate::reload::Loader;
use crate::repo::{definition_files, load_rpm_repo_upstreams};

pub use model::{CacheConfig, CacheSettings, Frontend, ReachabilityMap, RepoProxy, Upstream};
pub use snapshot::ConfigSnapshot;
pub use template::{ConfigTemplate, NginxTemplate};

/// Generates the proxy configuration and owns the published snapshot.
pub struct ConfigGenerator {
    /// Target file; `None` writes the rendered configuration to stdout.
    output_path: Option<PathBuf>,
    template: Box<dyn ConfigTemplate>,
    settings: CacheSettings,
    snapshot: ConfigSnapshot,
}

impl ConfigGenerator {
    pub fn new(
        output_path: Option<PathBuf>,
        template: impl ConfigTemplate + 'static,
        settings: CacheSettings,
    ) -> Self {
        Self {
            output_path,
            template: Box::new(template),
            settings,
            snapshot: ConfigSnapshot::new(),
        }
    }

    /// A handle to the published snapshot for readers.
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.snapshot.clone()
    }

    pub fn last_config(&self) -> Option<Arc<CacheConfig>> {
        self.snapshot.load()
    }

    async fn generate(&self, paths: &[PathBuf]) -> Result<()> {
        let owned = paths.to_vec();
        let (upstreams, repo_proxies) = tokio::task::spawn_blocking(move || parse_all(&owned))
            .await
            .map_err(|e| MirrorError::Render(format!("definition parsing task failed: {}", e)))??;

        let reachability = self
            .snapshot
            .load()
            .map(|previous| previous.reachability.clone())
            .unwrap_or_else(|| Arc::new(ReachabilityMap::new()));

        let config = CacheConfig {
            settings: self.settings.clone(),
            upstreams,
            repo_proxies,
            reachability,
        };

        let rendered = self.template.render(&config)?;
        match &self.output_path {
            Some(path) => write_atomically(path, rendered.as_bytes()).await?,
            None => {
                let mut stdout = tokio::io::stdout();
                stdout
                    .write_all(rendered.as_bytes())
                    .await
                    .map_err(|e| MirrorError::Render(e.to_string()))?;
                stdout.flush().await.map_err(|e| MirrorError::Render(e.to_string()))?;
            }
        }

        metrics::set_repo_proxies(config.repo_proxies.len());
        tracing::info!(
            upstreams = config.upstreams.len(),
            repo_proxies = config.repo_proxies.len(),
            output = ?self.output_path,
            "Configuration generated"
        );
        // Removed repos start over: a failure after re-adding one is not drift.
        let live: HashSet<&str> = config.repo_proxies.iter().map(|r| r.url.as_str()).collect();
        config.reachability.retain(|url| live.contains(url));

        self.snapshot.publish(config);
        Ok(())
    }
}

#[async_trait]
impl Loader for ConfigGenerator {
    async fn load(&self, paths: &[PathBuf]) -> Result<()> {
        let result = self.generate(paths).await;
        metrics::record_load(result.is_ok());
        result
    }
}

/// Parse every definition file reachable from `paths`, rejecting repeated
/// ids and unloadable client identities. Blocking.
fn parse_all(paths: &[PathBuf]) -> Result<(Vec<Upstream>, Vec<RepoProxy>)> {
    let mut upstreams = Vec::new();
    let mut repo_proxies: Vec<RepoProxy> = Vec::new();
    let mut origins: HashMap<String, PathBuf> = HashMap::new();

    for file in definition_files(paths)? {
        let (file_upstreams, file_proxies) = load_rpm_repo_upstreams(&file)?;
        for proxy in &file_proxies {
            if origins.insert(proxy.repo_id.clone(), file.clone()).is_some() {
                return Err(MirrorError::DuplicateRepoId {
                    id: proxy.repo_id.clone(),
                    path: file.clone(),
                });
            }
        }
        upstreams.extend(file_upstreams);
        repo_proxies.extend(file_proxies);
    }

    for repo in &repo_proxies {
        if let Some((cert, key)) = repo.client_identity() {
            load_client_identity(&repo.repo_id, cert, key)?;
        }
    }

    Ok((upstreams, repo_proxies))
}

/// Write to a uniquely named sibling, fsync, then rename over `path`.
async fn write_atomically(path: &Path, data: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp.{}", file_name, Uuid::new_v4()));

    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(MirrorError::Render(format!(
            "unable to write {}: {}",
            path.display(),
            e
        )));
    }
    Ok(())
}
