//! Error taxonomy for the mirror.
//!
//! Parse-time variants abort a whole load and leave the previously
//! published snapshot serving. `Probe` never escapes the reachability
//! monitor except as a drift-triggered restart.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{} can't load section {section} authentication: {message}", path.display())]
    AuthConfig {
        path: PathBuf,
        section: String,
        message: String,
    },

    #[error("repo {section} in {} has an invalid base URL: {message}", path.display())]
    Url {
        path: PathBuf,
        section: String,
        message: String,
    },

    #[error("repo {section} in {} has no base URLs sharing the path {canonical_path}", path.display())]
    InconsistentBaseUrl {
        path: PathBuf,
        section: String,
        canonical_path: String,
    },

    #[error("repo id {id} is declared more than once ({})", path.display())]
    DuplicateRepoId { id: String, path: PathBuf },

    #[error("invalid client TLS material for repo {repo}: {message}")]
    TlsConfig { repo: String, message: String },

    #[error("unable to render configuration: {0}")]
    Render(String),

    #[error("unable to reload proxy process: {0}")]
    Reload(String),

    #[error("probe of {url} failed: {message}")]
    Probe { url: String, message: String },
}

impl MirrorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorError::Io { .. } => "io",
            MirrorError::Parse { .. } => "parse",
            MirrorError::AuthConfig { .. } => "auth_config",
            MirrorError::Url { .. } => "url",
            MirrorError::InconsistentBaseUrl { .. } => "inconsistent_base_url",
            MirrorError::DuplicateRepoId { .. } => "duplicate_repo_id",
            MirrorError::TlsConfig { .. } => "tls_config",
            MirrorError::Render(_) => "render",
            MirrorError::Reload(_) => "reload",
            MirrorError::Probe { .. } => "probe",
        }
    }
}

pub type Result<T, E = MirrorError> = std::result::Result<T, E>;
