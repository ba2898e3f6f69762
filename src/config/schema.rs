//! Configuration schema definitions.
//!
//! Every section has defaults so an absent file, or a file with a single
//! key, is a complete configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::generator::model::{CacheSettings, Frontend};
use crate::reload::CoalescerConfig;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MirrorConfig {
    pub watch: WatchSection,
    pub cache: CacheSection,
    pub process: ProcessSection,
    /// Listeners written into the generated proxy configuration.
    pub frontends: Vec<Frontend>,
    pub http: HttpSection,
    pub monitor: MonitorSection,
    pub observability: ObservabilitySection,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            watch: WatchSection::default(),
            cache: CacheSection::default(),
            process: ProcessSection::default(),
            frontends: vec![Frontend::plain("8080")],
            http: HttpSection::default(),
            monitor: MonitorSection::default(),
            observability: ObservabilitySection::default(),
        }
    }
}

impl MirrorConfig {
    /// Static part of every generated configuration.
    pub fn cache_settings(&self, log_level: &str) -> CacheSettings {
        CacheSettings {
            log_level: log_level.to_string(),
            local_port: self.http.local_port,
            cache_dir: self.cache.dir.clone(),
            max_cache_size: self.cache.max_size.clone(),
            inactive_duration: self.cache.inactive.clone(),
            frontends: self.frontends.clone(),
        }
    }

    pub fn coalescer(&self) -> CoalescerConfig {
        CoalescerConfig {
            min_interval: Duration::from_millis(self.watch.min_interval_ms),
            max_delay: Duration::from_millis(self.watch.max_delay_ms),
        }
    }
}

/// Which definitions to read and how to debounce their changes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WatchSection {
    /// Definition files, or directories of `*.repo` files.
    pub paths: Vec<PathBuf>,
    pub min_interval_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(".")],
            min_interval_ms: 10,
            max_delay_ms: 1000,
        }
    }
}

/// nginx cache sizing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheSection {
    pub dir: PathBuf,
    /// nginx size, e.g. `10g`, `100m`.
    pub max_size: String,
    /// nginx time, e.g. `15m`.
    pub inactive: String,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/tmp/cache"),
            max_size: "1g".to_string(),
            inactive: "15m".to_string(),
        }
    }
}

/// Generated file and the process that consumes it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProcessSection {
    /// Where to write the configuration. Without it the configuration is
    /// printed and no process is launched.
    pub config_path: Option<PathBuf>,
    pub nginx_binary: PathBuf,
    pub relaunch_delay_secs: u64,
}

impl Default for ProcessSection {
    fn default() -> Self {
        Self {
            config_path: None,
            nginx_binary: PathBuf::from("nginx"),
            relaunch_delay_secs: 1,
        }
    }
}

/// Local index/health server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpSection {
    /// Port on localhost, 0 disables the server.
    pub local_port: u16,
    pub tls: Option<TlsSection>,
    pub health_timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            local_port: 9001,
            tls: None,
            health_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TlsSection {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Reachability monitor timing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorSection {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilitySection {
    /// Debug logging for the mirror and for nginx.
    pub verbose: bool,
    /// Prometheus scrape address, e.g. `127.0.0.1:9090`.
    pub metrics_address: Option<String>,
}
