//! Command line interface.
//!
//! Flags override values from the optional `--config` file, which override
//! the built-in defaults.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{load_config, ConfigError, MirrorConfig};
use crate::generator::model::Frontend;

#[derive(Debug, Parser)]
#[command(name = "repo-mirror")]
#[command(about = "Proxy RPM repositories and other important content", long_about = None)]
pub struct Cli {
    /// Definition files or directories of *.repo files to watch (default: .)
    pub paths: Vec<PathBuf>,

    /// TOML settings file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The path to write the proxy configuration to.
    #[arg(long = "path")]
    pub config_path: Option<PathBuf>,

    /// The directory to cache mirrored content into.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// The maximum size of the cache (e.g. 10g, 100m).
    #[arg(long)]
    pub max_size: Option<String>,

    /// How long an item is kept in the cache.
    #[arg(long)]
    pub timeout: Option<String>,

    /// The address (host:port, host, or port) to bind to for serving content.
    #[arg(long)]
    pub listen: Option<String>,

    /// Port of the local index/health server, 0 to disable.
    #[arg(long)]
    pub local_port: Option<u16>,

    /// The proxy binary to supervise.
    #[arg(long)]
    pub nginx: Option<PathBuf>,

    /// Seconds between reachability passes.
    #[arg(long)]
    pub probe_interval_secs: Option<u64>,

    /// Prometheus scrape address.
    #[arg(long)]
    pub metrics_address: Option<String>,

    /// Display verbose output from the mirror and nginx.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Settings from the config file (if any) with flags applied on top.
    pub fn into_config(self) -> Result<MirrorConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => MirrorConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(self, config: &mut MirrorConfig) {
        if !self.paths.is_empty() {
            config.watch.paths = self.paths;
        }
        if let Some(path) = self.config_path.filter(|p| !p.as_os_str().is_empty()) {
            config.process.config_path = Some(path);
        }
        if let Some(dir) = self.cache_dir {
            config.cache.dir = dir;
        }
        if let Some(size) = self.max_size {
            config.cache.max_size = size;
        }
        if let Some(timeout) = self.timeout {
            config.cache.inactive = timeout;
        }
        if let Some(listen) = self.listen {
            config.frontends = vec![Frontend::plain(listen)];
        }
        if let Some(port) = self.local_port {
            config.http.local_port = port;
        }
        if let Some(binary) = self.nginx {
            config.process.nginx_binary = binary;
        }
        if let Some(secs) = self.probe_interval_secs {
            config.monitor.interval_secs = secs;
        }
        if let Some(addr) = self.metrics_address {
            config.observability.metrics_address = Some(addr);
        }
        if self.verbose {
            config.observability.verbose = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_flags() {
        let config = Cli::parse_from(["repo-mirror"]).into_config().unwrap();
        assert_eq!(config, MirrorConfig::default());
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("mirror.toml");
        std::fs::write(&file, "[cache]\nmax_size = \"5g\"\ninactive = \"1h\"\n").unwrap();

        let config = Cli::parse_from([
            "repo-mirror",
            "--config",
            file.to_str().unwrap(),
            "--max-size",
            "20g",
            "--listen",
            "0.0.0.0:8443",
            "--path",
            "/run/nginx.conf",
            "-v",
            "/etc/yum.repos.d",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.cache.max_size, "20g");
        assert_eq!(config.cache.inactive, "1h");
        assert_eq!(config.frontends, vec![Frontend::plain("0.0.0.0:8443")]);
        assert_eq!(config.process.config_path, Some(PathBuf::from("/run/nginx.conf")));
        assert_eq!(config.watch.paths, vec![PathBuf::from("/etc/yum.repos.d")]);
        assert!(config.observability.verbose);
    }
}
