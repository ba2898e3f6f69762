//! Rendering of the generated configuration into nginx syntax.

use std::collections::HashMap;
use std::fmt::Write;

use crate::error::{MirrorError, Result};
use crate::generator::model::{CacheConfig, Frontend, RepoProxy, Upstream};

/// Name of the shared nginx cache zone.
const CACHE_ZONE: &str = "mirror";

/// Turns a configuration into the proxy's native configuration text.
pub trait ConfigTemplate: Send + Sync {
    fn render(&self, config: &CacheConfig) -> Result<String>;
}

/// Built-in nginx configuration template.
#[derive(Debug, Clone, Copy, Default)]
pub struct NginxTemplate;

impl ConfigTemplate for NginxTemplate {
    fn render(&self, config: &CacheConfig) -> Result<String> {
        let mut out = String::with_capacity(4096);
        write_config(&mut out, config).map_err(|e| MirrorError::Render(e.to_string()))?;
        Ok(out)
    }
}

fn write_config(out: &mut String, config: &CacheConfig) -> std::fmt::Result {
    let settings = &config.settings;

    writeln!(out, "worker_processes 1;")?;
    writeln!(out, "daemon off;")?;
    writeln!(out, "pid {}/nginx.pid;", settings.cache_dir.display())?;
    writeln!(out, "error_log stderr {};", settings.log_level)?;
    writeln!(out)?;
    writeln!(out, "events {{")?;
    writeln!(out, "    worker_connections 1024;")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "http {{")?;
    if settings.log_level == "debug" {
        writeln!(out, "    access_log /dev/stdout;")?;
    } else {
        writeln!(out, "    access_log off;")?;
    }
    writeln!(
        out,
        "    proxy_cache_path {} levels=1:2 keys_zone={}:10m max_size={} inactive={} use_temp_path=off;",
        settings.cache_dir.display(),
        CACHE_ZONE,
        settings.max_cache_size,
        settings.inactive_duration
    )?;
    writeln!(out)?;

    for upstream in distinct_upstreams(&config.upstreams) {
        writeln!(out, "    upstream {} {{", upstream.name)?;
        for host in &upstream.hosts {
            writeln!(out, "        server {};", host)?;
        }
        writeln!(out, "    }}")?;
        writeln!(out)?;
    }

    for frontend in &settings.frontends {
        write_server(out, config, frontend)?;
    }

    writeln!(out, "}}")?;
    Ok(())
}

fn write_server(out: &mut String, config: &CacheConfig, frontend: &Frontend) -> std::fmt::Result {
    writeln!(out, "    server {{")?;
    match (&frontend.certificate_path, &frontend.key_path) {
        (Some(cert), Some(key)) => {
            writeln!(out, "        listen {} ssl;", frontend.listen)?;
            writeln!(out, "        ssl_certificate {};", cert.display())?;
            writeln!(out, "        ssl_certificate_key {};", key.display())?;
        }
        _ => writeln!(out, "        listen {};", frontend.listen)?,
    }

    for repo in &config.repo_proxies {
        write_location(out, config, repo)?;
    }

    if config.settings.local_port > 0 {
        writeln!(out, "        location / {{")?;
        writeln!(
            out,
            "            proxy_pass http://127.0.0.1:{};",
            config.settings.local_port
        )?;
        writeln!(out, "            proxy_set_header Host $http_host;")?;
        writeln!(out, "            proxy_set_header X-Forwarded-Proto $scheme;")?;
        writeln!(out, "        }}")?;
    }
    writeln!(out, "    }}")?;
    Ok(())
}

fn write_location(out: &mut String, config: &CacheConfig, repo: &RepoProxy) -> std::fmt::Result {
    writeln!(out, "        location /{}/ {{", repo.repo_id)?;
    writeln!(
        out,
        "            proxy_pass {}://{}{};",
        repo.url.scheme(),
        repo.upstream,
        repo.path()
    )?;
    writeln!(out, "            proxy_cache {};", CACHE_ZONE)?;
    writeln!(
        out,
        "            proxy_cache_valid 200 {};",
        config.settings.inactive_duration
    )?;
    writeln!(out, "            proxy_cache_use_stale error timeout updating;")?;
    if repo.url.scheme() == "https" {
        writeln!(out, "            proxy_ssl_server_name on;")?;
        writeln!(out, "            proxy_ssl_name {};", repo.upstream)?;
    }
    if let Some((cert, key)) = repo.client_identity() {
        writeln!(out, "            proxy_ssl_certificate {};", cert.display())?;
        writeln!(out, "            proxy_ssl_certificate_key {};", key.display())?;
    }
    if let Some(header) = &repo.auth_header {
        writeln!(out, "            proxy_set_header Authorization \"{}\";", header)?;
    }
    writeln!(out, "        }}")?;
    Ok(())
}

/// Upstreams in declaration order with repeated names collapsed.
///
/// nginx rejects duplicate upstream blocks. Repositories hosted on the same
/// mirror share a name; when their host lists disagree the first wins.
fn distinct_upstreams(upstreams: &[Upstream]) -> Vec<&Upstream> {
    let mut seen: HashMap<&str, &Upstream> = HashMap::new();
    let mut ordered = Vec::new();
    for upstream in upstreams {
        match seen.get(upstream.name.as_str()) {
            Some(first) => {
                if first.hosts != upstream.hosts {
                    tracing::warn!(
                        upstream = %upstream.name,
                        kept = ?first.hosts,
                        ignored = ?upstream.hosts,
                        "Conflicting host lists for one upstream name, keeping the first"
                    );
                }
            }
            None => {
                seen.insert(&upstream.name, upstream);
                ordered.push(upstream);
            }
        }
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::model::{CacheSettings, ReachabilityMap};
    use std::path::PathBuf;
    use std::sync::Arc;
    use url::Url;

    fn config() -> CacheConfig {
        CacheConfig {
            settings: CacheSettings {
                log_level: "warn".to_string(),
                local_port: 9001,
                cache_dir: PathBuf::from("/tmp/cache"),
                max_cache_size: "1g".to_string(),
                inactive_duration: "15m".to_string(),
                frontends: vec![Frontend::plain("8080")],
            },
            upstreams: vec![
                Upstream {
                    name: "cdn.example.com".to_string(),
                    hosts: vec!["cdn.example.com:443".to_string()],
                    repo: true,
                },
                Upstream {
                    name: "cdn.example.com".to_string(),
                    hosts: vec!["cdn.example.com:443".to_string()],
                    repo: true,
                },
            ],
            repo_proxies: vec![RepoProxy {
                repo_id: "rhel".to_string(),
                url: Url::parse("https://cdn.example.com/content/rhel/").unwrap(),
                upstream: "cdn.example.com".to_string(),
                tls: true,
                certificate_path: Some(PathBuf::from("/etc/pki/c.pem")),
                key_path: Some(PathBuf::from("/etc/pki/k.pem")),
                verify_tls: true,
                auth_header: Some("Basic YTpi".to_string()),
            }],
            reachability: Arc::new(ReachabilityMap::new()),
        }
    }

    #[test]
    fn test_render_contains_upstream_and_location() {
        let rendered = NginxTemplate.render(&config()).unwrap();

        assert_eq!(rendered.matches("upstream cdn.example.com {").count(), 1);
        assert!(rendered.contains("server cdn.example.com:443;"));
        assert!(rendered.contains("location /rhel/ {"));
        assert!(rendered.contains("proxy_pass https://cdn.example.com/content/rhel/;"));
        assert!(rendered.contains("proxy_ssl_name cdn.example.com;"));
        assert!(rendered.contains("proxy_ssl_certificate /etc/pki/c.pem;"));
        assert!(rendered.contains("proxy_set_header Authorization \"Basic YTpi\";"));
        assert!(rendered.contains("max_size=1g inactive=15m"));
        assert!(rendered.contains("proxy_pass http://127.0.0.1:9001;"));
        assert!(rendered.contains("listen 8080;"));
    }

    #[test]
    fn test_tls_frontend_and_disabled_local_port() {
        let mut config = config();
        config.settings.local_port = 0;
        config.settings.frontends = vec![Frontend {
            listen: "443".to_string(),
            certificate_path: Some(PathBuf::from("/tls/crt")),
            key_path: Some(PathBuf::from("/tls/key")),
        }];

        let rendered = NginxTemplate.render(&config).unwrap();

        assert!(rendered.contains("listen 443 ssl;"));
        assert!(rendered.contains("ssl_certificate_key /tls/key;"));
        assert!(!rendered.contains("127.0.0.1"));
    }
}
