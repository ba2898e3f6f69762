//! Translation of `.repo` definitions into upstreams and repo proxies.

use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use url::{Host, Url};

use crate::error::{MirrorError, Result};
use crate::generator::model::{RepoProxy, Upstream};
use crate::repo::ini::{self, Section};

const BASEURL_KEY: &str = "baseurl";
const USERNAME_FILE_KEY: &str = "username_file";
const PASSWORD_FILE_KEY: &str = "password_file";

/// The keys of one repository section this crate understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSection {
    pub id: String,
    pub base_url: String,
    pub enabled: bool,
    pub ssl_verify: bool,
    pub ssl_client_key: Option<String>,
    pub ssl_client_cert: Option<String>,
}

impl RepoSection {
    fn from_section(path: &Path, section: &Section) -> Result<Self> {
        let flag = |key: &str, default: bool| -> Result<bool> {
            match section.get(key) {
                None => Ok(default),
                Some(raw) => parse_flag(raw).ok_or_else(|| MirrorError::Parse {
                    path: path.to_path_buf(),
                    line: section.line(),
                    message: format!("section {}: {} is not a boolean: {}", section.name(), key, raw),
                }),
            }
        };
        let non_empty = |key: &str| {
            section
                .get(key)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if !is_repo_id(section.name()) {
            return Err(MirrorError::Parse {
                path: path.to_path_buf(),
                line: section.line(),
                message: format!(
                    "section {:?}: repository ids may only contain letters, digits and -_.:@+",
                    section.name()
                ),
            });
        }

        Ok(Self {
            id: section.name().to_string(),
            base_url: section.get(BASEURL_KEY).unwrap_or_default().to_string(),
            enabled: flag("enabled", true)?,
            ssl_verify: flag("sslverify", true)?,
            ssl_client_key: non_empty("sslclientkey"),
            ssl_client_cert: non_empty("sslclientcert"),
        })
    }
}

/// Load a single definition file.
///
/// Any structural error aborts the whole file. Base URLs whose path differs
/// from the first one are dropped with a warning.
pub fn load_rpm_repo_upstreams(path: &Path) -> Result<(Vec<Upstream>, Vec<RepoProxy>)> {
    let content = fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
    let mut upstreams = Vec::new();
    let mut repo_proxies = Vec::new();

    for mut section in ini::parse(path, &content)? {
        if !section.has_key(BASEURL_KEY) {
            continue;
        }
        let credentials = take_credentials(path, &mut section)?;

        let repo = RepoSection::from_section(path, &section)?;
        if !repo.enabled {
            tracing::debug!(path = ?path, repo = %repo.id, "Skipping disabled repository");
            continue;
        }

        let urls = parse_base_urls(path, &repo)?;
        let canonical_path = urls[0].path().to_string();
        let mut hosts = Vec::with_capacity(urls.len());
        for url in urls.iter().filter(|u| u.path() == canonical_path) {
            hosts.push(host_port(url));
        }
        if hosts.is_empty() {
            return Err(MirrorError::InconsistentBaseUrl {
                path: path.to_path_buf(),
                section: repo.id,
                canonical_path,
            });
        }
        if hosts.len() != urls.len() {
            tracing::warn!(
                path = ?path,
                repo = %repo.id,
                canonical_path = %canonical_path,
                omitted = urls.len() - hosts.len(),
                "One or more baseurls were omitted because they don't have a consistent path"
            );
        }

        let name = upstream_name(path, &repo.id, &urls[0])?;
        let mut proxy_url = urls[0].clone();
        // Url::set_port only fails for cannot-be-a-base URLs, rejected above.
        let _ = proxy_url.set_port(None);

        let mut repo_proxy = RepoProxy {
            repo_id: repo.id.clone(),
            url: proxy_url,
            upstream: name.clone(),
            tls: false,
            certificate_path: None,
            key_path: None,
            verify_tls: repo.ssl_verify,
            auth_header: None,
        };

        match (&repo.ssl_client_cert, &repo.ssl_client_key) {
            (Some(cert), Some(key)) => {
                repo_proxy.tls = true;
                repo_proxy.certificate_path = Some(relative_to_file(path, cert));
                repo_proxy.key_path = Some(relative_to_file(path, key));
            }
            (None, None) => {}
            _ => {
                return Err(MirrorError::TlsConfig {
                    repo: repo.id,
                    message: "sslclientcert and sslclientkey must both be specified".to_string(),
                });
            }
        }

        if let Some(user_pass) = credentials {
            repo_proxy.auth_header = Some(format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(user_pass)
            ));
        }

        upstreams.push(Upstream {
            name,
            hosts,
            repo: true,
        });
        repo_proxies.push(repo_proxy);
    }

    Ok((upstreams, repo_proxies))
}

/// Expand watched paths into definition files.
///
/// Directories contribute every `*.repo` file directly inside them, sorted
/// by name. Plain files are used as given.
pub fn definition_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        let metadata = fs::metadata(path).map_err(|e| MirrorError::io(path, e))?;
        if !metadata.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| MirrorError::io(path, e))? {
            let entry = entry.map_err(|e| MirrorError::io(path, e))?;
            let candidate = entry.path();
            if candidate.is_file() && candidate.extension().is_some_and(|ext| ext == "repo") {
                found.push(candidate);
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

/// Read `username_file`/`password_file` and drop both keys from the section.
fn take_credentials(path: &Path, section: &mut Section) -> Result<Option<String>> {
    let has_user = section.has_key(USERNAME_FILE_KEY);
    let has_pass = section.has_key(PASSWORD_FILE_KEY);
    if !has_user && !has_pass {
        return Ok(None);
    }

    let auth_error = |message: String| MirrorError::AuthConfig {
        path: path.to_path_buf(),
        section: section.name().to_string(),
        message,
    };
    if !(has_user && has_pass) {
        return Err(auth_error(format!(
            "{} and {} must both be specified",
            USERNAME_FILE_KEY, PASSWORD_FILE_KEY
        )));
    }

    let read = |key: &str| -> Result<String> {
        let file = relative_to_file(path, section.get(key).unwrap_or_default());
        fs::read_to_string(&file)
            .map(|s| s.trim().to_string())
            .map_err(|e| auth_error(format!("unable to read {}: {}", key, e)))
    };
    let username = read(USERNAME_FILE_KEY)?;
    let password = read(PASSWORD_FILE_KEY)?;

    section.remove(USERNAME_FILE_KEY);
    section.remove(PASSWORD_FILE_KEY);
    Ok(Some(format!("{}:{}", username, password)))
}

fn parse_base_urls(path: &Path, repo: &RepoSection) -> Result<Vec<Url>> {
    let url_error = |message: String| MirrorError::Url {
        path: path.to_path_buf(),
        section: repo.id.clone(),
        message,
    };

    let mut urls = Vec::new();
    for raw in repo.base_url.split_whitespace() {
        let mut url = Url::parse(raw).map_err(|e| url_error(format!("{}: {}", raw, e)))?;
        if url.cannot_be_a_base() || url.host().is_none() {
            return Err(url_error(format!("{}: missing host", raw)));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        urls.push(url);
    }

    if urls.is_empty() {
        return Err(url_error("no baseurls".to_string()));
    }
    Ok(urls)
}

/// `host[:port]` as written in an upstream block. HTTPS always carries a port.
fn host_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match (url.scheme(), url.port()) {
        (_, Some(port)) => format!("{}:{}", host, port),
        ("https", None) => format!("{}:443", host),
        _ => host.to_string(),
    }
}

fn upstream_name(path: &Path, repo_id: &str, url: &Url) -> Result<String> {
    match url.host() {
        Some(Host::Domain(domain)) if is_hostname(domain) => Ok(domain.to_string()),
        Some(Host::Ipv4(addr)) => Ok(addr.to_string()),
        _ => Err(MirrorError::Url {
            path: path.to_path_buf(),
            section: repo_id.to_string(),
            message: format!("{} does not name a valid upstream host", url),
        }),
    }
}

fn is_hostname(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

/// Ids end up in nginx `location` paths and served URLs.
fn is_repo_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '@' | '+'))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => other.parse::<i64>().ok().map(|v| v != 0),
    }
}

fn relative_to_file(file: &Path, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match file.parent() {
        Some(dir) => dir.join(target),
        None => target.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn is_basic_header(header: &str) -> bool {
        header
            .strip_prefix("Basic ")
            .is_some_and(|rest| {
                !rest.is_empty()
                    && rest
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
            })
    }

    #[test]
    fn test_enabled_sections_yield_one_upstream_and_proxy_each() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "el.repo",
            "[main]\nname = x\n\n\
             [base]\nbaseurl = http://mirror.example.com/base\n\n\
             [updates]\nbaseurl = https://cdn.example.com/updates/\nenabled = 1\n\n\
             [debug]\nbaseurl = https://cdn.example.com/debug/\nenabled = 0\n",
        );

        let (upstreams, proxies) = load_rpm_repo_upstreams(&path).unwrap();

        assert_eq!(upstreams.len(), 2);
        assert_eq!(proxies.len(), 2);
        assert!(proxies.iter().all(|p| p.path().ends_with('/')));
        assert!(upstreams.iter().all(|u| !u.hosts.is_empty() && u.repo));
        assert_eq!(proxies[0].repo_id, "base");
        assert_eq!(proxies[0].url.as_str(), "http://mirror.example.com/base/");
        assert_eq!(upstreams[0].hosts, vec!["mirror.example.com"]);
        assert_eq!(upstreams[1].hosts, vec!["cdn.example.com:443"]);
        assert_eq!(proxies[1].upstream, "cdn.example.com");
        assert!(proxies.iter().all(|p| p.auth_header.is_none()));
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "a.repo",
            "[a]\nbaseurl = https://h1.example.com/p https://h2.example.com:8443/p/\n",
        );

        assert_eq!(
            load_rpm_repo_upstreams(&path).unwrap(),
            load_rpm_repo_upstreams(&path).unwrap()
        );
    }

    #[test]
    fn test_same_path_different_ports_keeps_order() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "a.repo",
            "[a]\nbaseurl = https://repo.example.com:8443/rhel/ https://repo.example.com:9443/rhel/\n",
        );

        let (upstreams, proxies) = load_rpm_repo_upstreams(&path).unwrap();

        assert_eq!(
            upstreams[0].hosts,
            vec!["repo.example.com:8443", "repo.example.com:9443"]
        );
        assert_eq!(upstreams[0].name, "repo.example.com");
        assert_eq!(proxies[0].url.as_str(), "https://repo.example.com/rhel/");
    }

    #[test]
    fn test_differing_path_is_dropped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "a.repo",
            "[a]\nbaseurl = http://one.example.com/x/ http://two.example.com/y/\n",
        );

        let (upstreams, proxies) = load_rpm_repo_upstreams(&path).unwrap();

        assert_eq!(upstreams[0].hosts, vec!["one.example.com"]);
        assert_eq!(proxies[0].path(), "/x/");
    }

    #[test]
    fn test_only_username_file_is_auth_error() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "user", "alice\n");
        let path = write_file(
            &dir,
            "a.repo",
            "[a]\nbaseurl = http://h.example.com/x/\nusername_file = user\n",
        );

        let err = load_rpm_repo_upstreams(&path).unwrap_err();
        assert!(matches!(err, MirrorError::AuthConfig { .. }), "{err}");
    }

    #[test]
    fn test_credentials_become_basic_header() {
        let dir = TempDir::new().unwrap();
        let user = write_file(&dir, "user", "  alice\n");
        write_file(&dir, "pass", "s3cret\n");
        let path = write_file(
            &dir,
            "a.repo",
            &format!(
                "[a]\nbaseurl = http://h.example.com/x/\nusername_file = {}\npassword_file = pass\n",
                user.display()
            ),
        );

        let (_, proxies) = load_rpm_repo_upstreams(&path).unwrap();
        let header = proxies[0].auth_header.as_deref().unwrap();

        assert!(is_basic_header(header));
        assert_eq!(header, "Basic YWxpY2U6czNjcmV0");
    }

    #[test]
    fn test_unreadable_credentials_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "a.repo",
            "[a]\nbaseurl = http://h.example.com/x/\nusername_file = nope\npassword_file = nope\n",
        );

        let err = load_rpm_repo_upstreams(&path).unwrap_err();
        assert!(matches!(err, MirrorError::AuthConfig { .. }));
    }

    #[test]
    fn test_url_errors() {
        let dir = TempDir::new().unwrap();
        let empty = write_file(&dir, "empty.repo", "[a]\nbaseurl =\n");
        let relative = write_file(&dir, "rel.repo", "[a]\nbaseurl = /just/a/path\n");

        assert!(matches!(
            load_rpm_repo_upstreams(&empty).unwrap_err(),
            MirrorError::Url { .. }
        ));
        assert!(matches!(
            load_rpm_repo_upstreams(&relative).unwrap_err(),
            MirrorError::Url { .. }
        ));
    }

    #[test]
    fn test_unsafe_repo_ids_are_parse_errors() {
        let dir = TempDir::new().unwrap();
        let spaced = write_file(&dir, "spaced.repo", "[my repo]\nbaseurl = http://h.example.com/x/\n");
        let injected = write_file(&dir, "inj.repo", "\n[a;b]\nbaseurl = http://h.example.com/x/\n");
        let fine = write_file(&dir, "ok.repo", "[epel-8_x86.64]\nbaseurl = http://h.example.com/x/\n");

        assert!(matches!(
            load_rpm_repo_upstreams(&spaced).unwrap_err(),
            MirrorError::Parse { line: 1, .. }
        ));
        assert!(matches!(
            load_rpm_repo_upstreams(&injected).unwrap_err(),
            MirrorError::Parse { line: 2, .. }
        ));
        assert_eq!(load_rpm_repo_upstreams(&fine).unwrap().1[0].repo_id, "epel-8_x86.64");
    }

    #[test]
    fn test_error_aborts_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "a.repo",
            "[good]\nbaseurl = http://h.example.com/x/\n[bad]\nbaseurl = ::::\n",
        );

        assert!(load_rpm_repo_upstreams(&path).is_err());
    }

    #[test]
    fn test_client_cert_resolved_relative_to_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "a.repo",
            "[a]\nbaseurl = https://h.example.com/x/\nsslclientcert = certs/c.pem\n\
             sslclientkey = /etc/pki/k.pem\nsslverify = 0\n",
        );

        let (_, proxies) = load_rpm_repo_upstreams(&path).unwrap();
        let proxy = &proxies[0];

        assert!(proxy.tls);
        assert!(!proxy.verify_tls);
        assert_eq!(proxy.certificate_path, Some(dir.path().join("certs/c.pem")));
        assert_eq!(proxy.key_path, Some(PathBuf::from("/etc/pki/k.pem")));
    }

    #[test]
    fn test_cert_without_key_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "a.repo",
            "[a]\nbaseurl = https://h.example.com/x/\nsslclientcert = c.pem\n",
        );

        assert!(matches!(
            load_rpm_repo_upstreams(&path).unwrap_err(),
            MirrorError::TlsConfig { .. }
        ));
    }

    #[test]
    fn test_definition_files_expands_directories() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "b.repo", "");
        write_file(&dir, "a.repo", "");
        write_file(&dir, "notes.txt", "");
        let single = write_file(&dir, "other.conf", "");

        let files = definition_files(&[dir.path().to_path_buf(), single.clone()]).unwrap();

        assert_eq!(
            files,
            vec![dir.path().join("a.repo"), dir.path().join("b.repo"), single]
        );
    }

    #[test]
    fn test_is_hostname() {
        assert!(is_hostname("cdn.redhat.com"));
        assert!(is_hostname("localhost"));
        assert!(!is_hostname("bad_name.example.com"));
        assert!(!is_hostname("-lead.example.com"));
    }
}
