//! Minimal INI reader for yum/dnf style `.repo` files.
//!
//! Supports `[section]` headers, `key = value` and `key: value` pairs,
//! `#`/`;` comment lines and indented continuation lines. Keys that appear
//! before the first header land in an unnamed section.

use std::path::Path;

use crate::error::{MirrorError, Result};

/// One `[name]` block and its key/value pairs in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    line: usize,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            line,
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Line of the section header (0 for the unnamed section).
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    fn set(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

/// `key = value` or `key: value`, but not a `scheme://` URL.
fn is_assignment(line: &str) -> bool {
    let Some(split) = line.find(['=', ':']) else {
        return false;
    };
    let key = line[..split].trim();
    let is_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    is_key && !line[split..].starts_with("://")
}

/// Parse `content`, attributing errors to `path`.
///
/// Indented lines continue the previous value unless they are a section
/// header or an assignment themselves.
pub fn parse(path: &Path, content: &str) -> Result<Vec<Section>> {
    let mut sections = vec![Section::new("", 0)];
    let mut last_key: Option<String> = None;

    for (idx, raw) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        let last = sections.len() - 1;
        let current = &mut sections[last];

        if raw.starts_with([' ', '\t']) && !trimmed.starts_with('[') && !is_assignment(trimmed) {
            if let Some(key) = &last_key {
                let previous = current.get(key).unwrap_or_default().to_string();
                let joined = if previous.is_empty() {
                    trimmed.to_string()
                } else {
                    format!("{} {}", previous, trimmed)
                };
                current.set(key.clone(), joined);
                continue;
            }
        }

        if let Some(rest) = trimmed.strip_prefix('[') {
            let name = rest.strip_suffix(']').ok_or_else(|| MirrorError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                message: format!("unterminated section header: {}", trimmed),
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(MirrorError::Parse {
                    path: path.to_path_buf(),
                    line: line_no,
                    message: "empty section name".to_string(),
                });
            }
            sections.push(Section::new(name, line_no));
            last_key = None;
            continue;
        }

        let split = trimmed.find(['=', ':']).ok_or_else(|| MirrorError::Parse {
            path: path.to_path_buf(),
            line: line_no,
            message: format!("expected key = value, got: {}", trimmed),
        })?;
        let key = trimmed[..split].trim();
        if key.is_empty() {
            return Err(MirrorError::Parse {
                path: path.to_path_buf(),
                line: line_no,
                message: "missing key".to_string(),
            });
        }
        let value = trimmed[split + 1..].trim();
        current.set(key.to_string(), value.to_string());
        last_key = Some(key.to_string());
    }

    Ok(sections)
}
