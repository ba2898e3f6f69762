//! Filesystem watcher feeding the change coalescer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches definition files and directories and forwards relevant changes.
pub struct DefinitionWatcher {
    paths: Vec<PathBuf>,
    events_tx: mpsc::UnboundedSender<PathBuf>,
}

impl DefinitionWatcher {
    /// Create a new watcher.
    ///
    /// Returns the watcher and the receiving end of its change queue.
    /// Relative paths are resolved against the current directory, since
    /// notify reports absolute paths.
    pub fn new(paths: &[PathBuf]) -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        (
            Self {
                paths: paths.iter().map(|p| absolute_path(p)).collect(),
                events_tx,
            },
            events_rx,
        )
    }

    /// Start watching in notify's background thread.
    ///
    /// The returned handle must be kept alive for events to keep flowing.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.events_tx.clone();
        let watched = self.paths.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove()) {
                        return;
                    }
                    for path in event.paths {
                        if watched.iter().any(|w| is_relevant(w, &path)) {
                            let _ = tx.send(path);
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        for path in &self.paths {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
        }

        tracing::info!(paths = ?self.paths, "Definition watcher started");
        Ok(watcher)
    }
}

fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    match std::env::current_dir() {
        Ok(cwd) if path.is_relative() => cwd.join(path),
        _ => path.to_path_buf(),
    }
}

/// Directories only care about `*.repo` entries, so a generated file
/// written next to them does not trigger another reload.
fn is_relevant(watched: &Path, changed: &Path) -> bool {
    if watched.is_dir() {
        changed.parent() == Some(watched) && changed.extension().is_some_and(|ext| ext == "repo")
    } else {
        changed == watched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_only_forwards_repo_files() {
        let dir = tempfile::TempDir::new().unwrap();

        assert!(is_relevant(dir.path(), &dir.path().join("epel.repo")));
        assert!(!is_relevant(dir.path(), &dir.path().join("nginx.conf")));
        assert!(!is_relevant(dir.path(), &dir.path().join("sub/epel.repo")));
    }

    #[test]
    fn test_file_forwards_itself() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("mirror.repo");
        std::fs::write(&file, "").unwrap();

        let elsewhere = tempfile::TempDir::new().unwrap();

        assert!(is_relevant(&file, &file));
        assert!(!is_relevant(&file, &dir.path().join("other.repo")));
        assert!(!is_relevant(&file, &elsewhere.path().join("mirror.repo")));
    }

    #[test]
    fn test_relative_paths_are_resolved() {
        let cwd = std::env::current_dir().unwrap();
        let dir = tempfile::Builder::new().prefix("watch-rel").tempdir_in(".").unwrap();
        let relative = PathBuf::from(dir.path().file_name().unwrap());

        let (watcher, _rx) = DefinitionWatcher::new(&[relative, PathBuf::from(".")]);

        assert!(watcher.paths.iter().all(|p| p.is_absolute()));
        let canonical = std::fs::canonicalize(dir.path()).unwrap();
        assert!(is_relevant(&watcher.paths[0], &canonical.join("epel.repo")));
        assert!(is_relevant(&watcher.paths[1], &std::fs::canonicalize(&cwd).unwrap().join("epel.repo")));
    }

    #[tokio::test]
    async fn test_relative_directory_events_reach_queue() {
        let dir = tempfile::Builder::new().prefix("watch-rel").tempdir_in(".").unwrap();
        let relative = PathBuf::from(dir.path().file_name().unwrap());
        let (watcher, mut rx) = DefinitionWatcher::new(&[relative.clone()]);
        let _handle = watcher.run().unwrap();

        std::fs::write(relative.join("new.repo"), "[a]\n").unwrap();

        let path = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no change event")
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "new.repo");
    }

    #[tokio::test]
    async fn test_events_reach_queue() {
        let dir = tempfile::TempDir::new().unwrap();
        let (watcher, mut rx) = DefinitionWatcher::new(&[dir.path().to_path_buf()]);
        let _handle = watcher.run().unwrap();

        std::fs::write(dir.path().join("new.repo"), "[a]\n").unwrap();

        let path = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("no change event")
            .unwrap();
        assert_eq!(path.extension().unwrap(), "repo");
    }
}
