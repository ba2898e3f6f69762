//! Launches the proxy binary and relays reload/restart requests to it.

use std::ffi::OsString;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::broadcast;

use crate::error::{MirrorError, Result};
use crate::reload::{Reloader, Restarter};

/// Keeps one instance of the proxy process running.
pub struct ProcessSupervisor {
    program: OsString,
    args: Vec<OsString>,
    relaunch_delay: Duration,
    /// Pid of the running child, 0 when none.
    pid: AtomicU32,
}

impl ProcessSupervisor {
    pub fn new(
        program: impl Into<OsString>,
        args: impl IntoIterator<Item = impl Into<OsString>>,
        relaunch_delay: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            relaunch_delay,
            pid: AtomicU32::new(0),
        }
    }

    /// Supervisor for `nginx -c <config_path>`. The generated configuration
    /// keeps nginx in the foreground.
    pub fn nginx(binary: &Path, config_path: &Path, relaunch_delay: Duration) -> Self {
        Self::new(
            binary.as_os_str(),
            [OsString::from("-c"), config_path.as_os_str().to_owned()],
            relaunch_delay,
        )
    }

    pub fn is_running(&self) -> bool {
        self.pid.load(Ordering::SeqCst) != 0
    }

    /// Run the process until shutdown, relaunching it whenever it exits.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        loop {
            match Command::new(&self.program)
                .args(&self.args)
                .kill_on_drop(true)
                .spawn()
            {
                Ok(mut child) => {
                    let pid = child.id().unwrap_or(0);
                    self.pid.store(pid, Ordering::SeqCst);
                    tracing::info!(pid, program = ?self.program, "Proxy process started");

                    tokio::select! {
                        status = child.wait() => {
                            self.pid.store(0, Ordering::SeqCst);
                            match status {
                                Ok(status) => tracing::warn!(pid, status = %status, "Proxy process exited"),
                                Err(e) => tracing::error!(pid, error = %e, "Failed to wait for proxy process"),
                            }
                        }
                        _ = shutdown.recv() => {
                            self.pid.store(0, Ordering::SeqCst);
                            let _ = child.kill().await;
                            tracing::info!(pid, "Proxy process stopped");
                            return;
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(program = ?self.program, error = %e, "Failed to start proxy process");
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.relaunch_delay) => {}
                _ = shutdown.recv() => return,
            }
        }
    }

    #[cfg(unix)]
    fn signal(&self, signal: libc::c_int) -> std::io::Result<()> {
        let pid = self.pid.load(Ordering::SeqCst);
        if pid == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "proxy process is not running",
            ));
        }
        // SAFETY: kill(2) has no memory-safety preconditions.
        if unsafe { libc::kill(pid as libc::pid_t, signal) } == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

#[cfg(unix)]
#[async_trait]
impl Reloader for ProcessSupervisor {
    async fn reload(&self) -> Result<()> {
        self.signal(libc::SIGHUP)
            .map_err(|e| MirrorError::Reload(e.to_string()))?;
        tracing::info!("Proxy process reload requested");
        Ok(())
    }
}

#[cfg(unix)]
#[async_trait]
impl Restarter for ProcessSupervisor {
    async fn restart(&self) -> Result<()> {
        self.signal(libc::SIGTERM)
            .map_err(|e| MirrorError::Reload(e.to_string()))?;
        tracing::warn!("Proxy process restart requested");
        Ok(())
    }
}

#[cfg(not(unix))]
#[async_trait]
impl Reloader for ProcessSupervisor {
    async fn reload(&self) -> Result<()> {
        Err(MirrorError::Reload("signals are only supported on unix".to_string()))
    }
}

#[cfg(not(unix))]
#[async_trait]
impl Restarter for ProcessSupervisor {
    async fn restart(&self) -> Result<()> {
        Err(MirrorError::Reload("signals are only supported on unix".to_string()))
    }
}
