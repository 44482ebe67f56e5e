//! The master handle: the capability surface the dispatcher and the reload
//! watcher consume. Both components only read from and command this handle;
//! they never own the cluster's state.

use std::path::{Path, PathBuf};

use crate::pidfiles::{self, PidFileError};
use crate::signals;

pub trait MasterHandle: Send + Sync {
    /// Directory holding one `<role>.pid` file per tracked process, if the
    /// pidfiles capability is installed. `None` means commands cannot run.
    fn pid_dir(&self) -> Option<&Path>;

    /// Resolve a path against the application root.
    fn resolve(&self, path: &Path) -> PathBuf;

    /// Ask the master to restart its workers with the given signal name.
    fn restart(&self, signal: &str) -> anyhow::Result<()>;

    /// The master's own PID as recorded in `<pid_dir>/master.pid`. A missing
    /// or unreadable file means "master not running / stale state" and is an
    /// error for the caller to surface.
    fn master_pid(&self) -> Result<u32, PidFileError> {
        let dir = self.pid_dir().ok_or(PidFileError::NoPidDir)?;
        pidfiles::read_pid(&dir.join("master.pid"))
    }
}

/// Concrete handle for the running daemon. Its restart capability fans the
/// signal out to every worker PID file; respawning the signalled workers is
/// the supervisor's job, not ours.
pub struct ClusterMaster {
    root: PathBuf,
    pid_dir: PathBuf,
}

impl ClusterMaster {
    pub fn new(root: impl Into<PathBuf>, pid_dir: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let pid_dir = pid_dir.into();
        let pid_dir = if pid_dir.is_absolute() {
            pid_dir
        } else {
            root.join(pid_dir)
        };
        Self { root, pid_dir }
    }

    pub fn pid_dir_path(&self) -> &Path {
        &self.pid_dir
    }
}

impl MasterHandle for ClusterMaster {
    fn pid_dir(&self) -> Option<&Path> {
        Some(&self.pid_dir)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn restart(&self, signal: &str) -> anyhow::Result<()> {
        for file in pidfiles::list(&self.pid_dir)? {
            if file.file_name().and_then(|n| n.to_str()) == Some("master.pid") {
                continue;
            }
            let name = pidfiles::display_name(&file);
            let pid = match pidfiles::read_pid(&file) {
                Ok(pid) => pid,
                Err(e) => {
                    tracing::warn!("skipping {}: {}", name, e);
                    continue;
                }
            };
            // a worker that died between listing and signalling is not fatal
            match signals::send(pid, signal) {
                Ok(()) => tracing::info!("sent {} to {} (pid {})", signal, name, pid),
                Err(e) => tracing::warn!("could not signal {} (pid {}): {}", name, pid, e),
            }
        }
        Ok(())
    }
}
