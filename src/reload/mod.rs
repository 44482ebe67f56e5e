//! Live-reload watcher. Input paths are expanded once into a flat watch set
//! (directories recurse, depth unbounded; files added later are not picked
//! up), then a single interval task re-stats every watched file and asks the
//! master to restart when a modification time advances. One restart call per
//! changed file per tick; near-simultaneous changes are not coalesced.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Result};
use tokio::task::JoinHandle;

use crate::master::MasterHandle;
use crate::signals;

#[derive(Debug, Clone)]
pub struct ReloadOptions {
    /// Signal name handed to the master's restart capability on change.
    pub signal: String,
    /// Polling period for the whole watch set.
    pub interval: Duration,
}

impl Default for ReloadOptions {
    fn default() -> Self {
        Self {
            signal: "SIGTERM".to_string(),
            interval: Duration::from_millis(100),
        }
    }
}

struct WatchDescriptor {
    path: PathBuf,
    last_mtime: SystemTime,
}

impl WatchDescriptor {
    fn new(path: PathBuf, meta: &std::fs::Metadata) -> Self {
        Self {
            path,
            last_mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

pub struct ReloadWatcher {
    paths: Vec<PathBuf>,
    options: ReloadOptions,
}

impl ReloadWatcher {
    /// At least one path is required; the signal name is validated here so a
    /// config typo fails at startup, not on the first change.
    pub fn new(paths: Vec<PathBuf>, options: ReloadOptions) -> Result<Self> {
        if paths.is_empty() {
            bail!("reload watcher requires at least one path");
        }
        signals::validate(&options.signal)?;
        Ok(Self { paths, options })
    }

    /// Convenience for the common single-path case.
    pub fn single(path: impl Into<PathBuf>, options: ReloadOptions) -> Result<Self> {
        Self::new(vec![path.into()], options)
    }

    /// Expand the configured paths against the master's root and start the
    /// polling task. Paths that do not exist are skipped, not errors.
    pub async fn install(self, master: Arc<dyn MasterHandle>) -> InstalledWatch {
        let mut watches: Vec<WatchDescriptor> = Vec::new();
        for path in &self.paths {
            let resolved = master.resolve(path);
            match expand(&resolved).await {
                Ok(found) => watches.extend(found),
                Err(e) => tracing::debug!("not watching {}: {}", resolved.display(), e),
            }
        }

        let files: Vec<PathBuf> = watches.iter().map(|w| w.path.clone()).collect();
        tracing::info!(
            "watching {} files (signal {}, every {:?})",
            files.len(),
            self.options.signal,
            self.options.interval
        );

        let ReloadOptions { signal, interval } = self.options;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick of a tokio interval completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                for watch in &mut watches {
                    let meta = match tokio::fs::metadata(&watch.path).await {
                        Ok(meta) => meta,
                        // file vanished or unreadable this tick; try again next tick
                        Err(_) => continue,
                    };
                    let mtime = meta.modified().unwrap_or(watch.last_mtime);
                    if mtime > watch.last_mtime {
                        tracing::info!("changed - {}", watch.path.display());
                        if let Err(e) = master.restart(&signal) {
                            tracing::error!("restart({}) failed: {}", signal, e);
                        }
                    }
                    // track every observed mtime, not just increases: after a
                    // backdate, the next forward move must fire even if it
                    // stays below the old high-water mark
                    watch.last_mtime = mtime;
                }
            }
        });

        InstalledWatch { files, task }
    }
}

/// A running watch. Holds the poller task for the process lifetime; there is
/// no unwatch path.
pub struct InstalledWatch {
    files: Vec<PathBuf>,
    task: JoinHandle<()>,
}

impl InstalledWatch {
    /// The fully expanded watch set.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

impl Drop for InstalledWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One-shot recursive expansion of a single root into watch descriptors,
/// seeding each descriptor's mtime from the expansion-time stat. A root that
/// cannot be stat'd is an `Err` for the caller to discard; stat or list
/// failures below the root (permissions, files racing away) skip just that
/// entry.
async fn expand(root: &Path) -> std::io::Result<Vec<WatchDescriptor>> {
    let meta = tokio::fs::metadata(root).await?;

    let mut files = Vec::new();
    let mut dirs = VecDeque::new();
    if meta.is_dir() {
        dirs.push_back(root.to_path_buf());
    } else {
        files.push(WatchDescriptor::new(root.to_path_buf(), &meta));
    }

    while let Some(dir) = dirs.pop_front() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let meta = match tokio::fs::metadata(&path).await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            if meta.is_dir() {
                dirs.push_back(path);
            } else {
                files.push(WatchDescriptor::new(path, &meta));
            }
        }
    }

    Ok(files)
}
