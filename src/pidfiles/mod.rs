//! PID file access. The supervisor writes one `<role>.pid` file per tracked
//! process into the PID directory; this module reads them back and derives
//! operator-facing display names. The write side exists so the daemon can
//! record its own PID. Worker PID files are the supervisor's business.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PidFileError {
    #[error("no PID directory configured on the master handle")]
    NoPidDir,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid PID in {path}: {contents:?}")]
    Parse { path: PathBuf, contents: String },

    #[error("invalid pid glob pattern under {dir}: {source}")]
    Pattern {
        dir: PathBuf,
        #[source]
        source: glob::PatternError,
    },
}

/// Parse a PID file: ASCII decimal, surrounding whitespace ignored.
pub fn read_pid(path: &Path) -> Result<u32, PidFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| PidFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    raw.trim().parse::<u32>().map_err(|_| PidFileError::Parse {
        path: path.to_path_buf(),
        contents: raw.trim().to_string(),
    })
}

/// All `*.pid` files in `dir`, sorted by filename for stable output.
pub fn list(dir: &Path) -> Result<Vec<PathBuf>, PidFileError> {
    let pattern = dir.join("*.pid");
    let paths = glob::glob(&pattern.to_string_lossy()).map_err(|source| PidFileError::Pattern {
        dir: dir.to_path_buf(),
        source,
    })?;
    let mut files: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    files.sort();
    Ok(files)
}

/// Display name for a PID file: extension stripped, `.` separators become
/// spaces (`worker.0.pid` -> `worker 0`).
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .replace('.', " ")
}

/// Record `pid` under `<dir>/<role>.pid`, creating the directory and
/// overwriting any previous file for the role.
pub fn write_pid(dir: &Path, role: &str, pid: u32) -> Result<PathBuf, PidFileError> {
    std::fs::create_dir_all(dir).map_err(|source| PidFileError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(format!("{}.pid", role));
    std::fs::write(&path, pid.to_string()).map_err(|source| PidFileError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
