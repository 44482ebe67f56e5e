use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    /// Application root; relative watch paths and the PID directory resolve
    /// against it.
    pub root: PathBuf,
    pub pid_dir: PathBuf,
    pub reload: Option<ReloadConfig>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            pid_dir: PathBuf::from("pids"),
            reload: None,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ReloadConfig {
    pub paths: Vec<String>,
    #[serde(default = "default_signal")]
    pub signal: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_signal() -> String {
    "SIGTERM".to_string()
}

fn default_interval_ms() -> u64 {
    100
}

impl GlobalConfig {
    /// Load from `$HERD_CONFIG` or `config/herd.toml`. A missing file means
    /// defaults; a file that exists but does not parse is an error.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("HERD_CONFIG").unwrap_or_else(|_| "config/herd.toml".to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let cfg = toml::from_str(&s)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(cfg)
    }
}
