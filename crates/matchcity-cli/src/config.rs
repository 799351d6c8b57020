use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use matchcity_core::fetch::DEFAULT_REQUEST_TIMEOUT;
use matchcity_core::schedule::DEFAULT_REFRESH_MINUTES;
use matchcity_core::FeedEndpoints;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCityConfig {
    pub store: StoreSection,
    pub feeds: FeedEndpoints,
    #[serde(default)]
    pub sync: SyncSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub refresh_frequency_minutes: u64,
    pub request_timeout_seconds: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            refresh_frequency_minutes: DEFAULT_REFRESH_MINUTES,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl SyncSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl MatchCityConfig {
    pub fn new(store_path: PathBuf, feeds: FeedEndpoints, refresh_minutes: Option<u64>) -> Self {
        let mut sync = SyncSection::default();
        if let Some(minutes) = refresh_minutes {
            sync.refresh_frequency_minutes = minutes;
        }
        Self {
            store: StoreSection {
                path: store_path.to_string_lossy().to_string(),
            },
            feeds,
            sync,
        }
    }
}

/// Longest accepted refresh frequency (one week).
pub const MAX_REFRESH_MINUTES: u64 = 7 * 24 * 60;

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_store_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("matchcity.db"))
}

/// Read and validate a config file. Every feed URL must parse as http(s).
pub fn read_config(path: &Path) -> anyhow::Result<MatchCityConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    let config: MatchCityConfig = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))?;
    config
        .feeds
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid feed in config {}: {}", path.display(), e))?;
    if config.sync.refresh_frequency_minutes > MAX_REFRESH_MINUTES {
        return Err(anyhow::anyhow!(
            "Invalid config {}: refresh_frequency_minutes must be at most {}",
            path.display(),
            MAX_REFRESH_MINUTES
        ));
    }
    if config.sync.request_timeout_seconds == 0 {
        return Err(anyhow::anyhow!(
            "Invalid config {}: request_timeout_seconds must be positive",
            path.display()
        ));
    }
    Ok(config)
}

pub fn write_config(path: &Path, config: &MatchCityConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("matchcity"));
        }
    }
    Ok(home_dir()?.join(".config").join("matchcity"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("matchcity"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("matchcity"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}
