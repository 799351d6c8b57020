//! Application context for the matchcity CLI.
//!
//! Bundles the parsed arguments with a lazily loaded config file so each
//! command resolves paths the same way.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use matchcity_core::{HttpFeedSource, SqliteStore, SyncJob};

use crate::cli::Cli;
use crate::config::{default_config_path, read_config, MatchCityConfig};
use crate::errors::CliError;

pub struct AppContext<'a> {
    cli: &'a Cli,
    config: OnceCell<MatchCityConfig>,
}

impl<'a> AppContext<'a> {
    pub fn new(cli: &'a Cli) -> Self {
        Self {
            cli,
            config: OnceCell::new(),
        }
    }

    pub fn cli(&self) -> &Cli {
        self.cli
    }

    pub fn quiet(&self) -> bool {
        self.cli.quiet
    }

    /// Config file path: `--config` / `MATCHCITY_CONFIG`, else the XDG default.
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.cli.config {
            Some(path) => Ok(path.clone()),
            None => default_config_path(),
        }
    }

    /// Load the config file once.
    pub fn config(&self) -> anyhow::Result<&MatchCityConfig> {
        self.config.get_or_try_init(|| {
            let path = self.config_path()?;
            if !path.exists() {
                return Err(missing_config(&path).into());
            }
            read_config(&path)
        })
    }

    /// Store path: `--store` / `MATCHCITY_STORE`, else the config file.
    pub fn store_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.cli.store {
            return Ok(path.clone());
        }
        Ok(PathBuf::from(&self.config()?.store.path))
    }

    pub fn open_store(&self) -> anyhow::Result<SqliteStore> {
        let path = self.store_path()?;
        SqliteStore::open(&path)
            .map_err(|e| anyhow::anyhow!("Failed to open store {}: {}", path.display(), e))
    }

    /// Build a sync job over the configured feeds and the resolved store.
    pub fn sync_job(&self) -> anyhow::Result<SyncJob<HttpFeedSource, SqliteStore>> {
        let config = self.config()?;
        let store = Arc::new(self.open_store()?);
        let source = HttpFeedSource::new(config.sync.request_timeout())?;
        Ok(SyncJob::new(source, store, config.feeds.clone()))
    }
}

fn missing_config(path: &Path) -> CliError {
    CliError::not_found(
        format!("No config found at {}", path.display()),
        "Run:\n  matchcity init --venues-url URL --activities-url URL --sub-activities-url URL\n\nOr point at an existing config:\n  MATCHCITY_CONFIG=/path/to/config.toml matchcity sync",
    )
}
