use matchcity_core::{FeedEndpoints, SqliteStore};

use crate::app::AppContext;
use crate::cli::InitArgs;
use crate::config::{default_store_path, write_config, MatchCityConfig, MAX_REFRESH_MINUTES};

pub fn handle_init(ctx: &AppContext, args: &InitArgs) -> anyhow::Result<()> {
    let feeds = FeedEndpoints {
        venues_url: args.venues_url.clone(),
        activities_url: args.activities_url.clone(),
        sub_activities_url: args.sub_activities_url.clone(),
    };
    feeds.validate()?;
    if let Some(minutes) = args.refresh_minutes.filter(|m| *m > MAX_REFRESH_MINUTES) {
        return Err(anyhow::anyhow!(
            "--refresh-minutes {} is above the maximum of {}",
            minutes,
            MAX_REFRESH_MINUTES
        ));
    }

    let config_path = ctx.config_path()?;
    if config_path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}\n\nUse --force to overwrite it.",
            config_path.display()
        ));
    }

    let store_path = match ctx.cli().store.clone() {
        Some(path) => path,
        None => default_store_path()?,
    };
    let store = SqliteStore::open(&store_path)
        .map_err(|e| anyhow::anyhow!("Failed to create store {}: {}", store_path.display(), e))?;
    let config = MatchCityConfig::new(store_path, feeds, args.refresh_minutes);
    write_config(&config_path, &config)?;

    let schema_version = store.schema_version()?;
    tracing::info!(
        config = %config_path.display(),
        schema_version,
        "Initialized store"
    );
    if !ctx.quiet() {
        println!("Initialized store at {}", config.store.path);
        println!("Wrote config to {}", config_path.display());
    }
    Ok(())
}
