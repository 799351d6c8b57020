use std::sync::Arc;

use tracing::{info, warn};

use matchcity_core::PeriodicSync;

use crate::app::AppContext;
use crate::cli::SyncArgs;
use crate::output::print_sync_report;

pub async fn handle_sync(ctx: &AppContext<'_>, args: &SyncArgs) -> anyhow::Result<()> {
    let job = ctx.sync_job()?;
    let report = job.refresh().await?;
    print_sync_report(&report, args.json, ctx.quiet())
}

pub async fn handle_run(ctx: &AppContext<'_>) -> anyhow::Result<()> {
    let minutes = ctx.config()?.sync.refresh_frequency_minutes;
    let job = Arc::new(ctx.sync_job()?);
    let runner = PeriodicSync::from_minutes(job, minutes);

    let cycles = runner
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "Failed to listen for Ctrl-C, stopping");
            }
        })
        .await;

    info!(cycles, "Stopped");
    if !ctx.quiet() {
        println!("Ran {} sync cycle(s)", cycles);
    }
    Ok(())
}
