use matchcity_core::storage::LocalStore;

use crate::app::AppContext;
use crate::cli::CheckArgs;
use crate::errors::CliError;
use crate::output::print_integrity;

pub fn handle_check(ctx: &AppContext, args: &CheckArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let report = store.check_integrity()?;
    print_integrity(&report, args.json, ctx.quiet())?;
    if !report.is_ok() {
        return Err(CliError::integrity_failed("Integrity check failed").into());
    }
    Ok(())
}

pub fn handle_reset(ctx: &AppContext) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    store.reset()?;
    if !ctx.quiet() {
        println!("Store reset: all tables dropped and recreated");
    }
    Ok(())
}
