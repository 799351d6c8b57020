//! matchcity - keeps a local SQLite copy of the Match the City venue and
//! activity feeds.
//!
//! This is the command-line interface. Sync, storage and scheduling live in
//! `matchcity-core`.

mod app;
mod cli;
mod commands;
mod config;
mod constants;
mod errors;
mod logging;
mod output;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap_complete::generate;

use crate::app::AppContext;
use crate::cli::{Cli, Commands};
use crate::commands::{init, maintenance, records, sync};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.log_format);

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            errors::report(&err);
            let code = errors::exit_code(&err);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let ctx = AppContext::new(cli);
    match &cli.command {
        Commands::Init(args) => init::handle_init(&ctx, args),
        Commands::Sync(args) => sync::handle_sync(&ctx, args).await,
        Commands::Run => sync::handle_run(&ctx).await,
        Commands::List(args) => records::handle_list(&ctx, args),
        Commands::Show(args) => records::handle_show(&ctx, args),
        Commands::Delete(args) => records::handle_delete(&ctx, args),
        Commands::Check(args) => maintenance::handle_check(&ctx, args),
        Commands::Reset => maintenance::handle_reset(&ctx),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            generate(*shell, &mut command, "matchcity", &mut std::io::stdout());
            Ok(())
        }
    }
}
