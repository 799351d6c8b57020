use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use matchcity_core::storage::{SortOrder, Table};
use matchcity_core::VERSION;

/// Match the City - keeps a local store of venues and activities in sync with remote feeds
#[derive(Parser)]
#[command(name = "matchcity")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, global = true, env = "MATCHCITY_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to the store database (overrides the config file)
    #[arg(short, long, global = true, env = "MATCHCITY_STORE", value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a config file and create the store
    Init(InitArgs),

    /// Run one sync cycle over all feeds
    Sync(SyncArgs),

    /// Sync periodically until interrupted
    Run,

    /// List rows of a table
    List(ListArgs),

    /// Show one row by row id
    Show(ShowArgs),

    /// Delete one row
    Delete(DeleteArgs),

    /// Check the store for duplicate keys and orphaned rows
    Check(CheckArgs),

    /// Drop and recreate every table
    Reset,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the `init` command
#[derive(Args)]
pub struct InitArgs {
    /// Venues feed URL
    #[arg(long, value_name = "URL")]
    pub venues_url: String,

    /// Activities feed URL
    #[arg(long, value_name = "URL")]
    pub activities_url: String,

    /// Sub-activities feed URL
    #[arg(long, value_name = "URL")]
    pub sub_activities_url: String,

    /// Minutes between sync cycles in `run` (0 runs a single cycle)
    #[arg(long, value_name = "MINUTES")]
    pub refresh_minutes: Option<u64>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `sync` command
#[derive(Args)]
pub struct SyncArgs {
    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `list` command
#[derive(Args)]
pub struct ListArgs {
    /// Table to list (venues, activities, sub-activities)
    #[arg(value_name = "TABLE")]
    pub table: Table,

    /// Only rows where COLUMN equals VALUE (repeatable)
    #[arg(long = "where", value_name = "COLUMN=VALUE", value_parser = parse_where)]
    pub conditions: Vec<(String, String)>,

    /// Sort column, optionally suffixed with :asc or :desc
    #[arg(long, value_name = "COLUMN[:desc]")]
    pub sort: Option<SortOrder>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `show` command
#[derive(Args)]
pub struct ShowArgs {
    /// Table holding the row
    #[arg(value_name = "TABLE")]
    pub table: Table,

    /// Surrogate row id
    #[arg(value_name = "ROW_ID")]
    pub row_id: i64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `delete` command
#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).args(["row_id", "key"])))]
pub struct DeleteArgs {
    /// Table holding the row
    #[arg(value_name = "TABLE")]
    pub table: Table,

    /// Surrogate row id
    #[arg(long, value_name = "ROW_ID")]
    pub row_id: Option<i64>,

    /// Natural key from the feed
    #[arg(long, value_name = "KEY")]
    pub key: Option<String>,
}

/// Arguments for the `check` command
#[derive(Args)]
pub struct CheckArgs {
    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_where(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((column, expected)) if !column.trim().is_empty() => {
            Ok((column.trim().to_string(), expected.to_string()))
        }
        _ => Err(format!("expected COLUMN=VALUE, got \"{}\"", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_where() {
        assert_eq!(
            parse_where("postcode=MK9 3AZ").unwrap(),
            ("postcode".to_string(), "MK9 3AZ".to_string())
        );
        assert_eq!(
            parse_where("title=a=b").unwrap(),
            ("title".to_string(), "a=b".to_string())
        );
        assert!(parse_where("title").is_err());
        assert!(parse_where("=value").is_err());
    }

    #[test]
    fn test_list_args_parse_table_and_sort() {
        let cli = Cli::try_parse_from([
            "matchcity",
            "list",
            "sub-activities",
            "--where",
            "activity_id=a1",
            "--sort",
            "title:desc",
        ])
        .unwrap();
        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.table, Table::SubActivities);
                assert_eq!(args.conditions.len(), 1);
                assert_eq!(args.sort, Some(SortOrder::descending("title")));
            }
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn test_delete_requires_exactly_one_target() {
        assert!(Cli::try_parse_from(["matchcity", "delete", "venues"]).is_err());
        assert!(Cli::try_parse_from([
            "matchcity", "delete", "venues", "--row-id", "1", "--key", "v1"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["matchcity", "delete", "venues", "--key", "v1"]).is_ok());
    }
}
