use matchcity_core::storage::{LocalStore, RowFilter};

use crate::app::AppContext;
use crate::cli::{DeleteArgs, ListArgs, ShowArgs};
use crate::errors::CliError;
use crate::output::{print_record, print_records};

pub fn handle_list(ctx: &AppContext, args: &ListArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;

    let mut filter = RowFilter::new();
    for (column, value) in &args.conditions {
        filter = filter.eq(column.as_str(), value.as_str());
    }

    let records = store.query(args.table, &filter, args.sort.as_ref())?;
    print_records(args.table, &records, args.json)
}

pub fn handle_show(ctx: &AppContext, args: &ShowArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let record = store.get(args.table, args.row_id)?.ok_or_else(|| {
        CliError::not_found(
            format!("No row {} in {}", args.row_id, args.table),
            format!("List rows with:\n  matchcity list {}", args.table),
        )
    })?;
    print_record(args.table, &record, args.json)
}

pub fn handle_delete(ctx: &AppContext, args: &DeleteArgs) -> anyhow::Result<()> {
    let store = ctx.open_store()?;

    let (filter, target) = match (&args.row_id, &args.key) {
        (Some(row_id), _) => (RowFilter::by_row_id(*row_id), format!("row {}", row_id)),
        (None, Some(key)) => (
            RowFilter::new().eq(args.table.natural_key(), key.as_str()),
            format!("key {}", key),
        ),
        (None, None) => {
            return Err(anyhow::anyhow!("Pass --row-id or --key to select a row"));
        }
    };

    let removed = store.delete(args.table, &filter)?;
    if removed == 0 {
        return Err(CliError::not_found(
            format!("No {} in {}", target, args.table),
            format!("List rows with:\n  matchcity list {}", args.table),
        )
        .into());
    }
    if !ctx.quiet() {
        println!("Deleted {} from {}", target, args.table);
    }
    Ok(())
}
