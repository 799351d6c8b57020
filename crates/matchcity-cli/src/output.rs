//! Output formatting helpers for the CLI.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table as ComfyTable};

use matchcity_core::storage::{IntegrityReport, Record, Table};
use matchcity_core::{FeedOutcome, SyncReport};

/// Column headers for a table, surrogate id first.
pub fn headers(table: Table) -> Vec<&'static str> {
    let mut headers = vec!["_id"];
    headers.extend_from_slice(table.columns());
    headers
}

/// Render records as a bordered table.
pub fn records_table(table: Table, records: &[Record]) -> String {
    let headers = headers(table);
    let mut rendered = ComfyTable::new();
    rendered
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.clone());

    for record in records {
        let row: Vec<String> = headers
            .iter()
            .map(|column| match *column {
                "_id" => record.row_id.to_string(),
                other => record
                    .get(other)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            })
            .collect();
        rendered.add_row(row);
    }
    rendered.to_string()
}

pub fn print_records(table: Table, records: &[Record], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
    } else if records.is_empty() {
        println!("No {} found.", table);
    } else {
        println!("{}", records_table(table, records));
    }
    Ok(())
}

pub fn print_record(table: Table, record: &Record, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }
    for column in headers(table) {
        let value = match column {
            "_id" => record.row_id.to_string(),
            other => record
                .get(other)
                .map(ToString::to_string)
                .unwrap_or_default(),
        };
        println!("{}: {}", column, value);
    }
    Ok(())
}

/// One line per feed, e.g. `venues: 2 inserted, 0 updated`.
pub fn sync_report_lines(report: &SyncReport) -> Vec<String> {
    report
        .feeds
        .iter()
        .map(|feed| match &feed.outcome {
            FeedOutcome::Synced { inserted, updated } => {
                format!("{}: {} inserted, {} updated", feed.feed, inserted, updated)
            }
            FeedOutcome::Skipped { status } => {
                format!("{}: skipped (HTTP {})", feed.feed, status)
            }
            FeedOutcome::Failed { reason } => format!("{}: failed ({})", feed.feed, reason),
        })
        .collect()
}

pub fn print_sync_report(report: &SyncReport, json: bool, quiet: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if quiet {
        return Ok(());
    }
    for line in sync_report_lines(report) {
        println!("{}", line);
    }
    Ok(())
}

pub fn print_integrity(report: &IntegrityReport, json: bool, quiet: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    if report.is_ok() {
        if !quiet {
            println!("Integrity check: OK");
            println!("- schema version: {}", report.schema_version);
            println!("- natural keys: OK");
            println!("- sub-activity parents: OK");
        }
        return Ok(());
    }

    eprintln!("Integrity check: FAILED");
    for (table, key) in &report.duplicate_keys {
        eprintln!("- duplicate key in {}: {}", table, key);
    }
    for key in &report.orphaned_sub_activities {
        eprintln!("- sub-activity {} has no parent activity", key);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chrono::Utc;
    use matchcity_core::storage::FieldValue;
    use matchcity_core::sync::FeedReport;
    use matchcity_core::FeedKind;

    #[test]
    fn test_records_table_contains_values() {
        let mut fields = BTreeMap::new();
        fields.insert("activity_id".to_string(), FieldValue::from("a1"));
        fields.insert("title".to_string(), FieldValue::from("Swimming"));
        fields.insert("category".to_string(), FieldValue::Null);
        let record = Record { row_id: 7, fields };

        let rendered = records_table(Table::Activities, &[record]);
        assert!(rendered.contains("activity_id"));
        assert!(rendered.contains("Swimming"));
        assert!(rendered.contains('7'));
    }

    #[test]
    fn test_sync_report_lines() {
        let now = Utc::now();
        let report = SyncReport {
            started_at: now,
            finished_at: now,
            feeds: vec![
                FeedReport {
                    feed: FeedKind::Venues,
                    outcome: FeedOutcome::Synced {
                        inserted: 2,
                        updated: 1,
                    },
                },
                FeedReport {
                    feed: FeedKind::SubActivities,
                    outcome: FeedOutcome::Skipped { status: 404 },
                },
            ],
        };

        assert_eq!(
            sync_report_lines(&report),
            vec![
                "venues: 2 inserted, 1 updated".to_string(),
                "sub-activities: skipped (HTTP 404)".to_string(),
            ]
        );
    }
}
