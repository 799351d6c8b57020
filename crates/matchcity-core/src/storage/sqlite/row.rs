//! Typed rows parsed from generic query records.

use chrono::{DateTime, Utc};

use crate::error::{MatchCityError, Result};
use crate::storage::types::{
    Activity, FieldValue, Record, SubActivity, Venue, KEY_ACTIVITY_CATEGORY, KEY_ACTIVITY_ID,
    KEY_ACTIVITY_TITLE, KEY_ADDRESS, KEY_EMAIL, KEY_LOCATION_LAT, KEY_LOCATION_LNG, KEY_NAME,
    KEY_POSTCODE, KEY_SUB_ACTIVITY_ACTIVITY_ID, KEY_SUB_ACTIVITY_ID, KEY_SUB_ACTIVITY_TITLE,
    KEY_TELEPHONE, KEY_UPDATED, KEY_VENUE_ID, KEY_WEB,
};

fn required_text(record: &Record, column: &str) -> Result<String> {
    record.text(column).map(str::to_string).ok_or_else(|| {
        MatchCityError::Storage(format!(
            "Row {} has no value for {}",
            record.row_id, column
        ))
    })
}

/// Attribute columns written through the generic CRUD surface may be NULL.
fn text_or_empty(record: &Record, column: &str) -> String {
    record
        .get(column)
        .map(FieldValue::to_string)
        .unwrap_or_default()
}

fn real_or_zero(record: &Record, column: &str) -> f64 {
    record
        .get(column)
        .and_then(FieldValue::as_f64)
        .unwrap_or(0.0)
}

impl TryFrom<Record> for Venue {
    type Error = MatchCityError;

    fn try_from(record: Record) -> Result<Self> {
        let millis = record
            .get(KEY_UPDATED)
            .and_then(FieldValue::as_i64)
            .unwrap_or(0);
        let updated: DateTime<Utc> = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            MatchCityError::Storage(format!("Invalid updated timestamp: {}", millis))
        })?;

        Ok(Venue {
            row_id: record.row_id,
            venue_id: required_text(&record, KEY_VENUE_ID)?,
            name: text_or_empty(&record, KEY_NAME),
            address: text_or_empty(&record, KEY_ADDRESS),
            postcode: text_or_empty(&record, KEY_POSTCODE),
            latitude: real_or_zero(&record, KEY_LOCATION_LAT),
            longitude: real_or_zero(&record, KEY_LOCATION_LNG),
            web: text_or_empty(&record, KEY_WEB),
            email: text_or_empty(&record, KEY_EMAIL),
            telephone: text_or_empty(&record, KEY_TELEPHONE),
            updated,
        })
    }
}

impl TryFrom<Record> for Activity {
    type Error = MatchCityError;

    fn try_from(record: Record) -> Result<Self> {
        Ok(Activity {
            row_id: record.row_id,
            activity_id: required_text(&record, KEY_ACTIVITY_ID)?,
            title: text_or_empty(&record, KEY_ACTIVITY_TITLE),
            category: text_or_empty(&record, KEY_ACTIVITY_CATEGORY),
        })
    }
}

impl TryFrom<Record> for SubActivity {
    type Error = MatchCityError;

    fn try_from(record: Record) -> Result<Self> {
        Ok(SubActivity {
            row_id: record.row_id,
            sub_activity_id: required_text(&record, KEY_SUB_ACTIVITY_ID)?,
            title: text_or_empty(&record, KEY_SUB_ACTIVITY_TITLE),
            activity_id: text_or_empty(&record, KEY_SUB_ACTIVITY_ACTIVITY_ID),
        })
    }
}
