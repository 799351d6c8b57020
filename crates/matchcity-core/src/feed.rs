//! Feed payload parsing.
//!
//! Each feed is a JSON array of flat objects. Parsing is all-or-nothing per
//! feed: one element with a missing or malformed field fails the whole
//! payload, so a bad payload never yields partial changes.

use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{MatchCityError, Result};
use crate::storage::types::{NewActivity, NewSubActivity, NewVenue, Table};

/// The three feeds published by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    Venues,
    Activities,
    SubActivities,
}

impl FeedKind {
    /// All feeds, in sync order.
    pub const ALL: [FeedKind; 3] = [
        FeedKind::Venues,
        FeedKind::Activities,
        FeedKind::SubActivities,
    ];

    /// Table the feed is synced into.
    pub fn table(&self) -> Table {
        match self {
            FeedKind::Venues => Table::Venues,
            FeedKind::Activities => Table::Activities,
            FeedKind::SubActivities => Table::SubActivities,
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeedKind::Venues => "venues",
            FeedKind::Activities => "activities",
            FeedKind::SubActivities => "sub-activities",
        })
    }
}

/// Accept strings, and coerce numbers and booleans to their text form.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(value) => Ok(value),
        Value::Number(value) => Ok(value.to_string()),
        Value::Bool(value) => Ok(value.to_string()),
        Value::Null => Err(de::Error::custom("expected a string, found null")),
        Value::Array(_) => Err(de::Error::custom("expected a string, found an array")),
        Value::Object(_) => Err(de::Error::custom("expected a string, found an object")),
    }
}

#[derive(Debug, Deserialize)]
struct VenuePayload {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    name: String,
    #[serde(deserialize_with = "lenient_string")]
    address: String,
    #[serde(deserialize_with = "lenient_string")]
    postcode: String,
    #[serde(deserialize_with = "lenient_string")]
    latitude: String,
    #[serde(deserialize_with = "lenient_string")]
    longitude: String,
    #[serde(deserialize_with = "lenient_string")]
    web: String,
    #[serde(deserialize_with = "lenient_string")]
    email: String,
    #[serde(deserialize_with = "lenient_string")]
    telephone: String,
}

#[derive(Debug, Deserialize)]
struct ActivityPayload {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    category: String,
}

#[derive(Debug, Deserialize)]
struct SubActivityPayload {
    #[serde(deserialize_with = "lenient_string")]
    id: String,
    #[serde(deserialize_with = "lenient_string")]
    title: String,
    #[serde(deserialize_with = "lenient_string")]
    activity_id: String,
}

fn parse_array<T: for<'de> Deserialize<'de>>(feed: FeedKind, body: &str) -> Result<Vec<T>> {
    serde_json::from_str(body).map_err(|e| MatchCityError::Feed {
        feed,
        message: e.to_string(),
    })
}

/// Parse a coordinate, falling back to 0.0 when it is not a finite number.
pub fn parse_coordinate(raw: &str, venue_id: &str, axis: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        Ok(_) | Err(_) => {
            debug!(venue = venue_id, axis, raw, "Location parsing failed, using 0.0");
            0.0
        }
    }
}

/// Parse the venues feed.
pub fn parse_venues(body: &str) -> Result<Vec<NewVenue>> {
    let payloads: Vec<VenuePayload> = parse_array(FeedKind::Venues, body)?;
    Ok(payloads
        .into_iter()
        .map(|venue| NewVenue {
            latitude: parse_coordinate(&venue.latitude, &venue.id, "latitude"),
            longitude: parse_coordinate(&venue.longitude, &venue.id, "longitude"),
            venue_id: venue.id,
            name: venue.name,
            address: venue.address,
            postcode: venue.postcode,
            web: venue.web,
            email: venue.email,
            telephone: venue.telephone,
        })
        .collect())
}

/// Parse the activities feed.
pub fn parse_activities(body: &str) -> Result<Vec<NewActivity>> {
    let payloads: Vec<ActivityPayload> = parse_array(FeedKind::Activities, body)?;
    Ok(payloads
        .into_iter()
        .map(|activity| NewActivity {
            activity_id: activity.id,
            title: activity.title,
            category: activity.category,
        })
        .collect())
}

/// Parse the sub-activities feed.
pub fn parse_sub_activities(body: &str) -> Result<Vec<NewSubActivity>> {
    let payloads: Vec<SubActivityPayload> = parse_array(FeedKind::SubActivities, body)?;
    Ok(payloads
        .into_iter()
        .map(|sub| NewSubActivity {
            sub_activity_id: sub.id,
            title: sub.title,
            activity_id: sub.activity_id,
        })
        .collect())
}
