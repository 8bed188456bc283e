use chrono::{DateTime, Utc};

use crate::{error::StoreError, models::NodeLabel};

pub fn parse_datetime(value: &str, column: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt {
            column,
            detail: format!("'{value}': {err}"),
        })
}

pub fn from_timestamp(value: i64, column: &'static str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp(value, 0).ok_or_else(|| StoreError::Corrupt {
        column,
        detail: format!("timestamp {value} out of range"),
    })
}

pub fn parse_label(value: &str) -> Result<NodeLabel, StoreError> {
    match value {
        "User" => Ok(NodeLabel::User),
        "App" => Ok(NodeLabel::App),
        "Device" => Ok(NodeLabel::Device),
        "Brand" => Ok(NodeLabel::Brand),
        other => Err(StoreError::Corrupt {
            column: "label",
            detail: format!("unknown node label {other}"),
        }),
    }
}
