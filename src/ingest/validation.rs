//! Shape checks for raw usage documents.
//!
//! Documents are checked field by field against the file format before they
//! are turned into [`UsageRecord`]s, so a rejection names the file and the
//! offending JSON path.

use std::path::PathBuf;

use chrono::NaiveDate;
use log::{info, warn};
use serde_json::{Map, Value};

use crate::{
    error::{ShapeViolation, ValidationError},
    models::{AppUsage, Device, Minutes, UsageRecord},
    utils::time::parse_calendar_date,
};

const RECORD_KEYS: &[&str] = &["user_id", "usages_date", "device", "usages"];
const DEVICE_KEYS: &[&str] = &["os", "brand"];
const USAGE_KEYS: &[&str] = &["app_name", "app_category", "minute_used"];

/// A document as read from disk, before any checks.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source: Option<PathBuf>,
    /// Date taken from the file name, when the document came from disk.
    pub file_date: Option<NaiveDate>,
    pub body: Result<Value, String>,
}

impl RawDocument {
    pub fn from_value(value: Value) -> Self {
        Self {
            source: None,
            file_date: None,
            body: Ok(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// One bad document rejects the whole batch.
    #[default]
    AllOrNothing,
    /// Bad documents are dropped and the rest go through.
    ///
    /// A dropped file dated on or before the newest day that did go through
    /// is behind the heartbeat from then on, so it is never rediscovered,
    /// even after it is fixed.
    Partial,
}

#[derive(Debug, Clone)]
pub struct ValidatedBatch {
    pub records: Vec<UsageRecord>,
    pub rejected: Vec<ShapeViolation>,
}

pub fn validate_batch(
    documents: Vec<RawDocument>,
    mode: ValidationMode,
) -> Result<ValidatedBatch, ValidationError> {
    info!("Validating {} fetched document(s)...", documents.len());
    let batch_size = documents.len();
    let mut records = Vec::with_capacity(batch_size);
    let mut rejected = Vec::new();

    for document in documents {
        match validate_document(&document) {
            Ok(record) => records.push(record),
            Err(violation) => rejected.push(violation),
        }
    }

    if rejected.is_empty() {
        info!("Validation successful!");
        return Ok(ValidatedBatch { records, rejected });
    }

    match mode {
        ValidationMode::AllOrNothing => Err(ValidationError {
            batch_size,
            violations: rejected,
        }),
        ValidationMode::Partial => {
            for violation in &rejected {
                warn!("Dropping invalid usage document: {violation}");
            }
            Ok(ValidatedBatch { records, rejected })
        }
    }
}

pub fn validate_document(document: &RawDocument) -> Result<UsageRecord, ShapeViolation> {
    let violation = |field: &str, message: String| ShapeViolation {
        source: document.source.clone(),
        field: field.to_string(),
        message,
    };

    let value = document
        .body
        .as_ref()
        .map_err(|err| violation("$", format!("not valid JSON: {err}")))?;
    let record = as_object(value, "$").map_err(|(f, m)| violation(f.as_str(), m))?;
    check_keys(record, RECORD_KEYS, "$").map_err(|(f, m)| violation(f.as_str(), m))?;

    let user_id = string_field(record, "user_id", "$").map_err(|(f, m)| violation(f.as_str(), m))?;

    let raw_date = string_field(record, "usages_date", "$").map_err(|(f, m)| violation(f.as_str(), m))?;
    let usage_date = parse_calendar_date(&raw_date).ok_or_else(|| {
        violation("$.usages_date", format!("'{raw_date}' is not a date"))
    })?;
    if let Some(file_date) = document.file_date {
        if file_date != usage_date {
            return Err(violation(
                "$.usages_date",
                format!("{usage_date} does not match the file date {file_date}"),
            ));
        }
    }

    let device = parse_device(&record["device"]).map_err(|(f, m)| violation(f.as_str(), m))?;

    let usages = match &record["usages"] {
        Value::Array(items) if items.is_empty() => {
            return Err(violation("$.usages", "must not be empty".into()))
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| parse_usage(item, &format!("$.usages[{index}]")))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|(f, m)| violation(f.as_str(), m))?,
        other => {
            return Err(violation(
                "$.usages",
                format!("expected array, found {}", kind(other)),
            ))
        }
    };

    Ok(UsageRecord {
        user_id,
        usage_date,
        device,
        usages,
    })
}

type FieldError = (String, String);

fn parse_device(value: &Value) -> Result<Device, FieldError> {
    let device = as_object(value, "$.device")?;
    check_keys(device, DEVICE_KEYS, "$.device")?;
    Ok(Device {
        os: string_field(device, "os", "$.device")?,
        brand: string_field(device, "brand", "$.device")?,
    })
}

fn parse_usage(value: &Value, path: &str) -> Result<AppUsage, FieldError> {
    let usage = as_object(value, path)?;
    check_keys(usage, USAGE_KEYS, path)?;

    let minutes_path = format!("{path}.minute_used");
    let minutes_used = match &usage["minute_used"] {
        Value::Number(number) => {
            if let Some(whole) = number.as_u64() {
                Minutes::Whole(whole)
            } else {
                match number.as_f64() {
                    Some(fraction) if fraction.is_finite() && fraction >= 0.0 => {
                        Minutes::Fractional(fraction)
                    }
                    _ => return Err((minutes_path, format!("{number} is not a non-negative number"))),
                }
            }
        }
        other => {
            return Err((
                minutes_path,
                format!("expected number, found {}", kind(other)),
            ))
        }
    };

    Ok(AppUsage {
        minutes_used,
        app_name: string_field(usage, "app_name", path)?,
        app_category: string_field(usage, "app_category", path)?,
    })
}

fn as_object<'v>(value: &'v Value, path: &str) -> Result<&'v Map<String, Value>, FieldError> {
    value
        .as_object()
        .ok_or_else(|| (path.to_string(), format!("expected object, found {}", kind(value))))
}

fn check_keys(object: &Map<String, Value>, expected: &[&str], path: &str) -> Result<(), FieldError> {
    if let Some(missing) = expected.iter().find(|key| !object.contains_key(**key)) {
        return Err((format!("{path}.{missing}"), "missing required key".into()));
    }
    if let Some(extra) = object.keys().find(|key| !expected.contains(&key.as_str())) {
        return Err((format!("{path}.{extra}"), "unexpected key".into()));
    }
    Ok(())
}

fn string_field(object: &Map<String, Value>, key: &str, path: &str) -> Result<String, FieldError> {
    match &object[key] {
        Value::String(value) => Ok(value.clone()),
        other => Err((
            format!("{path}.{key}"),
            format!("expected string, found {}", kind(other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn valid(user: &str) -> Value {
        json!({
            "user_id": user,
            "usages_date": "2021-09-15",
            "device": {"brand": "apple", "os": "ios"},
            "usages": [
                {"minute_used": 200, "app_name": "slack", "app_category": "communication"},
                {"minute_used": 12.5, "app_name": "gmail", "app_category": "communication"}
            ]
        })
    }

    fn field_error(value: Value) -> String {
        validate_document(&RawDocument::from_value(value))
            .unwrap_err()
            .field
    }

    #[test]
    fn accepts_well_shaped_document() {
        let record = validate_document(&RawDocument::from_value(valid("owais@tribes.ai"))).unwrap();
        assert_eq!(record.user_id, "owais@tribes.ai");
        assert_eq!(record.device.os, "ios");
        assert_eq!(record.usages.len(), 2);
        assert_eq!(record.usages[1].minutes_used, Minutes::Fractional(12.5));
    }

    #[test]
    fn accepts_datetime_usage_date() {
        let mut doc = valid("a@x.com");
        doc["usages_date"] = json!("2021-09-15 00:00:00");
        let record = validate_document(&RawDocument::from_value(doc)).unwrap();
        assert_eq!(record.usage_date.to_string(), "2021-09-15");
    }

    #[test]
    fn names_the_offending_field() {
        let mut doc = valid("a@x.com");
        doc["usages"][1]["minute_used"] = json!("ten");
        assert_eq!(field_error(doc), "$.usages[1].minute_used");

        let mut doc = valid("a@x.com");
        doc["device"].as_object_mut().unwrap().remove("brand");
        assert_eq!(field_error(doc), "$.device.brand");

        let mut doc = valid("a@x.com");
        doc["extra"] = json!(true);
        assert_eq!(field_error(doc), "$.extra");

        let mut doc = valid("a@x.com");
        doc["usages"] = json!([]);
        assert_eq!(field_error(doc), "$.usages");

        let mut doc = valid("a@x.com");
        doc["usages_date"] = json!("someday");
        assert_eq!(field_error(doc), "$.usages_date");

        let mut doc = valid("a@x.com");
        doc["usages"][0]["minute_used"] = json!(-3);
        assert_eq!(field_error(doc), "$.usages[0].minute_used");
    }

    #[test]
    fn usage_date_must_match_the_file_name() {
        let filed = |day: u32| RawDocument {
            source: Some(PathBuf::from(format!("a@x.com/2021-09-{day:02}.json"))),
            file_date: NaiveDate::from_ymd_opt(2021, 9, day),
            body: Ok(valid("a@x.com")),
        };

        assert!(validate_document(&filed(15)).is_ok());

        let err = validate_document(&filed(12)).unwrap_err();
        assert_eq!(err.field, "$.usages_date");
        assert!(err.message.contains("2021-09-12"));
    }

    #[test]
    fn one_bad_document_rejects_the_batch() {
        let mut bad = valid("d@x.com");
        bad["user_id"] = json!(42);
        let docs = vec![
            RawDocument::from_value(valid("a@x.com")),
            RawDocument::from_value(valid("b@x.com")),
            RawDocument::from_value(valid("c@x.com")),
            RawDocument::from_value(bad),
        ];

        let err = validate_batch(docs, ValidationMode::AllOrNothing).unwrap_err();
        assert_eq!(err.batch_size, 4);
        assert_eq!(err.violations.len(), 1);
        assert_eq!(err.violations[0].field, "$.user_id");
    }

    #[test]
    fn partial_mode_keeps_good_documents() {
        let unreadable = RawDocument {
            source: Some(PathBuf::from("x/2024-01-01.json")),
            file_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            body: Err("EOF while parsing".into()),
        };
        let docs = vec![RawDocument::from_value(valid("a@x.com")), unreadable];

        let batch = validate_batch(docs, ValidationMode::Partial).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].source, Some(PathBuf::from("x/2024-01-01.json")));
    }
}
