//! The on-disk usage document.
//!
//! Field names follow the file format produced by the generator
//! (`usages_date`, `minute_used`), while the Rust side uses the descriptive
//! names `usage_date` and `minutes_used`.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Device {
    pub brand: String,
    pub os: String,
}

/// Minutes as written in a document. The generator only emits whole
/// minutes; other producers may send fractions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Minutes {
    Whole(u64),
    Fractional(f64),
}

impl Minutes {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Minutes::Whole(value) => value as f64,
            Minutes::Fractional(value) => value,
        }
    }
}

impl From<u64> for Minutes {
    fn from(value: u64) -> Self {
        Minutes::Whole(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppUsage {
    #[serde(rename = "minute_used")]
    pub minutes_used: Minutes,
    pub app_name: String,
    pub app_category: String,
}

/// One user's app usage for one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRecord {
    pub user_id: String,
    #[serde(rename = "usages_date")]
    pub usage_date: NaiveDate,
    pub device: Device,
    pub usages: Vec<AppUsage>,
}

impl UsageRecord {
    /// Timestamp stamped on every USED edge derived from this record.
    pub fn event_time(&self) -> DateTime<Utc> {
        self.usage_date.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn total_minutes(&self) -> f64 {
        self.usages.iter().map(|usage| usage.minutes_used.as_f64()).sum()
    }
}
