//! Synthetic usage data, one record per user per day.

pub mod catalog;
pub mod writer;

use std::path::Path;

use chrono::{Local, NaiveDate};
use log::info;
use rand::{seq::SliceRandom, Rng};

use crate::{
    error::{ParseError, PipelineError},
    models::{AppUsage, UsageRecord},
    utils::time::parse_calendar_date,
};

pub use catalog::{AppProfile, Catalog};
pub use writer::{record_path, write_record};

pub struct UsageGenerator<R> {
    catalog: Catalog,
    rng: R,
}

impl<R: Rng> UsageGenerator<R> {
    pub fn new(catalog: Catalog, rng: R) -> anyhow::Result<Self> {
        catalog.check()?;
        Ok(Self { catalog, rng })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Build one random record for `username` on `date`.
    ///
    /// The device is picked uniformly, the apps are a shuffled prefix of the
    /// catalog of random length `1..=N`, and minutes are handed out in that
    /// order by [`allocate_minutes`].
    pub fn generate(&mut self, username: &str, date: NaiveDate) -> UsageRecord {
        let device = self
            .catalog
            .device_info
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();

        let mut apps = self.catalog.app_info.clone();
        apps.shuffle(&mut self.rng);
        let take = if apps.is_empty() {
            0
        } else {
            self.rng.gen_range(1..=apps.len())
        };
        apps.truncate(take);

        let minutes = allocate_minutes(
            &mut self.rng,
            self.catalog.lower_usage_limit,
            self.catalog.upper_usage_limit,
            apps.len(),
        );

        let usages = apps
            .into_iter()
            .zip(minutes)
            .map(|(app, minutes_used)| AppUsage {
                minutes_used: minutes_used.into(),
                app_name: app.app_name,
                app_category: app.app_category,
            })
            .collect();

        UsageRecord {
            user_id: username.to_string(),
            usage_date: date,
            device,
            usages,
        }
    }

    /// One record per user. With `save_to` set, each record is also written
    /// to its dated file.
    pub fn generate_batch(
        &mut self,
        users: &[String],
        date: NaiveDate,
        save_to: Option<&Path>,
    ) -> Result<Vec<UsageRecord>, PipelineError> {
        info!(
            "Generating data for users: {} for date: {}",
            users.join(", "),
            date
        );

        let mut records = Vec::with_capacity(users.len());
        for user in users {
            let record = self.generate(user, date);
            if let Some(root) = save_to {
                write_record(root, &record)?;
            }
            records.push(record);
        }

        match save_to {
            Some(root) => info!("Saved {} record(s) to {}", records.len(), root.display()),
            None => info!("Generated {} record(s)", records.len()),
        }
        Ok(records)
    }
}

/// Hand out minutes one app at a time. Each draw is uniform over
/// `lower..=upper - allocated`, so early apps can take most of the budget.
/// When `lower` no longer fits the remaining budget the draw is pinned to
/// what remains. The total never exceeds `upper`.
pub fn allocate_minutes<R: Rng + ?Sized>(
    rng: &mut R,
    lower: u64,
    upper: u64,
    count: usize,
) -> Vec<u64> {
    let mut allocated = 0u64;
    let mut minutes = Vec::with_capacity(count);
    for _ in 0..count {
        let remaining = upper.saturating_sub(allocated);
        let low = lower.min(remaining);
        let drawn = rng.gen_range(low..=remaining);
        allocated += drawn;
        minutes.push(drawn);
    }
    minutes
}

pub fn parse_target_date(raw: &str) -> Result<NaiveDate, ParseError> {
    parse_calendar_date(raw).ok_or_else(|| ParseError {
        input: raw.to_string(),
        reason: "expected YYYY-MM-DD or an ISO date-time".into(),
    })
}

/// An explicit date wins, then the scheduler's execution date, then today.
pub fn resolve_target_date(
    explicit: Option<&str>,
    execution_date: Option<NaiveDate>,
) -> Result<NaiveDate, ParseError> {
    match (explicit, execution_date) {
        (Some(raw), _) => parse_target_date(raw),
        (None, Some(date)) => Ok(date),
        (None, None) => Ok(Local::now().date_naive()),
    }
}
