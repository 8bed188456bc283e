//! Local stand-in for the daily schedule: `generate_usage` then
//! `ingest_usage`, each retried a fixed number of times.

use std::{future::Future, time::Duration};

use anyhow::Result;
use chrono::{Days, NaiveDate};
use log::{error, info, warn};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::{
    config::PipelineConfig,
    db::Database,
    error::PipelineError,
    generator::UsageGenerator,
    ingest::{IngestReport, Ingestor},
};

pub const GENERATE_TASK: &str = "generate_usage";
pub const INGEST_TASK: &str = "ingest_usage";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            retries: config.schedule.retries,
            delay: config.schedule.retry_delay(),
        }
    }
}

/// Run `op` until it succeeds, it fails with a non-retryable error, or the
/// retries are used up.
pub async fn with_retries<F, Fut, T>(task: &str, policy: RetryPolicy, mut op: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.retries => {
                attempt += 1;
                warn!(
                    "Task {task} failed ({err}); retry {attempt}/{} in {:?}",
                    policy.retries, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => {
                error!("Task {task} failed: {err}");
                return Err(err);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum IngestOutcome {
    Ingested(IngestReport),
    /// The batch failed validation; nothing was written and the same files
    /// will be picked up by the next run.
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReport {
    pub execution_date: NaiveDate,
    pub records_generated: usize,
    pub ingest: IngestOutcome,
}

pub struct Pipeline {
    config: PipelineConfig,
    db: Database,
    policy: RetryPolicy,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, db: Database) -> Self {
        let policy = RetryPolicy::from_config(&config);
        Self { config, db, policy }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One scheduled interval. Ingestion only starts once generation has
    /// succeeded.
    pub async fn run_day(&self, execution_date: NaiveDate) -> Result<DayReport, PipelineError> {
        info!("Pipeline run for {execution_date}");

        let records = with_retries(GENERATE_TASK, self.policy, || async move {
            let mut generator =
                UsageGenerator::new(self.config.catalog.clone(), StdRng::from_entropy())
                    .map_err(|err| PipelineError::Config(err.to_string()))?;
            generator.generate_batch(
                &self.config.users,
                execution_date,
                Some(self.config.data_dir.as_path()),
            )
        })
        .await?;

        let ingestor = Ingestor::new(
            self.db.clone(),
            self.config.data_dir.clone(),
            self.config.validation_mode(),
        );
        let ingest = match with_retries(INGEST_TASK, self.policy, || ingestor.run()).await {
            Ok(report) => IngestOutcome::Ingested(report),
            Err(PipelineError::Validation(err)) => {
                warn!("Batch for {execution_date} rejected; heartbeat unchanged");
                IngestOutcome::Rejected {
                    reason: err.to_string(),
                }
            }
            Err(err) => return Err(err),
        };

        Ok(DayReport {
            execution_date,
            records_generated: records.len(),
            ingest,
        })
    }

    /// Catch up from `days` days ago through `today`, oldest first. Stops at
    /// the first failed day so later days never overtake it.
    pub async fn backfill(&self, today: NaiveDate, days: u32) -> Result<Vec<DayReport>, PipelineError> {
        let start = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);

        let mut reports = Vec::new();
        for date in start.iter_days().take_while(|date| *date <= today) {
            reports.push(self.run_day(date).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::{StoreError, ValidationError};

    fn quick(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_store_errors_until_success() {
        let calls = Cell::new(0);
        let result = with_retries("flaky", quick(3), || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move {
                if n < 3 {
                    Err(PipelineError::Store(StoreError::Worker("down".into())))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_configured_retries() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retries("down", quick(2), || {
            calls.set(calls.get() + 1);
            async { Err(PipelineError::Store(StoreError::Worker("down".into()))) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn validation_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retries("ingest", quick(5), || {
            calls.set(calls.get() + 1);
            async {
                Err(PipelineError::Validation(ValidationError {
                    batch_size: 1,
                    violations: Vec::new(),
                }))
            }
        })
        .await;

        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert_eq!(calls.get(), 1);
    }
}
