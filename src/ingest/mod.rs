//! Incremental load of usage documents into the graph.
//!
//! One run: read the heartbeat, discover files dated after it, validate
//! them, upsert what passed. Runs must not overlap; the scheduler is
//! responsible for that.

pub mod discovery;
pub mod upsert;
pub mod validation;

use std::{io, path::PathBuf};

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use tokio::task;

use crate::{db::Database, error::PipelineError, models::IngestCounts};

pub use discovery::{discover_new_files, read_documents, DiscoveredFile};
pub use validation::{validate_batch, RawDocument, ValidatedBatch, ValidationMode};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub files_discovered: usize,
    pub records_ingested: usize,
    pub records_rejected: usize,
    pub counts: IngestCounts,
}

pub struct Ingestor {
    db: Database,
    data_dir: PathBuf,
    mode: ValidationMode,
}

impl Ingestor {
    pub fn new(db: Database, data_dir: PathBuf, mode: ValidationMode) -> Self {
        Self { db, data_dir, mode }
    }

    /// Discover and read new files on the blocking pool.
    async fn scan(
        &self,
        heartbeat: Option<DateTime<Utc>>,
    ) -> Result<(Vec<DiscoveredFile>, Vec<RawDocument>), PipelineError> {
        let data_dir = self.data_dir.clone();
        task::spawn_blocking(move || {
            let files = discover_new_files(&data_dir, heartbeat)?;
            let documents = read_documents(&files)?;
            Ok::<_, PipelineError>((files, documents))
        })
        .await
        .map_err(|err| PipelineError::io(&self.data_dir, io::Error::other(err)))?
    }

    pub async fn run(&self) -> Result<IngestReport, PipelineError> {
        let heartbeat = self.db.last_event_time().await?;
        match heartbeat {
            Some(ts) => info!("Graph heartbeat: {}", ts.to_rfc3339()),
            None => info!("Graph heartbeat: none, ingesting everything"),
        }

        let (files, documents) = self.scan(heartbeat).await?;
        if files.is_empty() {
            info!("No new usage files under {}", self.data_dir.display());
            return Ok(IngestReport::default());
        }

        let batch = validate_batch(documents, self.mode).map_err(|err| {
            error!("Received invalid user data, nothing written: {err}");
            for violation in &err.violations {
                error!("  {violation}");
            }
            err
        })?;

        let records_ingested = batch.records.len();
        let counts = self.db.ingest_records(batch.records).await?;
        info!(
            "Created {} node(s) and {} relationship(s) from {} record(s)",
            counts.nodes(),
            counts.edges(),
            records_ingested
        );

        Ok(IngestReport {
            files_discovered: files.len(),
            records_ingested,
            records_rejected: batch.rejected.len(),
            counts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::TimeZone;
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn scan_reads_only_files_after_the_heartbeat() {
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("user_data");
        for day in ["2024-01-01", "2024-01-02"] {
            let path = data_dir.join("a@x.com").join(format!("{day}.json"));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "{}").unwrap();
        }
        let db = Database::new(dir.path().join("graph.sqlite3")).unwrap();
        let ingestor = Ingestor::new(db, data_dir, ValidationMode::AllOrNothing);

        let heartbeat = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let (files, documents) = ingestor.scan(Some(heartbeat)).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].file_date, files.first().map(|file| file.date));
    }
}
