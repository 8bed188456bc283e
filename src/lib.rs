pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod utils;

pub use config::PipelineConfig;
pub use db::Database;
pub use error::{ParseError, PipelineError, StoreError, ValidationError};
pub use generator::{Catalog, UsageGenerator};
pub use ingest::{IngestReport, Ingestor, ValidationMode};
pub use models::{IngestCounts, UsageRecord};
pub use pipeline::{Pipeline, RetryPolicy};
pub use store::{GraphStore, MemoryGraph};
