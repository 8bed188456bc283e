use std::path::PathBuf;

use thiserror::Error;

/// A date string handed to the generator could not be understood.
#[derive(Debug, Error)]
#[error("invalid date '{input}': {reason}")]
pub struct ParseError {
    pub input: String,
    pub reason: String,
}

/// A single shape violation inside one raw document.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeViolation {
    pub source: Option<PathBuf>,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(path) => write!(f, "{}: {}: {}", path.display(), self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// The ingestion batch failed its shape check. Nothing was written.
#[derive(Debug, Error)]
#[error("rejected batch of {batch_size} record(s), {} invalid; first: {}", .violations.len(), first_violation(.violations))]
pub struct ValidationError {
    pub batch_size: usize,
    pub violations: Vec<ShapeViolation>,
}

fn first_violation(violations: &[ShapeViolation]) -> String {
    violations
        .first()
        .map(ToString::to_string)
        .unwrap_or_else(|| "<none>".into())
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{label} node '{id}' violates its uniqueness constraint")]
    Constraint { label: &'static str, id: String },

    #[error("corrupt value in column {column}: {detail}")]
    Corrupt { column: &'static str, detail: String },

    #[error("database worker unavailable: {0}")]
    Worker(String),
}

/// Everything a pipeline stage can fail with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether rerunning the same stage could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Io { .. })
    }
}
