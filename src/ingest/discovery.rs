use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate, Utc};
use walkdir::WalkDir;

use crate::{error::PipelineError, ingest::validation::RawDocument, utils::time::parse_calendar_date};

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub path: PathBuf,
    /// Date embedded in the file name.
    pub date: NaiveDate,
}

/// Every `*.json` file under `root` whose name is a date strictly after the
/// heartbeat's date. Without a heartbeat every dated file qualifies.
///
/// The comparison is by calendar day, so a heartbeat anywhere inside a day
/// excludes all files for that day.
pub fn discover_new_files(
    root: &Path,
    last_event_time: Option<DateTime<Utc>>,
) -> Result<Vec<DiscoveredFile>, PipelineError> {
    if !root.exists() {
        crate::log_warn!("Data directory {} does not exist yet", root.display());
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            let source = err
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            PipelineError::io(path, source)
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }

        let Some(date) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(parse_calendar_date)
        else {
            crate::log_warn!("Skipping {}: file name is not a date", path.display());
            continue;
        };

        files.push(DiscoveredFile {
            path: path.to_path_buf(),
            date,
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    crate::log_info!("Received {} json file(s)", files.len());

    let filtered: Vec<DiscoveredFile> = match last_event_time {
        Some(heartbeat) => {
            let cutoff = heartbeat.date_naive();
            files.into_iter().filter(|file| file.date > cutoff).collect()
        }
        None => files,
    };

    crate::log_info!("Filtered files: {}", filtered.len());
    Ok(filtered)
}

/// Read each file into a [`RawDocument`]. Unparseable JSON is kept as a
/// document-level error for validation to report; unreadable files abort.
pub fn read_documents(files: &[DiscoveredFile]) -> Result<Vec<RawDocument>, PipelineError> {
    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let contents =
            fs::read_to_string(&file.path).map_err(|err| PipelineError::io(&file.path, err))?;
        documents.push(RawDocument {
            source: Some(file.path.clone()),
            file_date: Some(file.date),
            body: serde_json::from_str(&contents).map_err(|err| err.to_string()),
        });
    }
    crate::log_info!("Fetched user data: {}", documents.len());
    Ok(documents)
}
