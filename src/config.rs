use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    generator::{writer::check_user_id, Catalog},
    ingest::ValidationMode,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Attempts after the first failure of a task.
    pub retries: u32,
    pub retry_delay_secs: u64,
    /// How many days back a backfill starts.
    pub historical_days: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay_secs: 10,
            historical_days: 30,
        }
    }
}

impl ScheduleConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Everything the generator and ingestor need, built once at startup and
/// handed to each component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub users: Vec<String>,
    pub catalog: Catalog,
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    /// Daily log files go here; `None` logs to stdout only.
    pub log_dir: Option<PathBuf>,
    pub partial_ingest: bool,
    pub schedule: ScheduleConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            users: ["vinit", "guilermo", "christian", "elly", "owais"]
                .iter()
                .map(|name| format!("{name}@tribes.ai"))
                .collect(),
            catalog: Catalog::default(),
            data_dir: PathBuf::from("data/user_data"),
            database_path: PathBuf::from("data/usage_graph.sqlite3"),
            log_dir: Some(PathBuf::from("logs")),
            partial_ingest: false,
            schedule: ScheduleConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read the config file at `path`, or fall back to defaults when the
    /// file does not exist. A file that exists but does not parse is an
    /// error.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config {}", path.display()))?
        } else {
            Self::default()
        };

        config.catalog.check()?;
        for user in &config.users {
            check_user_id(user).with_context(|| format!("Invalid config {}", path.display()))?;
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn validation_mode(&self) -> ValidationMode {
        if self.partial_ingest {
            ValidationMode::Partial
        } else {
            ValidationMode::AllOrNothing
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempdir().unwrap();
        let config = PipelineConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.users.len(), 5);
        assert_eq!(config.catalog.upper_usage_limit, 480);
        assert_eq!(config.validation_mode(), ValidationMode::AllOrNothing);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"users": ["a@x.com"], "partial_ingest": true, "schedule": {"retries": 1}}"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.users, vec!["a@x.com"]);
        assert_eq!(config.validation_mode(), ValidationMode::Partial);
        assert_eq!(config.schedule.retries, 1);
        assert_eq!(config.schedule.retry_delay_secs, 10);
        assert_eq!(config.catalog.app_info.len(), 6);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ users: nope").unwrap();
        assert!(PipelineConfig::load(&path).is_err());
    }

    #[test]
    fn inverted_limits_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"catalog": {"lower_usage_limit": 500, "upper_usage_limit": 10}}"#,
        )
        .unwrap();
        assert!(PipelineConfig::load(&path).is_err());
    }

    #[test]
    fn path_like_user_ids_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"users": ["a@x.com", "../escape"]}"#).unwrap();
        assert!(PipelineConfig::load(&path).is_err());
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let config = PipelineConfig {
            partial_ingest: true,
            log_dir: None,
            ..PipelineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::load(&path).unwrap(), config);
    }
}
