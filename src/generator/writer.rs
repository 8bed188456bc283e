use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use crate::{error::PipelineError, models::UsageRecord};

/// A user id names a directory directly under the data root, so it must be
/// a single plain path component.
pub fn check_user_id(user_id: &str) -> Result<(), PipelineError> {
    let mut components = Path::new(user_id).components();
    let single_component = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single_component || user_id.contains(['/', '\\']) {
        return Err(PipelineError::Config(format!(
            "user id '{user_id}' is not usable as a directory name"
        )));
    }
    Ok(())
}

/// `<root>/<user_id>/<date>.json`
pub fn record_path(root: &Path, record: &UsageRecord) -> PathBuf {
    root.join(&record.user_id)
        .join(format!("{}.json", record.usage_date.format("%Y-%m-%d")))
}

/// Write a record to its dated file, creating the user directory if needed.
/// An existing file for the same user and day is overwritten.
pub fn write_record(root: &Path, record: &UsageRecord) -> Result<PathBuf, PipelineError> {
    check_user_id(&record.user_id)?;
    let path = record_path(root, record);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| PipelineError::io(parent, err))?;
    }

    let serialized = serde_json::to_string_pretty(record)
        .map_err(|err| PipelineError::io(&path, err.into()))?;
    fs::write(&path, serialized).map_err(|err| PipelineError::io(&path, err))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use super::*;
    use crate::models::{AppUsage, Device, Minutes};

    fn record() -> UsageRecord {
        UsageRecord {
            user_id: "elly@tribes.ai".into(),
            usage_date: NaiveDate::from_ymd_opt(2021, 9, 15).unwrap(),
            device: Device {
                brand: "OnePlus".into(),
                os: "android".into(),
            },
            usages: vec![AppUsage {
                minutes_used: Minutes::Whole(42),
                app_name: "chrome".into(),
                app_category: "web_browser".into(),
            }],
        }
    }

    #[test]
    fn writes_under_user_directory() {
        let dir = tempdir().unwrap();
        let path = write_record(dir.path(), &record()).unwrap();

        assert_eq!(path, dir.path().join("elly@tribes.ai").join("2021-09-15.json"));
        let raw = fs::read_to_string(&path).unwrap();
        let parsed: UsageRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, record());
    }

    #[test]
    fn refuses_user_ids_that_leave_the_root() {
        let dir = tempdir().unwrap();
        for user_id in ["../x", "a/b", "..", ".", "", "/etc", "a\\b"] {
            let mut escaping = record();
            escaping.user_id = user_id.into();
            let err = write_record(dir.path(), &escaping).unwrap_err();
            assert!(matches!(err, PipelineError::Config(_)), "{user_id:?}");
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
