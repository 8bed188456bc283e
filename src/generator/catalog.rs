use serde::{Deserialize, Serialize};

use crate::models::Device;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppProfile {
    pub app_name: String,
    pub app_category: String,
}

impl AppProfile {
    pub fn new(app_name: &str, app_category: &str) -> Self {
        Self {
            app_name: app_name.into(),
            app_category: app_category.into(),
        }
    }
}

/// Fixed pools the generator samples from, plus the usage-minutes bounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Catalog {
    pub device_info: Vec<Device>,
    pub app_info: Vec<AppProfile>,
    pub lower_usage_limit: u64,
    pub upper_usage_limit: u64,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            device_info: vec![
                device("apple", "ios"),
                device("samsung", "android"),
                device("OnePlus", "android"),
            ],
            app_info: vec![
                AppProfile::new("slack", "communication"),
                AppProfile::new("gmail", "communication"),
                AppProfile::new("jira", "task_management"),
                AppProfile::new("google drive", "file_management"),
                AppProfile::new("chrome", "web_browser"),
                AppProfile::new("spotify", "entertainment_music"),
            ],
            lower_usage_limit: 0,
            upper_usage_limit: 480,
        }
    }
}

impl Catalog {
    pub fn check(&self) -> anyhow::Result<()> {
        if self.device_info.is_empty() {
            anyhow::bail!("catalog has no device profiles");
        }
        if self.app_info.is_empty() {
            anyhow::bail!("catalog has no apps");
        }
        if self.lower_usage_limit > self.upper_usage_limit {
            anyhow::bail!(
                "lower_usage_limit ({}) exceeds upper_usage_limit ({})",
                self.lower_usage_limit,
                self.upper_usage_limit
            );
        }
        Ok(())
    }
}

fn device(brand: &str, os: &str) -> Device {
    Device {
        brand: brand.into(),
        os: os.into(),
    }
}
