use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeLabel {
    User,
    App,
    Device,
    Brand,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::User => "User",
            NodeLabel::App => "App",
            NodeLabel::Device => "Device",
            NodeLabel::Brand => "Brand",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RelType {
    Used,
    On,
    Of,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::Used => "USED",
            RelType::On => "ON",
            RelType::Of => "OF",
        }
    }
}

/// Handle to a node that exists in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub uid: String,
    pub label: NodeLabel,
    pub id_master: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub label: NodeLabel,
    pub id_master: String,
    /// Only set for App nodes.
    pub category: Option<String>,
}

impl NewNode {
    pub fn new(label: NodeLabel, id_master: impl Into<String>) -> Self {
        Self {
            label,
            id_master: id_master.into(),
            category: None,
        }
    }

    pub fn app(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            label: NodeLabel::App,
            id_master: name.into(),
            category: Some(category.into()),
        }
    }
}

/// Properties a USED edge carries in addition to its creation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageEvent {
    pub time_event: DateTime<Utc>,
    pub usage_minutes: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewEdge {
    pub rel: RelType,
    pub source: NodeRef,
    pub target: NodeRef,
    pub time_created: DateTime<Utc>,
    pub usage: Option<UsageEvent>,
}

/// What one ingestion pass actually wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounts {
    pub users: usize,
    pub apps: usize,
    pub devices: usize,
    pub brands: usize,
    pub used_edges: usize,
    pub on_edges: usize,
    pub of_edges: usize,
}

impl IngestCounts {
    pub fn nodes(&self) -> usize {
        self.users + self.apps + self.devices + self.brands
    }

    pub fn edges(&self) -> usize {
        self.used_edges + self.on_edges + self.of_edges
    }

    pub fn is_empty(&self) -> bool {
        self.nodes() == 0 && self.edges() == 0
    }

    pub(crate) fn record_node(&mut self, label: NodeLabel) {
        match label {
            NodeLabel::User => self.users += 1,
            NodeLabel::App => self.apps += 1,
            NodeLabel::Device => self.devices += 1,
            NodeLabel::Brand => self.brands += 1,
        }
    }

    pub(crate) fn record_edge(&mut self, rel: RelType) {
        match rel {
            RelType::Used => self.used_edges += 1,
            RelType::On => self.on_edges += 1,
            RelType::Of => self.of_edges += 1,
        }
    }
}

impl AddAssign for IngestCounts {
    fn add_assign(&mut self, other: Self) {
        self.users += other.users;
        self.apps += other.apps;
        self.devices += other.devices;
        self.brands += other.brands;
        self.used_edges += other.used_edges;
        self.on_edges += other.on_edges;
        self.of_edges += other.of_edges;
    }
}
