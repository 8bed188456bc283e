pub mod graph;
pub mod usage;

pub use graph::{IngestCounts, NewEdge, NewNode, NodeLabel, NodeRef, RelType, UsageEvent};
pub use usage::{AppUsage, Device, Minutes, UsageRecord};
