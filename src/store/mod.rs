//! The four store primitives ingestion relies on.
//!
//! Nothing here is atomic across calls: lookup-then-create assumes a single
//! writer, which the scheduler guarantees by never overlapping ingestion
//! runs. A multi-writer store would need an insert-or-get primitive instead.

pub mod memory;

use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    models::{NewEdge, NewNode, NodeLabel, NodeRef, RelType},
};

pub use memory::MemoryGraph;

pub trait GraphStore {
    /// Latest `time_event` across all USED edges, `None` on an empty graph.
    fn last_event_time(&self) -> Result<Option<DateTime<Utc>>, StoreError>;

    fn find_node(&self, label: NodeLabel, id_master: &str) -> Result<Option<NodeRef>, StoreError>;

    fn create_node(&mut self, node: &NewNode) -> Result<NodeRef, StoreError>;

    fn edge_exists(
        &self,
        rel: RelType,
        source: &NodeRef,
        target: &NodeRef,
    ) -> Result<bool, StoreError>;

    fn create_edge(&mut self, edge: &NewEdge) -> Result<(), StoreError>;
}
