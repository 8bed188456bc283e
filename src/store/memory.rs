use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::GraphStore;
use crate::{
    error::StoreError,
    models::{NewEdge, NewNode, NodeLabel, NodeRef, RelType},
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredNode {
    pub node: NodeRef,
    pub category: Option<String>,
}

/// Process-local graph, mostly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: BTreeMap<(NodeLabel, String), StoredNode>,
    edges: Vec<NewEdge>,
    next_uid: u64,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self, label: NodeLabel) -> usize {
        self.nodes.keys().filter(|(l, _)| *l == label).count()
    }

    pub fn edge_count(&self, rel: RelType) -> usize {
        self.edges.iter().filter(|edge| edge.rel == rel).count()
    }

    pub fn node(&self, label: NodeLabel, id_master: &str) -> Option<&StoredNode> {
        self.nodes.get(&(label, id_master.to_string()))
    }

    pub fn edges(&self) -> &[NewEdge] {
        &self.edges
    }
}

impl GraphStore for MemoryGraph {
    fn last_event_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self
            .edges
            .iter()
            .filter(|edge| edge.rel == RelType::Used)
            .filter_map(|edge| edge.usage.map(|usage| usage.time_event))
            .max())
    }

    fn find_node(&self, label: NodeLabel, id_master: &str) -> Result<Option<NodeRef>, StoreError> {
        Ok(self.node(label, id_master).map(|stored| stored.node.clone()))
    }

    fn create_node(&mut self, node: &NewNode) -> Result<NodeRef, StoreError> {
        let key = (node.label, node.id_master.clone());
        if self.nodes.contains_key(&key) {
            return Err(StoreError::Constraint {
                label: node.label.as_str(),
                id: node.id_master.clone(),
            });
        }

        self.next_uid += 1;
        let node_ref = NodeRef {
            uid: format!("mem-{}", self.next_uid),
            label: node.label,
            id_master: node.id_master.clone(),
        };
        self.nodes.insert(
            key,
            StoredNode {
                node: node_ref.clone(),
                category: node.category.clone(),
            },
        );
        Ok(node_ref)
    }

    fn edge_exists(
        &self,
        rel: RelType,
        source: &NodeRef,
        target: &NodeRef,
    ) -> Result<bool, StoreError> {
        Ok(self
            .edges
            .iter()
            .any(|edge| edge.rel == rel && edge.source.uid == source.uid && edge.target.uid == target.uid))
    }

    fn create_edge(&mut self, edge: &NewEdge) -> Result<(), StoreError> {
        self.edges.push(edge.clone());
        Ok(())
    }
}
