use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::{
    db::{
        helpers::{from_timestamp, parse_datetime, parse_label},
        Database,
    },
    error::StoreError,
    ingest::upsert,
    models::{IngestCounts, NewEdge, NewNode, NodeLabel, NodeRef, RelType, UsageRecord},
    store::GraphStore,
};

/// SQLite-backed [`GraphStore`]. Every call is its own implicit
/// transaction.
pub struct GraphRepository<'a> {
    conn: &'a Connection,
}

impl<'a> GraphRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn summary(&self) -> Result<GraphSummary, StoreError> {
        let mut summary = GraphSummary::default();

        let mut stmt = self
            .conn
            .prepare("SELECT label, COUNT(*) FROM nodes GROUP BY label")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let label = parse_label(&row.get::<_, String>(0)?)?;
            summary.nodes.insert(label, row.get::<_, i64>(1)? as usize);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT rel_type, COUNT(*) FROM relationships GROUP BY rel_type")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let rel: String = row.get(0)?;
            summary.relationships.insert(rel, row.get::<_, i64>(1)? as usize);
        }

        summary.heartbeat = self.last_event_time()?;
        summary.last_written_at = self
            .conn
            .query_row("SELECT MAX(time_created) FROM relationships", [], |row| {
                row.get::<_, Option<String>>(0)
            })?
            .map(|raw| parse_datetime(&raw, "time_created"))
            .transpose()?;

        Ok(summary)
    }
}

impl GraphStore for GraphRepository<'_> {
    fn last_event_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let max: Option<i64> = self.conn.query_row(
            "SELECT MAX(time_event) FROM relationships WHERE rel_type = 'USED'",
            [],
            |row| row.get(0),
        )?;
        max.map(|ts| from_timestamp(ts, "time_event")).transpose()
    }

    fn find_node(&self, label: NodeLabel, id_master: &str) -> Result<Option<NodeRef>, StoreError> {
        self.conn
            .query_row(
                "SELECT uid FROM nodes WHERE label = ?1 AND id_master = ?2",
                params![label.as_str(), id_master],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map(|uid| {
                uid.map(|uid| NodeRef {
                    uid,
                    label,
                    id_master: id_master.to_string(),
                })
            })
            .map_err(Into::into)
    }

    fn create_node(&mut self, node: &NewNode) -> Result<NodeRef, StoreError> {
        let uid = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        let result = self.conn.execute(
            "INSERT INTO nodes (uid, label, id_master, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![uid, node.label.as_str(), node.id_master, node.category, now],
        );

        match result {
            Ok(_) => Ok(NodeRef {
                uid,
                label: node.label,
                id_master: node.id_master.clone(),
            }),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Constraint {
                    label: node.label.as_str(),
                    id: node.id_master.clone(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn edge_exists(
        &self,
        rel: RelType,
        source: &NodeRef,
        target: &NodeRef,
    ) -> Result<bool, StoreError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM relationships
                 WHERE rel_type = ?1 AND source_uid = ?2 AND target_uid = ?3
                 LIMIT 1",
                params![rel.as_str(), source.uid, target.uid],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn create_edge(&mut self, edge: &NewEdge) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO relationships (rel_type, source_uid, target_uid, time_created, time_event, usage_minutes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                edge.rel.as_str(),
                edge.source.uid,
                edge.target.uid,
                edge.time_created.to_rfc3339(),
                edge.usage.map(|usage| usage.time_event.timestamp()),
                edge.usage.map(|usage| usage.usage_minutes),
            ],
        )?;
        Ok(())
    }
}

/// Node and relationship totals, for the CLI and for tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphSummary {
    pub nodes: BTreeMap<NodeLabel, usize>,
    pub relationships: BTreeMap<String, usize>,
    pub heartbeat: Option<DateTime<Utc>>,
    pub last_written_at: Option<DateTime<Utc>>,
}

impl GraphSummary {
    pub fn node_count(&self, label: NodeLabel) -> usize {
        self.nodes.get(&label).copied().unwrap_or(0)
    }

    pub fn edge_count(&self, rel: RelType) -> usize {
        self.relationships.get(rel.as_str()).copied().unwrap_or(0)
    }
}

// Database async wrappers for graph operations
impl Database {
    /// The ingestion watermark.
    pub async fn last_event_time(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.execute(|conn| GraphRepository::new(conn).last_event_time())
            .await
    }

    /// Upsert `records` into the graph. Records are applied one call at a
    /// time; a failure part-way leaves earlier writes in place.
    pub async fn ingest_records(&self, records: Vec<UsageRecord>) -> Result<IngestCounts, StoreError> {
        self.execute(move |conn| {
            let mut repo = GraphRepository::new(conn);
            upsert::ingest(&mut repo, &records, Utc::now())
        })
        .await
    }

    pub async fn graph_summary(&self) -> Result<GraphSummary, StoreError> {
        self.execute(|conn| GraphRepository::new(conn).summary())
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::db::migrations::run_migrations;
    use crate::models::UsageEvent;

    fn connection() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn duplicate_node_is_a_constraint_error() {
        let conn = connection();
        let mut repo = GraphRepository::new(&conn);

        let brand = repo.create_node(&NewNode::new(NodeLabel::Brand, "apple")).unwrap();
        assert_eq!(repo.find_node(NodeLabel::Brand, "apple").unwrap(), Some(brand));

        let err = repo
            .create_node(&NewNode::new(NodeLabel::Brand, "apple"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint { label: "Brand", .. }));
    }

    #[test]
    fn same_id_under_different_labels_is_allowed() {
        let conn = connection();
        let mut repo = GraphRepository::new(&conn);

        repo.create_node(&NewNode::new(NodeLabel::Device, "android")).unwrap();
        repo.create_node(&NewNode::new(NodeLabel::Brand, "android")).unwrap();
        assert!(repo.find_node(NodeLabel::User, "android").unwrap().is_none());
    }

    #[test]
    fn heartbeat_is_latest_used_event() {
        let conn = connection();
        let mut repo = GraphRepository::new(&conn);
        assert_eq!(repo.last_event_time().unwrap(), None);

        let user = repo.create_node(&NewNode::new(NodeLabel::User, "a@x.com")).unwrap();
        let app = repo.create_node(&NewNode::app("slack", "communication")).unwrap();
        for day in [3, 9, 5] {
            let time_event = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
            repo.create_edge(&NewEdge {
                rel: RelType::Used,
                source: user.clone(),
                target: app.clone(),
                time_created: Utc::now(),
                usage: Some(UsageEvent {
                    time_event,
                    usage_minutes: 10.0,
                }),
            })
            .unwrap();
        }

        assert_eq!(
            repo.last_event_time().unwrap(),
            Some(Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap())
        );
        assert!(repo.edge_exists(RelType::Used, &user, &app).unwrap());
        assert!(!repo.edge_exists(RelType::On, &user, &app).unwrap());

        let summary = repo.summary().unwrap();
        assert_eq!(summary.edge_count(RelType::Used), 3);
        assert_eq!(summary.node_count(NodeLabel::App), 1);
        assert!(summary.last_written_at.is_some());
    }

    #[test]
    fn edges_must_point_at_existing_nodes() {
        let conn = connection();
        let mut repo = GraphRepository::new(&conn);
        let app = repo.create_node(&NewNode::app("jira", "task_management")).unwrap();
        let ghost = NodeRef {
            uid: "missing".into(),
            label: NodeLabel::Device,
            id_master: "ios".into(),
        };

        let err = repo
            .create_edge(&NewEdge {
                rel: RelType::On,
                source: app,
                target: ghost,
                time_created: Utc::now(),
                usage: None,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
