use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    models::{IngestCounts, NewEdge, NewNode, NodeLabel, NodeRef, RelType, UsageEvent, UsageRecord},
    store::GraphStore,
};

const ENABLE_LOGS: bool = true;

/// Read a node by its unique id and create it when absent.
pub fn lookup_or_create<S: GraphStore + ?Sized>(
    store: &mut S,
    node: &NewNode,
    counts: &mut IngestCounts,
) -> Result<NodeRef, StoreError> {
    if let Some(existing) = store.find_node(node.label, &node.id_master)? {
        return Ok(existing);
    }

    crate::log_info!("Creating node for {}: {}", node.label.as_str(), node.id_master);
    let created = store.create_node(node)?;
    counts.record_node(node.label);
    Ok(created)
}

fn connect_once<S: GraphStore + ?Sized>(
    store: &mut S,
    rel: RelType,
    source: &NodeRef,
    target: &NodeRef,
    time_created: DateTime<Utc>,
    counts: &mut IngestCounts,
) -> Result<(), StoreError> {
    if store.edge_exists(rel, source, target)? {
        return Ok(());
    }

    store.create_edge(&NewEdge {
        rel,
        source: source.clone(),
        target: target.clone(),
        time_created,
        usage: None,
    })?;
    counts.record_edge(rel);
    Ok(())
}

/// Upsert one record. USED edges are appended for every usage entry; ON and
/// OF edges are only created when missing.
pub fn ingest_record<S: GraphStore + ?Sized>(
    store: &mut S,
    record: &UsageRecord,
    time_created: DateTime<Utc>,
    counts: &mut IngestCounts,
) -> Result<(), StoreError> {
    let user = lookup_or_create(store, &NewNode::new(NodeLabel::User, &record.user_id), counts)?;
    let device = lookup_or_create(store, &NewNode::new(NodeLabel::Device, &record.device.os), counts)?;
    let brand = lookup_or_create(store, &NewNode::new(NodeLabel::Brand, &record.device.brand), counts)?;

    let time_event = record.event_time();
    for usage in &record.usages {
        let app = lookup_or_create(
            store,
            &NewNode::app(&usage.app_name, &usage.app_category),
            counts,
        )?;

        store.create_edge(&NewEdge {
            rel: RelType::Used,
            source: user.clone(),
            target: app.clone(),
            time_created,
            usage: Some(UsageEvent {
                time_event,
                usage_minutes: usage.minutes_used.as_f64(),
            }),
        })?;
        counts.record_edge(RelType::Used);

        connect_once(store, RelType::On, &app, &device, time_created, counts)?;
    }

    connect_once(store, RelType::Of, &device, &brand, time_created, counts)?;
    Ok(())
}

/// Upsert a validated batch, oldest `usage_date` first (stable for records
/// of the same day). There is no transaction around the batch: on error,
/// writes for earlier records (and earlier calls of the failing record)
/// remain.
///
/// The day ordering keeps the heartbeat from passing a day that was never
/// written, so a rerun rediscovers every later file. Records of the failing
/// day that come after the failure are only picked up again if nothing of
/// that day reached a USED edge.
pub fn ingest<S: GraphStore + ?Sized>(
    store: &mut S,
    records: &[UsageRecord],
    time_created: DateTime<Utc>,
) -> Result<IngestCounts, StoreError> {
    let mut ordered: Vec<&UsageRecord> = records.iter().collect();
    ordered.sort_by_key(|record| record.usage_date);

    let mut counts = IngestCounts::default();
    for record in ordered {
        ingest_record(store, record, time_created, &mut counts).map_err(|err| {
            crate::log_error!(
                "Failed to ingest record for {} on {}: {err}",
                record.user_id,
                record.usage_date
            );
            err
        })?;
    }
    Ok(counts)
}
