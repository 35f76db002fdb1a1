use std::collections::HashMap;
use std::sync::RwLock;

use partsupply_core::{AggregateId, ExpectedVersion, SupplierId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    supplier_id: SupplierId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
struct Streams {
    by_key: HashMap<StreamKey, Vec<StoredEvent>>,
    /// Commit order across all streams.
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// A single write lock covers the version check and the append, which makes
/// `append` a compare-and-set on the stream head.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<Streams>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        let supplier_id = first.supplier_id;
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.supplier_id != supplier_id {
                return Err(EventStoreError::SupplierIsolation(format!(
                    "batch contains multiple supplier_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let key = StreamKey {
            supplier_id,
            aggregate_id,
        };

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;
        let Streams { by_key, log } = &mut *streams;

        let stream = by_key.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(e, sequence_number)| StoredEvent {
                event_id: e.event_id,
                supplier_id: e.supplier_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            })
            .collect();

        stream.extend(committed.iter().cloned());
        log.extend(committed.iter().cloned());

        Ok(committed)
    }

    fn load_stream(
        &self,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            supplier_id,
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.by_key.get(&key).cloned().unwrap_or_default())
    }

    fn read_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.log.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(supplier_id: SupplierId, aggregate_id: AggregateId) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            supplier_id,
            aggregate_id,
            aggregate_type: "inventory.item".to_string(),
            event_type: "inventory.item.added".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        }
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let supplier_id = SupplierId::new();
        let aggregate_id = AggregateId::new();

        store
            .append(vec![event(supplier_id, aggregate_id)], ExpectedVersion::Exact(0))
            .unwrap();
        let err = store
            .append(vec![event(supplier_id, aggregate_id)], ExpectedVersion::Exact(0))
            .unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
        assert_eq!(store.load_stream(supplier_id, aggregate_id).unwrap().len(), 1);
    }

    #[test]
    fn streams_are_isolated_per_supplier() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        let a = SupplierId::new();
        let b = SupplierId::new();

        store
            .append(vec![event(a, aggregate_id), event(a, aggregate_id)], ExpectedVersion::Exact(0))
            .unwrap();

        assert!(store.load_stream(b, aggregate_id).unwrap().is_empty());
        let seqs: Vec<u64> = store
            .load_stream(a, aggregate_id)
            .unwrap()
            .iter()
            .map(|e| e.sequence_number)
            .collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(store.read_all().unwrap().len(), 2);
    }

    #[test]
    fn mixed_supplier_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();
        let err = store
            .append(
                vec![event(SupplierId::new(), aggregate_id), event(SupplierId::new(), aggregate_id)],
                ExpectedVersion::Any,
            )
            .unwrap_err();
        assert!(matches!(err, EventStoreError::SupplierIsolation(_)));
    }
}
