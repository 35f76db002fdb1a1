//! Per-stream projection cursors.
//!
//! Delivery is at-least-once, so each projection remembers the last sequence
//! number it applied for every `(supplier, aggregate)` stream. Replays at or
//! below the cursor are ignored; a skipped sequence number is an error.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use partsupply_core::{AggregateId, SupplierId};
use partsupply_events::EventEnvelope;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: &'static str,
        message: String,
    },

    #[error("supplier isolation violation: {0}")]
    SupplierIsolation(String),

    #[error("sequence gap in stream {aggregate_id} (last={last}, found={found})")]
    SequenceGap {
        aggregate_id: AggregateId,
        last: u64,
        found: u64,
    },

    #[error("projection state unavailable")]
    Poisoned,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    supplier_id: SupplierId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<CursorKey, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `apply` for the envelope unless it was already seen.
    ///
    /// The cursor only advances when `apply` succeeds. The lock is held for
    /// the duration so two deliveries of the same stream cannot interleave.
    pub fn advance(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<(), ProjectionError> {
        let key = CursorKey {
            supplier_id: envelope.supplier_id(),
            aggregate_id: envelope.aggregate_id(),
        };
        let seq = envelope.sequence_number();

        let mut cursors = self.inner.write().map_err(|_| ProjectionError::Poisoned)?;
        let last = cursors.get(&key).copied().unwrap_or(0);

        if seq != 0 && seq <= last {
            return Ok(());
        }
        if seq != last + 1 {
            return Err(ProjectionError::SequenceGap {
                aggregate_id: key.aggregate_id,
                last,
                found: seq,
            });
        }

        apply()?;
        cursors.insert(key, seq);
        Ok(())
    }

    pub fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}

/// Decode a payload and check that it belongs to the envelope's supplier.
pub fn decode<E>(
    envelope: &EventEnvelope<JsonValue>,
    aggregate_type: &'static str,
    supplier_of: impl FnOnce(&E) -> SupplierId,
) -> Result<E, ProjectionError>
where
    E: DeserializeOwned,
{
    let event: E = serde_json::from_value(envelope.payload().clone()).map_err(|e| {
        ProjectionError::Deserialize {
            aggregate_type,
            message: e.to_string(),
        }
    })?;

    if supplier_of(&event) != envelope.supplier_id() {
        return Err(ProjectionError::SupplierIsolation(format!(
            "{aggregate_type} event supplier does not match envelope supplier"
        )));
    }

    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn envelope(supplier_id: SupplierId, aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            supplier_id,
            aggregate_id,
            "inventory.item",
            seq,
            JsonValue::Null,
        )
    }

    #[test]
    fn duplicates_are_ignored_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let supplier_id = SupplierId::new();
        let aggregate_id = AggregateId::new();
        let mut applied = 0;

        cursors.advance(&envelope(supplier_id, aggregate_id, 1), || {
            applied += 1;
            Ok(())
        })
        .unwrap();
        cursors.advance(&envelope(supplier_id, aggregate_id, 1), || {
            applied += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(applied, 1);

        let err = cursors
            .advance(&envelope(supplier_id, aggregate_id, 3), || Ok(()))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::SequenceGap { last: 1, found: 3, .. }));
    }

    #[test]
    fn failed_apply_does_not_move_the_cursor() {
        let cursors = StreamCursors::new();
        let supplier_id = SupplierId::new();
        let aggregate_id = AggregateId::new();

        let _ = cursors.advance(&envelope(supplier_id, aggregate_id, 1), || Err(ProjectionError::Poisoned));
        let mut applied = false;
        cursors
            .advance(&envelope(supplier_id, aggregate_id, 1), || {
                applied = true;
                Ok(())
            })
            .unwrap();
        assert!(applied);
    }
}
