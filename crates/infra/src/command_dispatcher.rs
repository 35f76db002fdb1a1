//! Command execution pipeline.
//!
//! ```text
//! Command
//!   -> load stream (supplier-scoped)
//!   -> rehydrate aggregate
//!   -> handle (pure decision)
//!   -> append with ExpectedVersion::Exact(head)
//!   -> publish committed events
//! ```
//!
//! The exact-version append is what keeps two concurrent reservations on the
//! same item from both committing. `dispatch_with_retry` re-runs the whole
//! cycle when it loses such a race, so the losing command is re-decided
//! against the winner's state.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use partsupply_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, SupplierId};
use partsupply_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The stream moved between load and append.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("supplier isolation violation: {0}")]
    SupplierIsolation(String),

    /// The aggregate rejected the command.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store error: {0}")]
    Store(EventStoreError),

    /// Append succeeded but publication failed; the events are durable.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::SupplierIsolation(msg) => DispatchError::SupplierIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl DispatchError {
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            DispatchError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of a committed command: the aggregate after the new events, and
/// the events as stored.
#[derive(Debug, Clone)]
pub struct Dispatched<A> {
    pub aggregate: A,
    pub committed: Vec<StoredEvent>,
}

/// Reusable command execution engine for event-sourced aggregates.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate without running a command.
    pub fn load<A>(
        &self,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(SupplierId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let (aggregate, _) = self.rehydrate(supplier_id, aggregate_id, make_aggregate)?;
        Ok(aggregate)
    }

    /// Run the decision step only. Nothing is appended or published.
    ///
    /// Used to pre-validate every step of a multi-aggregate operation before
    /// committing any of them.
    pub fn decide<A>(
        &self,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        command: &A::Command,
        make_aggregate: impl FnOnce(SupplierId, AggregateId) -> A,
    ) -> Result<Vec<A::Event>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DeserializeOwned,
    {
        let (aggregate, _) = self.rehydrate(supplier_id, aggregate_id, make_aggregate)?;
        Ok(aggregate.handle(command)?)
    }

    /// Dispatch a command through the full pipeline, once.
    ///
    /// A stale head surfaces as `DispatchError::Concurrency`. A command that
    /// decides no events commits nothing and returns the current state.
    pub fn dispatch<A>(
        &self,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce(SupplierId, AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: partsupply_events::Event + Serialize + DeserializeOwned,
    {
        let (mut aggregate, head) = self.rehydrate(supplier_id, aggregate_id, make_aggregate)?;

        let decided = aggregate.handle(command)?;
        if decided.is_empty() {
            return Ok(Dispatched {
                aggregate,
                committed: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(supplier_id, aggregate_id, aggregate_type, Uuid::now_v7(), ev)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, ExpectedVersion::Exact(head))?;

        for ev in &decided {
            aggregate.apply(ev);
        }

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(Dispatched { aggregate, committed })
    }

    /// `dispatch`, re-run from a fresh load on concurrency conflicts.
    ///
    /// Gives up after `retries` additional attempts and returns the last
    /// conflict.
    pub fn dispatch_with_retry<A>(
        &self,
        retries: u32,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl Fn(SupplierId, AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: partsupply_events::Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0u32;
        loop {
            match self.dispatch(supplier_id, aggregate_id, aggregate_type, command, &make_aggregate) {
                Err(DispatchError::Concurrency(msg)) if attempt < retries => {
                    attempt += 1;
                    tracing::debug!(
                        %supplier_id,
                        %aggregate_id,
                        aggregate_type,
                        attempt,
                        conflict = %msg,
                        "retrying command after concurrency conflict"
                    );
                }
                other => return other,
            }
        }
    }

    fn rehydrate<A>(
        &self,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(SupplierId, AggregateId) -> A,
    ) -> Result<(A, u64), DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(supplier_id, aggregate_id)?;
        validate_loaded_stream(supplier_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(supplier_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;

        Ok((aggregate, stream_version(&history)))
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    supplier_id: SupplierId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.supplier_id != supplier_id {
            return Err(DispatchError::SupplierIsolation(format!(
                "loaded stream contains wrong supplier_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::SupplierIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "stream out of sequence (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use chrono::Utc;
    use partsupply_core::{AggregateRoot, PartId};
    use partsupply_events::InMemoryEventBus;
    use partsupply_inventory::{
        AddItem, InventoryCommand, InventoryItem, InventoryItemId, ItemCondition, ItemSettings,
        ReserveStock,
    };
    use std::sync::Arc;

    type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

    fn dispatcher() -> Dispatcher {
        CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
    }

    fn settings() -> ItemSettings {
        ItemSettings {
            reorder_point: 2,
            reorder_quantity: 10,
            auto_reorder_enabled: false,
            cost_price: 1_000,
            markup_bps: 2_000,
            condition: ItemCondition::New,
            warranty_months: 0,
            location: None,
        }
    }

    fn make(_: SupplierId, id: AggregateId) -> InventoryItem {
        InventoryItem::empty(InventoryItemId::new(id))
    }

    fn add_item(d: &Dispatcher, supplier_id: SupplierId, quantity: i64) -> InventoryItemId {
        let item_id = InventoryItemId::new(AggregateId::new());
        let cmd = InventoryCommand::AddItem(AddItem {
            supplier_id,
            item_id,
            part_id: PartId::new(),
            sku: "BRK-001".to_string(),
            initial_quantity: quantity,
            settings: settings(),
            occurred_at: Utc::now(),
        });
        d.dispatch(supplier_id, item_id.0, "inventory.item", &cmd, make).unwrap();
        item_id
    }

    fn reserve(supplier_id: SupplierId, item_id: InventoryItemId, quantity: i64) -> InventoryCommand {
        InventoryCommand::ReserveStock(ReserveStock {
            supplier_id,
            item_id,
            order_id: AggregateId::new(),
            quantity,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_returns_the_updated_aggregate() {
        let d = dispatcher();
        let supplier_id = SupplierId::new();
        let item_id = add_item(&d, supplier_id, 10);

        let out = d
            .dispatch(supplier_id, item_id.0, "inventory.item", &reserve(supplier_id, item_id, 2), make)
            .unwrap();
        assert_eq!(out.aggregate.quantity_available(), 8);
        assert_eq!(out.aggregate.version(), 2);
        assert_eq!(out.committed[0].sequence_number, 2);
    }

    #[test]
    fn decide_does_not_persist() {
        let d = dispatcher();
        let supplier_id = SupplierId::new();
        let item_id = add_item(&d, supplier_id, 10);

        let events = d
            .decide(supplier_id, item_id.0, &reserve(supplier_id, item_id, 3), make)
            .unwrap();
        assert_eq!(events.len(), 1);

        let item = d.load(supplier_id, item_id.0, make).unwrap();
        assert_eq!(item.quantity_available(), 10);
    }

    #[test]
    fn domain_rejection_is_surfaced_unchanged() {
        let d = dispatcher();
        let supplier_id = SupplierId::new();
        let item_id = add_item(&d, supplier_id, 1);

        let err = d
            .dispatch_with_retry(3, supplier_id, item_id.0, "inventory.item", &reserve(supplier_id, item_id, 5), make)
            .unwrap_err();
        assert_eq!(err.domain(), Some(&DomainError::insufficient_stock(5, 1)));
    }

    #[test]
    fn other_suppliers_cannot_see_the_stream() {
        let d = dispatcher();
        let owner = SupplierId::new();
        let item_id = add_item(&d, owner, 4);

        let stranger = SupplierId::new();
        let item = d.load(stranger, item_id.0, make).unwrap();
        assert!(!item.is_created());
    }
}
