use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use partsupply_core::SupplierId;
use partsupply_events::EventEnvelope;
use partsupply_inventory::{InventoryItemId, ReorderEvent, ReorderPriority, ReorderRequestId, ReorderStatus};

use super::Projection;
use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemorySupplierStore, SupplierStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderView {
    pub request_id: ReorderRequestId,
    pub item_id: InventoryItemId,
    pub requested_quantity: i64,
    pub received_quantity: Option<i64>,
    pub priority: ReorderPriority,
    pub status: ReorderStatus,
    pub opened_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ReorderRequestsProjection<S = InMemorySupplierStore<ReorderRequestId, ReorderView>>
where
    S: SupplierStore<ReorderRequestId, ReorderView>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for ReorderRequestsProjection {
    fn default() -> Self {
        Self::new(InMemorySupplierStore::new())
    }
}

impl<S> ReorderRequestsProjection<S>
where
    S: SupplierStore<ReorderRequestId, ReorderView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, supplier_id: SupplierId, request_id: &ReorderRequestId) -> Option<ReorderView> {
        self.store.get(supplier_id, request_id)
    }

    /// Requests of a supplier, oldest first.
    pub fn list(&self, supplier_id: SupplierId) -> Vec<ReorderView> {
        let mut requests = self.store.list(supplier_id);
        requests.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then_with(|| a.request_id.cmp(&b.request_id)));
        requests
    }

    pub fn pending_for_item(&self, supplier_id: SupplierId, item_id: InventoryItemId) -> Vec<ReorderView> {
        self.list(supplier_id)
            .into_iter()
            .filter(|r| r.item_id == item_id && r.status == ReorderStatus::Pending)
            .collect()
    }

    fn apply_event(&self, supplier_id: SupplierId, event: ReorderEvent) -> Result<(), ProjectionError> {
        let request_id = event.request_id();
        match event {
            ReorderEvent::ReorderOpened(e) => {
                self.store.upsert(
                    supplier_id,
                    request_id,
                    ReorderView {
                        request_id,
                        item_id: e.item_id,
                        requested_quantity: e.requested_quantity,
                        received_quantity: None,
                        priority: e.priority,
                        status: ReorderStatus::Pending,
                        opened_at: e.occurred_at,
                    },
                );
            }
            ReorderEvent::ReorderApproved(_) => {
                let mut view = self.existing(supplier_id, request_id)?;
                view.status = ReorderStatus::Approved;
                self.store.upsert(supplier_id, request_id, view);
            }
            ReorderEvent::ReorderFulfilled(e) => {
                let mut view = self.existing(supplier_id, request_id)?;
                view.status = ReorderStatus::Fulfilled;
                view.received_quantity = Some(e.received_quantity);
                self.store.upsert(supplier_id, request_id, view);
            }
        }
        Ok(())
    }

    fn existing(&self, supplier_id: SupplierId, request_id: ReorderRequestId) -> Result<ReorderView, ProjectionError> {
        self.store
            .get(supplier_id, &request_id)
            .ok_or_else(|| ProjectionError::SupplierIsolation(format!("reorder request {request_id} not projected")))
    }
}

impl<S> Projection for ReorderRequestsProjection<S>
where
    S: SupplierStore<ReorderRequestId, ReorderView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::REORDER_REQUEST
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.aggregate_type() {
            return Ok(());
        }

        self.cursors.advance(envelope, || {
            let event: ReorderEvent = decode(envelope, streams::REORDER_REQUEST, ReorderEvent::supplier_id)?;
            self.apply_event(envelope.supplier_id(), event)
        })
    }

    fn reset(&self) {
        self.cursors.clear();
        for supplier_id in self.store.suppliers() {
            self.store.clear_supplier(supplier_id);
        }
    }
}
