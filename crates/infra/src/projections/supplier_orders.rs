use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use partsupply_core::{Cents, SupplierId, UserId};
use partsupply_events::EventEnvelope;
use partsupply_fulfillment::{OrderLine, OrderStatus, StatusChange, SupplierOrderEvent, SupplierOrderId};
use partsupply_suppliers::OrderTimeline;

use super::Projection;
use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemorySupplierStore, SupplierStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierOrderView {
    pub order_id: SupplierOrderId,
    pub buyer_id: UserId,
    pub order_ref: String,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub total: Cents,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub actual_delivery: Option<DateTime<Utc>>,
    pub notes: Vec<String>,
    pub history: Vec<StatusChange>,
}

impl SupplierOrderView {
    pub fn placed_at(&self) -> DateTime<Utc> {
        self.history.first().map(|c| c.at).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn first_entered(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        self.history.iter().find(|c| c.to == status).map(|c| c.at)
    }

    /// What the metrics calculator needs from this order.
    pub fn timeline(&self) -> OrderTimeline {
        OrderTimeline {
            received_at: self.placed_at(),
            first_processing_at: self.first_entered(OrderStatus::Processing),
            delivered: self.status == OrderStatus::Delivered,
        }
    }
}

#[derive(Debug)]
pub struct SupplierOrdersProjection<S = InMemorySupplierStore<SupplierOrderId, SupplierOrderView>>
where
    S: SupplierStore<SupplierOrderId, SupplierOrderView>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for SupplierOrdersProjection {
    fn default() -> Self {
        Self::new(InMemorySupplierStore::new())
    }
}

impl<S> SupplierOrdersProjection<S>
where
    S: SupplierStore<SupplierOrderId, SupplierOrderView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, supplier_id: SupplierId, order_id: &SupplierOrderId) -> Option<SupplierOrderView> {
        self.store.get(supplier_id, order_id)
    }

    /// Full order history of a supplier, oldest first.
    pub fn list(&self, supplier_id: SupplierId) -> Vec<SupplierOrderView> {
        let mut orders = self.store.list(supplier_id);
        orders.sort_by(|a, b| a.placed_at().cmp(&b.placed_at()).then_with(|| a.order_id.cmp(&b.order_id)));
        orders
    }

    /// Orders placed at or after `since`.
    pub fn placed_since(&self, supplier_id: SupplierId, since: DateTime<Utc>) -> Vec<SupplierOrderView> {
        self.list(supplier_id)
            .into_iter()
            .filter(|o| o.placed_at() >= since)
            .collect()
    }

    fn apply_event(&self, supplier_id: SupplierId, event: SupplierOrderEvent) -> Result<(), ProjectionError> {
        match event {
            SupplierOrderEvent::OrderPlaced(e) => {
                let total = e
                    .lines
                    .iter()
                    .map(OrderLine::total)
                    .fold(0, u64::saturating_add);
                self.store.upsert(
                    supplier_id,
                    e.order_id,
                    SupplierOrderView {
                        order_id: e.order_id,
                        buyer_id: e.buyer_id,
                        order_ref: e.order_ref,
                        status: OrderStatus::Received,
                        lines: e.lines,
                        total,
                        tracking_number: None,
                        estimated_delivery: e.estimated_delivery,
                        actual_delivery: None,
                        notes: vec![],
                        history: vec![StatusChange {
                            from: None,
                            to: OrderStatus::Received,
                            at: e.occurred_at,
                        }],
                    },
                );
            }
            SupplierOrderEvent::OrderStatusChanged(e) => {
                let mut view = self.store.get(supplier_id, &e.order_id).ok_or_else(|| {
                    ProjectionError::SupplierIsolation(format!("supplier order {} not projected", e.order_id))
                })?;
                view.status = e.to;
                if e.tracking_number.is_some() {
                    view.tracking_number = e.tracking_number;
                }
                if e.estimated_delivery.is_some() {
                    view.estimated_delivery = e.estimated_delivery;
                }
                if let Some(note) = e.notes {
                    view.notes.push(note);
                }
                if e.to == OrderStatus::Delivered {
                    view.actual_delivery = Some(e.occurred_at);
                }
                view.history.push(StatusChange {
                    from: Some(e.from),
                    to: e.to,
                    at: e.occurred_at,
                });
                self.store.upsert(supplier_id, e.order_id, view);
            }
        }
        Ok(())
    }
}

impl<S> Projection for SupplierOrdersProjection<S>
where
    S: SupplierStore<SupplierOrderId, SupplierOrderView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::SUPPLIER_ORDER
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.aggregate_type() {
            return Ok(());
        }

        self.cursors.advance(envelope, || {
            let event: SupplierOrderEvent =
                decode(envelope, streams::SUPPLIER_ORDER, SupplierOrderEvent::supplier_id)?;
            if event.order_id().0 != envelope.aggregate_id() {
                return Err(ProjectionError::SupplierIsolation(
                    "event order_id does not match envelope aggregate_id".to_string(),
                ));
            }
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
