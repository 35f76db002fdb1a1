use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use partsupply_core::{BasisPoints, Cents, PartId, SupplierId};
use partsupply_events::EventEnvelope;
use partsupply_inventory::{InventoryEvent, InventoryItemId, ItemStatus, ReorderRequestId};

use super::Projection;
use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemorySupplierStore, SupplierStore};
use crate::streams;

/// Current ledger position of one supplier SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLevel {
    pub item_id: InventoryItemId,
    pub part_id: PartId,
    pub sku: String,
    pub quantity_available: i64,
    pub quantity_reserved: i64,
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub auto_reorder_enabled: bool,
    pub cost_price: Cents,
    pub markup_bps: BasisPoints,
    pub retired: bool,
    pub pending_reorder: Option<ReorderRequestId>,
    pub last_restocked: Option<DateTime<Utc>>,
}

impl InventoryLevel {
    pub fn status(&self) -> ItemStatus {
        if self.retired {
            ItemStatus::Retired
        } else if self.quantity_available == 0 {
            ItemStatus::OutOfStock
        } else {
            ItemStatus::Active
        }
    }

    pub fn is_low_stock(&self) -> bool {
        !self.retired && self.quantity_available <= self.reorder_point
    }

    /// Stock on hand valued at cost.
    pub fn valuation(&self) -> Cents {
        let units = u64::try_from(self.quantity_available + self.quantity_reserved).unwrap_or(0);
        self.cost_price.saturating_mul(units)
    }
}

#[derive(Debug)]
pub struct InventoryLevelsProjection<S = InMemorySupplierStore<InventoryItemId, InventoryLevel>>
where
    S: SupplierStore<InventoryItemId, InventoryLevel>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for InventoryLevelsProjection {
    fn default() -> Self {
        Self::new(InMemorySupplierStore::new())
    }
}

impl<S> InventoryLevelsProjection<S>
where
    S: SupplierStore<InventoryItemId, InventoryLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, supplier_id: SupplierId, item_id: &InventoryItemId) -> Option<InventoryLevel> {
        self.store.get(supplier_id, item_id)
    }

    /// All items of a supplier, ordered by SKU.
    pub fn list(&self, supplier_id: SupplierId) -> Vec<InventoryLevel> {
        let mut items = self.store.list(supplier_id);
        items.sort_by(|a, b| a.sku.cmp(&b.sku).then_with(|| a.item_id.cmp(&b.item_id)));
        items
    }

    pub fn find_by_part(&self, supplier_id: SupplierId, part_id: PartId) -> Vec<InventoryLevel> {
        self.list(supplier_id)
            .into_iter()
            .filter(|l| l.part_id == part_id && !l.retired)
            .collect()
    }

    fn update(
        &self,
        supplier_id: SupplierId,
        item_id: InventoryItemId,
        change: impl FnOnce(&mut InventoryLevel),
    ) -> Result<(), ProjectionError> {
        let mut level = self.store.get(supplier_id, &item_id).ok_or_else(|| {
            ProjectionError::SupplierIsolation(format!("inventory item {item_id} not projected"))
        })?;
        change(&mut level);
        self.store.upsert(supplier_id, item_id, level);
        Ok(())
    }

    fn apply_event(&self, supplier_id: SupplierId, event: InventoryEvent) -> Result<(), ProjectionError> {
        let item_id = event.item_id();
        match event {
            InventoryEvent::ItemAdded(e) => {
                self.store.upsert(
                    supplier_id,
                    e.item_id,
                    InventoryLevel {
                        item_id: e.item_id,
                        part_id: e.part_id,
                        sku: e.sku,
                        quantity_available: e.initial_quantity,
                        quantity_reserved: 0,
                        reorder_point: e.settings.reorder_point,
                        reorder_quantity: e.settings.reorder_quantity,
                        auto_reorder_enabled: e.settings.auto_reorder_enabled,
                        cost_price: e.settings.cost_price,
                        markup_bps: e.settings.markup_bps,
                        retired: false,
                        pending_reorder: None,
                        last_restocked: (e.initial_quantity > 0).then_some(e.occurred_at),
                    },
                );
                Ok(())
            }
            InventoryEvent::StockReserved(e) => self.update(supplier_id, item_id, |l| {
                l.quantity_available -= e.quantity;
                l.quantity_reserved += e.quantity;
            }),
            InventoryEvent::ReservationReleased(e) => self.update(supplier_id, item_id, |l| {
                l.quantity_reserved -= e.quantity;
                l.quantity_available += e.quantity;
            }),
            InventoryEvent::ReservedStockShipped(e) => self.update(supplier_id, item_id, |l| {
                l.quantity_reserved -= e.quantity;
            }),
            InventoryEvent::StockAdjusted(e) => self.update(supplier_id, item_id, |l| {
                if e.new_available > e.previous_available {
                    l.last_restocked = Some(e.occurred_at);
                }
                l.quantity_available = e.new_available;
            }),
            InventoryEvent::SettingsUpdated(e) => self.update(supplier_id, item_id, |l| {
                l.reorder_point = e.settings.reorder_point;
                l.reorder_quantity = e.settings.reorder_quantity;
                l.auto_reorder_enabled = e.settings.auto_reorder_enabled;
                l.cost_price = e.settings.cost_price;
                l.markup_bps = e.settings.markup_bps;
            }),
            InventoryEvent::ItemRetired(_) => self.update(supplier_id, item_id, |l| l.retired = true),
            InventoryEvent::ReorderMarked(e) => {
                self.update(supplier_id, item_id, |l| l.pending_reorder = Some(e.request_id))
            }
            InventoryEvent::ReorderCleared(_) => {
                self.update(supplier_id, item_id, |l| l.pending_reorder = None)
            }
        }
    }
}

impl<S> Projection for InventoryLevelsProjection<S>
where
    S: SupplierStore<InventoryItemId, InventoryLevel>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::INVENTORY_ITEM
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.aggregate_type() {
            return Ok(());
        }

        self.cursors.advance(envelope, || {
            let event: InventoryEvent = decode(envelope, streams::INVENTORY_ITEM, InventoryEvent::supplier_id)?;
            if event.item_id().0 != envelope.aggregate_id() {
                return Err(ProjectionError::SupplierIsolation(
                    "event item_id does not match envelope aggregate_id".to_string(),
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
