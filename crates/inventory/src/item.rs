use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partsupply_core::{
    Aggregate, AggregateId, AggregateRoot, BasisPoints, Cents, DomainError, PartId, SupplierId,
};
use partsupply_events::{Command, Event};

use crate::reorder::ReorderRequestId;

/// Inventory item identifier (one supplier SKU).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemCondition {
    New,
    Refurbished,
    Used,
}

/// Derived listing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Active,
    OutOfStock,
    Retired,
}

/// Manual stock correction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustOp {
    Set,
    Add,
    Subtract,
}

/// Supplier-editable parameters of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSettings {
    pub reorder_point: i64,
    pub reorder_quantity: i64,
    pub auto_reorder_enabled: bool,
    /// Unit cost in cents.
    pub cost_price: Cents,
    /// Fallback markup when no pricing rule matches.
    pub markup_bps: BasisPoints,
    pub condition: ItemCondition,
    pub warranty_months: u32,
    pub location: Option<String>,
}

impl ItemSettings {
    fn validate(&self) -> Result<(), DomainError> {
        if self.cost_price == 0 {
            return Err(DomainError::validation("cost_price must be positive"));
        }
        if self.reorder_point < 0 {
            return Err(DomainError::validation("reorder_point cannot be negative"));
        }
        if self.reorder_quantity < 0 {
            return Err(DomainError::validation("reorder_quantity cannot be negative"));
        }
        if self.auto_reorder_enabled && self.reorder_quantity == 0 {
            return Err(DomainError::validation(
                "reorder_quantity must be positive when auto reorder is enabled",
            ));
        }
        if self.markup_bps <= -10_000 {
            return Err(DomainError::validation("markup cannot remove the whole cost"));
        }
        Ok(())
    }
}

/// Aggregate root: InventoryItem.
///
/// `quantity_available + quantity_reserved` is the physical stock on hand.
/// Both components are non-negative after every applied event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: InventoryItemId,
    supplier_id: Option<SupplierId>,
    part_id: Option<PartId>,
    sku: String,
    quantity_available: i64,
    quantity_reserved: i64,
    settings: Option<ItemSettings>,
    retired: bool,
    pending_reorder: Option<ReorderRequestId>,
    total_received: i64,
    total_shipped: i64,
    total_released: i64,
    last_restocked: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl InventoryItem {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InventoryItemId) -> Self {
        Self {
            id,
            supplier_id: None,
            part_id: None,
            sku: String::new(),
            quantity_available: 0,
            quantity_reserved: 0,
            settings: None,
            retired: false,
            pending_reorder: None,
            total_received: 0,
            total_shipped: 0,
            total_released: 0,
            last_restocked: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn part_id(&self) -> Option<PartId> {
        self.part_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn quantity_available(&self) -> i64 {
        self.quantity_available
    }

    pub fn quantity_reserved(&self) -> i64 {
        self.quantity_reserved
    }

    /// Physical units held (available + reserved).
    pub fn on_hand(&self) -> i64 {
        self.quantity_available + self.quantity_reserved
    }

    pub fn settings(&self) -> Option<&ItemSettings> {
        self.settings.as_ref()
    }

    pub fn reorder_point(&self) -> i64 {
        self.settings.as_ref().map(|s| s.reorder_point).unwrap_or(0)
    }

    pub fn reorder_quantity(&self) -> i64 {
        self.settings.as_ref().map(|s| s.reorder_quantity).unwrap_or(0)
    }

    pub fn auto_reorder_enabled(&self) -> bool {
        self.settings.as_ref().is_some_and(|s| s.auto_reorder_enabled)
    }

    pub fn cost_price(&self) -> Cents {
        self.settings.as_ref().map(|s| s.cost_price).unwrap_or(0)
    }

    pub fn markup_bps(&self) -> BasisPoints {
        self.settings.as_ref().map(|s| s.markup_bps).unwrap_or(0)
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub fn pending_reorder(&self) -> Option<ReorderRequestId> {
        self.pending_reorder
    }

    /// Units ever brought in (initial stock, additions, upward corrections).
    pub fn total_received(&self) -> i64 {
        self.total_received
    }

    pub fn total_shipped(&self) -> i64 {
        self.total_shipped
    }

    pub fn total_released(&self) -> i64 {
        self.total_released
    }

    pub fn last_restocked(&self) -> Option<DateTime<Utc>> {
        self.last_restocked
    }

    pub fn status(&self) -> ItemStatus {
        if self.retired {
            ItemStatus::Retired
        } else if self.quantity_available == 0 {
            ItemStatus::OutOfStock
        } else {
            ItemStatus::Active
        }
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: AddItem (stock addition for a new SKU).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub part_id: PartId,
    pub sku: String,
    pub initial_quantity: i64,
    pub settings: ItemSettings,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveStock (order placement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveStock {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseReservation (order cancellation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseReservation {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DecrementReserved (shipment leaves the warehouse).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecrementReserved {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AdjustStock (manual restock or correction of available units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub op: AdjustOp,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSettings {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub settings: ItemSettings,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireItem {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkReorderRequested (claims the single outstanding-request slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReorderRequested {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub request_id: ReorderRequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReorderRequest {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub request_id: ReorderRequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    AddItem(AddItem),
    ReserveStock(ReserveStock),
    ReleaseReservation(ReleaseReservation),
    DecrementReserved(DecrementReserved),
    AdjustStock(AdjustStock),
    UpdateSettings(UpdateSettings),
    RetireItem(RetireItem),
    MarkReorderRequested(MarkReorderRequested),
    ClearReorderRequest(ClearReorderRequest),
}

partsupply_events::variant_fields! {
    InventoryCommand [
        AddItem,
        ReserveStock,
        ReleaseReservation,
        DecrementReserved,
        AdjustStock,
        UpdateSettings,
        RetireItem,
        MarkReorderRequested,
        ClearReorderRequest,
    ] {
        fn item_id -> InventoryItemId;
    }
}

impl Command for InventoryCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.item_id().0
    }
}

/// Event: ItemAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub part_id: PartId,
    pub sku: String,
    pub initial_quantity: i64,
    pub settings: ItemSettings,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved (available -> reserved).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased (reserved -> available).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservedStockShipped (reserved -> gone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedStockShipped {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub order_id: AggregateId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockAdjusted.
///
/// `clamped` is set when a subtraction asked for more than was available and
/// the result was floored at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub op: AdjustOp,
    pub requested_quantity: i64,
    pub previous_available: i64,
    pub new_available: i64,
    pub clamped: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsUpdated {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub settings: ItemSettings,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRetired {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderMarked {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub request_id: ReorderRequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderCleared {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub request_id: ReorderRequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemAdded(ItemAdded),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
    ReservedStockShipped(ReservedStockShipped),
    StockAdjusted(StockAdjusted),
    SettingsUpdated(SettingsUpdated),
    ItemRetired(ItemRetired),
    ReorderMarked(ReorderMarked),
    ReorderCleared(ReorderCleared),
}

partsupply_events::variant_fields! {
    InventoryEvent [
        ItemAdded,
        StockReserved,
        ReservationReleased,
        ReservedStockShipped,
        StockAdjusted,
        SettingsUpdated,
        ItemRetired,
        ReorderMarked,
        ReorderCleared,
    ] {
        fn supplier_id -> SupplierId;
        fn item_id -> InventoryItemId;
        fn occurred_at -> DateTime<Utc>;
    }
}

impl InventoryEvent {
    /// Whether the event changed stock quantities (and so warrants a reorder check).
    pub fn moves_stock(&self) -> bool {
        matches!(
            self,
            InventoryEvent::ItemAdded(_)
                | InventoryEvent::StockReserved(_)
                | InventoryEvent::ReservationReleased(_)
                | InventoryEvent::ReservedStockShipped(_)
                | InventoryEvent::StockAdjusted(_)
        )
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemAdded(_) => "inventory.item.added",
            InventoryEvent::StockReserved(_) => "inventory.item.reserved",
            InventoryEvent::ReservationReleased(_) => "inventory.item.released",
            InventoryEvent::ReservedStockShipped(_) => "inventory.item.shipped",
            InventoryEvent::StockAdjusted(_) => "inventory.item.adjusted",
            InventoryEvent::SettingsUpdated(_) => "inventory.item.settings_updated",
            InventoryEvent::ItemRetired(_) => "inventory.item.retired",
            InventoryEvent::ReorderMarked(_) => "inventory.item.reorder_marked",
            InventoryEvent::ReorderCleared(_) => "inventory.item.reorder_cleared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        InventoryEvent::occurred_at(self)
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemAdded(e) => {
                self.id = e.item_id;
                self.supplier_id = Some(e.supplier_id);
                self.part_id = Some(e.part_id);
                self.sku = e.sku.clone();
                self.quantity_available = e.initial_quantity;
                self.quantity_reserved = 0;
                self.settings = Some(e.settings.clone());
                self.total_received = e.initial_quantity;
                if e.initial_quantity > 0 {
                    self.last_restocked = Some(e.occurred_at);
                }
                self.created = true;
            }
            InventoryEvent::StockReserved(e) => {
                self.quantity_available -= e.quantity;
                self.quantity_reserved += e.quantity;
            }
            InventoryEvent::ReservationReleased(e) => {
                self.quantity_reserved -= e.quantity;
                self.quantity_available += e.quantity;
                self.total_released += e.quantity;
            }
            InventoryEvent::ReservedStockShipped(e) => {
                self.quantity_reserved -= e.quantity;
                self.total_shipped += e.quantity;
            }
            InventoryEvent::StockAdjusted(e) => {
                let delta = e.new_available - e.previous_available;
                if delta > 0 {
                    self.total_received += delta;
                    self.last_restocked = Some(e.occurred_at);
                }
                self.quantity_available = e.new_available;
            }
            InventoryEvent::SettingsUpdated(e) => {
                self.settings = Some(e.settings.clone());
            }
            InventoryEvent::ItemRetired(_) => {
                self.retired = true;
            }
            InventoryEvent::ReorderMarked(e) => {
                self.pending_reorder = Some(e.request_id);
            }
            InventoryEvent::ReorderCleared(_) => {
                self.pending_reorder = None;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::AddItem(cmd) => self.handle_add(cmd),
            InventoryCommand::ReserveStock(cmd) => self.handle_reserve(cmd),
            InventoryCommand::ReleaseReservation(cmd) => self.handle_release(cmd),
            InventoryCommand::DecrementReserved(cmd) => self.handle_decrement(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
            InventoryCommand::UpdateSettings(cmd) => self.handle_update_settings(cmd),
            InventoryCommand::RetireItem(cmd) => self.handle_retire(cmd),
            InventoryCommand::MarkReorderRequested(cmd) => self.handle_mark_reorder(cmd),
            InventoryCommand::ClearReorderRequest(cmd) => self.handle_clear_reorder(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_existing(&self, supplier_id: SupplierId, item_id: InventoryItemId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.supplier_id != Some(supplier_id) {
            return Err(DomainError::invariant("supplier mismatch"));
        }
        if self.id != item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_positive(quantity: i64) -> Result<(), DomainError> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        Ok(())
    }

    fn handle_add(&self, cmd: &AddItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("item already exists"));
        }
        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if cmd.initial_quantity < 0 {
            return Err(DomainError::validation("initial quantity cannot be negative"));
        }
        cmd.settings.validate()?;

        Ok(vec![InventoryEvent::ItemAdded(ItemAdded {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            part_id: cmd.part_id,
            sku: cmd.sku.trim().to_string(),
            initial_quantity: cmd.initial_quantity,
            settings: cmd.settings.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.item_id)?;
        Self::ensure_positive(cmd.quantity)?;

        if self.retired {
            return Err(DomainError::invariant("retired items cannot be reserved"));
        }
        if cmd.quantity > self.quantity_available {
            return Err(DomainError::insufficient_stock(
                cmd.quantity,
                self.quantity_available,
            ));
        }

        Ok(vec![InventoryEvent::StockReserved(StockReserved {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseReservation) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.item_id)?;
        Self::ensure_positive(cmd.quantity)?;

        if cmd.quantity > self.quantity_reserved {
            return Err(DomainError::invariant("cannot release more than is reserved"));
        }

        Ok(vec![InventoryEvent::ReservationReleased(ReservationReleased {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_decrement(&self, cmd: &DecrementReserved) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.item_id)?;
        Self::ensure_positive(cmd.quantity)?;

        if cmd.quantity > self.quantity_reserved {
            return Err(DomainError::insufficient_stock(
                cmd.quantity,
                self.quantity_reserved,
            ));
        }

        Ok(vec![InventoryEvent::ReservedStockShipped(ReservedStockShipped {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            order_id: cmd.order_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.item_id)?;

        if cmd.quantity < 0 {
            return Err(DomainError::validation("adjustment quantity cannot be negative"));
        }

        let previous = self.quantity_available;
        let (new_available, clamped) = match cmd.op {
            AdjustOp::Set => (cmd.quantity, false),
            AdjustOp::Add => {
                Self::ensure_positive(cmd.quantity)?;
                (previous + cmd.quantity, false)
            }
            AdjustOp::Subtract => {
                Self::ensure_positive(cmd.quantity)?;
                let raw = previous - cmd.quantity;
                (raw.max(0), raw < 0)
            }
        };

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            op: cmd.op,
            requested_quantity: cmd.quantity,
            previous_available: previous,
            new_available,
            clamped,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_settings(&self, cmd: &UpdateSettings) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.item_id)?;
        cmd.settings.validate()?;

        if self.settings.as_ref() == Some(&cmd.settings) {
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::SettingsUpdated(SettingsUpdated {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            settings: cmd.settings.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_retire(&self, cmd: &RetireItem) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.item_id)?;

        if self.retired {
            return Ok(vec![]);
        }
        if self.quantity_reserved > 0 {
            return Err(DomainError::invariant(
                "cannot retire an item with outstanding reservations",
            ));
        }

        Ok(vec![InventoryEvent::ItemRetired(ItemRetired {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_reorder(&self, cmd: &MarkReorderRequested) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.item_id)?;

        if let Some(existing) = self.pending_reorder {
            return Err(DomainError::conflict(format!(
                "reorder request {existing} is already outstanding"
            )));
        }

        Ok(vec![InventoryEvent::ReorderMarked(ReorderMarked {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_clear_reorder(&self, cmd: &ClearReorderRequest) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.item_id)?;

        if self.pending_reorder != Some(cmd.request_id) {
            // Nothing to clear; a stale or repeated resolution is a no-op.
            return Ok(vec![]);
        }

        Ok(vec![InventoryEvent::ReorderCleared(ReorderCleared {
            supplier_id: cmd.supplier_id,
            item_id: cmd.item_id,
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partsupply_events::execute;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn settings() -> ItemSettings {
        ItemSettings {
            reorder_point: 5,
            reorder_quantity: 20,
            auto_reorder_enabled: true,
            cost_price: 10_000,
            markup_bps: 2_500,
            condition: ItemCondition::New,
            warranty_months: 12,
            location: Some("A-01".to_string()),
        }
    }

    fn stocked_item(quantity: i64) -> (InventoryItem, SupplierId, InventoryItemId) {
        let supplier_id = SupplierId::new();
        let item_id = InventoryItemId::new(AggregateId::new());
        let mut item = InventoryItem::empty(item_id);
        execute(
            &mut item,
            &InventoryCommand::AddItem(AddItem {
                supplier_id,
                item_id,
                part_id: PartId::new(),
                sku: "BRK-PAD-01".to_string(),
                initial_quantity: quantity,
                settings: settings(),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        (item, supplier_id, item_id)
    }

    fn reserve(supplier_id: SupplierId, item_id: InventoryItemId, quantity: i64) -> InventoryCommand {
        InventoryCommand::ReserveStock(ReserveStock {
            supplier_id,
            item_id,
            order_id: AggregateId::new(),
            quantity,
            occurred_at: test_time(),
        })
    }

    fn ship(supplier_id: SupplierId, item_id: InventoryItemId, quantity: i64) -> InventoryCommand {
        InventoryCommand::DecrementReserved(DecrementReserved {
            supplier_id,
            item_id,
            order_id: AggregateId::new(),
            quantity,
            occurred_at: test_time(),
        })
    }

    fn release(supplier_id: SupplierId, item_id: InventoryItemId, quantity: i64) -> InventoryCommand {
        InventoryCommand::ReleaseReservation(ReleaseReservation {
            supplier_id,
            item_id,
            order_id: AggregateId::new(),
            quantity,
            occurred_at: test_time(),
        })
    }

    fn adjust(supplier_id: SupplierId, item_id: InventoryItemId, quantity: i64, op: AdjustOp) -> InventoryCommand {
        InventoryCommand::AdjustStock(AdjustStock {
            supplier_id,
            item_id,
            quantity,
            op,
            occurred_at: test_time(),
        })
    }

    #[test]
    fn add_item_sets_available_quantity() {
        let (item, supplier_id, _) = stocked_item(10);
        assert_eq!(item.quantity_available(), 10);
        assert_eq!(item.quantity_reserved(), 0);
        assert_eq!(item.supplier_id(), Some(supplier_id));
        assert_eq!(item.status(), ItemStatus::Active);
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn add_item_rejects_zero_cost() {
        let item_id = InventoryItemId::new(AggregateId::new());
        let item = InventoryItem::empty(item_id);
        let mut bad = settings();
        bad.cost_price = 0;
        let err = item
            .handle(&InventoryCommand::AddItem(AddItem {
                supplier_id: SupplierId::new(),
                item_id,
                part_id: PartId::new(),
                sku: "X".to_string(),
                initial_quantity: 1,
                settings: bad,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reserve_moves_units_from_available_to_reserved() {
        let (mut item, supplier_id, item_id) = stocked_item(10);
        execute(&mut item, &reserve(supplier_id, item_id, 2)).unwrap();

        assert_eq!(item.quantity_available(), 8);
        assert_eq!(item.quantity_reserved(), 2);
        assert_eq!(item.on_hand(), 10);
    }

    #[test]
    fn reserve_more_than_available_is_insufficient_stock() {
        let (item, supplier_id, item_id) = stocked_item(3);
        let err = item.handle(&reserve(supplier_id, item_id, 4)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(4, 3));
    }

    #[test]
    fn decrement_removes_reserved_units_from_stock() {
        let (mut item, supplier_id, item_id) = stocked_item(10);
        execute(&mut item, &reserve(supplier_id, item_id, 2)).unwrap();
        execute(&mut item, &ship(supplier_id, item_id, 2)).unwrap();

        assert_eq!(item.quantity_reserved(), 0);
        assert_eq!(item.quantity_available(), 8);
        assert_eq!(item.on_hand(), 8);
        assert_eq!(item.total_shipped(), 2);
    }

    #[test]
    fn decrement_more_than_reserved_fails() {
        let (mut item, supplier_id, item_id) = stocked_item(10);
        execute(&mut item, &reserve(supplier_id, item_id, 1)).unwrap();
        let err = item.handle(&ship(supplier_id, item_id, 2)).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(2, 1));
    }

    #[test]
    fn release_returns_units_to_available() {
        let (mut item, supplier_id, item_id) = stocked_item(10);
        execute(&mut item, &reserve(supplier_id, item_id, 4)).unwrap();
        execute(&mut item, &release(supplier_id, item_id, 4)).unwrap();

        assert_eq!(item.quantity_available(), 10);
        assert_eq!(item.quantity_reserved(), 0);
        assert_eq!(item.total_released(), 4);
    }

    #[test]
    fn subtract_beyond_available_clamps_to_zero() {
        let (mut item, supplier_id, item_id) = stocked_item(3);
        let events = execute(&mut item, &adjust(supplier_id, item_id, 10, AdjustOp::Subtract)).unwrap();

        match &events[0] {
            InventoryEvent::StockAdjusted(e) => {
                assert!(e.clamped);
                assert_eq!(e.new_available, 0);
            }
            other => panic!("Expected StockAdjusted, got {other:?}"),
        }
        assert_eq!(item.quantity_available(), 0);
        assert_eq!(item.status(), ItemStatus::OutOfStock);
    }

    #[test]
    fn set_and_add_adjustments() {
        let (mut item, supplier_id, item_id) = stocked_item(3);
        execute(&mut item, &adjust(supplier_id, item_id, 7, AdjustOp::Set)).unwrap();
        assert_eq!(item.quantity_available(), 7);
        execute(&mut item, &adjust(supplier_id, item_id, 5, AdjustOp::Add)).unwrap();
        assert_eq!(item.quantity_available(), 12);
        assert_eq!(item.total_received(), 12);
    }

    #[test]
    fn retired_item_rejects_reservations() {
        let (mut item, supplier_id, item_id) = stocked_item(3);
        execute(
            &mut item,
            &InventoryCommand::RetireItem(RetireItem {
                supplier_id,
                item_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        assert_eq!(item.status(), ItemStatus::Retired);
        let err = item.handle(&reserve(supplier_id, item_id, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn second_reorder_mark_conflicts_until_cleared() {
        let (mut item, supplier_id, item_id) = stocked_item(3);
        let first = ReorderRequestId::new(AggregateId::new());
        let mark = |request_id| {
            InventoryCommand::MarkReorderRequested(MarkReorderRequested {
                supplier_id,
                item_id,
                request_id,
                occurred_at: test_time(),
            })
        };

        execute(&mut item, &mark(first)).unwrap();
        let err = item
            .handle(&mark(ReorderRequestId::new(AggregateId::new())))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        execute(
            &mut item,
            &InventoryCommand::ClearReorderRequest(ClearReorderRequest {
                supplier_id,
                item_id,
                request_id: first,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(item.pending_reorder(), None);
        assert!(item.handle(&mark(ReorderRequestId::new(AggregateId::new()))).is_ok());
    }

    #[test]
    fn foreign_supplier_is_rejected() {
        let (item, _, item_id) = stocked_item(3);
        let err = item.handle(&reserve(SupplierId::new(), item_id, 1)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let (item, supplier_id, item_id) = stocked_item(10);
        let before = item.clone();
        let a = item.handle(&adjust(supplier_id, item_id, 4, AdjustOp::Subtract)).unwrap();
        let b = item.handle(&adjust(supplier_id, item_id, 4, AdjustOp::Subtract)).unwrap();
        assert_eq!(item, before);
        assert_eq!(a, b);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Reserve(i64),
        Ship(i64),
        Release(i64),
        Add(i64),
        Subtract(i64),
        Set(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i64..20).prop_map(Op::Reserve),
            (1i64..20).prop_map(Op::Ship),
            (1i64..20).prop_map(Op::Release),
            (1i64..20).prop_map(Op::Add),
            (1i64..20).prop_map(Op::Subtract),
            (0i64..40).prop_map(Op::Set),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of ledger commands is attempted, quantities
        /// never go negative and units held plus units shipped never exceed units received.
        #[test]
        fn ledger_quantities_stay_consistent(
            initial in 0i64..30,
            ops in prop::collection::vec(op_strategy(), 0..40)
        ) {
            let (mut item, supplier_id, item_id) = stocked_item(initial);

            for op in ops {
                let cmd = match op {
                    Op::Reserve(q) => reserve(supplier_id, item_id, q),
                    Op::Ship(q) => ship(supplier_id, item_id, q),
                    Op::Release(q) => release(supplier_id, item_id, q),
                    Op::Add(q) => adjust(supplier_id, item_id, q, AdjustOp::Add),
                    Op::Subtract(q) => adjust(supplier_id, item_id, q, AdjustOp::Subtract),
                    Op::Set(q) => adjust(supplier_id, item_id, q, AdjustOp::Set),
                };
                // Rejected commands must leave no trace.
                let before = item.clone();
                if execute(&mut item, &cmd).is_err() {
                    prop_assert_eq!(&item, &before);
                }

                prop_assert!(item.quantity_available() >= 0);
                prop_assert!(item.quantity_reserved() >= 0);
                prop_assert!(item.on_hand() + item.total_shipped() <= item.total_received());
            }
        }
    }
}
