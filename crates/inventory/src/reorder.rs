//! Reorder trigger and reorder requests.
//!
//! The trigger is a pure check over an item's current state. A request it
//! produces becomes its own aggregate, resolved later by the supplier
//! (approved, then fulfilled when the restock arrives).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partsupply_core::{Aggregate, AggregateId, AggregateRoot, DomainError, SupplierId};
use partsupply_events::{Command, Event};

use crate::item::{InventoryItem, InventoryItemId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReorderRequestId(pub AggregateId);

impl ReorderRequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReorderRequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderStatus {
    Pending,
    Approved,
    Fulfilled,
}

impl core::fmt::Display for ReorderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            ReorderStatus::Pending => "pending",
            ReorderStatus::Approved => "approved",
            ReorderStatus::Fulfilled => "fulfilled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderPriority {
    High,
    Medium,
}

/// What the trigger decided should be reordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderDraft {
    pub supplier_id: SupplierId,
    pub item_id: InventoryItemId,
    pub requested_quantity: i64,
    pub priority: ReorderPriority,
}

impl ReorderDraft {
    pub fn into_command(self, request_id: ReorderRequestId, occurred_at: DateTime<Utc>) -> ReorderCommand {
        ReorderCommand::OpenReorder(OpenReorder {
            supplier_id: self.supplier_id,
            request_id,
            item_id: self.item_id,
            requested_quantity: self.requested_quantity,
            priority: self.priority,
            occurred_at,
        })
    }
}

/// Reorder trigger.
///
/// Fires iff the item has auto reorder enabled, is not retired, has no
/// outstanding request, and `quantity_available <= reorder_point`.
/// Priority is high when the item is completely out of stock.
pub fn check_reorder_point(item: &InventoryItem) -> Option<ReorderDraft> {
    let supplier_id = item.supplier_id()?;

    if item.is_retired() || !item.auto_reorder_enabled() || item.pending_reorder().is_some() {
        return None;
    }
    if item.quantity_available() > item.reorder_point() {
        return None;
    }

    let priority = if item.quantity_available() == 0 {
        ReorderPriority::High
    } else {
        ReorderPriority::Medium
    };

    Some(ReorderDraft {
        supplier_id,
        item_id: item.id_typed(),
        requested_quantity: item.reorder_quantity(),
        priority,
    })
}

/// Aggregate root: ReorderRequest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderRequest {
    id: ReorderRequestId,
    supplier_id: Option<SupplierId>,
    item_id: Option<InventoryItemId>,
    requested_quantity: i64,
    received_quantity: Option<i64>,
    priority: ReorderPriority,
    status: ReorderStatus,
    version: u64,
    created: bool,
}

impl ReorderRequest {
    pub fn empty(id: ReorderRequestId) -> Self {
        Self {
            id,
            supplier_id: None,
            item_id: None,
            requested_quantity: 0,
            received_quantity: None,
            priority: ReorderPriority::Medium,
            status: ReorderStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReorderRequestId {
        self.id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn item_id(&self) -> Option<InventoryItemId> {
        self.item_id
    }

    pub fn requested_quantity(&self) -> i64 {
        self.requested_quantity
    }

    pub fn received_quantity(&self) -> Option<i64> {
        self.received_quantity
    }

    pub fn priority(&self) -> ReorderPriority {
        self.priority
    }

    pub fn status(&self) -> ReorderStatus {
        self.status
    }
}

impl AggregateRoot for ReorderRequest {
    type Id = ReorderRequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReorder {
    pub supplier_id: SupplierId,
    pub request_id: ReorderRequestId,
    pub item_id: InventoryItemId,
    pub requested_quantity: i64,
    pub priority: ReorderPriority,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveReorder {
    pub supplier_id: SupplierId,
    pub request_id: ReorderRequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillReorder {
    pub supplier_id: SupplierId,
    pub request_id: ReorderRequestId,
    pub received_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderCommand {
    OpenReorder(OpenReorder),
    ApproveReorder(ApproveReorder),
    FulfillReorder(FulfillReorder),
}

partsupply_events::variant_fields! {
    ReorderCommand [OpenReorder, ApproveReorder, FulfillReorder] {
        fn request_id -> ReorderRequestId;
    }
}

impl Command for ReorderCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.request_id().0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderOpened {
    pub supplier_id: SupplierId,
    pub request_id: ReorderRequestId,
    pub item_id: InventoryItemId,
    pub requested_quantity: i64,
    pub priority: ReorderPriority,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderApproved {
    pub supplier_id: SupplierId,
    pub request_id: ReorderRequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderFulfilled {
    pub supplier_id: SupplierId,
    pub request_id: ReorderRequestId,
    pub item_id: InventoryItemId,
    pub received_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReorderEvent {
    ReorderOpened(ReorderOpened),
    ReorderApproved(ReorderApproved),
    ReorderFulfilled(ReorderFulfilled),
}

partsupply_events::variant_fields! {
    ReorderEvent [ReorderOpened, ReorderApproved, ReorderFulfilled] {
        fn supplier_id -> SupplierId;
        fn request_id -> ReorderRequestId;
        fn occurred_at -> DateTime<Utc>;
    }
}

impl Event for ReorderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReorderEvent::ReorderOpened(_) => "inventory.reorder.opened",
            ReorderEvent::ReorderApproved(_) => "inventory.reorder.approved",
            ReorderEvent::ReorderFulfilled(_) => "inventory.reorder.fulfilled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        ReorderEvent::occurred_at(self)
    }
}

impl Aggregate for ReorderRequest {
    type Command = ReorderCommand;
    type Event = ReorderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReorderEvent::ReorderOpened(e) => {
                self.id = e.request_id;
                self.supplier_id = Some(e.supplier_id);
                self.item_id = Some(e.item_id);
                self.requested_quantity = e.requested_quantity;
                self.priority = e.priority;
                self.status = ReorderStatus::Pending;
                self.created = true;
            }
            ReorderEvent::ReorderApproved(_) => {
                self.status = ReorderStatus::Approved;
            }
            ReorderEvent::ReorderFulfilled(e) => {
                self.received_quantity = Some(e.received_quantity);
                self.status = ReorderStatus::Fulfilled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReorderCommand::OpenReorder(cmd) => self.handle_open(cmd),
            ReorderCommand::ApproveReorder(cmd) => self.handle_approve(cmd),
            ReorderCommand::FulfillReorder(cmd) => self.handle_fulfill(cmd),
        }
    }
}

impl ReorderRequest {
    fn ensure_existing(&self, supplier_id: SupplierId, request_id: ReorderRequestId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.supplier_id != Some(supplier_id) {
            return Err(DomainError::invariant("supplier mismatch"));
        }
        if self.id != request_id {
            return Err(DomainError::invariant("request_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenReorder) -> Result<Vec<ReorderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("reorder request already exists"));
        }
        if cmd.requested_quantity <= 0 {
            return Err(DomainError::validation("requested quantity must be positive"));
        }

        Ok(vec![ReorderEvent::ReorderOpened(ReorderOpened {
            supplier_id: cmd.supplier_id,
            request_id: cmd.request_id,
            item_id: cmd.item_id,
            requested_quantity: cmd.requested_quantity,
            priority: cmd.priority,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveReorder) -> Result<Vec<ReorderEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.request_id)?;

        if self.status != ReorderStatus::Pending {
            return Err(DomainError::invalid_transition(self.status, ReorderStatus::Approved));
        }

        Ok(vec![ReorderEvent::ReorderApproved(ReorderApproved {
            supplier_id: cmd.supplier_id,
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fulfill(&self, cmd: &FulfillReorder) -> Result<Vec<ReorderEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.request_id)?;

        if self.status == ReorderStatus::Fulfilled {
            return Err(DomainError::invalid_transition(self.status, ReorderStatus::Fulfilled));
        }
        if cmd.received_quantity < 0 {
            return Err(DomainError::validation("received quantity cannot be negative"));
        }
        let item_id = self
            .item_id
            .ok_or_else(|| DomainError::invariant("reorder request has no item"))?;

        Ok(vec![ReorderEvent::ReorderFulfilled(ReorderFulfilled {
            supplier_id: cmd.supplier_id,
            request_id: cmd.request_id,
            item_id,
            received_quantity: cmd.received_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{
        AddItem, AdjustOp, AdjustStock, InventoryCommand, ItemCondition, ItemSettings,
        MarkReorderRequested,
    };
    use partsupply_core::PartId;
    use partsupply_events::execute;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn item_with(available: i64, reorder_point: i64, auto: bool) -> InventoryItem {
        let item_id = InventoryItemId::new(AggregateId::new());
        let mut item = InventoryItem::empty(item_id);
        execute(
            &mut item,
            &InventoryCommand::AddItem(AddItem {
                supplier_id: SupplierId::new(),
                item_id,
                part_id: PartId::new(),
                sku: "OIL-FLT-9".to_string(),
                initial_quantity: available,
                settings: ItemSettings {
                    reorder_point,
                    reorder_quantity: 25,
                    auto_reorder_enabled: auto,
                    cost_price: 450,
                    markup_bps: 4_000,
                    condition: ItemCondition::New,
                    warranty_months: 0,
                    location: None,
                },
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        item
    }

    fn subtract(item: &mut InventoryItem, quantity: i64) {
        let supplier_id = item.supplier_id().unwrap();
        let item_id = item.id_typed();
        execute(
            item,
            &InventoryCommand::AdjustStock(AdjustStock {
                supplier_id,
                item_id,
                quantity,
                op: AdjustOp::Subtract,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
    }

    #[test]
    fn above_reorder_point_does_not_fire() {
        let item = item_with(6, 5, true);
        assert_eq!(check_reorder_point(&item), None);
    }

    #[test]
    fn at_or_below_reorder_point_fires_with_medium_priority() {
        let mut item = item_with(5, 5, true);
        subtract(&mut item, 1);

        let draft = check_reorder_point(&item).unwrap();
        assert_eq!(draft.requested_quantity, 25);
        assert_eq!(draft.priority, ReorderPriority::Medium);
        assert_eq!(draft.item_id, item.id_typed());
    }

    #[test]
    fn empty_stock_is_high_priority() {
        let item = item_with(0, 5, true);
        assert_eq!(check_reorder_point(&item).unwrap().priority, ReorderPriority::High);
    }

    #[test]
    fn disabled_auto_reorder_never_fires() {
        let item = item_with(0, 5, false);
        assert_eq!(check_reorder_point(&item), None);
    }

    #[test]
    fn outstanding_request_suppresses_duplicates() {
        let mut item = item_with(4, 5, true);
        let supplier_id = item.supplier_id().unwrap();
        let item_id = item.id_typed();
        execute(
            &mut item,
            &InventoryCommand::MarkReorderRequested(MarkReorderRequested {
                supplier_id,
                item_id,
                request_id: ReorderRequestId::new(AggregateId::new()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        subtract(&mut item, 1);
        assert_eq!(check_reorder_point(&item), None);
    }

    fn opened() -> (ReorderRequest, SupplierId, ReorderRequestId) {
        let supplier_id = SupplierId::new();
        let request_id = ReorderRequestId::new(AggregateId::new());
        let mut request = ReorderRequest::empty(request_id);
        let draft = ReorderDraft {
            supplier_id,
            item_id: InventoryItemId::new(AggregateId::new()),
            requested_quantity: 10,
            priority: ReorderPriority::High,
        };
        execute(&mut request, &draft.into_command(request_id, test_time())).unwrap();
        (request, supplier_id, request_id)
    }

    #[test]
    fn request_lifecycle_pending_approved_fulfilled() {
        let (mut request, supplier_id, request_id) = opened();
        assert_eq!(request.status(), ReorderStatus::Pending);

        execute(
            &mut request,
            &ReorderCommand::ApproveReorder(ApproveReorder {
                supplier_id,
                request_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(request.status(), ReorderStatus::Approved);

        execute(
            &mut request,
            &ReorderCommand::FulfillReorder(FulfillReorder {
                supplier_id,
                request_id,
                received_quantity: 10,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(request.status(), ReorderStatus::Fulfilled);
        assert_eq!(request.received_quantity(), Some(10));
    }

    #[test]
    fn commands_and_events_name_their_request_stream() {
        let (request, supplier_id, request_id) = opened();
        let at = test_time();
        let approve = ReorderCommand::ApproveReorder(ApproveReorder {
            supplier_id,
            request_id,
            occurred_at: at,
        });
        assert_eq!(approve.target_aggregate_id(), request_id.0);

        let events = request.handle(&approve).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].supplier_id(), supplier_id);
        assert_eq!(events[0].request_id(), request_id);
        assert_eq!(Event::occurred_at(&events[0]), at);
    }

    #[test]
    fn fulfilled_request_cannot_be_approved() {
        let (mut request, supplier_id, request_id) = opened();
        execute(
            &mut request,
            &ReorderCommand::FulfillReorder(FulfillReorder {
                supplier_id,
                request_id,
                received_quantity: 10,
                occurred_at: test_time(),
            }),
        )
        .unwrap();

        let err = request
            .handle(&ReorderCommand::ApproveReorder(ApproveReorder {
                supplier_id,
                request_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }
}
