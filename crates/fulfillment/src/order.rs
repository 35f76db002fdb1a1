use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partsupply_core::{Aggregate, AggregateId, AggregateRoot, Cents, DomainError, PartId, SupplierId, UserId};
use partsupply_events::{Command, Event};
use partsupply_inventory::InventoryItemId;

/// Supplier order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierOrderId(pub AggregateId);

impl SupplierOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SupplierOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Fulfillment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Received,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "received",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Edges of the lifecycle graph.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (*self, target),
            (Received, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Received, Cancelled)
                | (Processing, Cancelled)
        )
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One inventory line of a supplier order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub line_no: u32,
    pub item_id: InventoryItemId,
    pub part_id: PartId,
    pub quantity: i64,
    pub unit_price: Cents,
}

impl OrderLine {
    pub fn total(&self) -> Cents {
        self.unit_price
            .saturating_mul(u64::try_from(self.quantity).unwrap_or(0))
    }
}

/// A recorded status change; the history feeds response-time metrics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
}

/// What the ledger must do for each line when an order takes a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerEffect {
    /// Shipment: reserved units leave the warehouse.
    Decrement,
    /// Cancellation: reserved units return to available.
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub item_id: InventoryItemId,
    pub quantity: i64,
    pub effect: LedgerEffect,
}

/// Aggregate root: SupplierOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplierOrder {
    id: SupplierOrderId,
    supplier_id: Option<SupplierId>,
    buyer_id: Option<UserId>,
    order_ref: String,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    tracking_number: Option<String>,
    estimated_delivery: Option<DateTime<Utc>>,
    actual_delivery: Option<DateTime<Utc>>,
    notes: Vec<String>,
    history: Vec<StatusChange>,
    version: u64,
    created: bool,
}

impl SupplierOrder {
    pub fn empty(id: SupplierOrderId) -> Self {
        Self {
            id,
            supplier_id: None,
            buyer_id: None,
            order_ref: String::new(),
            status: OrderStatus::Received,
            lines: Vec::new(),
            tracking_number: None,
            estimated_delivery: None,
            actual_delivery: None,
            notes: Vec::new(),
            history: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SupplierOrderId {
        self.id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn buyer_id(&self) -> Option<UserId> {
        self.buyer_id
    }

    pub fn order_ref(&self) -> &str {
        &self.order_ref
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn actual_delivery(&self) -> Option<DateTime<Utc>> {
        self.actual_delivery
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn history(&self) -> &[StatusChange] {
        &self.history
    }

    /// Ledger movements implied by moving from the current status to `target`.
    pub fn ledger_movements(&self, target: OrderStatus) -> Vec<StockMovement> {
        let effect = match target {
            OrderStatus::Shipped => LedgerEffect::Decrement,
            OrderStatus::Cancelled => LedgerEffect::Release,
            _ => return vec![],
        };
        if !self.status.can_transition_to(target) {
            return vec![];
        }

        self.lines
            .iter()
            .map(|l| StockMovement {
                item_id: l.item_id,
                quantity: l.quantity,
                effect,
            })
            .collect()
    }
}

impl AggregateRoot for SupplierOrder {
    type Id = SupplierOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder (one seller's share of a buyer order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub supplier_id: SupplierId,
    pub order_id: SupplierOrderId,
    pub buyer_id: UserId,
    pub order_ref: String,
    pub lines: Vec<OrderLine>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransitionOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOrder {
    pub supplier_id: SupplierId,
    pub order_id: SupplierOrderId,
    pub to: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierOrderCommand {
    PlaceOrder(PlaceOrder),
    TransitionOrder(TransitionOrder),
}

partsupply_events::variant_fields! {
    SupplierOrderCommand [PlaceOrder, TransitionOrder] {
        fn order_id -> SupplierOrderId;
    }
}

impl Command for SupplierOrderCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.order_id().0
    }
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub supplier_id: SupplierId,
    pub order_id: SupplierOrderId,
    pub buyer_id: UserId,
    pub order_ref: String,
    pub lines: Vec<OrderLine>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderStatusChanged.
///
/// `tracking_number` and `estimated_delivery` are only set when the
/// transition supplied them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub supplier_id: SupplierId,
    pub order_id: SupplierOrderId,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplierOrderEvent {
    OrderPlaced(OrderPlaced),
    OrderStatusChanged(OrderStatusChanged),
}

partsupply_events::variant_fields! {
    SupplierOrderEvent [OrderPlaced, OrderStatusChanged] {
        fn supplier_id -> SupplierId;
        fn order_id -> SupplierOrderId;
        fn occurred_at -> DateTime<Utc>;
    }
}

impl Event for SupplierOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierOrderEvent::OrderPlaced(_) => "fulfillment.order.placed",
            SupplierOrderEvent::OrderStatusChanged(_) => "fulfillment.order.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        SupplierOrderEvent::occurred_at(self)
    }
}

impl Aggregate for SupplierOrder {
    type Command = SupplierOrderCommand;
    type Event = SupplierOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierOrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.supplier_id = Some(e.supplier_id);
                self.buyer_id = Some(e.buyer_id);
                self.order_ref = e.order_ref.clone();
                self.lines = e.lines.clone();
                self.status = OrderStatus::Received;
                self.estimated_delivery = e.estimated_delivery;
                self.history = vec![StatusChange {
                    from: None,
                    to: OrderStatus::Received,
                    at: e.occurred_at,
                }];
                self.created = true;
            }
            SupplierOrderEvent::OrderStatusChanged(e) => {
                self.status = e.to;
                if let Some(tracking) = &e.tracking_number {
                    self.tracking_number = Some(tracking.clone());
                }
                if let Some(note) = &e.notes {
                    self.notes.push(note.clone());
                }
                if e.estimated_delivery.is_some() {
                    self.estimated_delivery = e.estimated_delivery;
                }
                if e.to == OrderStatus::Delivered {
                    self.actual_delivery = Some(e.occurred_at);
                }
                self.history.push(StatusChange {
                    from: Some(e.from),
                    to: e.to,
                    at: e.occurred_at,
                });
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SupplierOrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            SupplierOrderCommand::TransitionOrder(cmd) => self.handle_transition(cmd),
        }
    }
}

impl SupplierOrder {
    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<SupplierOrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("supplier order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order needs at least one line"));
        }
        if cmd.lines.iter().any(|l| l.quantity <= 0) {
            return Err(DomainError::validation("line quantity must be positive"));
        }

        let lines = cmd
            .lines
            .iter()
            .enumerate()
            .map(|(idx, l)| OrderLine {
                line_no: idx as u32 + 1,
                ..l.clone()
            })
            .collect();

        Ok(vec![SupplierOrderEvent::OrderPlaced(OrderPlaced {
            supplier_id: cmd.supplier_id,
            order_id: cmd.order_id,
            buyer_id: cmd.buyer_id,
            order_ref: cmd.order_ref.clone(),
            lines,
            estimated_delivery: cmd.estimated_delivery,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_transition(
        &self,
        cmd: &TransitionOrder,
    ) -> Result<Vec<SupplierOrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.supplier_id != Some(cmd.supplier_id) {
            return Err(DomainError::invariant("supplier mismatch"));
        }
        if self.id != cmd.order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }

        if !self.status.can_transition_to(cmd.to) {
            return Err(DomainError::invalid_transition(self.status, cmd.to));
        }

        let tracking_number = match cmd.to {
            OrderStatus::Shipped => {
                let tracking = cmd
                    .tracking_number
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| DomainError::validation("shipping requires a tracking number"))?;
                Some(tracking.to_string())
            }
            _ => None,
        };

        let notes = cmd
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(vec![SupplierOrderEvent::OrderStatusChanged(OrderStatusChanged {
            supplier_id: cmd.supplier_id,
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.to,
            tracking_number,
            notes,
            estimated_delivery: cmd.estimated_delivery,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use partsupply_events::execute;
    use proptest::prelude::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(quantity: i64) -> OrderLine {
        OrderLine {
            line_no: 0,
            item_id: InventoryItemId::new(AggregateId::new()),
            part_id: PartId::new(),
            quantity,
            unit_price: 2_500,
        }
    }

    fn placed() -> (SupplierOrder, SupplierId) {
        let supplier_id = SupplierId::new();
        let order_id = SupplierOrderId::new(AggregateId::new());
        let mut order = SupplierOrder::empty(order_id);
        execute(
            &mut order,
            &SupplierOrderCommand::PlaceOrder(PlaceOrder {
                supplier_id,
                order_id,
                buyer_id: UserId::new(),
                order_ref: "ORD-1001".to_string(),
                lines: vec![line(2), line(1)],
                estimated_delivery: None,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        (order, supplier_id)
    }

    fn transition(
        order: &SupplierOrder,
        supplier_id: SupplierId,
        to: OrderStatus,
        tracking: Option<&str>,
    ) -> SupplierOrderCommand {
        SupplierOrderCommand::TransitionOrder(TransitionOrder {
            supplier_id,
            order_id: order.id_typed(),
            to,
            tracking_number: tracking.map(str::to_string),
            notes: None,
            estimated_delivery: None,
            occurred_at: test_time(),
        })
    }

    fn step(
        order: &mut SupplierOrder,
        supplier_id: SupplierId,
        to: OrderStatus,
        tracking: Option<&str>,
    ) -> Result<Vec<SupplierOrderEvent>, DomainError> {
        let cmd = transition(order, supplier_id, to, tracking);
        execute(order, &cmd)
    }

    #[test]
    fn place_numbers_lines_and_starts_received() {
        let (order, _) = placed();
        assert_eq!(order.status(), OrderStatus::Received);
        let numbers: Vec<u32> = order.lines().iter().map(|l| l.line_no).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(order.lines().iter().map(OrderLine::total).sum::<u64>(), 7_500);
        assert_eq!(order.history().len(), 1);
    }

    #[test]
    fn empty_order_is_rejected() {
        let order = SupplierOrder::empty(SupplierOrderId::new(AggregateId::new()));
        let err = order
            .handle(&SupplierOrderCommand::PlaceOrder(PlaceOrder {
                supplier_id: SupplierId::new(),
                order_id: order.id_typed(),
                buyer_id: UserId::new(),
                order_ref: "ORD-1".to_string(),
                lines: vec![],
                estimated_delivery: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_lifecycle_records_delivery_time() {
        let (mut order, supplier_id) = placed();
        step(&mut order, supplier_id, OrderStatus::Processing, None).unwrap();
        step(&mut order, supplier_id, OrderStatus::Shipped, Some("1Z999")).unwrap();
        assert_eq!(order.tracking_number(), Some("1Z999"));

        let delivered_at = test_time() + Duration::hours(30);
        let cmd = SupplierOrderCommand::TransitionOrder(TransitionOrder {
            supplier_id,
            order_id: order.id_typed(),
            to: OrderStatus::Delivered,
            tracking_number: None,
            notes: Some("left at dock 4".to_string()),
            estimated_delivery: None,
            occurred_at: delivered_at,
        });
        execute(&mut order, &cmd).unwrap();

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.actual_delivery(), Some(delivered_at));
        assert_eq!(order.notes(), &["left at dock 4".to_string()]);
        assert!(order.history().iter().any(|c| c.to == OrderStatus::Processing));
    }

    #[test]
    fn shipping_without_tracking_is_rejected() {
        let (mut order, supplier_id) = placed();
        step(&mut order, supplier_id, OrderStatus::Processing, None).unwrap();

        let err = order
            .handle(&transition(&order, supplier_id, OrderStatus::Shipped, Some("   ")))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(order.status(), OrderStatus::Processing);
    }

    #[test]
    fn delivered_to_processing_is_rejected() {
        let (mut order, supplier_id) = placed();
        step(&mut order, supplier_id, OrderStatus::Processing, None).unwrap();
        step(&mut order, supplier_id, OrderStatus::Shipped, Some("T-1")).unwrap();
        step(&mut order, supplier_id, OrderStatus::Delivered, None).unwrap();
        let version = order.version();

        let err = order
            .handle(&transition(&order, supplier_id, OrderStatus::Processing, None))
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                from: "delivered".to_string(),
                to: "processing".to_string(),
            }
        );
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert_eq!(order.version(), version);
    }

    #[test]
    fn shipped_orders_cannot_be_cancelled() {
        let (mut order, supplier_id) = placed();
        step(&mut order, supplier_id, OrderStatus::Processing, None).unwrap();
        step(&mut order, supplier_id, OrderStatus::Shipped, Some("T-1")).unwrap();

        assert!(order.ledger_movements(OrderStatus::Cancelled).is_empty());
        let err = order
            .handle(&transition(&order, supplier_id, OrderStatus::Cancelled, None))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
    }

    #[test]
    fn movements_follow_the_transition() {
        let (mut order, supplier_id) = placed();
        let release = order.ledger_movements(OrderStatus::Cancelled);
        assert_eq!(release.len(), 2);
        assert!(release.iter().all(|m| m.effect == LedgerEffect::Release));
        assert!(order.ledger_movements(OrderStatus::Processing).is_empty());

        step(&mut order, supplier_id, OrderStatus::Processing, None).unwrap();
        let ship = order.ledger_movements(OrderStatus::Shipped);
        assert_eq!(ship.iter().map(|m| m.quantity).sum::<i64>(), 3);
        assert!(ship.iter().all(|m| m.effect == LedgerEffect::Decrement));
    }

    fn status_strategy() -> impl Strategy<Value = OrderStatus> {
        prop_oneof![
            Just(OrderStatus::Received),
            Just(OrderStatus::Processing),
            Just(OrderStatus::Shipped),
            Just(OrderStatus::Delivered),
            Just(OrderStatus::Cancelled),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: terminal orders never move again, and every accepted step is an edge.
        #[test]
        fn only_lifecycle_edges_are_accepted(targets in prop::collection::vec(status_strategy(), 0..20)) {
            let (mut order, supplier_id) = placed();
            for to in targets {
                let before = order.status();
                match step(&mut order, supplier_id, to, Some("T-9")) {
                    Ok(_) => prop_assert!(before.can_transition_to(to)),
                    Err(_) => {
                        prop_assert!(!before.can_transition_to(to));
                        prop_assert_eq!(order.status(), before);
                    }
                }
                if before.is_terminal() {
                    prop_assert_eq!(order.status(), before);
                }
            }
        }
    }
}
