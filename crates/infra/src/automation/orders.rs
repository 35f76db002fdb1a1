use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partsupply_core::{AggregateId, Cents, PartId, SupplierId, UserId};
use partsupply_fulfillment::{
    LedgerEffect, OrderLine, OrderStatus, PlaceOrder, StockMovement, SupplierOrder,
    SupplierOrderCommand, SupplierOrderId, TransitionOrder,
};
use partsupply_inventory::{
    DecrementReserved, InventoryCommand, InventoryItemId, ReleaseReservation, ReserveStock,
};

use super::{AutomationCoordinator, AutomationError, inventory_item, supplier_order};
use crate::streams;

/// A buyer order as the marketplace hands it over. Lines may belong to
/// several sellers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntake {
    pub buyer_id: UserId,
    /// Marketplace order reference shared by every supplier order it splits into.
    pub order_ref: String,
    pub lines: Vec<IntakeLine>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeLine {
    pub seller_id: SupplierId,
    pub part_id: PartId,
    pub quantity: i64,
    pub unit_price: Cents,
}

/// Requested status change for a supplier order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransition {
    pub to: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub estimated_delivery: Option<DateTime<Utc>>,
}

impl OrderTransition {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            to: status,
            tracking_number: None,
            notes: None,
            estimated_delivery: None,
        }
    }

    pub fn shipped(tracking_number: impl Into<String>) -> Self {
        Self {
            tracking_number: Some(tracking_number.into()),
            ..Self::to(OrderStatus::Shipped)
        }
    }
}

struct Reservation {
    supplier_id: SupplierId,
    order_id: SupplierOrderId,
    item_id: InventoryItemId,
    quantity: i64,
}

impl AutomationCoordinator {
    /// Split a buyer order per seller, reserve every line, then record one
    /// supplier order per seller in `received`.
    ///
    /// All or nothing: if any reservation or order fails, reservations
    /// already taken are released again.
    pub fn place_order(&self, intake: OrderIntake) -> Result<Vec<SupplierOrderId>, AutomationError> {
        if intake.lines.is_empty() {
            return Err(AutomationError::Validation("order has no lines".to_string()));
        }
        if let Some(line) = intake.lines.iter().find(|l| l.quantity <= 0) {
            return Err(AutomationError::Validation(format!(
                "line for part {} has non-positive quantity {}",
                line.part_id, line.quantity
            )));
        }

        self.sync_read_models()?;
        let now = self.clock.now();

        let mut by_seller: BTreeMap<SupplierId, Vec<&IntakeLine>> = BTreeMap::new();
        for line in &intake.lines {
            by_seller.entry(line.seller_id).or_default().push(line);
        }

        let mut placements = Vec::with_capacity(by_seller.len());
        for (seller_id, lines) in by_seller {
            let order_id = SupplierOrderId::new(AggregateId::new());
            let order_lines = lines
                .into_iter()
                .map(|line| {
                    let item_id = self.resolve_item(seller_id, line)?;
                    Ok(OrderLine {
                        line_no: 0,
                        item_id,
                        part_id: line.part_id,
                        quantity: line.quantity,
                        unit_price: line.unit_price,
                    })
                })
                .collect::<Result<Vec<_>, AutomationError>>()?;

            let command = SupplierOrderCommand::PlaceOrder(PlaceOrder {
                supplier_id: seller_id,
                order_id,
                buyer_id: intake.buyer_id,
                order_ref: intake.order_ref.clone(),
                lines: order_lines,
                estimated_delivery: intake.estimated_delivery,
                occurred_at: now,
            });
            self.precheck(streams::SUPPLIER_ORDER, "place_order", seller_id, order_id.0, &command, supplier_order)?;
            placements.push((seller_id, order_id, command));
        }

        let mut reserved: Vec<Reservation> = Vec::new();
        for (seller_id, order_id, command) in &placements {
            let SupplierOrderCommand::PlaceOrder(place) = command else {
                continue;
            };
            for line in &place.lines {
                let reserve = InventoryCommand::ReserveStock(ReserveStock {
                    supplier_id: *seller_id,
                    item_id: line.item_id,
                    order_id: order_id.0,
                    quantity: line.quantity,
                    occurred_at: now,
                });
                if let Err(err) = self.execute(streams::INVENTORY_ITEM, "reserve_stock", *seller_id, line.item_id.0, &reserve, inventory_item) {
                    self.compensate(&reserved);
                    return Err(err);
                }
                reserved.push(Reservation {
                    supplier_id: *seller_id,
                    order_id: *order_id,
                    item_id: line.item_id,
                    quantity: line.quantity,
                });
            }
        }

        let mut placed = Vec::with_capacity(placements.len());
        for (seller_id, order_id, command) in &placements {
            if let Err(err) = self.execute(streams::SUPPLIER_ORDER, "place_order", *seller_id, order_id.0, command, supplier_order) {
                // Orders already recorded keep their reservations.
                let orphaned: Vec<Reservation> = reserved
                    .into_iter()
                    .filter(|r| !placed.contains(&r.order_id))
                    .collect();
                self.compensate(&orphaned);
                return Err(err);
            }
            tracing::info!(supplier_id = %seller_id, order_id = %order_id, order_ref = %intake.order_ref, "supplier order received");
            placed.push(*order_id);
        }

        for (seller_id, _, command) in &placements {
            let SupplierOrderCommand::PlaceOrder(place) = command else {
                continue;
            };
            let items: Vec<InventoryItemId> = place.lines.iter().map(|l| l.item_id).collect();
            self.order_followups(*seller_id, &items);
        }

        Ok(placed)
    }

    /// Advance a supplier order and carry out its ledger effects.
    ///
    /// The order stream is committed first so that concurrent transitions of
    /// the same order apply their ledger movements at most once. The prechecked
    /// movements are then applied until they land, so a committed shipment or
    /// cancellation always reaches the ledger.
    pub fn transition_order(
        &self,
        supplier_id: SupplierId,
        order_id: SupplierOrderId,
        transition: OrderTransition,
    ) -> Result<SupplierOrder, AutomationError> {
        let order = self.load(streams::SUPPLIER_ORDER, supplier_id, order_id.0, supplier_order)?;
        if !order.is_created() {
            return Err(AutomationError::not_found("supplier order", order_id));
        }

        let now = self.clock.now();
        let command = SupplierOrderCommand::TransitionOrder(TransitionOrder {
            supplier_id,
            order_id,
            to: transition.to,
            tracking_number: transition.tracking_number,
            notes: transition.notes,
            estimated_delivery: transition.estimated_delivery,
            occurred_at: now,
        });
        self.precheck(streams::SUPPLIER_ORDER, "transition_order", supplier_id, order_id.0, &command, supplier_order)?;

        let movements = order.ledger_movements(transition.to);
        let ledger_commands: Vec<(InventoryItemId, &'static str, InventoryCommand)> = movements
            .iter()
            .map(|m| ledger_command(supplier_id, order_id, m, now))
            .collect();
        for (item_id, name, ledger) in &ledger_commands {
            self.precheck(streams::INVENTORY_ITEM, *name, supplier_id, item_id.0, ledger, inventory_item)?;
        }

        let from = order.status();
        let dispatched = self.execute(streams::SUPPLIER_ORDER, "transition_order", supplier_id, order_id.0, &command, supplier_order)?;

        for (item_id, name, ledger) in &ledger_commands {
            if let Err(err) = self.execute_settled(streams::INVENTORY_ITEM, *name, supplier_id, item_id.0, ledger, inventory_item) {
                tracing::error!(
                    %supplier_id,
                    %order_id,
                    %item_id,
                    error = %err,
                    "ledger movement failed after order transition"
                );
                return Err(err);
            }
        }

        tracing::info!(%supplier_id, %order_id, %from, to = %transition.to, "supplier order transitioned");

        let items: Vec<InventoryItemId> = movements.iter().map(|m| m.item_id).collect();
        self.order_followups(supplier_id, &items);
        Ok(dispatched.aggregate)
    }

    pub fn supplier_order(&self, supplier_id: SupplierId, order_id: SupplierOrderId) -> Result<SupplierOrder, AutomationError> {
        let order = self.load(streams::SUPPLIER_ORDER, supplier_id, order_id.0, supplier_order)?;
        if !order.is_created() {
            return Err(AutomationError::not_found("supplier order", order_id));
        }
        Ok(order)
    }

    /// The seller's live listing for a part, preferring the deepest stock.
    fn resolve_item(&self, seller_id: SupplierId, line: &IntakeLine) -> Result<InventoryItemId, AutomationError> {
        self.read_models
            .inventory
            .find_by_part(seller_id, line.part_id)
            .into_iter()
            .max_by_key(|l| l.quantity_available)
            .map(|l| l.item_id)
            .ok_or_else(|| AutomationError::not_found("listing", format!("part {} of supplier {seller_id}", line.part_id)))
    }

    /// Reorder checks and metrics after a committed order change. Failures are
    /// logged and picked up again by the next stock change or order event.
    fn order_followups(&self, supplier_id: SupplierId, items: &[InventoryItemId]) {
        if let Err(err) = self.after_stock_change(supplier_id, items) {
            tracing::warn!(%supplier_id, error = %err, "reorder check after order change failed");
        }
        if let Err(err) = self.recompute_metrics(supplier_id) {
            tracing::warn!(%supplier_id, error = %err, "metrics recompute after order change failed");
        }
    }

    fn compensate(&self, reserved: &[Reservation]) {
        for r in reserved.iter().rev() {
            let release = InventoryCommand::ReleaseReservation(ReleaseReservation {
                supplier_id: r.supplier_id,
                item_id: r.item_id,
                order_id: r.order_id.0,
                quantity: r.quantity,
                occurred_at: self.clock.now(),
            });
            if let Err(err) = self.execute_settled(streams::INVENTORY_ITEM, "release_reservation", r.supplier_id, r.item_id.0, &release, inventory_item) {
                tracing::error!(
                    supplier_id = %r.supplier_id,
                    item_id = %r.item_id,
                    quantity = r.quantity,
                    error = %err,
                    "compensating release failed"
                );
            }
        }
        if let Err(err) = self.sync_read_models() {
            tracing::warn!(error = %err, "read models not caught up after compensation");
        }
    }
}

fn ledger_command(
    supplier_id: SupplierId,
    order_id: SupplierOrderId,
    movement: &StockMovement,
    occurred_at: DateTime<Utc>,
) -> (InventoryItemId, &'static str, InventoryCommand) {
    let item_id = movement.item_id;
    match movement.effect {
        LedgerEffect::Decrement => (
            item_id,
            "decrement_reserved",
            InventoryCommand::DecrementReserved(DecrementReserved {
                supplier_id,
                item_id,
                order_id: order_id.0,
                quantity: movement.quantity,
                occurred_at,
            }),
        ),
        LedgerEffect::Release => (
            item_id,
            "release_reservation",
            InventoryCommand::ReleaseReservation(ReleaseReservation {
                supplier_id,
                item_id,
                order_id: order_id.0,
                quantity: movement.quantity,
                occurred_at,
            }),
        ),
    }
}
