use partsupply_core::{AggregateId, DomainError, SupplierId};
use partsupply_inventory::{
    AdjustOp, AdjustStock, ApproveReorder, ClearReorderRequest, FulfillReorder, InventoryCommand,
    InventoryItemId, MarkReorderRequested, ReorderCommand, ReorderRequest, ReorderRequestId,
    check_reorder_point,
};

use super::{AutomationCoordinator, AutomationError, inventory_item, reorder_request};
use crate::command_dispatcher::DispatchError;
use crate::streams;

impl AutomationCoordinator {
    /// Reorder trigger for one item.
    ///
    /// The outstanding-request marker is set on the item stream before the
    /// request is opened, so two racing checks cannot both open one.
    pub(super) fn run_reorder_check(
        &self,
        supplier_id: SupplierId,
        item_id: InventoryItemId,
    ) -> Result<Option<ReorderRequestId>, AutomationError> {
        let item = self.load(streams::INVENTORY_ITEM, supplier_id, item_id.0, inventory_item)?;
        let Some(draft) = check_reorder_point(&item) else {
            return Ok(None);
        };

        let request_id = ReorderRequestId::new(AggregateId::new());
        let now = self.clock.now();
        let mark = InventoryCommand::MarkReorderRequested(MarkReorderRequested {
            supplier_id,
            item_id,
            request_id,
            occurred_at: now,
        });
        match self.execute(streams::INVENTORY_ITEM, "mark_reorder", supplier_id, item_id.0, &mark, inventory_item) {
            Ok(_) => {}
            Err(AutomationError::Rejected {
                source: DispatchError::Domain(DomainError::Conflict(_)),
                ..
            }) => return Ok(None),
            Err(err) => return Err(err),
        }

        let priority = draft.priority;
        let open = draft.into_command(request_id, now);
        if let Err(err) = self.execute(streams::REORDER_REQUEST, "open_reorder", supplier_id, request_id.0, &open, reorder_request) {
            self.clear_reorder_marker(supplier_id, item_id, request_id)?;
            return Err(err);
        }

        self.sync_read_models()?;
        tracing::info!(%supplier_id, %item_id, %request_id, ?priority, "reorder request opened");
        Ok(Some(request_id))
    }

    /// Run the trigger over every live item of a supplier, continuing past
    /// per-item failures.
    pub(super) fn reorder_backlog(
        &self,
        supplier_id: SupplierId,
    ) -> (Vec<ReorderRequestId>, Vec<(InventoryItemId, AutomationError)>) {
        let mut opened = Vec::new();
        let mut failed = Vec::new();

        for level in self.read_models.inventory.list(supplier_id) {
            if level.retired {
                continue;
            }
            match self.run_reorder_check(supplier_id, level.item_id) {
                Ok(Some(request_id)) => opened.push(request_id),
                Ok(None) => {}
                Err(err) => failed.push((level.item_id, err)),
            }
        }
        (opened, failed)
    }

    pub fn approve_reorder(
        &self,
        supplier_id: SupplierId,
        request_id: ReorderRequestId,
    ) -> Result<ReorderRequest, AutomationError> {
        let command = ReorderCommand::ApproveReorder(ApproveReorder {
            supplier_id,
            request_id,
            occurred_at: self.clock.now(),
        });
        let dispatched = self.execute(streams::REORDER_REQUEST, "approve_reorder", supplier_id, request_id.0, &command, reorder_request)?;
        self.sync_read_models()?;
        Ok(dispatched.aggregate)
    }

    /// Close a request: restock the item by what actually arrived and clear
    /// its outstanding-request marker.
    pub fn fulfill_reorder(
        &self,
        supplier_id: SupplierId,
        request_id: ReorderRequestId,
        received_quantity: i64,
    ) -> Result<ReorderRequest, AutomationError> {
        let request = self.load(streams::REORDER_REQUEST, supplier_id, request_id.0, reorder_request)?;
        let item_id = request
            .item_id()
            .ok_or_else(|| AutomationError::not_found("reorder request", request_id))?;

        let now = self.clock.now();
        let fulfill = ReorderCommand::FulfillReorder(FulfillReorder {
            supplier_id,
            request_id,
            received_quantity,
            occurred_at: now,
        });
        let restock = InventoryCommand::AdjustStock(AdjustStock {
            supplier_id,
            item_id,
            quantity: received_quantity,
            op: AdjustOp::Add,
            occurred_at: now,
        });

        self.precheck(streams::REORDER_REQUEST, "fulfill_reorder", supplier_id, request_id.0, &fulfill, reorder_request)?;
        if received_quantity > 0 {
            self.precheck(streams::INVENTORY_ITEM, "restock", supplier_id, item_id.0, &restock, inventory_item)?;
        }

        let dispatched = self.execute(streams::REORDER_REQUEST, "fulfill_reorder", supplier_id, request_id.0, &fulfill, reorder_request)?;
        if received_quantity > 0 {
            self.execute_settled(streams::INVENTORY_ITEM, "restock", supplier_id, item_id.0, &restock, inventory_item)?;
        }
        self.clear_reorder_marker(supplier_id, item_id, request_id)?;

        tracing::info!(%supplier_id, %item_id, %request_id, received_quantity, "reorder request fulfilled");
        if let Err(err) = self.after_stock_change(supplier_id, &[item_id]) {
            tracing::warn!(%supplier_id, %item_id, error = %err, "reorder check after restock failed");
        }
        Ok(dispatched.aggregate)
    }

    fn clear_reorder_marker(
        &self,
        supplier_id: SupplierId,
        item_id: InventoryItemId,
        request_id: ReorderRequestId,
    ) -> Result<(), AutomationError> {
        let clear = InventoryCommand::ClearReorderRequest(ClearReorderRequest {
            supplier_id,
            item_id,
            request_id,
            occurred_at: self.clock.now(),
        });
        self.execute_settled(streams::INVENTORY_ITEM, "clear_reorder", supplier_id, item_id.0, &clear, inventory_item)?;
        Ok(())
    }
}
