use partsupply_core::{AggregateId, PartId, SupplierId, money};
use partsupply_inventory::{
    AddItem, AdjustOp, AdjustStock, InventoryCommand, InventoryEvent, InventoryItem,
    InventoryItemId, ItemSettings, RetireItem, UpdateSettings,
};

use super::{AutomationCoordinator, AutomationError, inventory_item};
use crate::external::{ExternalError, PartDraft};
use crate::streams;

/// A new SKU as the supplier lists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInventoryItem {
    pub part_id: PartId,
    pub sku: String,
    pub initial_quantity: i64,
    pub settings: ItemSettings,
}

impl AutomationCoordinator {
    /// List a SKU for a supplier.
    ///
    /// The catalog part is created from the SKU when it does not exist yet.
    /// A catalog failure aborts the operation before anything is recorded.
    pub fn add_inventory_item(
        &self,
        supplier_id: SupplierId,
        item: NewInventoryItem,
    ) -> Result<InventoryItemId, AutomationError> {
        self.supplier(supplier_id)?;
        self.sync_read_models()?;

        let sku = item.sku.trim();
        let taken = self
            .read_models
            .inventory
            .list(supplier_id)
            .iter()
            .any(|l| l.sku.eq_ignore_ascii_case(sku));
        if taken {
            return Err(AutomationError::Validation(format!(
                "sku {sku} is already listed by supplier {supplier_id}"
            )));
        }

        let item_id = InventoryItemId::new(AggregateId::new());
        let command = InventoryCommand::AddItem(AddItem {
            supplier_id,
            item_id,
            part_id: item.part_id,
            sku: sku.to_string(),
            initial_quantity: item.initial_quantity,
            settings: item.settings.clone(),
            occurred_at: self.clock.now(),
        });
        self.precheck(streams::INVENTORY_ITEM, "add_item", supplier_id, item_id.0, &command, inventory_item)?;

        self.ensure_catalog_part(supplier_id, &item)?;

        self.execute(streams::INVENTORY_ITEM, "add_item", supplier_id, item_id.0, &command, inventory_item)?;
        self.sync_read_models()?;
        tracing::info!(%supplier_id, %item_id, sku, "inventory item added");

        if self.config.reorder.check_on_create {
            self.run_reorder_check(supplier_id, item_id)?;
        }
        Ok(item_id)
    }

    pub fn update_item_settings(
        &self,
        supplier_id: SupplierId,
        item_id: InventoryItemId,
        settings: ItemSettings,
    ) -> Result<InventoryItem, AutomationError> {
        let command = InventoryCommand::UpdateSettings(UpdateSettings {
            supplier_id,
            item_id,
            settings,
            occurred_at: self.clock.now(),
        });
        let dispatched = self.execute(
            streams::INVENTORY_ITEM,
            "update_settings",
            supplier_id,
            item_id.0,
            &command,
            inventory_item,
        )?;
        self.after_stock_change(supplier_id, &[item_id])?;
        Ok(dispatched.aggregate)
    }

    /// Withdraw an item from sale. History stays; new reservations are refused.
    pub fn retire_item(&self, supplier_id: SupplierId, item_id: InventoryItemId) -> Result<InventoryItem, AutomationError> {
        let command = InventoryCommand::RetireItem(RetireItem {
            supplier_id,
            item_id,
            occurred_at: self.clock.now(),
        });
        let dispatched = self.execute(streams::INVENTORY_ITEM, "retire_item", supplier_id, item_id.0, &command, inventory_item)?;
        self.sync_read_models()?;
        Ok(dispatched.aggregate)
    }

    /// Manual restock or correction. A subtraction below zero is clamped and
    /// logged rather than refused.
    pub fn adjust_stock(
        &self,
        supplier_id: SupplierId,
        item_id: InventoryItemId,
        quantity: i64,
        op: AdjustOp,
    ) -> Result<InventoryItem, AutomationError> {
        let command = InventoryCommand::AdjustStock(AdjustStock {
            supplier_id,
            item_id,
            quantity,
            op,
            occurred_at: self.clock.now(),
        });
        let dispatched = self.execute(streams::INVENTORY_ITEM, "adjust_stock", supplier_id, item_id.0, &command, inventory_item)?;

        for stored in &dispatched.committed {
            if let Ok(InventoryEvent::StockAdjusted(e)) = serde_json::from_value::<InventoryEvent>(stored.payload.clone()) {
                if e.clamped {
                    tracing::warn!(
                        %supplier_id,
                        %item_id,
                        requested = e.requested_quantity,
                        available = e.previous_available,
                        "stock adjustment clamped at zero"
                    );
                }
            }
        }

        self.after_stock_change(supplier_id, &[item_id])?;
        Ok(dispatched.aggregate)
    }

    pub fn item(&self, supplier_id: SupplierId, item_id: InventoryItemId) -> Result<InventoryItem, AutomationError> {
        let item = self.load(streams::INVENTORY_ITEM, supplier_id, item_id.0, inventory_item)?;
        if !item.is_created() {
            return Err(AutomationError::not_found("inventory item", item_id));
        }
        Ok(item)
    }

    /// Catch up the read models, then run the reorder trigger for each item.
    pub(super) fn after_stock_change(
        &self,
        supplier_id: SupplierId,
        item_ids: &[InventoryItemId],
    ) -> Result<(), AutomationError> {
        self.sync_read_models()?;
        for item_id in item_ids {
            self.run_reorder_check(supplier_id, *item_id)?;
        }
        Ok(())
    }

    fn ensure_catalog_part(&self, supplier_id: SupplierId, item: &NewInventoryItem) -> Result<(), AutomationError> {
        match self.catalog.get_part(item.part_id) {
            Ok(_) => Ok(()),
            Err(ExternalError::NotFound(_)) => {
                let draft = PartDraft {
                    part_id: item.part_id,
                    seller_id: supplier_id,
                    name: format!("Part {}", item.sku.trim()),
                    brand: "Unknown".to_string(),
                    category: "General".to_string(),
                    price: money::apply_markup_bps(item.settings.cost_price, item.settings.markup_bps),
                    stock_quantity: item.initial_quantity,
                };
                self.catalog.create_part(draft)?;
                tracing::info!(%supplier_id, part_id = %item.part_id, "catalog part created for new sku");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
