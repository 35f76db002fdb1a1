//! Aggregate type names used as stream labels.

pub const INVENTORY_ITEM: &str = "inventory.item";
pub const REORDER_REQUEST: &str = "inventory.reorder";
pub const PRICING_RULE: &str = "pricing.rule";
pub const SUPPLIER_ORDER: &str = "fulfillment.order";
pub const SUPPLIER: &str = "suppliers.supplier";
