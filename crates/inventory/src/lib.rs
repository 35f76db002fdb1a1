//! Inventory ledger (event-sourced).
//!
//! Tracks available and reserved quantity per supplier SKU, and raises reorder
//! requests when stock falls to the reorder point. Pure domain logic: no IO,
//! no clocks, no storage.

pub mod item;
pub mod reorder;

pub use item::{
    AddItem, AdjustOp, AdjustStock, DecrementReserved, InventoryCommand, InventoryEvent,
    InventoryItem, InventoryItemId, ItemAdded, ItemCondition, ItemRetired, ItemSettings,
    ItemStatus, MarkReorderRequested, ClearReorderRequest, ReleaseReservation, ReorderCleared,
    ReorderMarked, ReservationReleased, ReserveStock, ReservedStockShipped, RetireItem,
    SettingsUpdated, StockAdjusted, StockReserved, UpdateSettings,
};
pub use reorder::{
    ApproveReorder, FulfillReorder, OpenReorder, ReorderApproved, ReorderCommand, ReorderDraft,
    ReorderEvent, ReorderFulfilled, ReorderOpened, ReorderPriority, ReorderRequest,
    ReorderRequestId, ReorderStatus, check_reorder_point,
};
