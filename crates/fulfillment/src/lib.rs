//! Supplier order fulfillment (event-sourced state machine).
//!
//! A supplier order is one seller's share of a buyer order. It moves through
//! `received -> processing -> shipped -> delivered`, or is cancelled before
//! shipment. The ledger effects of a transition are described here and carried
//! out by the infrastructure layer.

pub mod order;

pub use order::{
    LedgerEffect, OrderLine, OrderPlaced, OrderStatus, OrderStatusChanged, PlaceOrder,
    StatusChange, StockMovement, SupplierOrder, SupplierOrderCommand, SupplierOrderEvent,
    SupplierOrderId, TransitionOrder,
};
