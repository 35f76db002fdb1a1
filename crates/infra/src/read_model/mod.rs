//! Supplier-isolated read model storage.

pub mod supplier_store;

pub use supplier_store::{InMemorySupplierStore, SupplierStore};
