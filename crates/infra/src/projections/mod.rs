//! Read model projections.
//!
//! Projections consume published envelopes and maintain supplier-isolated,
//! disposable read models. They are idempotent per stream and can be rebuilt
//! from the event store at any time.

pub mod cursor;
pub mod inventory_levels;
pub mod pricing_rules;
pub mod reorder_requests;
pub mod supplier_directory;
pub mod supplier_orders;

use serde_json::Value as JsonValue;

use partsupply_events::EventEnvelope;

use crate::event_store::StoredEvent;

pub use cursor::{ProjectionError, StreamCursors};
pub use inventory_levels::{InventoryLevel, InventoryLevelsProjection};
pub use pricing_rules::PricingRulesProjection;
pub use reorder_requests::{ReorderRequestsProjection, ReorderView};
pub use supplier_directory::{SupplierDirectoryProjection, SupplierView};
pub use supplier_orders::{SupplierOrderView, SupplierOrdersProjection};

/// A read model fed by one aggregate type's envelopes.
pub trait Projection: Send + Sync {
    fn aggregate_type(&self) -> &'static str;

    /// Apply one envelope. Envelopes of other aggregate types are ignored.
    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all state, cursors included.
    fn reset(&self);
}

/// Reset a projection and replay the given history into it.
pub fn rebuild(projection: &dyn Projection, history: &[StoredEvent]) -> Result<(), ProjectionError> {
    projection.reset();
    for stored in history {
        projection.apply_envelope(&stored.to_envelope())?;
    }
    Ok(())
}
