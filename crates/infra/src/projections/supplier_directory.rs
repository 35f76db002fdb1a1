use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use partsupply_core::{BasisPoints, SupplierId};
use partsupply_events::EventEnvelope;
use partsupply_suppliers::{
    BusinessType, PerformanceMetrics, SubscriptionTier, SupplierEvent, VerificationStatus,
};

use super::Projection;
use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemorySupplierStore, SupplierStore};
use crate::streams;

#[derive(Debug, Clone, PartialEq)]
pub struct SupplierView {
    pub supplier_id: SupplierId,
    pub business_name: String,
    pub business_type: BusinessType,
    pub verification: VerificationStatus,
    pub tier: SubscriptionTier,
    pub commission_bps: BasisPoints,
    pub metrics: PerformanceMetrics,
    pub auto_pricing_enabled: bool,
    pub auto_reorder_enabled: bool,
    pub onboarded_at: DateTime<Utc>,
}

/// One record per supplier, keyed by the supplier itself.
#[derive(Debug)]
pub struct SupplierDirectoryProjection<S = InMemorySupplierStore<SupplierId, SupplierView>>
where
    S: SupplierStore<SupplierId, SupplierView>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for SupplierDirectoryProjection {
    fn default() -> Self {
        Self::new(InMemorySupplierStore::new())
    }
}

impl<S> SupplierDirectoryProjection<S>
where
    S: SupplierStore<SupplierId, SupplierView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, supplier_id: SupplierId) -> Option<SupplierView> {
        self.store.get(supplier_id, &supplier_id)
    }

    pub fn all(&self) -> Vec<SupplierView> {
        self.store
            .suppliers()
            .into_iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn with_auto_pricing(&self) -> Vec<SupplierId> {
        self.all()
            .into_iter()
            .filter(|s| s.auto_pricing_enabled)
            .map(|s| s.supplier_id)
            .collect()
    }

    pub fn with_auto_reorder(&self) -> Vec<SupplierId> {
        self.all()
            .into_iter()
            .filter(|s| s.auto_reorder_enabled)
            .map(|s| s.supplier_id)
            .collect()
    }

    fn apply_event(&self, supplier_id: SupplierId, event: SupplierEvent) -> Result<(), ProjectionError> {
        if let SupplierEvent::SupplierOnboarded(e) = event {
            self.store.upsert(
                supplier_id,
                supplier_id,
                SupplierView {
                    supplier_id,
                    business_name: e.profile.business_name,
                    business_type: e.profile.business_type,
                    verification: VerificationStatus::Pending,
                    tier: e.tier,
                    commission_bps: e.commission_bps,
                    metrics: PerformanceMetrics::initial(),
                    auto_pricing_enabled: false,
                    auto_reorder_enabled: false,
                    onboarded_at: e.occurred_at,
                },
            );
            return Ok(());
        }

        let mut view = self.get(supplier_id).ok_or_else(|| {
            ProjectionError::SupplierIsolation(format!("supplier {supplier_id} not projected"))
        })?;
        match event {
            SupplierEvent::SupplierOnboarded(_) => {}
            SupplierEvent::ProfileUpdated(e) => {
                view.business_name = e.profile.business_name;
                view.business_type = e.profile.business_type;
            }
            SupplierEvent::TierChanged(e) => {
                view.tier = e.to;
                view.commission_bps = e.commission_bps;
            }
            SupplierEvent::VerificationChanged(e) => view.verification = e.to,
            SupplierEvent::AutoPricingToggled(e) => view.auto_pricing_enabled = e.enabled,
            SupplierEvent::AutoReorderToggled(e) => view.auto_reorder_enabled = e.enabled,
            SupplierEvent::MetricsRecorded(e) => view.metrics = e.metrics,
        }
        self.store.upsert(supplier_id, supplier_id, view);
        Ok(())
    }
}

impl<S> Projection for SupplierDirectoryProjection<S>
where
    S: SupplierStore<SupplierId, SupplierView>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::SUPPLIER
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.aggregate_type() {
            return Ok(());
        }

        self.cursors.advance(envelope, || {
            let event: SupplierEvent = decode(envelope, streams::SUPPLIER, SupplierEvent::supplier_id)?;
            self.apply_event(envelope.supplier_id(), event)
        })
    }

    fn reset(&self) {
        self.cursors.clear();
        for supplier_id in self.store.suppliers() {
            self.store.clear_supplier(supplier_id);
        }
    }
}
