use serde_json::Value as JsonValue;

use partsupply_core::SupplierId;
use partsupply_events::EventEnvelope;
use partsupply_pricing::{PricingRuleEvent, PricingRuleId, RuleSnapshot, ordered_rules};

use super::Projection;
use super::cursor::{ProjectionError, StreamCursors, decode};
use crate::read_model::{InMemorySupplierStore, SupplierStore};
use crate::streams;

/// Rule snapshots per supplier, as the pricing engine consumes them.
#[derive(Debug)]
pub struct PricingRulesProjection<S = InMemorySupplierStore<PricingRuleId, RuleSnapshot>>
where
    S: SupplierStore<PricingRuleId, RuleSnapshot>,
{
    store: S,
    cursors: StreamCursors,
}

impl Default for PricingRulesProjection {
    fn default() -> Self {
        Self::new(InMemorySupplierStore::new())
    }
}

impl<S> PricingRulesProjection<S>
where
    S: SupplierStore<PricingRuleId, RuleSnapshot>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, supplier_id: SupplierId, rule_id: &PricingRuleId) -> Option<RuleSnapshot> {
        self.store.get(supplier_id, rule_id)
    }

    /// Every rule of the supplier, active or not.
    pub fn list(&self, supplier_id: SupplierId) -> Vec<RuleSnapshot> {
        self.store.list(supplier_id)
    }

    /// Active rules in evaluation order.
    pub fn active_rules(&self, supplier_id: SupplierId) -> Vec<RuleSnapshot> {
        let all = self.store.list(supplier_id);
        ordered_rules(&all).into_iter().cloned().collect()
    }

    fn apply_event(&self, supplier_id: SupplierId, event: PricingRuleEvent) -> Result<(), ProjectionError> {
        match event {
            PricingRuleEvent::RuleCreated(e) => {
                self.store.upsert(
                    supplier_id,
                    e.rule_id,
                    RuleSnapshot {
                        rule_id: e.rule_id,
                        supplier_id,
                        definition: e.definition,
                        is_active: true,
                    },
                );
            }
            PricingRuleEvent::RuleUpdated(e) => {
                let mut snapshot = self.existing(supplier_id, e.rule_id)?;
                snapshot.definition = e.definition;
                self.store.upsert(supplier_id, e.rule_id, snapshot);
            }
            PricingRuleEvent::RuleDeactivated(e) => {
                let mut snapshot = self.existing(supplier_id, e.rule_id)?;
                snapshot.is_active = false;
                self.store.upsert(supplier_id, e.rule_id, snapshot);
            }
        }
        Ok(())
    }

    fn existing(&self, supplier_id: SupplierId, rule_id: PricingRuleId) -> Result<RuleSnapshot, ProjectionError> {
        self.store
            .get(supplier_id, &rule_id)
            .ok_or_else(|| ProjectionError::SupplierIsolation(format!("pricing rule {rule_id} not projected")))
    }
}

impl<S> Projection for PricingRulesProjection<S>
where
    S: SupplierStore<PricingRuleId, RuleSnapshot>,
{
    fn aggregate_type(&self) -> &'static str {
        streams::PRICING_RULE
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != self.aggregate_type() {
            return Ok(());
        }

        self.cursors.advance(envelope, || {
            let event: PricingRuleEvent = decode(envelope, streams::PRICING_RULE, PricingRuleEvent::supplier_id)?;
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
