use partsupply_core::{AggregateId, SupplierId};
use partsupply_inventory::{InventoryItemId, ReorderRequestId};
use partsupply_pricing::{
    CreateRule, DeactivateRule, PriceQuote, PricingInput, PricingRuleCommand, PricingRuleId,
    RuleDefinition, RuleSnapshot, UpdateRule, derive_price_with,
};
use partsupply_suppliers::{SetAutoPricing, SetAutoReorder, Supplier, SupplierCommand};

use super::{AutomationCoordinator, AutomationError, pricing_rule};
use crate::projections::InventoryLevel;
use crate::streams;

/// One item (or supplier) the automation could not process. Retried on the
/// next run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomationFailure {
    pub supplier_id: SupplierId,
    pub item_id: Option<InventoryItemId>,
    pub reason: String,
}

/// Outcome of pricing every item of one supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PricingReport {
    /// Prices pushed to the catalog.
    pub written: usize,
    /// Derived price already matched the catalog.
    pub unchanged: usize,
    /// Derived but not written because write-back is disabled.
    pub computed_only: usize,
    pub failures: Vec<AutomationFailure>,
}

impl PricingReport {
    fn merge(&mut self, other: PricingReport) {
        self.written += other.written;
        self.unchanged += other.unchanged;
        self.computed_only += other.computed_only;
        self.failures.extend(other.failures);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub suppliers_priced: usize,
    pub suppliers_reordered: usize,
    pub pricing: PricingReport,
    pub reorders_opened: Vec<ReorderRequestId>,
    /// Reorder-side failures. Pricing failures live in `pricing.failures`.
    pub failures: Vec<AutomationFailure>,
}

impl SweepReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len() + self.pricing.failures.len()
    }
}

enum PriceOutcome {
    Written,
    Unchanged,
    ComputedOnly,
}

impl AutomationCoordinator {
    /// Create a rule and reprice the supplier's items.
    pub fn create_pricing_rule(
        &self,
        supplier_id: SupplierId,
        definition: RuleDefinition,
    ) -> Result<(PricingRuleId, PricingReport), AutomationError> {
        self.supplier(supplier_id)?;
        let rule_id = self.record_rule(supplier_id, definition)?;
        Ok((rule_id, self.reprice_supplier(supplier_id)))
    }

    pub fn update_pricing_rule(
        &self,
        supplier_id: SupplierId,
        rule_id: PricingRuleId,
        definition: RuleDefinition,
    ) -> Result<PricingReport, AutomationError> {
        let command = PricingRuleCommand::UpdateRule(UpdateRule {
            supplier_id,
            rule_id,
            definition,
            occurred_at: self.clock.now(),
        });
        self.execute(streams::PRICING_RULE, "update_rule", supplier_id, rule_id.0, &command, pricing_rule)?;
        self.sync_read_models()?;
        Ok(self.reprice_supplier(supplier_id))
    }

    /// Rules are deactivated, never deleted.
    pub fn deactivate_pricing_rule(
        &self,
        supplier_id: SupplierId,
        rule_id: PricingRuleId,
    ) -> Result<PricingReport, AutomationError> {
        let command = PricingRuleCommand::DeactivateRule(DeactivateRule {
            supplier_id,
            rule_id,
            occurred_at: self.clock.now(),
        });
        self.execute(streams::PRICING_RULE, "deactivate_rule", supplier_id, rule_id.0, &command, pricing_rule)?;
        self.sync_read_models()?;
        Ok(self.reprice_supplier(supplier_id))
    }

    /// Turn on automatic pricing, store the supplied rules, and price the
    /// existing inventory once.
    pub fn enable_auto_pricing(
        &self,
        supplier_id: SupplierId,
        rules: Vec<RuleDefinition>,
    ) -> Result<PricingReport, AutomationError> {
        for definition in &rules {
            definition.validate().map_err(|e| AutomationError::Validation(e.to_string()))?;
        }

        self.set_auto_pricing(supplier_id, true)?;
        for definition in rules {
            self.record_rule(supplier_id, definition)?;
        }
        Ok(self.reprice_supplier(supplier_id))
    }

    pub fn disable_auto_pricing(&self, supplier_id: SupplierId) -> Result<Supplier, AutomationError> {
        self.set_auto_pricing(supplier_id, false)
    }

    /// Turn on batch reordering and run the trigger over the current stock.
    pub fn enable_auto_reorder(&self, supplier_id: SupplierId) -> Result<SweepReport, AutomationError> {
        let command = SupplierCommand::SetAutoReorder(SetAutoReorder {
            supplier_id,
            enabled: true,
            occurred_at: self.clock.now(),
        });
        self.supplier_command(supplier_id, "set_auto_reorder", &command)?;

        let mut report = SweepReport {
            suppliers_reordered: 1,
            ..SweepReport::default()
        };
        self.collect_reorders(supplier_id, &mut report);
        Ok(report)
    }

    pub fn disable_auto_reorder(&self, supplier_id: SupplierId) -> Result<Supplier, AutomationError> {
        let command = SupplierCommand::SetAutoReorder(SetAutoReorder {
            supplier_id,
            enabled: false,
            occurred_at: self.clock.now(),
        });
        self.supplier_command(supplier_id, "set_auto_reorder", &command)
    }

    /// Re-derive a supplier's prices against fresh competitor data.
    pub fn refresh_competitor_prices(&self, supplier_id: SupplierId) -> Result<PricingReport, AutomationError> {
        self.supplier(supplier_id)?;
        self.sync_read_models()?;
        Ok(self.reprice_supplier(supplier_id))
    }

    /// Externally scheduled batch: price every supplier with automatic
    /// pricing, reorder for every supplier with automatic reordering.
    ///
    /// Failures are logged and reported; they never stop the batch.
    pub fn run_sweep(&self) -> Result<SweepReport, AutomationError> {
        self.sync_read_models()?;
        let mut report = SweepReport::default();

        for supplier_id in self.read_models.suppliers.with_auto_pricing() {
            report.suppliers_priced += 1;
            let priced = self.reprice_supplier(supplier_id);
            report.pricing.merge(priced);
        }

        for supplier_id in self.read_models.suppliers.with_auto_reorder() {
            report.suppliers_reordered += 1;
            self.collect_reorders(supplier_id, &mut report);
        }

        tracing::info!(
            suppliers_priced = report.suppliers_priced,
            prices_written = report.pricing.written,
            reorders_opened = report.reorders_opened.len(),
            failures = report.failure_count(),
            "sweep finished"
        );
        Ok(report)
    }

    /// Derive and write back a price for every live item of the supplier.
    pub(super) fn reprice_supplier(&self, supplier_id: SupplierId) -> PricingReport {
        let rules = self.read_models.pricing_rules.active_rules(supplier_id);
        let mut report = PricingReport::default();

        for level in self.read_models.inventory.list(supplier_id) {
            if level.retired {
                continue;
            }
            match self.reprice_item(&level, &rules) {
                Ok(PriceOutcome::Written) => report.written += 1,
                Ok(PriceOutcome::Unchanged) => report.unchanged += 1,
                Ok(PriceOutcome::ComputedOnly) => report.computed_only += 1,
                Err(err) => {
                    tracing::warn!(
                        %supplier_id,
                        item_id = %level.item_id,
                        part_id = %level.part_id,
                        error = %err,
                        "price update failed; will retry on next sweep"
                    );
                    report.failures.push(AutomationFailure {
                        supplier_id,
                        item_id: Some(level.item_id),
                        reason: err.to_string(),
                    });
                }
            }
        }
        report
    }

    fn reprice_item(
        &self,
        level: &InventoryLevel,
        rules: &[RuleSnapshot],
    ) -> Result<PriceOutcome, AutomationError> {
        let part = self.catalog.get_part(level.part_id)?;

        let input = PricingInput {
            part_id: level.part_id,
            category: Some(part.category),
            brand: Some(part.brand),
            cost_price: level.cost_price,
            markup_bps: level.markup_bps,
        };
        let PriceQuote { price, source } =
            derive_price_with(&input, rules, || self.feed.fetch_competitor_prices(level.part_id))?;

        if self.config.pricing.skip_unchanged && price == part.price {
            return Ok(PriceOutcome::Unchanged);
        }
        if !self.config.pricing.write_back_enabled {
            return Ok(PriceOutcome::ComputedOnly);
        }

        self.catalog.set_price(level.part_id, price)?;
        tracing::debug!(
            item_id = %level.item_id,
            part_id = %level.part_id,
            from = part.price,
            to = price,
            ?source,
            "price written back"
        );
        Ok(PriceOutcome::Written)
    }

    fn record_rule(&self, supplier_id: SupplierId, definition: RuleDefinition) -> Result<PricingRuleId, AutomationError> {
        let rule_id = PricingRuleId::new(AggregateId::new());
        let command = PricingRuleCommand::CreateRule(CreateRule {
            supplier_id,
            rule_id,
            definition,
            occurred_at: self.clock.now(),
        });
        self.execute(streams::PRICING_RULE, "create_rule", supplier_id, rule_id.0, &command, pricing_rule)?;
        self.sync_read_models()?;
        Ok(rule_id)
    }

    fn set_auto_pricing(&self, supplier_id: SupplierId, enabled: bool) -> Result<Supplier, AutomationError> {
        let command = SupplierCommand::SetAutoPricing(SetAutoPricing {
            supplier_id,
            enabled,
            occurred_at: self.clock.now(),
        });
        self.supplier_command(supplier_id, "set_auto_pricing", &command)
    }

    fn collect_reorders(&self, supplier_id: SupplierId, report: &mut SweepReport) {
        let (opened, failed) = self.reorder_backlog(supplier_id);
        report.reorders_opened.extend(opened);
        for (item_id, err) in failed {
            tracing::warn!(%supplier_id, %item_id, error = %err, "reorder check failed");
            report.failures.push(AutomationFailure {
                supplier_id,
                item_id: Some(item_id),
                reason: err.to_string(),
            });
        }
    }
}
