use chrono::Duration;
use serde::{Deserialize, Serialize};

use partsupply_core::{Cents, SupplierId, money};
use partsupply_fulfillment::OrderStatus;
use partsupply_suppliers::{OrderTimeline, PerformanceMetrics, RecordMetrics, SupplierCommand, recompute};

use super::{AutomationCoordinator, AutomationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsPeriod {
    Week,
    Month,
    Quarter,
    Year,
}

impl AnalyticsPeriod {
    pub fn days(&self) -> i64 {
        match self {
            AnalyticsPeriod::Week => 7,
            AnalyticsPeriod::Month => 30,
            AnalyticsPeriod::Quarter => 90,
            AnalyticsPeriod::Year => 365,
        }
    }
}

/// Sales and stock summary for one supplier over a trailing window.
///
/// Cancelled orders count towards `order_count` but not towards revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierAnalytics {
    pub supplier_id: SupplierId,
    pub period: AnalyticsPeriod,
    pub revenue: Cents,
    pub order_count: usize,
    pub cancelled_count: usize,
    pub average_order_value: Cents,
    pub commission_owed: Cents,
    /// Stock on hand valued at cost.
    pub inventory_valuation: Cents,
    pub low_stock_items: usize,
    pub metrics: PerformanceMetrics,
}

impl AutomationCoordinator {
    /// Recompute performance metrics from the supplier's full order history
    /// and record them when they changed.
    pub fn recompute_metrics(&self, supplier_id: SupplierId) -> Result<PerformanceMetrics, AutomationError> {
        self.sync_read_models()?;
        let timelines: Vec<OrderTimeline> = self
            .read_models
            .orders
            .list(supplier_id)
            .iter()
            .map(|o| o.timeline())
            .collect();
        let metrics = recompute(&timelines);

        let command = SupplierCommand::RecordMetrics(RecordMetrics {
            supplier_id,
            metrics,
            occurred_at: self.clock.now(),
        });
        self.supplier_command(supplier_id, "record_metrics", &command)?;

        tracing::debug!(
            %supplier_id,
            rating = metrics.rating,
            fulfillment_rate = metrics.fulfillment_rate,
            response_time_hours = metrics.response_time_hours,
            "performance metrics recomputed"
        );
        Ok(metrics)
    }

    pub fn supplier_analytics(
        &self,
        supplier_id: SupplierId,
        period: AnalyticsPeriod,
    ) -> Result<SupplierAnalytics, AutomationError> {
        self.sync_read_models()?;
        let supplier = self
            .read_models
            .suppliers
            .get(supplier_id)
            .ok_or_else(|| AutomationError::not_found("supplier", supplier_id))?;

        let since = self.clock.now() - Duration::days(period.days());
        let orders = self.read_models.orders.placed_since(supplier_id, since);

        let cancelled_count = orders.iter().filter(|o| o.status == OrderStatus::Cancelled).count();
        let billable = orders.len() - cancelled_count;
        let revenue = orders
            .iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .map(|o| o.total)
            .fold(0, u64::saturating_add);
        let average_order_value = match u64::try_from(billable) {
            Ok(0) | Err(_) => 0,
            Ok(n) => (revenue + n / 2) / n,
        };

        let stock = self.read_models.inventory.list(supplier_id);
        let inventory_valuation = stock
            .iter()
            .filter(|l| !l.retired)
            .map(|l| l.valuation())
            .fold(0, u64::saturating_add);
        let low_stock_items = stock.iter().filter(|l| l.is_low_stock()).count();

        Ok(SupplierAnalytics {
            supplier_id,
            period,
            revenue,
            order_count: orders.len(),
            cancelled_count,
            average_order_value,
            commission_owed: money::share_of(revenue, supplier.commission_bps),
            inventory_valuation,
            low_stock_items,
            metrics: supplier.metrics,
        })
    }
}
