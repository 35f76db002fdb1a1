//! Performance metrics calculator.
//!
//! Always recomputed from the full order history. The same history yields
//! bit-identical metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const STARTING_RATING: f64 = 5.0;
const MIN_RATING: f64 = 1.0;
const PENALTY: f64 = 0.5;

/// The parts of one order's history the calculator looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTimeline {
    pub received_at: DateTime<Utc>,
    /// First transition into `processing`, if any.
    pub first_processing_at: Option<DateTime<Utc>>,
    pub delivered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub rating: f64,
    pub total_orders: u64,
    /// Percentage of orders delivered (0..=100).
    pub fulfillment_rate: f64,
    /// Mean hours from received to first processing.
    pub response_time_hours: f64,
}

impl PerformanceMetrics {
    /// Metrics of a freshly onboarded supplier.
    pub fn initial() -> Self {
        Self {
            rating: STARTING_RATING,
            total_orders: 0,
            fulfillment_rate: 0.0,
            response_time_hours: 0.0,
        }
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::initial()
    }
}

pub fn recompute(orders: &[OrderTimeline]) -> PerformanceMetrics {
    let total = orders.len() as u64;
    let delivered = orders.iter().filter(|o| o.delivered).count() as u64;

    let fulfillment_rate = if total == 0 {
        0.0
    } else {
        delivered as f64 * 100.0 / total as f64
    };

    let response_secs: Vec<i64> = orders
        .iter()
        .filter_map(|o| {
            o.first_processing_at
                .map(|p| (p - o.received_at).num_seconds().max(0))
        })
        .collect();
    let response_time_hours = if response_secs.is_empty() {
        0.0
    } else {
        let sum: i64 = response_secs.iter().sum();
        sum as f64 / response_secs.len() as f64 / 3600.0
    };

    PerformanceMetrics {
        rating: rating(fulfillment_rate, response_time_hours),
        total_orders: total,
        fulfillment_rate,
        response_time_hours,
    }
}

fn rating(fulfillment_rate: f64, response_time_hours: f64) -> f64 {
    let mut rating = STARTING_RATING;
    if fulfillment_rate < 95.0 {
        rating -= PENALTY;
    }
    if fulfillment_rate < 90.0 {
        rating -= PENALTY;
    }
    if response_time_hours > 48.0 {
        rating -= PENALTY;
    }
    if response_time_hours > 72.0 {
        rating -= PENALTY;
    }
    rating.max(MIN_RATING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn order(response_hours: Option<i64>, delivered: bool) -> OrderTimeline {
        OrderTimeline {
            received_at: t0(),
            first_processing_at: response_hours.map(|h| t0() + Duration::hours(h)),
            delivered,
        }
    }

    #[test]
    fn no_orders_applies_the_formula_literally() {
        let m = recompute(&[]);
        assert_eq!(m.total_orders, 0);
        assert_eq!(m.fulfillment_rate, 0.0);
        assert_eq!(m.response_time_hours, 0.0);
        assert_eq!(m.rating, 4.0);
    }

    #[test]
    fn single_delivered_order_is_perfect() {
        let m = recompute(&[order(Some(2), true)]);
        assert_eq!(m.fulfillment_rate, 100.0);
        assert_eq!(m.response_time_hours, 2.0);
        assert_eq!(m.rating, 5.0);
    }

    #[test]
    fn slow_responses_and_low_fulfillment_stack_penalties() {
        let orders = vec![
            order(Some(80), true),
            order(Some(80), false),
            order(None, false),
        ];
        let m = recompute(&orders);
        assert_eq!(m.total_orders, 3);
        assert_eq!(m.response_time_hours, 80.0);
        // -1.0 fulfillment, -1.0 response
        assert_eq!(m.rating, 3.0);
    }

    #[test]
    fn between_thresholds_costs_half_a_point_each() {
        let mut orders: Vec<OrderTimeline> = (0..92).map(|_| order(Some(50), true)).collect();
        orders.extend((0..8).map(|_| order(Some(50), false)));
        let m = recompute(&orders);
        assert_eq!(m.fulfillment_rate, 92.0);
        assert_eq!(m.rating, 4.0);
    }

    #[test]
    fn recompute_is_idempotent() {
        let orders = vec![order(Some(3), true), order(Some(7), false), order(None, true)];
        assert_eq!(recompute(&orders), recompute(&orders));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: rating stays within [1, 5] and rate within [0, 100].
        #[test]
        fn metrics_stay_in_range(
            history in prop::collection::vec((prop::option::of(0i64..500), any::<bool>()), 0..50)
        ) {
            let orders: Vec<OrderTimeline> = history.iter().map(|(h, d)| order(*h, *d)).collect();
            let m = recompute(&orders);
            prop_assert!(m.rating >= 1.0 && m.rating <= 5.0);
            prop_assert!(m.fulfillment_rate >= 0.0 && m.fulfillment_rate <= 100.0);
            prop_assert_eq!(m.total_orders, orders.len() as u64);
        }
    }
}
