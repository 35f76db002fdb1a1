//! Price derivation.
//!
//! Pure over its inputs: the caller supplies rule snapshots and a way to
//! obtain competitor prices, the engine picks one rule (or the item markup)
//! and returns the price.

use std::convert::Infallible;

use serde::{Deserialize, Serialize};

use partsupply_core::{BasisPoints, Cents, PartId, money};

use crate::rule::{PricingRuleId, RuleMatch, RuleSnapshot};

/// Everything the engine needs to know about the item being priced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingInput {
    pub part_id: PartId,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub cost_price: Cents,
    /// Item-level markup used when no rule matches.
    pub markup_bps: BasisPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceSource {
    Rule(PricingRuleId),
    ItemMarkup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Cents,
    pub source: PriceSource,
}

/// Active rules in evaluation order: ascending priority, ties broken by rule id.
pub fn ordered_rules(rules: &[RuleSnapshot]) -> Vec<&RuleSnapshot> {
    let mut active: Vec<&RuleSnapshot> = rules.iter().filter(|r| r.is_active).collect();
    active.sort_by(|a, b| {
        a.definition
            .priority
            .cmp(&b.definition.priority)
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });
    active
}

/// Arithmetic mean, rounded half up. `None` for an empty feed.
pub fn competitor_average(prices: &[Cents]) -> Option<Cents> {
    if prices.is_empty() {
        return None;
    }
    let total: u128 = prices.iter().map(|p| u128::from(*p)).sum();
    let count = prices.len() as u128;
    let avg = (total + count / 2) / count;
    Some(u64::try_from(avg).unwrap_or(u64::MAX))
}

/// Cost-based predicates. Competitor rules are resolved against the feed.
fn matches(matcher: &RuleMatch, input: &PricingInput) -> bool {
    match matcher {
        RuleMatch::Category { category } => input
            .category
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(category)),
        RuleMatch::Brand { brand } => input
            .brand
            .as_deref()
            .is_some_and(|b| b.eq_ignore_ascii_case(brand)),
        RuleMatch::PartSpecific { part_id } => *part_id == input.part_id,
        RuleMatch::Competitor => false,
    }
}

/// Derive the selling price for one item from already-known competitor prices.
///
/// See [`derive_price_with`].
pub fn derive_price(input: &PricingInput, rules: &[RuleSnapshot], competitor_prices: &[Cents]) -> PriceQuote {
    match derive_price_with(input, rules, || Ok::<_, Infallible>(competitor_prices.to_vec())) {
        Ok(quote) => quote,
        Err(never) => match never {},
    }
}

/// Derive the selling price for one item.
///
/// The first matching active rule wins. Its markup is applied to the cost
/// (or to the competitor average for competitor rules) and the result is
/// clamped to the rule's bounds. Without a match the item markup applies,
/// unclamped.
///
/// `fetch_competitor_prices` runs at most once, and only when evaluation
/// reaches a competitor rule. Its error aborts the derivation.
pub fn derive_price_with<E>(
    input: &PricingInput,
    rules: &[RuleSnapshot],
    fetch_competitor_prices: impl FnOnce() -> Result<Vec<Cents>, E>,
) -> Result<PriceQuote, E> {
    let mut fetch = Some(fetch_competitor_prices);
    let mut competitor_base: Option<Cents> = None;

    for rule in ordered_rules(rules) {
        let definition = &rule.definition;
        let base = if definition.matcher.is_competitor() {
            if let Some(fetch) = fetch.take() {
                competitor_base = competitor_average(&fetch()?);
            }
            match competitor_base {
                Some(avg) => avg,
                None => continue,
            }
        } else if matches(&definition.matcher, input) {
            input.cost_price
        } else {
            continue;
        };

        return Ok(PriceQuote {
            price: definition.bounds.clamp(definition.markup.apply(base)),
            source: PriceSource::Rule(rule.rule_id),
        });
    }

    Ok(PriceQuote {
        price: money::apply_markup_bps(input.cost_price, input.markup_bps),
        source: PriceSource::ItemMarkup,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Markup, PriceBounds, RuleDefinition};
    use partsupply_core::{AggregateId, SupplierId};
    use proptest::prelude::*;

    fn input() -> PricingInput {
        PricingInput {
            part_id: PartId::new(),
            category: Some("Brakes".to_string()),
            brand: Some("Bosch".to_string()),
            cost_price: 10_000,
            markup_bps: 2_500,
        }
    }

    fn rule(matcher: RuleMatch, markup: Markup, bounds: PriceBounds, priority: u32) -> RuleSnapshot {
        RuleSnapshot {
            rule_id: PricingRuleId::new(AggregateId::new()),
            supplier_id: SupplierId::new(),
            definition: RuleDefinition {
                matcher,
                markup,
                bounds,
                priority,
            },
            is_active: true,
        }
    }

    fn brakes(bps: BasisPoints, bounds: PriceBounds, priority: u32) -> RuleSnapshot {
        rule(
            RuleMatch::Category {
                category: "brakes".to_string(),
            },
            Markup::Percentage { bps },
            bounds,
            priority,
        )
    }

    #[test]
    fn category_percentage_rule_applies() {
        let rules = vec![brakes(2_000, PriceBounds::default(), 1)];
        let quote = derive_price(&input(), &rules, &[]);
        assert_eq!(quote.price, 12_000);
        assert_eq!(quote.source, PriceSource::Rule(rules[0].rule_id));
    }

    #[test]
    fn max_price_clamps_the_result() {
        let bounds = PriceBounds {
            min_price: None,
            max_price: Some(11_000),
        };
        let rules = vec![brakes(2_000, bounds, 1)];
        assert_eq!(derive_price(&input(), &rules, &[]).price, 11_000);
    }

    #[test]
    fn lower_priority_value_wins() {
        let later = brakes(5_000, PriceBounds::default(), 20);
        let first = rule(
            RuleMatch::Brand {
                brand: "BOSCH".to_string(),
            },
            Markup::FixedAmount { cents: 300 },
            PriceBounds::default(),
            5,
        );
        let quote = derive_price(&input(), &[later, first.clone()], &[]);
        assert_eq!(quote.price, 10_300);
        assert_eq!(quote.source, PriceSource::Rule(first.rule_id));
    }

    #[test]
    fn inactive_rules_are_skipped() {
        let mut inactive = brakes(2_000, PriceBounds::default(), 1);
        inactive.is_active = false;
        let quote = derive_price(&input(), &[inactive], &[]);
        assert_eq!(quote.source, PriceSource::ItemMarkup);
        assert_eq!(quote.price, 12_500);
    }

    #[test]
    fn competitor_rule_prices_off_the_average() {
        let competitor = rule(
            RuleMatch::Competitor,
            Markup::Percentage { bps: -500 },
            PriceBounds::default(),
            1,
        );
        let quote = derive_price(&input(), &[competitor], &[10_000, 12_000]);
        // avg 11_000 * 0.95
        assert_eq!(quote.price, 10_450);
    }

    #[test]
    fn competitor_rule_without_prices_does_not_match() {
        let competitor = rule(
            RuleMatch::Competitor,
            Markup::Percentage { bps: -500 },
            PriceBounds::default(),
            1,
        );
        let fallback = brakes(1_000, PriceBounds::default(), 2);
        let quote = derive_price(&input(), &[competitor, fallback.clone()], &[]);
        assert_eq!(quote.source, PriceSource::Rule(fallback.rule_id));
        assert_eq!(quote.price, 11_000);
    }

    #[test]
    fn feed_is_not_consulted_when_an_earlier_rule_matches() {
        let category = brakes(2_000, PriceBounds::default(), 1);
        let competitor = rule(
            RuleMatch::Competitor,
            Markup::Percentage { bps: -500 },
            PriceBounds::default(),
            50,
        );
        let quote = derive_price_with(&input(), &[competitor, category.clone()], || {
            Err::<Vec<Cents>, &str>("feed down")
        })
        .unwrap();
        assert_eq!(quote.source, PriceSource::Rule(category.rule_id));
        assert_eq!(quote.price, 12_000);
    }

    #[test]
    fn feed_error_surfaces_once_a_competitor_rule_is_reached() {
        let competitor = rule(
            RuleMatch::Competitor,
            Markup::Percentage { bps: -500 },
            PriceBounds::default(),
            1,
        );
        let fallback = brakes(2_000, PriceBounds::default(), 5);
        let result = derive_price_with(&input(), &[competitor, fallback], || Err::<Vec<Cents>, &str>("feed down"));
        assert_eq!(result, Err("feed down"));
    }

    #[test]
    fn feed_is_fetched_once_for_several_competitor_rules() {
        let mut calls = 0;
        let bounded = rule(
            RuleMatch::Competitor,
            Markup::Percentage { bps: 0 },
            PriceBounds::default(),
            1,
        );
        let spare = rule(
            RuleMatch::Competitor,
            Markup::Percentage { bps: 0 },
            PriceBounds::default(),
            2,
        );
        let quote = derive_price_with(&input(), &[bounded, spare], || {
            calls += 1;
            Ok::<_, Infallible>(Vec::new())
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(quote.source, PriceSource::ItemMarkup);
    }

    #[test]
    fn part_specific_rule_matches_only_its_part() {
        let item = input();
        let specific = rule(
            RuleMatch::PartSpecific {
                part_id: item.part_id,
            },
            Markup::FixedAmount { cents: -2_000 },
            PriceBounds::default(),
            1,
        );
        assert_eq!(derive_price(&item, &[specific.clone()], &[]).price, 8_000);

        let other = PricingInput {
            part_id: PartId::new(),
            ..item
        };
        assert_eq!(derive_price(&other, &[specific], &[]).source, PriceSource::ItemMarkup);
    }

    #[test]
    fn average_rounds_half_up() {
        assert_eq!(competitor_average(&[]), None);
        assert_eq!(competitor_average(&[1, 2]), Some(2));
        assert_eq!(competitor_average(&[100, 200, 300]), Some(200));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: a matched rule's price always lies within its bounds.
        #[test]
        fn matched_price_respects_bounds(
            cost in 0u64..10_000_000u64,
            bps in -9_999i64..50_000i64,
            min in 0u64..5_000_000u64,
            span in 0u64..5_000_000u64,
        ) {
            let bounds = PriceBounds { min_price: Some(min), max_price: Some(min + span) };
            let rules = vec![brakes(bps, bounds, 1)];
            let item = PricingInput { cost_price: cost, ..input() };
            let quote = derive_price(&item, &rules, &[]);
            prop_assert!(quote.price >= min);
            prop_assert!(quote.price <= min + span);
        }
    }
}
