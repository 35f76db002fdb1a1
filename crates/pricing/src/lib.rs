//! Pricing rules (event-sourced) and the pricing rule engine.
//!
//! Rule storage and price derivation are kept apart: the engine is a pure
//! function over rule snapshots, and writing the derived price back to the
//! catalog is an infrastructure concern.

pub mod engine;
pub mod rule;

pub use engine::{
    PriceQuote, PriceSource, PricingInput, competitor_average, derive_price, derive_price_with,
    ordered_rules,
};
pub use rule::{
    CreateRule, DeactivateRule, Markup, PriceBounds, PricingRule, PricingRuleCommand,
    PricingRuleEvent, PricingRuleId, RuleCreated, RuleDeactivated, RuleDefinition, RuleMatch,
    RuleSnapshot, RuleUpdated, UpdateRule,
};
