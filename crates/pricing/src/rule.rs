use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partsupply_core::{
    Aggregate, AggregateId, AggregateRoot, BasisPoints, Cents, DomainError, PartId, SupplierId,
    ValueObject,
};
use partsupply_events::{Command, Event};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PricingRuleId(pub AggregateId);

impl PricingRuleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PricingRuleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What a rule applies to. One variant per rule type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule_type", rename_all = "snake_case")]
pub enum RuleMatch {
    Category { category: String },
    Brand { brand: String },
    PartSpecific { part_id: PartId },
    /// Always matches; prices from the competitor average instead of cost.
    Competitor,
}

impl RuleMatch {
    pub fn rule_type(&self) -> &'static str {
        match self {
            RuleMatch::Category { .. } => "category",
            RuleMatch::Brand { .. } => "brand",
            RuleMatch::PartSpecific { .. } => "part_specific",
            RuleMatch::Competitor => "competitor",
        }
    }

    pub fn is_competitor(&self) -> bool {
        matches!(self, RuleMatch::Competitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "markup_type", rename_all = "snake_case")]
pub enum Markup {
    Percentage { bps: BasisPoints },
    FixedAmount { cents: i64 },
}

impl ValueObject for Markup {}

impl Markup {
    pub fn apply(&self, base: Cents) -> Cents {
        match *self {
            Markup::Percentage { bps } => partsupply_core::money::apply_markup_bps(base, bps),
            Markup::FixedAmount { cents } => partsupply_core::money::apply_fixed(base, cents),
        }
    }
}

/// Optional `[min, max]` clamp applied after the markup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBounds {
    pub min_price: Option<Cents>,
    pub max_price: Option<Cents>,
}

impl ValueObject for PriceBounds {}

impl PriceBounds {
    pub fn clamp(&self, price: Cents) -> Cents {
        let mut price = price;
        if let Some(min) = self.min_price {
            price = price.max(min);
        }
        if let Some(max) = self.max_price {
            price = price.min(max);
        }
        price
    }
}

/// The editable part of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub matcher: RuleMatch,
    pub markup: Markup,
    #[serde(default)]
    pub bounds: PriceBounds,
    /// Lower value wins.
    pub priority: u32,
}

impl RuleDefinition {
    pub fn validate(&self) -> Result<(), DomainError> {
        match &self.matcher {
            RuleMatch::Category { category } if category.trim().is_empty() => {
                return Err(DomainError::validation("category rule needs a category"));
            }
            RuleMatch::Brand { brand } if brand.trim().is_empty() => {
                return Err(DomainError::validation("brand rule needs a brand"));
            }
            _ => {}
        }

        if let Markup::Percentage { bps } = self.markup {
            if bps <= -10_000 {
                return Err(DomainError::validation("percentage markup must be above -100%"));
            }
        }

        if let (Some(min), Some(max)) = (self.bounds.min_price, self.bounds.max_price) {
            if min > max {
                return Err(DomainError::validation("min_price cannot exceed max_price"));
            }
        }

        Ok(())
    }
}

/// Read-side view of a rule, as consumed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub rule_id: PricingRuleId,
    pub supplier_id: SupplierId,
    pub definition: RuleDefinition,
    pub is_active: bool,
}

/// Aggregate root: PricingRule. Deactivated, never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingRule {
    id: PricingRuleId,
    supplier_id: Option<SupplierId>,
    definition: Option<RuleDefinition>,
    active: bool,
    version: u64,
    created: bool,
}

impl PricingRule {
    pub fn empty(id: PricingRuleId) -> Self {
        Self {
            id,
            supplier_id: None,
            definition: None,
            active: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> PricingRuleId {
        self.id
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn definition(&self) -> Option<&RuleDefinition> {
        self.definition.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn snapshot(&self) -> Option<RuleSnapshot> {
        Some(RuleSnapshot {
            rule_id: self.id,
            supplier_id: self.supplier_id?,
            definition: self.definition.clone()?,
            is_active: self.active,
        })
    }
}

impl AggregateRoot for PricingRule {
    type Id = PricingRuleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRule {
    pub supplier_id: SupplierId,
    pub rule_id: PricingRuleId,
    pub definition: RuleDefinition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRule {
    pub supplier_id: SupplierId,
    pub rule_id: PricingRuleId,
    pub definition: RuleDefinition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateRule {
    pub supplier_id: SupplierId,
    pub rule_id: PricingRuleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingRuleCommand {
    CreateRule(CreateRule),
    UpdateRule(UpdateRule),
    DeactivateRule(DeactivateRule),
}

partsupply_events::variant_fields! {
    PricingRuleCommand [CreateRule, UpdateRule, DeactivateRule] {
        fn rule_id -> PricingRuleId;
    }
}

impl Command for PricingRuleCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.rule_id().0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCreated {
    pub supplier_id: SupplierId,
    pub rule_id: PricingRuleId,
    pub definition: RuleDefinition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleUpdated {
    pub supplier_id: SupplierId,
    pub rule_id: PricingRuleId,
    pub definition: RuleDefinition,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDeactivated {
    pub supplier_id: SupplierId,
    pub rule_id: PricingRuleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PricingRuleEvent {
    RuleCreated(RuleCreated),
    RuleUpdated(RuleUpdated),
    RuleDeactivated(RuleDeactivated),
}

partsupply_events::variant_fields! {
    PricingRuleEvent [RuleCreated, RuleUpdated, RuleDeactivated] {
        fn supplier_id -> SupplierId;
        fn rule_id -> PricingRuleId;
        fn occurred_at -> DateTime<Utc>;
    }
}

impl Event for PricingRuleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PricingRuleEvent::RuleCreated(_) => "pricing.rule.created",
            PricingRuleEvent::RuleUpdated(_) => "pricing.rule.updated",
            PricingRuleEvent::RuleDeactivated(_) => "pricing.rule.deactivated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        PricingRuleEvent::occurred_at(self)
    }
}

impl Aggregate for PricingRule {
    type Command = PricingRuleCommand;
    type Event = PricingRuleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PricingRuleEvent::RuleCreated(e) => {
                self.id = e.rule_id;
                self.supplier_id = Some(e.supplier_id);
                self.definition = Some(e.definition.clone());
                self.active = true;
                self.created = true;
            }
            PricingRuleEvent::RuleUpdated(e) => {
                self.definition = Some(e.definition.clone());
            }
            PricingRuleEvent::RuleDeactivated(_) => {
                self.active = false;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PricingRuleCommand::CreateRule(cmd) => self.handle_create(cmd),
            PricingRuleCommand::UpdateRule(cmd) => self.handle_update(cmd),
            PricingRuleCommand::DeactivateRule(cmd) => self.handle_deactivate(cmd),
        }
    }
}

impl PricingRule {
    fn ensure_existing(&self, supplier_id: SupplierId, rule_id: PricingRuleId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.supplier_id != Some(supplier_id) {
            return Err(DomainError::invariant("supplier mismatch"));
        }
        if self.id != rule_id {
            return Err(DomainError::invariant("rule_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRule) -> Result<Vec<PricingRuleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("pricing rule already exists"));
        }
        cmd.definition.validate()?;

        Ok(vec![PricingRuleEvent::RuleCreated(RuleCreated {
            supplier_id: cmd.supplier_id,
            rule_id: cmd.rule_id,
            definition: cmd.definition.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateRule) -> Result<Vec<PricingRuleEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.rule_id)?;
        if !self.active {
            return Err(DomainError::invariant("deactivated rules cannot be edited"));
        }
        cmd.definition.validate()?;

        Ok(vec![PricingRuleEvent::RuleUpdated(RuleUpdated {
            supplier_id: cmd.supplier_id,
            rule_id: cmd.rule_id,
            definition: cmd.definition.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateRule) -> Result<Vec<PricingRuleEvent>, DomainError> {
        self.ensure_existing(cmd.supplier_id, cmd.rule_id)?;
        if !self.active {
            return Ok(vec![]);
        }

        Ok(vec![PricingRuleEvent::RuleDeactivated(RuleDeactivated {
            supplier_id: cmd.supplier_id,
            rule_id: cmd.rule_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
