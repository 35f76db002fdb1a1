use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use partsupply_core::{
    Aggregate, AggregateId, AggregateRoot, BasisPoints, Cents, DomainError, SupplierId, UserId,
    money,
};
use partsupply_events::{Command, Event};

use crate::metrics::PerformanceMetrics;

/// Stream id of a supplier's own account aggregate.
///
/// The supplier id doubles as the aggregate id so the account can be loaded
/// without a lookup.
pub fn supplier_stream_id(supplier_id: SupplierId) -> AggregateId {
    AggregateId::from_uuid(*supplier_id.as_uuid())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Rejected,
}

impl core::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        })
    }
}

/// Subscription tier. Determines the platform commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionTier {
    pub fn commission_bps(&self) -> BasisPoints {
        match self {
            SubscriptionTier::Basic => 1_500,
            SubscriptionTier::Premium => 1_000,
            SubscriptionTier::Enterprise => 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    Manufacturer,
    Distributor,
    Retailer,
    Individual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierProfile {
    pub business_name: String,
    pub business_type: BusinessType,
    pub tax_id: Option<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    pub contact_email: Option<String>,
}

impl SupplierProfile {
    fn validate(&self) -> Result<(), DomainError> {
        if self.business_name.trim().is_empty() {
            return Err(DomainError::validation("business_name cannot be empty"));
        }
        if self.certifications.iter().any(|c| c.trim().is_empty()) {
            return Err(DomainError::validation("certifications cannot be blank"));
        }
        Ok(())
    }
}

/// Aggregate root: Supplier. Never hard-deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Supplier {
    id: AggregateId,
    supplier_id: Option<SupplierId>,
    owner: Option<UserId>,
    profile: Option<SupplierProfile>,
    verification: VerificationStatus,
    tier: SubscriptionTier,
    commission_bps: BasisPoints,
    metrics: PerformanceMetrics,
    auto_pricing_enabled: bool,
    auto_reorder_enabled: bool,
    onboarded_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Supplier {
    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            supplier_id: None,
            owner: None,
            profile: None,
            verification: VerificationStatus::Pending,
            tier: SubscriptionTier::Basic,
            commission_bps: SubscriptionTier::Basic.commission_bps(),
            metrics: PerformanceMetrics::initial(),
            auto_pricing_enabled: false,
            auto_reorder_enabled: false,
            onboarded_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn supplier_id(&self) -> Option<SupplierId> {
        self.supplier_id
    }

    pub fn owner(&self) -> Option<UserId> {
        self.owner
    }

    pub fn profile(&self) -> Option<&SupplierProfile> {
        self.profile.as_ref()
    }

    pub fn verification(&self) -> VerificationStatus {
        self.verification
    }

    pub fn tier(&self) -> SubscriptionTier {
        self.tier
    }

    pub fn commission_bps(&self) -> BasisPoints {
        self.commission_bps
    }

    /// Platform share of a sale at the current tier.
    pub fn commission_for(&self, amount: Cents) -> Cents {
        money::share_of(amount, self.commission_bps)
    }

    pub fn metrics(&self) -> &PerformanceMetrics {
        &self.metrics
    }

    pub fn auto_pricing_enabled(&self) -> bool {
        self.auto_pricing_enabled
    }

    pub fn auto_reorder_enabled(&self) -> bool {
        self.auto_reorder_enabled
    }

    pub fn onboarded_at(&self) -> Option<DateTime<Utc>> {
        self.onboarded_at
    }
}

impl AggregateRoot for Supplier {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Onboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Onboard {
    pub supplier_id: SupplierId,
    pub owner: UserId,
    pub profile: SupplierProfile,
    pub tier: SubscriptionTier,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProfile {
    pub supplier_id: SupplierId,
    pub profile: SupplierProfile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTier {
    pub supplier_id: SupplierId,
    pub tier: SubscriptionTier,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetVerification (external review outcome).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetVerification {
    pub supplier_id: SupplierId,
    pub status: VerificationStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAutoPricing {
    pub supplier_id: SupplierId,
    pub enabled: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAutoReorder {
    pub supplier_id: SupplierId,
    pub enabled: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordMetrics. Emits nothing when the metrics are unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetrics {
    pub supplier_id: SupplierId,
    pub metrics: PerformanceMetrics,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SupplierCommand {
    Onboard(Onboard),
    UpdateProfile(UpdateProfile),
    ChangeTier(ChangeTier),
    SetVerification(SetVerification),
    SetAutoPricing(SetAutoPricing),
    SetAutoReorder(SetAutoReorder),
    RecordMetrics(RecordMetrics),
}

partsupply_events::variant_fields! {
    SupplierCommand [
        Onboard,
        UpdateProfile,
        ChangeTier,
        SetVerification,
        SetAutoPricing,
        SetAutoReorder,
        RecordMetrics,
    ] {
        fn supplier_id -> SupplierId;
    }
}

impl Command for SupplierCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        supplier_stream_id(self.supplier_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierOnboarded {
    pub supplier_id: SupplierId,
    pub owner: UserId,
    pub profile: SupplierProfile,
    pub tier: SubscriptionTier,
    pub commission_bps: BasisPoints,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub supplier_id: SupplierId,
    pub profile: SupplierProfile,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierChanged {
    pub supplier_id: SupplierId,
    pub from: SubscriptionTier,
    pub to: SubscriptionTier,
    pub commission_bps: BasisPoints,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationChanged {
    pub supplier_id: SupplierId,
    pub from: VerificationStatus,
    pub to: VerificationStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoPricingToggled {
    pub supplier_id: SupplierId,
    pub enabled: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoReorderToggled {
    pub supplier_id: SupplierId,
    pub enabled: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecorded {
    pub supplier_id: SupplierId,
    pub metrics: PerformanceMetrics,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SupplierEvent {
    SupplierOnboarded(SupplierOnboarded),
    ProfileUpdated(ProfileUpdated),
    TierChanged(TierChanged),
    VerificationChanged(VerificationChanged),
    AutoPricingToggled(AutoPricingToggled),
    AutoReorderToggled(AutoReorderToggled),
    MetricsRecorded(MetricsRecorded),
}

partsupply_events::variant_fields! {
    SupplierEvent [
        SupplierOnboarded,
        ProfileUpdated,
        TierChanged,
        VerificationChanged,
        AutoPricingToggled,
        AutoReorderToggled,
        MetricsRecorded,
    ] {
        fn supplier_id -> SupplierId;
        fn occurred_at -> DateTime<Utc>;
    }
}

impl Event for SupplierEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SupplierEvent::SupplierOnboarded(_) => "suppliers.supplier.onboarded",
            SupplierEvent::ProfileUpdated(_) => "suppliers.supplier.profile_updated",
            SupplierEvent::TierChanged(_) => "suppliers.supplier.tier_changed",
            SupplierEvent::VerificationChanged(_) => "suppliers.supplier.verification_changed",
            SupplierEvent::AutoPricingToggled(_) => "suppliers.supplier.auto_pricing_toggled",
            SupplierEvent::AutoReorderToggled(_) => "suppliers.supplier.auto_reorder_toggled",
            SupplierEvent::MetricsRecorded(_) => "suppliers.supplier.metrics_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        SupplierEvent::occurred_at(self)
    }
}

impl Aggregate for Supplier {
    type Command = SupplierCommand;
    type Event = SupplierEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SupplierEvent::SupplierOnboarded(e) => {
                self.id = supplier_stream_id(e.supplier_id);
                self.supplier_id = Some(e.supplier_id);
                self.owner = Some(e.owner);
                self.profile = Some(e.profile.clone());
                self.verification = VerificationStatus::Pending;
                self.tier = e.tier;
                self.commission_bps = e.commission_bps;
                self.metrics = PerformanceMetrics::initial();
                self.onboarded_at = Some(e.occurred_at);
                self.created = true;
            }
            SupplierEvent::ProfileUpdated(e) => {
                self.profile = Some(e.profile.clone());
            }
            SupplierEvent::TierChanged(e) => {
                self.tier = e.to;
                self.commission_bps = e.commission_bps;
            }
            SupplierEvent::VerificationChanged(e) => {
                self.verification = e.to;
            }
            SupplierEvent::AutoPricingToggled(e) => {
                self.auto_pricing_enabled = e.enabled;
            }
            SupplierEvent::AutoReorderToggled(e) => {
                self.auto_reorder_enabled = e.enabled;
            }
            SupplierEvent::MetricsRecorded(e) => {
                self.metrics = e.metrics;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if let SupplierCommand::Onboard(cmd) = command {
            return self.handle_onboard(cmd);
        }

        self.ensure_existing(command.supplier_id())?;

        match command {
            SupplierCommand::Onboard(_) => Ok(vec![]),
            SupplierCommand::UpdateProfile(cmd) => {
                cmd.profile.validate()?;
                Ok(vec![SupplierEvent::ProfileUpdated(ProfileUpdated {
                    supplier_id: cmd.supplier_id,
                    profile: cmd.profile.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            SupplierCommand::ChangeTier(cmd) => {
                if cmd.tier == self.tier {
                    return Ok(vec![]);
                }
                Ok(vec![SupplierEvent::TierChanged(TierChanged {
                    supplier_id: cmd.supplier_id,
                    from: self.tier,
                    to: cmd.tier,
                    commission_bps: cmd.tier.commission_bps(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            SupplierCommand::SetVerification(cmd) => self.handle_verification(cmd),
            SupplierCommand::SetAutoPricing(cmd) => {
                if cmd.enabled == self.auto_pricing_enabled {
                    return Ok(vec![]);
                }
                Ok(vec![SupplierEvent::AutoPricingToggled(AutoPricingToggled {
                    supplier_id: cmd.supplier_id,
                    enabled: cmd.enabled,
                    occurred_at: cmd.occurred_at,
                })])
            }
            SupplierCommand::SetAutoReorder(cmd) => {
                if cmd.enabled == self.auto_reorder_enabled {
                    return Ok(vec![]);
                }
                Ok(vec![SupplierEvent::AutoReorderToggled(AutoReorderToggled {
                    supplier_id: cmd.supplier_id,
                    enabled: cmd.enabled,
                    occurred_at: cmd.occurred_at,
                })])
            }
            SupplierCommand::RecordMetrics(cmd) => {
                if cmd.metrics == self.metrics {
                    return Ok(vec![]);
                }
                Ok(vec![SupplierEvent::MetricsRecorded(MetricsRecorded {
                    supplier_id: cmd.supplier_id,
                    metrics: cmd.metrics,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Supplier {
    fn ensure_existing(&self, supplier_id: SupplierId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.supplier_id != Some(supplier_id) {
            return Err(DomainError::invariant("supplier mismatch"));
        }
        Ok(())
    }

    fn handle_onboard(&self, cmd: &Onboard) -> Result<Vec<SupplierEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("supplier already onboarded"));
        }
        cmd.profile.validate()?;

        Ok(vec![SupplierEvent::SupplierOnboarded(SupplierOnboarded {
            supplier_id: cmd.supplier_id,
            owner: cmd.owner,
            profile: cmd.profile.clone(),
            tier: cmd.tier,
            commission_bps: cmd.tier.commission_bps(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_verification(&self, cmd: &SetVerification) -> Result<Vec<SupplierEvent>, DomainError> {
        let allowed = self.verification == VerificationStatus::Pending
            && matches!(cmd.status, VerificationStatus::Verified | VerificationStatus::Rejected);
        if !allowed {
            return Err(DomainError::invalid_transition(self.verification, cmd.status));
        }

        Ok(vec![SupplierEvent::VerificationChanged(VerificationChanged {
            supplier_id: cmd.supplier_id,
            from: self.verification,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}
