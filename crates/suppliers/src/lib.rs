//! Supplier accounts: onboarding, verification, commission tier, automation
//! flags, and the performance metrics derived from order history.

pub mod metrics;
pub mod supplier;

pub use metrics::{OrderTimeline, PerformanceMetrics, recompute};
pub use supplier::{
    AutoPricingToggled, AutoReorderToggled, BusinessType, ChangeTier, MetricsRecorded, Onboard,
    ProfileUpdated, RecordMetrics, SetAutoPricing, SetAutoReorder, SetVerification,
    SubscriptionTier, Supplier, SupplierCommand, SupplierEvent, SupplierOnboarded,
    SupplierProfile, TierChanged, UpdateProfile, VerificationChanged, VerificationStatus,
    supplier_stream_id,
};
