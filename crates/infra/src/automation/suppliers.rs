use partsupply_core::{SupplierId, UserId};
use partsupply_suppliers::{
    ChangeTier, Onboard, SetVerification, SubscriptionTier, Supplier, SupplierCommand,
    SupplierProfile, UpdateProfile, VerificationStatus, supplier_stream_id,
};

use super::{AutomationCoordinator, AutomationError, supplier_account};
use crate::streams;

impl AutomationCoordinator {
    /// Register a supplier. It starts pending verification with the tier's
    /// commission and a 5.0 rating.
    pub fn onboard_supplier(
        &self,
        owner: UserId,
        profile: SupplierProfile,
        tier: SubscriptionTier,
    ) -> Result<SupplierId, AutomationError> {
        let supplier_id = SupplierId::new();
        let command = SupplierCommand::Onboard(Onboard {
            supplier_id,
            owner,
            profile,
            tier,
            occurred_at: self.clock.now(),
        });
        self.supplier_command(supplier_id, "onboard", &command)?;
        tracing::info!(%supplier_id, ?tier, "supplier onboarded");
        Ok(supplier_id)
    }

    pub fn update_supplier_profile(
        &self,
        supplier_id: SupplierId,
        profile: SupplierProfile,
    ) -> Result<Supplier, AutomationError> {
        let command = SupplierCommand::UpdateProfile(UpdateProfile {
            supplier_id,
            profile,
            occurred_at: self.clock.now(),
        });
        self.supplier_command(supplier_id, "update_profile", &command)
    }

    /// Move to another subscription tier; the commission rate follows.
    pub fn change_tier(&self, supplier_id: SupplierId, tier: SubscriptionTier) -> Result<Supplier, AutomationError> {
        let command = SupplierCommand::ChangeTier(ChangeTier {
            supplier_id,
            tier,
            occurred_at: self.clock.now(),
        });
        self.supplier_command(supplier_id, "change_tier", &command)
    }

    /// Record the outcome of the external verification review.
    pub fn set_verification(
        &self,
        supplier_id: SupplierId,
        status: VerificationStatus,
    ) -> Result<Supplier, AutomationError> {
        let command = SupplierCommand::SetVerification(SetVerification {
            supplier_id,
            status,
            occurred_at: self.clock.now(),
        });
        self.supplier_command(supplier_id, "set_verification", &command)
    }

    pub fn supplier(&self, supplier_id: SupplierId) -> Result<Supplier, AutomationError> {
        let supplier = self.load(streams::SUPPLIER, supplier_id, supplier_stream_id(supplier_id), supplier_account)?;
        if !supplier.is_created() {
            return Err(AutomationError::not_found("supplier", supplier_id));
        }
        Ok(supplier)
    }

    pub(super) fn supplier_command(
        &self,
        supplier_id: SupplierId,
        command_name: &'static str,
        command: &SupplierCommand,
    ) -> Result<Supplier, AutomationError> {
        let dispatched = self.execute(
            streams::SUPPLIER,
            command_name,
            supplier_id,
            supplier_stream_id(supplier_id),
            command,
            supplier_account,
        )?;
        self.sync_read_models()?;
        Ok(dispatched.aggregate)
    }
}
