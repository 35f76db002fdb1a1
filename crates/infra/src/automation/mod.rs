//! Automation coordinator.
//!
//! Wires the aggregates, the read models and the external collaborators
//! together:
//!
//! ```text
//! place_order ──> reserve (ledger) ──> SupplierOrder(received)
//! transition  ──> SupplierOrder ──> decrement | release (ledger)
//! ledger move ──> reorder trigger ──> ReorderRequest(pending)
//! order event ──> metrics recompute ──> Supplier
//! rule change | sweep | feed refresh ──> pricing engine ──> catalog
//! ```
//!
//! Every operation is request-driven and synchronous. After each commit the
//! coordinator drains its bus subscription into the projections, so reads
//! issued by the same caller observe their own writes.

mod analytics;
mod inventory;
mod orders;
mod pricing;
mod reorder;
mod suppliers;

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

use partsupply_core::{Aggregate, AggregateId, DomainError, SupplierId};
use partsupply_events::{Event, EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use partsupply_fulfillment::{SupplierOrder, SupplierOrderId};
use partsupply_inventory::{InventoryItem, InventoryItemId, ReorderRequest, ReorderRequestId};
use partsupply_pricing::{PricingRule, PricingRuleId};
use partsupply_suppliers::Supplier;

use crate::clock::Clock;
use crate::command_dispatcher::{CommandDispatcher, DispatchError, Dispatched};
use crate::config::AutomationConfig;
use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore};
use crate::external::{CatalogClient, CompetitorFeed, ExternalError};
use crate::projections::{
    InventoryLevelsProjection, Projection, ProjectionError, PricingRulesProjection,
    ReorderRequestsProjection, SupplierDirectoryProjection, SupplierOrdersProjection, rebuild,
};

pub use analytics::{AnalyticsPeriod, SupplierAnalytics};
pub use inventory::NewInventoryItem;
pub use orders::{IntakeLine, OrderIntake, OrderTransition};
pub use pricing::{AutomationFailure, PricingReport, SweepReport};

pub type EnvelopeBus = InMemoryEventBus<EventEnvelope<JsonValue>>;

type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Arc<EnvelopeBus>>;

#[derive(Debug, Error)]
pub enum AutomationError {
    /// A command was refused. Carries the entity and the attempted command.
    #[error("{command} on {aggregate_type} {aggregate_id} failed: {source}")]
    Rejected {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
        command: &'static str,
        #[source]
        source: DispatchError,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    ReadModel(#[from] ProjectionError),
}

impl AutomationError {
    /// The business rule that refused the command, if that is what happened.
    pub fn domain(&self) -> Option<&DomainError> {
        match self {
            AutomationError::Rejected { source, .. } => source.domain(),
            _ => None,
        }
    }

    fn not_found(entity: &'static str, id: impl ToString) -> Self {
        AutomationError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Read models maintained by the coordinator.
#[derive(Default)]
pub struct ReadModels {
    pub inventory: InventoryLevelsProjection,
    pub pricing_rules: PricingRulesProjection,
    pub orders: SupplierOrdersProjection,
    pub reorders: ReorderRequestsProjection,
    pub suppliers: SupplierDirectoryProjection,
}

impl ReadModels {
    fn all(&self) -> [&dyn Projection; 5] {
        [
            &self.inventory,
            &self.pricing_rules,
            &self.orders,
            &self.reorders,
            &self.suppliers,
        ]
    }
}

pub struct AutomationCoordinator {
    dispatcher: Dispatcher,
    subscription: Mutex<Subscription<EventEnvelope<JsonValue>>>,
    read_models: ReadModels,
    catalog: Arc<dyn CatalogClient>,
    feed: Arc<dyn CompetitorFeed>,
    clock: Arc<dyn Clock>,
    config: AutomationConfig,
}

impl AutomationCoordinator {
    /// Build a coordinator over an existing store and bus.
    ///
    /// The read models start empty and are caught up from the store, so a
    /// coordinator can be attached to a store that already holds history.
    pub fn new(
        store: Arc<InMemoryEventStore>,
        bus: Arc<EnvelopeBus>,
        catalog: Arc<dyn CatalogClient>,
        feed: Arc<dyn CompetitorFeed>,
        clock: Arc<dyn Clock>,
        config: AutomationConfig,
    ) -> Result<Self, AutomationError> {
        let subscription = bus.subscribe();
        let coordinator = Self {
            dispatcher: CommandDispatcher::new(store, bus),
            subscription: Mutex::new(subscription),
            read_models: ReadModels::default(),
            catalog,
            feed,
            clock,
            config,
        };
        coordinator.rebuild_read_models()?;
        Ok(coordinator)
    }

    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<InMemoryEventStore> {
        self.dispatcher.store()
    }

    /// Drop every read model and replay the full event log into it.
    pub fn rebuild_read_models(&self) -> Result<(), AutomationError> {
        let subscription = self.subscription.lock().map_err(|_| ProjectionError::Poisoned)?;
        // Anything still queued is already in the log.
        subscription.drain();

        let history = self.dispatcher.store().read_all()?;
        for projection in self.read_models.all() {
            rebuild(projection, &history)?;
        }
        Ok(())
    }

    /// Apply every published envelope not yet seen by the read models.
    ///
    /// Concurrent callers may publish out of commit order. A projection that
    /// sees a gap is rebuilt from the log; the late envelope is then ignored
    /// as a duplicate.
    pub(crate) fn sync_read_models(&self) -> Result<(), AutomationError> {
        let subscription = self.subscription.lock().map_err(|_| ProjectionError::Poisoned)?;

        for envelope in subscription.drain() {
            for projection in self.read_models.all() {
                match projection.apply_envelope(&envelope) {
                    Ok(()) => {}
                    Err(ProjectionError::SequenceGap {
                        aggregate_id,
                        last,
                        found,
                    }) => {
                        tracing::debug!(
                            aggregate_type = projection.aggregate_type(),
                            %aggregate_id,
                            last,
                            found,
                            "projection behind the log; rebuilding"
                        );
                        rebuild(projection, &self.dispatcher.store().read_all()?)?;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
        Ok(())
    }

    /// Dispatch with the configured retry budget and label failures.
    fn execute<A>(
        &self,
        aggregate_type: &'static str,
        command_name: &'static str,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        command: &A::Command,
        make_aggregate: fn(SupplierId, AggregateId) -> A,
    ) -> Result<Dispatched<A>, AutomationError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        self.dispatcher
            .dispatch_with_retry(
                self.config.concurrency_retries,
                supplier_id,
                aggregate_id,
                aggregate_type,
                command,
                make_aggregate,
            )
            .map_err(|source| AutomationError::Rejected {
                aggregate_type,
                aggregate_id,
                command: command_name,
                source,
            })
    }

    /// Dispatch a follow-up write of an operation that has already committed.
    ///
    /// The command must have passed `precheck`. Concurrency conflicts are
    /// retried until the write lands; any other failure is returned.
    fn execute_settled<A>(
        &self,
        aggregate_type: &'static str,
        command_name: &'static str,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        command: &A::Command,
        make_aggregate: fn(SupplierId, AggregateId) -> A,
    ) -> Result<Dispatched<A>, AutomationError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let mut attempt = 0u64;
        loop {
            match self
                .dispatcher
                .dispatch(supplier_id, aggregate_id, aggregate_type, command, make_aggregate)
            {
                Err(DispatchError::Concurrency(conflict)) => {
                    attempt += 1;
                    tracing::debug!(
                        %supplier_id,
                        %aggregate_id,
                        aggregate_type,
                        command = command_name,
                        attempt,
                        %conflict,
                        "re-applying committed follow-up after concurrency conflict"
                    );
                }
                other => {
                    return other.map_err(|source| AutomationError::Rejected {
                        aggregate_type,
                        aggregate_id,
                        command: command_name,
                        source,
                    });
                }
            }
        }
    }

    /// Run the decision step only, to validate before committing anything.
    fn precheck<A>(
        &self,
        aggregate_type: &'static str,
        command_name: &'static str,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        command: &A::Command,
        make_aggregate: fn(SupplierId, AggregateId) -> A,
    ) -> Result<Vec<A::Event>, AutomationError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: DeserializeOwned,
    {
        self.dispatcher
            .decide(supplier_id, aggregate_id, command, make_aggregate)
            .map_err(|source| AutomationError::Rejected {
                aggregate_type,
                aggregate_id,
                command: command_name,
                source,
            })
    }

    fn load<A>(
        &self,
        aggregate_type: &'static str,
        supplier_id: SupplierId,
        aggregate_id: AggregateId,
        make_aggregate: fn(SupplierId, AggregateId) -> A,
    ) -> Result<A, AutomationError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        self.dispatcher
            .load(supplier_id, aggregate_id, make_aggregate)
            .map_err(|source| AutomationError::Rejected {
                aggregate_type,
                aggregate_id,
                command: "load",
                source,
            })
    }
}

fn inventory_item(_: SupplierId, id: AggregateId) -> InventoryItem {
    InventoryItem::empty(InventoryItemId::new(id))
}

fn reorder_request(_: SupplierId, id: AggregateId) -> ReorderRequest {
    ReorderRequest::empty(ReorderRequestId::new(id))
}

fn supplier_order(_: SupplierId, id: AggregateId) -> SupplierOrder {
    SupplierOrder::empty(SupplierOrderId::new(id))
}

fn pricing_rule(_: SupplierId, id: AggregateId) -> PricingRule {
    PricingRule::empty(PricingRuleId::new(id))
}

fn supplier_account(_: SupplierId, id: AggregateId) -> Supplier {
    Supplier::empty(id)
}
