use partsupply_core::AggregateId;

/// A command targets exactly one aggregate stream.
///
/// Commands are intent ("reserve 2 units"); events are accepted facts
/// ("2 units reserved"). A rejected command leaves no trace in the store.
/// Supplier scoping is attached by the dispatcher when events are persisted,
/// so commands only need to name their target stream.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
