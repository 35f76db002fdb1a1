//! Event-sourcing mechanics shared by the supplier automation aggregates.
//!
//! Nothing here knows about inventory, pricing or orders; it only describes
//! how facts are named, wrapped, scoped to a supplier and fanned out.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
mod fields;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
