//! Infrastructure layer: event store, command dispatch, read models,
//! collaborator ports, configuration and the automation coordinator.

pub mod automation;
pub mod clock;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod external;
pub mod projections;
pub mod read_model;
pub mod streams;


pub use automation::{AutomationCoordinator, AutomationError};
