//! Ports to collaborators outside the supplier subsystem.
//!
//! The catalog owns canonical part records and receives derived prices. The
//! competitor feed supplies market prices for competitor-type pricing rules.
//! In-memory implementations back tests and single-process deployments.

pub mod catalog;
pub mod competitor_feed;

use thiserror::Error;

use partsupply_core::PartId;

pub use catalog::{CatalogClient, CatalogPart, InMemoryCatalog, PartDraft};
pub use competitor_feed::{CompetitorFeed, StaticCompetitorFeed};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    #[error("part {0} not found in catalog")]
    NotFound(PartId),

    /// Transport or collaborator failure. Retried on the next sweep.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}
