use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use partsupply_core::{Cents, PartId};

use super::ExternalError;

/// Market prices for a part. An empty list means no competitor lists it.
pub trait CompetitorFeed: Send + Sync {
    fn fetch_competitor_prices(&self, part_id: PartId) -> Result<Vec<Cents>, ExternalError>;
}

impl<F> CompetitorFeed for Arc<F>
where
    F: CompetitorFeed + ?Sized,
{
    fn fetch_competitor_prices(&self, part_id: PartId) -> Result<Vec<Cents>, ExternalError> {
        (**self).fetch_competitor_prices(part_id)
    }
}

#[derive(Debug, Default)]
struct FeedState {
    prices: HashMap<PartId, Vec<Cents>>,
    failing: HashSet<PartId>,
}

/// Feed backed by prices set up front (tests, offline imports).
#[derive(Debug, Default)]
pub struct StaticCompetitorFeed {
    inner: RwLock<FeedState>,
}

impl StaticCompetitorFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_prices(&self, part_id: PartId, prices: Vec<Cents>) {
        if let Ok(mut state) = self.inner.write() {
            state.prices.insert(part_id, prices);
        }
    }

    pub fn fail_part(&self, part_id: PartId) {
        if let Ok(mut state) = self.inner.write() {
            state.failing.insert(part_id);
        }
    }
}

impl CompetitorFeed for StaticCompetitorFeed {
    fn fetch_competitor_prices(&self, part_id: PartId) -> Result<Vec<Cents>, ExternalError> {
        let state = self
            .inner
            .read()
            .map_err(|_| ExternalError::Unavailable("feed lock poisoned".to_string()))?;
        if state.failing.contains(&part_id) {
            return Err(ExternalError::Unavailable(format!("competitor feed failed for part {part_id}")));
        }
        Ok(state.prices.get(&part_id).cloned().unwrap_or_default())
    }
}
