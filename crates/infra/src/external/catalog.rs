use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use partsupply_core::{Cents, PartId, SupplierId};

use super::ExternalError;

/// Canonical part record as the catalog exposes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPart {
    pub part_id: PartId,
    pub seller_id: SupplierId,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub price: Cents,
}

/// A part to create when a supplier stocks something the catalog lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDraft {
    pub part_id: PartId,
    pub seller_id: SupplierId,
    pub name: String,
    pub brand: String,
    pub category: String,
    pub price: Cents,
    pub stock_quantity: i64,
}

pub trait CatalogClient: Send + Sync {
    fn get_part(&self, part_id: PartId) -> Result<CatalogPart, ExternalError>;

    fn set_price(&self, part_id: PartId, price: Cents) -> Result<(), ExternalError>;

    fn create_part(&self, draft: PartDraft) -> Result<CatalogPart, ExternalError>;
}

impl<C> CatalogClient for Arc<C>
where
    C: CatalogClient + ?Sized,
{
    fn get_part(&self, part_id: PartId) -> Result<CatalogPart, ExternalError> {
        (**self).get_part(part_id)
    }

    fn set_price(&self, part_id: PartId, price: Cents) -> Result<(), ExternalError> {
        (**self).set_price(part_id, price)
    }

    fn create_part(&self, draft: PartDraft) -> Result<CatalogPart, ExternalError> {
        (**self).create_part(draft)
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    parts: HashMap<PartId, CatalogPart>,
    failing: HashSet<PartId>,
    price_writes: u64,
}

/// In-memory catalog for tests/dev.
///
/// `fail_part` makes every call touching that part return `Unavailable`,
/// which is how tests exercise partial sweep failures.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, part: CatalogPart) {
        if let Ok(mut state) = self.inner.write() {
            state.parts.insert(part.part_id, part);
        }
    }

    pub fn price_of(&self, part_id: PartId) -> Option<Cents> {
        let state = self.inner.read().ok()?;
        state.parts.get(&part_id).map(|p| p.price)
    }

    pub fn fail_part(&self, part_id: PartId) {
        if let Ok(mut state) = self.inner.write() {
            state.failing.insert(part_id);
        }
    }

    pub fn recover_part(&self, part_id: PartId) {
        if let Ok(mut state) = self.inner.write() {
            state.failing.remove(&part_id);
        }
    }

    /// Number of successful `set_price` calls so far.
    pub fn price_writes(&self) -> u64 {
        self.inner.read().map(|s| s.price_writes).unwrap_or(0)
    }

    fn unavailable() -> ExternalError {
        ExternalError::Unavailable("catalog lock poisoned".to_string())
    }
}

impl CatalogClient for InMemoryCatalog {
    fn get_part(&self, part_id: PartId) -> Result<CatalogPart, ExternalError> {
        let state = self.inner.read().map_err(|_| Self::unavailable())?;
        if state.failing.contains(&part_id) {
            return Err(ExternalError::Unavailable(format!("catalog read failed for part {part_id}")));
        }
        state.parts.get(&part_id).cloned().ok_or(ExternalError::NotFound(part_id))
    }

    fn set_price(&self, part_id: PartId, price: Cents) -> Result<(), ExternalError> {
        let mut state = self.inner.write().map_err(|_| Self::unavailable())?;
        if state.failing.contains(&part_id) {
            return Err(ExternalError::Unavailable(format!("price write failed for part {part_id}")));
        }
        let part = state.parts.get_mut(&part_id).ok_or(ExternalError::NotFound(part_id))?;
        part.price = price;
        state.price_writes += 1;
        Ok(())
    }

    fn create_part(&self, draft: PartDraft) -> Result<CatalogPart, ExternalError> {
        let mut state = self.inner.write().map_err(|_| Self::unavailable())?;
        if state.failing.contains(&draft.part_id) {
            return Err(ExternalError::Unavailable(format!(
                "part creation failed for {}",
                draft.part_id
            )));
        }
        let part = state
            .parts
            .entry(draft.part_id)
            .or_insert_with(|| CatalogPart {
                part_id: draft.part_id,
                seller_id: draft.seller_id,
                name: draft.name,
                brand: draft.brand,
                category: draft.category,
                price: draft.price,
            })
            .clone();
        Ok(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(part_id: PartId) -> PartDraft {
        PartDraft {
            part_id,
            seller_id: SupplierId::new(),
            name: "Part BRK-01".to_string(),
            brand: "Unknown".to_string(),
            category: "General".to_string(),
            price: 1_300,
            stock_quantity: 4,
        }
    }

    #[test]
    fn create_then_set_price() {
        let catalog = InMemoryCatalog::new();
        let part_id = PartId::new();

        catalog.create_part(draft(part_id)).unwrap();
        catalog.set_price(part_id, 1_450).unwrap();

        assert_eq!(catalog.price_of(part_id), Some(1_450));
        assert_eq!(catalog.price_writes(), 1);
    }

    #[test]
    fn create_does_not_overwrite_existing_part() {
        let catalog = InMemoryCatalog::new();
        let part_id = PartId::new();
        catalog.create_part(draft(part_id)).unwrap();
        catalog.set_price(part_id, 999).unwrap();

        let again = catalog.create_part(draft(part_id)).unwrap();
        assert_eq!(again.price, 999);
    }

    #[test]
    fn failing_part_reports_unavailable_until_recovered() {
        let catalog = InMemoryCatalog::new();
        let part_id = PartId::new();
        catalog.create_part(draft(part_id)).unwrap();
        catalog.fail_part(part_id);

        assert!(matches!(catalog.set_price(part_id, 1), Err(ExternalError::Unavailable(_))));
        catalog.recover_part(part_id);
        assert!(catalog.set_price(part_id, 1).is_ok());
    }

    #[test]
    fn unknown_part_is_not_found() {
        let catalog = InMemoryCatalog::new();
        let part_id = PartId::new();
        assert_eq!(catalog.get_part(part_id), Err(ExternalError::NotFound(part_id)));
    }
}
