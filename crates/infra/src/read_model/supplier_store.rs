use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use partsupply_core::SupplierId;

/// Supplier-isolated key/value store for disposable read models.
///
/// Every read and write names the supplier; a record written under one
/// supplier is never returned for another.
pub trait SupplierStore<K, V>: Send + Sync {
    fn get(&self, supplier_id: SupplierId, key: &K) -> Option<V>;
    fn upsert(&self, supplier_id: SupplierId, key: K, value: V);
    fn list(&self, supplier_id: SupplierId) -> Vec<V>;
    /// Suppliers with at least one record.
    fn suppliers(&self) -> Vec<SupplierId>;
    fn clear_supplier(&self, supplier_id: SupplierId);
}

impl<K, V, S> SupplierStore<K, V> for Arc<S>
where
    S: SupplierStore<K, V> + ?Sized,
{
    fn get(&self, supplier_id: SupplierId, key: &K) -> Option<V> {
        (**self).get(supplier_id, key)
    }

    fn upsert(&self, supplier_id: SupplierId, key: K, value: V) {
        (**self).upsert(supplier_id, key, value)
    }

    fn list(&self, supplier_id: SupplierId) -> Vec<V> {
        (**self).list(supplier_id)
    }

    fn suppliers(&self) -> Vec<SupplierId> {
        (**self).suppliers()
    }

    fn clear_supplier(&self, supplier_id: SupplierId) {
        (**self).clear_supplier(supplier_id)
    }
}

/// In-memory store. A poisoned lock reads as empty and drops writes.
#[derive(Debug)]
pub struct InMemorySupplierStore<K, V> {
    inner: RwLock<HashMap<SupplierId, HashMap<K, V>>>,
}

impl<K, V> InMemorySupplierStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemorySupplierStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SupplierStore<K, V> for InMemorySupplierStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, supplier_id: SupplierId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&supplier_id)?.get(key).cloned()
    }

    fn upsert(&self, supplier_id: SupplierId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(supplier_id).or_default().insert(key, value);
        }
    }

    fn list(&self, supplier_id: SupplierId) -> Vec<V> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        map.get(&supplier_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn suppliers(&self) -> Vec<SupplierId> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        let mut ids: Vec<SupplierId> = map
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    fn clear_supplier(&self, supplier_id: SupplierId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&supplier_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_scoped_to_their_supplier() {
        let store: InMemorySupplierStore<u32, &'static str> = InMemorySupplierStore::new();
        let a = SupplierId::new();
        let b = SupplierId::new();

        store.upsert(a, 1, "brake pads");
        store.upsert(b, 1, "rotor");

        assert_eq!(store.get(a, &1), Some("brake pads"));
        assert_eq!(store.get(b, &1), Some("rotor"));
        assert_eq!(store.list(a), vec!["brake pads"]);

        store.clear_supplier(a);
        assert!(store.list(a).is_empty());
        assert_eq!(store.suppliers(), vec![b]);
    }
}
