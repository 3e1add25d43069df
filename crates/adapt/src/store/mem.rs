use async_trait::async_trait;
use domain::{AddWith, LeafStore, NullTransaction, StoreError, UpdateWith};
use parking_lot::RwLock;
use std::collections::{hash_map::Entry, HashMap};
use std::hash::Hash;

// ─────────────────────────────────────────────────────────────────────────────
// In-memory LeafStore implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Leaf store backed by a locked `HashMap`.
///
/// Uses [`NullTransaction`]: writes are visible immediately and are never
/// rolled back, so a failure halfway through a multi-key operation leaves the
/// keys already written in place. Each single-key operation is atomic.
#[derive(Debug)]
pub struct InMemoryStore<K, V> {
    memory: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self {
            memory: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> InMemoryStore<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.memory.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.read().is_empty()
    }
}

#[async_trait]
impl<K, V> LeafStore<K, V> for InMemoryStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Tx = NullTransaction;

    async fn create_transaction(&self) -> Result<NullTransaction, StoreError> {
        Ok(NullTransaction)
    }

    async fn get(&self, _tx: &NullTransaction, key: &K) -> Result<V, StoreError> {
        self.memory
            .read()
            .get(key)
            .cloned()
            .ok_or(StoreError::KeyNotFound)
    }

    async fn try_get(&self, _tx: &NullTransaction, key: &K) -> Result<Option<V>, StoreError> {
        Ok(self.memory.read().get(key).cloned())
    }

    async fn try_add(&self, _tx: &NullTransaction, key: K, value: V) -> Result<bool, StoreError> {
        match self.memory.write().entry(key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(true)
            }
        }
    }

    async fn try_remove(&self, _tx: &NullTransaction, key: &K) -> Result<Option<V>, StoreError> {
        Ok(self.memory.write().remove(key))
    }

    async fn get_or_add(
        &self,
        _tx: &NullTransaction,
        key: K,
        add_with: AddWith<K, V>,
    ) -> Result<V, StoreError> {
        let mut memory = self.memory.write();
        if let Some(existing) = memory.get(&key) {
            return Ok(existing.clone());
        }
        let value = add_with(&key);
        memory.insert(key, value.clone());
        Ok(value)
    }

    async fn add_or_update(
        &self,
        _tx: &NullTransaction,
        key: K,
        value: V,
        update_with: UpdateWith<K, V>,
    ) -> Result<V, StoreError> {
        // read and write under one write lock
        let mut memory = self.memory.write();
        let next = match memory.get(&key) {
            Some(current) => update_with(&key, current),
            None => value,
        };
        memory.insert(key, next.clone());
        Ok(next)
    }

    async fn all_keys(&self) -> Result<Vec<K>, StoreError> {
        Ok(self.memory.read().keys().cloned().collect())
    }

    async fn all_values(&self) -> Result<Vec<V>, StoreError> {
        Ok(self.memory.read().values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    // ─────────────────────────────────────────────────────────────────────
    // Basic map semantics
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn try_add_keeps_the_first_value() {
        let store = InMemoryStore::<u32, String>::new();
        let tx = NullTransaction;

        assert!(store.try_add(&tx, 1, "one".into()).await.unwrap());
        assert!(!store.try_add(&tx, 1, "uno".into()).await.unwrap());
        assert_eq!(store.get(&tx, &1).await.unwrap(), "one");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn get_reports_missing_keys() {
        let store = InMemoryStore::<u32, String>::new();

        let err = store.get(&NullTransaction, &9).await.unwrap_err();
        assert!(err.is_key_not_found());
        assert_eq!(store.try_get(&NullTransaction, &9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn try_remove_returns_the_removed_value() {
        let store = InMemoryStore::<u32, String>::new();
        let tx = NullTransaction;
        store.try_add(&tx, 1, "one".into()).await.unwrap();

        assert_eq!(store.try_remove(&tx, &1).await.unwrap(), Some("one".into()));
        assert_eq!(store.try_remove(&tx, &1).await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn get_or_add_only_builds_missing_values() {
        let store = InMemoryStore::<u32, String>::new();
        let tx = NullTransaction;

        let built = store
            .get_or_add(&tx, 4, Box::new(|k: &u32| format!("v{k}")))
            .await
            .unwrap();
        assert_eq!(built, "v4");

        let kept = store
            .get_or_add(&tx, 4, Box::new(|_: &u32| "other".to_string()))
            .await
            .unwrap();
        assert_eq!(kept, "v4");
    }

    #[tokio::test]
    async fn add_or_update_applies_update_to_current_value() {
        let store = InMemoryStore::<u32, u32>::new();
        let tx = NullTransaction;

        let first = store
            .add_or_update(&tx, 7, 1, Box::new(|_: &u32, v: &u32| v + 1))
            .await
            .unwrap();
        let second = store
            .add_or_update(&tx, 7, 1, Box::new(|_: &u32, v: &u32| v + 1))
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
        assert_eq!(store.all_keys().await.unwrap(), vec![7]);
        assert_eq!(store.all_values().await.unwrap(), vec![2]);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Concurrency
    // ─────────────────────────────────────────────────────────────────────

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_not_lost() {
        let store = Arc::new(InMemoryStore::<u32, u64>::new());

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .add_or_update(&NullTransaction, 0, 1, Box::new(|_: &u32, v: &u64| v + 1))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.get(&NullTransaction, &0).await.unwrap(), 64);
    }
}
