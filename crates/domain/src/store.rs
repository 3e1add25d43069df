//! Leaf store port: a transactional key-value map the engine builds on.

use async_trait::async_trait;
use std::error::Error as StdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found")]
    KeyNotFound,

    #[error("transaction {0} is already finished")]
    TransactionClosed(u64),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
}

impl StoreError {
    #[inline]
    pub fn backend(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }

    #[inline]
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound)
    }
}

/// Handle scoping a group of leaf-store operations.
///
/// Dropping a handle that was neither committed nor aborted releases it;
/// backends with real transactions discard its writes.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Diagnostic identifier, used in logs.
    fn id(&self) -> u64;

    async fn commit(self) -> Result<(), StoreError>;

    async fn abort(self) -> Result<(), StoreError>;
}

/// Handle for stores without transactions: every write is visible at once
/// and nothing is ever rolled back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NullTransaction;

#[async_trait]
impl Transaction for NullTransaction {
    fn id(&self) -> u64 {
        0
    }

    async fn commit(self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn abort(self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Produces the value for a missing key.
pub type AddWith<K, V> = Box<dyn FnOnce(&K) -> V + Send>;

/// Computes the replacement for the value currently stored under a key.
/// May run more than once on backends that retry.
pub type UpdateWith<K, V> = Box<dyn Fn(&K, &V) -> V + Send + Sync>;

#[async_trait]
pub trait LeafStore<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    type Tx: Transaction;

    async fn create_transaction(&self) -> Result<Self::Tx, StoreError>;

    /// Transaction for lookups only. Backends that lock on write may hand
    /// out a lighter handle here; it must not be used for writes.
    async fn create_read_transaction(&self) -> Result<Self::Tx, StoreError> {
        self.create_transaction().await
    }

    /// Fails with [`StoreError::KeyNotFound`] for a missing key.
    async fn get(&self, tx: &Self::Tx, key: &K) -> Result<V, StoreError>;

    async fn try_get(&self, tx: &Self::Tx, key: &K) -> Result<Option<V>, StoreError> {
        match self.get(tx, key).await {
            Ok(value) => Ok(Some(value)),
            Err(StoreError::KeyNotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Adds `value` unless `key` is present; returns whether it was added.
    async fn try_add(&self, tx: &Self::Tx, key: K, value: V) -> Result<bool, StoreError>;

    /// Removes `key`, returning the value it held.
    async fn try_remove(&self, tx: &Self::Tx, key: &K) -> Result<Option<V>, StoreError>;

    async fn get_or_add(
        &self,
        tx: &Self::Tx,
        key: K,
        add_with: AddWith<K, V>,
    ) -> Result<V, StoreError>;

    /// Stores `value` for a missing key, otherwise replaces the current value
    /// with `update_with(key, current)`. Atomic per key: the update always
    /// sees the value current at the moment of the write.
    async fn add_or_update(
        &self,
        tx: &Self::Tx,
        key: K,
        value: V,
        update_with: UpdateWith<K, V>,
    ) -> Result<V, StoreError>;

    /// Untransacted snapshot of all keys.
    async fn all_keys(&self) -> Result<Vec<K>, StoreError>;

    /// Untransacted snapshot of all values.
    async fn all_values(&self) -> Result<Vec<V>, StoreError>;
}
