//! Primary store plus secondary indexes, kept in step inside one transaction.
//!
//! Index entries map an [`IndexValue`] to the [`IdSet`] of records carrying
//! it. They are only ever changed through [`LeafStore::add_or_update`] with an
//! update derived from the current set, so concurrent writers to the same
//! entry cannot lose each other's ids. Entries are created on first use and
//! kept when they become empty.

use crate::index::{IndexStore, IndexedField};
use crate::query::{compile, parse_filter, Expr, Operation};
use crate::store::InMemoryStore;
use crate::{Error, Result};
use domain::{IdSet, IndexName, IndexValue, LeafStore, Record, StoreError, Transaction};
use serde_json::Value as Json;
use std::future::Future;
use tracing::{debug, info, trace, warn};

pub type InMemoryDataStore<T> = DataStore<
    T,
    InMemoryStore<<T as Record>::Id, T>,
    InMemoryStore<IndexValue, IdSet<<T as Record>::Id>>,
>;

pub struct DataStore<T, P, I> {
    records: P,
    indexes: IndexStore<I>,
    fields: Vec<IndexedField<T>>,
}

impl<T: Record> InMemoryDataStore<T> {
    pub async fn in_memory(fields: Vec<IndexedField<T>>) -> Result<Self> {
        Self::build(InMemoryStore::new, |_| async { Ok(InMemoryStore::new()) }, fields).await
    }
}

impl<T, P, I> DataStore<T, P, I>
where
    T: Record,
    P: LeafStore<T::Id, T>,
    I: LeafStore<IndexValue, IdSet<T::Id>, Tx = P::Tx>,
{
    /// Wires a primary store and one index store per field.
    #[tracing::instrument(skip_all, fields(fields = fields.len()))]
    pub async fn build<RF, IF, Fut>(
        build_records: RF,
        build_index: IF,
        fields: Vec<IndexedField<T>>,
    ) -> Result<Self>
    where
        RF: FnOnce() -> P,
        IF: FnMut(IndexName) -> Fut,
        Fut: Future<Output = Result<I, StoreError>>,
    {
        let indexes = IndexStore::build(&fields, build_index).await?;
        info!(indexes = indexes.len(), "data store ready");
        Ok(Self {
            records: build_records(),
            indexes,
            fields,
        })
    }

    /// Opens a transaction spanning the primary store and every index, for
    /// use with [`insert_in`](Self::insert_in) and [`remove_in`](Self::remove_in).
    pub async fn begin(&self) -> Result<P::Tx> {
        Ok(self.records.create_transaction().await?)
    }

    /// Transaction for the read paths; never used for writes.
    async fn begin_read(&self) -> Result<P::Tx> {
        Ok(self.records.create_read_transaction().await?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────

    /// Adds `record` and its index entries. Returns `false`, leaving the
    /// store untouched, when a record with the same id exists.
    #[tracing::instrument(skip_all, fields(id = ?record.id()))]
    pub async fn insert(&self, record: T) -> Result<bool> {
        let tx = self.begin().await?;
        if !self.insert_in(&tx, record).await? {
            tx.abort().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    pub async fn insert_in(&self, tx: &P::Tx, record: T) -> Result<bool> {
        let id = record.id().clone();
        let entries = self.project(&record)?;

        if !self.records.try_add(tx, id.clone(), record).await? {
            debug!(?id, "id already present");
            return Ok(false);
        }
        for (name, value) in entries {
            self.add_to_index(tx, name, value, id.clone()).await?;
        }
        Ok(true)
    }

    /// Removes the record with `id` and drops it from its index entries.
    #[tracing::instrument(skip_all, fields(id = ?id))]
    pub async fn remove(&self, id: &T::Id) -> Result<bool> {
        let tx = self.begin().await?;
        if !self.remove_in(&tx, id).await? {
            tx.abort().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    pub async fn remove_in(&self, tx: &P::Tx, id: &T::Id) -> Result<bool> {
        let Some(record) = self.records.try_remove(tx, id).await? else {
            debug!(?id, "nothing to remove");
            return Ok(false);
        };
        for (name, value) in self.project(&record)? {
            self.remove_from_index(tx, name, value, id.clone()).await?;
        }
        Ok(true)
    }

    fn project(&self, record: &T) -> Result<Vec<(&IndexName, IndexValue)>> {
        self.fields
            .iter()
            .map(|field| Ok((field.name(), field.project(record)?)))
            .collect()
    }

    fn index(&self, name: &IndexName) -> Result<&I> {
        self.indexes
            .get(name)
            .ok_or_else(|| Error::UnknownIndex(name.clone()))
    }

    async fn add_to_index(
        &self,
        tx: &P::Tx,
        name: &IndexName,
        value: IndexValue,
        id: T::Id,
    ) -> Result<()> {
        let added = id.clone();
        let entry = self
            .index(name)?
            .add_or_update(
                tx,
                value,
                IdSet::single(id),
                Box::new(move |_: &IndexValue, current: &IdSet<T::Id>| current.inserting(added.clone())),
            )
            .await?;
        trace!(index = %name, size = entry.len(), "index entry grown");
        Ok(())
    }

    async fn remove_from_index(
        &self,
        tx: &P::Tx,
        name: &IndexName,
        value: IndexValue,
        id: T::Id,
    ) -> Result<()> {
        let entry = self
            .index(name)?
            .add_or_update(
                tx,
                value,
                IdSet::new(),
                Box::new(move |_: &IndexValue, current: &IdSet<T::Id>| current.removing(&id)),
            )
            .await?;
        trace!(index = %name, size = entry.len(), "index entry shrunk");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    pub(crate) async fn get_by_id(&self, id: &T::Id) -> Result<Option<T>> {
        let tx = self.begin_read().await?;
        let found = self.records.try_get(&tx, id).await?;
        tx.commit().await?;
        Ok(found)
    }

    /// Records whose projection for index `name` equals `value`.
    pub async fn search_by_index(&self, name: &IndexName, value: &IndexValue) -> Result<Vec<T>> {
        let index = self.index(name)?;
        let tx = self.begin_read().await?;

        let ids = index.try_get(&tx, value).await?.unwrap_or_default();
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match self.records.try_get(&tx, &id).await? {
                Some(record) => found.push(record),
                None => warn!(index = %name, ?id, "index entry lists a missing record"),
            }
        }
        tx.commit().await?;
        Ok(found)
    }

    pub async fn execute(&self, operation: &Operation<T::Id>) -> Result<Vec<T>> {
        operation.execute(self).await
    }

    /// Compiles `predicate` and runs it.
    #[tracing::instrument(skip_all)]
    pub async fn find(&self, predicate: &Expr) -> Result<Vec<T>> {
        let operation = compile::<T>(predicate)?;
        debug!(%operation, "compiled predicate");
        let found = self.execute(&operation).await?;
        debug!(count = found.len(), "query finished");
        Ok(found)
    }

    /// Like [`find`](Self::find), from a JSON filter document.
    pub async fn find_filter(&self, filter: &Json) -> Result<Vec<T>> {
        self.find(&parse_filter(filter)?).await
    }

    /// The single matching record, if any.
    pub async fn find_one(&self, predicate: &Expr) -> Result<Option<T>> {
        let mut found = self.find(predicate).await?;
        match found.len() {
            0 | 1 => Ok(found.pop()),
            n => Err(Error::MultipleResults(n)),
        }
    }

    pub fn records(&self) -> &P {
        &self.records
    }

    pub fn indexes(&self) -> &IndexStore<I> {
        &self.indexes
    }

    pub fn index_names(&self) -> impl Iterator<Item = &IndexName> {
        self.fields.iter().map(IndexedField::name)
    }
}
