//! SQLite leaf stores.
//! - One table per store: `key TEXT PRIMARY KEY, value TEXT NOT NULL`, both JSON text.
//! - A transaction owns one pooled connection inside `BEGIN IMMEDIATE … COMMIT`.
//!   Read transactions use a deferred `BEGIN` and read the last committed
//!   snapshot without waiting for writers (WAL).
//! - Every store opened from one `SqliteDatabase` accepts the same transactions,
//!   so a record and its index entries commit or roll back together.

use crate::setting::DatabaseSettings;
use async_trait::async_trait;
use domain::{AddWith, LeafStore, StoreError, Transaction, UpdateWith};
use sea_query::{Alias, ColumnDef, Expr, OnConflict, Query, SqliteQueryBuilder, Table};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    pool::PoolConnection,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    Sqlite, SqlitePool,
};
use std::{
    marker::PhantomData,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";
const BEGIN_READ: &str = "BEGIN";

const KEY: &str = "key";
const VALUE: &str = "value";

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum SqliteDbError {
    #[error("Connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Setup failed: {0}")]
    Setup(#[source] sqlx::Error),

    #[error("SQL execution failed: {0}")]
    Execute(#[source] sqlx::Error),

    #[error("SQL build failed: {0}")]
    Build(String),
}

impl From<SqliteDbError> for StoreError {
    fn from(err: SqliteDbError) -> Self {
        StoreError::backend(err)
    }
}

pub type Result<T, E = SqliteDbError> = std::result::Result<T, E>;

// ─────────────────────────────────────────────────────────────────────────────
// Database
// ─────────────────────────────────────────────────────────────────────────────

/// Shared connection pool; hands out stores and transactions.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    #[tracing::instrument(skip_all, fields(url = %settings.url))]
    pub async fn open(settings: &DatabaseSettings) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(&settings.url)
            .map_err(SqliteDbError::Connect)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(settings.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .min_connections(0)
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_millis(settings.acquire_timeout_ms))
            .connect_with(opts)
            .await
            .map_err(SqliteDbError::Connect)?;

        info!("sqlite database open");
        Ok(Self { pool })
    }

    /// Opens the store kept in `table`, creating the table if needed.
    pub async fn store<K, V>(&self, table: impl Into<String>) -> Result<SqliteStore<K, V>> {
        let table = table.into();
        let sql = Table::create()
            .table(Alias::new(table.as_str()))
            .if_not_exists()
            .col(ColumnDef::new(Alias::new(KEY)).text().not_null().primary_key())
            .col(ColumnDef::new(Alias::new(VALUE)).text().not_null())
            .to_string(SqliteQueryBuilder);
        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(SqliteDbError::Setup)?;

        debug!(%table, "sqlite store ready");
        Ok(SqliteStore {
            pool: self.pool.clone(),
            table,
            _types: PhantomData,
        })
    }

    pub async fn begin(&self) -> Result<SqliteTransaction> {
        SqliteTransaction::begin(&self.pool, BEGIN_WRITE).await
    }

    /// Snapshot transaction for lookups; writes through it are not atomic
    /// with other writers.
    pub async fn begin_read(&self) -> Result<SqliteTransaction> {
        SqliteTransaction::begin(&self.pool, BEGIN_READ).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

/// One pooled connection holding the database write lock.
///
/// Dropping it unfinished detaches and closes the connection, which discards
/// everything written through it.
#[derive(Debug)]
pub struct SqliteTransaction {
    id: u64,
    conn: Mutex<Option<PoolConnection<Sqlite>>>,
}

impl SqliteTransaction {
    async fn begin(pool: &SqlitePool, statement: &'static str) -> Result<Self> {
        let mut conn = pool.acquire().await.map_err(SqliteDbError::Connect)?;
        sqlx::query(statement)
            .execute(&mut *conn)
            .await
            .map_err(SqliteDbError::Execute)?;

        let id = NEXT_TX_ID.fetch_add(1, Ordering::Relaxed);
        trace!(tx = id, statement, "transaction begun");
        Ok(Self {
            id,
            conn: Mutex::new(Some(conn)),
        })
    }

    async fn finish(self, statement: &'static str) -> std::result::Result<(), StoreError> {
        let taken = self.conn.lock().await.take();
        let Some(mut conn) = taken else {
            return Err(StoreError::TransactionClosed(self.id));
        };
        if let Err(err) = sqlx::query(statement).execute(&mut *conn).await {
            discard(conn);
            return Err(SqliteDbError::Execute(err).into());
        }
        trace!(tx = self.id, statement, "transaction finished");
        Ok(())
    }

    async fn fetch_value(&self, sql: &str) -> std::result::Result<Option<String>, StoreError> {
        let mut slot = self.conn.lock().await;
        let conn = slot.as_mut().ok_or(StoreError::TransactionClosed(self.id))?;
        let row: Option<(String,)> = sqlx::query_as(sql)
            .fetch_optional(&mut **conn)
            .await
            .map_err(SqliteDbError::Execute)?;
        Ok(row.map(|(value,)| value))
    }

    async fn execute(&self, sql: &str) -> std::result::Result<u64, StoreError> {
        let mut slot = self.conn.lock().await;
        let conn = slot.as_mut().ok_or(StoreError::TransactionClosed(self.id))?;
        let done = sqlx::query(sql)
            .execute(&mut **conn)
            .await
            .map_err(SqliteDbError::Execute)?;
        Ok(done.rows_affected())
    }
}

/// Closes the connection instead of returning it to the pool mid-transaction.
fn discard(conn: PoolConnection<Sqlite>) {
    drop(conn.detach());
}

#[async_trait]
impl Transaction for SqliteTransaction {
    fn id(&self) -> u64 {
        self.id
    }

    async fn commit(self) -> std::result::Result<(), StoreError> {
        self.finish("COMMIT").await
    }

    async fn abort(self) -> std::result::Result<(), StoreError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take() {
            debug!(tx = self.id, "transaction dropped unfinished, rolling back");
            discard(conn);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stores
// ─────────────────────────────────────────────────────────────────────────────

/// Key-value table whose keys and values are stored as JSON text.
#[derive(Debug)]
pub struct SqliteStore<K, V> {
    pool: SqlitePool,
    table: String,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> SqliteStore<K, V> {
    pub fn table(&self) -> &str {
        &self.table
    }

    fn select_value(&self, key: &str) -> String {
        Query::select()
            .column(Alias::new(VALUE))
            .from(Alias::new(self.table.as_str()))
            .and_where(Expr::col(Alias::new(KEY)).eq(key))
            .to_string(SqliteQueryBuilder)
    }

    fn select_column(&self, column: &str) -> String {
        Query::select()
            .column(Alias::new(column))
            .from(Alias::new(self.table.as_str()))
            .to_string(SqliteQueryBuilder)
    }

    fn delete(&self, key: &str) -> String {
        Query::delete()
            .from_table(Alias::new(self.table.as_str()))
            .and_where(Expr::col(Alias::new(KEY)).eq(key))
            .to_string(SqliteQueryBuilder)
    }

    fn insert(&self, key: &str, value: &str, on_conflict: OnConflict) -> Result<String> {
        let mut ins = Query::insert();
        ins.into_table(Alias::new(self.table.as_str()))
            .columns([Alias::new(KEY), Alias::new(VALUE)]);
        ins.values([Expr::val(key).into(), Expr::val(value).into()])
            .map_err(|e| SqliteDbError::Build(e.to_string()))?;
        ins.on_conflict(on_conflict);
        Ok(ins.to_string(SqliteQueryBuilder))
    }

    /// Inserts, or ignores the row when the key exists.
    fn insert_new(&self, key: &str, value: &str) -> Result<String> {
        self.insert(key, value, OnConflict::column(Alias::new(KEY)).do_nothing().to_owned())
    }

    /// Inserts, or overwrites the value of an existing key.
    fn upsert(&self, key: &str, value: &str) -> Result<String> {
        self.insert(
            key,
            value,
            OnConflict::column(Alias::new(KEY))
                .update_column(Alias::new(VALUE))
                .to_owned(),
        )
    }

    async fn fetch_column(&self, column: &str) -> std::result::Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(&self.select_column(column))
            .fetch_all(&self.pool)
            .await
            .map_err(SqliteDbError::Execute)?;
        Ok(rows.into_iter().map(|(text,)| text).collect())
    }
}

fn encode<T: Serialize>(value: &T) -> std::result::Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

fn decode<T: DeserializeOwned>(text: &str) -> std::result::Result<T, StoreError> {
    Ok(serde_json::from_str(text)?)
}

#[async_trait]
impl<K, V> LeafStore<K, V> for SqliteStore<K, V>
where
    K: Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    type Tx = SqliteTransaction;

    async fn create_transaction(&self) -> std::result::Result<SqliteTransaction, StoreError> {
        Ok(SqliteTransaction::begin(&self.pool, BEGIN_WRITE).await?)
    }

    async fn create_read_transaction(&self) -> std::result::Result<SqliteTransaction, StoreError> {
        Ok(SqliteTransaction::begin(&self.pool, BEGIN_READ).await?)
    }

    async fn get(&self, tx: &SqliteTransaction, key: &K) -> std::result::Result<V, StoreError> {
        self.try_get(tx, key).await?.ok_or(StoreError::KeyNotFound)
    }

    async fn try_get(
        &self,
        tx: &SqliteTransaction,
        key: &K,
    ) -> std::result::Result<Option<V>, StoreError> {
        let sql = self.select_value(&encode(key)?);
        tx.fetch_value(&sql)
            .await?
            .map(|text| decode(&text))
            .transpose()
    }

    async fn try_add(
        &self,
        tx: &SqliteTransaction,
        key: K,
        value: V,
    ) -> std::result::Result<bool, StoreError> {
        let sql = self.insert_new(&encode(&key)?, &encode(&value)?)?;
        Ok(tx.execute(&sql).await? == 1)
    }

    async fn try_remove(
        &self,
        tx: &SqliteTransaction,
        key: &K,
    ) -> std::result::Result<Option<V>, StoreError> {
        let key = encode(key)?;
        let Some(text) = tx.fetch_value(&self.select_value(&key)).await? else {
            return Ok(None);
        };
        tx.execute(&self.delete(&key)).await?;
        Ok(Some(decode(&text)?))
    }

    async fn get_or_add(
        &self,
        tx: &SqliteTransaction,
        key: K,
        add_with: AddWith<K, V>,
    ) -> std::result::Result<V, StoreError> {
        if let Some(existing) = self.try_get(tx, &key).await? {
            return Ok(existing);
        }
        let value = add_with(&key);
        let sql = self.insert_new(&encode(&key)?, &encode(&value)?)?;
        tx.execute(&sql).await?;
        Ok(value)
    }

    async fn add_or_update(
        &self,
        tx: &SqliteTransaction,
        key: K,
        value: V,
        update_with: UpdateWith<K, V>,
    ) -> std::result::Result<V, StoreError> {
        // the transaction holds the write lock, so the read cannot go stale
        let next = match self.try_get(tx, &key).await? {
            Some(current) => update_with(&key, &current),
            None => value,
        };
        let sql = self.upsert(&encode(&key)?, &encode(&next)?)?;
        tx.execute(&sql).await?;
        Ok(next)
    }

    async fn all_keys(&self) -> std::result::Result<Vec<K>, StoreError> {
        self.fetch_column(KEY).await?.iter().map(|k| decode(k)).collect()
    }

    async fn all_values(&self) -> std::result::Result<Vec<V>, StoreError> {
        self.fetch_column(VALUE).await?.iter().map(|v| decode(v)).collect()
    }
}
