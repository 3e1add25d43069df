use crate::db::SqliteDbError;
use adapt::Error as AdaptError;
use domain::StoreError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("settings error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] SqliteDbError),

    #[error("query error: {0}")]
    Adapt(#[from] AdaptError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
