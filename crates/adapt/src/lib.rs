pub mod data_store;
pub mod index;
pub mod query;
pub mod store;

#[cfg(test)]
pub(crate) mod fixture;

pub use data_store::{DataStore, InMemoryDataStore};
pub use index::{IndexStore, IndexedField};
pub use query::{captured, compile, lit, member, parse_filter, BinaryOp, Expr, Operation};
pub use store::InMemoryStore;

use domain::{IndexName, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported predicate: {0}")]
    UnsupportedPredicate(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("no index named `{0}`")]
    UnknownIndex(IndexName),

    #[error("index `{0}` is declared more than once")]
    DuplicateIndex(IndexName),

    #[error("expected at most one record, found {0}")]
    MultipleResults(usize),

    /// A record could not be serialized to project an indexed member.
    #[error("projection error: {0}")]
    Projection(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl Error {
    #[inline]
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedPredicate(msg.into())
    }

    #[inline]
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Error::InvalidFilter(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
