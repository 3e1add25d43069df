mod collection;
mod sqlite;

pub use collection::{open_collection, Collection, Document, DocumentStore};
pub use sqlite::{SqliteDatabase, SqliteDbError, SqliteStore, SqliteTransaction};
