pub mod index;
pub mod record;
pub mod store;

pub use index::{IndexName, IndexValue, MemberPath};
pub use record::{IdSet, Record, RecordId};
pub use store::{AddWith, LeafStore, NullTransaction, StoreError, Transaction, UpdateWith};
