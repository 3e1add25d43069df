mod mem;

pub use mem::InMemoryStore;
