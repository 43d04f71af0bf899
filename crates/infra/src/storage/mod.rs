//! Key-value storage implementations

pub mod manager;
pub mod memory_store;
pub mod sqlite_store;

pub use manager::DbManager;
pub use memory_store::MemoryKeyValueStore;
pub use sqlite_store::SqliteKeyValueStore;
