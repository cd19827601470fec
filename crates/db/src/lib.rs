pub mod models;
pub mod storage;

pub use storage::{DBService, MemoryStorage, PgStorage, Storage, StorageError, StorageKind};
