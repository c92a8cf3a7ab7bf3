// Repository module structure
pub mod errors;
mod csv_store;
mod sqlite;
mod storage;


// Re-export commonly used types
pub use csv_store::{CsvRecord, CsvStorage};
pub use errors::RepositoryError;
pub use sqlite::SqliteStorage;
pub use storage::{CpnFilter, Storage, StorageBackend};
