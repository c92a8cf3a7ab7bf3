// Database modules
pub mod connection;
pub mod migrations;

// Re-export database connection types
pub use connection::*;
pub use migrations::run_sqlite_migrations;
