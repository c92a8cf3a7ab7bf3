// MAMA+ Domain
// This crate contains the business logic for the MAMA+ API

use std::sync::Arc;

use mama_plus_data::repository::Storage;

// Domain errors
pub mod error;

// Authentication and authorization
pub mod auth;

// Services that implement business logic
pub mod services;

// Background reminder scheduler
pub mod scheduler;

// Testing utilities - only available with mock feature
#[cfg(feature = "mock")]
pub mod testing;

// Re-export the data crate for convenience
pub use mama_plus_data as data;

pub use error::DomainError;

/// Storage handle shared by every service
pub type SharedStorage = Arc<dyn Storage>;
