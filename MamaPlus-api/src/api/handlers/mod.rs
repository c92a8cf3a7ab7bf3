//! Request handlers, one module per router

pub mod auth;
pub mod chatbot;
pub mod consultations;
pub mod cpn;
pub mod dashboard;
pub mod patientes;
pub mod prediction;
pub mod root;
pub mod scheduler;
pub mod vaccinations;

#[cfg(test)]
mod tests;

use serde::Deserialize;
use utoipa::IntoParams;

/// Restrict a listing to one patient
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PatienteQuery {
    pub patiente_id: Option<i64>,
}

pub use root::{health_check, root};
