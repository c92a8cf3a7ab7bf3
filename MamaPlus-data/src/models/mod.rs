//! Storage models shared by every backend.
//!
//! Records are flat so that each one maps to a single SQLite row or a single
//! CSV line. Identifiers are integers assigned by the backend on insert.

pub mod consultation;
pub mod cpn;
pub mod patiente;
pub mod rappel;
pub mod user;
pub mod vaccination;

pub use consultation::Consultation;
pub use cpn::{Cpn, CpnStatut};
pub use patiente::Patiente;
pub use rappel::{Rappel, RappelCanal, RappelStatut};
pub use user::{Role, User};
pub use vaccination::Vaccination;

/// Error returned when a stored or submitted label does not match any variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// Name of the enumeration being parsed
    pub kind: &'static str,
    /// The rejected label
    pub value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
