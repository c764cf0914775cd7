//! Error types for MedVault Core.

use thiserror::Error;

use crate::vaccination::VaccineId;

/// Core errors that can occur while handling primitive values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Missing or malformed input, rejected before any state mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} contains whitespace")]
    Whitespace { field: &'static str },

    #[error("invalid access duration: {0}")]
    InvalidDuration(String),

    #[error("invalid chain id: {0}")]
    InvalidChainId(String),
}

/// Errors raised by the vaccination verification ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("no ledger initialized (no active principal)")]
    NotInitialized,

    #[error("unknown vaccination entry: {0}")]
    UnknownEntry(VaccineId),

    #[error("vaccination entry already verified: {0}")]
    AlreadyVerified(VaccineId),
}
