//! Error types for the vault.

use medvault_core::{LedgerError, RecordId, RequestId, ValidationError};
use medvault_perms::PermsError;
use medvault_session::SessionError;
use medvault_store::StoreError;
use thiserror::Error;

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Wallet session error.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Permission error.
    #[error("permission error: {0}")]
    Permission(#[from] PermsError),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Verification ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Record not found.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// Access request not found.
    #[error("access request not found: {0}")]
    RequestNotFound(RequestId),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No usable wallet session.
    Session,
    /// Caller is not allowed to act on the resource.
    Authorization,
    /// Referenced record, request, entry or blob does not exist.
    NotFound,
    /// Input rejected before any state changed.
    Validation,
    /// Backend failure.
    Storage,
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Session(_) => ErrorKind::Session,
            VaultError::Store(e) => match e {
                StoreError::NotFound(_) | StoreError::BlobNotFound(_) => ErrorKind::NotFound,
                _ => ErrorKind::Storage,
            },
            VaultError::Permission(e) => match e {
                PermsError::PermissionDenied(_)
                | PermsError::InvalidShareLink(_)
                | PermsError::ShareLinkExpired(_) => ErrorKind::Authorization,
                PermsError::RecordNotFound(_) | PermsError::RequestNotFound(_) => {
                    ErrorKind::NotFound
                }
                PermsError::SerializationError(_) => ErrorKind::Storage,
                PermsError::InvalidTransition { .. }
                | PermsError::OwnRecord
                | PermsError::DuplicatePending(_)
                | PermsError::Validation(_)
                | PermsError::CoreError(_) => ErrorKind::Validation,
            },
            VaultError::Validation(_) | VaultError::Config(_) => ErrorKind::Validation,
            VaultError::Ledger(e) => match e {
                LedgerError::NotInitialized => ErrorKind::Session,
                LedgerError::UnknownEntry(_) => ErrorKind::NotFound,
                LedgerError::AlreadyVerified(_) => ErrorKind::Validation,
            },
            VaultError::RecordNotFound(_) | VaultError::RequestNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;
    use medvault_core::{AccessStatus, VaccineId};

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            VaultError::from(SessionError::NoAccounts).kind(),
            ErrorKind::Session
        );
        assert_eq!(
            VaultError::from(PermsError::PermissionDenied("x".into())).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            VaultError::from(PermsError::InvalidTransition {
                from: AccessStatus::Revoked,
                to: AccessStatus::Granted
            })
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            VaultError::RecordNotFound(RecordId::generate()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            VaultError::from(ValidationError::Empty { field: "recipient" }).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            VaultError::from(LedgerError::UnknownEntry(VaccineId::new("x"))).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            VaultError::from(StoreError::Task("join".into())).kind(),
            ErrorKind::Storage
        );
    }
}
