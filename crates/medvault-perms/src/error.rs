//! Error types for the permissions module.

use thiserror::Error;

use medvault_core::{AccessStatus, CoreError, RecordId, RequestId, ValidationError};

/// Errors that can occur during permission operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Caller is not allowed to perform the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Referenced record does not exist.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// Referenced access request does not exist.
    #[error("access request not found: {0}")]
    RequestNotFound(RequestId),

    /// The status change is not in the legal transition table.
    #[error("illegal transition: {from} -> {to}")]
    InvalidTransition {
        from: AccessStatus,
        to: AccessStatus,
    },

    /// Owner tried to grant access to themselves.
    #[error("owner already has access to their own record")]
    OwnRecord,

    /// A pending request for the same principal and record exists.
    #[error("a pending request already exists: {0}")]
    DuplicatePending(RequestId),

    /// Share link is malformed or its token does not verify.
    #[error("invalid share link: {0}")]
    InvalidShareLink(String),

    /// Share link token verified but is past its expiry.
    #[error("share link expired at {0}")]
    ShareLinkExpired(i64),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Missing or malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] CoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
