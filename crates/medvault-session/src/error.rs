//! Error types for the session module.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while establishing or using a wallet session.
///
/// Every variant leaves the session fully disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No wallet provider is installed.
    #[error("no wallet provider available")]
    ProviderUnavailable,

    /// The user declined the connection prompt.
    #[error("user rejected the connection request")]
    UserRejected,

    /// The provider returned an empty account list.
    #[error("no accounts found")]
    NoAccounts,

    /// The provider answered with something unusable.
    #[error("malformed provider response: {0}")]
    ProviderMalformed(String),

    /// Provider-side failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// Another connect is already suspended on the provider.
    #[error("a connection attempt is already in progress")]
    ConnectInProgress,

    /// The provider did not answer within the connect timeout.
    #[error("wallet did not respond within {0:?}")]
    Timeout(Duration),

    /// A disconnect or provider event arrived while connecting.
    #[error("connection attempt superseded by a newer session change")]
    Superseded,

    /// The operation needs a connected wallet.
    #[error("wallet not connected")]
    NotConnected,

    /// The provider is on a chain outside the supported set.
    #[error("unsupported network: chain {0}")]
    UnsupportedNetwork(u64),
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
