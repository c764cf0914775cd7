//! # MedVault Session
//!
//! Wallet-backed identity for MedVault: who is acting, and on which chain.
//!
//! ## Overview
//!
//! The [`IdentitySession`] holds at most one active [`Principal`]. It talks to
//! the wallet only through the [`WalletProvider`] trait and consumes the
//! wallet's account/chain notifications as an inbound event channel rather
//! than as callbacks.
//!
//! ## Lifecycle
//!
//! ```text
//! disconnected ──connect()──► connecting ──ok──► connected
//!      ▲                          │                 │
//!      └────────── error ─────────┘                 │
//!      └──── disconnect() / accounts=[] ────────────┘
//! ```
//!
//! A connected session reacts to provider events: a new primary account
//! switches the principal, a chain change asks dependents to reload.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use medvault_session::{memory::MemoryWallet, IdentitySession, SessionConfig};
//!
//! # async fn example() {
//! let wallet = Arc::new(MemoryWallet::new(["0xA11CE"], 1));
//! let session = IdentitySession::new(wallet, SessionConfig::default());
//!
//! let principal = session.connect().await.unwrap();
//! assert_eq!(principal.short(), "0xA11CE");
//! # }
//! ```
//!
//! [`Principal`]: medvault_core::Principal

pub mod error;
pub mod network;
pub mod provider;
pub mod session;

pub use error::{Result, SessionError};
pub use network::{is_supported, network_name, parse_chain_id, NETWORKS, SUPPORTED_NETWORKS};
pub use provider::{memory, ProviderEvent, WalletProvider, EVENT_BUFFER};
pub use session::{IdentitySession, SessionConfig, SessionEvent, SessionState};
