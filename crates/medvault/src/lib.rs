//! # MedVault
//!
//! The unified API for MedVault: medical records owned by wallet
//! identities, shared only with the owner's consent.
//!
//! ## Overview
//!
//! MedVault provides a storage-agnostic library for:
//!
//! - **Identity**: A wallet-backed session that names the acting principal
//! - **Records**: Documents registered by an owner, payloads kept aside
//! - **Access**: Requests and grants moved through a fixed transition table
//! - **Verification**: A per-principal catalog of vaccinations
//! - **Activity**: A bounded, newest-first log of recent actions
//!
//! ## Key Concepts
//!
//! - **Owner**: The principal that uploaded a record. Only it may approve,
//!   reject, grant, revoke, share or delete.
//! - **Grant**: A `granted` access request. It may carry an expiry.
//! - **Revocation**: Terminal. A revoked principal must ask again.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use medvault::session::memory::MemoryWallet;
//! use medvault::store::SqliteStore;
//! use medvault::{Vault, VaultConfig};
//!
//! async fn example() -> medvault::Result<()> {
//!     let wallet = Arc::new(MemoryWallet::new(["0x1234567890abcdef"], 1));
//!     let store = SqliteStore::open("medvault.db")?;
//!     let vault = Vault::new(store, wallet, VaultConfig::default());
//!
//!     vault.connect().await?;
//!     let record = vault
//!         .upload_record("bloodtest.pdf", "annual panel", Bytes::from_static(b"%PDF"))
//!         .await?;
//!
//!     let link = vault.share_link(&record.id).await?;
//!     println!("share: {link}");
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `medvault::core` - Core primitives (Record, Principal, ledger, activity)
//! - `medvault::store` - Storage abstraction, SQLite and blob stores
//! - `medvault::session` - Wallet providers and the identity session
//! - `medvault::perms` - Access control engine and share links

pub mod config;
pub mod error;
pub mod notify;
pub mod vault;

// Re-export component crates
pub use medvault_core as core;
pub use medvault_perms as perms;
pub use medvault_session as session;
pub use medvault_store as store;

// Re-export main types for convenience
pub use config::{SessionSettings, VaultConfig};
pub use error::{ErrorKind, Result, VaultError};
pub use notify::{messages, MemorySink, NotificationSink, Severity, TracingSink};
pub use vault::{RecordListing, SharedRecord, Vault};

// Re-export commonly used component types
pub use medvault_core::{
    AccessRequest, AccessStatus, ActivityEntry, ActivityKind, Principal, Record, RecordId,
    RequestId, VaccinationEntry, VaccineId, VerificationLedger,
};
pub use medvault_perms::{AccessDuration, DuplicatePolicy, RequestOutcome, RequestView, ShareLink};
pub use medvault_session::{SessionError, SessionEvent, SessionState, WalletProvider};
