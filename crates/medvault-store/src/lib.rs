//! # MedVault Store
//!
//! Storage abstraction for MedVault. Provides a trait-based interface for
//! the persisted state surface (records, access requests, per-principal
//! verification ledgers, activity ring) with SQLite and in-memory
//! implementations, plus the blob store collaborator.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all state persistence
//! - [`SqliteStore`] - SQLite-based durable storage
//! - [`MemoryStore`] - In-memory storage, the reference behavior
//! - [`BlobStore`] - Opaque payload storage addressed by [`BlobLocator`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use medvault_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteStore::open("medvault.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteStore::open_memory().unwrap();
//!
//!     let records = store.list_records().await.unwrap();
//!     assert!(records.is_empty());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: Inserting the same id twice returns `AlreadyExists`
//! - **No cascades**: Deleting a record leaves its access requests in place
//! - **No ownership checks**: Callers authorize before mutating
//!
//! [`BlobLocator`]: medvault_core::BlobLocator

pub mod blob;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use blob::{locator_for, BlobStore, FsBlobStore, MemoryBlobStore};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{InsertResult, Store, StoreExt};
