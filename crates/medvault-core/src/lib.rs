//! # MedVault Core
//!
//! Pure primitives for MedVault: principals, records, the vaccination
//! verification ledger and the bounded activity log.
//!
//! This crate contains no I/O, no storage, no networking. Everything here is
//! plain data plus the rules that keep it consistent.
//!
//! ## Key Types
//!
//! - [`Principal`] - Wallet-derived identity acting in an operation
//! - [`Record`] - An owned document reference (never its bytes)
//! - [`RecordId`] / [`RequestId`] - Random 16-byte identifiers
//! - [`AccessRequest`] - A non-owner's request to view a record
//! - [`BlobLocator`] - Opaque pointer into the blob store
//! - [`VerificationLedger`] - Per-principal catalog of 21 vaccination entries
//! - [`ActivityLog`] - Newest-first ring of the most recent actions

pub mod access;
pub mod activity;
pub mod clock;
pub mod error;
pub mod record;
pub mod types;
pub mod vaccination;

pub use access::{AccessRequest, AccessStatus, Conditions};
pub use activity::{ActivityEntry, ActivityKind, ActivityLog, DEFAULT_ACTIVITY_CAPACITY};
pub use clock::now_millis;
pub use error::{CoreError, LedgerError, ValidationError};
pub use record::{filter_records, Record, UNKNOWN_RECORD};
pub use types::{BlobLocator, Principal, RecordId, RequestId};
pub use vaccination::{
    VaccinationEntry, VaccineId, VerificationLedger, DEFAULT_ISSUER, VACCINE_CATALOG,
};
