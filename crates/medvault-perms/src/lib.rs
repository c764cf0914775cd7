//! # MedVault Permissions
//!
//! The access-request state machine and share-link capabilities.
//!
//! ## Overview
//!
//! Access to a record is expressed as an [`AccessRequest`] whose status moves
//! through a fixed table of legal transitions:
//!
//! ```text
//! pending ──► granted ──► revoked
//!    │
//!    └──────► rejected
//! ```
//!
//! Every status change, whether it comes from approving a queued request or
//! from the owner granting access directly, goes through
//! [`AccessEngine::transition`], which checks record ownership before it
//! checks the table.
//!
//! ## Key Types
//!
//! - [`AccessEngine`] - Authorization decisions and the transition entry point
//! - [`AccessDuration`] - `24h`, `7d`, `30d` or `permanent` grants
//! - [`ShareKey`] / [`ShareLink`] - Signed, expiring share links
//!
//! ## Usage
//!
//! ```rust
//! use medvault_core::{AccessStatus, BlobLocator, Principal, Record};
//! use medvault_perms::{AccessEngine, RequestOutcome};
//!
//! let alice = Principal::new("0xA11CE").unwrap();
//! let bob = Principal::new("0xB0B").unwrap();
//! let record = Record::new("bloodtest.pdf", "", BlobLocator::new("blake3:00"), alice.clone(), 0).unwrap();
//!
//! let engine = AccessEngine::default();
//! let RequestOutcome::Created(request) = engine.request_access(&bob, Some(&record), &[], 1).unwrap() else {
//!     panic!("expected a new request");
//! };
//!
//! let granted = engine
//!     .transition(&alice, Some(&record), &request, AccessStatus::Granted, None, 2)
//!     .unwrap();
//! assert!(engine.can_read(&bob, &record, &[granted], 3));
//! ```
//!
//! [`AccessRequest`]: medvault_core::AccessRequest

pub mod engine;
pub mod error;
pub mod grant;
pub mod share;
pub mod transition;

pub use engine::{AccessEngine, DuplicatePolicy, IgnoreReason, RequestOutcome, RequestView};
pub use error::{PermsError, Result};
pub use grant::AccessDuration;
pub use share::{ShareClaims, ShareKey, ShareLink, DEFAULT_SHARE_TTL_MS};
pub use transition::{check_transition, is_legal, LEGAL_TRANSITIONS};
