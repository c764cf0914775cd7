//! # MedVault Testkit
//!
//! Testing utilities for MedVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use medvault_testkit::generators::{record_from_params, RecordParams};
//!
//! proptest! {
//!     #[test]
//!     fn owner_always_reads(params: RecordParams) {
//!         let record = record_from_params(&params);
//!         prop_assert!(record.is_owned_by(&params.owner));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust
//! use medvault_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let record = fixture.make_record("bloodtest.pdf", b"%PDF");
//! assert!(record.is_owned_by(&fixture.principal));
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{address, multi_party_fixtures, TestFixture, VaultFixture};
pub use generators::{record_from_params, RecordParams};
