//! Verification ledger: a fixed vaccination catalog per principal.
//!
//! The ledger is re-initialized to all-unverified whenever the active
//! principal changes. State is never merged across principals.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LedgerError;
use crate::types::{BlobLocator, Principal};

/// Issuer recorded when the caller does not name one.
pub const DEFAULT_ISSUER: &str = "Govt. Portal";

/// The fixed catalog of verifiable vaccinations.
pub const VACCINE_CATALOG: [&str; 21] = [
    "Chickenpox (Varicella)",
    "COVID-19",
    "Dengue",
    "Diphtheria",
    "Flu (Influenza)",
    "Hepatitis A",
    "Hepatitis B",
    "Hib",
    "HPV",
    "Measles",
    "Meningococcal",
    "Mpox",
    "Mumps",
    "Pneumococcal",
    "Polio",
    "Rotavirus",
    "RSV",
    "Rubella",
    "Shingles",
    "Tetanus",
    "Whooping Cough",
];

/// Stable identifier derived from a catalog name.
///
/// Lowercase ASCII letters and digits are kept; every other character maps
/// to `-`, so the same name always yields the same id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VaccineId(String);

impl VaccineId {
    /// Derive the id for a catalog name.
    pub fn derive(name: &str) -> Self {
        let slug = name
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Self(slug)
    }

    /// Wrap an id received from a caller, without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for VaccineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VaccineId({})", self.0)
    }
}

impl fmt::Display for VaccineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaccinationEntry {
    pub id: VaccineId,
    pub name: String,
    pub verified: bool,

    /// Set once, on verification (Unix ms).
    pub verification_date: Option<i64>,

    /// Set once, on verification.
    pub issuer: Option<String>,

    /// Supporting document, if one was supplied.
    pub evidence: Option<BlobLocator>,
}

impl VaccinationEntry {
    fn unverified(name: &str) -> Self {
        Self {
            id: VaccineId::derive(name),
            name: name.to_string(),
            verified: false,
            verification_date: None,
            issuer: None,
            evidence: None,
        }
    }
}

/// The catalog for the active principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationLedger {
    principal: Option<Principal>,
    entries: Vec<VaccinationEntry>,
}

impl VerificationLedger {
    /// An empty ledger with no principal.
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh all-unverified ledger for `principal`.
    pub fn for_principal(principal: Principal) -> Self {
        let mut ledger = Self::new();
        ledger.initialize(principal);
        ledger
    }

    /// Rebuild a ledger from persisted rows.
    pub fn from_parts(principal: Principal, entries: Vec<VaccinationEntry>) -> Self {
        Self {
            principal: Some(principal),
            entries,
        }
    }

    /// Reset every catalog entry to unverified for `principal`.
    ///
    /// Always resets, even when `principal` is the current one.
    pub fn initialize(&mut self, principal: Principal) {
        self.principal = Some(principal);
        self.entries = VACCINE_CATALOG
            .iter()
            .map(|name| VaccinationEntry::unverified(name))
            .collect();
    }

    /// Drop all entries and the principal (session ended).
    pub fn clear(&mut self) {
        self.principal = None;
        self.entries.clear();
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn entries(&self) -> &[VaccinationEntry] {
        &self.entries
    }

    pub fn get(&self, id: &VaccineId) -> Option<&VaccinationEntry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    /// Mark an entry verified.
    ///
    /// Date, issuer and evidence are written exactly once; a second
    /// verification of the same entry is rejected.
    pub fn verify(
        &mut self,
        id: &VaccineId,
        issuer: Option<&str>,
        evidence: Option<BlobLocator>,
        now: i64,
    ) -> Result<&VaccinationEntry, LedgerError> {
        if self.principal.is_none() {
            return Err(LedgerError::NotInitialized);
        }
        let entry = self
            .entries
            .iter_mut()
            .find(|e| &e.id == id)
            .ok_or_else(|| LedgerError::UnknownEntry(id.clone()))?;

        if entry.verified {
            return Err(LedgerError::AlreadyVerified(id.clone()));
        }

        entry.verified = true;
        entry.verification_date = Some(now);
        entry.issuer = Some(issuer.unwrap_or(DEFAULT_ISSUER).to_string());
        entry.evidence = evidence;
        Ok(entry)
    }

    /// Number of verified entries.
    pub fn verified_count(&self) -> usize {
        self.entries.iter().filter(|e| e.verified).count()
    }

    /// True iff every catalog entry is verified.
    pub fn is_fully_verified(&self) -> bool {
        self.entries.len() == VACCINE_CATALOG.len() && self.entries.iter().all(|e| e.verified)
    }

    /// Entries whose name contains `term`, case-insensitively.
    pub fn search(&self, term: &str) -> Vec<&VaccinationEntry> {
        let needle = term.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::new("0xa11ce").unwrap()
    }

    #[test]
    fn test_ids_are_stable_slugs() {
        assert_eq!(VaccineId::derive("COVID-19").as_str(), "covid-19");
        assert_eq!(
            VaccineId::derive("Chickenpox (Varicella)").as_str(),
            "chickenpox--varicella-"
        );
        assert_eq!(VaccineId::derive("Whooping Cough"), VaccineId::derive("Whooping Cough"));
    }

    #[test]
    fn test_catalog_ids_unique() {
        let ledger = VerificationLedger::for_principal(alice());
        let mut ids: Vec<_> = ledger.entries().iter().map(|e| e.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 21);
    }

    #[test]
    fn test_verify_sets_fields_once() {
        let mut ledger = VerificationLedger::for_principal(alice());
        let id = VaccineId::derive("Polio");

        let entry = ledger.verify(&id, None, None, 42).unwrap();
        assert!(entry.verified);
        assert_eq!(entry.verification_date, Some(42));
        assert_eq!(entry.issuer.as_deref(), Some(DEFAULT_ISSUER));

        let err = ledger.verify(&id, Some("Clinic"), None, 99).unwrap_err();
        assert_eq!(err, LedgerError::AlreadyVerified(id.clone()));

        let entry = ledger.get(&id).unwrap();
        assert_eq!(entry.verification_date, Some(42));
        assert_eq!(entry.issuer.as_deref(), Some(DEFAULT_ISSUER));
    }

    #[test]
    fn test_verify_unknown_and_uninitialized() {
        let mut empty = VerificationLedger::new();
        assert_eq!(
            empty.verify(&VaccineId::derive("Polio"), None, None, 0),
            Err(LedgerError::NotInitialized)
        );

        let mut ledger = VerificationLedger::for_principal(alice());
        let bogus = VaccineId::new("smallpox");
        assert_eq!(
            ledger.verify(&bogus, None, None, 0),
            Err(LedgerError::UnknownEntry(bogus.clone()))
        );
    }

    #[test]
    fn test_fully_verified_threshold() {
        let mut ledger = VerificationLedger::for_principal(alice());
        let ids: Vec<_> = ledger.entries().iter().map(|e| e.id.clone()).collect();

        for id in &ids[..20] {
            ledger.verify(id, None, None, 1).unwrap();
        }
        assert_eq!(ledger.verified_count(), 20);
        assert!(!ledger.is_fully_verified());

        ledger.verify(&ids[20], None, None, 1).unwrap();
        assert!(ledger.is_fully_verified());
    }

    #[test]
    fn test_initialize_always_resets() {
        let mut ledger = VerificationLedger::for_principal(alice());
        ledger
            .verify(&VaccineId::derive("Mumps"), None, None, 1)
            .unwrap();

        ledger.initialize(alice());
        assert_eq!(ledger.verified_count(), 0);

        ledger
            .verify(&VaccineId::derive("Mumps"), None, None, 1)
            .unwrap();
        ledger.initialize(Principal::new("0xb0b").unwrap());
        assert_eq!(ledger.verified_count(), 0);
        assert_eq!(ledger.principal().unwrap().as_str(), "0xb0b");
    }

    #[test]
    fn test_search() {
        let ledger = VerificationLedger::for_principal(alice());
        let hits = ledger.search("hep");
        assert_eq!(hits.len(), 2);
        assert!(ledger.search("zzz").is_empty());
    }

    #[test]
    fn test_empty_ledger_is_not_verified() {
        assert!(!VerificationLedger::new().is_fully_verified());
    }
}
