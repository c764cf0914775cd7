//! Records: owned document references.
//!
//! A record points at bytes in the blob store; it never holds them. Apart
//! from deletion by its owner, a record is never mutated after creation.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{BlobLocator, Principal, RecordId};

/// Display name used when a reference no longer resolves to a record.
pub const UNKNOWN_RECORD: &str = "Unknown Record";

/// An owned document reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique, immutable identifier.
    pub id: RecordId,

    /// Free-text name (usually the original file name).
    pub name: String,

    /// Free-text description.
    pub description: String,

    /// Creation timestamp (Unix ms).
    pub upload_date: i64,

    /// Locator of the payload in the blob store.
    pub file_url: BlobLocator,

    /// The principal that uploaded the record.
    pub owner: Principal,
}

impl Record {
    /// Build a new record with a generated id.
    ///
    /// Names need not be unique; only emptiness is rejected.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        file_url: BlobLocator,
        owner: Principal,
        now: i64,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        Ok(Self {
            id: RecordId::generate(),
            name,
            description: description.into(),
            upload_date: now,
            file_url,
            owner,
        })
    }

    /// Whether `principal` owns this record.
    pub fn is_owned_by(&self, principal: &Principal) -> bool {
        &self.owner == principal
    }

    /// Lowercased file extension of the record name, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }

    /// Case-insensitive free-text match against name and description.
    ///
    /// A blank query matches everything.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }

    /// Name of `record`, or the unknown placeholder for a dangling reference.
    pub fn display_name(record: Option<&Record>) -> &str {
        record.map(|r| r.name.as_str()).unwrap_or(UNKNOWN_RECORD)
    }
}

/// Read-only projection of `records` matching `query`, order preserved.
pub fn filter_records<'a>(records: &'a [Record], query: &str) -> Vec<&'a Record> {
    records.iter().filter(|r| r.matches(query)).collect()
}
