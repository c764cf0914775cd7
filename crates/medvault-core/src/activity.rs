//! Activity log: bounded, append-only, newest first.
//!
//! Observability only. Nothing here is consulted for authorization.

use std::collections::VecDeque;
use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of entries retained by default.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 50;

/// Kind of a logged action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    Upload,
    Download,
    Delete,
    Share,
    RequestAccess,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Upload => "upload",
            ActivityKind::Download => "download",
            ActivityKind::Delete => "delete",
            ActivityKind::Share => "share",
            ActivityKind::RequestAccess => "request-access",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(ActivityKind::Upload),
            "download" => Some(ActivityKind::Download),
            "delete" => Some(ActivityKind::Delete),
            "share" => Some(ActivityKind::Share),
            "request-access" => Some(ActivityKind::RequestAccess),
            _ => None,
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logged action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub kind: ActivityKind,
    pub record_name: String,
    pub details: Option<String>,
    /// Unix ms.
    pub timestamp: i64,
}

impl ActivityEntry {
    /// Build an entry with a generated id.
    pub fn new(
        kind: ActivityKind,
        record_name: impl Into<String>,
        details: Option<String>,
        timestamp: i64,
    ) -> Self {
        let mut id = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut id);
        Self {
            id: hex::encode(id),
            kind,
            record_name: record_name.into(),
            details,
            timestamp,
        }
    }
}

/// Ring of the most recent entries, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityLog {
    capacity: usize,
    entries: VecDeque<ActivityEntry>,
}

impl ActivityLog {
    /// Create a log retaining at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Prepend an entry, evicting the oldest beyond capacity.
    pub fn push(&mut self, entry: ActivityEntry) -> &ActivityEntry {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
        &self.entries[0]
    }

    /// Build and prepend an entry.
    pub fn record(
        &mut self,
        kind: ActivityKind,
        record_name: impl Into<String>,
        details: Option<String>,
        now: i64,
    ) -> &ActivityEntry {
        self.push(ActivityEntry::new(kind, record_name, details, now))
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    /// The newest `limit` entries.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        self.entries.iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the retention bound, evicting the oldest entries if it shrinks.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.entries.truncate(self.capacity);
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_newest_first() {
        let mut log = ActivityLog::default();
        log.record(ActivityKind::Upload, "a.pdf", None, 1);
        log.record(ActivityKind::Share, "a.pdf", Some("link".into()), 2);

        let kinds: Vec<_> = log.entries().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![ActivityKind::Share, ActivityKind::Upload]);
    }

    #[test]
    fn test_51st_entry_evicts_oldest() {
        let mut log = ActivityLog::default();
        for i in 0..51 {
            log.record(ActivityKind::Download, format!("r{i}"), None, i);
        }

        assert_eq!(log.len(), 50);
        let names: Vec<_> = log.entries().map(|e| e.record_name.as_str()).collect();
        assert_eq!(names.first(), Some(&"r50"));
        assert_eq!(names.last(), Some(&"r1"));
        assert!(!names.contains(&"r0"));
    }

    #[test]
    fn test_shrinking_capacity_evicts() {
        let mut log = ActivityLog::new(5);
        for i in 0..5 {
            log.record(ActivityKind::Upload, format!("r{i}"), None, i);
        }
        log.set_capacity(2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.recent(10)[1].record_name, "r3");

        log.set_capacity(0);
        assert_eq!(log.capacity(), 1);
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&ActivityKind::RequestAccess).unwrap(),
            "\"request-access\""
        );
        for kind in [
            ActivityKind::Upload,
            ActivityKind::Download,
            ActivityKind::Delete,
            ActivityKind::Share,
            ActivityKind::RequestAccess,
        ] {
            assert_eq!(ActivityKind::parse(kind.as_str()), Some(kind));
        }
    }

    proptest! {
        #[test]
        fn test_never_exceeds_capacity(cap in 1usize..80, pushes in 0usize..200) {
            let mut log = ActivityLog::new(cap);
            for i in 0..pushes {
                log.record(ActivityKind::Upload, "x", None, i as i64);
            }
            prop_assert_eq!(log.len(), pushes.min(cap));

            let stamps: Vec<i64> = log.entries().map(|e| e.timestamp).collect();
            prop_assert!(stamps.windows(2).all(|w| w[0] > w[1]));
        }
    }
}
