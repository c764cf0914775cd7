//! In-memory implementation of the Store trait.
//!
//! Same semantics as SQLite, nothing persisted. This mirrors the reference
//! behavior of keeping all state in process memory.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use medvault_core::{
    AccessRequest, ActivityEntry, ActivityLog, Principal, Record, RecordId, RequestId,
    VaccinationEntry,
};

use crate::error::{Result, StoreError};
use crate::traits::{InsertResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; one
/// lock guards every table so readers always see a joint snapshot.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Records with their insertion sequence.
    records: HashMap<RecordId, (u64, Record)>,

    /// Access requests with their insertion sequence.
    requests: HashMap<RequestId, (u64, AccessRequest)>,

    /// Ledger rows per principal.
    ledgers: HashMap<Principal, Vec<VaccinationEntry>>,

    /// Activity ring, newest first.
    activity: ActivityLog,

    /// Monotonic insertion counter, breaks timestamp ties.
    next_seq: u64,
}

impl MemoryStoreInner {
    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryStoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryStoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Newest first: by timestamp, then by insertion order.
fn newest_first<T: Clone>(rows: impl Iterator<Item = (i64, u64, T)>) -> Vec<T> {
    let mut rows: Vec<_> = rows.collect();
    rows.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    rows.into_iter().map(|(_, _, row)| row).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_record(&self, record: &Record) -> Result<InsertResult> {
        let mut inner = self.write();
        if inner.records.contains_key(&record.id) {
            return Ok(InsertResult::AlreadyExists);
        }
        let seq = inner.bump();
        inner.records.insert(record.id, (seq, record.clone()));
        Ok(InsertResult::Inserted)
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<Record>> {
        Ok(self.read().records.get(id).map(|(_, r)| r.clone()))
    }

    async fn delete_record(&self, id: &RecordId) -> Result<bool> {
        Ok(self.write().records.remove(id).is_some())
    }

    async fn list_records(&self) -> Result<Vec<Record>> {
        let inner = self.read();
        Ok(newest_first(
            inner
                .records
                .values()
                .map(|(seq, r)| (r.upload_date, *seq, r.clone())),
        ))
    }

    async fn records_by_owner(&self, owner: &Principal) -> Result<Vec<Record>> {
        let inner = self.read();
        Ok(newest_first(
            inner
                .records
                .values()
                .filter(|(_, r)| &r.owner == owner)
                .map(|(seq, r)| (r.upload_date, *seq, r.clone())),
        ))
    }

    async fn insert_request(&self, request: &AccessRequest) -> Result<InsertResult> {
        let mut inner = self.write();
        if inner.requests.contains_key(&request.id) {
            return Ok(InsertResult::AlreadyExists);
        }
        let seq = inner.bump();
        inner.requests.insert(request.id, (seq, request.clone()));
        Ok(InsertResult::Inserted)
    }

    async fn get_request(&self, id: &RequestId) -> Result<Option<AccessRequest>> {
        Ok(self.read().requests.get(id).map(|(_, r)| r.clone()))
    }

    async fn update_request(&self, request: &AccessRequest) -> Result<()> {
        let mut inner = self.write();
        match inner.requests.get_mut(&request.id) {
            Some((_, existing)) => {
                *existing = request.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("access request {}", request.id))),
        }
    }

    async fn list_requests(&self) -> Result<Vec<AccessRequest>> {
        let inner = self.read();
        Ok(newest_first(
            inner
                .requests
                .values()
                .map(|(seq, r)| (r.created_at, *seq, r.clone())),
        ))
    }

    async fn requests_for_record(&self, record_id: &RecordId) -> Result<Vec<AccessRequest>> {
        let inner = self.read();
        Ok(newest_first(
            inner
                .requests
                .values()
                .filter(|(_, r)| &r.record_id == record_id)
                .map(|(seq, r)| (r.created_at, *seq, r.clone())),
        ))
    }

    async fn requests_by_address(&self, address: &Principal) -> Result<Vec<AccessRequest>> {
        let inner = self.read();
        Ok(newest_first(
            inner
                .requests
                .values()
                .filter(|(_, r)| &r.address == address)
                .map(|(seq, r)| (r.created_at, *seq, r.clone())),
        ))
    }

    async fn get_ledger(&self, principal: &Principal) -> Result<Option<Vec<VaccinationEntry>>> {
        Ok(self.read().ledgers.get(principal).cloned())
    }

    async fn put_ledger(&self, principal: &Principal, entries: &[VaccinationEntry]) -> Result<()> {
        self.write()
            .ledgers
            .insert(principal.clone(), entries.to_vec());
        Ok(())
    }

    async fn append_activity(&self, entry: &ActivityEntry, capacity: usize) -> Result<()> {
        let mut inner = self.write();
        inner.activity.set_capacity(capacity);
        inner.activity.push(entry.clone());
        Ok(())
    }

    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        Ok(self.read().activity.recent(limit))
    }
}
