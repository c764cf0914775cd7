//! SQLite implementation of the Store trait.
//!
//! The durable backend for MedVault. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use medvault_core::{
    now_millis, AccessRequest, AccessStatus, ActivityEntry, ActivityKind, BlobLocator,
    Conditions, CoreError, Principal, Record, RecordId, RequestId, VaccinationEntry,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{InsertResult, Store};

const RECORD_COLUMNS: &str = "record_id, name, description, upload_date, file_url, owner";
const REQUEST_COLUMNS: &str =
    "request_id, address, record_id, status, created_at, updated_at, expires_at, has_conditions";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        debug!(path = %path.display(), "opened sqlite store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking closure against the connection on the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

fn conversion_error(idx: usize, ty: Type, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

fn id_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: for<'a> TryFrom<&'a [u8], Error = CoreError>,
{
    let bytes: Vec<u8> = row.get(idx)?;
    T::try_from(bytes.as_slice()).map_err(|e| conversion_error(idx, Type::Blob, e))
}

fn principal_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Principal> {
    let text: String = row.get(idx)?;
    Principal::new(text).map_err(|e| conversion_error(idx, Type::Text, e))
}

// Helper to convert a row to Record
fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: id_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        upload_date: row.get(3)?,
        file_url: BlobLocator::new(row.get::<_, String>(4)?),
        owner: principal_column(row, 5)?,
    })
}

// Helper to convert a row to AccessRequest
fn row_to_request(row: &Row<'_>) -> rusqlite::Result<AccessRequest> {
    let status_text: String = row.get(3)?;
    let status = AccessStatus::parse(&status_text)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(3, "status".into(), Type::Text))?;
    let expires_at: Option<i64> = row.get(6)?;
    let has_conditions: bool = row.get(7)?;

    Ok(AccessRequest {
        id: id_column(row, 0)?,
        address: principal_column(row, 1)?,
        record_id: id_column(row, 2)?,
        status,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
        conditions: has_conditions.then_some(Conditions { expires_at }),
    })
}

// Helper to convert a row to ActivityEntry
fn row_to_activity(row: &Row<'_>) -> rusqlite::Result<ActivityEntry> {
    let kind_text: String = row.get(1)?;
    let kind = ActivityKind::parse(&kind_text)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(1, "kind".into(), Type::Text))?;

    Ok(ActivityEntry {
        id: row.get(0)?,
        kind,
        record_name: row.get(2)?,
        details: row.get(3)?,
        timestamp: row.get(4)?,
    })
}

// Helper to encode ledger rows to CBOR
fn encode_entries(entries: &[VaccinationEntry]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(entries, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_entries(bytes: &[u8]) -> Result<Vec<VaccinationEntry>> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn query_records(conn: &Connection, filter: &str, owner: Option<&str>) -> Result<Vec<Record>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM records {filter} ORDER BY upload_date DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = match owner {
        Some(owner) => stmt
            .query_map(params![owner], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(rows)
}

fn query_requests(
    conn: &Connection,
    filter: &str,
    param: Option<rusqlite::types::Value>,
) -> Result<Vec<AccessRequest>> {
    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM access_requests {filter} ORDER BY created_at DESC, rowid DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = match param {
        Some(value) => stmt
            .query_map(params![value], row_to_request)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([], row_to_request)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };
    Ok(rows)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert_record(&self, record: &Record) -> Result<InsertResult> {
        let record = record.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO records (record_id, name, description, upload_date, file_url, owner)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id.as_bytes().as_slice(),
                    record.name,
                    record.description,
                    record.upload_date,
                    record.file_url.as_str(),
                    record.owner.as_str(),
                ],
            )?;

            if inserted == 0 {
                return Ok(InsertResult::AlreadyExists);
            }
            debug!(record_id = %record.id, owner = %record.owner.short(), "inserted record");
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_record(&self, id: &RecordId) -> Result<Option<Record>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM records WHERE record_id = ?1"),
                params![id.as_bytes().as_slice()],
                row_to_record,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete_record(&self, id: &RecordId) -> Result<bool> {
        let id = *id;

        self.run(move |conn| {
            let removed = conn.execute(
                "DELETE FROM records WHERE record_id = ?1",
                params![id.as_bytes().as_slice()],
            )?;
            debug!(record_id = %id, removed, "deleted record");
            Ok(removed > 0)
        })
        .await
    }

    async fn list_records(&self) -> Result<Vec<Record>> {
        self.run(|conn| query_records(conn, "", None)).await
    }

    async fn records_by_owner(&self, owner: &Principal) -> Result<Vec<Record>> {
        let owner = owner.as_str().to_string();
        self.run(move |conn| query_records(conn, "WHERE owner = ?1", Some(&owner)))
            .await
    }

    async fn insert_request(&self, request: &AccessRequest) -> Result<InsertResult> {
        let request = request.clone();

        self.run(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO access_requests (
                    request_id, address, record_id, status, created_at, updated_at,
                    expires_at, has_conditions
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    request.id.as_bytes().as_slice(),
                    request.address.as_str(),
                    request.record_id.as_bytes().as_slice(),
                    request.status.as_str(),
                    request.created_at,
                    request.updated_at,
                    request.conditions.and_then(|c| c.expires_at),
                    request.conditions.is_some(),
                ],
            )?;

            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn get_request(&self, id: &RequestId) -> Result<Option<AccessRequest>> {
        let id = *id;

        self.run(move |conn| {
            conn.query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM access_requests WHERE request_id = ?1"),
                params![id.as_bytes().as_slice()],
                row_to_request,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn update_request(&self, request: &AccessRequest) -> Result<()> {
        let request = request.clone();

        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE access_requests
                 SET status = ?2, updated_at = ?3, expires_at = ?4, has_conditions = ?5
                 WHERE request_id = ?1",
                params![
                    request.id.as_bytes().as_slice(),
                    request.status.as_str(),
                    request.updated_at,
                    request.conditions.and_then(|c| c.expires_at),
                    request.conditions.is_some(),
                ],
            )?;

            if updated == 0 {
                return Err(StoreError::NotFound(format!("access request {}", request.id)));
            }
            debug!(request_id = %request.id, status = %request.status, "updated access request");
            Ok(())
        })
        .await
    }

    async fn list_requests(&self) -> Result<Vec<AccessRequest>> {
        self.run(|conn| query_requests(conn, "", None)).await
    }

    async fn requests_for_record(&self, record_id: &RecordId) -> Result<Vec<AccessRequest>> {
        let value = rusqlite::types::Value::Blob(record_id.as_bytes().to_vec());
        self.run(move |conn| query_requests(conn, "WHERE record_id = ?1", Some(value)))
            .await
    }

    async fn requests_by_address(&self, address: &Principal) -> Result<Vec<AccessRequest>> {
        let value = rusqlite::types::Value::Text(address.as_str().to_string());
        self.run(move |conn| query_requests(conn, "WHERE address = ?1", Some(value)))
            .await
    }

    async fn get_ledger(&self, principal: &Principal) -> Result<Option<Vec<VaccinationEntry>>> {
        let principal = principal.as_str().to_string();

        self.run(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT entries FROM vaccination_ledgers WHERE principal = ?1",
                    params![principal],
                    |row| row.get(0),
                )
                .optional()?;

            bytes.map(|b| decode_entries(&b)).transpose()
        })
        .await
    }

    async fn put_ledger(&self, principal: &Principal, entries: &[VaccinationEntry]) -> Result<()> {
        let principal = principal.as_str().to_string();
        let encoded = encode_entries(entries)?;

        self.run(move |conn| {
            conn.execute(
                "INSERT INTO vaccination_ledgers (principal, entries, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(principal) DO UPDATE SET
                    entries = excluded.entries,
                    updated_at = excluded.updated_at",
                params![principal, encoded, now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn append_activity(&self, entry: &ActivityEntry, capacity: usize) -> Result<()> {
        let entry = entry.clone();
        let capacity = capacity.max(1) as i64;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO activity_log (entry_id, kind, record_name, details, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.id,
                    entry.kind.as_str(),
                    entry.record_name,
                    entry.details,
                    entry.timestamp,
                ],
            )?;
            tx.execute(
                "DELETE FROM activity_log WHERE seq NOT IN (
                    SELECT seq FROM activity_log ORDER BY seq DESC LIMIT ?1
                 )",
                params![capacity],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>> {
        let limit = limit as i64;

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT entry_id, kind, record_name, details, timestamp
                 FROM activity_log ORDER BY seq DESC LIMIT ?1",
            )?;
            let entries = stmt
                .query_map(params![limit], row_to_activity)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }
}
