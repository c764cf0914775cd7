//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use medvault_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Records: owned document references
        CREATE TABLE records (
            record_id BLOB PRIMARY KEY,       -- 16 bytes, random
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            upload_date INTEGER NOT NULL,     -- Unix ms
            file_url TEXT NOT NULL,           -- opaque blob locator
            owner TEXT NOT NULL               -- principal, case-sensitive
        );

        -- Access requests. record_id is deliberately not a foreign key:
        -- rows outlive the record they point at.
        CREATE TABLE access_requests (
            request_id BLOB PRIMARY KEY,      -- 16 bytes, random
            address TEXT NOT NULL,            -- requesting principal
            record_id BLOB NOT NULL,
            status TEXT NOT NULL,             -- pending|granted|revoked|rejected
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            expires_at INTEGER,               -- grant expiry, NULL = none/permanent
            has_conditions INTEGER NOT NULL DEFAULT 0
        );

        -- Verification ledger rows, one CBOR blob per principal
        CREATE TABLE vaccination_ledgers (
            principal TEXT PRIMARY KEY,
            entries BLOB NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Activity ring buffer
        CREATE TABLE activity_log (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            record_name TEXT NOT NULL,
            details TEXT,
            timestamp INTEGER NOT NULL
        );

        CREATE INDEX idx_records_owner ON records(owner);
        CREATE INDEX idx_records_upload ON records(upload_date);
        CREATE INDEX idx_requests_record ON access_requests(record_id);
        CREATE INDEX idx_requests_address ON access_requests(address);
        CREATE INDEX idx_requests_status ON access_requests(status);
        "#,
    )?;

    Ok(())
}
