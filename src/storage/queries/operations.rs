//! Queued folder operations.
//!
//! Provisioning records a `sync` operation for every new folder that has
//! synchronization enabled; the synchronization service drains the queue.

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::domain::{AccountId, FolderId};
use crate::storage::database::Result;

/// Operation name for a folder synchronization.
pub const SYNC: &str = "sync";

/// Queues a synchronization of `folder_id`.
pub fn queue_sync(conn: &Connection, account_id: AccountId, folder_id: FolderId) -> Result<i64> {
    conn.execute(
        "INSERT INTO operations (account_id, folder_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![account_id.0, folder_id.0, SYNC, Utc::now().to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns the folders with a queued operation named `name`, oldest first.
pub fn pending_folders(conn: &Connection, name: &str) -> Result<Vec<FolderId>> {
    let mut stmt = conn.prepare("SELECT folder_id FROM operations WHERE name = ?1 ORDER BY id")?;
    let rows = stmt.query_map([name], |row| Ok(FolderId(row.get(0)?)))?;
    let folders: std::result::Result<Vec<_>, _> = rows.collect();
    Ok(folders?)
}
