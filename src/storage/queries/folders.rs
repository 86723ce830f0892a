//! Folder CRUD operations.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_column;
use crate::domain::{AccountId, Folder, FolderId, RemoteFolder};
use crate::storage::database::Result;

const SELECT_COLUMNS: &str =
    "SELECT id, account_id, name, folder_type, delimiter, synchronize FROM folders";

/// Inserts a folder discovered on the server for `account_id`.
pub fn insert(conn: &Connection, account_id: AccountId, folder: &RemoteFolder) -> Result<FolderId> {
    conn.execute(
        r#"
        INSERT INTO folders (account_id, name, folder_type, delimiter, synchronize)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            account_id.0,
            folder.name,
            folder.folder_type.as_str(),
            folder.delimiter,
            folder.synchronize,
        ],
    )?;

    Ok(FolderId(conn.last_insert_rowid()))
}

/// Retrieves a folder of an account by its exact name.
pub fn get_by_name(conn: &Connection, account_id: AccountId, name: &str) -> Result<Option<Folder>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE account_id = ?1 AND name = ?2"))?;
    let folder = stmt
        .query_row(params![account_id.0, name], row_to_folder)
        .optional()?;
    Ok(folder)
}

/// Retrieves all folders of an account.
pub fn get_for_account(conn: &Connection, account_id: AccountId) -> Result<Vec<Folder>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE account_id = ?1 ORDER BY name"))?;
    let rows = stmt.query_map([account_id.0], row_to_folder)?;
    let folders: std::result::Result<Vec<_>, _> = rows.collect();
    Ok(folders?)
}

/// Counts all folders across accounts.
pub fn count(conn: &Connection) -> Result<u32> {
    let count = conn.query_row("SELECT COUNT(*) FROM folders", [], |row| row.get(0))?;
    Ok(count)
}

fn row_to_folder(row: &Row<'_>) -> rusqlite::Result<Folder> {
    Ok(Folder {
        id: FolderId(row.get(0)?),
        account_id: AccountId(row.get(1)?),
        name: row.get(2)?,
        folder_type: parse_column(row, 3)?,
        delimiter: row.get(4)?,
        synchronize: row.get(5)?,
    })
}
