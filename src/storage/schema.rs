//! SQL schema definitions as const strings.
//!
//! Contains the SQLite schema for provisioned accounts, their folders and
//! identities, and the queue of pending folder operations.

/// SQL to create the accounts table.
pub const CREATE_ACCOUNTS: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    host TEXT NOT NULL,
    port INTEGER NOT NULL,
    encryption TEXT NOT NULL,
    auth_type TEXT NOT NULL,
    user TEXT NOT NULL,
    password TEXT NOT NULL,
    display_name TEXT NOT NULL,
    synchronize INTEGER NOT NULL DEFAULT 1,
    is_primary INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_connected_at TEXT,
    swipe_left INTEGER,
    swipe_right INTEGER
)
"#;

/// SQL to create account indexes.
///
/// The partial unique index allows at most one primary account.
pub const CREATE_ACCOUNT_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts(user);
CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_primary ON accounts(is_primary) WHERE is_primary = 1
"#;

/// SQL to create the folders table.
pub const CREATE_FOLDERS: &str = r#"
CREATE TABLE IF NOT EXISTS folders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    folder_type TEXT NOT NULL,
    delimiter TEXT,
    synchronize INTEGER NOT NULL DEFAULT 0,
    UNIQUE (account_id, name)
)
"#;

/// SQL to create the identities table.
pub const CREATE_IDENTITIES: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    host TEXT NOT NULL,
    port INTEGER NOT NULL,
    encryption TEXT NOT NULL,
    auth_type TEXT NOT NULL,
    user TEXT NOT NULL,
    password TEXT NOT NULL,
    synchronize INTEGER NOT NULL DEFAULT 1,
    is_primary INTEGER NOT NULL DEFAULT 0,
    max_message_size INTEGER
)
"#;

/// SQL to create identity indexes.
pub const CREATE_IDENTITY_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_identities_account ON identities(account_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_identities_primary ON identities(account_id) WHERE is_primary = 1
"#;

/// SQL to create the operations table.
///
/// Operations are queued work items for the synchronization service.
pub const CREATE_OPERATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    folder_id INTEGER NOT NULL REFERENCES folders(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

/// SQL to create operation indexes.
pub const CREATE_OPERATION_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_operations_folder ON operations(folder_id)
"#;

/// Returns all migrations in order.
pub fn all_migrations() -> &'static [&'static str] {
    &[
        CREATE_ACCOUNTS,
        CREATE_ACCOUNT_INDEXES,
        CREATE_FOLDERS,
        CREATE_IDENTITIES,
        CREATE_IDENTITY_INDEXES,
        CREATE_OPERATIONS,
        CREATE_OPERATION_INDEXES,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn migrations_apply_cleanly_twice() {
        let conn = Connection::open_in_memory().unwrap();
        for migration in all_migrations() {
            conn.execute_batch(migration).unwrap();
        }
        for migration in all_migrations() {
            conn.execute_batch(migration).unwrap();
        }
    }

    #[test]
    fn only_one_primary_account() {
        let conn = Connection::open_in_memory().unwrap();
        for migration in all_migrations() {
            conn.execute_batch(migration).unwrap();
        }

        let insert = "INSERT INTO accounts (host, port, encryption, auth_type, user, password, \
                      display_name, is_primary, created_at) \
                      VALUES ('h', 993, 'ssl', 'token', ?1, 'p', 'n', 1, '2025-01-01T00:00:00Z')";
        conn.execute(insert, ["a@gmail.com"]).unwrap();
        assert!(conn.execute(insert, ["b@gmail.com"]).is_err());
    }
}
