//! Account CRUD operations.
//!
//! Provides database operations for account entities.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{parse_column, parse_optional_timestamp, parse_timestamp};
use crate::domain::{Account, AccountId, AuthType, FolderId};
use crate::storage::database::Result;

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, host, port, encryption, auth_type, user, password, display_name,
        synchronize, is_primary, created_at, last_connected_at, swipe_left, swipe_right
    FROM accounts
"#;

/// Inserts a new account and returns its assigned id.
///
/// The `id` field of `account` is ignored.
pub fn insert(conn: &Connection, account: &Account) -> Result<AccountId> {
    conn.execute(
        r#"
        INSERT INTO accounts (
            host, port, encryption, auth_type, user, password, display_name,
            synchronize, is_primary, created_at, last_connected_at, swipe_left, swipe_right
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13
        )
        "#,
        params![
            account.host,
            account.port,
            account.encryption.as_str(),
            account.auth_type.as_str(),
            account.user,
            account.password,
            account.display_name,
            account.synchronize,
            account.primary,
            account.created_at.to_rfc3339(),
            account.last_connected_at.map(|t| t.to_rfc3339()),
            account.swipe_left.map(|f| f.0),
            account.swipe_right.map(|f| f.0),
        ],
    )?;

    Ok(AccountId(conn.last_insert_rowid()))
}

/// Retrieves an account by its ID.
pub fn get_by_id(conn: &Connection, account_id: AccountId) -> Result<Option<Account>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
    let account = stmt.query_row([account_id.0], row_to_account).optional()?;
    Ok(account)
}

/// Retrieves the primary account, if any.
pub fn get_primary(conn: &Connection) -> Result<Option<Account>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE is_primary = 1"))?;
    let account = stmt.query_row([], row_to_account).optional()?;
    Ok(account)
}

/// Retrieves all accounts logging in as `user` with one of `auth_types`.
pub fn find_by_user(
    conn: &Connection,
    user: &str,
    auth_types: &[AuthType],
) -> Result<Vec<Account>> {
    if auth_types.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = (0..auth_types.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("{SELECT_COLUMNS} WHERE user = ?1 AND auth_type IN ({placeholders}) ORDER BY id");

    let mut values: Vec<&str> = Vec::with_capacity(auth_types.len() + 1);
    values.push(user);
    for auth_type in auth_types {
        values.push(auth_type.as_str());
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), row_to_account)?;
    let accounts: std::result::Result<Vec<_>, _> = rows.collect();
    Ok(accounts?)
}

/// Updates an account's swipe target folders.
pub fn set_swipe_folders(
    conn: &Connection,
    account_id: AccountId,
    swipe_left: Option<FolderId>,
    swipe_right: Option<FolderId>,
) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET swipe_left = ?1, swipe_right = ?2 WHERE id = ?3",
        params![swipe_left.map(|f| f.0), swipe_right.map(|f| f.0), account_id.0],
    )?;
    Ok(())
}

/// Enables or disables synchronization for an account.
pub fn set_synchronize(conn: &Connection, account_id: AccountId, synchronize: bool) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET synchronize = ?1 WHERE id = ?2",
        params![synchronize, account_id.0],
    )?;
    Ok(())
}

/// Replaces an account's credential and auth type.
pub fn set_password(
    conn: &Connection,
    account_id: AccountId,
    password: &str,
    auth_type: AuthType,
) -> Result<()> {
    conn.execute(
        "UPDATE accounts SET password = ?1, auth_type = ?2 WHERE id = ?3",
        params![password, auth_type.as_str(), account_id.0],
    )?;
    Ok(())
}

/// Counts total accounts.
pub fn count(conn: &Connection) -> Result<u32> {
    let count = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
    Ok(count)
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: AccountId(row.get(0)?),
        host: row.get(1)?,
        port: row.get(2)?,
        encryption: parse_column(row, 3)?,
        auth_type: parse_column(row, 4)?,
        user: row.get(5)?,
        password: row.get(6)?,
        display_name: row.get(7)?,
        synchronize: row.get(8)?,
        primary: row.get(9)?,
        created_at: parse_timestamp(row, 10)?,
        last_connected_at: parse_optional_timestamp(row, 11)?,
        swipe_left: row.get::<_, Option<i64>>(12)?.map(FolderId),
        swipe_right: row.get::<_, Option<i64>>(13)?.map(FolderId),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::EncryptionMode;
    use crate::storage::Database;
    use chrono::Utc;

    pub(crate) fn sample_account(user: &str, auth_type: AuthType, primary: bool) -> Account {
        let now = Utc::now();
        Account {
            id: AccountId(0),
            host: "imap.gmail.com".to_string(),
            port: 993,
            encryption: EncryptionMode::Ssl,
            auth_type,
            user: user.to_string(),
            password: "secret".to_string(),
            display_name: format!("Gmail/{}", user),
            synchronize: true,
            primary,
            created_at: now,
            last_connected_at: Some(now),
            swipe_left: None,
            swipe_right: None,
        }
    }

    #[tokio::test]
    async fn insert_and_get_account() {
        let db = Database::open_in_memory().await.unwrap();

        let fetched = db
            .transaction(|tx| {
                let id = insert(tx, &sample_account("user@gmail.com", AuthType::Token, true))?;
                get_by_id(tx, id)
            })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.user, "user@gmail.com");
        assert_eq!(fetched.auth_type, AuthType::Token);
        assert_eq!(fetched.encryption, EncryptionMode::Ssl);
        assert!(fetched.primary);
        assert!(fetched.last_connected_at.is_some());
    }

    #[tokio::test]
    async fn get_primary_account() {
        let db = Database::open_in_memory().await.unwrap();

        let primary = db
            .with_conn(|conn| {
                assert!(get_primary(conn)?.is_none());
                insert(conn, &sample_account("a@gmail.com", AuthType::Token, false))?;
                insert(conn, &sample_account("b@gmail.com", AuthType::Token, true))?;
                get_primary(conn)
            })
            .await
            .unwrap();

        assert_eq!(primary.unwrap().user, "b@gmail.com");
    }

    #[tokio::test]
    async fn find_by_user_filters_auth_type() {
        let db = Database::open_in_memory().await.unwrap();

        let found = db
            .with_conn(|conn| {
                insert(conn, &sample_account("u@gmail.com", AuthType::Token, true))?;
                insert(conn, &sample_account("u@gmail.com", AuthType::OAuth, false))?;
                insert(conn, &sample_account("other@gmail.com", AuthType::Password, false))?;
                find_by_user(conn, "u@gmail.com", &[AuthType::Token, AuthType::Password])
            })
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].auth_type, AuthType::Token);
    }

    #[tokio::test]
    async fn update_credentials_and_swipe() {
        let db = Database::open_in_memory().await.unwrap();

        let account = db
            .with_conn(|conn| {
                let mut account = sample_account("u@gmail.com", AuthType::Password, true);
                account.synchronize = false;
                let id = insert(conn, &account)?;
                set_synchronize(conn, id, true)?;
                set_password(conn, id, "new-token", AuthType::Token)?;
                set_swipe_folders(conn, id, Some(FolderId(4)), None)?;
                get_by_id(conn, id)
            })
            .await
            .unwrap()
            .unwrap();

        assert!(account.synchronize);
        assert_eq!(account.password, "new-token");
        assert_eq!(account.auth_type, AuthType::Token);
        assert_eq!(account.swipe_left, Some(FolderId(4)));
        assert_eq!(account.swipe_right, None);
    }

    #[tokio::test]
    async fn invalid_stored_auth_type_is_an_error() {
        let db = Database::open_in_memory().await.unwrap();

        let result = db
            .with_conn(|conn| {
                let id = insert(conn, &sample_account("u@gmail.com", AuthType::Token, true))?;
                conn.execute("UPDATE accounts SET auth_type = 'bogus'", [])?;
                get_by_id(conn, id)
            })
            .await;

        assert!(result.is_err());
    }
}
