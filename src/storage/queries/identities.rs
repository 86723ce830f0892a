//! Identity CRUD operations.

use rusqlite::{params, Connection, Row};

use super::parse_column;
use crate::domain::{AccountId, AuthType, Identity, IdentityId};
use crate::storage::database::Result;

/// Inserts a new identity and returns its assigned id.
///
/// The `id` field of `identity` is ignored.
pub fn insert(conn: &Connection, identity: &Identity) -> Result<IdentityId> {
    conn.execute(
        r#"
        INSERT INTO identities (
            account_id, name, email, host, port, encryption, auth_type, user, password,
            synchronize, is_primary, max_message_size
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12
        )
        "#,
        params![
            identity.account_id.0,
            identity.name,
            identity.email,
            identity.host,
            identity.port,
            identity.encryption.as_str(),
            identity.auth_type.as_str(),
            identity.user,
            identity.password,
            identity.synchronize,
            identity.primary,
            identity.max_message_size.and_then(|s| i64::try_from(s).ok()),
        ],
    )?;

    Ok(IdentityId(conn.last_insert_rowid()))
}

/// Retrieves all identities of an account.
pub fn get_for_account(conn: &Connection, account_id: AccountId) -> Result<Vec<Identity>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            id, account_id, name, email, host, port, encryption, auth_type, user, password,
            synchronize, is_primary, max_message_size
        FROM identities
        WHERE account_id = ?1
        ORDER BY id
        "#,
    )?;

    let rows = stmt.query_map([account_id.0], row_to_identity)?;
    let identities: std::result::Result<Vec<_>, _> = rows.collect();
    Ok(identities?)
}

/// Replaces the credential of the identities of `account_id` that log in as
/// `user` with `old_auth_type`, switching them to `new_auth_type`.
///
/// Returns the number of identities updated.
pub fn set_password(
    conn: &Connection,
    account_id: AccountId,
    user: &str,
    password: &str,
    old_auth_type: AuthType,
    new_auth_type: AuthType,
) -> Result<usize> {
    let updated = conn.execute(
        r#"
        UPDATE identities SET password = ?1, auth_type = ?2
        WHERE account_id = ?3 AND user = ?4 AND auth_type = ?5
        "#,
        params![
            password,
            new_auth_type.as_str(),
            account_id.0,
            user,
            old_auth_type.as_str(),
        ],
    )?;
    Ok(updated)
}

/// Counts all identities across accounts.
pub fn count(conn: &Connection) -> Result<u32> {
    let count = conn.query_row("SELECT COUNT(*) FROM identities", [], |row| row.get(0))?;
    Ok(count)
}

fn row_to_identity(row: &Row<'_>) -> rusqlite::Result<Identity> {
    Ok(Identity {
        id: IdentityId(row.get(0)?),
        account_id: AccountId(row.get(1)?),
        name: row.get(2)?,
        email: row.get(3)?,
        host: row.get(4)?,
        port: row.get(5)?,
        encryption: parse_column(row, 6)?,
        auth_type: parse_column(row, 7)?,
        user: row.get(8)?,
        password: row.get(9)?,
        synchronize: row.get(10)?,
        primary: row.get(11)?,
        max_message_size: row
            .get::<_, Option<i64>>(12)?
            .and_then(|s| u64::try_from(s).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EncryptionMode;
    use crate::storage::queries::accounts;
    use crate::storage::Database;

    fn sample_identity(account_id: AccountId, auth_type: AuthType) -> Identity {
        Identity {
            id: IdentityId(0),
            account_id,
            name: "user".to_string(),
            email: "user@gmail.com".to_string(),
            host: "smtp.gmail.com".to_string(),
            port: 465,
            encryption: EncryptionMode::Ssl,
            auth_type,
            user: "user@gmail.com".to_string(),
            password: "old".to_string(),
            synchronize: true,
            primary: true,
            max_message_size: Some(35_882_577),
        }
    }

    #[tokio::test]
    async fn insert_and_list_identities() {
        let db = Database::open_in_memory().await.unwrap();

        let identities = db
            .with_conn(|conn| {
                let account_id = accounts::insert(
                    conn,
                    &accounts::tests::sample_account("user@gmail.com", AuthType::Token, true),
                )?;
                insert(conn, &sample_identity(account_id, AuthType::Token))?;
                get_for_account(conn, account_id)
            })
            .await
            .unwrap();

        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].max_message_size, Some(35_882_577));
        assert!(identities[0].primary);
    }

    #[tokio::test]
    async fn set_password_matches_previous_auth_type() {
        let db = Database::open_in_memory().await.unwrap();

        let (updated, identities) = db
            .with_conn(|conn| {
                let account_id = accounts::insert(
                    conn,
                    &accounts::tests::sample_account("user@gmail.com", AuthType::Password, true),
                )?;
                insert(conn, &sample_identity(account_id, AuthType::Password))?;
                let mut other = sample_identity(account_id, AuthType::OAuth);
                other.primary = false;
                insert(conn, &other)?;

                let updated = set_password(
                    conn,
                    account_id,
                    "user@gmail.com",
                    "fresh",
                    AuthType::Password,
                    AuthType::Token,
                )?;
                Ok((updated, get_for_account(conn, account_id)?))
            })
            .await
            .unwrap();

        assert_eq!(updated, 1);
        assert_eq!(identities[0].password, "fresh");
        assert_eq!(identities[0].auth_type, AuthType::Token);
        assert_eq!(identities[1].password, "old");
        assert_eq!(identities[1].auth_type, AuthType::OAuth);
    }
}
