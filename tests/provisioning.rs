//! Integration tests for account provisioning.
//!
//! These tests drive [`AccountProvisioner`] end to end against an in-memory
//! database and a scripted mail connector, checking what ends up in storage.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use pretty_assertions::assert_eq;

use heap_setup::domain::{
    Account, AccountId, AuthType, EncryptionMode, Endpoint, FolderType, RemoteFolder,
};
use heap_setup::providers::{
    BuiltinDirectory, Credentials, MailConnector, MailSession, Protocol, ProviderError,
    Result as ProviderResult,
};
use heap_setup::services::{
    AccountProvisioner, AlwaysOnline, ChannelSyncSignal, ProvisionError, ProvisionRequest,
    SyncCommand,
};
use heap_setup::storage::queries::{accounts, folders, identities, operations};
use heap_setup::storage::Database;

// ============================================================================
// Scripted connector
// ============================================================================

#[derive(Debug, Default)]
struct Log {
    connects: Vec<Protocol>,
    closes: Vec<Protocol>,
}

#[derive(Clone)]
struct ScriptedConnector {
    folders: Vec<RemoteFolder>,
    max_size: Option<u64>,
    smtp_times_out: bool,
    smtp_connect_times_out: bool,
    log: Arc<Mutex<Log>>,
}

impl ScriptedConnector {
    fn new(folders: Vec<RemoteFolder>) -> Self {
        Self {
            folders,
            max_size: Some(36_700_160),
            smtp_times_out: false,
            smtp_connect_times_out: false,
            log: Arc::new(Mutex::new(Log::default())),
        }
    }
}

struct ScriptedSession {
    protocol: Protocol,
    connector: ScriptedConnector,
}

#[async_trait]
impl MailConnector for ScriptedConnector {
    async fn connect(
        &self,
        protocol: Protocol,
        _endpoint: &Endpoint,
        _credentials: &Credentials,
    ) -> ProviderResult<Box<dyn MailSession>> {
        self.log.lock().unwrap().connects.push(protocol);
        if protocol == Protocol::Smtp && self.smtp_connect_times_out {
            return Err(ProviderError::Timeout("SMTP greeting after 20s".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            protocol,
            connector: self.clone(),
        }))
    }
}

#[async_trait]
impl MailSession for ScriptedSession {
    async fn list_folders(&mut self) -> ProviderResult<Vec<RemoteFolder>> {
        Ok(self.connector.folders.clone())
    }

    async fn max_message_size(&mut self) -> ProviderResult<Option<u64>> {
        if self.connector.smtp_times_out {
            return Err(ProviderError::Timeout("SMTP EHLO after 20s".to_string()));
        }
        Ok(self.connector.max_size)
    }

    async fn close(self: Box<Self>) -> ProviderResult<()> {
        self.connector.log.lock().unwrap().closes.push(self.protocol);
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn gmail_folders() -> Vec<RemoteFolder> {
    vec![
        RemoteFolder::new("INBOX", []),
        RemoteFolder::new("[Gmail]/Drafts", ["\\Drafts"]),
        RemoteFolder::new("[Gmail]/Sent Mail", ["\\Sent"]),
        RemoteFolder::new("[Gmail]/Spam", ["\\Junk"]),
        RemoteFolder::new("[Gmail]/Trash", ["\\Trash"]),
        RemoteFolder::new("[Gmail]/All Mail", ["\\All"]),
        RemoteFolder::new("[Gmail]/Starred", ["\\Flagged"]),
        RemoteFolder::new("Travel", []),
    ]
}

struct Harness {
    db: Database,
    connector: ScriptedConnector,
    signal: ChannelSyncSignal,
}

impl Harness {
    async fn new(connector: ScriptedConnector) -> Self {
        Self {
            db: Database::open_in_memory().await.unwrap(),
            connector,
            signal: ChannelSyncSignal::default(),
        }
    }

    fn provisioner(&self) -> AccountProvisioner {
        AccountProvisioner::new(
            self.db.clone(),
            Arc::new(BuiltinDirectory::new()),
            Arc::new(self.connector.clone()),
            Arc::new(AlwaysOnline),
            Arc::new(self.signal.clone()),
        )
    }

    async fn counts(&self) -> (u32, u32, u32) {
        self.db
            .with_conn(|conn| {
                Ok((
                    accounts::count(conn)?,
                    folders::count(conn)?,
                    identities::count(conn)?,
                ))
            })
            .await
            .unwrap()
    }

    async fn account(&self, id: AccountId) -> Account {
        self.db
            .with_conn(move |conn| accounts::get_by_id(conn, id))
            .await
            .unwrap()
            .unwrap()
    }

    async fn insert_account(&self, user: &str, auth_type: AuthType, primary: bool) -> AccountId {
        let now = Utc::now();
        let account = Account {
            id: AccountId(0),
            host: "imap.gmail.com".to_string(),
            port: 993,
            encryption: EncryptionMode::Ssl,
            auth_type,
            user: user.to_string(),
            password: "old-secret".to_string(),
            display_name: format!("Gmail/{}", user),
            synchronize: false,
            primary,
            created_at: now,
            last_connected_at: None,
            swipe_left: None,
            swipe_right: None,
        };
        self.db
            .with_conn(move |conn| accounts::insert(conn, &account))
            .await
            .unwrap()
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn first_account_is_primary_with_trash_swipe() {
    let harness = Harness::new(ScriptedConnector::new(gmail_folders())).await;
    let mut commands = harness.signal.subscribe();

    let result = harness
        .provisioner()
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.valid"))
        .await
        .unwrap();

    assert!(result.created);
    let account = harness.account(result.account_id).await;
    assert!(account.primary);

    let account_id = result.account_id;
    let stored = harness
        .db
        .with_conn(move |conn| folders::get_for_account(conn, account_id))
        .await
        .unwrap();
    let trash = stored
        .iter()
        .find(|f| f.folder_type == FolderType::Trash)
        .unwrap();
    assert_eq!(account.swipe_left, Some(trash.id));

    assert_eq!(
        commands.recv().await.unwrap(),
        SyncCommand::Evaluate {
            reason: "provision".to_string()
        }
    );
}

#[tokio::test]
async fn update_replaces_credential_without_new_folders() {
    let harness = Harness::new(ScriptedConnector::new(gmail_folders())).await;
    let existing = harness
        .insert_account("user@gmail.com", AuthType::Password, true)
        .await;
    let mut commands = harness.signal.subscribe();

    let result = harness
        .provisioner()
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.fresh").update_existing(true))
        .await
        .unwrap();

    assert!(!result.created);
    assert_eq!(result.account_id, existing);

    let account = harness.account(existing).await;
    assert_eq!(account.password, "ya29.fresh");
    assert_eq!(account.auth_type, AuthType::Token);
    assert!(account.synchronize);
    assert_eq!(harness.counts().await, (1, 0, 0));

    assert_eq!(
        commands.recv().await.unwrap(),
        SyncCommand::Reload {
            account_id: existing,
            immediate: true,
            reason: "provision".to_string()
        }
    );
}

#[tokio::test]
async fn smtp_timeout_writes_nothing() {
    let mut connector = ScriptedConnector::new(gmail_folders());
    connector.smtp_times_out = true;
    let harness = Harness::new(connector).await;

    let result = harness
        .provisioner()
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.valid"))
        .await;

    assert!(matches!(
        result,
        Err(ProvisionError::ProbeFailed(ProviderError::Timeout(_)))
    ));
    assert_eq!(harness.counts().await, (0, 0, 0));

    let log = harness.connector.log.lock().unwrap();
    assert_eq!(log.connects, vec![Protocol::Imap, Protocol::Smtp]);
    assert_eq!(log.closes, vec![Protocol::Imap, Protocol::Smtp]);
}

#[tokio::test]
async fn smtp_connect_timeout_closes_imap_and_writes_nothing() {
    let mut connector = ScriptedConnector::new(gmail_folders());
    connector.smtp_connect_times_out = true;
    let harness = Harness::new(connector).await;
    let mut commands = harness.signal.subscribe();

    let result = harness
        .provisioner()
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.valid"))
        .await;

    assert!(matches!(
        result,
        Err(ProvisionError::ProbeFailed(ProviderError::Timeout(_)))
    ));
    assert_eq!(harness.counts().await, (0, 0, 0));
    assert!(commands.try_recv().is_err());

    let log = harness.connector.log.lock().unwrap();
    assert_eq!(log.connects, vec![Protocol::Imap, Protocol::Smtp]);
    assert_eq!(log.closes, vec![Protocol::Imap]);
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn validation_happens_before_any_connection() {
    let harness = Harness::new(ScriptedConnector::new(gmail_folders())).await;
    let provisioner = harness.provisioner();

    let invalid = provisioner
        .provision(ProvisionRequest::new("user at gmail", "ya29.valid"))
        .await;
    assert!(matches!(invalid, Err(ProvisionError::InvalidEmail(_))));

    let blank = provisioner
        .provision(ProvisionRequest::new("user@gmail.com", ""))
        .await;
    assert!(matches!(blank, Err(ProvisionError::MissingCredential)));

    assert!(harness.connector.log.lock().unwrap().connects.is_empty());
    assert_eq!(harness.counts().await, (0, 0, 0));
}

#[tokio::test]
async fn repeated_provisioning_does_not_duplicate_folders() {
    let harness = Harness::new(ScriptedConnector::new(gmail_folders())).await;
    let provisioner = harness.provisioner();

    let first = provisioner
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.one"))
        .await
        .unwrap();
    let after_first = harness.counts().await;

    let second = provisioner
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.two").update_existing(true))
        .await
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.account_id, first.account_id);
    assert_eq!(harness.counts().await, after_first);

    // The identity created with the account follows the credential update.
    let account_id = first.account_id;
    let stored = harness
        .db
        .with_conn(move |conn| identities::get_for_account(conn, account_id))
        .await
        .unwrap();
    assert_eq!(stored[0].password, "ya29.two");
}

#[tokio::test]
async fn duplicate_probed_folder_is_stored_once() {
    let mut probed = gmail_folders();
    probed.push(RemoteFolder::new("Travel", []));
    let harness = Harness::new(ScriptedConnector::new(probed)).await;

    harness
        .provisioner()
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.valid"))
        .await
        .unwrap();

    let (_, folder_count, _) = harness.counts().await;
    assert_eq!(folder_count as usize, gmail_folders().len());
}

#[tokio::test]
async fn failed_identity_insert_rolls_back_everything() {
    let harness = Harness::new(ScriptedConnector::new(gmail_folders())).await;
    harness
        .db
        .with_conn(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_identity BEFORE INSERT ON identities
                 BEGIN SELECT RAISE(ABORT, 'identity rejected'); END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let result = harness
        .provisioner()
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.valid"))
        .await;

    assert!(matches!(result, Err(ProvisionError::StorageFailed(_))));
    assert_eq!(harness.counts().await, (0, 0, 0));

    let pending = harness
        .db
        .with_conn(|conn| operations::pending_folders(conn, operations::SYNC))
        .await
        .unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn ambiguous_update_creates_new_account() {
    let harness = Harness::new(ScriptedConnector::new(gmail_folders())).await;
    harness
        .insert_account("user@gmail.com", AuthType::Password, true)
        .await;
    harness
        .insert_account("user@gmail.com", AuthType::Token, false)
        .await;

    let result = harness
        .provisioner()
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.valid").update_existing(true))
        .await
        .unwrap();

    assert!(result.created);
    assert!(!harness.account(result.account_id).await.primary);
    let (account_count, _, _) = harness.counts().await;
    assert_eq!(account_count, 3);
}

#[tokio::test]
async fn oauth_accounts_are_not_update_targets() {
    let harness = Harness::new(ScriptedConnector::new(gmail_folders())).await;
    let oauth = harness
        .insert_account("user@gmail.com", AuthType::OAuth, true)
        .await;

    let result = harness
        .provisioner()
        .provision(ProvisionRequest::new("user@gmail.com", "ya29.valid").update_existing(true))
        .await
        .unwrap();

    assert!(result.created);
    assert_ne!(result.account_id, oauth);
}

#[tokio::test]
async fn identity_defaults_and_sync_queue() {
    let harness = Harness::new(ScriptedConnector::new(gmail_folders())).await;

    let result = harness
        .provisioner()
        .provision(ProvisionRequest::new("jane.doe@gmail.com", "ya29.valid").with_display_name("  "))
        .await
        .unwrap();

    let account_id = result.account_id;
    let (stored_identities, stored_folders, pending) = harness
        .db
        .with_conn(move |conn| {
            Ok((
                identities::get_for_account(conn, account_id)?,
                folders::get_for_account(conn, account_id)?,
                operations::pending_folders(conn, operations::SYNC)?,
            ))
        })
        .await
        .unwrap();

    let identity = &stored_identities[0];
    assert_eq!(identity.name, "jane.doe");
    assert_eq!(identity.max_message_size, Some(36_700_160));
    assert_eq!(identity.encryption, EncryptionMode::Ssl);

    let mut synchronized: Vec<_> = stored_folders
        .iter()
        .filter(|f| f.synchronize)
        .map(|f| f.id)
        .collect();
    let mut pending = pending;
    synchronized.sort();
    pending.sort();
    assert_eq!(pending, synchronized);
    assert!(stored_folders
        .iter()
        .any(|f| f.name == "Travel" && !f.synchronize));
}
