//! Account provisioning.
//!
//! Turns a verified address and an access credential into a stored account:
//! validate, probe the provider's IMAP and SMTP endpoints, then create or
//! update the account, its folders and its identity in one transaction.

use std::error::Error as _;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use regex::Regex;
use thiserror::Error;

use super::{Connectivity, SyncSignal};
use crate::domain::{
    Account, AccountId, AuthType, FolderId, FolderType, Identity, IdentityId, ProviderConfig,
    RemoteFolder,
};
use crate::providers::{
    Credentials, Discovery, MailConnector, MailSession, Protocol, ProviderDirectory, ProviderError,
};
use crate::storage::queries::{accounts, folders, identities, operations};
use crate::storage::{Database, DatabaseError};

/// Domain whose provider new accounts are set up against.
pub const DEFAULT_PROVIDER_DOMAIN: &str = "gmail.com";

/// Reason passed to the sync subsystem after provisioning.
const SYNC_REASON: &str = "provision";

/// Auth types an existing account may have to be eligible for an update.
const UPDATABLE_AUTH_TYPES: [AuthType; 2] = [AuthType::Token, AuthType::Password];

/// Errors that can occur while provisioning an account.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The address is not a well-formed email address.
    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    /// No credential was supplied.
    #[error("no credential supplied")]
    MissingCredential,

    /// There is no active network connection.
    #[error("no internet connection")]
    NoConnectivity,

    /// The provider could not be resolved or its servers rejected us.
    #[error("could not verify the account with the provider")]
    ProbeFailed(#[source] ProviderError),

    /// The account could not be saved. Nothing was written.
    #[error("could not save the account")]
    StorageFailed(#[source] DatabaseError),
}

impl ProvisionError {
    /// Returns true for errors raised before any network or storage work.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail(_) | Self::MissingCredential | Self::NoConnectivity
        )
    }

    /// Renders the error together with its causes for display.
    pub fn user_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}

/// Result type for provisioning.
pub type ProvisioningResult<T> = std::result::Result<T, ProvisionError>;

/// Input to [`AccountProvisioner::provision`].
#[derive(Clone)]
pub struct ProvisionRequest {
    /// Address of the account, also the login user.
    pub email: String,
    /// Access credential, usually a serialized
    /// [`OAuthState`](crate::providers::OAuthState).
    pub secret: String,
    /// Name for the sending identity. Defaults to the address's local part.
    pub display_name: Option<String>,
    /// Whether to refresh the credential of a matching existing account
    /// instead of creating a new one.
    pub update_existing: bool,
}

impl ProvisionRequest {
    /// Creates a request for a new account.
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
            display_name: None,
            update_existing: false,
        }
    }

    /// Sets the identity name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets whether a matching existing account should be updated.
    pub fn update_existing(mut self, update: bool) -> Self {
        self.update_existing = update;
        self
    }
}

impl std::fmt::Debug for ProvisionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionRequest")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("update_existing", &self.update_existing)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionResult {
    /// The created or updated account.
    pub account_id: AccountId,
    /// True if a new account was created, false if one was updated.
    pub created: bool,
}

/// What the provider told us about the account.
#[derive(Debug)]
struct Probe {
    provider: ProviderConfig,
    folders: Vec<RemoteFolder>,
    max_message_size: Option<u64>,
}

/// Returns true if `email` is a well-formed email address.
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();

    EMAIL
        .get_or_init(|| {
            Regex::new(
                r"^[a-zA-Z0-9+._%\-]{1,256}@[a-zA-Z0-9][a-zA-Z0-9\-]{0,64}(\.[a-zA-Z0-9][a-zA-Z0-9\-]{0,25})+$",
            )
            .ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(email))
}

/// Returns the part of `email` before the `@`.
fn local_part(email: &str) -> &str {
    email.split_once('@').map_or(email, |(local, _)| local)
}

/// Provisions mail accounts.
pub struct AccountProvisioner {
    database: Database,
    directory: Arc<dyn ProviderDirectory>,
    connector: Arc<dyn MailConnector>,
    connectivity: Arc<dyn Connectivity>,
    sync: Arc<dyn SyncSignal>,
    provider_domain: String,
}

impl AccountProvisioner {
    /// Creates a provisioner for the default provider domain.
    pub fn new(
        database: Database,
        directory: Arc<dyn ProviderDirectory>,
        connector: Arc<dyn MailConnector>,
        connectivity: Arc<dyn Connectivity>,
        sync: Arc<dyn SyncSignal>,
    ) -> Self {
        Self {
            database,
            directory,
            connector,
            connectivity,
            sync,
            provider_domain: DEFAULT_PROVIDER_DOMAIN.to_string(),
        }
    }

    /// Sets the domain whose provider accounts are set up against.
    pub fn with_provider_domain(mut self, domain: impl Into<String>) -> Self {
        self.provider_domain = domain.into();
        self
    }

    /// Provisions an account.
    ///
    /// Inputs are validated before any I/O. The provider is probed before
    /// anything is written, and all writes happen in one transaction, so a
    /// failure at any step leaves storage untouched.
    pub async fn provision(&self, request: ProvisionRequest) -> ProvisioningResult<ProvisionResult> {
        self.validate(&request).await?;

        tracing::info!(email = %request.email, update = request.update_existing, "Provisioning account");

        let probe = self.probe(&request).await.map_err(|e| {
            tracing::warn!(email = %request.email, error = %e, "Provider probe failed");
            ProvisionError::ProbeFailed(e)
        })?;

        let email = request.email.clone();
        let result = self
            .database
            .transaction(move |tx| persist(tx, request, probe))
            .await
            .map_err(|e| {
                tracing::error!(email = %email, error = %e, "Failed to save account");
                ProvisionError::StorageFailed(e)
            })?;

        if result.created {
            self.sync.evaluate(SYNC_REASON).await;
        } else {
            self.sync.reload(result.account_id, true, SYNC_REASON).await;
        }

        tracing::info!(
            account_id = %result.account_id,
            created = result.created,
            "Account provisioned"
        );
        Ok(result)
    }

    async fn validate(&self, request: &ProvisionRequest) -> ProvisioningResult<()> {
        if !is_valid_email(&request.email) {
            return Err(ProvisionError::InvalidEmail(request.email.clone()));
        }

        if request.secret.trim().is_empty() {
            return Err(ProvisionError::MissingCredential);
        }

        if !self.connectivity.is_connected().await {
            return Err(ProvisionError::NoConnectivity);
        }

        Ok(())
    }

    async fn probe(&self, request: &ProvisionRequest) -> Result<Probe, ProviderError> {
        let provider = self
            .directory
            .resolve(&self.provider_domain, Discovery::All)?;
        let credentials = Credentials::new(&request.email, &request.secret, AuthType::Token);

        let mut session = self
            .connector
            .connect(Protocol::Imap, &provider.imap, &credentials)
            .await?;
        let folders = session.list_folders().await;
        close_session(session, Protocol::Imap).await;
        let folders = folders?;

        tracing::debug!(count = folders.len(), provider = %provider.name, "Probed folders");

        let mut session = self
            .connector
            .connect(Protocol::Smtp, &provider.smtp, &credentials)
            .await?;
        let max_message_size = session.max_message_size().await;
        close_session(session, Protocol::Smtp).await;
        let max_message_size = max_message_size?;

        Ok(Probe {
            provider,
            folders,
            max_message_size,
        })
    }
}

/// Closes a probe session. The probe already has its answer, so a failed
/// close is only logged.
async fn close_session(session: Box<dyn MailSession>, protocol: Protocol) {
    if let Err(e) = session.close().await {
        tracing::warn!(%protocol, error = %e, "Failed to close session");
    }
}

fn persist(
    tx: &rusqlite::Transaction<'_>,
    request: ProvisionRequest,
    probe: Probe,
) -> crate::storage::Result<ProvisionResult> {
    if request.update_existing {
        let matches = accounts::find_by_user(tx, &request.email, &UPDATABLE_AUTH_TYPES)?;
        if let [existing] = matches.as_slice() {
            update_account(tx, existing, &request.secret)?;
            return Ok(ProvisionResult {
                account_id: existing.id,
                created: false,
            });
        }
        tracing::warn!(
            email = %request.email,
            matches = matches.len(),
            "No single account to update, creating a new one"
        );
    }

    let account_id = create_account(tx, request, probe)?;
    Ok(ProvisionResult {
        account_id,
        created: true,
    })
}

fn update_account(
    tx: &rusqlite::Transaction<'_>,
    existing: &Account,
    secret: &str,
) -> crate::storage::Result<()> {
    tracing::info!(account_id = %existing.id, name = %existing.display_name, "Updating account");

    accounts::set_synchronize(tx, existing.id, true)?;
    accounts::set_password(tx, existing.id, secret, AuthType::Token)?;
    let updated = identities::set_password(
        tx,
        existing.id,
        &existing.user,
        secret,
        existing.auth_type,
        AuthType::Token,
    )?;

    tracing::debug!(account_id = %existing.id, identities = updated, "Updated identity credentials");
    Ok(())
}

fn create_account(
    tx: &rusqlite::Transaction<'_>,
    request: ProvisionRequest,
    probe: Probe,
) -> crate::storage::Result<AccountId> {
    let Probe {
        provider,
        folders: remote_folders,
        max_message_size,
    } = probe;
    let local = local_part(&request.email).to_string();
    let now = Utc::now();

    let mut account = Account {
        id: AccountId(0),
        host: provider.imap.host.clone(),
        port: provider.imap.port,
        encryption: provider.imap.encryption(),
        auth_type: AuthType::Token,
        user: request.email.clone(),
        password: request.secret.clone(),
        display_name: format!("{}/{}", provider.name, local),
        synchronize: true,
        primary: accounts::get_primary(tx)?.is_none(),
        created_at: now,
        last_connected_at: Some(now),
        swipe_left: None,
        swipe_right: None,
    };
    account.id = accounts::insert(tx, &account)?;
    tracing::info!(account_id = %account.id, name = %account.display_name, primary = account.primary, "Created account");

    // Ids of the folders inserted now, parallel to `remote_folders`.
    let mut inserted: Vec<Option<FolderId>> = Vec::with_capacity(remote_folders.len());
    for folder in &remote_folders {
        if folders::get_by_name(tx, account.id, &folder.name)?.is_some() {
            inserted.push(None);
            continue;
        }

        let folder_id = folders::insert(tx, account.id, folder)?;
        tracing::debug!(folder = %folder.name, folder_type = %folder.folder_type, "Created folder");
        if folder.synchronize {
            operations::queue_sync(tx, account.id, folder_id)?;
        }
        inserted.push(Some(folder_id));
    }

    for (folder, folder_id) in remote_folders.iter().zip(&inserted) {
        match folder.folder_type {
            FolderType::Trash => account.swipe_left = *folder_id,
            FolderType::Archive => account.swipe_right = *folder_id,
            _ => {}
        }
    }
    accounts::set_swipe_folders(tx, account.id, account.swipe_left, account.swipe_right)?;

    let name = request
        .display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or(local);

    let identity = Identity {
        id: IdentityId(0),
        account_id: account.id,
        name,
        email: request.email.clone(),
        host: provider.smtp.host.clone(),
        port: provider.smtp.port,
        encryption: provider.smtp.encryption(),
        auth_type: AuthType::Token,
        user: request.email,
        password: request.secret,
        synchronize: true,
        primary: true,
        max_message_size,
    };
    let identity_id = identities::insert(tx, &identity)?;
    tracing::info!(identity_id = %identity_id, name = %identity.name, email = %identity.email, "Created identity");

    Ok(account.id)
}
