//! Domain layer types for account provisioning.
//!
//! This module contains the entities written during provisioning (accounts,
//! folders, identities) and the provider parameters they are derived from.

mod account;
mod folder;
mod identity;
mod provider;
mod types;

pub use account::{Account, AuthType, EncryptionMode};
pub use folder::{Folder, FolderType, RemoteFolder};
pub use identity::Identity;
pub use provider::{Endpoint, ProviderConfig};
pub use types::{AccountId, FolderId, IdentityId};
