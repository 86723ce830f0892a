//! Folder domain types.
//!
//! Folders are discovered by listing the IMAP server and persisted per
//! account. Their [`FolderType`] drives swipe targets and which folders are
//! synchronized by default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{AccountId, FolderId};

/// A folder persisted for an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier for this folder.
    pub id: FolderId,
    /// Account the folder belongs to.
    pub account_id: AccountId,
    /// Full server-side folder name.
    pub name: String,
    /// Role of the folder.
    pub folder_type: FolderType,
    /// Hierarchy delimiter reported by the server.
    pub delimiter: Option<String>,
    /// Whether the folder is synchronized.
    pub synchronize: bool,
}

/// A folder as reported by a mail server, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    /// Full server-side folder name.
    pub name: String,
    /// Role of the folder.
    pub folder_type: FolderType,
    /// Hierarchy delimiter reported by the server.
    pub delimiter: Option<String>,
    /// Whether the folder should be synchronized once stored.
    pub synchronize: bool,
}

impl RemoteFolder {
    /// Creates a remote folder, deriving its type from special-use
    /// attributes first and its name second.
    pub fn new<'a>(name: impl Into<String>, attributes: impl IntoIterator<Item = &'a str>) -> Self {
        let name = name.into();
        let folder_type = attributes
            .into_iter()
            .find_map(FolderType::from_special_use)
            .unwrap_or_else(|| FolderType::guess(&name));

        Self {
            synchronize: folder_type.synchronized_by_default(),
            name,
            folder_type,
            delimiter: None,
        }
    }

    /// Sets the hierarchy delimiter.
    pub fn with_delimiter(mut self, delimiter: Option<String>) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Role of a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    Inbox,
    Drafts,
    Sent,
    Archive,
    Trash,
    Junk,
    /// Server-managed virtual folder (starred, important, ...).
    System,
    /// Folder created by the user.
    User,
}

impl FolderType {
    /// Maps an RFC 6154 special-use attribute to a folder type.
    ///
    /// `\All` is treated as the archive, which is how Gmail exposes
    /// "All Mail".
    pub fn from_special_use(attribute: &str) -> Option<Self> {
        let attribute = attribute.trim_start_matches('\\');
        match attribute.to_ascii_lowercase().as_str() {
            "drafts" => Some(Self::Drafts),
            "sent" => Some(Self::Sent),
            "archive" | "all" => Some(Self::Archive),
            "trash" => Some(Self::Trash),
            "junk" => Some(Self::Junk),
            "flagged" | "important" => Some(Self::System),
            _ => None,
        }
    }

    /// Guesses a folder type from a folder name.
    pub fn guess(name: &str) -> Self {
        if name.eq_ignore_ascii_case("INBOX") {
            return Self::Inbox;
        }

        let leaf = name.rsplit(['/', '.']).next().unwrap_or(name);
        match leaf.to_lowercase().as_str() {
            "drafts" | "draft" => Self::Drafts,
            "sent" | "sent mail" | "sent items" | "sent messages" => Self::Sent,
            "archive" | "archives" | "all mail" => Self::Archive,
            "trash" | "bin" | "deleted items" | "deleted messages" => Self::Trash,
            "junk" | "spam" | "junk e-mail" | "bulk mail" => Self::Junk,
            _ => Self::User,
        }
    }

    /// Returns whether folders of this type are synchronized when first stored.
    pub fn synchronized_by_default(&self) -> bool {
        matches!(
            self,
            Self::Inbox | Self::Drafts | Self::Sent | Self::Archive | Self::Trash | Self::Junk
        )
    }

    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Drafts => "drafts",
            Self::Sent => "sent",
            Self::Archive => "archive",
            Self::Trash => "trash",
            Self::Junk => "junk",
            Self::System => "system",
            Self::User => "user",
        }
    }
}

impl fmt::Display for FolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbox" => Ok(Self::Inbox),
            "drafts" => Ok(Self::Drafts),
            "sent" => Ok(Self::Sent),
            "archive" => Ok(Self::Archive),
            "trash" => Ok(Self::Trash),
            "junk" => Ok(Self::Junk),
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            other => Err(format!("unknown folder type: {}", other)),
        }
    }
}
