//! Notifications to the synchronization subsystem.
//!
//! Provisioning never synchronizes anything itself. After a successful
//! commit it asks the sync side to either re-evaluate which accounts need
//! work or to reload one specific account.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::AccountId;

/// A request sent to the synchronization subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncCommand {
    /// Re-evaluate which accounts should be synchronized.
    Evaluate {
        /// Why the evaluation was requested.
        reason: String,
    },
    /// Reload the given account.
    Reload {
        /// Account to reload.
        account_id: AccountId,
        /// Whether to reload right away instead of at the next cycle.
        immediate: bool,
        /// Why the reload was requested.
        reason: String,
    },
}

/// Receiver of sync requests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncSignal: Send + Sync {
    /// Asks for a re-evaluation of all accounts.
    async fn evaluate(&self, reason: &str);

    /// Asks for a reload of one account.
    async fn reload(&self, account_id: AccountId, immediate: bool, reason: &str);
}

/// [`SyncSignal`] that publishes commands on a broadcast channel.
#[derive(Debug, Clone)]
pub struct ChannelSyncSignal {
    sender: broadcast::Sender<SyncCommand>,
}

impl ChannelSyncSignal {
    /// Creates a signal whose channel buffers up to `capacity` commands.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to published commands.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncCommand> {
        self.sender.subscribe()
    }

    fn publish(&self, command: SyncCommand) {
        // No subscribers is fine; nobody is listening yet.
        if self.sender.send(command).is_err() {
            tracing::debug!("Sync command dropped, no subscribers");
        }
    }
}

impl Default for ChannelSyncSignal {
    fn default() -> Self {
        Self::new(16)
    }
}

#[async_trait]
impl SyncSignal for ChannelSyncSignal {
    async fn evaluate(&self, reason: &str) {
        tracing::debug!(%reason, "Requesting sync evaluation");
        self.publish(SyncCommand::Evaluate {
            reason: reason.to_string(),
        });
    }

    async fn reload(&self, account_id: AccountId, immediate: bool, reason: &str) {
        tracing::debug!(%account_id, immediate, %reason, "Requesting account reload");
        self.publish(SyncCommand::Reload {
            account_id,
            immediate,
            reason: reason.to_string(),
        });
    }
}
