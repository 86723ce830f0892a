//! Background provisioning.
//!
//! A caller such as a UI may go away while the provider is being probed.
//! The provisioning still runs to completion; only the delivery of its
//! result is skipped.

use std::sync::Arc;

use tokio::sync::oneshot;

use super::{AccountProvisioner, ProvisionRequest, ProvisionResult, ProvisioningResult};

/// Runs `request` on a tokio task and returns a receiver for the outcome.
///
/// Dropping the receiver does not cancel the work.
pub fn spawn_provision(
    provisioner: Arc<AccountProvisioner>,
    request: ProvisionRequest,
) -> oneshot::Receiver<ProvisioningResult<ProvisionResult>> {
    let (tx, rx) = oneshot::channel();
    let email = request.email.clone();

    tokio::spawn(async move {
        let result = provisioner.provision(request).await;
        if let Err(e) = &result {
            tracing::warn!(email = %email, error = %e.user_message(), "Provisioning failed");
        }
        if tx.send(result).is_err() {
            tracing::debug!(email = %email, "Provisioning result dropped, receiver gone");
        }
    });

    rx
}
