//! Business services layer.
//!
//! This module contains the services that orchestrate provisioning,
//! coordinating between providers, storage, and domain types.
//!
//! # Architecture
//!
//! ```text
//! CLI / embedding host
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Infrastructure (Providers, Storage)
//! ```
//!
//! # Services Overview
//!
//! - [`AccountProvisioner`]: Validates, probes and stores a new or refreshed account
//! - [`spawn_provision`]: Runs a provisioning on a background task
//! - [`SyncSignal`]: Notifies the synchronization subsystem after a commit
//! - [`Connectivity`]: Reports whether the network is usable

mod connectivity;
mod provisioner;
mod sync_signal;
mod task;

pub use connectivity::{AlwaysOnline, Connectivity, TcpConnectivity};
pub use provisioner::{
    is_valid_email, AccountProvisioner, ProvisionError, ProvisionRequest, ProvisionResult,
    ProvisioningResult, DEFAULT_PROVIDER_DOMAIN,
};
pub use sync_signal::{ChannelSyncSignal, SyncCommand, SyncSignal};
pub use task::spawn_provision;
