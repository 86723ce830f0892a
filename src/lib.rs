//! heap-setup - Mail account provisioning for The Heap
//!
//! This crate turns a verified address and an OAuth access token into a fully
//! configured local mail account: it probes the provider's IMAP and SMTP
//! servers, then stores the account, its folders and its sending identity in
//! a single transaction.

pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;

pub use services::{AccountProvisioner, ProvisionError, ProvisionRequest, ProvisionResult};
