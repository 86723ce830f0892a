//! heap-setup - Command line entry point for account provisioning

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use heap_setup::config::Settings;
use heap_setup::providers::{
    acquire_token, BuiltinDirectory, NetworkConnector, OAuthState, RefreshCredentials,
    RefreshTokenSource,
};
use heap_setup::services::{
    spawn_provision, AccountProvisioner, ChannelSyncSignal, ProvisionRequest, TcpConnectivity,
};
use heap_setup::storage::{Database, KeychainAccess};
use heap_setup::ProvisionError;

/// Provision a Gmail account for The Heap.
#[derive(Debug, Parser)]
#[command(name = "heap-setup", version, about)]
struct Cli {
    /// Account email address.
    #[arg(long)]
    email: String,

    /// OAuth access token.
    #[arg(long, conflicts_with = "refresh_token")]
    token: Option<String>,

    /// OAuth refresh token, exchanged for an access token and remembered in
    /// the OS keychain.
    #[arg(long, requires_all = ["client_id", "client_secret"])]
    refresh_token: Option<String>,

    /// OAuth client ID used with --refresh-token.
    #[arg(long)]
    client_id: Option<String>,

    /// OAuth client secret used with --refresh-token.
    #[arg(long)]
    client_secret: Option<String>,

    /// Name shown on outgoing mail. Defaults to the address's local part.
    #[arg(long)]
    name: Option<String>,

    /// Refresh the credential of an existing account instead of adding one.
    #[arg(long)]
    update: bool,

    /// Account database path.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Settings file path.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ProvisionError>() {
            Some(provision) => {
                eprintln!("{}", provision.user_message());
                std::process::exit(if provision.is_validation() { 2 } else { 1 });
            }
            None => {
                tracing::error!("Setup error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    let database_path = match &cli.database {
        Some(path) => path.clone(),
        None => settings.storage.database_path()?,
    };
    let database = Database::open(&database_path)
        .await
        .with_context(|| format!("failed to open {}", database_path.display()))?;

    let secret = obtain_secret(&cli, &settings).await?;

    let provisioner = AccountProvisioner::new(
        database,
        Arc::new(BuiltinDirectory::with_configured(settings.providers.clone())),
        Arc::new(NetworkConnector::new(settings.network.timeout())),
        Arc::new(TcpConnectivity::new(
            settings.network.connectivity_address.clone(),
            settings.network.connectivity_timeout(),
        )),
        Arc::new(ChannelSyncSignal::default()),
    )
    .with_provider_domain(settings.provision.provider_domain.clone());

    let mut request = ProvisionRequest::new(&cli.email, secret).update_existing(cli.update);
    if let Some(name) = &cli.name {
        request = request.with_display_name(name);
    }

    let result = spawn_provision(Arc::new(provisioner), request)
        .await
        .context("provisioning task ended unexpectedly")??;

    if result.created {
        println!("Added account {} ({})", result.account_id, cli.email);
    } else {
        println!("Updated account {} ({})", result.account_id, cli.email);
    }
    Ok(())
}

/// Returns the credential to store: an explicit access token, or one minted
/// from refresh credentials given on the command line or kept in the keychain.
async fn obtain_secret(cli: &Cli, settings: &Settings) -> anyhow::Result<String> {
    if let Some(token) = &cli.token {
        // A blank token is passed through so provisioning reports it.
        if token.trim().is_empty() {
            return Ok(String::new());
        }
        return OAuthState::new(token.as_str())
            .to_secret()
            .context("failed to encode the access token");
    }

    let keychain = KeychainAccess::new();
    let credentials = match (&cli.refresh_token, &cli.client_id, &cli.client_secret) {
        (Some(refresh_token), Some(client_id), Some(client_secret)) => {
            let credentials = RefreshCredentials {
                client_id: client_id.clone(),
                client_secret: client_secret.clone(),
                refresh_token: refresh_token.clone(),
            };
            keychain
                .store_refresh_credentials(&cli.email, &credentials)
                .await
                .context("failed to remember refresh credentials")?;
            credentials
        }
        _ => match keychain
            .refresh_credentials(&cli.email)
            .await
            .context("failed to read the keychain")?
        {
            Some(credentials) => credentials,
            None => bail!(
                "no credential for {}: pass --token or --refresh-token",
                cli.email
            ),
        },
    };

    let source = RefreshTokenSource::new(credentials);
    let state = acquire_token(&source, &cli.email, settings.provision.token_timeout())
        .await
        .context("failed to obtain an access token")?;
    state
        .to_secret()
        .context("failed to encode the access token")
}
