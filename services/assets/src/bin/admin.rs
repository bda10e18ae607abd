//! Asset Service Admin CLI
//!
//! Wallet inspection and manual enrollment against the Fabric CA.

use clap::{Parser, Subcommand};
use colored::Colorize;
use fabric::{
    CertificateAuthority, Config, CredentialStore, FabricCaClient, FileCredentialStore, Identity,
    IdentityProvisioner, ProvisionOutcome, RegistrationRequest, crypto::CertificateInfo,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "assets-admin")]
#[command(about = "Asset Service Identity Administration")]
struct Cli {
    /// Wallet directory
    #[arg(long, env = "WALLET_PATH", default_value = "./wallet")]
    wallet: PathBuf,

    /// Connection profile (JSON)
    #[arg(long, env = "CONNECTION_PROFILE")]
    profile: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List identities in the wallet
    Status,
    /// Enroll admin and register the application user if missing
    Provision,
    /// Enroll a principal with its secret and store it in the wallet
    Enroll {
        #[arg(long)]
        id: String,
        #[arg(long)]
        secret: String,
    },
    /// Register a principal under the admin identity and print its secret
    Register {
        #[arg(long)]
        id: String,
        #[arg(long)]
        affiliation: String,
        #[arg(long, default_value = "client")]
        role: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    config.wallet_path = cli.wallet.clone();
    if let Some(profile) = &cli.profile {
        config.profile_path = profile.clone();
    }

    let store = Arc::new(FileCredentialStore::new(&config.wallet_path)?);

    match cli.command {
        Commands::Status => cmd_status(store.as_ref(), cli.json).await?,
        Commands::Provision => cmd_provision(&config, store, cli.json).await?,
        Commands::Enroll { id, secret } => {
            cmd_enroll(&config, store.as_ref(), &id, &secret, cli.json).await?
        }
        Commands::Register {
            id,
            affiliation,
            role,
        } => {
            let request = RegistrationRequest {
                role,
                ..RegistrationRequest::client(id, affiliation)
            };
            cmd_register(&config, store.as_ref(), request, cli.json).await?
        }
    }

    Ok(())
}

fn ca_client(config: &Config) -> anyhow::Result<FabricCaClient> {
    let profile = config.load_profile()?;
    Ok(FabricCaClient::from_profile(
        &profile,
        &config.ca_name,
        config.ca_timeout,
    )?)
}

async fn cmd_status(store: &FileCredentialStore, json: bool) -> anyhow::Result<()> {
    let mut identities = Vec::new();
    for principal in store.list().await? {
        let identity = store.require(&principal).await?;
        let subject = CertificateInfo::from_pem(identity.certificate())
            .ok()
            .and_then(|info| info.common_name);
        identities.push((identity, subject));
    }

    if json {
        let entries: Vec<_> = identities
            .iter()
            .map(|(identity, subject)| {
                serde_json::json!({
                    "principal": identity.principal(),
                    "mspId": identity.msp_id(),
                    "type": identity.kind(),
                    "subject": subject,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "wallet": store.path().display().to_string(),
                "identities": entries,
            })
        );
        return Ok(());
    }

    println!("{}", "Wallet Status".cyan().bold());
    println!("{}", "=".repeat(60));
    println!("  {}: {}", "Path".cyan(), store.path().display());
    if identities.is_empty() {
        println!("  {}", "No identities enrolled.".red());
        println!("  The asset service provisions admin and app user on startup.");
        return Ok(());
    }
    for (identity, subject) in &identities {
        println!(
            "  {} {} ({}, CN={})",
            "•".green(),
            identity.principal().yellow(),
            identity.msp_id(),
            subject.as_deref().unwrap_or("?")
        );
    }

    Ok(())
}

async fn cmd_provision(
    config: &Config,
    store: Arc<FileCredentialStore>,
    json: bool,
) -> anyhow::Result<()> {
    let ca = Arc::new(ca_client(config)?);
    let report = IdentityProvisioner::new(ca, store, config.provisioning_plan())
        .provision()
        .await?;

    let describe = |outcome: ProvisionOutcome| match outcome {
        ProvisionOutcome::Created => "created",
        ProvisionOutcome::AlreadyPresent => "existing",
    };

    if json {
        println!(
            "{}",
            serde_json::json!({
                config.admin_id.as_str(): describe(report.admin),
                config.app_user_id.as_str(): describe(report.app_user),
            })
        );
    } else {
        println!("{}", "Provisioning complete".green().bold());
        println!("  {}: {}", config.admin_id.cyan(), describe(report.admin));
        println!("  {}: {}", config.app_user_id.cyan(), describe(report.app_user));
    }

    Ok(())
}

async fn cmd_enroll(
    config: &Config,
    store: &FileCredentialStore,
    principal: &str,
    secret: &str,
    json: bool,
) -> anyhow::Result<()> {
    if store.has(principal).await? {
        anyhow::bail!("{} is already in the wallet", principal);
    }

    let ca = ca_client(config)?;
    let enrollment = ca.enroll(principal, secret).await?;
    let identity = Identity::new(principal, enrollment, config.msp_id.as_str());
    store.put(&identity).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"principal": principal, "mspId": identity.msp_id()})
        );
    } else {
        println!(
            "{} {} into {}",
            "Enrolled".green().bold(),
            principal.yellow(),
            store.path().display()
        );
    }

    Ok(())
}

async fn cmd_register(
    config: &Config,
    store: &FileCredentialStore,
    request: RegistrationRequest,
    json: bool,
) -> anyhow::Result<()> {
    let registrar = store.require(&config.admin_id).await?;
    let ca = ca_client(config)?;
    let secret = ca.register(&request, &registrar).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"principal": secret.principal, "secret": secret.secret})
        );
    } else {
        println!(
            "{} {} under {}",
            "Registered".green().bold(),
            secret.principal.yellow(),
            registrar.principal()
        );
        println!("  {}: {}", "Secret".cyan(), secret.secret);
        println!("  Enroll with: assets-admin enroll --id {} --secret <secret>", secret.principal);
    }

    Ok(())
}
