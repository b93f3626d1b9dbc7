use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use truenas_cert_sync::clock::TokioClock;
use truenas_cert_sync::config::{Config, Overrides};
use truenas_cert_sync::error::SyncError;
use truenas_cert_sync::fingerprint::chain_fingerprint;
use truenas_cert_sync::jobs::{JobWaiter, PollPolicy};
use truenas_cert_sync::reconcile::Reconciler;
use truenas_cert_sync::truenas::{ApplianceApi, TrueNasClient};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// TrueNAS API URL including version segment (overrides config)
    #[arg(long, env = "TRUENAS_URL")]
    truenas_url: Option<String>,

    /// TrueNAS API key (overrides config)
    #[arg(long, env = "TRUENAS_API_KEY", hide_env_values = true)]
    truenas_api_key: Option<String>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or replace the certificate so it matches the files on disk
    Sync {
        /// Certificate name on the appliance
        #[arg(long, env = "TRUENAS_CERT_NAME")]
        cert_name: Option<String>,

        /// PEM file with the certificate chain
        #[arg(long, env = "CERT_FULLCHAIN_PATH")]
        cert_fullchain_path: Option<String>,

        /// PEM file with the private key
        #[arg(long, env = "CERT_PRIVATEKEY_PATH")]
        cert_privatekey_path: Option<String>,

        /// Make the certificate the active web UI certificate
        #[arg(long)]
        activate: bool,
    },
    /// List certificates on the appliance
    List,
    /// List recent appliance jobs
    Jobs {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Delete a certificate by id
    Delete {
        id: i64,
        /// Delete even if the certificate is in use
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize logging")?;

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{}", e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn run(args: Args) -> Result<(), SyncError> {
    let command = args.command.unwrap_or(Command::Sync {
        cert_name: None,
        cert_fullchain_path: None,
        cert_privatekey_path: None,
        activate: false,
    });

    let mut overrides = Overrides {
        truenas_url: args.truenas_url,
        truenas_api_key: args.truenas_api_key,
        insecure: args.insecure,
        ..Overrides::default()
    };
    if let Command::Sync {
        cert_name,
        cert_fullchain_path,
        cert_privatekey_path,
        activate,
    } = &command
    {
        overrides.cert_name = cert_name.clone();
        overrides.cert_fullchain_path = cert_fullchain_path.clone();
        overrides.cert_privatekey_path = cert_privatekey_path.clone();
        overrides.activate = *activate;
    }

    let config = Config::load_with_overrides(&args.config, &overrides)?;
    config.validate()?;
    info!("TrueNAS API: {}", config.truenas.url);

    let client = TrueNasClient::new(&config.truenas)?;
    let waiter = JobWaiter::new(TokioClock, PollPolicy::from(&config.jobs));

    match command {
        Command::Sync { .. } => {
            let desired = config.certificate.load_material()?;
            let outcome = Reconciler::new(&client, waiter)
                .with_activation(config.certificate.activation())
                .reconcile(&desired)
                .await?;
            info!(
                "Certificate '{}' {} (id {}{})",
                desired.name,
                outcome.action,
                outcome.certificate_id,
                if outcome.activated { ", activated" } else { "" }
            );
            println!("{} {}", outcome.action, outcome.certificate_id);
        }
        Command::List => {
            for cert in client.list_certificates().await? {
                let fingerprint = cert
                    .certificate
                    .as_deref()
                    .map(chain_fingerprint)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}\t{}",
                    cert.id,
                    cert.name,
                    cert.until.as_deref().unwrap_or("-"),
                    fingerprint
                );
            }
        }
        Command::Jobs { limit, offset } => {
            for job in client.get_jobs(limit, offset).await? {
                println!(
                    "{}\t{}\t{}",
                    job.id,
                    job.state,
                    job.method.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Delete { id, force } => {
            let job_id = client.delete_certificate(id, force).await?;
            waiter.await_job(&client, job_id).await?;
            info!("Certificate {} deleted (job {})", id, job_id);
        }
    }

    Ok(())
}
