//! fmr entry point.
//!
//! Thin binary: parse arguments, load the environment context, connect the
//! mirror, and dispatch into fmr-runtime. Any error propagating here exits
//! non-zero; partial mirror writes are never retried in-process.

use anyhow::Result;
use clap::{Parser, Subcommand};
use fmr_config::Config;
use fmr_db::Mirror;
use fmr_forge::{resolve_token, ForgeClient};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "fmr")]
#[command(about = "Reconciles the forge event mirror against live API state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Janitor sweep then reconcile, honouring the skip flags
    Run,
    /// Reconcile only: fetch, diff, emit synthetic events
    Reconcile,
    /// Janitor only: delete redundant synthetic events
    Janitor,
    /// Mirror database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Connectivity and schema probe
    Status,
    /// Apply the embedded mirror schema
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;
    if cfg.debug >= 2 {
        info!("environment context: {cfg:?}");
    }

    let mirror = Mirror::connect(&cfg.pg.dsn(), cfg.skip_persist).await?;

    match cli.cmd {
        Commands::Run => {
            let forge = forge_client(&cfg)?;
            fmr_runtime::run(&cfg, &mirror, forge).await?;
        }
        Commands::Reconcile => {
            let forge = forge_client(&cfg)?;
            fmr_runtime::reconcile_run(&cfg, &mirror, forge).await?;
        }
        Commands::Janitor => {
            fmr_runtime::janitor_run(&cfg, &mirror).await?;
        }
        Commands::Db { cmd } => match cmd {
            DbCmd::Status => {
                let status = mirror.status().await?;
                println!(
                    "db_ok={} has_events_table={}",
                    status.ok, status.has_events_table
                );
            }
            DbCmd::Migrate => {
                mirror.migrate().await?;
                println!("migrations_applied=true");
            }
        },
    }

    Ok(())
}

fn forge_client(cfg: &Config) -> Result<Arc<ForgeClient>> {
    let token = resolve_token(&cfg.oauth)?;
    if token.is_none() {
        info!("using anonymous forge access");
    }
    Ok(Arc::new(ForgeClient::new(cfg.api_base.clone(), token)))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
