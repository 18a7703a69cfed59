use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use cabwatch::application::config::AppConfig;
use cabwatch::infrastructure::notifications::create_transport;
use cabwatch::infrastructure::persistence::sqlite_store::SqliteStore;
use cabwatch::presentation::cli::app::{Cli, Commands};
use cabwatch::presentation::cli::commands::evaluate::run_evaluate;
use cabwatch::presentation::cli::commands::serve::{build_pipeline, run_serve};

fn print_banner(bind_addr: &str) {
    println!("{}", "━".repeat(40).cyan());
    println!("{}", "  cabwatch: enclosure alarms".bold().cyan());
    println!("  listening on {}", bind_addr.bold());
    println!("{}", "━".repeat(40).cyan());
}

fn setup_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn open_store(config: &AppConfig) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::new(&config.database.path)
        .with_context(|| format!("Failed to open database {}", config.database.path))?;
    if let Some(admin) = config.notifications.admin_email.as_deref() {
        match store.ensure_recipient(admin) {
            Ok(recipient) => tracing::info!(recipient = %recipient.address, "admin recipient ready"),
            Err(e) => tracing::warn!("Failed to seed admin recipient: {e}"),
        }
    }
    Ok(store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    println!("\nStopping cabwatch...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let config = if let Some(ref path) = cli.config {
        AppConfig::load_from(path)?
    } else {
        AppConfig::load()?
    };

    // Manual DI: main.rs is the only place that knows concrete types.
    // Order: store → transport → registry/dispatcher/worker/ingest → router.
    let store = Arc::new(open_store(&config)?);

    match cli.command {
        Some(Commands::Evaluate {
            enclosure,
            temperature,
            json,
        }) => {
            run_evaluate(store.as_ref(), enclosure, temperature, json)?;
        }
        Some(Commands::Serve { bind }) => {
            serve(&config, store, bind).await?;
        }
        None => {
            serve(&config, store, None).await?;
        }
    }

    Ok(())
}

async fn serve(
    config: &AppConfig,
    store: Arc<SqliteStore>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let transport = create_transport(&config.notifications)?;
    let pipeline = build_pipeline(store, transport, config);

    let bind_addr = bind.unwrap_or_else(|| config.server.bind_addr.clone());
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    print_banner(&bind_addr);

    let stats = run_serve(listener, pipeline, shutdown_signal()).await?;
    tracing::info!(
        samples = stats.samples_evaluated,
        alarms = stats.alarms_raised,
        "cabwatch stopped"
    );
    Ok(())
}
