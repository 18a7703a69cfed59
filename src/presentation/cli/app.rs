use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// cabwatch: temperature alarms for equipment enclosures
///
/// Ingests enclosure readings over HTTP, raises alarms when threshold
/// rules fire, and notifies recipients and live dashboards.
#[derive(Parser, Debug)]
#[command(name = "cabwatch")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Subcommand to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to custom config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the ingest API and alarm pipeline
    #[command(alias = "s")]
    Serve {
        /// Listen address override (e.g. 127.0.0.1:8090)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Show which rules a reading would fire, without storing or notifying
    #[command(alias = "e")]
    Evaluate {
        /// Enclosure id
        #[arg(short, long)]
        enclosure: i64,

        /// Temperature in °C
        #[arg(short, long, allow_negative_numbers = true)]
        temperature: f64,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
