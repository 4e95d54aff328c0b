//! Point d'entrée CLI pour gpxutil

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gpxutil::{Config, RuntimeContext};
use tracing::{debug, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Éditer des waypoints GPX/YAML
#[derive(Parser)]
#[command(name = "gpxutil")]
#[command(author, version)]
#[command(about = "Edit GPX/YAML waypoints: fix timestamps, localize times, add addresses")]
#[command(long_about = "Reads GPX and YAML waypoint files, updates them and writes them back.\n\nAddresses come from Nominatim through a persistent, rate-limited cache.")]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Geocoding cache file (overrides GPXUTIL_CACHE_FILE)
    #[arg(long, global = true)]
    cache_file: Option<PathBuf>,

    /// Minimum seconds between two geocoding requests
    #[arg(long, global = true, value_name = "SECONDS")]
    rate_limit: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    let config = Config::resolve(cli.config.as_deref(), cli.cache_file, cli.rate_limit)?;
    debug!(config = ?config, "Configuration");

    let context = RuntimeContext::new();
    let result = cli::run(cli.command, &config, &context);

    // Les caches sont enregistrés même si la commande a échoué
    let flushed = context.shutdown();
    if flushed.failed > 0 {
        warn!(failed = flushed.failed, "Some geocoding caches could not be saved");
    }

    result
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
