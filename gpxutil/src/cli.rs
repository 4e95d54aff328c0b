//! Définition et implémentation des commandes CLI
//!
//! - `i`: lecture de fichiers GPX/YAML → mises à jour → listing → écriture
//! - `q`: adresse d'un point
//! - `cache`: état du cache de géocodage

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{debug, info, warn};

use gpxutil::config::Config;
use gpxutil::context::RuntimeContext;
use gpxutil::geocode::cache::{file_stats, inspect, remove_cache_file};
use gpxutil::geocode::nominatim::CALL_SITE;
use gpxutil::geocode::{GeocodeCache, NominatimGeocoder, RateLimited, ReverseGeocoder};
use gpxutil::pipeline::{
    format_waypoints, process_waypoints, query_address, read_input_files, save_waypoints, DeleteOption,
    Params, SortBy, UpdateOption,
};
use gpxutil::report::RunReport;
use gpxutil::timezone::TzfLookup;

#[derive(Subcommand)]
pub enum Commands {
    /// Read waypoint files, update them, print them and optionally save them
    #[command(name = "i")]
    Input(InputArgs),

    /// Print the address of a point
    #[command(name = "q", allow_negative_numbers = true)]
    Query {
        /// Latitude in decimal degrees
        latitude: f64,

        /// Longitude in decimal degrees
        longitude: f64,
    },

    /// Inspect or clear the geocoding cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args)]
pub struct InputArgs {
    /// GPX or YAML files (.yaml/.yml read as YAML, anything else as GPX)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Fields to update: time, tz, addr (comma separated)
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub update: Vec<UpdateOption>,

    /// Fields to delete while reading: sym, type, extension (comma separated)
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub delete: Vec<DeleteOption>,

    /// Source written to waypoints that have none
    #[arg(short = 's', long = "src")]
    pub waypoint_src: Option<String>,

    /// Sort key
    #[arg(short = 'b', long = "sort-by", value_enum)]
    pub sort_by: Option<SortBy>,

    /// Output file (.gpx or .yaml)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Drop address fields Garmin devices reject
    #[arg(long)]
    pub garmin: bool,

    /// Save the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy)]
pub enum CacheAction {
    /// Entry count, version and size of the cache file
    Stats,
    /// List cache entries
    Inspect,
    /// Delete the cache file
    Clear,
}

/// Exécute une commande
pub fn run(command: Commands, config: &Config, context: &RuntimeContext) -> Result<()> {
    match command {
        Commands::Input(args) => cmd_input(&args, config, context),
        Commands::Query { latitude, longitude } => cmd_query(latitude, longitude, config, context),
        Commands::Cache { action } => cmd_cache(action, config),
    }
}

/// Géocodeur complet: Nominatim, limité en débit, derrière le cache persistant
fn build_geocoder(
    config: &Config,
    context: &RuntimeContext,
) -> Result<GeocodeCache<RateLimited<NominatimGeocoder>>> {
    let provider = NominatimGeocoder::new(&config.nominatim_url, &config.user_agent, &config.language)
        .context("Failed to create Nominatim client")?;
    let limited = context.rate_limited(CALL_SITE, config.rate_limit_window(), provider);
    Ok(context.persistent_cache(&config.cache_file, limited))
}

pub fn cmd_input(args: &InputArgs, config: &Config, context: &RuntimeContext) -> Result<()> {
    let started = Instant::now();
    let mut report = RunReport::new();

    let result = run_input(args, config, context, &mut report);

    report.set_duration(started.elapsed());
    if let Err(e) = &result {
        report.record_failure(format!("{:#}", e));
    }
    report.finalize();
    report.display();
    info!(summary = %report.summary(), "Run finished");

    if let Some(path) = &args.report {
        match report.save_to_file(path) {
            Ok(()) => info!(path = %path.display(), "Report saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save report"),
        }
    }

    result
}

fn run_input(args: &InputArgs, config: &Config, context: &RuntimeContext, report: &mut RunReport) -> Result<()> {
    let mut params = Params::new(&args.update, &args.delete);
    params.waypoint_src = args.waypoint_src.clone();
    params.sort_by = args.sort_by;
    params.garmin = args.garmin;
    debug!(params = ?params, "Input parameters");

    let mut waypoints = read_input_files(&args.files, &params, report)?;
    if waypoints.is_empty() {
        println!("No waypoints found.  Exiting.");
        return Ok(());
    }

    // Client HTTP et cache seulement si une adresse est demandée
    let geocoder = if params.address {
        Some(build_geocoder(config, context)?)
    } else {
        None
    };
    process_waypoints(
        &mut waypoints,
        &params,
        geocoder.as_ref().map(|g| g as &dyn ReverseGeocoder),
        &TzfLookup,
        report,
    )?;

    if let Some(geocoder) = &geocoder {
        let stats = geocoder.stats();
        debug!(entries = stats.entries, updated = stats.updated, "Geocoding cache");
    }

    for line in format_waypoints(&waypoints) {
        println!("{}", line);
    }

    if let Some(output) = &args.output {
        save_waypoints(&waypoints, output, report)?;
    }

    Ok(())
}

pub fn cmd_query(latitude: f64, longitude: f64, config: &Config, context: &RuntimeContext) -> Result<()> {
    info!(latitude, longitude, "Address query");

    let geocoder = build_geocoder(config, context)?;
    let address = query_address(latitude, longitude, &geocoder)?;

    println!("{}", address.full_address.as_deref().unwrap_or(""));
    println!("{}", address);
    Ok(())
}

pub fn cmd_cache(action: CacheAction, config: &Config) -> Result<()> {
    let path = &config.cache_file;

    match action {
        CacheAction::Stats => {
            let stats = file_stats(path);
            println!("Cache file: {}", path.display());
            println!("Exists: {}", stats.exists);
            if let Some(error) = &stats.error {
                println!("Error: {}", error);
            }
            if stats.exists {
                println!("Entries: {}", stats.entries);
                println!("Version: {}", stats.cache_version.as_deref().unwrap_or("unknown"));
                println!("Format: {}", stats.format);
                println!("Last updated: {}", stats.last_updated.as_deref().unwrap_or("unknown"));
                if let Some(size) = stats.file_size {
                    println!("Size: {} bytes", size);
                }
            }
        }
        CacheAction::Inspect => {
            let Some(inspection) = inspect(path).context("Failed to inspect cache")? else {
                println!("No cache file at {}", path.display());
                return Ok(());
            };

            println!("=== Cache {} ===", path.display());
            println!("Version: {}", inspection.cache_version.as_deref().unwrap_or("unknown"));
            println!("Format: {}", inspection.format.as_deref().unwrap_or("unknown"));
            println!("Created by: {}", inspection.created_by.as_deref().unwrap_or("unknown"));
            println!("Last updated: {}", inspection.last_updated.as_deref().unwrap_or("unknown"));
            println!("Total entries: {}", inspection.total_entries);
            for entry in &inspection.entries {
                println!("  {}: {}", entry.key, entry.description);
            }
        }
        CacheAction::Clear => {
            if remove_cache_file(path).context("Failed to clear cache")? {
                println!("Removed {}", path.display());
            } else {
                println!("No cache file at {}", path.display());
            }
        }
    }

    Ok(())
}
