//! Pipeline de traitement des waypoints
//!
//! lecture des fichiers → corrections par waypoint → tri → affichage → écriture
//!
//! Par waypoint, dans cet ordre: horodatage de la description (`time`),
//! passage à l'heure locale (`tz`), recherche d'adresse (`addr`), puis
//! nettoyage Garmin. Un échec de recherche d'adresse interrompt tout le run.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use rayon::prelude::*;
use tracing::{debug, error, warn};
use waypoint::timefix::fix_description_timestamp;
use waypoint::{Address, Format, Waypoint};

use crate::geocode::ReverseGeocoder;
use crate::report::RunReport;
use crate::timezone::{localize, TimezoneLookup};

/// Champs à mettre à jour (`-u time,tz,addr`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum UpdateOption {
    /// Réécrire l'horodatage en tête de description
    Time,
    /// Convertir l'heure dans le fuseau du point
    Tz,
    /// Rechercher l'adresse du point
    Addr,
}

/// Champs à supprimer à la lecture (`-d sym,type,extension`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DeleteOption {
    Sym,
    Type,
    Extension,
}

/// Clé de tri (`-b`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortBy {
    Name,
    Time,
    Desc,
    Cmt,
}

/// Paramètres d'une commande `i`
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub fix_time: bool,
    pub localize: bool,
    pub address: bool,
    pub no_sym: bool,
    pub no_type: bool,
    pub no_extension: bool,
    /// Valeur de `src` pour les waypoints qui n'en ont pas
    pub waypoint_src: Option<String>,
    pub sort_by: Option<SortBy>,
    /// Sortie compatible Garmin
    pub garmin: bool,
}

impl Params {
    pub fn new(update: &[UpdateOption], delete: &[DeleteOption]) -> Self {
        Self {
            fix_time: update.contains(&UpdateOption::Time),
            localize: update.contains(&UpdateOption::Tz),
            address: update.contains(&UpdateOption::Addr),
            no_sym: delete.contains(&DeleteOption::Sym),
            no_type: delete.contains(&DeleteOption::Type),
            no_extension: delete.contains(&DeleteOption::Extension),
            ..Default::default()
        }
    }

    /// Suppressions et `src` par défaut, appliqués à la lecture
    fn apply_read_options(&self, wpt: &mut Waypoint) {
        if self.no_sym {
            wpt.strip_symbol();
        }
        if self.no_type {
            wpt.strip_kind();
        }
        if self.no_extension {
            wpt.strip_extensions();
        }
        if wpt.source.as_deref().map_or(true, str::is_empty) {
            if let Some(src) = &self.waypoint_src {
                wpt.source = Some(src.clone());
            }
        }
    }
}

/// Lit les fichiers d'entrée (en parallèle) et concatène leurs waypoints dans l'ordre
pub fn read_input_files(paths: &[PathBuf], params: &Params, report: &mut RunReport) -> Result<Vec<Waypoint>> {
    println!("Reading {} files...", paths.len());

    let parsed = paths
        .par_iter()
        .map(|path| -> Result<(&PathBuf, Vec<Waypoint>)> {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let waypoints = Format::for_input(path)
                .read(&text)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            Ok((path, waypoints))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut all = Vec::new();
    for (path, mut waypoints) in parsed {
        debug!(file = %path.display(), count = waypoints.len(), "File read");
        report.record_file(waypoints.len());
        for wpt in &mut waypoints {
            params.apply_read_options(wpt);
        }
        all.extend(waypoints);
    }

    println!("DONE.  {} files read.", paths.len());
    Ok(all)
}

/// Applique les mises à jour demandées à chaque waypoint, puis trie.
///
/// `geocoder` n'est requis que si `params.address` est demandé.
pub fn process_waypoints(
    waypoints: &mut [Waypoint],
    params: &Params,
    geocoder: Option<&dyn ReverseGeocoder>,
    timezones: &dyn TimezoneLookup,
    report: &mut RunReport,
) -> Result<()> {
    if params.address && geocoder.is_none() {
        bail!("Address lookup requested without a geocoder");
    }
    let total = waypoints.len();

    for (index, wpt) in waypoints.iter_mut().enumerate() {
        println!("[{}/{}] {}", index + 1, total, wpt.display_name());

        if params.fix_time {
            fix_timestamp(wpt, report);
        }
        if params.localize {
            localize_time(wpt, timezones, report)?;
        }
        if let Some(geocoder) = geocoder.filter(|_| params.address) {
            resolve_address(wpt, geocoder, timezones, report)?;
        }
        if params.garmin {
            if let Some(address) = wpt.address_mut() {
                address.strip_garmin_extras();
            }
        }
    }

    if let Some(sort_by) = params.sort_by {
        sort_waypoints(waypoints, sort_by);
    }

    Ok(())
}

fn fix_timestamp(wpt: &mut Waypoint, report: &mut RunReport) {
    let Some(description) = wpt.description.as_deref() else {
        return;
    };
    if let Some(fixed) = fix_description_timestamp(description, wpt.time.as_ref()) {
        println!("  \"{}\" -> \"{}\"", description, fixed);
        wpt.description = Some(fixed);
        report.record_timestamp_fixed();
    }
}

fn localize_time(wpt: &mut Waypoint, timezones: &dyn TimezoneLookup, report: &mut RunReport) -> Result<()> {
    let Some(time) = wpt.time else {
        return Ok(());
    };

    let Some(zone) = timezones.timezone_at(wpt.latitude, wpt.longitude) else {
        warn!(
            name = wpt.display_name(),
            latitude = wpt.latitude,
            longitude = wpt.longitude,
            "No time zone found, time left unchanged"
        );
        report.record_warning(wpt.display_name(), "no time zone found for coordinates");
        return Ok(());
    };

    let localized = localize(&time, &zone)?;
    println!("  \"{}\" -> \"{}\"", time, localized);
    wpt.time = Some(localized);
    report.record_timezone_applied();
    Ok(())
}

fn resolve_address(
    wpt: &mut Waypoint,
    geocoder: &dyn ReverseGeocoder,
    timezones: &dyn TimezoneLookup,
    report: &mut RunReport,
) -> Result<()> {
    let (latitude, longitude) = (wpt.latitude, wpt.longitude);

    let location = match geocoder.reverse(latitude, longitude) {
        Ok(Some(location)) => location,
        Ok(None) => {
            error!(latitude, longitude, "Failed to get address, exiting");
            bail!("No address found for [{}, {}]", longitude, latitude);
        }
        Err(e) => {
            error!(latitude, longitude, error = %e, "Reverse geocoding failed, exiting");
            return Err(anyhow::Error::new(e)
                .context(format!("Failed to get address for [{}, {}]", longitude, latitude)));
        }
    };

    let timezone = timezones.timezone_at(latitude, longitude);
    let address = location.to_address(timezone.clone());

    println!("    {}", address.full_address.as_deref().unwrap_or(""));
    println!("    {}", address);
    println!("    TZ: {}", timezone.as_deref().unwrap_or("None"));

    wpt.set_address(address);
    report.record_address();
    Ok(())
}

/// Tri stable selon la clé demandée (valeur absente = chaîne vide)
pub fn sort_waypoints(waypoints: &mut [Waypoint], sort_by: SortBy) {
    fn text(value: &Option<String>) -> &str {
        value.as_deref().unwrap_or("")
    }

    match sort_by {
        SortBy::Name => waypoints.sort_by(|a, b| a.display_name().cmp(b.display_name())),
        SortBy::Time => waypoints.sort_by_key(|w| w.time),
        SortBy::Desc => waypoints.sort_by(|a, b| text(&a.description).cmp(text(&b.description))),
        SortBy::Cmt => waypoints.sort_by(|a, b| text(&a.comment).cmp(text(&b.comment))),
    }
}

/// Listing aligné: `[  n] name, [lon, lat], elev: …, desc, time`
pub fn format_waypoints(waypoints: &[Waypoint]) -> Vec<String> {
    let name_width = waypoints
        .iter()
        .map(|w| w.display_name().chars().count())
        .max()
        .unwrap_or(0);

    waypoints
        .iter()
        .enumerate()
        .map(|(index, wpt)| {
            let elevation = wpt
                .elevation
                .filter(|e| *e != 0.0)
                .map(|e| format!("{:>11}", e))
                .unwrap_or_default();
            let time = wpt
                .time
                .map(|t| t.to_string())
                .unwrap_or_else(|| "None".to_string());

            format!(
                "[{:>3}] {:<width$}, [{:>19}, {:>19}], elev: {:>15}, {}, {}",
                index + 1,
                wpt.display_name(),
                wpt.longitude,
                wpt.latitude,
                elevation,
                wpt.description.as_deref().unwrap_or("None"),
                time,
                width = name_width
            )
        })
        .collect()
}

/// Écrit les waypoints (`.gpx` ou `.yaml` selon l'extension)
pub fn save_waypoints(waypoints: &[Waypoint], path: &Path, report: &mut RunReport) -> Result<()> {
    waypoint::write_path(waypoints, path)
        .with_context(|| format!("Failed to write waypoints to {}", path.display()))?;

    println!("Successfully wrote {} waypoints to {}", waypoints.len(), path.display());
    report.record_written(waypoints.len());
    Ok(())
}

/// Adresse d'un point (commande `q`)
pub fn query_address(latitude: f64, longitude: f64, geocoder: &dyn ReverseGeocoder) -> Result<Address> {
    let location = geocoder
        .reverse(latitude, longitude)
        .with_context(|| format!("Failed to get address for [{}, {}]", longitude, latitude))?;

    match location {
        Some(location) => Ok(location.to_address(None)),
        None => bail!("No address found for [{}, {}]", longitude, latitude),
    }
}
