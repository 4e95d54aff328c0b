//! Fuseaux horaires à partir des coordonnées

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use thiserror::Error;
use tracing::debug;
use tzf_rs::DefaultFinder;

/// Fuseau IANA inconnu de la base chrono-tz
#[derive(Debug, Error)]
#[error("Unknown time zone: '{0}'")]
pub struct UnknownTimezone(pub String);

/// Recherche du fuseau horaire d'un point
pub trait TimezoneLookup {
    fn timezone_at(&self, latitude: f64, longitude: f64) -> Option<String>;
}

// Construction coûteuse (polygones embarqués): faite une seule fois, au premier besoin
static FINDER: Lazy<DefaultFinder> = Lazy::new(|| {
    debug!("Loading time zone polygons");
    DefaultFinder::new()
});

/// Recherche hors ligne avec `tzf-rs`
#[derive(Debug, Clone, Copy, Default)]
pub struct TzfLookup;

impl TimezoneLookup for TzfLookup {
    fn timezone_at(&self, latitude: f64, longitude: f64) -> Option<String> {
        let name = FINDER.get_tz_name(longitude, latitude);
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// Convertit un horodatage dans le fuseau donné
pub fn localize(time: &DateTime<FixedOffset>, zone: &str) -> Result<DateTime<FixedOffset>, UnknownTimezone> {
    let tz: Tz = zone
        .parse()
        .map_err(|_| UnknownTimezone(zone.to_string()))?;
    Ok(time.with_timezone(&tz).fixed_offset())
}
