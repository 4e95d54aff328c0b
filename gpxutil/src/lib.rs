//! # gpxutil
//!
//! Édition de waypoints GPX/YAML.
//!
//! ## Features
//!
//! - Lecture/écriture GPX 1.1 et YAML (extensions d'adresse Garmin comprises)
//! - Correction des horodatages de description
//! - Passage à l'heure locale selon la position
//! - Géocodage inverse Nominatim avec cache persistant et limitation de débit
//!
//! ## Usage CLI
//!
//! ```bash
//! # Adresses et heure locale, tri par nom, sortie GPX
//! gpxutil i -u addr,tz -b name -o out.gpx trip1.gpx trip2.yaml
//!
//! # Adresse d'un point
//! gpxutil q 48.8584 2.2945
//!
//! # État du cache de géocodage
//! gpxutil cache stats
//! ```

pub mod config;
pub mod context;
pub mod geocode;
pub mod pipeline;
pub mod report;
pub mod timezone;

pub use config::Config;
pub use context::{FlushSummary, RuntimeContext};
pub use geocode::{GeocodeCache, Location, NominatimGeocoder, RateLimited, RateLimiter, ReverseGeocoder};
pub use pipeline::{DeleteOption, Params, SortBy, UpdateOption};
pub use report::{RunReport, RunStatus};
pub use timezone::{TimezoneLookup, TzfLookup};
