//! # waypoint
//!
//! Modèle de waypoint et lecture/écriture des formats GPX 1.1 et YAML.
//!
//! ## Features
//!
//! - Lecture GPX en streaming avec `quick-xml` (namespaces résolus)
//! - Format YAML clé-valeur (`gpx: { wpt: [...] }`) via `serde_yaml`
//! - Extensions Garmin (`gpxx:WaypointExtension` / `gpxx:Address`)
//! - Correction des horodatages libres dans les descriptions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use waypoint::{read_path, write_path};
//! use std::path::Path;
//!
//! let waypoints = read_path(Path::new("sommets.gpx"))?;
//! for wpt in &waypoints {
//!     println!("{} [{}, {}]", wpt.display_name(), wpt.longitude, wpt.latitude);
//! }
//! write_path(&waypoints, Path::new("sommets.yaml"))?;
//! ```

pub mod error;
pub mod extension;
pub mod gpx;
pub mod timefix;
pub mod types;
pub mod yaml;

pub use error::WaypointError;
pub use extension::{Element, Extension, WaypointExtension};
pub use gpx::{read_gpx, write_gpx};
pub use types::{Address, Waypoint};
pub use yaml::{read_yaml, write_yaml};

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Format de fichier, déduit de l'extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Gpx,
    Yaml,
}

impl Format {
    /// Format d'un fichier d'entrée: `.yaml`/`.yml` en YAML, tout le reste en GPX
    pub fn for_input(path: &Path) -> Self {
        match extension_of(path).as_deref() {
            Some("yaml" | "yml") => Format::Yaml,
            _ => Format::Gpx,
        }
    }

    /// Format d'un fichier de sortie: extension obligatoire `.gpx` ou `.yaml`
    pub fn for_output(path: &Path) -> Result<Self, WaypointError> {
        match extension_of(path).as_deref() {
            Some("gpx") => Ok(Format::Gpx),
            Some("yaml" | "yml") => Ok(Format::Yaml),
            _ => Err(WaypointError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Lit des waypoints depuis un texte
    pub fn read(self, text: &str) -> Result<Vec<Waypoint>, WaypointError> {
        match self {
            Format::Gpx => read_gpx(text),
            Format::Yaml => read_yaml(text),
        }
    }

    /// Écrit des waypoints
    pub fn write<W: std::io::Write>(self, waypoints: &[Waypoint], writer: W) -> Result<(), WaypointError> {
        match self {
            Format::Gpx => write_gpx(waypoints, writer),
            Format::Yaml => write_yaml(waypoints, writer),
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Lit un fichier de waypoints (format selon l'extension)
pub fn read_path(path: &Path) -> Result<Vec<Waypoint>, WaypointError> {
    let text = std::fs::read_to_string(path)?;
    Format::for_input(path).read(&text)
}

/// Écrit un fichier de waypoints (`.gpx` ou `.yaml`)
pub fn write_path(waypoints: &[Waypoint], path: &Path) -> Result<(), WaypointError> {
    let format = Format::for_output(path)?;
    let file = File::create(path)?;
    format.write(waypoints, BufWriter::new(file))
}
