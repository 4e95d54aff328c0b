//! Types d'erreurs pour le crate waypoint

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture ou de l'écriture des waypoints
#[derive(Debug, Error)]
pub enum WaypointError {
    /// Erreur d'I/O lors de la lecture ou de l'écriture d'un fichier
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Document GPX mal formé
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Attribut XML illisible
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Document YAML mal formé
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Waypoint sans latitude ou longitude
    #[error("Waypoint #{index} is missing its {field} coordinate")]
    MissingCoordinate { index: usize, field: &'static str },

    /// Valeur numérique illisible
    #[error("Invalid number for {field}: '{value}'")]
    InvalidNumber { field: String, value: String },

    /// Horodatage dans un format non reconnu
    #[error("Invalid timestamp: '{0}'")]
    InvalidTimestamp(String),

    /// Extension de fichier sans format associé
    #[error("Unsupported file format: '{0}' (expected .gpx or .yaml)")]
    UnsupportedFormat(String),

    /// Structure de document inattendue
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: &'static str, reason: String },
}

impl WaypointError {
    /// Crée une erreur de parsing avec contexte
    pub fn parse_error(format: &'static str, reason: impl Into<String>) -> Self {
        Self::ParseError {
            format,
            reason: reason.into(),
        }
    }

    /// Crée une erreur de nombre invalide
    pub fn invalid_number(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidNumber {
            field: field.into(),
            value: value.into(),
        }
    }
}
