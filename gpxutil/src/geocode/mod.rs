//! Géocodage inverse: coordonnées → adresse
//!
//! Le trait [`ReverseGeocoder`] est le point de jonction entre le fournisseur
//! (Nominatim), le limiteur de débit et le cache: chacun l'implémente et
//! enveloppe le suivant, la signature d'appel reste la même.

pub mod cache;
pub mod nominatim;
pub mod rate_limit;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use waypoint::Address;

pub use cache::{CacheStats, CacheStore, GeocodeCache};
pub use nominatim::NominatimGeocoder;
pub use rate_limit::{RateLimited, RateLimiter};

/// Erreurs du fournisseur de géocodage
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Erreur HTTP (connexion, timeout, statut)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Réponse inexploitable
    #[error("Invalid geocoder response: {0}")]
    InvalidResponse(String),
}

/// Résultat d'un géocodage inverse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Adresse complète en texte
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Réponse brute du fournisseur
    #[serde(default)]
    pub raw: Value,
}

impl Location {
    pub fn new(address: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            address: address.into(),
            latitude,
            longitude,
            raw: Value::Null,
        }
    }

    fn raw_field(&self, key: &str) -> Option<String> {
        self.raw
            .get("address")?
            .get(key)?
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Convertit en adresse de waypoint, avec le fuseau horaire du point
    pub fn to_address(&self, timezone: Option<String>) -> Address {
        Address {
            street_address: self.raw_field("road"),
            city: self
                .raw_field("city")
                .or_else(|| self.raw_field("town"))
                .or_else(|| self.raw_field("municipality")),
            state: self.raw_field("state"),
            country: self.raw_field("country"),
            postal_code: self.raw_field("postcode"),
            time_zone: timezone,
            country_code: self.raw_field("country_code"),
            lvl4: self.raw_field("ISO3166-2-lvl4"),
            full_address: (!self.address.is_empty()).then(|| self.address.clone()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Géocodage inverse d'un point.
///
/// `Ok(None)` signifie que le fournisseur n'a rien trouvé.
pub trait ReverseGeocoder {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError>;
}

impl<G: ReverseGeocoder + ?Sized> ReverseGeocoder for &G {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError> {
        (**self).reverse(latitude, longitude)
    }
}

impl<G: ReverseGeocoder + ?Sized> ReverseGeocoder for Box<G> {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError> {
        (**self).reverse(latitude, longitude)
    }
}

impl<G: ReverseGeocoder + ?Sized> ReverseGeocoder for Arc<G> {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError> {
        (**self).reverse(latitude, longitude)
    }
}
