//! Fournisseur Nominatim (OpenStreetMap)
//!
//! Appel bloquant à `/reverse?format=jsonv2`. La politique d'usage de
//! Nominatim impose un user agent identifiable et au plus un appel par seconde:
//! ce client est prévu pour être enveloppé dans un `RateLimited`.

use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use super::{GeocodeError, Location, ReverseGeocoder};

/// Site d'appel utilisé pour la limitation de débit
pub const CALL_SITE: &str = "nominatim.reverse";

const TIMEOUT: Duration = Duration::from_secs(10);

/// Client de géocodage inverse Nominatim
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    language: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str, language: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        debug!(latitude, longitude, url = url.as_str(), "Nominatim reverse lookup");

        let body: Value = self
            .client
            .get(&url)
            .query(&[
                ("format", "jsonv2".to_string()),
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("accept-language", self.language.clone()),
                ("addressdetails", "1".to_string()),
            ])
            .send()?
            .error_for_status()?
            .json()?;

        parse_reverse_response(body, latitude, longitude)
    }
}

fn coordinate(body: &Value, key: &str, fallback: f64) -> f64 {
    match body.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(fallback),
        Some(Value::Number(n)) => n.as_f64().unwrap_or(fallback),
        _ => fallback,
    }
}

/// Interprète une réponse `jsonv2`. Un champ `error` signifie "rien trouvé".
pub fn parse_reverse_response(
    body: Value,
    latitude: f64,
    longitude: f64,
) -> Result<Option<Location>, GeocodeError> {
    if let Some(error) = body.get("error") {
        debug!(error = %error, "Nominatim found nothing");
        return Ok(None);
    }

    let address = body
        .get("display_name")
        .and_then(Value::as_str)
        .ok_or_else(|| GeocodeError::InvalidResponse("missing display_name".into()))?
        .to_string();

    Ok(Some(Location {
        address,
        latitude: coordinate(&body, "lat", latitude),
        longitude: coordinate(&body, "lon", longitude),
        raw: body,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reverse_response() {
        let body = json!({
            "place_id": 1234,
            "lat": "45.1885",
            "lon": "5.7245",
            "display_name": "Place Grenette, Grenoble, Isère, France",
            "address": { "road": "Place Grenette", "city": "Grenoble", "country": "France" }
        });

        let location = parse_reverse_response(body, 45.0, 5.0).unwrap().unwrap();
        assert_eq!(location.address, "Place Grenette, Grenoble, Isère, France");
        assert_eq!(location.latitude, 45.1885);
        assert_eq!(location.longitude, 5.7245);
        assert_eq!(location.to_address(None).city.as_deref(), Some("Grenoble"));
    }

    #[test]
    fn test_parse_reverse_response_error_is_none() {
        let body = json!({ "error": "Unable to geocode" });
        assert_eq!(parse_reverse_response(body, 0.0, 0.0).unwrap(), None);
    }

    #[test]
    fn test_parse_reverse_response_invalid() {
        let body = json!({ "lat": "1" });
        assert!(matches!(
            parse_reverse_response(body, 0.0, 0.0),
            Err(GeocodeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_new_trims_base_url() {
        let geocoder = NominatimGeocoder::new("https://nominatim.example.org/", "gpxutil-test", "fr").unwrap();
        assert_eq!(geocoder.base_url(), "https://nominatim.example.org");
    }
}
