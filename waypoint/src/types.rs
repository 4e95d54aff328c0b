//! Types de données pour le crate waypoint

use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::extension::{local_name, Extension, WaypointExtension};

/// Un waypoint: point géographique nommé avec ses métadonnées optionnelles
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    /// Latitude en degrés (WGS84)
    pub latitude: f64,

    /// Longitude en degrés (WGS84)
    pub longitude: f64,

    /// Altitude en mètres
    pub elevation: Option<f64>,

    /// Nom du waypoint
    pub name: Option<String>,

    /// Horodatage (avec son décalage horaire)
    pub time: Option<DateTime<FixedOffset>>,

    /// Champ `cmt`
    pub comment: Option<String>,

    /// Champ `desc`
    pub description: Option<String>,

    /// Symbole (`sym`)
    pub symbol: Option<String>,

    /// Type GPX (`type`)
    pub kind: Option<String>,

    /// Source (`src`)
    pub source: Option<String>,

    /// Extensions reconnues. Jamais `Some(vec![])`: une liste vide devient `None`.
    pub extensions: Option<Vec<Extension>>,
}

impl Waypoint {
    /// Crée un waypoint avec ses seules coordonnées
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
            name: None,
            time: None,
            comment: None,
            description: None,
            symbol: None,
            kind: None,
            source: None,
            extensions: None,
        }
    }

    /// Nom affichable (chaîne vide si absent)
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Remplace les extensions en normalisant une liste vide en `None`
    pub fn set_extensions(&mut self, extensions: Vec<Extension>) {
        self.extensions = if extensions.is_empty() {
            None
        } else {
            Some(extensions)
        };
    }

    /// Adresse portée par la première `WaypointExtension`
    pub fn address(&self) -> Option<&Address> {
        self.extensions
            .as_ref()?
            .iter()
            .find_map(|ext| match ext {
                Extension::Waypoint(wpt) => wpt.address.as_ref(),
            })
    }

    /// Adresse modifiable (mode Garmin)
    pub fn address_mut(&mut self) -> Option<&mut Address> {
        self.extensions
            .as_mut()?
            .iter_mut()
            .find_map(|ext| match ext {
                Extension::Waypoint(wpt) => wpt.address.as_mut(),
            })
    }

    /// Enregistre une adresse dans l'extension du waypoint.
    ///
    /// Une `WaypointExtension` existante est mise à jour sur place; on n'en
    /// ajoute une nouvelle que s'il n'y en a aucune.
    pub fn set_address(&mut self, address: Address) {
        let extensions = self.extensions.get_or_insert_with(Vec::new);

        let existing = extensions.iter_mut().find_map(|ext| match ext {
            Extension::Waypoint(wpt) => Some(wpt),
        });

        match existing {
            Some(wpt) => wpt.address = Some(address),
            None => extensions.push(Extension::Waypoint(WaypointExtension::with_address(
                address,
            ))),
        }
    }

    /// Supprime le symbole (`-d sym`)
    pub fn strip_symbol(&mut self) {
        self.symbol = None;
    }

    /// Supprime le type (`-d type`)
    pub fn strip_kind(&mut self) {
        self.kind = None;
    }

    /// Supprime toutes les extensions (`-d extension`)
    pub fn strip_extensions(&mut self) {
        self.extensions = None;
    }
}

/// Adresse postale (extension Garmin `gpxx:Address` + champs maison)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
    /// Nom de fuseau IANA (ex: "Europe/Paris")
    pub time_zone: Option<String>,
    pub country_code: Option<String>,
    /// Code ISO 3166-2 de subdivision (ex: "FR-ARA")
    pub lvl4: Option<String>,
    /// Adresse complète en texte libre
    pub full_address: Option<String>,
}

impl Address {
    /// Nom de tag de l'élément adresse
    pub const TAG: &'static str = "Address";

    /// Tags des champs, dans l'ordre d'écriture.
    /// Garmin exige que `PostalCode` suive `Country`.
    pub const FIELD_TAGS: [&'static str; 9] = [
        "StreetAddress",
        "City",
        "State",
        "Country",
        "PostalCode",
        "TimeZone",
        "CountryCode",
        "LvL4",
        "Address",
    ];

    /// Indique si le tag (avec ou sans namespace) désigne une adresse
    pub fn matches_tag(tag: &str) -> bool {
        local_name(tag) == Self::TAG
    }

    fn slot(&self, tag: &str) -> Option<&Option<String>> {
        Some(match tag {
            "StreetAddress" => &self.street_address,
            "City" => &self.city,
            "State" => &self.state,
            "Country" => &self.country,
            "PostalCode" => &self.postal_code,
            "TimeZone" => &self.time_zone,
            "CountryCode" => &self.country_code,
            "LvL4" => &self.lvl4,
            "Address" => &self.full_address,
            _ => return None,
        })
    }

    fn slot_mut(&mut self, tag: &str) -> Option<&mut Option<String>> {
        Some(match tag {
            "StreetAddress" => &mut self.street_address,
            "City" => &mut self.city,
            "State" => &mut self.state,
            "Country" => &mut self.country,
            "PostalCode" => &mut self.postal_code,
            "TimeZone" => &mut self.time_zone,
            "CountryCode" => &mut self.country_code,
            "LvL4" => &mut self.lvl4,
            "Address" => &mut self.full_address,
            _ => return None,
        })
    }

    /// Valeur d'un champ par son tag
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.slot(local_name(tag))?.as_deref()
    }

    /// Affecte un champ par son tag (namespace ignoré).
    ///
    /// Les valeurs vides sont ignorées; retourne `false` pour un tag inconnu.
    pub fn set(&mut self, tag: &str, value: &str) -> bool {
        let Some(slot) = self.slot_mut(local_name(tag)) else {
            return false;
        };
        let value = value.trim();
        if !value.is_empty() {
            *slot = Some(value.to_string());
        }
        true
    }

    /// Champs renseignés, dans l'ordre d'écriture
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        Self::FIELD_TAGS
            .iter()
            .filter_map(move |tag| self.get(tag).map(|value| (*tag, value)))
    }

    /// Aucun champ renseigné
    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }

    /// Retire les champs maison que les GPS Garmin refusent
    pub fn strip_garmin_extras(&mut self) {
        self.full_address = None;
        self.country_code = None;
        self.time_zone = None;
        self.lvl4 = None;
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("None")
        }

        write!(
            f,
            "street_address={}, city={}, state={}, postal_code={}, country={}, country_code={}, lvl4={}",
            show(&self.street_address),
            show(&self.city),
            show(&self.state),
            show(&self.postal_code),
            show(&self.country),
            show(&self.country_code),
            show(&self.lvl4)
        )
    }
}
