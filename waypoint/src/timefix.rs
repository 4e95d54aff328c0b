//! Horodatages: lecture multi-formats et correction du champ description

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Timelike};

use crate::WaypointError;

/// Format de référence pour le champ description
pub const REFERENCE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats rencontrés dans les descriptions, écrits par divers GPS et applis
const DESCRIPTION_FORMATS: &[&str] = &[
    "%b %d, %Y %I:%M %p", // Jul 20, 2018  6:14 pm
    "%b %d, %Y %H:%M",    // Jul 20, 2018  18:14
    "%Y-%m-%d %I:%M %p",  // 2018-07-20 6:14 pm
    "%d-%b-%y %H:%M:%S",  // 06-AUG-18 7:57:56 (60csx)
    REFERENCE_FORMAT,     // 2025-03-06 14:26:54
];

/// Formats avec décalage horaire explicite (hors RFC 3339)
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Formats sans décalage, interprétés en UTC
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Lit l'horodatage d'un waypoint (`<time>` GPX ou `time:` YAML)
pub fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>, WaypointError> {
    let text = text.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t);
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(t) = DateTime::parse_from_str(text, fmt) {
            return Ok(t);
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(t) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(t.and_utc().fixed_offset());
        }
    }

    Err(WaypointError::InvalidTimestamp(text.to_string()))
}

/// Écrit un horodatage en RFC 3339 (`Z` pour UTC)
pub fn format_timestamp(time: &DateTime<FixedOffset>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Lit un horodatage libre tel qu'on le trouve dans une description
pub fn read_description_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DESCRIPTION_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// Réécrit l'horodatage en tête de description au format de référence.
///
/// Seul le premier segment (avant un retour à la ligne ou une virgule) est
/// interprété, le reste est conservé. Les secondes du champ `time` sont
/// reportées quand le texte n'en avait pas. Retourne `None` si rien ne change.
pub fn fix_description_timestamp(
    description: &str,
    time: Option<&DateTime<FixedOffset>>,
) -> Option<String> {
    let (head, rest) = match description.find(['\n', ',']) {
        Some(pos) => description.split_at(pos),
        None => (description, ""),
    };

    let mut parsed = read_description_timestamp(head)?;

    if let Some(time) = time {
        if time.second() != 0 && parsed.second() == 0 {
            parsed = parsed.with_second(time.second()).unwrap_or(parsed);
        }
    }

    let fixed = parsed.format(REFERENCE_FORMAT).to_string();
    if fixed == head {
        return None;
    }

    Some(format!("{}{}", fixed, rest))
}
