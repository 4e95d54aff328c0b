//! Lecture/écriture du format YAML (`gpx: { wpt: [...] }`)
//!
//! Chaque waypoint est un enregistrement clé-valeur avec des clés courtes:
//! `_lat`, `_lon`, `ele`, `name`, `time`, `cmt`, `desc`, `sym`, `type`, `src`
//! et `extensions`.

use std::io::Write;

use serde_yaml::{Mapping, Value};

use crate::extension::{extensions_to_yaml, read_extensions_from_yaml};
use crate::timefix::{format_timestamp, parse_timestamp};
use crate::types::Waypoint;
use crate::WaypointError;

/// Convertit un scalaire YAML en texte (`PostalCode: 98101` est un nombre pour YAML)
pub(crate) fn yaml_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_field(record: &Mapping, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(yaml_scalar)
        .filter(|s| !s.is_empty())
}

fn number_field(record: &Mapping, key: &str) -> Result<Option<f64>, WaypointError> {
    match record.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| WaypointError::invalid_number(key, n.to_string())),
        Some(Value::String(s)) => fast_float::parse::<f64, _>(s.trim())
            .map(Some)
            .map_err(|_| WaypointError::invalid_number(key, s.as_str())),
        Some(other) => Err(WaypointError::invalid_number(key, format!("{:?}", other))),
    }
}

/// Construit un waypoint depuis un enregistrement YAML
pub fn waypoint_from_record(index: usize, record: &Mapping) -> Result<Waypoint, WaypointError> {
    let latitude = number_field(record, "_lat")?.ok_or(WaypointError::MissingCoordinate {
        index,
        field: "latitude",
    })?;
    let longitude = number_field(record, "_lon")?.ok_or(WaypointError::MissingCoordinate {
        index,
        field: "longitude",
    })?;

    let mut wpt = Waypoint::new(latitude, longitude);
    wpt.elevation = number_field(record, "ele")?;
    wpt.name = text_field(record, "name");
    wpt.time = text_field(record, "time")
        .map(|t| parse_timestamp(&t))
        .transpose()?;
    wpt.comment = text_field(record, "cmt");
    wpt.description = text_field(record, "desc");
    wpt.symbol = text_field(record, "sym");
    wpt.kind = text_field(record, "type");
    wpt.source = text_field(record, "src");
    wpt.extensions = read_extensions_from_yaml(record.get("extensions"));

    Ok(wpt)
}

/// Enregistrement YAML d'un waypoint (champs vides omis)
pub fn waypoint_to_record(wpt: &Waypoint) -> Mapping {
    let mut record = Mapping::new();

    let put_text = |record: &mut Mapping, key: &str, value: &Option<String>| {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            record.insert(Value::from(key), Value::from(v));
        }
    };

    put_text(&mut record, "name", &wpt.name);
    record.insert(Value::from("_lat"), Value::from(wpt.latitude));
    record.insert(Value::from("_lon"), Value::from(wpt.longitude));
    if let Some(ele) = wpt.elevation {
        record.insert(Value::from("ele"), Value::from(ele));
    }
    if let Some(time) = &wpt.time {
        record.insert(Value::from("time"), Value::from(format_timestamp(time)));
    }
    put_text(&mut record, "cmt", &wpt.comment);
    put_text(&mut record, "desc", &wpt.description);
    put_text(&mut record, "sym", &wpt.symbol);
    put_text(&mut record, "type", &wpt.kind);
    put_text(&mut record, "src", &wpt.source);
    if let Some(extensions) = extensions_to_yaml(wpt.extensions.as_deref()) {
        record.insert(Value::from("extensions"), extensions);
    }

    record
}

/// Lit un document YAML et retourne ses waypoints
pub fn read_yaml(text: &str) -> Result<Vec<Waypoint>, WaypointError> {
    let document: Value = serde_yaml::from_str(text)?;

    let Some(records) = document
        .get("gpx")
        .and_then(|gpx| gpx.get("wpt"))
        .filter(|wpt| !wpt.is_null())
    else {
        return Ok(Vec::new());
    };

    let records = records
        .as_sequence()
        .ok_or_else(|| WaypointError::parse_error("YAML", "gpx.wpt must be a list"))?;

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let record = record.as_mapping().ok_or_else(|| {
                WaypointError::parse_error("YAML", format!("waypoint #{} is not a mapping", index))
            })?;
            waypoint_from_record(index, record)
        })
        .collect()
}

/// Écrit les waypoints en YAML, précédés d'un en-tête commenté
pub fn write_yaml<W: Write>(waypoints: &[Waypoint], mut writer: W) -> Result<(), WaypointError> {
    let records: Vec<Value> = waypoints
        .iter()
        .map(|wpt| Value::Mapping(waypoint_to_record(wpt)))
        .collect();

    let mut wpt = Mapping::new();
    wpt.insert(Value::from("wpt"), Value::Sequence(records));
    let mut document = Mapping::new();
    document.insert(Value::from("gpx"), Value::Mapping(wpt));

    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(writer, "# GPX Waypoints Export")?;
    writeln!(writer, "# Generated by gpxutil")?;
    writeln!(writer, "# Date: {}", timestamp)?;
    writeln!(writer, "# Number of waypoints: {}", waypoints.len())?;
    writeln!(writer, "#")?;

    serde_yaml::to_writer(&mut writer, &Value::Mapping(document))?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    const SAMPLE: &str = r#"
gpx:
  wpt:
    - name: Test Waypoint
      _lat: 47.6062
      _lon: -122.3321
      ele: 100.0
      time: 2018-07-20T18:14:00Z
      sym: Flag, Blue
      extensions:
        - WaypointExtension:
            Address:
              StreetAddress: 123 Main St
              City: Seattle
              State: WA
              PostalCode: 98101
              Country: USA
              CountryCode: US
    - name: Simple Waypoint
      _lat: 47.0
      _lon: -122.0
"#;

    #[test]
    fn test_read_yaml() {
        let waypoints = read_yaml(SAMPLE).unwrap();
        assert_eq!(waypoints.len(), 2);

        let first = &waypoints[0];
        assert_eq!(first.name.as_deref(), Some("Test Waypoint"));
        assert_eq!(first.latitude, 47.6062);
        assert_eq!(first.longitude, -122.3321);
        assert_eq!(first.elevation, Some(100.0));
        assert_eq!(first.symbol.as_deref(), Some("Flag, Blue"));
        assert!(first.time.is_some());

        let address = first.address().unwrap();
        assert_eq!(address.street_address.as_deref(), Some("123 Main St"));
        assert_eq!(address.postal_code.as_deref(), Some("98101"));
        assert_eq!(address.country_code.as_deref(), Some("US"));

        assert!(waypoints[1].extensions.is_none());
    }

    #[test]
    fn test_read_yaml_missing_coordinate() {
        let err = read_yaml("gpx:\n  wpt:\n    - name: nowhere\n      _lon: 1.0\n").unwrap_err();
        assert!(matches!(
            err,
            WaypointError::MissingCoordinate {
                index: 0,
                field: "latitude"
            }
        ));
    }

    #[test]
    fn test_read_yaml_empty_document() {
        assert!(read_yaml("gpx: {}\n").unwrap().is_empty());
        assert!(read_yaml("other: 1\n").unwrap().is_empty());
    }

    #[test]
    fn test_read_yaml_empty_extensions_is_none() {
        let text = "gpx:\n  wpt:\n    - _lat: 1.0\n      _lon: 2.0\n      extensions: []\n";
        let waypoints = read_yaml(text).unwrap();
        assert!(waypoints[0].extensions.is_none());
    }

    #[test]
    fn test_record_omits_empty_fields() {
        let mut wpt = Waypoint::new(45.5, 6.25);
        wpt.name = Some("Col".into());
        wpt.comment = Some(String::new());

        let record = waypoint_to_record(&wpt);
        let keys: Vec<_> = record.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["name", "_lat", "_lon"]);
    }

    #[test]
    fn test_write_then_read_yaml() {
        let mut wpt = Waypoint::new(45.5, 6.25);
        wpt.name = Some("Col de la Madeleine".into());
        wpt.elevation = Some(1993.0);
        wpt.set_address(Address {
            city: Some("La Chambre".into()),
            ..Default::default()
        });

        let mut out = Vec::new();
        write_yaml(std::slice::from_ref(&wpt), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("# GPX Waypoints Export\n"));
        assert!(text.contains("# Number of waypoints: 1"));

        let back = read_yaml(&text).unwrap();
        assert_eq!(back, vec![wpt]);
    }
}
