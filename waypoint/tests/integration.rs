//! Tests d'intégration: conversions GPX ↔ YAML et adresses

use waypoint::{read_gpx, read_yaml, write_gpx, write_yaml, Address, Extension, Format, Waypoint};

const YAML_WITH_ADDRESS: &str = r#"
gpx:
  wpt:
    - name: Pike Place
      _lat: 47.6097
      _lon: -122.3422
      extensions:
        - WaypointExtension:
            Address:
              StreetAddress: 85 Pike St
              City: Seattle
              PostalCode: 98101
"#;

fn new_address() -> Address {
    Address {
        street_address: Some("1st Ave".into()),
        city: Some("Seattle".into()),
        state: Some("Washington".into()),
        country: Some("United States".into()),
        country_code: Some("us".into()),
        ..Default::default()
    }
}

#[test]
fn test_set_address_keeps_single_extension_yaml() {
    let mut waypoints = read_yaml(YAML_WITH_ADDRESS).unwrap();
    waypoints[0].set_address(new_address());

    let mut out = Vec::new();
    write_yaml(&waypoints, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(text.matches("WaypointExtension").count(), 1);
    assert!(text.contains("1st Ave"));
    assert!(!text.contains("85 Pike St"));

    let back = read_yaml(&text).unwrap();
    assert_eq!(back[0].extensions.as_ref().map(Vec::len), Some(1));
    assert_eq!(back[0].address(), Some(&new_address()));
}

#[test]
fn test_set_address_keeps_single_extension_gpx() {
    let mut waypoints = read_yaml(YAML_WITH_ADDRESS).unwrap();
    waypoints[0].set_address(new_address());

    let mut out = Vec::new();
    write_gpx(&waypoints, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(text.matches("<gpxx:WaypointExtension>").count(), 1);
    assert_eq!(text.matches("<gpxx:Address>").count(), 1);
}

#[test]
fn test_empty_extensions_are_omitted() {
    let mut wpt = Waypoint::new(48.8584, 2.2945);
    wpt.name = Some("Tour Eiffel".into());
    wpt.set_extensions(Vec::<Extension>::new());
    assert!(wpt.extensions.is_none());

    let mut yaml = Vec::new();
    write_yaml(std::slice::from_ref(&wpt), &mut yaml).unwrap();
    assert!(!String::from_utf8(yaml).unwrap().contains("extensions"));

    let mut gpx = Vec::new();
    write_gpx(std::slice::from_ref(&wpt), &mut gpx).unwrap();
    assert!(!String::from_utf8(gpx).unwrap().contains("<extensions>"));
}

#[test]
fn test_yaml_to_gpx_to_yaml() {
    let waypoints = read_yaml(YAML_WITH_ADDRESS).unwrap();

    let mut gpx = Vec::new();
    write_gpx(&waypoints, &mut gpx).unwrap();
    let from_gpx = read_gpx(std::str::from_utf8(&gpx).unwrap()).unwrap();
    assert_eq!(from_gpx, waypoints);

    let mut yaml = Vec::new();
    Format::Yaml.write(&from_gpx, &mut yaml).unwrap();
    let from_yaml = Format::Yaml.read(std::str::from_utf8(&yaml).unwrap()).unwrap();
    assert_eq!(from_yaml, waypoints);
}

#[test]
fn test_read_device_file() {
    let fixture = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/waypoints.gpx");

    let waypoints = waypoint::read_path(&fixture).unwrap();
    // Les points de trace ne sont pas des waypoints
    assert_eq!(waypoints.len(), 2);

    let summit = &waypoints[0];
    assert_eq!(summit.display_name(), "Mont Blanc");
    assert_eq!(summit.elevation, Some(4808.7));
    assert_eq!(summit.symbol.as_deref(), Some("Summit"));
    assert_eq!(summit.description.as_deref(), Some("Jul 20, 2018 6:14 pm"));
    assert!(summit.extensions.is_none());

    let village = &waypoints[1];
    assert_eq!(village.comment.as_deref(), Some("depart"));
    let address = village.address().unwrap();
    assert_eq!(address.city.as_deref(), Some("Chamonix-Mont-Blanc"));
    assert_eq!(address.postal_code.as_deref(), Some("74400"));

    for wpt in &waypoints {
        assert!((-90.0..=90.0).contains(&wpt.latitude));
        assert!((-180.0..=180.0).contains(&wpt.longitude));
        assert!(wpt.time.is_some());
    }
}
