//! Tests d'intégration du pipeline: fichiers réels, cache persistant, fournisseur factice

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gpxutil::geocode::cache::inspect;
use gpxutil::geocode::{GeocodeError, Location};
use gpxutil::pipeline::{
    format_waypoints, process_waypoints, read_input_files, save_waypoints, Params, SortBy,
    UpdateOption,
};
use gpxutil::{FlushSummary, ReverseGeocoder, RunReport, RuntimeContext, TimezoneLookup};
use tempfile::TempDir;

const INPUT_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="48.8584" lon="2.2945">
    <ele>35.0</ele>
    <time>2018-07-20T18:14:37Z</time>
    <name>Tour Eiffel</name>
    <desc>2018-07-20 6:14 pm</desc>
    <sym>Flag, Blue</sym>
  </wpt>
  <wpt lat="45.8326" lon="6.8652">
    <name>Mont Blanc</name>
  </wpt>
</gpx>
"#;

const INPUT_YAML: &str = r#"gpx:
  wpt:
    - name: Annecy
      _lat: 45.8992
      _lon: 6.1294
      src: phone
"#;

/// Fournisseur factice: compte les appels, ne trouve rien au nord de `limit`
struct Provider {
    calls: Arc<AtomicUsize>,
    limit: f64,
}

impl Provider {
    fn new(calls: &Arc<AtomicUsize>) -> Self {
        Self {
            calls: Arc::clone(calls),
            limit: 90.0,
        }
    }
}

impl ReverseGeocoder for Provider {
    fn reverse(&self, latitude: f64, longitude: f64) -> Result<Option<Location>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if latitude > self.limit {
            return Ok(None);
        }

        let mut location = Location::new(format!("Somewhere near {}, France", latitude), latitude, longitude);
        location.raw = serde_json::json!({
            "address": {
                "road": "Chemin du Test",
                "town": "Testville",
                "country": "France",
                "postcode": "74000",
                "country_code": "fr"
            }
        });
        Ok(Some(location))
    }
}

struct Paris;

impl TimezoneLookup for Paris {
    fn timezone_at(&self, _: f64, _: f64) -> Option<String> {
        Some("Europe/Paris".to_string())
    }
}

fn write_inputs(dir: &Path) -> Vec<PathBuf> {
    let gpx = dir.join("trip.gpx");
    let yaml = dir.join("extra.yml");
    std::fs::write(&gpx, INPUT_GPX).unwrap();
    std::fs::write(&yaml, INPUT_YAML).unwrap();
    vec![gpx, yaml]
}

#[test]
fn test_full_run_writes_output_and_cache() {
    let dir = TempDir::new().unwrap();
    let inputs = write_inputs(dir.path());
    let cache_file = dir.path().join("cache").join("geocoding_cache.json");
    let output = dir.path().join("out.yaml");
    let calls = Arc::new(AtomicUsize::new(0));

    let mut params = Params::new(
        &[UpdateOption::Time, UpdateOption::Tz, UpdateOption::Addr],
        &[],
    );
    params.waypoint_src = Some("gpxutil-test".into());
    params.sort_by = Some(SortBy::Name);

    let context = RuntimeContext::new();
    let geocoder = context.persistent_cache(
        &cache_file,
        context.rate_limited("test.reverse", Duration::ZERO, Provider::new(&calls)),
    );

    let mut report = RunReport::new();
    let mut waypoints = read_input_files(&inputs, &params, &mut report).unwrap();
    assert_eq!(waypoints.len(), 3);
    assert_eq!(report.files_read, 2);

    process_waypoints(&mut waypoints, &params, Some(&geocoder), &Paris, &mut report).unwrap();
    save_waypoints(&waypoints, &output, &mut report).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(report.addresses_resolved, 3);
    assert_eq!(report.timestamps_fixed, 1);
    assert_eq!(report.waypoints_written, 3);

    let names: Vec<_> = waypoints.iter().map(|w| w.display_name()).collect();
    assert_eq!(names, vec!["Annecy", "Mont Blanc", "Tour Eiffel"]);
    assert_eq!(format_waypoints(&waypoints).len(), 3);

    let summary = context.shutdown();
    assert_eq!(
        summary,
        FlushSummary {
            saved: 1,
            failed: 0,
            unchanged: 0
        }
    );

    // Relecture de la sortie YAML
    let written = waypoint::read_path(&output).unwrap();
    assert_eq!(written.len(), 3);

    let annecy = &written[0];
    assert_eq!(annecy.source.as_deref(), Some("phone"));
    let address = annecy.address().unwrap();
    assert_eq!(address.city.as_deref(), Some("Testville"));
    assert_eq!(address.time_zone.as_deref(), Some("Europe/Paris"));

    let eiffel = &written[2];
    assert_eq!(eiffel.source.as_deref(), Some("gpxutil-test"));
    assert_eq!(eiffel.description.as_deref(), Some("2018-07-20 18:14:37"));
    assert_eq!(eiffel.time.unwrap().to_rfc3339(), "2018-07-20T20:14:37+02:00");

    let inspection = inspect(&cache_file).unwrap().unwrap();
    assert_eq!(inspection.total_entries, 3);
    assert!(inspection.entries.iter().any(|e| e.key == "48.8584,2.2945"));
}

#[test]
fn test_second_run_served_from_cache() {
    let dir = TempDir::new().unwrap();
    let inputs = write_inputs(dir.path());
    let cache_file = dir.path().join("geocoding_cache.json");
    let calls = Arc::new(AtomicUsize::new(0));
    let params = Params::new(&[UpdateOption::Addr], &[]);

    for _ in 0..2 {
        let context = RuntimeContext::new();
        let geocoder = context.persistent_cache(
            &cache_file,
            context.rate_limited("test.reverse", Duration::ZERO, Provider::new(&calls)),
        );

        let mut report = RunReport::new();
        let mut waypoints = read_input_files(&inputs, &params, &mut report).unwrap();
        process_waypoints(&mut waypoints, &params, Some(&geocoder), &Paris, &mut report).unwrap();
        assert_eq!(report.addresses_resolved, 3);

        context.shutdown();
    }

    // Le second run n'a pas appelé le fournisseur
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_failed_lookup_aborts_but_cache_is_flushed() {
    let dir = TempDir::new().unwrap();
    let inputs = write_inputs(dir.path());
    let cache_file = dir.path().join("geocoding_cache.json");
    let calls = Arc::new(AtomicUsize::new(0));
    let params = Params::new(&[UpdateOption::Addr], &[]);

    let context = RuntimeContext::new();
    let provider = Provider {
        calls: Arc::clone(&calls),
        // Seule la tour Eiffel est au nord
        limit: 48.0,
    };
    let geocoder = context.persistent_cache(&cache_file, provider);

    let mut report = RunReport::new();
    let mut waypoints = read_input_files(&inputs, &params, &mut report).unwrap();

    // Fichiers lus dans l'ordre: la tour Eiffel échoue en premier
    let result = process_waypoints(&mut waypoints, &params, Some(&geocoder), &Paris, &mut report);
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(waypoints[0].address().is_none());

    // Rien de nouveau en cache: le fichier n'est pas écrit
    let summary = context.shutdown();
    assert_eq!(summary.saved, 0);
    assert_eq!(summary.unchanged, 1);
    assert!(!cache_file.exists());
}

#[test]
fn test_failure_after_successes_keeps_earlier_entries() {
    let dir = TempDir::new().unwrap();
    let inputs = write_inputs(dir.path());
    let cache_file = dir.path().join("geocoding_cache.json");
    let calls = Arc::new(AtomicUsize::new(0));
    let params = Params::new(&[UpdateOption::Addr], &[]);

    let context = RuntimeContext::new();
    let provider = Provider {
        calls: Arc::clone(&calls),
        limit: 48.0,
    };
    let geocoder = context.persistent_cache(&cache_file, provider);

    let mut report = RunReport::new();
    let mut waypoints = read_input_files(&inputs, &params, &mut report).unwrap();
    // Mont Blanc puis Annecy avant la tour Eiffel
    waypoints.rotate_left(1);

    assert!(process_waypoints(&mut waypoints, &params, Some(&geocoder), &Paris, &mut report).is_err());
    assert_eq!(report.addresses_resolved, 2);

    let summary = context.shutdown();
    assert_eq!(summary.saved, 1);

    let inspection = inspect(&cache_file).unwrap().unwrap();
    assert_eq!(inspection.total_entries, 2);
}

#[test]
fn test_save_rejects_unknown_extension() {
    let dir = TempDir::new().unwrap();
    let inputs = write_inputs(dir.path());
    let params = Params::default();

    let mut report = RunReport::new();
    let waypoints = read_input_files(&inputs, &params, &mut report).unwrap();

    let output = dir.path().join("out.csv");
    assert!(save_waypoints(&waypoints, &output, &mut report).is_err());
    assert!(!output.exists());
    assert_eq!(report.waypoints_written, 0);
}

#[test]
fn test_missing_input_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = vec![dir.path().join("nope.gpx")];

    let mut report = RunReport::new();
    assert!(read_input_files(&missing, &Params::default(), &mut report).is_err());
}

#[test]
fn test_non_gpx_input_is_an_error() {
    let dir = TempDir::new().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "lat,lon\n45.0,6.0\n").unwrap();

    let mut report = RunReport::new();
    let err = read_input_files(&[notes], &Params::default(), &mut report).unwrap_err();
    assert!(format!("{:#}", err).contains("missing <gpx> root element"));
    assert_eq!(report.files_read, 0);
}
