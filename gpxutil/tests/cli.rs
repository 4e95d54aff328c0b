//! Tests du binaire: entrées vides ou invalides, fichier de sortie préservé

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const PREVIOUS_OUTPUT: &str = "<gpx>previous run</gpx>\n";

fn run_gpxutil(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gpxutil"))
        .args(args)
        .current_dir(dir)
        .env("GPXUTIL_CACHE_FILE", dir.join("geocoding_cache.json"))
        .output()
        .unwrap()
}

#[test]
fn test_empty_input_keeps_existing_output() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("empty.gpx"), r#"<gpx version="1.1"/>"#).unwrap();
    std::fs::write(dir.path().join("out.gpx"), PREVIOUS_OUTPUT).unwrap();

    let output = run_gpxutil(dir.path(), &["i", "empty.gpx", "-o", "out.gpx"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No waypoints found."));
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out.gpx")).unwrap(),
        PREVIOUS_OUTPUT
    );
}

#[test]
fn test_non_gpx_input_fails_and_keeps_existing_output() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "lat,lon\n45.0,6.0\n").unwrap();
    std::fs::write(dir.path().join("out.gpx"), PREVIOUS_OUTPUT).unwrap();

    let output = run_gpxutil(dir.path(), &["i", "notes.txt", "-o", "out.gpx"]);

    assert!(!output.status.success());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("out.gpx")).unwrap(),
        PREVIOUS_OUTPUT
    );
}

#[test]
fn test_time_fix_without_address_needs_no_cache() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("trip.gpx"),
        r#"<gpx version="1.1"><wpt lat="45.0" lon="6.0"><name>Col</name><desc>2018-07-20 6:14 pm</desc></wpt></gpx>"#,
    )
    .unwrap();

    let output = run_gpxutil(dir.path(), &["i", "trip.gpx", "-u", "time", "-o", "out.yaml"]);

    assert!(output.status.success());
    let written = std::fs::read_to_string(dir.path().join("out.yaml")).unwrap();
    assert!(written.contains("2018-07-20 18:14:00"));
    // Aucun cache ouvert, donc aucun fichier de cache écrit
    assert!(!dir.path().join("geocoding_cache.json").exists());
}

#[test]
fn test_rate_limit_out_of_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("trip.gpx"), r#"<gpx version="1.1"/>"#).unwrap();

    let output = run_gpxutil(dir.path(), &["--rate-limit", "1e20", "i", "trip.gpx"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid rate limit"));
}
