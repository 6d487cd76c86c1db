use activities_core::config::parse_settings;
use activities_core::{load_settings, CoreError, Settings};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

#[test]
fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let s = load_settings(dir.path().join("settings.json")).unwrap();
    assert_eq!(s, Settings::default());
    assert_eq!(s.ftp, 285.0);
    assert_eq!(s.weight_kg, 77.0);
    assert_eq!(s.max_hr, 185);
    assert!(s.validate().is_ok());
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, r#"{"ftp": 300, "rider_weight_kg": 72.5, "data_dir": "/srv/strava"}"#).unwrap();

    let s = load_settings(&path).unwrap();
    assert_eq!(s.ftp, 300.0);
    assert_eq!(s.weight_kg, 72.5);
    assert_eq!(s.max_hr, 185);
    assert_eq!(s.raw_path(), PathBuf::from("/srv/strava/activities_raw.csv"));
    assert_eq!(s.moving_path(), PathBuf::from("/srv/strava/activities_moving.csv"));
}

#[test]
fn invalid_field_is_reported_with_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, r#"{"ftp": "mye"}"#).unwrap();

    let err = load_settings(&path).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("ftp"), "{msg}");
    assert!(msg.contains("settings.json"), "{msg}");
}

#[test]
fn parse_error_is_config_error() {
    assert!(matches!(parse_settings(r#"{"max_hr": -1}"#), Err(CoreError::Config(_))));
}

#[test]
fn validate_rejects_non_positive_values() {
    let mut s = Settings::default();
    s.weight_kg = 0.0;
    assert!(matches!(s.validate(), Err(CoreError::Config(_))));

    let mut s = Settings::default();
    s.target_wkg = Some(-1.0);
    assert!(matches!(s.validate(), Err(CoreError::Config(_))));
}

#[test]
fn overrides_from_lookup() {
    let mut s = Settings::default();
    s.apply_overrides(|key| match key {
        "DATA_DIR" => Some("/data/alt".to_string()),
        "WEIGHT_KG" => Some("74".to_string()),
        "FTP" => Some("ikke-et-tall".to_string()),
        _ => None,
    });
    assert_eq!(s.data_dir, PathBuf::from("/data/alt"));
    assert_eq!(s.weight_kg, 74.0);
    assert_eq!(s.ftp, 285.0);
}

#[test]
fn goal_from_settings() {
    let s = parse_settings(
        r#"{"ftp": 280, "weight_kg": 70, "baseline_ftp": 245,
            "target_wkg": 4.0, "target_date": "2025-04-11", "baseline_date": "2025-01-01"}"#,
    )
    .unwrap();
    let g = s.goal().unwrap().expect("mål");
    assert_eq!(g.start_wkg, 3.5);
    assert_eq!(g.target_wkg, 4.0);
    assert_eq!(g.start_date.date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    assert_eq!(g.total_days(), 100);
}

#[test]
fn goal_without_baseline_uses_current_ftp() {
    let s = parse_settings(r#"{"ftp": 280, "weight_kg": 70, "target_wkg": 4.5, "target_date": "2030-01-01"}"#)
        .unwrap();
    let g = s.goal().unwrap().unwrap();
    assert_eq!(g.start_wkg, 4.0);
}

#[test]
fn no_goal_when_target_missing() {
    assert!(Settings::default().goal().unwrap().is_none());
}

#[test]
fn bad_goal_date_is_invalid_input() {
    let s = parse_settings(r#"{"target_wkg": 4.0, "target_date": "11.04.2025"}"#).unwrap();
    assert!(matches!(s.goal(), Err(CoreError::InvalidInput(_))));
}

#[test]
fn repository_uses_resolved_paths() {
    let s = parse_settings(r#"{"data_dir": "/srv/data", "streams_dir": "/mnt/streams"}"#).unwrap();
    let repo = s.repository();
    assert_eq!(repo.raw_path(), PathBuf::from("/srv/data/activities_raw.csv"));
    assert_eq!(repo.streams_dir(), PathBuf::from("/mnt/streams"));
}

#[test]
fn goal_heuristics_are_configurable() {
    let s = parse_settings(r#"{"achievable_weekly_gain": 0.02}"#).unwrap();
    let cfg = s.goal_config();
    assert_eq!(cfg.achievable_weekly_gain, 0.02);
    assert_eq!(cfg.challenging_weekly_gain, 0.025);
    assert_eq!(cfg.tolerance_percent, 10.0);
}
