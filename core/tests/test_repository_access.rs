use activities_core::metrics::stream_misses_total;
use activities_core::storage::parse_activities;
use activities_core::{ActivityRepository, CoreResult, CsvActivityRepository, Table, Variant};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const ACTIVITIES: &str = "\
id;name;type;sport_type;start_date;start_date_local;distance;moving_time;elapsed_time;total_elevation_gain;normalized_power;training_stress_score;average_speed
101;Morgentur;Ride;Ride;2025-01-10T06:00:00Z;2025-01-10T07:00:00+01:00;20000;3600;3900;200;220;60;5.5
102;Intervaller;Ride;Ride;2025-02-14T16:00:00Z;2025-02-14T17:00:00+01:00;30000;5400;5600;350;;80;5.6
103;Langtur;Ride;Ride;2025-12-31T22:30:00Z;2025-12-31T23:30:00+01:00;10000;1800;1800;50;260;;5.5
104;Nyttår;Ride;Ride;2025-12-31T23:30:00Z;2026-01-01T00:30:00+01:00;5000;900;900;10;200;20;5.5
";

fn setup(dir: &Path) -> CsvActivityRepository {
    let raw = dir.join("activities_raw.csv");
    fs::write(&raw, ACTIVITIES).unwrap();
    CsvActivityRepository::new(raw).with_streams_dir(dir.join("Streams"))
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

#[test]
fn get_activity_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup(dir.path());

    let a = repo.get_activity(102, Variant::Raw).unwrap().expect("finnes");
    assert_eq!(a.name, "Intervaller");
    assert_eq!(a.moving_time, Some(5400.0));
    assert_eq!(a.metric("training_stress_score"), Some(80.0));
    assert_eq!(a.date_str(), "2025-02-14");
    assert_eq!(a.duration_hm(), "1h 30m");
    assert_eq!(a.distance_km(), Some(30.0));

    assert!(repo.get_activity(999, Variant::Raw).unwrap().is_none());
}

#[test]
fn date_filter_is_inclusive_on_local_date() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup(dir.path());

    let acts = repo
        .get_activities(Variant::Raw, Some(d(2025, 1, 10)), Some(d(2025, 2, 14)))
        .unwrap();
    let ids: Vec<i64> = acts.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![102, 101]);

    // Lokal dato avgjør, ikke UTC
    let acts = repo.get_activities(Variant::Raw, Some(d(2026, 1, 1)), None).unwrap();
    assert_eq!(acts.iter().map(|a| a.id).collect::<Vec<_>>(), vec![104]);

    let all = repo.get_activities(Variant::Raw, None, None).unwrap();
    assert_eq!(all.len(), 4);
}

#[test]
fn year_summary_aggregates_local_year() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup(dir.path());

    let s = repo.get_year_summary(2025).unwrap();
    assert_eq!(s.year, 2025);
    assert_eq!(s.activity_count, 3);
    assert_eq!(s.total_distance, 60000.0);
    assert_eq!(s.total_time, 10800.0);
    assert_eq!(s.total_elevation, 600.0);
    // snitt av ikke-tomme NP-verdier: (220 + 260) / 2
    assert_eq!(s.avg_power, Some(240.0));
    assert_eq!(s.total_tss, Some(140.0));
}

#[test]
fn empty_year_is_zeroed_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup(dir.path());

    let s = repo.get_year_summary(2020).unwrap();
    assert_eq!(s.activity_count, 0);
    assert_eq!(s.total_distance, 0.0);
    assert_eq!(s.avg_power, None);
    assert_eq!(s.total_tss, None);
}

#[test]
fn summary_without_optional_columns() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("activities_raw.csv");
    fs::write(
        &raw,
        "id;start_date_local;distance;moving_time;total_elevation_gain\n1;2025-05-01T10:00:00+02:00;1000;60;5\n",
    )
    .unwrap();
    let repo = CsvActivityRepository::new(raw);

    let s = repo.get_year_summary(2025).unwrap();
    assert_eq!(s.activity_count, 1);
    assert_eq!(s.avg_power, None);
    assert_eq!(s.total_tss, None);
}

#[test]
fn stream_is_loaded_by_activity_id() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup(dir.path());
    fs::create_dir_all(dir.path().join("Streams")).unwrap();
    fs::write(
        dir.path().join("Streams").join("stream_101.csv"),
        "time;watts;heartrate\n0;180;120\n1;185;121\n2;190;123\n",
    )
    .unwrap();

    let s = repo.get_stream(101);
    assert_eq!(s.len(), 3);
    assert_eq!(s.row(2).unwrap().number("watts"), Some(190.0));
}

#[test]
fn missing_stream_is_empty_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let repo = setup(dir.path());

    let s = repo.get_stream(555);
    assert!(s.is_empty());
    assert!(s.columns().is_empty());
    assert_eq!(stream_misses_total(repo.metrics().expect("metrikker")).get(), 1);
}

#[test]
fn stream_dir_defaults_next_to_data() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("export").join("activities_raw.csv");
    let repo = CsvActivityRepository::new(&raw);
    assert_eq!(repo.streams_dir(), dir.path().join("data").join("Streams"));
}

/// Minimal repository uten egen logikk; alle oppslag går via trait-standardene.
struct InMemory(Arc<Table>);

impl ActivityRepository for InMemory {
    fn get_table(&self, _variant: Variant) -> CoreResult<Arc<Table>> {
        Ok(Arc::clone(&self.0))
    }

    fn get_stream(&self, _activity_id: i64) -> Table {
        Table::default()
    }

    fn invalidate(&self) {}
}

fn in_memory() -> InMemory {
    let table = parse_activities(ACTIVITIES.as_bytes(), Path::new("minne.csv")).unwrap();
    InMemory(Arc::new(table))
}

#[test]
fn trait_defaults_work_for_any_repository() {
    let repo = in_memory();

    let a = repo.get_activity(101, Variant::Moving).unwrap().expect("finnes");
    assert_eq!(a.name, "Morgentur");
    assert!(repo.get_activity(999, Variant::Raw).unwrap().is_none());

    let s = repo.get_year_summary(2025).unwrap();
    assert_eq!(s.activity_count, 3);
    assert_eq!(s.total_distance, 60000.0);

    let acts = repo.get_activities(Variant::Raw, Some(d(2025, 12, 31)), None).unwrap();
    assert_eq!(acts.len(), 2);
}

#[test]
fn row_without_start_time_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("activities_raw.csv");
    fs::write(
        &raw,
        "id;name;start_date;start_date_local;distance\n\
         1;Uten tid;;;1000\n\
         2;Med tid;2025-05-01T08:00:00Z;2025-05-01T10:00:00+02:00;2000\n",
    )
    .unwrap();
    let repo = CsvActivityRepository::new(raw);

    assert_eq!(repo.get_table(Variant::Raw).unwrap().len(), 2);
    assert!(repo.get_activity(1, Variant::Raw).unwrap().is_none());
    let all = repo.get_activities(Variant::Raw, None, None).unwrap();
    assert_eq!(all.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2]);
}
