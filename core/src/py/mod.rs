// Python-bro: JSON inn, JSON ut. Bygges bare med `--features python`.

use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use pyo3::exceptions::{PyFileNotFoundError, PyValueError};
use pyo3::prelude::*;
use pyo3::wrap_pyfunction;
use serde::Deserialize;
use serde_json::{self as json, json as json_value};
use serde_path_to_error as spte;

use crate::error::CoreError;
use crate::fitness::{
    best_recent_ftp, estimate_ftp, estimate_max_hr, estimate_weight_trend, rolling_ftp,
    DEFAULT_FTP_FACTOR, DEFAULT_ROLLING_WINDOW_DAYS,
};
use crate::goal::{Goal, GoalConfig, GoalTracker};
use crate::repository::{summarize_year, ActivityRepository, CsvActivityRepository};
use crate::storage::load_activities;
use crate::types::Variant;

// ──────────────────────────────────────────────────────────────────────────────
// Feilmapping
// ──────────────────────────────────────────────────────────────────────────────

fn to_py_err(e: anyhow::Error) -> PyErr {
    match e.downcast_ref::<CoreError>() {
        Some(CoreError::DataNotFound(path)) => {
            PyFileNotFoundError::new_err(format!("data file not found: {}", path.display()))
        }
        _ => PyValueError::new_err(format!("{e:#}")),
    }
}

/// "YYYY-MM-DD" (midnatt) eller full ISO-tid uten sone.
fn parse_when(raw: &str) -> anyhow::Result<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .with_context(|| format!("invalid date '{raw}'"))
}

// ──────────────────────────────────────────────────────────────────────────────
// Mål
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GoalIn {
    start_wkg: f64,
    target_wkg: f64,
    start_date: String,
    target_date: String,
}

#[derive(Debug, Deserialize)]
struct GoalSummaryIn {
    current_ftp: f64,
    #[serde(alias = "rider_weight_kg")]
    weight_kg: f64,
    goal: GoalIn,
    #[serde(default)]
    now: Option<String>,
    #[serde(default)]
    config: Option<GoalConfig>,
}

fn goal_summary_from_json(json_in: &str) -> anyhow::Result<String> {
    let mut de = json::Deserializer::from_str(json_in);
    let parsed: GoalSummaryIn = spte::deserialize(&mut de)
        .map_err(|e| anyhow::anyhow!("parse error (goal summary) at {}: {}", e.path(), e.inner()))?;

    let goal = Goal {
        start_wkg: parsed.goal.start_wkg,
        target_wkg: parsed.goal.target_wkg,
        start_date: parse_when(&parsed.goal.start_date).context("goal.start_date")?,
        target_date: parse_when(&parsed.goal.target_date).context("goal.target_date")?,
    };

    let tracker = match parsed.now.as_deref() {
        Some(now) => GoalTracker::at(parse_when(now).context("now")?),
        None => GoalTracker::new(),
    };
    let tracker = tracker.with_config(parsed.config.unwrap_or_default());

    let summary = tracker.summary(parsed.current_ftp, parsed.weight_kg, &goal)?;
    Ok(json::to_string(&summary)?)
}

#[pyfunction]
fn goal_summary_json(json_in: &str) -> PyResult<String> {
    goal_summary_from_json(json_in).map_err(to_py_err)
}

// ──────────────────────────────────────────────────────────────────────────────
// Fitness / årssammendrag
// ──────────────────────────────────────────────────────────────────────────────

fn estimate_fitness_for(path: &str, factor: f64, window_days: u32) -> anyhow::Result<String> {
    let table = load_activities(&PathBuf::from(path))?;
    let ftp = estimate_ftp(&table, factor);
    let rolling = rolling_ftp(&ftp, window_days);

    let out = json_value!({
        "current_ftp": best_recent_ftp(&rolling),
        "ftp": ftp,
        "rolling_ftp": rolling,
        "max_hr": estimate_max_hr(&table),
        "weight": estimate_weight_trend(&table),
    });
    Ok(out.to_string())
}

#[pyfunction]
#[pyo3(signature = (path, factor = DEFAULT_FTP_FACTOR, window_days = DEFAULT_ROLLING_WINDOW_DAYS))]
fn estimate_fitness_json(path: &str, factor: f64, window_days: u32) -> PyResult<String> {
    estimate_fitness_for(path, factor, window_days).map_err(to_py_err)
}

#[pyfunction]
fn year_summary_json(path: &str, year: i32) -> PyResult<String> {
    let run = || -> anyhow::Result<String> {
        let table = load_activities(&PathBuf::from(path))?;
        Ok(json::to_string(&summarize_year(&table, year))?)
    };
    run().map_err(to_py_err)
}

// ──────────────────────────────────────────────────────────────────────────────
// Cachet aktivitetslager
// ──────────────────────────────────────────────────────────────────────────────

#[pyclass(name = "ActivityStore")]
struct PyActivityStore {
    repo: CsvActivityRepository,
}

#[pymethods]
impl PyActivityStore {
    #[new]
    #[pyo3(signature = (raw_path, moving_path = None, streams_dir = None))]
    fn new(raw_path: String, moving_path: Option<String>, streams_dir: Option<String>) -> Self {
        let mut repo = CsvActivityRepository::new(raw_path);
        if let Some(p) = moving_path {
            repo = repo.with_moving(p);
        }
        if let Some(d) = streams_dir {
            repo = repo.with_streams_dir(d);
        }
        Self { repo }
    }

    #[pyo3(signature = (variant = "raw"))]
    fn table_json(&self, variant: &str) -> PyResult<String> {
        let run = || -> anyhow::Result<String> {
            let variant: Variant = variant.parse()?;
            let table = self.repo.get_table(variant)?;
            Ok(json::to_string(&table.to_records())?)
        };
        run().map_err(to_py_err)
    }

    /// JSON for én aktivitet, eller `None` hvis id ikke finnes.
    #[pyo3(signature = (activity_id, variant = "raw"))]
    fn activity_json(&self, activity_id: i64, variant: &str) -> PyResult<Option<String>> {
        let run = || -> anyhow::Result<Option<String>> {
            let variant: Variant = variant.parse()?;
            match self.repo.get_activity(activity_id, variant)? {
                Some(a) => Ok(Some(json::to_string(&a)?)),
                None => Ok(None),
            }
        };
        run().map_err(to_py_err)
    }

    fn stream_json(&self, activity_id: i64) -> PyResult<String> {
        json::to_string(&self.repo.get_stream(activity_id).to_records())
            .map_err(|e| PyValueError::new_err(e.to_string()))
    }

    fn invalidate(&self) {
        self.repo.invalidate();
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// PyO3-MODUL
// ──────────────────────────────────────────────────────────────────────────────

#[pymodule]
fn activities_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(goal_summary_json, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_fitness_json, m)?)?;
    m.add_function(wrap_pyfunction!(year_summary_json, m)?)?;
    m.add_class::<PyActivityStore>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_summary_round_trip() {
        let out = goal_summary_from_json(
            r#"{"current_ftp": 262.5, "weight_kg": 75.0,
                "goal": {"start_wkg": 3.0, "target_wkg": 4.0,
                         "start_date": "2025-01-01", "target_date": "2025-01-21"},
                "now": "2025-01-11"}"#,
        )
        .unwrap();
        let v: json::Value = json::from_str(&out).unwrap();
        assert_eq!(v["status"], "on_track");
        assert_eq!(v["status_label"], "On Track");
    }

    #[test]
    fn bad_field_names_json_path() {
        let err = goal_summary_from_json(r#"{"current_ftp": "x", "weight_kg": 75.0}"#).unwrap_err();
        assert!(format!("{err:#}").contains("current_ftp"));
    }
}
