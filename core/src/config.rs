use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_path_to_error as spte;

use crate::error::{CoreError, CoreResult};
use crate::goal::{Goal, GoalConfig, DEFAULT_TOLERANCE_PERCENT};
use crate::repository::CsvActivityRepository;

/// Prefiks for miljøvariabler som overstyrer innstillinger.
pub const ENV_PREFIX: &str = "ACTIVITIES_VIEWER";

/// Innstillinger for data-stier, utøverprofil og målberegning.
///
/// Alle felt har standardverdi, så en tom `{}` er gyldig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub activities_raw_file: PathBuf,
    pub activities_moving_file: PathBuf,
    pub streams_dir: PathBuf,

    pub ftp: f64,
    #[serde(alias = "rider_weight_kg")]
    pub weight_kg: f64,
    pub max_hr: u32,
    /// Critical power (W). 0 = ukjent.
    pub cp: f64,
    /// W' (J). 0 = ukjent.
    pub w_prime: f64,

    /// Mål, ISO-datoer (`YYYY-MM-DD`).
    pub target_wkg: Option<f64>,
    pub target_date: Option<String>,
    pub baseline_ftp: Option<f64>,
    pub baseline_date: Option<String>,

    pub achievable_weekly_gain: f64,
    pub challenging_weekly_gain: f64,

    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let goals = GoalConfig::default();
        Self {
            data_dir: PathBuf::from("data"),
            activities_raw_file: PathBuf::from("activities_raw.csv"),
            activities_moving_file: PathBuf::from("activities_moving.csv"),
            streams_dir: PathBuf::from("Streams"),
            ftp: 285.0,
            weight_kg: 77.0,
            max_hr: 185,
            cp: 0.0,
            w_prime: 0.0,
            target_wkg: None,
            target_date: None,
            baseline_ftp: None,
            baseline_date: None,
            achievable_weekly_gain: goals.achievable_weekly_gain,
            challenging_weekly_gain: goals.challenging_weekly_gain,
            verbose: false,
        }
    }
}

/// Leser innstillinger fra JSON.
/// Hvis filen ikke finnes, returneres standardverdier.
pub fn load_settings(path: impl AsRef<Path>) -> anyhow::Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!("⚠️ Fant ikke innstillinger på {}, bruker standardverdier", path.display());
        return Ok(Settings::default());
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    let settings = parse_settings(&contents)
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    log::info!("📂 Innstillinger lastet fra {}", path.display());
    Ok(settings)
}

/// Tolker innstillinger fra en JSON-streng. Feilmeldingen peker på feltet.
pub fn parse_settings(json: &str) -> CoreResult<Settings> {
    let mut de = serde_json::Deserializer::from_str(json);
    spte::deserialize(&mut de)
        .map_err(|e| CoreError::Config(format!("settings parse at {}: {}", e.path(), e.inner())))
}

impl Settings {
    /// Overstyrer fra miljøet (`ACTIVITIES_VIEWER_DATA_DIR`, `_FTP`,
    /// `_WEIGHT_KG`, `_MAX_HR`). Ugyldige tall ignoreres med advarsel.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{ENV_PREFIX}_{key}")).ok());
    }

    /// Som [`Settings::apply_env_overrides`], men med vilkårlig oppslag.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("DATA_DIR").filter(|s| !s.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(v) = parse_override(&lookup, "FTP") {
            self.ftp = v;
        }
        if let Some(v) = parse_override(&lookup, "WEIGHT_KG") {
            self.weight_kg = v;
        }
        if let Some(v) = parse_override(&lookup, "MAX_HR") {
            self.max_hr = v;
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !(self.ftp > 0.0) {
            return Err(CoreError::Config(format!("ftp must be > 0, got {}", self.ftp)));
        }
        if !(self.weight_kg > 0.0) {
            return Err(CoreError::Config(format!(
                "weight_kg must be > 0, got {}",
                self.weight_kg
            )));
        }
        if self.max_hr == 0 {
            return Err(CoreError::Config("max_hr must be > 0".into()));
        }
        if let Some(t) = self.target_wkg {
            if !(t > 0.0) {
                return Err(CoreError::Config(format!("target_wkg must be > 0, got {t}")));
            }
        }
        Ok(())
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.data_dir.join(p)
        }
    }

    pub fn raw_path(&self) -> PathBuf {
        self.resolve(&self.activities_raw_file)
    }

    pub fn moving_path(&self) -> PathBuf {
        self.resolve(&self.activities_moving_file)
    }

    pub fn streams_path(&self) -> PathBuf {
        self.resolve(&self.streams_dir)
    }

    pub fn goal_config(&self) -> GoalConfig {
        GoalConfig {
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            achievable_weekly_gain: self.achievable_weekly_gain,
            challenging_weekly_gain: self.challenging_weekly_gain,
        }
    }

    /// Mål fra innstillingene, eller `None` når mål-W/kg eller måldato mangler.
    pub fn goal(&self) -> CoreResult<Option<Goal>> {
        let (Some(target_wkg), Some(target_date)) = (self.target_wkg, self.target_date.as_deref()) else {
            return Ok(None);
        };
        if !(self.weight_kg > 0.0) {
            return Err(CoreError::InvalidInput(format!(
                "weight_kg must be positive, got {}",
                self.weight_kg
            )));
        }

        let target_date = parse_date("target_date", target_date)?;
        let start_date = match self.baseline_date.as_deref() {
            Some(s) => parse_date("baseline_date", s)?,
            None => Local::now().date_naive(),
        };
        let start_wkg = self.baseline_ftp.unwrap_or(self.ftp) / self.weight_kg;

        Ok(Some(Goal::new(start_wkg, target_wkg, start_date, target_date)))
    }

    /// Repository for stiene i innstillingene.
    pub fn repository(&self) -> CsvActivityRepository {
        CsvActivityRepository::new(self.raw_path())
            .with_moving(self.moving_path())
            .with_streams_dir(self.streams_path())
    }
}

fn parse_date(field: &str, raw: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| CoreError::InvalidInput(format!("{field}: '{raw}' is not YYYY-MM-DD ({e})")))
}

fn parse_override<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignorerer ugyldig {ENV_PREFIX}_{key}={raw:?}");
            None
        }
    }
}
