use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use chrono::{Datelike, NaiveDate};

use crate::error::{CoreError, CoreResult};
use crate::metrics::{stream_misses_total, table_cache_hits_total, table_loads_total, Metrics};
use crate::storage::{load_activities, load_stream, stream_file_name};
use crate::types::{Activity, RowRef, Table, Variant, YearSummary};

/// Tilgang til aktivitetsdata. Begge varianter (raw/moving) er alltid
/// tilgjengelige; en implementasjon uten egen moving-kilde må selv falle
/// tilbake til raw.
pub trait ActivityRepository {
    /// Hele tabellen for en variant, sortert synkende på lokal starttid.
    fn get_table(&self, variant: Variant) -> CoreResult<Arc<Table>>;

    /// Stream-data for én aktivitet. Tom tabell hvis den mangler.
    fn get_stream(&self, activity_id: i64) -> Table;

    /// Tøm all cache; neste oppslag laster på nytt.
    fn invalidate(&self);

    fn get_activity(&self, activity_id: i64, variant: Variant) -> CoreResult<Option<Activity>> {
        let table = self.get_table(variant)?;
        Ok(find_activity(&table, activity_id))
    }

    fn get_activities(
        &self,
        variant: Variant,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> CoreResult<Vec<Activity>> {
        let table = self.get_table(variant)?;
        Ok(to_activities(&filter_by_date(&table, start_date, end_date)))
    }

    /// Årsaggregat, alltid fra raw-varianten.
    fn get_year_summary(&self, year: i32) -> CoreResult<YearSummary> {
        let table = self.get_table(Variant::Raw)?;
        Ok(summarize_year(&table, year))
    }
}

/// Første rad med gitt id.
pub fn find_activity(table: &Table, activity_id: i64) -> Option<Activity> {
    let row = table
        .iter()
        .find(|r| r.number("id").map(|v| v as i64) == Some(activity_id))?;
    activity_or_warn(&row)
}

/// Rad som ikke lar seg gjøre om til en aktivitet (mangler starttid) logges.
fn activity_or_warn(row: &RowRef<'_>) -> Option<Activity> {
    let activity = Activity::from_row(row);
    if activity.is_none() {
        match row.number("id") {
            Some(id) => log::warn!("aktivitet {} mangler gyldig starttid, hoppes over", id as i64),
            None => log::warn!("rad {} mangler id, hoppes over", row.index()),
        }
    }
    activity
}

/// Inkluderende datofilter på lokal startdato; `None` = ubegrenset.
pub fn filter_by_date(table: &Table, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Table {
    if start.is_none() && end.is_none() {
        return table.clone();
    }
    table.filter(|r| match r.local_start().map(|ts| ts.date_naive()) {
        Some(d) => start.map_or(true, |s| d >= s) && end.map_or(true, |e| d <= e),
        None => false,
    })
}

pub fn to_activities(table: &Table) -> Vec<Activity> {
    table.iter().filter_map(|r| activity_or_warn(&r)).collect()
}

/// Summerer ett kalenderår (lokal startdato).
pub fn summarize_year(table: &Table, year: i32) -> YearSummary {
    let rows: Vec<_> = table
        .iter()
        .filter(|r| r.local_start().map(|ts| ts.year()) == Some(year))
        .collect();

    if rows.is_empty() {
        return YearSummary {
            year,
            ..Default::default()
        };
    }

    let sum = |col: &str| rows.iter().filter_map(|r| r.number(col)).sum::<f64>();

    let avg_power = if table.has_column("normalized_power") {
        let np: Vec<f64> = rows.iter().filter_map(|r| r.number("normalized_power")).collect();
        (!np.is_empty()).then(|| np.iter().sum::<f64>() / np.len() as f64)
    } else {
        None
    };
    let total_tss = table
        .has_column("training_stress_score")
        .then(|| sum("training_stress_score"));

    YearSummary {
        year,
        total_distance: sum("distance"),
        total_time: sum("moving_time"),
        total_elevation: sum("total_elevation_gain"),
        activity_count: rows.len(),
        avg_power,
        total_tss,
    }
}

#[derive(Debug, Clone)]
struct CachedTable {
    table: Arc<Table>,
    /// Filen tabellen kom fra (raw-filen når moving er et alias).
    source: PathBuf,
    mtime: SystemTime,
}

#[derive(Debug, Default)]
struct CacheState {
    raw: Option<CachedTable>,
    moving: Option<CachedTable>,
}

/// CSV-basert repository med mtime-cache per fil.
///
/// En cachet tabell er gyldig så lenge filens mtime er lik den som ble
/// registrert ved lasting. Raw og moving spores uavhengig av hverandre.
#[derive(Debug)]
pub struct CsvActivityRepository {
    raw_path: PathBuf,
    moving_path: Option<PathBuf>,
    streams_dir: Option<PathBuf>,
    cache: Mutex<CacheState>,
    metrics: Option<Arc<Metrics>>,
}

impl CsvActivityRepository {
    pub fn new(raw_path: impl Into<PathBuf>) -> Self {
        Self {
            raw_path: raw_path.into(),
            moving_path: None,
            streams_dir: None,
            cache: Mutex::new(CacheState::default()),
            metrics: Metrics::try_new()
                .map(Arc::new)
                .map_err(|e| log::warn!("kunne ikke opprette metrikker, teller ikke: {e}"))
                .ok(),
        }
    }

    pub fn with_moving(mut self, moving_path: impl Into<PathBuf>) -> Self {
        self.moving_path = Some(moving_path.into());
        self
    }

    pub fn with_streams_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.streams_dir = Some(dir.into());
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_deref()
    }

    fn count(&self, f: impl FnOnce(&Metrics)) {
        if let Some(m) = self.metrics.as_deref() {
            f(m);
        }
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    /// Konfigurert streams-katalog, ellers `<raw>/../../data/Streams`.
    pub fn streams_dir(&self) -> PathBuf {
        match &self.streams_dir {
            Some(dir) => dir.clone(),
            None => self
                .raw_path
                .parent()
                .and_then(Path::parent)
                .unwrap_or_else(|| Path::new("."))
                .join("data")
                .join("Streams"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moving-fil som faktisk finnes på disk.
    fn moving_source(&self) -> Option<&Path> {
        let path = self.moving_path.as_deref()?;
        path.exists().then_some(path)
    }

    /// Laster `path` på nytt hvis mtime er endret (eller ingenting er cachet).
    fn refresh(
        &self,
        slot: &mut Option<CachedTable>,
        path: &Path,
        variant: Variant,
    ) -> CoreResult<(Arc<Table>, SystemTime)> {
        let mtime = file_mtime(path)?;
        if let Some(cached) = slot.as_ref() {
            if cached.source == path && cached.mtime == mtime {
                self.count(|m| table_cache_hits_total(m, variant).inc());
                log::debug!("cache-treff for {variant} ({})", path.display());
                return Ok((Arc::clone(&cached.table), mtime));
            }
        }

        let table = Arc::new(load_activities(path)?);
        self.count(|m| table_loads_total(m, variant).inc());
        log::info!("{variant}-tabell (re)lastet fra {}", path.display());
        *slot = Some(CachedTable {
            table: Arc::clone(&table),
            source: path.to_path_buf(),
            mtime,
        });
        Ok((table, mtime))
    }
}

impl ActivityRepository for CsvActivityRepository {
    fn get_table(&self, variant: Variant) -> CoreResult<Arc<Table>> {
        let mut guard = self.lock();
        let CacheState { raw, moving } = &mut *guard;

        match variant {
            Variant::Raw => Ok(self.refresh(raw, &self.raw_path, Variant::Raw)?.0),
            Variant::Moving => match self.moving_source() {
                Some(path) => Ok(self.refresh(moving, path, Variant::Moving)?.0),
                None => {
                    // Alias: kopi av raw, fornyes bare når raw-filen endres.
                    let (raw_table, raw_mtime) = self.refresh(raw, &self.raw_path, Variant::Raw)?;
                    if let Some(cached) = moving.as_ref() {
                        if cached.source == self.raw_path && cached.mtime == raw_mtime {
                            self.count(|m| table_cache_hits_total(m, Variant::Moving).inc());
                            return Ok(Arc::clone(&cached.table));
                        }
                    }
                    if let Some(missing) = &self.moving_path {
                        log::warn!("fant ikke moving-fil {}, bruker raw-data", missing.display());
                    }
                    let copy = Arc::new(raw_table.as_ref().clone());
                    *moving = Some(CachedTable {
                        table: Arc::clone(&copy),
                        source: self.raw_path.clone(),
                        mtime: raw_mtime,
                    });
                    Ok(copy)
                }
            },
        }
    }

    fn get_stream(&self, activity_id: i64) -> Table {
        let path = self.streams_dir().join(stream_file_name(activity_id));
        if !path.exists() {
            log::warn!("Fant ikke stream-fil: {}", path.display());
            self.count(|m| stream_misses_total(m).inc());
            return Table::default();
        }
        match load_stream(&path) {
            Ok(table) => table,
            Err(e) => {
                log::warn!("Kunne ikke lese stream-fil {}: {e}", path.display());
                self.count(|m| stream_misses_total(m).inc());
                Table::default()
            }
        }
    }

    fn invalidate(&self) {
        let mut guard = self.lock();
        *guard = CacheState::default();
        log::debug!("tabell-cache tømt");
    }
}

fn file_mtime(path: &Path) -> CoreResult<SystemTime> {
    let meta = fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CoreError::DataNotFound(path.to_path_buf()),
        _ => CoreError::io(path, e),
    })?;
    meta.modified().map_err(|e| CoreError::io(path, e))
}
