use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Én celle i en aktivitetstabell. `Null` brukes for alt som mangler
/// eller ikke lot seg tolke (parse-or-null).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
    Timestamp(DateTime<FixedOffset>),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Tall-verdi; tekst tolkes med parse-or-null.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Cell::Timestamp(ts) => Some(*ts),
            Cell::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        if v.is_nan() {
            Cell::Null
        } else {
            Cell::Number(v)
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(v: Option<f64>) -> Self {
        v.map(Cell::from).unwrap_or(Cell::Null)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<DateTime<FixedOffset>> for Cell {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Cell::Timestamp(ts)
    }
}

/// Tolker et tall; tomt, "nan" og annet søppel blir `None`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Tolker ISO-8601 tidsstempel. Uten offset antas UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    // "2025-06-01 10:00:00+00:00" -> RFC 3339
    let normalized = if s.len() > 10 && s.as_bytes()[10] == b' ' {
        format!("{}T{}", &s[..10], &s[11..])
    } else {
        s.to_string()
    };

    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(ts);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(Utc.from_utc_datetime(&naive).fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}

/// Radorientert tabell med fast kolonnesett (skjema).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> CoreResult<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(CoreError::InvalidInput(format!(
                "row {i} has {} cells, expected {}",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self::from_parts(columns, rows))
    }

    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), i))
            .collect();
        Self {
            columns,
            index,
            rows,
        }
    }

    /// Tom tabell med samme skjema.
    pub fn empty_like(&self) -> Self {
        Self::from_parts(self.columns.clone(), Vec::new())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, idx: usize) -> Option<RowRef<'_>> {
        (idx < self.rows.len()).then_some(RowRef { table: self, idx })
    }

    pub fn iter(&self) -> impl Iterator<Item = RowRef<'_>> + '_ {
        (0..self.rows.len()).map(move |idx| RowRef { table: self, idx })
    }

    /// Første kolonne i `candidates` som finnes i skjemaet.
    pub fn first_present<'c>(&self, candidates: &[&'c str]) -> Option<&'c str> {
        candidates.iter().copied().find(|c| self.has_column(c))
    }

    pub fn filter<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&RowRef<'_>) -> bool,
    {
        let rows = self
            .iter()
            .filter(|r| keep(r))
            .map(|r| self.rows[r.idx].clone())
            .collect();
        Self::from_parts(self.columns.clone(), rows)
    }

    pub fn head(&self, n: usize) -> Table {
        let rows = self.rows.iter().take(n).cloned().collect();
        Self::from_parts(self.columns.clone(), rows)
    }

    /// Stabil sortering på tidsstempel-kolonne; rader uten tid havner sist.
    pub fn sort_by_timestamp(&mut self, column: &str, descending: bool) {
        let Some(ci) = self.column_index(column) else {
            return;
        };
        self.rows.sort_by(|a, b| {
            match (a[ci].as_timestamp(), b[ci].as_timestamp()) {
                (Some(x), Some(y)) if descending => y.cmp(&x),
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });
    }

    /// Radene som JSON-objekter (kolonne -> verdi).
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, cell)| {
                        let v = serde_json::to_value(cell).unwrap_or(serde_json::Value::Null);
                        (c.clone(), v)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Lånt visning av én rad.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    table: &'a Table,
    idx: usize,
}

impl<'a> RowRef<'a> {
    pub fn index(&self) -> usize {
        self.idx
    }

    pub fn cell(&self, column: &str) -> Option<&'a Cell> {
        let ci = self.table.column_index(column)?;
        self.table.rows[self.idx].get(ci)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&'a str, &'a Cell)> + 'a {
        self.table
            .columns
            .iter()
            .map(String::as_str)
            .zip(self.table.rows[self.idx].iter())
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.cell(column).and_then(Cell::as_number)
    }

    pub fn text(&self, column: &str) -> Option<&'a str> {
        self.cell(column).and_then(Cell::as_text)
    }

    pub fn timestamp(&self, column: &str) -> Option<DateTime<FixedOffset>> {
        self.cell(column).and_then(Cell::as_timestamp)
    }

    /// Lokal starttid, med `start_date` som reserve.
    pub fn local_start(&self) -> Option<DateTime<FixedOffset>> {
        self.timestamp("start_date_local")
            .or_else(|| self.timestamp("start_date"))
    }
}

/// Hvilken variant av datasettet: hele økta eller bare tid i bevegelse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Raw,
    Moving,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Raw => "raw",
            Variant::Moving => "moving",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Variant {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Variant::Raw),
            "moving" => Ok(Variant::Moving),
            other => Err(CoreError::InvalidInput(format!("unknown variant: {other}"))),
        }
    }
}

/// Metrikkvisning valgt i UI: total tid eller tid i bevegelse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricView {
    #[default]
    RawTime,
    MovingTime,
}

impl MetricView {
    pub fn variant(self) -> Variant {
        match self {
            MetricView::RawTime => Variant::Raw,
            MetricView::MovingTime => Variant::Moving,
        }
    }
}

/// Typet visning av én aktivitet (én rad).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Activity {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub sport_type: String,
    pub start_date: DateTime<Utc>,
    pub start_date_local: DateTime<FixedOffset>,
    pub distance: Option<f64>,        // meter
    pub moving_time: Option<f64>,     // sek
    pub elapsed_time: Option<f64>,    // sek
    pub total_elevation_gain: Option<f64>, // meter
    /// Alle øvrige kolonner, uendret.
    pub fields: BTreeMap<String, Cell>,
}

const CORE_FIELDS: [&str; 10] = [
    "id",
    "name",
    "type",
    "sport_type",
    "start_date",
    "start_date_local",
    "distance",
    "moving_time",
    "elapsed_time",
    "total_elevation_gain",
];

impl Activity {
    /// Bygger en aktivitet fra en rad. `None` hvis id eller starttid mangler.
    pub fn from_row(row: &RowRef<'_>) -> Option<Self> {
        let id = row.number("id")?;
        let start_date_local = row.local_start()?;
        let start_date = row
            .timestamp("start_date")
            .unwrap_or(start_date_local)
            .with_timezone(&Utc);

        let fields = row
            .cells()
            .filter(|(c, _)| !CORE_FIELDS.contains(c))
            .map(|(c, cell)| (c.to_string(), cell.clone()))
            .collect();

        let activity = Activity {
            id: id as i64,
            name: row.text("name").unwrap_or_default().to_string(),
            activity_type: row.text("type").unwrap_or_default().to_string(),
            sport_type: row.text("sport_type").unwrap_or_default().to_string(),
            start_date,
            start_date_local,
            distance: row.number("distance"),
            moving_time: row.number("moving_time"),
            elapsed_time: row.number("elapsed_time"),
            total_elevation_gain: row.number("total_elevation_gain"),
            fields,
        };

        if let (Some(m), Some(e)) = (activity.moving_time, activity.elapsed_time) {
            if m > e {
                log::warn!(
                    "aktivitet {}: moving_time ({m}) > elapsed_time ({e})",
                    activity.id
                );
            }
        }
        Some(activity)
    }

    /// Numerisk metrikk fra de øvrige kolonnene.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(Cell::as_number)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Cell::as_text)
    }

    pub fn local_date(&self) -> NaiveDate {
        self.start_date_local.date_naive()
    }

    pub fn date_str(&self) -> String {
        self.local_date().format("%Y-%m-%d").to_string()
    }

    pub fn distance_km(&self) -> Option<f64> {
        self.distance.map(|d| d / 1000.0)
    }

    /// km/t fra `average_speed` (m/s).
    pub fn speed_kmh(&self) -> Option<f64> {
        self.metric("average_speed")
            .filter(|v| *v > 0.0)
            .map(|v| v * 3.6)
    }

    /// Bevegelsestid som "1h 5m".
    pub fn duration_hm(&self) -> String {
        let secs = self.moving_time.unwrap_or(0.0).max(0.0) as u64;
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Aggregat for ett kalenderår.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    pub total_distance: f64,
    pub total_time: f64,
    pub total_elevation: f64,
    pub activity_count: usize,
    pub avg_power: Option<f64>,
    pub total_tss: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_number_is_parse_or_null() {
        assert_eq!(parse_number(" 210.5 "), Some(210.5));
        assert_eq!(parse_number("nan"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("Polarized"), None);
    }

    #[test]
    fn parse_timestamp_variants() {
        let a = parse_timestamp("2025-06-01T10:00:00+02:00").unwrap();
        assert_eq!(a.date_naive(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        let b = parse_timestamp("2025-06-01 08:00:00+00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_timestamp("2025-06-01T08:00:00Z").is_some());
        assert!(parse_timestamp("2025-06-01 08:00:00").is_some());
        assert!(parse_timestamp("2024-06-01").is_some());
        assert!(parse_timestamp("i går").is_none());
    }

    #[test]
    fn table_rejects_ragged_rows() {
        let cols = vec!["a".to_string(), "b".to_string()];
        let res = Table::new(cols, vec![vec![Cell::Null]]);
        assert!(matches!(res, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn sort_puts_missing_timestamps_last() {
        let cols = vec!["start_date_local".to_string()];
        let mut t = Table::new(
            cols,
            vec![
                vec![Cell::from("2024-01-01")],
                vec![Cell::Null],
                vec![Cell::from("2024-03-01")],
            ],
        )
        .unwrap();
        t.sort_by_timestamp("start_date_local", true);
        let first = t.row(0).unwrap().timestamp("start_date_local").unwrap();
        assert_eq!(first.date_naive(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(t.row(2).unwrap().cell("start_date_local").unwrap().is_null());
    }
}
