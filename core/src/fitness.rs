//! Auto-estimering av FTP, makspuls og vekt fra historiske aktiviteter.
//!
//! Alle funksjoner er rene: tom tabell eller manglende kolonner gir tomt
//! resultat, aldri feil. Kolonnevalg skjer i fast prioritet – første
//! kolonne i listen som finnes i skjemaet vinner, senere treff ignoreres
//! selv om de har verdier.

use chrono::{DateTime, FixedOffset, NaiveDate};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::smoothing::{daily_max, rolling_max_by_day};
use crate::types::{RowRef, Table};

/// Beste 20-min effekt, i prioritert rekkefølge.
pub const FTP_POWER_COLUMNS: [&str; 4] = ["best_power_20min", "mmp_20min", "power_curve_20min", "mmp_1200"];

pub const MAX_HR_COLUMNS: [&str; 3] = ["max_heartrate", "max_hr", "max_heart_rate"];

pub const WEIGHT_COLUMNS: [&str; 3] = ["rider_weight_kg", "weight_kg", "athlete_weight"];

/// Coggan: FTP ≈ 95 % av beste 20-min effekt.
pub const DEFAULT_FTP_FACTOR: f64 = 0.95;

pub const DEFAULT_ROLLING_WINDOW_DAYS: u32 = 42;

pub const MAX_HR_TOP_N: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FtpEstimate {
    pub date: DateTime<FixedOffset>,
    pub best_20min_power: f64,
    pub estimated_ftp: f64,
    pub activity_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxHrSample {
    pub date: DateTime<FixedOffset>,
    pub max_hr_recorded: u32,
    pub activity_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSample {
    pub date: DateTime<FixedOffset>,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingFtp {
    pub date: NaiveDate,
    pub rolling_ftp: f64,
}

/// (dato, verdi, navn) for rader med både dato og verdi i `column`.
fn samples<'t>(table: &'t Table, column: &'t str) -> impl Iterator<Item = (DateTime<FixedOffset>, f64, RowRef<'t>)> + 't {
    table
        .iter()
        .filter_map(move |r| Some((r.local_start()?, r.number(column)?, r)))
}

fn activity_name(row: &RowRef<'_>) -> String {
    row.text("name").unwrap_or_default().to_string()
}

/// FTP-estimat per aktivitet, nyeste først.
pub fn estimate_ftp(table: &Table, factor: f64) -> Vec<FtpEstimate> {
    let Some(column) = table.first_present(&FTP_POWER_COLUMNS) else {
        return Vec::new();
    };

    let mut out: Vec<FtpEstimate> = samples(table, column)
        .map(|(date, best, row)| FtpEstimate {
            date,
            best_20min_power: best,
            estimated_ftp: (best * factor).round(),
            activity_name: activity_name(&row),
        })
        .collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}

/// Høyeste registrerte makspuls, sortert synkende og begrenset til topp 50.
pub fn estimate_max_hr(table: &Table) -> Vec<MaxHrSample> {
    let Some(column) = table.first_present(&MAX_HR_COLUMNS) else {
        return Vec::new();
    };

    let mut out: Vec<MaxHrSample> = samples(table, column)
        .map(|(date, hr, row)| MaxHrSample {
            date,
            // heltall, trunkert
            max_hr_recorded: hr.max(0.0) as u32,
            activity_name: activity_name(&row),
        })
        .collect();
    out.sort_by_key(|s| std::cmp::Reverse(s.max_hr_recorded));
    out.truncate(MAX_HR_TOP_N);
    out
}

/// Vektutvikling i kronologisk rekkefølge.
pub fn estimate_weight_trend(table: &Table) -> Vec<WeightSample> {
    let Some(column) = table.first_present(&WEIGHT_COLUMNS) else {
        return Vec::new();
    };

    let mut out: Vec<WeightSample> = samples(table, column)
        .map(|(date, weight_kg, _)| WeightSample { date, weight_kg })
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date));
    out
}

/// Rullende maks-FTP: én verdi per kalenderdag (dagens maks), deretter
/// maksimum over de siste `window_days` dagene inkludert dagen selv.
pub fn rolling_ftp(estimates: &[FtpEstimate], window_days: u32) -> Vec<RollingFtp> {
    let daily = daily_max(
        estimates
            .iter()
            .map(|e| (e.date.date_naive(), e.estimated_ftp)),
    );
    rolling_max_by_day(&daily, window_days)
        .into_iter()
        .map(|(date, rolling_ftp)| RollingFtp { date, rolling_ftp })
        .collect()
}

/// Siste verdi i den rullende serien, dvs. dagens "nåværende FTP".
pub fn best_recent_ftp(rolling: &[RollingFtp]) -> Option<f64> {
    rolling.last().map(|r| r.rolling_ftp)
}

/// Median av de siste `n` vektmålingene; robust mot enkeltavvik.
pub fn recent_weight(trend: &[WeightSample], n: usize) -> Option<f64> {
    let mut last: Vec<OrderedFloat<f64>> = trend
        .iter()
        .rev()
        .take(n.max(1))
        .map(|w| OrderedFloat(w.weight_kg))
        .collect();
    if last.is_empty() {
        return None;
    }
    last.sort();
    let mid = last.len() / 2;
    let median = if last.len() % 2 == 1 {
        last[mid].0
    } else {
        (last[mid - 1].0 + last[mid].0) / 2.0
    };
    Some(median)
}
