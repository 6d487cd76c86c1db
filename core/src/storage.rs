use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use once_cell::sync::Lazy;

use crate::error::{CoreError, CoreResult};
use crate::types::{parse_number, parse_timestamp, Cell, Table};

/// Feltskilletegn i eksportene fra analyse-pipelinen.
pub const DELIMITER: u8 = b';';

/// Kolonner som tolkes som tidsstempel.
pub const TIMESTAMP_COLUMNS: [&str; 2] = ["start_date", "start_date_local"];

/// Kolonnen tabellen sorteres på (synkende) etter lasting.
pub const SORT_COLUMN: &str = "start_date_local";

/// Identitet, fritekst, geo og klassifisering – alt annet blir tall (eller null).
pub static NON_NUMERIC_COLUMNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // identitet / tid
        "name",
        "type",
        "sport_type",
        "start_date",
        "start_date_local",
        "timezone",
        // utstyr / metadata
        "gear_id",
        "device_name",
        "external_id",
        "upload_id_str",
        "visibility",
        // geo
        "location_city",
        "location_state",
        "location_country",
        "start_latlng",
        "end_latlng",
        "map.id",
        "map.summary_polyline",
        // klassifisering
        "power_tid_classification",
        "hr_tid_classification",
    ]
    .into_iter()
    .collect()
});

/// Filnavn for stream-data til en aktivitet.
pub fn stream_file_name(activity_id: i64) -> String {
    format!("stream_{activity_id}.csv")
}

/// Leser en aktivitetsfil fra disk.
///
/// Feiler med `DataNotFound` hvis filen ikke finnes. Se [`parse_activities`]
/// for tolkningen av cellene.
pub fn load_activities(path: &Path) -> CoreResult<Table> {
    if !path.exists() {
        return Err(CoreError::DataNotFound(path.to_path_buf()));
    }
    let file = File::open(path).map_err(|e| CoreError::io(path, e))?;
    let table = parse_activities(file, path)?;
    log::info!(
        "📂 Aktiviteter lastet fra {} ({} rader, {} kolonner)",
        path.display(),
        table.len(),
        table.columns().len()
    );
    Ok(table)
}

/// Tolker semikolon-separert aktivitetsdata med header.
///
/// * `start_date` / `start_date_local` blir tidsstempler
/// * kolonner i [`NON_NUMERIC_COLUMNS`] beholdes som tekst ("nan" og tom blir null)
/// * alt annet blir tall med parse-or-null
///
/// Korte rader fylles ut med null; rader med flere felt enn headeren er en feil.
/// Radene sorteres synkende på lokal starttid.
pub fn parse_activities<R: Read>(reader: R, origin: &Path) -> CoreResult<Table> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_error(origin, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if !columns.iter().any(|c| c == SORT_COLUMN) {
        return Err(CoreError::invalid_data(
            origin,
            format!("missing required column '{SORT_COLUMN}'"),
        ));
    }

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| csv_error(origin, e))?;
        // +2: header + 1-indeksering
        let line = i + 2;
        check_width(&record, columns.len(), origin, line)?;
        let mut row = Vec::with_capacity(columns.len());
        for (col, raw) in columns.iter().zip(record.iter()) {
            row.push(coerce_activity_cell(col, raw).map_err(|reason| {
                CoreError::invalid_data(origin, format!("line {line}: {reason}"))
            })?);
        }
        row.resize(columns.len(), Cell::Null);
        rows.push(row);
    }

    let mut table = Table::from_parts(columns, rows);
    table.sort_by_timestamp(SORT_COLUMN, true);
    Ok(table)
}

/// Avkortede rader er ok (manglende celler blir null), for lange rader ikke.
fn check_width(record: &csv::StringRecord, width: usize, origin: &Path, line: usize) -> CoreResult<()> {
    if record.len() > width {
        return Err(CoreError::invalid_data(
            origin,
            format!("line {line}: {} fields, header has {width}", record.len()),
        ));
    }
    if record.len() < width {
        log::debug!("{}: linje {line} har {} av {width} felt", origin.display(), record.len());
    }
    Ok(())
}

fn coerce_activity_cell(column: &str, raw: &str) -> Result<Cell, String> {
    if TIMESTAMP_COLUMNS.contains(&column) {
        if raw.trim().is_empty() {
            return Ok(Cell::Null);
        }
        return parse_timestamp(raw)
            .map(Cell::Timestamp)
            .ok_or_else(|| format!("unparseable timestamp in '{column}': {raw:?}"));
    }
    if NON_NUMERIC_COLUMNS.contains(column) {
        return Ok(text_or_null(raw));
    }
    Ok(parse_number(raw).map(Cell::Number).unwrap_or(Cell::Null))
}

fn text_or_null(raw: &str) -> Cell {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        Cell::Null
    } else {
        Cell::Text(s.to_string())
    }
}

/// Leser en stream-fil (tidsserie per aktivitet). Tall der det går, ellers tekst.
pub fn load_stream(path: &Path) -> CoreResult<Table> {
    let file = File::open(path).map_err(|e| CoreError::io(path, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_error(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.map_err(|e| csv_error(path, e))?;
        check_width(&record, columns.len(), path, i + 2)?;
        let mut row: Vec<Cell> = record
            .iter()
            .map(|raw| match parse_number(raw) {
                Some(v) => Cell::Number(v),
                None => text_or_null(raw),
            })
            .collect();
        row.resize(columns.len(), Cell::Null);
        rows.push(row);
    }
    Ok(Table::from_parts(columns, rows))
}

fn csv_error(path: &Path, source: csv::Error) -> CoreError {
    CoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_columns_keep_text_and_nan_becomes_null() {
        assert_eq!(coerce_activity_cell("name", "Morning Ride"), Ok(Cell::from("Morning Ride")));
        assert_eq!(coerce_activity_cell("power_tid_classification", "nan"), Ok(Cell::Null));
        assert_eq!(coerce_activity_cell("average_watts", "nan"), Ok(Cell::Null));
        assert_eq!(coerce_activity_cell("average_watts", "abc"), Ok(Cell::Null));
        assert_eq!(coerce_activity_cell("average_watts", "200"), Ok(Cell::Number(200.0)));
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        assert!(coerce_activity_cell("start_date", "not a date").is_err());
        assert_eq!(coerce_activity_cell("start_date", ""), Ok(Cell::Null));
    }

    #[test]
    fn stream_file_name_is_deterministic() {
        assert_eq!(stream_file_name(42), "stream_42.csv");
    }
}
