//! CSV ingest of raw asylum-seeker records.
//!
//! This module turns a UNHCR-style asylum-seekers export into clean
//! `(asylum, origin, procedure, acceptance_rate)` records for evaluation:
//!
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - the target is derived exactly as in training:
//!   `decisions_recognized / (pending at start of year + applied during year)`

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::AppError;

pub const COL_ASYLUM: &str = "country / territory of asylum/residence";
pub const COL_ORIGIN: &str = "origin";
pub const COL_PROCEDURE: &str = "rsd procedure type / level";
pub const COL_YEAR: &str = "year";
pub const COL_PENDING: &str = "tota pending start-year";
pub const COL_APPLIED: &str = "applied during year";
pub const COL_RECOGNIZED: &str = "decisions_recognized";
pub const COL_OTHER: &str = "decisions_other";
pub const COL_REJECTED: &str = "rejected";

const REQUIRED_COLUMNS: [&str; 8] = [
    COL_ASYLUM,
    COL_ORIGIN,
    COL_PROCEDURE,
    COL_PENDING,
    COL_APPLIED,
    COL_RECOGNIZED,
    COL_OTHER,
    COL_REJECTED,
];

/// One usable dataset row.
#[derive(Debug, Clone, PartialEq)]
pub struct AsylumRecord {
    pub line: usize,
    pub asylum: String,
    pub origin: String,
    pub procedure: String,
    pub year: Option<i32>,
    /// Recognized decisions over total caseload, as a fraction.
    pub acceptance_rate: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<AsylumRecord>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

pub fn load_dataset(path: &Path) -> Result<Dataset, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open dataset '{}': {e}", path.display())))?;
    read_dataset(file)
}

pub fn read_dataset<R: Read>(input: R) -> Result<Dataset, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read dataset headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !header_map.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::new(
            2,
            format!("Dataset is missing required columns: {}", missing.join(", ")),
        ));
    }

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map, line) {
            Ok(r) => records.push(r),
            Err(message) => row_errors.push(RowError { line, message }),
        }
    }

    if records.is_empty() {
        return Err(AppError::new(3, "No valid rows remain in the dataset."));
    }

    Ok(Dataset {
        records,
        row_errors,
        rows_read,
    })
}

/// Lowercased, BOM-stripped header name -> column index.
pub(crate) fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

pub(crate) fn field<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, col: &str) -> &'a str {
    header_map
        .get(col)
        .and_then(|&idx| record.get(idx))
        .unwrap_or("")
}

fn parse_number(record: &StringRecord, header_map: &HashMap<String, usize>, col: &str) -> Result<f64, String> {
    let raw = field(record, header_map, col);
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("column '{col}' is not numeric: '{raw}'"))?;
    if !value.is_finite() {
        return Err(format!("column '{col}' is not finite: '{raw}'"));
    }
    Ok(value)
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>, line: usize) -> Result<AsylumRecord, String> {
    let text = |col: &str| -> Result<String, String> {
        let v = field(record, header_map, col);
        if v.is_empty() {
            return Err(format!("column '{col}' is empty"));
        }
        Ok(v.to_string())
    };

    let asylum = text(COL_ASYLUM)?;
    let origin = text(COL_ORIGIN)?;
    let procedure = text(COL_PROCEDURE)?;

    let pending = parse_number(record, header_map, COL_PENDING)?;
    let applied = parse_number(record, header_map, COL_APPLIED)?;
    let recognized = parse_number(record, header_map, COL_RECOGNIZED)?;
    // Not used in the target, but rows without them are not usable training rows.
    parse_number(record, header_map, COL_OTHER)?;
    parse_number(record, header_map, COL_REJECTED)?;

    let caseload = pending + applied;
    let acceptance_rate = recognized / caseload;
    if !acceptance_rate.is_finite() {
        return Err(format!("acceptance rate undefined (caseload {caseload})"));
    }

    let year = field(record, header_map, COL_YEAR).parse().ok();

    Ok(AsylumRecord {
        line,
        asylum,
        origin,
        procedure,
        year,
        acceptance_rate,
    })
}
