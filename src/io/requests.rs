//! Batch request files for `asylum score`.
//!
//! Input is a CSV with `origin,asylum,year,procedure` columns (any order, any
//! case, extra columns ignored). Output repeats those columns and appends
//! `rate,confidence,error`, one line per input row, in input order.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::domain::{PredictionResult, RawPredictionRequest, YearInput};
use crate::error::AppError;
use crate::io::dataset::{build_header_map, field};
use crate::predict::PredictError;

const REQUIRED_COLUMNS: [&str; 4] = ["origin", "asylum", "year", "procedure"];

/// One input row, kept verbatim for the output file.
#[derive(Debug, Clone)]
pub struct RequestRow {
    pub line: usize,
    pub request: RawPredictionRequest,
    pub parse_error: Option<String>,
}

/// A scored row ready to be written.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub row: RequestRow,
    pub outcome: Result<PredictionResult, PredictError>,
}

pub fn load_requests(path: &Path) -> Result<Vec<RequestRow>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open requests CSV '{}': {e}", path.display())))?;
    read_requests(file)
}

pub fn read_requests<R: Read>(input: R) -> Result<Vec<RequestRow>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read requests CSV headers: {e}")))?
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
            format!("Requests CSV is missing required columns: {}", missing.join(", ")),
        ));
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let row = match result {
            Ok(record) => {
                let opt = |col: &str| {
                    let v = field(&record, &header_map, col);
                    (!v.is_empty()).then(|| v.to_string())
                };
                RequestRow {
                    line,
                    request: RawPredictionRequest {
                        origin: opt("origin"),
                        asylum: opt("asylum"),
                        year: opt("year").map(YearInput::Text),
                        procedure: opt("procedure"),
                    },
                    parse_error: None,
                }
            }
            Err(e) => RequestRow {
                line,
                request: RawPredictionRequest::default(),
                parse_error: Some(format!("CSV parse error: {e}")),
            },
        };
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(AppError::new(3, "Requests CSV has no rows."));
    }
    Ok(rows)
}

/// Write scored rows as CSV to `out`.
pub fn write_scores<W: Write>(out: W, rows: &[ScoredRow]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    let io_err = |e: csv::Error| AppError::new(2, format!("Failed to write scores: {e}"));

    writer
        .write_record(["origin", "asylum", "year", "procedure", "rate", "confidence", "error"])
        .map_err(io_err)?;

    for scored in rows {
        let req = &scored.row.request;
        let year = match &req.year {
            Some(YearInput::Number(n)) => n.to_string(),
            Some(YearInput::Text(s)) => s.clone(),
            None => String::new(),
        };
        let (rate, confidence, error) = match &scored.outcome {
            Ok(r) => {
                let r = r.rounded();
                (format!("{:.1}", r.rate), format!("{:.1}", r.confidence), String::new())
            }
            Err(e) => (String::new(), String::new(), e.to_string()),
        };
        writer
            .write_record([
                req.origin.as_deref().unwrap_or(""),
                req.asylum.as_deref().unwrap_or(""),
                year.as_str(),
                req.procedure.as_deref().unwrap_or(""),
                rate.as_str(),
                confidence.as_str(),
                error.as_str(),
            ])
            .map_err(io_err)?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush scores: {e}")))
}

pub fn write_scores_file(path: &Path, rows: &[ScoredRow]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create scores CSV '{}': {e}", path.display())))?;
    write_scores(file, rows)
}
