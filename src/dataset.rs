use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::DatasetError;
use crate::models::{DateRange, EventCode, EventRecord};

pub const TIMESTAMP_COLUMN: &str = "esis_data_leitura";
pub const CODE_COLUMN: &str = "esis_espa_codigo";
pub const DRIVER_COLUMN: &str = "motorista";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    esis_data_leitura: String,
    esis_espa_codigo: String,
    motorista: String,
}

pub fn load_csv(path: &Path) -> Result<Vec<EventRecord>, DatasetError> {
    let file = std::fs::File::open(path)?;
    load_from_reader(file)
}

pub fn load_from_reader<R: Read>(source: R) -> Result<Vec<EventRecord>, DatasetError> {
    read_events(csv::Reader::from_reader(source))
}

fn read_events<R: Read>(mut reader: csv::Reader<R>) -> Result<Vec<EventRecord>, DatasetError> {
    let headers = reader.headers()?.clone();
    for column in [TIMESTAMP_COLUMN, CODE_COLUMN, DRIVER_COLUMN] {
        if !headers.iter().any(|header| header == column) {
            return Err(DatasetError::MissingColumn(column));
        }
    }

    let mut records = Vec::new();
    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        // Header is line 1.
        let row = index + 2;
        let raw = result?;
        records.push(parse_row(row, raw)?);
    }

    Ok(records)
}

fn parse_row(row: usize, raw: CsvRow) -> Result<EventRecord, DatasetError> {
    let driver_id = raw.motorista.trim().to_string();
    if driver_id.is_empty() {
        return Err(DatasetError::MissingDriver { row });
    }

    let event_code: EventCode =
        raw.esis_espa_codigo
            .trim()
            .parse()
            .map_err(|_| DatasetError::InvalidEventCode {
                row,
                value: raw.esis_espa_codigo.clone(),
            })?;

    let read_timestamp =
        parse_timestamp(&raw.esis_data_leitura).ok_or_else(|| DatasetError::InvalidTimestamp {
            row,
            value: raw.esis_data_leitura.clone(),
        })?;

    Ok(EventRecord {
        driver_id,
        event_code,
        read_timestamp,
    })
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// The min/max calendar dates of the dataset, used as the default range.
pub fn date_bounds(records: &[EventRecord]) -> Option<DateRange> {
    let start = records.iter().map(EventRecord::read_date).min()?;
    let end = records.iter().map(EventRecord::read_date).max()?;
    Some(DateRange::new(start, end))
}
