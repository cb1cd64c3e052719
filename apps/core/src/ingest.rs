//! CSV ingestion.
//!
//! Turns raw upload bytes into a validated [`Dataset`]: required columns are
//! checked, numeric and timestamp cells are coerced (unparseable values become
//! null), and rows missing GrossQuantity, ShipmentID or ExitTime are dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::{Dataset, ShipmentRecord, REQUIRED_COLUMNS};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

const OUTPUT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a timestamp cell. Offsets are dropped and the wall-clock time kept.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parses a numeric cell; non-finite values count as missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Column name -> position lookup over the header row.
struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    fn new(headers: &csv::StringRecord) -> Self {
        let mut positions = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            positions.entry(name.to_string()).or_insert(idx);
        }
        Self { positions }
    }

    fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !self.positions.contains_key(*c))
            .collect()
    }

    fn position(&self, column: &str) -> Result<usize, AppError> {
        self.positions
            .get(column)
            .copied()
            .ok_or_else(|| AppError::Internal(format!("column {} vanished after validation", column)))
    }
}

/// Parses an uploaded CSV into a [`Dataset`].
pub fn parse_csv(bytes: &[u8]) -> Result<Dataset, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let index = ColumnIndex::new(&headers);

    let missing = index.missing_required();
    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "Missing required columns: {:?}",
            missing
        )));
    }

    let columns: Vec<String> = headers.iter().map(str::to_string).collect();
    let extra: Vec<(String, usize)> = columns
        .iter()
        .enumerate()
        .filter(|(_, name)| !REQUIRED_COLUMNS.contains(&name.as_str()))
        .map(|(idx, name)| (name.clone(), idx))
        .collect();

    let gross_quantity = index.position("GrossQuantity")?;
    let flow_rate = index.position("FlowRate")?;
    let compartment_id = index.position("ShipmentCompartmentID")?;
    let base_product_id = index.position("BaseProductID")?;
    let base_product_code = index.position("BaseProductCode")?;
    let shipment_id = index.position("ShipmentID")?;
    let shipment_code = index.position("ShipmentCode")?;
    let exit_time = index.position("ExitTime")?;
    let bay_code = index.position("BayCode")?;
    let scheduled_date = index.position("ScheduledDate")?;
    let created_time = index.position("CreatedTime")?;

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for row in reader.records() {
        let row = row?;
        let cell = |idx: usize| row.get(idx).filter(|s| !s.is_empty());
        let text = |idx: usize| cell(idx).map(str::to_string);

        let (Some(quantity), Some(id), Some(exit)) = (
            cell(gross_quantity).and_then(parse_number),
            text(shipment_id),
            cell(exit_time).and_then(parse_timestamp),
        ) else {
            dropped += 1;
            continue;
        };

        records.push(ShipmentRecord {
            gross_quantity: quantity,
            flow_rate: cell(flow_rate).and_then(parse_number),
            shipment_compartment_id: text(compartment_id),
            base_product_id: text(base_product_id),
            base_product_code: text(base_product_code),
            shipment_id: id,
            shipment_code: text(shipment_code),
            exit_time: exit,
            bay_code: text(bay_code),
            scheduled_date: cell(scheduled_date).and_then(parse_timestamp),
            created_time: cell(created_time).and_then(parse_timestamp),
            extra: extra.iter().map(|(_, idx)| text(*idx)).collect(),
        });
    }

    if dropped > 0 {
        debug!("Dropped {} rows lacking GrossQuantity, ShipmentID or ExitTime", dropped);
    }
    info!("Parsed CSV: {} rows kept, {} columns", records.len(), columns.len());

    Ok(Dataset {
        columns,
        extra_columns: extra.into_iter().map(|(name, _)| name).collect(),
        records,
    })
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn format_timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|v| v.format(OUTPUT_DATETIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn record_cell(dataset: &Dataset, record: &ShipmentRecord, column: &str) -> String {
    match column {
        "GrossQuantity" => format_number(Some(record.gross_quantity)),
        "FlowRate" => format_number(record.flow_rate),
        "ShipmentCompartmentID" => record.shipment_compartment_id.clone().unwrap_or_default(),
        "BaseProductID" => record.base_product_id.clone().unwrap_or_default(),
        "BaseProductCode" => record.base_product_code.clone().unwrap_or_default(),
        "ShipmentID" => record.shipment_id.clone(),
        "ShipmentCode" => record.shipment_code.clone().unwrap_or_default(),
        "ExitTime" => format_timestamp(Some(record.exit_time)),
        "BayCode" => record.bay_code.clone().unwrap_or_default(),
        "ScheduledDate" => format_timestamp(record.scheduled_date),
        "CreatedTime" => format_timestamp(record.created_time),
        other => dataset
            .extra_columns
            .iter()
            .position(|c| c == other)
            .and_then(|idx| record.extra.get(idx).cloned().flatten())
            .unwrap_or_default(),
    }
}

/// Serializes the dataset back to CSV, columns in upload order.
pub fn write_csv(dataset: &Dataset) -> Result<String, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&dataset.columns)?;
    for record in &dataset.records {
        let row: Vec<String> = dataset
            .columns
            .iter()
            .map(|column| record_cell(dataset, record, column))
            .collect();
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV writer flush failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV output was not UTF-8: {}", e)))
}
