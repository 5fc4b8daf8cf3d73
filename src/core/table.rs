//! Headered comma-separated tables to typed records.
//!
//! Tables may start and end with blank lines (the inline tables are written
//! that way). The first non-blank line must be the header, with exactly the
//! record type's columns in order.

use crate::domain::model::{LiquidRecord, TransferRecord};
use crate::utils::error::{ProtocolError, Result};
use serde::de::DeserializeOwned;

pub trait TableRecord: DeserializeOwned {
    /// Name used in error messages.
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Per-row checks that go beyond type conversion.
    fn check(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl TableRecord for LiquidRecord {
    const TABLE: &'static str = "liquid";
    const COLUMNS: &'static [&'static str] = &[
        "Initial_Wells",
        "Initial_Volume",
        "Liquid_Name",
        "Description",
        "Color",
    ];

    fn check(&self) -> std::result::Result<(), String> {
        check_volume("Initial_Volume", self.initial_volume)
    }
}

impl TableRecord for TransferRecord {
    const TABLE: &'static str = "transfer";
    const COLUMNS: &'static [&'static str] =
        &["Source_Well", "Destination_Well", "Transfer_Volume"];

    fn check(&self) -> std::result::Result<(), String> {
        check_volume("Transfer_Volume", self.volume)?;
        if self.volume == 0.0 {
            return Err("Transfer_Volume must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn check_volume(column: &str, value: f64) -> std::result::Result<(), String> {
    if !value.is_finite() {
        return Err(format!("{} must be a finite number, got {}", column, value));
    }
    if value < 0.0 {
        return Err(format!("{} cannot be negative, got {}", column, value));
    }
    Ok(())
}

fn parse_error<R: TableRecord>(line: u64, message: impl Into<String>) -> ProtocolError {
    ProtocolError::ParseError {
        table: R::TABLE.to_string(),
        line,
        message: message.into(),
    }
}

fn csv_message(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("expected {} columns, found {}", expected_len, len),
        csv::ErrorKind::Deserialize { err, .. } => err.to_string(),
        _ => err.to_string(),
    }
}

/// Parses `text` into records, preserving row order.
pub fn parse_table<R: TableRecord>(text: &str) -> Result<Vec<R>> {
    let lines: Vec<&str> = text.lines().collect();
    let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return Err(parse_error::<R>(1, "table has no header row"));
    };
    let last = lines
        .iter()
        .rposition(|l| !l.trim().is_empty())
        .unwrap_or(first);
    let body = lines[first..=last].join("\n");
    // csv positions are relative to `body`; shift them back to the caller's text.
    let line_offset = first as u64;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| parse_error::<R>(line_offset + 1, csv_message(&e)))?
        .clone();
    let found: Vec<&str> = headers.iter().collect();
    if found.as_slice() != R::COLUMNS {
        return Err(parse_error::<R>(
            line_offset + 1,
            format!(
                "expected header '{}', found '{}'",
                R::COLUMNS.join(","),
                found.join(",")
            ),
        ));
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| {
            let line = e.position().map(|p| p.line()).unwrap_or(1) + line_offset;
            parse_error::<R>(line, csv_message(&e))
        })?;
        let line = row.position().map(|p| p.line()).unwrap_or(1) + line_offset;

        let record: R = row
            .deserialize(Some(&headers))
            .map_err(|e| parse_error::<R>(line, csv_message(&e)))?;
        record.check().map_err(|m| parse_error::<R>(line, m))?;
        records.push(record);
    }

    tracing::debug!("Parsed {} rows from the {} table", records.len(), R::TABLE);
    Ok(records)
}
