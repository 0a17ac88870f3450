//! CSV decoding into [`InputRow`]s
//!
//! The first line names the columns. Known headers map to [`RowField`]s,
//! unknown columns are ignored. Values are trimmed, blank records are
//! skipped and a leading UTF-8 byte order mark is tolerated.

use csv::{ReaderBuilder, Trim};
use pingsync_core::domain::{InputRow, RowField};
use tracing::debug;

use crate::EngineError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode `data` into rows numbered from 1 for the first data row.
///
/// # Errors
///
/// - [`EngineError::MissingHeader`] when the input has no header line
/// - [`EngineError::Csv`] for malformed input, including invalid UTF-8
pub fn parse_rows(data: &[u8]) -> Result<Vec<InputRow>, EngineError> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(data);

    let columns: Vec<Option<RowField>> = reader
        .headers()?
        .iter()
        .map(RowField::from_header)
        .collect();

    if columns.is_empty() {
        return Err(EngineError::MissingHeader);
    }

    let ignored = columns.iter().filter(|c| c.is_none()).count();
    if ignored > 0 {
        debug!(ignored, "Ignoring unknown CSV columns");
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut row = InputRow::new(rows.len() + 1);
        for (column, value) in columns.iter().zip(record.iter()) {
            if let Some(field) = column {
                row.set(*field, value);
            }
        }
        rows.push(row);
    }

    Ok(rows)
}
