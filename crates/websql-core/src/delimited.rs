//! Delimited text serialization
//!
//! Fields that contain the delimiter, a quote character or a line break are
//! wrapped in quotes with embedded quotes doubled. NULL is written as an
//! empty field.

use crate::{Result, Value, WebSqlError};

/// Serialize a header row plus data rows as delimited text.
///
/// Every record, including the last one, ends with `\n`.
pub fn write_delimited(columns: &[String], rows: &[Vec<Value>], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    writer
        .write_record(columns)
        .map_err(|e| WebSqlError::Other(format!("Failed to write header row: {}", e)))?;

    for row in rows {
        writer
            .write_record(row.iter().map(Value::to_cell_text))
            .map_err(|e| WebSqlError::Other(format!("Failed to write row: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| WebSqlError::Other(format!("Failed to flush delimited text: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| WebSqlError::Other(format!("Delimited text is not valid UTF-8: {}", e)))
}
