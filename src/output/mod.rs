pub mod base_writer;
pub mod csv_writer;
pub mod json_writer;

pub use base_writer::BaseWriter;
pub use csv_writer::CsvWriter;
pub use json_writer::JsonWriter;

use crate::config::OutputFormat;
use crate::data_model::Record;
use crate::error::Result;
use std::path::Path;
use tracing::info;

/// Sorts newest first and writes the whole collection to `path`.
/// An empty collection still produces a valid (empty) document.
pub fn write_output<R: Record>(path: &Path, format: OutputFormat, records: &mut [R]) -> Result<()> {
    write_document(path, format, records, None)
}

/// Like [`write_output`], but a JSON document becomes an object holding
/// `metadata` next to the records under `records_key`.
pub fn write_report<R: Record>(
    path: &Path,
    format: OutputFormat,
    records: &mut [R],
    records_key: &str,
    metadata: &serde_json::Value,
) -> Result<()> {
    write_document(path, format, records, Some((records_key, metadata)))
}

fn write_document<R: Record>(
    path: &Path,
    format: OutputFormat,
    records: &mut [R],
    envelope: Option<(&str, &serde_json::Value)>,
) -> Result<()> {
    records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    match (format, envelope) {
        (OutputFormat::Json, Some((key, metadata))) => {
            write_with(JsonWriter::with_metadata(path, key, metadata)?, records)?
        }
        (OutputFormat::Json, None) => write_with(JsonWriter::new(path)?, records)?,
        // CSV rows have nowhere to put a metadata block.
        (OutputFormat::Csv, _) => write_with(CsvWriter::new(path)?, records)?,
    }
    info!(count = records.len(), path = %path.display(), "Saved records");
    Ok(())
}

fn write_with<R: Record, W: BaseWriter<R>>(mut writer: W, records: &[R]) -> Result<()> {
    writer.write_batch(records)?;
    writer.close()
}
