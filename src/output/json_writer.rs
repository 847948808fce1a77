use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::data_model::Record;
use crate::error::Result;
use crate::output::BaseWriter;

/// Streams records into a single JSON array, optionally wrapped in an object
/// that carries a metadata block.
pub struct JsonWriter {
    writer: BufWriter<File>,
    written: usize,
    suffix: &'static [u8],
}

impl JsonWriter {
    pub fn new(path: &Path) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(b"[")?;
        Ok(JsonWriter {
            writer,
            written: 0,
            suffix: b"]\n",
        })
    }

    /// `{"metadata": <metadata>, "<records_key>": [records...]}`
    pub fn with_metadata(path: &Path, records_key: &str, metadata: &serde_json::Value) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(b"{\n  \"metadata\": ")?;
        serde_json::to_writer(&mut writer, metadata)?;
        writer.write_all(b",\n  ")?;
        serde_json::to_writer(&mut writer, records_key)?;
        writer.write_all(b": [")?;
        Ok(JsonWriter {
            writer,
            written: 0,
            suffix: b"]\n}\n",
        })
    }
}

impl<R: Record> BaseWriter<R> for JsonWriter {
    fn write_batch(&mut self, records: &[R]) -> Result<()> {
        for record in records {
            if self.written > 0 {
                self.writer.write_all(b",")?;
            }
            self.writer.write_all(b"\n  ")?;
            serde_json::to_writer(&mut self.writer, record)?;
            self.written += 1;
        }
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        if self.written > 0 {
            self.writer.write_all(b"\n")?;
        }
        self.writer.write_all(self.suffix)?;
        self.writer.flush()?;
        Ok(())
    }
}
