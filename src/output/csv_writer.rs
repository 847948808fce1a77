use std::fs::File;
use std::path::Path;

use crate::data_model::Record;
use crate::error::Result;
use crate::output::BaseWriter;

/// Flat rows with a header taken from the record's field names.
pub struct CsvWriter {
    writer: csv::Writer<File>,
}

impl CsvWriter {
    pub fn new(path: &Path) -> Result<Self> {
        Ok(CsvWriter {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<R: Record> BaseWriter<R> for CsvWriter {
    fn write_batch(&mut self, records: &[R]) -> Result<()> {
        for record in records {
            self.writer.serialize(record)?;
        }
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
