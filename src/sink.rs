use crate::{Row, Schema, ScraperError, Sink};
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};
use tracing::debug;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes rows as CSV in schema order. The header goes out once, right
/// before the first row, unless the target already holds one.
pub struct CsvSink<W: Write> {
    schema: Schema,
    writer: csv::Writer<W>,
    header_written: bool,
}

impl CsvSink<File> {
    /// Starts a new file, replacing any previous content.
    pub fn create<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self, ScraperError> {
        let mut file = File::create(path.as_ref())?;
        file.write_all(UTF8_BOM)?;
        Ok(CsvSink::from_writer(file, schema, false))
    }

    /// Appends to `path`. A file holding anything past the BOM is assumed
    /// to start with a header.
    pub fn append<P: AsRef<Path>>(path: P, schema: Schema) -> Result<Self, ScraperError> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        let len = file.metadata()?.len();
        let has_header = len > UTF8_BOM.len() as u64;
        if has_header {
            debug!("Append to {} without header", path.display());
        } else if len == 0 {
            file.write_all(UTF8_BOM)?;
        }
        Ok(CsvSink::from_writer(file, schema, has_header))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(writer: W, schema: Schema, header_written: bool) -> Self {
        CsvSink {
            schema,
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(writer),
            header_written,
        }
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn into_inner(self) -> Result<W, ScraperError> {
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.to_string()).into())
    }
}

impl<W: Write> Sink for CsvSink<W> {
    fn write_rows(&mut self, rows: &[Row]) -> Result<usize, ScraperError> {
        if rows.is_empty() {
            return Ok(0);
        }

        if !self.header_written {
            self.writer.write_record(self.schema.columns())?;
            self.header_written = true;
        }
        for record in self.schema.assemble(rows) {
            self.writer.write_record(&record)?;
        }
        self.writer.flush()?;

        Ok(rows.len())
    }

    fn flush(&mut self) -> Result<(), ScraperError> {
        self.writer.flush()?;
        Ok(())
    }
}
