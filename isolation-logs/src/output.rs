//! Timestamped CSV output for usage logs
use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use isolation_api::{LogRecord, RecordSink};
use log::{debug, info};

/// File name prefix for exported logs
const FILE_PREFIX: &str = "Isolation_Logs_";

/// Row terminator
const LINE_ENDING: &[u8] = b"\r\n";

/// Output file name for a run started at `run_timestamp` (`YYYYMMDD-HHMMSS`)
#[must_use]
pub fn output_file_name(run_timestamp: &str) -> String {
    format!("{FILE_PREFIX}{run_timestamp}.csv")
}

/// CSV writer over any byte sink.
///
/// The header row is written on creation and every batch is flushed once it
/// has been written, so a failed run leaves all completed pages on disk.
pub struct CsvLogWriter<W: Write> {
    writer: W,
    rows_written: u64,
}

impl<W: Write> CsvLogWriter<W> {
    /// Wrap `writer` and emit the header row.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the header cannot be written.
    pub fn new(writer: W) -> io::Result<Self> {
        let mut csv = Self {
            writer,
            rows_written: 0,
        };
        csv.write_row(&LogRecord::FIELD_NAMES)?;
        csv.writer.flush()?;
        debug!(
            "Wrote CSV header: {} fields",
            LogRecord::FIELD_NAMES.len()
        );
        Ok(csv)
    }

    /// Data rows written so far (the header is not counted)
    #[must_use]
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Flush and return the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final flush fails.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_row<S: AsRef<str>>(&mut self, cells: &[S]) -> io::Result<()> {
        for (i, cell) in cells.iter().enumerate() {
            if i > 0 {
                self.writer.write_all(b",")?;
            }
            self.writer.write_all(escape_csv(cell.as_ref()).as_bytes())?;
        }
        self.writer.write_all(LINE_ENDING)
    }
}

impl<W: Write> RecordSink for CsvLogWriter<W> {
    fn write_records(&mut self, records: &[LogRecord]) -> io::Result<usize> {
        for record in records {
            self.write_row(&record.to_row())?;
        }
        self.writer.flush()?;

        self.rows_written = self.rows_written.saturating_add(records.len() as u64);
        debug!(
            "Wrote {} rows to CSV (total: {})",
            records.len(),
            self.rows_written
        );
        Ok(records.len())
    }
}

/// Create the timestamped CSV file in `output_dir` and write its header.
///
/// The directory is created if it does not exist. The file is opened in append
/// mode, so a second run within the same second adds to the existing file.
///
/// # Errors
///
/// Returns an I/O error if the directory or file cannot be created.
pub fn create_log_file(
    output_dir: &str,
    run_timestamp: &str,
) -> io::Result<(PathBuf, CsvLogWriter<BufWriter<File>>)> {
    fs::create_dir_all(output_dir)?;

    let path = PathBuf::from(output_dir).join(output_file_name(run_timestamp));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    let writer = CsvLogWriter::new(BufWriter::new(file))?;

    info!("Writing usage logs to {}", path.display());
    Ok((path, writer))
}

/// CSV file sink that is only created once the first batch arrives.
///
/// The first batch is the completed job's own page, so a run that fails while
/// submitting or polling leaves no file behind.
pub struct DeferredLogFile {
    output_dir: String,
    run_timestamp: String,
    file: Option<(PathBuf, CsvLogWriter<BufWriter<File>>)>,
}

impl DeferredLogFile {
    /// Prepare a sink for `Isolation_Logs_<run_timestamp>.csv` in `output_dir`.
    /// Nothing touches the filesystem until the first batch.
    #[must_use]
    pub fn new(output_dir: impl Into<String>, run_timestamp: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            run_timestamp: run_timestamp.into(),
            file: None,
        }
    }

    /// Path of the file, once it has been created
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    /// Flush and close the file, returning its path and data row count.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the final flush fails.
    pub fn finish(self) -> io::Result<Option<(PathBuf, u64)>> {
        match self.file {
            Some((path, csv)) => {
                let rows = csv.rows_written();
                csv.into_inner()?;
                Ok(Some((path, rows)))
            }
            None => Ok(None),
        }
    }

    /// Like [`Self::finish`], but writes a header-only file when no batch
    /// ever arrived.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or flushed.
    pub fn finish_or_create(self) -> io::Result<(PathBuf, u64)> {
        let output_dir = self.output_dir.clone();
        let run_timestamp = self.run_timestamp.clone();
        if let Some(done) = self.finish()? {
            return Ok(done);
        }

        let (path, csv) = create_log_file(&output_dir, &run_timestamp)?;
        csv.into_inner()?;
        Ok((path, 0))
    }
}

impl RecordSink for DeferredLogFile {
    fn write_records(&mut self, records: &[LogRecord]) -> io::Result<usize> {
        let file = match self.file.take() {
            Some(file) => file,
            None => create_log_file(&self.output_dir, &self.run_timestamp)?,
        };
        let (_, csv) = self.file.insert(file);
        csv.write_records(records)
    }
}

/// Quote a cell if it contains a delimiter, quote or line break
fn escape_csv(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
