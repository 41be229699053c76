//! JSON Lines file writer.
//!
//! - Each line is a complete JSON object
//! - Files are opened in append mode and never truncated
//! - One file per UTC day, rotated on the first flush after midnight

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// Active writer state for one daily file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Buffered JSON Lines writer for records of type `R`.
pub struct JsonLinesWriter<R> {
    base_dir: PathBuf,
    /// File name prefix, e.g. `decisions` for `decisions_2026-01-31.jsonl`.
    prefix: String,
    buffer: Vec<R>,
    max_buffer_size: usize,
    active_writer: Option<ActiveWriter>,
    _record: PhantomData<fn(R)>,
}

impl<R: Serialize> JsonLinesWriter<R> {
    /// Create a new writer. The directory is created if missing.
    pub fn new(base_dir: impl AsRef<Path>, prefix: &str, max_buffer_size: usize) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        if let Err(e) = std::fs::create_dir_all(&base_dir) {
            warn!(?e, dir = %base_dir.display(), "Failed to create directory");
        }

        Self {
            base_dir,
            prefix: prefix.to_string(),
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size: max_buffer_size.max(1),
            active_writer: None,
            _record: PhantomData,
        }
    }

    /// Buffer a record, flushing when the buffer is full.
    pub fn add_record(&mut self, record: R) -> PersistenceResult<()> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Path of the file for `date` (`YYYY-MM-DD`).
    pub fn file_path(&self, date: &str) -> PathBuf {
        self.base_dir.join(format!("{}_{}.jsonl", self.prefix, date))
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush writer on close");
            }
            info!(
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines writer"
            );
        }
    }

    fn open_writer(&mut self, date: &str) -> PersistenceResult<()> {
        let path = self.file_path(date);
        info!(path = %path.display(), "Opening JSON Lines writer (append mode)");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        self.active_writer = Some(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        });
        Ok(())
    }

    /// Flush buffered records to today's file.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        self.flush_for_date(&today)
    }

    /// Flush buffered records to the file for `date`, rotating if the open
    /// file belongs to another day.
    pub fn flush_for_date(&mut self, date: &str) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        if self.active_writer.as_ref().is_some_and(|w| w.date != date) {
            self.close_active_writer();
        }

        if self.active_writer.is_none() {
            self.open_writer(date)?;
        }
        let Some(active) = self.active_writer.as_mut() else {
            return Ok(());
        };

        let record_count = self.buffer.len();
        for record in &self.buffer {
            let json = serde_json::to_string(record)?;
            writeln!(active.writer, "{json}")?;
        }
        active.writer.flush()?;
        active.records_written += record_count;

        debug!(date = %date, records = record_count, "Flushed records to JSON Lines");

        self.buffer.clear();
        Ok(())
    }

    /// Flush pending records and close the file.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }
}

impl<R> Drop for JsonLinesWriter<R> {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                pending = self.buffer.len(),
                "JSON Lines writer dropped with unflushed records"
            );
        }
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, "Failed to flush writer on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: u32,
        note: String,
    }

    fn row(id: u32) -> Row {
        Row {
            id,
            note: format!("row {id}"),
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        BufReader::new(file).lines().map_while(Result::ok).collect()
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(dir.path(), "rows", 100);
        for i in 0..5 {
            writer.add_record(row(i)).unwrap();
        }
        writer.flush_for_date("2026-03-01").unwrap();

        let lines = read_lines(&writer.file_path("2026-03-01"));
        assert_eq!(lines.len(), 5);
        let first: Row = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first, row(0));
    }

    #[test]
    fn test_append_across_writers() {
        let dir = TempDir::new().unwrap();
        for batch in 0..2 {
            let mut writer = JsonLinesWriter::new(dir.path(), "rows", 100);
            for i in 0..3 {
                writer.add_record(row(batch * 3 + i)).unwrap();
            }
            writer.flush_for_date("2026-03-01").unwrap();
        }

        let path = dir.path().join("rows_2026-03-01.jsonl");
        assert_eq!(read_lines(&path).len(), 6);
    }

    #[test]
    fn test_rotates_on_date_change() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(dir.path(), "rows", 100);

        writer.add_record(row(1)).unwrap();
        writer.flush_for_date("2026-03-01").unwrap();
        writer.add_record(row(2)).unwrap();
        writer.add_record(row(3)).unwrap();
        writer.flush_for_date("2026-03-02").unwrap();

        assert_eq!(read_lines(&writer.file_path("2026-03-01")).len(), 1);
        assert_eq!(read_lines(&writer.file_path("2026-03-02")).len(), 2);
    }

    #[test]
    fn test_auto_flush_when_buffer_full() {
        let dir = TempDir::new().unwrap();
        let mut writer = JsonLinesWriter::new(dir.path(), "rows", 2);
        writer.add_record(row(1)).unwrap();
        assert_eq!(writer.pending(), 1);
        writer.add_record(row(2)).unwrap();
        assert_eq!(writer.pending(), 0);
    }

    #[test]
    fn test_empty_flush_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let mut writer: JsonLinesWriter<Row> = JsonLinesWriter::new(dir.path(), "rows", 10);
        writer.flush().unwrap();

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 0);
    }
}
