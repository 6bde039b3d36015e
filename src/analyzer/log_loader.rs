//! Buffered, line-oriented reading of ranger log files.
//!
//! The loader feeds every line through the parser and keeps per-file counters.
//! Skipped lines are counted and dropped. Malformed lines stop the read unless
//! the parser configuration asks for them to be skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::ParserConfig;

use super::log_parser::parse_log_line;
use super::types::{LogRecord, ParseCounters, ParseError, ParseOutcome};

/// Buffer size for reading log files (8KB).
const BUFFER_SIZE: usize = 8 * 1024;

/// Error type for log reading failures.
#[derive(Debug)]
pub enum LoadError {
    ReadError {
        source: String,
        line: u64,
        error: std::io::Error,
    },
    MalformedLine {
        source: String,
        line: u64,
        error: ParseError,
    },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::ReadError { source, line, error } => {
                write!(f, "Failed to read {} after line {}: {}", source, line, error)
            }
            LoadError::MalformedLine { source, line, error } => {
                write!(f, "Malformed record in {} at line {}: {}", source, line, error)
            }
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::ReadError { error, .. } => Some(error),
            LoadError::MalformedLine { error, .. } => Some(error),
        }
    }
}

/// Log file loader yielding parsed records.
pub struct LogLoader<R: BufRead> {
    reader: R,
    source: String,
    tag: String,
    skip_malformed: bool,
    line_number: u64,
    line_buffer: String,
    counters: ParseCounters,
}

impl LogLoader<BufReader<File>> {
    /// Open a log file.
    ///
    /// # Parameters
    ///
    /// * `path` - Path to the log file
    /// * `options` - Tag and malformed-line policy
    ///
    /// # Returns
    ///
    /// `Ok(LogLoader)` if the file opens successfully, `Err` otherwise.
    pub fn open(path: &Path, options: &ParserConfig) -> Result<Self, std::io::Error> {
        let file = File::open(path)?;
        let reader = BufReader::with_capacity(BUFFER_SIZE, file);
        Ok(Self::from_reader(reader, path.display().to_string(), options))
    }
}

impl<R: BufRead> LogLoader<R> {
    /// Wrap an already opened reader. `source` is only used in messages.
    pub fn from_reader(reader: R, source: impl Into<String>, options: &ParserConfig) -> Self {
        Self {
            reader,
            source: source.into(),
            tag: options.tag.clone(),
            skip_malformed: options.skip_malformed,
            line_number: 0,
            line_buffer: String::with_capacity(512),
            counters: ParseCounters::default(),
        }
    }

    /// Read until the next record.
    ///
    /// # Returns
    ///
    /// `Ok(Some(record))` for each matched line, `Ok(None)` at end of input.
    pub fn next_record(&mut self) -> Result<Option<LogRecord>, LoadError> {
        loop {
            self.line_buffer.clear();

            let read = self.reader.read_line(&mut self.line_buffer).map_err(|error| LoadError::ReadError {
                source: self.source.clone(),
                line: self.line_number,
                error,
            })?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            match parse_log_line(&self.line_buffer, &self.tag) {
                ParseOutcome::Matched(record) => {
                    self.counters.matched += 1;
                    return Ok(Some(*record));
                }
                ParseOutcome::Skipped => {
                    self.counters.skipped += 1;
                }
                ParseOutcome::Malformed(error) => {
                    self.counters.malformed += 1;
                    if !self.skip_malformed {
                        return Err(LoadError::MalformedLine {
                            source: self.source.clone(),
                            line: self.line_number,
                            error,
                        });
                    }
                    log::warn!("{}:{}: skipping malformed record: {}", self.source, self.line_number, error);
                }
            }
        }
    }

    /// Drain the remaining input into a vector.
    pub fn read_all(&mut self) -> Result<Vec<LogRecord>, LoadError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }

    pub fn counters(&self) -> ParseCounters {
        self.counters
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}
