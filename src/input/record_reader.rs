//! Incremental reader for CloudTrail log containers
//!
//! A container is a JSON object whose `Records` field holds an array of
//! events. The reader walks the top-level object by hand, skips unrelated
//! fields, and hands each array element to serde one at a time, so memory
//! stays bounded by the size of a single record.

use crate::models::LogRecord;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

/// Name of the top-level field holding the event array
pub const RECORDS_FIELD: &str = "Records";

/// Errors raised while reading a log container
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed log container: {0}")]
    Malformed(String),

    #[error("Malformed record #{index}: {source}")]
    InvalidRecord {
        index: u64,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Nothing consumed yet
    Start,
    /// Positioned inside the records array
    InRecords { first: bool },
    /// Array closed or a fatal error was returned
    Done,
}

/// Lazy iterator over the records of one log container
///
/// Yields `Err` at most once; after an error or the end of the array the
/// iterator is exhausted. Reading the file again requires a new reader.
pub struct RecordReader<R> {
    reader: R,
    state: ReaderState,
    records_read: u64,
}

impl RecordReader<BufReader<File>> {
    /// Open a log container on disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ReadError> {
        let file = File::open(path)?;
        Ok(RecordReader::new(BufReader::new(file)))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        RecordReader {
            reader,
            state: ReaderState::Start,
            records_read: 0,
        }
    }

    /// Number of records yielded so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    fn next_record(&mut self) -> Result<Option<LogRecord>, ReadError> {
        let first = match self.state {
            ReaderState::Done => return Ok(None),
            ReaderState::Start => {
                self.seek_records()?;
                true
            }
            ReaderState::InRecords { first } => first,
        };

        match self.peek_significant()? {
            Some(b']') => {
                self.reader.consume(1);
                self.state = ReaderState::Done;
                return Ok(None);
            }
            Some(b',') if !first => self.reader.consume(1),
            Some(_) if first => {}
            found => return Err(unexpected("',' or ']'", found)),
        }

        let record: LogRecord = self
            .parse_value()
            .map_err(|source| ReadError::InvalidRecord {
                index: self.records_read,
                source,
            })?;

        self.records_read += 1;
        self.state = ReaderState::InRecords { first: false };
        Ok(Some(record))
    }

    /// Advance past `{ ... "Records": [`
    fn seek_records(&mut self) -> Result<(), ReadError> {
        self.expect(b'{')?;

        let mut first = true;
        loop {
            match self.peek_significant()? {
                Some(b'}') => {
                    return Err(ReadError::Malformed(format!(
                        "missing \"{}\" field",
                        RECORDS_FIELD
                    )))
                }
                Some(b',') if !first => self.reader.consume(1),
                Some(b'"') if first => {}
                found => return Err(unexpected("a field name", found)),
            }
            first = false;

            let key: String = self
                .parse_value()
                .map_err(|e| ReadError::Malformed(format!("invalid field name: {}", e)))?;
            self.expect(b':')?;

            if key == RECORDS_FIELD {
                self.expect(b'[')?;
                return Ok(());
            }

            log::debug!("Skipping top-level field {:?}", key);
            self.skip_value()?;
        }
    }

    /// Skip one JSON value without materializing it
    fn skip_value(&mut self) -> Result<(), ReadError> {
        match self.peek_significant()? {
            Some(b'{') | Some(b'[') | Some(b'"') => {
                self.parse_value::<IgnoredAny>()
                    .map_err(|e| ReadError::Malformed(e.to_string()))?;
                Ok(())
            }
            Some(_) => self.skip_scalar(),
            None => Err(unexpected("a value", None)),
        }
    }

    /// Consume a bare literal (number, `true`, `false`, `null`) up to its delimiter
    /// and check that it is valid JSON. serde is not run on the stream here
    /// because it peeks one byte past a number.
    fn skip_scalar(&mut self) -> Result<(), ReadError> {
        let mut literal = Vec::new();
        loop {
            let (len, done) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    break;
                }
                let (len, done) = match buf.iter().position(|&b| is_delimiter(b)) {
                    Some(pos) => (pos, true),
                    None => (buf.len(), false),
                };
                literal.extend_from_slice(&buf[..len]);
                (len, done)
            };
            self.reader.consume(len);
            if done {
                break;
            }
        }

        serde_json::from_slice::<IgnoredAny>(&literal).map_err(|e| {
            ReadError::Malformed(format!(
                "invalid value {:?}: {}",
                String::from_utf8_lossy(&literal),
                e
            ))
        })?;
        Ok(())
    }

    /// Deserialize exactly one delimited value from the current position
    fn parse_value<T: DeserializeOwned>(&mut self) -> Result<T, serde_json::Error> {
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        T::deserialize(&mut de)
    }

    /// Skip whitespace and return the next byte without consuming it
    fn peek_significant(&mut self) -> Result<Option<u8>, ReadError> {
        loop {
            let (skip, found) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    return Ok(None);
                }
                match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                    Some(pos) => (pos, Some(buf[pos])),
                    None => (buf.len(), None),
                }
            };
            self.reader.consume(skip);
            if found.is_some() {
                return Ok(found);
            }
        }
    }

    fn expect(&mut self, expected: u8) -> Result<(), ReadError> {
        match self.peek_significant()? {
            Some(b) if b == expected => {
                self.reader.consume(1);
                Ok(())
            }
            found => Err(unexpected(&format!("'{}'", expected as char), found)),
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<LogRecord, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ReaderState::Done {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.state = ReaderState::Done;
                Some(Err(e))
            }
        }
    }
}

fn is_delimiter(b: u8) -> bool {
    matches!(b, b',' | b'}' | b']') || b.is_ascii_whitespace()
}

fn unexpected(expected: &str, found: Option<u8>) -> ReadError {
    match found {
        Some(b) => ReadError::Malformed(format!(
            "expected {}, found '{}'",
            expected,
            b as char
        )),
        None => ReadError::Malformed(format!("expected {}, found end of input", expected)),
    }
}
