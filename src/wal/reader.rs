//! WAL Reader
//!
//! Sequentially decodes framed records from a log file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{MeridianError, Result};

use super::entry::HEADER_SIZE;
use super::WalRecord;

/// Reads records from the WAL file.
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset of the end of the last fully-validated record.
    valid_offset: u64,
}

impl WalReader {
    /// Open a WAL file for reading from the start.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            valid_offset: 0,
        })
    }

    /// Read the next record.
    ///
    /// Returns `Ok(None)` at a clean end of file. A torn header, short
    /// payload, checksum mismatch, or undecodable payload is reported as
    /// `Corruption`; recovery decides whether to truncate or fail.
    pub fn next_record(&mut self) -> Result<Option<WalRecord>> {
        let mut header = [0u8; HEADER_SIZE as usize];
        match read_exact_or_eof(&mut self.reader, &mut header)? {
            ReadOutcome::Eof => return Ok(None),
            ReadOutcome::Short => {
                return Err(MeridianError::Corruption(
                    "torn WAL record header".to_string(),
                ))
            }
            ReadOutcome::Full => {}
        }

        let crc = u32::from_le_bytes(header[0..4].try_into().unwrap());
        let len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

        let mut payload = vec![0u8; len];
        match read_exact_or_eof(&mut self.reader, &mut payload)? {
            ReadOutcome::Full => {}
            _ => {
                return Err(MeridianError::Corruption(
                    "torn WAL record payload".to_string(),
                ))
            }
        }

        if crc32fast::hash(&payload) != crc {
            return Err(MeridianError::Corruption(
                "WAL record checksum mismatch".to_string(),
            ));
        }

        let record = WalRecord::decode(&payload)?;
        self.valid_offset += HEADER_SIZE + len as u64;
        Ok(Some(record))
    }

    /// Offset just past the last record that decoded and verified cleanly.
    pub fn valid_offset(&self) -> u64 {
        self.valid_offset
    }
}

enum ReadOutcome {
    Full,
    Short,
    Eof,
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<ReadOutcome> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Ok(if filled == 0 {
                    ReadOutcome::Eof
                } else {
                    ReadOutcome::Short
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(ReadOutcome::Full)
}
