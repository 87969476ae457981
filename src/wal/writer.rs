//! WAL Writer
//!
//! Appends framed records to the log file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::WalRecord;

/// Writes records to the WAL file.
///
/// Every append pushes the bytes to the OS (so a process crash loses
/// nothing); `sync = true` additionally fsyncs so a machine crash loses
/// nothing either.
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl WalWriter {
    /// Open the log for appending, creating it if absent.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Append one record: `[crc32][len][payload]`.
    pub fn append(&mut self, record: &WalRecord, sync: bool) -> Result<()> {
        let payload = record.encode()?;
        let crc = crc32fast::hash(&payload);

        self.writer.write_all(&crc.to_le_bytes())?;
        self.writer.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.writer.write_all(&payload)?;

        // Hand the bytes to the OS unconditionally; buffering across records
        // would widen the process-crash loss window beyond the contract.
        self.writer.flush()?;

        if sync {
            self.writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Fsync the log file.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }

    /// Drop all records. Called after a memtable flush makes them redundant.
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        Ok(())
    }
}
