//! SSTable Builder
//!
//! Writes versioned entries, pre-sorted in internal order, to a new table
//! file: data blocks as they fill, then the filter, meta, index, and footer.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::config::Compression;
use crate::error::{MeridianError, Result};
use crate::storage::TableContext;
use crate::types::InternalEntry;

use super::{
    IndexEntry, TableMeta, BLOCK_TRAILER_SIZE, COMPRESSION_NONE, COMPRESSION_SNAPPY, FOOTER_MAGIC,
    HEADER_SIZE, MAGIC, VERSION,
};

/// Builder for creating new table files from sorted entries.
pub struct TableBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    ctx: TableContext,

    /// Current write position
    offset: u64,
    /// Uncompressed bytes of the data block being assembled
    block: Vec<u8>,
    /// Last (key, seq) appended to the current block
    block_last: Option<(Bytes, u64)>,
    index: Vec<IndexEntry>,

    /// Distinct user keys, for the filter block
    filter_keys: Vec<Bytes>,
    entry_count: u64,
    max_seq: u64,
    min_key: Option<Bytes>,
    max_key: Option<Bytes>,
}

impl TableBuilder {
    /// Create a builder writing to `path`. Entries must be added in
    /// ascending internal order; `finish` seals the file.
    pub fn new(path: &Path, ctx: TableContext) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            ctx,
            offset: HEADER_SIZE,
            block: Vec::new(),
            block_last: None,
            index: Vec::new(),
            filter_keys: Vec::new(),
            entry_count: 0,
            max_seq: 0,
            min_key: None,
            max_key: None,
        })
    }

    /// Append one entry (next in internal order).
    pub fn add(&mut self, entry: &InternalEntry) -> Result<()> {
        // Entry framing: [key_len][val_len][seq][kind][key][value]
        self.block
            .extend_from_slice(&(entry.key.len() as u32).to_le_bytes());
        self.block
            .extend_from_slice(&(entry.value.len() as u32).to_le_bytes());
        self.block.extend_from_slice(&entry.seq.to_le_bytes());
        self.block.push(entry.kind as u8);
        self.block.extend_from_slice(&entry.key);
        self.block.extend_from_slice(&entry.value);
        self.block_last = Some((entry.key.clone(), entry.seq));

        // Track the distinct-key list for the filter. Versions of one key
        // arrive adjacent, so comparing with the previous key suffices.
        let is_new_key = match self.filter_keys.last() {
            Some(prev) => self
                .ctx
                .cmp
                .compare(prev, &entry.key)
                .is_ne(),
            None => true,
        };
        if is_new_key {
            self.filter_keys.push(entry.key.clone());
        }

        self.entry_count += 1;
        self.max_seq = self.max_seq.max(entry.seq);
        if self.min_key.is_none() {
            self.min_key = Some(entry.key.clone());
        }
        self.max_key = Some(entry.key.clone());

        if self.block.len() >= self.ctx.block_size {
            self.flush_block()?;
        }
        Ok(())
    }

    /// Number of entries appended so far.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Seal the file: flush the last data block, write filter + meta, index,
    /// and footer, then fsync. Returns the table metadata.
    pub fn finish(mut self) -> Result<TableMeta> {
        self.flush_block()?;

        let filter = match &self.ctx.filter_policy {
            Some(policy) => {
                let keys: Vec<&[u8]> = self.filter_keys.iter().map(|k| k.as_ref()).collect();
                policy.create_filter(&keys)
            }
            None => Vec::new(),
        };
        let filter_name = self
            .ctx
            .filter_policy
            .as_ref()
            .map(|p| p.name().to_string())
            .unwrap_or_default();

        let meta = TableMeta {
            entry_count: self.entry_count,
            max_seq: self.max_seq,
            min_key: self.min_key.clone().map(|k| k.to_vec()).unwrap_or_default(),
            max_key: self.max_key.clone().map(|k| k.to_vec()).unwrap_or_default(),
            filter_name,
            filter,
        };

        let meta_bytes = bincode::serialize(&meta)
            .map_err(|e| MeridianError::Corruption(format!("table meta encode failed: {e}")))?;
        let (meta_offset, meta_len) = self.write_raw_block(&meta_bytes)?;

        let index_bytes = bincode::serialize(&self.index)
            .map_err(|e| MeridianError::Corruption(format!("table index encode failed: {e}")))?;
        let (index_offset, index_len) = self.write_raw_block(&index_bytes)?;

        // Footer
        self.writer.write_all(&meta_offset.to_le_bytes())?;
        self.writer.write_all(&meta_len.to_le_bytes())?;
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&index_len.to_le_bytes())?;
        self.writer.write_all(&FOOTER_MAGIC.to_le_bytes())?;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        Ok(meta)
    }

    /// Write the pending data block with compression and trailer, recording
    /// its index entry.
    fn flush_block(&mut self) -> Result<()> {
        if self.block.is_empty() {
            return Ok(());
        }

        let (stored, tag): (Vec<u8>, u8) = match self.ctx.compression {
            Compression::Snappy => {
                let compressed = snap::raw::Encoder::new()
                    .compress_vec(&self.block)
                    .map_err(|e| {
                        MeridianError::Corruption(format!("block compression failed: {e}"))
                    })?;
                // Keep the raw bytes when compression does not pay.
                if compressed.len() < self.block.len() {
                    (compressed, COMPRESSION_SNAPPY)
                } else {
                    (std::mem::take(&mut self.block), COMPRESSION_NONE)
                }
            }
            Compression::None => (std::mem::take(&mut self.block), COMPRESSION_NONE),
        };

        let (offset, len) = self.write_block_with_trailer(&stored, tag)?;
        let (last_key, last_seq) = self
            .block_last
            .take()
            .expect("non-empty block without a last key");
        self.index.push(IndexEntry {
            last_key: last_key.to_vec(),
            last_seq,
            offset,
            len,
        });

        self.block.clear();
        Ok(())
    }

    /// Write an uncompressed auxiliary block (meta, index) with a trailer.
    fn write_raw_block(&mut self, payload: &[u8]) -> Result<(u64, u32)> {
        self.write_block_with_trailer(payload, COMPRESSION_NONE)
    }

    fn write_block_with_trailer(&mut self, stored: &[u8], tag: u8) -> Result<(u64, u32)> {
        let offset = self.offset;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(stored);
        hasher.update(&[tag]);
        let crc = hasher.finalize();

        self.writer.write_all(stored)?;
        self.writer.write_all(&[tag])?;
        self.writer.write_all(&crc.to_le_bytes())?;

        self.offset += stored.len() as u64 + BLOCK_TRAILER_SIZE;
        Ok((offset, stored.len() as u32))
    }

    /// Abandon the build and remove the partial file.
    pub fn abandon(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        std::fs::remove_file(&path)?;
        Ok(())
    }
}
