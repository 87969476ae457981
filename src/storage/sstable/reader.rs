//! SSTable Reader
//!
//! Opens table files, serves point lookups through the filter and index,
//! and hands out blocks to iterators. Block reads go through the shared
//! block cache; the file itself is accessed with positioned reads, so one
//! reader serves any number of concurrent threads.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::config::ReadOptions;
use crate::error::{MeridianError, Result};
use crate::storage::TableContext;
use crate::types::{compare_internal, InternalEntry, SequenceNumber, ValueKind, MAX_SEQUENCE};

use super::{
    IndexEntry, TableIterator, TableMeta, BLOCK_TRAILER_SIZE, COMPRESSION_NONE,
    COMPRESSION_SNAPPY, ENTRY_HEADER_SIZE, FOOTER_MAGIC, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION,
};

/// An open, immutable table file.
pub struct Table {
    id: u64,
    path: PathBuf,
    file: File,
    file_size: u64,
    meta: TableMeta,
    index: Vec<IndexEntry>,
    /// End of the data-block region.
    data_end: u64,
    ctx: TableContext,
}

impl Table {
    /// Open a table, loading its footer, meta, and index eagerly. Data
    /// blocks are read on demand.
    pub fn open(path: &Path, id: u64, ctx: TableContext) -> Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(MeridianError::Corruption(format!(
                "table {} too short ({file_size} bytes)",
                path.display()
            )));
        }

        // Header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact_at(&mut header, 0)?;
        if &header[0..4] != MAGIC {
            return Err(MeridianError::Corruption(format!(
                "bad table magic in {}",
                path.display()
            )));
        }
        let version = u16::from_le_bytes(header[4..6].try_into().unwrap());
        if version != VERSION {
            return Err(MeridianError::Corruption(format!(
                "unsupported table version {version} in {}",
                path.display()
            )));
        }

        // Footer
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact_at(&mut footer, file_size - FOOTER_SIZE)?;
        let meta_offset = u64::from_le_bytes(footer[0..8].try_into().unwrap());
        let meta_len = u32::from_le_bytes(footer[8..12].try_into().unwrap());
        let index_offset = u64::from_le_bytes(footer[12..20].try_into().unwrap());
        let index_len = u32::from_le_bytes(footer[20..24].try_into().unwrap());
        let footer_magic = u64::from_le_bytes(footer[24..32].try_into().unwrap());
        if footer_magic != FOOTER_MAGIC {
            return Err(MeridianError::Corruption(format!(
                "bad table footer in {}",
                path.display()
            )));
        }

        // Meta and index blocks are always checksum-verified; they are read
        // once and everything else depends on them.
        let meta_bytes = read_stored_block(&file, meta_offset, meta_len, true)?;
        let meta: TableMeta = bincode::deserialize(&meta_bytes)
            .map_err(|e| MeridianError::Corruption(format!("table meta decode failed: {e}")))?;

        let index_bytes = read_stored_block(&file, index_offset, index_len, true)?;
        let index: Vec<IndexEntry> = bincode::deserialize(&index_bytes)
            .map_err(|e| MeridianError::Corruption(format!("table index decode failed: {e}")))?;

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file,
            file_size,
            meta,
            index,
            data_end: meta_offset,
            ctx,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    /// Number of data blocks in this table.
    pub fn block_count(&self) -> usize {
        self.index.len()
    }

    pub(super) fn comparator(&self) -> &crate::comparator::ComparatorRef {
        &self.ctx.cmp
    }

    /// Quick range check: false only if `key` is outside [min_key, max_key].
    pub fn might_contain(&self, key: &[u8]) -> bool {
        if self.meta.entry_count == 0 {
            return false;
        }
        self.ctx.cmp.compare(key, &self.meta.min_key).is_ge()
            && self.ctx.cmp.compare(key, &self.meta.max_key).is_le()
    }

    /// True if the key range of this table intersects [begin, end] (either
    /// bound absent means open-ended).
    pub fn overlaps_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> bool {
        if self.meta.entry_count == 0 {
            return false;
        }
        if let Some(begin) = begin {
            if self.ctx.cmp.compare(&self.meta.max_key, begin).is_lt() {
                return false;
            }
        }
        if let Some(end) = end {
            if self.ctx.cmp.compare(&self.meta.min_key, end).is_gt() {
                return false;
            }
        }
        true
    }

    /// Newest version of `key` at or below `seq_bound`, if this table has
    /// one. Consults the filter, then the index, then a single block.
    pub fn get(
        &self,
        key: &[u8],
        seq_bound: SequenceNumber,
        ropts: &ReadOptions,
    ) -> Result<Option<InternalEntry>> {
        if !self.might_contain(key) {
            return Ok(None);
        }
        if let Some(policy) = &self.ctx.filter_policy {
            if !self.meta.filter.is_empty()
                && policy.name() == self.meta.filter_name
                && !policy.key_may_match(key, &self.meta.filter)
            {
                return Ok(None);
            }
        }

        let Some(block_idx) = self.block_index_for(key, seq_bound) else {
            return Ok(None);
        };
        let entries = self.read_block_entries(block_idx, ropts)?;

        // First entry >= (key, seq_bound): the newest visible version of
        // `key` if the user key matches.
        let pos = entries.partition_point(|e| {
            compare_internal(self.ctx.cmp.as_ref(), &e.key, e.seq, key, seq_bound).is_lt()
        });
        match entries.get(pos) {
            Some(e) if self.ctx.cmp.compare(&e.key, key).is_eq() => Ok(Some(e.clone())),
            _ => Ok(None),
        }
    }

    /// Index of the first block whose last entry is >= (key, seq).
    pub(super) fn block_index_for(&self, key: &[u8], seq: SequenceNumber) -> Option<usize> {
        let idx = self.index.partition_point(|e| {
            compare_internal(self.ctx.cmp.as_ref(), &e.last_key, e.last_seq, key, seq).is_lt()
        });
        (idx < self.index.len()).then_some(idx)
    }

    /// First byte of the data-block region.
    pub fn data_start(&self) -> u64 {
        HEADER_SIZE
    }

    /// One past the last byte of the data-block region.
    pub fn data_end(&self) -> u64 {
        self.data_end
    }

    /// Approximate file offset where `key`'s range begins. Used for size
    /// estimates; never touches data blocks.
    pub fn offset_of(&self, key: &[u8]) -> u64 {
        let idx = self.index.partition_point(|e| {
            compare_internal(self.ctx.cmp.as_ref(), &e.last_key, e.last_seq, key, MAX_SEQUENCE)
                .is_lt()
        });
        match self.index.get(idx) {
            Some(entry) => entry.offset,
            None => self.data_end,
        }
    }

    /// Cursor over every entry of this table in internal order.
    pub fn iter(self: &std::sync::Arc<Self>, ropts: &ReadOptions) -> TableIterator {
        TableIterator::new(std::sync::Arc::clone(self), ropts.clone())
    }

    /// Decode the entries of block `idx`, going through the block cache.
    pub(super) fn read_block_entries(
        &self,
        idx: usize,
        ropts: &ReadOptions,
    ) -> Result<Vec<InternalEntry>> {
        let entry = &self.index[idx];
        let payload = self.read_block(entry.offset, entry.len, ropts)?;
        parse_block(&payload)
    }

    fn read_block(&self, offset: u64, len: u32, ropts: &ReadOptions) -> Result<Bytes> {
        let cache_key = (self.id, offset);
        if let Some(block) = self.ctx.cache.get(&cache_key) {
            return Ok(block);
        }

        let verify = ropts.verify_checksums || self.ctx.paranoid;
        let payload = read_stored_block(&self.file, offset, len, verify)?;

        if ropts.fill_cache {
            let charge = payload.len() as u64;
            self.ctx.cache.insert(cache_key, payload.clone(), charge);
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("entries", &self.meta.entry_count)
            .field("file_size", &self.file_size)
            .finish()
    }
}

/// Read one stored block at (offset, len), check its trailer if asked, and
/// return the decompressed payload.
fn read_stored_block(file: &File, offset: u64, len: u32, verify: bool) -> Result<Bytes> {
    let total = len as usize + BLOCK_TRAILER_SIZE as usize;
    let mut buf = vec![0u8; total];
    file.read_exact_at(&mut buf, offset)?;

    let tag = buf[len as usize];
    if verify {
        let stored_crc = u32::from_le_bytes(
            buf[len as usize + 1..total]
                .try_into()
                .expect("trailer slice is 4 bytes"),
        );
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&buf[..len as usize + 1]);
        if hasher.finalize() != stored_crc {
            return Err(MeridianError::Corruption(format!(
                "block checksum mismatch at offset {offset}"
            )));
        }
    }

    buf.truncate(len as usize);
    match tag {
        COMPRESSION_NONE => Ok(Bytes::from(buf)),
        COMPRESSION_SNAPPY => {
            let raw = snap::raw::Decoder::new()
                .decompress_vec(&buf)
                .map_err(|e| {
                    MeridianError::Corruption(format!(
                        "block decompression failed at offset {offset}: {e}"
                    ))
                })?;
            Ok(Bytes::from(raw))
        }
        other => Err(MeridianError::Corruption(format!(
            "unknown block compression tag {other} at offset {offset}"
        ))),
    }
}

/// Decode a block payload into entries. Keys and values are zero-copy
/// slices of the payload buffer.
fn parse_block(payload: &Bytes) -> Result<Vec<InternalEntry>> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < payload.len() {
        if pos + ENTRY_HEADER_SIZE > payload.len() {
            return Err(MeridianError::Corruption(
                "truncated entry header in block".to_string(),
            ));
        }
        let key_len =
            u32::from_le_bytes(payload[pos..pos + 4].try_into().unwrap()) as usize;
        let val_len =
            u32::from_le_bytes(payload[pos + 4..pos + 8].try_into().unwrap()) as usize;
        let seq = u64::from_le_bytes(payload[pos + 8..pos + 16].try_into().unwrap());
        let kind = ValueKind::from_u8(payload[pos + 16]).ok_or_else(|| {
            MeridianError::Corruption(format!("bad entry kind byte {}", payload[pos + 16]))
        })?;
        pos += ENTRY_HEADER_SIZE;

        if pos + key_len + val_len > payload.len() {
            return Err(MeridianError::Corruption(
                "truncated entry body in block".to_string(),
            ));
        }
        let key = payload.slice(pos..pos + key_len);
        pos += key_len;
        let value = payload.slice(pos..pos + val_len);
        pos += val_len;

        entries.push(InternalEntry { key, seq, kind, value });
    }
    Ok(entries)
}
