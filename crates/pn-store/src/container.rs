//! Single-file dataset container.
//!
//! Layout (little-endian):
//! - superblock, 32 bytes: magic, `u32` version, `u32` reserved, `u64`
//!   directory offset, `u64` directory length
//! - dataset extents, `extent_rows * cols` 8-byte words each, row-major
//! - two directory slots holding the JSON directory, used alternately
//!
//! Datasets grow by appending extents; committed bytes are never moved.
//! A commit writes the directory into the inactive slot and then rewrites
//! the superblock, which is the single commit point for a layout change.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

pub(crate) const MAGIC: &[u8; 8] = b"PNSTORE\0";
pub(crate) const FORMAT_VERSION: u32 = 1;
pub(crate) const SUPERBLOCK_LEN: u64 = 32;
const WORD: u64 = 8;
const MIN_SLOT: u64 = 4096;

/// Element type of a dataset. Both are 8 bytes wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F64,
    I64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DatasetEntry {
    pub name: String,
    pub dtype: DType,
    pub rows: u64,
    pub cols: u64,
    /// Rows held by each extent.
    pub extent_rows: u64,
    /// Extent runs as `[first offset, stride, count]`.
    pub extents: Vec<[u64; 3]>,
}

impl DatasetEntry {
    fn row_bytes(&self) -> StoreResult<u64> {
        self.cols
            .checked_mul(WORD)
            .ok_or_else(|| StoreError::overflow(&self.name))
    }

    fn extent_bytes(&self) -> StoreResult<u64> {
        self.row_bytes()?
            .checked_mul(self.extent_rows)
            .ok_or_else(|| StoreError::overflow(&self.name))
    }

    fn extent_count(&self) -> StoreResult<u64> {
        self.extents
            .iter()
            .try_fold(0_u64, |n, run| n.checked_add(run[2]))
            .ok_or_else(|| StoreError::overflow(&self.name))
    }

    fn extent_offset(&self, mut index: u64) -> StoreResult<u64> {
        for &[offset, stride, count] in &self.extents {
            if index < count {
                return stride
                    .checked_mul(index)
                    .and_then(|s| s.checked_add(offset))
                    .ok_or_else(|| StoreError::overflow(&self.name));
            }
            index -= count;
        }
        Err(StoreError::corrupt(format!(
            "dataset '{}' is missing an extent",
            self.name
        )))
    }

    /// Contiguous `(offset, len)` byte ranges covering rows `first..first + rows`.
    fn spans(&self, first: u64, rows: u64) -> StoreResult<Vec<(u64, u64)>> {
        let overflow = || StoreError::overflow(&self.name);
        let end = first.checked_add(rows).ok_or_else(overflow)?;
        if end > self.rows || (rows > 0 && self.extent_rows == 0) {
            return Err(StoreError::corrupt(format!(
                "rows {first}..{end} outside '{}' ({} rows)",
                self.name, self.rows
            )));
        }
        let row_bytes = self.row_bytes()?;
        let mut spans = Vec::new();
        let mut row = first;
        while row < end {
            let within = row % self.extent_rows;
            let take = (self.extent_rows - within).min(end - row);
            let base = self.extent_offset(row / self.extent_rows)?;
            let offset = within
                .checked_mul(row_bytes)
                .and_then(|skip| base.checked_add(skip))
                .ok_or_else(overflow)?;
            spans.push((offset, take.checked_mul(row_bytes).ok_or_else(overflow)?));
            row += take;
        }
        Ok(spans)
    }

    /// Every extent must sit inside the file and agree with `rows`.
    fn validate(&self, file_len: u64) -> StoreResult<()> {
        let overflow = || StoreError::overflow(&self.name);
        let bytes = self.extent_bytes()?;
        if self.extent_count()?.checked_mul(self.extent_rows) != Some(self.rows) {
            return Err(StoreError::corrupt(format!(
                "dataset '{}' rows do not match its extents",
                self.name
            )));
        }
        for &[offset, stride, count] in &self.extents {
            if count == 0 || (count > 1 && stride < bytes) {
                return Err(StoreError::corrupt(format!(
                    "dataset '{}' has a malformed extent run",
                    self.name
                )));
            }
            let end = stride
                .checked_mul(count - 1)
                .and_then(|s| s.checked_add(offset))
                .and_then(|last| last.checked_add(bytes))
                .ok_or_else(overflow)?;
            if offset < SUPERBLOCK_LEN || end > file_len {
                return Err(StoreError::corrupt(format!(
                    "dataset '{}' lies outside the file",
                    self.name
                )));
            }
        }
        Ok(())
    }

    fn push_extent(&mut self, offset: u64) {
        match self.extents.last_mut() {
            Some(run) if run[2] == 1 && offset > run[0] => {
                run[1] = offset - run[0];
                run[2] = 2;
            }
            Some(run)
                if run[2] > 1
                    && run[1].checked_mul(run[2]).and_then(|s| s.checked_add(run[0]))
                        == Some(offset) =>
            {
                run[2] += 1;
            }
            _ => self.extents.push([offset, 0, 1]),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Slot {
    offset: u64,
    capacity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Directory {
    created: String,
    slots: [Slot; 2],
    datasets: Vec<DatasetEntry>,
}

#[derive(Debug)]
pub(crate) struct Container {
    file: File,
    path: PathBuf,
    directory: Directory,
    writable: bool,
    end: u64,
    /// Slot the superblock points at, once committed.
    active: Option<usize>,
}

impl Container {
    /// Create (or truncate) a container with an empty, uncommitted directory.
    pub fn create(path: &Path) -> StoreResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&[0_u8; SUPERBLOCK_LEN as usize])?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            directory: Directory {
                created: chrono::Utc::now().to_rfc3339(),
                slots: [Slot::default(); 2],
                datasets: Vec::new(),
            },
            writable: true,
            end: SUPERBLOCK_LEN,
            active: None,
        })
    }

    /// Open an existing container through its committed directory.
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::load(path, true)
    }

    /// Open without write access. Every mutation fails with `ReadOnly`.
    pub fn open_read_only(path: &Path) -> StoreResult<Self> {
        Self::load(path, false)
    }

    fn load(path: &Path, writable: bool) -> StoreResult<Self> {
        if !path.is_file() {
            return Err(StoreError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let mut file = OpenOptions::new().read(true).write(writable).open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < SUPERBLOCK_LEN {
            return Err(StoreError::corrupt("file shorter than superblock"));
        }

        let mut superblock = [0_u8; SUPERBLOCK_LEN as usize];
        file.read_exact(&mut superblock)?;
        if &superblock[0..8] != MAGIC {
            return Err(StoreError::corrupt("bad magic, not a plumenet store"));
        }
        let version = u32::from_le_bytes(word4(&superblock[8..12]));
        if version != FORMAT_VERSION {
            return Err(StoreError::corrupt(format!(
                "unsupported format version {version}"
            )));
        }
        let dir_offset = u64::from_le_bytes(word8(&superblock[16..24]));
        let dir_len = u64::from_le_bytes(word8(&superblock[24..32]));
        if dir_offset < SUPERBLOCK_LEN || dir_offset.saturating_add(dir_len) > file_len {
            return Err(StoreError::corrupt("directory lies outside the file"));
        }

        let mut raw = vec![0_u8; to_len(dir_len)?];
        file.seek(SeekFrom::Start(dir_offset))?;
        file.read_exact(&mut raw)?;
        let directory: Directory = serde_json::from_slice(&raw)
            .map_err(|e| StoreError::corrupt(format!("unreadable directory: {e}")))?;

        for slot in directory.slots.iter().filter(|s| s.capacity > 0) {
            if slot.offset < SUPERBLOCK_LEN
                || slot.offset.checked_add(slot.capacity).is_none_or(|end| end > file_len)
            {
                return Err(StoreError::corrupt("directory slot lies outside the file"));
            }
        }
        let active = directory
            .slots
            .iter()
            .position(|s| s.offset == dir_offset && s.capacity >= dir_len)
            .ok_or_else(|| StoreError::corrupt("superblock does not point at a directory slot"))?;
        for entry in &directory.datasets {
            entry.validate(file_len)?;
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
            directory,
            writable,
            end: file_len,
            active: Some(active),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created(&self) -> &str {
        &self.directory.created
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn entry(&self, name: &str) -> StoreResult<&DatasetEntry> {
        let index = self.position(name)?;
        Ok(&self.directory.datasets[index])
    }

    /// Reserve a zero-filled single-extent dataset at the end of the file.
    ///
    /// Replaces an existing entry of the same name once the directory is committed.
    pub fn allocate(&mut self, name: &str, dtype: DType, rows: u64, cols: u64) -> StoreResult<()> {
        let mut entry = DatasetEntry {
            name: name.to_string(),
            dtype,
            rows,
            cols,
            extent_rows: rows,
            extents: Vec::new(),
        };
        let offset = self.reserve(entry.extent_bytes()?)?;
        entry.extents.push([offset, 0, 1]);
        self.upsert(entry);
        Ok(())
    }

    /// Append one zero-filled extent to `name`. Existing rows stay in place.
    pub fn extend(&mut self, name: &str) -> StoreResult<()> {
        let index = self.position(name)?;
        let entry = &self.directory.datasets[index];
        let bytes = entry.extent_bytes()?;
        let rows = entry
            .rows
            .checked_add(entry.extent_rows)
            .ok_or_else(|| StoreError::overflow(name))?;

        let offset = self.reserve(bytes)?;
        let entry = &mut self.directory.datasets[index];
        entry.push_extent(offset);
        entry.rows = rows;
        Ok(())
    }

    /// Write the directory into the inactive slot and point the superblock at it.
    pub fn commit(&mut self) -> StoreResult<()> {
        self.ensure_writable()?;
        let target = self.active.map_or(0, |slot| 1 - slot);
        let mut raw = serde_json::to_vec(&self.directory)?;
        while raw.len() as u64 > self.directory.slots[target].capacity {
            let capacity = (raw.len() as u64).saturating_mul(2).max(MIN_SLOT);
            let offset = self.reserve(capacity)?;
            self.directory.slots[target] = Slot { offset, capacity };
            raw = serde_json::to_vec(&self.directory)?;
        }

        let dir_offset = self.directory.slots[target].offset;
        self.write_at(dir_offset, &raw)?;
        self.file.sync_data()?;

        let mut superblock = Vec::with_capacity(SUPERBLOCK_LEN as usize);
        superblock.extend_from_slice(MAGIC);
        superblock.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        superblock.extend_from_slice(&0_u32.to_le_bytes());
        superblock.extend_from_slice(&dir_offset.to_le_bytes());
        superblock.extend_from_slice(&(raw.len() as u64).to_le_bytes());
        self.write_at(0, &superblock)?;
        self.file.sync_data()?;
        self.active = Some(target);
        Ok(())
    }

    pub fn write_f64_row(&mut self, name: &str, row: u64, values: &[f64]) -> StoreResult<()> {
        let entry = self.checked(name, DType::F64, row, values.len())?;
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let spans = entry.spans(row, 1)?;
        self.write_spans(&spans, &bytes)
    }

    /// Write a whole i64 dataset in one call.
    pub fn write_i64_all(&mut self, name: &str, values: &[i64]) -> StoreResult<()> {
        let entry = self.entry(name)?.clone();
        if entry.dtype != DType::I64
            || entry.rows.checked_mul(entry.cols) != Some(values.len() as u64)
        {
            return Err(StoreError::corrupt(format!(
                "dataset '{name}' does not hold {} i64 values",
                values.len()
            )));
        }
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let spans = entry.spans(0, entry.rows)?;
        self.write_spans(&spans, &bytes)
    }

    /// Read the first `rows` rows of an f64 dataset, row-major.
    pub fn read_f64_rows(&self, name: &str, rows: u64) -> StoreResult<Vec<f64>> {
        let entry = self.entry(name)?;
        if entry.dtype != DType::F64 || rows > entry.rows {
            return Err(StoreError::corrupt(format!(
                "cannot read {rows} f64 rows from '{name}'"
            )));
        }
        let raw = self.read_spans(&entry.spans(0, rows)?)?;
        Ok(raw
            .chunks_exact(WORD as usize)
            .map(|w| f64::from_le_bytes(word8(w)))
            .collect())
    }

    /// Read one f64 row.
    pub fn read_f64_row(&self, name: &str, row: u64) -> StoreResult<Vec<f64>> {
        let entry = self.entry(name)?;
        if entry.dtype != DType::F64 || row >= entry.rows {
            return Err(StoreError::corrupt(format!(
                "cannot read f64 row {row} from '{name}'"
            )));
        }
        let raw = self.read_spans(&entry.spans(row, 1)?)?;
        Ok(raw
            .chunks_exact(WORD as usize)
            .map(|w| f64::from_le_bytes(word8(w)))
            .collect())
    }

    /// Read a whole i64 dataset, row-major.
    pub fn read_i64_all(&self, name: &str) -> StoreResult<Vec<i64>> {
        let entry = self.entry(name)?;
        if entry.dtype != DType::I64 {
            return Err(StoreError::corrupt(format!("dataset '{name}' is not i64")));
        }
        let raw = self.read_spans(&entry.spans(0, entry.rows)?)?;
        Ok(raw
            .chunks_exact(WORD as usize)
            .map(|w| i64::from_le_bytes(word8(w)))
            .collect())
    }

    fn position(&self, name: &str) -> StoreResult<usize> {
        self.directory
            .datasets
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| StoreError::corrupt(format!("missing dataset '{name}'")))
    }

    fn checked(&self, name: &str, dtype: DType, row: u64, len: usize) -> StoreResult<DatasetEntry> {
        let entry = self.entry(name)?;
        if entry.dtype != dtype || entry.cols != len as u64 || row >= entry.rows {
            return Err(StoreError::corrupt(format!(
                "write of {len} values to row {row} of '{name}' ({}x{} {:?})",
                entry.rows, entry.cols, entry.dtype
            )));
        }
        Ok(entry.clone())
    }

    fn upsert(&mut self, entry: DatasetEntry) {
        match self
            .directory
            .datasets
            .iter_mut()
            .find(|e| e.name == entry.name)
        {
            Some(existing) => *existing = entry,
            None => self.directory.datasets.push(entry),
        }
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        if self.writable {
            Ok(())
        } else {
            Err(StoreError::ReadOnly {
                path: self.path.clone(),
            })
        }
    }

    /// Extend the file by `len` zero bytes and return where they start.
    fn reserve(&mut self, len: u64) -> StoreResult<u64> {
        self.ensure_writable()?;
        let offset = self.end;
        let end = offset
            .checked_add(len)
            .ok_or_else(|| StoreError::corrupt("file offset overflows"))?;
        self.file.set_len(end)?;
        self.end = end;
        Ok(offset)
    }

    fn write_spans(&mut self, spans: &[(u64, u64)], mut bytes: &[u8]) -> StoreResult<()> {
        for &(offset, len) in spans {
            let (head, rest) = bytes.split_at(to_len(len)?.min(bytes.len()));
            self.write_at(offset, head)?;
            bytes = rest;
        }
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> StoreResult<()> {
        self.ensure_writable()?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    fn read_spans(&self, spans: &[(u64, u64)]) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        let mut file = &self.file;
        for &(offset, len) in spans {
            let start = buf.len();
            buf.resize(start + to_len(len)?, 0);
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut buf[start..])?;
        }
        Ok(buf)
    }
}

fn to_len(len: u64) -> StoreResult<usize> {
    usize::try_from(len).map_err(|_| StoreError::corrupt(format!("length {len} exceeds memory")))
}

fn word4(bytes: &[u8]) -> [u8; 4] {
    let mut out = [0_u8; 4];
    out.copy_from_slice(&bytes[..4]);
    out
}

fn word8(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0_u8; 8];
    out.copy_from_slice(&bytes[..8]);
    out
}
