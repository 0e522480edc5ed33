//! Time-series store API.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::codec::{decode_strings, encode_strings};
use crate::container::{Container, DType};
use crate::error::{StoreError, StoreResult};
use crate::schema::Schema;

/// Rows pre-allocated per growth step unless configured otherwise.
pub const DEFAULT_CHUNK: usize = 100;

const KEYS: &str = "keys";
const UKEYS: &str = "ukeys";
const ELEMENTS: &str = "elements";
const SLICES: &str = "slices";
const TIME: &str = "time";
const CHUNK: &str = "chunk";
const DSHAPE: &str = "dshape";
const TIMES: &str = "times";

fn group_dataset(ukey: &str) -> String {
    format!("group/{ukey}")
}

/// Append-only keyed log of state vectors.
///
/// One writer per file. Every group advances its cursor together, so the
/// store always holds `series_len()` complete samples.
#[derive(Debug)]
pub struct TimeSeriesStore {
    container: Container,
    schema: Schema,
    len: usize,
    capacity: usize,
    chunk: usize,
}

impl TimeSeriesStore {
    /// Create a new store at `path`, replacing any existing file.
    ///
    /// `keys` are `"<group>:<element>"` names, one per state slot.
    pub fn create<S: AsRef<str>>(
        path: &Path,
        keys: &[S],
        initial_state_shape: usize,
        chunk: usize,
    ) -> StoreResult<Self> {
        if chunk == 0 {
            return Err(StoreError::InvalidArg {
                what: "chunk must be at least one row",
            });
        }
        if keys.len() != initial_state_shape {
            return Err(StoreError::ShapeMismatch {
                expected: initial_state_shape,
                found: keys.len(),
            });
        }
        let schema = Schema::from_keys(keys)?;
        let ngroups = schema.ukeys().len() as u64;

        let mut container = Container::create(path)?;
        for (name, strings) in [
            (KEYS, schema.keys()),
            (UKEYS, schema.ukeys()),
            (ELEMENTS, schema.elements()),
        ] {
            let codes = encode_strings(strings);
            container.allocate(name, DType::I64, codes.len() as u64, 1)?;
            container.write_i64_all(name, &codes)?;
        }

        let slices: Vec<i64> = schema
            .slices()
            .iter()
            .flat_map(|s| [s.start as i64, s.end as i64])
            .collect();
        container.allocate(SLICES, DType::I64, ngroups, 2)?;
        container.write_i64_all(SLICES, &slices)?;

        container.allocate(TIME, DType::I64, ngroups, 1)?;
        container.allocate(CHUNK, DType::I64, 1, 1)?;
        container.write_i64_all(CHUNK, &[chunk as i64])?;
        container.allocate(DSHAPE, DType::I64, ngroups + 1, 2)?;

        for (ukey, slice) in schema.ukeys().iter().zip(schema.slices()) {
            container.allocate(&group_dataset(ukey), DType::F64, chunk as u64, slice.len() as u64)?;
        }
        container.allocate(TIMES, DType::F64, chunk as u64, 1)?;

        let mut store = Self {
            container,
            schema,
            len: 0,
            capacity: chunk,
            chunk,
        };
        store.write_dshape()?;
        store.container.commit()?;

        info!(
            path = %path.display(),
            groups = ngroups,
            slots = store.schema.width(),
            chunk,
            "store created"
        );
        Ok(store)
    }

    /// Reopen an existing store for reading or continued appends.
    ///
    /// The committed directory decides allocated capacity. Cursors that
    /// disagree are truncated to the shortest complete series.
    pub fn reopen(path: &Path) -> StoreResult<Self> {
        Self::load(Container::open(path)?)
    }

    /// Open an existing store without write access.
    ///
    /// Disagreeing cursors are truncated in memory only and a stale `dshape`
    /// is left as found. Appending fails with [`StoreError::ReadOnly`].
    pub fn open_read_only(path: &Path) -> StoreResult<Self> {
        Self::load(Container::open_read_only(path)?)
    }

    fn load(container: Container) -> StoreResult<Self> {
        let path = container.path().to_path_buf();

        let keys = decode_strings(&container.read_i64_all(KEYS)?)?;
        let ukeys = decode_strings(&container.read_i64_all(UKEYS)?)?;
        let elements = decode_strings(&container.read_i64_all(ELEMENTS)?)?;

        let raw_slices = container.read_i64_all(SLICES)?;
        if raw_slices.len() % 2 != 0 {
            return Err(StoreError::corrupt("slices dataset is not [ngroups, 2]"));
        }
        let slices = raw_slices
            .chunks_exact(2)
            .map(|pair| {
                let start = to_usize(pair[0], SLICES)?;
                let end = to_usize(pair[1], SLICES)?;
                Ok(start..end)
            })
            .collect::<StoreResult<Vec<_>>>()?;
        let schema = Schema::from_parts(keys, ukeys, elements, slices)?;

        let chunk = match container.read_i64_all(CHUNK)?.as_slice() {
            [c] if *c > 0 => *c as usize,
            other => {
                return Err(StoreError::corrupt(format!("invalid chunk {other:?}")));
            }
        };

        let mut capacity = None;
        for (ukey, slice) in schema.ukeys().iter().zip(schema.slices()) {
            let entry = container.entry(&group_dataset(ukey))?;
            if entry.cols as usize != slice.len() {
                return Err(StoreError::corrupt(format!(
                    "group '{ukey}' has {} columns, slice has {}",
                    entry.cols,
                    slice.len()
                )));
            }
            check_capacity(&mut capacity, entry.rows, &entry.name)?;
        }
        let times = container.entry(TIMES)?;
        check_capacity(&mut capacity, times.rows, TIMES)?;
        let capacity = capacity.unwrap_or(0) as usize;

        let cursors = container
            .read_i64_all(TIME)?
            .into_iter()
            .map(|c| to_usize(c, TIME))
            .collect::<StoreResult<Vec<_>>>()?;
        if cursors.len() != schema.ukeys().len() {
            return Err(StoreError::corrupt(format!(
                "{} cursors for {} groups",
                cursors.len(),
                schema.ukeys().len()
            )));
        }
        let len = cursors.iter().copied().min().unwrap_or(0).min(capacity);

        let mut store = Self {
            container,
            schema,
            len,
            capacity,
            chunk,
        };

        let repair = store.container.is_writable();
        if cursors.iter().any(|&c| c != len) {
            warn!(
                path = %path.display(),
                ?cursors,
                len,
                repair,
                "store cursors disagree, truncating to last complete sample"
            );
            if repair {
                store.write_cursors()?;
            }
        }
        if store.dshape()? != store.expected_dshape()? {
            warn!(path = %path.display(), repair, "stale dshape after interrupted grow");
            if repair {
                store.write_dshape()?;
            }
        }

        info!(
            path = %path.display(),
            samples = store.len,
            capacity = store.capacity,
            created = store.container.created(),
            writable = repair,
            "store opened"
        );
        Ok(store)
    }

    /// Append one sample. Grows every dataset by one chunk when full.
    pub fn append(&mut self, state: &[f64], t: f64) -> StoreResult<()> {
        if state.len() != self.schema.width() {
            return Err(StoreError::ShapeMismatch {
                expected: self.schema.width(),
                found: state.len(),
            });
        }
        if self.len >= self.capacity {
            self.grow()?;
        }

        let row = self.len as u64;
        for (ukey, slice) in self.schema.ukeys().iter().zip(self.schema.slices()) {
            self.container
                .write_f64_row(&group_dataset(ukey), row, &state[slice.clone()])?;
        }
        self.container.write_f64_row(TIMES, row, &[t])?;

        self.len += 1;
        self.write_cursors()
    }

    /// Times and values of `element` in group `group_index`, valid rows only.
    pub fn retrieve(&self, group_index: usize, element: &str) -> StoreResult<(Vec<f64>, Vec<f64>)> {
        let ukey = self
            .schema
            .ukeys()
            .get(group_index)
            .ok_or_else(|| StoreError::UnknownGroup {
                group: group_index.to_string(),
            })?;
        let column = self
            .schema
            .column(group_index, element)
            .ok_or_else(|| StoreError::UnknownElement {
                group: ukey.clone(),
                element: element.to_string(),
            })?;
        let width = self.schema.slices()[group_index].len();

        let rows = self
            .container
            .read_f64_rows(&group_dataset(ukey), self.len as u64)?;
        let values = rows.chunks_exact(width).map(|r| r[column]).collect();
        Ok((self.times()?, values))
    }

    /// [`TimeSeriesStore::retrieve`] addressed by group name.
    pub fn retrieve_by_name(&self, group: &str, element: &str) -> StoreResult<(Vec<f64>, Vec<f64>)> {
        let index = self
            .schema
            .group_index(group)
            .ok_or_else(|| StoreError::UnknownGroup {
                group: group.to_string(),
            })?;
        self.retrieve(index, element)
    }

    /// Reassemble the full state vector of sample `row`.
    pub fn read_row(&self, row: usize) -> StoreResult<Vec<f64>> {
        if row >= self.len {
            return Err(StoreError::RowOutOfRange { row, len: self.len });
        }
        let mut state = Vec::with_capacity(self.schema.width());
        for ukey in self.schema.ukeys() {
            state.extend(
                self.container
                    .read_f64_row(&group_dataset(ukey), row as u64)?,
            );
        }
        Ok(state)
    }

    /// Sample times written so far.
    pub fn times(&self) -> StoreResult<Vec<f64>> {
        self.container.read_f64_rows(TIMES, self.len as u64)
    }

    pub fn last_time(&self) -> StoreResult<Option<f64>> {
        Ok(self.times()?.last().copied())
    }

    /// Persisted `[rows, cols]` per group dataset, then `times`.
    pub fn dshape(&self) -> StoreResult<Vec<[usize; 2]>> {
        let raw = self.container.read_i64_all(DSHAPE)?;
        raw.chunks_exact(2)
            .map(|pair| Ok([to_usize(pair[0], DSHAPE)?, to_usize(pair[1], DSHAPE)?]))
            .collect()
    }

    /// Number of complete samples.
    pub fn series_len(&self) -> usize {
        self.len
    }

    /// Allocated rows per dataset.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    pub fn groups(&self) -> &[String] {
        self.schema.ukeys()
    }

    pub fn keys(&self) -> &[String] {
        self.schema.keys()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        self.container.path()
    }

    /// Give every managed dataset one more chunk-sized extent.
    fn grow(&mut self) -> StoreResult<()> {
        for ukey in self.schema.ukeys() {
            self.container.extend(&group_dataset(ukey))?;
        }
        self.container.extend(TIMES)?;
        self.container.commit()?;
        self.capacity += self.chunk;
        self.write_dshape()?;
        debug!(
            path = %self.container.path().display(),
            capacity = self.capacity,
            "store grown"
        );
        Ok(())
    }

    /// Commit every group cursor with one write.
    fn write_cursors(&mut self) -> StoreResult<()> {
        let cursors = vec![self.len as i64; self.schema.ukeys().len()];
        self.container.write_i64_all(TIME, &cursors)
    }

    fn expected_dshape(&self) -> StoreResult<Vec<[usize; 2]>> {
        let mut shapes = Vec::with_capacity(self.schema.ukeys().len() + 1);
        for ukey in self.schema.ukeys() {
            let entry = self.container.entry(&group_dataset(ukey))?;
            shapes.push([entry.rows as usize, entry.cols as usize]);
        }
        let times = self.container.entry(TIMES)?;
        shapes.push([times.rows as usize, times.cols as usize]);
        Ok(shapes)
    }

    fn write_dshape(&mut self) -> StoreResult<()> {
        let flat: Vec<i64> = self
            .expected_dshape()?
            .into_iter()
            .flat_map(|[r, c]| [r as i64, c as i64])
            .collect();
        self.container.write_i64_all(DSHAPE, &flat)
    }
}

fn to_usize(value: i64, dataset: &str) -> StoreResult<usize> {
    usize::try_from(value)
        .map_err(|_| StoreError::corrupt(format!("negative value {value} in '{dataset}'")))
}

fn check_capacity(capacity: &mut Option<u64>, rows: u64, name: &str) -> StoreResult<()> {
    match *capacity {
        None => {
            *capacity = Some(rows);
            Ok(())
        }
        Some(expected) if expected == rows => Ok(()),
        Some(expected) => Err(StoreError::corrupt(format!(
            "dataset '{name}' has {rows} rows, expected {expected}"
        ))),
    }
}
