//! pn-store: append-only, growable, keyed time-series log.
//!
//! A store is one random-access file holding
//! - schema datasets (`keys`, `ukeys`, `elements`, `slices`, `time`, `chunk`, `dshape`)
//! - one `group/<ukey>` dataset per reactor group (rows = samples)
//! - a parallel `times` dataset
//!
//! Rows are pre-allocated `chunk` at a time. Growth appends one extent per
//! group dataset without moving written rows, then commits through the
//! superblock, so an interrupted grow leaves the previous layout readable.

pub mod codec;
pub(crate) mod container;
pub mod error;
pub mod schema;
pub mod store;

pub use container::DType;
pub use error::{StoreError, StoreResult};
pub use schema::{ComponentKey, Schema};
pub use store::{DEFAULT_CHUNK, TimeSeriesStore};
