//! pn-core: shared foundation for plumenet.
//!
//! Contains:
//! - units (uom SI types, constructors and gas constants)
//! - numeric (tolerances, finiteness checks, triangular roots)
//! - ids (stable compact IDs for reactors and connectors)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod units;

pub use error::{PnError, PnResult};
pub use ids::*;
pub use numeric::*;
pub use units::*;
