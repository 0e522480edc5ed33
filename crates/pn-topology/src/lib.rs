//! pn-topology: reactor-network topology layer for plumenet.
//!
//! Provides:
//! - `AdjacencyMatrix`: square class-tag matrix over reactor indices
//! - Topology generators (`linear_expansion`, `grid`, `simple`)
//! - `FlowPlan`: the typed, validated edge list derived once from a matrix
//!
//! Index 0 is the combustor, the last index is the boundary (atmosphere)
//! row, everything between is an exhaust cell.
//!
//! # Example
//!
//! ```
//! use pn_topology::{linear_expansion, FlowClasses, FlowPlan};
//!
//! let matrix = linear_expansion(10).unwrap();
//! assert_eq!(matrix.len(), 11);
//!
//! let plan = FlowPlan::from_matrix(&matrix, FlowClasses::default()).unwrap();
//! assert_eq!(plan.sink_count(0), 2);
//! ```

pub mod error;
pub mod generators;
pub mod matrix;
pub mod plan;
pub(crate) mod validate;

pub use error::{TopologyError, TopologyResult};
pub use generators::{grid, linear_expansion, simple};
pub use matrix::AdjacencyMatrix;
pub use plan::{EdgeKind, Endpoint, FlowClasses, FlowEdge, FlowPlan};
