//! Topology configuration errors.
//!
//! Every variant is fatal and raised before any engine object exists.

use thiserror::Error;

pub type TopologyResult<T> = Result<T, TopologyError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// `n` is not a triangular number, so the fan-out levels do not close.
    #[error("linear expansion needs a triangular reactor count, got {n}")]
    NotTriangular { n: usize },

    #[error("grid needs at least one row and one column (rows={rows}, cols={cols})")]
    InvalidGrid { rows: usize, cols: usize },

    #[error("adjacency matrix is not square: row {row} has {len} cells, expected {expected}")]
    NotSquare {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("adjacency matrix needs a combustor and a boundary row (size={size})")]
    TooSmall { size: usize },

    #[error("reactor {index} feeds itself")]
    SelfLoop { index: usize },

    #[error("reactor {reactor} flows into the boundary row")]
    EdgeIntoBoundary { reactor: usize },

    #[error("reactor {reactor} has a fan-out edge but resolves to zero sinks")]
    ZeroSinkCount { reactor: usize },

    #[error("reactor {reactor} mixes flow classes on its outgoing edges")]
    MixedOutflowClass { reactor: usize },

    #[error("edge ({from}, {to}) uses flow class {class} with no flow function")]
    UnknownFlowClass { from: usize, to: usize, class: u8 },

    #[error("exhaust cells form a cycle through reactor {index}")]
    Cycle { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_reactor() {
        let err = TopologyError::MixedOutflowClass { reactor: 3 };
        assert!(err.to_string().contains("reactor 3"));

        let err = TopologyError::NotTriangular { n: 14 };
        assert!(err.to_string().contains("14"));
    }
}
