//! Structural validation of adjacency matrices.

use crate::error::{TopologyError, TopologyResult};
use crate::matrix::AdjacencyMatrix;

/// Checks every matrix must pass, whatever produced it.
pub(crate) fn validate_matrix(matrix: &AdjacencyMatrix) -> TopologyResult<()> {
    // Combustor + boundary at minimum
    if matrix.len() < 2 {
        return Err(TopologyError::TooSmall { size: matrix.len() });
    }

    for i in 0..matrix.len() {
        if matrix.get(i, i) != 0 {
            return Err(TopologyError::SelfLoop { index: i });
        }
    }

    // The boundary column is never a sink
    let boundary = matrix.boundary();
    for reactor in 0..boundary {
        if matrix.get(reactor, boundary) != 0 {
            return Err(TopologyError::EdgeIntoBoundary { reactor });
        }
    }

    Ok(())
}
