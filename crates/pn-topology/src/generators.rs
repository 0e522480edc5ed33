//! Topology templates.
//!
//! All generators are pure: they return a matrix and create nothing else.
//! Every edge they emit carries flow class 1.

use pn_core::triangular_root;
use tracing::debug;

use crate::error::{TopologyError, TopologyResult};
use crate::matrix::AdjacencyMatrix;
use crate::validate;

const DEFAULT_CLASS: u8 = 1;

/// Triangular fan-out of `n` reactors (combustor included) plus the boundary row.
///
/// Level `k` holds `k + 1` reactors starting at index `k(k+1)/2`, and every
/// reactor of level `k` feeds every reactor of level `k + 1`. The boundary
/// entrains into the first and last reactor of each level.
///
/// `n` must be triangular; `linear_expansion(1)` is the same matrix as [`simple`].
pub fn linear_expansion(n: usize) -> TopologyResult<AdjacencyMatrix> {
    let steps = match triangular_root(n) {
        Some(steps) if steps > 0 => steps,
        _ => return Err(TopologyError::NotTriangular { n }),
    };

    let mut matrix = AdjacencyMatrix::zeroed(n + 1);
    let boundary = n;
    let level_start = |k: usize| k * (k + 1) / 2;

    for k in 0..steps {
        let start = level_start(k);
        let end = start + k + 1;

        if k + 1 < steps {
            let next = level_start(k + 1);
            for src in start..end {
                for dst in next..next + k + 2 {
                    matrix.set(src, dst, DEFAULT_CLASS);
                }
            }
        }

        matrix.set(boundary, start, DEFAULT_CLASS);
        matrix.set(boundary, end - 1, DEFAULT_CLASS);
    }

    validate::validate_matrix(&matrix)?;
    debug!(n, steps, edges = matrix.edge_count(), "linear expansion topology");
    Ok(matrix)
}

/// `rows x cols` mesh of exhaust cells downstream of the combustor.
///
/// Cells are numbered column-major, `cell(r, c) = 1 + c * rows + r`. The
/// combustor feeds the first column, flow runs toward increasing column, the
/// last column is terminal, and the boundary entrains into every cell of the
/// first and last row.
pub fn grid(rows: usize, cols: usize) -> TopologyResult<AdjacencyMatrix> {
    if rows == 0 || cols == 0 {
        return Err(TopologyError::InvalidGrid { rows, cols });
    }

    let size = rows * cols + 2;
    let boundary = size - 1;
    let cell = |r: usize, c: usize| 1 + c * rows + r;
    let mut matrix = AdjacencyMatrix::zeroed(size);

    for r in 0..rows {
        matrix.set(0, cell(r, 0), DEFAULT_CLASS);
        for c in 0..cols - 1 {
            matrix.set(cell(r, c), cell(r, c + 1), DEFAULT_CLASS);
        }
    }

    for c in 0..cols {
        matrix.set(boundary, cell(0, c), DEFAULT_CLASS);
        matrix.set(boundary, cell(rows - 1, c), DEFAULT_CLASS);
    }

    validate::validate_matrix(&matrix)?;
    debug!(rows, cols, edges = matrix.edge_count(), "grid topology");
    Ok(matrix)
}

/// Single-reactor topology: the boundary entrains into the combustor, which
/// drains straight to the exhaust sink.
pub fn simple() -> AdjacencyMatrix {
    let mut matrix = AdjacencyMatrix::zeroed(2);
    matrix.set(1, 0, DEFAULT_CLASS);
    matrix
}
