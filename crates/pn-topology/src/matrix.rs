//! Square class-tag adjacency matrix.

use std::fmt;

use crate::error::{TopologyError, TopologyResult};
use crate::validate;

/// `N x N` matrix over reactor indices `0..N`.
///
/// A nonzero cell `(i, j)` holds the flow-function class of the edge
/// `i -> j`; zero means no edge. Index 0 is the combustor and `N - 1` is the
/// boundary row, which only ever acts as a source (entrainment).
///
/// The matrix is immutable once built: generators and [`AdjacencyMatrix::from_rows`]
/// are the only ways to obtain one, and both validate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjacencyMatrix {
    size: usize,
    cells: Vec<u8>,
}

impl AdjacencyMatrix {
    /// Build a matrix from explicit rows.
    ///
    /// Fails if the rows are ragged, if there is no room for a combustor and a
    /// boundary row, or if the diagonal is not zero.
    pub fn from_rows(rows: &[Vec<u8>]) -> TopologyResult<Self> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (row, values) in rows.iter().enumerate() {
            if values.len() != size {
                return Err(TopologyError::NotSquare {
                    row,
                    len: values.len(),
                    expected: size,
                });
            }
            cells.extend_from_slice(values);
        }
        let matrix = Self { size, cells };
        validate::validate_matrix(&matrix)?;
        Ok(matrix)
    }

    /// Zeroed matrix used by the generators while they fill cells.
    pub(crate) fn zeroed(size: usize) -> Self {
        Self {
            size,
            cells: vec![0; size * size],
        }
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, class: u8) {
        self.cells[row * self.size + col] = class;
    }

    /// Number of rows (and columns).
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Index of the boundary (atmosphere) row.
    pub fn boundary(&self) -> usize {
        self.size.saturating_sub(1)
    }

    /// Number of matrix-addressed reactors: the combustor plus every exhaust cell.
    pub fn reactor_count(&self) -> usize {
        self.boundary()
    }

    /// Class tag at `(row, col)`, 0 when there is no edge or the cell is out of range.
    pub fn get(&self, row: usize, col: usize) -> u8 {
        if row >= self.size || col >= self.size {
            return 0;
        }
        self.cells[row * self.size + col]
    }

    /// One row of class tags.
    pub fn row(&self, row: usize) -> &[u8] {
        if row >= self.size {
            return &[];
        }
        &self.cells[row * self.size..(row + 1) * self.size]
    }

    /// Count of nonzero cells in a row.
    pub fn out_degree(&self, row: usize) -> usize {
        self.row(row).iter().filter(|&&c| c > 0).count()
    }

    /// Count of nonzero cells in a column, excluding the boundary row.
    pub fn interior_in_degree(&self, col: usize) -> usize {
        (0..self.boundary()).filter(|&r| self.get(r, col) > 0).count()
    }

    /// All nonzero cells as `(row, col, class)` in row-major order.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(move |(idx, c)| (idx / self.size, idx % self.size, *c))
    }

    /// Total number of nonzero cells.
    pub fn edge_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c > 0).count()
    }
}

impl fmt::Display for AdjacencyMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.size {
            let line: Vec<String> = self.row(row).iter().map(|c| c.to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
