use crate::{PnError, PnResult};

/// Absolute and relative tolerance pair for float comparison.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tolerances {
    pub abs: f64,
    pub rel: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

/// `|a - b|` within `tol.abs`, or within `tol.rel` of the larger magnitude.
pub fn nearly_equal(a: f64, b: f64, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    diff <= tol.abs || diff <= tol.rel * a.abs().max(b.abs())
}

pub fn ensure_finite(value: f64, what: &'static str) -> PnResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PnError::NonFinite { what, value })
    }
}

/// Exact inverse of the triangular number `k(k+1)/2`, if `n` is one.
pub fn triangular_root(n: usize) -> Option<usize> {
    let guess = ((-1.0 + (1.0 + 8.0 * n as f64).sqrt()) / 2.0).round() as usize;
    // float guess can be off by one for large n; settle it in integers
    (guess.saturating_sub(1)..=guess + 1).find(|k| k * (k + 1) / 2 == n)
}
