//! Normalized mass fractions aligned with a species list.

use crate::error::{MechError, MechResult};

/// Mass fractions, one per species slot, always summing to 1.
///
/// Unlike a sparse composition, zero entries are kept so slot `i` always
/// lines up with species `i` of the owning gas.
#[derive(Debug, Clone, PartialEq)]
pub struct MassFractions {
    values: Vec<f64>,
}

impl MassFractions {
    /// Validate and normalize raw fractions.
    ///
    /// Fractions must be finite, non-negative, and have a positive sum.
    pub fn new(raw: Vec<f64>) -> MechResult<Self> {
        if raw.is_empty() {
            return Err(MechError::NonPhysical {
                what: "empty composition",
            });
        }

        let mut sum = 0.0;
        for frac in &raw {
            if !frac.is_finite() {
                return Err(MechError::NonPhysical {
                    what: "non-finite mass fraction",
                });
            }
            if *frac < 0.0 {
                return Err(MechError::NonPhysical {
                    what: "negative mass fraction",
                });
            }
            sum += frac;
        }

        if sum <= 0.0 || !sum.is_finite() {
            return Err(MechError::NonPhysical {
                what: "mass fractions sum to zero or non-finite",
            });
        }

        Ok(Self {
            values: raw.into_iter().map(|f| f / sum).collect(),
        })
    }

    /// Uniform composition over `n` slots.
    pub fn uniform(n: usize) -> MechResult<Self> {
        Self::new(vec![1.0; n])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, slot: usize) -> f64 {
        self.values.get(slot).copied().unwrap_or(0.0)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use pn_core::numeric::{Tolerances, nearly_equal};
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn normalized_sum_is_one(fracs in prop::collection::vec(0.0_f64..1.0_f64, 1..8)) {
            if let Ok(y) = MassFractions::new(fracs) {
                let sum: f64 = y.as_slice().iter().sum();
                let tol = Tolerances { abs: 1e-9, rel: 1e-9 };
                prop_assert!(nearly_equal(sum, 1.0, tol));
            }
        }
    }
}
