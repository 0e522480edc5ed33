//! Fixed-step explicit integration over flat state vectors.

use pn_engine::EngineResult;
use serde::{Deserialize, Serialize};

/// Right-hand side of `dx/dt = f(t, x)`.
pub trait Derivative {
    /// Write `f(t, x)` into `dx`; `dx` has the length of `x` and arrives zeroed.
    ///
    /// Takes `&mut self` so implementations can keep scratch buffers.
    fn derivative(&mut self, t: f64, x: &[f64], dx: &mut [f64]) -> EngineResult<()>;
}

/// Explicit scheme used for every internal step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegratorType {
    /// Classical 4th-order Runge-Kutta, four evaluations per step.
    #[default]
    #[serde(rename = "rk4")]
    RK4,
    /// One evaluation per step.
    #[serde(rename = "forward_euler")]
    ForwardEuler,
}

impl IntegratorType {
    /// Derivative evaluations taken by one step.
    pub fn stages(self) -> usize {
        match self {
            IntegratorType::RK4 => 4,
            IntegratorType::ForwardEuler => 1,
        }
    }

    /// Advance `x` from `t` to `t + dt` in place. `x` is untouched on error.
    pub fn step<D: Derivative + ?Sized>(
        self,
        model: &mut D,
        t: f64,
        x: &mut [f64],
        dt: f64,
    ) -> EngineResult<()> {
        let n = x.len();
        match self {
            IntegratorType::ForwardEuler => {
                let mut k = vec![0.0; n];
                model.derivative(t, x, &mut k)?;
                for (xi, ki) in x.iter_mut().zip(&k) {
                    *xi += dt * ki;
                }
            }
            IntegratorType::RK4 => {
                let mut k = [vec![0.0; n], vec![0.0; n], vec![0.0; n], vec![0.0; n]];
                let mut trial = vec![0.0; n];
                let offsets = [0.0, 0.5 * dt, 0.5 * dt, dt];

                model.derivative(t, x, &mut k[0])?;
                for stage in 1..4 {
                    let (done, rest) = k.split_at_mut(stage);
                    let prev = &done[stage - 1];
                    for ((y, xi), ki) in trial.iter_mut().zip(x.iter()).zip(prev) {
                        *y = xi + offsets[stage] * ki;
                    }
                    model.derivative(t + offsets[stage], &trial, &mut rest[0])?;
                }

                let [k1, k2, k3, k4] = &k;
                for (i, xi) in x.iter_mut().enumerate() {
                    *xi += dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
                }
            }
        }
        Ok(())
    }
}
