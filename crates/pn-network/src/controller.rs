//! Time stepping with sample forwarding.

use pn_engine::ReactorEngine;
use pn_store::TimeSeriesStore;
use tracing::debug;

use crate::error::NetworkResult;

/// Drives an assembled engine and records every sample it produces.
///
/// Engine errors are returned unchanged; nothing is written for a failed step.
pub struct StepController<'a, E> {
    engine: &'a mut E,
    store: Option<&'a mut TimeSeriesStore>,
}

impl<'a, E: ReactorEngine> StepController<'a, E> {
    pub fn new(engine: &'a mut E, store: Option<&'a mut TimeSeriesStore>) -> Self {
        Self { engine, store }
    }

    /// Integrate to absolute time `t`, record and return the new state.
    pub fn advance(&mut self, t: f64) -> NetworkResult<Vec<f64>> {
        self.engine.advance(t)?;
        self.capture()
    }

    /// Integrate until the engine reports steady state, record and return it.
    pub fn advance_to_steady_state(&mut self) -> NetworkResult<Vec<f64>> {
        self.engine.advance_to_steady_state()?;
        self.capture()
    }

    fn capture(&mut self) -> NetworkResult<Vec<f64>> {
        let state = self.engine.state()?;
        let t = self.engine.time();
        if let Some(store) = self.store.as_deref_mut() {
            store.append(&state, t)?;
        }
        debug!(t, slots = state.len(), "sample captured");
        Ok(state)
    }
}
