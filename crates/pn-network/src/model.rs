//! `PlumeModel`: the network, its engine and its store behind one handle.

use std::path::Path;

use pn_engine::ReactorEngine;
use pn_mech::{GasResolver, MechanismSpec};
use pn_store::{StoreError, TimeSeriesStore};
use pn_topology::AdjacencyMatrix;
use tracing::info;

use crate::builder::{BuildStage, NetworkBuilder};
use crate::controller::StepController;
use crate::error::{NetworkError, NetworkResult};
use crate::schedule::FlowSchedules;

/// Owns one plume network for its whole life.
#[derive(Debug)]
pub struct PlumeModel<E> {
    builder: NetworkBuilder<E>,
    store: Option<TimeSeriesStore>,
}

impl<E: ReactorEngine> PlumeModel<E> {
    /// Validate the topology against the schedules. No engine object is created yet.
    pub fn new(engine: E, matrix: AdjacencyMatrix, schedules: FlowSchedules) -> NetworkResult<Self> {
        Ok(Self {
            builder: NetworkBuilder::new(engine, matrix, schedules)?,
            store: None,
        })
    }

    pub fn build_network(
        &mut self,
        spec: &MechanismSpec,
        resolver: &dyn GasResolver,
    ) -> NetworkResult<()> {
        self.builder.build(spec, resolver)
    }

    /// Create a fresh store keyed by the network's component names.
    pub fn attach_store(&mut self, path: &Path, chunk: usize, record_initial: bool) -> NetworkResult<()> {
        self.require_assembled()?;
        let names = self.builder.component_names();
        let mut store = TimeSeriesStore::create(path, names, names.len(), chunk)?;
        if record_initial {
            let state = self.builder.engine().state()?;
            store.append(&state, self.builder.engine().time())?;
        }
        self.store = Some(store);
        Ok(())
    }

    /// Reopen an existing store and continue from its last sample.
    ///
    /// The stored keys must equal the network's component names.
    pub fn resume_store(&mut self, path: &Path) -> NetworkResult<()> {
        self.require_assembled()?;
        let store = TimeSeriesStore::reopen(path)?;
        let names = self.builder.component_names();
        if store.keys().len() != names.len() {
            return Err(StoreError::ShapeMismatch {
                expected: names.len(),
                found: store.keys().len(),
            }
            .into());
        }
        if let Some((stored, _)) = store.keys().iter().zip(names).find(|(a, b)| a != b) {
            return Err(StoreError::InvalidKey {
                key: stored.clone(),
                what: "stored key differs from the network's component",
            }
            .into());
        }

        if let Some(last) = store.series_len().checked_sub(1) {
            let state = store.read_row(last)?;
            let t = store.last_time()?.unwrap_or(0.0);
            self.builder.engine_mut().restore(&state, t)?;
            info!(path = %path.display(), samples = store.series_len(), t, "run resumed");
        }
        self.store = Some(store);
        Ok(())
    }

    /// Hand the store to the caller; later steps are no longer recorded.
    pub fn detach_store(&mut self) -> Option<TimeSeriesStore> {
        self.store.take()
    }

    pub fn controller(&mut self) -> StepController<'_, E> {
        StepController::new(self.builder.engine_mut(), self.store.as_mut())
    }

    pub fn advance(&mut self, t: f64) -> NetworkResult<Vec<f64>> {
        self.require_assembled()?;
        self.controller().advance(t)
    }

    pub fn advance_to_steady_state(&mut self) -> NetworkResult<Vec<f64>> {
        self.require_assembled()?;
        self.controller().advance_to_steady_state()
    }

    /// Stored series of `element` in group `group_index`.
    pub fn retrieve(&self, group_index: usize, element: &str) -> NetworkResult<(Vec<f64>, Vec<f64>)> {
        let store = self.store.as_ref().ok_or(NetworkError::Config {
            what: "no store attached".to_string(),
        })?;
        Ok(store.retrieve(group_index, element)?)
    }

    pub fn builder(&self) -> &NetworkBuilder<E> {
        &self.builder
    }

    pub fn engine(&self) -> &E {
        self.builder.engine()
    }

    pub fn store(&self) -> Option<&TimeSeriesStore> {
        self.store.as_ref()
    }

    pub fn time(&self) -> f64 {
        self.builder.engine().time()
    }

    fn require_assembled(&self) -> NetworkResult<()> {
        if self.builder.is_assembled() {
            Ok(())
        } else {
            Err(NetworkError::Stage {
                expected: BuildStage::NetworkAssembled,
                found: self.builder.stage(),
            })
        }
    }
}
