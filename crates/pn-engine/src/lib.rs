//! pn-engine: the contract between plumenet and a reactor-network engine.
//!
//! The engine owns every reactor and integrates the network; plumenet only
//! needs five capabilities from it:
//! 1. construct reservoirs and reactors from a gas
//! 2. construct directed connectors driven by a rate function or a master connector
//! 3. assemble the network and advance it by time or to steady state
//! 4. report the full state vector and per-slot component names
//! 5. report a reactor's instantaneous mass, temperature and volume

pub mod error;
pub mod flow;
pub mod probe;

pub use error::{EngineError, EngineResult};
pub use flow::{ConnectorLaw, MassFlowRate};
pub use probe::{ReactorProbe, ReactorSnapshot};

use pn_core::{ConnectorId, ReactorId};
use pn_mech::GasPhase;

/// Kind of control volume to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactorKind {
    /// Infinite-capacity boundary whose state never changes.
    Reservoir,
    /// Well-stirred constant-pressure reactor.
    ConstPressure { energy: bool },
}

impl ReactorKind {
    pub fn is_reservoir(self) -> bool {
        matches!(self, ReactorKind::Reservoir)
    }
}

/// A reactor-network engine.
///
/// Implementations evaluate every connector's [`MassFlowRate`] at each of
/// their internal integration sub-steps, against the sub-step's trial state.
pub trait ReactorEngine: ReactorProbe {
    /// Create a reservoir or reactor holding `gas`. Ids are handed out in creation order.
    fn add_reactor(
        &mut self,
        name: &str,
        gas: &GasPhase,
        kind: ReactorKind,
    ) -> EngineResult<ReactorId>;

    /// Create a directed connector `from -> to`.
    fn add_connector(
        &mut self,
        from: ReactorId,
        to: ReactorId,
        law: ConnectorLaw,
    ) -> EngineResult<ConnectorId>;

    /// Collect the given reactors into the integrated network.
    fn assemble(&mut self, reactors: &[ReactorId]) -> EngineResult<()>;

    fn set_initial_time(&mut self, t: f64) -> EngineResult<()>;

    /// Rebuild integrator state after topology or state changes.
    fn reinitialize(&mut self) -> EngineResult<()>;

    /// Current network time.
    fn time(&self) -> f64;

    /// Integrate to absolute time `t`; `t` must not be behind [`ReactorEngine::time`].
    fn advance(&mut self, t: f64) -> EngineResult<()>;

    /// Integrate until the engine's own convergence criteria hold.
    fn advance_to_steady_state(&mut self) -> EngineResult<()>;

    /// Full state vector of the assembled network.
    fn state(&self) -> EngineResult<Vec<f64>>;

    /// Overwrite the state vector and network time, e.g. from a stored sample.
    fn restore(&mut self, state: &[f64], t: f64) -> EngineResult<()>;

    /// Name of every state slot, formatted `<reactor>:<component>`.
    fn component_names(&self) -> EngineResult<Vec<String>>;

    fn reactor_name(&self, id: ReactorId) -> Option<&str>;
}
