//! Connector laws.

use std::fmt;
use std::sync::Arc;

use pn_core::ConnectorId;

use crate::probe::ReactorProbe;

/// Time-dependent mass-flow rate through one connector, kg/s.
///
/// `reactors` reflects the state at the sub-step being evaluated, not
/// necessarily the last accepted step.
pub trait MassFlowRate: Send + Sync + fmt::Debug {
    fn mdot(&self, t: f64, reactors: &dyn ReactorProbe) -> f64;
}

/// How a connector's rate is determined.
#[derive(Debug, Clone)]
pub enum ConnectorLaw {
    /// Explicit rate function.
    Rate(Arc<dyn MassFlowRate>),
    /// Master connector's rate plus `pressure_coeff * (p_upstream - p_downstream)`.
    Follow {
        master: ConnectorId,
        pressure_coeff: f64,
    },
}

impl ConnectorLaw {
    pub fn rate(rate: impl MassFlowRate + 'static) -> Self {
        ConnectorLaw::Rate(Arc::new(rate))
    }
}
