//! Per-edge mass-flow closures.

use std::num::NonZeroU32;
use std::sync::Arc;

use pn_core::ReactorId;
use pn_engine::{MassFlowRate, ReactorProbe};
use pn_topology::{EdgeKind, FlowEdge};

use crate::error::{NetworkError, NetworkResult};
use crate::schedule::{FlowSchedules, TimeFunction};

/// Everything one edge needs to compute its rate, captured at wiring time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowClosure {
    pub source: ReactorId,
    pub sink_count: NonZeroU32,
    pub kind: EdgeKind,
    pub class: u8,
}

impl FlowClosure {
    pub fn new(edge: &FlowEdge, source: ReactorId) -> Self {
        Self {
            source,
            sink_count: edge.sink_count,
            kind: edge.kind,
            class: edge.class,
        }
    }

    /// Rate in kg/s.
    ///
    /// Mass-derived kinds give `mass(source) / tau(t) / sink_count`;
    /// entrainment gives `function(t)` directly.
    pub fn rate(&self, t: f64, function: &dyn TimeFunction, reactors: &dyn ReactorProbe) -> f64 {
        if self.kind.is_mass_derived() {
            reactors.mass(self.source) / function.value(t) / f64::from(self.sink_count.get())
        } else {
            function.value(t)
        }
    }

    /// Attach the schedule selected by this closure's kind and class.
    pub fn bind(self, schedules: &FlowSchedules) -> NetworkResult<BoundFlow> {
        let function = if self.kind.is_mass_derived() {
            schedules.residence(self.class)
        } else {
            schedules.entrainment(self.class)
        };
        let function = function.ok_or_else(|| NetworkError::Config {
            what: format!("no {:?} schedule for flow class {}", self.kind, self.class),
        })?;
        Ok(BoundFlow {
            closure: self,
            function,
        })
    }
}

/// A closure with its schedule resolved, handed to the engine as a connector law.
#[derive(Debug, Clone)]
pub struct BoundFlow {
    closure: FlowClosure,
    function: Arc<dyn TimeFunction>,
}

impl BoundFlow {
    pub fn closure(&self) -> &FlowClosure {
        &self.closure
    }
}

impl MassFlowRate for BoundFlow {
    fn mdot(&self, t: f64, reactors: &dyn ReactorProbe) -> f64 {
        self.closure.rate(t, self.function.as_ref(), reactors)
    }
}
