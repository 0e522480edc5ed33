//! Well-stirred mixing network implementing [`ReactorEngine`].

use std::collections::HashSet;

use pn_core::{ConnectorId, ReactorId, ensure_finite};
use pn_engine::{
    ConnectorLaw, EngineError, EngineResult, ReactorEngine, ReactorKind, ReactorProbe,
    ReactorSnapshot,
};
use pn_mech::GasPhase;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::integrator::{Derivative, IntegratorType};
use crate::reactor::{MASS, MixingReactor, SPECIES, TEMPERATURE};

/// Mass below which a reactor is treated as empty for intensive balances, kg.
const MIN_MASS: f64 = 1e-12;

/// Engine tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Largest internal step, s.
    pub max_dt: f64,
    pub integrator: IntegratorType,
    /// Steady state holds when every normalized derivative is below this, 1/s.
    pub steady_tol: f64,
    /// Step limit for steady-state marching.
    pub steady_max_steps: usize,
    /// Volume each reactor and reservoir is filled to at creation, m^3.
    pub reactor_volume: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_dt: 1e-3,
            integrator: IntegratorType::default(),
            steady_tol: 1e-6,
            steady_max_steps: 200_000,
            reactor_volume: 1.0,
        }
    }
}

#[derive(Debug)]
struct Connector {
    from: ReactorId,
    to: ReactorId,
    law: ConnectorLaw,
    /// For each species slot of `to`, the slot in `from`.
    species_map: Vec<Option<usize>>,
}

/// Reactors, connectors and the state layout of the integrated set.
#[derive(Debug, Default)]
struct Network {
    reactors: Vec<MixingReactor>,
    connectors: Vec<Connector>,
    members: Vec<ReactorId>,
    /// State offset per reactor, `None` for reactors outside the integrated set.
    offsets: Vec<Option<usize>>,
    len: usize,
}

impl Network {
    fn block<'a>(&'a self, id: ReactorId, x: &'a [f64]) -> Option<&'a [f64]> {
        let reactor = self.reactors.get(id.slot())?;
        match self.offsets.get(id.slot()).copied().flatten() {
            Some(offset) => x.get(offset..offset + reactor.state_len()),
            None => Some(&reactor.current),
        }
    }

    fn offset(&self, id: ReactorId) -> Option<usize> {
        self.offsets.get(id.slot()).copied().flatten()
    }

    fn connector_rates(&self, t: f64, x: &[f64]) -> EngineResult<Vec<f64>> {
        let view = StateView { net: self, x };
        let mut rates = Vec::with_capacity(self.connectors.len());
        for connector in &self.connectors {
            let rate = match &connector.law {
                ConnectorLaw::Rate(f) => f.mdot(t, &view),
                ConnectorLaw::Follow {
                    master,
                    pressure_coeff,
                } => {
                    let base = rates.get(master.slot()).copied().unwrap_or(0.0);
                    let p_up = view.snapshot(connector.from).map_or(0.0, |s| s.pressure);
                    let p_down = view.snapshot(connector.to).map_or(0.0, |s| s.pressure);
                    // a reversed pressure drop closes the valve
                    (base + pressure_coeff * (p_up - p_down)).max(0.0)
                }
            };
            if !rate.is_finite() || rate < 0.0 {
                return Err(EngineError::NonPhysical {
                    what: format!(
                        "mass flow {rate} on {} -> {} at t={t}",
                        connector.from, connector.to
                    ),
                });
            }
            rates.push(rate);
        }
        Ok(rates)
    }
}

impl Derivative for Network {
    fn derivative(&mut self, t: f64, x: &[f64], dx: &mut [f64]) -> EngineResult<()> {
        let rates = self.connector_rates(t, x)?;

        for (connector, &rate) in self.connectors.iter().zip(&rates) {
            if rate == 0.0 {
                continue;
            }
            if let Some(o) = self.offset(connector.from) {
                dx[o + MASS] -= rate;
            }
            let Some(o) = self.offset(connector.to) else {
                continue;
            };
            dx[o + MASS] += rate;

            let mass = x[o + MASS];
            if mass <= MIN_MASS {
                continue;
            }
            let Some(upstream) = self.block(connector.from, x) else {
                continue;
            };

            let inflow_sum: f64 = connector
                .species_map
                .iter()
                .map(|src| src.map_or(0.0, |s| upstream[SPECIES + s]))
                .sum();
            if inflow_sum > 0.0 {
                for (slot, src) in connector.species_map.iter().enumerate() {
                    let y_in = src.map_or(0.0, |s| upstream[SPECIES + s]) / inflow_sum;
                    dx[o + SPECIES + slot] += rate * (y_in - x[o + SPECIES + slot]) / mass;
                }
            }

            let receiver = &self.reactors[connector.to.slot()];
            if receiver.energy_enabled() {
                let cp_in = self.reactors[connector.from.slot()].gas.cp();
                let cp = receiver.gas.cp();
                dx[o + TEMPERATURE] +=
                    rate * (cp_in * upstream[TEMPERATURE] - cp * x[o + TEMPERATURE]) / (mass * cp);
            }
        }

        Ok(())
    }
}

/// Probe over a trial state.
struct StateView<'a> {
    net: &'a Network,
    x: &'a [f64],
}

impl ReactorProbe for StateView<'_> {
    fn snapshot(&self, id: ReactorId) -> Option<ReactorSnapshot> {
        let reactor = self.net.reactors.get(id.slot())?;
        let block = self.net.block(id, self.x)?;
        Some(reactor.snapshot(block))
    }
}

/// Non-reacting well-stirred reactor network.
#[derive(Debug, Default)]
pub struct MixingEngine {
    options: EngineOptions,
    network: Network,
    x: Vec<f64>,
    t: f64,
    assembled: bool,
}

impl MixingEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Number of connectors created so far.
    pub fn connector_count(&self) -> usize {
        self.network.connectors.len()
    }

    /// Current connector rates, kg/s, in connector order.
    pub fn connector_rates(&self) -> EngineResult<Vec<f64>> {
        self.network.connector_rates(self.t, &self.x)
    }

    fn reactor(&self, id: ReactorId) -> EngineResult<&MixingReactor> {
        self.network
            .reactors
            .get(id.slot())
            .ok_or(EngineError::UnknownReactor { id: id.index() })
    }

    fn step(&mut self, dt: f64) -> EngineResult<()> {
        let mut next = self.x.clone();
        self.options
            .integrator
            .step(&mut self.network, self.t, &mut next, dt)?;
        if let Some(bad) = next.iter().position(|v| !v.is_finite()) {
            return Err(EngineError::NonPhysical {
                what: format!("non-finite state in slot {bad} at t={}", self.t + dt),
            });
        }
        self.x = next;
        self.t += dt;
        Ok(())
    }

    /// Copy the integrated state back into each reactor's block.
    fn scatter(&mut self) {
        for id in &self.network.members {
            if let Some(offset) = self.network.offset(*id) {
                let reactor = &mut self.network.reactors[id.slot()];
                let len = reactor.state_len();
                reactor
                    .current
                    .copy_from_slice(&self.x[offset..offset + len]);
            }
        }
    }

    fn steady_residual(&mut self) -> EngineResult<f64> {
        let mut dx = vec![0.0; self.x.len()];
        self.network.derivative(self.t, &self.x, &mut dx)?;
        Ok(dx
            .iter()
            .zip(&self.x)
            .map(|(d, v)| d.abs() / v.abs().max(1.0))
            .fold(0.0, f64::max))
    }

    fn ensure_assembled(&self) -> EngineResult<()> {
        if self.assembled {
            Ok(())
        } else {
            Err(EngineError::NotAssembled)
        }
    }
}

impl ReactorProbe for MixingEngine {
    fn snapshot(&self, id: ReactorId) -> Option<ReactorSnapshot> {
        StateView {
            net: &self.network,
            x: &self.x,
        }
        .snapshot(id)
    }
}

impl ReactorEngine for MixingEngine {
    fn add_reactor(
        &mut self,
        name: &str,
        gas: &GasPhase,
        kind: ReactorKind,
    ) -> EngineResult<ReactorId> {
        let id = ReactorId::from_index(self.network.reactors.len() as u32);
        let reactor = MixingReactor::new(name, gas, kind, self.options.reactor_volume)?;
        self.network.reactors.push(reactor);
        self.network.offsets.push(None);
        Ok(id)
    }

    fn add_connector(
        &mut self,
        from: ReactorId,
        to: ReactorId,
        law: ConnectorLaw,
    ) -> EngineResult<ConnectorId> {
        let upstream = self.reactor(from)?;
        let downstream = self.reactor(to)?;
        if let ConnectorLaw::Follow { master, .. } = &law
            && master.slot() >= self.network.connectors.len()
        {
            return Err(EngineError::UnknownConnector {
                id: master.index(),
            });
        }
        let species_map = downstream.species_map(upstream);
        let id = ConnectorId::from_index(self.network.connectors.len() as u32);
        self.network.connectors.push(Connector {
            from,
            to,
            law,
            species_map,
        });
        Ok(id)
    }

    fn assemble(&mut self, reactors: &[ReactorId]) -> EngineResult<()> {
        let mut seen = HashSet::new();
        for &id in reactors {
            let reactor = self.reactor(id)?;
            if reactor.kind.is_reservoir() {
                return Err(EngineError::InvalidArg {
                    what: "reservoirs are boundaries, not network members",
                });
            }
            if !seen.insert(id) {
                return Err(EngineError::InvalidArg {
                    what: "reactor listed twice in network",
                });
            }
        }
        self.network.members = reactors.to_vec();
        self.assembled = true;
        self.reinitialize()
    }

    fn set_initial_time(&mut self, t: f64) -> EngineResult<()> {
        if !t.is_finite() {
            return Err(EngineError::InvalidArg {
                what: "initial time must be finite",
            });
        }
        self.t = t;
        Ok(())
    }

    fn reinitialize(&mut self) -> EngineResult<()> {
        self.ensure_assembled()?;
        let net = &mut self.network;
        net.offsets.iter_mut().for_each(|o| *o = None);

        let mut x = Vec::new();
        for id in &net.members {
            net.offsets[id.slot()] = Some(x.len());
            x.extend_from_slice(&net.reactors[id.slot()].current);
        }

        for connector in &net.connectors {
            for end in [connector.from, connector.to] {
                let reactor = &net.reactors[end.slot()];
                if !reactor.kind.is_reservoir() && net.offsets[end.slot()].is_none() {
                    return Err(EngineError::InvalidArg {
                        what: "connected reactor missing from network",
                    });
                }
            }
        }

        net.len = x.len();
        self.x = x;
        debug!(
            reactors = net.members.len(),
            connectors = net.connectors.len(),
            slots = net.len,
            "mixing network initialized"
        );
        Ok(())
    }

    fn time(&self) -> f64 {
        self.t
    }

    fn advance(&mut self, t: f64) -> EngineResult<()> {
        self.ensure_assembled()?;
        let span = t - self.t;
        if span < -1e-12 * t.abs().max(1.0) || !t.is_finite() {
            return Err(EngineError::NonMonotonicTime {
                now: self.t,
                requested: t,
            });
        }
        if span <= 0.0 {
            return Ok(());
        }
        if self.options.max_dt <= 0.0 {
            return Err(EngineError::InvalidArg {
                what: "max_dt must be positive",
            });
        }

        let steps = (span / self.options.max_dt).ceil().max(1.0) as usize;
        let dt = span / steps as f64;
        for _ in 0..steps {
            self.step(dt)?;
        }
        self.t = t;
        self.scatter();
        Ok(())
    }

    fn advance_to_steady_state(&mut self) -> EngineResult<()> {
        self.ensure_assembled()?;
        if self.options.max_dt <= 0.0 {
            return Err(EngineError::InvalidArg {
                what: "max_dt must be positive",
            });
        }

        let start = self.t;
        for step in 0..self.options.steady_max_steps {
            self.step(self.options.max_dt)?;
            let residual = self.steady_residual()?;
            if residual < self.options.steady_tol {
                self.scatter();
                info!(
                    steps = step + 1,
                    elapsed = self.t - start,
                    residual,
                    "steady state reached"
                );
                return Ok(());
            }
        }

        self.scatter();
        Err(EngineError::ConvergenceFailed {
            what: format!(
                "no steady state after {} steps (t={})",
                self.options.steady_max_steps, self.t
            ),
        })
    }

    fn state(&self) -> EngineResult<Vec<f64>> {
        self.ensure_assembled()?;
        Ok(self.x.clone())
    }

    fn restore(&mut self, state: &[f64], t: f64) -> EngineResult<()> {
        self.ensure_assembled()?;
        if state.len() != self.x.len() {
            return Err(EngineError::InvalidArg {
                what: "restored state does not match network layout",
            });
        }
        let t = ensure_finite(t, "restored time")?;
        for &v in state {
            ensure_finite(v, "restored state")?;
        }
        self.x = state.to_vec();
        self.t = t;
        self.scatter();
        Ok(())
    }

    fn component_names(&self) -> EngineResult<Vec<String>> {
        self.ensure_assembled()?;
        Ok(self
            .network
            .members
            .iter()
            .flat_map(|id| self.network.reactors[id.slot()].component_names())
            .collect())
    }

    fn reactor_name(&self, id: ReactorId) -> Option<&str> {
        self.network
            .reactors
            .get(id.slot())
            .map(|r| r.name.as_str())
    }
}
