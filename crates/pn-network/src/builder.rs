//! Staged construction of a plume network on a reactor engine.
//!
//! Creation order defines the id space:
//! `fuel`, `combustor`, `exhaust_1 .. exhaust_{N-2}`, `atmosphere`, `sink`.
//! Matrix index `i` maps to the reactor created at position `i + 1`.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use pn_core::{ConnectorId, ReactorId};
use pn_engine::{ConnectorLaw, ReactorEngine, ReactorKind};
use pn_mech::{GasPhase, GasResolver, MechanismSpec};
use pn_topology::{AdjacencyMatrix, Endpoint, FlowEdge, FlowPlan};
use tracing::{debug, info};

use crate::error::{NetworkError, NetworkResult};
use crate::flow::FlowClosure;
use crate::schedule::FlowSchedules;

/// Builder state. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStage {
    Unbuilt,
    GasesCreated,
    ReactorsCreated,
    Connected,
    NetworkAssembled,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Unbuilt => "unbuilt",
            BuildStage::GasesCreated => "gases-created",
            BuildStage::ReactorsCreated => "reactors-created",
            BuildStage::Connected => "connected",
            BuildStage::NetworkAssembled => "network-assembled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
struct Gases {
    fuel: GasPhase,
    atmosphere: GasPhase,
    /// One per exhaust slot, already cycled round-robin.
    exhausts: Vec<GasPhase>,
}

/// One connector as wired: plan edge, its closure and the engine's id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WiredEdge {
    pub edge: FlowEdge,
    pub closure: FlowClosure,
    pub connector: ConnectorId,
}

/// Matrix-addressed name of reactor `index`.
pub fn reactor_name(index: usize) -> String {
    if index == 0 {
        "combustor".to_string()
    } else {
        format!("exhaust_{index}")
    }
}

/// Builds a plume network on engine `E`.
///
/// The flow plan is derived and validated in [`NetworkBuilder::new`], so
/// configuration errors surface before any engine object exists.
#[derive(Debug)]
pub struct NetworkBuilder<E> {
    engine: E,
    matrix: AdjacencyMatrix,
    plan: FlowPlan,
    schedules: FlowSchedules,
    stage: BuildStage,
    gases: Option<Gases>,
    names: HashMap<String, ReactorId>,
    /// Ids of matrix-addressed reactors, by matrix index.
    reactors: Vec<ReactorId>,
    wired: Vec<WiredEdge>,
    initial_state: Vec<f64>,
    component_names: Vec<String>,
}

impl<E: ReactorEngine> NetworkBuilder<E> {
    pub fn new(engine: E, matrix: AdjacencyMatrix, schedules: FlowSchedules) -> NetworkResult<Self> {
        let plan = FlowPlan::from_matrix(&matrix, schedules.classes())?;
        for edge in plan.edges() {
            let placeholder = ReactorId::from_index(0);
            FlowClosure::new(edge, placeholder).bind(&schedules)?;
        }
        Ok(Self {
            engine,
            matrix,
            plan,
            schedules,
            stage: BuildStage::Unbuilt,
            gases: None,
            names: HashMap::new(),
            reactors: Vec::new(),
            wired: Vec::new(),
            initial_state: Vec::new(),
            component_names: Vec::new(),
        })
    }

    /// Run every remaining stage.
    pub fn build(&mut self, spec: &MechanismSpec, resolver: &dyn GasResolver) -> NetworkResult<()> {
        self.create_gases(spec, resolver)?;
        self.create_reactors()?;
        self.connect_reactors()?;
        self.assemble()
    }

    /// Resolve fuel, atmosphere and per-slot exhaust gases.
    ///
    /// Each distinct path is resolved once. An empty exhaust list falls back
    /// to the atmosphere mechanism.
    pub fn create_gases(
        &mut self,
        spec: &MechanismSpec,
        resolver: &dyn GasResolver,
    ) -> NetworkResult<()> {
        self.enter(BuildStage::Unbuilt)?;

        let mut cache: HashMap<PathBuf, GasPhase> = HashMap::new();
        let mut resolve = |path: &PathBuf| -> NetworkResult<GasPhase> {
            if let Some(gas) = cache.get(path) {
                return Ok(gas.clone());
            }
            let gas = resolver.resolve(path)?;
            cache.insert(path.clone(), gas.clone());
            Ok(gas)
        };

        let fuel = resolve(&spec.fuel)?;
        let atmosphere = resolve(&spec.atmosphere)?;
        let slots = self.matrix.reactor_count().saturating_sub(1);
        let exhausts = if spec.exhausts.is_empty() {
            vec![atmosphere.clone(); slots]
        } else {
            (0..slots)
                .map(|i| resolve(&spec.exhausts[i % spec.exhausts.len()]))
                .collect::<NetworkResult<Vec<_>>>()?
        };

        self.gases = Some(Gases {
            fuel,
            atmosphere,
            exhausts,
        });
        self.advance_stage(BuildStage::GasesCreated);
        Ok(())
    }

    /// Create reservoirs and reactors in their fixed order.
    pub fn create_reactors(&mut self) -> NetworkResult<()> {
        self.enter(BuildStage::GasesCreated)?;
        let gases = self.gases.clone().ok_or(NetworkError::Stage {
            expected: BuildStage::GasesCreated,
            found: self.stage,
        })?;

        let energy = ReactorKind::ConstPressure { energy: true };
        self.add("fuel", &gases.fuel, ReactorKind::Reservoir)?;
        let combustor = self.add(&reactor_name(0), &gases.fuel, energy)?;
        self.reactors.push(combustor);
        for (slot, gas) in gases.exhausts.iter().enumerate() {
            let id = self.add(&reactor_name(slot + 1), gas, energy)?;
            self.reactors.push(id);
        }
        self.add("atmosphere", &gases.atmosphere, ReactorKind::Reservoir)?;
        self.add("sink", &gases.atmosphere, ReactorKind::Reservoir)?;

        self.advance_stage(BuildStage::ReactorsCreated);
        Ok(())
    }

    /// Wire one connector per plan edge, in plan order.
    pub fn connect_reactors(&mut self) -> NetworkResult<()> {
        self.enter(BuildStage::ReactorsCreated)?;

        let edges = self.plan.edges().to_vec();
        for edge in edges {
            let from = self.endpoint(edge.from)?;
            let to = self.endpoint(edge.to)?;
            let closure = FlowClosure::new(&edge, from);
            let law = ConnectorLaw::Rate(Arc::new(closure.bind(&self.schedules)?));
            let connector = self.engine.add_connector(from, to, law)?;
            debug!(
                from = ?edge.from,
                to = ?edge.to,
                kind = ?edge.kind,
                class = edge.class,
                sinks = edge.sink_count.get(),
                "connector wired"
            );
            self.wired.push(WiredEdge {
                edge,
                closure,
                connector,
            });
        }

        self.advance_stage(BuildStage::Connected);
        Ok(())
    }

    /// Hand the matrix-addressed reactors to the engine and capture the initial sample.
    pub fn assemble(&mut self) -> NetworkResult<()> {
        self.enter(BuildStage::Connected)?;
        self.engine.assemble(&self.reactors)?;
        self.engine.set_initial_time(0.0)?;
        self.engine.reinitialize()?;
        self.initial_state = self.engine.state()?;
        self.component_names = self.engine.component_names()?;
        if self.initial_state.len() != self.component_names.len() {
            return Err(NetworkError::Config {
                what: format!(
                    "engine reports {} state slots but {} component names",
                    self.initial_state.len(),
                    self.component_names.len()
                ),
            });
        }
        self.advance_stage(BuildStage::NetworkAssembled);
        info!(
            reactors = self.reactors.len(),
            connectors = self.wired.len(),
            slots = self.initial_state.len(),
            "network assembled"
        );
        Ok(())
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn is_assembled(&self) -> bool {
        self.stage == BuildStage::NetworkAssembled
    }

    pub fn matrix(&self) -> &AdjacencyMatrix {
        &self.matrix
    }

    pub fn plan(&self) -> &FlowPlan {
        &self.plan
    }

    pub fn schedules(&self) -> &FlowSchedules {
        &self.schedules
    }

    pub fn reactor_id(&self, name: &str) -> Option<ReactorId> {
        self.names.get(name).copied()
    }

    /// Id of the reactor at matrix index `index`.
    pub fn matrix_reactor(&self, index: usize) -> Option<ReactorId> {
        self.reactors.get(index).copied()
    }

    pub fn wired(&self) -> &[WiredEdge] {
        &self.wired
    }

    pub fn initial_state(&self) -> &[f64] {
        &self.initial_state
    }

    pub fn component_names(&self) -> &[String] {
        &self.component_names
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    fn enter(&self, expected: BuildStage) -> NetworkResult<()> {
        if self.stage == BuildStage::NetworkAssembled {
            return Err(NetworkError::AlreadyAssembled);
        }
        if self.stage != expected {
            return Err(NetworkError::Stage {
                expected,
                found: self.stage,
            });
        }
        Ok(())
    }

    fn advance_stage(&mut self, next: BuildStage) {
        debug!(from = %self.stage, to = %next, "builder stage");
        self.stage = next;
    }

    fn add(&mut self, name: &str, gas: &GasPhase, kind: ReactorKind) -> NetworkResult<ReactorId> {
        let position = self.names.len();
        let id = self.engine.add_reactor(name, gas, kind)?;
        if id.slot() != position || self.engine.reactor_name(id) != Some(name) {
            return Err(NetworkError::ReactorOrder {
                name: name.to_string(),
            });
        }
        self.names.insert(name.to_string(), id);
        Ok(id)
    }

    fn endpoint(&self, endpoint: Endpoint) -> NetworkResult<ReactorId> {
        let name = match endpoint {
            Endpoint::Fuel => "fuel".to_string(),
            Endpoint::Reactor(index) => reactor_name(index),
            Endpoint::Atmosphere => "atmosphere".to_string(),
            Endpoint::Sink => "sink".to_string(),
        };
        self.reactor_id(&name)
            .ok_or(NetworkError::ReactorOrder { name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_core::units::{k, pa};
    use pn_engine::{EngineResult, ReactorProbe, ReactorSnapshot};
    use pn_mech::{MechanismLibrary, SpeciesDef};
    use pn_topology::{EdgeKind, TopologyError, linear_expansion, simple};

    /// Records calls; every reactor reports 1 kg.
    #[derive(Debug, Default)]
    struct RecordingEngine {
        reactors: Vec<(String, ReactorKind, String)>,
        connectors: Vec<(ReactorId, ReactorId, ConnectorLaw)>,
        members: Vec<ReactorId>,
        t: f64,
        skip_id: bool,
    }

    impl ReactorProbe for RecordingEngine {
        fn snapshot(&self, id: ReactorId) -> Option<ReactorSnapshot> {
            self.reactors.get(id.slot()).map(|_| ReactorSnapshot {
                mass: 1.0,
                temperature: 300.0,
                volume: 1.0,
                pressure: 101_325.0,
            })
        }
    }

    impl ReactorEngine for RecordingEngine {
        fn add_reactor(
            &mut self,
            name: &str,
            gas: &GasPhase,
            kind: ReactorKind,
        ) -> EngineResult<ReactorId> {
            if self.skip_id && name == "exhaust_1" {
                self.reactors
                    .push(("ghost".to_string(), kind, gas.name().to_string()));
            }
            self.reactors
                .push((name.to_string(), kind, gas.name().to_string()));
            Ok(ReactorId::from_index(self.reactors.len() as u32 - 1))
        }

        fn add_connector(
            &mut self,
            from: ReactorId,
            to: ReactorId,
            law: ConnectorLaw,
        ) -> EngineResult<ConnectorId> {
            self.connectors.push((from, to, law));
            Ok(ConnectorId::from_index(self.connectors.len() as u32 - 1))
        }

        fn assemble(&mut self, reactors: &[ReactorId]) -> EngineResult<()> {
            self.members = reactors.to_vec();
            Ok(())
        }

        fn set_initial_time(&mut self, t: f64) -> EngineResult<()> {
            self.t = t;
            Ok(())
        }

        fn reinitialize(&mut self) -> EngineResult<()> {
            Ok(())
        }

        fn time(&self) -> f64 {
            self.t
        }

        fn advance(&mut self, t: f64) -> EngineResult<()> {
            self.t = t;
            Ok(())
        }

        fn advance_to_steady_state(&mut self) -> EngineResult<()> {
            Ok(())
        }

        fn state(&self) -> EngineResult<Vec<f64>> {
            Ok(vec![1.0; self.members.len()])
        }

        fn restore(&mut self, _state: &[f64], t: f64) -> EngineResult<()> {
            self.t = t;
            Ok(())
        }

        fn component_names(&self) -> EngineResult<Vec<String>> {
            Ok(self
                .members
                .iter()
                .map(|id| format!("{}:mass", self.reactors[id.slot()].0))
                .collect())
        }

        fn reactor_name(&self, id: ReactorId) -> Option<&str> {
            self.reactors.get(id.slot()).map(|r| r.0.as_str())
        }
    }

    fn gas(name: &str) -> GasPhase {
        GasPhase::new(
            name,
            vec![SpeciesDef::new("N2", 28.014)],
            vec![1.0],
            k(300.0),
            pa(101_325.0),
        )
        .unwrap()
    }

    fn library() -> MechanismLibrary {
        let mut lib = MechanismLibrary::new();
        lib.insert("fuel.yaml", gas("fuel"));
        lib.insert("air.yaml", gas("air"));
        lib.insert("ex_a.yaml", gas("ex_a"));
        lib.insert("ex_b.yaml", gas("ex_b"));
        lib
    }

    fn spec(exhausts: &[&str]) -> MechanismSpec {
        MechanismSpec {
            fuel: "fuel.yaml".into(),
            atmosphere: "air.yaml".into(),
            exhausts: exhausts.iter().map(PathBuf::from).collect(),
        }
    }

    fn builder(matrix: AdjacencyMatrix) -> NetworkBuilder<RecordingEngine> {
        NetworkBuilder::new(
            RecordingEngine::default(),
            matrix,
            FlowSchedules::constant(0.1, 0.01),
        )
        .unwrap()
    }

    #[test]
    fn reactors_created_in_fixed_order() {
        let mut b = builder(linear_expansion(3).unwrap());
        b.build(&spec(&["ex_a.yaml", "ex_b.yaml"]), &library()).unwrap();

        let created: Vec<_> = b.engine().reactors.iter().map(|r| r.0.as_str()).collect();
        assert_eq!(
            created,
            ["fuel", "combustor", "exhaust_1", "exhaust_2", "atmosphere", "sink"]
        );
        let gases: Vec<_> = b.engine().reactors.iter().map(|r| r.2.as_str()).collect();
        assert_eq!(gases, ["fuel", "fuel", "ex_a", "ex_b", "air", "air"]);
        assert_eq!(b.matrix_reactor(2), b.reactor_id("exhaust_2"));
        assert!(b.engine().reactors[0].1.is_reservoir());
    }

    #[test]
    fn empty_exhausts_fall_back_to_atmosphere() {
        let mut b = builder(simple());
        b.build(&spec(&[]), &library()).unwrap();
        assert_eq!(b.engine().reactors[1].2, "fuel");
        assert_eq!(b.engine().members.len(), 1);
    }

    #[test]
    fn one_connector_per_plan_edge() {
        let mut b = builder(linear_expansion(10).unwrap());
        b.build(&spec(&["ex_a.yaml"]), &library()).unwrap();

        assert_eq!(b.engine().connectors.len(), b.plan().edges().len());
        let interior = b
            .wired()
            .iter()
            .filter(|w| w.edge.kind == EdgeKind::Interior)
            .count();
        assert_eq!(interior, 20);
        let entrainment = b
            .wired()
            .iter()
            .filter(|w| w.edge.kind == EdgeKind::Entrainment)
            .count();
        assert_eq!(entrainment, 7);

        let atmosphere = b.reactor_id("atmosphere").unwrap();
        for w in b.wired().iter().filter(|w| w.edge.kind == EdgeKind::Entrainment) {
            let (from, _, _) = &b.engine().connectors[w.connector.slot()];
            assert_eq!(*from, atmosphere);
        }
    }

    #[test]
    fn fan_out_rates_sum_to_source_outflow() {
        let mut b = builder(linear_expansion(10).unwrap());
        b.build(&spec(&["ex_a.yaml"]), &library()).unwrap();

        let combustor = b.reactor_id("combustor").unwrap();
        let total: f64 = b
            .engine()
            .connectors
            .iter()
            .filter(|(from, _, _)| *from == combustor)
            .map(|(_, _, law)| match law {
                ConnectorLaw::Rate(f) => f.mdot(0.0, b.engine()),
                ConnectorLaw::Follow { .. } => 0.0,
            })
            .sum();
        // 1 kg / 0.1 s
        assert!((total - 10.0).abs() < 1e-12);
    }

    #[test]
    fn stages_must_run_in_order() {
        let mut b = builder(simple());
        assert!(matches!(
            b.connect_reactors(),
            Err(NetworkError::Stage {
                expected: BuildStage::ReactorsCreated,
                found: BuildStage::Unbuilt
            })
        ));
        assert!(b.engine().reactors.is_empty());
    }

    #[test]
    fn rebuilding_is_an_error() {
        let mut b = builder(simple());
        b.build(&spec(&[]), &library()).unwrap();
        assert!(matches!(
            b.build(&spec(&[]), &library()),
            Err(NetworkError::AlreadyAssembled)
        ));
        assert!(matches!(b.assemble(), Err(NetworkError::AlreadyAssembled)));
    }

    #[test]
    fn unknown_class_fails_before_engine_use() {
        let rows = vec![vec![0, 0, 0], vec![0, 0, 0], vec![1, 2, 0]];
        let matrix = AdjacencyMatrix::from_rows(&rows).unwrap();
        let err = NetworkBuilder::new(
            RecordingEngine::default(),
            matrix,
            FlowSchedules::constant(0.1, 0.01),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            NetworkError::Configuration(TopologyError::UnknownFlowClass { class: 2, .. })
        ));
    }

    #[test]
    fn missing_mechanism_is_resource_error() {
        let mut b = builder(simple());
        let mut bad = spec(&[]);
        bad.fuel = "nope.yaml".into();
        assert!(matches!(
            b.build(&bad, &library()),
            Err(NetworkError::Resource(_))
        ));
        assert_eq!(b.stage(), BuildStage::Unbuilt);
    }

    #[test]
    fn out_of_order_ids_are_detected() {
        let mut engine = RecordingEngine::default();
        engine.skip_id = true;
        let mut b = NetworkBuilder::new(
            engine,
            linear_expansion(3).unwrap(),
            FlowSchedules::constant(0.1, 0.01),
        )
        .unwrap();
        b.create_gases(&spec(&[]), &library()).unwrap();
        assert!(matches!(
            b.create_reactors(),
            Err(NetworkError::ReactorOrder { .. })
        ));
    }

    #[test]
    fn assemble_captures_initial_sample() {
        let mut b = builder(linear_expansion(3).unwrap());
        b.build(&spec(&[]), &library()).unwrap();
        assert_eq!(
            b.component_names(),
            ["combustor:mass", "exhaust_1:mass", "exhaust_2:mass"]
        );
        assert_eq!(b.initial_state().len(), 3);
        assert!(b.is_assembled());
    }
}
