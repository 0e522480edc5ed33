use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use pn_core::units::{k, pa};
use pn_engine::{EngineError, ReactorEngine, ReactorProbe};
use pn_mech::{GasPhase, MechanismLibrary, MechanismSpec, SpeciesDef};
use pn_mixer::{EngineOptions, MixingEngine};
use pn_network::{FlowSchedules, NetworkBuilder, NetworkError, PlumeModel};
use pn_store::{StoreError, TimeSeriesStore};
use pn_topology::{AdjacencyMatrix, EdgeKind, Endpoint, grid, linear_expansion, simple};
use proptest::prelude::*;

const TAU: f64 = 0.1;
const ENTRAINMENT: f64 = 0.01;

fn unique_temp_file(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    std::env::temp_dir().join(format!("{}_{}.pnstore", prefix, nanos))
}

fn fuel_gas() -> GasPhase {
    GasPhase::new(
        "combustion-products",
        vec![
            SpeciesDef::new("CH4", 16.043),
            SpeciesDef::new("O2", 31.998),
            SpeciesDef::new("N2", 28.014),
            SpeciesDef::new("CO2", 44.009),
            SpeciesDef::new("H2O", 18.015),
        ],
        vec![0.01, 0.05, 0.71, 0.13, 0.10],
        k(1500.0),
        pa(101_325.0),
    )
    .unwrap()
}

fn air_gas() -> GasPhase {
    GasPhase::new(
        "air",
        vec![SpeciesDef::new("N2", 28.014), SpeciesDef::new("O2", 31.998)],
        vec![0.767, 0.233],
        k(300.0),
        pa(101_325.0),
    )
    .unwrap()
}

fn library() -> MechanismLibrary {
    let mut lib = MechanismLibrary::new();
    lib.insert("fuel.yaml", fuel_gas());
    lib.insert("air.yaml", air_gas());
    lib
}

fn mechanisms() -> MechanismSpec {
    MechanismSpec {
        fuel: "fuel.yaml".into(),
        atmosphere: "air.yaml".into(),
        exhausts: vec![],
    }
}

fn engine() -> MixingEngine {
    MixingEngine::new(EngineOptions {
        max_dt: 1e-3,
        ..EngineOptions::default()
    })
}

fn model(matrix: AdjacencyMatrix) -> PlumeModel<MixingEngine> {
    let mut model =
        PlumeModel::new(engine(), matrix, FlowSchedules::constant(TAU, ENTRAINMENT)).unwrap();
    model.build_network(&mechanisms(), &library()).unwrap();
    model
}

#[test]
fn simple_network_reaches_mass_balance() {
    let mut model = model(simple());
    let fuel = model.builder().reactor_id("fuel").unwrap();
    let combustor = model.builder().reactor_id("combustor").unwrap();
    let fuel_mass = model.engine().mass(fuel);

    model.advance_to_steady_state().unwrap();

    // inflow m_fuel/tau plus entrainment balances outflow m/tau
    let expected = fuel_mass + TAU * ENTRAINMENT;
    let mass = model.engine().mass(combustor);
    assert!((mass - expected).abs() < 1e-5, "{mass} vs {expected}");

    let temperature = model.engine().snapshot(combustor).unwrap().temperature;
    assert!(temperature < 1500.0 && temperature > 300.0);
}

#[test]
fn advance_records_every_sample() {
    let path = unique_temp_file("pn_network_record");
    let mut model = model(linear_expansion(3).unwrap());
    model.attach_store(&path, 4, true).unwrap();

    let mut states = Vec::new();
    for i in 1..=6 {
        states.push(model.advance(i as f64 * 0.01).unwrap());
    }
    assert_eq!(model.store().unwrap().series_len(), 7);

    let (times, masses) = model.retrieve(0, "mass").unwrap();
    assert_eq!(times.len(), 7);
    assert!((times[6] - 0.06).abs() < 1e-12);
    assert_eq!(masses[6], states[5][0]);
    drop(model);

    let store = TimeSeriesStore::reopen(&path).unwrap();
    assert_eq!(store.groups(), ["combustor", "exhaust_1", "exhaust_2"]);
    assert_eq!(store.read_row(6).unwrap(), states[5]);
}

#[test]
fn failed_step_writes_nothing() {
    let path = unique_temp_file("pn_network_backwards");
    let mut model = model(simple());
    model.attach_store(&path, 10, false).unwrap();
    model.advance(0.02).unwrap();

    let err = model.advance(0.01).unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Engine(EngineError::NonMonotonicTime { .. })
    ));
    assert_eq!(model.store().unwrap().series_len(), 1);
}

#[test]
fn resumed_run_continues_from_last_sample() {
    let path = unique_temp_file("pn_network_resume");
    let mut first = model(grid(2, 2).unwrap());
    first.attach_store(&path, 3, true).unwrap();
    first.advance(0.01).unwrap();
    let last = first.advance(0.02).unwrap();
    drop(first);

    let mut second = model(grid(2, 2).unwrap());
    second.resume_store(&path).unwrap();
    assert_eq!(second.time(), 0.02);
    assert_eq!(second.engine().state().unwrap(), last);

    second.advance(0.03).unwrap();
    let store = second.store().unwrap();
    assert_eq!(store.series_len(), 4);
    let times = store.times().unwrap();
    assert!((times[3] - 0.03).abs() < 1e-12);
}

#[test]
fn resume_rejects_other_topology() {
    let path = unique_temp_file("pn_network_mismatch");
    let mut first = model(simple());
    first.attach_store(&path, 3, true).unwrap();
    drop(first);

    let mut other = model(linear_expansion(3).unwrap());
    let err = other.resume_store(&path).unwrap_err();
    assert!(matches!(
        err,
        NetworkError::Storage(StoreError::ShapeMismatch { .. })
    ));
}

#[test]
fn store_requires_assembled_network() {
    let mut model =
        PlumeModel::new(engine(), simple(), FlowSchedules::constant(TAU, ENTRAINMENT)).unwrap();
    let path = unique_temp_file("pn_network_unbuilt");
    assert!(matches!(
        model.attach_store(&path, 3, true),
        Err(NetworkError::Stage { .. })
    ));
    assert!(matches!(model.advance(0.1), Err(NetworkError::Stage { .. })));
}

#[test]
fn linear_ten_wires_expected_connectors() {
    let model = model(linear_expansion(10).unwrap());
    let wired = model.builder().wired();
    let count = |kind| wired.iter().filter(|w| w.edge.kind == kind).count();
    assert_eq!(count(EdgeKind::Inflow), 1);
    assert_eq!(count(EdgeKind::Interior), 20);
    assert_eq!(count(EdgeKind::Terminal), 4);
    assert_eq!(count(EdgeKind::Entrainment), 7);
    assert_eq!(model.engine().connector_count(), wired.len());
}

/// Sum of connector rates leaving each matrix reactor, against `mass / tau`.
fn assert_fan_out_conserves(builder: &NetworkBuilder<MixingEngine>) {
    let rates = builder.engine().connector_rates().unwrap();
    for index in 0..builder.plan().reactor_count() {
        let id = builder.matrix_reactor(index).unwrap();
        let out: f64 = builder
            .wired()
            .iter()
            .filter(|w| w.edge.from == Endpoint::Reactor(index))
            .map(|w| rates[w.connector.slot()])
            .sum();
        let expected = builder.engine().mass(id) / TAU;
        assert!(
            (out - expected).abs() <= 1e-12 * expected.max(1.0),
            "reactor {index}: {out} vs {expected}"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn fan_out_conserves_mass_on_random_networks(
        size in 3usize..8,
        bits in prop::collection::vec(any::<bool>(), 64),
        steps in 0usize..3,
    ) {
        let boundary = size - 1;
        let mut rows = vec![vec![0_u8; size]; size];
        for i in 0..boundary {
            for j in (i + 1)..boundary {
                rows[i][j] = u8::from(bits[i * 8 + j]);
            }
            rows[boundary][i] = u8::from(bits[boundary * 8 + i]);
        }
        let matrix = AdjacencyMatrix::from_rows(&rows).unwrap();

        let mut builder =
            NetworkBuilder::new(engine(), matrix, FlowSchedules::constant(TAU, ENTRAINMENT)).unwrap();
        builder.build(&mechanisms(), &library()).unwrap();
        assert_fan_out_conserves(&builder);

        for step in 1..=steps {
            builder.engine_mut().advance(step as f64 * 0.005).unwrap();
            assert_fan_out_conserves(&builder);
        }
    }
}
