use std::path::Path;

use pn_mixer::MixingEngine;
use pn_network::{PlumeModel, RunConfig};
use pn_topology::linear_expansion;

#[test]
fn demo_config_builds_a_network() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos");
    let config = RunConfig::load(&root.join("run.yaml"))
        .unwrap_or_else(|e| panic!("Failed to load run.yaml: {}", e));
    assert_eq!(config.store.as_ref().unwrap().chunk, 100);

    let mut model = PlumeModel::new(
        MixingEngine::new(config.engine.clone()),
        linear_expansion(10).unwrap(),
        config.schedules().unwrap(),
    )
    .unwrap();
    model
        .build_network(&config.mechanisms, &config.resolver(&root))
        .unwrap_or_else(|e| panic!("Failed to build demo network: {}", e));

    let names = model.builder().component_names();
    assert_eq!(names[0], "combustor:mass");
    // combustor on the 5-species fuel gas, 9 exhaust cells on 2-species air
    assert_eq!(names.len(), (2 + 5) + 9 * (2 + 2));
}
