//! YAML run configuration.

use std::path::{Path, PathBuf};

use pn_mech::{MechanismSpec, YamlResolver};
use pn_mixer::EngineOptions;
use pn_store::DEFAULT_CHUNK;
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};
use crate::schedule::{FlowSchedules, Schedule};

/// Residence time used when none is configured, s.
pub const DEFAULT_RESIDENCE_TIME: f64 = 0.1;
/// Entrainment rate used when none is configured, kg/s.
pub const DEFAULT_ENTRAINMENT: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub mechanisms: MechanismSpec,
    #[serde(default)]
    pub flows: FlowConfig,
    #[serde(default)]
    pub engine: EngineOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,
}

/// Flow functions by class; tag `v` selects entry `v - 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_residence")]
    pub residence: Vec<Schedule>,
    #[serde(default = "default_entrainment")]
    pub entrainment: Vec<Schedule>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            residence: default_residence(),
            entrainment: default_entrainment(),
        }
    }
}

fn default_residence() -> Vec<Schedule> {
    vec![Schedule::constant(DEFAULT_RESIDENCE_TIME)]
}

fn default_entrainment() -> Vec<Schedule> {
    vec![Schedule::constant(DEFAULT_ENTRAINMENT)]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
    #[serde(default = "default_chunk")]
    pub chunk: usize,
    /// Append the assembled initial state before the first step.
    #[serde(default = "default_true")]
    pub record_initial: bool,
}

fn default_chunk() -> usize {
    DEFAULT_CHUNK
}

fn default_true() -> bool {
    true
}

impl RunConfig {
    pub fn new(mechanisms: MechanismSpec) -> Self {
        Self {
            mechanisms,
            flows: FlowConfig::default(),
            engine: EngineOptions::default(),
            store: None,
        }
    }

    pub fn load(path: &Path) -> NetworkResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RunConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> NetworkResult<()> {
        self.validate()?;
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> NetworkResult<()> {
        self.schedules()?;
        if !(self.engine.max_dt.is_finite() && self.engine.max_dt > 0.0) {
            return Err(NetworkError::Config {
                what: format!("engine.max_dt must be positive, got {}", self.engine.max_dt),
            });
        }
        if let Some(store) = &self.store
            && store.chunk == 0
        {
            return Err(NetworkError::Config {
                what: "store.chunk must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn schedules(&self) -> NetworkResult<FlowSchedules> {
        FlowSchedules::from_schedules(&self.flows.residence, &self.flows.entrainment)
    }

    /// Resolver searching `base_dir` for relative mechanism paths.
    pub fn resolver(&self, base_dir: &Path) -> YamlResolver {
        YamlResolver::new().with_dir(base_dir)
    }
}
