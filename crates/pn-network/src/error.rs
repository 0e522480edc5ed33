//! Network-layer errors.
//!
//! Collaborator errors pass through unmodified inside their own variant.

use thiserror::Error;

use crate::builder::BuildStage;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] pn_topology::TopologyError),

    #[error("Resource error: {0}")]
    Resource(#[from] pn_mech::MechError),

    #[error("Engine error: {0}")]
    Engine(#[from] pn_engine::EngineError),

    #[error("Storage error: {0}")]
    Storage(#[from] pn_store::StoreError),

    #[error("Builder is in stage {found}, operation needs stage {expected}")]
    Stage {
        expected: BuildStage,
        found: BuildStage,
    },

    #[error("Network already assembled")]
    AlreadyAssembled,

    /// Engine handed out ids that do not match the matrix addressing.
    #[error("Reactor '{name}' was created out of order")]
    ReactorOrder { name: String },

    #[error("Invalid run configuration: {what}")]
    Config { what: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
