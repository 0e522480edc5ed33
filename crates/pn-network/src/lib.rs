//! pn-network: plume reactor-network construction and time stepping.
//!
//! Provides:
//! - Flow schedules (`Schedule`, `FlowSchedules`) for residence time and entrainment
//! - `FlowClosure`: per-edge mass-flow value objects evaluated at every engine sub-step
//! - `NetworkBuilder`: staged construction of reservoirs, reactors and connectors
//! - `StepController`: advances the engine and forwards each sample to the store
//! - `PlumeModel`: facade owning the builder, engine and store
//! - `RunConfig`: YAML run configuration

pub mod builder;
pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod model;
pub mod schedule;

pub use builder::{BuildStage, NetworkBuilder, WiredEdge, reactor_name};
pub use config::{RunConfig, StoreConfig};
pub use controller::StepController;
pub use error::{NetworkError, NetworkResult};
pub use flow::{BoundFlow, FlowClosure};
pub use model::PlumeModel;
pub use schedule::{FlowSchedules, Schedule, TimeFunction};
