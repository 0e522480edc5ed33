//! Reference reactor-network engine for plumenet.
//!
//! Provides:
//! - Non-reacting, well-stirred constant-pressure reactors and reservoirs
//! - Mass, species and enthalpy balances driven by connector rate laws
//! - Fixed-step RK4 / forward Euler integrators
//! - Steady-state marching with a normalized-derivative criterion
//!
//! There is no chemistry here: composition changes only by mixing.

pub mod engine;
pub mod integrator;
pub mod reactor;

pub use engine::{EngineOptions, MixingEngine};
pub use integrator::{Derivative, IntegratorType};
pub use reactor::MixingReactor;
