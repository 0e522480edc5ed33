//! pn-mech: gas-phase definitions resolved from mechanism files.
//!
//! Mechanism content is opaque to the rest of plumenet. This crate only
//! answers "given a path, produce a gas" and "given a gas, report its
//! component names and state values".
//!
//! # Example
//!
//! ```
//! use pn_mech::{GasPhase, GasResolver, MechanismLibrary, SpeciesDef};
//! use pn_core::units::{k, pa};
//!
//! let air = GasPhase::new(
//!     "air",
//!     vec![SpeciesDef::new("N2", 28.014), SpeciesDef::new("O2", 31.998)],
//!     vec![0.767, 0.233],
//!     k(300.0),
//!     pa(101_325.0),
//! )
//! .unwrap();
//!
//! let mut library = MechanismLibrary::new();
//! library.insert("air.yaml", air);
//! let gas = library.resolve("air.yaml".as_ref()).unwrap();
//! assert_eq!(gas.species_names().count(), 2);
//! ```

pub mod composition;
pub mod error;
pub mod gas;
pub mod resolver;

pub use composition::MassFractions;
pub use error::{MechError, MechResult};
pub use gas::{GasPhase, SpeciesDef};
pub use resolver::{GasResolver, MechanismFile, MechanismLibrary, MechanismSpec, YamlResolver};
