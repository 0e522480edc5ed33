//! Gas-phase objects handed to the reactor engine.

use pn_core::units::{Pressure, Temperature, constants::R_UNIVERSAL};

use crate::composition::MassFractions;
use crate::error::{MechError, MechResult};

/// Default specific heat when a mechanism does not state one, J/(kg K).
pub const DEFAULT_CP: f64 = 1_005.0;

/// A named species with its molar mass in kg/kmol.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesDef {
    pub name: String,
    pub molar_mass: f64,
}

impl SpeciesDef {
    pub fn new(name: impl Into<String>, molar_mass: f64) -> Self {
        Self {
            name: name.into(),
            molar_mass,
        }
    }
}

/// Thermodynamic state plus species set of one mechanism.
#[derive(Debug, Clone, PartialEq)]
pub struct GasPhase {
    name: String,
    species: Vec<SpeciesDef>,
    fractions: MassFractions,
    temperature: Temperature,
    pressure: Pressure,
    cp: f64,
}

impl GasPhase {
    /// Create a gas; fractions are normalized and must align with `species`.
    pub fn new(
        name: impl Into<String>,
        species: Vec<SpeciesDef>,
        mass_fractions: Vec<f64>,
        temperature: Temperature,
        pressure: Pressure,
    ) -> MechResult<Self> {
        if species.len() != mass_fractions.len() {
            return Err(MechError::NonPhysical {
                what: "species and mass fractions differ in length",
            });
        }
        if species
            .iter()
            .any(|s| !s.molar_mass.is_finite() || s.molar_mass <= 0.0)
        {
            return Err(MechError::NonPhysical {
                what: "molar mass must be positive and finite",
            });
        }
        if !temperature.value.is_finite() || temperature.value <= 0.0 {
            return Err(MechError::NonPhysical {
                what: "temperature must be positive and finite",
            });
        }
        if !pressure.value.is_finite() || pressure.value <= 0.0 {
            return Err(MechError::NonPhysical {
                what: "pressure must be positive and finite",
            });
        }

        Ok(Self {
            name: name.into(),
            species,
            fractions: MassFractions::new(mass_fractions)?,
            temperature,
            pressure,
            cp: DEFAULT_CP,
        })
    }

    /// Override the constant specific heat, J/(kg K).
    pub fn with_cp(mut self, cp: f64) -> MechResult<Self> {
        if !cp.is_finite() || cp <= 0.0 {
            return Err(MechError::NonPhysical {
                what: "specific heat must be positive and finite",
            });
        }
        self.cp = cp;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn species(&self) -> &[SpeciesDef] {
        &self.species
    }

    pub fn species_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.species.iter().map(|s| s.name.as_str())
    }

    /// Slot of a species by name.
    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s.name == name)
    }

    pub fn mass_fractions(&self) -> &MassFractions {
        &self.fractions
    }

    pub fn temperature(&self) -> Temperature {
        self.temperature
    }

    pub fn pressure(&self) -> Pressure {
        self.pressure
    }

    pub fn cp(&self) -> f64 {
        self.cp
    }

    /// Mean molar mass `1 / sum(Y_i / W_i)`, kg/kmol.
    pub fn mean_molar_mass(&self) -> f64 {
        mean_molar_mass(&self.species, self.fractions.as_slice())
    }

    /// Ideal-gas density at the gas's own state, kg/m^3.
    pub fn density(&self) -> f64 {
        self.pressure.value * self.mean_molar_mass() / (R_UNIVERSAL * self.temperature.value)
    }
}

/// Mean molar mass of a mixture given per-slot mass fractions.
pub fn mean_molar_mass(species: &[SpeciesDef], fractions: &[f64]) -> f64 {
    let inverse: f64 = species
        .iter()
        .zip(fractions)
        .map(|(s, y)| y / s.molar_mass)
        .sum();
    if inverse > 0.0 { 1.0 / inverse } else { 0.0 }
}
