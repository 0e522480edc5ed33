//! Lumped well-stirred reactor with mass, enthalpy and species storage.

use pn_core::units::constants::R_UNIVERSAL;
use pn_engine::{EngineError, EngineResult, ReactorKind, ReactorSnapshot};
use pn_mech::GasPhase;
use pn_mech::gas::mean_molar_mass;

/// Slot offsets inside one reactor's state block.
pub const MASS: usize = 0;
pub const TEMPERATURE: usize = 1;
pub const SPECIES: usize = 2;

/// One control volume known to the engine.
///
/// The state block is `[mass, temperature, Y_0 .. Y_n]`. Reservoirs keep
/// their block fixed for the whole run.
#[derive(Clone, Debug)]
pub struct MixingReactor {
    pub name: String,
    pub kind: ReactorKind,
    pub gas: GasPhase,
    /// Current state block (mass kg, temperature K, mass fractions).
    pub current: Vec<f64>,
}

impl MixingReactor {
    /// Fill `volume_m3` with `gas` at the gas's own temperature and pressure.
    pub fn new(
        name: &str,
        gas: &GasPhase,
        kind: ReactorKind,
        volume_m3: f64,
    ) -> EngineResult<Self> {
        if !volume_m3.is_finite() || volume_m3 <= 0.0 {
            return Err(EngineError::InvalidArg {
                what: "reactor volume must be positive",
            });
        }
        let mut current = Vec::with_capacity(SPECIES + gas.species().len());
        current.push(gas.density() * volume_m3);
        current.push(gas.temperature().value);
        current.extend_from_slice(gas.mass_fractions().as_slice());
        Ok(Self {
            name: name.to_string(),
            kind,
            gas: gas.clone(),
            current,
        })
    }

    pub fn state_len(&self) -> usize {
        self.current.len()
    }

    pub fn energy_enabled(&self) -> bool {
        matches!(self.kind, ReactorKind::ConstPressure { energy: true })
    }

    pub fn pressure(&self) -> f64 {
        self.gas.pressure().value
    }

    /// Derived state for a block (either `current` or an integrator trial state).
    pub fn snapshot(&self, block: &[f64]) -> ReactorSnapshot {
        let mass = block[MASS];
        let temperature = block[TEMPERATURE];
        let w = mean_molar_mass(self.gas.species(), &block[SPECIES..]);
        let pressure = self.pressure();
        let volume = if w > 0.0 {
            mass * R_UNIVERSAL * temperature / (pressure * w)
        } else {
            0.0
        };
        ReactorSnapshot {
            mass,
            temperature,
            volume,
            pressure,
        }
    }

    /// Component names of this reactor's state block.
    pub fn component_names(&self) -> impl Iterator<Item = String> + '_ {
        ["mass", "temperature"]
            .into_iter()
            .chain(self.gas.species_names())
            .map(move |c| format!("{}:{}", self.name, c))
    }

    /// For each species slot of `self`, the matching slot in `upstream`.
    pub fn species_map(&self, upstream: &MixingReactor) -> Vec<Option<usize>> {
        self.gas
            .species_names()
            .map(|name| upstream.gas.species_index(name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pn_core::units::{k, pa};
    use pn_mech::SpeciesDef;

    fn nitrogen() -> GasPhase {
        GasPhase::new(
            "n2",
            vec![SpeciesDef::new("N2", 28.014)],
            vec![1.0],
            k(300.0),
            pa(101_325.0),
        )
        .unwrap()
    }

    #[test]
    fn snapshot_volume_round_trips() {
        let r = MixingReactor::new(
            "r",
            &nitrogen(),
            ReactorKind::ConstPressure { energy: true },
            2.0,
        )
        .unwrap();
        let snap = r.snapshot(&r.current);
        assert!((snap.volume - 2.0).abs() < 1e-9);
        assert_eq!(snap.temperature, 300.0);
    }

    #[test]
    fn names_are_prefixed_by_reactor() {
        let r = MixingReactor::new("exhaust_1", &nitrogen(), ReactorKind::Reservoir, 1.0).unwrap();
        let names: Vec<_> = r.component_names().collect();
        assert_eq!(
            names,
            vec!["exhaust_1:mass", "exhaust_1:temperature", "exhaust_1:N2"]
        );
    }

    #[test]
    fn rejects_bad_volume() {
        assert!(MixingReactor::new("r", &nitrogen(), ReactorKind::Reservoir, 0.0).is_err());
    }
}
