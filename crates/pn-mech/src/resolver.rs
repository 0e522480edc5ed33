//! Resolving mechanism references into gas-phase objects.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pn_core::units::{constants::ONE_ATM_PA, k, pa};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MechError, MechResult};
use crate::gas::{GasPhase, SpeciesDef};

/// Anything able to turn a mechanism path into a gas.
pub trait GasResolver {
    fn resolve(&self, path: &Path) -> MechResult<GasPhase>;
}

/// Mechanism references for one plume network.
///
/// Exhaust mechanisms are cycled round-robin over the exhaust reactor slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismSpec {
    pub fuel: PathBuf,
    pub atmosphere: PathBuf,
    #[serde(default)]
    pub exhausts: Vec<PathBuf>,
}

/// On-disk mechanism description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MechanismFile {
    pub name: String,
    pub temperature_k: f64,
    #[serde(default = "one_atmosphere")]
    pub pressure_pa: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp_j_per_kg_k: Option<f64>,
    pub species: Vec<SpeciesEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeciesEntry {
    pub name: String,
    pub molar_mass: f64,
    #[serde(default)]
    pub mass_fraction: f64,
}

fn one_atmosphere() -> f64 {
    ONE_ATM_PA
}

impl MechanismFile {
    /// Build the gas this file describes.
    pub fn to_gas(&self) -> MechResult<GasPhase> {
        let species = self
            .species
            .iter()
            .map(|s| SpeciesDef::new(s.name.clone(), s.molar_mass))
            .collect();
        let fractions = self.species.iter().map(|s| s.mass_fraction).collect();
        let gas = GasPhase::new(
            self.name.clone(),
            species,
            fractions,
            k(self.temperature_k),
            pa(self.pressure_pa),
        )?;
        match self.cp_j_per_kg_k {
            Some(cp) => gas.with_cp(cp),
            None => Ok(gas),
        }
    }
}

/// Reads YAML mechanism files, searching extra directories for relative paths.
#[derive(Debug, Clone, Default)]
pub struct YamlResolver {
    search_dirs: Vec<PathBuf>,
}

impl YamlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory consulted for relative mechanism paths.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    fn locate(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        if path.is_absolute() {
            return None;
        }
        self.search_dirs
            .iter()
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }
}

impl GasResolver for YamlResolver {
    fn resolve(&self, path: &Path) -> MechResult<GasPhase> {
        let located = self.locate(path).ok_or_else(|| MechError::NotFound {
            path: path.to_path_buf(),
        })?;
        let content = std::fs::read_to_string(&located).map_err(|source| MechError::Io {
            path: located.clone(),
            source,
        })?;
        let file: MechanismFile =
            serde_yaml::from_str(&content).map_err(|source| MechError::Yaml {
                path: located.clone(),
                source,
            })?;
        let gas = file.to_gas().map_err(|e| MechError::Invalid {
            path: located.clone(),
            what: e.to_string(),
        })?;
        debug!(path = %located.display(), gas = gas.name(), species = gas.species().len(), "mechanism resolved");
        Ok(gas)
    }
}

/// In-memory mechanisms keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MechanismLibrary {
    gases: HashMap<PathBuf, GasPhase>,
}

impl MechanismLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, gas: GasPhase) {
        self.gases.insert(path.into(), gas);
    }

    pub fn len(&self) -> usize {
        self.gases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gases.is_empty()
    }
}

impl GasResolver for MechanismLibrary {
    fn resolve(&self, path: &Path) -> MechResult<GasPhase> {
        self.gases
            .get(path)
            .cloned()
            .ok_or_else(|| MechError::NotFound {
                path: path.to_path_buf(),
            })
    }
}
