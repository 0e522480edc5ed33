//! Mechanism resolution errors.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for mechanism operations.
pub type MechResult<T> = Result<T, MechError>;

/// A gas could not be produced from a mechanism reference.
///
/// Resolution is deterministic, so callers propagate these without retrying.
#[derive(Error, Debug)]
pub enum MechError {
    #[error("Mechanism not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read mechanism {}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed mechanism {}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid mechanism {}: {what}", path.display())]
    Invalid { path: PathBuf, what: String },

    /// Gas constructed from inconsistent values.
    #[error("Non-physical gas value for {what}")]
    NonPhysical { what: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MechError::NotFound {
            path: PathBuf::from("gri30.yaml"),
        };
        assert!(err.to_string().contains("gri30.yaml"));

        let err = MechError::NonPhysical { what: "pressure" };
        assert!(err.to_string().contains("pressure"));
    }
}
