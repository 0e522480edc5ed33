//! Engine error types.

use thiserror::Error;

/// Errors raised by a reactor engine. Callers pass these through unmodified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Time must not move backwards: now={now}, requested={requested}")]
    NonMonotonicTime { now: f64, requested: f64 },

    #[error("Unknown reactor id {id}")]
    UnknownReactor { id: u32 },

    #[error("Unknown connector id {id}")]
    UnknownConnector { id: u32 },

    #[error("Network not assembled")]
    NotAssembled,

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Non-physical condition: {what}")]
    NonPhysical { what: String },

    #[error("Convergence failed: {what}")]
    ConvergenceFailed { what: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<pn_core::PnError> for EngineError {
    fn from(e: pn_core::PnError) -> Self {
        EngineError::NonPhysical {
            what: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_monotonic_display() {
        let err = EngineError::NonMonotonicTime {
            now: 2.0,
            requested: 1.0,
        };
        assert!(err.to_string().contains("requested=1"));
    }

    #[test]
    fn core_errors_become_non_physical() {
        let err: EngineError = pn_core::PnError::NonFinite {
            what: "mass",
            value: f64::NAN,
        }
        .into();
        assert!(matches!(err, EngineError::NonPhysical { .. }));
    }
}
