//! Read-only reactor state access used while evaluating connector rates.

use pn_core::ReactorId;

/// Instantaneous state of one reactor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReactorSnapshot {
    /// kg
    pub mass: f64,
    /// K
    pub temperature: f64,
    /// m^3
    pub volume: f64,
    /// Pa
    pub pressure: f64,
}

/// Read access to reactor state at one instant.
pub trait ReactorProbe {
    fn snapshot(&self, id: ReactorId) -> Option<ReactorSnapshot>;

    /// Mass of a reactor, 0 when the id is unknown.
    fn mass(&self, id: ReactorId) -> f64 {
        self.snapshot(id).map_or(0.0, |s| s.mass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct One(ReactorSnapshot);

    impl ReactorProbe for One {
        fn snapshot(&self, id: ReactorId) -> Option<ReactorSnapshot> {
            (id.index() == 0).then_some(self.0)
        }
    }

    #[test]
    fn mass_defaults_to_zero_for_unknown_ids() {
        let probe = One(ReactorSnapshot {
            mass: 2.5,
            temperature: 300.0,
            volume: 1.0,
            pressure: 101_325.0,
        });
        assert_eq!(probe.mass(ReactorId::from_index(0)), 2.5);
        assert_eq!(probe.mass(ReactorId::from_index(4)), 0.0);
    }
}
