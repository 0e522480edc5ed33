//! Time-dependent flow schedules.

use std::fmt;
use std::sync::Arc;

use pn_topology::FlowClasses;
use serde::{Deserialize, Serialize};

use crate::error::{NetworkError, NetworkResult};

/// Scalar function of elapsed time.
pub trait TimeFunction: Send + Sync + fmt::Debug {
    fn value(&self, t: f64) -> f64;
}

/// Serializable schedule shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    Constant {
        value: f64,
    },
    /// `initial + slope * t`
    Linear {
        initial: f64,
        slope: f64,
    },
    /// Piecewise linear through `[t, value]` points, held flat outside them.
    Table {
        points: Vec<[f64; 2]>,
    },
    /// `initial * exp(rate * t)`
    Exponential {
        initial: f64,
        rate: f64,
    },
}

impl Schedule {
    pub fn constant(value: f64) -> Self {
        Schedule::Constant { value }
    }

    /// Check parameters are finite and table times strictly increase.
    pub fn validate(&self) -> NetworkResult<()> {
        let finite = |v: f64, what: &str| {
            if v.is_finite() {
                Ok(())
            } else {
                Err(NetworkError::Config {
                    what: format!("schedule {what} must be finite, got {v}"),
                })
            }
        };
        match self {
            Schedule::Constant { value } => finite(*value, "value"),
            Schedule::Linear { initial, slope } => {
                finite(*initial, "initial")?;
                finite(*slope, "slope")
            }
            Schedule::Exponential { initial, rate } => {
                finite(*initial, "initial")?;
                finite(*rate, "rate")
            }
            Schedule::Table { points } => {
                if points.is_empty() {
                    return Err(NetworkError::Config {
                        what: "table schedule needs at least one point".to_string(),
                    });
                }
                for [t, v] in points {
                    finite(*t, "time")?;
                    finite(*v, "value")?;
                }
                if points.windows(2).any(|w| w[1][0] <= w[0][0]) {
                    return Err(NetworkError::Config {
                        what: "table schedule times must strictly increase".to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    /// [`Schedule::validate`], plus a strictly positive starting value.
    pub fn validate_residence(&self) -> NetworkResult<()> {
        self.validate_floor("residence time", "positive", |v| v > 0.0)
    }

    /// [`Schedule::validate`], plus a non-negative starting value.
    pub fn validate_entrainment(&self) -> NetworkResult<()> {
        self.validate_floor("entrainment rate", "non-negative", |v| v >= 0.0)
    }

    /// Linear and exponential shapes are checked at `t = 0`, tables at every point.
    fn validate_floor(&self, label: &str, rule: &str, ok: fn(f64) -> bool) -> NetworkResult<()> {
        self.validate()?;
        let bad = match self {
            Schedule::Constant { value } => Some(*value).filter(|v| !ok(*v)),
            Schedule::Linear { initial, .. } | Schedule::Exponential { initial, .. } => {
                Some(*initial).filter(|v| !ok(*v))
            }
            Schedule::Table { points } => points.iter().map(|p| p[1]).find(|v| !ok(*v)),
        };
        match bad {
            Some(v) => Err(NetworkError::Config {
                what: format!("{label} schedule must be {rule}, got {v}"),
            }),
            None => Ok(()),
        }
    }
}

impl TimeFunction for Schedule {
    fn value(&self, t: f64) -> f64 {
        match self {
            Schedule::Constant { value } => *value,
            Schedule::Linear { initial, slope } => initial + slope * t,
            Schedule::Exponential { initial, rate } => initial * (rate * t).exp(),
            Schedule::Table { points } => interpolate(points, t),
        }
    }
}

fn interpolate(points: &[[f64; 2]], t: f64) -> f64 {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return 0.0;
    };
    if t <= first[0] {
        return first[1];
    }
    if t >= last[0] {
        return last[1];
    }
    let upper = points.partition_point(|p| p[0] <= t);
    let [t0, v0] = points[upper - 1];
    let [t1, v1] = points[upper];
    v0 + (v1 - v0) * (t - t0) / (t1 - t0)
}

/// Residence-time and entrainment functions indexed by flow class.
///
/// Class tag `v` selects entry `v - 1`.
#[derive(Debug, Clone)]
pub struct FlowSchedules {
    residence: Vec<Arc<dyn TimeFunction>>,
    entrainment: Vec<Arc<dyn TimeFunction>>,
}

impl FlowSchedules {
    pub fn new(
        residence: Vec<Arc<dyn TimeFunction>>,
        entrainment: Vec<Arc<dyn TimeFunction>>,
    ) -> Self {
        Self {
            residence,
            entrainment,
        }
    }

    /// One constant residence time (s) and one constant entrainment rate (kg/s).
    pub fn constant(residence_time: f64, entrainment: f64) -> Self {
        Self::new(
            vec![Arc::new(Schedule::constant(residence_time))],
            vec![Arc::new(Schedule::constant(entrainment))],
        )
    }

    /// Validate and wrap configured schedules.
    pub fn from_schedules(residence: &[Schedule], entrainment: &[Schedule]) -> NetworkResult<Self> {
        if residence.is_empty() {
            return Err(NetworkError::Config {
                what: "at least one residence-time schedule is required".to_string(),
            });
        }
        Ok(Self::new(
            wrap(residence, Schedule::validate_residence)?,
            wrap(entrainment, Schedule::validate_entrainment)?,
        ))
    }

    /// Counts the topology plan validates class tags against.
    pub fn classes(&self) -> FlowClasses {
        FlowClasses {
            residence: self.residence.len(),
            entrainment: self.entrainment.len(),
        }
    }

    pub fn residence(&self, class: u8) -> Option<Arc<dyn TimeFunction>> {
        slot(&self.residence, class)
    }

    pub fn entrainment(&self, class: u8) -> Option<Arc<dyn TimeFunction>> {
        slot(&self.entrainment, class)
    }
}

fn wrap(
    list: &[Schedule],
    check: fn(&Schedule) -> NetworkResult<()>,
) -> NetworkResult<Vec<Arc<dyn TimeFunction>>> {
    list.iter()
        .map(|s| {
            check(s)?;
            Ok(Arc::new(s.clone()) as Arc<dyn TimeFunction>)
        })
        .collect()
}

fn slot(list: &[Arc<dyn TimeFunction>], class: u8) -> Option<Arc<dyn TimeFunction>> {
    usize::from(class)
        .checked_sub(1)
        .and_then(|i| list.get(i))
        .cloned()
}
