//! Alarm limits and range checking

use belimo_protocol::Register;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors in an alarm limit configuration
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LimitError {
    /// Limit outside the range the operator may configure
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Lower limit above upper limit
    #[error("{kind} lower limit {min} exceeds upper limit {max}")]
    Inverted {
        kind: &'static str,
        min: f64,
        max: f64,
    },
}

/// Monitored quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmKind {
    /// Supply temperature T1
    Temperature1,
    /// Return temperature T2
    Temperature2,
    /// Temperature difference
    DeltaT,
    /// Volumetric flow
    Flow,
}

impl AlarmKind {
    /// All kinds in evaluation order
    pub const ALL: [AlarmKind; 4] = [
        AlarmKind::Temperature1,
        AlarmKind::Temperature2,
        AlarmKind::DeltaT,
        AlarmKind::Flow,
    ];

    /// Register carrying the quantity
    pub fn register(&self) -> Register {
        match self {
            AlarmKind::Temperature1 => Register::Temperature1,
            AlarmKind::Temperature2 => Register::Temperature2,
            AlarmKind::DeltaT => Register::DeltaT,
            AlarmKind::Flow => Register::Flow,
        }
    }

    /// Short name used in alarm messages
    pub fn name(&self) -> &'static str {
        match self {
            AlarmKind::Temperature1 => "T1",
            AlarmKind::Temperature2 => "T2",
            AlarmKind::DeltaT => "ΔT",
            AlarmKind::Flow => "Flow",
        }
    }

    /// Engineering unit
    pub fn unit(&self) -> &'static str {
        match self {
            AlarmKind::Flow => "m^3/h",
            _ => "°C",
        }
    }

    /// Range within which limits may be configured
    pub fn allowed_range(&self) -> (f64, f64) {
        match self {
            AlarmKind::Temperature1 | AlarmKind::Temperature2 => (5.0, 60.0),
            AlarmKind::DeltaT => (0.0, 5.0),
            AlarmKind::Flow => (0.0, 2000.0),
        }
    }
}

/// Inclusive alarm bounds of one actuator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlarmLimits {
    pub t1_min: f64,
    pub t1_max: f64,
    pub t2_min: f64,
    pub t2_max: f64,
    pub dt_min: f64,
    pub dt_max: f64,
    pub flow_min: f64,
    pub flow_max: f64,
}

impl Default for AlarmLimits {
    fn default() -> Self {
        Self {
            t1_min: 20.0,
            t1_max: 25.0,
            t2_min: 20.0,
            t2_max: 25.0,
            dt_min: 0.0,
            dt_max: 5.0,
            flow_min: 1000.0,
            flow_max: 1300.0,
        }
    }
}

impl AlarmLimits {
    /// Lower and upper bound for a quantity
    pub fn bounds(&self, kind: AlarmKind) -> (f64, f64) {
        match kind {
            AlarmKind::Temperature1 => (self.t1_min, self.t1_max),
            AlarmKind::Temperature2 => (self.t2_min, self.t2_max),
            AlarmKind::DeltaT => (self.dt_min, self.dt_max),
            AlarmKind::Flow => (self.flow_min, self.flow_max),
        }
    }

    /// Whether `value` lies within the inclusive bounds of `kind`
    pub fn contains(&self, kind: AlarmKind, value: f64) -> bool {
        let (min, max) = self.bounds(kind);
        min <= value && value <= max
    }

    /// Check every limit against its allowed range and ordering
    pub fn validate(&self) -> Result<(), LimitError> {
        let fields = [
            ("t1_min", AlarmKind::Temperature1, self.t1_min),
            ("t1_max", AlarmKind::Temperature1, self.t1_max),
            ("t2_min", AlarmKind::Temperature2, self.t2_min),
            ("t2_max", AlarmKind::Temperature2, self.t2_max),
            ("dt_min", AlarmKind::DeltaT, self.dt_min),
            ("dt_max", AlarmKind::DeltaT, self.dt_max),
            ("flow_min", AlarmKind::Flow, self.flow_min),
            ("flow_max", AlarmKind::Flow, self.flow_max),
        ];

        for (field, kind, value) in fields {
            let (min, max) = kind.allowed_range();
            if !(min..=max).contains(&value) {
                return Err(LimitError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }

        for kind in AlarmKind::ALL {
            let (min, max) = self.bounds(kind);
            if min > max {
                return Err(LimitError::Inverted {
                    kind: kind.name(),
                    min,
                    max,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AlarmLimits::default().validate().is_ok());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let limits = AlarmLimits::default();
        assert!(limits.contains(AlarmKind::Temperature1, 20.0));
        assert!(limits.contains(AlarmKind::Temperature1, 25.0));
        assert!(!limits.contains(AlarmKind::Temperature1, 25.01));
        assert!(limits.contains(AlarmKind::Flow, 1000.0));
        assert!(!limits.contains(AlarmKind::Flow, 999.0));
    }

    #[test]
    fn test_out_of_range_limit() {
        let limits = AlarmLimits {
            flow_max: 2500.0,
            ..Default::default()
        };
        assert_eq!(
            limits.validate(),
            Err(LimitError::OutOfRange {
                field: "flow_max",
                value: 2500.0,
                min: 0.0,
                max: 2000.0,
            })
        );
    }

    #[test]
    fn test_inverted_limits() {
        let limits = AlarmLimits {
            t2_min: 30.0,
            t2_max: 25.0,
            ..Default::default()
        };
        assert!(matches!(
            limits.validate(),
            Err(LimitError::Inverted { kind: "T2", .. })
        ));
    }

    #[test]
    fn test_nan_limit_rejected() {
        let limits = AlarmLimits {
            dt_max: f64::NAN,
            ..Default::default()
        };
        assert!(limits.validate().is_err());
    }

    proptest! {
        #[test]
        fn prop_ordered_in_range_limits_validate(
            lo in 5.0f64..=60.0,
            hi in 5.0f64..=60.0,
        ) {
            let (min, max) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            let limits = AlarmLimits { t1_min: min, t1_max: max, ..Default::default() };
            prop_assert!(limits.validate().is_ok());
        }
    }
}
