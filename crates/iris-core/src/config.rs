use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Real, clamp_range};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{what}: min {min} > max {max}")]
    InvalidRange {
        what: &'static str,
        min: Real,
        max: Real,
    },
    #[error("control default {value} outside [{min}, {max}]")]
    DefaultOutOfRange { value: Real, min: Real, max: Real },
    #[error("control attribute name must not be empty")]
    EmptyControlName,
}

/// What to do when a joint's cosine parameter falls outside `[-1, 1]`.
///
/// This happens when the pupil guide is farther from the center than the
/// radius guide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CosineDomainPolicy {
    /// Fail the build with `JointError::CosineOutOfDomain`.
    #[default]
    Reject,
    /// Clamp into `[-1, 1]` and continue.
    Clamp,
}

/// When graph nodes downstream of a changed control recompute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPolicy {
    /// Recompute dirty nodes as part of the control write.
    #[default]
    Eager,
    /// Mark dirty on write, recompute on the next read.
    Lazy,
}

/// Limits applied to the doubled live angle, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AngleLimits {
    pub min_deg: Real,
    pub max_deg: Real,
}

impl Default for AngleLimits {
    fn default() -> Self {
        Self {
            min_deg: 0.0,
            max_deg: 190.0,
        }
    }
}

impl AngleLimits {
    pub fn clamp(&self, angle_deg: Real) -> Real {
        clamp_range(angle_deg, self.min_deg, self.max_deg)
    }
}

/// The keyable scalar exposed on the root joint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    pub name: String,
    pub min: Real,
    pub max: Real,
    pub default: Real,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            name: "irisScale".to_string(),
            min: -1.0,
            max: 1.0,
            default: 0.0,
        }
    }
}

impl ControlConfig {
    /// Clamp a value to the attribute limits.
    pub fn limit(&self, value: Real) -> Real {
        clamp_range(value, self.min, self.max)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub cosine_domain: CosineDomainPolicy,
    pub angle_limits: AngleLimits,
    pub control: ControlConfig,
    pub evaluation: EvaluationPolicy,
}

fn ordered(min: Real, max: Real) -> bool {
    matches!(min.partial_cmp(&max), Some(o) if o.is_le())
}

impl RigConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let AngleLimits { min_deg, max_deg } = self.angle_limits;
        if !ordered(min_deg, max_deg) {
            return Err(ConfigError::InvalidRange {
                what: "angle_limits",
                min: min_deg,
                max: max_deg,
            });
        }
        let c = &self.control;
        if c.name.is_empty() {
            return Err(ConfigError::EmptyControlName);
        }
        if !ordered(c.min, c.max) {
            return Err(ConfigError::InvalidRange {
                what: "control",
                min: c.min,
                max: c.max,
            });
        }
        if !(c.min..=c.max).contains(&c.default) {
            return Err(ConfigError::DefaultOutOfRange {
                value: c.default,
                min: c.min,
                max: c.max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_eye_rig_conventions() {
        let cfg = RigConfig::default();
        assert_eq!(cfg.cosine_domain, CosineDomainPolicy::Reject);
        assert_eq!(cfg.evaluation, EvaluationPolicy::Eager);
        assert_eq!(cfg.angle_limits.min_deg, 0.0);
        assert_eq!(cfg.angle_limits.max_deg, 190.0);
        assert_eq!(cfg.control.name, "irisScale");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: RigConfig =
            serde_json::from_str(r#"{"cosine_domain": "clamp", "evaluation": "lazy"}"#).unwrap();
        assert_eq!(cfg.cosine_domain, CosineDomainPolicy::Clamp);
        assert_eq!(cfg.evaluation, EvaluationPolicy::Lazy);
        assert_eq!(cfg.control, ControlConfig::default());
    }

    #[test]
    fn validate_rejects_inverted_ranges() {
        let mut cfg = RigConfig::default();
        cfg.angle_limits.min_deg = 200.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidRange {
                what: "angle_limits",
                ..
            })
        ));

        let mut cfg = RigConfig::default();
        cfg.control.default = 2.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DefaultOutOfRange { .. })
        ));

        let mut cfg = RigConfig::default();
        cfg.control.name.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyControlName));
    }

    #[test]
    fn angle_limits_clamp() {
        let limits = AngleLimits::default();
        assert_eq!(limits.clamp(-10.0), 0.0);
        assert_eq!(limits.clamp(120.0), 120.0);
        assert_eq!(limits.clamp(360.0), 190.0);
    }
}
