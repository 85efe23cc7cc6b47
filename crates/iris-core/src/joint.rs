//! Per-joint parameter pipeline.
//!
//! Each joint `i` of `N` gets a static *default param* baked from the guide
//! geometry, and a live transform driven by the shared control scalar `s`:
//!
//! ```text
//! cos      = pupil_distance / radius        (i == N-1)
//!          = i * (1 / (N-1))                (otherwise)
//! angle    = degrees(acos(cos))
//! default  = angle / 90
//! clamped  = clamp((s + default) * 180, 0, 190)
//! q        = euler_x(clamped)
//! scale_xy = q.x,  translate_z = q.w * radius
//! ```
//!
//! No joint depends on another joint; only on `s` and its own default param.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AngleLimits, CosineDomainPolicy, GuideSample, Real, euler_x_to_quat, quat_xw};

/// Angle (degrees) that maps to a default param of 1.
pub const DEFAULT_PARAM_SPAN_DEG: Real = 90.0;
/// Gain from combined param to the doubled live angle (degrees).
pub const DOUBLED_ANGLE_GAIN: Real = 180.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JointError {
    #[error("joint count must be at least 1, got {0}")]
    InvalidJointCount(usize),
    #[error("joint index {index} out of range for {count} joints")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("degenerate guide geometry: radius {0} is not positive and finite")]
    DegenerateRadius(Real),
    #[error("cosine parameter {value} of joint {index} is outside [-1, 1]")]
    CosineOutOfDomain { index: usize, value: Real },
}

/// Raw cosine parameter for joint `index` of `count`.
///
/// The last joint snaps to the measured pupil ratio; the others are evenly
/// spaced on `[0, 1)`. No domain check is applied here.
pub fn cosine_param(index: usize, count: usize, sample: &GuideSample) -> Result<Real, JointError> {
    if count == 0 {
        return Err(JointError::InvalidJointCount(count));
    }
    if index >= count {
        return Err(JointError::IndexOutOfRange { index, count });
    }
    if index == count - 1 {
        Ok(sample.pupil_ratio())
    } else {
        Ok(index as Real * (1.0 / (count - 1) as Real))
    }
}

/// Static per-joint parameters, fixed at build time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    pub index: usize,
    pub count: usize,
    /// Guide radius, scales the Z translation.
    pub radius: Real,
    pub cos_param: Real,
    pub angle_deg: Real,
    pub default_param: Real,
}

/// Intermediate live angles for one control value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveAngle {
    pub combined_param: Real,
    pub doubled_deg: Real,
    pub clamped_deg: Real,
}

/// Transform outputs of one joint for one control value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointTransform {
    pub index: usize,
    pub clamped_angle_deg: Real,
    pub quat_x: Real,
    pub quat_w: Real,
    pub scale_x: Real,
    pub scale_y: Real,
    pub translate_z: Real,
}

impl JointTransform {
    /// Outputs for an already clamped angle.
    pub fn from_clamped_angle(index: usize, clamped_deg: Real, radius: Real) -> Self {
        let (quat_x, quat_w) = quat_xw(&euler_x_to_quat(clamped_deg));
        Self {
            index,
            clamped_angle_deg: clamped_deg,
            quat_x,
            quat_w,
            scale_x: quat_x,
            scale_y: quat_x,
            translate_z: quat_w * radius,
        }
    }
}

impl JointSpec {
    /// Derive the static parameters of joint `index` of `count`.
    pub fn derive(
        index: usize,
        count: usize,
        sample: &GuideSample,
        policy: CosineDomainPolicy,
    ) -> Result<Self, JointError> {
        if !sample.has_valid_radius() {
            return Err(JointError::DegenerateRadius(sample.radius));
        }
        let raw = cosine_param(index, count, sample)?;
        let cos_param = if (-1.0..=1.0).contains(&raw) {
            raw
        } else {
            match policy {
                CosineDomainPolicy::Reject => {
                    return Err(JointError::CosineOutOfDomain { index, value: raw });
                }
                CosineDomainPolicy::Clamp => {
                    warn!("joint {index}: cosine parameter {raw} clamped into [-1, 1]");
                    raw.clamp(-1.0, 1.0)
                }
            }
        };
        let angle_deg = cos_param.acos().to_degrees();
        let default_param = angle_deg / DEFAULT_PARAM_SPAN_DEG;
        debug!(
            "joint {index}/{count}: cos {cos_param:.6} angle {angle_deg:.4} deg default {default_param:.6}"
        );
        Ok(Self {
            index,
            count,
            radius: sample.radius,
            cos_param,
            angle_deg,
            default_param,
        })
    }

    /// Live angles for control value `iris_scale`.
    pub fn live_angle(&self, iris_scale: Real, limits: &AngleLimits) -> LiveAngle {
        let combined_param = iris_scale + self.default_param;
        let doubled_deg = combined_param * DOUBLED_ANGLE_GAIN;
        LiveAngle {
            combined_param,
            doubled_deg,
            clamped_deg: limits.clamp(doubled_deg),
        }
    }

    /// Transform for control value `iris_scale` with the default angle limits.
    pub fn evaluate(&self, iris_scale: Real) -> JointTransform {
        self.evaluate_with(iris_scale, &AngleLimits::default())
    }

    pub fn evaluate_with(&self, iris_scale: Real, limits: &AngleLimits) -> JointTransform {
        let live = self.live_angle(iris_scale, limits);
        JointTransform::from_clamped_angle(self.index, live.clamped_deg, self.radius)
    }

    /// `true` for the joint snapped to the measured pupil ratio.
    pub fn is_pupil_edge(&self) -> bool {
        self.index + 1 == self.count
    }
}

/// Derive specs for joints `0..count` in order.
pub fn derive_joint_specs(
    sample: &GuideSample,
    count: usize,
    policy: CosineDomainPolicy,
) -> Result<Vec<JointSpec>, JointError> {
    if count == 0 {
        return Err(JointError::InvalidJointCount(count));
    }
    if count == 1 {
        warn!("single-joint rig: only the pupil-edge joint is created");
    }
    (0..count)
        .map(|index| JointSpec::derive(index, count, sample, policy))
        .collect()
}
