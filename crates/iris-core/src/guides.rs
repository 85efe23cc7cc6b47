//! Guide sampling.
//!
//! Guides are user-placed landmarks (eye center, iris radius, pupil edge). The
//! rig only needs their world positions, which are supplied by an injected
//! [`PositionProvider`]. Everything downstream works from a [`GuideSample`]
//! taken once per build.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Pt3, Real, distance};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuideError {
    #[error("unknown guide `{0}`")]
    UnknownGuide(String),
    #[error("guide `{0}` has a non-finite world position")]
    NonFinite(String),
}

/// Resolves guide names to world-space positions.
pub trait PositionProvider {
    fn world_position(&self, name: &str) -> Result<Pt3, GuideError>;
}

impl<P: PositionProvider + ?Sized> PositionProvider for &P {
    fn world_position(&self, name: &str) -> Result<Pt3, GuideError> {
        (**self).world_position(name)
    }
}

/// Names of the three guides an eye rig is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideNames {
    pub center: String,
    pub radius: String,
    pub pupil: String,
}

impl GuideNames {
    pub fn new(
        center: impl Into<String>,
        radius: impl Into<String>,
        pupil: impl Into<String>,
    ) -> Self {
        Self {
            center: center.into(),
            radius: radius.into(),
            pupil: pupil.into(),
        }
    }
}

/// Fixed name → position table.
///
/// Serializes as a plain JSON object: `{"eye_center": [0, 0, 0], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticPositions {
    positions: BTreeMap<String, [Real; 3]>,
}

impl StaticPositions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, p: Pt3) {
        self.positions.insert(name.into(), [p.x, p.y, p.z]);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, name: impl Into<String>, p: Pt3) -> Self {
        self.insert(name, p);
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl PositionProvider for StaticPositions {
    fn world_position(&self, name: &str) -> Result<Pt3, GuideError> {
        let [x, y, z] = self
            .positions
            .get(name)
            .ok_or_else(|| GuideError::UnknownGuide(name.to_string()))?;
        Ok(Pt3::new(*x, *y, *z))
    }
}

/// Distances measured from the guides, shared by every joint of a build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuideSample {
    /// World position of the center guide; every joint is placed here.
    pub center: Pt3,
    /// Distance from center to the radius guide.
    pub radius: Real,
    /// Distance from center to the pupil guide.
    pub pupil_distance: Real,
}

impl GuideSample {
    pub fn from_points(center: Pt3, radius_ref: Pt3, pupil_ref: Pt3) -> Self {
        Self {
            center,
            radius: distance(&center, &radius_ref),
            pupil_distance: distance(&center, &pupil_ref),
        }
    }

    /// `pupil_distance / radius`; infinite or NaN when the radius is zero.
    pub fn pupil_ratio(&self) -> Real {
        self.pupil_distance / self.radius
    }

    /// Radius is finite and strictly positive.
    pub fn has_valid_radius(&self) -> bool {
        self.radius.is_finite() && self.radius > 0.0
    }
}

fn finite_position<P: PositionProvider + ?Sized>(
    provider: &P,
    name: &str,
) -> Result<Pt3, GuideError> {
    let p = provider.world_position(name)?;
    if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
        return Err(GuideError::NonFinite(name.to_string()));
    }
    Ok(p)
}

/// Query all three guides once and measure radius and pupil distance.
pub fn sample_guides<P: PositionProvider + ?Sized>(
    provider: &P,
    names: &GuideNames,
) -> Result<GuideSample, GuideError> {
    let center = finite_position(provider, &names.center)?;
    let radius_ref = finite_position(provider, &names.radius)?;
    let pupil_ref = finite_position(provider, &names.pupil)?;
    Ok(GuideSample::from_points(center, radius_ref, pupil_ref))
}
