//! Serializable rig input and report types.

use anyhow::{Result, anyhow};
use iris_core::{
    GuideNames, GuideSample, JointSpec, JointTransform, Pt3, Real, RigConfig, StaticPositions,
};
use serde::{Deserialize, Serialize};

use crate::rig::{EyeRig, JointId, build_eye_rig};

/// Everything needed to build a rig without a live host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigInput {
    pub guides: GuideNames,
    /// World positions by guide name.
    pub positions: StaticPositions,
    pub joint_count: usize,
    /// Control value to report at; the control default when omitted.
    #[serde(default)]
    pub iris_scale: Option<Real>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointReport {
    pub name: String,
    pub parent: String,
    pub spec: JointSpec,
    pub transform: JointTransform,
    pub world_position: Pt3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigReport {
    pub guides: GuideNames,
    pub sample: GuideSample,
    pub root: String,
    pub control: String,
    pub iris_scale: Real,
    pub joints: Vec<JointReport>,
    pub node_count: usize,
    pub binding_count: usize,
}

impl EyeRig {
    /// Snapshot of the rig at its current control value.
    pub fn report(&mut self) -> Result<RigReport> {
        let transforms = self.joint_transforms()?;
        let root = self.root().name.clone();
        let mut joints = Vec::with_capacity(transforms.len());
        for (spec, transform) in self.specs().iter().zip(transforms) {
            let id = JointId(spec.index + 1);
            let name = self
                .joint(id)
                .map(|j| j.name.clone())
                .ok_or_else(|| anyhow!("report references missing joint {:?}", id))?;
            let world_position = self
                .world_position(id)
                .ok_or_else(|| anyhow!("no world position for missing joint {:?}", id))?;
            joints.push(JointReport {
                name,
                parent: root.clone(),
                spec: *spec,
                transform,
                world_position,
            });
        }
        Ok(RigReport {
            guides: self.guides().clone(),
            sample: *self.sample(),
            root,
            control: self.control_name().to_string(),
            iris_scale: self.iris_scale()?,
            joints,
            node_count: self.graph().len(),
            binding_count: self.graph().bindings().len(),
        })
    }
}

/// Build a rig from `input`, apply its control value and report.
pub fn run_eye_rig(input: &RigInput, config: &RigConfig) -> Result<RigReport> {
    let mut rig = build_eye_rig(&input.positions, &input.guides, input.joint_count, config)?;
    if let Some(s) = input.iris_scale {
        rig.set_iris_scale(s)?;
    }
    rig.report()
}
