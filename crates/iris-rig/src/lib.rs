//! Eye joint rig builder.
//!
//! [`build_eye_rig`] samples three guides once, derives one [`JointSpec`] per
//! joint and wires a small node chain per joint into a shared
//! [`DependencyGraph`], all driven by the root joint's `irisScale` control:
//!
//! ```no_run
//! use iris_core::{GuideNames, Pt3, RigConfig, StaticPositions};
//! use iris_rig::build_eye_rig;
//!
//! # fn main() -> anyhow::Result<()> {
//! let guides = StaticPositions::new()
//!     .with("eye", Pt3::new(0.0, 0.0, 0.0))
//!     .with("iris", Pt3::new(1.0, 0.0, 0.0))
//!     .with("pupil", Pt3::new(0.5, 0.0, 0.0));
//! let names = GuideNames::new("eye", "iris", "pupil");
//!
//! let mut rig = build_eye_rig(&guides, &names, 8, &RigConfig::default())?;
//! rig.set_iris_scale(0.25)?;
//! for t in rig.joint_transforms()? {
//!     println!("{}: sx={:.3} tz={:.3}", t.index, t.scale_x, t.translate_z);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`JointSpec`]: iris_core::JointSpec
//! [`DependencyGraph`]: iris_graph::DependencyGraph

pub mod report;
pub mod rig;

pub use report::{JointReport, RigInput, RigReport, run_eye_rig};
pub use rig::{
    EyeRig, Joint, JointId, JointNodes, ROOT_JOINT_NAME, build_eye_rig, child_joint_name,
    wire_joint,
};
