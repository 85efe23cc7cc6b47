use anyhow::{Context, Result, anyhow, ensure};
use iris_core::{
    AngleLimits, DOUBLED_ANGLE_GAIN, EvaluationPolicy, GuideNames, GuideSample, JointSpec, JointTransform,
    PositionProvider, Pt3, Real, RigConfig, Vec3, derive_joint_specs, sample_guides,
};
use iris_graph::{DependencyGraph, Evaluator, JointAttr, NodeId};
use log::debug;
use serde::{Deserialize, Serialize};

pub const ROOT_JOINT_NAME: &str = "eye_root";

pub fn child_joint_name(index: usize) -> String {
    format!("eye_joint_{index:02}")
}

/// Joint slot in an [`EyeRig`]; `0` is the root, child `i` is `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JointId(pub usize);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub id: JointId,
    pub name: String,
    pub parent: Option<JointId>,
    /// Local translation; the root carries the center guide position.
    pub translate: Vec3,
    pub scale: Vec3,
}

impl Joint {
    fn new(id: JointId, name: String, parent: Option<JointId>, translate: Vec3) -> Self {
        Self {
            id,
            name,
            parent,
            translate,
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn set_attr(&mut self, attr: JointAttr, value: Real) {
        match attr {
            JointAttr::ScaleX => self.scale.x = value,
            JointAttr::ScaleY => self.scale.y = value,
            JointAttr::ScaleZ => self.scale.z = value,
            JointAttr::TranslateX => self.translate.x = value,
            JointAttr::TranslateY => self.translate.y = value,
            JointAttr::TranslateZ => self.translate.z = value,
        }
    }
}

/// Nodes making up one child joint's subgraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointNodes {
    pub joint: JointId,
    pub default_param_add: NodeId,
    pub doubled_angle_mult: NodeId,
    pub angle_clamp: NodeId,
    pub euler_to_quat: NodeId,
    pub position_mult: NodeId,
}

/// Wire `control → add → multiply → clamp → euler_to_quat → {sx, sy, tz}` for one joint.
pub fn wire_joint(
    graph: &mut DependencyGraph,
    control: NodeId,
    spec: &JointSpec,
    limits: &AngleLimits,
    joint: JointId,
    prefix: &str,
) -> JointNodes {
    let default_param_add = graph.add_add(
        format!("{prefix}_default_param_add"),
        control.value(),
        spec.default_param,
    );
    let doubled_angle_mult = graph.add_multiply(
        format!("{prefix}_doubled_angle_mult"),
        default_param_add.value(),
        DOUBLED_ANGLE_GAIN,
    );
    let angle_clamp = graph.add_clamp(
        format!("{prefix}_angle_clamp"),
        doubled_angle_mult.value(),
        limits.min_deg,
        limits.max_deg,
    );
    let euler_to_quat =
        graph.add_euler_to_quat(format!("{prefix}_euler_to_quat"), angle_clamp.value());
    let position_mult = graph.add_multiply(
        format!("{prefix}_position_mult"),
        euler_to_quat.quat_w(),
        spec.radius,
    );

    graph.bind(euler_to_quat.quat_x(), joint.0, JointAttr::ScaleX);
    graph.bind(euler_to_quat.quat_x(), joint.0, JointAttr::ScaleY);
    graph.bind(position_mult.value(), joint.0, JointAttr::TranslateZ);

    JointNodes {
        joint,
        default_param_add,
        doubled_angle_mult,
        angle_clamp,
        euler_to_quat,
        position_mult,
    }
}

/// A built eye rig: root joint, child joints and the graph driving them.
///
/// Joint attributes reflect the graph after [`refresh`](Self::refresh); under
/// the eager policy every control write refreshes them.
#[derive(Debug, Clone)]
pub struct EyeRig {
    config: RigConfig,
    guides: GuideNames,
    sample: GuideSample,
    specs: Vec<JointSpec>,
    joints: Vec<Joint>,
    subgraphs: Vec<JointNodes>,
    control: NodeId,
    evaluator: Evaluator,
}

/// Build an eye rig from three guides and a joint count.
///
/// Guides are queried once. The rig is only returned when every joint was
/// derived and wired successfully.
pub fn build_eye_rig<P: PositionProvider + ?Sized>(
    provider: &P,
    guides: &GuideNames,
    joint_count: usize,
    config: &RigConfig,
) -> Result<EyeRig> {
    config.validate().context("invalid rig config")?;
    let sample = sample_guides(provider, guides).context("failed to sample guides")?;
    debug!(
        "guides sampled: radius {:.6} pupil distance {:.6}",
        sample.radius, sample.pupil_distance
    );
    let specs = derive_joint_specs(&sample, joint_count, config.cosine_domain)
        .context("failed to derive joint parameters")?;

    let mut graph = DependencyGraph::new();
    let ctl = &config.control;
    let control = graph.add_control(&ctl.name, ctl.min, ctl.max, ctl.default);

    let root = JointId(0);
    let mut joints = vec![Joint::new(
        root,
        ROOT_JOINT_NAME.to_string(),
        None,
        sample.center.coords,
    )];
    let mut subgraphs = Vec::with_capacity(specs.len());
    for spec in &specs {
        let id = JointId(spec.index + 1);
        let name = child_joint_name(spec.index);
        subgraphs.push(wire_joint(
            &mut graph,
            control,
            spec,
            &config.angle_limits,
            id,
            &name,
        ));
        joints.push(Joint::new(id, name, Some(root), Vec3::zeros()));
    }

    let evaluator = Evaluator::new(graph, config.evaluation)?;
    debug!(
        "eye rig built: {} joints, {} nodes",
        joints.len(),
        evaluator.graph().len()
    );

    let mut rig = EyeRig {
        config: config.clone(),
        guides: guides.clone(),
        sample,
        specs,
        joints,
        subgraphs,
        control,
        evaluator,
    };
    rig.refresh()?;
    Ok(rig)
}

impl EyeRig {
    pub fn config(&self) -> &RigConfig {
        &self.config
    }

    pub fn guides(&self) -> &GuideNames {
        &self.guides
    }

    pub fn sample(&self) -> &GuideSample {
        &self.sample
    }

    pub fn specs(&self) -> &[JointSpec] {
        &self.specs
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn root(&self) -> &Joint {
        &self.joints[0]
    }

    pub fn children(&self) -> &[Joint] {
        &self.joints[1..]
    }

    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.0)
    }

    pub fn joint_by_name(&self, name: &str) -> Option<&Joint> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// World position of a joint (parents carry translation only).
    pub fn world_position(&self, id: JointId) -> Option<Pt3> {
        let mut joint = self.joint(id)?;
        let mut p = joint.translate;
        while let Some(parent) = joint.parent {
            joint = self.joint(parent)?;
            p += joint.translate;
        }
        Some(Pt3::from(p))
    }

    pub fn graph(&self) -> &DependencyGraph {
        self.evaluator.graph()
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn subgraphs(&self) -> &[JointNodes] {
        &self.subgraphs
    }

    pub fn control_node(&self) -> NodeId {
        self.control
    }

    pub fn control_name(&self) -> &str {
        &self.config.control.name
    }

    pub fn iris_scale(&self) -> Result<Real> {
        self.evaluator.control(self.control)
    }

    /// Write the control, limited to its range; returns the stored value.
    pub fn set_iris_scale(&mut self, value: Real) -> Result<Real> {
        let stored = self.evaluator.set_control(self.control, value)?;
        if self.evaluator.policy() == EvaluationPolicy::Eager {
            self.refresh()?;
        }
        Ok(stored)
    }

    /// Evaluate pending nodes and copy bound outputs onto the joints.
    pub fn refresh(&mut self) -> Result<()> {
        for (binding, value) in self.evaluator.binding_values()? {
            let joint = self
                .joints
                .get_mut(binding.joint)
                .ok_or_else(|| anyhow!("binding targets missing joint slot {}", binding.joint))?;
            joint.set_attr(binding.attr, value);
        }
        Ok(())
    }

    /// Current transforms of the child joints, read from the graph.
    pub fn joint_transforms(&mut self) -> Result<Vec<JointTransform>> {
        self.refresh()?;
        self.subgraphs
            .iter()
            .zip(&self.specs)
            .map(|(nodes, spec)| {
                let joint = self
                    .joint(nodes.joint)
                    .ok_or_else(|| anyhow!("subgraph drives missing joint {:?}", nodes.joint))?;
                Ok(JointTransform {
                    index: spec.index,
                    clamped_angle_deg: self.evaluator.peek(nodes.angle_clamp.value())?,
                    quat_x: self.evaluator.peek(nodes.euler_to_quat.quat_x())?,
                    quat_w: self.evaluator.peek(nodes.euler_to_quat.quat_w())?,
                    scale_x: joint.scale.x,
                    scale_y: joint.scale.y,
                    translate_z: joint.translate.z,
                })
            })
            .collect()
    }

    /// Transforms for `iris_scale` computed directly from the joint specs,
    /// without touching the graph. Limits and NaN handling match
    /// [`set_iris_scale`](Self::set_iris_scale).
    pub fn evaluate(&self, iris_scale: Real) -> Result<Vec<JointTransform>> {
        ensure!(
            !iris_scale.is_nan(),
            "control `{}` cannot be set to NaN",
            self.control_name()
        );
        let s = self.config.control.limit(iris_scale);
        Ok(self
            .specs
            .iter()
            .map(|spec| spec.evaluate_with(s, &self.config.angle_limits))
            .collect())
    }

    /// Evaluate `samples` evenly spaced control values across the control range.
    pub fn sweep(&self, samples: usize) -> Result<Vec<(Real, Vec<JointTransform>)>> {
        let (min, max) = (self.config.control.min, self.config.control.max);
        (0..samples)
            .map(|k| {
                let s = if samples > 1 {
                    min + (max - min) * k as Real / (samples - 1) as Real
                } else {
                    min
                };
                Ok((s, self.evaluate(s)?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iris_core::{CosineDomainPolicy, JointError, StaticPositions};

    fn guides(pupil: Real) -> StaticPositions {
        StaticPositions::new()
            .with("eye", Pt3::new(0.0, 0.0, 0.0))
            .with("iris", Pt3::new(1.0, 0.0, 0.0))
            .with("pupil", Pt3::new(pupil, 0.0, 0.0))
    }

    fn names() -> GuideNames {
        GuideNames::new("eye", "iris", "pupil")
    }

    fn approx_eq(a: Real, b: Real, tol: Real) {
        assert!((a - b).abs() < tol, "{a} != {b} (tol {tol})");
    }

    #[test]
    fn builds_root_and_children() {
        let rig = build_eye_rig(&guides(0.5), &names(), 4, &RigConfig::default()).unwrap();
        assert_eq!(rig.joints().len(), 5);
        assert_eq!(rig.root().name, ROOT_JOINT_NAME);
        assert_eq!(rig.root().parent, None);
        for (i, child) in rig.children().iter().enumerate() {
            assert_eq!(child.name, child_joint_name(i));
            assert_eq!(child.parent, Some(JointId(0)));
        }
        // one control + five nodes per joint
        assert_eq!(rig.graph().len(), 1 + 5 * 4);
        assert_eq!(rig.graph().bindings().len(), 3 * 4);
        assert_eq!(rig.control_name(), "irisScale");
    }

    #[test]
    fn node_names_follow_joint_names() {
        let rig = build_eye_rig(&guides(0.5), &names(), 2, &RigConfig::default()).unwrap();
        let nodes = rig.subgraphs()[1];
        assert_eq!(
            rig.graph().node_by_name("eye_joint_01_angle_clamp"),
            Some(nodes.angle_clamp)
        );
        assert_eq!(
            rig.graph().node_by_name("eye_joint_01_position_mult"),
            Some(nodes.position_mult)
        );
    }

    #[test]
    fn control_write_moves_every_joint() {
        let mut rig = build_eye_rig(&guides(0.5), &names(), 4, &RigConfig::default()).unwrap();
        let before: Vec<Joint> = rig.children().to_vec();
        rig.set_iris_scale(-0.2).unwrap();
        for (old, new) in before.iter().zip(rig.children()) {
            assert_ne!(old.scale.x, new.scale.x, "{}", new.name);
            assert_eq!(new.scale.x, new.scale.y);
            assert_eq!(new.scale.z, 1.0);
        }
    }

    #[test]
    fn graph_matches_direct_evaluation() {
        let mut rig = build_eye_rig(&guides(0.3), &names(), 6, &RigConfig::default()).unwrap();
        for k in 0..=10 {
            let s = -1.0 + 0.2 * k as Real;
            rig.set_iris_scale(s).unwrap();
            let from_graph = rig.joint_transforms().unwrap();
            let direct = rig.evaluate(s).unwrap();
            assert_eq!(from_graph.len(), direct.len());
            for (g, d) in from_graph.iter().zip(&direct) {
                approx_eq(g.clamped_angle_deg, d.clamped_angle_deg, 1e-9);
                approx_eq(g.scale_x, d.scale_x, 1e-12);
                approx_eq(g.scale_y, d.scale_y, 1e-12);
                approx_eq(g.translate_z, d.translate_z, 1e-12);
            }
        }
    }

    #[test]
    fn lazy_rig_refreshes_on_read() {
        let cfg = RigConfig {
            evaluation: EvaluationPolicy::Lazy,
            ..RigConfig::default()
        };
        let mut rig = build_eye_rig(&guides(1.0), &names(), 2, &cfg).unwrap();
        let edge = JointId(2);
        approx_eq(rig.joint(edge).unwrap().translate.z, 1.0, 1e-12);
        rig.set_iris_scale(1.0).unwrap();
        // not yet refreshed
        approx_eq(rig.joint(edge).unwrap().translate.z, 1.0, 1e-12);
        let t = rig.joint_transforms().unwrap();
        approx_eq(t[1].translate_z, 0.0, 1e-12);
        approx_eq(rig.joint(edge).unwrap().translate.z, 0.0, 1e-12);
        approx_eq(rig.joint(edge).unwrap().scale.x, 1.0, 1e-12);
    }

    #[test]
    fn children_sit_on_center_guide() {
        let p = StaticPositions::new()
            .with("eye", Pt3::new(2.0, 3.0, 4.0))
            .with("iris", Pt3::new(2.0, 3.0, 6.0))
            .with("pupil", Pt3::new(2.0, 3.0, 5.0));
        let mut rig = build_eye_rig(&p, &names(), 3, &RigConfig::default()).unwrap();
        rig.set_iris_scale(1.0).unwrap();
        assert_eq!(
            rig.world_position(JointId(0)).unwrap(),
            Pt3::new(2.0, 3.0, 4.0)
        );
        // joint 0 has default param 1: clamped to 190 deg, tz = cos(95 deg) * 2
        let world = rig.world_position(JointId(1)).unwrap();
        approx_eq(world.x, 2.0, 1e-12);
        approx_eq(world.z, 4.0 + 95f64.to_radians().cos() * 2.0, 1e-12);
    }

    #[test]
    fn out_of_range_write_is_limited() {
        let mut rig = build_eye_rig(&guides(0.5), &names(), 3, &RigConfig::default()).unwrap();
        assert_eq!(rig.set_iris_scale(3.0).unwrap(), 1.0);
        assert_eq!(rig.iris_scale().unwrap(), 1.0);
        let t = rig.joint_transforms().unwrap();
        let direct = rig.evaluate(3.0).unwrap();
        approx_eq(t[2].scale_x, direct[2].scale_x, 1e-12);
    }

    #[test]
    fn sweep_covers_control_range() {
        let rig = build_eye_rig(&guides(0.5), &names(), 3, &RigConfig::default()).unwrap();
        let sweep = rig.sweep(5).unwrap();
        let values: Vec<Real> = sweep.iter().map(|(s, _)| *s).collect();
        assert_eq!(values, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert!(sweep.iter().all(|(_, t)| t.len() == 3));
        assert!(rig.sweep(0).unwrap().is_empty());
        assert_eq!(rig.sweep(1).unwrap()[0].0, -1.0);
    }

    #[test]
    fn degenerate_inputs_fail_without_a_rig() {
        let err = build_eye_rig(&guides(0.5), &names(), 0, &RigConfig::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<JointError>(),
            Some(&JointError::InvalidJointCount(0))
        );

        let err = build_eye_rig(&guides(1.5), &names(), 3, &RigConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JointError>(),
            Some(JointError::CosineOutOfDomain { index: 2, .. })
        ));

        let clamp = RigConfig {
            cosine_domain: CosineDomainPolicy::Clamp,
            ..RigConfig::default()
        };
        assert!(build_eye_rig(&guides(1.5), &names(), 3, &clamp).is_ok());

        let bad_names = GuideNames::new("eye", "iris", "nope");
        let err = build_eye_rig(&guides(0.5), &bad_names, 3, &RigConfig::default()).unwrap_err();
        assert!(format!("{err:#}").contains("nope"));

        let c = Pt3::new(0.0, 0.0, 0.0);
        let coincident = StaticPositions::new()
            .with("eye", c)
            .with("iris", c)
            .with("pupil", Pt3::new(0.5, 0.0, 0.0));
        let err = build_eye_rig(&coincident, &names(), 3, &RigConfig::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<JointError>(),
            Some(&JointError::DegenerateRadius(0.0))
        );
    }

    #[test]
    fn single_joint_rig_sits_on_pupil_ratio() {
        let mut rig = build_eye_rig(&guides(0.5), &names(), 1, &RigConfig::default()).unwrap();
        assert_eq!(rig.joints().len(), 2);
        assert_eq!(rig.graph().len(), 1 + 5);
        let spec = rig.specs()[0];
        assert!(spec.is_pupil_edge());
        approx_eq(spec.cos_param, 0.5, 1e-12);
        approx_eq(spec.angle_deg, 60.0, 1e-9);

        // (0 + 2/3) * 180 = 120 deg
        let t = rig.joint_transforms().unwrap();
        approx_eq(t[0].clamped_angle_deg, 120.0, 1e-9);
        approx_eq(t[0].translate_z, 0.5, 1e-9);
        rig.set_iris_scale(-1.0).unwrap();
        approx_eq(rig.children()[0].translate.z, 1.0, 1e-12);
    }

    #[test]
    fn direct_evaluation_rejects_nan_like_the_graph() {
        let mut rig = build_eye_rig(&guides(0.5), &names(), 3, &RigConfig::default()).unwrap();
        assert!(rig.evaluate(f64::NAN).is_err());
        assert!(rig.set_iris_scale(f64::NAN).is_err());
        assert_eq!(rig.iris_scale().unwrap(), 0.0);
    }

    #[test]
    fn report_fails_instead_of_defaulting_missing_joints() {
        let mut rig = build_eye_rig(&guides(0.5), &names(), 3, &RigConfig::default()).unwrap();
        rig.joints.truncate(2);
        let err = rig.report().unwrap_err().to_string();
        assert!(err.contains("missing joint"), "{err}");
    }
}
