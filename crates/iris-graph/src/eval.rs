//! Push-based evaluation of a validated [`DependencyGraph`].
//!
//! Control nodes are mutable cells. Writing a control marks every node
//! downstream of it dirty; with [`EvaluationPolicy::Eager`] the dirty nodes are
//! recomputed immediately, with [`EvaluationPolicy::Lazy`] on the next read.
//! Nodes are always recomputed in topological order, so a node only ever sees
//! up-to-date inputs.

use anyhow::{Context, Result, anyhow, bail, ensure};
use iris_core::{EvaluationPolicy, Quat, Real, clamp_range, euler_x_to_quat};
use log::{debug, warn};

use crate::ir::{Binding, DependencyGraph, NodeId, NodeKind, Operand, OutPort, PortRef};

/// Current output of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeValue {
    Scalar(Real),
    Quat(Quat),
}

impl NodeValue {
    /// Read one output port.
    pub fn port(&self, port: OutPort) -> Option<Real> {
        match (self, port) {
            (NodeValue::Scalar(v), OutPort::Value) => Some(*v),
            (NodeValue::Quat(q), OutPort::QuatX) => Some(q.coords[0]),
            (NodeValue::Quat(q), OutPort::QuatY) => Some(q.coords[1]),
            (NodeValue::Quat(q), OutPort::QuatZ) => Some(q.coords[2]),
            (NodeValue::Quat(q), OutPort::QuatW) => Some(q.coords[3]),
            _ => None,
        }
    }
}

/// Evaluator owning a graph, its control cells and cached node values.
#[derive(Debug, Clone)]
pub struct Evaluator {
    graph: DependencyGraph,
    order: Vec<NodeId>,
    dependents: Vec<Vec<NodeId>>,
    values: Vec<NodeValue>,
    dirty: Vec<bool>,
    policy: EvaluationPolicy,
    recomputed: usize,
}

impl Evaluator {
    /// Validate `graph` and evaluate every node once from the control defaults.
    pub fn new(graph: DependencyGraph, policy: EvaluationPolicy) -> Result<Self> {
        graph.validate().context("invalid dependency graph")?;
        let order = graph.topo_order()?;
        let dependents = graph.dependents();
        let values = graph
            .nodes()
            .iter()
            .map(|node| match &node.kind {
                NodeKind::Control { default, .. } => NodeValue::Scalar(*default),
                NodeKind::EulerToQuat { .. } => NodeValue::Quat(Quat::identity()),
                _ => NodeValue::Scalar(0.0),
            })
            .collect();
        let dirty = graph.nodes().iter().map(|n| !n.kind.is_control()).collect();
        let mut eval = Self {
            graph,
            order,
            dependents,
            values,
            dirty,
            policy,
            recomputed: 0,
        };
        eval.flush()?;
        Ok(eval)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn policy(&self) -> EvaluationPolicy {
        self.policy
    }

    /// Nodes that read directly from `id`.
    pub fn dependents(&self, id: NodeId) -> &[NodeId] {
        self.dependents.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total node recomputations since construction.
    pub fn recomputed(&self) -> usize {
        self.recomputed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.iter().any(|&d| d)
    }

    fn control_range(&self, id: NodeId) -> Result<(&str, Real, Real)> {
        match self.graph.node(id).map(|n| &n.kind) {
            Some(NodeKind::Control { name, min, max, .. }) => Ok((name.as_str(), *min, *max)),
            Some(other) => bail!("{id} is a {} node, not a control", other.type_name()),
            None => bail!("no node {id}"),
        }
    }

    /// Current value of control `id`.
    pub fn control(&self, id: NodeId) -> Result<Real> {
        self.control_range(id)?;
        self.peek(id.value())
    }

    /// Write control `id`, limited to its range. Returns the stored value.
    pub fn set_control(&mut self, id: NodeId, value: Real) -> Result<Real> {
        let (name, min, max) = self.control_range(id)?;
        ensure!(!value.is_nan(), "control `{name}` cannot be set to NaN");
        let limited = clamp_range(value, min, max);
        if limited != value {
            warn!("control `{name}`: {value} limited to [{min}, {max}]");
        }
        if self.values[id.0] == NodeValue::Scalar(limited) {
            return Ok(limited);
        }
        self.values[id.0] = NodeValue::Scalar(limited);
        self.mark_downstream(id);
        if self.policy == EvaluationPolicy::Eager {
            self.flush()?;
        }
        Ok(limited)
    }

    fn mark_downstream(&mut self, id: NodeId) {
        let mut stack: Vec<NodeId> = self.dependents(id).to_vec();
        while let Some(n) = stack.pop() {
            if !std::mem::replace(&mut self.dirty[n.0], true) {
                stack.extend(self.dependents[n.0].iter().copied());
            }
        }
    }

    fn operand(&self, op: &Operand) -> Result<Real> {
        match op {
            Operand::Const(v) => Ok(*v),
            Operand::Link(port) => self.peek(*port),
        }
    }

    fn compute(&self, kind: &NodeKind) -> Result<NodeValue> {
        let value = match kind {
            NodeKind::Control { .. } => bail!("control nodes are not computed"),
            NodeKind::Add { input1, input2 } => {
                NodeValue::Scalar(self.operand(input1)? + self.operand(input2)?)
            }
            NodeKind::Multiply { input1, input2 } => {
                NodeValue::Scalar(self.operand(input1)? * self.operand(input2)?)
            }
            NodeKind::Clamp { input, min, max } => NodeValue::Scalar(clamp_range(
                self.operand(input)?,
                self.operand(min)?,
                self.operand(max)?,
            )),
            NodeKind::EulerToQuat { rotate_x } => {
                NodeValue::Quat(euler_x_to_quat(self.operand(rotate_x)?))
            }
        };
        Ok(value)
    }

    /// Recompute all dirty nodes in topological order. Returns how many ran.
    pub fn flush(&mut self) -> Result<usize> {
        let mut count = 0;
        for idx in 0..self.order.len() {
            let id = self.order[idx];
            if !self.dirty[id.0] {
                continue;
            }
            let value = self.compute(&self.graph.nodes()[id.0].kind)?;
            self.values[id.0] = value;
            self.dirty[id.0] = false;
            count += 1;
        }
        if count > 0 {
            debug!("recomputed {count} of {} nodes", self.order.len());
        }
        self.recomputed += count;
        Ok(count)
    }

    /// Cached value of `port`, possibly stale under the lazy policy.
    pub fn peek(&self, port: PortRef) -> Result<Real> {
        let value = self
            .values
            .get(port.node.0)
            .ok_or_else(|| anyhow!("no node {}", port.node))?;
        value
            .port(port.port)
            .ok_or_else(|| anyhow!("{} has no {:?} output", port.node, port.port))
    }

    /// Up-to-date value of `port`.
    pub fn read(&mut self, port: PortRef) -> Result<Real> {
        if self.is_dirty() {
            self.flush()?;
        }
        self.peek(port)
    }

    /// Up-to-date values of every attribute binding, in binding order.
    pub fn binding_values(&mut self) -> Result<Vec<(Binding, Real)>> {
        self.flush()?;
        self.graph
            .bindings()
            .iter()
            .map(|b| Ok((*b, self.peek(b.source)?)))
            .collect()
    }
}
