use std::collections::{HashSet, VecDeque};

use anyhow::{Result, anyhow, bail, ensure};
use iris_core::Real;

use super::types::{Binding, JointAttr, Node, NodeId, NodeKind, Operand, PortRef};

/// Computation graph: nodes plus attribute bindings.
///
/// Nodes may reference any id; consistency (existing targets, port kinds,
/// acyclicity) is checked by [`validate`](Self::validate).
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    bindings: Vec<Binding>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its `NodeId`.
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            name: name.into(),
            kind,
        });
        id
    }

    /// Adds a control cell. `default` is its value before any write.
    pub fn add_control(
        &mut self,
        name: impl Into<String>,
        min: Real,
        max: Real,
        default: Real,
    ) -> NodeId {
        let name = name.into();
        self.add_node(
            name.clone(),
            NodeKind::Control {
                name,
                min,
                max,
                default,
            },
        )
    }

    pub fn add_add(
        &mut self,
        name: impl Into<String>,
        input1: impl Into<Operand>,
        input2: impl Into<Operand>,
    ) -> NodeId {
        self.add_node(
            name,
            NodeKind::Add {
                input1: input1.into(),
                input2: input2.into(),
            },
        )
    }

    pub fn add_multiply(
        &mut self,
        name: impl Into<String>,
        input1: impl Into<Operand>,
        input2: impl Into<Operand>,
    ) -> NodeId {
        self.add_node(
            name,
            NodeKind::Multiply {
                input1: input1.into(),
                input2: input2.into(),
            },
        )
    }

    pub fn add_clamp(
        &mut self,
        name: impl Into<String>,
        input: impl Into<Operand>,
        min: impl Into<Operand>,
        max: impl Into<Operand>,
    ) -> NodeId {
        self.add_node(
            name,
            NodeKind::Clamp {
                input: input.into(),
                min: min.into(),
                max: max.into(),
            },
        )
    }

    pub fn add_euler_to_quat(
        &mut self,
        name: impl Into<String>,
        rotate_x: impl Into<Operand>,
    ) -> NodeId {
        self.add_node(
            name,
            NodeKind::EulerToQuat {
                rotate_x: rotate_x.into(),
            },
        )
    }

    /// Drives attribute `attr` of joint slot `joint` from `source`.
    pub fn bind(&mut self, source: PortRef, joint: usize, attr: JointAttr) {
        self.bindings.push(Binding {
            source,
            joint,
            attr,
        });
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|n| n.name == name).map(|n| n.id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids of all control nodes.
    pub fn controls(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.kind.is_control())
            .map(|n| n.id)
    }

    fn check_link(&self, owner: &str, link: PortRef) -> Result<()> {
        let target = self
            .node(link.node)
            .ok_or_else(|| anyhow!("{owner} references missing node {}", link.node))?;
        let have = target.kind.output_kind();
        let want = link.port.source_kind();
        ensure!(
            have == want,
            "{owner} reads port {:?} from {} node `{}` ({:?} output)",
            link.port,
            target.kind.type_name(),
            target.name,
            have
        );
        Ok(())
    }

    /// Validates ids, link targets, port kinds, literal ranges and acyclicity.
    pub fn validate(&self) -> Result<()> {
        for (idx, node) in self.nodes.iter().enumerate() {
            ensure!(
                node.id.0 == idx,
                "node id mismatch: expected {}, got {}",
                idx,
                node.id
            );
            for link in node.kind.links() {
                self.check_link(&format!("node `{}`", node.name), link)?;
            }
            match &node.kind {
                NodeKind::Control {
                    name,
                    min,
                    max,
                    default,
                } => {
                    ensure!(!name.is_empty(), "control {} has an empty name", node.id);
                    ensure!(
                        min <= max,
                        "control `{}` range min {} > max {}",
                        name,
                        min,
                        max
                    );
                    ensure!(
                        (*min..=*max).contains(default),
                        "control `{}` default {} outside [{}, {}]",
                        name,
                        default,
                        min,
                        max
                    );
                }
                NodeKind::Clamp {
                    min: Operand::Const(lo),
                    max: Operand::Const(hi),
                    ..
                } => {
                    ensure!(
                        lo <= hi,
                        "clamp `{}` min {} > max {}",
                        node.name,
                        lo,
                        hi
                    );
                }
                _ => {}
            }
        }

        for (b_idx, binding) in self.bindings.iter().enumerate() {
            self.check_link(&format!("binding {b_idx}"), binding.source)?;
        }

        let mut seen = HashSet::new();
        for binding in &self.bindings {
            ensure!(
                seen.insert((binding.joint, binding.attr)),
                "joint slot {} attribute {} is driven more than once",
                binding.joint,
                binding.attr.short_name()
            );
        }

        self.topo_order()?;
        Ok(())
    }

    /// Direct dependents of every node (`result[n]` = nodes reading from `n`).
    pub fn dependents(&self) -> Vec<Vec<NodeId>> {
        let mut out = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            for link in node.kind.links() {
                if let Some(list) = out.get_mut(link.node.0) {
                    if !list.contains(&node.id) {
                        list.push(node.id);
                    }
                }
            }
        }
        out
    }

    /// Kahn topological order; fails on cycles.
    pub fn topo_order(&self) -> Result<Vec<NodeId>> {
        let dependents = self.dependents();
        let mut indegree = vec![0usize; self.nodes.len()];
        for list in &dependents {
            for dst in list {
                indegree[dst.0] += 1;
            }
        }

        let mut queue: VecDeque<NodeId> = indegree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(idx, _)| NodeId(idx))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for next in &dependents[id.0] {
                indegree[next.0] -= 1;
                if indegree[next.0] == 0 {
                    queue.push_back(*next);
                }
            }
        }
        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = indegree
                .iter()
                .enumerate()
                .filter(|&(_, &deg)| deg > 0)
                .map(|(idx, _)| self.nodes[idx].name.as_str())
                .collect();
            bail!("cycle detected through nodes {:?}", stuck);
        }
        Ok(order)
    }

    /// Every node reachable downstream of `id`, excluding `id` itself.
    pub fn downstream(&self, id: NodeId) -> Vec<NodeId> {
        let dependents = self.dependents();
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = dependents.get(id.0).cloned().unwrap_or_default();
        let mut out = Vec::new();
        while let Some(n) = stack.pop() {
            if std::mem::replace(&mut visited[n.0], true) {
                continue;
            }
            out.push(n);
            stack.extend(dependents[n.0].iter().copied());
        }
        out.sort();
        out
    }
}
