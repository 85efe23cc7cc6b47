use iris_core::Real;
use serde::{Deserialize, Serialize};

/// Identifier for a node in a [`DependencyGraph`](super::DependencyGraph).
///
/// Stable within one graph; equals the node's insertion index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn value(self) -> PortRef {
        PortRef::new(self, OutPort::Value)
    }

    pub fn quat_x(self) -> PortRef {
        PortRef::new(self, OutPort::QuatX)
    }

    pub fn quat_w(self) -> PortRef {
        PortRef::new(self, OutPort::QuatW)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Value type carried by a node's outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortKind {
    Scalar,
    Quaternion,
}

/// Named output ports.
///
/// Scalar nodes expose only `Value`; quaternion nodes expose the four components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutPort {
    Value,
    QuatX,
    QuatY,
    QuatZ,
    QuatW,
}

impl OutPort {
    /// Kind of node this port can be read from.
    pub fn source_kind(self) -> PortKind {
        match self {
            OutPort::Value => PortKind::Scalar,
            OutPort::QuatX | OutPort::QuatY | OutPort::QuatZ | OutPort::QuatW => {
                PortKind::Quaternion
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRef {
    pub node: NodeId,
    pub port: OutPort,
}

impl PortRef {
    pub fn new(node: NodeId, port: OutPort) -> Self {
        Self { node, port }
    }
}

/// Scalar input slot: either a literal set at build time or a link to another
/// node's output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Const(Real),
    Link(PortRef),
}

impl From<Real> for Operand {
    fn from(v: Real) -> Self {
        Operand::Const(v)
    }
}

impl From<PortRef> for Operand {
    fn from(p: PortRef) -> Self {
        Operand::Link(p)
    }
}

impl Operand {
    pub fn link(&self) -> Option<PortRef> {
        match self {
            Operand::Link(p) => Some(*p),
            Operand::Const(_) => None,
        }
    }
}

/// Node kinds and their input slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Externally driven scalar cell with attribute limits.
    Control {
        name: String,
        min: Real,
        max: Real,
        default: Real,
    },
    /// `input1 + input2`.
    Add { input1: Operand, input2: Operand },
    /// `input1 * input2`.
    Multiply { input1: Operand, input2: Operand },
    /// `input` limited to `[min, max]`.
    Clamp {
        input: Operand,
        min: Operand,
        max: Operand,
    },
    /// Rotation of `rotate_x` degrees about X, as a quaternion.
    EulerToQuat { rotate_x: Operand },
}

impl NodeKind {
    pub fn output_kind(&self) -> PortKind {
        match self {
            NodeKind::EulerToQuat { .. } => PortKind::Quaternion,
            _ => PortKind::Scalar,
        }
    }

    /// Input slots in declaration order.
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            NodeKind::Control { .. } => Vec::new(),
            NodeKind::Add { input1, input2 } | NodeKind::Multiply { input1, input2 } => {
                vec![*input1, *input2]
            }
            NodeKind::Clamp { input, min, max } => vec![*input, *min, *max],
            NodeKind::EulerToQuat { rotate_x } => vec![*rotate_x],
        }
    }

    /// Upstream node links.
    pub fn links(&self) -> impl Iterator<Item = PortRef> {
        self.operands().into_iter().filter_map(|op| op.link())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Control { .. } => "control",
            NodeKind::Add { .. } => "add",
            NodeKind::Multiply { .. } => "multiply",
            NodeKind::Clamp { .. } => "clamp",
            NodeKind::EulerToQuat { .. } => "euler_to_quat",
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self, NodeKind::Control { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
}

/// Transform attribute a port can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JointAttr {
    ScaleX,
    ScaleY,
    ScaleZ,
    TranslateX,
    TranslateY,
    TranslateZ,
}

impl JointAttr {
    pub fn short_name(self) -> &'static str {
        match self {
            JointAttr::ScaleX => "sx",
            JointAttr::ScaleY => "sy",
            JointAttr::ScaleZ => "sz",
            JointAttr::TranslateX => "tx",
            JointAttr::TranslateY => "ty",
            JointAttr::TranslateZ => "tz",
        }
    }
}

/// Connection from a node output to attribute `attr` of joint slot `joint`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub source: PortRef,
    pub joint: usize,
    pub attr: JointAttr,
}
