//! Backend-independent description of the rig's computation graph.

mod graph;
mod types;

pub use graph::DependencyGraph;
pub use types::{Binding, JointAttr, Node, NodeId, NodeKind, Operand, OutPort, PortKind, PortRef};
