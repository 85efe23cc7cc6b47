//! Typed dataflow graph for `iris-rig`.
//!
//! The graph is an explicit DAG of small arithmetic nodes (control, add,
//! multiply, clamp, euler-to-quaternion) whose output ports are bound to joint
//! attributes. [`ir`] holds the inspectable description; [`eval`] compiles it
//! into an [`Evaluator`] that owns the control cells, tracks dirty nodes and
//! recomputes them in topological order.

pub mod eval;
pub mod ir;

pub use eval::{Evaluator, NodeValue};
pub use ir::{
    Binding, DependencyGraph, JointAttr, Node, NodeId, NodeKind, Operand, OutPort, PortKind,
    PortRef,
};
