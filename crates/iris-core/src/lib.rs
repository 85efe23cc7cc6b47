//! Core math for `iris-rig`.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Pt3`, `Quat`, ...) and the
//!   single-axis Euler to quaternion conversion,
//! - guide sampling behind an injected [`PositionProvider`],
//! - the per-joint parameter pipeline ([`JointSpec`], [`JointTransform`]),
//! - serde-backed rig configuration ([`RigConfig`]).
//!
//! Joint pipeline:
//! `cos → acos (deg) → default param → (s + p) * 180 → clamp → quat(x, w) → scale / translate`

/// Rig configuration and policies.
pub mod config;
/// Guide sampling and position providers.
pub mod guides;
/// Per-joint parameter derivation and live evaluation.
pub mod joint;
/// Linear algebra type aliases and helpers.
pub mod math;

pub use config::*;
pub use guides::*;
pub use joint::*;
pub use math::*;
