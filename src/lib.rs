//! A planar-mechanism kinematics engine.
//!
//! Given a symbolic description of a linkage (joints, links and driving
//! inputs), this crate computes the Cartesian coordinates of every joint for
//! a commanded input configuration, two ways:
//!
//! + [`t_config`] compiles the mechanism into a straight-line stack of
//!   closed-form geometric constructions, replayed cheaply by [`Mechanism`]
//!   for repeated evaluation.
//! + [`SolverSystem`] lowers the mechanism into geometric constraints over a
//!   pooled parameter space and drives a quasi-Newton minimizer, covering
//!   topologies the compiler cannot reach.
#![warn(missing_docs)]
pub use crate::error::Error;
pub use crate::expr::{EStack, Expr, Sym};
pub use crate::mechanism::Mechanism;
pub use crate::point::{pla, plap, pllp, plpp, pxy, Coord};
pub use crate::solver::{DataEntry, DataKey, Precision, SolvedPoint, SolverSystem};
pub use crate::triangulate::{t_config, t_config_status};
pub use crate::vlink::VLink;
pub use crate::vpoint::{JointType, VPoint};

mod error;
mod expr;
mod mechanism;
mod point;
mod solver;
mod triangulate;
#[cfg(test)]
mod tests;
mod vlink;
mod vpoint;
