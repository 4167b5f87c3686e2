//! Numerical constraint solving over a pooled parameter space.
//!
//! The builder lowers a mechanism into three append-only scalar pools and a
//! list of geometric constraints holding stable indices into those pools,
//! then a quasi-Newton minimizer drives the free pool to a fixed point.
pub use self::driver::Precision;
pub use self::system::{DataEntry, DataKey, SolvedPoint, SolverSystem};

mod constraint;
mod driver;
mod system;
