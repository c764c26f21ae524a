//! Nodal solver and step scheduler.
//!
//! The solver assembles a system Ax = z with one row per free (non-rail)
//! net, straight from the terminal stamps:
//!
//! ```text
//! row(n):  Σ gt * V(n) - Σ go * V(opposite) = Σ idr
//! ```
//!
//! Rails are known voltages and move to the right-hand side. There are no
//! branch-current unknowns: voltage sources appear as Norton equivalents
//! (the VCVS output resistance RO).
//!
//! [`Simulator`] decides *when* to solve: only after some device has marked
//! a net dirty.

mod mna;
mod newton;
mod simulator;

pub use mna::{stamp_netlist, MnaMatrix, RowMap};
pub use newton::NewtonRaphson;
pub use simulator::{Simulator, SimulatorConfig};

/// Default convergence tolerance on net voltages, in volts.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Default convergence tolerance on companion residuals, as a fraction of
/// each device's current limit.
pub const DEFAULT_RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Default maximum Newton-Raphson iterations per solve.
pub const DEFAULT_MAX_ITERATIONS: usize = 200;

/// Default minimum conductance to prevent a singular matrix.
pub const DEFAULT_GMIN: f64 = 1e-12;
