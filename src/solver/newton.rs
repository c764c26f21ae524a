//! Newton-Raphson iteration for dynamic devices.

use log::{trace, warn};

use super::mna::{stamp_netlist, MnaMatrix, RowMap};
use super::{DEFAULT_GMIN, DEFAULT_MAX_ITERATIONS, DEFAULT_RESIDUAL_TOLERANCE, DEFAULT_TOLERANCE};
use crate::error::{FourtermError, Result};
use crate::netlist::Netlist;

/// Newton-Raphson solver.
///
/// Each iteration lets dynamic devices relinearize from the latest voltages,
/// restamps the whole system and solves it. Converged once net voltages stop
/// moving and every companion model matches its device at the voltages it
/// was built from. Static netlists take a single pass.
#[derive(Debug, Clone)]
pub struct NewtonRaphson {
    /// Maximum iterations
    pub max_iterations: usize,
    /// Convergence tolerance on net voltages (volts)
    pub tolerance: f64,
    /// Convergence tolerance on companion residuals (fraction of the limit)
    pub residual_tolerance: f64,
    /// Conductance added to every free net's diagonal
    pub gmin: f64,
}

impl Default for NewtonRaphson {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonRaphson {
    /// Create a solver with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_MAX_ITERATIONS,
            DEFAULT_TOLERANCE,
            DEFAULT_RESIDUAL_TOLERANCE,
            DEFAULT_GMIN,
        )
    }

    /// Create a solver with explicit settings.
    pub fn with_config(
        max_iterations: usize,
        tolerance: f64,
        residual_tolerance: f64,
        gmin: f64,
    ) -> Self {
        Self {
            max_iterations,
            tolerance,
            residual_tolerance,
            gmin,
        }
    }

    /// Solve the netlist and write the voltages of every free net back.
    ///
    /// Returns the number of iterations used. On `ConvergenceFailure` the
    /// voltages and every device's damped state are left where the last
    /// iteration put them, so a later call continues from there.
    pub fn solve(
        &self,
        netlist: &mut Netlist,
        rows: &RowMap,
        matrix: &mut MnaMatrix,
    ) -> Result<usize> {
        if !netlist.has_dynamic() {
            self.solve_once(netlist, rows, matrix)?;
            return Ok(1);
        }

        let mut max_diff = f64::INFINITY;
        let mut residual = f64::INFINITY;
        for iter in 0..self.max_iterations {
            residual = netlist.update_terminals();
            max_diff = self.solve_once(netlist, rows, matrix)?;
            trace!(
                "iteration {}: max dv = {:e}, companion residual = {:e}",
                iter,
                max_diff,
                residual
            );

            if max_diff < self.tolerance && residual < self.residual_tolerance {
                return Ok(iter + 1);
            }
        }

        warn!(
            "no convergence after {} iterations (max dv = {:e}, companion residual = {:e})",
            self.max_iterations, max_diff, residual
        );
        Err(FourtermError::convergence_failure(
            self.max_iterations,
            max_diff.max(residual),
        ))
    }

    /// One assemble-factor-solve pass. Returns the largest voltage change.
    fn solve_once(
        &self,
        netlist: &mut Netlist,
        rows: &RowMap,
        matrix: &mut MnaMatrix,
    ) -> Result<f64> {
        matrix.clear();
        stamp_netlist(netlist, rows, self.gmin, matrix);
        matrix.factor()?;
        matrix.solve()?;

        let nets = netlist.nets_mut();
        let mut max_diff = 0.0f64;
        for (row, &net) in rows.free_nets().iter().enumerate() {
            let v = matrix.x[row];
            max_diff = max_diff.max((v - nets.voltage(net)).abs());
            nets.set_voltage(net, v);
        }
        Ok(max_diff)
    }
}
