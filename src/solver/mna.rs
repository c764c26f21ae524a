//! MNA matrix assembly and solving.

use crate::error::{FourtermError, Result};
use crate::netlist::{NetId, Netlist};

/// Dense nodal system Ax = z over the free nets.
#[derive(Debug)]
pub struct MnaMatrix {
    /// System matrix A (row-major)
    pub a: Vec<f64>,
    /// Source vector z
    pub z: Vec<f64>,
    /// Solution vector x
    pub x: Vec<f64>,
    /// Matrix dimension
    pub size: usize,
    /// LU decomposition of A
    pub lu: Vec<f64>,
    /// Pivot indices for LU decomposition
    pub pivots: Vec<usize>,
}

impl MnaMatrix {
    /// Create a zeroed system of the given dimension.
    pub fn new(size: usize) -> Self {
        Self {
            a: vec![0.0; size * size],
            z: vec![0.0; size],
            x: vec![0.0; size],
            size,
            lu: vec![0.0; size * size],
            pivots: vec![0; size],
        }
    }

    /// Clear the matrix and source vector to zero.
    pub fn clear(&mut self) {
        self.a.fill(0.0);
        self.z.fill(0.0);
    }

    /// Get matrix element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.a[row * self.size + col]
    }

    /// Add to matrix element at (row, col).
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        self.a[row * self.size + col] += value;
    }

    /// Add to source vector element.
    pub fn add_source(&mut self, row: usize, value: f64) {
        self.z[row] += value;
    }

    /// Perform LU decomposition with partial pivoting.
    pub fn factor(&mut self) -> Result<()> {
        let n = self.size;
        self.lu.copy_from_slice(&self.a);

        for i in 0..n {
            self.pivots[i] = i;
        }

        for k in 0..n {
            // Find pivot
            let mut max_val = self.lu[k * n + k].abs();
            let mut max_row = k;

            for i in (k + 1)..n {
                let val = self.lu[i * n + k].abs();
                if val > max_val {
                    max_val = val;
                    max_row = i;
                }
            }

            if max_val.is_nan() || max_val < 1e-15 {
                return Err(FourtermError::SingularMatrix);
            }

            if max_row != k {
                self.pivots.swap(k, max_row);
                for j in 0..n {
                    self.lu.swap(k * n + j, max_row * n + j);
                }
            }

            // Eliminate
            let pivot = self.lu[k * n + k];
            for i in (k + 1)..n {
                let factor = self.lu[i * n + k] / pivot;
                self.lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    self.lu[i * n + j] -= factor * self.lu[k * n + j];
                }
            }
        }

        Ok(())
    }

    /// Solve the system using the pre-computed LU decomposition.
    pub fn solve(&mut self) -> Result<()> {
        let n = self.size;

        // Apply pivot permutation to z
        for i in 0..n {
            self.x[i] = self.z[self.pivots[i]];
        }

        // Forward substitution (L * y = Pb)
        for i in 0..n {
            for j in 0..i {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
        }

        // Back substitution (U * x = y)
        for i in (0..n).rev() {
            for j in (i + 1)..n {
                self.x[i] -= self.lu[i * n + j] * self.x[j];
            }
            self.x[i] /= self.lu[i * n + i];
        }

        if self.x.iter().any(|v| !v.is_finite()) {
            return Err(FourtermError::SingularMatrix);
        }

        Ok(())
    }
}

/// Matrix row of each net; rails have none.
#[derive(Debug, Clone, Default)]
pub struct RowMap {
    rows: Vec<Option<usize>>,
    free: Vec<NetId>,
}

impl RowMap {
    /// Assign one row per free net, in net order.
    pub fn new(netlist: &Netlist) -> Self {
        let nets = netlist.nets();
        let mut rows = Vec::with_capacity(nets.len());
        let mut free = Vec::new();
        for (id, net) in nets.iter() {
            if net.is_rail() {
                rows.push(None);
            } else {
                rows.push(Some(free.len()));
                free.push(id);
            }
        }
        Self { rows, free }
    }

    /// Row of a net, `None` for rails.
    pub fn row(&self, net: NetId) -> Option<usize> {
        self.rows.get(net.0).copied().flatten()
    }

    /// Free nets in row order.
    pub fn free_nets(&self) -> &[NetId] {
        &self.free
    }

    /// System dimension.
    pub fn size(&self) -> usize {
        self.free.len()
    }
}

/// Stamp every terminal of every device into the system.
///
/// A terminal on net n contributes to row(n):
///   A[n,n]   += gt
///   A[n,m]   -= go      (m = net of the opposite terminal)
///   z[n]     += idr
/// When m is a rail its voltage is known, so `go * V(m)` moves to z instead.
/// Terminals on rails contribute nothing. Every row also gets `gmin` on the
/// diagonal so a net held only by couplings stays solvable.
pub fn stamp_netlist(netlist: &Netlist, rows: &RowMap, gmin: f64, matrix: &mut MnaMatrix) {
    let nets = netlist.nets();

    for i in 0..rows.size() {
        matrix.add(i, i, gmin);
    }

    for (_, device) in netlist.devices() {
        let block = device.terminals();
        for terminal in block.iter() {
            let Some(row) = terminal.net().and_then(|n| rows.row(n)) else {
                continue;
            };
            let stamp = terminal.stamp();

            matrix.add(row, row, stamp.gt);
            matrix.add_source(row, stamp.idr);

            let opposite = terminal.other().and_then(|slot| block.get(slot).net());
            if let Some(m) = opposite {
                match rows.row(m) {
                    Some(col) => matrix.add(row, col, -stamp.go),
                    None => matrix.add_source(row, stamp.go * nets.voltage(m)),
                }
            }
        }
    }
}
