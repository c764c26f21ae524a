//! Shared core of the controlled-source family.
//!
//! Every controlled source is a floating four-terminal element: a
//! differential input pair (IP, IN) and a differential output pair (OP, ON).
//! The solver only understands two-terminal couplings, so the output is
//! decomposed with two internal terminals OP1 and ON1, late-bound onto the
//! OP and ON nets:
//!
//! ```text
//!   OP  --(go = +g, opposite IP)--   injects +g*V(IP) into net(OP)
//!   OP1 --(go = -g, opposite IN)--   injects -g*V(IN) into net(OP)
//!   ON  --(go = -g, opposite IP)--   injects -g*V(IP) into net(ON)
//!   ON1 --(go = +g, opposite IN)--   injects +g*V(IN) into net(ON)
//! ```
//!
//! Net effect: a current `g * (V(IP) - V(IN))` pushed out of OP and drawn
//! into ON, with no conductance to the output nets themselves. The input pair
//! forms a plain resistor RI.

use log::debug;

use crate::netlist::{NetId, NetSet, TerminalBlock};

/// Non-inverting input slot.
pub const IP: usize = 0;
/// Inverting input slot.
pub const IN: usize = 1;
/// Positive output slot.
pub const OP: usize = 2;
/// Negative output slot.
pub const ON: usize = 3;
/// Internal auxiliary terminal late-bound to OP's net.
pub const OP1: usize = 4;
/// Internal auxiliary terminal late-bound to ON's net.
pub const ON1: usize = 5;

/// Priority order for the re-solve check.
const UPDATE_ORDER: [usize; 4] = [IP, IN, OP, ON];

/// State and stamping logic shared by VCCS, LVCCS, CCCS and VCVS.
#[derive(Debug, Clone)]
pub struct ControlledSource {
    pub name: String,
    /// Gain G
    pub g: f64,
    /// Input resistance RI
    pub ri: f64,
    /// Variant-specific multiplier on G (1/RO for VCVS, 1/RI for CCCS)
    gain_factor: f64,
    terminals: TerminalBlock,
}

impl ControlledSource {
    /// Register the six terminals, wire opposite pairs, and declare the late
    /// connections of the output decomposition.
    pub fn new(name: String, g: f64, ri: f64) -> Self {
        let mut terminals = TerminalBlock::new();
        terminals.register("IP");
        terminals.register("IN");
        terminals.register("OP");
        terminals.register("ON");
        terminals.register("_OP1");
        terminals.register("_ON1");

        // An unconnected input pair should really be dropped before solving;
        // it is kept as a self-referencing resistor instead.
        terminals.pair(IP, IN);

        terminals.point(OP, IP);
        terminals.point(OP1, IN);
        terminals.point(ON, IP);
        terminals.point(ON1, IN);

        terminals.connect_late(OP, OP1);
        terminals.connect_late(ON, ON1);

        Self {
            name,
            g,
            ri,
            gain_factor: 1.0,
            terminals,
        }
    }

    /// Terminal block.
    pub fn terminals(&self) -> &TerminalBlock {
        &self.terminals
    }

    /// Terminal block, mutable.
    pub fn terminals_mut(&mut self) -> &mut TerminalBlock {
        &mut self.terminals
    }

    /// Current gain factor.
    pub fn gain_factor(&self) -> f64 {
        self.gain_factor
    }

    /// Override the gain factor; takes effect at the next reset.
    pub fn set_gain_factor(&mut self, gain_factor: f64) {
        self.gain_factor = gain_factor;
    }

    /// Working gain multiplier `G * gain_factor`.
    pub fn mult(&self) -> f64 {
        self.g * self.gain_factor
    }

    /// Differential input voltage `V(IP) - V(IN)`.
    pub fn input_voltage(&self, nets: &NetSet) -> f64 {
        self.terminals.get(IP).voltage(nets) - self.terminals.get(IN).voltage(nets)
    }

    /// Recompute stamps from parameters.
    ///
    /// No validation: RI = 0 yields an infinite input conductance.
    pub fn reset(&mut self) {
        let mult = self.mult();
        let gi = 1.0 / self.ri;

        self.terminals.get_mut(IP).set(gi);
        self.terminals.get_mut(IN).set(gi);

        self.stamp_output(mult, 0.0);

        debug!("{}: reset mult={:e} gi={:e}", self.name, mult, gi);
    }

    /// Stamp the output decomposition with transconductance `g` and an
    /// injected current `i` (zero for the linear variants).
    pub fn stamp_output(&mut self, g: f64, i: f64) {
        self.terminals.get_mut(OP).set_go_gt_i(g, 0.0, i);
        self.terminals.get_mut(OP1).set_go_gt(-g, 0.0);

        self.terminals.get_mut(ON).set_go_gt_i(-g, 0.0, -i);
        self.terminals.get_mut(ON1).set_go_gt(g, 0.0);
    }

    /// Request a re-solve on the first non-rail net among IP, IN, OP, ON.
    pub fn update(&self, nets: &mut NetSet) -> Option<NetId> {
        self.terminals.schedule_first_free(&UPDATE_ORDER, nets)
    }

    /// Apply changed parameters: restamp, then request a solve.
    pub fn update_param(&mut self, nets: &mut NetSet) {
        self.reset();
        self.update(nets);
    }

    /// Set a parameter shared by every controlled source.
    /// Returns false if the key is not G or RI.
    pub fn set_param(&mut self, key: &str, value: f64) -> bool {
        if key.eq_ignore_ascii_case("G") {
            self.g = value;
        } else if key.eq_ignore_ascii_case("RI") {
            self.ri = value;
        } else {
            return false;
        }
        true
    }

    /// Read a shared parameter.
    pub fn param(&self, key: &str) -> Option<f64> {
        if key.eq_ignore_ascii_case("G") {
            Some(self.g)
        } else if key.eq_ignore_ascii_case("RI") {
            Some(self.ri)
        } else {
            None
        }
    }

    /// Warn about the tolerated input-pair weakness after finalize.
    pub(crate) fn check_topology(&self) {
        self.terminals.warn_if_shorted(&self.name, IP, IN);
    }
}
