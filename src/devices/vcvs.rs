//! Voltage-controlled voltage source.
//!
//! Modeled as its Norton equivalent: a VCCS of transconductance `G / RO` in
//! parallel with RO across the output pair. Open-circuit output is exactly
//! `G * (V(IP) - V(IN))`; a load Rload sees the usual `Rload / (Rload + RO)`
//! divider.

use super::fourterm::{ControlledSource, ON1, OP1};
use crate::netlist::{NetId, NetSet};

/// Voltage-controlled voltage source with finite output resistance.
#[derive(Debug, Clone)]
pub struct Vcvs {
    pub core: ControlledSource,
    /// Output resistance RO
    pub ro: f64,
    op2: usize,
    on2: usize,
}

impl Vcvs {
    pub const DEFAULT_G: f64 = 1.0;
    pub const DEFAULT_RI: f64 = 1e9;
    pub const DEFAULT_RO: f64 = 1.0;

    /// Create a new VCVS.
    ///
    /// Adds the output resistor terminals `_OP2`/`_ON2`, late-bound through
    /// the auxiliary terminals onto the OP and ON nets.
    pub fn new(name: String, g: f64, ri: f64, ro: f64) -> Self {
        let mut core = ControlledSource::new(name, g, ri);
        let block = core.terminals_mut();
        let op2 = block.register("_OP2");
        let on2 = block.register("_ON2");
        block.pair(op2, on2);
        block.connect_late(op2, OP1);
        block.connect_late(on2, ON1);

        Self { core, ro, op2, on2 }
    }

    pub fn reset(&mut self) {
        let go = 1.0 / self.ro;
        self.core.set_gain_factor(go);
        self.core.reset();

        let block = self.core.terminals_mut();
        block.get_mut(self.op2).set(go);
        block.get_mut(self.on2).set(go);
    }

    pub fn update(&self, nets: &mut NetSet) -> Option<NetId> {
        self.core.update(nets)
    }

    pub fn update_param(&mut self, nets: &mut NetSet) {
        self.reset();
        self.update(nets);
    }

    /// Set a parameter. Returns false for unknown keys.
    pub fn set_param(&mut self, key: &str, value: f64) -> bool {
        if key.eq_ignore_ascii_case("RO") {
            self.ro = value;
            true
        } else {
            self.core.set_param(key, value)
        }
    }

    /// Read a parameter.
    pub fn param(&self, key: &str) -> Option<f64> {
        if key.eq_ignore_ascii_case("RO") {
            Some(self.ro)
        } else {
            self.core.param(key)
        }
    }
}
