//! Linear controlled current sources: VCCS and CCCS.

use super::fourterm::ControlledSource;
use crate::netlist::{NetId, NetSet};

/// Voltage-controlled current source.
///
/// Output current `G * (V(IP) - V(IN))` from OP to ON, with input resistance
/// RI across the input pair.
#[derive(Debug, Clone)]
pub struct Vccs {
    pub core: ControlledSource,
}

impl Vccs {
    pub const DEFAULT_G: f64 = 1.0;
    /// 1 / gmin
    pub const DEFAULT_RI: f64 = 1e9;

    /// Create a new VCCS.
    pub fn new(name: String, g: f64, ri: f64) -> Self {
        Self {
            core: ControlledSource::new(name, g, ri),
        }
    }

    pub fn reset(&mut self) {
        self.core.reset();
    }

    pub fn update(&self, nets: &mut NetSet) -> Option<NetId> {
        self.core.update(nets)
    }

    pub fn update_param(&mut self, nets: &mut NetSet) {
        self.core.update_param(nets);
    }
}

/// Current-controlled current source.
///
/// The input pair is a sense resistor RI; the sensed current
/// `(V(IP) - V(IN)) / RI` is amplified by the current gain G.
#[derive(Debug, Clone)]
pub struct Cccs {
    pub core: ControlledSource,
}

impl Cccs {
    pub const DEFAULT_G: f64 = 1.0;
    pub const DEFAULT_RI: f64 = 1.0;

    /// Create a new CCCS.
    pub fn new(name: String, g: f64, ri: f64) -> Self {
        Self {
            core: ControlledSource::new(name, g, ri),
        }
    }

    pub fn reset(&mut self) {
        self.core.set_gain_factor(1.0 / self.core.ri);
        self.core.reset();
    }

    pub fn update(&self, nets: &mut NetSet) -> Option<NetId> {
        self.core.update(nets)
    }

    pub fn update_param(&mut self, nets: &mut NetSet) {
        self.reset();
        self.update(nets);
    }
}
