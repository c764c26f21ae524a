//! Two-terminal resistor, used for loads and bias networks.

use crate::netlist::{NetId, NetSet, TerminalBlock};

const P: usize = 0;
const N: usize = 1;

/// A resistor between terminals P and N.
#[derive(Debug, Clone)]
pub struct Resistor {
    pub name: String,
    /// Resistance R
    pub r: f64,
    terminals: TerminalBlock,
}

impl Resistor {
    /// 1 / gmin
    pub const DEFAULT_R: f64 = 1e9;

    /// Create a new resistor.
    pub fn new(name: String, r: f64) -> Self {
        let mut terminals = TerminalBlock::new();
        terminals.register("P");
        terminals.register("N");
        terminals.pair(P, N);
        Self { name, r, terminals }
    }

    pub fn terminals(&self) -> &TerminalBlock {
        &self.terminals
    }

    pub fn terminals_mut(&mut self) -> &mut TerminalBlock {
        &mut self.terminals
    }

    /// Get the conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.r
    }

    pub fn reset(&mut self) {
        let g = self.conductance();
        self.terminals.get_mut(P).set(g);
        self.terminals.get_mut(N).set(g);
    }

    pub fn update(&self, nets: &mut NetSet) -> Option<NetId> {
        self.terminals.schedule_first_free(&[P, N], nets)
    }

    pub fn update_param(&mut self, nets: &mut NetSet) {
        self.reset();
        self.update(nets);
    }

    /// Set a parameter. Returns false for unknown keys.
    pub fn set_param(&mut self, key: &str, value: f64) -> bool {
        if key.eq_ignore_ascii_case("R") {
            self.r = value;
            true
        } else {
            false
        }
    }

    /// Read a parameter.
    pub fn param(&self, key: &str) -> Option<f64> {
        key.eq_ignore_ascii_case("R").then_some(self.r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistor_conductance() {
        let mut r = Resistor::new("R1".to_string(), 1000.0);
        r.reset();
        assert!((r.conductance() - 0.001).abs() < 1e-10);
        assert_eq!(r.terminals().get(P).stamp().go, 0.001);
        assert_eq!(r.terminals().get(N).stamp().gt, 0.001);
        assert_eq!(r.terminals().get(P).other(), Some(N));
    }

    #[test]
    fn test_resistor_update_skips_ground() {
        let mut nets = NetSet::new();
        let out = nets.add("out");
        let mut r = Resistor::new("R1".to_string(), 1000.0);
        r.terminals_mut().attach(P, NetId::GROUND);
        r.terminals_mut().attach(N, out);
        assert_eq!(r.update(&mut nets), Some(out));
    }
}
