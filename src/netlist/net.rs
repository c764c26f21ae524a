//! Nets and the net arena.
//!
//! A [`Net`] is a node of the analog graph. It records which terminals sit on
//! it, whether its potential is fixed (a rail), the last converged voltage,
//! and whether a re-solve has been requested for it.

use std::collections::HashMap;

use log::trace;

use super::types::{NetId, TerminalRef};
use crate::error::{FourtermError, Result};

/// A node in the analog netlist.
#[derive(Debug, Clone)]
pub struct Net {
    /// Net name as written in the netlist
    pub name: String,
    /// Fixed-potential net (supply, ground, digital-driven input)
    rail: bool,
    /// Last converged voltage (solver-written for free nets, host-written for rails)
    voltage: f64,
    /// Terminals attached to this net
    terminals: Vec<TerminalRef>,
    /// A device requested a re-solve involving this net
    dirty: bool,
}

impl Net {
    fn new(name: String, rail: bool, voltage: f64) -> Self {
        Self {
            name,
            rail,
            voltage,
            terminals: Vec::new(),
            dirty: false,
        }
    }

    /// Whether this net's voltage is fixed externally.
    pub fn is_rail(&self) -> bool {
        self.rail
    }

    /// Last converged voltage.
    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    /// Terminals attached to this net.
    pub fn terminals(&self) -> &[TerminalRef] {
        &self.terminals
    }

    /// Whether a re-solve has been requested.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Whether a net name refers to the ground rail: `0` or `GND` in any case.
pub fn is_ground_name(name: &str) -> bool {
    name == "0" || name.eq_ignore_ascii_case("GND")
}

/// Arena of all nets in a netlist, indexed by [`NetId`].
#[derive(Debug, Clone)]
pub struct NetSet {
    nets: Vec<Net>,
    by_name: HashMap<String, NetId>,
}

impl Default for NetSet {
    fn default() -> Self {
        Self::new()
    }
}

impl NetSet {
    /// Create a net set containing only the ground rail.
    pub fn new() -> Self {
        Self {
            nets: vec![Net::new("0".to_string(), true, 0.0)],
            by_name: HashMap::new(),
        }
    }

    /// Get or create a free (solver-driven) net.
    pub fn add(&mut self, name: &str) -> NetId {
        if let Some(id) = self.find(name) {
            return id;
        }
        let id = NetId(self.nets.len());
        self.nets.push(Net::new(name.to_string(), false, 0.0));
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Create a rail net at a fixed voltage.
    ///
    /// Fails if the name is already taken, including by the ground aliases.
    pub fn add_rail(&mut self, name: &str, voltage: f64) -> Result<NetId> {
        if self.find(name).is_some() {
            return Err(FourtermError::DuplicateNet {
                name: name.to_string(),
            });
        }
        let id = NetId(self.nets.len());
        self.nets.push(Net::new(name.to_string(), true, voltage));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Find a net by name.
    pub fn find(&self, name: &str) -> Option<NetId> {
        if is_ground_name(name) {
            return Some(NetId::GROUND);
        }
        self.by_name.get(name).copied()
    }

    /// Get a net by id.
    pub fn get(&self, id: NetId) -> &Net {
        &self.nets[id.0]
    }

    /// Number of nets, ground included.
    pub fn len(&self) -> usize {
        self.nets.len()
    }

    /// Always false: the ground rail exists from construction.
    pub fn is_empty(&self) -> bool {
        self.nets.is_empty()
    }

    /// Iterate over all nets with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.nets.iter().enumerate().map(|(i, n)| (NetId(i), n))
    }

    /// Whether a net's voltage is fixed.
    pub fn is_rail(&self, id: NetId) -> bool {
        self.nets[id.0].rail
    }

    /// Last converged voltage of a net.
    pub fn voltage(&self, id: NetId) -> f64 {
        self.nets[id.0].voltage
    }

    /// Write a converged voltage. Only the solver calls this.
    pub(crate) fn set_voltage(&mut self, id: NetId, voltage: f64) {
        self.nets[id.0].voltage = voltage;
    }

    /// Drive a rail to a new voltage. Returns false if the net is not a rail.
    pub fn set_rail_voltage(&mut self, id: NetId, voltage: f64) -> bool {
        let net = &mut self.nets[id.0];
        if !net.rail {
            return false;
        }
        net.voltage = voltage;
        true
    }

    /// Mark a net dirty for the next solve.
    ///
    /// Returns true if the net was not already marked.
    pub fn schedule_solve(&mut self, id: NetId) -> bool {
        let net = &mut self.nets[id.0];
        let fresh = !net.dirty;
        net.dirty = true;
        if fresh {
            trace!("solve scheduled for net '{}'", net.name);
        }
        fresh
    }

    /// Whether any net awaits a solve.
    pub fn has_dirty(&self) -> bool {
        self.nets.iter().any(|n| n.dirty)
    }

    /// Number of nets awaiting a solve.
    pub fn dirty_count(&self) -> usize {
        self.nets.iter().filter(|n| n.dirty).count()
    }

    /// Clear every dirty flag after a solve.
    pub fn clear_dirty(&mut self) {
        for net in &mut self.nets {
            net.dirty = false;
        }
    }

    pub(crate) fn attach(&mut self, id: NetId, terminal: TerminalRef) {
        let terminals = &mut self.nets[id.0].terminals;
        if !terminals.contains(&terminal) {
            terminals.push(terminal);
        }
    }

    pub(crate) fn detach(&mut self, id: NetId, terminal: TerminalRef) {
        self.nets[id.0].terminals.retain(|t| *t != terminal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::DeviceId;

    #[test]
    fn test_ground_is_rail() {
        let nets = NetSet::new();
        assert_eq!(nets.find("GND"), Some(NetId::GROUND));
        assert_eq!(nets.find("0"), Some(NetId::GROUND));
        assert_eq!(nets.find("gnd"), Some(NetId::GROUND));
        assert!(nets.is_rail(NetId::GROUND));
        assert_eq!(nets.voltage(NetId::GROUND), 0.0);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut nets = NetSet::new();
        let a = nets.add("out");
        let b = nets.add("out");
        assert_eq!(a, b);
        assert!(!nets.is_rail(a));
        assert!(nets.add_rail("out", 1.0).is_err());
        assert!(nets.add_rail("GND", 1.0).is_err());
    }

    #[test]
    fn test_schedule_solve_is_a_flag() {
        let mut nets = NetSet::new();
        let out = nets.add("out");
        assert!(nets.schedule_solve(out));
        assert!(!nets.schedule_solve(out));
        assert_eq!(nets.dirty_count(), 1);
        nets.clear_dirty();
        assert!(!nets.has_dirty());
    }

    #[test]
    fn test_rail_voltage_only_on_rails() {
        let mut nets = NetSet::new();
        let vcc = nets.add_rail("VCC", 5.0).unwrap();
        let out = nets.add("out");
        assert!(nets.set_rail_voltage(vcc, 3.3));
        assert_eq!(nets.voltage(vcc), 3.3);
        assert!(!nets.set_rail_voltage(out, 1.0));
    }

    #[test]
    fn test_attach_detach() {
        let mut nets = NetSet::new();
        let out = nets.add("out");
        let t = TerminalRef {
            device: DeviceId(0),
            slot: 2,
        };
        nets.attach(out, t);
        nets.attach(out, t);
        assert_eq!(nets.get(out).terminals(), &[t]);
        nets.detach(out, t);
        assert!(nets.get(out).terminals().is_empty());
    }
}
