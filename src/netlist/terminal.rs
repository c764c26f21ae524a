//! Device terminals and their stamps.
//!
//! A terminal is a device's connection point to a net. Each terminal carries
//! one stamp that the solver folds into its net's row:
//!
//! ```text
//! row(net):  gt * V(net) - go * V(opposite net) = idr
//! ```
//!
//! Two terminals that name each other as opposites and carry `set(G)` form a
//! resistor of conductance G. Pointing terminals at a *different* device's
//! terminals lets a four-terminal element be expressed as a set of two-terminal
//! couplings.

use log::warn;

use super::net::NetSet;
use super::types::NetId;
use crate::error::{FourtermError, Result};

/// Conductance/current contribution of one terminal.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Stamp {
    /// Coupling conductance to the opposite terminal's net
    pub go: f64,
    /// Conductance to this terminal's own net (diagonal)
    pub gt: f64,
    /// Current injected into this terminal's net
    pub idr: f64,
}

/// A connection point owned by a device.
#[derive(Debug, Clone)]
pub struct Terminal {
    name: &'static str,
    net: Option<NetId>,
    /// Slot of the opposite terminal within the same device
    other: Option<usize>,
    /// Slot of the terminal this one was late-bound to
    partner: Option<usize>,
    stamp: Stamp,
}

impl Terminal {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            net: None,
            other: None,
            partner: None,
            stamp: Stamp::default(),
        }
    }

    /// Terminal name as registered by the device.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The net this terminal sits on, once connected.
    pub fn net(&self) -> Option<NetId> {
        self.net
    }

    /// Slot of the opposite terminal used to form a two-terminal stamp.
    pub fn other(&self) -> Option<usize> {
        self.other
    }

    /// Slot of the late-bound partner, set only by finalize.
    pub fn partner(&self) -> Option<usize> {
        self.partner
    }

    /// Current stamp.
    pub fn stamp(&self) -> Stamp {
        self.stamp
    }

    /// Stamp a plain conductance: `go = gt = g`, no current.
    pub fn set(&mut self, g: f64) {
        self.stamp = Stamp { go: g, gt: g, idr: 0.0 };
    }

    /// Stamp separate coupling and diagonal conductances, no current.
    pub fn set_go_gt(&mut self, go: f64, gt: f64) {
        self.stamp = Stamp { go, gt, idr: 0.0 };
    }

    /// Stamp conductances plus an injected current (Norton companion).
    pub fn set_go_gt_i(&mut self, go: f64, gt: f64, idr: f64) {
        self.stamp = Stamp { go, gt, idr };
    }

    /// Voltage of the attached net, 0 V when unattached.
    pub fn voltage(&self, nets: &NetSet) -> f64 {
        self.net.map(|n| nets.voltage(n)).unwrap_or(0.0)
    }

    /// Mark this terminal's net dirty for the next solve.
    pub fn schedule_solve(&self, nets: &mut NetSet) -> bool {
        match self.net {
            Some(net) => nets.schedule_solve(net),
            None => false,
        }
    }
}

/// The terminals of one device, plus its pending late connections.
///
/// Construction registers terminals and opposite-terminal pairs. Late
/// connections are only recorded; [`crate::netlist::NetlistBuilder::finalize`]
/// binds them once every net exists.
#[derive(Debug, Clone, Default)]
pub struct TerminalBlock {
    terminals: Vec<Terminal>,
    late: Vec<(usize, usize)>,
    finalized: bool,
}

impl TerminalBlock {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a terminal and return its slot.
    pub fn register(&mut self, name: &'static str) -> usize {
        self.terminals.push(Terminal::new(name));
        self.terminals.len() - 1
    }

    /// Make two terminals each other's opposite.
    pub fn pair(&mut self, a: usize, b: usize) {
        self.terminals[a].other = Some(b);
        self.terminals[b].other = Some(a);
    }

    /// Point one terminal at an opposite without reciprocating.
    pub fn point(&mut self, from: usize, to: usize) {
        self.terminals[from].other = Some(to);
    }

    /// Declare a late connection, bound at finalize.
    pub fn connect_late(&mut self, a: usize, b: usize) {
        self.late.push((a, b));
    }

    /// Pending late connections in declaration order.
    pub fn late_connections(&self) -> &[(usize, usize)] {
        &self.late
    }

    /// Whether finalize has bound the late connections.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Get a terminal by slot.
    pub fn get(&self, slot: usize) -> &Terminal {
        &self.terminals[slot]
    }

    /// Get a terminal mutably by slot.
    pub fn get_mut(&mut self, slot: usize) -> &mut Terminal {
        &mut self.terminals[slot]
    }

    /// Find a terminal slot by name (case-insensitive).
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.terminals
            .iter()
            .position(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Number of terminals.
    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    /// Whether the block has no terminals.
    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    /// Iterate over terminals in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Terminal> {
        self.terminals.iter()
    }

    /// Request a re-solve on the first terminal in `order` whose net is not a
    /// rail. Returns the net that was marked.
    ///
    /// Rail nets never need recomputation, so they are skipped; if every
    /// listed terminal sits on a rail nothing is scheduled.
    pub fn schedule_first_free(&self, order: &[usize], nets: &mut NetSet) -> Option<NetId> {
        let net = order
            .iter()
            .filter_map(|&slot| self.terminals[slot].net)
            .find(|&net| !nets.is_rail(net))?;
        nets.schedule_solve(net);
        Some(net)
    }

    pub(crate) fn attach(&mut self, slot: usize, net: NetId) {
        self.terminals[slot].net = Some(net);
    }

    pub(crate) fn detach_all(&mut self) -> Vec<(usize, NetId)> {
        self.terminals
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, t)| t.net.take().map(|net| (slot, net)))
            .collect()
    }

    /// Resolve late connections to `(slot, net)` attachments.
    ///
    /// A late connection puts the unattached end on the attached end's net and
    /// records the two as partners. Connections are resolved in declaration
    /// order, so a chain like `OP ~ OP1` then `OP2 ~ OP1` lands all three on
    /// one net. A second call fails.
    pub(crate) fn bind_late(&mut self, device: &str) -> Result<Vec<(usize, NetId)>> {
        if self.finalized {
            return Err(FourtermError::AlreadyFinalized {
                device: device.to_string(),
            });
        }

        let mut attached = Vec::new();
        for i in 0..self.late.len() {
            let (a, b) = self.late[i];
            let net_a = self.terminals[a].net;
            let net_b = self.terminals[b].net;
            let (slot, net) = match (net_a, net_b) {
                (Some(net), None) => (b, net),
                (None, Some(net)) => (a, net),
                (Some(x), Some(y)) if x == y => {
                    self.bind_partners(a, b);
                    continue;
                }
                (Some(_), Some(_)) => {
                    return Err(FourtermError::ConflictingLateConnection {
                        device: device.to_string(),
                        from: self.terminals[a].name.to_string(),
                        to: self.terminals[b].name.to_string(),
                    });
                }
                (None, None) => {
                    return Err(FourtermError::UnresolvedLateConnection {
                        device: device.to_string(),
                        from: self.terminals[a].name.to_string(),
                        to: self.terminals[b].name.to_string(),
                    });
                }
            };
            self.terminals[slot].net = Some(net);
            self.bind_partners(a, b);
            attached.push((slot, net));
        }

        if let Some(t) = self.terminals.iter().find(|t| t.net.is_none()) {
            return Err(FourtermError::UnconnectedTerminal {
                device: device.to_string(),
                terminal: t.name.to_string(),
            });
        }

        self.finalized = true;
        Ok(attached)
    }

    // A terminal keeps its first partner; chained connections only fill the
    // empty end.
    fn bind_partners(&mut self, a: usize, b: usize) {
        if self.terminals[a].partner.is_none() {
            self.terminals[a].partner = Some(b);
        }
        if self.terminals[b].partner.is_none() {
            self.terminals[b].partner = Some(a);
        }
    }

    /// Warn when two terminals that should see different nets share one.
    pub(crate) fn warn_if_shorted(&self, device: &str, a: usize, b: usize) {
        let (ta, tb) = (&self.terminals[a], &self.terminals[b]);
        if ta.net.is_some() && ta.net == tb.net {
            warn!(
                "device '{}': terminals {} and {} share one net; stamped anyway",
                device, ta.name, tb.name
            );
        }
    }
}
