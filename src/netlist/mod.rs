//! Netlist topology: nets, terminals, and their construction.
//!
//! This module provides the graph the devices plug into. A [`Net`] is shared
//! by the terminals attached to it; a [`Terminal`] belongs to exactly one
//! device and sits on at most one net. [`NetlistBuilder`] assembles the graph
//! and [`Netlist`] is the finalized result handed to the solver.

mod graph;
mod net;
mod terminal;
mod types;
mod validate;

pub use graph::{Netlist, NetlistBuilder};
pub use net::{is_ground_name, Net, NetSet};
pub use terminal::{Stamp, Terminal, TerminalBlock};
pub use types::*;
pub use validate::validate_netlist;
