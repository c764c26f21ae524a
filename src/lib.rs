//! # Fourterm
//!
//! Controlled-source device models for a nodal netlist simulator.
//!
//! This library provides:
//! - The four-terminal controlled-source family: VCCS, current-limited VCCS,
//!   CCCS and VCVS, plus a resistor to load them
//! - A two-phase netlist builder with late-bound internal terminals
//! - A dirty-flag scheduled nodal solver with Newton-Raphson iteration for
//!   the nonlinear (current-limited) source
//! - A small text format for describing netlists
//!
//! ## Architecture
//!
//! - [`dsl`] - Parser for the netlist description language
//! - [`netlist`] - Nets, terminals and netlist construction
//! - [`devices`] - Device models and the registry of device types
//! - [`solver`] - Matrix assembly, solving and step scheduling
//!
//! ## Usage
//!
//! ```no_run
//! use fourterm::{dsl, Netlist, Simulator};
//!
//! # fn main() -> fourterm::Result<()> {
//! let ast = dsl::parse(".rail VIN 0.5\nVCVS E1 VIN 0 OUT 0 G=10\nRES RL OUT 0 1k")?;
//! let mut sim = Simulator::new(Netlist::from_ast(&ast)?);
//! sim.reset()?;
//! println!("{:?}", sim.net_voltage("OUT"));
//!
//! sim.set_rail("VIN", 1.0)?;
//! sim.step()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## How devices reach the solver
//!
//! The solver only understands two-terminal stamps: each terminal carries a
//! conductance to its own net, a coupling conductance to the net of an
//! opposite terminal, and an injected current. A four-terminal source is
//! expressed with internal terminals that are bound onto its output nets
//! when the netlist is finalized.
//!
//! Devices never solve anything themselves. They mark nets dirty when their
//! inputs change, and the [`Simulator`] runs one solve per step if anything
//! is dirty.

pub mod devices;
pub mod dsl;
pub mod error;
pub mod netlist;
pub mod solver;

// Re-export main types for convenience
pub use devices::Device;
pub use error::{FourtermError, Result};
pub use netlist::{Netlist, NetlistBuilder};
pub use solver::{Simulator, SimulatorConfig};
