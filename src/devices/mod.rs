//! Analog device models.
//!
//! This module provides the controlled-source family and the resistor used
//! to load it:
//! - VCCS: voltage-controlled current source
//! - LVCCS: VCCS with a soft current limit (nonlinear)
//! - CCCS: current-controlled current source
//! - VCVS: voltage-controlled voltage source
//! - RES: resistor
//!
//! The four controlled sources share one [`ControlledSource`] core; each
//! variant only adds what differs. Devices expose four callbacks to the
//! scheduler:
//!
//! | Callback | When |
//! |---|---|
//! | `reset` | simulation (re)start: stamps from parameters |
//! | `update` | a connected net changed: request a re-solve if needed |
//! | `update_param` | a parameter changed at runtime |
//! | `update_terminals` | before each solver iteration (dynamic devices only) |

mod fourterm;
mod lvccs;
mod passive;
pub mod registry;
mod vccs;
mod vcvs;

pub use fourterm::{ControlledSource, IN, IP, ON, ON1, OP, OP1};
pub use lvccs::Lvccs;
pub use passive::Resistor;
pub use registry::{lookup, DeviceEntry, ParamSpec, REGISTRY};
pub use vccs::{Cccs, Vccs};
pub use vcvs::Vcvs;

use crate::error::{FourtermError, Result};
use crate::netlist::{NetId, NetSet, TerminalBlock};

/// An analog device.
#[derive(Debug, Clone)]
pub enum Device {
    Vccs(Vccs),
    Lvccs(Lvccs),
    Cccs(Cccs),
    Vcvs(Vcvs),
    Resistor(Resistor),
}

impl Device {
    /// Get the device name.
    pub fn name(&self) -> &str {
        match self {
            Device::Vccs(d) => &d.core.name,
            Device::Lvccs(d) => &d.core.name,
            Device::Cccs(d) => &d.core.name,
            Device::Vcvs(d) => &d.core.name,
            Device::Resistor(r) => &r.name,
        }
    }

    /// Registry keyword of the device type.
    pub fn type_keyword(&self) -> &'static str {
        match self {
            Device::Vccs(_) => "VCCS",
            Device::Lvccs(_) => "LVCCS",
            Device::Cccs(_) => "CCCS",
            Device::Vcvs(_) => "VCVS",
            Device::Resistor(_) => "RES",
        }
    }

    /// The controlled-source core, if this is one.
    pub fn controlled_source(&self) -> Option<&ControlledSource> {
        match self {
            Device::Vccs(d) => Some(&d.core),
            Device::Lvccs(d) => Some(&d.core),
            Device::Cccs(d) => Some(&d.core),
            Device::Vcvs(d) => Some(&d.core),
            Device::Resistor(_) => None,
        }
    }

    /// Terminals of the device.
    pub fn terminals(&self) -> &TerminalBlock {
        match self {
            Device::Vccs(d) => d.core.terminals(),
            Device::Lvccs(d) => d.core.terminals(),
            Device::Cccs(d) => d.core.terminals(),
            Device::Vcvs(d) => d.core.terminals(),
            Device::Resistor(r) => r.terminals(),
        }
    }

    /// Terminals of the device, mutable.
    pub fn terminals_mut(&mut self) -> &mut TerminalBlock {
        match self {
            Device::Vccs(d) => d.core.terminals_mut(),
            Device::Lvccs(d) => d.core.terminals_mut(),
            Device::Cccs(d) => d.core.terminals_mut(),
            Device::Vcvs(d) => d.core.terminals_mut(),
            Device::Resistor(r) => r.terminals_mut(),
        }
    }

    /// Check if this device must be relinearized every solver iteration.
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Device::Lvccs(_))
    }

    /// Recompute stamps from parameters.
    pub fn reset(&mut self) {
        match self {
            Device::Vccs(d) => d.reset(),
            Device::Lvccs(d) => d.reset(),
            Device::Cccs(d) => d.reset(),
            Device::Vcvs(d) => d.reset(),
            Device::Resistor(r) => r.reset(),
        }
    }

    /// React to a net change by requesting a re-solve where needed.
    pub fn update(&self, nets: &mut NetSet) -> Option<NetId> {
        match self {
            Device::Vccs(d) => d.update(nets),
            Device::Lvccs(d) => d.update(nets),
            Device::Cccs(d) => d.update(nets),
            Device::Vcvs(d) => d.update(nets),
            Device::Resistor(r) => r.update(nets),
        }
    }

    /// Apply changed parameters.
    pub fn update_param(&mut self, nets: &mut NetSet) {
        match self {
            Device::Vccs(d) => d.update_param(nets),
            Device::Lvccs(d) => d.update_param(nets),
            Device::Cccs(d) => d.update_param(nets),
            Device::Vcvs(d) => d.update_param(nets),
            Device::Resistor(r) => r.update_param(nets),
        }
    }

    /// Relinearize from converged voltages. Returns the linearization
    /// residual relative to the device's own current scale; static devices
    /// return 0.
    pub fn update_terminals(&mut self, nets: &NetSet) -> f64 {
        match self {
            Device::Lvccs(d) => d.update_terminals(nets),
            _ => 0.0,
        }
    }

    /// Set a parameter by its registered name (case-insensitive).
    ///
    /// Takes effect at the next `reset` or `update_param`.
    pub fn set_param(&mut self, key: &str, value: f64) -> Result<()> {
        let known = match self {
            Device::Vccs(d) => d.core.set_param(key, value),
            Device::Lvccs(d) => d.set_param(key, value),
            Device::Cccs(d) => d.core.set_param(key, value),
            Device::Vcvs(d) => d.set_param(key, value),
            Device::Resistor(r) => r.set_param(key, value),
        };
        if known {
            Ok(())
        } else {
            Err(FourtermError::UnknownParameter {
                device: self.name().to_string(),
                param: key.to_string(),
            })
        }
    }

    /// Read a parameter by its registered name.
    pub fn param(&self, key: &str) -> Option<f64> {
        match self {
            Device::Vccs(d) => d.core.param(key),
            Device::Lvccs(d) => d.param(key),
            Device::Cccs(d) => d.core.param(key),
            Device::Vcvs(d) => d.param(key),
            Device::Resistor(r) => r.param(key),
        }
    }

    /// Log tolerated topology weaknesses after finalize.
    pub(crate) fn check_topology(&self) {
        if let Some(core) = self.controlled_source() {
            core.check_topology();
        }
    }
}
