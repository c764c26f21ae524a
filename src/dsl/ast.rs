//! Abstract Syntax Tree types for the netlist DSL.

use crate::netlist::is_ground_name;

/// Complete AST representation of a parsed netlist.
#[derive(Debug, Clone, Default)]
pub struct NetlistAst {
    /// Fixed-potential nets, in declaration order
    pub rails: Vec<RailDef>,
    /// All device instances
    pub devices: Vec<DeviceDef>,
    /// Nets to report; empty means all
    pub probes: Vec<String>,
}

impl NetlistAst {
    /// Create a new empty netlist AST.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every net referenced by a device line, first use first,
    /// ground aliases excluded.
    pub fn net_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for net in self.devices.iter().flat_map(|d| d.nets.iter()) {
            if !is_ground_name(net) && !names.contains(&net.as_str()) {
                names.push(net);
            }
        }
        names
    }
}

/// `.rail NAME VOLTAGE`
#[derive(Debug, Clone, PartialEq)]
pub struct RailDef {
    pub name: String,
    pub voltage: f64,
    /// Source line number for error reporting
    pub line: usize,
}

/// A device line: `<TYPE> <name> <nets...> [value] [KEY=value ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDef {
    /// Registry keyword (canonical, aliases resolved)
    pub device_type: String,
    /// Unique device name
    pub name: String,
    /// Connected net names, in registry terminal order
    pub nets: Vec<String>,
    /// Bare value for the primary parameter
    pub value: Option<f64>,
    /// Named parameters, keys upper-cased, in source order
    pub params: Vec<(String, f64)>,
    /// Source line number for error reporting
    pub line: usize,
}
