//! Static registration table of device types.
//!
//! Each row names a device keyword, its externally connectable terminals in
//! netlist order, its parameters with defaults, and a constructor. The table
//! is a `static`, fixed at compile time and queried by the netlist loader.

use super::{Cccs, Device, Lvccs, Resistor, Vccs, Vcvs};

/// A registered parameter and its default value.
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: f64,
}

/// One registered device type.
#[derive(Debug)]
pub struct DeviceEntry {
    /// Keyword used in netlists
    pub keyword: &'static str,
    /// Alternative keywords
    pub aliases: &'static [&'static str],
    /// One-line description
    pub description: &'static str,
    /// Terminals connected by a netlist device line, in order
    pub terminals: &'static [&'static str],
    /// Parameters; the first is the primary one set by a bare value
    pub params: &'static [ParamSpec],
    create: fn(String) -> Device,
}

impl DeviceEntry {
    /// Construct a device with default parameters.
    pub fn create(&self, name: impl Into<String>) -> Device {
        (self.create)(name.into())
    }

    /// Parameter set by a bare value on a device line.
    pub fn primary_param(&self) -> Option<&'static str> {
        self.params.first().map(|p| p.name)
    }

    /// Whether `keyword` names this entry.
    pub fn matches(&self, keyword: &str) -> bool {
        self.keyword.eq_ignore_ascii_case(keyword)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(keyword))
    }

    /// Default of a registered parameter.
    pub fn default_of(&self, param: &str) -> Option<f64> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(param))
            .map(|p| p.default)
    }
}

const SOURCE_TERMINALS: &[&str] = &["IP", "IN", "OP", "ON"];

fn create_vccs(name: String) -> Device {
    Device::Vccs(Vccs::new(name, Vccs::DEFAULT_G, Vccs::DEFAULT_RI))
}

fn create_lvccs(name: String) -> Device {
    Device::Lvccs(Lvccs::new(
        name,
        Lvccs::DEFAULT_G,
        Lvccs::DEFAULT_RI,
        Lvccs::DEFAULT_CUR_LIMIT,
    ))
}

fn create_cccs(name: String) -> Device {
    Device::Cccs(Cccs::new(name, Cccs::DEFAULT_G, Cccs::DEFAULT_RI))
}

fn create_vcvs(name: String) -> Device {
    Device::Vcvs(Vcvs::new(
        name,
        Vcvs::DEFAULT_G,
        Vcvs::DEFAULT_RI,
        Vcvs::DEFAULT_RO,
    ))
}

fn create_resistor(name: String) -> Device {
    Device::Resistor(Resistor::new(name, Resistor::DEFAULT_R))
}

/// All registered device types.
pub static REGISTRY: [DeviceEntry; 5] = [
    DeviceEntry {
        keyword: "VCCS",
        aliases: &["G"],
        description: "voltage-controlled current source",
        terminals: SOURCE_TERMINALS,
        params: &[
            ParamSpec { name: "G", default: Vccs::DEFAULT_G },
            ParamSpec { name: "RI", default: Vccs::DEFAULT_RI },
        ],
        create: create_vccs,
    },
    DeviceEntry {
        keyword: "LVCCS",
        aliases: &[],
        description: "current-limited voltage-controlled current source",
        terminals: SOURCE_TERMINALS,
        params: &[
            ParamSpec { name: "G", default: Lvccs::DEFAULT_G },
            ParamSpec { name: "RI", default: Lvccs::DEFAULT_RI },
            ParamSpec { name: "CURLIM", default: Lvccs::DEFAULT_CUR_LIMIT },
        ],
        create: create_lvccs,
    },
    DeviceEntry {
        keyword: "CCCS",
        aliases: &["F"],
        description: "current-controlled current source",
        terminals: SOURCE_TERMINALS,
        params: &[
            ParamSpec { name: "G", default: Cccs::DEFAULT_G },
            ParamSpec { name: "RI", default: Cccs::DEFAULT_RI },
        ],
        create: create_cccs,
    },
    DeviceEntry {
        keyword: "VCVS",
        aliases: &["E"],
        description: "voltage-controlled voltage source",
        terminals: SOURCE_TERMINALS,
        params: &[
            ParamSpec { name: "G", default: Vcvs::DEFAULT_G },
            ParamSpec { name: "RI", default: Vcvs::DEFAULT_RI },
            ParamSpec { name: "RO", default: Vcvs::DEFAULT_RO },
        ],
        create: create_vcvs,
    },
    DeviceEntry {
        keyword: "RES",
        aliases: &["R"],
        description: "resistor",
        terminals: &["P", "N"],
        params: &[ParamSpec { name: "R", default: Resistor::DEFAULT_R }],
        create: create_resistor,
    },
];

/// Find a device type by keyword or alias (case-insensitive).
pub fn lookup(keyword: &str) -> Option<&'static DeviceEntry> {
    REGISTRY.iter().find(|entry| entry.matches(keyword))
}
