//! Error types for the fourterm netlist simulator.
//!
//! This module provides a unified error type [`FourtermError`] covering
//! netlist parsing, topology construction, and simulation. Device callbacks
//! themselves never fail: bad parameters propagate numerically into the
//! solver instead.

use thiserror::Error;

/// Result type alias using [`FourtermError`].
pub type Result<T> = std::result::Result<T, FourtermError>;

/// Unified error type for all fourterm operations.
#[derive(Error, Debug)]
pub enum FourtermError {
    // ============ Netlist Parsing Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Unknown device type keyword
    #[error("Unknown device type '{device_type}' at line {line}")]
    UnknownDeviceType { device_type: String, line: usize },

    /// Malformed device definition
    #[error("Invalid device '{name}' at line {line}: {message}")]
    InvalidDevice {
        name: String,
        line: usize,
        message: String,
    },

    /// Parameter not registered by the device type
    #[error("Unknown parameter '{param}' for device '{device}'")]
    UnknownParameter { device: String, param: String },

    // ============ Topology Errors ============
    /// Duplicate device name
    #[error("Duplicate device name '{name}'")]
    DuplicateDevice { name: String },

    /// Net declared twice with conflicting roles
    #[error("Duplicate net '{name}'")]
    DuplicateNet { name: String },

    /// Net not found in netlist
    #[error("Net '{net}' not found in netlist")]
    NetNotFound { net: String },

    /// Device not found in netlist
    #[error("Device '{device}' not found in netlist")]
    DeviceNotFound { device: String },

    /// Terminal name not registered by the device
    #[error("Device '{device}' has no terminal '{terminal}'")]
    UnknownTerminal { device: String, terminal: String },

    /// Terminal left without a net after finalize
    #[error("Terminal '{device}.{terminal}' is not connected to any net")]
    UnconnectedTerminal { device: String, terminal: String },

    /// Late connection anchored on a terminal that has no net
    #[error("Late connection '{device}.{from}' -> '{device}.{to}' has no net to join")]
    UnresolvedLateConnection {
        device: String,
        from: String,
        to: String,
    },

    /// Late connection joins two terminals already sitting on different nets
    #[error("Late connection '{device}.{from}' -> '{device}.{to}' joins two different nets")]
    ConflictingLateConnection {
        device: String,
        from: String,
        to: String,
    },

    /// Device late connections were already bound
    #[error("Device '{device}' has already been finalized")]
    AlreadyFinalized { device: String },

    /// Invalid netlist topology
    #[error("Invalid netlist topology: {message}")]
    InvalidTopology { message: String },

    // ============ Simulation Errors ============
    /// Matrix is singular and cannot be solved
    #[error("Singular matrix - netlist may contain a floating net")]
    SingularMatrix,

    /// Nonlinear solve loop did not converge
    #[error("Solver did not converge after {iterations} iterations (residual: {residual:.2e})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    // ============ I/O Errors ============
    /// Error reading netlist file
    #[error("Failed to read netlist file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FourtermError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid device error
    pub fn invalid_device(name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidDevice {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a convergence failure error
    pub fn convergence_failure(iterations: usize, residual: f64) -> Self {
        Self::ConvergenceFailure {
            iterations,
            residual,
        }
    }
}
