//! Text format for controlled-source netlists.
//!
//! Line-oriented and human-editable. Device types and their terminal order
//! come from the device registry, so the grammar needs no per-device rules.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist     = { line }
//! line        = comment | directive | device | empty
//! comment     = ('#' | ';') { any_char }
//! directive   = ".rail" net value | ".probe" net { net } | ".end"
//! device      = type name net{n} [value] { key '=' value }
//!
//! type        = registry keyword or alias (case-insensitive)
//! net         = identifier | "0" | "GND"
//! value       = number [unit_suffix]
//! unit_suffix = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! ```
//!
//! `n` is the number of terminals the registry lists for `type`. A bare
//! value sets the device's primary parameter.
//!
//! # Device Types
//!
//! | Type | Alias | Nets | Parameters |
//! |------|-------|------|------------|
//! | VCCS | G | IP IN OP ON | G, RI |
//! | LVCCS | | IP IN OP ON | G, RI, CURLIM |
//! | CCCS | F | IP IN OP ON | G, RI |
//! | VCVS | E | IP IN OP ON | G, RI, RO |
//! | RES | R | P N | R |
//!
//! # Example
//!
//! ```text
//! # x10 buffer driving a 1k load
//! .rail VIN 0.5
//! .probe OUT
//!
//! VCVS E1  VIN 0 OUT 0  G=10 RO=1
//! RES  RL  OUT 0  1k
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::{FourtermError, Result};

/// Parse a netlist DSL string into an AST.
pub fn parse(input: &str) -> Result<NetlistAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer);
    parser.parse()
}

/// Parse a netlist DSL file.
pub fn parse_file(path: &std::path::Path) -> Result<NetlistAst> {
    let content = std::fs::read_to_string(path).map_err(|e| FourtermError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}
