//! Parser for the netlist DSL.

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::devices::registry;
use crate::error::{FourtermError, Result};

/// Parser for netlist DSL.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            // Placeholder until the first advance
            current: Token {
                kind: TokenKind::Newline,
                text: String::new(),
                line: 1,
                column: 1,
            },
        }
    }

    /// Parse the entire netlist description.
    pub fn parse(&mut self) -> Result<NetlistAst> {
        let mut ast = NetlistAst::new();
        self.advance()?;

        while self.current.kind != TokenKind::Eof {
            match self.current.kind {
                TokenKind::Newline => {
                    self.advance()?;
                    continue;
                }
                TokenKind::Directive => {
                    if !self.parse_directive(&mut ast)? {
                        break;
                    }
                }
                TokenKind::Identifier => {
                    let device = self.parse_device()?;
                    ast.devices.push(device);
                }
                _ => {
                    return Err(FourtermError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            self.end_of_line()?;
        }

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(FourtermError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn end_of_line(&mut self) -> Result<()> {
        match self.current.kind {
            TokenKind::Newline => self.advance(),
            TokenKind::Eof => Ok(()),
            _ => Err(FourtermError::parse(
                self.current.line,
                format!("unexpected trailing token: {:?}", self.current.text),
            )),
        }
    }

    /// Net names may start with a digit (`0`, `3V3`).
    fn net_name(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier | TokenKind::Number => {
                let text = self.current.text.clone();
                self.advance()?;
                Ok(text)
            }
            _ => Err(FourtermError::parse(
                self.current.line,
                format!("expected net name, got {:?}", self.current.kind),
            )),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let tok = self.expect(TokenKind::Number)?;
        parse_value(&tok.text)
            .ok_or_else(|| FourtermError::parse(tok.line, format!("invalid number: {}", tok.text)))
    }

    /// Returns false on `.end`.
    fn parse_directive(&mut self, ast: &mut NetlistAst) -> Result<bool> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".rail" => {
                let name = self.net_name()?;
                let voltage = self.number()?;
                ast.rails.push(RailDef {
                    name,
                    voltage,
                    line,
                });
            }
            ".probe" => {
                if self.at_line_end() {
                    return Err(FourtermError::parse(line, ".probe needs at least one net"));
                }
                while !self.at_line_end() {
                    let net = self.net_name()?;
                    if !ast.probes.contains(&net) {
                        ast.probes.push(net);
                    }
                }
            }
            ".end" => return Ok(false),
            _ => {
                return Err(FourtermError::parse(
                    line,
                    format!("unknown directive: {}", directive),
                ));
            }
        }

        Ok(true)
    }

    fn parse_device(&mut self) -> Result<DeviceDef> {
        let keyword = self.current.text.clone();
        let line = self.current.line;

        let entry = registry::lookup(&keyword).ok_or_else(|| FourtermError::UnknownDeviceType {
            device_type: keyword.clone(),
            line,
        })?;
        self.advance()?;

        let name = self.expect(TokenKind::Identifier)?.text;

        let mut nets = Vec::with_capacity(entry.terminals.len());
        for _ in entry.terminals {
            if self.at_line_end() {
                return Err(FourtermError::invalid_device(
                    &name,
                    line,
                    format!(
                        "{} expects {} nets ({}), got {}",
                        entry.keyword,
                        entry.terminals.len(),
                        entry.terminals.join(" "),
                        nets.len()
                    ),
                ));
            }
            nets.push(self.net_name()?);
        }

        let value = if self.current.kind == TokenKind::Number {
            Some(self.number()?)
        } else {
            None
        };

        let mut params = Vec::new();
        while self.current.kind == TokenKind::Identifier {
            let key = self.current.text.to_uppercase();
            self.advance()?;
            if self.current.kind != TokenKind::Equals {
                return Err(FourtermError::invalid_device(
                    &name,
                    line,
                    format!("unexpected '{}': too many nets or missing '='", key),
                ));
            }
            self.advance()?;
            let value = self.number()?;
            if entry.default_of(&key).is_none() {
                return Err(FourtermError::UnknownParameter {
                    device: name,
                    param: key,
                });
            }
            params.push((key, value));
        }

        Ok(DeviceDef {
            device_type: entry.keyword.to_string(),
            name,
            nets,
            value,
            params,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn test_parse_resistor() {
        let ast = parse("RES RL out 0 10k").unwrap();
        assert_eq!(ast.devices.len(), 1);
        let dev = &ast.devices[0];
        assert_eq!(dev.device_type, "RES");
        assert_eq!(dev.name, "RL");
        assert_eq!(dev.nets, vec!["out", "0"]);
        assert_eq!(dev.value, Some(10_000.0));
        assert!(dev.params.is_empty());
    }

    #[test]
    fn test_parse_source_with_params() {
        let ast = parse("e E1 in GND out 0 G=10 ro=2k\n").unwrap();
        let dev = &ast.devices[0];
        assert_eq!(dev.device_type, "VCVS");
        assert_eq!(dev.nets, vec!["in", "GND", "out", "0"]);
        assert_eq!(dev.value, None);
        assert_eq!(dev.params, vec![("G".to_string(), 10.0), ("RO".to_string(), 2000.0)]);
        assert_eq!(ast.net_names(), vec!["in", "out"]);
    }

    #[test]
    fn test_parse_rails_and_probes() {
        let input = ".rail VCC 5\n.rail VEE -5\n.probe out mid out\nRES R1 VCC out 1k";
        let ast = parse(input).unwrap();
        assert_eq!(ast.rails.len(), 2);
        assert_eq!(ast.rails[1].name, "VEE");
        assert_eq!(ast.rails[1].voltage, -5.0);
        assert_eq!(ast.probes, vec!["out", "mid"]);
    }

    #[test]
    fn test_parse_with_comments() {
        let input = "# gain stage\nVCCS G1 a 0 b 0 2m ; transconductance\n\n";
        let ast = parse(input).unwrap();
        assert_eq!(ast.devices.len(), 1);
        assert_eq!(ast.devices[0].value, Some(2e-3));
    }

    #[test]
    fn test_end_stops_parsing() {
        let ast = parse("RES R1 a 0 1k\n.end\nthis is ignored @").unwrap();
        assert_eq!(ast.devices.len(), 1);
    }

    #[test]
    fn test_unknown_device_type_reports_line() {
        let err = parse("RES R1 a 0 1k\n\nMOSFET M1 d g s").unwrap_err();
        assert!(matches!(
            err,
            FourtermError::UnknownDeviceType { line: 3, ref device_type } if device_type == "MOSFET"
        ));
    }

    #[test]
    fn test_wrong_net_count() {
        assert!(matches!(
            parse("VCVS E1 a 0 b"),
            Err(FourtermError::InvalidDevice { line: 1, .. })
        ));
        assert!(matches!(
            parse("RES R1 a b c"),
            Err(FourtermError::InvalidDevice { .. })
        ));
    }

    #[test]
    fn test_unknown_parameter() {
        assert!(matches!(
            parse("VCCS G1 a 0 b 0 RO=1"),
            Err(FourtermError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn test_bad_directive() {
        assert!(matches!(
            parse(".model X D"),
            Err(FourtermError::ParseError { line: 1, .. })
        ));
        assert!(parse(".rail VCC").is_err());
        assert!(parse(".probe").is_err());
    }
}
