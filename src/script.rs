//! Minimal linker directive file grammar.
//!
//! One directive per line: `SECTION <name> <addr>` pins a section's
//! virtual address, `ENTRY <symbol>` overrides the entry point, `BASE
//! <address>` overrides the layout base address. `#` starts a
//! line comment; blank lines are ignored. Addresses may be written in
//! hex (`0x...`) or decimal. Anything else is a parse error naming the
//! offending line.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Section { name: String, address: u64 },
    Entry { symbol: String },
    Base { address: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub directives: Vec<Directive>,
}

impl Script {
    pub fn base_address(&self) -> Option<u64> {
        self.directives.iter().find_map(|d| match d {
            Directive::Base { address } => Some(*address),
            _ => None,
        })
    }

    pub fn entry_symbol(&self) -> Option<&str> {
        self.directives.iter().find_map(|d| match d {
            Directive::Entry { symbol } => Some(symbol.as_str()),
            _ => None,
        })
    }

    pub fn section_address(&self, name: &str) -> Option<u64> {
        self.directives.iter().find_map(|d| match d {
            Directive::Section { name: n, address } if n == name => Some(*address),
            _ => None,
        })
    }
}

fn parse_address(token: &str, line_no: usize) -> Result<u64> {
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        token.parse::<u64>()
    };
    parsed.map_err(|_| {
        Error::InvalidArgument(format!("line {line_no}: invalid address `{token}`"))
    })
}

/// Parses a complete directive file.
pub fn parse(input: &str) -> Result<Script> {
    let mut script = Script::default();
    for (i, raw_line) in input.lines().enumerate() {
        let line_no = i + 1;
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["SECTION", name, addr] => {
                script.directives.push(Directive::Section {
                    name: name.to_string(),
                    address: parse_address(addr, line_no)?,
                });
            }
            ["ENTRY", symbol] => {
                script.directives.push(Directive::Entry {
                    symbol: symbol.to_string(),
                });
            }
            ["BASE", addr] => {
                script.directives.push(Directive::Base {
                    address: parse_address(addr, line_no)?,
                });
            }
            [] => {}
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "line {line_no}: unrecognized directive `{line}`"
                )));
            }
        }
    }
    Ok(script)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_all_three_directives() {
        let script = parse(
            "# comment\nSECTION .text 0x1000\nENTRY main\nBASE 0x400000\n",
        )
        .unwrap();
        assert_eq!(script.section_address(".text"), Some(0x1000));
        assert_eq!(script.entry_symbol(), Some("main"));
        assert_eq!(script.base_address(), Some(0x400000));
    }

    #[test]
    fn accepts_decimal_addresses() {
        let script = parse("BASE 1024\n").unwrap();
        assert_eq!(script.base_address(), Some(1024));
    }

    #[test]
    fn blank_and_comment_only_lines_are_ignored() {
        let script = parse("\n   \n# just a comment\n").unwrap();
        assert!(script.directives.is_empty());
    }

    #[test]
    fn unknown_directive_names_its_line() {
        let err = parse("SECTION .text 0x1000\nFROB something\n").unwrap_err();
        match err {
            Error::InvalidArgument(msg) => assert!(msg.contains("line 2")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn malformed_section_directive_is_rejected() {
        assert!(parse("SECTION .text\n").is_err());
    }
}
