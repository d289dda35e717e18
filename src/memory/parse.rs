//! Program images are line oriented text: one 8-bit binary literal per
//! line, loaded into memory sequentially from address 0. Everything from a
//! `#` to the end of the line is a comment.
//!
//! ```text
//! # mult.ls8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! ```

use std::borrow::Cow;
use std::error;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::{fmt, str::Lines};

use color_eyre::eyre::{eyre, WrapErr};

use super::{Byte, Ram, RAM_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidLiteral,
    ProgramTooLarge,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidLiteral => f.write_str("invalid literal"),
            ParseErrorKind::ProgramTooLarge => {
                write!(f, "program does not fit into {} bytes of memory", RAM_SIZE)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl ParseError {
    fn new<C, S>(kind: ParseErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for ParseError {}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

#[derive(Debug, Clone)]
pub struct Parser<'a> {
    lines: Lines<'a>,
    line_nr: usize,
    /// Next address to load a byte into
    address: usize,
    memory: Ram,
}

impl<'a> Parser<'a> {
    /// Creates a new parser for `data` which will populate a zeroed memory.
    pub fn new(data: &'a str) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            address: 0,
            memory: Ram::default(),
        }
    }

    /// Consumes `self` and tries to parse all lines into memory.
    ///
    /// # Errors
    ///
    /// All errors which may occur are collected and returned at the end.
    pub fn parse(mut self) -> Result<Ram, Vec<ParseError>> {
        let mut errors = Vec::new();

        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::error!("{}", err);
                errors.push(err);
            }
        }

        if errors.is_empty() {
            Ok(self.memory)
        } else {
            Err(errors)
        }
    }

    /// Tries to parse the next line. Each byte of the program is located on
    /// its own line.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let line = self.lines.next()?;
        self.line_nr += 1;

        let token = match line.find('#') {
            Some(comment) => &line[..comment],
            None => line,
        }
        .trim();

        if token.is_empty() {
            // Comment or empty line; skip
            return Some(Ok(()));
        }

        let byte = match Byte::from_str_radix(token, 2) {
            Ok(byte) => byte,
            Err(_) => {
                return Some(Err(ParseError::new(
                    ParseErrorKind::InvalidLiteral,
                    format!("`{}` is not an 8-bit binary literal", token),
                    self.line_nr,
                )))
            }
        };

        Some(self.write_byte(byte))
    }

    /// Writes `byte` into memory at the current load address, then advances
    /// the load address by one.
    fn write_byte(&mut self, byte: Byte) -> Result<()> {
        if self.address >= RAM_SIZE {
            return Err(ParseError::new(
                ParseErrorKind::ProgramTooLarge,
                format!("no room for byte {}", self.address + 1),
                self.line_nr,
            ));
        }

        self.memory.data[self.address] = byte;
        self.address += 1;
        Ok(())
    }
}

impl FromStr for Ram {
    type Err = Vec<ParseError>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Parser::new(s).parse()
    }
}

impl Ram {
    /// Reads a program image from disk and parses it into memory
    pub fn from_file<P: AsRef<Path>>(path: P) -> color_eyre::eyre::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read program image `{}`", path.display()))?;

        data.parse().map_err(|errors: Vec<ParseError>| {
            let rendered = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n");
            eyre!(
                "failed to parse program image `{}`:\n{}",
                path.display(),
                rendered
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::processor::Instruction;

    use super::*;
    use color_eyre::eyre::Result;

    #[test]
    fn parse_mult() -> Result<()> {
        let data = r#"
            # mult.ls8: print 8 * 9

            10000010 # LDI R0,8
            00000000
            00001000
            10000010 # LDI R1,9
            00000001
            00001001
            10100010 # MUL R0,R1
            00000000
            00000001
            01000111 # PRN R0
            00000000
            00000001 # HLT
        "#;

        let mem = Ram::from_str(data).unwrap();

        assert_eq!(mem.read_byte(0)?, Instruction::LDI.into());
        assert_eq!(mem.read_byte(1)?, 0);
        assert_eq!(mem.read_byte(2)?, 8);
        assert_eq!(mem.read_byte(3)?, Instruction::LDI.into());
        assert_eq!(mem.read_byte(4)?, 1);
        assert_eq!(mem.read_byte(5)?, 9);
        assert_eq!(mem.read_byte(6)?, Instruction::MUL.into());
        assert_eq!(mem.read_byte(9)?, Instruction::PRN.into());
        assert_eq!(mem.read_byte(11)?, Instruction::HLT.into());

        Ok(())
    }

    #[test]
    fn parse_skips_blank_lines_and_comments() -> Result<()> {
        let data = "\n# only a comment\n   \n10000010\n\n00000001 # trailing comment\n";

        let mem = Ram::from_str(data).unwrap();

        assert_eq!(mem.read_byte(0)?, Instruction::LDI.into());
        assert_eq!(mem.read_byte(1)?, Instruction::HLT.into());
        assert_eq!(mem.read_byte(2)?, 0);

        Ok(())
    }

    #[test]
    fn parse_rejects_non_binary_literal() {
        let data = "10000010\n0x42\n2\n";

        let errors = Ram::from_str(data).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert!(errors[0].to_string().contains("ln: 2"));
        assert!(errors[1].to_string().contains("ln: 3"));
    }

    #[test]
    fn parse_rejects_oversized_program() {
        let mut data = String::new();
        for _ in 0..RAM_SIZE + 1 {
            data.push_str("00000000\n");
        }

        let errors = Ram::from_str(&data).unwrap_err();

        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("does not fit"));
    }
}
