use std::io::{self, BufRead};
use std::str::FromStr;
use thiserror::Error;

/// Parse failures shared by the configuration, topology and force-field
/// readers. Every variant is reported together with the offending line
/// number by the caller.
#[derive(Debug, Error)]
pub enum ParseErrorKind {
    #[error("Invalid integer for {field} (value: '{value}')")]
    InvalidInt { field: &'static str, value: String },
    #[error("Invalid float for {field} (value: '{value}')")]
    InvalidFloat { field: &'static str, value: String },
    #[error("Expected {expected} field(s) for {field}, found {found}")]
    FieldCount {
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{field} out of range (value: '{value}')")]
    OutOfRange { field: &'static str, value: String },
    #[error("Unexpected end of input while reading {field}")]
    UnexpectedEof { field: &'static str },
    #[error("Unexpected content after the last record")]
    TrailingContent,
}

/// Line scanner for the whitespace text formats: strips `#` comments,
/// skips blank lines and tracks 1-based line numbers for diagnostics.
pub struct Scanner<R> {
    reader: R,
    line_no: usize,
}

impl<R: BufRead> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line_no: 0 }
    }

    /// The number of the line most recently returned.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Next content-bearing line, with comments removed and surrounding
    /// whitespace trimmed. Returns `None` at end of input.
    pub fn next_content_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = String::new();
        loop {
            buf.clear();
            if self.reader.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let content = match buf.find('#') {
                Some(pos) => &buf[..pos],
                None => &buf,
            };
            let content = content.trim();
            if !content.is_empty() {
                return Ok(Some(content.to_string()));
            }
        }
    }
}

pub fn parse_usize(field: &'static str, token: &str) -> Result<usize, ParseErrorKind> {
    usize::from_str(token).map_err(|_| ParseErrorKind::InvalidInt {
        field,
        value: token.to_string(),
    })
}

pub fn parse_f64(field: &'static str, token: &str) -> Result<f64, ParseErrorKind> {
    f64::from_str(token).map_err(|_| ParseErrorKind::InvalidFloat {
        field,
        value: token.to_string(),
    })
}

/// Split a line into exactly `expected` whitespace-separated tokens.
pub fn split_fields<'a>(
    field: &'static str,
    line: &'a str,
    expected: usize,
) -> Result<Vec<&'a str>, ParseErrorKind> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != expected {
        return Err(ParseErrorKind::FieldCount {
            field,
            expected,
            found: tokens.len(),
        });
    }
    Ok(tokens)
}
