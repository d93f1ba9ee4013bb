//! Parse error types.

use alloc::string::{String, ToString};
use core::fmt;

/// Parse error with position information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the parsed text
    pub position: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at position {}: {}",
            self.position, self.message
        )
    }
}

impl core::error::Error for ParseError {}

pub(crate) fn parse_error(position: usize, message: &str) -> ParseError {
    ParseError {
        message: message.to_string(),
        position,
    }
}

pub(crate) fn offset(original_input: &str, remaining_input: &str) -> usize {
    original_input.len() - remaining_input.len()
}
