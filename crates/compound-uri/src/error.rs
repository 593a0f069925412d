//! Error type for compound URI parsing.

use thiserror::Error;

/// Errors produced while parsing a compound URI.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The input does not match the compound URI grammar.
    #[error("{message} at offset {offset} near '{near}'")]
    Syntax {
        /// The complete text that was being parsed.
        input: String,
        /// Byte offset of the failure within `input`.
        offset: usize,
        /// The unparsed remainder starting at `offset`, truncated for display.
        near: String,
        /// Human-readable description of what was expected.
        message: String,
    },
}

impl Error {
    /// Build a syntax error for `input` failing at `offset`.
    pub(crate) fn syntax(input: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(input.len());
        let near: String = input[offset..].chars().take(24).collect();
        Self::Syntax {
            input: input.to_string(),
            offset,
            near,
            message: message.into(),
        }
    }

    /// Byte offset of the failure within the parsed text.
    pub fn offset(&self) -> usize {
        match self {
            Self::Syntax { offset, .. } => *offset,
        }
    }

    /// Render the message with the input and a caret under the failing position.
    pub fn pretty(&self) -> String {
        match self {
            Self::Syntax {
                input,
                offset,
                message,
                ..
            } => {
                let col = input[..*offset].chars().count();
                format!(
                    "URI syntax error: {}\n  {}\n  {}^",
                    message,
                    input,
                    " ".repeat(col)
                )
            }
        }
    }
}
