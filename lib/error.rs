use thiserror::Error;

use crate::token::{SourceInfo, Token};

#[derive(Debug, Error)]
#[error("SyntaxError: {message} ({location})\n{preview}\nrecent tokens: {}", .recent_tokens.join(" "))]
pub struct LexError {
    pub message: String,
    pub location: SourceInfo,
    pub preview: String,
    pub recent_tokens: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("SyntaxError: unexpected token '{token}' ({}): {message}", .token.source)]
    UnexpectedToken { token: Token, message: String },
    #[error("SyntaxError: unexpected end of input: {message}")]
    UnexpectedEnd { message: String },
    #[error("SyntaxError: {message} ({location})")]
    Invalid {
        message: String,
        location: SourceInfo,
    },
}

/// A JavaScript exception that unwound all the way out of `interpret`.
#[derive(Debug, Error)]
#[error("Uncaught {message}{}", format_trace(.trace))]
pub struct UncaughtException {
    pub message: String,
    pub trace: Vec<String>,
}

/// Renders frame names as `at name()` lines, innermost first.
pub fn format_trace(trace: &[String]) -> String {
    trace
        .iter()
        .map(|frame| format!("\n    at {}()", frame))
        .collect()
}

/// The native error constructors, in the order they are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    ReferenceError,
    SyntaxError,
    RangeError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::RangeError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::RangeError => "RangeError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncaught_exception_display() {
        let error = UncaughtException {
            message: "TypeError: x is not a function".to_string(),
            trace: vec!["inner".to_string(), "outer".to_string(), "<global>".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Uncaught TypeError: x is not a function\n    at inner()\n    at outer()\n    at <global>()"
        );
    }
}
