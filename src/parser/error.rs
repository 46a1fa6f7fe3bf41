use thiserror::Error;

use crate::token::Span;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    /// Token index the parser had reached when the error was raised.
    pub(crate) depth: usize,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, span: Span, depth: usize) -> Self {
        Self {
            message: message.into(),
            span,
            depth,
        }
    }

    /// Of two failed alternatives, the one that got further explains the
    /// intended error best. Ties keep `self`.
    pub(crate) fn deeper(self, other: ParseError) -> ParseError {
        if other.depth > self.depth { other } else { self }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
