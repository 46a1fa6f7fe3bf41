use thiserror::Error;

use crate::token::Span;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("invalid character '{character}' (U+{code:08X})")]
    InvalidCharacter {
        character: char,
        code: u32,
        span: Span,
    },
    #[error("invalid decimal literal")]
    InvalidDecimalLiteral { span: Span },
    #[error("invalid digit '{digit}' in {base} literal")]
    InvalidDigit {
        digit: char,
        base: &'static str,
        span: Span,
    },
    #[error("invalid {base} literal")]
    EmptyBaseLiteral { base: &'static str, span: Span },
    #[error("integer literal '{literal}' is too large")]
    IntegerTooLarge { literal: String, span: Span },
    #[error("unterminated string literal")]
    UnterminatedString { span: Span },
    #[error("unterminated triple-quoted string literal")]
    UnterminatedTripleString { span: Span },
    #[error("(unicode error) 'unicodeescape' codec can't decode bytes, {reason}")]
    UnicodeEscape { reason: String, span: Span },
    #[error("expected identifier")]
    ExpectedIdentifier { span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::InvalidCharacter { span, .. }
            | LexError::InvalidDecimalLiteral { span }
            | LexError::InvalidDigit { span, .. }
            | LexError::EmptyBaseLiteral { span, .. }
            | LexError::IntegerTooLarge { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedTripleString { span }
            | LexError::UnicodeEscape { span, .. }
            | LexError::ExpectedIdentifier { span } => *span,
        }
    }
}

pub type LexResult<T> = Result<T, LexError>;
