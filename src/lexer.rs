mod error;

use rustc_hash::FxHashSet;
use tracing::warn;

pub use error::{LexError, LexResult};

use crate::token::{Keyword, Number, Span, Token, TokenKind};

/// Operator and delimiter spellings, longest first so the first prefix match
/// is the maximal munch.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("**=", TokenKind::StarStarEqual),
    ("//=", TokenKind::SlashSlashEqual),
    ("<<=", TokenKind::LessLessEqual),
    (">>=", TokenKind::GreaterGreaterEqual),
    ("...", TokenKind::Ellipsis),
    ("++", TokenKind::PlusPlus),
    ("+=", TokenKind::PlusEqual),
    ("--", TokenKind::MinusMinus),
    ("-=", TokenKind::MinusEqual),
    ("**", TokenKind::StarStar),
    ("*=", TokenKind::StarEqual),
    ("//", TokenKind::SlashSlash),
    ("/=", TokenKind::SlashEqual),
    ("%=", TokenKind::PercentEqual),
    ("&&", TokenKind::AmpAmp),
    ("&=", TokenKind::AmpEqual),
    ("||", TokenKind::PipePipe),
    ("|=", TokenKind::PipeEqual),
    ("^=", TokenKind::CaretEqual),
    ("~=", TokenKind::TildeEqual),
    ("~!", TokenKind::TildeBang),
    ("!=", TokenKind::BangEqual),
    ("==", TokenKind::EqualEqual),
    (":=", TokenKind::ColonEqual),
    ("<<", TokenKind::LessLess),
    ("<=", TokenKind::LessEqual),
    (">>", TokenKind::GreaterGreater),
    (">=", TokenKind::GreaterEqual),
    ("??", TokenKind::QuestionQuestion),
    ("@=", TokenKind::AtEqual),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("&", TokenKind::Amp),
    ("|", TokenKind::Pipe),
    ("^", TokenKind::Caret),
    ("~", TokenKind::Tilde),
    ("!", TokenKind::Bang),
    ("=", TokenKind::Equal),
    (":", TokenKind::Colon),
    ("<", TokenKind::Less),
    (">", TokenKind::Greater),
    ("?", TokenKind::Question),
    ("@", TokenKind::At),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
    (",", TokenKind::Comma),
    (";", TokenKind::Semicolon),
    (".", TokenKind::Dot),
];

pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    index: usize,
    warnings: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().collect(),
            index: 0,
            warnings: true,
        }
    }

    /// Controls the `SyntaxWarning` emitted for unknown string escapes.
    pub fn with_warnings(mut self, warnings: bool) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn tokenize(mut self) -> LexResult<Vec<Token>> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.current() {
            let start = self.offset();
            match ch {
                '\n' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Newline, Span::new(start, start + 1)));
                }
                '#' => self.skip_comment(),
                c if c.is_whitespace() => self.advance(),
                c if c.is_ascii_digit() => tokens.push(self.lex_number()?),
                '.' => {
                    self.advance();
                    let fraction = self.current().is_some_and(|c| c.is_ascii_digit());
                    self.reverse(1);
                    if fraction {
                        tokens.push(self.lex_number()?);
                    } else {
                        tokens.push(self.lex_operator(start)?);
                    }
                }
                c if is_identifier_start(c) => tokens.push(self.lex_identifier(start, false)),
                '$' => tokens.push(self.lex_dollar()?),
                '"' | '\'' => tokens.push(self.lex_string()?),
                _ => tokens.push(self.lex_operator(start)?),
            }
        }

        let end = self.source.len();
        tokens.push(Token::new(TokenKind::EOF, Span::point(end)));
        Ok(tokens)
    }

    fn current(&self) -> Option<char> {
        self.peek(0)
    }

    fn peek(&self, distance: usize) -> Option<char> {
        self.chars.get(self.index + distance).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.index)
            .map_or(self.source.len(), |&(offset, _)| offset)
    }

    fn advance(&mut self) {
        if self.index < self.chars.len() {
            self.index += 1;
        }
    }

    fn reverse(&mut self, amount: usize) {
        self.index = self.index.saturating_sub(amount);
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.current() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn lex_operator(&mut self, start: usize) -> LexResult<Token> {
        let rest = &self.source[start..];
        for (text, kind) in OPERATORS {
            if rest.starts_with(text) {
                for _ in 0..text.len() {
                    self.advance();
                }
                return Ok(Token::new(kind.clone(), Span::new(start, start + text.len())));
            }
        }

        let character = self.current().unwrap_or('\0');
        Err(LexError::InvalidCharacter {
            character,
            code: u32::from(character),
            span: Span::new(start, start + character.len_utf8()),
        })
    }

    fn lex_identifier(&mut self, start: usize, escaped: bool) -> Token {
        let name_start = self.offset();
        while let Some(c) = self.current() {
            if !is_identifier_continue(c) {
                break;
            }
            self.advance();
        }
        let name = &self.source[name_start..self.offset()];
        let span = Span::new(start, self.offset());

        if !escaped && let Some(keyword) = Keyword::lookup(name) {
            return Token::new(TokenKind::Keyword(keyword), span);
        }
        Token::new(TokenKind::Identifier(name.to_string()), span)
    }

    /// `$name` always yields an identifier, even for reserved words.
    fn lex_dollar(&mut self) -> LexResult<Token> {
        let start = self.offset();
        self.advance();
        while let Some(c) = self.current() {
            if c == '\n' || !c.is_whitespace() {
                break;
            }
            self.advance();
        }

        match self.current() {
            Some(c) if is_identifier_start(c) => Ok(self.lex_identifier(start, true)),
            _ => {
                let offset = self.offset();
                Err(LexError::ExpectedIdentifier {
                    span: Span::new(offset, offset + 1),
                })
            }
        }
    }

    fn lex_number(&mut self) -> LexResult<Token> {
        let start = self.offset();

        if self.current() == Some('0')
            && matches!(self.peek(1), Some('b' | 'B' | 'o' | 'O' | 'x' | 'X'))
        {
            return self.lex_based_integer(start);
        }

        let mut text = String::new();
        let mut is_float = false;
        self.scan_decimal_digits(&mut text, start)?;

        if self.current() == Some('.') {
            is_float = true;
            text.push('.');
            self.advance();
            self.scan_decimal_digits(&mut text, start)?;
        }

        if matches!(self.current(), Some('e' | 'E')) {
            let sign = matches!(self.peek(1), Some('+' | '-'));
            let first_digit = if sign { 2 } else { 1 };
            if !self.peek(first_digit).is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.invalid_decimal(start));
            }
            is_float = true;
            text.push('e');
            self.advance();
            if sign {
                text.extend(self.current());
                self.advance();
            }
            self.scan_decimal_digits(&mut text, start)?;
        }

        let imaginary = matches!(self.current(), Some('j' | 'J'));
        if imaginary {
            self.advance();
        }

        match self.current() {
            Some('.') if is_float || imaginary => return Err(self.invalid_decimal(start)),
            Some(c) if is_identifier_continue(c) => return Err(self.invalid_decimal(start)),
            _ => {}
        }

        let span = Span::new(start, self.offset());
        let number = if imaginary {
            Number::Imaginary(self.parse_float(&text, start)?)
        } else if is_float {
            Number::Float(self.parse_float(&text, start)?)
        } else {
            Number::Int(text.parse::<i64>().map_err(|_| LexError::IntegerTooLarge {
                literal: self.source[start..self.offset()].to_string(),
                span,
            })?)
        };
        Ok(Token::new(TokenKind::Number(number), span))
    }

    fn lex_based_integer(&mut self, start: usize) -> LexResult<Token> {
        self.advance();
        let (radix, base) = match self.current().map(|c| c.to_ascii_lowercase()) {
            Some('b') => (2, "binary"),
            Some('o') => (8, "octal"),
            _ => (16, "hexadecimal"),
        };
        self.advance();

        let mut digits = String::new();
        while let Some(c) = self.current() {
            if c.is_digit(radix) {
                digits.push(c);
                self.advance();
            } else if c == '_' && self.peek(1).is_some_and(|next| next.is_digit(radix)) {
                self.advance();
            } else if c == '_' {
                return Err(LexError::EmptyBaseLiteral {
                    base,
                    span: Span::new(start, self.offset() + 1),
                });
            } else if c.is_ascii_alphanumeric() {
                return Err(LexError::InvalidDigit {
                    digit: c,
                    base,
                    span: Span::new(start, self.offset() + 1),
                });
            } else {
                break;
            }
        }

        let span = Span::new(start, self.offset());
        if digits.is_empty() {
            return Err(LexError::EmptyBaseLiteral { base, span });
        }
        let value = i64::from_str_radix(&digits, radix).map_err(|_| LexError::IntegerTooLarge {
            literal: self.source[start..self.offset()].to_string(),
            span,
        })?;
        Ok(Token::new(TokenKind::Number(Number::Int(value)), span))
    }

    /// Digits with single underscores allowed strictly between them.
    fn scan_decimal_digits(&mut self, text: &mut String, start: usize) -> LexResult<()> {
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                text.push(c);
                self.advance();
            } else if c == '_' {
                let after_digit = text.ends_with(|last: char| last.is_ascii_digit());
                let before_digit = self.peek(1).is_some_and(|next| next.is_ascii_digit());
                if !(after_digit && before_digit) {
                    return Err(self.invalid_decimal(start));
                }
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    fn parse_float(&self, text: &str, start: usize) -> LexResult<f64> {
        text.parse::<f64>().map_err(|_| self.invalid_decimal(start))
    }

    fn invalid_decimal(&self, start: usize) -> LexError {
        LexError::InvalidDecimalLiteral {
            span: Span::new(start, self.offset().max(start + 1)),
        }
    }

    fn lex_string(&mut self) -> LexResult<Token> {
        let start = self.offset();
        let quote = self.current().unwrap_or('"');
        let triple = self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        let opening = if triple { 3 } else { 1 };
        for _ in 0..opening {
            self.advance();
        }

        let mut value = String::new();
        let mut decode_error: Option<String> = None;
        let mut warned = FxHashSet::default();

        loop {
            let Some(c) = self.current() else {
                return Err(unterminated(triple, start));
            };

            if c == quote {
                if !triple {
                    self.advance();
                    break;
                }
                if self.peek(1) == Some(quote) && self.peek(2) == Some(quote) {
                    self.advance();
                    self.advance();
                    self.advance();
                    break;
                }
            } else if c == '\n' && !triple {
                return Err(unterminated(triple, start));
            }

            if c != '\\' {
                value.push(c);
                self.advance();
                continue;
            }

            self.advance();
            let Some(escape) = self.current() else {
                return Err(unterminated(triple, start));
            };
            if let Err(reason) = self.decode_escape(escape, &mut value, &mut warned)
                && decode_error.is_none()
            {
                decode_error = Some(reason);
            }
        }

        let span = Span::new(start, self.offset());
        if let Some(reason) = decode_error {
            return Err(LexError::UnicodeEscape { reason, span });
        }
        Ok(Token::new(TokenKind::String(value), span))
    }

    /// Decodes the escape starting at `escape` (the character after the
    /// backslash) and leaves the cursor after it.
    fn decode_escape(
        &mut self,
        escape: char,
        value: &mut String,
        warned: &mut FxHashSet<char>,
    ) -> Result<(), String> {
        let simple = match escape {
            '\\' | '\'' | '"' => Some(escape),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'b' => Some('\u{8}'),
            'f' => Some('\u{c}'),
            'a' => Some('\u{7}'),
            'v' => Some('\u{b}'),
            _ => None,
        };
        if let Some(decoded) = simple {
            value.push(decoded);
            self.advance();
            return Ok(());
        }

        match escape {
            '\n' => {
                self.advance();
                Ok(())
            }
            '0'..='7' => {
                let mut code = 0u32;
                for _ in 0..3 {
                    match self.current().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            code = code * 8 + digit;
                            self.advance();
                        }
                        None => break,
                    }
                }
                value.extend(char::from_u32(code));
                Ok(())
            }
            'x' | 'u' | 'U' => {
                let length = match escape {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                self.advance();
                let mut digits = String::new();
                while digits.len() < length {
                    match self.current() {
                        Some(c) if c.is_ascii_hexdigit() => {
                            digits.push(c);
                            self.advance();
                        }
                        _ => break,
                    }
                }
                if digits.len() != length {
                    return Err(format!(
                        "truncated \\{escape}{} escape",
                        "X".repeat(length)
                    ));
                }
                let decoded = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| "illegal Unicode character".to_string())?;
                value.push(decoded);
                Ok(())
            }
            'N' => {
                self.advance();
                if self.current() != Some('{') {
                    return Err("malformed \\N character escape".to_string());
                }
                self.advance();
                let mut name = String::new();
                loop {
                    match self.current() {
                        Some('}') => {
                            self.advance();
                            break;
                        }
                        Some(c) if c != '\n' => {
                            name.push(c);
                            self.advance();
                        }
                        _ => return Err("malformed \\N character escape".to_string()),
                    }
                }
                let decoded = unicode_names2::character(&name)
                    .ok_or_else(|| "unknown Unicode character name".to_string())?;
                value.push(decoded);
                Ok(())
            }
            other => {
                if self.warnings && warned.insert(other) {
                    warn!("SyntaxWarning: invalid escape sequence '\\{other}'");
                }
                value.push('\\');
                value.push(other);
                self.advance();
                Ok(())
            }
        }
    }
}

fn unterminated(triple: bool, start: usize) -> LexError {
    let span = Span::new(start, start + 1);
    if triple {
        LexError::UnterminatedTripleString { span }
    } else {
        LexError::UnterminatedString { span }
    }
}

pub(crate) fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub fn tokenize(source: &str) -> LexResult<Vec<Token>> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize should succeed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn number(source: &str) -> Number {
        match kinds(source).remove(0) {
            TokenKind::Number(number) => number,
            other => panic!("expected number, got {other:?}"),
        }
    }

    #[test]
    fn decodes_numeric_literals() {
        assert_eq!(number("0x1A"), Number::Int(26));
        assert_eq!(number("0b1010"), Number::Int(10));
        assert_eq!(number("0o17"), Number::Int(15));
        assert_eq!(number("1_000"), Number::Int(1000));
        assert_eq!(number("2.5e3"), Number::Float(2500.0));
        assert_eq!(number(".5"), Number::Float(0.5));
        assert_eq!(number("1e-2"), Number::Float(0.01));
        assert_eq!(number("3j"), Number::Imaginary(3.0));
    }

    #[test]
    fn rejects_malformed_numbers_at_literal_start() {
        for source in ["x = 1_", "x = 1__0", "x = 1.2.3", "x = 12abc", "x = 1e"] {
            let err = tokenize(source).expect_err("malformed literal should fail");
            assert_eq!(err.to_string(), "invalid decimal literal", "{source}");
            assert_eq!(err.span().start, 4, "{source}");
        }

        let err = tokenize("0b102").expect_err("binary digit");
        assert_eq!(err.to_string(), "invalid digit '2' in binary literal");
        let err = tokenize("0x").expect_err("empty hex");
        assert_eq!(err.to_string(), "invalid hexadecimal literal");
    }

    #[test]
    fn greedy_operator_munch() {
        assert_eq!(
            kinds("a **= b << c <<= d ++ -- ~! ?? ..."),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::StarStarEqual,
                TokenKind::Identifier("b".to_string()),
                TokenKind::LessLess,
                TokenKind::Identifier("c".to_string()),
                TokenKind::LessLessEqual,
                TokenKind::Identifier("d".to_string()),
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::TildeBang,
                TokenKind::QuestionQuestion,
                TokenKind::Ellipsis,
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn keywords_and_dollar_escape() {
        assert_eq!(
            kinds("if $if $ class\n"),
            vec![
                TokenKind::Keyword(Keyword::If),
                TokenKind::Identifier("if".to_string()),
                TokenKind::Identifier("class".to_string()),
                TokenKind::Newline,
                TokenKind::EOF,
            ]
        );
        let err = tokenize("$ 1").expect_err("dollar needs a name");
        assert_eq!(err.to_string(), "expected identifier");
    }

    #[test]
    fn comments_are_skipped_but_newlines_kept() {
        assert_eq!(
            kinds("x # note\ny"),
            vec![
                TokenKind::Identifier("x".to_string()),
                TokenKind::Newline,
                TokenKind::Identifier("y".to_string()),
                TokenKind::EOF,
            ]
        );
    }

    #[test]
    fn decodes_string_escapes() {
        assert_eq!(
            kinds(r#""a\tb\x41é\101\N{BULLET}\q""#)[0],
            TokenKind::String("a\tbAé\u{41}\u{2022}\\q".to_string())
        );
        assert_eq!(
            kinds("'''multi\nline'''")[0],
            TokenKind::String("multi\nline".to_string())
        );
        assert_eq!(kinds("''")[0], TokenKind::String(String::new()));
    }

    #[test]
    fn string_errors() {
        let err = tokenize("x = 'abc\n'").expect_err("newline ends string");
        assert_eq!(err, LexError::UnterminatedString { span: Span::new(4, 5) });

        let err = tokenize(r#""\x4""#).expect_err("short hex");
        assert_eq!(
            err.to_string(),
            "(unicode error) 'unicodeescape' codec can't decode bytes, truncated \\xXX escape"
        );

        let err = tokenize(r#""\N{NOT A REAL NAME}""#).expect_err("unknown name");
        assert!(err.to_string().contains("unknown Unicode character name"));

        let err = tokenize(r#""\N""#).expect_err("malformed name");
        assert!(err.to_string().contains("malformed \\N character escape"));

        let err = tokenize("'''open").expect_err("triple");
        assert_eq!(err.to_string(), "unterminated triple-quoted string literal");
    }

    #[test]
    fn reports_invalid_character_code_point() {
        let err = tokenize("a = `").expect_err("backtick");
        assert_eq!(err.to_string(), "invalid character '`' (U+00000060)");
        assert_eq!(err.span(), Span::new(4, 5));
    }
}
