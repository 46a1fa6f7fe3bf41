use std::fmt;

/// Byte range into the owning source buffer.
///
/// A span whose `start` lies past its `end` is positionless. Synthetic nodes
/// and top-level frames carry one, and rendering code treats it as empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const POSITIONLESS: Span = Span {
        start: usize::MAX,
        end: 0,
    };

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn point(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Covers both spans. A positionless side yields the other side.
    pub fn to(self, other: Span) -> Span {
        if self.start > self.end {
            return other;
        }
        if other.start > other.end {
            return self;
        }
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// True when the span cannot be located inside a buffer of `len` bytes.
    pub fn is_positionless(&self, len: usize) -> bool {
        self.start > self.end || self.end > len + 1
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::POSITIONLESS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Debug,
    False,
    None,
    True,
    And,
    As,
    Assert,
    Break,
    Case,
    Catch,
    Class,
    Continue,
    Default,
    Del,
    Do,
    Elif,
    Else,
    Extends,
    Finally,
    For,
    From,
    Func,
    Global,
    If,
    Import,
    In,
    Is,
    Not,
    Of,
    Or,
    Return,
    Switch,
    Throw,
    Try,
    While,
    With,
}

impl Keyword {
    pub fn lookup(word: &str) -> Option<Keyword> {
        let keyword = match word {
            "__debug__" => Keyword::Debug,
            "False" | "false" => Keyword::False,
            "None" | "none" => Keyword::None,
            "True" | "true" => Keyword::True,
            "and" => Keyword::And,
            "as" => Keyword::As,
            "assert" => Keyword::Assert,
            "break" => Keyword::Break,
            "case" => Keyword::Case,
            "catch" => Keyword::Catch,
            "class" => Keyword::Class,
            "continue" => Keyword::Continue,
            "default" => Keyword::Default,
            "del" => Keyword::Del,
            "do" => Keyword::Do,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "extends" => Keyword::Extends,
            "finally" => Keyword::Finally,
            "for" => Keyword::For,
            "from" => Keyword::From,
            "func" | "function" => Keyword::Func,
            "global" => Keyword::Global,
            "if" => Keyword::If,
            "import" => Keyword::Import,
            "in" => Keyword::In,
            "is" => Keyword::Is,
            "not" => Keyword::Not,
            "of" => Keyword::Of,
            "or" => Keyword::Or,
            "return" => Keyword::Return,
            "switch" => Keyword::Switch,
            "throw" => Keyword::Throw,
            "try" => Keyword::Try,
            "while" => Keyword::While,
            "with" => Keyword::With,
            _ => return None,
        };
        Some(keyword)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Debug => "__debug__",
            Keyword::False => "False",
            Keyword::None => "None",
            Keyword::True => "True",
            Keyword::And => "and",
            Keyword::As => "as",
            Keyword::Assert => "assert",
            Keyword::Break => "break",
            Keyword::Case => "case",
            Keyword::Catch => "catch",
            Keyword::Class => "class",
            Keyword::Continue => "continue",
            Keyword::Default => "default",
            Keyword::Del => "del",
            Keyword::Do => "do",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::Extends => "extends",
            Keyword::Finally => "finally",
            Keyword::For => "for",
            Keyword::From => "from",
            Keyword::Func => "func",
            Keyword::Global => "global",
            Keyword::If => "if",
            Keyword::Import => "import",
            Keyword::In => "in",
            Keyword::Is => "is",
            Keyword::Not => "not",
            Keyword::Of => "of",
            Keyword::Or => "or",
            Keyword::Return => "return",
            Keyword::Switch => "switch",
            Keyword::Throw => "throw",
            Keyword::Try => "try",
            Keyword::While => "while",
            Keyword::With => "with",
        }
    }
}

/// Decoded numeric literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
    /// Imaginary part of a `j`-suffixed literal.
    Imaginary(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(Number),
    String(String),
    Identifier(String),
    Keyword(Keyword),

    // Operators
    Plus,           // +
    PlusEqual,      // +=
    PlusPlus,       // ++
    Minus,          // -
    MinusEqual,     // -=
    MinusMinus,     // --
    Star,           // *
    StarEqual,      // *=
    StarStar,       // **
    StarStarEqual,  // **=
    Slash,          // /
    SlashEqual,     // /=
    SlashSlash,     // //
    SlashSlashEqual, // //=
    Percent,        // %
    PercentEqual,   // %=
    Amp,            // &
    AmpEqual,       // &=
    AmpAmp,         // &&
    Pipe,           // |
    PipeEqual,      // |=
    PipePipe,       // ||
    Caret,          // ^
    CaretEqual,     // ^=
    Tilde,          // ~
    TildeEqual,     // ~=
    TildeBang,      // ~!
    Bang,           // !
    BangEqual,      // !=
    Equal,          // =
    EqualEqual,     // ==
    Colon,          // :
    ColonEqual,     // :=
    Less,           // <
    LessEqual,      // <=
    LessLess,       // <<
    LessLessEqual,  // <<=
    Greater,        // >
    GreaterEqual,   // >=
    GreaterGreater, // >>
    GreaterGreaterEqual, // >>=
    Question,       // ?
    QuestionQuestion, // ??
    At,             // @
    AtEqual,        // @=

    // Delimiters
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    LBrace,    // {
    RBrace,    // }
    Comma,     // ,
    Semicolon, // ;
    Dot,       // .
    Ellipsis,  // ...

    // Structural
    Newline,
    EOF,
}

impl TokenKind {
    /// Source spelling of operator and delimiter tokens.
    pub fn symbol(&self) -> Option<&'static str> {
        let symbol = match self {
            TokenKind::Plus => "+",
            TokenKind::PlusEqual => "+=",
            TokenKind::PlusPlus => "++",
            TokenKind::Minus => "-",
            TokenKind::MinusEqual => "-=",
            TokenKind::MinusMinus => "--",
            TokenKind::Star => "*",
            TokenKind::StarEqual => "*=",
            TokenKind::StarStar => "**",
            TokenKind::StarStarEqual => "**=",
            TokenKind::Slash => "/",
            TokenKind::SlashEqual => "/=",
            TokenKind::SlashSlash => "//",
            TokenKind::SlashSlashEqual => "//=",
            TokenKind::Percent => "%",
            TokenKind::PercentEqual => "%=",
            TokenKind::Amp => "&",
            TokenKind::AmpEqual => "&=",
            TokenKind::AmpAmp => "&&",
            TokenKind::Pipe => "|",
            TokenKind::PipeEqual => "|=",
            TokenKind::PipePipe => "||",
            TokenKind::Caret => "^",
            TokenKind::CaretEqual => "^=",
            TokenKind::Tilde => "~",
            TokenKind::TildeEqual => "~=",
            TokenKind::TildeBang => "~!",
            TokenKind::Bang => "!",
            TokenKind::BangEqual => "!=",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::Colon => ":",
            TokenKind::ColonEqual => ":=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::LessLess => "<<",
            TokenKind::LessLessEqual => "<<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::GreaterGreater => ">>",
            TokenKind::GreaterGreaterEqual => ">>=",
            TokenKind::Question => "?",
            TokenKind::QuestionQuestion => "??",
            TokenKind::At => "@",
            TokenKind::AtEqual => "@=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Ellipsis => "...",
            _ => return None,
        };
        Some(symbol)
    }

    pub fn is_keyword(&self, keyword: Keyword) -> bool {
        matches!(self, TokenKind::Keyword(found) if *found == keyword)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Number(_) => write!(f, "number"),
            TokenKind::String(_) => write!(f, "string"),
            TokenKind::Identifier(name) => write!(f, "identifier '{name}'"),
            TokenKind::Keyword(keyword) => write!(f, "'{}'", keyword.as_str()),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::EOF => write!(f, "end of file"),
            other => write!(f, "'{}'", other.symbol().unwrap_or("?")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn kind(&self) -> &TokenKind {
        &self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_aliases_share_a_variant() {
        assert_eq!(Keyword::lookup("function"), Some(Keyword::Func));
        assert_eq!(Keyword::lookup("func"), Some(Keyword::Func));
        assert_eq!(Keyword::lookup("none"), Some(Keyword::None));
        assert_eq!(Keyword::lookup("print"), None);
    }

    #[test]
    fn positionless_span_absorbs_into_merge() {
        let span = Span::new(3, 7);
        assert_eq!(Span::POSITIONLESS.to(span), span);
        assert_eq!(span.to(Span::POSITIONLESS), span);
        assert_eq!(Span::new(1, 2).to(Span::new(5, 9)), Span::new(1, 9));
        assert!(Span::POSITIONLESS.is_positionless(100));
        assert!(Span::new(0, 50).is_positionless(10));
        assert!(!Span::new(0, 11).is_positionless(10));
    }
}
