//! Turns a token stream back into source text.
//!
//! The output is not the original formatting: tokens are separated by single
//! spaces and literals are spelled canonically. Lexing the result again
//! yields a stream that parses to the same tree.

use crate::lexer::{is_identifier_continue, is_identifier_start};
use crate::token::{Keyword, Number, Token, TokenKind};

pub fn untokenize(tokens: &[Token]) -> String {
    let mut output = String::new();
    let mut line_start = true;

    for token in tokens {
        let text = match token.kind() {
            TokenKind::EOF => break,
            TokenKind::Newline => {
                output.push('\n');
                line_start = true;
                continue;
            }
            TokenKind::Number(number) => spell_number(*number),
            TokenKind::String(value) => spell_string(value),
            TokenKind::Identifier(name) if !is_plain_identifier(name) => format!("${name}"),
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Keyword(keyword) => keyword.as_str().to_string(),
            other => other.symbol().unwrap_or_default().to_string(),
        };
        if !line_start {
            output.push(' ');
        }
        output.push_str(&text);
        line_start = false;
    }
    output
}

fn spell_number(number: Number) -> String {
    match number {
        Number::Int(value) => value.to_string(),
        Number::Float(value) => spell_float(value),
        Number::Imaginary(value) => format!("{}j", spell_float(value)),
    }
}

/// Always carries a `.` or an exponent so it lexes back as a float.
fn spell_float(value: f64) -> String {
    if value.is_infinite() {
        return "1e999".to_string();
    }
    format!("{value:?}")
}

fn spell_string(value: &str) -> String {
    let mut spelled = String::with_capacity(value.len() + 2);
    spelled.push('"');
    for ch in value.chars() {
        match ch {
            '"' => spelled.push_str("\\\""),
            '\\' => spelled.push_str("\\\\"),
            '\n' => spelled.push_str("\\n"),
            '\r' => spelled.push_str("\\r"),
            '\t' => spelled.push_str("\\t"),
            c if c.is_control() && u32::from(c) <= 0xff => {
                spelled.push_str(&format!("\\x{:02x}", u32::from(c)));
            }
            c if c.is_control() => spelled.push_str(&format!("\\U{:08x}", u32::from(c))),
            c => spelled.push(c),
        }
    }
    spelled.push('"');
    spelled
}

/// True when `name` can be written back without escaping.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(is_identifier_start)
        && chars.all(is_identifier_continue)
        && Keyword::lookup(name).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_tokens;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn round_trips(source: &str) {
        let tokens = tokenize(source).expect("source should tokenize");
        let text = untokenize(&tokens);
        let again = tokenize(&text).expect("untokenized text should tokenize");
        assert_eq!(
            parse_tokens(again).expect("untokenized text should parse"),
            parse_tokens(tokens).expect("source should parse"),
            "untokenized text:\n{text}"
        );
    }

    #[test]
    fn spells_tokens_canonically() {
        let tokens = tokenize("x = 0x1A + 2.5e3 + 'it\\'s'\n$if += 1_000").expect("tokenize");
        assert_eq!(
            untokenize(&tokens),
            "x = 26 + 2500.0 + \"it's\"\n$if += 1000"
        );
    }

    #[test]
    fn round_trips_programs() {
        round_trips(indoc! {r#"
            func add(a, b = 2) {
                return a + b
            }
            for (i = 0; i < 3; i++) {
                print(add(i), "tab\there")
            } else {
                y = [1, 2.0, 3j][-1:]
            }
            switch (x) {
                case 1:
                    z = {"k": none}
                    break
                default:
                    z = {1, 2}
            }
        "#});
        round_trips("class A extends B { $class = 1 }\nr = a ?? b ? c : d");
    }

    #[test]
    fn recognizes_plain_identifiers() {
        assert!(is_plain_identifier("name_1"));
        assert!(!is_plain_identifier("while"));
        assert!(!is_plain_identifier("1x"));
    }
}
