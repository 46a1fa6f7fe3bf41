//! Traceback text for unhandled faults.
//!
//! Frames are listed outermost first, each with the offending source line
//! and a `^` underline. Chained faults (`previous`/`cause`) are rendered
//! before the fault that interrupted them.

use std::fmt::Write;
use std::rc::Rc;

use crate::runtime::context::Context;
use crate::runtime::exception::Fault;
use crate::token::Span;

/// Frames repeated back to back beyond this many are summarized.
const REPEAT_THRESHOLD: usize = 3;

/// Longest span excerpt shown in full.
const MAX_EXCERPT_LINES: usize = 5;

const CAUSE_SEPARATOR: &str =
    "\nThe above exception was the direct cause of the following exception:\n\n";
const CONTEXT_SEPARATOR: &str =
    "\nDuring handling of the above exception, another exception occurred:\n\n";

pub fn render(fault: &Fault) -> String {
    let mut text = String::new();
    render_chain(&mut text, fault);
    text
}

fn render_chain(text: &mut String, fault: &Fault) {
    if let Some(cause) = &fault.cause {
        render_chain(text, cause);
        text.push_str(CAUSE_SEPARATOR);
    } else if let Some(previous) = &fault.previous {
        render_chain(text, previous);
        text.push_str(CONTEXT_SEPARATOR);
    }

    text.push_str("Traceback (most recent call last):\n");
    let mut last: Option<(Rc<str>, Option<usize>, String)> = None;
    let mut repeats = 0;
    for (context, span) in frames(fault) {
        let line = line_number(&context.source, span);
        let name = context
            .qualname
            .clone()
            .unwrap_or_else(|| context.name.clone());
        let key = (context.file.clone(), line, name);
        if last.as_ref() == Some(&key) {
            repeats += 1;
            if repeats >= REPEAT_THRESHOLD {
                continue;
            }
        } else {
            flush_repeats(text, repeats);
            repeats = 0;
        }
        render_frame(text, &key.0, line, &key.2, &context.source, span);
        last = Some(key);
    }
    flush_repeats(text, repeats);
    let _ = writeln!(text, "{fault}");
}

fn flush_repeats(text: &mut String, repeats: usize) {
    if repeats < REPEAT_THRESHOLD {
        return;
    }
    let hidden = repeats + 1 - REPEAT_THRESHOLD;
    let _ = writeln!(
        text,
        "  [Previous line repeated {hidden} more time{}]",
        if hidden == 1 { "" } else { "s" }
    );
}

/// Frames of `fault` with the span active in each, outermost first.
fn frames(fault: &Fault) -> Vec<(Rc<Context>, Span)> {
    let mut frames = Vec::new();
    let mut context = Some(fault.context.clone());
    let mut span = fault.span;
    while let Some(current) = context {
        let entry = current.entry_span;
        context = current.parent.clone();
        frames.push((current, span));
        span = entry;
    }
    frames.reverse();
    frames
}

fn line_number(source: &str, span: Span) -> Option<usize> {
    if span.is_positionless(source.len()) {
        return None;
    }
    let start = floor_boundary(source, span.start);
    Some(source[..start].matches('\n').count() + 1)
}

fn render_frame(
    text: &mut String,
    file: &str,
    line: Option<usize>,
    name: &str,
    source: &str,
    span: Span,
) {
    match line {
        Some(line) => {
            let _ = writeln!(text, "  File \"{file}\", line {line}, in {name}");
        }
        None => {
            let _ = writeln!(text, "  File \"{file}\", in {name}");
            return;
        }
    }
    for excerpt in excerpt(source, span) {
        let _ = writeln!(text, "    {excerpt}");
    }
}

/// Largest char boundary at or before `index`, clamped to the text.
fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Source lines covered by `span`, each followed by its underline.
fn excerpt(source: &str, span: Span) -> Vec<String> {
    let start = floor_boundary(source, span.start);
    let end = floor_boundary(source, span.end.max(span.start));
    let first_line = source[..start].rfind('\n').map_or(0, |newline| newline + 1);
    let last_byte = if end > start { end - 1 } else { start };

    // Pairs of (line text, underlined byte range within the line).
    let mut lines = Vec::new();
    let mut line_start = first_line;
    loop {
        let line_end = source[line_start..]
            .find('\n')
            .map_or(source.len(), |offset| line_start + offset);
        let line = &source[line_start..line_end];
        let from = start.max(line_start) - line_start;
        let to = if end > line_end || end == start {
            line.len()
        } else {
            end - line_start
        };
        lines.push((line, from, to.max(from)));
        if last_byte <= line_end || line_end >= source.len() {
            break;
        }
        line_start = line_end + 1;
    }

    if let [(line, from, to)] = lines.as_slice() {
        if start == end || start >= source.len() {
            return single_line(line, *from, *from + 1);
        }
        return single_line(line, *from, *to);
    }

    let count = lines.len();
    let mut rendered = Vec::new();
    for (index, (line, from, to)) in lines.iter().enumerate() {
        if count > MAX_EXCERPT_LINES && index == 2 {
            rendered.push(format!("...<{} lines>...", count - 4));
        }
        if count > MAX_EXCERPT_LINES && (2..count - 2).contains(&index) {
            continue;
        }
        let from = if index == 0 {
            *from
        } else {
            line.len() - line.trim_start().len()
        };
        let line = line.trim_end().replace('\t', " ");
        let to = (*to).min(line.len());
        rendered.push(line.clone());
        if to > from {
            rendered.push(underline(&line, from, to));
        }
    }
    rendered
}

/// One dedented line and its underline.
fn single_line(line: &str, from: usize, to: usize) -> Vec<String> {
    let indent = line.len() - line.trim_start().len();
    let stripped = line.trim().replace('\t', " ");
    let from = from.saturating_sub(indent).min(stripped.len());
    let to = to.saturating_sub(indent).min(stripped.len()).max(from);
    let marker = underline(&stripped, from, to.max(from + 1));
    vec![stripped, marker]
}

/// Spaces up to byte `from`, then carets through byte `to`, both counted
/// in characters.
fn underline(line: &str, from: usize, to: usize) -> String {
    let from = floor_boundary(line, from);
    let width_to = floor_boundary(line, to);
    let lead = line[..from].chars().count();
    let width = line[from..width_to].chars().count().max(1);
    format!("{}{}", " ".repeat(lead), "^".repeat(width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::interpreter::Interpreter;
    use crate::parser::Mode;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn traceback(source: &str) -> String {
        let fault = Interpreter::new(Config::default())
            .execute("test.pys", source, Mode::Exec)
            .expect_err("program should fail");
        render(&fault)
    }

    #[test]
    fn frames_are_listed_outermost_first() {
        assert_eq!(
            traceback(indoc! {"
                func fail(n) {
                    return 1 / n
                }
                fail(0)
            "}),
            indoc! {r#"
                Traceback (most recent call last):
                  File "test.pys", line 4, in <program>
                    fail(0)
                    ^^^^^^^
                  File "test.pys", line 2, in fail
                    return 1 / n
                           ^^^^^
                ZeroDivisionError: division by zero
            "#}
        );
    }

    #[test]
    fn builtin_faults_point_at_their_call_site() {
        assert_eq!(
            traceback(indoc! {r#"
                func parse(text) {
                    return int(text)
                }
                parse("a")
            "#}),
            indoc! {r#"
                Traceback (most recent call last):
                  File "test.pys", line 4, in <program>
                    parse("a")
                    ^^^^^^^^^^
                  File "test.pys", line 2, in parse
                    return int(text)
                           ^^^^^^^^^
                ValueError: invalid literal for int() with base 10: 'a'
            "#}
        );
    }

    #[test]
    fn long_spans_are_elided() {
        let source = "x = [\n1,\n2,\n3,\n4,\n5,\n6] + 1\n";
        let text = traceback(source);
        assert!(text.contains("    x = [\n"), "{text}");
        assert!(text.contains("    ...<3 lines>...\n"), "{text}");
        assert!(text.contains("    6] + 1\n"), "{text}");
        assert!(
            text.ends_with("TypeError: unsupported operand type(s) for +: 'list' and 'int'\n"),
            "{text}"
        );
    }

    #[test]
    fn deep_recursion_collapses_repeated_frames() {
        let fault = Interpreter::new(Config {
            recursion_limit: 20,
            ..Config::default()
        })
        .execute("test.pys", "func f(n) { return f(n + 1) }\nf(0)", Mode::Exec)
        .expect_err("recursion should fail");
        let text = render(&fault);
        assert_eq!(text.matches("in f\n").count(), REPEAT_THRESHOLD);
        assert!(text.contains("  [Previous line repeated 17 more times]\n"), "{text}");
        assert!(text.ends_with("RecursionError: maximum recursion depth exceeded\n"));
    }

    #[test]
    fn explicit_causes_render_first() {
        let text = traceback(indoc! {r#"
            try {
                throw TypeError("inner")
            } catch (error) {
                throw ValueError("outer") from error
            }
        "#});
        let cause = text.find("TypeError: inner").expect("cause is rendered");
        let separator = text
            .find("The above exception was the direct cause of the following exception:")
            .expect("separator is rendered");
        assert!(cause < separator);
        assert!(text.ends_with("ValueError: outer\n"));
        assert_eq!(text.matches("Traceback (most recent call last):").count(), 2);
    }

    #[test]
    fn excerpt_handles_points_and_columns() {
        assert_eq!(excerpt("  abc\n", Span::point(4)), vec!["abc", "  ^"]);
        assert_eq!(excerpt("a = é + 1", Span::new(4, 10)), vec!["a = é + 1", "    ^^^^^"]);
        assert_eq!(line_number("a\nb\nc", Span::point(4)), Some(3));
        assert_eq!(line_number("a", Span::POSITIONLESS), None);
    }
}
