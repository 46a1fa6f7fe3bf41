//! Methods of built-in values, looked up by attribute access and bound to
//! their receiver.

use std::cell::RefCell;
use std::rc::Rc;

use crate::interpreter::{Interpreter, position};
use crate::runtime::context::CallSite;
use crate::runtime::dict::Dict;
use crate::runtime::error::RuntimeError;
use crate::runtime::value::{Arguments, BuiltinFn, Value};

use super::sort_values;

type Table = &'static [(&'static str, BuiltinFn)];

const LIST: Table = &[
    ("append", list_append),
    ("pop", list_pop),
    ("insert", list_insert),
    ("extend", list_extend),
    ("index", list_index),
    ("copy", list_copy),
    ("remove", list_remove),
    ("count", list_count),
    ("clear", list_clear),
    ("reverse", list_reverse),
    ("sort", list_sort),
];

const DICT: Table = &[
    ("get", dict_get),
    ("keys", dict_keys),
    ("values", dict_values),
    ("items", dict_items),
    ("pop", dict_pop),
    ("update", dict_update),
    ("clear", dict_clear),
    ("copy", dict_copy),
];

const STR: Table = &[
    ("upper", str_upper),
    ("lower", str_lower),
    ("strip", str_strip),
    ("lstrip", str_lstrip),
    ("rstrip", str_rstrip),
    ("split", str_split),
    ("join", str_join),
    ("replace", str_replace),
    ("startswith", str_startswith),
    ("endswith", str_endswith),
    ("find", str_find),
    ("count", str_count),
    ("format", str_format),
];

const SET: Table = &[
    ("add", set_add),
    ("remove", set_remove),
    ("discard", set_discard),
    ("copy", set_copy),
    ("clear", dict_clear),
];

/// The method `name` of a built-in value, bound to it.
fn table(receiver: &Value) -> Option<Table> {
    match receiver {
        Value::List(_) => Some(LIST),
        Value::Dict(_) => Some(DICT),
        Value::Str(_) => Some(STR),
        Value::Set(_) => Some(SET),
        _ => None,
    }
}

pub fn method(receiver: &Value, name: &str) -> Option<Value> {
    let &(name, function) = table(receiver)?
        .iter()
        .find(|(candidate, _)| *candidate == name)?;
    Some(Value::bound(receiver.clone(), Value::builtin(name, function)))
}

/// Names of the built-in methods `receiver` offers.
pub fn method_names(receiver: &Value) -> Vec<&'static str> {
    table(receiver).map_or_else(Vec::new, |table| table.iter().map(|&(name, _)| name).collect())
}

/// Splits a method call into its receiver and between `min` and `max`
/// further positional arguments.
fn receive(
    arguments: Arguments,
    function: &str,
    min: usize,
    max: usize,
) -> Result<(Value, Vec<Value>), RuntimeError> {
    arguments.reject_keywords(function)?;
    let mut positional = arguments.positional.into_iter();
    let receiver = positional.next().unwrap_or(Value::None);
    let rest: Vec<Value> = positional.collect();
    if min == max {
        RuntimeError::expect_arity(function, min, rest.len())?;
    } else if rest.len() < min {
        return Err(RuntimeError::Type(format!(
            "{function}() expected at least {min} argument{}, got {}",
            if min == 1 { "" } else { "s" },
            rest.len()
        )));
    } else {
        RuntimeError::expect_at_most(function, max, rest.len())?;
    }
    Ok((receiver, rest))
}

fn wrong_receiver(function: &str, expected: &str, receiver: &Value) -> RuntimeError {
    RuntimeError::Type(format!(
        "descriptor '{function}' requires a '{expected}' object but received a '{}'",
        receiver.type_name()
    ))
}

fn list_of(receiver: &Value, function: &str) -> Result<Rc<RefCell<Vec<Value>>>, RuntimeError> {
    match receiver {
        Value::List(items) => Ok(items.clone()),
        other => Err(wrong_receiver(function, "list", other)),
    }
}

fn dict_of(receiver: &Value, function: &str) -> Result<Rc<RefCell<Dict>>, RuntimeError> {
    match receiver {
        Value::Dict(dict) | Value::Set(dict) => Ok(dict.clone()),
        other => Err(wrong_receiver(function, "dict", other)),
    }
}

fn str_of(receiver: &Value, function: &str) -> Result<Rc<str>, RuntimeError> {
    match receiver {
        Value::Str(text) => Ok(text.clone()),
        other => Err(wrong_receiver(function, "str", other)),
    }
}

fn text_argument(value: &Value, function: &str) -> Result<Rc<str>, RuntimeError> {
    match value {
        Value::Str(text) => Ok(text.clone()),
        other => Err(RuntimeError::Type(format!(
            "{function}() argument must be str, not {}",
            other.type_name()
        ))),
    }
}

fn integer_argument(value: &Value) -> Result<i64, RuntimeError> {
    value.as_int().ok_or_else(|| {
        RuntimeError::Type(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

fn list_append(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "append", 1, 1)?;
    list_of(&receiver, "append")?.borrow_mut().extend(rest);
    Ok(Value::None)
}

fn list_pop(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "pop", 0, 1)?;
    let items = list_of(&receiver, "pop")?;
    let mut items = items.borrow_mut();
    if items.is_empty() {
        return Err(RuntimeError::PopFromEmpty { type_name: "list" });
    }
    let index = match rest.first() {
        Some(index) => position(index, items.len(), "pop")?,
        None => items.len() - 1,
    };
    Ok(items.remove(index))
}

fn list_insert(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, mut rest) = receive(arguments, "insert", 2, 2)?;
    let value = rest.pop().unwrap_or(Value::None);
    let index = rest.first().map_or(Ok(0), integer_argument)?;
    let items = list_of(&receiver, "insert")?;
    let mut items = items.borrow_mut();
    let len = i64::try_from(items.len()).map_err(|_| RuntimeError::Overflow)?;
    let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
    items.insert(at as usize, value);
    Ok(Value::None)
}

fn list_extend(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "extend", 1, 1)?;
    let items = list_of(&receiver, "extend")?;
    let mut extra = Vec::new();
    for iterable in &rest {
        extra.extend(interpreter.collect(site, iterable)?);
    }
    items.borrow_mut().extend(extra);
    Ok(Value::None)
}

/// Position of the first item equal to `item`, under script equality.
fn find_item(
    interpreter: &mut Interpreter,
    site: &CallSite,
    items: &[Value],
    item: &Value,
) -> Result<Option<usize>, RuntimeError> {
    for (index, candidate) in items.iter().enumerate() {
        if interpreter.equality(site, candidate, item)? {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

fn list_index(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "index", 1, 1)?;
    let items = list_of(&receiver, "index")?.borrow().clone();
    let item = &rest[0];
    match find_item(interpreter, site, &items, item)? {
        Some(index) => i64::try_from(index).map(Value::Int).map_err(|_| RuntimeError::Overflow),
        None => Err(RuntimeError::Value(format!(
            "{} is not in list",
            interpreter.repr(site, item)?
        ))),
    }
}

fn list_copy(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "copy", 0, 0)?;
    let items = list_of(&receiver, "copy")?.borrow().clone();
    Ok(Value::list(items))
}

fn list_remove(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "remove", 1, 1)?;
    let list = list_of(&receiver, "remove")?;
    let items = list.borrow().clone();
    match find_item(interpreter, site, &items, &rest[0])? {
        Some(index) => {
            list.borrow_mut().remove(index);
            Ok(Value::None)
        }
        None => Err(RuntimeError::Value("list.remove(x): x not in list".to_string())),
    }
}

fn list_count(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "count", 1, 1)?;
    let items = list_of(&receiver, "count")?.borrow().clone();
    let mut count = 0;
    for candidate in &items {
        if interpreter.equality(site, candidate, &rest[0])? {
            count += 1;
        }
    }
    Ok(Value::Int(count))
}

fn list_clear(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "clear", 0, 0)?;
    list_of(&receiver, "clear")?.borrow_mut().clear();
    Ok(Value::None)
}

fn list_reverse(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "reverse", 0, 0)?;
    list_of(&receiver, "reverse")?.borrow_mut().reverse();
    Ok(Value::None)
}

fn list_sort(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let key = arguments.take_keyword("key");
    let reverse = arguments.take_keyword("reverse");
    let (receiver, _) = receive(arguments, "sort", 0, 0)?;
    let list = list_of(&receiver, "sort")?;
    let items = list.borrow().clone();
    let sorted = sort_values(interpreter, site, items, key, reverse)?;
    *list.borrow_mut() = sorted;
    Ok(Value::None)
}

fn dict_get(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "get", 1, 2)?;
    let found = dict_of(&receiver, "get")?.borrow().get(&rest[0])?;
    Ok(found.or_else(|| rest.get(1).cloned()).unwrap_or(Value::None))
}

fn dict_keys(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "keys", 0, 0)?;
    Ok(Value::list(dict_of(&receiver, "keys")?.borrow().keys()))
}

fn dict_values(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "values", 0, 0)?;
    Ok(Value::list(dict_of(&receiver, "values")?.borrow().values()))
}

fn dict_items(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "items", 0, 0)?;
    Ok(Value::list(dict_of(&receiver, "items")?.borrow().items()))
}

fn dict_pop(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "pop", 1, 2)?;
    let removed = dict_of(&receiver, "pop")?.borrow_mut().remove(&rest[0])?;
    match (removed, rest.get(1)) {
        (Some(value), _) => Ok(value),
        (None, Some(default)) => Ok(default.clone()),
        (None, None) => Err(RuntimeError::MissingKey {
            key: interpreter.repr(site, &rest[0])?,
        }),
    }
}

fn dict_update(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let keywords = std::mem::take(&mut arguments.keywords);
    let (receiver, rest) = receive(arguments, "update", 0, 1)?;
    let dict = dict_of(&receiver, "update")?;
    let mut entries: Vec<(Value, Value)> = match rest.first() {
        Some(source) => super::dict_from(interpreter, site, source)?
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        None => Vec::new(),
    };
    entries.extend(keywords.into_iter().map(|(key, value)| (Value::str(key), value)));
    let mut dict = dict.borrow_mut();
    for (key, value) in entries {
        dict.insert(key, value)?;
    }
    Ok(Value::None)
}

fn dict_clear(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "clear", 0, 0)?;
    dict_of(&receiver, "clear")?.borrow_mut().clear();
    Ok(Value::None)
}

fn dict_copy(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "copy", 0, 0)?;
    Ok(Value::dict(dict_of(&receiver, "copy")?.borrow().clone()))
}

fn set_add(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, mut rest) = receive(arguments, "add", 1, 1)?;
    let item = rest.pop().unwrap_or(Value::None);
    dict_of(&receiver, "add")?.borrow_mut().insert(item, Value::None)?;
    Ok(Value::None)
}

fn set_remove(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "remove", 1, 1)?;
    let removed = dict_of(&receiver, "remove")?.borrow_mut().remove(&rest[0])?;
    match removed {
        Some(_) => Ok(Value::None),
        None => Err(RuntimeError::MissingKey {
            key: interpreter.repr(site, &rest[0])?,
        }),
    }
}

fn set_discard(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "discard", 1, 1)?;
    dict_of(&receiver, "discard")?.borrow_mut().remove(&rest[0])?;
    Ok(Value::None)
}

fn set_copy(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "copy", 0, 0)?;
    Ok(Value::set(dict_of(&receiver, "copy")?.borrow().clone()))
}

fn str_upper(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "upper", 0, 0)?;
    Ok(Value::str(str_of(&receiver, "upper")?.to_uppercase()))
}

fn str_lower(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, _) = receive(arguments, "lower", 0, 0)?;
    Ok(Value::str(str_of(&receiver, "lower")?.to_lowercase()))
}

#[derive(Clone, Copy)]
enum Side {
    Both,
    Start,
    End,
}

fn strip(arguments: Arguments, function: &str, side: Side) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, function, 0, 1)?;
    let text = str_of(&receiver, function)?;
    let characters: Option<Vec<char>> = match rest.first() {
        None | Some(Value::None) => None,
        Some(value) => Some(text_argument(value, function)?.chars().collect()),
    };
    let matches = |c: char| match &characters {
        Some(set) => set.contains(&c),
        None => c.is_whitespace(),
    };
    let stripped = match side {
        Side::Both => text.trim_matches(matches),
        Side::Start => text.trim_start_matches(matches),
        Side::End => text.trim_end_matches(matches),
    };
    Ok(Value::str(stripped))
}

fn str_strip(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    strip(arguments, "strip", Side::Both)
}

fn str_lstrip(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    strip(arguments, "lstrip", Side::Start)
}

fn str_rstrip(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    strip(arguments, "rstrip", Side::End)
}

fn str_split(_: &mut Interpreter, _: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let separator = arguments.take_keyword("sep");
    let limit = arguments.take_keyword("maxsplit");
    let (receiver, rest) = receive(arguments, "split", 0, 2)?;
    let text = str_of(&receiver, "split")?;
    let mut rest = rest.into_iter();
    let separator = rest.next().or(separator).filter(|value| !value.is_none());
    let limit = match rest.next().or(limit) {
        Some(value) => integer_argument(&value)?,
        None => -1,
    };
    let limit = usize::try_from(limit).ok();

    let parts: Vec<Value> = match separator {
        None => {
            let mut parts = Vec::new();
            let mut remaining = text.trim_start();
            while !remaining.is_empty() {
                if limit.is_some_and(|limit| parts.len() == limit) {
                    parts.push(Value::str(remaining.trim_end()));
                    break;
                }
                let end = remaining.find(char::is_whitespace).unwrap_or(remaining.len());
                parts.push(Value::str(&remaining[..end]));
                remaining = remaining[end..].trim_start();
            }
            parts
        }
        Some(separator) => {
            let separator = text_argument(&separator, "split")?;
            if separator.is_empty() {
                return Err(RuntimeError::Value("empty separator".to_string()));
            }
            match limit {
                Some(limit) => text
                    .splitn(limit + 1, &*separator)
                    .map(Value::str)
                    .collect(),
                None => text.split(&*separator).map(Value::str).collect(),
            }
        }
    };
    Ok(Value::list(parts))
}

fn str_join(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "join", 1, 1)?;
    let separator = str_of(&receiver, "join")?;
    let items = interpreter.collect(site, &rest[0])?;
    let mut parts = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Str(text) => parts.push(text.to_string()),
            other => {
                return Err(RuntimeError::Type(format!(
                    "sequence item {index}: expected str instance, {} found",
                    other.type_name()
                )));
            }
        }
    }
    Ok(Value::str(parts.join(&*separator)))
}

fn str_replace(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "replace", 2, 3)?;
    let text = str_of(&receiver, "replace")?;
    let old = text_argument(&rest[0], "replace")?;
    let new = text_argument(&rest[1], "replace")?;
    let replaced = match rest.get(2).map(integer_argument).transpose()? {
        Some(count) if count >= 0 => text.replacen(&*old, &new, count as usize),
        _ => text.replace(&*old, &new),
    };
    Ok(Value::str(replaced))
}

/// Checks `test` against a string prefix/suffix argument or a tuple of them.
fn affix(arguments: Arguments, function: &str, test: fn(&str, &str) -> bool) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, function, 1, 1)?;
    let text = str_of(&receiver, function)?;
    let candidates: Vec<Value> = match &rest[0] {
        Value::Tuple(items) => items.to_vec(),
        other => vec![other.clone()],
    };
    for candidate in &candidates {
        let candidate = text_argument(candidate, function).map_err(|_| {
            RuntimeError::Type(format!(
                "{function} first arg must be str or a tuple of str, not {}",
                candidate.type_name()
            ))
        })?;
        if test(&text, &candidate) {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn str_startswith(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    affix(arguments, "startswith", |text, prefix| text.starts_with(prefix))
}

fn str_endswith(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    affix(arguments, "endswith", |text, suffix| text.ends_with(suffix))
}

fn str_find(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "find", 1, 1)?;
    let text = str_of(&receiver, "find")?;
    let needle = text_argument(&rest[0], "find")?;
    // Character offsets, not byte offsets.
    let index = text
        .find(&*needle)
        .map_or(-1, |byte| text[..byte].chars().count() as i64);
    Ok(Value::Int(index))
}

fn str_count(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (receiver, rest) = receive(arguments, "count", 1, 1)?;
    let text = str_of(&receiver, "count")?;
    let needle = text_argument(&rest[0], "count")?;
    let count = if needle.is_empty() {
        text.chars().count() + 1
    } else {
        text.matches(&*needle).count()
    };
    i64::try_from(count).map(Value::Int).map_err(|_| RuntimeError::Overflow)
}

/// `str.format` with `{}`, `{0}`, `{name}`, the `!r`/`!s` conversions and
/// `{{`/`}}` escapes.
fn str_format(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let keywords = std::mem::take(&mut arguments.keywords);
    let mut positional = arguments.positional.into_iter();
    let template = match positional.next() {
        Some(receiver) => str_of(&receiver, "format")?,
        None => return Err(wrong_receiver("format", "str", &Value::None)),
    };
    let positional: Vec<Value> = positional.collect();

    let mut output = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut automatic = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                output.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                output.push('}');
            }
            '}' => {
                return Err(RuntimeError::Value(
                    "Single '}' encountered in format string".to_string(),
                ));
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => field.push(c),
                        None => {
                            return Err(RuntimeError::Value(
                                "Single '{' encountered in format string".to_string(),
                            ));
                        }
                    }
                }
                let (name, conversion) = match field.split_once('!') {
                    Some((name, conversion)) => (name, Some(conversion)),
                    None => (field.as_str(), None),
                };
                let value = if name.is_empty() {
                    let value = positional.get(automatic).cloned();
                    automatic += 1;
                    value.ok_or_else(|| {
                        RuntimeError::Value(format!(
                            "Replacement index {} out of range for positional args tuple",
                            automatic - 1
                        ))
                    })?
                } else if let Ok(index) = name.parse::<usize>() {
                    positional.get(index).cloned().ok_or_else(|| {
                        RuntimeError::Value(format!(
                            "Replacement index {index} out of range for positional args tuple"
                        ))
                    })?
                } else {
                    keywords
                        .iter()
                        .find(|(keyword, _)| keyword == name)
                        .map(|(_, value)| value.clone())
                        .ok_or_else(|| RuntimeError::MissingKey {
                            key: format!("'{name}'"),
                        })?
                };
                let text = match conversion {
                    None | Some("s") => interpreter.to_str(site, &value)?,
                    Some("r") => interpreter.repr(site, &value)?,
                    Some(other) => {
                        return Err(RuntimeError::Value(format!(
                            "Unknown conversion specifier {other}"
                        )));
                    }
                };
                output.push_str(&text);
            }
            c => output.push(c),
        }
    }
    Ok(Value::str(output))
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::interpreter::{Interpreter, OutputBuffer};
    use crate::parser::Mode;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn output(source: &str) -> String {
        let stdout = OutputBuffer::new();
        let mut interpreter = Interpreter::new(Config::default()).with_stdout(stdout.clone());
        if let Err(fault) = interpreter.execute("test.pys", source, Mode::Exec) {
            panic!("program failed: {fault}");
        }
        stdout.contents()
    }

    fn failure(source: &str) -> String {
        Interpreter::new(Config::default())
            .execute("test.pys", source, Mode::Exec)
            .expect_err("program should fail")
            .to_string()
    }

    #[test]
    fn list_methods() {
        assert_eq!(
            output(indoc! {"
                xs = [3, 1]
                xs.append(2)
                xs.insert(0, 9)
                xs.insert(-1, 7)
                xs.extend([5])
                print(xs, xs.pop(), xs.pop(0), xs.index(7))
                ys = xs.copy()
                ys.remove(1)
                ys.sort(reverse = true)
                print(xs, ys, xs.count(3))
            "}),
            indoc! {"
                [3, 1, 7, 2] 5 9 2
                [3, 1, 7, 2] [7, 3, 2] 1
            "}
        );
        assert_eq!(failure("[].pop()"), "IndexError: pop from empty list");
        assert_eq!(failure("[1].pop(5)"), "IndexError: pop index out of range");
        assert_eq!(failure("[1].index(2)"), "ValueError: 2 is not in list");
    }

    #[test]
    fn dict_and_set_methods() {
        assert_eq!(
            output(indoc! {"
                d = {'a': 1}
                d.update({'b': 2}, c = 3)
                print(d.get('a'), d.get('z'), d.get('z', 0), d.keys(), d.values())
                print(d.items(), d.pop('a'), d.pop('a', 'gone'), d)
                s = {1}
                s.add(2); s.add(1); s.discard(5); s.remove(1)
                print(s)
            "}),
            indoc! {"
                1 None 0 ['a', 'b', 'c'] [1, 2, 3]
                [('a', 1), ('b', 2), ('c', 3)] 1 gone {'b': 2, 'c': 3}
                {2}
            "}
        );
        assert_eq!(failure("d = {'a': 1}\nd.pop('z')"), "KeyError: 'z'");
        assert_eq!(failure("s = {1}\ns.remove(3)"), "KeyError: 3");
    }

    #[test]
    fn str_methods() {
        assert_eq!(
            output(indoc! {r#"
                s = "  Hello, World  "
                print(s.strip().upper(), s.lower().strip(), "xxhixx".strip("x"), "--a".lstrip("-"))
                print("a,b,,c".split(","), " one  two ".split(), "a b c".split(none, 1))
                print("-".join(["x", "y"]), "aaa".replace("a", "b", 2), "héllo".find("l"))
                print("file.pys".endswith((".py", ".pys")), "abc".startswith("b"), "banana".count("an"))
                print("{} + {1} = {total!r}".format("one", "two", total = "3"), "{{}}".format())
            "#}),
            indoc! {"
                HELLO, WORLD hello, world hi a
                ['a', 'b', '', 'c'] ['one', 'two'] ['a', 'b c']
                x-y bba 2
                True False 2
                one + two = '3' {}
            "}
        );
        assert_eq!(
            failure("', '.join([1])"),
            "TypeError: sequence item 0: expected str instance, int found"
        );
        assert_eq!(failure("'a'.split('')"), "ValueError: empty separator");
    }

    #[test]
    fn unknown_methods_are_attribute_errors() {
        assert_eq!(
            failure("[].push(1)"),
            "AttributeError: 'list' object has no attribute 'push'"
        );
        assert_eq!(
            failure("[].append(1, 2)"),
            "TypeError: append() expected 1 argument, got 2"
        );
    }
}
