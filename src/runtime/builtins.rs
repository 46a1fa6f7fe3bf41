//! The builtins namespace.
//!
//! Every name a program can use without defining or importing it: the
//! exception classes, the built-in types (which double as constructors),
//! and the built-in functions below. Methods on built-in values live in
//! [`methods`].

mod methods;

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::ast::{BinaryOperator, CompareOperator, StepOperator};
use crate::interpreter::{Interpreter, Iteration};
use crate::parser::Mode;
use crate::runtime::context::CallSite;
use crate::runtime::dict::Dict;
use crate::runtime::error::RuntimeError;
use crate::runtime::exception::{ExceptionClasses, ExceptionKind, Fault};
use crate::runtime::symtab::{Operand, SymbolTable};
use crate::runtime::value::{
    Arguments, BuiltinFn, Class, Instance, Range, Slice, Super, TypeKind, Value, quote,
};

pub use methods::{method, method_names};

const TYPES: [TypeKind; 12] = [
    TypeKind::Bool,
    TypeKind::Int,
    TypeKind::Float,
    TypeKind::Complex,
    TypeKind::Str,
    TypeKind::List,
    TypeKind::Tuple,
    TypeKind::Dict,
    TypeKind::Set,
    TypeKind::Range,
    TypeKind::Slice,
    TypeKind::Type,
];

const FUNCTIONS: &[(&str, BuiltinFn)] = &[
    ("print", print),
    ("len", len),
    ("isinstance", isinstance),
    ("repr", repr),
    ("abs", abs),
    ("min", min),
    ("max", max),
    ("sum", sum),
    ("sorted", sorted),
    ("reversed", reversed),
    ("enumerate", enumerate),
    ("zip", zip),
    ("hasattr", hasattr),
    ("getattr", getattr),
    ("setattr", setattr),
    ("id", id),
    ("hash", hash),
    ("chr", chr),
    ("ord", ord),
    ("round", round),
    ("require", require),
    ("globals", globals),
    ("locals", locals),
    ("exec", exec),
    ("eval", eval),
    ("ce", ce),
    ("nce", nce),
    ("increment", increment),
    ("decrement", decrement),
    ("exit", exit),
    ("vars", vars),
    ("dir", dir),
    ("comprehension", comprehension),
    ("isobjectof", isobjectof),
    ("map", map),
    ("filter", filter),
    ("any", any),
    ("all", all),
    ("iter", iter),
    ("next", next),
    ("callable", callable),
    ("issubclass", issubclass),
    ("super", super_proxy),
    ("divmod", divmod),
    ("pow", pow),
    ("hex", hex),
    ("bin", bin),
];

/// Builds the table every module scope falls back to.
pub fn namespace(exceptions: &ExceptionClasses) -> Rc<SymbolTable> {
    let table = SymbolTable::detached();
    for (kind, class) in exceptions.iter() {
        table.set(kind.name(), Value::Class(class.clone()), Operand::Assign);
    }
    for kind in TYPES {
        table.set(kind.name(), Value::Type(kind), Operand::Assign);
    }
    for &(name, function) in FUNCTIONS {
        table.set(name, Value::builtin(name, function), Operand::Assign);
    }
    table
}

/// Calling a built-in type.
pub fn construct(
    interpreter: &mut Interpreter,
    site: &CallSite,
    kind: TypeKind,
    mut arguments: Arguments,
) -> Result<Value, RuntimeError> {
    let name = kind.name();
    match kind {
        TypeKind::Int => {
            let arguments = arguments.at_most(name, 2)?;
            match (arguments.first(), arguments.get(1)) {
                (None, _) => Ok(Value::Int(0)),
                (Some(value), None) => to_int(interpreter, site, value),
                (Some(Value::Str(text)), Some(base)) => {
                    let base = base.as_int().ok_or_else(|| {
                        RuntimeError::Type(format!(
                            "'{}' object cannot be interpreted as an integer",
                            base.type_name()
                        ))
                    })?;
                    parse_int(text, base)
                }
                (Some(other), Some(_)) => Err(RuntimeError::Type(format!(
                    "int() can't convert non-string with explicit base, got {}",
                    other.type_name()
                ))),
            }
        }
        TypeKind::Float => match arguments.at_most(name, 1)?.first() {
            None => Ok(Value::Float(0.0)),
            Some(value) => to_float(interpreter, site, value),
        },
        TypeKind::Complex => {
            let arguments = arguments.at_most(name, 2)?;
            let mut parts = [0.0; 2];
            for (part, value) in parts.iter_mut().zip(&arguments) {
                *part = value.as_float().ok_or_else(|| {
                    RuntimeError::Type(format!(
                        "complex() argument must be a number, not '{}'",
                        value.type_name()
                    ))
                })?;
            }
            Ok(Value::Complex(parts[0], parts[1]))
        }
        TypeKind::Bool => match arguments.at_most(name, 1)?.first() {
            None => Ok(Value::Bool(false)),
            Some(value) => interpreter.truthy(site, value).map(Value::Bool),
        },
        TypeKind::Str => match arguments.at_most(name, 1)?.first() {
            None => Ok(Value::str("")),
            Some(value) => interpreter.to_str(site, value).map(Value::str),
        },
        TypeKind::List | TypeKind::Tuple | TypeKind::Set => {
            let items = match arguments.at_most(name, 1)?.first() {
                None => Vec::new(),
                Some(iterable) => interpreter.collect(site, iterable)?,
            };
            Ok(match kind {
                TypeKind::List => Value::list(items),
                TypeKind::Tuple => Value::tuple(items),
                _ => Value::set(Dict::from_keys(items)?),
            })
        }
        TypeKind::Dict => {
            let keywords = std::mem::take(&mut arguments.keywords);
            let mut dict = match arguments.at_most(name, 1)?.first() {
                None => Dict::new(),
                Some(source) => dict_from(interpreter, site, source)?,
            };
            for (key, value) in keywords {
                dict.insert(Value::str(key), value)?;
            }
            Ok(Value::dict(dict))
        }
        TypeKind::Range => range(&arguments.at_most(name, 3)?),
        TypeKind::Slice => {
            let arguments = arguments.at_most(name, 3)?;
            let slice = match <[Value; 1]>::try_from(arguments) {
                Ok([stop]) => Slice {
                    start: Value::None,
                    stop,
                    step: Value::None,
                },
                Err(arguments) => {
                    let mut bounds = arguments.into_iter();
                    let Some(start) = bounds.next() else {
                        return Err(RuntimeError::Type(
                            "slice expected at least 1 argument, got 0".to_string(),
                        ));
                    };
                    Slice {
                        start,
                        stop: bounds.next().unwrap_or(Value::None),
                        step: bounds.next().unwrap_or(Value::None),
                    }
                }
            };
            Ok(Value::Slice(Rc::new(slice)))
        }
        TypeKind::Type => {
            let [value] = <[Value; 1]>::try_from(arguments.exactly("type", 1)?)
                .map_err(|_| RuntimeError::Type("type() takes 1 argument".to_string()))?;
            Ok(type_of(&value))
        }
        other => Err(RuntimeError::Type(format!(
            "cannot create '{}' instances",
            other.name()
        ))),
    }
}

/// The class of `value`, as `type(value)` returns it.
pub fn type_of(value: &Value) -> Value {
    match (value, value.type_kind()) {
        (Value::Instance(instance), _) => Value::Class(instance.class.clone()),
        (_, Some(kind)) => Value::Type(kind),
        (_, None) => Value::None,
    }
}

fn to_int(interpreter: &mut Interpreter, site: &CallSite, value: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Int(_) | Value::Bool(_) => Ok(Value::Int(value.as_int().unwrap_or_default())),
        Value::Float(number) => float_to_int(*number).map(Value::Int),
        Value::Str(text) => parse_int(text, 10),
        Value::Instance(_) => match interpreter.dunder(site, value, "__int__", Vec::new())? {
            Some(result @ Value::Int(_)) => Ok(result),
            Some(other) => Err(RuntimeError::Type(format!(
                "__int__ returned non-int (type {})",
                other.type_name()
            ))),
            None => Err(not_a_number("int", value)),
        },
        other => Err(not_a_number("int", other)),
    }
}

fn to_float(interpreter: &mut Interpreter, site: &CallSite, value: &Value) -> Result<Value, RuntimeError> {
    if let Some(number) = value.as_float() {
        return Ok(Value::Float(number));
    }
    match value {
        Value::Str(text) => {
            let cleaned = text.trim().replace('_', "");
            cleaned.parse::<f64>().map(Value::Float).map_err(|_| {
                RuntimeError::Value(format!("could not convert string to float: {}", quote(text)))
            })
        }
        Value::Instance(_) => match interpreter.dunder(site, value, "__float__", Vec::new())? {
            Some(result @ Value::Float(_)) => Ok(result),
            Some(other) => Err(RuntimeError::Type(format!(
                "__float__ returned non-float (type {})",
                other.type_name()
            ))),
            None => Err(not_a_number("float", value)),
        },
        other => Err(not_a_number("float", other)),
    }
}

fn not_a_number(target: &str, value: &Value) -> RuntimeError {
    RuntimeError::Type(format!(
        "{target}() argument must be a string or a real number, not '{}'",
        value.type_name()
    ))
}

fn parse_int(text: &str, base: i64) -> Result<Value, RuntimeError> {
    let invalid = || RuntimeError::Value(format!(
        "invalid literal for int() with base {base}: {}",
        quote(text)
    ));
    let radix = u32::try_from(base)
        .ok()
        .filter(|radix| (2..=36).contains(radix))
        .ok_or_else(|| RuntimeError::Value("int() base must be >= 2 and <= 36".to_string()))?;
    let trimmed = text.trim();
    if trimmed.starts_with('_') || trimmed.ends_with('_') || trimmed.contains("__") {
        return Err(invalid());
    }
    i64::from_str_radix(&trimmed.replace('_', ""), radix)
        .map(Value::Int)
        .map_err(|_| invalid())
}

fn float_to_int(number: f64) -> Result<i64, RuntimeError> {
    if number.is_nan() {
        return Err(RuntimeError::Value("cannot convert float NaN to integer".to_string()));
    }
    let truncated = number.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(RuntimeError::Overflow);
    }
    Ok(truncated as i64)
}

fn dict_from(interpreter: &mut Interpreter, site: &CallSite, source: &Value) -> Result<Dict, RuntimeError> {
    if let Value::Dict(dict) = source {
        return Ok(dict.borrow().clone());
    }
    let mut dict = Dict::new();
    for (index, item) in interpreter.collect(site, source)?.into_iter().enumerate() {
        let pair = interpreter.collect(site, &item).map_err(|_| {
            RuntimeError::Type(format!(
                "cannot convert dictionary update sequence element #{index} to a sequence"
            ))
        })?;
        let [key, value] = <[Value; 2]>::try_from(pair).map_err(|pair| {
            RuntimeError::Value(format!(
                "dictionary update sequence element #{index} has length {}; 2 is required",
                pair.len()
            ))
        })?;
        dict.insert(key, value)?;
    }
    Ok(dict)
}

fn range(arguments: &[Value]) -> Result<Value, RuntimeError> {
    let mut bounds = [0i64; 3];
    for (bound, value) in bounds.iter_mut().zip(arguments) {
        *bound = value.as_int().ok_or_else(|| {
            RuntimeError::Type(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        })?;
    }
    let range = match arguments.len() {
        0 => {
            return Err(RuntimeError::Type(
                "range expected at least 1 argument, got 0".to_string(),
            ));
        }
        1 => Range {
            start: 0,
            stop: bounds[0],
            step: 1,
        },
        2 => Range {
            start: bounds[0],
            stop: bounds[1],
            step: 1,
        },
        _ => Range {
            start: bounds[0],
            stop: bounds[1],
            step: bounds[2],
        },
    };
    if range.step == 0 {
        return Err(RuntimeError::Value("range() arg 3 must not be zero".to_string()));
    }
    Ok(Value::Range(range))
}

/// Fails on the first keyword a built-in does not understand.
fn reject_unknown(arguments: &Arguments, function: &str) -> Result<(), RuntimeError> {
    match arguments.keywords.first() {
        None => Ok(()),
        Some((keyword, _)) => Err(RuntimeError::UnexpectedKeyword {
            function: function.to_string(),
            argument: keyword.clone(),
        }),
    }
}

fn single(arguments: Arguments, function: &str) -> Result<Value, RuntimeError> {
    let [value] = <[Value; 1]>::try_from(arguments.exactly(function, 1)?)
        .map_err(|_| RuntimeError::BuiltinArity {
            function: function.to_string(),
            expected: 1,
            given: 0,
        })?;
    Ok(value)
}

fn pair(arguments: Arguments, function: &str) -> Result<(Value, Value), RuntimeError> {
    let [first, second] = <[Value; 2]>::try_from(arguments.exactly(function, 2)?)
        .map_err(|_| RuntimeError::BuiltinArity {
            function: function.to_string(),
            expected: 2,
            given: 0,
        })?;
    Ok((first, second))
}

fn text_option(value: Option<Value>, default: &str, name: &str) -> Result<String, RuntimeError> {
    match value {
        None | Some(Value::None) => Ok(default.to_string()),
        Some(Value::Str(text)) => Ok(text.to_string()),
        Some(other) => Err(RuntimeError::Type(format!(
            "{name} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}

fn attribute_name(value: &Value) -> Result<&str, RuntimeError> {
    value.as_str().ok_or_else(|| {
        RuntimeError::Type(format!(
            "attribute name must be string, not '{}'",
            value.type_name()
        ))
    })
}

fn print(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let separator = text_option(arguments.take_keyword("sep"), " ", "sep")?;
    let end = text_option(arguments.take_keyword("end"), "\n", "end")?;
    reject_unknown(&arguments, "print")?;

    let mut parts = Vec::with_capacity(arguments.positional.len());
    for value in &arguments.positional {
        parts.push(interpreter.to_str(site, value)?);
    }
    interpreter.write_stdout(&format!("{}{end}", parts.join(separator.as_str())))?;
    Ok(Value::None)
}

fn len(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "len")?;
    let length = match &value {
        Value::Str(text) => text.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(dict) | Value::Set(dict) => dict.borrow().len(),
        Value::Range(range) => range.len(),
        Value::Instance(_) => match interpreter.dunder(site, &value, "__len__", Vec::new())? {
            Some(Value::Int(length)) if length >= 0 => return Ok(Value::Int(length)),
            Some(Value::Int(_)) => {
                return Err(RuntimeError::Value("__len__() should return >= 0".to_string()));
            }
            Some(other) => {
                return Err(RuntimeError::Type(format!(
                    "'{}' object cannot be interpreted as an integer",
                    other.type_name()
                )));
            }
            None => return Err(no_len(&value)),
        },
        other => return Err(no_len(other)),
    };
    i64::try_from(length).map(Value::Int).map_err(|_| RuntimeError::Overflow)
}

fn no_len(value: &Value) -> RuntimeError {
    RuntimeError::Type(format!("object of type '{}' has no len()", value.type_name()))
}

fn instance_of(value: &Value, spec: &Value) -> Result<bool, RuntimeError> {
    match spec {
        Value::Type(kind) => Ok(value.type_kind().is_some_and(|actual| kind.accepts(actual))),
        Value::Class(class) => Ok(matches!(value, Value::Instance(instance) if instance.class.is_subclass_of(class))),
        Value::Tuple(specs) => {
            for spec in specs.iter() {
                if instance_of(value, spec)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(RuntimeError::Type(
            "isinstance() arg 2 must be a type or tuple of types".to_string(),
        )),
    }
}

fn isinstance(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (value, spec) = pair(arguments, "isinstance")?;
    instance_of(&value, &spec).map(Value::Bool)
}

fn repr(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "repr")?;
    interpreter.repr(site, &value).map(Value::str)
}

fn abs(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "abs")?;
    match &value {
        Value::Int(_) | Value::Bool(_) => value
            .as_int()
            .and_then(i64::checked_abs)
            .map(Value::Int)
            .ok_or(RuntimeError::Overflow),
        Value::Float(number) => Ok(Value::Float(number.abs())),
        Value::Complex(re, im) => Ok(Value::Float(re.hypot(*im))),
        _ => interpreter
            .dunder(site, &value, "__abs__", Vec::new())?
            .ok_or_else(|| RuntimeError::UnsupportedOperand {
                operator: "abs()",
                type_name: value.type_name(),
            }),
    }
}

fn min(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    extreme(interpreter, site, arguments, "min", CompareOperator::Less)
}

fn max(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    extreme(interpreter, site, arguments, "max", CompareOperator::Greater)
}

/// `min` and `max`: the first item whose key beats every other under
/// `operator`.
fn extreme(
    interpreter: &mut Interpreter,
    site: &CallSite,
    mut arguments: Arguments,
    function: &str,
    operator: CompareOperator,
) -> Result<Value, RuntimeError> {
    let key = arguments.take_keyword("key").filter(|key| !key.is_none());
    let default = arguments.take_keyword("default");
    reject_unknown(&arguments, function)?;

    let items = match <[Value; 1]>::try_from(arguments.positional) {
        Ok([iterable]) => interpreter.collect(site, &iterable)?,
        Err(items) if items.is_empty() => {
            return Err(RuntimeError::Type(format!(
                "{function} expected at least 1 argument, got 0"
            )));
        }
        Err(items) => items,
    };

    let mut best: Option<(Value, Value)> = None;
    for item in items {
        let score = match &key {
            Some(key) => interpreter.call_value(site, key, Arguments::positional(vec![item.clone()]))?,
            None => item.clone(),
        };
        let better = match &best {
            None => true,
            Some((_, current)) => interpreter.compare(site, operator, &score, current)?,
        };
        if better {
            best = Some((item, score));
        }
    }
    match (best, default) {
        (Some((item, _)), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(RuntimeError::Value(format!(
            "{function}() arg is an empty sequence"
        ))),
    }
}

fn sum(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let start = arguments.take_keyword("start");
    let arguments = arguments.at_most("sum", 2)?;
    let mut arguments = arguments.into_iter();
    let Some(iterable) = arguments.next() else {
        return Err(RuntimeError::Type("sum() takes at least 1 positional argument (0 given)".to_string()));
    };
    let mut total = arguments.next().or(start).unwrap_or(Value::Int(0));
    if matches!(total, Value::Str(_)) {
        return Err(RuntimeError::Type(
            "sum() can't sum strings [use ''.join(seq) instead]".to_string(),
        ));
    }
    for item in interpreter.collect(site, &iterable)? {
        total = interpreter.binary(site, BinaryOperator::Add, total, item)?;
    }
    Ok(total)
}

fn sorted(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let key = arguments.take_keyword("key");
    let reverse = arguments.take_keyword("reverse");
    reject_unknown(&arguments, "sorted")?;
    let iterable = single(arguments, "sorted")?;
    let items = interpreter.collect(site, &iterable)?;
    sort_values(interpreter, site, items, key, reverse).map(Value::list)
}

/// Stable merge sort through the interpreter's `<`, with an optional key
/// function.
pub(crate) fn sort_values(
    interpreter: &mut Interpreter,
    site: &CallSite,
    items: Vec<Value>,
    key: Option<Value>,
    reverse: Option<Value>,
) -> Result<Vec<Value>, RuntimeError> {
    let reverse = match reverse {
        Some(flag) => interpreter.truthy(site, &flag)?,
        None => false,
    };
    let mut keyed = Vec::with_capacity(items.len());
    for item in items {
        let score = match key.as_ref().filter(|key| !key.is_none()) {
            Some(key) => interpreter.call_value(site, key, Arguments::positional(vec![item.clone()]))?,
            None => item.clone(),
        };
        keyed.push((score, item));
    }
    let sorted = merge_sort(interpreter, site, keyed, reverse)?;
    Ok(sorted.into_iter().map(|(_, item)| item).collect())
}

fn merge_sort(
    interpreter: &mut Interpreter,
    site: &CallSite,
    mut items: Vec<(Value, Value)>,
    reverse: bool,
) -> Result<Vec<(Value, Value)>, RuntimeError> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(interpreter, site, items, reverse)?;
    let right = merge_sort(interpreter, site, right, reverse)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(a), Some(b)) = (left.peek(), right.peek()) {
        // Ties keep the left element first.
        let take_right = if reverse {
            interpreter.compare(site, CompareOperator::Less, &a.0, &b.0)?
        } else {
            interpreter.compare(site, CompareOperator::Less, &b.0, &a.0)?
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    merged.extend(left);
    merged.extend(right);
    Ok(merged)
}

fn reversed(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "reversed")?;
    match &value {
        Value::List(_) | Value::Tuple(_) | Value::Str(_) | Value::Range(_) => {
            let mut items = interpreter.collect(site, &value)?;
            items.reverse();
            Ok(Value::list(items))
        }
        _ => interpreter
            .dunder(site, &value, "__reversed__", Vec::new())?
            .ok_or_else(|| {
                RuntimeError::Type(format!("'{}' object is not reversible", value.type_name()))
            }),
    }
}

fn enumerate(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let start = arguments.take_keyword("start");
    let mut arguments = arguments.at_most("enumerate", 2)?.into_iter();
    let Some(iterable) = arguments.next() else {
        return Err(RuntimeError::MissingArguments {
            function: "enumerate".to_string(),
            missing: vec!["iterable".to_string()],
        });
    };
    let start = arguments.next().or(start).unwrap_or(Value::Int(0));
    let start = start.as_int().ok_or_else(|| {
        RuntimeError::Type(format!(
            "'{}' object cannot be interpreted as an integer",
            start.type_name()
        ))
    })?;
    let items = interpreter.collect(site, &iterable)?;
    let mut pairs = Vec::with_capacity(items.len());
    for (offset, item) in (0i64..).zip(items) {
        let index = start.checked_add(offset).ok_or(RuntimeError::Overflow)?;
        pairs.push(Value::tuple(vec![Value::Int(index), item]));
    }
    Ok(Value::list(pairs))
}

fn zip(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    arguments.reject_keywords("zip")?;
    let mut columns = Vec::with_capacity(arguments.positional.len());
    for iterable in &arguments.positional {
        columns.push(interpreter.collect(site, iterable)?.into_iter());
    }
    let mut rows = Vec::new();
    if columns.is_empty() {
        return Ok(Value::list(rows));
    }
    'rows: loop {
        let mut row = Vec::with_capacity(columns.len());
        for column in &mut columns {
            match column.next() {
                Some(item) => row.push(item),
                None => break 'rows,
            }
        }
        rows.push(Value::tuple(row));
    }
    Ok(Value::list(rows))
}

fn is_attribute_error(error: &RuntimeError) -> bool {
    match error {
        RuntimeError::Raised(fault) => fault.is_kind(ExceptionKind::AttributeError),
        other => other.kind() == ExceptionKind::AttributeError,
    }
}

fn hasattr(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (object, name) = pair(arguments, "hasattr")?;
    match interpreter.get_attribute(site, &object, attribute_name(&name)?) {
        Ok(_) => Ok(Value::Bool(true)),
        Err(error) if is_attribute_error(&error) => Ok(Value::Bool(false)),
        Err(error) => Err(error),
    }
}

fn getattr(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let mut arguments = arguments.at_most("getattr", 3)?.into_iter();
    let (Some(object), Some(name)) = (arguments.next(), arguments.next()) else {
        return Err(RuntimeError::Type(
            "getattr expected at least 2 arguments".to_string(),
        ));
    };
    match (interpreter.get_attribute(site, &object, attribute_name(&name)?), arguments.next()) {
        (Err(error), Some(default)) if is_attribute_error(&error) => Ok(default),
        (result, _) => result,
    }
}

fn setattr(interpreter: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let [object, name, value] = <[Value; 3]>::try_from(arguments.exactly("setattr", 3)?)
        .map_err(|_| RuntimeError::Type("setattr expected 3 arguments".to_string()))?;
    interpreter.set_attribute(&object, attribute_name(&name)?, value)?;
    Ok(Value::None)
}

fn address<T: ?Sized>(handle: &Rc<T>) -> i64 {
    Rc::as_ptr(handle) as *const () as usize as i64
}

/// Identity of a value: the address of its object, or its hash for scalars.
fn identity(value: &Value) -> i64 {
    match value {
        Value::List(items) => address(items),
        Value::Tuple(items) => address(items),
        Value::Dict(dict) | Value::Set(dict) => address(dict),
        Value::Slice(slice) => address(slice),
        Value::Function(function) => address(function),
        Value::BoundMethod(method) => address(method),
        Value::Builtin(builtin) => address(builtin),
        Value::Class(class) => address(class),
        Value::Instance(instance) => address(instance),
        Value::Module(module) => address(module),
        Value::Iterator(cursor) => address(cursor),
        Value::Super(proxy) => address(proxy),
        scalar => scalar.hash_key().map_or(0, |hash| hash as i64),
    }
}

fn id(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    single(arguments, "id").map(|value| Value::Int(identity(&value)))
}

fn hash(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "hash")?;
    if let Some(result) = interpreter.dunder(site, &value, "__hash__", Vec::new())? {
        return match result {
            Value::Int(_) => Ok(result),
            other => Err(RuntimeError::Type(format!(
                "__hash__ method should return an integer, not '{}'",
                other.type_name()
            ))),
        };
    }
    value.hash_key().map(|hash| Value::Int(hash as i64))
}

fn chr(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "chr")?;
    let code = value.as_int().ok_or_else(|| {
        RuntimeError::Type(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })?;
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|c| Value::str(c.to_string()))
        .ok_or_else(|| RuntimeError::Value("chr() arg not in range(0x110000)".to_string()))
}

fn ord(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "ord")?;
    let Value::Str(text) = &value else {
        return Err(RuntimeError::Type(format!(
            "ord() expected string of length 1, but {} found",
            value.type_name()
        )));
    };
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
        _ => Err(RuntimeError::Type(format!(
            "ord() expected a character, but string of length {} found",
            text.chars().count()
        ))),
    }
}

fn round(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let digits = arguments.take_keyword("ndigits");
    let mut arguments = arguments.at_most("round", 2)?.into_iter();
    let Some(number) = arguments.next() else {
        return Err(RuntimeError::MissingArguments {
            function: "round".to_string(),
            missing: vec!["number".to_string()],
        });
    };
    let digits = match arguments.next().or(digits) {
        None | Some(Value::None) => None,
        Some(value) => Some(value.as_int().ok_or_else(|| {
            RuntimeError::Type(format!(
                "'{}' object cannot be interpreted as an integer",
                value.type_name()
            ))
        })?),
    };

    match (&number, digits) {
        (Value::Int(_) | Value::Bool(_), None) => Ok(Value::Int(number.as_int().unwrap_or_default())),
        (Value::Int(_) | Value::Bool(_), Some(digits)) if digits >= 0 => {
            Ok(Value::Int(number.as_int().unwrap_or_default()))
        }
        (Value::Int(_) | Value::Bool(_), Some(digits)) => {
            let value = number.as_int().unwrap_or_default();
            let scale = u32::try_from(-digits)
                .ok()
                .and_then(|power| 10i64.checked_pow(power));
            Ok(Value::Int(match scale {
                Some(scale) => ((value as f64 / scale as f64).round_ties_even() as i64) * scale,
                None => 0,
            }))
        }
        (Value::Float(value), None) => float_to_int(value.round_ties_even()).map(Value::Int),
        (Value::Float(value), Some(digits)) => {
            let scale = 10f64.powi(i32::try_from(digits).unwrap_or(i32::MAX));
            let rounded = (value * scale).round_ties_even() / scale;
            Ok(Value::Float(if rounded.is_finite() { rounded } else { *value }))
        }
        _ => {
            let extra = digits.map(Value::Int).into_iter().collect();
            interpreter
                .dunder(site, &number, "__round__", extra)?
                .ok_or_else(|| {
                    RuntimeError::Type(format!(
                        "type {} doesn't define __round__ method",
                        number.type_name()
                    ))
                })
        }
    }
}

fn require(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let name = single(arguments, "require")?;
    let Value::Str(name) = &name else {
        return Err(RuntimeError::Type(format!(
            "require() argument must be str, not '{}'",
            name.type_name()
        )));
    };
    interpreter.import_module(site, name).map(Value::Module)
}

fn table_dict(entries: Vec<(String, Value)>) -> Result<Value, RuntimeError> {
    let pairs = entries
        .into_iter()
        .map(|(name, value)| (Value::str(name), value))
        .collect();
    Ok(Value::dict(Dict::from_pairs(pairs)?))
}

fn globals(_: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    arguments.exactly("globals", 0)?;
    table_dict(site.context.symbols.outermost().entries())
}

fn locals(_: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    arguments.exactly("locals", 0)?;
    table_dict(site.context.symbols.entries())
}

fn exec(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    evaluate_source(interpreter, site, arguments, Mode::Exec).map(|_| Value::None)
}

fn eval(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    evaluate_source(interpreter, site, arguments, Mode::Eval)
}

/// `exec`/`eval`: runs source text in the caller's scope, or in a fresh
/// module scope seeded from (and written back to) a globals dict.
fn evaluate_source(
    interpreter: &mut Interpreter,
    site: &CallSite,
    mut arguments: Arguments,
    mode: Mode,
) -> Result<Value, RuntimeError> {
    let (function, file) = match mode {
        Mode::Exec => ("exec", "<exec>"),
        Mode::Eval => ("eval", "<eval>"),
    };
    let globals = arguments.take_keyword("globals");
    let mut arguments = arguments.at_most(function, 2)?.into_iter();
    let Some(Value::Str(source)) = arguments.next() else {
        return Err(RuntimeError::Type(format!("{function}() arg 1 must be a string")));
    };

    let namespace = match arguments.next().or(globals) {
        None | Some(Value::None) => None,
        Some(Value::Dict(dict)) => Some(dict),
        Some(_) => {
            return Err(RuntimeError::Type(format!("{function}(): globals must be dict")));
        }
    };
    let symbols = match &namespace {
        None => site.context.symbols.clone(),
        Some(dict) => {
            let symbols = SymbolTable::root(interpreter.builtins().clone());
            for (key, value) in dict.borrow().iter() {
                let Value::Str(name) = key else {
                    return Err(RuntimeError::Type(format!(
                        "{function}(): globals keys must be strings"
                    )));
                };
                symbols.set(name, value.clone(), Operand::Assign);
            }
            symbols
        }
    };

    let result = interpreter.run_unit(file.into(), source, mode, symbols.clone(), Some(site.clone()));
    if let Some(dict) = namespace {
        let mut dict = dict.borrow_mut();
        for (name, value) in symbols.entries() {
            dict.insert(Value::str(name), value)?;
        }
    }
    Ok(result?)
}

fn ce(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (left, right) = pair(arguments, "ce")?;
    interpreter.approx_equal(site, &left, &right).map(Value::Bool)
}

fn nce(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (left, right) = pair(arguments, "nce")?;
    interpreter.approx_not_equal(site, &left, &right).map(Value::Bool)
}

fn increment(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "increment")?;
    interpreter.step(site, StepOperator::Increment, &value)
}

fn decrement(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let value = single(arguments, "decrement")?;
    interpreter.step(site, StepOperator::Decrement, &value)
}

/// Raises `SystemExit` carrying the exit code.
fn exit(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let code = arguments.at_most("exit", 1)?.into_iter().next().unwrap_or(Value::None);
    let (message, args) = match code {
        Value::None => (String::new(), Vec::new()),
        code => (code.plain_str(), vec![code]),
    };
    let class = interpreter.exceptions.get(ExceptionKind::SystemExit);
    let exception = Instance::exception(class, args);
    Err(Fault::new(exception, message, site.span, site.context.clone()).into())
}

fn attribute_dict(attributes: &RefCell<FxHashMap<String, Value>>) -> Result<Value, RuntimeError> {
    let mut entries: Vec<(String, Value)> = attributes
        .borrow()
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    table_dict(entries)
}

/// `vars()`: the caller's locals, or the namespace of an instance, class
/// or module.
fn vars(_: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    match arguments.at_most("vars", 1)?.first() {
        None => table_dict(site.context.symbols.entries()),
        Some(Value::Instance(instance)) => attribute_dict(&instance.attributes),
        Some(Value::Class(class)) => attribute_dict(&class.attributes),
        Some(Value::Module(module)) => table_dict(module.symbols.entries()),
        Some(_) => Err(RuntimeError::Type(
            "vars() argument must have __dict__ attribute".to_string(),
        )),
    }
}

/// `dir()`: sorted names in the caller's scope, or the attributes reachable
/// on a value.
fn dir(_: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let mut names: Vec<String> = match arguments.at_most("dir", 1)?.first() {
        None => site.context.symbols.entries().into_iter().map(|(name, _)| name).collect(),
        Some(Value::Instance(instance)) => {
            let mut names: Vec<String> = instance.attributes.borrow().keys().cloned().collect();
            names.extend(class_names(&instance.class));
            names
        }
        Some(Value::Class(class)) => class_names(class),
        Some(Value::Module(module)) => module
            .symbols
            .entries()
            .into_iter()
            .map(|(name, _)| name)
            .collect(),
        Some(other) => method_names(other).into_iter().map(str::to_string).collect(),
    };
    names.sort();
    names.dedup();
    Ok(Value::list(names.into_iter().map(Value::str).collect()))
}

fn class_names(class: &Rc<Class>) -> Vec<String> {
    std::iter::once(class)
        .chain(class.ancestors.iter())
        .flat_map(|class| class.attributes.borrow().keys().cloned().collect::<Vec<_>>())
        .collect()
}

fn is_callable(value: &Value) -> bool {
    match value {
        Value::Function(_)
        | Value::BoundMethod(_)
        | Value::Builtin(_)
        | Value::Type(_)
        | Value::Class(_) => true,
        Value::Instance(instance) => instance.class.lookup("__call__").is_some(),
        _ => false,
    }
}

fn callable(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    single(arguments, "callable").map(|value| Value::Bool(is_callable(&value)))
}

fn cursor(iteration: Iteration) -> Value {
    Value::Iterator(Rc::new(RefCell::new(iteration)))
}

fn map(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    arguments.reject_keywords("map")?;
    let mut positional = arguments.positional.into_iter();
    let (Some(function), Some(first)) = (positional.next(), positional.next()) else {
        return Err(RuntimeError::Type(
            "map() must have at least two arguments.".to_string(),
        ));
    };
    let mut sources = vec![interpreter.iterate(site, &first)?];
    for iterable in positional {
        sources.push(interpreter.iterate(site, &iterable)?);
    }
    Ok(cursor(Iteration::Mapped { function, sources }))
}

fn filter(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (predicate, iterable) = pair(arguments, "filter")?;
    let source = Box::new(interpreter.iterate(site, &iterable)?);
    Ok(cursor(Iteration::Filtered { predicate, source }))
}

/// `comprehension(init, wrap, condition=None)`: `map(wrap, filter(condition,
/// init))`, with both functions checked up front.
fn comprehension(
    interpreter: &mut Interpreter,
    site: &CallSite,
    mut arguments: Arguments,
) -> Result<Value, RuntimeError> {
    let condition = arguments.take_keyword("condition");
    let wrap = arguments.take_keyword("wrap");
    reject_unknown(&arguments, "comprehension")?;
    let mut positional = arguments.at_most("comprehension", 3)?.into_iter();
    let init = positional.next();
    let wrap = positional.next().or(wrap);
    let condition = positional.next().or(condition).unwrap_or(Value::None);
    let (Some(init), Some(wrap)) = (init, wrap) else {
        return Err(RuntimeError::Type(
            "comprehension() missing required argument: 'init' and 'wrap'".to_string(),
        ));
    };
    if !is_callable(&wrap) {
        return Err(RuntimeError::Type(
            "comprehension(): wrap must be callable".to_string(),
        ));
    }
    if !condition.is_none() && !is_callable(&condition) {
        return Err(RuntimeError::Type(
            "comprehension(): condition must be callable".to_string(),
        ));
    }

    let mut source = interpreter.iterate(site, &init)?;
    if !condition.is_none() {
        source = Iteration::Filtered {
            predicate: condition,
            source: Box::new(source),
        };
    }
    Ok(cursor(Iteration::Mapped {
        function: wrap,
        sources: vec![source],
    }))
}

/// `any` and `all`: stops at the first item whose truth equals `target`.
fn first_with_truth(
    interpreter: &mut Interpreter,
    site: &CallSite,
    arguments: Arguments,
    function: &str,
    target: bool,
) -> Result<bool, RuntimeError> {
    let iterable = single(arguments, function)?;
    let mut iteration = interpreter.iterate(site, &iterable)?;
    while let Some(item) = interpreter.next_item(site, &mut iteration)? {
        if interpreter.truthy(site, &item)? == target {
            return Ok(true);
        }
    }
    Ok(false)
}

fn any(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    first_with_truth(interpreter, site, arguments, "any", true).map(Value::Bool)
}

fn all(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    first_with_truth(interpreter, site, arguments, "all", false).map(|found| Value::Bool(!found))
}

fn iter(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let iterable = single(arguments, "iter")?;
    interpreter.iterator(site, &iterable)
}

/// `next(iterator[, default])`; raises `StopIteration` when exhausted and no
/// default is given.
fn next(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let mut arguments = arguments.at_most("next", 2)?.into_iter();
    let Some(iterator) = arguments.next() else {
        return Err(RuntimeError::Type(
            "next expected at least 1 argument, got 0".to_string(),
        ));
    };
    match (interpreter.advance(site, &iterator)?, arguments.next()) {
        (Some(item), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => Err(interpreter
            .raise(ExceptionKind::StopIteration, String::new(), site)
            .into()),
    }
}

fn subclass_of(class: &Value, spec: &Value) -> Result<bool, RuntimeError> {
    match (class, spec) {
        (_, Value::Tuple(specs)) => {
            for spec in specs.iter() {
                if subclass_of(class, spec)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        (Value::Class(class), Value::Class(base)) => Ok(class.is_subclass_of(base)),
        (Value::Type(kind), Value::Type(base)) => Ok(base.accepts(*kind)),
        (Value::Class(_) | Value::Type(_), Value::Class(_) | Value::Type(_)) => Ok(false),
        (Value::Class(_) | Value::Type(_), _) => Err(RuntimeError::Type(
            "issubclass() arg 2 must be a class or tuple of classes".to_string(),
        )),
        _ => Err(RuntimeError::Type("issubclass() arg 1 must be a class".to_string())),
    }
}

fn issubclass(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (class, spec) = pair(arguments, "issubclass")?;
    subclass_of(&class, &spec).map(Value::Bool)
}

/// True for instances of `spec` and for classes derived from it.
fn isobjectof(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (value, spec) = pair(arguments, "isobjectof")?;
    if instance_of(&value, &spec)? {
        return Ok(Value::Bool(true));
    }
    match value {
        Value::Class(_) | Value::Type(_) => subclass_of(&value, &spec).map(Value::Bool),
        _ => Ok(Value::Bool(false)),
    }
}

/// `super()` inside a method, or `super(Class, instance)`.
fn super_proxy(_: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (class, receiver) = match <[Value; 2]>::try_from(arguments.at_most("super", 2)?) {
        Ok([Value::Class(class), receiver]) => (class, receiver),
        Ok([other, _]) => {
            return Err(RuntimeError::Type(format!(
                "super() argument 1 must be a class, not {}",
                other.type_name()
            )));
        }
        Err(arguments) if arguments.is_empty() => enclosing_method(site)?,
        Err(_) => {
            return Err(RuntimeError::Type(
                "super() takes no arguments or exactly 2".to_string(),
            ));
        }
    };
    match &receiver {
        Value::Instance(instance) if instance.class.is_subclass_of(&class) => {
            Ok(Value::Super(Rc::new(Super { class, receiver })))
        }
        _ => Err(RuntimeError::Type(
            "super(type, obj): obj must be an instance or subtype of type".to_string(),
        )),
    }
}

/// Class and receiver for a bare `super()`: the first argument of the
/// running function, and the class along its MRO that defines the function.
fn enclosing_method(site: &CallSite) -> Result<(Rc<Class>, Value), RuntimeError> {
    let no_arguments = || RuntimeError::Type("super(): no arguments".to_string());
    let function = site.context.callee.as_ref().ok_or_else(no_arguments)?;
    let receiver_name = &function.definition.parameters.first().ok_or_else(no_arguments)?.name;
    let receiver = site.context.symbols.get(receiver_name);
    let Value::Instance(instance) = &receiver else {
        return Err(no_arguments());
    };
    let defines = |class: &&Rc<Class>| {
        class.attributes.borrow().values().any(|value| {
            matches!(value, Value::Function(candidate) if Rc::ptr_eq(candidate, function))
        })
    };
    let class = std::iter::once(&instance.class)
        .chain(instance.class.ancestors.iter())
        .find(defines)
        .cloned()
        .ok_or_else(|| RuntimeError::Type("super(): __class__ cell not found".to_string()))?;
    Ok((class, receiver))
}

/// `__init__` reached through `super()` past every script class. Exception
/// instances record their arguments; anything else accepts none.
pub(crate) fn base_init(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    arguments.reject_keywords("__init__")?;
    let mut positional = arguments.positional.into_iter();
    let receiver = positional.next().unwrap_or_default();
    let rest: Vec<Value> = positional.collect();
    match &receiver {
        Value::Instance(instance) if instance.is_exception() => {
            instance.set("args", Value::tuple(rest));
            Ok(Value::None)
        }
        _ if rest.is_empty() => Ok(Value::None),
        _ => Err(RuntimeError::Type(
            "object.__init__() takes exactly one argument (the instance to initialize)".to_string(),
        )),
    }
}

fn divmod(interpreter: &mut Interpreter, site: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    let (dividend, divisor) = pair(arguments, "divmod")?;
    let quotient = interpreter.binary(site, BinaryOperator::FloorDiv, dividend.clone(), divisor.clone())?;
    let remainder = interpreter.binary(site, BinaryOperator::Mod, dividend, divisor)?;
    Ok(Value::tuple(vec![quotient, remainder]))
}

fn pow(interpreter: &mut Interpreter, site: &CallSite, mut arguments: Arguments) -> Result<Value, RuntimeError> {
    let modulus = arguments.take_keyword("mod");
    reject_unknown(&arguments, "pow")?;
    let mut positional = arguments.at_most("pow", 3)?.into_iter();
    let (Some(base), Some(exponent)) = (positional.next(), positional.next()) else {
        return Err(RuntimeError::Type(
            "pow() missing required argument 'exp'".to_string(),
        ));
    };
    match positional.next().or(modulus) {
        None | Some(Value::None) => interpreter.binary(site, BinaryOperator::Pow, base, exponent),
        Some(modulus) => modular_pow(&base, &exponent, &modulus).map(Value::Int),
    }
}

fn modular_pow(base: &Value, exponent: &Value, modulus: &Value) -> Result<i64, RuntimeError> {
    let (Some(base), Some(exponent), Some(modulus)) = (base.as_int(), exponent.as_int(), modulus.as_int()) else {
        return Err(RuntimeError::Type(
            "pow() 3rd argument not allowed unless all arguments are integers".to_string(),
        ));
    };
    if modulus == 0 {
        return Err(RuntimeError::Value("pow() 3rd argument cannot be 0".to_string()));
    }
    if exponent < 0 {
        return Err(RuntimeError::Value(
            "pow() negative exponent not supported with a modulus".to_string(),
        ));
    }
    let modulus = i128::from(modulus);
    let mut result = 1i128;
    let mut base = i128::from(base).rem_euclid(modulus);
    let mut exponent = exponent;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result * base % modulus;
        }
        base = base * base % modulus;
        exponent >>= 1;
    }
    // Python gives the result the sign of the modulus.
    let result = result.rem_euclid(modulus.abs());
    let result = if modulus < 0 && result != 0 { result + modulus } else { result };
    i64::try_from(result).map_err(|_| RuntimeError::Overflow)
}

/// `hex` and `bin`: a signed, prefixed rendering of an integer.
fn radix(arguments: Arguments, function: &str, prefix: &str, render: fn(u64) -> String) -> Result<Value, RuntimeError> {
    let value = single(arguments, function)?;
    let number = value.as_int().ok_or_else(|| {
        RuntimeError::Type(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })?;
    let sign = if number < 0 { "-" } else { "" };
    Ok(Value::str(format!("{sign}{prefix}{}", render(number.unsigned_abs()))))
}

fn hex(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    radix(arguments, "hex", "0x", |digits| format!("{digits:x}"))
}

fn bin(_: &mut Interpreter, _: &CallSite, arguments: Arguments) -> Result<Value, RuntimeError> {
    radix(arguments, "bin", "0b", |digits| format!("{digits:b}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::interpreter::OutputBuffer;
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
    fn print_honours_sep_and_end() {
        assert_eq!(
            output("print(1, 'a', none, sep = '-', end = '!')\nprint()"),
            "1-a-None!\n"
        );
        assert_eq!(
            failure("print(1, flush = true)"),
            "TypeError: print() got an unexpected keyword argument 'flush'"
        );
    }

    #[test]
    fn conversions() {
        assert_eq!(
            output(indoc! {"
                print(int('4_2'), int(' -7 '), int(3.9), int('ff', 16), int(true))
                print(float('1.5'), float(2), str(12) + '!', bool([]), bool('x'))
                print(list('ab'), tuple([1]), set([1, 1, 2]), dict([['a', 1]], b = 2))
                print(complex(1, 2), type(1), type('') == str)
            "}),
            indoc! {"
                42 -7 3 255 1
                1.5 2.0 12! False True
                ['a', 'b'] (1,) {1, 2} {'a': 1, 'b': 2}
                (1+2j) <class 'int'> True
            "}
        );
        assert_eq!(
            failure("int('12a')"),
            "ValueError: invalid literal for int() with base 10: '12a'"
        );
        assert_eq!(
            failure("int('1', 2, 3)"),
            "TypeError: int() expected at most 2 arguments, got 3"
        );
        assert_eq!(
            failure("int(1, 10)"),
            "TypeError: int() can't convert non-string with explicit base, got int"
        );
        assert_eq!(
            failure("float('x')"),
            "ValueError: could not convert string to float: 'x'"
        );
        assert_eq!(
            failure("dict([[1, 2, 3]])"),
            "ValueError: dictionary update sequence element #0 has length 3; 2 is required"
        );
    }

    #[test]
    fn isinstance_follows_classes_and_types() {
        assert_eq!(
            output(indoc! {"
                class A {}
                class B extends A {}
                print(isinstance(B(), A), isinstance(A(), B), isinstance(true, int))
                print(isinstance(1.0, (int, float)), isinstance(ValueError(), Exception))
            "}),
            "True False True\nTrue True\n"
        );
    }

    #[test]
    fn aggregates() {
        assert_eq!(
            output(indoc! {"
                words = ['pear', 'fig', 'banana']
                print(len(words), len('héllo'), len({'a': 1}), len(range(0, 10, 3)))
                print(min(3, 1, 2), max(words, key = len), min([], $default = 'none'))
                print(sum([1, 2, 3]), sum([[1], [2]], []), abs(-4), abs(-2.5))
                print(sorted(words), sorted(words, key = len, reverse = true))
                print(reversed([1, 2, 3]), enumerate('ab', 1), zip([1, 2, 3], 'xy'))
            "}),
            indoc! {"
                3 5 1 4
                1 banana none
                6 [1, 2] 4 2.5
                ['banana', 'fig', 'pear'] ['banana', 'pear', 'fig']
                [3, 2, 1] [(1, 'a'), (2, 'b')] [(1, 'x'), (2, 'y')]
            "}
        );
        assert_eq!(failure("max([])"), "ValueError: max() arg is an empty sequence");
        assert_eq!(
            failure("min([], default = 0)"),
            "SyntaxError: expected expression"
        );
        assert_eq!(
            failure("sum(['a'], '')"),
            "TypeError: sum() can't sum strings [use ''.join(seq) instead]"
        );
        assert_eq!(failure("len(5)"), "TypeError: object of type 'int' has no len()");
    }

    #[test]
    fn sorting_is_stable() {
        assert_eq!(
            output("print(sorted([[2, 'a'], [1, 'b'], [2, 'c'], [1, 'd']], key = func (p) { return p[0] }))"),
            "[[1, 'b'], [1, 'd'], [2, 'a'], [2, 'c']]\n"
        );
    }

    #[test]
    fn attribute_helpers() {
        assert_eq!(
            output(indoc! {"
                class Box {}
                b = Box()
                setattr(b, 'size', 3)
                print(hasattr(b, 'size'), hasattr(b, 'colour'), getattr(b, 'size'), getattr(b, 'colour', 'red'))
            "}),
            "True False 3 red\n"
        );
        assert_eq!(
            failure("getattr(1, 'nope')"),
            "AttributeError: 'int' object has no attribute 'nope'"
        );
    }

    #[test]
    fn characters_and_rounding() {
        assert_eq!(
            output("print(chr(97), ord('é'), round(2.5), round(3.5), round(1.234, 2), round(1250, -2))"),
            "a 233 2 4 1.23 1200\n"
        );
        assert_eq!(
            failure("ord('ab')"),
            "TypeError: ord() expected a character, but string of length 2 found"
        );
    }

    #[test]
    fn identity_and_hashing() {
        assert_eq!(
            output(indoc! {"
                a = [1]
                b = a
                print(id(a) == id(b), id(a) == id([1]), hash(1) == hash(1.0), hash('x') == hash('x'))
            "}),
            "True False True True\n"
        );
        assert_eq!(failure("hash([])"), "TypeError: unhashable type: 'list'");
    }

    #[test]
    fn exec_and_eval_use_scopes() {
        assert_eq!(
            output(indoc! {"
                x = 2
                exec('y = x * 10')
                print(y, eval('x + y'))
                env = {'x': 5}
                exec('z = x + 1', env)
                print(env['z'], eval('x', env))
                func f() {
                    local = 1
                    print(sorted(locals().keys()), 'x' in globals())
                }
                f()
            "}),
            "20 22\n6 5\n['local'] True\n"
        );
        assert_eq!(failure("exec('1', 5)"), "TypeError: exec(): globals must be dict");
    }

    #[test]
    fn approximate_and_step_helpers() {
        assert_eq!(
            output("print(ce(0.1 + 0.2, 0.3), nce(1, 1.5), increment(1), decrement(0.5))"),
            "True True 2 -0.5\n"
        );
        assert_eq!(
            failure("increment('a')"),
            "TypeError: unsupported operand type(s) for ++ or increment(): 'str'"
        );
    }

    #[test]
    fn exit_raises_system_exit() {
        let fault = Interpreter::default()
            .execute("test.pys", "exit(4)", Mode::Exec)
            .expect_err("exit should unwind");
        assert!(fault.is_kind(ExceptionKind::SystemExit));
        assert_eq!(fault.to_string(), "SystemExit: 4");
        assert_eq!(output("try { exit() } catch (SystemExit) { print('caught') }"), "caught\n");
    }

    #[test]
    fn map_and_filter_are_lazy_iterators() {
        assert_eq!(
            output(indoc! {"
                squares = map(func (x) { return x * x }, [1, 2, 3])
                print(next(squares), list(squares), list(squares))
                print(list(map(func (a, b) { return a + b }, [1, 2, 3], (10, 20))))
                print(list(filter(func (x) { return x % 2 }, range(6))), list(filter(none, [0, 1, '', 'a'])))
                print(any([0, '', 3]), any([]), all([1, 'x']), all([1, 0]))
            "}),
            "1 [4, 9] []\n[11, 22]\n[1, 3, 5] [1, 'a']\nTrue False True False\n"
        );
    }

    #[test]
    fn next_raises_stop_iteration_or_returns_default() {
        assert_eq!(
            output(indoc! {"
                it = iter([1])
                print(iter(it) is it, next(it), next(it, 'done'))
                try { next(it) } catch (StopIteration) { print('stopped') }
            "}),
            "True 1 done\nstopped\n"
        );
        assert_eq!(failure("next([1])"), "TypeError: 'list' object is not an iterator");
    }

    #[test]
    fn super_reaches_the_next_class_in_line() {
        assert_eq!(
            output(indoc! {r#"
                class Base {
                    func __init__(self, name) { self.name = name }
                    func describe(self) { return "base " + self.name }
                }
                class Child extends Base {
                    func __init__(self, name) {
                        super().__init__(name + "!")
                    }
                    func describe(self) { return "child " + super().describe() }
                }
                c = Child("x")
                print(c.describe(), super(Child, c).describe())

                class AppError extends ValueError {
                    func __init__(self, code) {
                        super().__init__("code " + str(code))
                        self.code = code
                    }
                }
                try { throw AppError(7) } catch (ValueError as error) { print(error, error.code) }
            "#}),
            "child base x! base x!\ncode 7 7\n"
        );
        assert_eq!(failure("super()"), "TypeError: super(): no arguments");
    }

    #[test]
    fn introspection_builtins() {
        assert_eq!(
            output(indoc! {"
                class P {
                    func __init__(self) { self.y = 2 }
                    func m(self) {}
                }
                class Q extends P {}
                p = P()
                print(vars(p), dir(p), 'append' in dir([]))
                print(isobjectof(p, P), isobjectof(Q, P), isobjectof(3, (str, int)), isobjectof(P, Q))
                print(issubclass(Q, P), issubclass(P, Q), issubclass(bool, int), issubclass(Q, (int, P)))
                print(callable(len), callable(P), callable(p), callable(p.m), callable(1))
            "}),
            "{'y': 2} ['__init__', 'm', 'y'] True\nTrue True True False\nTrue False True True\nTrue True False True False\n"
        );
        assert_eq!(failure("issubclass(1, int)"), "TypeError: issubclass() arg 1 must be a class");
        assert_eq!(
            failure("vars(1)"),
            "TypeError: vars() argument must have __dict__ attribute"
        );
    }

    #[test]
    fn comprehension_maps_and_filters() {
        assert_eq!(
            output(indoc! {"
                print(list(comprehension(range(6), func (x) { return x * 10 }, func (x) { return x > 3 })))
                print(list(comprehension('ab', func (c) { return c + c })))
            "}),
            "[40, 50]\n['aa', 'bb']\n"
        );
        assert_eq!(
            failure("comprehension([1], 2)"),
            "TypeError: comprehension(): wrap must be callable"
        );
    }

    #[test]
    fn integer_arithmetic_helpers() {
        assert_eq!(
            output(indoc! {"
                print(divmod(7, 2), divmod(-7, 2), pow(2, 10), pow(3, 4, 5), pow(-2, 3, 5))
                print(hex(31), hex(-31), bin(5), bin(0), hex(true))
            "}),
            "(3, 1) (-4, 1) 1024 1 2\n0x1f -0x1f 0b101 0b0 0x1\n"
        );
        assert_eq!(failure("pow(2, 3, 0)"), "ValueError: pow() 3rd argument cannot be 0");
        assert_eq!(
            failure("hex(1.5)"),
            "TypeError: 'float' object cannot be interpreted as an integer"
        );
    }
}
