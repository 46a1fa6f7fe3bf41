use std::cell::RefCell;
use std::rc::Rc;
use std::vec;

use crate::runtime::context::CallSite;
use crate::runtime::error::RuntimeError;
use crate::runtime::exception::ExceptionKind;
use crate::runtime::value::{Arguments, Value};

use super::Interpreter;

/// Cursor over an iterable value.
///
/// Built-in containers are snapshotted up front, so mutating a list while
/// looping over it does not affect the loop. Instances iterate through
/// `__iter__` and `__next__`, with `StopIteration` ending the loop.
/// `map` and `filter` wrap other cursors and stay lazy.
pub enum Iteration {
    Items(vec::IntoIter<Value>),
    Range { next: i64, stop: i64, step: i64 },
    Protocol(Value),
    /// The state behind a script-visible iterator value.
    Shared(Rc<RefCell<Iteration>>),
    Mapped { function: Value, sources: Vec<Iteration> },
    /// A `None` predicate keeps truthy items.
    Filtered { predicate: Value, source: Box<Iteration> },
}

impl Iteration {
    fn exhausted() -> Self {
        Iteration::Items(Vec::new().into_iter())
    }
}

impl Interpreter {
    pub(crate) fn iterate(&mut self, site: &CallSite, value: &Value) -> Result<Iteration, RuntimeError> {
        let items = match value {
            Value::List(items) => items.borrow().clone(),
            Value::Tuple(items) => items.to_vec(),
            Value::Str(text) => text.chars().map(|c| Value::str(c.to_string())).collect(),
            Value::Dict(dict) | Value::Set(dict) => dict.borrow().keys(),
            Value::Range(range) => {
                return Ok(Iteration::Range {
                    next: range.start,
                    stop: range.stop,
                    step: range.step,
                });
            }
            Value::Iterator(cursor) => return Ok(Iteration::Shared(cursor.clone())),
            Value::Instance(_) => match self.dunder(site, value, "__iter__", Vec::new())? {
                Some(iterator) => return Ok(Iteration::Protocol(iterator)),
                None => {
                    return Err(RuntimeError::NotIterable {
                        type_name: value.type_name(),
                    });
                }
            },
            other => {
                return Err(RuntimeError::NotIterable {
                    type_name: other.type_name(),
                });
            }
        };
        Ok(Iteration::Items(items.into_iter()))
    }

    pub(crate) fn next_item(
        &mut self,
        site: &CallSite,
        iteration: &mut Iteration,
    ) -> Result<Option<Value>, RuntimeError> {
        match iteration {
            Iteration::Items(items) => Ok(items.next()),
            Iteration::Range { next, stop, step } => {
                let more = if *step > 0 { *next < *stop } else { *next > *stop };
                if !more {
                    return Ok(None);
                }
                let current = *next;
                *next = next.saturating_add(*step);
                Ok(Some(Value::Int(current)))
            }
            Iteration::Protocol(iterator) => {
                let iterator = iterator.clone();
                match self.dunder(site, &iterator, "__next__", Vec::new()) {
                    Ok(Some(value)) => Ok(Some(value)),
                    Ok(None) => Err(RuntimeError::Type(format!(
                        "'{}' object is not an iterator",
                        iterator.type_name()
                    ))),
                    Err(RuntimeError::Raised(fault)) if fault.is_kind(ExceptionKind::StopIteration) => {
                        Ok(None)
                    }
                    Err(error) => Err(error),
                }
            }
            Iteration::Shared(cursor) => {
                // Taken out while advancing so a reentrant `next` sees an
                // exhausted cursor instead of a borrow conflict.
                let cursor = cursor.clone();
                let mut state = cursor.replace(Iteration::exhausted());
                let item = self.next_item(site, &mut state);
                cursor.replace(state);
                item
            }
            Iteration::Mapped { function, sources } => {
                let mut row = Vec::with_capacity(sources.len());
                for source in sources.iter_mut() {
                    match self.next_item(site, source)? {
                        Some(item) => row.push(item),
                        None => return Ok(None),
                    }
                }
                let function = function.clone();
                self.call_value(site, &function, Arguments::positional(row))
                    .map(Some)
            }
            Iteration::Filtered { predicate, source } => {
                let predicate = predicate.clone();
                while let Some(item) = self.next_item(site, source)? {
                    let verdict = if predicate.is_none() {
                        item.clone()
                    } else {
                        self.call_value(site, &predicate, Arguments::positional(vec![item.clone()]))?
                    };
                    if self.truthy(site, &verdict)? {
                        return Ok(Some(item));
                    }
                }
                Ok(None)
            }
        }
    }

    /// A script-visible iterator over `value`. Iterators and instances
    /// with `__iter__` hand back their own iterator.
    pub(crate) fn iterator(&mut self, site: &CallSite, value: &Value) -> Result<Value, RuntimeError> {
        match self.iterate(site, value)? {
            Iteration::Shared(cursor) => Ok(Value::Iterator(cursor)),
            Iteration::Protocol(iterator) => Ok(iterator),
            other => Ok(Value::Iterator(Rc::new(RefCell::new(other)))),
        }
    }

    /// `next(iterator)`: `None` once exhausted.
    pub(crate) fn advance(&mut self, site: &CallSite, iterator: &Value) -> Result<Option<Value>, RuntimeError> {
        match iterator {
            Value::Iterator(cursor) => self.next_item(site, &mut Iteration::Shared(cursor.clone())),
            Value::Instance(_) => self.next_item(site, &mut Iteration::Protocol(iterator.clone())),
            other => Err(RuntimeError::Type(format!(
                "'{}' object is not an iterator",
                other.type_name()
            ))),
        }
    }

    /// Drains an iterable into a vector.
    pub(crate) fn collect(&mut self, site: &CallSite, value: &Value) -> Result<Vec<Value>, RuntimeError> {
        let mut iteration = match self.iterate(site, value)? {
            Iteration::Items(items) => return Ok(items.collect()),
            other => other,
        };
        let mut items = Vec::new();
        while let Some(item) = self.next_item(site, &mut iteration)? {
            items.push(item);
        }
        Ok(items)
    }

    /// Splits `value` into exactly `count` items for destructuring.
    pub(crate) fn unpack(&mut self, site: &CallSite, value: &Value, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let items = match self.collect(site, value) {
            Ok(items) => items,
            Err(RuntimeError::NotIterable { type_name }) => {
                return Err(RuntimeError::CannotUnpack { type_name });
            }
            Err(error) => return Err(error),
        };
        match items.len().cmp(&count) {
            std::cmp::Ordering::Equal => Ok(items),
            std::cmp::Ordering::Greater => Err(RuntimeError::TooManyValues { expected: count }),
            std::cmp::Ordering::Less => Err(RuntimeError::NotEnoughValues {
                expected: count,
                got: items.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::OutputBuffer;
    use super::*;
    use crate::config::Config;
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

    #[test]
    fn iterates_builtin_containers() {
        assert_eq!(
            output(indoc! {"
                out = []
                for (c of 'ab') { out.append(c) }
                for (k of {'x': 1, 'y': 2}) { out.append(k) }
                for (i of range(10, 0, -4)) { out.append(i) }
                print(out)
            "}),
            "['a', 'b', 'x', 'y', 10, 6, 2]\n"
        );
    }

    #[test]
    fn loops_see_a_snapshot_of_lists() {
        assert_eq!(
            output(indoc! {"
                xs = [1, 2]
                for (x of xs) { xs.append(x) }
                print(xs)
            "}),
            "[1, 2, 1, 2]\n"
        );
    }

    #[test]
    fn iterator_protocol_stops_on_stop_iteration() {
        assert_eq!(
            output(indoc! {"
                class Countdown {
                    func __init__(self, n) { self.n = n }
                    func __iter__(self) { return self }
                    func __next__(self) {
                        if (self.n == 0) { throw StopIteration }
                        self.n -= 1
                        return self.n
                    }
                }
                print(list(Countdown(3)))
                a, b = Countdown(2)
                print(a, b)
            "}),
            "[2, 1, 0]\n1 0\n"
        );
    }
}
