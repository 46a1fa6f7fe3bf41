//! Built-in exception hierarchy and the fault record carried by signals.
//!
//! Exception classes are ordinary [`Class`] objects created once per
//! interpreter session. A raised exception is always an instance of one of
//! them (or of a user class extending one), wrapped in a [`Fault`] that also
//! remembers where it was raised and which fault it interrupted.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::runtime::context::Context;
use crate::runtime::value::{Class, Instance, Value};
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    BaseException,
    SystemExit,
    Exception,
    ArithmeticError,
    ZeroDivisionError,
    OverflowError,
    AssertionError,
    AttributeError,
    ImportError,
    ModuleNotFoundError,
    LookupError,
    IndexError,
    KeyError,
    MemoryError,
    NameError,
    RuntimeError,
    RecursionError,
    NotImplementedError,
    StopIteration,
    SyntaxError,
    TypeError,
    ValueError,
}

impl ExceptionKind {
    /// Parents always precede their children.
    pub const ALL: [ExceptionKind; 22] = [
        ExceptionKind::BaseException,
        ExceptionKind::SystemExit,
        ExceptionKind::Exception,
        ExceptionKind::ArithmeticError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::OverflowError,
        ExceptionKind::AssertionError,
        ExceptionKind::AttributeError,
        ExceptionKind::ImportError,
        ExceptionKind::ModuleNotFoundError,
        ExceptionKind::LookupError,
        ExceptionKind::IndexError,
        ExceptionKind::KeyError,
        ExceptionKind::MemoryError,
        ExceptionKind::NameError,
        ExceptionKind::RuntimeError,
        ExceptionKind::RecursionError,
        ExceptionKind::NotImplementedError,
        ExceptionKind::StopIteration,
        ExceptionKind::SyntaxError,
        ExceptionKind::TypeError,
        ExceptionKind::ValueError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::BaseException => "BaseException",
            ExceptionKind::SystemExit => "SystemExit",
            ExceptionKind::Exception => "Exception",
            ExceptionKind::ArithmeticError => "ArithmeticError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::AssertionError => "AssertionError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::ImportError => "ImportError",
            ExceptionKind::ModuleNotFoundError => "ModuleNotFoundError",
            ExceptionKind::LookupError => "LookupError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::MemoryError => "MemoryError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::RecursionError => "RecursionError",
            ExceptionKind::NotImplementedError => "NotImplementedError",
            ExceptionKind::StopIteration => "StopIteration",
            ExceptionKind::SyntaxError => "SyntaxError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::ValueError => "ValueError",
        }
    }

    pub fn parent(self) -> Option<ExceptionKind> {
        let parent = match self {
            ExceptionKind::BaseException => return None,
            ExceptionKind::SystemExit | ExceptionKind::Exception => ExceptionKind::BaseException,
            ExceptionKind::ZeroDivisionError | ExceptionKind::OverflowError => {
                ExceptionKind::ArithmeticError
            }
            ExceptionKind::ModuleNotFoundError => ExceptionKind::ImportError,
            ExceptionKind::IndexError | ExceptionKind::KeyError => ExceptionKind::LookupError,
            ExceptionKind::RecursionError | ExceptionKind::NotImplementedError => {
                ExceptionKind::RuntimeError
            }
            _ => ExceptionKind::Exception,
        };
        Some(parent)
    }

    pub fn from_name(name: &str) -> Option<ExceptionKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

/// Anything that can be reported as a raised exception.
///
/// Script exception instances implement it, and so do faults handed over
/// by a host bridge, which only need a type tag and a message.
pub trait Throwable {
    fn type_name(&self) -> String;
    fn message(&self) -> String;
}

impl Throwable for Instance {
    fn type_name(&self) -> String {
        self.class.name.clone()
    }

    fn message(&self) -> String {
        let Some(Value::Tuple(args)) = self.get("args") else {
            return String::new();
        };
        match args.as_ref() {
            [] => String::new(),
            [single] => single.plain_str(),
            _ => Value::Tuple(args.clone()).plain_repr(),
        }
    }
}

/// A native fault raised by a host bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFault {
    pub type_name: String,
    pub message: String,
}

impl Throwable for HostFault {
    fn type_name(&self) -> String {
        self.type_name.clone()
    }

    fn message(&self) -> String {
        self.message.clone()
    }
}

/// The built-in exception classes of one interpreter session.
pub struct ExceptionClasses {
    classes: FxHashMap<ExceptionKind, Rc<Class>>,
}

impl ExceptionClasses {
    pub fn new() -> Self {
        let mut classes: FxHashMap<ExceptionKind, Rc<Class>> = FxHashMap::default();
        for kind in ExceptionKind::ALL {
            let bases = kind
                .parent()
                .and_then(|parent| classes.get(&parent).cloned())
                .into_iter()
                .collect();
            let class = Class::new(kind.name().to_string(), kind.name().to_string(), bases);
            classes.insert(kind, Rc::new(class.with_builtin(kind)));
        }
        Self { classes }
    }

    pub fn get(&self, kind: ExceptionKind) -> Rc<Class> {
        match self.classes.get(&kind) {
            Some(class) => class.clone(),
            None => Rc::new(Class::new(
                kind.name().to_string(),
                kind.name().to_string(),
                Vec::new(),
            )),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExceptionKind, &Rc<Class>)> {
        ExceptionKind::ALL
            .into_iter()
            .filter_map(|kind| self.classes.get(&kind).map(|class| (kind, class)))
    }

    /// A fresh instance of `kind` carrying `message` as its single argument.
    pub fn instantiate(&self, kind: ExceptionKind, message: String) -> Rc<Instance> {
        let args = if message.is_empty() {
            Vec::new()
        } else {
            vec![Value::str(message)]
        };
        Instance::exception(self.get(kind), args)
    }
}

impl Default for ExceptionClasses {
    fn default() -> Self {
        Self::new()
    }
}

/// A raised exception together with the frame and span that raised it.
#[derive(Clone)]
pub struct Fault {
    pub exception: Rc<Instance>,
    pub type_name: String,
    pub message: String,
    pub span: Span,
    pub context: Rc<Context>,
    /// Fault that was being handled when this one was raised.
    pub previous: Option<Box<Fault>>,
    /// Explicit cause from `throw ... from ...`.
    pub cause: Option<Box<Fault>>,
}

impl Fault {
    pub fn new(exception: Rc<Instance>, message: String, span: Span, context: Rc<Context>) -> Self {
        Self {
            type_name: exception.type_name(),
            exception,
            message,
            span,
            context,
            previous: None,
            cause: None,
        }
    }

    /// Built-in class this fault's exception descends from.
    pub fn kind(&self) -> Option<ExceptionKind> {
        self.exception.class.exception_kind()
    }

    pub fn is_kind(&self, kind: ExceptionKind) -> bool {
        let mut current = self.kind();
        while let Some(found) = current {
            if found == kind {
                return true;
            }
            current = found.parent();
        }
        false
    }

    pub fn exception_value(&self) -> Value {
        Value::Instance(self.exception.clone())
    }

    /// Links `previous` as the interrupted fault unless a link exists.
    pub fn chained(mut self, previous: Fault) -> Self {
        if self.previous.is_none() && !Rc::ptr_eq(&self.exception, &previous.exception) {
            self.previous = Some(Box::new(previous));
        }
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.type_name)
        } else {
            write!(f, "{}: {}", self.type_name, self.message)
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("type_name", &self.type_name)
            .field("message", &self.message)
            .field("span", &self.span)
            .field("previous", &self.previous)
            .field("cause", &self.cause)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_links_to_parents() {
        let classes = ExceptionClasses::new();
        let zero = classes.get(ExceptionKind::ZeroDivisionError);
        assert!(zero.is_subclass_of(&classes.get(ExceptionKind::ArithmeticError)));
        assert!(zero.is_subclass_of(&classes.get(ExceptionKind::BaseException)));
        assert!(!zero.is_subclass_of(&classes.get(ExceptionKind::LookupError)));
        assert_eq!(zero.exception_kind(), Some(ExceptionKind::ZeroDivisionError));
    }

    #[test]
    fn instance_message_follows_arguments() {
        let classes = ExceptionClasses::new();
        let empty = classes.instantiate(ExceptionKind::ValueError, String::new());
        assert_eq!(empty.message(), "");
        let single = classes.instantiate(ExceptionKind::ValueError, "bad".to_string());
        assert_eq!(single.message(), "bad");
        assert_eq!(single.type_name(), "ValueError");

        let pair = Instance::exception(
            classes.get(ExceptionKind::Exception),
            vec![Value::Int(1), Value::str("x")],
        );
        assert_eq!(pair.message(), "(1, 'x')");
    }

    #[test]
    fn names_round_trip() {
        for kind in ExceptionKind::ALL {
            assert_eq!(ExceptionKind::from_name(kind.name()), Some(kind));
        }
    }
}
