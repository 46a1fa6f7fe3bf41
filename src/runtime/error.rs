use thiserror::Error;

use crate::runtime::exception::{ExceptionKind, Fault};

/// Failures raised by value-level helpers and built-in functions.
///
/// Each variant maps onto one built-in exception class through
/// [`RuntimeError::kind`]; the interpreter turns it into a [`Fault`] once
/// the span and frame of the failing node are known. A fault that already
/// exists (raised by user code inside a nested call) travels through
/// `Raised` untouched.
#[derive(Debug, Error, Clone)]
pub enum RuntimeError {
    #[error("unsupported operand type(s) for {operator}: '{left}' and '{right}'")]
    UnsupportedOperands {
        operator: &'static str,
        left: String,
        right: String,
    },
    #[error("bad operand type for unary {operator}: '{type_name}'")]
    UnsupportedOperand {
        operator: &'static str,
        type_name: String,
    },
    #[error("'{operator}' not supported between instances of '{left}' and '{right}'")]
    UnorderedComparison {
        operator: &'static str,
        left: String,
        right: String,
    },
    #[error("'{type_name}' object is not callable")]
    NotCallable { type_name: String },
    #[error("'{type_name}' object is not subscriptable")]
    NotSubscriptable { type_name: String },
    #[error("'{type_name}' object does not support item assignment")]
    NoItemAssignment { type_name: String },
    #[error("'{type_name}' object does not support item deletion")]
    NoItemDeletion { type_name: String },
    #[error("'{type_name}' object is not iterable")]
    NotIterable { type_name: String },
    #[error("cannot unpack non-iterable {type_name} object")]
    CannotUnpack { type_name: String },
    #[error("unhashable type: '{type_name}'")]
    Unhashable { type_name: String },
    #[error("{type_name} indices must be integers or slices, not {index}")]
    InvalidIndexType { type_name: String, index: String },
    #[error("exceptions must derive from BaseException")]
    NotThrowable,
    #[error("'{type_name}' object does not support the context manager protocol")]
    NotContextManager { type_name: String },
    #[error(
        "{function}() takes {expected} positional argument{} but {given} {} given",
        plural(.expected),
        were(.given)
    )]
    TooManyPositional {
        function: String,
        expected: usize,
        given: usize,
    },
    #[error("{function}() missing {}", describe_missing(.missing))]
    MissingArguments {
        function: String,
        missing: Vec<String>,
    },
    #[error("{function}() got multiple values for argument '{argument}'")]
    MultipleValues { function: String, argument: String },
    #[error("{function}() got an unexpected keyword argument '{argument}'")]
    UnexpectedKeyword { function: String, argument: String },
    #[error("{function}() takes no keyword arguments")]
    NoKeywordArguments { function: String },
    #[error("{function}() expected {expected} argument{}, got {given}", plural(.expected))]
    BuiltinArity {
        function: String,
        expected: usize,
        given: usize,
    },
    #[error("{function}() expected at most {expected} argument{}, got {given}", plural(.expected))]
    BuiltinArityAtMost {
        function: String,
        expected: usize,
        given: usize,
    },
    #[error("{0}")]
    Type(String),

    #[error("too many values to unpack (expected {expected})")]
    TooManyValues { expected: usize },
    #[error("not enough values to unpack (expected {expected}, got {got})")]
    NotEnoughValues { expected: usize, got: usize },
    #[error("invalid literal for {target}() with base 10: {literal}")]
    InvalidLiteral {
        target: &'static str,
        literal: String,
    },
    #[error("{0}")]
    Value(String),

    #[error("'{name}' is not defined{}", did_you_mean(.suggestion))]
    Undefined {
        name: String,
        suggestion: Option<String>,
    },
    #[error("'{name}' is not defined on local")]
    UndefinedLocal { name: String },

    #[error("{0}")]
    DivisionByZero(&'static str),
    #[error("integer result too large")]
    Overflow,
    #[error("repeated {type_name} is too long")]
    RepeatTooLong { type_name: &'static str },
    #[error("cannot allocate {type_name} of {length} items")]
    OutOfMemory { type_name: &'static str, length: usize },

    #[error("{type_name} index out of range")]
    IndexOutOfRange { type_name: &'static str },
    #[error("pop from empty {type_name}")]
    PopFromEmpty { type_name: &'static str },
    #[error("{key}")]
    MissingKey { key: String },

    #[error("'{type_name}' object has no attribute '{attribute}'")]
    UnknownAttribute {
        type_name: String,
        attribute: String,
    },
    #[error("type object '{class}' has no attribute '{attribute}'")]
    UnknownClassAttribute { class: String, attribute: String },
    #[error("module '{module}' has no attribute '{attribute}'")]
    UnknownModuleAttribute { module: String, attribute: String },

    #[error(
        "cannot import module name '{module}' from partially initialized module '{importer}', mostly during circular import"
    )]
    CircularImport { module: String, importer: String },
    #[error("Cannot import module named '{module}': {reason}")]
    ImportFailed { module: String, reason: String },
    #[error("cannot import name '{name}' from '{module}'")]
    CannotImportName { name: String, module: String },
    #[error("No module named '{module}'")]
    ModuleNotFound { module: String },

    #[error("maximum recursion depth exceeded")]
    RecursionLimit,

    #[error("{0}")]
    Raised(Box<Fault>),
}

impl RuntimeError {
    /// Built-in exception class the error is reported as.
    pub fn kind(&self) -> ExceptionKind {
        match self {
            RuntimeError::UnsupportedOperands { .. }
            | RuntimeError::UnsupportedOperand { .. }
            | RuntimeError::UnorderedComparison { .. }
            | RuntimeError::NotCallable { .. }
            | RuntimeError::NotSubscriptable { .. }
            | RuntimeError::NoItemAssignment { .. }
            | RuntimeError::NoItemDeletion { .. }
            | RuntimeError::NotIterable { .. }
            | RuntimeError::CannotUnpack { .. }
            | RuntimeError::Unhashable { .. }
            | RuntimeError::InvalidIndexType { .. }
            | RuntimeError::NotThrowable
            | RuntimeError::NotContextManager { .. }
            | RuntimeError::TooManyPositional { .. }
            | RuntimeError::MissingArguments { .. }
            | RuntimeError::MultipleValues { .. }
            | RuntimeError::UnexpectedKeyword { .. }
            | RuntimeError::NoKeywordArguments { .. }
            | RuntimeError::BuiltinArity { .. }
            | RuntimeError::BuiltinArityAtMost { .. }
            | RuntimeError::Type(_) => ExceptionKind::TypeError,
            RuntimeError::TooManyValues { .. }
            | RuntimeError::NotEnoughValues { .. }
            | RuntimeError::InvalidLiteral { .. }
            | RuntimeError::Value(_) => ExceptionKind::ValueError,
            RuntimeError::Undefined { .. } | RuntimeError::UndefinedLocal { .. } => {
                ExceptionKind::NameError
            }
            RuntimeError::DivisionByZero(_) => ExceptionKind::ZeroDivisionError,
            RuntimeError::Overflow | RuntimeError::RepeatTooLong { .. } => {
                ExceptionKind::OverflowError
            }
            RuntimeError::OutOfMemory { .. } => ExceptionKind::MemoryError,
            RuntimeError::IndexOutOfRange { .. } | RuntimeError::PopFromEmpty { .. } => {
                ExceptionKind::IndexError
            }
            RuntimeError::MissingKey { .. } => ExceptionKind::KeyError,
            RuntimeError::UnknownAttribute { .. }
            | RuntimeError::UnknownClassAttribute { .. }
            | RuntimeError::UnknownModuleAttribute { .. } => ExceptionKind::AttributeError,
            RuntimeError::CircularImport { .. }
            | RuntimeError::ImportFailed { .. }
            | RuntimeError::CannotImportName { .. } => ExceptionKind::ImportError,
            RuntimeError::ModuleNotFound { .. } => ExceptionKind::ModuleNotFoundError,
            RuntimeError::RecursionLimit => ExceptionKind::RecursionError,
            RuntimeError::Raised(fault) => fault.kind().unwrap_or(ExceptionKind::Exception),
        }
    }

    pub(crate) fn expect_arity(
        function: &str,
        expected: usize,
        given: usize,
    ) -> Result<(), RuntimeError> {
        if expected == given {
            return Ok(());
        }
        Err(RuntimeError::BuiltinArity {
            function: function.to_string(),
            expected,
            given,
        })
    }

    pub(crate) fn expect_at_most(
        function: &str,
        expected: usize,
        given: usize,
    ) -> Result<(), RuntimeError> {
        if given <= expected {
            return Ok(());
        }
        Err(RuntimeError::BuiltinArityAtMost {
            function: function.to_string(),
            expected,
            given,
        })
    }
}

impl From<Fault> for RuntimeError {
    fn from(fault: Fault) -> Self {
        RuntimeError::Raised(Box::new(fault))
    }
}

fn plural(count: &usize) -> &'static str {
    if *count == 1 { "" } else { "s" }
}

fn were(count: &usize) -> &'static str {
    if *count == 1 { "was" } else { "were" }
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(". Did you mean '{name}'?"),
        None => String::new(),
    }
}

fn describe_missing(missing: &[String]) -> String {
    let count = missing.len();
    format!(
        "{count} required positional argument{}: {}",
        plural(&count),
        join_quoted(missing)
    )
}

/// `'a'`, `'a' and 'b'`, `'a', 'b', and 'c'`
fn join_quoted(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|name| format!("'{name}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn arity_messages_report_given_count() {
        let error = RuntimeError::TooManyPositional {
            function: "f".to_string(),
            expected: 1,
            given: 3,
        };
        assert_eq!(
            error.to_string(),
            "f() takes 1 positional argument but 3 were given"
        );
        assert_eq!(error.kind(), ExceptionKind::TypeError);
    }

    #[test]
    fn missing_arguments_join_names() {
        let error = RuntimeError::MissingArguments {
            function: "g".to_string(),
            missing: vec!["a".to_string(), "b".to_string(), "c".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "g() missing 3 required positional arguments: 'a', 'b', and 'c'"
        );
    }

    #[test]
    fn undefined_name_suggests_closest() {
        let error = RuntimeError::Undefined {
            name: "cout".to_string(),
            suggestion: Some("count".to_string()),
        };
        assert_eq!(
            error.to_string(),
            "'cout' is not defined. Did you mean 'count'?"
        );
        assert_eq!(error.kind(), ExceptionKind::NameError);
    }

    #[test]
    fn unpack_messages() {
        assert_eq!(
            RuntimeError::TooManyValues { expected: 2 }.to_string(),
            "too many values to unpack (expected 2)"
        );
        assert_eq!(
            RuntimeError::NotEnoughValues {
                expected: 3,
                got: 2
            }
            .to_string(),
            "not enough values to unpack (expected 3, got 2)"
        );
    }
}
