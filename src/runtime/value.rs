//! Script values and the object types behind them.
//!
//! Scalars are stored inline. Everything with identity (containers,
//! functions, classes, instances, modules) is an `Rc` handle, so copying a
//! `Value` aliases the same object the way script assignment does.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHasher};

use crate::ast::FunctionDef;
use crate::interpreter::{Interpreter, Iteration};
use crate::runtime::context::{CallSite, Context};
use crate::runtime::dict::Dict;
use crate::runtime::error::RuntimeError;
use crate::runtime::exception::ExceptionKind;
use crate::runtime::symtab::SymbolTable;
use crate::stack;

#[derive(Clone, Default)]
pub enum Value {
    /// Lookup-miss marker; never stored in script data.
    #[default]
    Undefined,
    None,
    Ellipsis,
    Bool(bool),
    Int(i64),
    Float(f64),
    Complex(f64, f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    Dict(Rc<RefCell<Dict>>),
    Set(Rc<RefCell<Dict>>),
    Range(Range),
    Slice(Rc<Slice>),
    Function(Rc<Function>),
    BoundMethod(Rc<BoundMethod>),
    Builtin(Rc<Builtin>),
    Type(TypeKind),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
    Module(Rc<Module>),
    /// Cursor returned by `iter`, `map` and `filter`; advancing it is
    /// visible through every handle.
    Iterator(Rc<RefCell<Iteration>>),
    Super(Rc<Super>),
}

/// Built-in types, which double as their constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    NoneType,
    Ellipsis,
    Bool,
    Int,
    Float,
    Complex,
    Str,
    List,
    Tuple,
    Dict,
    Set,
    Range,
    Slice,
    Function,
    Builtin,
    Method,
    Type,
    Module,
    Iterator,
    Super,
}

impl TypeKind {
    pub fn name(self) -> &'static str {
        match self {
            TypeKind::NoneType => "NoneType",
            TypeKind::Ellipsis => "ellipsis",
            TypeKind::Bool => "bool",
            TypeKind::Int => "int",
            TypeKind::Float => "float",
            TypeKind::Complex => "complex",
            TypeKind::Str => "str",
            TypeKind::List => "list",
            TypeKind::Tuple => "tuple",
            TypeKind::Dict => "dict",
            TypeKind::Set => "set",
            TypeKind::Range => "range",
            TypeKind::Slice => "slice",
            TypeKind::Function => "function",
            TypeKind::Builtin => "builtin_function_or_method",
            TypeKind::Method => "method",
            TypeKind::Type => "type",
            TypeKind::Module => "module",
            TypeKind::Iterator => "iterator",
            TypeKind::Super => "super",
        }
    }

    /// `bool` is a subtype of `int`; everything else only matches itself.
    pub fn accepts(self, other: TypeKind) -> bool {
        self == other || (self == TypeKind::Int && other == TypeKind::Bool)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    pub fn len(&self) -> usize {
        let span = if self.step > 0 {
            self.stop.saturating_sub(self.start)
        } else {
            self.start.saturating_sub(self.stop)
        };
        if span <= 0 {
            return 0;
        }
        let step = self.step.unsigned_abs();
        (span.unsigned_abs().div_ceil(step)) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        Some(self.start + self.step * index as i64)
    }

    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            value >= self.start && value < self.stop
        } else {
            value <= self.start && value > self.stop
        };
        in_bounds && (value - self.start) % self.step == 0
    }
}

/// `start:stop:step` as evaluated in a subscript.
#[derive(Clone)]
pub struct Slice {
    pub start: Value,
    pub stop: Value,
    pub step: Value,
}

impl Slice {
    /// Concrete positions selected from a sequence of `len` items.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>, RuntimeError> {
        let len = len as i64;
        let step = match &self.step {
            Value::None => 1,
            value => slice_bound(value)?,
        };
        if step == 0 {
            return Err(RuntimeError::Value("slice step cannot be zero".to_string()));
        }

        let clamp = |bound: &Value, default: i64| -> Result<i64, RuntimeError> {
            if matches!(bound, Value::None) {
                return Ok(default);
            }
            let mut index = slice_bound(bound)?;
            if index < 0 {
                index += len;
            }
            Ok(if step > 0 {
                index.clamp(0, len)
            } else {
                index.clamp(-1, len - 1)
            })
        };

        let (start, stop) = if step > 0 {
            (clamp(&self.start, 0)?, clamp(&self.stop, len)?)
        } else {
            (clamp(&self.start, len - 1)?, clamp(&self.stop, -1)?)
        };

        let mut indices = Vec::new();
        let mut index = start;
        while (step > 0 && index < stop) || (step < 0 && index > stop) {
            indices.push(index as usize);
            index += step;
        }
        Ok(indices)
    }
}

fn slice_bound(value: &Value) -> Result<i64, RuntimeError> {
    value.as_int().ok_or_else(|| {
        RuntimeError::Type(
            "slice indices must be integers or None or have an __index__ method".to_string(),
        )
    })
}

/// Positional and keyword arguments of one call.
#[derive(Clone, Default)]
pub struct Arguments {
    pub positional: Vec<Value>,
    pub keywords: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new(positional: Vec<Value>, keywords: Vec<(String, Value)>) -> Self {
        Self {
            positional,
            keywords,
        }
    }

    pub fn positional(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    /// Removes and returns the keyword argument `name`.
    pub fn take_keyword(&mut self, name: &str) -> Option<Value> {
        let index = self.keywords.iter().position(|(key, _)| key == name)?;
        Some(self.keywords.remove(index).1)
    }

    pub fn reject_keywords(&self, function: &str) -> Result<(), RuntimeError> {
        match self.keywords.first() {
            None => Ok(()),
            Some(_) => Err(RuntimeError::NoKeywordArguments {
                function: function.to_string(),
            }),
        }
    }

    /// Exactly `count` positional arguments and no keywords.
    pub fn exactly(self, function: &str, count: usize) -> Result<Vec<Value>, RuntimeError> {
        self.reject_keywords(function)?;
        RuntimeError::expect_arity(function, count, self.positional.len())?;
        Ok(self.positional)
    }

    /// At most `count` positional arguments and no keywords.
    pub fn at_most(self, function: &str, count: usize) -> Result<Vec<Value>, RuntimeError> {
        self.reject_keywords(function)?;
        RuntimeError::expect_at_most(function, count, self.positional.len())?;
        Ok(self.positional)
    }

    pub fn with_receiver(mut self, receiver: Value) -> Self {
        self.positional.insert(0, receiver);
        self
    }
}

pub type BuiltinFn = fn(&mut Interpreter, &CallSite, Arguments) -> Result<Value, RuntimeError>;

pub struct Builtin {
    pub name: &'static str,
    pub function: BuiltinFn,
}

/// A user function closed over its defining frame.
pub struct Function {
    pub name: String,
    pub qualname: String,
    pub definition: Rc<FunctionDef>,
    /// Default per parameter, evaluated once at definition time.
    pub defaults: Vec<Option<Value>>,
    pub closure: Rc<Context>,
    /// Table each call's locals are parented to. Methods skip the class
    /// body and see the scope enclosing the class.
    pub scope: Rc<SymbolTable>,
}

impl Function {
    /// Name given to functions defined without one.
    pub const ANONYMOUS: &'static str = "<function>";
}

/// `super()`: attribute lookup on `receiver` starting after `class` in
/// the receiver's method resolution order.
pub struct Super {
    pub class: Rc<Class>,
    pub receiver: Value,
}

impl Super {
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let Value::Instance(instance) = &self.receiver else {
            return None;
        };
        std::iter::once(&instance.class)
            .chain(instance.class.ancestors.iter())
            .skip_while(|class| !Rc::ptr_eq(class, &self.class))
            .skip(1)
            .find_map(|class| class.attributes.borrow().get(name).cloned())
    }
}

pub struct BoundMethod {
    pub receiver: Value,
    pub function: Value,
}

pub struct Class {
    pub name: String,
    pub qualname: String,
    pub bases: Vec<Rc<Class>>,
    /// Ancestors in lookup order, depth-first and left-to-right with
    /// repeats dropped. Does not include the class itself.
    pub ancestors: Vec<Rc<Class>>,
    pub attributes: RefCell<FxHashMap<String, Value>>,
    builtin: Option<ExceptionKind>,
}

impl Class {
    pub fn new(name: String, qualname: String, bases: Vec<Rc<Class>>) -> Self {
        let mut ancestors: Vec<Rc<Class>> = Vec::new();
        for base in &bases {
            for class in std::iter::once(base).chain(base.ancestors.iter()) {
                if !ancestors.iter().any(|seen| Rc::ptr_eq(seen, class)) {
                    ancestors.push(class.clone());
                }
            }
        }
        Self {
            name,
            qualname,
            bases,
            ancestors,
            attributes: RefCell::new(FxHashMap::default()),
            builtin: None,
        }
    }

    pub(crate) fn with_builtin(mut self, kind: ExceptionKind) -> Self {
        self.builtin = Some(kind);
        self
    }

    /// Attribute lookup through the class and its ancestors.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attributes.borrow().get(name) {
            return Some(value.clone());
        }
        self.ancestors
            .iter()
            .find_map(|class| class.attributes.borrow().get(name).cloned())
    }

    pub fn is_subclass_of(&self, other: &Class) -> bool {
        std::ptr::eq(self, other)
            || self
                .ancestors
                .iter()
                .any(|class| std::ptr::eq(class.as_ref(), other))
    }

    /// Nearest built-in exception class this class descends from.
    pub fn exception_kind(&self) -> Option<ExceptionKind> {
        self.builtin
            .or_else(|| self.ancestors.iter().find_map(|class| class.builtin))
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    pub attributes: RefCell<FxHashMap<String, Value>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Rc<Self> {
        Rc::new(Self {
            class,
            attributes: RefCell::new(FxHashMap::default()),
        })
    }

    pub fn exception(class: Rc<Class>, args: Vec<Value>) -> Rc<Self> {
        let instance = Self::new(class);
        instance.set("args", Value::tuple(args));
        instance
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.attributes.borrow().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.attributes.borrow_mut().insert(name.to_string(), value);
    }

    pub fn is_exception(&self) -> bool {
        self.class.exception_kind().is_some()
    }
}

pub struct Module {
    pub name: String,
    pub file: Rc<str>,
    pub symbols: Rc<SymbolTable>,
}

impl Value {
    pub fn str(value: impl Into<Rc<str>>) -> Value {
        Value::Str(value.into())
    }

    pub fn list(values: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(values)))
    }

    pub fn tuple(values: Vec<Value>) -> Value {
        Value::Tuple(values.into())
    }

    pub fn dict(dict: Dict) -> Value {
        Value::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn set(set: Dict) -> Value {
        Value::Set(Rc::new(RefCell::new(set)))
    }

    pub fn builtin(name: &'static str, function: BuiltinFn) -> Value {
        Value::Builtin(Rc::new(Builtin { name, function }))
    }

    pub fn bound(receiver: Value, function: Value) -> Value {
        Value::BoundMethod(Rc::new(BoundMethod { receiver, function }))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Built-in type of the value; `None` for instances of user classes.
    pub fn type_kind(&self) -> Option<TypeKind> {
        let kind = match self {
            Value::Undefined | Value::None => TypeKind::NoneType,
            Value::Ellipsis => TypeKind::Ellipsis,
            Value::Bool(_) => TypeKind::Bool,
            Value::Int(_) => TypeKind::Int,
            Value::Float(_) => TypeKind::Float,
            Value::Complex(..) => TypeKind::Complex,
            Value::Str(_) => TypeKind::Str,
            Value::List(_) => TypeKind::List,
            Value::Tuple(_) => TypeKind::Tuple,
            Value::Dict(_) => TypeKind::Dict,
            Value::Set(_) => TypeKind::Set,
            Value::Range(_) => TypeKind::Range,
            Value::Slice(_) => TypeKind::Slice,
            Value::Function(_) => TypeKind::Function,
            Value::BoundMethod(_) => TypeKind::Method,
            Value::Builtin(_) => TypeKind::Builtin,
            Value::Type(_) | Value::Class(_) => TypeKind::Type,
            Value::Module(_) => TypeKind::Module,
            Value::Iterator(_) => TypeKind::Iterator,
            Value::Super(_) => TypeKind::Super,
            Value::Instance(_) => return None,
        };
        Some(kind)
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Instance(instance) => instance.class.name.clone(),
            other => other
                .type_kind()
                .map_or("object", TypeKind::name)
                .to_string(),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            Value::Bool(value) => Some(f64::from(u8::from(*value))),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    /// Truthiness of values that need no user code to decide.
    pub fn plain_truth(&self) -> Option<bool> {
        let truth = match self {
            Value::Undefined | Value::None => false,
            Value::Bool(value) => *value,
            Value::Int(value) => *value != 0,
            Value::Float(value) => *value != 0.0,
            Value::Complex(re, im) => *re != 0.0 || *im != 0.0,
            Value::Str(value) => !value.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Tuple(items) => !items.is_empty(),
            Value::Dict(dict) | Value::Set(dict) => !dict.borrow().is_empty(),
            Value::Range(range) => !range.is_empty(),
            Value::Instance(_) => return None,
            _ => true,
        };
        Some(truth)
    }

    /// Identity comparison (`is`).
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined)
            | (Value::None, Value::None)
            | (Value::Ellipsis, Value::Ellipsis) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => Rc::ptr_eq(a, b),
            (Value::Dict(a), Value::Dict(b)) | (Value::Set(a), Value::Set(b)) => Rc::ptr_eq(a, b),
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Slice(a), Value::Slice(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::BoundMethod(a), Value::BoundMethod(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => Rc::ptr_eq(a, b),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::Module(a), Value::Module(b)) => Rc::ptr_eq(a, b),
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            (Value::Super(a), Value::Super(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural equality for built-in values, identity for the rest.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Complex(a, b), Value::Complex(c, d)) => a == c && b == d,
            (Value::Complex(re, im), number) | (number, Value::Complex(re, im)) => {
                *im == 0.0 && number.as_float().is_some_and(|value| value == *re)
            }
            (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                self.as_int() == other.as_int()
            }
            (
                Value::Int(_) | Value::Bool(_) | Value::Float(_),
                Value::Int(_) | Value::Bool(_) | Value::Float(_),
            ) => self.as_float() == other.as_float(),
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || sequences_equal(&a.borrow(), &b.borrow())
            }
            (Value::Tuple(a), Value::Tuple(b)) => sequences_equal(a, b),
            (Value::Dict(a), Value::Dict(b)) => Rc::ptr_eq(a, b) || a.borrow().equals(&b.borrow()),
            (Value::Set(a), Value::Set(b)) => {
                Rc::ptr_eq(a, b) || a.borrow().same_keys(&b.borrow())
            }
            (Value::BoundMethod(a), Value::BoundMethod(b)) => {
                a.receiver.is_same(&b.receiver) && a.function.is_same(&b.function)
            }
            _ => self.is_same(other),
        }
    }

    pub fn hash_key(&self) -> Result<u64, RuntimeError> {
        let mut hasher = FxHasher::default();
        match self {
            Value::Undefined | Value::None => 0u8.hash(&mut hasher),
            Value::Ellipsis => 1u8.hash(&mut hasher),
            Value::Bool(_) | Value::Int(_) => self.as_int().hash(&mut hasher),
            Value::Float(value) => {
                if value.fract() == 0.0 && value.abs() < 9.2e18 {
                    Some(*value as i64).hash(&mut hasher);
                } else {
                    value.to_bits().hash(&mut hasher);
                }
            }
            Value::Complex(re, im) => {
                if *im == 0.0 {
                    return Value::Float(*re).hash_key();
                }
                re.to_bits().hash(&mut hasher);
                im.to_bits().hash(&mut hasher);
            }
            Value::Str(value) => value.hash(&mut hasher),
            Value::Tuple(items) => stack::ensure_sufficient_stack(|| {
                for item in items.iter() {
                    item.hash_key()?.hash(&mut hasher);
                }
                Ok::<_, RuntimeError>(())
            })?,
            Value::Range(range) => (range.start, range.stop, range.step).hash(&mut hasher),
            Value::Type(kind) => kind.hash(&mut hasher),
            Value::Function(function) => Rc::as_ptr(function).hash(&mut hasher),
            Value::Builtin(builtin) => Rc::as_ptr(builtin).hash(&mut hasher),
            Value::BoundMethod(method) => {
                method.receiver.hash_key()?.hash(&mut hasher);
                method.function.hash_key()?.hash(&mut hasher);
            }
            Value::Class(class) => Rc::as_ptr(class).hash(&mut hasher),
            Value::Instance(instance) => Rc::as_ptr(instance).hash(&mut hasher),
            Value::Module(module) => Rc::as_ptr(module).hash(&mut hasher),
            Value::Iterator(cursor) => Rc::as_ptr(cursor).hash(&mut hasher),
            Value::Super(proxy) => Rc::as_ptr(proxy).hash(&mut hasher),
            Value::List(_) | Value::Dict(_) | Value::Set(_) | Value::Slice(_) => {
                return Err(RuntimeError::Unhashable {
                    type_name: self.type_name(),
                });
            }
        }
        Ok(hasher.finish())
    }

    /// `str()` of a value without consulting user-defined methods.
    pub fn plain_str(&self) -> String {
        match self {
            Value::Str(value) => value.to_string(),
            other => other.plain_repr(),
        }
    }

    /// `repr()` of a value without consulting user-defined methods.
    pub fn plain_repr(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::None => "None".to_string(),
            Value::Ellipsis => "Ellipsis".to_string(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => format_float(*value),
            Value::Complex(re, im) => format_complex(*re, *im),
            Value::Str(value) => quote(value),
            Value::List(items) => format!("[{}]", join_repr(&items.borrow())),
            Value::Tuple(items) if items.len() == 1 => format!("({},)", items[0].plain_repr()),
            Value::Tuple(items) => format!("({})", join_repr(items)),
            Value::Dict(dict) => {
                let entries: Vec<String> = dict
                    .borrow()
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.plain_repr(), value.plain_repr()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Set(set) => {
                let set = set.borrow();
                if set.is_empty() {
                    return "set()".to_string();
                }
                let keys: Vec<String> = set.iter().map(|(key, _)| key.plain_repr()).collect();
                format!("{{{}}}", keys.join(", "))
            }
            Value::Range(range) if range.step == 1 => {
                format!("range({}, {})", range.start, range.stop)
            }
            Value::Range(range) => {
                format!("range({}, {}, {})", range.start, range.stop, range.step)
            }
            Value::Slice(slice) => format!(
                "slice({}, {}, {})",
                slice.start.plain_repr(),
                slice.stop.plain_repr(),
                slice.step.plain_repr()
            ),
            Value::Function(function) => format!("<function {}>", function.qualname),
            Value::BoundMethod(method) => format!(
                "<bound method {} of {}>",
                method.function.callable_name(),
                method.receiver.plain_repr()
            ),
            Value::Builtin(builtin) => format!("<built-in function {}>", builtin.name),
            Value::Type(kind) => format!("<class '{}'>", kind.name()),
            Value::Class(class) => format!("<class '{}'>", class.qualname),
            Value::Instance(instance) => {
                if instance.is_exception() {
                    let args = match instance.get("args") {
                        Some(Value::Tuple(args)) => join_repr(&args),
                        _ => String::new(),
                    };
                    format!("{}({args})", instance.class.name)
                } else {
                    format!("<{} object>", instance.class.qualname)
                }
            }
            Value::Module(module) => format!("<module '{}' from '{}'>", module.name, module.file),
            Value::Iterator(_) => "<iterator object>".to_string(),
            Value::Super(proxy) => format!(
                "<super: <class '{}'>, {}>",
                proxy.class.name,
                proxy.receiver.plain_repr()
            ),
        }
    }

    /// Name used in call diagnostics.
    pub fn callable_name(&self) -> String {
        match self {
            Value::Function(function) => function.name.clone(),
            Value::Builtin(builtin) => builtin.name.to_string(),
            Value::BoundMethod(method) => method.function.callable_name(),
            Value::Class(class) => class.name.clone(),
            Value::Type(kind) => kind.name().to_string(),
            other => other.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plain_repr())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::str(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::str(value)
    }
}

fn sequences_equal(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len()
        && stack::ensure_sufficient_stack(|| left.iter().zip(right).all(|(a, b)| a.equals(b)))
}

fn join_repr(items: &[Value]) -> String {
    stack::ensure_sufficient_stack(|| {
        items
            .iter()
            .map(Value::plain_repr)
            .collect::<Vec<_>>()
            .join(", ")
    })
}

/// Drops `value` without recursing into nested containers. Containers
/// still shared elsewhere are left alone.
pub fn release(value: Value) {
    let mut pending = vec![value];
    while let Some(value) = pending.pop() {
        match value {
            Value::List(mut items) => {
                if let Some(items) = Rc::get_mut(&mut items) {
                    pending.append(items.get_mut());
                }
            }
            Value::Tuple(mut items) => {
                if let Some(items) = Rc::get_mut(&mut items) {
                    pending.extend(items.iter_mut().map(std::mem::take));
                }
            }
            Value::Dict(mut dict) | Value::Set(mut dict) => {
                if let Some(dict) = Rc::get_mut(&mut dict) {
                    for (key, value) in dict.get_mut().take_entries() {
                        pending.push(key);
                        pending.push(value);
                    }
                }
            }
            Value::Instance(mut instance) => {
                if let Some(instance) = Rc::get_mut(&mut instance) {
                    pending.extend(instance.attributes.get_mut().drain().map(|(_, value)| value));
                }
            }
            _ => {}
        }
    }
}

/// Shortest round-tripping form, switching to exponent notation for very
/// large and very small magnitudes.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{value:e}");
        let Some((mantissa, exponent)) = formatted.split_once('e') else {
            return formatted;
        };
        let (sign, digits) = match exponent.strip_prefix('-') {
            Some(digits) => ('-', digits),
            None => ('+', exponent),
        };
        return format!("{mantissa}e{sign}{digits:0>2}");
    }

    let formatted = value.to_string();
    if formatted.contains('.') {
        formatted
    } else {
        format!("{formatted}.0")
    }
}

fn format_complex(re: f64, im: f64) -> String {
    let imaginary = trim_integral(im);
    if re == 0.0 && re.is_sign_positive() {
        return format!("{imaginary}j");
    }
    let sign = if im.is_sign_negative() { "-" } else { "+" };
    format!(
        "({}{sign}{}j)",
        trim_integral(re),
        trim_integral(im.abs())
    )
}

fn trim_integral(value: f64) -> String {
    let formatted = format_float(value);
    match formatted.strip_suffix(".0") {
        Some(integral) => integral.to_string(),
        None => formatted,
    }
}

/// Single-quoted unless the text contains a single quote and no double one.
pub fn quote(text: &str) -> String {
    let delimiter = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push(delimiter);
    for ch in text.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c == delimiter => {
                quoted.push('\\');
                quoted.push(c);
            }
            c if c.is_control() => quoted.push_str(&format!("\\x{:02x}", u32::from(c))),
            c => quoted.push(c),
        }
    }
    quoted.push(delimiter);
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn formats_floats_like_the_language() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(2500.0), "2500.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(1e100), "1e+100");
        assert_eq!(format_float(1.5e-7), "1.5e-07");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }

    #[test]
    fn formats_complex_numbers() {
        assert_eq!(Value::Complex(0.0, 3.0).plain_repr(), "3j");
        assert_eq!(Value::Complex(1.0, -2.5).plain_repr(), "(1-2.5j)");
    }

    #[test]
    fn quotes_strings() {
        assert_eq!(quote("abc"), "'abc'");
        assert_eq!(quote("it's"), "\"it's\"");
        assert_eq!(quote("a\nb"), "'a\\nb'");
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(Value::Int(1).equals(&Value::Float(1.0)));
        assert!(Value::Bool(true).equals(&Value::Int(1)));
        assert!(Value::Complex(2.0, 0.0).equals(&Value::Int(2)));
        assert!(!Value::Int(1).equals(&Value::str("1")));
        assert_eq!(
            Value::Int(1).hash_key().expect("hashable"),
            Value::Float(1.0).hash_key().expect("hashable")
        );
    }

    #[test]
    fn containers_compare_structurally() {
        let a = Value::list(vec![Value::Int(1), Value::tuple(vec![Value::str("x")])]);
        let b = Value::list(vec![Value::Int(1), Value::tuple(vec![Value::str("x")])]);
        assert!(a.equals(&b));
        assert!(!a.is_same(&b));
        assert!(matches!(
            a.hash_key(),
            Err(RuntimeError::Unhashable { type_name }) if type_name == "list"
        ));
    }

    #[test]
    fn ranges_measure_and_index() {
        let range = Range {
            start: 10,
            stop: 0,
            step: -3,
        };
        assert_eq!(range.len(), 4);
        assert_eq!(range.get(3), Some(1));
        assert!(range.contains(4));
        assert!(!range.contains(5));
    }

    #[test]
    fn slices_resolve_indices() {
        let slice = Slice {
            start: Value::None,
            stop: Value::None,
            step: Value::Int(-2),
        };
        assert_eq!(slice.indices(5).expect("valid slice"), vec![4, 2, 0]);
        let slice = Slice {
            start: Value::Int(-2),
            stop: Value::None,
            step: Value::None,
        };
        assert_eq!(slice.indices(5).expect("valid slice"), vec![3, 4]);
    }

    #[test]
    fn class_ancestors_drop_repeats() {
        let root = Rc::new(Class::new("Root".into(), "Root".into(), Vec::new()));
        let left = Rc::new(Class::new("Left".into(), "Left".into(), vec![root.clone()]));
        let right = Rc::new(Class::new("Right".into(), "Right".into(), vec![root.clone()]));
        let leaf = Class::new("Leaf".into(), "Leaf".into(), vec![left, right]);
        let names: Vec<&str> = leaf.ancestors.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Left", "Root", "Right"]);
        assert!(leaf.is_subclass_of(&root));
    }
}
