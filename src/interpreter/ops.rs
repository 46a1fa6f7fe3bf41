//! Operators, attributes, subscripts, and the text conversions that may
//! call back into script code.

use std::cmp::Ordering;
use std::rc::Rc;

use crate::ast::{BinaryOperator, CompareOperator, StepOperator, UnaryOperator};
use crate::runtime::builtins;
use crate::runtime::context::CallSite;
use crate::runtime::dict::Dict;
use crate::runtime::error::RuntimeError;
use crate::runtime::exception::Throwable;
use crate::runtime::value::{Arguments, Value};
use crate::stack;

use super::Interpreter;

/// Relative tolerance of `~=`.
const APPROX_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Copy)]
enum Numeric {
    Int(i64),
    Float(f64),
    Complex(f64, f64),
}

impl Numeric {
    fn of(value: &Value) -> Option<Numeric> {
        match value {
            Value::Bool(value) => Some(Numeric::Int(i64::from(*value))),
            Value::Int(value) => Some(Numeric::Int(*value)),
            Value::Float(value) => Some(Numeric::Float(*value)),
            Value::Complex(re, im) => Some(Numeric::Complex(*re, *im)),
            _ => None,
        }
    }

    fn float(self) -> f64 {
        match self {
            Numeric::Int(value) => value as f64,
            Numeric::Float(value) => value,
            Numeric::Complex(re, _) => re,
        }
    }

    fn complex(self) -> (f64, f64) {
        match self {
            Numeric::Complex(re, im) => (re, im),
            other => (other.float(), 0.0),
        }
    }
}

fn dunder_name(operator: BinaryOperator) -> Option<&'static str> {
    let name = match operator {
        BinaryOperator::Add => "add",
        BinaryOperator::Sub => "sub",
        BinaryOperator::Mul => "mul",
        BinaryOperator::Div => "truediv",
        BinaryOperator::FloorDiv => "floordiv",
        BinaryOperator::Mod => "mod",
        BinaryOperator::MatMul => "matmul",
        BinaryOperator::Pow => "pow",
        BinaryOperator::BitAnd => "and",
        BinaryOperator::BitOr => "or",
        BinaryOperator::BitXor => "xor",
        BinaryOperator::Shl => "lshift",
        BinaryOperator::Shr => "rshift",
        _ => return None,
    };
    Some(name)
}

impl Interpreter {
    /// Calls `receiver.name(*arguments)` when `receiver` is an instance
    /// whose class defines `name`.
    pub(crate) fn dunder(
        &mut self,
        site: &CallSite,
        receiver: &Value,
        name: &str,
        arguments: Vec<Value>,
    ) -> Result<Option<Value>, RuntimeError> {
        let Value::Instance(instance) = receiver else {
            return Ok(None);
        };
        let Some(method) = instance.class.lookup(name) else {
            return Ok(None);
        };
        let arguments = Arguments::positional(arguments).with_receiver(receiver.clone());
        self.call_value(site, &method, arguments).map(Some)
    }

    pub(crate) fn get_attribute(
        &mut self,
        site: &CallSite,
        object: &Value,
        name: &str,
    ) -> Result<Value, RuntimeError> {
        let missing = || RuntimeError::UnknownAttribute {
            type_name: object.type_name(),
            attribute: name.to_string(),
        };
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.get(name) {
                    return Ok(value);
                }
                if name == "__class__" {
                    return Ok(Value::Class(instance.class.clone()));
                }
                if let Some(value) = instance.class.lookup(name) {
                    return Ok(match value {
                        Value::Function(_) => Value::bound(object.clone(), value),
                        other => other,
                    });
                }
                match self.dunder(site, object, "__getattr__", vec![Value::str(name)])? {
                    Some(value) => Ok(value),
                    None => Err(missing()),
                }
            }
            Value::Class(class) => match name {
                "__name__" => Ok(Value::str(class.name.as_str())),
                "__qualname__" => Ok(Value::str(class.qualname.as_str())),
                "__bases__" => Ok(Value::tuple(
                    class.bases.iter().cloned().map(Value::Class).collect(),
                )),
                _ => class
                    .lookup(name)
                    .ok_or_else(|| RuntimeError::UnknownClassAttribute {
                        class: class.name.clone(),
                        attribute: name.to_string(),
                    }),
            },
            Value::Module(module) => {
                if module.symbols.include(name) {
                    return Ok(module.symbols.get(name));
                }
                match name {
                    "__name__" => Ok(Value::str(module.name.as_str())),
                    "__file__" => Ok(Value::Str(module.file.clone())),
                    _ => Err(RuntimeError::UnknownModuleAttribute {
                        module: module.name.clone(),
                        attribute: name.to_string(),
                    }),
                }
            }
            Value::Function(function) => match name {
                "__name__" => Ok(Value::str(function.name.as_str())),
                "__qualname__" => Ok(Value::str(function.qualname.as_str())),
                _ => Err(missing()),
            },
            Value::Super(proxy) => match proxy.lookup(name) {
                Some(value @ Value::Function(_)) => Ok(Value::bound(proxy.receiver.clone(), value)),
                Some(other) => Ok(other),
                None if name == "__init__" => Ok(Value::bound(
                    proxy.receiver.clone(),
                    Value::builtin("__init__", builtins::base_init),
                )),
                None => Err(missing()),
            },
            Value::Builtin(builtin) if name == "__name__" => Ok(Value::str(builtin.name)),
            Value::Type(kind) if name == "__name__" => Ok(Value::str(kind.name())),
            Value::Complex(re, _) if name == "real" => Ok(Value::Float(*re)),
            Value::Complex(_, im) if name == "imag" => Ok(Value::Float(*im)),
            other => builtins::method(other, name).ok_or_else(missing),
        }
    }

    pub(crate) fn set_attribute(
        &mut self,
        object: &Value,
        name: &str,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match object {
            Value::Instance(instance) => {
                instance.set(name, value);
                Ok(())
            }
            Value::Class(class) => {
                class.attributes.borrow_mut().insert(name.to_string(), value);
                Ok(())
            }
            other => Err(RuntimeError::UnknownAttribute {
                type_name: other.type_name(),
                attribute: name.to_string(),
            }),
        }
    }

    pub(crate) fn delete_attribute(&mut self, object: &Value, name: &str) -> Result<(), RuntimeError> {
        let removed = match object {
            Value::Instance(instance) => instance.attributes.borrow_mut().remove(name),
            Value::Class(class) => class.attributes.borrow_mut().remove(name),
            _ => None,
        };
        match removed {
            Some(_) => Ok(()),
            None => Err(RuntimeError::UnknownAttribute {
                type_name: object.type_name(),
                attribute: name.to_string(),
            }),
        }
    }

    pub(crate) fn get_item(
        &mut self,
        site: &CallSite,
        object: &Value,
        index: &Value,
    ) -> Result<Value, RuntimeError> {
        match object {
            Value::List(items) => {
                let items = items.borrow();
                match index {
                    Value::Slice(slice) => Ok(Value::list(pick(&items, &slice.indices(items.len())?))),
                    _ => Ok(items[position(index, items.len(), "list")?].clone()),
                }
            }
            Value::Tuple(items) => match index {
                Value::Slice(slice) => Ok(Value::tuple(pick(items, &slice.indices(items.len())?))),
                _ => Ok(items[position(index, items.len(), "tuple")?].clone()),
            },
            Value::Str(text) => {
                let chars: Vec<char> = text.chars().collect();
                match index {
                    Value::Slice(slice) => {
                        let indices = slice.indices(chars.len())?;
                        Ok(Value::str(indices.into_iter().map(|i| chars[i]).collect::<String>()))
                    }
                    _ => {
                        let at = position(index, chars.len(), "string")?;
                        Ok(Value::str(chars[at].to_string()))
                    }
                }
            }
            Value::Range(range) => match index {
                Value::Slice(slice) => {
                    let values = slice
                        .indices(range.len())?
                        .into_iter()
                        .filter_map(|i| range.get(i).map(Value::Int))
                        .collect();
                    Ok(Value::list(values))
                }
                _ => {
                    let at = position(index, range.len(), "range object")?;
                    range
                        .get(at)
                        .map(Value::Int)
                        .ok_or(RuntimeError::IndexOutOfRange {
                            type_name: "range object",
                        })
                }
            },
            Value::Dict(dict) => {
                let found = dict.borrow().get(index)?;
                found.ok_or_else(|| RuntimeError::MissingKey {
                    key: index.plain_repr(),
                })
            }
            Value::Instance(_) => self
                .dunder(site, object, "__getitem__", vec![index.clone()])?
                .ok_or_else(|| RuntimeError::NotSubscriptable {
                    type_name: object.type_name(),
                }),
            other => Err(RuntimeError::NotSubscriptable {
                type_name: other.type_name(),
            }),
        }
    }

    pub(crate) fn set_item(
        &mut self,
        site: &CallSite,
        object: &Value,
        index: Value,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match object {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                let at = position(&index, items.len(), "list")?;
                items[at] = value;
                Ok(())
            }
            Value::Dict(dict) => dict.borrow_mut().insert(index, value),
            Value::Instance(_) => match self.dunder(site, object, "__setitem__", vec![index, value])? {
                Some(_) => Ok(()),
                None => Err(RuntimeError::NoItemAssignment {
                    type_name: object.type_name(),
                }),
            },
            other => Err(RuntimeError::NoItemAssignment {
                type_name: other.type_name(),
            }),
        }
    }

    pub(crate) fn delete_item(
        &mut self,
        site: &CallSite,
        object: &Value,
        index: &Value,
    ) -> Result<(), RuntimeError> {
        match object {
            Value::List(items) => {
                let mut items = items.borrow_mut();
                match index {
                    Value::Slice(slice) => {
                        let mut doomed = slice.indices(items.len())?;
                        doomed.sort_unstable();
                        for at in doomed.into_iter().rev() {
                            items.remove(at);
                        }
                    }
                    _ => {
                        let at = position(index, items.len(), "list")?;
                        items.remove(at);
                    }
                }
                Ok(())
            }
            Value::Dict(dict) => match dict.borrow_mut().remove(index)? {
                Some(_) => Ok(()),
                None => Err(RuntimeError::MissingKey {
                    key: index.plain_repr(),
                }),
            },
            Value::Instance(_) => match self.dunder(site, object, "__delitem__", vec![index.clone()])? {
                Some(_) => Ok(()),
                None => Err(RuntimeError::NoItemDeletion {
                    type_name: object.type_name(),
                }),
            },
            other => Err(RuntimeError::NoItemDeletion {
                type_name: other.type_name(),
            }),
        }
    }

    pub(crate) fn binary(
        &mut self,
        site: &CallSite,
        operator: BinaryOperator,
        lhs: Value,
        rhs: Value,
    ) -> Result<Value, RuntimeError> {
        match operator {
            BinaryOperator::In => return self.contains(site, &rhs, &lhs).map(Value::Bool),
            BinaryOperator::NotIn => return self.contains(site, &rhs, &lhs).map(|found| Value::Bool(!found)),
            BinaryOperator::Is => return Ok(Value::Bool(lhs.is_same(&rhs))),
            BinaryOperator::IsNot => return Ok(Value::Bool(!lhs.is_same(&rhs))),
            BinaryOperator::And => {
                return Ok(if self.truthy(site, &lhs)? { rhs } else { lhs });
            }
            BinaryOperator::Or => {
                return Ok(if self.truthy(site, &lhs)? { lhs } else { rhs });
            }
            BinaryOperator::Nullish => {
                return Ok(if lhs.is_none() { rhs } else { lhs });
            }
            _ => {}
        }

        if let (Some(left), Some(right)) = (Numeric::of(&lhs), Numeric::of(&rhs))
            && let Some(value) = arithmetic(operator, left, right)?
        {
            return Ok(value);
        }
        if let Some(value) = collection_operation(operator, &lhs, &rhs)? {
            return Ok(value);
        }
        if let Some(name) = dunder_name(operator) {
            if let Some(value) = self.dunder(site, &lhs, &format!("__{name}__"), vec![rhs.clone()])? {
                return Ok(value);
            }
            if let Some(value) = self.dunder(site, &rhs, &format!("__r{name}__"), vec![lhs.clone()])? {
                return Ok(value);
            }
        }
        Err(RuntimeError::UnsupportedOperands {
            operator: operator.symbol(),
            left: lhs.type_name(),
            right: rhs.type_name(),
        })
    }

    /// `target op= value`. Lists extend in place; instances may define an
    /// in-place hook.
    pub(crate) fn augmented(
        &mut self,
        site: &CallSite,
        operator: BinaryOperator,
        current: Value,
        value: Value,
    ) -> Result<Value, RuntimeError> {
        if operator == BinaryOperator::Add
            && let Value::List(items) = &current
        {
            let extra = self.collect(site, &value)?;
            items.borrow_mut().extend(extra);
            return Ok(current);
        }
        if let Some(name) = dunder_name(operator)
            && let Some(result) = self.dunder(site, &current, &format!("__i{name}__"), vec![value.clone()])?
        {
            return Ok(result);
        }
        let symbol = match operator {
            BinaryOperator::Add => "+=",
            BinaryOperator::Sub => "-=",
            BinaryOperator::Mul => "*=",
            BinaryOperator::Div => "/=",
            BinaryOperator::FloorDiv => "//=",
            BinaryOperator::Mod => "%=",
            BinaryOperator::MatMul => "@=",
            BinaryOperator::Pow => "**=",
            BinaryOperator::BitAnd => "&=",
            BinaryOperator::BitOr => "|=",
            BinaryOperator::BitXor => "^=",
            BinaryOperator::Shl => "<<=",
            BinaryOperator::Shr => ">>=",
            other => other.symbol(),
        };
        let left = current.type_name();
        let right = value.type_name();
        self.binary(site, operator, current, value)
            .map_err(|error| match error {
                RuntimeError::UnsupportedOperands { .. } => RuntimeError::UnsupportedOperands {
                    operator: symbol,
                    left,
                    right,
                },
                other => other,
            })
    }

    pub(crate) fn compare(
        &mut self,
        site: &CallSite,
        operator: CompareOperator,
        left: &Value,
        right: &Value,
    ) -> Result<bool, RuntimeError> {
        match operator {
            CompareOperator::Equal => self.equality(site, left, right),
            CompareOperator::NotEqual => {
                if let Some(result) = self.dunder(site, left, "__ne__", vec![right.clone()])? {
                    return self.truthy(site, &result);
                }
                self.equality(site, left, right).map(|equal| !equal)
            }
            CompareOperator::ApproxEqual => self.approx_equal(site, left, right),
            CompareOperator::NotApproxEqual => self.approx_not_equal(site, left, right),
            ordering => self.ordering(site, ordering, left, right),
        }
    }

    /// `==`, consulting `__eq__` on either side.
    pub(crate) fn equality(&mut self, site: &CallSite, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
        self.descend(|this| this.equality_inner(site, left, right))
    }

    fn equality_inner(&mut self, site: &CallSite, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
        if let Some(result) = self.dunder(site, left, "__eq__", vec![right.clone()])? {
            return self.truthy(site, &result);
        }
        if let Some(result) = self.dunder(site, right, "__eq__", vec![left.clone()])? {
            return self.truthy(site, &result);
        }
        match (left, right) {
            (Value::List(a), Value::List(b)) if !Rc::ptr_eq(a, b) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                self.sequences_equal(site, &a, &b)
            }
            (Value::Tuple(a), Value::Tuple(b)) => self.sequences_equal(site, a, b),
            _ => Ok(left.equals(right)),
        }
    }

    fn sequences_equal(&mut self, site: &CallSite, left: &[Value], right: &[Value]) -> Result<bool, RuntimeError> {
        if left.len() != right.len() {
            return Ok(false);
        }
        for (a, b) in left.iter().zip(right) {
            if !self.equality(site, a, b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn ordering(
        &mut self,
        site: &CallSite,
        operator: CompareOperator,
        left: &Value,
        right: &Value,
    ) -> Result<bool, RuntimeError> {
        self.descend(|this| this.ordering_inner(site, operator, left, right))
    }

    fn ordering_inner(
        &mut self,
        site: &CallSite,
        operator: CompareOperator,
        left: &Value,
        right: &Value,
    ) -> Result<bool, RuntimeError> {
        let holds = |ordering: Ordering| match operator {
            CompareOperator::Less => ordering.is_lt(),
            CompareOperator::LessEqual => ordering.is_le(),
            CompareOperator::Greater => ordering.is_gt(),
            _ => ordering.is_ge(),
        };

        match (left, right) {
            (Value::Int(_) | Value::Bool(_), Value::Int(_) | Value::Bool(_)) => {
                return Ok(holds(left.as_int().cmp(&right.as_int())));
            }
            (Value::Int(_) | Value::Bool(_) | Value::Float(_), Value::Int(_) | Value::Bool(_) | Value::Float(_)) => {
                let (a, b) = (left.as_float(), right.as_float());
                return Ok(a.partial_cmp(&b).is_some_and(holds));
            }
            (Value::Str(a), Value::Str(b)) => return Ok(holds(a.cmp(b))),
            (Value::List(a), Value::List(b)) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                return self.order_sequences(site, operator, &a, &b);
            }
            (Value::Tuple(a), Value::Tuple(b)) => return self.order_sequences(site, operator, a, b),
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                let subset = |x: &Dict, y: &Dict| x.keys().iter().all(|key| y.contains(key).unwrap_or(false));
                return Ok(match operator {
                    CompareOperator::LessEqual => subset(&a, &b),
                    CompareOperator::Less => a.len() < b.len() && subset(&a, &b),
                    CompareOperator::GreaterEqual => subset(&b, &a),
                    _ => b.len() < a.len() && subset(&b, &a),
                });
            }
            _ => {}
        }

        let (name, reflected) = match operator {
            CompareOperator::Less => ("__lt__", "__gt__"),
            CompareOperator::LessEqual => ("__le__", "__ge__"),
            CompareOperator::Greater => ("__gt__", "__lt__"),
            _ => ("__ge__", "__le__"),
        };
        if let Some(result) = self.dunder(site, left, name, vec![right.clone()])? {
            return self.truthy(site, &result);
        }
        if let Some(result) = self.dunder(site, right, reflected, vec![left.clone()])? {
            return self.truthy(site, &result);
        }
        Err(RuntimeError::UnorderedComparison {
            operator: operator.symbol(),
            left: left.type_name(),
            right: right.type_name(),
        })
    }

    fn order_sequences(
        &mut self,
        site: &CallSite,
        operator: CompareOperator,
        left: &[Value],
        right: &[Value],
    ) -> Result<bool, RuntimeError> {
        for (a, b) in left.iter().zip(right) {
            if !self.equality(site, a, b)? {
                return self.ordering(site, operator, a, b);
            }
        }
        let ordering = left.len().cmp(&right.len());
        Ok(match operator {
            CompareOperator::Less => ordering.is_lt(),
            CompareOperator::LessEqual => ordering.is_le(),
            CompareOperator::Greater => ordering.is_gt(),
            _ => ordering.is_ge(),
        })
    }

    /// `a ~= b` and `ce(a, b)`.
    pub(crate) fn approx_equal(&mut self, site: &CallSite, left: &Value, right: &Value) -> Result<bool, RuntimeError> {
        if let (Some(a), Some(b)) = (real(left), real(right)) {
            return Ok(is_close(a, b));
        }
        for (receiver, other) in [(left, right), (right, left)] {
            if let Some(result) = self.dunder(site, receiver, "__ce__", vec![other.clone()])? {
                return self.truthy(site, &result);
            }
        }
        Err(RuntimeError::UnsupportedOperands {
            operator: "~= or ce()",
            left: left.type_name(),
            right: right.type_name(),
        })
    }

    /// `a ~! b` and `nce(a, b)`.
    pub(crate) fn approx_not_equal(
        &mut self,
        site: &CallSite,
        left: &Value,
        right: &Value,
    ) -> Result<bool, RuntimeError> {
        if let (Some(a), Some(b)) = (real(left), real(right)) {
            return Ok(!is_close(a, b));
        }
        for (receiver, other) in [(left, right), (right, left)] {
            if let Some(result) = self.dunder(site, receiver, "__nce__", vec![other.clone()])? {
                return self.truthy(site, &result);
            }
        }
        for (receiver, other) in [(left, right), (right, left)] {
            if let Some(result) = self.dunder(site, receiver, "__ce__", vec![other.clone()])? {
                return self.truthy(site, &result).map(|equal| !equal);
            }
        }
        Err(RuntimeError::UnsupportedOperands {
            operator: "~! or nce()",
            left: left.type_name(),
            right: right.type_name(),
        })
    }

    pub(crate) fn unary(&mut self, site: &CallSite, operator: UnaryOperator, value: Value) -> Result<Value, RuntimeError> {
        let (symbol, hook) = match operator {
            UnaryOperator::Not => return self.truthy(site, &value).map(|truth| Value::Bool(!truth)),
            UnaryOperator::Minus => ("-", "__neg__"),
            UnaryOperator::Plus => ("+", "__pos__"),
            UnaryOperator::Invert => ("~", "__invert__"),
        };
        let result = match (operator, Numeric::of(&value)) {
            (UnaryOperator::Minus, Some(Numeric::Int(v))) => Some(Value::Int(v.checked_neg().ok_or(RuntimeError::Overflow)?)),
            (UnaryOperator::Minus, Some(Numeric::Float(v))) => Some(Value::Float(-v)),
            (UnaryOperator::Minus, Some(Numeric::Complex(re, im))) => Some(Value::Complex(-re, -im)),
            (UnaryOperator::Plus, Some(Numeric::Int(v))) => Some(Value::Int(v)),
            (UnaryOperator::Plus, Some(_)) => Some(value.clone()),
            (UnaryOperator::Invert, Some(Numeric::Int(v))) => Some(Value::Int(!v)),
            _ => None,
        };
        if let Some(result) = result {
            return Ok(result);
        }
        if let Some(result) = self.dunder(site, &value, hook, Vec::new())? {
            return Ok(result);
        }
        Err(RuntimeError::UnsupportedOperand {
            operator: symbol,
            type_name: value.type_name(),
        })
    }

    /// The value `++`/`--` (and `increment()`/`decrement()`) produce.
    pub(crate) fn step(&mut self, site: &CallSite, operator: StepOperator, value: &Value) -> Result<Value, RuntimeError> {
        let (delta, hook, symbol) = match operator {
            StepOperator::Increment => (1, "__increment__", "++ or increment()"),
            StepOperator::Decrement => (-1, "__decrement__", "-- or decrement()"),
        };
        match Numeric::of(value) {
            Some(Numeric::Int(v)) => return v.checked_add(delta).map(Value::Int).ok_or(RuntimeError::Overflow),
            Some(Numeric::Float(v)) => return Ok(Value::Float(v + delta as f64)),
            _ => {}
        }
        if let Some(result) = self.dunder(site, value, hook, Vec::new())? {
            return Ok(result);
        }
        Err(RuntimeError::Type(format!(
            "unsupported operand type(s) for {symbol}: '{}'",
            value.type_name()
        )))
    }

    pub(crate) fn truthy(&mut self, site: &CallSite, value: &Value) -> Result<bool, RuntimeError> {
        if let Some(truth) = value.plain_truth() {
            return Ok(truth);
        }
        if let Some(result) = self.dunder(site, value, "__bool__", Vec::new())? {
            return match result {
                Value::Bool(truth) => Ok(truth),
                other => Err(RuntimeError::Type(format!(
                    "__bool__ should return bool, returned {}",
                    other.type_name()
                ))),
            };
        }
        if let Some(result) = self.dunder(site, value, "__len__", Vec::new())? {
            return match result.as_int() {
                Some(length) => Ok(length != 0),
                None => Err(RuntimeError::Type(format!(
                    "'{}' object cannot be interpreted as an integer",
                    result.type_name()
                ))),
            };
        }
        Ok(true)
    }

    /// `str(value)`.
    pub(crate) fn to_str(&mut self, site: &CallSite, value: &Value) -> Result<String, RuntimeError> {
        match value {
            Value::Str(text) => Ok(text.to_string()),
            Value::Instance(instance) => {
                if let Some(result) = self.dunder(site, value, "__str__", Vec::new())? {
                    return match result {
                        Value::Str(text) => Ok(text.to_string()),
                        other => Err(RuntimeError::Type(format!(
                            "__str__ returned non-string (type {})",
                            other.type_name()
                        ))),
                    };
                }
                if instance.is_exception() && instance.class.lookup("__repr__").is_none() {
                    return Ok(instance.message());
                }
                self.repr(site, value)
            }
            Value::List(_) | Value::Tuple(_) | Value::Dict(_) | Value::Set(_) => self.repr(site, value),
            other => Ok(other.plain_str()),
        }
    }

    /// `repr(value)`, with `[...]`/`{...}` for self-containing containers.
    pub(crate) fn repr(&mut self, site: &CallSite, value: &Value) -> Result<String, RuntimeError> {
        self.descend(|this| this.repr_inner(site, value))
    }

    fn repr_inner(&mut self, site: &CallSite, value: &Value) -> Result<String, RuntimeError> {
        match value {
            Value::Instance(_) => match self.dunder(site, value, "__repr__", Vec::new())? {
                Some(Value::Str(text)) => Ok(text.to_string()),
                Some(other) => Err(RuntimeError::Type(format!(
                    "__repr__ returned non-string (type {})",
                    other.type_name()
                ))),
                None => Ok(value.plain_repr()),
            },
            Value::List(items) => {
                let id = Rc::as_ptr(items) as *const () as usize;
                let items = items.borrow().clone();
                self.guarded_repr(id, "[...]", |this| {
                    Ok(format!("[{}]", this.join_repr(site, &items)?))
                })
            }
            Value::Tuple(items) if items.len() == 1 => Ok(format!("({},)", self.repr(site, &items[0])?)),
            Value::Tuple(items) => Ok(format!("({})", self.join_repr(site, items)?)),
            Value::Dict(dict) => {
                let id = Rc::as_ptr(dict) as *const () as usize;
                let entries: Vec<(Value, Value)> =
                    dict.borrow().iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                self.guarded_repr(id, "{...}", |this| {
                    let mut parts = Vec::with_capacity(entries.len());
                    for (key, value) in &entries {
                        parts.push(format!("{}: {}", this.repr(site, key)?, this.repr(site, value)?));
                    }
                    Ok(format!("{{{}}}", parts.join(", ")))
                })
            }
            Value::Set(set) if !set.borrow().is_empty() => {
                let keys = set.borrow().keys();
                Ok(format!("{{{}}}", self.join_repr(site, &keys)?))
            }
            other => Ok(other.plain_repr()),
        }
    }

    /// Runs one level of a recursive walk over nested values. Walk depth
    /// counts against the recursion limit together with call depth.
    fn descend<T>(
        &mut self,
        walk: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        if self.depth + self.structure_depth >= self.config.recursion_limit {
            return Err(RuntimeError::RecursionLimit);
        }
        self.structure_depth += 1;
        let result = stack::ensure_sufficient_stack(|| walk(self));
        self.structure_depth -= 1;
        result
    }

    fn guarded_repr(
        &mut self,
        id: usize,
        placeholder: &str,
        render: impl FnOnce(&mut Self) -> Result<String, RuntimeError>,
    ) -> Result<String, RuntimeError> {
        if self.repr_stack.contains(&id) {
            return Ok(placeholder.to_string());
        }
        self.repr_stack.push(id);
        let text = render(self);
        self.repr_stack.pop();
        text
    }

    fn join_repr(&mut self, site: &CallSite, items: &[Value]) -> Result<String, RuntimeError> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.push(self.repr(site, item)?);
        }
        Ok(parts.join(", "))
    }

    /// `item in container`.
    pub(crate) fn contains(&mut self, site: &CallSite, container: &Value, item: &Value) -> Result<bool, RuntimeError> {
        match container {
            Value::Str(text) => match item {
                Value::Str(needle) => Ok(text.contains(needle.as_ref())),
                other => Err(RuntimeError::Type(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            Value::List(items) => {
                let items = items.borrow().clone();
                self.any_equal(site, &items, item)
            }
            Value::Tuple(items) => self.any_equal(site, items, item),
            Value::Dict(dict) | Value::Set(dict) => dict.borrow().contains(item),
            Value::Range(range) => Ok(match item {
                Value::Float(value) if value.fract() == 0.0 => range.contains(*value as i64),
                other => other.as_int().is_some_and(|value| range.contains(value)),
            }),
            Value::Instance(_) => match self.dunder(site, container, "__contains__", vec![item.clone()])? {
                Some(result) => self.truthy(site, &result),
                None => {
                    let items = self.collect(site, container)?;
                    self.any_equal(site, &items, item)
                }
            },
            other => Err(RuntimeError::Type(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    fn any_equal(&mut self, site: &CallSite, items: &[Value], item: &Value) -> Result<bool, RuntimeError> {
        for candidate in items {
            if self.equality(site, candidate, item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Resolves a possibly negative index against `len`.
pub(crate) fn position(index: &Value, len: usize, type_name: &'static str) -> Result<usize, RuntimeError> {
    let Some(raw) = index.as_int() else {
        return Err(RuntimeError::InvalidIndexType {
            type_name: type_name.to_string(),
            index: index.type_name(),
        });
    };
    let len = i64::try_from(len).map_err(|_| RuntimeError::Overflow)?;
    let at = if raw < 0 { raw + len } else { raw };
    if (0..len).contains(&at) {
        Ok(at as usize)
    } else {
        Err(RuntimeError::IndexOutOfRange { type_name })
    }
}

fn pick(items: &[Value], indices: &[usize]) -> Vec<Value> {
    indices.iter().map(|&i| items[i].clone()).collect()
}

fn real(value: &Value) -> Option<f64> {
    match value {
        Value::Int(_) | Value::Bool(_) | Value::Float(_) => value.as_float(),
        _ => None,
    }
}

fn is_close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= APPROX_TOLERANCE * a.abs().max(b.abs())
}

fn arithmetic(operator: BinaryOperator, left: Numeric, right: Numeric) -> Result<Option<Value>, RuntimeError> {
    match (left, right) {
        (Numeric::Int(a), Numeric::Int(b)) => integer_operation(operator, a, b),
        (Numeric::Complex(..), _) | (_, Numeric::Complex(..)) => {
            complex_operation(operator, left.complex(), right.complex())
        }
        _ => float_operation(operator, left.float(), right.float()),
    }
}

fn integer_operation(operator: BinaryOperator, a: i64, b: i64) -> Result<Option<Value>, RuntimeError> {
    let overflow = || RuntimeError::Overflow;
    let value = match operator {
        BinaryOperator::Add => a.checked_add(b).ok_or_else(overflow)?,
        BinaryOperator::Sub => a.checked_sub(b).ok_or_else(overflow)?,
        BinaryOperator::Mul => a.checked_mul(b).ok_or_else(overflow)?,
        BinaryOperator::Div => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero("division by zero"));
            }
            return Ok(Some(Value::Float(a as f64 / b as f64)));
        }
        BinaryOperator::FloorDiv => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero("integer division or modulo by zero"));
            }
            let quotient = a.checked_div(b).ok_or_else(overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                quotient - 1
            } else {
                quotient
            }
        }
        BinaryOperator::Mod => {
            if b == 0 {
                return Err(RuntimeError::DivisionByZero("integer division or modulo by zero"));
            }
            let remainder = a.checked_rem(b).unwrap_or(0);
            if remainder != 0 && ((remainder < 0) != (b < 0)) {
                remainder + b
            } else {
                remainder
            }
        }
        BinaryOperator::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(RuntimeError::DivisionByZero(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Some(Value::Float((a as f64).powf(b as f64))));
            }
            let exponent = u32::try_from(b).map_err(|_| RuntimeError::Overflow)?;
            a.checked_pow(exponent).ok_or_else(overflow)?
        }
        BinaryOperator::BitAnd => a & b,
        BinaryOperator::BitOr => a | b,
        BinaryOperator::BitXor => a ^ b,
        BinaryOperator::Shl => {
            if b < 0 {
                return Err(RuntimeError::Value("negative shift count".to_string()));
            }
            if a == 0 {
                0
            } else {
                let shift = u32::try_from(b).ok().filter(|&s| s < 64).ok_or_else(overflow)?;
                let shifted = a << shift;
                if shifted >> shift != a {
                    return Err(RuntimeError::Overflow);
                }
                shifted
            }
        }
        BinaryOperator::Shr => {
            if b < 0 {
                return Err(RuntimeError::Value("negative shift count".to_string()));
            }
            if b >= 64 {
                if a < 0 { -1 } else { 0 }
            } else {
                a >> b
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(Value::Int(value)))
}

fn float_operation(operator: BinaryOperator, a: f64, b: f64) -> Result<Option<Value>, RuntimeError> {
    let value = match operator {
        BinaryOperator::Add => a + b,
        BinaryOperator::Sub => a - b,
        BinaryOperator::Mul => a * b,
        BinaryOperator::Div => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero("float division by zero"));
            }
            a / b
        }
        BinaryOperator::FloorDiv => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinaryOperator::Mod => {
            if b == 0.0 {
                return Err(RuntimeError::DivisionByZero("float modulo"));
            }
            let remainder = a % b;
            if remainder != 0.0 && ((remainder < 0.0) != (b < 0.0)) {
                remainder + b
            } else {
                remainder
            }
        }
        BinaryOperator::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(RuntimeError::DivisionByZero(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            if a < 0.0 && b.fract() != 0.0 {
                return complex_operation(operator, (a, 0.0), (b, 0.0));
            }
            a.powf(b)
        }
        _ => return Ok(None),
    };
    Ok(Some(Value::Float(value)))
}

fn complex_operation(
    operator: BinaryOperator,
    (a, b): (f64, f64),
    (c, d): (f64, f64),
) -> Result<Option<Value>, RuntimeError> {
    let (re, im) = match operator {
        BinaryOperator::Add => (a + c, b + d),
        BinaryOperator::Sub => (a - c, b - d),
        BinaryOperator::Mul => (a * c - b * d, a * d + b * c),
        BinaryOperator::Div => {
            let denominator = c * c + d * d;
            if denominator == 0.0 {
                return Err(RuntimeError::DivisionByZero("complex division by zero"));
            }
            ((a * c + b * d) / denominator, (b * c - a * d) / denominator)
        }
        BinaryOperator::Pow => {
            if d == 0.0 && c.fract() == 0.0 && c.abs() <= 100.0 {
                integral_power((a, b), c as i32)?
            } else if a == 0.0 && b == 0.0 {
                if d != 0.0 || c < 0.0 {
                    return Err(RuntimeError::DivisionByZero(
                        "0.0 to a negative or complex power",
                    ));
                }
                (0.0, 0.0)
            } else {
                let modulus = a.hypot(b);
                let argument = b.atan2(a);
                let length = modulus.powf(c) * (-d * argument).exp();
                let angle = d * modulus.ln() + c * argument;
                (length * angle.cos(), length * angle.sin())
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(Value::Complex(re, im)))
}

/// Concatenation, repetition, and set algebra on built-in collections.
fn collection_operation(operator: BinaryOperator, lhs: &Value, rhs: &Value) -> Result<Option<Value>, RuntimeError> {
    let value = match (operator, lhs, rhs) {
        (BinaryOperator::Add, Value::Str(a), Value::Str(b)) => Value::str(format!("{a}{b}")),
        (BinaryOperator::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Value::list(items)
        }
        (BinaryOperator::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Value::tuple(a.iter().chain(b.iter()).cloned().collect())
        }
        (BinaryOperator::Mul, sequence, count) | (BinaryOperator::Mul, count, sequence)
            if matches!(count, Value::Int(_) | Value::Bool(_))
                && matches!(sequence, Value::Str(_) | Value::List(_) | Value::Tuple(_)) =>
        {
            let times = usize::try_from(count.as_int().unwrap_or(0)).unwrap_or(0);
            match sequence {
                Value::Str(text) => {
                    let length = repeated_length(text.len(), times, "string")?;
                    let mut repeated = String::new();
                    repeated
                        .try_reserve_exact(length)
                        .map_err(|_| RuntimeError::OutOfMemory { type_name: "str", length })?;
                    for _ in 0..times {
                        repeated.push_str(text);
                    }
                    Value::str(repeated)
                }
                Value::List(items) => Value::list(repeat(&items.borrow(), times, "list")?),
                Value::Tuple(items) => Value::tuple(repeat(items, times, "tuple")?),
                _ => return Ok(None),
            }
        }
        (BinaryOperator::BitOr, Value::Dict(a), Value::Dict(b)) => {
            let mut merged = a.borrow().clone();
            for (key, value) in b.borrow().iter() {
                merged.insert(key.clone(), value.clone())?;
            }
            Value::dict(merged)
        }
        (
            BinaryOperator::BitOr | BinaryOperator::BitAnd | BinaryOperator::BitXor | BinaryOperator::Sub,
            Value::Set(a),
            Value::Set(b),
        ) => {
            let (a, b) = (a.borrow(), b.borrow());
            let mut keys = Vec::new();
            for key in a.keys() {
                let shared = b.contains(&key)?;
                let keep = match operator {
                    BinaryOperator::BitAnd => shared,
                    BinaryOperator::Sub | BinaryOperator::BitXor => !shared,
                    _ => true,
                };
                if keep {
                    keys.push(key);
                }
            }
            if matches!(operator, BinaryOperator::BitOr | BinaryOperator::BitXor) {
                for key in b.keys() {
                    if !a.contains(&key)? {
                        keys.push(key);
                    }
                }
            }
            Value::set(Dict::from_keys(keys)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Exponentiation by squaring, exact for small integral exponents.
fn integral_power(base: (f64, f64), exponent: i32) -> Result<(f64, f64), RuntimeError> {
    let multiply = |(a, b): (f64, f64), (c, d): (f64, f64)| (a * c - b * d, a * d + b * c);
    let mut result = (1.0, 0.0);
    let mut square = base;
    let mut remaining = exponent.unsigned_abs();
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = multiply(result, square);
        }
        square = multiply(square, square);
        remaining >>= 1;
    }
    if exponent >= 0 {
        return Ok(result);
    }
    let (re, im) = result;
    let denominator = re * re + im * im;
    if denominator == 0.0 {
        return Err(RuntimeError::DivisionByZero(
            "0.0 to a negative or complex power",
        ));
    }
    Ok((re / denominator, -im / denominator))
}

/// Largest sequence `*` may build, in items (bytes for strings).
const MAX_REPEAT_LENGTH: usize = 1 << 28;

fn repeated_length(
    length: usize,
    times: usize,
    type_name: &'static str,
) -> Result<usize, RuntimeError> {
    let total = length
        .checked_mul(times)
        .filter(|&total| isize::try_from(total).is_ok())
        .ok_or(RuntimeError::RepeatTooLong { type_name })?;
    if total > MAX_REPEAT_LENGTH {
        return Err(RuntimeError::OutOfMemory {
            type_name,
            length: total,
        });
    }
    Ok(total)
}

fn repeat(items: &[Value], times: usize, type_name: &'static str) -> Result<Vec<Value>, RuntimeError> {
    let length = repeated_length(items.len(), times, type_name)?;
    let mut repeated = Vec::new();
    repeated
        .try_reserve_exact(length)
        .map_err(|_| RuntimeError::OutOfMemory { type_name, length })?;
    for _ in 0..times {
        repeated.extend(items.iter().cloned());
    }
    Ok(repeated)
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

    fn failure(source: &str) -> String {
        Interpreter::new(Config::default())
            .execute("test.pys", source, Mode::Exec)
            .expect_err("program should fail")
            .to_string()
    }

    #[test]
    fn integer_division_floors() {
        assert_eq!(
            output("print(7 // 2, -7 // 2, 7 % -3, -7 % 3, 7 / 2, 2 ** -1, 2 ** 10)"),
            "3 -4 -2 2 3.5 0.5 1024\n"
        );
    }

    #[test]
    fn arithmetic_faults() {
        assert_eq!(failure("1 / 0"), "ZeroDivisionError: division by zero");
        assert_eq!(
            failure("1 // 0"),
            "ZeroDivisionError: integer division or modulo by zero"
        );
        assert_eq!(failure("1.5 % 0"), "ZeroDivisionError: float modulo");
        assert_eq!(
            failure("0 ** -1"),
            "ZeroDivisionError: 0.0 cannot be raised to a negative power"
        );
        assert_eq!(failure("1 << -1"), "ValueError: negative shift count");
        assert_eq!(
            failure("9223372036854775807 + 1"),
            "OverflowError: integer result too large"
        );
        assert_eq!(
            failure("1 + 'a'"),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
        assert_eq!(
            failure("x = 'a'\nx -= 1"),
            "TypeError: unsupported operand type(s) for -=: 'str' and 'int'"
        );
    }

    #[test]
    fn complex_numbers() {
        assert_eq!(
            output("z = (1 + 2j) * (3 - 1j)\nprint(z, z.real, z.imag, 2j ** 2)"),
            "(5+5j) 5.0 5.0 (-4+0j)\n"
        );
    }

    #[test]
    fn collections_concatenate_and_repeat() {
        assert_eq!(
            output(indoc! {"
                print('ab' * 2, [1] + [2], (1,) * 3, 3 * [0])
                print({1, 2, 3} & {2, 3, 4}, {1} | {2}, {1, 2} - {2}, {'a': 1} | {'b': 2})
            "}),
            "abab [1, 2] (1, 1, 1) [0, 0, 0]\n{2, 3} {1, 2} {1} {'a': 1, 'b': 2}\n"
        );
    }

    #[test]
    fn huge_repeat_counts_raise_instead_of_aborting() {
        assert_eq!(
            failure("x = [1, 2] * 9223372036854775807"),
            "OverflowError: repeated list is too long"
        );
        assert_eq!(
            failure("'ab' * 9223372036854775807"),
            "OverflowError: repeated string is too long"
        );
        assert_eq!(
            failure("x = (0,) * 1000000000"),
            "MemoryError: cannot allocate tuple of 1000000000 items"
        );
        assert_eq!(failure("try { [1] * 9223372036854775807 } catch (MemoryError) {}
1 / 0"),
            "ZeroDivisionError: division by zero");
        assert_eq!(output("print([1] * -3, 'a' * 0)"), "[] \n");
    }

    #[test]
    fn deeply_nested_values_raise_recursion_error() {
        let build = indoc! {"
            x = []
            y = []
            for (i = 0; i < 50000; i++) {
                x = [x]
                y = [y]
            }
        "};
        for walk in ["str(x)", "repr(y)", "x == y", "x < y", "print(x)"] {
            assert_eq!(
                failure(&format!("{build}{walk}")),
                "RecursionError: maximum recursion depth exceeded",
                "{walk}"
            );
        }
        assert_eq!(
            output(&format!("{build}print(x is x, len(x), x[0] is y)\nx = None\ny = 0\nprint('freed')")),
            "True 1 False\nfreed\n"
        );
    }

    #[test]
    fn shallow_nesting_still_compares_and_prints() {
        assert_eq!(
            output("a = [[[1]], (2, [3])]\nprint(a, a == [[[1]], (2, [3])], a < [[[2]]])"),
            "[[[1]], (2, [3])] True True\n"
        );
    }

    #[test]
    fn augmented_list_addition_extends_in_place() {
        assert_eq!(
            output("a = [1]\nb = a\na += (2, 3)\nprint(b)"),
            "[1, 2, 3]\n"
        );
    }

    #[test]
    fn approximate_equality() {
        assert_eq!(
            output(indoc! {"
                print(0.1 + 0.2 ~= 0.3, 1 ~! 1.0000001, ce(1, 1.0), nce(2, 2))
                class Near {
                    func __init__(self, v) { self.v = v }
                    func __ce__(self, other) { return abs(self.v - other) < 1 }
                }
                print(Near(5) ~= 5.5, 5.5 ~= Near(5), Near(5) ~! 9)
            "}),
            "True True True False\nTrue True True\n"
        );
        assert_eq!(
            failure("'a' ~= 'a'"),
            "TypeError: unsupported operand type(s) for ~= or ce(): 'str' and 'str'"
        );
    }

    #[test]
    fn operator_dunders_and_reflection() {
        assert_eq!(
            output(indoc! {"
                class V {
                    func __init__(self, x) { self.x = x }
                    func __add__(self, other) { return V(self.x + other.x) }
                    func __rmul__(self, k) { return V(self.x * k) }
                    func __lt__(self, other) { return self.x < other.x }
                    func __eq__(self, other) { return self.x == other.x }
                    func __neg__(self) { return V(-self.x) }
                    func __increment__(self) { return V(self.x + 1) }
                }
                v = V(1) + V(2)
                w = 3 * v
                print(v.x, w.x, V(1) < V(2), V(2) > V(1), V(4) == V(4), (-v).x)
                v++
                print(v.x, [V(1)] == [V(1)], V(1) in [V(1)])
            "}),
            "3 9 True True True -3\n4 True True\n"
        );
        assert_eq!(
            failure("class A {}\nA() < A()"),
            "TypeError: '<' not supported between instances of 'A' and 'A'"
        );
        assert_eq!(
            failure("x = 'a'\nx++"),
            "TypeError: unsupported operand type(s) for ++ or increment(): 'str'"
        );
    }

    #[test]
    fn indexing_and_slicing() {
        assert_eq!(
            output(indoc! {"
                xs = [0, 1, 2, 3, 4]
                print(xs[-1], xs[1:3], xs[::-2], 'hello'[1:4], (1, 2, 3)[-2], range(10)[2])
                del xs[0], xs[-1]
                d = {'a': 1}
                d['b'] = 2
                del d['a']
                print(xs, d)
            "}),
            "4 [1, 2] [4, 2, 0] ell 2 2\n[1, 2, 3] {'b': 2}\n"
        );
        assert_eq!(failure("[1][5]"), "IndexError: list index out of range");
        assert_eq!(failure("d = {}\nd['k']"), "KeyError: 'k'");
        assert_eq!(failure("5[0]"), "TypeError: 'int' object is not subscriptable");
        assert_eq!(
            failure("[1]['a']"),
            "TypeError: list indices must be integers or slices, not str"
        );
    }

    #[test]
    fn membership() {
        assert_eq!(
            output("print('ell' in 'hello', 3 in range(5), 'k' not in {'k': 1}, 2 in (1, 2))"),
            "True True False True\n"
        );
        assert_eq!(
            failure("1 in 'abc'"),
            "TypeError: 'in <string>' requires string as left operand, not int"
        );
    }

    #[test]
    fn repr_cuts_cycles_and_uses_hooks() {
        assert_eq!(
            output(indoc! {"
                xs = [1]
                xs.append(xs)
                class P { func __repr__(self) { return 'P!' } }
                print(xs, [P()], str(P()))
            "}),
            "[1, [...]] [P!] P!\n"
        );
    }

    #[test]
    fn truthiness_hooks() {
        assert_eq!(
            output(indoc! {"
                class Empty { func __len__(self) { return 0 } }
                class Yes { func __bool__(self) { return true } }
                print(bool(Empty()), bool(Yes()), not Empty())
            "}),
            "False True True\n"
        );
        assert_eq!(
            failure("class B { func __bool__(self) { return 1 } }\nif (B()) {}"),
            "TypeError: __bool__ should return bool, returned int"
        );
    }
}
