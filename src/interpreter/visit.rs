//! Node dispatch.
//!
//! Every node kind has exactly one arm in [`Interpreter::visit_node`]; the
//! match is exhaustive, so a new node kind does not build until it is
//! handled here.

use std::rc::Rc;

use crate::ast::{
    AssignOperator, BinaryOperator, CatchClause, ClassDef, Constant, ForHeader, FunctionDef, Node,
    NodeKind, SequenceKind,
};
use crate::runtime::context::{CallSite, Context, FrameKind};
use crate::runtime::dict::Dict;
use crate::runtime::error::RuntimeError;
use crate::runtime::exception::{ExceptionKind, Fault, Throwable};
use crate::runtime::signal::Signal;
use crate::runtime::symtab::{Operand, SymbolTable};
use crate::runtime::value::{Arguments, Class, Function, Instance, Slice, Value};
use crate::stack;
use crate::token::Number;

use super::Interpreter;

/// Visits a child node and returns early when it unwinds.
macro_rules! visit {
    ($self:ident, $node:expr, $context:expr) => {{
        let signal = $self.visit($node, $context);
        if signal.should_unwind() {
            return signal;
        }
        signal.value
    }};
}

/// Unwraps a helper result or fails the current node with it.
macro_rules! attempt {
    ($self:ident, $result:expr, $span:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(error) => return Signal::new().failure($self.fault(error, $span, $context)),
        }
    };
}

/// An assignable location with its container already evaluated.
enum Place {
    Name(String),
    Attribute(Value, String),
    Item(Value, Value),
}

/// Outcome of one loop iteration.
enum Iterate {
    Next,
    Break,
    Unwind(Signal),
}

fn success(value: Value) -> Signal {
    Signal::new().success(value)
}

impl Interpreter {
    pub(crate) fn visit(&mut self, node: &Node, context: &Rc<Context>) -> Signal {
        stack::ensure_sufficient_stack(|| self.visit_node(node, context))
    }

    fn visit_node(&mut self, node: &Node, context: &Rc<Context>) -> Signal {
        let span = node.span;
        let site = CallSite::new(context.clone(), span);

        match &node.kind {
            NodeKind::Number(number) => success(match *number {
                Number::Int(value) => Value::Int(value),
                Number::Float(value) => Value::Float(value),
                Number::Imaginary(value) => Value::Complex(0.0, value),
            }),
            NodeKind::String(text) => success(Value::str(text.as_str())),
            NodeKind::Constant(constant) => success(match constant {
                Constant::True | Constant::Debug => Value::Bool(true),
                Constant::False => Value::Bool(false),
                Constant::None => Value::None,
                Constant::Ellipsis => Value::Ellipsis,
            }),
            NodeKind::Identifier(name) => {
                let value = context.symbols.get(name);
                if value.is_undefined() {
                    let error = undefined(name, &context.symbols);
                    return Signal::new().failure(self.fault(error, span, context));
                }
                success(value)
            }
            NodeKind::Attribute { target, name } => {
                let object = visit!(self, target, context);
                success(attempt!(
                    self,
                    self.get_attribute(&site, &object, name),
                    span,
                    context
                ))
            }
            NodeKind::Subscript { target, index } => {
                let object = visit!(self, target, context);
                let index = visit!(self, index, context);
                success(attempt!(
                    self,
                    self.get_item(&site, &object, &index),
                    span,
                    context
                ))
            }
            NodeKind::Slice { start, stop, step } => {
                let mut bounds = [Value::None, Value::None, Value::None];
                for (bound, node) in bounds.iter_mut().zip([start, stop, step]) {
                    if let Some(node) = node {
                        *bound = visit!(self, node, context);
                    }
                }
                let [start, stop, step] = bounds;
                success(Value::Slice(Rc::new(Slice { start, stop, step })))
            }
            NodeKind::Call { target, arguments } => {
                let callee = visit!(self, target, context);
                let mut positional = Vec::new();
                let mut keywords = Vec::new();
                for argument in arguments {
                    let value = visit!(self, &argument.value, context);
                    match &argument.keyword {
                        Some(keyword) => keywords.push((keyword.clone(), value)),
                        None => positional.push(value),
                    }
                }
                let arguments = Arguments::new(positional, keywords);
                success(attempt!(
                    self,
                    self.call_value(&site, &callee, arguments),
                    span,
                    context
                ))
            }
            NodeKind::Sequence { kind, elements } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(visit!(self, element, context));
                }
                success(match kind {
                    SequenceKind::List => Value::list(values),
                    SequenceKind::Tuple => Value::tuple(values),
                    SequenceKind::Set => {
                        Value::set(attempt!(self, Dict::from_keys(values), span, context))
                    }
                })
            }
            NodeKind::Dict { entries } => {
                let mut pairs = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let key = visit!(self, key, context);
                    let value = visit!(self, value, context);
                    pairs.push((key, value));
                }
                success(Value::dict(attempt!(
                    self,
                    Dict::from_pairs(pairs),
                    span,
                    context
                )))
            }
            NodeKind::Binary {
                left,
                operator,
                right,
            } => {
                let lhs = visit!(self, left, context);
                match operator {
                    BinaryOperator::And | BinaryOperator::Or => {
                        let truth = attempt!(self, self.truthy(&site, &lhs), span, context);
                        if truth == (*operator == BinaryOperator::Or) {
                            return success(lhs);
                        }
                        return self.visit(right, context);
                    }
                    BinaryOperator::Nullish => {
                        if !matches!(lhs, Value::None | Value::Undefined) {
                            return success(lhs);
                        }
                        return self.visit(right, context);
                    }
                    _ => {}
                }
                let rhs = visit!(self, right, context);
                success(attempt!(
                    self,
                    self.binary(&site, *operator, lhs, rhs),
                    span,
                    context
                ))
            }
            NodeKind::Unary { operator, operand } => {
                let value = visit!(self, operand, context);
                success(attempt!(
                    self,
                    self.unary(&site, *operator, value),
                    span,
                    context
                ))
            }
            NodeKind::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = visit!(self, condition, context);
                if attempt!(self, self.truthy(&site, &condition), span, context) {
                    self.visit(then, context)
                } else {
                    self.visit(otherwise, context)
                }
            }
            NodeKind::Compare { first, rest } => {
                let mut left = visit!(self, first, context);
                for (operator, node) in rest {
                    let right = visit!(self, node, context);
                    let holds = attempt!(
                        self,
                        self.compare(&site, *operator, &left, &right),
                        span,
                        context
                    );
                    if !holds {
                        return success(Value::Bool(false));
                    }
                    left = right;
                }
                success(Value::Bool(true))
            }
            NodeKind::Step {
                target,
                operator,
                prefix,
            } => {
                let place = match self.place(target, context) {
                    Ok(place) => place,
                    Err(signal) => return signal,
                };
                let current = attempt!(self, self.read_place(&site, &place), span, context);
                let updated = attempt!(self, self.step(&site, *operator, &current), span, context);
                attempt!(
                    self,
                    self.write_place(&site, place, updated.clone(), Operand::Augmented),
                    span,
                    context
                );
                success(if *prefix { updated } else { current })
            }
            NodeKind::Assign {
                target,
                operator,
                value,
            } => match operator {
                AssignOperator::Assign | AssignOperator::Walrus => {
                    let value = visit!(self, value, context);
                    let signal = self.store(target, value.clone(), context);
                    if signal.should_unwind() {
                        return signal;
                    }
                    success(value)
                }
                AssignOperator::Augmented(operator) => {
                    let place = match self.place(target, context) {
                        Ok(place) => place,
                        Err(signal) => return signal,
                    };
                    let current = attempt!(self, self.read_place(&site, &place), span, context);
                    let rhs = visit!(self, value, context);
                    let updated = attempt!(
                        self,
                        self.augmented(&site, *operator, current, rhs),
                        span,
                        context
                    );
                    attempt!(
                        self,
                        self.write_place(&site, place, updated.clone(), Operand::Augmented),
                        span,
                        context
                    );
                    success(updated)
                }
            },
            NodeKind::Block(statements) => {
                for statement in statements {
                    let signal = self.visit(statement, context);
                    if signal.should_unwind() {
                        return signal;
                    }
                }
                Signal::new()
            }
            NodeKind::If {
                branches,
                otherwise,
            } => {
                for (condition, body) in branches {
                    let value = visit!(self, condition, context);
                    if attempt!(self, self.truthy(&site, &value), condition.span, context) {
                        return self.visit(body, context);
                    }
                }
                match otherwise {
                    Some(body) => self.visit(body, context),
                    None => Signal::new(),
                }
            }
            NodeKind::Switch {
                subject,
                cases,
                default,
            } => self.visit_switch(subject, cases, default.as_deref(), context),
            NodeKind::Try {
                body,
                catches,
                otherwise,
                finally,
            } => self.visit_try(
                body,
                catches,
                otherwise.as_deref(),
                finally.as_deref(),
                context,
            ),
            NodeKind::With {
                manager,
                alias,
                body,
            } => self.visit_with(manager, alias.as_deref(), body, &site),
            NodeKind::For {
                header,
                body,
                otherwise,
            } => self.visit_for(header, body, otherwise.as_deref(), &site),
            NodeKind::While {
                condition,
                body,
                otherwise,
            } => {
                loop {
                    let value = visit!(self, condition, context);
                    if !attempt!(self, self.truthy(&site, &value), condition.span, context) {
                        break;
                    }
                    match self.iterate_body(body, context) {
                        Iterate::Next => {}
                        Iterate::Break => return Signal::new(),
                        Iterate::Unwind(signal) => return signal,
                    }
                }
                self.visit_else(otherwise.as_deref(), context)
            }
            NodeKind::DoWhile {
                body,
                condition,
                otherwise,
            } => {
                loop {
                    match self.iterate_body(body, context) {
                        Iterate::Next => {}
                        Iterate::Break => return Signal::new(),
                        Iterate::Unwind(signal) => return signal,
                    }
                    let value = visit!(self, condition, context);
                    if !attempt!(self, self.truthy(&site, &value), condition.span, context) {
                        break;
                    }
                }
                self.visit_else(otherwise.as_deref(), context)
            }
            NodeKind::Function(definition) => self.visit_function(definition, context),
            NodeKind::Class(definition) => self.visit_class(definition, &site),
            NodeKind::Return(value) => {
                let value = match value {
                    Some(value) => visit!(self, value, context),
                    None => Value::None,
                };
                Signal::new().success_return(value)
            }
            NodeKind::Throw { exception, cause } => self.visit_throw(exception, cause.as_deref(), &site),
            NodeKind::Break => Signal::new().success_break(),
            NodeKind::Continue => Signal::new().success_continue(),
            NodeKind::Delete(targets) => {
                for target in targets {
                    let signal = self.delete(target, context);
                    if signal.should_unwind() {
                        return signal;
                    }
                }
                Signal::new()
            }
            NodeKind::Assert { condition, message } => {
                let value = visit!(self, condition, context);
                if attempt!(self, self.truthy(&site, &value), span, context) {
                    return Signal::new();
                }
                let message = match message {
                    Some(message) => {
                        let value = visit!(self, message, context);
                        attempt!(self, self.to_str(&site, &value), span, context)
                    }
                    None => String::new(),
                };
                Signal::new().failure(self.raise(ExceptionKind::AssertionError, message, &site))
            }
            NodeKind::Global(names) => {
                for name in names {
                    context.symbols.declare_global(name);
                }
                Signal::new()
            }
            NodeKind::Import { module, bindings } => {
                attempt!(self, self.import(&site, module, bindings), span, context);
                Signal::new()
            }
        }
    }

    /// Visits `node` and splits its outcome into a value or an unwinding
    /// signal.
    fn evaluate(&mut self, node: &Node, context: &Rc<Context>) -> Result<Value, Signal> {
        let signal = self.visit(node, context);
        if signal.should_unwind() {
            Err(signal)
        } else {
            Ok(signal.value)
        }
    }

    /// A fault of built-in class `kind` raised at `site`.
    pub(crate) fn raise(&self, kind: ExceptionKind, message: String, site: &CallSite) -> Fault {
        let exception = self.exceptions.instantiate(kind, message);
        let message = exception.message();
        Fault::new(exception, message, site.span, site.context.clone())
    }

    fn place(&mut self, target: &Node, context: &Rc<Context>) -> Result<Place, Signal> {
        match &target.kind {
            NodeKind::Identifier(name) => Ok(Place::Name(name.clone())),
            NodeKind::Attribute {
                target: object,
                name,
            } => Ok(Place::Attribute(
                self.evaluate(object, context)?,
                name.clone(),
            )),
            NodeKind::Subscript {
                target: object,
                index,
            } => {
                let object = self.evaluate(object, context)?;
                let index = self.evaluate(index, context)?;
                Ok(Place::Item(object, index))
            }
            _ => {
                let error = RuntimeError::Type("cannot assign to expression".to_string());
                Err(Signal::new().failure(self.fault(error, target.span, context)))
            }
        }
    }

    fn read_place(&mut self, site: &CallSite, place: &Place) -> Result<Value, RuntimeError> {
        match place {
            Place::Name(name) => {
                let value = site.context.symbols.get(name);
                if value.is_undefined() {
                    return Err(undefined(name, &site.context.symbols));
                }
                Ok(value)
            }
            Place::Attribute(object, name) => self.get_attribute(site, object, name),
            Place::Item(object, index) => self.get_item(site, object, index),
        }
    }

    fn write_place(
        &mut self,
        site: &CallSite,
        place: Place,
        value: Value,
        operand: Operand,
    ) -> Result<(), RuntimeError> {
        match place {
            Place::Name(name) => {
                if site.context.symbols.set(&name, value, operand) {
                    Ok(())
                } else {
                    Err(undefined(&name, &site.context.symbols))
                }
            }
            Place::Attribute(object, name) => self.set_attribute(&object, &name, value),
            Place::Item(object, index) => self.set_item(site, &object, index, value),
        }
    }

    /// Binds `value` to an assignment target, destructuring sequences.
    fn store(&mut self, target: &Node, value: Value, context: &Rc<Context>) -> Signal {
        let site = CallSite::new(context.clone(), target.span);
        if let NodeKind::Sequence { elements, .. } = &target.kind {
            let items = attempt!(
                self,
                self.unpack(&site, &value, elements.len()),
                target.span,
                context
            );
            for (element, item) in elements.iter().zip(items) {
                let signal = self.store(element, item, context);
                if signal.should_unwind() {
                    return signal;
                }
            }
            return Signal::new();
        }

        let place = match self.place(target, context) {
            Ok(place) => place,
            Err(signal) => return signal,
        };
        attempt!(
            self,
            self.write_place(&site, place, value, Operand::Assign),
            target.span,
            context
        );
        Signal::new()
    }

    fn delete(&mut self, target: &Node, context: &Rc<Context>) -> Signal {
        let site = CallSite::new(context.clone(), target.span);
        match &target.kind {
            NodeKind::Identifier(name) => {
                if context.symbols.remove(name) {
                    return Signal::new();
                }
                let error = if context.symbols.get(name).is_undefined() {
                    undefined(name, &context.symbols)
                } else {
                    RuntimeError::UndefinedLocal { name: name.clone() }
                };
                Signal::new().failure(self.fault(error, target.span, context))
            }
            NodeKind::Attribute {
                target: object,
                name,
            } => {
                let object = visit!(self, object, context);
                attempt!(
                    self,
                    self.delete_attribute(&object, name),
                    target.span,
                    context
                );
                Signal::new()
            }
            NodeKind::Subscript {
                target: object,
                index,
            } => {
                let object = visit!(self, object, context);
                let index = visit!(self, index, context);
                attempt!(
                    self,
                    self.delete_item(&site, &object, &index),
                    target.span,
                    context
                );
                Signal::new()
            }
            NodeKind::Sequence { elements, .. } => {
                for element in elements {
                    let signal = self.delete(element, context);
                    if signal.should_unwind() {
                        return signal;
                    }
                }
                Signal::new()
            }
            _ => {
                let error = RuntimeError::Type("cannot delete expression".to_string());
                Signal::new().failure(self.fault(error, target.span, context))
            }
        }
    }

    fn iterate_body(&mut self, body: &Node, context: &Rc<Context>) -> Iterate {
        let signal = self.visit(body, context);
        if signal.is_loop_control() {
            if signal.should_break {
                Iterate::Break
            } else {
                Iterate::Next
            }
        } else if signal.should_unwind() {
            Iterate::Unwind(signal)
        } else {
            Iterate::Next
        }
    }

    fn visit_else(&mut self, otherwise: Option<&Node>, context: &Rc<Context>) -> Signal {
        match otherwise {
            Some(body) => self.visit(body, context),
            None => Signal::new(),
        }
    }

    fn visit_for(
        &mut self,
        header: &ForHeader,
        body: &Node,
        otherwise: Option<&Node>,
        site: &CallSite,
    ) -> Signal {
        let context = &site.context;
        match header {
            ForHeader::Counter {
                init,
                condition,
                update,
            } => {
                if let Some(init) = init {
                    visit!(self, init, context);
                }
                loop {
                    if let Some(condition) = condition {
                        let value = visit!(self, condition, context);
                        if !attempt!(self, self.truthy(site, &value), condition.span, context) {
                            break;
                        }
                    }
                    match self.iterate_body(body, context) {
                        Iterate::Next => {}
                        Iterate::Break => return Signal::new(),
                        Iterate::Unwind(signal) => return signal,
                    }
                    if let Some(update) = update {
                        visit!(self, update, context);
                    }
                }
            }
            ForHeader::Each { target, iterable } => {
                let value = visit!(self, iterable, context);
                let mut iteration =
                    attempt!(self, self.iterate(site, &value), iterable.span, context);
                loop {
                    let item = attempt!(
                        self,
                        self.next_item(site, &mut iteration),
                        iterable.span,
                        context
                    );
                    let Some(item) = item else {
                        break;
                    };
                    let signal = self.store(target, item, context);
                    if signal.should_unwind() {
                        return signal;
                    }
                    match self.iterate_body(body, context) {
                        Iterate::Next => {}
                        Iterate::Break => return Signal::new(),
                        Iterate::Unwind(signal) => return signal,
                    }
                }
            }
        }
        self.visit_else(otherwise, context)
    }

    fn visit_switch(
        &mut self,
        subject: &Node,
        cases: &[(Node, Node)],
        default: Option<&Node>,
        context: &Rc<Context>,
    ) -> Signal {
        let subject_value = visit!(self, subject, context);
        let mut falling = false;

        for (case, body) in cases {
            if !falling {
                let value = visit!(self, case, context);
                let site = CallSite::new(context.clone(), case.span);
                falling = attempt!(
                    self,
                    self.equality(&site, &subject_value, &value),
                    case.span,
                    context
                );
            }
            if falling {
                let signal = self.visit(body, context);
                if signal.is_loop_control() && signal.should_break {
                    return Signal::new();
                }
                if signal.should_unwind() {
                    return signal;
                }
            }
        }

        // Reached without a `break`: either nothing matched or the last
        // matching case fell off the end.
        match default {
            Some(body) => {
                let signal = self.visit(body, context);
                if signal.is_loop_control() && signal.should_break {
                    return Signal::new();
                }
                signal
            }
            None => Signal::new(),
        }
    }

    fn visit_try(
        &mut self,
        body: &Node,
        catches: &[CatchClause],
        otherwise: Option<&Node>,
        finally: Option<&Node>,
        context: &Rc<Context>,
    ) -> Signal {
        let mut signal = self.visit(body, context);

        if let Some(fault) = signal.take_error() {
            signal = self.handle(fault, catches, context);
        } else if !signal.should_unwind()
            && let Some(otherwise) = otherwise
        {
            signal = self.visit(otherwise, context);
        }

        let Some(finally) = finally else {
            return signal;
        };
        let mut cleanup = self.visit(finally, context);
        if !cleanup.should_unwind() {
            return signal;
        }
        match (cleanup.take_error(), signal.take_error()) {
            (Some(fault), Some(pending)) => Signal::new().failure(fault.chained(pending)),
            (Some(fault), None) => Signal::new().failure(fault),
            (None, _) => cleanup,
        }
    }

    /// Runs the first catch clause matching `fault`, or re-raises it.
    fn handle(&mut self, fault: Fault, catches: &[CatchClause], context: &Rc<Context>) -> Signal {
        for clause in catches {
            if let Some(class) = &clause.class {
                let filter = match self.evaluate(class, context) {
                    Ok(filter) => filter,
                    Err(mut signal) => {
                        return match signal.take_error() {
                            Some(error) => Signal::new().failure(error.chained(fault)),
                            None => signal,
                        };
                    }
                };
                let matched = match catch_matches(&fault, &filter) {
                    Ok(matched) => matched,
                    Err(error) => {
                        let error = self.fault(error, class.span, context);
                        return Signal::new().failure(error.chained(fault));
                    }
                };
                if !matched {
                    continue;
                }
            }

            if let Some(name) = &clause.binding {
                context
                    .symbols
                    .set(name, fault.exception_value(), Operand::Assign);
            }
            let mut signal = self.visit(&clause.body, context);
            if let Some(name) = &clause.binding {
                context.symbols.remove(name);
            }
            if let Some(error) = signal.take_error() {
                return Signal::new().failure(error.chained(fault));
            }
            return signal;
        }
        Signal::new().failure(fault)
    }

    fn visit_with(
        &mut self,
        manager: &Node,
        alias: Option<&Node>,
        body: &Node,
        site: &CallSite,
    ) -> Signal {
        let context = &site.context;
        let manager = visit!(self, manager, context);
        let (enter, exit) = match self.context_manager(&manager) {
            Ok(hooks) => hooks,
            Err(error) => return Signal::new().failure(self.fault(error, site.span, context)),
        };

        let entered = attempt!(
            self,
            self.call_value(site, &enter, Arguments::default()),
            site.span,
            context
        );
        let mut signal = match alias {
            Some(alias) => self.store(alias, entered, context),
            None => Signal::new(),
        };
        if !signal.should_unwind() {
            signal = self.visit(body, context);
        }

        let arguments = match &signal.error {
            Some(fault) => vec![
                Value::Class(fault.exception.class.clone()),
                fault.exception_value(),
                Value::None,
            ],
            None => vec![Value::None, Value::None, Value::None],
        };
        let suppress = self
            .call_value(site, &exit, Arguments::positional(arguments))
            .and_then(|result| self.truthy(site, &result));
        match suppress {
            Ok(true) if signal.error.is_some() => Signal::new(),
            Ok(_) => signal,
            Err(error) => {
                let fault = self.fault(error, site.span, context);
                match signal.take_error() {
                    Some(pending) => Signal::new().failure(fault.chained(pending)),
                    None => Signal::new().failure(fault),
                }
            }
        }
    }

    fn context_manager(&mut self, manager: &Value) -> Result<(Value, Value), RuntimeError> {
        let not_manager = || RuntimeError::NotContextManager {
            type_name: manager.type_name(),
        };
        let Value::Instance(instance) = manager else {
            return Err(not_manager());
        };
        let enter = instance.class.lookup("__enter__").ok_or_else(not_manager)?;
        let exit = instance.class.lookup("__exit__").ok_or_else(not_manager)?;
        Ok((
            Value::bound(manager.clone(), enter),
            Value::bound(manager.clone(), exit),
        ))
    }

    fn visit_function(&mut self, definition: &Rc<FunctionDef>, context: &Rc<Context>) -> Signal {
        let mut decorators = Vec::with_capacity(definition.decorators.len());
        for decorator in &definition.decorators {
            decorators.push(visit!(self, decorator, context));
        }
        let mut defaults = Vec::with_capacity(definition.parameters.len());
        for parameter in &definition.parameters {
            defaults.push(match &parameter.default {
                Some(default) => Some(visit!(self, default, context)),
                None => None,
            });
        }

        let name = definition
            .name
            .clone()
            .unwrap_or_else(|| Function::ANONYMOUS.to_string());
        let scope = match (context.kind, context.symbols.parent()) {
            (FrameKind::Class, Some(enclosing)) => enclosing.clone(),
            _ => context.symbols.clone(),
        };
        let function = Value::Function(Rc::new(Function {
            qualname: context.qualify(&name),
            name,
            definition: definition.clone(),
            defaults,
            closure: context.clone(),
            scope,
        }));

        let site = CallSite::new(context.clone(), definition.body.span);
        let function = attempt!(
            self,
            self.decorate(&site, decorators, function),
            definition.body.span,
            context
        );
        if let Some(name) = &definition.name {
            context.symbols.set(name, function.clone(), Operand::Assign);
        }
        success(function)
    }

    /// Applies decorators closest-to-definition first.
    fn decorate(
        &mut self,
        site: &CallSite,
        decorators: Vec<Value>,
        mut value: Value,
    ) -> Result<Value, RuntimeError> {
        for decorator in decorators.into_iter().rev() {
            value = self.call_value(site, &decorator, Arguments::positional(vec![value]))?;
        }
        Ok(value)
    }

    fn visit_class(&mut self, definition: &ClassDef, site: &CallSite) -> Signal {
        let context = &site.context;
        let mut decorators = Vec::with_capacity(definition.decorators.len());
        for decorator in &definition.decorators {
            decorators.push(visit!(self, decorator, context));
        }
        let mut bases = Vec::with_capacity(definition.bases.len());
        for base in &definition.bases {
            match visit!(self, base, context) {
                Value::Class(class) => bases.push(class),
                other => {
                    let error = RuntimeError::Type(format!(
                        "class bases must be classes, not '{}'",
                        other.type_name()
                    ));
                    return Signal::new().failure(self.fault(error, base.span, context));
                }
            }
        }

        let qualname = context.qualify(&definition.name);
        let symbols = SymbolTable::child(&context.symbols);
        let frame = context.enter(
            FrameKind::Class,
            definition.name.clone(),
            Some(qualname.clone()),
            symbols.clone(),
            site.clone(),
        );
        let signal = self.visit(&definition.body, &frame);
        if signal.should_unwind() {
            return signal;
        }

        let class = Class::new(definition.name.clone(), qualname, bases);
        class.attributes.borrow_mut().extend(symbols.entries());
        let class = attempt!(
            self,
            self.decorate(site, decorators, Value::Class(Rc::new(class))),
            site.span,
            context
        );
        context
            .symbols
            .set(&definition.name, class.clone(), Operand::Assign);
        success(class)
    }

    fn visit_throw(&mut self, exception: &Node, cause: Option<&Node>, site: &CallSite) -> Signal {
        let context = &site.context;
        let value = visit!(self, exception, context);
        let instance = attempt!(self, self.throwable(site, value), site.span, context);
        let message = instance.message();
        let mut fault = Fault::new(instance, message, site.span, context.clone());

        if let Some(cause) = cause {
            let value = visit!(self, cause, context);
            if !value.is_none() {
                let cause_site = CallSite::new(context.clone(), cause.span);
                let instance =
                    attempt!(self, self.throwable(&cause_site, value), cause.span, context);
                let message = instance.message();
                fault.cause = Some(Box::new(Fault::new(
                    instance,
                    message,
                    cause.span,
                    context.clone(),
                )));
            }
        }
        Signal::new().failure(fault)
    }

    /// The exception instance raised by `throw value`.
    fn throwable(&mut self, site: &CallSite, value: Value) -> Result<Rc<Instance>, RuntimeError> {
        match value {
            Value::Class(class) if class.exception_kind().is_some() => {
                match self.instantiate(site, &class, Arguments::default())? {
                    Value::Instance(instance) => Ok(instance),
                    _ => Err(RuntimeError::NotThrowable),
                }
            }
            Value::Instance(instance) if instance.is_exception() => Ok(instance),
            _ => Err(RuntimeError::NotThrowable),
        }
    }
}

/// Whether a catch filter (a class or a tuple of classes) covers `fault`.
fn catch_matches(fault: &Fault, filter: &Value) -> Result<bool, RuntimeError> {
    match filter {
        Value::Class(class) if class.exception_kind().is_some() => {
            Ok(fault.exception.class.is_subclass_of(class))
        }
        Value::Tuple(filters) => {
            for filter in filters.iter() {
                if catch_matches(fault, filter)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        _ => Err(RuntimeError::Type(
            "catching classes that do not inherit from BaseException is not allowed".to_string(),
        )),
    }
}

pub(crate) fn undefined(name: &str, symbols: &SymbolTable) -> RuntimeError {
    RuntimeError::Undefined {
        name: name.to_string(),
        suggestion: symbols.find_closest(name),
    }
}

#[cfg(test)]
mod tests {
    use super::super::OutputBuffer;
    use super::*;
    use crate::config::Config;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn output(source: &str) -> String {
        let stdout = OutputBuffer::new();
        let mut interpreter = Interpreter::new(Config::default()).with_stdout(stdout.clone());
        if let Err(fault) = interpreter.execute("test.pys", source, crate::parser::Mode::Exec) {
            panic!("program failed: {fault}");
        }
        stdout.contents()
    }

    fn failure(source: &str) -> String {
        let mut interpreter = Interpreter::new(Config::default()).with_stdout(OutputBuffer::new());
        interpreter
            .execute("test.pys", source, crate::parser::Mode::Exec)
            .expect_err("program should fail")
            .to_string()
    }

    #[test]
    fn logic_operators_return_operands() {
        assert_eq!(
            output(indoc! {r#"
                print(0 or "x", 1 and [], none ?? 5, 0 ?? 5, !0, not [1])
            "#}),
            "x [] 5 0 True False\n"
        );
    }

    #[test]
    fn increments_report_old_or_new_value() {
        assert_eq!(
            output(indoc! {"
                i = 1
                a = i++
                b = ++i
                xs = [10]
                xs[0]--
                print(a, b, i, xs)
            "}),
            "1 3 3 [9]\n"
        );
    }

    #[test]
    fn nested_destructuring() {
        assert_eq!(
            output("a, [b, c] = 1, (2, 3)\nprint(a + b + c)"),
            "6\n"
        );
    }

    #[test]
    fn global_and_delete() {
        assert_eq!(
            output(indoc! {"
                g = 1
                func set() { global g; g = 5 }
                set()
                print(g)
                del g
                print(globals().get('g'))
            "}),
            "5\nNone\n"
        );
        assert_eq!(failure("del nothing"), "NameError: 'nothing' is not defined");
        assert_eq!(
            failure("x = 1\nfunc f() { del x }\nf()"),
            "NameError: 'x' is not defined on local"
        );
    }

    #[test]
    fn decorators_apply_closest_first() {
        assert_eq!(
            output(indoc! {r#"
                func tag(label) {
                    return func (f) { return func () { return label + f() } }
                }
                @tag("a")
                @tag("b")
                func base() { return "!" }
                print(base())
            "#}),
            "ab!\n"
        );
    }

    #[test]
    fn class_methods_and_qualified_names() {
        assert_eq!(
            output(indoc! {r#"
                class Outer {
                    class Inner {
                        func hello(self) { return "hi" }
                    }
                    func make(self) {
                        func local() {}
                        return local
                    }
                }
                print(Outer.Inner.__qualname__, Outer.Inner().hello())
                print(Outer().make().__qualname__)
            "#}),
            "Outer.Inner hi\nOuter.make.<locals>.local\n"
        );
    }

    #[test]
    fn throw_from_records_cause() {
        let mut interpreter = Interpreter::new(Config::default());
        let fault = interpreter
            .execute(
                "test.pys",
                "throw RuntimeError('outer') from KeyError('inner')",
                crate::parser::Mode::Exec,
            )
            .expect_err("throw should fail");
        assert_eq!(fault.to_string(), "RuntimeError: outer");
        let cause = fault.cause.expect("cause should be recorded");
        assert_eq!(cause.to_string(), "KeyError: inner");
        assert_eq!(failure("throw 5"), "TypeError: exceptions must derive from BaseException");
    }

    #[test]
    fn catch_reraise_chains_previous() {
        let mut interpreter = Interpreter::new(Config::default());
        let fault = interpreter
            .execute(
                "test.pys",
                "d = {}\ntry { d['k'] } catch (KeyError) { throw ValueError('converted') }",
                crate::parser::Mode::Exec,
            )
            .expect_err("handler should fail");
        assert_eq!(fault.to_string(), "ValueError: converted");
        assert_eq!(
            fault.previous.expect("previous should be chained").to_string(),
            "KeyError: 'k'"
        );
    }

    #[test]
    fn undefined_names_suggest_alternatives() {
        assert_eq!(
            failure("counter = 1\nprint(countr)"),
            "NameError: 'countr' is not defined. Did you mean 'counter'?"
        );
    }
}
