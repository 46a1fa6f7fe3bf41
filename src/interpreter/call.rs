use std::rc::Rc;

use tracing::trace;

use crate::runtime::builtins;
use crate::runtime::context::{CallSite, Context};
use crate::runtime::error::RuntimeError;
use crate::runtime::symtab::{Operand, SymbolTable};
use crate::runtime::value::{Arguments, Class, Function, Instance, Value};

use super::Interpreter;

impl Interpreter {
    /// Calls any callable value.
    pub(crate) fn call_value(
        &mut self,
        site: &CallSite,
        callee: &Value,
        arguments: Arguments,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Builtin(builtin) => (builtin.function)(self, site, arguments),
            Value::Function(function) => self.call_function(site, function, arguments),
            Value::BoundMethod(method) => {
                let arguments = arguments.with_receiver(method.receiver.clone());
                self.call_value(site, &method.function, arguments)
            }
            Value::Class(class) => self.instantiate(site, class, arguments),
            Value::Type(kind) => builtins::construct(self, site, *kind, arguments),
            Value::Instance(instance) => match instance.class.lookup("__call__") {
                Some(method) => {
                    let arguments = arguments.with_receiver(callee.clone());
                    self.call_value(site, &method, arguments)
                }
                None => Err(RuntimeError::NotCallable {
                    type_name: callee.type_name(),
                }),
            },
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name(),
            }),
        }
    }

    pub(crate) fn call_function(
        &mut self,
        site: &CallSite,
        function: &Rc<Function>,
        arguments: Arguments,
    ) -> Result<Value, RuntimeError> {
        if self.depth >= self.config.recursion_limit {
            return Err(RuntimeError::RecursionLimit);
        }

        let symbols = SymbolTable::child(&function.scope);
        bind_arguments(function, arguments, &symbols)?;
        let frame = Context::call(function, symbols, site.clone());

        trace!(function = %function.qualname, depth = self.depth, "call");
        self.depth += 1;
        let mut signal = self.visit(&function.definition.body, &frame);
        self.depth -= 1;

        if let Some(fault) = signal.take_error() {
            return Err(fault.into());
        }
        Ok(signal.return_value.unwrap_or(Value::None))
    }

    /// Creates an instance of a script class and runs its `__init__`.
    pub(crate) fn instantiate(
        &mut self,
        site: &CallSite,
        class: &Rc<Class>,
        arguments: Arguments,
    ) -> Result<Value, RuntimeError> {
        let instance = Instance::new(class.clone());
        let value = Value::Instance(instance.clone());
        let initializer = class.lookup("__init__");

        if class.exception_kind().is_some() {
            instance.set("args", Value::tuple(arguments.positional.clone()));
        }

        match initializer {
            Some(initializer) => {
                let result =
                    self.call_value(site, &initializer, arguments.with_receiver(value.clone()))?;
                if !result.is_none() {
                    return Err(RuntimeError::Type(format!(
                        "__init__() should return None, not '{}'",
                        result.type_name()
                    )));
                }
            }
            None if (class.exception_kind().is_none() && !arguments.positional.is_empty())
                || !arguments.keywords.is_empty() =>
            {
                return Err(RuntimeError::Type(format!(
                    "{}() takes no arguments",
                    class.name
                )));
            }
            None => {}
        }
        Ok(value)
    }
}

/// Binds call arguments to the parameters of `function` in `symbols`.
fn bind_arguments(
    function: &Function,
    arguments: Arguments,
    symbols: &Rc<SymbolTable>,
) -> Result<(), RuntimeError> {
    let parameters = &function.definition.parameters;
    let given = arguments.positional.len();
    if given > parameters.len() {
        return Err(RuntimeError::TooManyPositional {
            function: function.name.clone(),
            expected: parameters.len(),
            given,
        });
    }

    let mut bound = vec![false; parameters.len()];
    for ((parameter, value), slot) in parameters
        .iter()
        .zip(arguments.positional)
        .zip(bound.iter_mut())
    {
        symbols.set(&parameter.name, value, Operand::Assign);
        *slot = true;
    }

    for (keyword, value) in arguments.keywords {
        let Some(index) = parameters.iter().position(|p| p.name == keyword) else {
            return Err(RuntimeError::UnexpectedKeyword {
                function: function.name.clone(),
                argument: keyword,
            });
        };
        if bound[index] {
            return Err(RuntimeError::MultipleValues {
                function: function.name.clone(),
                argument: keyword,
            });
        }
        symbols.set(&keyword, value, Operand::Assign);
        bound[index] = true;
    }

    let mut missing = Vec::new();
    for ((parameter, default), bound) in parameters.iter().zip(&function.defaults).zip(bound) {
        if bound {
            continue;
        }
        match default {
            Some(value) => {
                symbols.set(&parameter.name, value.clone(), Operand::Assign);
            }
            None => missing.push(parameter.name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(RuntimeError::MissingArguments {
            function: function.name.clone(),
            missing,
        });
    }
    Ok(())
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
    fn binds_positional_keyword_and_default() {
        assert_eq!(
            output(indoc! {"
                func f(a, b = 2, c = 3) { return [a, b, c] }
                print(f(1), f(1, c = 9), f(c = 0, a = 5, b = 6))
            "}),
            "[1, 2, 3] [1, 2, 9] [5, 6, 0]\n"
        );
    }

    #[test]
    fn defaults_are_evaluated_once() {
        assert_eq!(
            output(indoc! {"
                func push(x, acc = []) { acc.append(x); return acc }
                push(1)
                print(push(2))
            "}),
            "[1, 2]\n"
        );
    }

    #[test]
    fn argument_errors_are_distinct() {
        assert_eq!(
            failure("func f(a) {}\nf(1, 2, 3)"),
            "TypeError: f() takes 1 positional argument but 3 were given"
        );
        assert_eq!(
            failure("func f(a, b) {}\nf()"),
            "TypeError: f() missing 2 required positional arguments: 'a' and 'b'"
        );
        assert_eq!(
            failure("func f(a) {}\nf(1, a = 2)"),
            "TypeError: f() got multiple values for argument 'a'"
        );
        assert_eq!(
            failure("func f(a) {}\nf(z = 2)"),
            "TypeError: f() got an unexpected keyword argument 'z'"
        );
    }

    #[test]
    fn functions_without_return_yield_none() {
        assert_eq!(output("func f() { 1 + 1 }\nprint(f())"), "None\n");
    }

    #[test]
    fn constructors_and_callable_instances() {
        assert_eq!(
            output(indoc! {"
                class Adder {
                    func __init__(self, base) { self.base = base }
                    func __call__(self, x) { return self.base + x }
                }
                add = Adder(10)
                print(add(5))
            "}),
            "15\n"
        );
        assert_eq!(
            failure("class Plain {}\nPlain(1)"),
            "TypeError: Plain() takes no arguments"
        );
        assert_eq!(
            failure("class Bad { func __init__(self) { return 1 } }\nBad()"),
            "TypeError: __init__() should return None, not 'int'"
        );
        assert_eq!(failure("5()"), "TypeError: 'int' object is not callable");
    }
}
