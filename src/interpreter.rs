//! The interpreter session.
//!
//! An [`Interpreter`] owns everything that outlives a single evaluation: the
//! builtins namespace, the exception classes, the module cache, output
//! streams, and the embedding hooks. Several sessions can coexist; none of
//! this state is global.

mod call;
mod import;
mod iteration;
mod ops;
mod visit;

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::lexer::{LexError, Lexer};
use crate::parser::{Mode, ParseError, parse};
use crate::runtime::builtins;
use crate::runtime::context::{CallSite, Context};
use crate::runtime::error::RuntimeError;
use crate::runtime::exception::{ExceptionClasses, ExceptionKind, Fault, Throwable};
use crate::runtime::symtab::SymbolTable;
use crate::runtime::value::{Module, Value};
use crate::token::Span;
use crate::traceback;
use crate::validator::{ValidationError, validate};
use crate::ast::Node;

pub use import::{FileResolver, HostBridge, ModuleResolver};
pub use iteration::Iteration;
pub(crate) use ops::position;

/// Failure to turn source text into a validated tree.
#[derive(Debug, Clone, Error)]
pub enum FrontendError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl FrontendError {
    pub fn span(&self) -> Span {
        match self {
            FrontendError::Lex(error) => error.span(),
            FrontendError::Parse(error) => error.span,
            FrontendError::Validation(error) => error.span,
        }
    }
}

/// Callback receiving the representation of a displayed value.
pub type DisplayHook = Box<dyn FnMut(&str)>;
/// Callback receiving an unhandled fault and its rendered traceback.
pub type ExceptionHook = Box<dyn FnMut(&Fault, &str)>;

#[derive(Default)]
struct Hooks {
    display: Option<DisplayHook>,
    exception: Option<ExceptionHook>,
}

/// Cloneable in-memory sink, handy for capturing script output.
#[derive(Clone, Default)]
pub struct OutputBuffer {
    bytes: Rc<RefCell<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.borrow()).into_owned()
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Interpreter {
    config: Config,
    hooks: Hooks,
    stdout: Box<dyn Write>,
    stderr: Box<dyn Write>,
    builtins: Rc<SymbolTable>,
    pub(crate) exceptions: ExceptionClasses,
    modules: FxHashMap<PathBuf, Rc<Module>>,
    loading: FxHashSet<PathBuf>,
    resolver: Box<dyn ModuleResolver>,
    host: Option<Box<dyn HostBridge>>,
    depth: usize,
    /// Containers whose representation is being built, to cut cycles.
    repr_stack: Vec<usize>,
    /// Nesting of the value walk in progress (repr, comparison).
    structure_depth: usize,
}

impl Interpreter {
    pub fn new(config: Config) -> Self {
        let exceptions = ExceptionClasses::new();
        let builtins = builtins::namespace(&exceptions);
        Self {
            config,
            hooks: Hooks::default(),
            stdout: Box::new(io::stdout()),
            stderr: Box::new(io::stderr()),
            builtins,
            exceptions,
            modules: FxHashMap::default(),
            loading: FxHashSet::default(),
            resolver: Box::new(FileResolver),
            host: None,
            depth: 0,
            repr_stack: Vec::new(),
            structure_depth: 0,
        }
    }

    pub fn with_stdout(mut self, stdout: impl Write + 'static) -> Self {
        self.stdout = Box::new(stdout);
        self
    }

    pub fn with_stderr(mut self, stderr: impl Write + 'static) -> Self {
        self.stderr = Box::new(stderr);
        self
    }

    pub fn with_resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_host_bridge(mut self, host: impl HostBridge + 'static) -> Self {
        self.host = Some(Box::new(host));
        self
    }

    pub fn with_display_hook(mut self, hook: impl FnMut(&str) + 'static) -> Self {
        self.hooks.display = Some(Box::new(hook));
        self
    }

    pub fn with_exception_hook(mut self, hook: impl FnMut(&Fault, &str) + 'static) -> Self {
        self.hooks.exception = Some(Box::new(hook));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs a program and returns the process exit status.
    pub fn run_source(&mut self, file: &str, source: &str) -> i32 {
        let result = self.execute(file, source, Mode::Exec);
        self.finish(result)
    }

    /// Evaluates one expression, hands a non-none result to the display
    /// hook, and returns the exit status.
    pub fn eval_source(&mut self, file: &str, source: &str) -> i32 {
        let result = self.execute(file, source, Mode::Eval);
        if let Ok(value) = &result
            && !matches!(value, Value::None | Value::Undefined)
        {
            let site = CallSite::new(self.top_context(file, source), Span::POSITIONLESS);
            match self.repr(&site, value) {
                Ok(text) => self.display(&text),
                Err(error) => {
                    let fault = self.fault(error, Span::POSITIONLESS, &site.context);
                    return self.finish(Err(fault));
                }
            }
        }
        self.finish(result.map(|_| Value::None))
    }

    /// Runs `source` as a fresh top-level module.
    pub fn execute(&mut self, file: &str, source: &str, mode: Mode) -> Result<Value, Fault> {
        let symbols = SymbolTable::root(self.builtins.clone());
        self.run_unit(file.into(), source.into(), mode, symbols, None)
    }

    pub fn compile(&self, source: &str, mode: Mode) -> Result<Node, FrontendError> {
        let tokens = Lexer::new(source)
            .with_warnings(self.config.warnings)
            .tokenize()?;
        let node = parse(tokens, mode)?;
        validate(&node)?;
        Ok(node)
    }

    /// Compiles and evaluates one source unit in `symbols`.
    pub(crate) fn run_unit(
        &mut self,
        file: Rc<str>,
        source: Rc<str>,
        mode: Mode,
        symbols: Rc<SymbolTable>,
        parent: Option<CallSite>,
    ) -> Result<Value, Fault> {
        let context = Context::module(file, source.clone(), symbols, parent);
        let node = match self.compile(&source, mode) {
            Ok(node) => node,
            Err(error) => return Err(self.syntax_fault(&error, &context)),
        };
        let mut signal = self.visit(&node, &context);
        match signal.take_error() {
            Some(fault) => Err(fault),
            None => Ok(signal.value),
        }
    }

    fn top_context(&self, file: &str, source: &str) -> Rc<Context> {
        Context::module(
            file.into(),
            source.into(),
            SymbolTable::root(self.builtins.clone()),
            None,
        )
    }

    fn syntax_fault(&self, error: &FrontendError, context: &Rc<Context>) -> Fault {
        let message = error.to_string();
        let exception = self
            .exceptions
            .instantiate(ExceptionKind::SyntaxError, message.clone());
        Fault::new(exception, message, error.span(), context.clone())
    }

    /// Turns a helper error into a fault raised at `span`.
    pub(crate) fn fault(&self, error: RuntimeError, span: Span, context: &Rc<Context>) -> Fault {
        match error {
            RuntimeError::Raised(fault) => *fault,
            error => {
                let exception = self.exceptions.instantiate(error.kind(), error.to_string());
                let message = exception.message();
                Fault::new(exception, message, span, context.clone())
            }
        }
    }

    /// Applies the exit contract to the outcome of a top-level run.
    fn finish(&mut self, result: Result<Value, Fault>) -> i32 {
        let fault = match result {
            Ok(_) => return 0,
            Err(fault) => fault,
        };

        if fault.is_kind(ExceptionKind::SystemExit) {
            let code = match fault.exception.get("args") {
                Some(Value::Tuple(args)) => args.first().cloned().unwrap_or(Value::None),
                _ => Value::None,
            };
            debug!(code = ?code, "script requested exit");
            return match code {
                Value::None => 0,
                Value::Int(code) => i32::try_from(code).unwrap_or(1),
                Value::Bool(code) => i32::from(code),
                other => {
                    let _ = writeln!(self.stderr, "{}", other.plain_str());
                    1
                }
            };
        }

        let text = traceback::render(&fault);
        match self.hooks.exception.as_mut() {
            Some(hook) => hook(&fault, &text),
            None => {
                let _ = write!(self.stderr, "{text}");
                let _ = self.stderr.flush();
            }
        }
        1
    }

    fn display(&mut self, text: &str) {
        match self.hooks.display.as_mut() {
            Some(hook) => hook(text),
            None => {
                let _ = writeln!(self.stdout, "{text}");
            }
        }
    }

    pub(crate) fn write_stdout(&mut self, text: &str) -> Result<(), RuntimeError> {
        self.stdout
            .write_all(text.as_bytes())
            .and_then(|()| self.stdout.flush())
            .map_err(|error| RuntimeError::Value(format!("cannot write output: {error}")))
    }

    pub(crate) fn builtins(&self) -> &Rc<SymbolTable> {
        &self.builtins
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    struct Run {
        status: i32,
        stdout: String,
        stderr: String,
    }

    fn run(source: &str) -> Run {
        let stdout = OutputBuffer::new();
        let stderr = OutputBuffer::new();
        let mut interpreter = Interpreter::default()
            .with_stdout(stdout.clone())
            .with_stderr(stderr.clone());
        let status = interpreter.run_source("test.pys", source);
        Run {
            status,
            stdout: stdout.contents(),
            stderr: stderr.contents(),
        }
    }

    fn output(source: &str) -> String {
        let run = run(source);
        assert_eq!(run.stderr, "", "unexpected failure");
        assert_eq!(run.status, 0);
        run.stdout
    }

    fn last_line(source: &str) -> String {
        let run = run(source);
        assert_eq!(run.status, 1, "program should fail");
        run.stderr.lines().last().unwrap_or_default().to_string()
    }

    #[test]
    fn switch_falls_through_until_break() {
        assert_eq!(
            output(indoc! {"
                switch (1) { case 1: x = 1; case 2: x = 2; break; default: x = 3 }
                print(x)
            "}),
            "2\n"
        );
        assert_eq!(
            output("switch (5) { case 1: x = 1; default: x = 3 }\nprint(x)"),
            "3\n"
        );
    }

    #[test]
    fn loop_else_runs_only_without_break() {
        assert_eq!(
            output(indoc! {r#"
                y = "unset"
                for (i = 0; i < 3; i++) {} else { y = "done" }
                print(y)
                z = "unset"
                for (i = 0; i < 3; i++) { if (i == 1) { break } } else { z = "done" }
                print(z, i)
            "#}),
            "done\nunset 1\n"
        );
    }

    #[test]
    fn destructuring_checks_arity() {
        assert_eq!(
            last_line("a, b = (1, 2, 3)"),
            "ValueError: too many values to unpack (expected 2)"
        );
        assert_eq!(
            last_line("a, b, c = (1, 2)"),
            "ValueError: not enough values to unpack (expected 3, got 2)"
        );
        assert_eq!(
            last_line("a, b = 5"),
            "TypeError: cannot unpack non-iterable int object"
        );
    }

    #[test]
    fn closures_share_their_defining_scope() {
        assert_eq!(
            output(indoc! {"
                func make() {
                    count = 0
                    func bump() { count += 1; return count }
                    func read() { return count }
                    return [bump, read]
                }
                fns = make()
                fns[0](); fns[0]()
                print(fns[1]())
            "}),
            "2\n"
        );
    }

    #[test]
    fn chained_comparison_short_circuits() {
        assert_eq!(
            output(indoc! {"
                calls = []
                func track(v) { calls.append(v); return v }
                print(1 < 2 < 0 < track(5), calls)
                print(1 < 2 <= 2)
            "}),
            "False []\nTrue\n"
        );
    }

    #[test]
    fn finally_fault_supersedes_and_chains() {
        let run = run(indoc! {"
            try {
                1 / 0
            } finally {
                undefined_name
            }
        "});
        assert_eq!(run.status, 1);
        assert!(run.stderr.starts_with("Traceback (most recent call last):\n"));
        assert!(run.stderr.contains("ZeroDivisionError: division by zero\n"));
        assert!(
            run.stderr
                .contains("During handling of the above exception, another exception occurred:")
        );
        assert!(run.stderr.ends_with("NameError: 'undefined_name' is not defined\n"));
    }

    #[test]
    fn catches_by_type_and_binds() {
        assert_eq!(
            output(indoc! {r#"
                class Oops extends ValueError {}
                try {
                    throw Oops("bad", 2)
                } catch (KeyError as e) {
                    print("wrong")
                } catch (ValueError e) {
                    print(type(e).__name__, e)
                } else {
                    print("no error")
                } finally {
                    print("cleanup")
                }
                try { [][1] } catch (err) { print(repr(err)) }
            "#}),
            "Oops ('bad', 2)\ncleanup\nIndexError('list index out of range')\n"
        );
    }

    #[test]
    fn context_managers_can_suppress() {
        assert_eq!(
            output(indoc! {r#"
                class Guard {
                    func __init__(self, swallow) { self.swallow = swallow }
                    func __enter__(self) { print("enter"); return self }
                    func __exit__(self, kind, error, trace) {
                        print("exit", kind is none ? "clean" : kind.__name__)
                        return self.swallow
                    }
                }
                with (Guard(true) as g) { throw ValueError("x") }
                with (Guard(false)) { print("body") }
            "#}),
            "enter\nexit ValueError\nenter\nbody\nexit clean\n"
        );
    }

    #[test]
    fn exit_codes_follow_system_exit() {
        assert_eq!(run("exit()").status, 0);
        assert_eq!(run("exit(3)").status, 3);
        let run = run(r#"exit("bye")"#);
        assert_eq!((run.status, run.stderr.as_str()), (1, "bye\n"));
    }

    #[test]
    fn recursion_limit_is_reported() {
        let mut interpreter = Interpreter::new(Config {
            recursion_limit: 50,
            ..Config::default()
        })
        .with_stderr(OutputBuffer::new());
        let fault = interpreter
            .execute("test.pys", "func f(n) { return f(n + 1) }\nf(0)", Mode::Exec)
            .expect_err("recursion should fail");
        assert_eq!(fault.to_string(), "RecursionError: maximum recursion depth exceeded");
    }

    #[test]
    fn frontend_errors_become_syntax_faults() {
        let mut interpreter = Interpreter::default();
        let fault = interpreter
            .execute("test.pys", "x = (1, 2", Mode::Exec)
            .expect_err("syntax should fail");
        assert_eq!(fault.type_name, "SyntaxError");
        assert_eq!(fault.span, Span::point(9));

        let fault = interpreter
            .execute("test.pys", "break", Mode::Exec)
            .expect_err("validation should fail");
        assert_eq!(
            fault.to_string(),
            "SyntaxError: break outside of loop or switch case"
        );
    }

    #[test]
    fn eval_mode_displays_results() {
        let shown = Rc::new(RefCell::new(Vec::new()));
        let sink = shown.clone();
        let mut interpreter =
            Interpreter::default().with_display_hook(move |text| sink.borrow_mut().push(text.to_string()));
        assert_eq!(interpreter.eval_source("<eval>", "[1, 'a'] + [2.5]"), 0);
        assert_eq!(interpreter.eval_source("<eval>", "none"), 0);
        assert_eq!(*shown.borrow(), vec!["[1, 'a', 2.5]".to_string()]);
    }

    #[test]
    fn exception_hook_receives_unhandled_faults() {
        let seen = Rc::new(RefCell::new(String::new()));
        let sink = seen.clone();
        let mut interpreter = Interpreter::default()
            .with_exception_hook(move |fault, _| *sink.borrow_mut() = fault.to_string());
        assert_eq!(interpreter.run_source("test.pys", "assert 1 == 2, 'nope'"), 1);
        assert_eq!(*seen.borrow(), "AssertionError: nope");
    }
}
