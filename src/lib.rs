//! PyScript: a small Python-flavored scripting language.
//!
//! Source goes through [`lexer`], [`parser`] and [`validator`] before the
//! tree-walking [`interpreter`] evaluates it against the [`runtime`]
//! object model. Unhandled faults are rendered by [`traceback`].

pub mod ast;
pub mod config;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod stack;
pub mod token;
pub mod traceback;
pub mod untokenize;
pub mod validator;

pub use config::Config;
pub use interpreter::{Interpreter, OutputBuffer};
