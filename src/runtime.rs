//! Object model shared by the evaluator: values, scopes, frames, the
//! exception hierarchy, and the builtins namespace.
pub mod builtins;
pub mod context;
pub mod dict;
pub mod error;
pub mod exception;
pub mod signal;
pub mod symtab;
pub mod value;
