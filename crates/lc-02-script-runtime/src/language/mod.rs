//! The sandbox language: a deterministic expression language written as JSON.

pub mod ast;
pub mod interpreter;

pub use ast::Expr;
pub use interpreter::{is_truthy, FunctionTable, Interpreter};
