//! Expression language.
//!
//! - [`Value`]: integer / float / string scalars and their coercions
//! - [`expr`]: lexer, three-pass precedence parser and evaluator
//! - [`builtins`]: the closed set of built-in functions
//! - [`expand`]: `{expr}` interpolation in text
//!
//! # Quick start
//!
//! ```rust
//! use htmacro::script::{eval_str, EvalContext, Value};
//!
//! struct Empty;
//! impl EvalContext for Empty {
//!     fn get_var(&self, _: &str) -> Option<Value> { None }
//!     fn warn(&mut self, _: String) {}
//! }
//!
//! let v = eval_str("int('7.234') + 2 * 3", &mut Empty).unwrap();
//! assert_eq!(v, Value::Int(13));
//! ```

pub mod builtins;
pub mod expand;
pub mod expr;
pub mod value;

// Re-exports for convenience.
pub use builtins::{Builtin, Function};
pub use expand::interpolate;
pub use expr::{eval_expr, eval_str, parse_expr, EvalContext, Expr, ParseError, ParseErrorKind};
pub use value::Value;
