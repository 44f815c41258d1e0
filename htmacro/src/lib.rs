//! htmacro: a tag-based macro processor for static pages.
//!
//! A document is read into a [`node::Node`] tree, its directives
//! (`MACRO`, `IF`, `FOR`, `INCLUDE`, …) are executed by the [`Engine`], and
//! the resulting tree is written back out as HTML.

pub mod cli;
pub mod config;
pub mod diag;
pub mod engine;
pub mod error;
pub mod macros;
pub mod markup;
pub mod node;
pub mod script;
pub mod var;

pub use config::EngineConfig;
pub use diag::{Diagnostic, Severity};
pub use engine::Engine;
pub use script::Value;
