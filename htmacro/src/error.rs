//! Error types shared across the crate.
//!
//! Inside the engine none of these escape: each is turned into a
//! [`Diagnostic`](crate::diag::Diagnostic) and the run carries on.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub use crate::script::expr::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupErrorKind {
    #[error("unterminated comment")]
    UnterminatedComment,
    #[error("unterminated declaration")]
    UnterminatedDeclaration,
    #[error("unterminated tag <{0}>")]
    UnterminatedTag(String),
    #[error("unterminated quoted value for attribute '{0}'")]
    UnterminatedValue(String),
    #[error("unterminated <{0}> content")]
    UnterminatedRawText(String),
}

/// Failure to read a markup document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind}")]
pub struct MarkupError {
    pub line: usize,
    pub kind: MarkupErrorKind,
}

/// Failure to resolve or read an `INCLUDE` target.
#[derive(Debug, Error)]
pub enum IncludeError {
    #[error("unknown include attribute suffix '{0}'")]
    UnknownSuffix(String),

    #[error("cannot read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("in '{}': {source}", .path.display())]
    Markup {
        path: PathBuf,
        #[source]
        source: MarkupError,
    },
}
