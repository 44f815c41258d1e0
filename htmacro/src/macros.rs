//! Macro definitions and the macro catalog.
//!
//! ## Definitions
//!
//! A `<MACRO NAME="x" …>` element declares a macro.  `NAME` is a literal
//! and is spelled exactly so; every other attribute (a lowercase `name`
//! included) declares a parameter, in order:
//!
//! * `name="expr"`: default expression, evaluated in the caller's
//!   environment at call time;
//! * bare `name`: inherits the caller's value of the same name.
//!
//! The element's children become the macro body, moved out of the document.
//!
//! ## Catalog
//!
//! [`MacroCatalog`] maps names to shared [`Macro`]s and caches parsed source
//! documents by canonical path.  Both are populated lazily and never
//! invalidated within a run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::node::Node;
use crate::script::{parse_expr, Expr};

// ── Macro ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ParamDefault {
    Expr(Expr),
    Inherit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub default: ParamDefault,
}

/// A named, parameterised body.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Node>,
}

impl Macro {
    /// Build a macro from a `MACRO` element, consuming it.
    ///
    /// Returns the macro plus warnings for parameters that had to be
    /// dropped.  Fails when `NAME` is missing or empty.
    pub fn from_node(node: Node) -> Result<(Macro, Vec<String>), String> {
        let mut name = None;
        let mut params: Vec<Param> = Vec::new();
        let mut warnings = Vec::new();

        for attr in node.attrs {
            if attr.name == "NAME" {
                if name.is_some() {
                    warnings.push("MACRO: duplicate NAME attribute ignored".to_owned());
                    continue;
                }
                name = attr.value.filter(|v| !v.is_empty());
                if name.is_none() {
                    return Err("MACRO: NAME must not be empty".into());
                }
                continue;
            }
            if params.iter().any(|p| p.name == attr.name) {
                warnings.push(format!("MACRO: duplicate parameter '{}' ignored", attr.name));
                continue;
            }
            let default = match attr.value.as_deref() {
                None => ParamDefault::Inherit,
                Some(src) => match parse_expr(src) {
                    Ok(expr) => ParamDefault::Expr(expr),
                    Err(e) => {
                        warnings.push(format!(
                            "MACRO: default for parameter '{}' ignored: {e}",
                            attr.name
                        ));
                        continue;
                    }
                },
            };
            params.push(Param {
                name: attr.name,
                default,
            });
        }

        let name = name.ok_or_else(|| "MACRO: missing NAME attribute".to_owned())?;
        Ok((
            Macro {
                name,
                params,
                body: node.children,
            },
            warnings,
        ))
    }
}

// ── Document ──────────────────────────────────────────────────────────────────

/// A parsed source whose top-level macro definitions have been moved into
/// the catalog.
#[derive(Debug, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
}

/// Split top-level `MACRO` elements out of `nodes`.
///
/// Returns the remaining nodes and the definitions, both in document order.
pub fn extract_macros(nodes: Vec<Node>) -> (Vec<Node>, Vec<Node>) {
    nodes.into_iter().partition(|n| !n.is_named("MACRO"))
}

// ── MacroCatalog ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MacroCatalog {
    macros: HashMap<String, Rc<Macro>>,
    documents: HashMap<PathBuf, Rc<Document>>,
}

impl MacroCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a macro, returning the definition it replaced.
    pub fn define(&mut self, mac: Macro) -> Option<Rc<Macro>> {
        self.macros.insert(mac.name.clone(), Rc::new(mac))
    }

    pub fn get(&self, name: &str) -> Option<Rc<Macro>> {
        self.macros.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    // ── Document cache ────────────────────────────────────────────────────────

    pub fn document(&self, canonical: &Path) -> Option<Rc<Document>> {
        self.documents.get(canonical).cloned()
    }

    pub fn cache_document(&mut self, canonical: PathBuf, doc: Document) -> Rc<Document> {
        let doc = Rc::new(doc);
        self.documents.insert(canonical, Rc::clone(&doc));
        doc
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
