//! `INCLUDE`: splicing other files into the output.
//!
//! HTML sources are parsed once per canonical path and cached in the
//! catalog; their macros are registered on first load and the remaining
//! nodes run like a macro body.  Every other source is spliced as raw text,
//! with CSS and JavaScript wrapped in `<style>` / `<script>` unless
//! `NO-WRAP` is given.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{is_control_attr, splice, Engine, Scope};
use crate::error::IncludeError;
use crate::macros::Document;
use crate::markup;
use crate::node::{Attr, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Html,
    Text,
    Css,
    Js,
}

impl SourceKind {
    /// Kind named by an `SRC-…` attribute suffix.
    pub fn from_suffix(suffix: &str) -> Option<SourceKind> {
        match suffix.to_ascii_uppercase().as_str() {
            "HTML" => Some(SourceKind::Html),
            "TXT" => Some(SourceKind::Text),
            "CSS" => Some(SourceKind::Css),
            "JS" => Some(SourceKind::Js),
            _ => None,
        }
    }

    /// Kind inferred from a file extension.
    pub fn from_path(path: &Path) -> SourceKind {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm") => {
                SourceKind::Html
            }
            _ => SourceKind::Text,
        }
    }
}

impl Engine {
    /// Resolve an include path: the working directory first, then each
    /// include directory, else the path as given.
    pub fn resolve_include(&self, rel: &str) -> PathBuf {
        let rel = Path::new(rel);
        std::iter::once(&self.config.cwd)
            .chain(self.config.include_paths.iter())
            .map(|dir| dir.join(rel))
            .find(|p| p.is_file())
            .unwrap_or_else(|| rel.to_path_buf())
    }

    /// Load an HTML source through the document cache.
    fn load_cached(&mut self, path: &Path) -> Result<Rc<Document>, IncludeError> {
        let read_err = |source| IncludeError::Read {
            path: path.to_owned(),
            source,
        };
        let canonical = std::fs::canonicalize(path).map_err(read_err)?;
        if let Some(doc) = self.catalog.document(&canonical) {
            return Ok(doc);
        }

        let src = std::fs::read_to_string(&canonical).map_err(read_err)?;
        let nodes = markup::parse(&src).map_err(|source| IncludeError::Markup {
            path: canonical.clone(),
            source,
        })?;
        let nodes = self.load_document(nodes);
        tracing::debug!(path = %canonical.display(), nodes = nodes.len(), "include loaded");
        Ok(self.catalog.cache_document(canonical, Document { nodes }))
    }

    pub(crate) fn exec_include(&mut self, node: &Node, scope: Scope, out: &mut Vec<Node>) {
        let mut src: Option<(&Attr, Option<SourceKind>)> = None;
        let mut header = false;
        let mut no_wrap = false;
        let mut args: Vec<&Attr> = Vec::new();

        for attr in &node.attrs {
            if is_control_attr(attr) {
                continue;
            }
            let upper = attr.name.to_ascii_uppercase();
            if upper == "SRC" || upper.starts_with("SRC-") {
                let kind = match upper.strip_prefix("SRC-") {
                    None => None,
                    Some(suffix) => match SourceKind::from_suffix(suffix) {
                        Some(kind) => Some(kind),
                        None => {
                            let e = IncludeError::UnknownSuffix(suffix.to_owned());
                            self.error(format!("INCLUDE: {e}"));
                            return;
                        }
                    },
                };
                if src.is_some() {
                    self.warning(format!("INCLUDE: duplicate source '{}' ignored", attr.name));
                    continue;
                }
                src = Some((attr, kind));
            } else if upper == "HEADER" {
                header = true;
            } else if upper == "NO-WRAP" {
                no_wrap = true;
            } else {
                args.push(attr);
            }
        }

        let Some((src_attr, kind)) = src else {
            self.error("INCLUDE: missing SRC attribute");
            return;
        };
        let Some(raw) = src_attr.value.as_deref().filter(|v| !v.is_empty()) else {
            self.error(format!("INCLUDE: {} must not be empty", src_attr.name));
            return;
        };
        let rel = self.expand_text(raw, scope);
        let path = self.resolve_include(&rel);
        let kind = kind.unwrap_or_else(|| SourceKind::from_path(&path));
        tracing::debug!(path = %path.display(), ?kind, "include resolved");

        if kind == SourceKind::Html {
            let doc = match self.load_cached(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    self.error(format!("INCLUDE: {e}"));
                    return;
                }
            };
            if header {
                return;
            }
            let mut produced = Vec::new();
            self.invoke(&[], &doc.nodes, &args, Vec::new(), scope, &mut produced);
            splice(out, produced, node);
            return;
        }

        if header {
            self.warning(format!("INCLUDE: HEADER ignored for non-HTML source '{rel}'"));
        }
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) => {
                let e = IncludeError::Read { path, source };
                self.error(format!("INCLUDE: {e}"));
                return;
            }
        };
        let produced = match (kind, no_wrap) {
            (SourceKind::Css, false) => vec![Node::tag("style").with_child(Node::text(text))],
            (SourceKind::Js, false) => vec![Node::tag("script").with_child(Node::text(text))],
            _ => vec![Node::text(text)],
        };
        splice(out, produced, node);
    }
}
