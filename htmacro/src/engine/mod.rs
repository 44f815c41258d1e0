//! The macro expansion engine.
//!
//! [`Engine`] walks a source node tree depth-first, interprets directive
//! tags and attributes, and appends the produced nodes to a destination
//! list.  It owns the single variable [`Environment`], the
//! [`MacroCatalog`], and the list of [`Diagnostic`]s for the run.  It
//! implements [`EvalContext`] so the expression evaluator can read variables
//! and report warnings.
//!
//! Failures never abort a run: a warning continues with a default value, an
//! error drops the output of the directive that raised it.

mod control;
mod include;
mod invoke;
mod shell;

use std::path::Path;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::diag::{Diagnostic, Severity};
use crate::error::{IncludeError, MarkupError};
use crate::macros::{extract_macros, Macro, MacroCatalog};
use crate::markup;
use crate::node::{Attr, Node, NodeKind};
use crate::script::{eval_expr, interpolate, parse_expr, EvalContext, Value};
use crate::var::Environment;

pub(crate) use control::Branch;

// ── Command ───────────────────────────────────────────────────────────────────

/// Directive tags understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Macro,
    Call,
    If,
    ElseIf,
    Else,
    For,
    While,
    Set,
    Include,
    Shell,
    Info,
    Warn,
    Error,
}

impl Command {
    /// Look up a tag name, ASCII case-insensitively.
    pub fn from_name(name: &str) -> Option<Command> {
        const TABLE: &[(&str, Command)] = &[
            ("MACRO", Command::Macro),
            ("CALL", Command::Call),
            ("IF", Command::If),
            ("ELSE-IF", Command::ElseIf),
            ("ELSE", Command::Else),
            ("FOR", Command::For),
            ("WHILE", Command::While),
            ("SET", Command::Set),
            ("INCLUDE", Command::Include),
            ("SHELL", Command::Shell),
            ("INFO", Command::Info),
            ("WARN", Command::Warn),
            ("ERROR", Command::Error),
        ];
        TABLE
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, c)| c)
    }
}

/// Attributes that steer execution instead of passing data.
pub(crate) fn is_control_attr(attr: &Attr) -> bool {
    attr.is("IF") || attr.is("ELIF") || attr.is("ELSE") || attr.is("INTERPOLATE")
}

// ── Scope ─────────────────────────────────────────────────────────────────────

/// Execution settings inherited from parent to child.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope {
    pub interpolate: bool,
}

// ── Engine ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Engine {
    pub env: Environment,
    pub catalog: MacroCatalog,
    pub config: EngineConfig,
    /// Every warning, error and info message of the run, in order.
    pub diagnostics: Vec<Diagnostic>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            config,
            ..Self::default()
        }
    }

    // ── Public entry points ───────────────────────────────────────────────────

    /// Register the top-level macro definitions of a freshly parsed document
    /// and return the remaining nodes.
    pub fn load_document(&mut self, nodes: Vec<Node>) -> Vec<Node> {
        let (rest, defs) = extract_macros(nodes);
        for def in defs {
            self.define_macro(def);
        }
        rest
    }

    /// Run a sibling group and return the produced nodes.
    pub fn run(&mut self, nodes: &[Node]) -> Vec<Node> {
        let mut out = Vec::new();
        let scope = Scope {
            interpolate: self.config.interpolate,
        };
        self.run_group(nodes, scope, &mut out);
        out
    }

    /// Parse, load and run a markup string.
    pub fn process_str(&mut self, src: &str) -> Result<Vec<Node>, MarkupError> {
        let nodes = markup::parse(src)?;
        let nodes = self.load_document(nodes);
        Ok(self.run(&nodes))
    }

    /// Parse, load and run a markup file.
    pub fn process_file(&mut self, path: &Path) -> Result<Vec<Node>, IncludeError> {
        let src = std::fs::read_to_string(path).map_err(|source| IncludeError::Read {
            path: path.to_owned(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "processing document");
        self.process_str(&src).map_err(|source| IncludeError::Markup {
            path: path.to_owned(),
            source,
        })
    }

    /// Process a markup string and serialize the result.
    pub fn render_str(&mut self, src: &str) -> Result<String, MarkupError> {
        let out = self.process_str(src)?;
        Ok(markup::write(&out))
    }

    /// Drain the diagnostics recorded so far.
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    // ── Diagnostics ───────────────────────────────────────────────────────────

    pub(crate) fn report(&mut self, severity: Severity, message: impl Into<String>) {
        let diag = Diagnostic::new(severity, message);
        diag.emit();
        self.diagnostics.push(diag);
    }

    pub(crate) fn warning(&mut self, message: impl Into<String>) {
        self.report(Severity::Warning, message);
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.report(Severity::Error, message);
    }

    // ── Expression helpers ────────────────────────────────────────────────────

    /// Parse and evaluate an attribute's value as an expression.
    ///
    /// Returns `None` (after a warning) when the attribute has no value or
    /// the value does not parse.
    pub(crate) fn eval_attr(&mut self, attr: &Attr, what: &str) -> Option<Value> {
        let Some(src) = attr.value.as_deref() else {
            self.warning(format!("{what}: attribute '{}' needs a value", attr.name));
            return None;
        };
        match parse_expr(src) {
            Ok(expr) => Some(eval_expr(&expr, self)),
            Err(e) => {
                self.warning(format!("{what}: cannot parse {}=\"{src}\": {e}", attr.name));
                None
            }
        }
    }

    /// Interpolate `text` when the scope allows it.
    pub(crate) fn expand_text(&mut self, text: &str, scope: Scope) -> String {
        if scope.interpolate {
            interpolate(text, self)
        } else {
            text.to_owned()
        }
    }

    // ── Tree walk ─────────────────────────────────────────────────────────────

    /// Run a sibling group with a fresh branch state.
    pub(crate) fn run_group(&mut self, nodes: &[Node], scope: Scope, out: &mut Vec<Node>) {
        let mut branch = Branch::Unset;
        for node in nodes {
            self.exec_node(node, scope, &mut branch, out);
        }
    }

    fn exec_node(&mut self, node: &Node, scope: Scope, branch: &mut Branch, out: &mut Vec<Node>) {
        match node.kind {
            NodeKind::Text => {
                let mut text = node.clone();
                text.name = self.expand_text(&node.name, scope);
                out.push(text);
            }
            NodeKind::Comment | NodeKind::Directive => out.push(node.clone()),
            NodeKind::Tag => self.exec_tag(node, scope, branch, out),
        }
    }

    fn exec_tag(&mut self, node: &Node, scope: Scope, branch: &mut Branch, out: &mut Vec<Node>) {
        let command = Command::from_name(&node.name);

        if let Some(Command::If | Command::ElseIf | Command::Else) = command {
            let scope = self.scope_for(node, scope);
            return match command {
                Some(Command::If) => self.exec_if(node, scope, branch, out),
                Some(Command::ElseIf) => self.exec_else_if(node, scope, branch, out),
                _ => self.exec_else(node, scope, branch, out),
            };
        }

        // A skipped node never evaluates its INTERPOLATE.
        if !self.attr_guard(node, branch) {
            return;
        }
        let scope = self.scope_for(node, scope);

        match command {
            Some(Command::Macro) => self.exec_macro_def(node),
            Some(Command::Call) => self.exec_call(node, scope, out),
            Some(Command::For) => self.exec_for(node, scope, out),
            Some(Command::While) => self.exec_while(node, scope, out),
            Some(Command::Set) => self.exec_set(node),
            Some(Command::Include) => self.exec_include(node, scope, out),
            Some(Command::Shell) => self.exec_shell(node, scope, out),
            Some(Command::Info) => self.exec_log(node, scope, Severity::Info),
            Some(Command::Warn) => self.exec_log(node, scope, Severity::Warning),
            Some(Command::Error) => self.exec_log(node, scope, Severity::Error),
            Some(Command::If | Command::ElseIf | Command::Else) => {}
            None => match self.catalog.get(&node.name) {
                Some(mac) => self.exec_element_macro(node, mac, scope, out),
                None => self.exec_element(node, scope, out),
            },
        }
    }

    /// Apply an `INTERPOLATE="expr"` override.
    fn scope_for(&mut self, node: &Node, scope: Scope) -> Scope {
        match node.attr("INTERPOLATE") {
            Some(attr) => match self.eval_attr(attr, "INTERPOLATE") {
                Some(v) => Scope {
                    interpolate: v.as_bool(),
                },
                None => scope,
            },
            None => scope,
        }
    }

    /// Emit an ordinary element: attribute macros and `CALL=` become leading
    /// children, other attributes are interpolated, children are run.
    fn exec_element(&mut self, node: &Node, scope: Scope, out: &mut Vec<Node>) {
        let mut elem = Node {
            kind: node.kind,
            name: node.name.clone(),
            attrs: Vec::with_capacity(node.attrs.len()),
            children: Vec::new(),
            space_before: node.space_before,
            space_after: node.space_after,
            self_closing: node.self_closing,
        };

        for attr in &node.attrs {
            if is_control_attr(attr) {
                continue;
            }
            if attr.is("CALL") {
                let Some(name) = self.eval_attr(attr, "CALL") else { continue };
                let name = name.as_str();
                match self.catalog.get(&name) {
                    Some(mac) => self.invoke(&mac.params, &mac.body, &[], Vec::new(), scope, &mut elem.children),
                    None => self.error(format!("CALL: macro '{name}' not found")),
                }
                continue;
            }
            if let Some(mac) = self.catalog.get(&attr.name) {
                let extra = match attr.value.as_deref() {
                    Some(v) => vec![("VALUE".to_owned(), Some(Value::Str(self.expand_text(v, scope))))],
                    None => Vec::new(),
                };
                self.invoke(&mac.params, &mac.body, &[], extra, scope, &mut elem.children);
                continue;
            }

            let mut attr = attr.clone();
            if attr.has_brace {
                if let Some(v) = attr.value.as_deref() {
                    let expanded = self.expand_text(v, scope);
                    attr.set_value(expanded);
                }
            }
            elem.attrs.push(attr);
        }

        self.run_group(&node.children, scope, &mut elem.children);
        out.push(elem);
    }

    // ── Simple directives ─────────────────────────────────────────────────────

    fn define_macro(&mut self, node: Node) {
        match Macro::from_node(node) {
            Ok((mac, warnings)) => {
                for w in warnings {
                    self.warning(w);
                }
                tracing::debug!(name = %mac.name, params = mac.params.len(), "macro registered");
                let name = mac.name.clone();
                if self.catalog.define(mac).is_some() {
                    self.warning(format!("MACRO: '{name}' redefined"));
                }
            }
            Err(e) => self.error(e),
        }
    }

    fn exec_macro_def(&mut self, node: &Node) {
        let mut def = node.clone();
        def.attrs.retain(|a| !is_control_attr(a));
        self.define_macro(def);
    }

    fn exec_set(&mut self, node: &Node) {
        for attr in &node.attrs {
            if is_control_attr(attr) {
                continue;
            }
            if attr.value.as_deref().map_or(true, str::is_empty) {
                self.warning(format!("SET: attribute '{}' has no value", attr.name));
                continue;
            }
            if let Some(v) = self.eval_attr(attr, "SET") {
                self.env.set(attr.name.clone(), v);
            }
        }
    }

    fn exec_log(&mut self, node: &Node, scope: Scope, severity: Severity) {
        let what = node.name.to_ascii_uppercase();
        for attr in node.attrs.iter().filter(|a| !is_control_attr(a)) {
            self.warning(format!("{what}: unexpected attribute '{}'", attr.name));
        }
        let message = match (node.children.is_empty(), node.single_text()) {
            (true, _) => String::new(),
            (false, Some(text)) => self.expand_text(text.trim(), scope),
            (false, None) => {
                self.error(format!("{what}: content must be plain text"));
                return;
            }
        };
        self.report(severity, message);
    }
}

/// Append `produced` to `out`, moving the directive's adjacency flags onto
/// the first and last spliced nodes.
pub(crate) fn splice(out: &mut Vec<Node>, mut produced: Vec<Node>, from: &Node) {
    if let Some(first) = produced.first_mut() {
        first.space_before |= from.space_before;
    }
    if let Some(last) = produced.last_mut() {
        last.space_after |= from.space_after;
    }
    out.append(&mut produced);
}

// ── EvalContext impl ──────────────────────────────────────────────────────────

impl EvalContext for Engine {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.env.get(name).cloned()
    }

    fn has_var(&self, name: &str) -> bool {
        self.env.contains(name)
    }

    fn warn(&mut self, message: String) {
        self.warning(message);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
