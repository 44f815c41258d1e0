//! The macro call protocol.
//!
//! 1. Call-site arguments are evaluated in the caller's environment and
//!    staged.
//! 2. Parameters that were not passed are staged from their default
//!    expression, or from the caller's value of the same name.
//! 3. The staged bindings are applied, recording undo records.
//! 4. The body runs as a fresh sibling group.
//! 5. The undo records are replayed in reverse.
//!
//! Nothing is written to the environment until every argument and default
//! has been evaluated.

use std::rc::Rc;

use super::{is_control_attr, splice, Engine, Scope};
use crate::macros::{Macro, Param, ParamDefault};
use crate::markup;
use crate::node::{Attr, Node};
use crate::script::{eval_expr, parse_expr, Value};

type Staged = Vec<(String, Option<Value>)>;

impl Engine {
    /// Run `body` with `args` and `extra` bound, appending its output to `out`.
    pub(crate) fn invoke(
        &mut self,
        params: &[Param],
        body: &[Node],
        args: &[&Attr],
        extra: Staged,
        scope: Scope,
        out: &mut Vec<Node>,
    ) {
        let mut staged = extra;

        for attr in args {
            if is_control_attr(attr) {
                continue;
            }
            if staged.iter().any(|(n, _)| n == &attr.name) {
                self.warning(format!("duplicate argument '{}' ignored", attr.name));
                continue;
            }
            match attr.value.as_deref() {
                None => {
                    if let Some(v) = self.env.get(&attr.name) {
                        staged.push((attr.name.clone(), Some(v.clone())));
                    }
                }
                Some(src) => match parse_expr(src) {
                    Ok(expr) => {
                        let v = eval_expr(&expr, self);
                        staged.push((attr.name.clone(), Some(v)));
                    }
                    Err(e) => self.warning(format!(
                        "cannot parse argument {}=\"{src}\": {e}",
                        attr.name
                    )),
                },
            }
        }

        for param in params {
            if staged.iter().any(|(n, _)| n == &param.name) {
                continue;
            }
            let value = match &param.default {
                ParamDefault::Expr(expr) => Some(eval_expr(expr, self)),
                ParamDefault::Inherit => self.env.get(&param.name).cloned(),
            };
            staged.push((param.name.clone(), value));
        }

        let undo = self.env.bind(staged);
        self.run_group(body, scope, out);
        self.env.restore(undo);
    }

    /// `<CALL NAME="expr" …>`.  Only the exact spelling `NAME` is the
    /// keyword; `name` is passed through as an ordinary argument.
    pub(crate) fn exec_call(&mut self, node: &Node, scope: Scope, out: &mut Vec<Node>) {
        let Some(name_attr) = node.attrs.iter().find(|a| a.name == "NAME") else {
            self.error("CALL: missing NAME attribute");
            return;
        };
        if name_attr.value.as_deref().map_or(true, str::is_empty) {
            self.error("CALL: NAME must not be empty");
            return;
        }
        let Some(name) = self.eval_attr(name_attr, "CALL") else {
            return;
        };
        let name = name.as_str();
        let Some(mac) = self.catalog.get(&name) else {
            self.error(format!("CALL: macro '{name}' not found"));
            return;
        };
        let args: Vec<&Attr> = node
            .attrs
            .iter()
            .filter(|a| !std::ptr::eq(*a, name_attr))
            .collect();
        let mut produced = Vec::new();
        self.invoke(&mac.params, &mac.body, &args, Vec::new(), scope, &mut produced);
        splice(out, produced, node);
    }

    /// A tag named after a macro.  Its expanded children are passed as
    /// `CONTENT` unless the caller supplies that argument.
    pub(crate) fn exec_element_macro(
        &mut self,
        node: &Node,
        mac: Rc<Macro>,
        scope: Scope,
        out: &mut Vec<Node>,
    ) {
        let mut extra = Vec::new();
        if !node.children.is_empty() && !node.attrs.iter().any(|a| a.name == "CONTENT") {
            let mut content = Vec::new();
            self.run_group(&node.children, scope, &mut content);
            extra.push(("CONTENT".to_owned(), Some(Value::Str(markup::write(&content)))));
        }
        let args: Vec<&Attr> = node.attrs.iter().collect();
        let mut produced = Vec::new();
        self.invoke(&mac.params, &mac.body, &args, extra, scope, &mut produced);
        splice(out, produced, node);
    }
}

#[cfg(test)]
mod tests {
    use crate::diag::Severity;
    use crate::engine::Engine;
    use crate::script::Value;

    fn run(src: &str) -> (String, Engine) {
        let mut engine = Engine::new();
        let out = engine.render_str(src).expect("markup failed");
        (out, engine)
    }

    fn output(src: &str) -> String {
        run(src).0
    }

    #[test]
    fn call_by_name_expression() {
        let src = "<MACRO NAME=hi>hi</MACRO><SET which=\"'hi'\"><CALL NAME=which>";
        assert_eq!(output(src), "hi");
    }

    #[test]
    fn call_unknown_macro_is_error() {
        let (out, engine) = run("<CALL NAME=\"'ghost'\">");
        assert_eq!(out, "");
        assert!(engine.has_errors());
        assert!(engine.diagnostics[0].message.contains("ghost"));
    }

    #[test]
    fn call_missing_or_empty_name_is_error() {
        let (_, engine) = run("<CALL>");
        assert_eq!(engine.diagnostics[0].severity, Severity::Error);
        let (_, engine) = run("<CALL NAME=''>");
        assert_eq!(engine.diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn bare_parameter_scope_is_restored() {
        let src = "<SET x=10><MACRO NAME=m x>[{x}]</MACRO><CALL NAME=\"'m'\" x=12></CALL>{x}";
        let (out, engine) = run(src);
        assert_eq!(out, "[12]10");
        assert_eq!(engine.env.get("x"), Some(&Value::Int(10)));
    }

    #[test]
    fn bare_parameter_mutated_in_body_is_restored() {
        let src = "<SET x=10><MACRO NAME=m x><SET x='x+2'>{x}</MACRO><m/>|{x}";
        let (out, engine) = run(src);
        assert_eq!(out, "12|10");
        assert_eq!(engine.env.get("x"), Some(&Value::Int(10)));
        assert!(engine.diagnostics.is_empty());
    }

    #[test]
    fn name_is_an_ordinary_argument() {
        let src = "<MACRO NAME=person name>[{name}]</MACRO><person name=\"'Bob'\"/>";
        let (out, engine) = run(src);
        assert_eq!(out, "[Bob]");
        assert!(engine.diagnostics.is_empty(), "{:?}", engine.diagnostics);

        assert_eq!(output("<MACRO NAME=m>{defined(NAME)}</MACRO><m NAME=1/>"), "1");
        let src = "<MACRO NAME=greet name>hi {name}</MACRO><CALL NAME=\"'greet'\" name=\"'Ann'\"></CALL>";
        assert_eq!(output(src), "hi Ann");
    }

    #[test]
    fn call_keyword_is_not_passed_as_argument() {
        let src = "<MACRO NAME=m>{defined(NAME)}</MACRO><CALL NAME=\"'m'\"></CALL>";
        assert_eq!(output(src), "0");
    }

    #[test]
    fn bare_parameter_inherits_caller_value() {
        let src = "<SET x=7><MACRO NAME=m x>{x}</MACRO><m/>";
        assert_eq!(output(src), "7");
    }

    #[test]
    fn default_parameter_ignores_caller() {
        let src = "<SET x=1><MACRO NAME=m x='100'>{x}</MACRO><m/>{x}";
        assert_eq!(output(src), "1001");
    }

    #[test]
    fn unbound_parameter_is_undefined_in_body() {
        let src = "<MACRO NAME=m y>{defined(y)}</MACRO><m/><SET y=1><m/>";
        assert_eq!(output(src), "01");
    }

    #[test]
    fn arguments_see_caller_environment_only() {
        // `b` is evaluated before `a` is bound, so it sees the global `a`.
        let src = "<SET a=1><MACRO NAME=m a b>{a},{b}</MACRO><CALL NAME=\"'m'\" a=5 b='a + 1'>";
        assert_eq!(output(src), "5,2");
    }

    #[test]
    fn valueless_argument_copies_global() {
        let src = "<SET t=\"'T'\"><MACRO NAME=m>{t}</MACRO><CALL NAME=\"'m'\" t>";
        assert_eq!(output(src), "T");
    }

    #[test]
    fn duplicate_and_bad_arguments_warn() {
        let (out, engine) = run("<MACRO NAME=m a>{a}</MACRO><CALL NAME=\"'m'\" a=1 a=2 b='('>");
        assert_eq!(out, "1");
        assert_eq!(engine.diagnostics.len(), 2);
    }

    #[test]
    fn recursion_through_calls() {
        let src = "<MACRO NAME=down n><IF TRUE='n > 0'>{n}<CALL NAME=\"'down'\" n='n - 1'></IF></MACRO>\
                   <down n=3/>";
        assert_eq!(output(src), "321");
    }

    #[test]
    fn explicit_content_wins() {
        let src = "<MACRO NAME=w>{CONTENT}</MACRO><w CONTENT=\"'given'\">ignored</w>";
        assert_eq!(output(src), "given");
    }

    #[test]
    fn content_is_matched_case_sensitively() {
        let src = "<MACRO NAME=w>{CONTENT}|{content}</MACRO><w content=\"'x'\"><b>kids</b></w>";
        let (out, engine) = run(src);
        assert_eq!(out, "<b>kids</b>|x");
        assert!(engine.diagnostics.is_empty(), "{:?}", engine.diagnostics);
    }

    #[test]
    fn call_output_takes_adjacency_flags() {
        let src = "<MACRO NAME=m><b>x</b></MACRO><p>a <m/> c</p>";
        assert_eq!(output(src), "<p>a\n<b>x</b>\nc</p>");
    }
}
