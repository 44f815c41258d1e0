//! Conditionals and loops.
//!
//! Every sibling group carries one [`Branch`] state.  `IF` (or an `IF=`
//! attribute) sets it, `ELSE-IF` / `ELIF=` continue the chain, and `ELSE`
//! closes it again.  Loop bodies and other child groups start from
//! [`Branch::Unset`].

use super::{is_control_attr, splice, Engine, Scope};
use crate::node::{Attr, Node};
use crate::script::{eval_expr, parse_expr, Expr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Branch {
    #[default]
    Unset,
    True,
    False,
}

/// One `TRUE="…"` / `FALSE="…"` test.
struct Test {
    expr: Expr,
    expected: bool,
}

impl Engine {
    /// Parse every `TRUE`/`FALSE` attribute of a node into tests.
    ///
    /// `None` means the condition cannot be used: nothing to test, or an
    /// expression that does not parse.
    fn conditions(&mut self, node: &Node, what: &str) -> Option<Vec<Test>> {
        let mut tests = Vec::new();
        let mut broken = false;
        for attr in &node.attrs {
            let expected = match condition_kind(attr) {
                Some(expected) => expected,
                None => {
                    if !is_control_attr(attr) {
                        self.warning(format!("{what}: unexpected attribute '{}'", attr.name));
                    }
                    continue;
                }
            };
            match self.parse_test(attr, expected, what) {
                Some(test) => tests.push(test),
                None => broken = true,
            }
        }
        if broken {
            return None;
        }
        if tests.is_empty() {
            self.warning(format!("{what}: no TRUE or FALSE condition"));
            return None;
        }
        Some(tests)
    }

    fn parse_test(&mut self, attr: &Attr, expected: bool, what: &str) -> Option<Test> {
        let Some(src) = attr.value.as_deref() else {
            self.warning(format!("{what}: {} needs an expression", attr.name));
            return None;
        };
        match parse_expr(src) {
            Ok(expr) => Some(Test { expr, expected }),
            Err(e) => {
                self.warning(format!("{what}: cannot parse {}=\"{src}\": {e}", attr.name));
                None
            }
        }
    }

    /// All tests hold, evaluated left to right until the first failure.
    fn holds(&mut self, tests: &[Test]) -> bool {
        tests
            .iter()
            .all(|t| eval_expr(&t.expr, self).as_bool() == t.expected)
    }

    // ── IF / ELSE-IF / ELSE ───────────────────────────────────────────────────

    pub(crate) fn exec_if(&mut self, node: &Node, scope: Scope, branch: &mut Branch, out: &mut Vec<Node>) {
        let taken = match self.conditions(node, "IF") {
            Some(tests) => self.holds(&tests),
            None => false,
        };
        if taken {
            *branch = Branch::True;
            let mut produced = Vec::new();
            self.run_group(&node.children, scope, &mut produced);
            splice(out, produced, node);
        } else {
            *branch = Branch::False;
        }
    }

    pub(crate) fn exec_else_if(
        &mut self,
        node: &Node,
        scope: Scope,
        branch: &mut Branch,
        out: &mut Vec<Node>,
    ) {
        match *branch {
            Branch::Unset => self.warning("ELSE-IF without a preceding IF"),
            Branch::True => {}
            Branch::False => self.exec_if(node, scope, branch, out),
        }
    }

    pub(crate) fn exec_else(&mut self, node: &Node, scope: Scope, branch: &mut Branch, out: &mut Vec<Node>) {
        for attr in node.attrs.iter().filter(|a| !is_control_attr(a)) {
            self.warning(format!("ELSE: unexpected attribute '{}'", attr.name));
        }
        match *branch {
            Branch::Unset => self.warning("ELSE without a preceding IF"),
            Branch::True => {}
            Branch::False => {
                let mut produced = Vec::new();
                self.run_group(&node.children, scope, &mut produced);
                splice(out, produced, node);
            }
        }
        *branch = Branch::Unset;
    }

    /// Attribute-level `IF=` / `ELIF=` / `ELSE` on any other tag.  Returns
    /// whether the node should run.
    pub(crate) fn attr_guard(&mut self, node: &Node, branch: &mut Branch) -> bool {
        if let Some(attr) = node.attr("IF") {
            let taken = self.eval_attr(attr, "IF=").is_some_and(|v| v.as_bool());
            *branch = if taken { Branch::True } else { Branch::False };
            return taken;
        }
        if let Some(attr) = node.attr("ELIF") {
            return match *branch {
                Branch::Unset => {
                    self.warning(format!("ELIF= on <{}> without a preceding IF", node.name));
                    false
                }
                Branch::True => false,
                Branch::False => {
                    let taken = self.eval_attr(attr, "ELIF=").is_some_and(|v| v.as_bool());
                    if taken {
                        *branch = Branch::True;
                    }
                    taken
                }
            };
        }
        if node.has_attr("ELSE") {
            let taken = match *branch {
                Branch::Unset => {
                    self.warning(format!("ELSE on <{}> without a preceding IF", node.name));
                    false
                }
                Branch::True => false,
                Branch::False => true,
            };
            *branch = Branch::Unset;
            return taken;
        }
        true
    }

    // ── FOR / WHILE ───────────────────────────────────────────────────────────

    pub(crate) fn exec_for(&mut self, node: &Node, scope: Scope, out: &mut Vec<Node>) {
        let mut setup: Option<&Attr> = None;
        let mut cond: Option<(&Attr, bool)> = None;
        let mut step: Option<&Attr> = None;

        for attr in &node.attrs {
            if is_control_attr(attr) {
                continue;
            }
            let slot = match (condition_kind(attr), cond.is_some()) {
                (Some(expected), false) => {
                    cond = Some((attr, expected));
                    continue;
                }
                (Some(_), true) => {
                    self.warning(format!("FOR: extra condition '{}' ignored", attr.name));
                    continue;
                }
                (None, false) => &mut setup,
                (None, true) => &mut step,
            };
            if slot.is_some() {
                self.warning(format!("FOR: extra assignment '{}' ignored", attr.name));
            } else {
                *slot = Some(attr);
            }
        }

        let Some((cond_attr, expected)) = cond else {
            self.error("FOR: missing TRUE or FALSE condition");
            return;
        };
        let Some(test) = self.parse_test(cond_attr, expected, "FOR") else {
            return;
        };
        let step = match step {
            Some(attr) => match self.assignment(attr, "FOR") {
                Some(assign) => Some(assign),
                None => return,
            },
            None => None,
        };

        if let Some(attr) = setup {
            if let Some((name, expr)) = self.assignment(attr, "FOR") {
                let v = eval_expr(&expr, self);
                self.env.set(name, v);
            }
        }

        let tests = [test];
        let mut produced = Vec::new();
        while self.holds(&tests) {
            self.run_group(&node.children, scope, &mut produced);
            if let Some((name, expr)) = &step {
                let v = eval_expr(expr, self);
                self.env.set(name.clone(), v);
            }
        }
        splice(out, produced, node);
    }

    pub(crate) fn exec_while(&mut self, node: &Node, scope: Scope, out: &mut Vec<Node>) {
        let Some(tests) = self.conditions(node, "WHILE") else {
            self.error("WHILE: no usable condition");
            return;
        };
        let mut produced = Vec::new();
        while self.holds(&tests) {
            self.run_group(&node.children, scope, &mut produced);
        }
        splice(out, produced, node);
    }

    fn assignment(&mut self, attr: &Attr, what: &str) -> Option<(String, Expr)> {
        let Some(src) = attr.value.as_deref().filter(|s| !s.is_empty()) else {
            self.warning(format!("{what}: assignment '{}' has no value", attr.name));
            return None;
        };
        match parse_expr(src) {
            Ok(expr) => Some((attr.name.clone(), expr)),
            Err(e) => {
                self.warning(format!("{what}: cannot parse {}=\"{src}\": {e}", attr.name));
                None
            }
        }
    }
}

fn condition_kind(attr: &Attr) -> Option<bool> {
    if attr.is("TRUE") {
        Some(true)
    } else if attr.is("FALSE") {
        Some(false)
    } else {
        None
    }
}
