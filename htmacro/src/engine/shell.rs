//! `SHELL`: run a command with `sh -c` and capture its output.

use std::process::{Command, Stdio};

use super::{splice, Engine, Scope};
use crate::node::Node;
use crate::script::Value;

/// Where a command's stdout goes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Capture {
    Discard,
    Text,
    Var(String),
}

impl Engine {
    pub(crate) fn exec_shell(&mut self, node: &Node, scope: Scope, out: &mut Vec<Node>) {
        let capture = match node.attr("STDOUT") {
            None => Capture::Discard,
            Some(attr) => match attr.value.as_deref() {
                None => Capture::Text,
                Some(v) if v.eq_ignore_ascii_case("VOID") => Capture::Discard,
                Some(v) if v.eq_ignore_ascii_case("TEXT") => Capture::Text,
                Some(v) if v.eq_ignore_ascii_case("HTML") => {
                    self.error("SHELL: STDOUT=HTML is not implemented");
                    return;
                }
                Some(v) => Capture::Var(v.to_owned()),
            },
        };

        if node.children.is_empty() {
            self.warning("SHELL: no command given");
            return;
        }
        let Some(text) = node.single_text() else {
            self.error("SHELL: command must be plain text");
            return;
        };
        let script = self.expand_text(text.trim(), scope);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&script)
            .current_dir(&self.config.cwd)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit());

        match node.attr("VARS").map(|a| a.value.as_deref()) {
            Some(Some(vars)) => {
                for name in vars.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    match self.env.get(name) {
                        Some(v) => {
                            cmd.env(name, v.to_string());
                        }
                        None => self.warning(format!("SHELL: VARS names undefined variable '{name}'")),
                    }
                }
            }
            Some(None) => self.warning("SHELL: VARS needs a comma-separated list of names"),
            None => {}
        }

        tracing::debug!(command = %script, "running shell command");
        let output = match cmd.output() {
            Ok(output) => output,
            Err(e) => {
                self.error(format!("SHELL: cannot run '{script}': {e}"));
                return;
            }
        };
        if !output.status.success() {
            let code = output
                .status
                .code()
                .map_or_else(|| "a signal".to_owned(), |c| c.to_string());
            self.warning(format!("SHELL: '{script}' exited with {code}"));
        }

        let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.ends_with('\n') {
            stdout.pop();
        }
        match capture {
            Capture::Discard => {}
            Capture::Text => splice(out, vec![Node::text(stdout)], node),
            Capture::Var(name) => self.env.set(name, Value::Str(stdout)),
        }
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

    #[test]
    fn stdout_as_text() {
        let (out, engine) = run("<SHELL STDOUT>echo hello</SHELL>");
        assert_eq!(out, "hello");
        assert!(engine.diagnostics.is_empty());
        assert_eq!(run("<SHELL STDOUT=TEXT>printf 'a\\n\\n'</SHELL>").0, "a\n");
    }

    #[test]
    fn stdout_discarded_by_default() {
        assert_eq!(run("<SHELL>echo hidden</SHELL>").0, "");
        assert_eq!(run("<SHELL STDOUT=VOID>echo hidden</SHELL>").0, "");
    }

    #[test]
    fn stdout_into_variable() {
        let (out, engine) = run("<SHELL STDOUT=today>echo 2024</SHELL>{today}");
        assert_eq!(out, "2024");
        assert_eq!(engine.env.get("today"), Some(&Value::Str("2024".into())));
    }

    #[test]
    fn command_is_interpolated_and_vars_exported() {
        let src = "<SET n=3 greeting=\"'hi'\"><SHELL STDOUT VARS='greeting, nope'>echo {n} $greeting</SHELL>";
        let (out, engine) = run(src);
        assert_eq!(out, "3 hi");
        assert_eq!(engine.diagnostics.len(), 1);
        assert_eq!(engine.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn valueless_vars_warns() {
        let (out, engine) = run("<SHELL STDOUT VARS>echo hi</SHELL>");
        assert_eq!(out, "hi");
        assert_eq!(engine.diagnostics.len(), 1);
        assert_eq!(engine.diagnostics[0].severity, Severity::Warning);
        assert!(engine.diagnostics[0].message.contains("VARS"));
    }

    #[test]
    fn nonzero_exit_warns_but_captures() {
        let (out, engine) = run("<SHELL STDOUT>echo partial; exit 3</SHELL>");
        assert_eq!(out, "partial");
        assert_eq!(engine.diagnostics.len(), 1);
        assert!(engine.diagnostics[0].message.contains('3'));
    }

    #[test]
    fn html_capture_and_bad_content() {
        let (_, engine) = run("<SHELL STDOUT=HTML>echo x</SHELL>");
        assert!(engine.has_errors());
        let (_, engine) = run("<SHELL></SHELL>");
        assert_eq!(engine.diagnostics[0].severity, Severity::Warning);
    }

    #[test]
    fn runs_in_configured_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        let mut engine = Engine::with_config(crate::config::EngineConfig {
            cwd: dir.path().to_owned(),
            ..Default::default()
        });
        let out = engine.render_str("<SHELL STDOUT>ls</SHELL>").unwrap();
        assert_eq!(out, "marker");
    }
}
