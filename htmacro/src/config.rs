//! Engine configuration and the `.htmacrorc` file parser.
//!
//! The rc file is line based:
//!
//! | Directive | Action |
//! |-----------|--------|
//! | `/set <name>=<value>` or `/set <name> <value>` | predefine a variable |
//! | `/include <dir>` | append a directory to the include path |
//! | `/interpolate on\|off` | default for `{expr}` interpolation |
//! | Lines starting with `;` | comment, ignored |
//! | Any other `/command` | silently skipped |
//!
//! `/set` values are typed: an integer if the text parses as one, else a
//! float, else a string.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::script::Value;

// ── EngineConfig ──────────────────────────────────────────────────────────────

/// Settings the engine consults while running.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base directory for relative `INCLUDE` paths and `SHELL` commands.
    pub cwd: PathBuf,
    /// Extra directories searched for `INCLUDE` targets, in order.
    pub include_paths: Vec<PathBuf>,
    /// Whether `{expr}` interpolation starts enabled.
    pub interpolate: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            include_paths: Vec::new(),
            interpolate: true,
        }
    }
}

// ── Rc file ───────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Parsed rc file contents.
#[derive(Debug, Default)]
pub struct Config {
    /// `/set` assignments in file order.
    pub vars: Vec<(String, Value)>,
    pub include_paths: Vec<PathBuf>,
    pub interpolate: Option<bool>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an rc file string.
    ///
    /// Returns the config and a list of any parse errors on recognised lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let Some(rest) = line.strip_prefix('/') else { continue };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));
            let tokens = split_args(args_str.trim());

            let result = match cmd {
                "set" => parse_set(&tokens).map(|kv| config.vars.push(kv)),
                "include" => match tokens.as_slice() {
                    [dir] => {
                        config.include_paths.push(PathBuf::from(dir));
                        Ok(())
                    }
                    _ => Err("/include: expects one directory".to_owned()),
                },
                "interpolate" => match tokens.as_slice() {
                    [flag] => parse_switch(flag).map(|on| config.interpolate = Some(on)),
                    _ => Err("/interpolate: expects 'on' or 'off'".to_owned()),
                },
                _ => Ok(()),
            };
            if let Err(message) = result {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse an rc file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Fold the rc file's settings into an engine configuration.
    pub fn apply(&self, engine: &mut EngineConfig) {
        engine.include_paths.extend(self.include_paths.iter().cloned());
        if let Some(on) = self.interpolate {
            engine.interpolate = on;
        }
    }
}

/// Type a textual value: integer, then float, then string.
pub fn typed_value(s: &str) -> Value {
    if let Ok(n) = s.parse::<i64>() {
        return Value::Int(n);
    }
    match s.parse::<f64>() {
        Ok(x) if s.contains('.') => Value::Float(x),
        _ => Value::Str(s.to_owned()),
    }
}

/// Split a `NAME=VALUE` definition, as given to `/set` or `-D`.
pub fn parse_define(def: &str) -> Result<(String, Value), String> {
    let (name, value) = def
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{def}'"))?;
    if name.is_empty() {
        return Err("variable name cannot be empty".into());
    }
    Ok((name.to_owned(), typed_value(value)))
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── /set ─────────────────────────────────────────────────────────────────────

/// Parse `/set <name>=<value>` or `/set <name> <value>`.
fn parse_set(tokens: &[String]) -> Result<(String, Value), String> {
    let Some(first) = tokens.first() else {
        return Err("/set: requires an argument".into());
    };

    if first.contains('=') {
        let mut def = first.clone();
        for t in &tokens[1..] {
            def.push(' ');
            def.push_str(t);
        }
        return parse_define(&def).map_err(|e| format!("/set: {e}"));
    }
    if tokens.len() < 2 {
        return Err(format!("/set: missing value for '{first}'"));
    }
    Ok((first.clone(), typed_value(&tokens[1..].join(" "))))
}

fn parse_switch(flag: &str) -> Result<bool, String> {
    match flag.to_ascii_lowercase().as_str() {
        "on" | "1" | "yes" => Ok(true),
        "off" | "0" | "no" => Ok(false),
        other => Err(format!("/interpolate: expected 'on' or 'off', got '{other}'")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- split_args -----------------------------------------------------------

    #[test]
    fn split_simple() {
        assert_eq!(split_args("foo bar baz"), ["foo", "bar", "baz"]);
    }

    #[test]
    fn split_quoted_spaces() {
        assert_eq!(split_args(r#"title="My Site" 4242"#), ["title=My Site", "4242"]);
    }

    #[test]
    fn split_escaped_quote_inside_quotes() {
        assert_eq!(split_args(r#""say \"hi\"""#), [r#"say "hi""#]);
    }

    // -- /set -----------------------------------------------------------------

    #[test]
    fn set_equals_form() {
        let (cfg, errs) = Config::load_str("/set width=80");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.vars, vec![("width".to_owned(), Value::Int(80))]);
    }

    #[test]
    fn set_space_form_and_types() {
        let (cfg, errs) = Config::load_str("/set ratio 1.5\n/set title \"Home page\"");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.vars[0], ("ratio".to_owned(), Value::Float(1.5)));
        assert_eq!(cfg.vars[1], ("title".to_owned(), Value::Str("Home page".into())));
    }

    #[test]
    fn set_errors_carry_line_numbers() {
        let (_, errs) = Config::load_str("; header\n/set\n/set lonely\n/set =3");
        assert_eq!(errs.len(), 3);
        assert_eq!(errs[0].line, 2);
        assert_eq!(errs[1].line, 3);
        assert_eq!(errs[2].line, 4);
        assert!(errs[2].to_string().starts_with("line 4:"));
    }

    // -- /include, /interpolate ----------------------------------------------

    #[test]
    fn include_and_interpolate() {
        let (cfg, errs) = Config::load_str("/include lib/html\n/interpolate off");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(cfg.include_paths, vec![PathBuf::from("lib/html")]);
        assert_eq!(cfg.interpolate, Some(false));

        let mut engine = EngineConfig::default();
        cfg.apply(&mut engine);
        assert!(!engine.interpolate);
        assert_eq!(engine.include_paths, vec![PathBuf::from("lib/html")]);
    }

    #[test]
    fn bad_interpolate_switch() {
        let (cfg, errs) = Config::load_str("/interpolate maybe");
        assert_eq!(errs.len(), 1);
        assert_eq!(cfg.interpolate, None);
    }

    #[test]
    fn unknown_commands_and_text_skipped() {
        let (cfg, errs) = Config::load_str("/frobnicate all\nplain text\n/set a=1");
        assert!(errs.is_empty());
        assert_eq!(cfg.vars.len(), 1);
    }

    // -- typed values -----------------------------------------------------------

    #[test]
    fn typed_values() {
        assert_eq!(typed_value("42"), Value::Int(42));
        assert_eq!(typed_value("-3"), Value::Int(-3));
        assert_eq!(typed_value("2.5"), Value::Float(2.5));
        assert_eq!(typed_value("inf"), Value::Str("inf".into()));
        assert_eq!(typed_value("hello"), Value::Str("hello".into()));
        assert_eq!(typed_value(""), Value::Str(String::new()));
    }

    #[test]
    fn define_pairs() {
        assert_eq!(parse_define("x=4"), Ok(("x".to_owned(), Value::Int(4))));
        assert_eq!(
            parse_define("msg=a=b"),
            Ok(("msg".to_owned(), Value::Str("a=b".into())))
        );
        assert!(parse_define("novalue").is_err());
        assert!(parse_define("=1").is_err());
    }

    #[test]
    fn load_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".htmacrorc");
        std::fs::write(&path, "/set site=\"Example\"\n").unwrap();
        let (cfg, errs) = Config::load_file(&path).unwrap();
        assert!(errs.is_empty());
        assert_eq!(cfg.vars[0].1, Value::Str("Example".into()));
    }
}
