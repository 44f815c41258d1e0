//! `{expr}` interpolation in text and attribute values.
//!
//! | Sequence  | Meaning                                                |
//! |-----------|--------------------------------------------------------|
//! | `{expr}`  | Evaluate `expr` and substitute its stringified value    |
//! | `\{`      | Kept as written (backslash included); opens no span    |
//! | `{` …     | Unterminated span, kept verbatim                       |
//!
//! A span that fails to parse is reported through [`EvalContext::warn`] and
//! left in the output verbatim.

use super::expr::{eval_str, EvalContext};

/// Expand every `{expr}` span in `src`.
pub fn interpolate(src: &str, ctx: &mut dyn EvalContext) -> String {
    if !src.contains('{') {
        return src.to_owned();
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    loop {
        let Some(open) = find_open(rest) else {
            out.push_str(rest);
            break;
        };
        let Some(len) = rest[open + 1..].find('}') else {
            out.push_str(rest);
            break;
        };
        let close = open + 1 + len;
        out.push_str(&rest[..open]);

        let expr_src = &rest[open + 1..close];
        match eval_str(expr_src, ctx) {
            Ok(v) => out.push_str(&v.to_string()),
            Err(e) => {
                ctx.warn(format!("in '{{{expr_src}}}': {e}"));
                out.push_str(&rest[open..=close]);
            }
        }
        rest = &rest[close + 1..];
    }
    out
}

/// Byte offset of the first `{` not preceded by a backslash.
fn find_open(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    bytes
        .iter()
        .enumerate()
        .find(|&(i, &b)| b == b'{' && (i == 0 || bytes[i - 1] != b'\\'))
        .map(|(i, _)| i)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
