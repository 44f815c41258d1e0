//! Minimal markup reader and writer.
//!
//! The reader is lenient: it knows comments, declarations, start/end tags,
//! void elements and raw-text elements, and nothing about HTML tree
//! construction or entities.  Whitespace-only text never becomes a node; it
//! is recorded in the `space_before` / `space_after` flags of its neighbours,
//! and the writer turns those flags back into newlines.

use crate::error::{MarkupError, MarkupErrorKind};
use crate::node::{is_raw_text_element, is_void_element, Attr, Node, Quote};

// ── Reader ────────────────────────────────────────────────────────────────────

struct Reader<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    /// Open elements; index 0 is the document root.
    stack: Vec<Node>,
    /// Whitespace-only text was seen since the last node.
    pending_space: bool,
}

impl<'a> Reader<'a> {
    fn new(src: &'a str) -> Self {
        Reader {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            stack: vec![Node::tag("")],
            pending_space: false,
        }
    }

    fn line_at(&self, pos: usize) -> usize {
        self.src[..pos.min(self.src.len())].matches('\n').count() + 1
    }

    fn err(&self, start: usize, kind: MarkupErrorKind) -> MarkupError {
        MarkupError {
            line: self.line_at(start),
            kind,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn current(&mut self) -> &mut Node {
        // The root is never popped.
        let top = self.stack.len() - 1;
        &mut self.stack[top]
    }

    fn push(&mut self, mut node: Node) {
        if self.pending_space {
            node.space_before = true;
            self.pending_space = false;
        }
        self.current().children.push(node);
    }

    fn whitespace(&mut self) {
        if let Some(last) = self.current().children.last_mut() {
            last.space_after = true;
        }
        self.pending_space = true;
    }

    /// Hand pending whitespace to the last child of the current element
    /// before it closes.
    fn close_current(&mut self) {
        self.pending_space = false;
        if let Some(node) = self.stack.pop() {
            self.current().children.push(node);
        }
    }

    fn starts_construct(&self, at: usize) -> bool {
        matches!(
            self.bytes.get(at + 1),
            Some(b'!' | b'?' | b'/' | b'a'..=b'z' | b'A'..=b'Z')
        )
    }

    fn run(mut self) -> Result<Vec<Node>, MarkupError> {
        while self.pos < self.bytes.len() {
            if self.peek() == Some(b'<') && self.starts_construct(self.pos) {
                self.read_markup()?;
            } else {
                self.read_text();
            }
        }
        self.pending_space = false;
        while self.stack.len() > 1 {
            self.close_current();
        }
        Ok(self.stack.pop().map(|root| root.children).unwrap_or_default())
    }

    fn read_text(&mut self) {
        let start = self.pos;
        let mut end = start + 1;
        while end < self.bytes.len() {
            if self.bytes[end] == b'<' && self.starts_construct(end) {
                break;
            }
            end += 1;
        }
        // `<` is ASCII, so `end` is a char boundary.
        let text = &self.src[start..end];
        self.pos = end;

        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.whitespace();
            return;
        }
        let mut node = Node::text(trimmed);
        node.space_before = text.starts_with(|c: char| c.is_whitespace());
        node.space_after = text.ends_with(|c: char| c.is_whitespace());
        self.push(node);
    }

    fn read_markup(&mut self) -> Result<(), MarkupError> {
        let start = self.pos;
        let rest = self.rest();

        if let Some(body) = rest.strip_prefix("<!--") {
            let Some(end) = body.find("-->") else {
                return Err(self.err(start, MarkupErrorKind::UnterminatedComment));
            };
            let comment = Node::comment(&body[..end]);
            self.pos = start + 4 + end + 3;
            self.push(comment);
            return Ok(());
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            let Some(end) = rest.find('>') else {
                return Err(self.err(start, MarkupErrorKind::UnterminatedDeclaration));
            };
            let decl = Node::declaration(&rest[1..end]);
            self.pos = start + end + 1;
            self.push(decl);
            return Ok(());
        }

        if let Some(body) = rest.strip_prefix("</") {
            let Some(end) = body.find('>') else {
                let name = body.split(|c: char| c.is_whitespace()).next().unwrap_or("");
                return Err(self.err(start, MarkupErrorKind::UnterminatedTag(name.into())));
            };
            let name = body[..end].trim();
            self.pos = start + 2 + end + 1;
            self.end_tag(name);
            return Ok(());
        }

        self.start_tag(start)
    }

    fn end_tag(&mut self, name: &str) {
        let open = self
            .stack
            .iter()
            .rposition(|n| n.name.eq_ignore_ascii_case(name));
        match open {
            Some(idx) if idx > 0 => {
                if self.pending_space {
                    if let Some(last) = self.current().children.last_mut() {
                        last.space_after = true;
                    }
                }
                while self.stack.len() > idx {
                    self.close_current();
                }
            }
            // Stray close tag.
            _ => {}
        }
    }

    fn read_name(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b) if !b.is_ascii_whitespace() && !matches!(b, b'>' | b'/' | b'=' | b'<')
        ) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn start_tag(&mut self, start: usize) -> Result<(), MarkupError> {
        self.pos += 1;
        let name = self.read_name();
        let mut node = Node::tag(name);
        let unterminated = MarkupErrorKind::UnterminatedTag(name.into());

        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(self.err(start, unterminated)),
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') if self.bytes.get(self.pos + 1) == Some(&b'>') => {
                    self.pos += 2;
                    node.self_closing = true;
                    break;
                }
                _ => {}
            }

            let attr_name = self.read_name();
            if attr_name.is_empty() {
                // Stray character such as a lone '/' or '='.
                self.pos += 1;
                continue;
            }
            self.skip_ws();
            if self.peek() != Some(b'=') {
                node.attrs.push(Attr::bare(attr_name));
                continue;
            }
            self.pos += 1;
            self.skip_ws();
            let attr = match self.peek() {
                Some(q @ (b'"' | b'\'')) => {
                    let body = &self.src[self.pos + 1..];
                    let Some(end) = body.find(q as char) else {
                        return Err(self.err(
                            start,
                            MarkupErrorKind::UnterminatedValue(attr_name.into()),
                        ));
                    };
                    self.pos += 1 + end + 1;
                    let quote = if q == b'"' { Quote::Double } else { Quote::Single };
                    Attr::new(attr_name, Some(body[..end].to_owned()), quote)
                }
                None => return Err(self.err(start, unterminated)),
                Some(_) => {
                    let vstart = self.pos;
                    while let Some(b) = self.peek() {
                        let ends_tag = b == b'>'
                            || (b == b'/' && self.bytes.get(self.pos + 1) == Some(&b'>'));
                        if b.is_ascii_whitespace() || ends_tag {
                            break;
                        }
                        self.pos += 1;
                    }
                    Attr::new(attr_name, Some(self.src[vstart..self.pos].to_owned()), Quote::None)
                }
            };
            node.attrs.push(attr);
        }

        if node.self_closing || is_void_element(name) {
            self.push(node);
        } else if is_raw_text_element(name) {
            let content = self.raw_content(start, name)?;
            if !content.is_empty() {
                node.children.push(Node::text(content));
            }
            self.push(node);
        } else {
            if self.pending_space {
                node.space_before = true;
                self.pending_space = false;
            }
            self.stack.push(node);
        }
        Ok(())
    }

    /// Consume raw content up to and including the matching close tag.
    fn raw_content(&mut self, start: usize, name: &str) -> Result<&'a str, MarkupError> {
        let rest = self.rest();
        let close = format!("</{}", name.to_ascii_lowercase());
        let lower = rest.to_ascii_lowercase();
        let found = lower.match_indices(&close).find(|(i, _)| {
            matches!(
                lower.as_bytes().get(i + close.len()),
                Some(b'>') | Some(b' ' | b'\t' | b'\n' | b'\r')
            )
        });
        let Some((at, _)) = found else {
            return Err(self.err(start, MarkupErrorKind::UnterminatedRawText(name.into())));
        };
        let content = &rest[..at];
        let after = &rest[at..];
        let gt = after.find('>').unwrap_or(after.len().saturating_sub(1));
        self.pos += at + gt + 1;
        Ok(content)
    }
}

/// Read a markup document into a node list.
pub fn parse(src: &str) -> Result<Vec<Node>, MarkupError> {
    Reader::new(src).run()
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Serialize a node list.
pub fn write(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_nodes(nodes, &mut out);
    out
}

fn write_nodes(nodes: &[Node], out: &mut String) {
    for (i, node) in nodes.iter().enumerate() {
        let sep = match i {
            0 => node.space_before,
            _ => nodes[i - 1].space_after || node.space_before,
        };
        if sep {
            out.push('\n');
        }
        write_node(node, out);
    }
    if nodes.last().is_some_and(|n| n.space_after) {
        out.push('\n');
    }
}

fn write_node(node: &Node, out: &mut String) {
    use crate::node::NodeKind;
    match node.kind {
        NodeKind::Text => out.push_str(&node.name),
        NodeKind::Comment => {
            out.push_str("<!--");
            out.push_str(&node.name);
            out.push_str("-->");
        }
        NodeKind::Directive => {
            out.push('<');
            out.push_str(&node.name);
            out.push('>');
        }
        NodeKind::Tag => {
            out.push('<');
            out.push_str(&node.name);
            for attr in &node.attrs {
                out.push(' ');
                write_attr(attr, out);
            }
            if node.self_closing {
                out.push_str(" />");
                return;
            }
            out.push('>');
            if is_void_element(&node.name) && node.children.is_empty() {
                return;
            }
            write_nodes(&node.children, out);
            out.push_str("</");
            out.push_str(&node.name);
            out.push('>');
        }
    }
}

fn write_attr(attr: &Attr, out: &mut String) {
    out.push_str(&attr.name);
    let Some(value) = &attr.value else {
        return;
    };
    out.push('=');
    let quote = match attr.quote {
        Quote::Double if value.contains('"') => Some('\''),
        Quote::Double => Some('"'),
        Quote::Single if value.contains('\'') => Some('"'),
        Quote::Single => Some('\''),
        Quote::None if needs_quotes(value) => {
            Some(if value.contains('"') { '\'' } else { '"' })
        }
        Quote::None => None,
    };
    match quote {
        Some(q) => {
            out.push(q);
            out.push_str(value);
            out.push(q);
        }
        None => out.push_str(value),
    }
}

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '=' | '<' | '>'))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn roundtrip(src: &str) -> String {
        write(&parse(src).expect("parse failed"))
    }

    #[test]
    fn element_with_text() {
        let nodes = parse("<p class=\"x\">Hello</p>").unwrap();
        assert_eq!(nodes.len(), 1);
        let p = &nodes[0];
        assert!(p.is_named("p"));
        assert_eq!(p.attr("class").and_then(|a| a.value.as_deref()), Some("x"));
        assert_eq!(p.single_text(), Some("Hello"));
    }

    #[test]
    fn attribute_forms() {
        let nodes = parse("<IF TRUE='a < b' ELSE x=1 y=\"{z}\">").unwrap();
        let attrs = &nodes[0].attrs;
        assert_eq!(attrs.len(), 4);
        assert_eq!(attrs[0].quote, Quote::Single);
        assert_eq!(attrs[0].value.as_deref(), Some("a < b"));
        assert_eq!(attrs[1].value, None);
        assert_eq!(attrs[2].quote, Quote::None);
        assert_eq!(attrs[2].value.as_deref(), Some("1"));
        assert!(attrs[3].has_brace);
    }

    #[test]
    fn void_and_self_closing() {
        let nodes = parse("<br><SET x=1><img src=a /><p>t</p>").unwrap();
        assert_eq!(nodes.len(), 4);
        assert!(nodes[2].self_closing);
        assert!(nodes[3].is_named("p"));
    }

    #[test]
    fn raw_text_elements() {
        let nodes = parse("<script>if (a < b) { x(); }</script><SHELL>\n echo <b>\n</SHELL>")
            .unwrap();
        assert_eq!(nodes[0].single_text(), Some("if (a < b) { x(); }"));
        assert_eq!(nodes[1].single_text(), Some("\n echo <b>\n"));
    }

    #[test]
    fn comments_and_declarations() {
        let nodes = parse("<!DOCTYPE html><!-- note --><?xml v?>").unwrap();
        assert_eq!(nodes[0].kind, NodeKind::Directive);
        assert_eq!(nodes[0].name, "!DOCTYPE html");
        assert_eq!(nodes[1].kind, NodeKind::Comment);
        assert_eq!(nodes[1].name, " note ");
        assert_eq!(nodes[2].name, "?xml v?");
    }

    #[test]
    fn whitespace_becomes_flags() {
        let nodes = parse("<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>").unwrap();
        let ul = &nodes[0];
        assert_eq!(ul.children.len(), 2);
        assert!(ul.children[0].space_before);
        assert!(ul.children[0].space_after);
        assert!(ul.children[1].space_before);
        assert!(ul.children[1].space_after);
    }

    #[test]
    fn text_keeps_outer_space_flags() {
        let nodes = parse("<b>x</b> and more").unwrap();
        assert_eq!(nodes[1].name, "and more");
        assert!(nodes[1].space_before);
        assert!(!nodes[1].space_after);
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let nodes = parse("a < b").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "a < b");
    }

    #[test]
    fn stray_and_unclosed_tags() {
        let nodes = parse("</div><div><p>x").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children[0].single_text(), Some("x"));
    }

    #[test]
    fn errors_report_line() {
        let e = parse("<p>\n<!-- open").unwrap_err();
        assert_eq!(e.line, 2);
        assert_eq!(e.kind, MarkupErrorKind::UnterminatedComment);

        let e = parse("\n\n<a href=\"x>").unwrap_err();
        assert_eq!(e.line, 3);
        assert_eq!(e.kind, MarkupErrorKind::UnterminatedValue("href".into()));

        let e = parse("<div class=a").unwrap_err();
        assert_eq!(e.kind, MarkupErrorKind::UnterminatedTag("div".into()));

        assert!(parse("<script>x").is_err());
        assert!(parse("<!DOCTYPE").is_err());
    }

    #[test]
    fn writer_output() {
        assert_eq!(roundtrip("<p class=x>Hi</p>"), "<p class=x>Hi</p>");
        assert_eq!(roundtrip("<br>"), "<br>");
        assert_eq!(roundtrip("<img src='a' />"), "<img src='a' />");
        assert_eq!(
            roundtrip("<ul>\n  <li>a</li>   <li>b</li></ul>"),
            "<ul>\n<li>a</li>\n<li>b</li></ul>"
        );
    }

    #[test]
    fn writer_requotes_values() {
        let mut out = String::new();
        write_attr(&Attr::new("t", Some("a b".into()), Quote::None), &mut out);
        assert_eq!(out, "t=\"a b\"");
        let mut out = String::new();
        write_attr(&Attr::quoted("t", "say \"hi\""), &mut out);
        assert_eq!(out, "t='say \"hi\"'");
    }

    #[test]
    fn roundtrip_is_stable() {
        let src = "<!DOCTYPE html>\n<html>\n <body class=\"main\">\n  <p>Hello <b>World</b> !</p>\n </body>\n</html>\n";
        let once = roundtrip(src);
        assert_eq!(roundtrip(&once), once);
    }
}
