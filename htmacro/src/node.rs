//! Markup node tree.
//!
//! The reader in [`crate::markup`] produces these, the engine consumes a
//! source tree and appends to a destination tree, and the writer serializes
//! the result.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Tag,
    Text,
    /// A markup declaration: `<!DOCTYPE html>`, `<?xml …?>`.
    Directive,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quote {
    #[default]
    None,
    Single,
    Double,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub name: String,
    pub value: Option<String>,
    pub quote: Quote,
    /// The value contains `{`, so it may need interpolation.
    pub has_brace: bool,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: Option<String>, quote: Quote) -> Self {
        let has_brace = value.as_deref().is_some_and(|v| v.contains('{'));
        Attr {
            name: name.into(),
            value,
            quote,
            has_brace,
        }
    }

    /// Valueless attribute, e.g. `ELSE` or `NO-WRAP`.
    pub fn bare(name: impl Into<String>) -> Self {
        Attr::new(name, None, Quote::None)
    }

    pub fn quoted(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attr::new(name, Some(value.into()), Quote::Double)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn set_value(&mut self, value: String) {
        self.has_brace = value.contains('{');
        self.value = Some(value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Tag name, text content, declaration body, or comment body.
    pub name: String,
    pub attrs: Vec<Attr>,
    pub children: Vec<Node>,
    pub space_before: bool,
    pub space_after: bool,
    pub self_closing: bool,
}

impl Node {
    fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Node {
            kind,
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            space_before: false,
            space_after: false,
            self_closing: false,
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Node::new(NodeKind::Tag, name)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Node::new(NodeKind::Text, content)
    }

    pub fn comment(body: impl Into<String>) -> Self {
        Node::new(NodeKind::Comment, body)
    }

    pub fn declaration(body: impl Into<String>) -> Self {
        Node::new(NodeKind::Directive, body)
    }

    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_tag(&self) -> bool {
        self.kind == NodeKind::Tag
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    /// Tag name match, ASCII case-insensitive.
    pub fn is_named(&self, name: &str) -> bool {
        self.is_tag() && self.name.eq_ignore_ascii_case(name)
    }

    /// First attribute with the given name (case-insensitive).
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|a| a.is(name))
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    /// The text of the only child, when the node has exactly one text child.
    pub fn single_text(&self) -> Option<&str> {
        match self.children.as_slice() {
            [only] if only.is_text() => Some(&only.name),
            _ => None,
        }
    }
}

/// Elements that never take children.
pub fn is_void_element(name: &str) -> bool {
    const VOID: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
        "track", "wbr", "set", "include",
    ];
    VOID.iter().any(|v| v.eq_ignore_ascii_case(name))
}

/// Elements whose content is one raw text node.
pub fn is_raw_text_element(name: &str) -> bool {
    ["script", "style", "shell"]
        .iter()
        .any(|v| v.eq_ignore_ascii_case(name))
}
