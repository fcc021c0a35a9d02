//! Owned markup tree shared by the XML and HTML packers
//!
//! Documents are parsed with `roxmltree` and copied into an owned,
//! serializable tree so that packers can rewrite and strip nodes before the
//! result is sealed into a manifest.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

use crate::error::{CoreError, Result};

/// XHTML namespace assigned to un-namespaced markup
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// A node in the markup tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Element(Element),
    Text { value: String },
    Comment { value: String },
}

/// A namespace declaration carried by an element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<NamespaceDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Element {
    /// Whether this element has the given namespace and local name
    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.namespace.as_deref() == Some(namespace) && self.name == name
    }

    /// Look up an attribute by namespace and local name
    pub fn attribute(&self, namespace: Option<&str>, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.as_deref() == namespace && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Direct element children
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// All descendant elements in document order, excluding `self`
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        fn walk<'a>(element: &'a Element, out: &mut Vec<&'a Element>) {
            for child in element.elements() {
                out.push(child);
                walk(child, out);
            }
        }
        walk(self, &mut out);
        out
    }

    /// Concatenated text content of this element and its descendants
    pub fn text(&self) -> String {
        let mut out = String::new();
        fn walk(element: &Element, out: &mut String) {
            for child in &element.children {
                match child {
                    Node::Text { value } => out.push_str(value),
                    Node::Element(e) => walk(e, out),
                    Node::Comment { .. } => {}
                }
            }
        }
        walk(self, &mut out);
        out
    }

    /// Remove every element, attribute and declaration bound to `namespace`
    pub fn strip_namespace(&mut self, namespace: &str) {
        self.namespaces.retain(|d| d.uri != namespace);
        self.attributes
            .retain(|a| a.namespace.as_deref() != Some(namespace));
        self.children.retain(|n| match n {
            Node::Element(e) => e.namespace.as_deref() != Some(namespace),
            _ => true,
        });
        for child in &mut self.children {
            if let Node::Element(e) = child {
                e.strip_namespace(namespace);
            }
        }
    }

    /// Apply `f` to every comment below this element
    pub fn rewrite_comments<F>(&mut self, f: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.children.retain_mut(|n| match n {
            Node::Comment { value } => match f(value) {
                Some(new) => {
                    *value = new;
                    true
                }
                None => false,
            },
            Node::Element(e) => {
                e.rewrite_comments(f);
                true
            }
            Node::Text { .. } => true,
        });
    }

    /// Drop indentation: whitespace-only text spanning a line break, unless
    /// the element holds mixed content
    pub fn strip_whitespace(&mut self) {
        let mixed = self
            .children
            .iter()
            .any(|n| matches!(n, Node::Text { value } if !value.trim().is_empty()));
        self.children.retain_mut(|n| match n {
            Node::Text { value } => mixed || !value.trim().is_empty() || !value.contains('\n'),
            Node::Element(e) => {
                e.strip_whitespace();
                true
            }
            Node::Comment { .. } => true,
        });
    }

    /// Assign `namespace` to every element that has none
    pub fn assign_default_namespace(&mut self, namespace: &str) {
        if self.namespace.is_none() {
            self.namespace = Some(namespace.to_string());
            self.prefix = None;
        }
        for child in &mut self.children {
            if let Node::Element(e) = child {
                e.assign_default_namespace(namespace);
            }
        }
    }

    /// Serialize the element as markup without an XML declaration
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        self.write_markup(&mut out, None);
        out
    }

    fn write_markup<'a>(&'a self, out: &mut String, parent_default: Option<&'a str>) {
        let qname = qualified(self.prefix.as_deref(), &self.name);
        out.push('<');
        out.push_str(&qname);

        let mut default_ns = parent_default;
        let declares_default = self.namespaces.iter().any(|d| d.prefix.is_none());
        for decl in &self.namespaces {
            match &decl.prefix {
                Some(p) => {
                    let _ = write!(out, " xmlns:{}=\"{}\"", p, escape_attr(&decl.uri));
                }
                None => {
                    let _ = write!(out, " xmlns=\"{}\"", escape_attr(&decl.uri));
                    default_ns = Some(decl.uri.as_str());
                }
            }
        }
        // Unprefixed elements must live in the default namespace in scope
        if self.prefix.is_none() && !declares_default && self.namespace.as_deref() != default_ns {
            let uri = self.namespace.as_deref().unwrap_or("");
            let _ = write!(out, " xmlns=\"{}\"", escape_attr(uri));
            default_ns = self.namespace.as_deref();
        }

        for attr in &self.attributes {
            let _ = write!(
                out,
                " {}=\"{}\"",
                qualified(attr.prefix.as_deref(), &attr.name),
                escape_attr(&attr.value)
            );
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_markup(out, default_ns),
                Node::Text { value } => out.push_str(&escape_text(value)),
                Node::Comment { value } => {
                    out.push_str("<!--");
                    out.push_str(value);
                    out.push_str("-->");
                }
            }
        }
        let _ = write!(out, "</{}>", qname);
    }
}

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}:{}", p, name),
        _ => name.to_string(),
    }
}

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

/// Parse a markup document into an owned element tree
///
/// Parse failures are reported as [`CoreError::MalformedSource`] with the
/// 1-based line and column of the offending input.
pub fn parse_document(text: &str, file: &Path) -> Result<Element> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };

    let doc = roxmltree::Document::parse_with_options(text, options).map_err(|e| {
        let pos = e.pos();
        CoreError::MalformedSource {
            file: file.to_path_buf(),
            line: pos.row,
            column: pos.col,
            message: e.to_string(),
        }
    })?;

    Ok(convert_element(doc.root_element(), None))
}

fn convert_element(node: roxmltree::Node<'_, '_>, parent: Option<roxmltree::Node<'_, '_>>) -> Element {
    let tag = node.tag_name();
    let namespace = tag.namespace().map(str::to_string);
    let prefix = tag
        .namespace()
        .and_then(|ns| node.lookup_prefix(ns))
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    // Declarations in scope here but not on the parent were declared here
    let namespaces = node
        .namespaces()
        .filter(|ns| {
            ns.name() != Some("xml")
                && !parent.is_some_and(|p| {
                    p.namespaces()
                        .any(|pn| pn.name() == ns.name() && pn.uri() == ns.uri())
                })
        })
        .map(|ns| NamespaceDecl {
            prefix: ns.name().map(str::to_string),
            uri: ns.uri().to_string(),
        })
        .collect();

    let attributes = node
        .attributes()
        .map(|a| Attribute {
            namespace: a.namespace().map(str::to_string),
            prefix: a
                .namespace()
                .and_then(|ns| {
                    if ns == "http://www.w3.org/XML/1998/namespace" {
                        Some("xml")
                    } else {
                        node.lookup_prefix(ns)
                    }
                })
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            name: a.name().to_string(),
            value: a.value().to_string(),
        })
        .collect();

    let children = node
        .children()
        .filter_map(|child| match child.node_type() {
            roxmltree::NodeType::Element => Some(Node::Element(convert_element(child, Some(node)))),
            roxmltree::NodeType::Text => Some(Node::Text {
                value: child.text().unwrap_or_default().to_string(),
            }),
            roxmltree::NodeType::Comment => Some(Node::Comment {
                value: child.text().unwrap_or_default().to_string(),
            }),
            _ => None,
        })
        .collect();

    Element {
        namespace,
        prefix,
        name: tag.name().to_string(),
        namespaces,
        attributes,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Element {
        parse_document(text, Path::new("test.xml")).unwrap()
    }

    #[test]
    fn test_parse_and_serialize() {
        let root = parse("<a x=\"1\"><b>hi &amp; bye</b><!-- note --><c/></a>");
        assert_eq!(root.name, "a");
        assert_eq!(root.attribute(None, "x"), Some("1"));
        assert_eq!(
            root.to_markup(),
            "<a x=\"1\"><b>hi &amp; bye</b><!-- note --><c/></a>"
        );
    }

    #[test]
    fn test_malformed_reports_position() {
        let err = parse_document("<a>\n  <b></a>", Path::new("bad.xml")).unwrap_err();
        match err {
            CoreError::MalformedSource { file, line, .. } => {
                assert_eq!(file, Path::new("bad.xml"));
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strip_namespace() {
        let mut root = parse(
            r#"<html xmlns="http://www.w3.org/1999/xhtml" xmlns:ap="urn:x" ap:layout="l"><ap:title>T</ap:title><body>x</body></html>"#,
        );
        root.strip_namespace("urn:x");
        let markup = root.to_markup();
        assert!(!markup.contains("urn:x"));
        assert!(!markup.contains("title"));
        assert!(!markup.contains("layout"));
        assert!(markup.contains("<body>x</body>"));
    }

    #[test]
    fn test_assign_default_namespace() {
        let mut root = parse("<html><body/></html>");
        root.assign_default_namespace(XHTML_NS);
        assert_eq!(root.namespace.as_deref(), Some(XHTML_NS));
        assert_eq!(
            root.to_markup(),
            format!("<html xmlns=\"{}\"><body/></html>", XHTML_NS)
        );
    }

    #[test]
    fn test_strip_whitespace() {
        let mut root = parse("<a>\n  <b> x </b>\n</a>");
        root.strip_whitespace();
        assert_eq!(root.to_markup(), "<a><b> x </b></a>");
    }

    #[test]
    fn test_strip_whitespace_keeps_inline_spaces() {
        let mut root = parse("<p><b>a</b> <i>b</i></p>");
        root.strip_whitespace();
        assert_eq!(root.to_markup(), "<p><b>a</b> <i>b</i></p>");

        let mut root = parse("<p>Hello\n  <b>x</b>\n  <i>y</i>\n</p>");
        root.strip_whitespace();
        assert_eq!(root.to_markup(), "<p>Hello\n  <b>x</b>\n  <i>y</i>\n</p>");

        let mut root = parse("<list>\n  <item>a</item> <item>b</item>\n</list>");
        root.strip_whitespace();
        assert_eq!(root.to_markup(), "<list><item>a</item> <item>b</item></list>");
    }

    #[test]
    fn test_descendants_and_text() {
        let root = parse("<a><b>1<c>2</c></b><d>3</d></a>");
        let names: Vec<_> = root.descendants().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["b", "c", "d"]);
        assert_eq!(root.text(), "123");
    }
}
