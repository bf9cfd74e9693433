//! Re-serialize HTML fragments as well-formed XHTML for chapter documents.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

use crate::markup::{escape_attr, escape_text};

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements dropped with their subtree: active content and foreign markup.
const SKIPPED_ELEMENTS: [&str; 12] = [
    "script", "style", "noscript", "iframe", "object", "embed", "template", "svg", "math",
    "form", "button", "canvas",
];

/// Serialize `html` (a fragment) as XHTML.
///
/// Void elements are self-closed, text and attribute values are escaped,
/// characters XML cannot carry are removed, comments and event-handler
/// attributes are dropped, and `<img>` always gets an `alt`.
pub fn to_xhtml(html: &str) -> String {
    let doc = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len() + html.len() / 8);
    for child in doc.root_element().children() {
        write_node(child, &mut out);
    }
    out
}

fn write_node(node: NodeRef<'_, Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&escape_text(text)),
        Node::Element(el) => {
            let name = el.name();
            if SKIPPED_ELEMENTS.contains(&name) {
                return;
            }
            if !is_xml_name(name) {
                for child in node.children() {
                    write_node(child, out);
                }
                return;
            }

            out.push('<');
            out.push_str(name);
            for (attr, value) in el.attrs() {
                if keep_attribute(attr) {
                    out.push(' ');
                    out.push_str(attr);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
            }
            if name == "img" && el.attr("alt").is_none() {
                out.push_str(" alt=\"\"");
            }

            if VOID_ELEMENTS.contains(&name) {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in node.children() {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(name);
            out.push('>');
        }
        _ => {}
    }
}

fn keep_attribute(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    !lower.starts_with("on") && lower != "xmlns" && !name.contains(':') && is_xml_name(name)
}

/// Conservative XML `Name` check (ASCII subset plus any non-ASCII letter).
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    let start_ok = first.is_ascii_alphabetic() || first == '_' || !first.is_ascii();
    start_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') || !c.is_ascii())
}
