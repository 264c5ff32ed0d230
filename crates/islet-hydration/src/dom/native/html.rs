//! HTML fragment parsing and serialization.

use super::{Document, Node, NodeData, NodeKind};
use scraper::{ElementRef, Html};

const VOID_ELEMENTS: &[&str] = &[
	"area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
	"wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Parses `html` as a body fragment into detached nodes owned by `document`.
pub(crate) fn parse_fragment(document: &Document, html: &str) -> Vec<Node> {
	let fragment = Html::parse_fragment(html);
	convert_children(document, fragment.root_element())
}

fn convert_children(document: &Document, parent: ElementRef<'_>) -> Vec<Node> {
	let mut nodes = Vec::new();
	for child in parent.children() {
		match child.value() {
			scraper::Node::Element(element) => {
				let node = document.create_element(element.name());
				for (name, value) in element.attrs() {
					node.write_attribute(name, value);
				}
				if let Some(child_ref) = ElementRef::wrap(child) {
					for grandchild in convert_children(document, child_ref) {
						node.adopt_detached(&grandchild);
					}
				}
				nodes.push(node);
			}
			scraper::Node::Text(text) => nodes.push(document.create_text_node(text)),
			scraper::Node::Comment(comment) => nodes.push(document.create_comment(comment)),
			_ => {}
		}
	}
	nodes
}

pub(crate) fn serialize_children(nodes: &[NodeData], parent: &NodeData, out: &mut String) {
	let raw = match &parent.kind {
		NodeKind::Element { tag, .. } => RAW_TEXT_ELEMENTS.contains(&tag.as_str()),
		_ => false,
	};
	for child in &parent.children {
		serialize_node(nodes, &nodes[child.0], raw, out);
	}
}

pub(crate) fn serialize_node(nodes: &[NodeData], data: &NodeData, raw_text: bool, out: &mut String) {
	match &data.kind {
		NodeKind::Document => serialize_children(nodes, data, out),
		NodeKind::Element { tag, attrs } => {
			out.push('<');
			out.push_str(tag);
			for (name, value) in attrs {
				out.push(' ');
				out.push_str(name);
				out.push_str("=\"");
				out.push_str(&escape_attr(value));
				out.push('"');
			}
			out.push('>');
			if VOID_ELEMENTS.contains(&tag.as_str()) {
				return;
			}
			serialize_children(nodes, data, out);
			out.push_str("</");
			out.push_str(tag);
			out.push('>');
		}
		NodeKind::Text(text) if raw_text => out.push_str(text),
		NodeKind::Text(text) => out.push_str(&escape_text(text)),
		NodeKind::Comment(text) => {
			out.push_str("<!--");
			out.push_str(text);
			out.push_str("-->");
		}
	}
}

fn escape_text(s: &str) -> String {
	s.replace('&', "&amp;")
		.replace('\u{a0}', "&nbsp;")
		.replace('<', "&lt;")
		.replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
	s.replace('&', "&amp;")
		.replace('\u{a0}', "&nbsp;")
		.replace('"', "&quot;")
}
