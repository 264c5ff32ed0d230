//! Custom element lifecycle.
//!
//! A definition maps a tag name to a factory and the list of attributes it
//! observes. The document creates one instance per element the first time
//! the element is connected (or when the tag is defined while the element is
//! already connected) and drives the lifecycle callbacks from then on.

use super::Node;
use std::any::Any;
use std::rc::Rc;

/// Lifecycle callbacks of a custom element instance.
///
/// All callbacks run synchronously inside the DOM operation that triggered
/// them, with no document borrow held, so they may freely mutate the tree.
pub trait CustomElement: Any {
	/// The element was inserted into the document.
	fn connected_callback(self: Rc<Self>) {}

	/// The element was removed from the document.
	fn disconnected_callback(self: Rc<Self>) {}

	/// An attribute named in the definition's observed list was set or
	/// removed.
	fn attribute_changed_callback(
		self: Rc<Self>,
		_name: &str,
		_old_value: Option<&str>,
		_new_value: Option<&str>,
	) {
	}

	/// Upcasts the instance for [`Document::custom_element`](super::Document::custom_element).
	fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Creates the instance backing an element.
pub type ElementFactory = Rc<dyn Fn(Node) -> Rc<dyn CustomElement>>;

/// Valid custom element names contain a hyphen and start with a lowercase
/// ASCII letter.
pub(crate) fn is_valid_custom_element_name(name: &str) -> bool {
	name.starts_with(|c: char| c.is_ascii_lowercase())
		&& name.contains('-')
		&& !name.chars().any(|c| c.is_ascii_uppercase() || c.is_whitespace())
}
