//! DOM platform layer
//!
//! The hydration runtime talks to the document through one surface,
//! [`Document`] and [`Node`], with two backends behind it:
//!
//! - On `wasm32` the types wrap `web_sys` handles. Custom elements are
//!   registered with the browser's `customElements` registry, observers are
//!   real `MutationObserver`s, and tasks run on `wasm_bindgen_futures`.
//! - Everywhere else an in-process document stands in for the browser: an
//!   arena tree with HTML parsing, custom element reactions and a
//!   single-threaded event loop that tests drive explicitly.
//!
//! Both backends deliver observer records and spawned tasks asynchronously
//! and run listeners synchronously inside `dispatch_event`.

mod custom_element;
mod event;
#[cfg(not(target_arch = "wasm32"))]
mod native;
#[cfg(target_arch = "wasm32")]
mod web;

pub use custom_element::{CustomElement, ElementFactory};
pub use event::{Event, ListenerOptions};
#[cfg(not(target_arch = "wasm32"))]
pub use native::{Document, MutationObserver, MutationRecord, Node, NodeKind};
#[cfg(target_arch = "wasm32")]
pub use web::{Document, MutationObserver, MutationRecord, Node};

use thiserror::Error;

/// Errors raised by tree operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum DomError {
	/// The insertion would make a node its own ancestor, or targets a node
	/// that cannot have children.
	#[error("hierarchy request error: {0}")]
	HierarchyRequest(String),

	/// The reference node is not a child of the parent.
	#[error("reference node is not a child of this node")]
	NotFound,

	/// The tag already has a custom element definition.
	#[error("custom element '{0}' is already defined")]
	AlreadyDefined(String),

	/// The tag is not a valid custom element name.
	#[error("'{0}' is not a valid custom element name")]
	InvalidCustomElementName(String),

	/// A browser API threw.
	#[error("platform error: {0}")]
	Platform(String),
}
