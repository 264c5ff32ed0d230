//! Browser document backed by `web_sys`.
//!
//! Handles wrap `web_sys` objects, so node identity is JS identity. Rust
//! callbacks cross into JS as `Closure`s. Persistent ones (custom element
//! reactions, observers, plain listeners) are kept alive with `forget` for
//! the lifetime of the page. One-shot ones (timeouts, `once` listeners) go
//! through `Closure::once_into_js` and are freed after their single call.
//!
//! Custom element instances live in a thread-local table. The element
//! carries its table key in an expando property, which is how reactions
//! coming back from the browser find their instance.

use super::DomError;
use super::custom_element::{self, CustomElement, ElementFactory};
use super::event::{Event, ListenerOptions};
use crate::error::{HydrationError, HydrationResult};
use js_sys::{Array, Function, Reflect};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

const INSTANCE_KEY: &str = "__isletInstance";

/// Body of the function that builds a custom element class around the
/// reaction callbacks.
const ELEMENT_CLASS: &str = r#"
return class extends HTMLElement {
	static get observedAttributes() { return observed; }
	connectedCallback() { connected(this); }
	disconnectedCallback() { disconnected(this); }
	attributeChangedCallback(name, oldValue, newValue) {
		changed(this, name, oldValue, newValue);
	}
};
"#;

#[derive(Default)]
struct Registry {
	instances: RefCell<HashMap<u32, Rc<dyn CustomElement>>>,
	next_instance: Cell<u32>,
	rejections: RefCell<Vec<HydrationError>>,
}

thread_local! {
	static REGISTRY: Registry = Registry::default();
}

fn platform_error(err: JsValue) -> DomError {
	DomError::Platform(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}

fn window() -> Result<web_sys::Window, DomError> {
	web_sys::window().ok_or_else(|| DomError::Platform("no global window".to_string()))
}

fn instance(target: &JsValue) -> Option<Rc<dyn CustomElement>> {
	let id = Reflect::get(target, &JsValue::from_str(INSTANCE_KEY))
		.ok()?
		.as_f64()?;
	REGISTRY.with(|registry| registry.instances.borrow().get(&(id as u32)).cloned())
}

fn upgrade(element: &web_sys::Element, factory: &ElementFactory) -> Option<Rc<dyn CustomElement>> {
	if let Some(existing) = instance(element) {
		return Some(existing);
	}
	let created = factory(Node::from(element.clone()));
	let id = REGISTRY.with(|registry| {
		let id = registry.next_instance.get();
		registry.next_instance.set(id + 1);
		registry.instances.borrow_mut().insert(id, Rc::clone(&created));
		id
	});
	if let Err(err) = Reflect::set(element, &JsValue::from_str(INSTANCE_KEY), &JsValue::from(id)) {
		tracing::warn!(error = ?err, "failed to tag custom element instance");
		return None;
	}
	Some(created)
}

fn element_class(observed: &Array, callbacks: [&JsValue; 3]) -> Result<Function, DomError> {
	let build = Function::new_with_args("observed, connected, disconnected, changed", ELEMENT_CLASS);
	let [connected, disconnected, changed] = callbacks;
	build
		.apply(
			&JsValue::NULL,
			&Array::of4(observed, connected, disconnected, changed),
		)
		.map_err(platform_error)?
		.dyn_into::<Function>()
		.map_err(platform_error)
}

fn listen<F>(target: &web_sys::EventTarget, event_type: &str, callback: F, options: ListenerOptions)
where
	F: Fn(&Event) + 'static,
{
	let init = web_sys::AddEventListenerOptions::new();
	init.set_once(options.once);
	let handler = move |event: web_sys::Event| callback(&Event::new(event.type_()));

	let result = if options.once {
		let function = Closure::once_into_js(handler);
		target.add_event_listener_with_callback_and_add_event_listener_options(
			event_type,
			function.unchecked_ref(),
			&init,
		)
	} else {
		let closure = Closure::wrap(Box::new(handler) as Box<dyn FnMut(web_sys::Event)>);
		let result = target.add_event_listener_with_callback_and_add_event_listener_options(
			event_type,
			closure.as_ref().unchecked_ref(),
			&init,
		);
		closure.forget();
		result
	};
	if let Err(err) = result {
		tracing::warn!(event_type, error = ?err, "failed to add event listener");
	}
}

fn dispatch(target: &web_sys::EventTarget, event: &Event) {
	let result = web_sys::CustomEvent::new(event.event_type())
		.and_then(|custom| target.dispatch_event(&custom));
	if let Err(err) = result {
		tracing::warn!(event_type = event.event_type(), error = ?err, "failed to dispatch event");
	}
}

fn reject(err: HydrationError) {
	tracing::error!(error = %err, "unhandled hydration error");
	REGISTRY.with(|registry| registry.rejections.borrow_mut().push(err));
}

fn collect_nodes(list: &web_sys::NodeList) -> Vec<Node> {
	(0..list.length())
		.filter_map(|index| list.item(index))
		.map(Node::from)
		.collect()
}

/// The browser document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
	raw: web_sys::Document,
}

impl From<web_sys::Document> for Document {
	fn from(raw: web_sys::Document) -> Self {
		Self { raw }
	}
}

impl Document {
	/// The document of the global window, if there is one.
	pub fn current() -> Option<Self> {
		web_sys::window()?.document().map(Self::from)
	}

	/// The underlying `web_sys` document.
	pub fn raw(&self) -> &web_sys::Document {
		&self.raw
	}

	/// The `<body>` element.
	pub fn body(&self) -> Option<Node> {
		self.raw
			.body()
			.map(|body| Node::from(web_sys::Element::from(body)))
	}

	/// Defines a custom element in the window's `customElements` registry.
	///
	/// The browser upgrades elements with this tag that are already in the
	/// document, running their reactions as it does.
	pub fn define(
		&self,
		tag: &str,
		observed_attributes: &[String],
		factory: ElementFactory,
	) -> Result<(), DomError> {
		if !custom_element::is_valid_custom_element_name(tag) {
			return Err(DomError::InvalidCustomElementName(tag.to_string()));
		}
		let registry = window()?.custom_elements();
		if !registry.get(tag).is_undefined() {
			return Err(DomError::AlreadyDefined(tag.to_string()));
		}

		let connected = Closure::wrap(Box::new(move |element: web_sys::Element| {
			if let Some(instance) = upgrade(&element, &factory) {
				instance.connected_callback();
			}
		}) as Box<dyn FnMut(web_sys::Element)>);
		let disconnected = Closure::wrap(Box::new(|element: web_sys::Element| {
			if let Some(instance) = instance(&element) {
				instance.disconnected_callback();
			}
		}) as Box<dyn FnMut(web_sys::Element)>);
		let changed = Closure::wrap(Box::new(
			|element: web_sys::Element, name: String, old: Option<String>, new: Option<String>| {
				if let Some(instance) = instance(&element) {
					instance.attribute_changed_callback(&name, old.as_deref(), new.as_deref());
				}
			},
		)
			as Box<dyn FnMut(web_sys::Element, String, Option<String>, Option<String>)>);

		let observed: Array = observed_attributes
			.iter()
			.map(|name| JsValue::from_str(name))
			.collect();
		let class = element_class(
			&observed,
			[connected.as_ref(), disconnected.as_ref(), changed.as_ref()],
		)?;
		registry.define(tag, &class).map_err(platform_error)?;

		connected.forget();
		disconnected.forget();
		changed.forget();
		tracing::debug!(tag, "custom element defined");
		Ok(())
	}

	/// Returns the custom element instance backing `node`, if it has been
	/// created and is of type `T`.
	pub fn custom_element<T: CustomElement>(&self, node: &Node) -> Option<Rc<T>> {
		let any: Rc<dyn Any> = instance(&node.raw)?.into_any();
		any.downcast::<T>().ok()
	}

	/// Registers a listener on the window.
	pub fn add_window_listener<F>(&self, event_type: &str, callback: F, options: ListenerOptions)
	where
		F: Fn(&Event) + 'static,
	{
		match window() {
			Ok(window) => listen(&window, event_type, callback, options),
			Err(err) => tracing::warn!(event_type, error = %err, "window listener not added"),
		}
	}

	/// Dispatches `event` on the window.
	pub fn dispatch_window_event(&self, event: &Event) {
		match window() {
			Ok(window) => dispatch(&window, event),
			Err(err) => tracing::warn!(error = %err, "window event not dispatched"),
		}
	}

	/// Spawns a task with `wasm_bindgen_futures`. An `Err` outcome is
	/// logged and kept for [`take_rejections`](Self::take_rejections).
	pub fn spawn<F>(&self, task: F)
	where
		F: Future<Output = HydrationResult<()>> + 'static,
	{
		wasm_bindgen_futures::spawn_local(async move {
			if let Err(err) = task.await {
				reject(err);
			}
		});
	}

	/// Queues `task` as a macrotask with `setTimeout`.
	pub fn set_timeout<F>(&self, task: F)
	where
		F: FnOnce() + 'static,
	{
		let callback = Closure::once_into_js(task);
		let queued = window().and_then(|window| {
			window
				.set_timeout_with_callback(callback.unchecked_ref())
				.map_err(platform_error)
		});
		if let Err(err) = queued {
			tracing::warn!(error = %err, "failed to queue timeout");
		}
	}

	pub(crate) fn report(&self, err: HydrationError) {
		reject(err);
	}

	/// Takes the errors of failed tasks reported so far.
	pub fn take_rejections(&self) -> Vec<HydrationError> {
		REGISTRY.with(|registry| std::mem::take(&mut *registry.rejections.borrow_mut()))
	}
}

/// A handle to a browser node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
	raw: web_sys::Node,
}

impl From<web_sys::Node> for Node {
	fn from(raw: web_sys::Node) -> Self {
		Self { raw }
	}
}

impl From<web_sys::Element> for Node {
	fn from(element: web_sys::Element) -> Self {
		Self { raw: element.into() }
	}
}

impl Node {
	/// The underlying `web_sys` node. Renderers mount into this.
	pub fn raw(&self) -> &web_sys::Node {
		&self.raw
	}

	/// The node as an element.
	pub fn as_element(&self) -> Option<&web_sys::Element> {
		self.raw.dyn_ref::<web_sys::Element>()
	}

	/// The document owning this node.
	pub fn owner_document(&self) -> Document {
		let raw = match self.raw.owner_document() {
			Some(document) => document,
			// Only a document has no owner document.
			None => self.raw.clone().unchecked_into::<web_sys::Document>(),
		};
		Document { raw }
	}

	/// Whether this node is an element.
	pub fn is_element(&self) -> bool {
		self.as_element().is_some()
	}

	/// The element's lowercase tag name, `None` for other node kinds.
	pub fn tag_name(&self) -> Option<String> {
		self.as_element().map(web_sys::Element::local_name)
	}

	/// Returns an attribute value.
	pub fn get_attribute(&self, name: &str) -> Option<String> {
		self.as_element()?.get_attribute(name)
	}

	/// Whether the attribute is present.
	pub fn has_attribute(&self, name: &str) -> bool {
		self.as_element()
			.is_some_and(|element| element.has_attribute(name))
	}

	/// Sets an attribute.
	pub fn set_attribute(&self, name: &str, value: &str) {
		let Some(element) = self.as_element() else {
			return;
		};
		if let Err(err) = element.set_attribute(name, value) {
			tracing::warn!(attribute = name, error = ?err, "failed to set attribute");
		}
	}

	/// Removes an attribute.
	pub fn remove_attribute(&self, name: &str) {
		let Some(element) = self.as_element() else {
			return;
		};
		if let Err(err) = element.remove_attribute(name) {
			tracing::warn!(attribute = name, error = ?err, "failed to remove attribute");
		}
	}

	/// The parent node.
	pub fn parent_node(&self) -> Option<Node> {
		self.raw.parent_node().map(Node::from)
	}

	/// The parent, if it is an element.
	pub fn parent_element(&self) -> Option<Node> {
		self.raw.parent_element().map(Node::from)
	}

	/// Element children in order.
	pub fn children(&self) -> Vec<Node> {
		let Some(element) = self.as_element() else {
			return Vec::new();
		};
		let children = element.children();
		(0..children.length())
			.filter_map(|index| children.item(index))
			.map(Node::from)
			.collect()
	}

	/// The first child node.
	pub fn first_child(&self) -> Option<Node> {
		self.raw.first_child().map(Node::from)
	}

	/// Whether the node is in its document's tree.
	pub fn is_connected(&self) -> bool {
		self.raw.is_connected()
	}

	/// Whether `other` is this node or one of its descendants.
	pub fn contains(&self, other: &Node) -> bool {
		self.raw.contains(Some(&other.raw))
	}

	/// The nearest inclusive ancestor element matching `predicate`.
	pub fn closest<P>(&self, predicate: P) -> Option<Node>
	where
		P: Fn(&Node) -> bool,
	{
		let mut current = Some(self.clone());
		while let Some(node) = current {
			if node.is_element() && predicate(&node) {
				return Some(node);
			}
			current = node.parent_node();
		}
		None
	}

	/// Descendant elements matching `predicate`, in tree order.
	///
	/// Template contents live in a separate fragment and are never visited.
	pub fn query_all<P>(&self, predicate: P) -> Vec<Node>
	where
		P: Fn(&Node) -> bool,
	{
		let list = if let Some(element) = self.as_element() {
			element.query_selector_all("*")
		} else if let Some(document) = self.raw.dyn_ref::<web_sys::Document>() {
			document.query_selector_all("*")
		} else {
			return Vec::new();
		};
		match list {
			Ok(list) => collect_nodes(&list)
				.into_iter()
				.filter(|node| predicate(node))
				.collect(),
			Err(err) => {
				tracing::warn!(error = ?err, "descendant query failed");
				Vec::new()
			}
		}
	}

	/// Serialized children.
	pub fn inner_html(&self) -> String {
		self.as_element()
			.map(web_sys::Element::inner_html)
			.unwrap_or_default()
	}

	/// Serialized node including itself.
	pub fn outer_html(&self) -> String {
		self.as_element()
			.map(web_sys::Element::outer_html)
			.unwrap_or_default()
	}

	/// Replaces all children with the parsed `html` fragment.
	pub fn set_inner_html(&self, html: &str) {
		if let Some(element) = self.as_element() {
			element.set_inner_html(html);
		}
	}

	/// Parses `html` and appends the result after the existing children.
	pub fn append_html(&self, html: &str) {
		let Some(element) = self.as_element() else {
			return;
		};
		if let Err(err) = element.insert_adjacent_html("beforeend", html) {
			tracing::warn!(error = ?err, "failed to append markup");
		}
	}

	/// Appends `child`, moving it from its current parent if it has one.
	pub fn append_child(&self, child: &Node) -> Result<(), DomError> {
		self.raw
			.append_child(&child.raw)
			.map(drop)
			.map_err(platform_error)
	}

	/// Detaches the node from its parent. Detached nodes are left as-is.
	pub fn remove(&self) {
		let Some(parent) = self.raw.parent_node() else {
			return;
		};
		if let Err(err) = parent.remove_child(&self.raw) {
			tracing::warn!(error = ?err, "failed to remove node");
		}
	}

	/// Registers a listener on this node.
	pub fn add_event_listener<F>(&self, event_type: &str, callback: F, options: ListenerOptions)
	where
		F: Fn(&Event) + 'static,
	{
		listen(&self.raw, event_type, callback, options);
	}

	/// Dispatches a non-bubbling `CustomEvent` on this node.
	pub fn dispatch_event(&self, event: &Event) {
		dispatch(&self.raw, event);
	}
}

/// One child-list change on an observed node.
#[derive(Debug, Clone)]
pub struct MutationRecord {
	/// The node whose children changed.
	pub target: Node,
	/// Nodes inserted under `target`.
	pub added_nodes: Vec<Node>,
	/// Nodes removed from `target`.
	pub removed_nodes: Vec<Node>,
}

impl MutationRecord {
	fn from_raw(raw: &web_sys::MutationRecord) -> Option<Self> {
		Some(Self {
			target: raw.target()?.into(),
			added_nodes: collect_nodes(&raw.added_nodes()),
			removed_nodes: collect_nodes(&raw.removed_nodes()),
		})
	}
}

fn collect_records(records: &Array) -> Vec<MutationRecord> {
	records
		.iter()
		.filter_map(|record| record.dyn_into::<web_sys::MutationRecord>().ok())
		.filter_map(|record| MutationRecord::from_raw(&record))
		.collect()
}

/// Observes child-list mutations with a browser `MutationObserver`.
#[derive(Debug, Clone)]
pub struct MutationObserver {
	raw: web_sys::MutationObserver,
}

impl MutationObserver {
	/// Creates an observer. It reports nothing until [`observe`](Self::observe)
	/// is called. The callback stays alive for the rest of the page.
	pub fn new<F>(_document: &Document, callback: F) -> Result<Self, DomError>
	where
		F: Fn(Vec<MutationRecord>, &MutationObserver) + 'static,
	{
		let closure = Closure::wrap(Box::new(
			move |records: Array, raw: web_sys::MutationObserver| {
				callback(collect_records(&records), &MutationObserver { raw });
			},
		) as Box<dyn FnMut(Array, web_sys::MutationObserver)>);
		let raw = web_sys::MutationObserver::new(closure.as_ref().unchecked_ref())
			.map_err(platform_error)?;
		closure.forget();
		Ok(Self { raw })
	}

	/// Starts observing child-list changes of `target`.
	pub fn observe(&self, target: &Node) -> Result<(), DomError> {
		let init = web_sys::MutationObserverInit::new();
		init.set_child_list(true);
		self.raw
			.observe_with_options(&target.raw, &init)
			.map_err(platform_error)
	}

	/// Stops observing every target and drops undelivered records.
	pub fn disconnect(&self) {
		self.raw.disconnect();
	}

	/// Returns and clears the records not yet delivered.
	pub fn take_records(&self) -> Vec<MutationRecord> {
		collect_records(&self.raw.take_records())
	}
}
