//! In-process document used on native targets.
//!
//! Plays the part of the browser platform: an arena node tree with
//! attributes and HTML (de)serialization, synchronous non-bubbling events,
//! child-list mutation observers, a custom element registry with lifecycle
//! callbacks, and a single-threaded event loop (microtask pool + macrotask
//! queue).
//!
//! ## Architecture
//!
//! ```text
//! Document ──► DocumentInner
//!               ├─ nodes: arena of NodeData (kind, parent, children, listeners)
//!               ├─ window listeners
//!               ├─ mutation observers
//!               ├─ custom element definitions + instances
//!               └─ event loop (LocalPool + macrotask queue + rejections)
//! ```
//!
//! [`Node`] is a cheap handle (document + arena index). Node identity is
//! handle equality. Nodes are never freed while their document lives.
//!
//! Every operation that runs user code (listeners, observer callbacks,
//! custom element callbacks, tasks) releases all document borrows first,
//! so callbacks can mutate the tree they were invoked from.

mod event_loop;
mod html;
mod observer;

pub use observer::{MutationObserver, MutationRecord};

use super::DomError;
use super::custom_element::{self, CustomElement, ElementFactory};
use super::event::{self, Event, EventCallback, Listener, ListenerOptions};
use crate::error::{HydrationError, HydrationResult};
use event_loop::EventLoop;
use observer::ObserverShared;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) usize);

const ROOT: NodeId = NodeId(0);

/// Kind and payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
	/// The document root.
	Document,
	/// An element with its tag and attributes in insertion order.
	Element {
		/// Lowercase tag name.
		tag: String,
		/// Attributes as `(name, value)` pairs.
		attrs: Vec<(String, String)>,
	},
	/// A text node.
	Text(String),
	/// A comment node.
	Comment(String),
}

#[derive(Debug)]
pub(crate) struct NodeData {
	pub(crate) kind: NodeKind,
	pub(crate) parent: Option<NodeId>,
	pub(crate) children: Vec<NodeId>,
	listeners: Vec<Listener>,
}

impl NodeData {
	fn new(kind: NodeKind) -> Self {
		Self {
			kind,
			parent: None,
			children: Vec::new(),
			listeners: Vec::new(),
		}
	}

	fn tag(&self) -> Option<&str> {
		match &self.kind {
			NodeKind::Element { tag, .. } => Some(tag),
			_ => None,
		}
	}
}

struct Definition {
	factory: ElementFactory,
	observed_attributes: Vec<String>,
}

pub(crate) struct DocumentInner {
	nodes: RefCell<Vec<NodeData>>,
	body: NodeId,
	window_listeners: RefCell<Vec<Listener>>,
	observers: RefCell<Vec<Rc<ObserverShared>>>,
	definitions: RefCell<HashMap<String, Definition>>,
	instances: RefCell<HashMap<NodeId, Rc<dyn CustomElement>>>,
	event_loop: EventLoop,
}

/// A document and its event loop.
#[derive(Clone)]
pub struct Document {
	inner: Rc<DocumentInner>,
}

impl fmt::Debug for Document {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Document")
			.field("nodes", &self.inner.nodes.borrow().len())
			.field("definitions", &self.inner.definitions.borrow().len())
			.finish_non_exhaustive()
	}
}

impl PartialEq for Document {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Document {}

impl Default for Document {
	fn default() -> Self {
		Self::new()
	}
}

impl Document {
	/// Creates an empty document with a `<body>` under its root.
	pub fn new() -> Self {
		let mut root = NodeData::new(NodeKind::Document);
		let mut body = NodeData::new(NodeKind::Element {
			tag: "body".to_string(),
			attrs: Vec::new(),
		});
		body.parent = Some(ROOT);
		root.children.push(NodeId(1));

		Self {
			inner: Rc::new(DocumentInner {
				nodes: RefCell::new(vec![root, body]),
				body: NodeId(1),
				window_listeners: RefCell::new(Vec::new()),
				observers: RefCell::new(Vec::new()),
				definitions: RefCell::new(HashMap::new()),
				instances: RefCell::new(HashMap::new()),
				event_loop: EventLoop::new(),
			}),
		}
	}

	fn node(&self, id: NodeId) -> Node {
		Node {
			document: self.clone(),
			id,
		}
	}

	fn alloc(&self, kind: NodeKind) -> Node {
		let mut nodes = self.inner.nodes.borrow_mut();
		nodes.push(NodeData::new(kind));
		let id = NodeId(nodes.len() - 1);
		drop(nodes);
		self.node(id)
	}

	/// The `<body>` element.
	pub fn body(&self) -> Node {
		self.node(self.inner.body)
	}

	/// Creates a detached element.
	pub fn create_element(&self, tag: &str) -> Node {
		self.alloc(NodeKind::Element {
			tag: tag.to_ascii_lowercase(),
			attrs: Vec::new(),
		})
	}

	/// Creates a detached text node.
	pub fn create_text_node(&self, data: &str) -> Node {
		self.alloc(NodeKind::Text(data.to_string()))
	}

	/// Creates a detached comment node.
	pub fn create_comment(&self, data: &str) -> Node {
		self.alloc(NodeKind::Comment(data.to_string()))
	}

	/// Parses an HTML body fragment into detached nodes.
	pub fn parse_fragment(&self, html: &str) -> Vec<Node> {
		html::parse_fragment(self, html)
	}

	/// Defines a custom element whose instances are told about changes to
	/// `observed_attributes`.
	///
	/// Elements with this tag that are already connected are upgraded and
	/// receive `connected_callback` immediately, in tree order.
	pub fn define(
		&self,
		tag: &str,
		observed_attributes: &[String],
		factory: ElementFactory,
	) -> Result<(), DomError> {
		if !custom_element::is_valid_custom_element_name(tag) {
			return Err(DomError::InvalidCustomElementName(tag.to_string()));
		}
		{
			let mut definitions = self.inner.definitions.borrow_mut();
			if definitions.contains_key(tag) {
				return Err(DomError::AlreadyDefined(tag.to_string()));
			}
			definitions.insert(
				tag.to_string(),
				Definition {
					factory,
					observed_attributes: observed_attributes.to_vec(),
				},
			);
		}
		tracing::debug!(tag, "custom element defined");

		let existing: Vec<NodeId> = self
			.node(ROOT)
			.descendants()
			.into_iter()
			.filter(|node| node.tag_name().as_deref() == Some(tag))
			.map(|node| node.id)
			.collect();
		for id in existing {
			if let Some(instance) = self.upgrade(id) {
				instance.connected_callback();
			}
		}
		Ok(())
	}

	/// Returns the custom element instance backing `node`, if it has been
	/// created and is of type `T`.
	pub fn custom_element<T: CustomElement>(&self, node: &Node) -> Option<Rc<T>> {
		let instance = self.inner.instances.borrow().get(&node.id).cloned()?;
		let any: Rc<dyn Any> = instance.into_any();
		any.downcast::<T>().ok()
	}

	fn upgrade(&self, id: NodeId) -> Option<Rc<dyn CustomElement>> {
		if let Some(instance) = self.inner.instances.borrow().get(&id) {
			return Some(Rc::clone(instance));
		}
		let tag = self.inner.nodes.borrow()[id.0].tag()?.to_string();
		let factory = self
			.inner
			.definitions
			.borrow()
			.get(&tag)
			.map(|definition| Rc::clone(&definition.factory))?;
		let instance = factory(self.node(id));
		self.inner
			.instances
			.borrow_mut()
			.insert(id, Rc::clone(&instance));
		Some(instance)
	}

	fn observes(&self, tag: &str, attribute: &str) -> bool {
		self.inner
			.definitions
			.borrow()
			.get(tag)
			.is_some_and(|definition| definition.observed_attributes.iter().any(|a| a == attribute))
	}

	fn instance(&self, id: NodeId) -> Option<Rc<dyn CustomElement>> {
		self.inner.instances.borrow().get(&id).cloned()
	}

	fn connected_reactions(&self, root: &Node) {
		if self.inner.definitions.borrow().is_empty() {
			return;
		}
		let mut targets = vec![root.clone()];
		targets.extend(root.descendants());
		for node in targets {
			if !node.is_element() || !node.is_connected() {
				continue;
			}
			if let Some(instance) = self.upgrade(node.id) {
				instance.connected_callback();
			}
		}
	}

	fn disconnected_reactions(&self, root: &Node) {
		let mut targets = vec![root.clone()];
		targets.extend(root.descendants());
		for node in targets {
			if let Some(instance) = self.instance(node.id) {
				instance.disconnected_callback();
			}
		}
	}

	fn queue_child_list(&self, target: NodeId, added: Vec<Node>, removed: Vec<Node>) {
		let observers: Vec<Rc<ObserverShared>> = self
			.inner
			.observers
			.borrow()
			.iter()
			.filter(|o| o.observes(target))
			.cloned()
			.collect();
		for shared in observers {
			let record = MutationRecord {
				target: self.node(target),
				added_nodes: added.clone(),
				removed_nodes: removed.clone(),
			};
			MutationObserver::enqueue(self, shared, record);
		}
	}

	fn make_listener<F>(&self, event_type: &str, callback: F, options: ListenerOptions) -> Listener
	where
		F: Fn(&Event) + 'static,
	{
		Listener {
			event_type: event_type.to_string(),
			callback: Rc::new(callback),
			once: options.once,
		}
	}

	/// Registers a listener on the window (the global event target).
	pub fn add_window_listener<F>(&self, event_type: &str, callback: F, options: ListenerOptions)
	where
		F: Fn(&Event) + 'static,
	{
		let listener = self.make_listener(event_type, callback, options);
		self.inner.window_listeners.borrow_mut().push(listener);
	}

	/// Dispatches `event` on the window.
	pub fn dispatch_window_event(&self, event: &Event) {
		let callbacks = event::take_matching(&mut self.inner.window_listeners.borrow_mut(), event);
		run_callbacks(callbacks, event);
	}

	/// Spawns a task on the microtask pool. An `Err` outcome is reported to
	/// the rejection channel.
	pub fn spawn<F>(&self, task: F)
	where
		F: Future<Output = HydrationResult<()>> + 'static,
	{
		let document = self.clone();
		self.inner.event_loop.spawn(async move {
			if let Err(err) = task.await {
				document.inner.event_loop.reject(err);
			}
		});
	}

	/// Queues `task` as a macrotask.
	pub fn set_timeout<F>(&self, task: F)
	where
		F: FnOnce() + 'static,
	{
		self.inner.event_loop.set_timeout(task);
	}

	/// Runs microtasks until none can make progress. Macrotasks stay queued.
	pub fn run_microtasks(&self) {
		self.inner.event_loop.run_microtasks();
	}

	/// Drains microtasks, then runs the next macrotask. Returns whether a
	/// macrotask ran.
	pub fn run_next_macrotask(&self) -> bool {
		self.inner.event_loop.run_microtasks() && self.inner.event_loop.run_next_macrotask()
	}

	/// Runs the event loop until both queues are empty.
	///
	/// Must not be called from inside a task; a re-entrant call returns
	/// without running anything.
	pub fn run_until_idle(&self) {
		self.inner.event_loop.run_until_idle();
	}

	/// Number of queued macrotasks.
	pub fn pending_macrotasks(&self) -> usize {
		self.inner.event_loop.pending_macrotasks()
	}

	/// Reports an error outside of a spawned task.
	pub(crate) fn report(&self, err: HydrationError) {
		self.inner.event_loop.reject(err);
	}

	/// Takes the errors of failed tasks reported so far.
	pub fn take_rejections(&self) -> Vec<HydrationError> {
		self.inner.event_loop.take_rejections()
	}
}

fn run_callbacks(callbacks: Vec<EventCallback>, event: &Event) {
	for callback in callbacks {
		callback(event);
	}
}

/// A handle to a node of a [`Document`].
#[derive(Clone)]
pub struct Node {
	document: Document,
	id: NodeId,
}

impl PartialEq for Node {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id && self.document == other.document
	}
}

impl Eq for Node {}

impl fmt::Debug for Node {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let nodes = self.document.inner.nodes.borrow();
		match &nodes[self.id.0].kind {
			NodeKind::Document => write!(f, "#document"),
			NodeKind::Element { tag, .. } => write!(f, "<{}>#{}", tag, self.id.0),
			NodeKind::Text(text) => write!(f, "#text({:?})", text),
			NodeKind::Comment(text) => write!(f, "#comment({:?})", text),
		}
	}
}

impl Node {
	/// The document owning this node.
	pub fn owner_document(&self) -> Document {
		self.document.clone()
	}

	fn with_data<R>(&self, f: impl FnOnce(&NodeData) -> R) -> R {
		f(&self.document.inner.nodes.borrow()[self.id.0])
	}

	fn handle(&self, id: NodeId) -> Node {
		self.document.node(id)
	}

	/// The node's kind and payload.
	pub fn kind(&self) -> NodeKind {
		self.with_data(|data| data.kind.clone())
	}

	/// Whether this node is an element.
	pub fn is_element(&self) -> bool {
		self.with_data(|data| matches!(data.kind, NodeKind::Element { .. }))
	}

	/// The element's tag name, `None` for other node kinds.
	pub fn tag_name(&self) -> Option<String> {
		self.with_data(|data| data.tag().map(str::to_string))
	}

	/// Returns an attribute value.
	pub fn get_attribute(&self, name: &str) -> Option<String> {
		self.with_data(|data| match &data.kind {
			NodeKind::Element { attrs, .. } => attrs
				.iter()
				.find(|(n, _)| n == name)
				.map(|(_, v)| v.clone()),
			_ => None,
		})
	}

	/// Whether the attribute is present.
	pub fn has_attribute(&self, name: &str) -> bool {
		self.with_data(|data| match &data.kind {
			NodeKind::Element { attrs, .. } => attrs.iter().any(|(n, _)| n == name),
			_ => false,
		})
	}

	/// Writes an attribute without running custom element reactions.
	/// Returns the previous value.
	pub(crate) fn write_attribute(&self, name: &str, value: &str) -> Option<String> {
		let mut nodes = self.document.inner.nodes.borrow_mut();
		let NodeKind::Element { attrs, .. } = &mut nodes[self.id.0].kind else {
			return None;
		};
		match attrs.iter_mut().find(|(n, _)| n == name) {
			Some((_, existing)) => Some(std::mem::replace(existing, value.to_string())),
			None => {
				attrs.push((name.to_string(), value.to_string()));
				None
			}
		}
	}

	/// Sets an attribute. Observed attributes of custom elements trigger
	/// `attribute_changed_callback`.
	pub fn set_attribute(&self, name: &str, value: &str) {
		if !self.is_element() {
			return;
		}
		let old = self.write_attribute(name, value);
		self.attribute_changed(name, old.as_deref(), Some(value));
	}

	/// Removes an attribute. Observed attributes of custom elements trigger
	/// `attribute_changed_callback`.
	pub fn remove_attribute(&self, name: &str) {
		let old = {
			let mut nodes = self.document.inner.nodes.borrow_mut();
			let NodeKind::Element { attrs, .. } = &mut nodes[self.id.0].kind else {
				return;
			};
			match attrs.iter().position(|(n, _)| n == name) {
				Some(index) => attrs.remove(index).1,
				None => return,
			}
		};
		self.attribute_changed(name, Some(&old), None);
	}

	fn attribute_changed(&self, name: &str, old: Option<&str>, new: Option<&str>) {
		let Some(instance) = self.document.instance(self.id) else {
			return;
		};
		let observed = self
			.tag_name()
			.is_some_and(|tag| self.document.observes(&tag, name));
		if observed {
			instance.attribute_changed_callback(name, old, new);
		}
	}

	/// The parent node.
	pub fn parent_node(&self) -> Option<Node> {
		self.with_data(|data| data.parent)
			.map(|id| self.handle(id))
	}

	/// The parent, if it is an element.
	pub fn parent_element(&self) -> Option<Node> {
		self.parent_node().filter(Node::is_element)
	}

	/// Child nodes in order.
	pub fn child_nodes(&self) -> Vec<Node> {
		self.with_data(|data| data.children.clone())
			.into_iter()
			.map(|id| self.handle(id))
			.collect()
	}

	/// Element children in order.
	pub fn children(&self) -> Vec<Node> {
		self.child_nodes()
			.into_iter()
			.filter(Node::is_element)
			.collect()
	}

	/// The first child node.
	pub fn first_child(&self) -> Option<Node> {
		self.with_data(|data| data.children.first().copied())
			.map(|id| self.handle(id))
	}

	/// Whether the node is in its document's tree.
	pub fn is_connected(&self) -> bool {
		let nodes = self.document.inner.nodes.borrow();
		let mut current = Some(self.id);
		while let Some(id) = current {
			if id == ROOT {
				return true;
			}
			current = nodes[id.0].parent;
		}
		false
	}

	/// Whether `other` is this node or one of its descendants.
	pub fn contains(&self, other: &Node) -> bool {
		if self.document != other.document {
			return false;
		}
		let nodes = self.document.inner.nodes.borrow();
		let mut current = Some(other.id);
		while let Some(id) = current {
			if id == self.id {
				return true;
			}
			current = nodes[id.0].parent;
		}
		false
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

	/// Descendants in tree order, excluding this node.
	///
	/// Template contents are inert: a `<template>` element is yielded but
	/// its children are not.
	pub fn descendants(&self) -> Vec<Node> {
		let nodes = self.document.inner.nodes.borrow();
		let mut out = Vec::new();
		let mut stack: Vec<NodeId> = nodes[self.id.0].children.iter().rev().copied().collect();
		while let Some(id) = stack.pop() {
			out.push(id);
			let data = &nodes[id.0];
			if data.tag() == Some("template") {
				continue;
			}
			stack.extend(data.children.iter().rev().copied());
		}
		drop(nodes);
		out.into_iter().map(|id| self.handle(id)).collect()
	}

	/// Descendant elements matching `predicate`, in tree order.
	pub fn query_all<P>(&self, predicate: P) -> Vec<Node>
	where
		P: Fn(&Node) -> bool,
	{
		self.descendants()
			.into_iter()
			.filter(|node| node.is_element() && predicate(node))
			.collect()
	}

	/// Serialized children.
	pub fn inner_html(&self) -> String {
		let nodes = self.document.inner.nodes.borrow();
		let mut out = String::new();
		html::serialize_children(&nodes, &nodes[self.id.0], &mut out);
		out
	}

	/// Serialized node including itself.
	pub fn outer_html(&self) -> String {
		let nodes = self.document.inner.nodes.borrow();
		let mut out = String::new();
		html::serialize_node(&nodes, &nodes[self.id.0], false, &mut out);
		out
	}

	/// Replaces all children with the parsed `html` fragment.
	pub fn set_inner_html(&self, html: &str) {
		for child in self.child_nodes() {
			child.remove();
		}
		for node in self.document.parse_fragment(html) {
			self.attach(&node, None);
		}
	}

	/// Parses `html` and appends the result after the existing children.
	pub fn append_html(&self, html: &str) {
		for node in self.document.parse_fragment(html) {
			self.attach(&node, None);
		}
	}

	/// Appends `child`, moving it from its current parent if it has one.
	pub fn append_child(&self, child: &Node) -> Result<(), DomError> {
		self.insert_before(child, None)
	}

	/// Inserts `child` before `reference` (or at the end when `None`).
	pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<(), DomError> {
		if self.document != child.document {
			return Err(DomError::HierarchyRequest(
				"node belongs to another document".to_string(),
			));
		}
		if child.contains(self) {
			return Err(DomError::HierarchyRequest(
				"a node cannot be inserted into itself or its descendants".to_string(),
			));
		}
		if !matches!(self.kind(), NodeKind::Element { .. } | NodeKind::Document) {
			return Err(DomError::HierarchyRequest(
				"only elements and the document can have children".to_string(),
			));
		}
		if let Some(reference) = reference {
			if reference.parent_node().as_ref() != Some(self) {
				return Err(DomError::NotFound);
			}
		}

		if child.parent_node().is_some() {
			child.remove();
		}
		self.attach(child, reference);
		Ok(())
	}

	/// Moves a freshly created node under this one without reactions or
	/// mutation records. Only valid while both nodes are detached.
	pub(crate) fn adopt_detached(&self, child: &Node) {
		let mut nodes = self.document.inner.nodes.borrow_mut();
		nodes[child.id.0].parent = Some(self.id);
		nodes[self.id.0].children.push(child.id);
	}

	fn attach(&self, child: &Node, reference: Option<&Node>) {
		{
			let mut nodes = self.document.inner.nodes.borrow_mut();
			nodes[child.id.0].parent = Some(self.id);
			let children = &mut nodes[self.id.0].children;
			let index = reference
				.and_then(|r| children.iter().position(|id| *id == r.id))
				.unwrap_or(children.len());
			children.insert(index, child.id);
		}
		self.document
			.queue_child_list(self.id, vec![child.clone()], Vec::new());
		if self.is_connected() {
			self.document.connected_reactions(child);
		}
	}

	/// Detaches the node from its parent. Detached nodes are left as-is.
	pub fn remove(&self) {
		let was_connected = self.is_connected();
		let parent = {
			let mut nodes = self.document.inner.nodes.borrow_mut();
			let Some(parent) = nodes[self.id.0].parent.take() else {
				return;
			};
			nodes[parent.0].children.retain(|id| *id != self.id);
			parent
		};
		self.document
			.queue_child_list(parent, Vec::new(), vec![self.clone()]);
		if was_connected {
			self.document.disconnected_reactions(self);
		}
	}

	/// Registers a listener on this node.
	pub fn add_event_listener<F>(&self, event_type: &str, callback: F, options: ListenerOptions)
	where
		F: Fn(&Event) + 'static,
	{
		let listener = self.document.make_listener(event_type, callback, options);
		self.document.inner.nodes.borrow_mut()[self.id.0]
			.listeners
			.push(listener);
	}

	/// Dispatches `event` on this node. Listeners run synchronously; the
	/// event does not bubble.
	pub fn dispatch_event(&self, event: &Event) {
		let callbacks = {
			let mut nodes = self.document.inner.nodes.borrow_mut();
			event::take_matching(&mut nodes[self.id.0].listeners, event)
		};
		run_callbacks(callbacks, event);
	}
}
