//! Island custom element.
//!
//! One [`IslandElement`] backs every island tag in the document. It owns the
//! island's whole lifecycle:
//!
//! ```text
//! Connecting
//!   └─► AwaitingChildren   (await-children, no children yet)
//!         └─► AwaitingDirective   (before-hydration import, then `client` lookup)
//!               └─► AwaitingAncestor   (an enclosing island still has `ssr`)
//!                     └─► Hydrating ─► Hydrated
//! ```
//!
//! The directive decides when `prepare` runs and when the resulting
//! [`Hydrate`] handle is invoked. Hydration is re-entrant: the directive, the
//! ancestor's `astro:hydrate` event and observed attribute mutations all
//! reach the same guarded `hydrate` transition, and every entry re-checks the
//! guards from the top.

use crate::config::HydrationConfig;
use crate::directive::{self, DirectiveOptions, Hydrate, Prepare};
use crate::dom::{
	CustomElement, Document, DomError, ElementFactory, Event, ListenerOptions, MutationObserver,
	Node,
};
use crate::error::{HydrationError, HydrationResult};
use crate::invoker::{ComponentRequest, HydrationInvoker, ResolvedComponent};
use crate::loader::ModuleLoader;
use crate::markers::{
	ATTR_AWAIT_CHILDREN, ATTR_BEFORE_HYDRATION_URL, ATTR_CLIENT, ATTR_COMPONENT_EXPORT,
	ATTR_COMPONENT_URL, ATTR_OPTS, ATTR_PROPS, ATTR_RENDERER_URL, ATTR_SSR, DEFAULT_EXPORT,
};
use crate::props::{Props, revive_props};
use crate::slots::extract_slots;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Lifecycle phase of an island.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
	/// Instantiated, connection in progress.
	Connecting,
	/// Waiting for streamed children to arrive.
	AwaitingChildren,
	/// Waiting for the directive to be registered or to fire.
	AwaitingDirective,
	/// Waiting for the nearest enclosing island to finish hydrating.
	AwaitingAncestor,
	/// Mount in progress.
	Hydrating,
	/// Mounted; observed attribute changes hydrate again.
	Hydrated,
}

/// The custom element instance behind an island tag.
pub struct IslandElement {
	node: Node,
	config: Rc<HydrationConfig>,
	loader: Rc<dyn ModuleLoader>,
	invoker: HydrationInvoker,
	phase: Cell<Phase>,
	resolved: RefCell<Option<ResolvedComponent>>,
	/// A listener on the pending ancestor's hydrate event is registered.
	ancestor_listener: Cell<bool>,
}

impl fmt::Debug for IslandElement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IslandElement")
			.field("node", &self.node)
			.field("phase", &self.phase.get())
			.field("resolved", &self.resolved.borrow().is_some())
			.finish_non_exhaustive()
	}
}

impl IslandElement {
	fn new(node: Node, loader: Rc<dyn ModuleLoader>, config: Rc<HydrationConfig>) -> Self {
		Self {
			node,
			config,
			invoker: HydrationInvoker::new(Rc::clone(&loader)),
			loader,
			phase: Cell::new(Phase::Connecting),
			resolved: RefCell::new(None),
			ancestor_listener: Cell::new(false),
		}
	}

	/// Current lifecycle phase.
	pub fn phase(&self) -> Phase {
		self.phase.get()
	}

	/// The island's DOM node.
	pub fn node(&self) -> &Node {
		&self.node
	}

	/// Whether `prepare` has resolved the component and renderer.
	pub fn is_prepared(&self) -> bool {
		self.resolved.borrow().is_some()
	}

	fn set_phase(&self, phase: Phase) {
		if self.phase.replace(phase) != phase {
			tracing::debug!(
				component = %self.component_url(),
				phase = ?phase,
				"island phase changed"
			);
		}
	}

	fn component_url(&self) -> String {
		self.node
			.get_attribute(ATTR_COMPONENT_URL)
			.unwrap_or_default()
	}

	fn client(&self) -> String {
		self.node.get_attribute(ATTR_CLIENT).unwrap_or_default()
	}

	/// Runs once the island's server-rendered children are in place.
	async fn children_connected(self: Rc<Self>) -> HydrationResult<()> {
		if let Some(url) = self
			.node
			.get_attribute(ATTR_BEFORE_HYDRATION_URL)
			.filter(|url| !url.is_empty())
		{
			tracing::debug!(specifier = %url, "importing before-hydration module");
			self.loader.import(&url).await?;
		}
		self.start()
	}

	/// Starts the island after the first child-list mutation, one macrotask
	/// later so the streamed children have settled.
	fn await_children(self: &Rc<Self>, document: &Document) -> Result<(), DomError> {
		let island = Rc::clone(self);
		let observer = MutationObserver::new(document, move |_records, observer| {
			observer.disconnect();
			let island = Rc::clone(&island);
			island.node.owner_document().set_timeout(move || {
				let document = island.node.owner_document();
				document.spawn(island.children_connected());
			});
		})?;
		observer.observe(&self.node)
	}

	/// Hands the island to its directive, or waits for the directive to be
	/// announced.
	fn start(self: &Rc<Self>) -> HydrationResult<()> {
		self.set_phase(Phase::AwaitingDirective);
		let options = self.options()?;
		let client = self.client();

		let Some(scheduler) = directive::directive(&client) else {
			tracing::debug!(directive = %client, "directive not registered yet, waiting");
			let island = Rc::clone(self);
			self.node.owner_document().add_window_listener(
				&self.config.directive_event(&client),
				move |_| {
					let island = Rc::clone(&island);
					island
						.node
						.owner_document()
						.spawn(async move { island.start() });
				},
				ListenerOptions::once(),
			);
			return Ok(());
		};

		scheduler.schedule(self.prepare_handle(), options, self.node.clone());
		Ok(())
	}

	fn options(&self) -> HydrationResult<DirectiveOptions> {
		let Some(raw) = self.node.get_attribute(ATTR_OPTS) else {
			return Ok(DirectiveOptions::Object(Default::default()));
		};
		serde_json::from_str(&raw).map_err(|err| HydrationError::OptionsParse {
			component: self.component_url(),
			message: err.to_string(),
		})
	}

	fn request(&self) -> HydrationResult<ComponentRequest> {
		let component_url = self
			.node
			.get_attribute(ATTR_COMPONENT_URL)
			.ok_or(HydrationError::MissingAttribute(ATTR_COMPONENT_URL))?;
		Ok(ComponentRequest {
			component_url,
			renderer_url: self.node.get_attribute(ATTR_RENDERER_URL),
			export: self
				.node
				.get_attribute(ATTR_COMPONENT_EXPORT)
				.unwrap_or_else(|| DEFAULT_EXPORT.to_string()),
		})
	}

	fn prepare_handle(self: &Rc<Self>) -> Prepare {
		let island = Rc::clone(self);
		Prepare::new(move || Rc::clone(&island).prepare())
	}

	fn hydrate_handle(self: &Rc<Self>) -> Hydrate {
		let island = Rc::clone(self);
		Hydrate::new(move || Rc::clone(&island).hydrate())
	}

	async fn prepare(self: Rc<Self>) -> HydrationResult<Hydrate> {
		let request = self.request()?;
		let resolved = self.invoker.resolve(&request).await?;
		*self.resolved.borrow_mut() = Some(resolved);
		Ok(self.hydrate_handle())
	}

	fn props(&self) -> HydrationResult<Props> {
		let Some(raw) = self.node.get_attribute(ATTR_PROPS) else {
			return Ok(Props::new());
		};
		let value: serde_json::Value =
			serde_json::from_str(&raw).map_err(|err| HydrationError::PropsParse {
				component: self.component_url(),
				message: err.to_string(),
			})?;
		Ok(revive_props(&value))
	}

	/// The nearest enclosing island that has not finished hydrating.
	fn pending_ancestor(&self) -> Option<Node> {
		let island_tag = self.config.island_tag.as_str();
		self.node.parent_element()?.closest(|node| {
			node.tag_name().as_deref() == Some(island_tag) && node.has_attribute(ATTR_SSR)
		})
	}

	async fn hydrate(self: Rc<Self>) -> HydrationResult<()> {
		let resolved = self.resolved.borrow().clone();
		let Some(resolved) = resolved else {
			return Ok(());
		};
		if !self.node.is_connected() {
			return Ok(());
		}
		if let Some(ancestor) = self.pending_ancestor() {
			self.set_phase(Phase::AwaitingAncestor);
			// Re-entries while waiting share the one listener.
			if self.ancestor_listener.replace(true) {
				return Ok(());
			}
			let island = Rc::clone(&self);
			ancestor.add_event_listener(
				&self.config.hydrate_event,
				move |_| {
					island.ancestor_listener.set(false);
					let island = Rc::clone(&island);
					island.node.owner_document().spawn(island.hydrate());
				},
				ListenerOptions::once(),
			);
			return Ok(());
		}

		self.set_phase(Phase::Hydrating);
		let slots = extract_slots(&self.node, &self.config);
		let props = self.props()?;
		let client = self.client();
		self.invoker
			.mount(&self.node, &resolved, props, slots, &client)
			.await?;

		self.node.remove_attribute(ATTR_SSR);
		self.node
			.dispatch_event(&Event::new(self.config.hydrate_event.clone()));
		self.set_phase(Phase::Hydrated);
		Ok(())
	}
}

impl CustomElement for IslandElement {
	fn connected_callback(self: Rc<Self>) {
		self.set_phase(Phase::Connecting);
		let document = self.node.owner_document();

		if self.node.has_attribute(ATTR_AWAIT_CHILDREN) && self.node.first_child().is_none() {
			self.set_phase(Phase::AwaitingChildren);
			if let Err(err) = self.await_children(&document) {
				document.report(err.into());
			}
			return;
		}

		document.spawn(self.children_connected());
	}

	fn attribute_changed_callback(
		self: Rc<Self>,
		name: &str,
		_old_value: Option<&str>,
		_new_value: Option<&str>,
	) {
		tracing::debug!(attribute = name, "observed attribute changed, hydrating again");
		let document = self.node.owner_document();
		document.spawn(self.hydrate());
	}

	fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
		self
	}
}

/// Defines the island custom element on `document`.
///
/// Islands already in the document are upgraded immediately.
///
/// # Arguments
///
/// * `document` - The document to define the element on
/// * `loader` - Loads component modules, renderers and before-hydration modules
/// * `config` - Tag, marker and event names; validated before use
pub fn define_island_element(
	document: &Document,
	loader: Rc<dyn ModuleLoader>,
	config: HydrationConfig,
) -> HydrationResult<()> {
	config.validate()?;
	let config = Rc::new(config);
	let tag = config.island_tag.clone();
	let observed_attributes = config.observed_attributes.clone();

	let factory: ElementFactory = Rc::new(move |node: Node| {
		Rc::new(IslandElement::new(node, Rc::clone(&loader), Rc::clone(&config)))
			as Rc<dyn CustomElement>
	});
	document
		.define(&tag, &observed_attributes, factory)
		.map_err(|err| HydrationError::Config(err.to_string()))
}
