//! Shared harness for island integration tests
//!
//! Builds a document with the island element defined over a [`ModuleMap`]
//! holding one component module and one recording renderer, and provides
//! directives whose timing the tests control.

#![allow(dead_code)]

use async_trait::async_trait;
use islet_hydration::{
	DirectiveOptions, Document, Export, HydrationConfig, HydrationError, HydrationResult, Module,
	ModuleMap, MountMeta, Node, Prepare, PropValue, Props, Renderer, SlotMap,
	define_island_element, register_directive,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Component marker stored in module exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component(pub &'static str);

/// One call to [`RecordingRenderer::mount`].
#[derive(Debug, Clone)]
pub struct MountRecord {
	/// `id` attribute of the island mounted.
	pub island: String,
	/// Marker of the component handed to the renderer.
	pub component: Option<Component>,
	/// Revived props.
	pub props: Props,
	/// Extracted slots.
	pub slots: SlotMap,
	/// Directive name from the mount metadata.
	pub client: String,
}

/// Renderer that records every mount.
pub struct RecordingRenderer {
	mounts: Rc<RefCell<Vec<MountRecord>>>,
}

#[async_trait(?Send)]
impl Renderer for RecordingRenderer {
	async fn mount(
		&self,
		root: &Node,
		component: Option<Export>,
		props: Props,
		slots: SlotMap,
		meta: &MountMeta,
	) -> HydrationResult<()> {
		self.mounts.borrow_mut().push(MountRecord {
			island: root.get_attribute("id").unwrap_or_default(),
			component: component
				.as_ref()
				.and_then(|c| c.downcast_ref::<Component>())
				.copied(),
			props,
			slots,
			client: meta.client.clone(),
		});
		Ok(())
	}
}

/// Renderer whose mounts always fail with the message `boom`.
pub struct FailingRenderer;

#[async_trait(?Send)]
impl Renderer for FailingRenderer {
	async fn mount(
		&self,
		root: &Node,
		_component: Option<Export>,
		_props: Props,
		_slots: SlotMap,
		_meta: &MountMeta,
	) -> HydrationResult<()> {
		Err(HydrationError::render(
			root.get_attribute("component-url").unwrap_or_default(),
			"boom",
		))
	}
}

/// A document with islands defined and a recording renderer registered.
pub struct Harness {
	pub document: Document,
	pub modules: Rc<ModuleMap>,
	pub config: HydrationConfig,
	pub mounts: Rc<RefCell<Vec<MountRecord>>>,
}

impl Harness {
	pub fn new() -> Self {
		init_tracing();

		let mounts = Rc::new(RefCell::new(Vec::new()));
		let modules = Rc::new(ModuleMap::new());
		modules.register_module(
			"/Counter.js",
			Module::new()
				.with_default(Export::value(Component("counter")))
				.with_export(
					"Widget",
					Export::namespace([("Sub", Export::value(Component("widget-sub")))]),
				),
		);
		modules.register_renderer(
			"/renderer.js",
			RecordingRenderer {
				mounts: mounts.clone(),
			},
		);

		let document = Document::new();
		let config = HydrationConfig::default();
		define_island_element(&document, modules.clone(), config.clone())
			.expect("default config defines the island element");
		register_directive("load", load);

		Self {
			document,
			modules,
			config,
			mounts,
		}
	}

	/// Replaces the body with `html`.
	pub fn render(&self, html: &str) {
		self.document.body().set_inner_html(html);
	}

	/// The element with the given `id`.
	pub fn element(&self, id: &str) -> Node {
		self.document
			.body()
			.query_all(|node| node.get_attribute("id").as_deref() == Some(id))
			.into_iter()
			.next()
			.unwrap_or_else(|| panic!("no element with id {id}"))
	}

	/// Ids of mounted islands, in mount order.
	pub fn mounted(&self) -> Vec<String> {
		self.mounts
			.borrow()
			.iter()
			.map(|record| record.island.clone())
			.collect()
	}

	/// Records every `astro:hydrate` dispatched on the given islands.
	pub fn record_hydrate_events(&self, ids: &[&str]) -> Rc<RefCell<Vec<String>>> {
		let events = Rc::new(RefCell::new(Vec::new()));
		for id in ids {
			let events = events.clone();
			let name = id.to_string();
			self.element(id).add_event_listener(
				&self.config.hydrate_event,
				move |_| events.borrow_mut().push(name.clone()),
				Default::default(),
			);
		}
		events
	}
}

/// Island markup with the recording renderer.
pub fn island(id: &str, client: &str, inner: &str) -> String {
	format!(
		r#"<astro-island id="{id}" ssr="" client="{client}" component-url="/Counter.js" renderer-url="/renderer.js">{inner}</astro-island>"#
	)
}

/// Hydrates as soon as the island starts.
pub fn load(prepare: Prepare, _options: DirectiveOptions, root: Node) {
	root.owner_document().spawn(async move {
		let hydrate = prepare.call().await?;
		hydrate.call().await
	});
}

/// Directive that parks each island until the test releases it.
#[derive(Clone, Default)]
pub struct Deferred {
	parked: Rc<RefCell<Vec<(Prepare, DirectiveOptions, Node)>>>,
}

impl Deferred {
	/// Registers this directive under `name`.
	pub fn register(name: &str) -> Self {
		let deferred = Self::default();
		let parked = deferred.parked.clone();
		register_directive(name, move |prepare: Prepare, options: DirectiveOptions, root: Node| {
			parked.borrow_mut().push((prepare, options, root));
		});
		deferred
	}

	/// Islands parked so far, in scheduling order.
	pub fn parked(&self) -> Vec<Node> {
		self.parked
			.borrow()
			.iter()
			.map(|(_, _, root)| root.clone())
			.collect()
	}

	/// Options handed to the directive for `root`.
	pub fn options(&self, root: &Node) -> Option<DirectiveOptions> {
		self.parked
			.borrow()
			.iter()
			.find(|(_, _, parked)| parked == root)
			.map(|(_, options, _)| options.clone())
	}

	/// Prepares and hydrates `root`.
	pub fn release(&self, root: &Node) {
		let prepare = self.prepare(root);
		root.owner_document().spawn(async move {
			let hydrate = prepare.call().await?;
			hydrate.call().await
		});
	}

	/// The prepare callback parked for `root`.
	pub fn prepare(&self, root: &Node) -> Prepare {
		self.parked
			.borrow()
			.iter()
			.find(|(_, _, parked)| parked == root)
			.map(|(prepare, _, _)| prepare.clone())
			.unwrap_or_else(|| panic!("{root:?} was not scheduled"))
	}
}

/// Reads a revived string prop.
pub fn string_prop(record: &MountRecord, name: &str) -> Option<String> {
	match record.props.get(name) {
		Some(PropValue::String(value)) => Some(value.clone()),
		_ => None,
	}
}

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}
