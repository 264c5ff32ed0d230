//! Browser tests for the island element
//!
//! Drives islands through a real document: the element is registered with
//! `customElements`, hydrate events are DOM `CustomEvent`s and
//! `await-children` waits on a browser `MutationObserver`.
//!
//! **Run with**: `wasm-pack test --headless --chrome crates/islet-hydration`

#![cfg(target_arch = "wasm32")]

use async_trait::async_trait;
use gloo_timers::future::TimeoutFuture;
use islet_hydration::{
	DirectiveOptions, Document, Export, HydrationConfig, HydrationError, HydrationResult,
	IslandElement, Module, ModuleMap, MountMeta, Node, Phase, Prepare, Props, Renderer, SlotMap,
	define_island_element, register_directive,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Once;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

thread_local! {
	static MOUNTS: RefCell<Vec<(String, SlotMap)>> = RefCell::new(Vec::new());
}

static DEFINE: Once = Once::new();

struct RecordingRenderer;

#[async_trait(?Send)]
impl Renderer for RecordingRenderer {
	async fn mount(
		&self,
		root: &Node,
		_component: Option<Export>,
		_props: Props,
		slots: SlotMap,
		_meta: &MountMeta,
	) -> HydrationResult<()> {
		let id = root.get_attribute("id").unwrap_or_default();
		MOUNTS.with(|mounts| mounts.borrow_mut().push((id, slots)));
		Ok(())
	}
}

fn load(prepare: Prepare, _options: DirectiveOptions, root: Node) {
	root.owner_document().spawn(async move {
		let hydrate = prepare.call().await?;
		hydrate.call().await
	});
}

/// Defines the island element once per page and clears recorded mounts.
fn setup() -> (Document, Node) {
	let document = Document::current().expect("tests run in a browser window");
	DEFINE.call_once(|| {
		let modules = ModuleMap::new();
		modules.register_module("/Counter.js", Module::new().with_default(Export::value("counter")));
		modules.register_renderer("/renderer.js", RecordingRenderer);
		define_island_element(&document, Rc::new(modules), HydrationConfig::default())
			.expect("island element defined");
		register_directive("load", load);
	});
	MOUNTS.with(|mounts| mounts.borrow_mut().clear());
	document.take_rejections();
	let body = document.body().expect("document has a body");
	(document, body)
}

/// Lets spawned tasks and queued timeouts run.
async fn settle() {
	TimeoutFuture::new(20).await;
}

fn mounted() -> Vec<String> {
	MOUNTS.with(|mounts| mounts.borrow().iter().map(|(id, _)| id.clone()).collect())
}

fn by_id(root: &Node, id: &str) -> Node {
	root.query_all(|node| node.get_attribute("id").as_deref() == Some(id))
		.into_iter()
		.next()
		.unwrap_or_else(|| panic!("no element with id {id}"))
}

// ============================================================================
// Lifecycle
// ============================================================================

#[wasm_bindgen_test]
async fn test_island_hydrates_in_browser() {
	let (document, body) = setup();
	body.set_inner_html(
		r#"<astro-island id="basic" ssr="" client="load" component-url="/Counter.js" renderer-url="/renderer.js"><button>0</button></astro-island>"#,
	);
	let node = by_id(&body, "basic");
	let events = Rc::new(RefCell::new(0));
	{
		let events = events.clone();
		node.add_event_listener(
			"astro:hydrate",
			move |_| *events.borrow_mut() += 1,
			Default::default(),
		);
	}
	settle().await;

	assert_eq!(mounted(), vec!["basic"]);
	assert!(!node.has_attribute("ssr"));
	assert_eq!(*events.borrow(), 1);
	let island = document
		.custom_element::<IslandElement>(&node)
		.expect("island upgraded");
	assert_eq!(island.phase(), Phase::Hydrated);
	assert!(document.take_rejections().is_empty());
}

#[wasm_bindgen_test]
async fn test_nested_islands_hydrate_top_down_in_browser() {
	let (_document, body) = setup();
	body.set_inner_html(
		r#"<astro-island id="outer" ssr="" client="load" component-url="/Counter.js" renderer-url="/renderer.js"><astro-island id="inner" ssr="" client="load" component-url="/Counter.js" renderer-url="/renderer.js"></astro-island></astro-island>"#,
	);
	settle().await;

	assert_eq!(mounted(), vec!["outer", "inner"]);
}

#[wasm_bindgen_test]
async fn test_await_children_waits_for_streamed_content() {
	let (document, body) = setup();
	body.set_inner_html(
		r#"<astro-island id="streamed" ssr="" await-children="" client="load" component-url="/Counter.js" renderer-url="/renderer.js"></astro-island>"#,
	);
	settle().await;

	let node = by_id(&body, "streamed");
	let island = document
		.custom_element::<IslandElement>(&node)
		.expect("island upgraded");
	assert_eq!(island.phase(), Phase::AwaitingChildren);
	assert!(mounted().is_empty());

	node.append_html("<button>0</button>");
	settle().await;

	assert_eq!(mounted(), vec!["streamed"]);
	assert_eq!(island.phase(), Phase::Hydrated);
}

#[wasm_bindgen_test]
async fn test_observed_attribute_change_remounts_in_browser() {
	let (_document, body) = setup();
	body.set_inner_html(
		r#"<astro-island id="again" ssr="" client="load" component-url="/Counter.js" renderer-url="/renderer.js"></astro-island>"#,
	);
	settle().await;

	let node = by_id(&body, "again");
	node.set_attribute("opts", "{}");
	settle().await;
	assert_eq!(mounted(), vec!["again"]);

	node.set_attribute("props", r#"{"label":[0,"second"]}"#);
	settle().await;
	assert_eq!(mounted(), vec!["again", "again"]);
}

// ============================================================================
// Slots and definition
// ============================================================================

#[wasm_bindgen_test]
async fn test_template_slots_reach_renderer_in_browser() {
	let (_document, body) = setup();
	body.set_inner_html(
		r#"<astro-island id="slotted" ssr="" client="load" component-url="/Counter.js" renderer-url="/renderer.js"><template data-astro-template="header">transported header</template><template data-astro-template><p>body</p></template></astro-island>"#,
	);
	settle().await;

	let slots = MOUNTS.with(|mounts| mounts.borrow()[0].1.clone());
	assert_eq!(slots["header"], "transported header");
	assert_eq!(slots["default"], "<p>body</p>");
	let node = by_id(&body, "slotted");
	assert!(
		node.query_all(|n| n.tag_name().as_deref() == Some("template"))
			.is_empty()
	);
}

#[wasm_bindgen_test]
fn test_second_definition_is_rejected() {
	let (document, _body) = setup();

	let err = define_island_element(
		&document,
		Rc::new(ModuleMap::new()),
		HydrationConfig::default(),
	)
	.unwrap_err();

	assert_eq!(
		err,
		HydrationError::Config("custom element 'astro-island' is already defined".to_string())
	);
}
