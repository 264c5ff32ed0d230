//! Integration tests for the island lifecycle
//!
//! These tests drive whole documents through the event loop and verify:
//! 1. Nested islands complete hydration top-down
//! 2. `await-children` defers start to a macrotask after the first mutation
//! 3. Guards turn premature or orphaned hydration into no-ops
//! 4. Slots, props and exports reach the renderer
//! 5. Late directive registration, pre-hydration imports and failures

#![cfg(not(target_arch = "wasm32"))]

mod utils;

use islet_hydration::{
	HydrationError, IslandElement, Module, Phase, PropValue, install_directive,
};
use rstest::*;
use utils::{Deferred, Harness, island, string_prop};

#[fixture]
fn harness() -> Harness {
	Harness::new()
}

// ============================================================================
// Ordering
// ============================================================================

#[rstest]
fn test_nested_islands_hydrate_top_down(harness: Harness) {
	let deferred = Deferred::register("deferred");
	harness.render(&island("outer", "deferred", &island("inner", "deferred", "")));
	let events = harness.record_hydrate_events(&["outer", "inner"]);
	harness.document.run_until_idle();

	let inner = harness.element("inner");
	let outer = harness.element("outer");

	deferred.release(&inner);
	harness.document.run_until_idle();
	assert!(harness.mounted().is_empty());
	let inner_island = harness
		.document
		.custom_element::<IslandElement>(&inner)
		.unwrap();
	assert_eq!(inner_island.phase(), Phase::AwaitingAncestor);

	deferred.release(&outer);
	harness.document.run_until_idle();

	assert_eq!(harness.mounted(), vec!["outer", "inner"]);
	assert_eq!(*events.borrow(), vec!["outer", "inner"]);
	assert!(!inner.has_attribute("ssr"));
	assert!(harness.document.take_rejections().is_empty());
}

#[rstest]
fn test_attribute_changes_while_awaiting_ancestor_mount_once(harness: Harness) {
	let deferred = Deferred::register("deferred");
	harness.render(&island("outer", "deferred", &island("inner", "deferred", "")));
	harness.document.run_until_idle();

	let inner = harness.element("inner");
	deferred.release(&inner);
	harness.document.run_until_idle();
	for label in ["a", "b", "c"] {
		inner.set_attribute("props", &format!(r#"{{"label":[0,"{label}"]}}"#));
		harness.document.run_until_idle();
	}
	assert!(harness.mounted().is_empty());

	deferred.release(&harness.element("outer"));
	harness.document.run_until_idle();

	assert_eq!(harness.mounted(), vec!["outer", "inner"]);
	assert_eq!(
		string_prop(&harness.mounts.borrow()[1], "label").as_deref(),
		Some("c")
	);
}

#[rstest]
fn test_child_of_hydrated_island_mounts_immediately(harness: Harness) {
	let deferred = Deferred::register("deferred");
	harness.render(&island("outer", "load", &island("inner", "deferred", "")));
	harness.document.run_until_idle();
	assert_eq!(harness.mounted(), vec!["outer"]);

	deferred.release(&harness.element("inner"));
	harness.document.run_until_idle();

	assert_eq!(harness.mounted(), vec!["outer", "inner"]);
}

// ============================================================================
// await-children
// ============================================================================

#[rstest]
fn test_await_children_defers_to_macrotask(harness: Harness) {
	harness.render(
		r#"<astro-island id="streamed" ssr="" await-children="" client="load" component-url="/Counter.js" renderer-url="/renderer.js"></astro-island>"#,
	);
	harness.document.run_until_idle();

	let node = harness.element("streamed");
	let element = harness
		.document
		.custom_element::<IslandElement>(&node)
		.unwrap();
	assert_eq!(element.phase(), Phase::AwaitingChildren);
	assert!(harness.mounted().is_empty());

	node.append_html("<button>0</button>");
	harness.document.run_microtasks();
	assert!(harness.mounted().is_empty());
	assert_eq!(harness.document.pending_macrotasks(), 1);

	harness.document.run_until_idle();
	assert_eq!(harness.mounted(), vec!["streamed"]);
	assert_eq!(element.phase(), Phase::Hydrated);
}

#[rstest]
fn test_await_children_with_children_starts_immediately(harness: Harness) {
	harness.render(
		r#"<astro-island id="ready" ssr="" await-children="" client="load" component-url="/Counter.js" renderer-url="/renderer.js"><button>0</button></astro-island>"#,
	);
	harness.document.run_microtasks();

	assert_eq!(harness.mounted(), vec!["ready"]);
	assert_eq!(harness.document.pending_macrotasks(), 0);
}

// ============================================================================
// Guards
// ============================================================================

#[rstest]
fn test_attribute_change_before_prepare_is_noop(harness: Harness) {
	Deferred::register("deferred");
	harness.render(&island("early", "deferred", ""));
	harness.document.run_until_idle();

	let node = harness.element("early");
	node.set_attribute("props", r#"{"label":[0,"x"]}"#);
	harness.document.run_until_idle();

	assert!(harness.mounted().is_empty());
	assert!(node.has_attribute("ssr"));
	assert!(harness.document.take_rejections().is_empty());
}

#[rstest]
fn test_hydrate_after_removal_is_noop(harness: Harness) {
	let deferred = Deferred::register("deferred");
	harness.render(&island("gone", "deferred", ""));
	harness.document.run_until_idle();

	let node = harness.element("gone");
	let prepare = deferred.prepare(&node);
	let hydrate = futures::executor::block_on(prepare.call()).unwrap();

	node.remove();
	harness.document.spawn(async move { hydrate.call().await });
	harness.document.run_until_idle();

	assert!(harness.mounted().is_empty());
	assert!(harness.document.take_rejections().is_empty());
}

// ============================================================================
// Slots, props and exports
// ============================================================================

#[rstest]
fn test_mount_receives_slots(harness: Harness) {
	harness.render(&island(
		"slotted",
		"load",
		r#"<astro-slot name="header">live header</astro-slot><template data-astro-template="header">transported header</template><template data-astro-template><p>body</p></template>"#,
	));
	harness.document.run_until_idle();

	let mounts = harness.mounts.borrow();
	let slots = &mounts[0].slots;
	assert_eq!(slots["header"], "transported header");
	assert_eq!(slots["default"], "<p>body</p>");

	let node = harness.element("slotted");
	assert!(
		node.query_all(|n| n.tag_name().as_deref() == Some("template"))
			.is_empty()
	);
	assert_eq!(
		node.query_all(|n| n.tag_name().as_deref() == Some("astro-slot"))
			.len(),
		1
	);
}

#[rstest]
fn test_mount_receives_revived_props_and_client(harness: Harness) {
	harness.render(
		r#"<astro-island id="p" ssr="" client="load" component-url="/Counter.js" renderer-url="/renderer.js" props='{"label":[0,"Clicks"],"tags":[1,[[0,"a"]]]}'></astro-island>"#,
	);
	harness.document.run_until_idle();

	let mounts = harness.mounts.borrow();
	assert_eq!(string_prop(&mounts[0], "label").as_deref(), Some("Clicks"));
	assert_eq!(
		mounts[0].props["tags"],
		PropValue::Array(vec![PropValue::String("a".to_string())])
	);
	assert_eq!(mounts[0].client, "load");
	assert_eq!(mounts[0].component, Some(utils::Component("counter")));
}

#[rstest]
fn test_dotted_export_resolves_namespace_member(harness: Harness) {
	harness.render(
		r#"<astro-island id="w" ssr="" client="load" component-url="/Counter.js" renderer-url="/renderer.js" component-export="Widget.Sub"></astro-island>"#,
	);
	harness.document.run_until_idle();

	assert_eq!(
		harness.mounts.borrow()[0].component,
		Some(utils::Component("widget-sub"))
	);
}

#[rstest]
fn test_load_without_renderer_uses_noop(harness: Harness) {
	harness.render(
		r#"<astro-island id="static" ssr="" client="load" component-url="/Counter.js"></astro-island>"#,
	);
	harness.document.run_until_idle();

	let node = harness.element("static");
	let element = harness
		.document
		.custom_element::<IslandElement>(&node)
		.unwrap();
	assert!(harness.mounted().is_empty());
	assert!(!node.has_attribute("ssr"));
	assert_eq!(element.phase(), Phase::Hydrated);
	assert!(harness.document.take_rejections().is_empty());
}

#[rstest]
fn test_props_change_remounts(harness: Harness) {
	harness.render(&island("again", "load", ""));
	harness.document.run_until_idle();

	harness
		.element("again")
		.set_attribute("props", r#"{"label":[0,"second"]}"#);
	harness.document.run_until_idle();

	let mounts = harness.mounts.borrow();
	assert_eq!(mounts.len(), 2);
	assert!(mounts[0].props.is_empty());
	assert_eq!(string_prop(&mounts[1], "label").as_deref(), Some("second"));
}

#[rstest]
fn test_unobserved_attribute_change_does_not_remount(harness: Harness) {
	harness.render(&island("steady", "load", ""));
	harness.document.run_until_idle();

	harness.element("steady").set_attribute("opts", "{}");
	harness.document.run_until_idle();

	assert_eq!(harness.mounted(), vec!["steady"]);
}

// ============================================================================
// Directives, pre-hydration and failures
// ============================================================================

#[rstest]
fn test_late_directive_registration(harness: Harness) {
	harness.render(
		r#"<astro-island id="m" ssr="" client="media" opts='{"value":"(max-width: 600px)"}' component-url="/Counter.js" renderer-url="/renderer.js"></astro-island>"#,
	);
	harness.document.run_until_idle();
	assert!(harness.mounted().is_empty());

	let seen = std::rc::Rc::new(std::cell::RefCell::new(None));
	{
		let seen = seen.clone();
		install_directive(
			&harness.document,
			&harness.config,
			"media",
			move |prepare: islet_hydration::Prepare,
			      options: islet_hydration::DirectiveOptions,
			      root: islet_hydration::Node| {
				*seen.borrow_mut() = options.get("value").cloned();
				utils::load(prepare, options, root);
			},
		);
	}
	harness.document.run_until_idle();

	assert_eq!(harness.mounted(), vec!["m"]);
	assert_eq!(harness.mounts.borrow()[0].client, "media");
	assert_eq!(
		*seen.borrow(),
		Some(serde_json::json!("(max-width: 600px)"))
	);
}

#[rstest]
fn test_before_hydration_module_runs_first(harness: Harness) {
	let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
	{
		let order = order.clone();
		harness.modules.register_module_with("/before.js", move || {
			order.borrow_mut().push("before-hydration");
			async { Ok(Module::new()) }
		});
	}
	let deferred = Deferred::register("deferred");
	harness.render(
		r#"<astro-island id="b" ssr="" client="deferred" before-hydration-url="/before.js" component-url="/Counter.js" renderer-url="/renderer.js"></astro-island>"#,
	);
	assert!(deferred.parked().is_empty());

	harness.document.run_until_idle();

	assert_eq!(*order.borrow(), vec!["before-hydration"]);
	assert_eq!(deferred.parked(), vec![harness.element("b")]);
	assert_eq!(harness.modules.evaluation_count("/before.js"), 1);
}

#[rstest]
fn test_missing_component_module_is_rejected(harness: Harness) {
	harness.render(
		r#"<astro-island id="broken" ssr="" client="load" component-url="/Missing.js" renderer-url="/renderer.js"></astro-island>"#,
	);
	harness.document.run_until_idle();

	assert!(harness.mounted().is_empty());
	assert!(harness.element("broken").has_attribute("ssr"));
	assert_eq!(
		harness.document.take_rejections(),
		vec![HydrationError::ModuleNotFound("/Missing.js".to_string())]
	);
}

#[rstest]
fn test_mount_failure_keeps_ssr_and_is_rejected(harness: Harness) {
	harness
		.modules
		.register_renderer("/failing-renderer.js", utils::FailingRenderer);
	harness.render(
		r#"<astro-island id="failing" ssr="" client="load" component-url="/Counter.js" renderer-url="/failing-renderer.js"></astro-island>"#,
	);
	let events = harness.record_hydrate_events(&["failing"]);
	harness.document.run_until_idle();

	assert_eq!(
		harness.document.take_rejections(),
		vec![HydrationError::Render {
			component: "/Counter.js".to_string(),
			message: "boom".to_string(),
		}]
	);
	let node = harness.element("failing");
	assert!(node.has_attribute("ssr"));
	assert!(events.borrow().is_empty());
	let element = harness
		.document
		.custom_element::<IslandElement>(&node)
		.unwrap();
	assert_eq!(element.phase(), Phase::Hydrating);
}

#[rstest]
fn test_malformed_props_are_rejected(harness: Harness) {
	harness.render(
		r#"<astro-island id="bad" ssr="" client="load" component-url="/Counter.js" renderer-url="/renderer.js" props="{oops"></astro-island>"#,
	);
	harness.document.run_until_idle();

	let rejections = harness.document.take_rejections();
	assert_eq!(rejections.len(), 1);
	assert!(matches!(
		&rejections[0],
		HydrationError::PropsParse { component, .. } if component == "/Counter.js"
	));
	assert!(harness.mounted().is_empty());
}

#[rstest]
fn test_options_reach_directive(harness: Harness) {
	let deferred = Deferred::register("deferred");
	harness.render(
		r#"<astro-island id="o" ssr="" client="deferred" opts='{"rootMargin":"10px"}' component-url="/Counter.js"></astro-island>"#,
	);
	harness.document.run_until_idle();

	let options = deferred.options(&harness.element("o")).unwrap();
	assert_eq!(options["rootMargin"], "10px");
}
