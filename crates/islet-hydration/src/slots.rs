//! Slot extraction.
//!
//! Server-rendered islands carry their slotted children in two shapes:
//!
//! - `<template data-astro-template="name">`: transport-only content. It is
//!   read and then removed from the DOM.
//! - `<astro-slot name="name">`: content that is also live in the server
//!   HTML. It is read but left in place.
//!
//! A missing name means the `default` slot. Templates win over live slots of
//! the same name. Only slot elements whose nearest enclosing island is the
//! island being hydrated belong to it; anything inside a nested island is
//! left for that island.

use crate::config::HydrationConfig;
use crate::dom::Node;
use crate::markers::DEFAULT_SLOT;
use std::collections::BTreeMap;

/// Slot name to serialized inner HTML.
pub type SlotMap = BTreeMap<String, String>;

/// Collects the slots of `island`, removing its transport templates.
pub fn extract_slots(island: &Node, config: &HydrationConfig) -> SlotMap {
	let mut slots = SlotMap::new();

	for template in owned_slot_elements(
		island,
		config,
		&config.template_tag,
		Some(&config.template_slot_attr),
	) {
		let name = template
			.get_attribute(&config.template_slot_attr)
			.filter(|name| !name.is_empty())
			.unwrap_or_else(|| DEFAULT_SLOT.to_string());
		slots.insert(name, template.inner_html());
		template.remove();
	}

	for slot in owned_slot_elements(island, config, &config.slot_tag, None) {
		let name = slot
			.get_attribute(&config.slot_name_attr)
			.filter(|name| !name.is_empty())
			.unwrap_or_else(|| DEFAULT_SLOT.to_string());
		slots.entry(name).or_insert_with(|| slot.inner_html());
	}

	tracing::trace!(slots = slots.len(), "slots extracted");
	slots
}

/// Descendants of `island` with tag `tag` (and attribute `marker`, when
/// given) whose nearest enclosing island is `island` itself.
fn owned_slot_elements(
	island: &Node,
	config: &HydrationConfig,
	tag: &str,
	marker: Option<&str>,
) -> Vec<Node> {
	island.query_all(|node| {
		node.tag_name().as_deref() == Some(tag)
			&& marker.is_none_or(|marker| node.has_attribute(marker))
			&& node
				.closest(|ancestor| ancestor.tag_name().as_deref() == Some(config.island_tag.as_str()))
				.as_ref() == Some(island)
	})
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
	use super::*;
	use crate::dom::Document;
	use rstest::*;

	#[fixture]
	fn config() -> HydrationConfig {
		HydrationConfig::default()
	}

	fn island_from(document: &Document, html: &str) -> Node {
		document.body().set_inner_html(html);
		document
			.body()
			.first_child()
			.expect("fixture html has a root element")
	}

	#[rstest]
	fn test_templates_are_extracted_and_removed(config: HydrationConfig) {
		let document = Document::new();
		let island = island_from(
			&document,
			r#"<astro-island><template data-astro-template><p>body</p></template><template data-astro-template="footer"><i>f</i></template></astro-island>"#,
		);

		let slots = extract_slots(&island, &config);

		assert_eq!(slots.get("default").map(String::as_str), Some("<p>body</p>"));
		assert_eq!(slots.get("footer").map(String::as_str), Some("<i>f</i>"));
		assert!(island.children().is_empty());
	}

	#[rstest]
	fn test_live_slots_stay_in_place(config: HydrationConfig) {
		let document = Document::new();
		let island = island_from(
			&document,
			r#"<astro-island><astro-slot><b>live</b></astro-slot></astro-island>"#,
		);

		let slots = extract_slots(&island, &config);

		assert_eq!(slots.get("default").map(String::as_str), Some("<b>live</b>"));
		assert_eq!(island.children().len(), 1);
	}

	#[rstest]
	fn test_template_wins_over_live_slot(config: HydrationConfig) {
		let document = Document::new();
		let island = island_from(
			&document,
			r#"<astro-island><astro-slot name="header">live</astro-slot><template data-astro-template="header">transported</template></astro-island>"#,
		);

		let slots = extract_slots(&island, &config);

		assert_eq!(slots.len(), 1);
		assert_eq!(slots.get("header").map(String::as_str), Some("transported"));
	}

	#[rstest]
	fn test_nested_island_slots_are_excluded(config: HydrationConfig) {
		let document = Document::new();
		let outer = island_from(
			&document,
			r#"<astro-island id="outer"><astro-slot><astro-island id="inner"><template data-astro-template="inner-only">x</template><astro-slot name="deep">y</astro-slot></astro-island></astro-slot></astro-island>"#,
		);

		let slots = extract_slots(&outer, &config);

		assert_eq!(slots.keys().collect::<Vec<_>>(), vec!["default"]);
		let inner = document
			.body()
			.query_all(|n| n.get_attribute("id").as_deref() == Some("inner"));
		assert_eq!(
			inner[0]
				.query_all(|n| n.tag_name().as_deref() == Some("template"))
				.len(),
			1
		);
	}
}
