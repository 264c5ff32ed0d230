//! Runtime configuration.
//!
//! Every name the runtime matches against the DOM lives here, defaulting to
//! the constants in [`markers`](crate::markers). Configuration can be built in
//! code with the `with_*` methods or deserialized from JSON, e.g. from a
//! manifest emitted by the build.

use crate::error::{HydrationError, HydrationResult};
use crate::markers;
use serde::{Deserialize, Serialize};

/// Options controlling how islands are discovered and coordinated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrationConfig {
	/// Custom element tag of islands.
	pub island_tag: String,
	/// Tag of transport-only slot templates.
	pub template_tag: String,
	/// Attribute carrying a template's slot name.
	pub template_slot_attr: String,
	/// Tag of live slotted content.
	pub slot_tag: String,
	/// Attribute carrying a live slot's name.
	pub slot_name_attr: String,
	/// Event dispatched on an island after mounting.
	pub hydrate_event: String,
	/// Prefix of global directive announcement events.
	pub directive_event_prefix: String,
	/// Attributes whose mutation re-runs hydration.
	pub observed_attributes: Vec<String>,
}

impl Default for HydrationConfig {
	fn default() -> Self {
		Self {
			island_tag: markers::ISLAND_TAG.to_string(),
			template_tag: markers::TEMPLATE_TAG.to_string(),
			template_slot_attr: markers::TEMPLATE_SLOT_ATTR.to_string(),
			slot_tag: markers::SLOT_TAG.to_string(),
			slot_name_attr: markers::SLOT_NAME_ATTR.to_string(),
			hydrate_event: markers::HYDRATE_EVENT.to_string(),
			directive_event_prefix: markers::DIRECTIVE_EVENT_PREFIX.to_string(),
			observed_attributes: vec![markers::ATTR_PROPS.to_string()],
		}
	}
}

impl HydrationConfig {
	/// Creates the default configuration.
	pub fn new() -> Self {
		Self::default()
	}

	/// Parses a configuration from JSON. Missing fields keep their defaults.
	pub fn from_json(json: &str) -> HydrationResult<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Sets the island tag.
	pub fn with_island_tag(mut self, tag: impl Into<String>) -> Self {
		self.island_tag = tag.into();
		self
	}

	/// Sets the hydrate event name.
	pub fn with_hydrate_event(mut self, event: impl Into<String>) -> Self {
		self.hydrate_event = event.into();
		self
	}

	/// Sets the directive event prefix.
	pub fn with_directive_event_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.directive_event_prefix = prefix.into();
		self
	}

	/// Replaces the observed attribute set.
	pub fn with_observed_attributes<I, S>(mut self, attrs: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.observed_attributes = attrs.into_iter().map(Into::into).collect();
		self
	}

	/// Rejects configurations the runtime cannot operate with.
	///
	/// Tag, marker and event names must be non-empty, and `ssr` may not be
	/// observed: the island removes it on completion, which would re-enter
	/// hydration forever.
	pub fn validate(&self) -> HydrationResult<()> {
		for (field, value) in [
			("island_tag", &self.island_tag),
			("template_tag", &self.template_tag),
			("template_slot_attr", &self.template_slot_attr),
			("slot_tag", &self.slot_tag),
			("hydrate_event", &self.hydrate_event),
		] {
			if value.is_empty() {
				return Err(HydrationError::Config(format!("{} must not be empty", field)));
			}
		}

		if self
			.observed_attributes
			.iter()
			.any(|attr| attr == markers::ATTR_SSR)
		{
			return Err(HydrationError::Config(format!(
				"'{}' cannot be an observed attribute",
				markers::ATTR_SSR
			)));
		}

		Ok(())
	}

	/// Returns the global event name announcing `directive`.
	pub fn directive_event(&self, directive: &str) -> String {
		markers::directive_event(&self.directive_event_prefix, directive)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_default_config() {
		let config = HydrationConfig::default();
		assert_eq!(config.island_tag, "astro-island");
		assert_eq!(config.hydrate_event, "astro:hydrate");
		assert_eq!(config.directive_event("visible"), "astro:visible");
		assert_eq!(config.observed_attributes, vec!["props".to_string()]);
	}

	#[rstest]
	fn test_from_json_partial() {
		let config = HydrationConfig::from_json(r#"{"island_tag": "my-island"}"#).unwrap();
		assert_eq!(config.island_tag, "my-island");
		assert_eq!(config.slot_tag, "astro-slot");
	}

	#[rstest]
	#[case(r#"{"island_tag": ""}"#)]
	#[case(r#"{"template_slot_attr": ""}"#)]
	#[case(r#"{"observed_attributes": ["props", "ssr"]}"#)]
	#[case(r#"{"island_tag": 3}"#)]
	fn test_from_json_rejects_invalid(#[case] json: &str) {
		let err = HydrationConfig::from_json(json).unwrap_err();
		assert!(matches!(err, HydrationError::Config(_)));
	}

	#[rstest]
	fn test_builder_methods() {
		let config = HydrationConfig::new()
			.with_island_tag("x-island")
			.with_hydrate_event("x:hydrate")
			.with_directive_event_prefix("x:")
			.with_observed_attributes(["props", "opts"]);

		assert_eq!(config.island_tag, "x-island");
		assert_eq!(config.directive_event("load"), "x:load");
		assert!(config.observed_attributes.iter().any(|attr| attr == "opts"));
		assert!(config.validate().is_ok());
	}
}
