//! Island markers.
//!
//! Attribute, tag and event names shared between the server-rendered island
//! markup and the client runtime. The names are the wire protocol: changing
//! one breaks every page rendered against the old value.

/// Default custom element tag for islands.
pub const ISLAND_TAG: &str = "astro-island";

/// Directive name, the key into the directive registry.
pub const ATTR_CLIENT: &str = "client";

/// JSON-serialized directive options.
pub const ATTR_OPTS: &str = "opts";

/// Serialized component props (`[type, value]` tuples).
pub const ATTR_PROPS: &str = "props";

/// Module specifier of the component.
pub const ATTR_COMPONENT_URL: &str = "component-url";

/// Module specifier of the renderer adapter. May be empty.
pub const ATTR_RENDERER_URL: &str = "renderer-url";

/// Dot-separated export path inside the component module.
pub const ATTR_COMPONENT_EXPORT: &str = "component-export";

/// Module imported once, before the directive is consulted.
pub const ATTR_BEFORE_HYDRATION_URL: &str = "before-hydration-url";

/// Presence flag: wait for streamed children before starting.
pub const ATTR_AWAIT_CHILDREN: &str = "await-children";

/// Presence flag: hydration has not completed yet.
pub const ATTR_SSR: &str = "ssr";

/// Export used when `component-export` is absent.
pub const DEFAULT_EXPORT: &str = "default";

/// Slot name used when a slot or template is unnamed.
pub const DEFAULT_SLOT: &str = "default";

/// Tag of the transport-only slot template.
pub const TEMPLATE_TAG: &str = "template";

/// Attribute naming the slot carried by a template.
pub const TEMPLATE_SLOT_ATTR: &str = "data-astro-template";

/// Tag of live slotted content.
pub const SLOT_TAG: &str = "astro-slot";

/// Attribute naming a live slot.
pub const SLOT_NAME_ATTR: &str = "name";

/// Event dispatched on an island once its mount completes.
pub const HYDRATE_EVENT: &str = "astro:hydrate";

/// Prefix of the global event announcing a late directive registration.
pub const DIRECTIVE_EVENT_PREFIX: &str = "astro:";

/// Builds the global event name announcing `directive`.
pub fn directive_event(prefix: &str, directive: &str) -> String {
	format!("{}{}", prefix, directive)
}
