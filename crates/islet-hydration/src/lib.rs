//! Islet Hydration - partial hydration runtime for component islands
//!
//! A server renders a page to static HTML and wraps every interactive
//! component in an island element. This crate is the client side of that
//! contract: it brings each island to life independently, when its
//! scheduling directive says so, and always after any island enclosing it.
//!
//! ## Architecture
//!
//! - [`island`]: the island custom element and its lifecycle state machine
//! - [`directive`]: process-wide registry of scheduling directives
//! - [`slots`]: slot extraction from templates and live slot elements
//! - [`invoker`]: component/renderer resolution and mounting
//! - [`loader`]: the module loading seam and the in-process [`ModuleMap`]
//! - [`props`]: revival of serialized `[type, value]` props
//! - [`dom`]: the document surface, backed by `web_sys` on `wasm32` and by an
//!   in-process document elsewhere
//! - [`config`], [`markers`], [`error`]: names, configuration and errors
//!
//! ## Example
//!
//! On native targets the document is in-process and the caller drives its
//! event loop:
//!
//! ```ignore
//! use islet_hydration::{
//!     define_island_element, install_directive, Document, HydrationConfig, Module, ModuleMap,
//! };
//! use std::rc::Rc;
//!
//! let document = Document::new();
//! let config = HydrationConfig::default();
//!
//! let modules = ModuleMap::new();
//! modules.register_module("/Counter.js", Module::new().with_default(counter_export()));
//! modules.register_renderer("/renderer.js", MyRenderer);
//! define_island_element(&document, Rc::new(modules), config.clone())?;
//!
//! install_directive(&document, &config, "load", |prepare, _opts, root| {
//!     root.owner_document().spawn(async move {
//!         let hydrate = prepare.call().await?;
//!         hydrate.call().await
//!     });
//! });
//!
//! document.body().set_inner_html(
//!     r#"<astro-island ssr client="load" component-url="/Counter.js"
//!         renderer-url="/renderer.js" props='{"count":[0,1]}'></astro-island>"#,
//! );
//! document.run_until_idle();
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod directive;
pub mod dom;
pub mod error;
pub mod invoker;
pub mod island;
pub mod loader;
pub mod markers;
pub mod props;
pub mod slots;

pub use config::HydrationConfig;
pub use directive::{
	Directive, DirectiveOptions, Hydrate, Prepare, install_directive, register_directive,
};
pub use dom::{Document, Event, ListenerOptions, Node};
pub use error::{HydrationError, HydrationResult};
pub use invoker::{ComponentRequest, HydrationInvoker, MountMeta, NoopRenderer, Renderer};
pub use island::{IslandElement, Phase, define_island_element};
pub use loader::{Export, Module, ModuleLoader, ModuleMap};
pub use props::{PropValue, Props};
pub use slots::SlotMap;
