//! Directive registry.
//!
//! A directive is a scheduling strategy (`load`, `idle`, `visible`, `media`,
//! `only`, or anything an application adds). Islands look their directive up
//! by the name in their `client` attribute and hand it three things: a
//! [`Prepare`] callback, the island's deserialized options and the island
//! node. The directive alone decides when, and whether, to call `prepare`
//! and then the [`Hydrate`] handle it yields.
//!
//! ## Lifecycle
//!
//! The registry is created lazily on first access and lives for the rest of
//! the thread (the runtime is single-threaded, so this is the process-wide
//! table). Entries are written once and never removed. Registration may race
//! island connection: an island whose directive is still missing waits for
//! the global `astro:<name>` event, which [`install_directive`] dispatches.
//!
//! ## Example
//!
//! ```ignore
//! use islet_hydration::directive::{install_directive, Prepare, DirectiveOptions};
//! use islet_hydration::dom::Node;
//!
//! install_directive(&document, &config, "load", |prepare: Prepare, _opts: DirectiveOptions, root: Node| {
//!     root.owner_document().spawn(async move {
//!         let hydrate = prepare.call().await?;
//!         hydrate.call().await
//!     });
//! });
//! ```

use crate::config::HydrationConfig;
use crate::dom::{Document, Event, Node};
use crate::error::HydrationResult;
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// Deserialized `opts` attribute of an island.
pub type DirectiveOptions = serde_json::Value;

/// Runs the mount of one island. Yielded by [`Prepare`].
///
/// Calling it more than once is allowed: every call re-checks the island's
/// guards and may mount again.
#[derive(Clone)]
pub struct Hydrate {
	run: Rc<dyn Fn() -> LocalBoxFuture<'static, HydrationResult<()>>>,
}

impl Hydrate {
	/// Wraps a hydrate function.
	pub fn new<F, Fut>(run: F) -> Self
	where
		F: Fn() -> Fut + 'static,
		Fut: Future<Output = HydrationResult<()>> + 'static,
	{
		Self {
			run: Rc::new(move || Box::pin(run())),
		}
	}

	/// Starts a hydration attempt.
	pub fn call(&self) -> LocalBoxFuture<'static, HydrationResult<()>> {
		(self.run)()
	}
}

impl fmt::Debug for Hydrate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Hydrate").finish_non_exhaustive()
	}
}

/// Resolves an island's component and renderer, yielding its [`Hydrate`]
/// handle.
#[derive(Clone)]
pub struct Prepare {
	run: Rc<dyn Fn() -> LocalBoxFuture<'static, HydrationResult<Hydrate>>>,
}

impl Prepare {
	/// Wraps a prepare function.
	pub fn new<F, Fut>(run: F) -> Self
	where
		F: Fn() -> Fut + 'static,
		Fut: Future<Output = HydrationResult<Hydrate>> + 'static,
	{
		Self {
			run: Rc::new(move || Box::pin(run())),
		}
	}

	/// Loads the island's modules.
	pub fn call(&self) -> LocalBoxFuture<'static, HydrationResult<Hydrate>> {
		(self.run)()
	}
}

impl fmt::Debug for Prepare {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Prepare").finish_non_exhaustive()
	}
}

/// A scheduling strategy.
///
/// `schedule` must return promptly; any waiting happens in tasks it spawns
/// on the root's document.
pub trait Directive {
	/// Schedules the hydration of `root`.
	fn schedule(&self, prepare: Prepare, options: DirectiveOptions, root: Node);
}

impl<F> Directive for F
where
	F: Fn(Prepare, DirectiveOptions, Node),
{
	fn schedule(&self, prepare: Prepare, options: DirectiveOptions, root: Node) {
		self(prepare, options, root)
	}
}

thread_local! {
	static DIRECTIVES: RefCell<HashMap<String, Rc<dyn Directive>>> = RefCell::new(HashMap::new());
}

/// Registers (or replaces) the directive for `name`.
pub fn register_directive<D>(name: &str, directive: D)
where
	D: Directive + 'static,
{
	DIRECTIVES.with(|directives| {
		directives
			.borrow_mut()
			.insert(name.to_string(), Rc::new(directive));
	});
	tracing::debug!(directive = name, "directive registered");
}

/// Registers the directive for `name`, then announces it with the global
/// `astro:<name>` event so islands waiting on it resume.
pub fn install_directive<D>(document: &Document, config: &HydrationConfig, name: &str, directive: D)
where
	D: Directive + 'static,
{
	register_directive(name, directive);
	document.dispatch_window_event(&Event::new(config.directive_event(name)));
}

/// Looks up the directive for `name`.
pub fn directive(name: &str) -> Option<Rc<dyn Directive>> {
	DIRECTIVES.with(|directives| directives.borrow().get(name).cloned())
}

/// Whether a directive is registered under `name`.
pub fn is_registered(name: &str) -> bool {
	DIRECTIVES.with(|directives| directives.borrow().contains_key(name))
}

/// Names of all registered directives, sorted.
pub fn registered_directives() -> Vec<String> {
	let mut names: Vec<String> =
		DIRECTIVES.with(|directives| directives.borrow().keys().cloned().collect());
	names.sort();
	names
}
