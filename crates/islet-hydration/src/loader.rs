//! Module loading.
//!
//! Islands name their component and renderer by specifier. A
//! [`ModuleLoader`] turns specifiers into [`Module`]s and [`Renderer`]s;
//! [`ModuleMap`] is the in-process implementation, fed by the build's chunk
//! manifest or by tests.
//!
//! Modules follow import semantics: a module body (its factory) is
//! evaluated at most once per loader, and concurrent imports of the same
//! specifier share one in-flight evaluation.

use crate::error::{HydrationError, HydrationResult};
use crate::invoker::Renderer;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

/// A named export: a plain value or a namespace of nested exports.
#[derive(Clone)]
pub enum Export {
	/// Any value, typically a component definition.
	Value(Rc<dyn Any>),
	/// A nested namespace, addressed with dot-separated export paths.
	Namespace(BTreeMap<String, Export>),
}

impl Export {
	/// Wraps a value.
	pub fn value<T: Any>(value: T) -> Self {
		Self::Value(Rc::new(value))
	}

	/// Builds a namespace from `(name, export)` pairs.
	pub fn namespace<I, S>(entries: I) -> Self
	where
		I: IntoIterator<Item = (S, Export)>,
		S: Into<String>,
	{
		Self::Namespace(
			entries
				.into_iter()
				.map(|(name, export)| (name.into(), export))
				.collect(),
		)
	}

	/// Returns the wrapped value if it is a `T`.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		match self {
			Self::Value(value) => value.downcast_ref::<T>(),
			Self::Namespace(_) => None,
		}
	}

	/// Returns a member of a namespace.
	pub fn get(&self, name: &str) -> Option<&Export> {
		match self {
			Self::Namespace(members) => members.get(name),
			Self::Value(_) => None,
		}
	}
}

impl fmt::Debug for Export {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Value(_) => f.write_str("Export::Value(..)"),
			Self::Namespace(members) => f
				.debug_tuple("Export::Namespace")
				.field(&members.keys().collect::<Vec<_>>())
				.finish(),
		}
	}
}

/// An evaluated module.
#[derive(Debug, Clone, Default)]
pub struct Module {
	exports: BTreeMap<String, Export>,
}

impl Module {
	/// Creates a module with no exports.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a named export.
	pub fn with_export(mut self, name: impl Into<String>, export: Export) -> Self {
		self.exports.insert(name.into(), export);
		self
	}

	/// Adds the `default` export.
	pub fn with_default(self, export: Export) -> Self {
		self.with_export(crate::markers::DEFAULT_EXPORT, export)
	}

	/// Returns a top-level export.
	pub fn export(&self, name: &str) -> Option<&Export> {
		self.exports.get(name)
	}

	/// Resolves a dot-separated export path.
	///
	/// `"Widget.Sub"` is the `Sub` member of the `Widget` namespace; a
	/// top-level export literally named `"Widget.Sub"` is never consulted.
	pub fn resolve(&self, path: &str) -> Option<Export> {
		let mut segments = path.split('.');
		let first = segments.next()?;
		let mut current = self.exports.get(first)?;
		for segment in segments {
			current = current.get(segment)?;
		}
		Some(current.clone())
	}
}

/// Turns specifiers into modules and renderers.
#[async_trait(?Send)]
pub trait ModuleLoader {
	/// Imports (evaluating at most once) the module at `specifier`.
	async fn import(&self, specifier: &str) -> HydrationResult<Rc<Module>>;

	/// Imports the renderer adapter at `specifier`.
	async fn import_renderer(&self, specifier: &str) -> HydrationResult<Rc<dyn Renderer>>;
}

type ModuleFactory = Rc<dyn Fn() -> LocalBoxFuture<'static, HydrationResult<Module>>>;
type PendingModule = Shared<LocalBoxFuture<'static, HydrationResult<Rc<Module>>>>;

/// In-process [`ModuleLoader`] backed by registered factories.
#[derive(Default)]
pub struct ModuleMap {
	factories: RefCell<HashMap<String, ModuleFactory>>,
	renderers: RefCell<HashMap<String, Rc<dyn Renderer>>>,
	cache: RefCell<HashMap<String, PendingModule>>,
	evaluations: RefCell<HashMap<String, usize>>,
}

impl fmt::Debug for ModuleMap {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut modules: Vec<_> = self.factories.borrow().keys().cloned().collect();
		modules.sort();
		let mut renderers: Vec<_> = self.renderers.borrow().keys().cloned().collect();
		renderers.sort();
		f.debug_struct("ModuleMap")
			.field("modules", &modules)
			.field("renderers", &renderers)
			.finish_non_exhaustive()
	}
}

impl ModuleMap {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an already-evaluated module.
	pub fn register_module(&self, specifier: impl Into<String>, module: Module) {
		self.register_module_with(specifier, move || {
			let module = module.clone();
			async move { Ok(module) }
		});
	}

	/// Registers a module whose body is evaluated lazily on first import.
	pub fn register_module_with<F, Fut>(&self, specifier: impl Into<String>, factory: F)
	where
		F: Fn() -> Fut + 'static,
		Fut: Future<Output = HydrationResult<Module>> + 'static,
	{
		let factory: ModuleFactory = Rc::new(move || factory().boxed_local());
		self.factories.borrow_mut().insert(specifier.into(), factory);
	}

	/// Registers a renderer adapter.
	pub fn register_renderer<R>(&self, specifier: impl Into<String>, renderer: R)
	where
		R: Renderer + 'static,
	{
		self.renderers
			.borrow_mut()
			.insert(specifier.into(), Rc::new(renderer));
	}

	/// How many times the module at `specifier` has been evaluated.
	pub fn evaluation_count(&self, specifier: &str) -> usize {
		self.evaluations
			.borrow()
			.get(specifier)
			.copied()
			.unwrap_or(0)
	}

	fn pending(&self, specifier: &str) -> HydrationResult<PendingModule> {
		if let Some(pending) = self.cache.borrow().get(specifier) {
			return Ok(pending.clone());
		}

		let factory = self
			.factories
			.borrow()
			.get(specifier)
			.cloned()
			.ok_or_else(|| HydrationError::ModuleNotFound(specifier.to_string()))?;
		*self
			.evaluations
			.borrow_mut()
			.entry(specifier.to_string())
			.or_default() += 1;
		tracing::debug!(specifier, "evaluating module");

		let evaluation = factory();
		let pending = async move { evaluation.await.map(Rc::new) }
			.boxed_local()
			.shared();
		self.cache
			.borrow_mut()
			.insert(specifier.to_string(), pending.clone());
		Ok(pending)
	}
}

#[async_trait(?Send)]
impl ModuleLoader for ModuleMap {
	async fn import(&self, specifier: &str) -> HydrationResult<Rc<Module>> {
		let pending = self.pending(specifier)?;
		pending.await
	}

	async fn import_renderer(&self, specifier: &str) -> HydrationResult<Rc<dyn Renderer>> {
		self.renderers
			.borrow()
			.get(specifier)
			.cloned()
			.ok_or_else(|| HydrationError::RendererNotFound(specifier.to_string()))
	}
}
