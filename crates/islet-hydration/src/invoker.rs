//! Hydration invoker.
//!
//! Bridges an island to its framework adapter: loads the component module
//! and the renderer concurrently, resolves the named export, and asks the
//! renderer to mount the component onto the island with its revived props
//! and extracted slots.

use crate::error::HydrationResult;
use crate::loader::{Export, ModuleLoader};
use crate::props::Props;
use crate::slots::SlotMap;
use async_trait::async_trait;
use std::fmt;
use std::rc::Rc;

/// Extra information handed to a renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountMeta {
	/// Name of the directive that scheduled the mount.
	pub client: String,
}

/// A framework adapter that mounts components onto islands.
#[async_trait(?Send)]
pub trait Renderer {
	/// Mounts `component` onto `root`.
	///
	/// `component` is `None` when the export could not be resolved; adapters
	/// decide whether that is an error.
	async fn mount(
		&self,
		root: &crate::dom::Node,
		component: Option<Export>,
		props: Props,
		slots: SlotMap,
		meta: &MountMeta,
	) -> HydrationResult<()>;
}

/// Renderer used by islands without a `renderer-url`. Mounting does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

#[async_trait(?Send)]
impl Renderer for NoopRenderer {
	async fn mount(
		&self,
		_root: &crate::dom::Node,
		_component: Option<Export>,
		_props: Props,
		_slots: SlotMap,
		_meta: &MountMeta,
	) -> HydrationResult<()> {
		Ok(())
	}
}

/// A component and the renderer that mounts it.
#[derive(Clone)]
pub struct ResolvedComponent {
	/// The resolved export.
	pub component: Option<Export>,
	/// The adapter mounting it.
	pub renderer: Rc<dyn Renderer>,
}

impl fmt::Debug for ResolvedComponent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResolvedComponent")
			.field("component", &self.component)
			.finish_non_exhaustive()
	}
}

/// What to hydrate and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRequest {
	/// Specifier of the component module.
	pub component_url: String,
	/// Specifier of the renderer; `None` or empty selects [`NoopRenderer`].
	pub renderer_url: Option<String>,
	/// Dot-separated export path inside the component module.
	pub export: String,
}

/// Loads components and hands them to renderers.
#[derive(Clone)]
pub struct HydrationInvoker {
	loader: Rc<dyn ModuleLoader>,
}

impl fmt::Debug for HydrationInvoker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HydrationInvoker").finish_non_exhaustive()
	}
}

impl HydrationInvoker {
	/// Creates an invoker over `loader`.
	pub fn new(loader: Rc<dyn ModuleLoader>) -> Self {
		Self { loader }
	}

	/// Loads the component module and the renderer concurrently and resolves
	/// the requested export. Either load failing fails the whole resolution.
	pub async fn resolve(&self, request: &ComponentRequest) -> HydrationResult<ResolvedComponent> {
		let renderer_url = request
			.renderer_url
			.as_deref()
			.filter(|url| !url.is_empty());

		let load_renderer = async {
			match renderer_url {
				Some(url) => self.loader.import_renderer(url).await,
				None => Ok(Rc::new(NoopRenderer) as Rc<dyn Renderer>),
			}
		};
		let (module, renderer) = futures::try_join!(
			self.loader.import(&request.component_url),
			load_renderer
		)?;

		let component = module.resolve(&request.export);
		if component.is_none() {
			tracing::warn!(
				component = %request.component_url,
				export = %request.export,
				"component export not found"
			);
		}

		Ok(ResolvedComponent {
			component,
			renderer,
		})
	}

	/// Mounts a resolved component onto `root`.
	pub async fn mount(
		&self,
		root: &crate::dom::Node,
		resolved: &ResolvedComponent,
		props: Props,
		slots: SlotMap,
		client: &str,
	) -> HydrationResult<()> {
		let meta = MountMeta {
			client: client.to_string(),
		};
		resolved
			.renderer
			.mount(root, resolved.component.clone(), props, slots, &meta)
			.await
	}

	/// Resolves and mounts in one step.
	pub async fn invoke(
		&self,
		root: &crate::dom::Node,
		request: &ComponentRequest,
		props: Props,
		slots: SlotMap,
		client: &str,
	) -> HydrationResult<()> {
		let resolved = self.resolve(request).await?;
		self.mount(root, &resolved, props, slots, client).await
	}
}
