//! Hydration runtime error types.
//!
//! Timing races (an island removed mid-flight, a child waiting on its parent)
//! are not errors: the island absorbs them as silent no-ops. What reaches this
//! enum is everything the runtime cannot recover from locally: failed imports,
//! failed mounts and malformed serialized attributes.

use crate::dom::DomError;
use thiserror::Error;

/// Result type for hydration operations.
pub type HydrationResult<T> = Result<T, HydrationError>;

/// Hydration runtime errors.
///
/// The enum is `Clone` so that a shared in-flight import can hand the same
/// failure to every island awaiting it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum HydrationError {
	/// No module is registered under the requested specifier.
	#[error("module not found: {0}")]
	ModuleNotFound(String),

	/// A module was found but evaluating it failed.
	#[error("failed to load module '{specifier}': {message}")]
	ModuleLoad {
		/// Module specifier.
		specifier: String,
		/// Failure reason reported by the loader.
		message: String,
	},

	/// No renderer is registered under the requested specifier.
	#[error("renderer not found: {0}")]
	RendererNotFound(String),

	/// The renderer failed to mount the component.
	#[error("renderer failed to mount '{component}': {message}")]
	Render {
		/// Component specifier being mounted.
		component: String,
		/// Failure reason reported by the renderer.
		message: String,
	},

	/// The `props` attribute is not a valid serialized props object.
	#[error("error parsing props for component '{component}': {message}")]
	PropsParse {
		/// Component specifier whose props failed to parse.
		component: String,
		/// Parser message.
		message: String,
	},

	/// The `opts` attribute is not valid JSON.
	#[error("error parsing directive options for component '{component}': {message}")]
	OptionsParse {
		/// Component specifier whose options failed to parse.
		component: String,
		/// Parser message.
		message: String,
	},

	/// An island is missing an attribute it cannot hydrate without.
	#[error("island is missing required attribute '{0}'")]
	MissingAttribute(&'static str),

	/// Invalid runtime configuration.
	#[error("configuration error: {0}")]
	Config(String),

	/// The document refused an operation.
	#[error("DOM error: {0}")]
	Dom(#[from] DomError),
}

impl HydrationError {
	/// Builds a [`HydrationError::ModuleLoad`] from any displayable cause.
	pub fn module_load(specifier: impl Into<String>, message: impl std::fmt::Display) -> Self {
		Self::ModuleLoad {
			specifier: specifier.into(),
			message: message.to_string(),
		}
	}

	/// Builds a [`HydrationError::Render`] from any displayable cause.
	pub fn render(component: impl Into<String>, message: impl std::fmt::Display) -> Self {
		Self::Render {
			component: component.into(),
			message: message.to_string(),
		}
	}
}

impl From<serde_json::Error> for HydrationError {
	fn from(err: serde_json::Error) -> Self {
		Self::Config(err.to_string())
	}
}
