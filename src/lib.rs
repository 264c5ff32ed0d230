//! # Islet
//!
//! Partial hydration for server-rendered pages.
//!
//! A server renders the whole page to HTML and marks each interactive
//! component as an island. On the client, only the islands are brought to
//! life, each on its own schedule, so most of the page ships no runtime code
//! at all.
//!
//! ## Feature Flags
//!
//! - `hydration` (default) - The client-side island runtime, re-exported as
//!   [`hydration`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use islet::hydration::{define_island_element, register_directive, Document, ModuleMap};
//! use std::rc::Rc;
//!
//! let document = Document::new();
//! define_island_element(&document, Rc::new(ModuleMap::new()), Default::default())?;
//! ```

#[cfg(feature = "hydration")]
pub mod hydration;
