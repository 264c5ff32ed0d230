//! Client-side island hydration
//!
//! This module provides access to islet-hydration, the runtime that upgrades
//! island elements, schedules them through directives and mounts their
//! components in top-down order.
//!
//! ## Architecture
//!
//! - **Island Element**: custom element owning each island's lifecycle
//! - **Directives**: pluggable scheduling strategies (`load`, `idle`, `visible`, ...)
//! - **Slots and Props**: server-rendered children and revived props handed to renderers
//! - **Module Loading**: the `ModuleLoader` seam with an in-process `ModuleMap`

// Re-export all islet-hydration functionality
pub use islet_hydration::*;
