//! Events and listener storage.
//!
//! Dispatch is synchronous and does not bubble: listeners registered on the
//! target (or on the window, for global events) run in registration order
//! before `dispatch_event` returns.

#[cfg(not(target_arch = "wasm32"))]
use std::fmt;
#[cfg(not(target_arch = "wasm32"))]
use std::rc::Rc;

/// An event dispatched on a node or on the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
	event_type: String,
}

impl Event {
	/// Creates an event of the given type.
	pub fn new(event_type: impl Into<String>) -> Self {
		Self {
			event_type: event_type.into(),
		}
	}

	/// The event type, e.g. `"astro:hydrate"`.
	pub fn event_type(&self) -> &str {
		&self.event_type
	}
}

/// Options for `add_event_listener`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
	/// Remove the listener after its first invocation.
	pub once: bool,
}

impl ListenerOptions {
	/// Options for a one-shot listener.
	pub fn once() -> Self {
		Self { once: true }
	}
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) type EventCallback = Rc<dyn Fn(&Event)>;

#[cfg(not(target_arch = "wasm32"))]
pub(crate) struct Listener {
	pub(crate) event_type: String,
	pub(crate) callback: EventCallback,
	pub(crate) once: bool,
}

#[cfg(not(target_arch = "wasm32"))]
impl fmt::Debug for Listener {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Listener")
			.field("event_type", &self.event_type)
			.field("once", &self.once)
			.finish_non_exhaustive()
	}
}

/// Removes the listeners matching `event` from `listeners`, keeping the
/// persistent ones, and returns the callbacks to invoke.
///
/// Callers must release any borrow on `listeners` before invoking the
/// returned callbacks: a callback is free to register new listeners.
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn take_matching(listeners: &mut Vec<Listener>, event: &Event) -> Vec<EventCallback> {
	let mut fired = Vec::new();
	listeners.retain(|listener| {
		if listener.event_type != event.event_type {
			return true;
		}
		fired.push(Rc::clone(&listener.callback));
		!listener.once
	});
	fired
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::cell::Cell;

	fn listener(event_type: &str, once: bool, hits: Rc<Cell<u32>>) -> Listener {
		Listener {
			event_type: event_type.to_string(),
			callback: Rc::new(move |_| hits.set(hits.get() + 1)),
			once,
		}
	}

	#[rstest]
	fn test_take_matching_drops_once_listeners() {
		let hits = Rc::new(Cell::new(0));
		let mut listeners = vec![
			listener("astro:hydrate", true, hits.clone()),
			listener("astro:hydrate", false, hits.clone()),
			listener("astro:load", true, hits.clone()),
		];

		let fired = take_matching(&mut listeners, &Event::new("astro:hydrate"));
		assert_eq!(fired.len(), 2);
		for callback in &fired {
			callback(&Event::new("astro:hydrate"));
		}
		assert_eq!(hits.get(), 2);

		let remaining: Vec<_> = listeners
			.iter()
			.map(|l| (l.event_type.as_str(), l.once))
			.collect();
		assert_eq!(remaining, vec![("astro:hydrate", false), ("astro:load", true)]);
	}
}
