//! Child-list mutation observers.
//!
//! Records are queued synchronously by the tree operations and delivered in
//! a microtask, so an observer callback never runs inside the mutation that
//! produced its records.

use super::{Document, Node, NodeId};
use crate::dom::DomError;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// One child-list change on an observed node.
#[derive(Debug, Clone)]
pub struct MutationRecord {
	/// The node whose children changed.
	pub target: Node,
	/// Nodes inserted under `target`.
	pub added_nodes: Vec<Node>,
	/// Nodes removed from `target`.
	pub removed_nodes: Vec<Node>,
}

type ObserverCallback = Box<dyn Fn(Vec<MutationRecord>, &MutationObserver)>;

pub(crate) struct ObserverShared {
	callback: ObserverCallback,
	targets: RefCell<Vec<NodeId>>,
	pending: RefCell<Vec<MutationRecord>>,
	scheduled: Cell<bool>,
}

impl ObserverShared {
	pub(crate) fn observes(&self, target: NodeId) -> bool {
		self.targets.borrow().contains(&target)
	}
}

/// Observes child-list mutations of one or more nodes.
#[derive(Clone)]
pub struct MutationObserver {
	shared: Rc<ObserverShared>,
	document: Document,
}

impl fmt::Debug for MutationObserver {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MutationObserver")
			.field("targets", &self.shared.targets.borrow().len())
			.field("pending", &self.shared.pending.borrow().len())
			.finish()
	}
}

impl MutationObserver {
	/// Creates an observer. It reports nothing until [`observe`](Self::observe)
	/// is called.
	///
	/// Infallible on the in-process document.
	pub fn new<F>(document: &Document, callback: F) -> Result<Self, DomError>
	where
		F: Fn(Vec<MutationRecord>, &MutationObserver) + 'static,
	{
		Ok(Self {
			shared: Rc::new(ObserverShared {
				callback: Box::new(callback),
				targets: RefCell::new(Vec::new()),
				pending: RefCell::new(Vec::new()),
				scheduled: Cell::new(false),
			}),
			document: document.clone(),
		})
	}

	/// Starts observing child-list changes of `target`.
	pub fn observe(&self, target: &Node) -> Result<(), DomError> {
		{
			let mut targets = self.shared.targets.borrow_mut();
			if targets.contains(&target.id) {
				return Ok(());
			}
			targets.push(target.id);
		}
		let mut observers = self.document.inner.observers.borrow_mut();
		if !observers.iter().any(|o| Rc::ptr_eq(o, &self.shared)) {
			observers.push(Rc::clone(&self.shared));
		}
		Ok(())
	}

	/// Stops observing every target and drops undelivered records.
	pub fn disconnect(&self) {
		self.shared.targets.borrow_mut().clear();
		self.shared.pending.borrow_mut().clear();
		self.document
			.inner
			.observers
			.borrow_mut()
			.retain(|o| !Rc::ptr_eq(o, &self.shared));
	}

	/// Returns and clears the records not yet delivered.
	pub fn take_records(&self) -> Vec<MutationRecord> {
		std::mem::take(&mut *self.shared.pending.borrow_mut())
	}

	pub(crate) fn enqueue(document: &Document, shared: Rc<ObserverShared>, record: MutationRecord) {
		shared.pending.borrow_mut().push(record);
		if shared.scheduled.replace(true) {
			return;
		}

		let observer = MutationObserver {
			shared,
			document: document.clone(),
		};
		document.inner.event_loop.spawn(async move {
			observer.shared.scheduled.set(false);
			let records = observer.take_records();
			if !records.is_empty() {
				(observer.shared.callback)(records, &observer);
			}
		});
	}
}
