//! Single-threaded host event loop.
//!
//! Microtasks are futures on a [`LocalPool`]; macrotasks are plain closures
//! in a FIFO queue. One turn of the loop drains every runnable microtask
//! before a single macrotask runs, so a `set_timeout` continuation always
//! observes the settled effects of the microtasks queued before it.

use crate::error::HydrationError;
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;

type Macrotask = Box<dyn FnOnce()>;

pub(crate) struct EventLoop {
	pool: RefCell<LocalPool>,
	spawner: LocalSpawner,
	macrotasks: RefCell<VecDeque<Macrotask>>,
	rejections: RefCell<Vec<HydrationError>>,
}

impl EventLoop {
	pub(crate) fn new() -> Self {
		let pool = LocalPool::new();
		let spawner = pool.spawner();
		Self {
			pool: RefCell::new(pool),
			spawner,
			macrotasks: RefCell::new(VecDeque::new()),
			rejections: RefCell::new(Vec::new()),
		}
	}

	pub(crate) fn spawn<F>(&self, future: F)
	where
		F: Future<Output = ()> + 'static,
	{
		if let Err(err) = self.spawner.spawn_local(future) {
			tracing::warn!(error = %err, "event loop rejected a task");
		}
	}

	pub(crate) fn set_timeout<F>(&self, task: F)
	where
		F: FnOnce() + 'static,
	{
		self.macrotasks.borrow_mut().push_back(Box::new(task));
	}

	/// Runs microtasks until none can make progress.
	///
	/// Returns `false` when called from inside a running microtask, which
	/// would otherwise re-enter the pool.
	pub(crate) fn run_microtasks(&self) -> bool {
		match self.pool.try_borrow_mut() {
			Ok(mut pool) => {
				pool.run_until_stalled();
				true
			}
			Err(_) => {
				tracing::warn!("event loop re-entered from a running task");
				false
			}
		}
	}

	/// Runs one macrotask, if any is queued.
	pub(crate) fn run_next_macrotask(&self) -> bool {
		let task = self.macrotasks.borrow_mut().pop_front();
		match task {
			Some(task) => {
				task();
				true
			}
			None => false,
		}
	}

	pub(crate) fn run_until_idle(&self) {
		loop {
			if !self.run_microtasks() {
				return;
			}
			if !self.run_next_macrotask() {
				return;
			}
		}
	}

	pub(crate) fn pending_macrotasks(&self) -> usize {
		self.macrotasks.borrow().len()
	}

	pub(crate) fn reject(&self, err: HydrationError) {
		tracing::error!(error = %err, "unhandled hydration error");
		self.rejections.borrow_mut().push(err);
	}

	pub(crate) fn take_rejections(&self) -> Vec<HydrationError> {
		std::mem::take(&mut *self.rejections.borrow_mut())
	}
}
