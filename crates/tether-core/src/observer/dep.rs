//! Dependency registries.

use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::rc::Rc;

use crate::error::ReactiveResult;
use crate::runtime::current_collector;
use crate::watcher::{WeakWatcher, Watcher};

/// Unique identifier of a [`Dep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepId(u64);

impl DepId {
	fn new() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

struct DepInner {
	id: DepId,
	subs: RefCell<Vec<WeakWatcher>>,
}

/// One observable topic and the watchers currently subscribed to it.
///
/// Subscriptions are weak: a watcher stays subscribed for as long as some
/// handle to it is alive (or until it is torn down).
#[derive(Clone)]
pub struct Dep(Rc<DepInner>);

impl Dep {
	pub fn new() -> Self {
		Self(Rc::new(DepInner {
			id: DepId::new(),
			subs: RefCell::new(Vec::new()),
		}))
	}

	pub fn id(&self) -> DepId {
		self.0.id
	}

	/// Subscribe `watcher`. Subscribing twice has no effect.
	pub fn add_sub(&self, watcher: &Watcher) {
		let mut subs = self.0.subs.borrow_mut();
		subs.retain(WeakWatcher::is_alive);
		if !subs.iter().any(|sub| sub.id() == watcher.id()) {
			subs.push(watcher.downgrade());
		}
	}

	pub fn remove_sub(&self, watcher: &Watcher) {
		self.0
			.subs
			.borrow_mut()
			.retain(|sub| sub.id() != watcher.id());
	}

	/// Register this registry with the current collector, if there is one.
	pub fn depend(&self) {
		if let Some(target) = current_collector() {
			target.add_dep(self);
		}
	}

	/// Refresh every current subscriber once, in subscription order.
	///
	/// Iterates over a snapshot, so subscribers may (un)subscribe while being
	/// refreshed. The first failing refresh aborts the pass.
	pub fn notify(&self) -> ReactiveResult<()> {
		let subs: Vec<Watcher> = self
			.0
			.subs
			.borrow()
			.iter()
			.filter_map(WeakWatcher::upgrade)
			.collect();
		for sub in subs {
			sub.update()?;
		}
		Ok(())
	}

	/// Number of live subscribers.
	pub fn subscriber_count(&self) -> usize {
		self.0
			.subs
			.borrow()
			.iter()
			.filter(|sub| sub.is_alive())
			.count()
	}

	pub fn has_sub(&self, watcher: &Watcher) -> bool {
		self.0
			.subs
			.borrow()
			.iter()
			.any(|sub| sub.id() == watcher.id() && sub.is_alive())
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}
}

impl Default for Dep {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Dep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Dep")
			.field("id", &self.id())
			.field("subs", &self.subscriber_count())
			.finish()
	}
}
