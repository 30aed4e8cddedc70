//! Reactive Runtime
//!
//! This module holds the per-thread state shared by every reactive primitive:
//!
//! 1. **Collector Stack**: the [`Watcher`]s currently evaluating. The top of
//!    the stack is the *current collector*; every dependency registry read
//!    while it runs is recorded against it. Evaluations nest, so the previous
//!    collector is restored when the inner one finishes.
//! 2. **Conversion Flag**: whether newly assigned plain objects/arrays are
//!    turned into reactive sub-graphs (see [`without_conversion`]).
//! 3. **Observer Table**: the side table mapping value identity to its
//!    [`Observer`](crate::observer::Observer).
//!
//! Execution is strictly synchronous: a notification, evaluation or proxy
//! access runs to completion before control returns to its caller. The
//! collector stack and the conversion flag are only ever changed through the
//! guards in this module, which restore the previous state on drop, so the
//! push/pop discipline holds even when an evaluated function fails or panics.
//!
//! [`without_conversion`]: crate::observer::without_conversion

use core::cell::{Cell, RefCell};
use core::marker::PhantomData;

use crate::observer::ObserverTable;
use crate::watcher::Watcher;

/// Per-thread reactive runtime.
///
/// In WASM there is only one thread, so this effectively provides a global
/// runtime. On native targets each thread gets its own isolated instance.
pub struct Runtime {
	/// Collector stack, innermost evaluation last
	collectors: RefCell<Vec<Watcher>>,
	/// Whether observation may create new observers
	should_convert: Cell<bool>,
	/// Value identity -> observer
	pub(crate) observers: RefCell<ObserverTable>,
}

impl Runtime {
	/// Create a new Runtime instance
	pub fn new() -> Self {
		Self {
			collectors: RefCell::new(Vec::new()),
			should_convert: Cell::new(true),
			observers: RefCell::new(ObserverTable::default()),
		}
	}

	/// The watcher currently collecting dependencies, if any.
	pub fn current_collector(&self) -> Option<Watcher> {
		self.collectors.borrow().last().cloned()
	}

	/// Whether some watcher is currently collecting dependencies.
	pub fn is_collecting(&self) -> bool {
		!self.collectors.borrow().is_empty()
	}

	/// Number of nested evaluations in progress.
	pub fn collector_depth(&self) -> usize {
		self.collectors.borrow().len()
	}

	/// Whether observation may currently construct new observers.
	pub fn should_convert(&self) -> bool {
		self.should_convert.get()
	}

	/// Number of live observers on this thread.
	pub fn observer_count(&self) -> usize {
		self.observers.borrow().len()
	}

	fn push_collector(&self, watcher: Watcher) {
		self.collectors.borrow_mut().push(watcher);
	}

	fn pop_collector(&self) -> Option<Watcher> {
		self.collectors.borrow_mut().pop()
	}
}

impl Default for Runtime {
	fn default() -> Self {
		Self::new()
	}
}

thread_local! {
	static RUNTIME: Runtime = Runtime::new();
}

/// Get a reference to the thread's runtime
///
/// # Example
///
/// ```ignore
/// use tether_core::runtime::with_runtime;
///
/// let nested = with_runtime(|rt| rt.collector_depth());
/// ```
pub fn with_runtime<F, R>(f: F) -> R
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.with(f)
}

/// Try to access the runtime (safe version for Drop implementations)
///
/// Returns None if the thread-local storage has been destroyed.
pub(crate) fn try_with_runtime<F, R>(f: F) -> Option<R>
where
	F: FnOnce(&Runtime) -> R,
{
	RUNTIME.try_with(f).ok()
}

/// The watcher currently collecting dependencies, if any.
pub fn current_collector() -> Option<Watcher> {
	with_runtime(|rt| rt.current_collector())
}

/// Whether some watcher is currently collecting dependencies.
pub fn is_collecting() -> bool {
	with_runtime(|rt| rt.is_collecting())
}

/// Scoped acquisition of the current-collector slot.
///
/// Pushing makes `watcher` the current collector; dropping the guard pops it
/// and restores whichever collector was active before.
#[must_use = "the collector is popped as soon as the guard is dropped"]
pub(crate) struct CollectorGuard {
	_not_send: PhantomData<*const ()>,
}

impl CollectorGuard {
	pub(crate) fn push(watcher: Watcher) -> Self {
		with_runtime(|rt| rt.push_collector(watcher));
		Self {
			_not_send: PhantomData,
		}
	}
}

impl Drop for CollectorGuard {
	fn drop(&mut self) {
		let _ = try_with_runtime(|rt| rt.pop_collector());
	}
}

/// Scoped override of the conversion flag.
#[must_use = "conversion is restored as soon as the guard is dropped"]
pub(crate) struct ConversionGuard {
	previous: bool,
	_not_send: PhantomData<*const ()>,
}

impl ConversionGuard {
	pub(crate) fn disable() -> Self {
		let previous = with_runtime(|rt| rt.should_convert.replace(false));
		Self {
			previous,
			_not_send: PhantomData,
		}
	}
}

impl Drop for ConversionGuard {
	fn drop(&mut self) {
		let previous = self.previous;
		let _ = try_with_runtime(|rt| rt.should_convert.set(previous));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::Value;
	use crate::watcher::WatcherOptions;
	use rstest::rstest;

	fn idle_watcher() -> Watcher {
		Watcher::new_lazy((), |_| Ok(Value::Undefined))
	}

	#[rstest]
	fn test_collector_stack_nesting() {
		let outer = idle_watcher();
		let inner = idle_watcher();

		assert!(current_collector().is_none());
		{
			let _outer = CollectorGuard::push(outer.clone());
			assert_eq!(current_collector().map(|w| w.id()), Some(outer.id()));
			{
				let _inner = CollectorGuard::push(inner.clone());
				assert_eq!(current_collector().map(|w| w.id()), Some(inner.id()));
				assert_eq!(with_runtime(|rt| rt.collector_depth()), 2);
			}
			assert_eq!(current_collector().map(|w| w.id()), Some(outer.id()));
		}
		assert!(!is_collecting());
	}

	#[rstest]
	fn test_collector_restored_after_panic() {
		let watcher = idle_watcher();
		let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
			let _guard = CollectorGuard::push(watcher.clone());
			panic!("evaluation blew up");
		}));

		assert!(result.is_err());
		assert!(!is_collecting());
	}

	#[rstest]
	fn test_collector_restored_after_failed_evaluation() {
		let result = Watcher::from_fn(
			|| Err(crate::ReactiveError::evaluation("nope")),
			WatcherOptions::default(),
		);

		assert!(result.is_err());
		assert!(!is_collecting());
	}

	#[rstest]
	fn test_conversion_guard_nesting() {
		assert!(with_runtime(|rt| rt.should_convert()));
		{
			let _outer = ConversionGuard::disable();
			{
				let _inner = ConversionGuard::disable();
				assert!(!with_runtime(|rt| rt.should_convert()));
			}
			// The inner guard restores the outer (disabled) state.
			assert!(!with_runtime(|rt| rt.should_convert()));
		}
		assert!(with_runtime(|rt| rt.should_convert()));
	}
}
