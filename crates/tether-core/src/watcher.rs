//! Watchers: evaluators that collect their own dependencies.
//!
//! A [`Watcher`] runs a function while it is the current collector. Every
//! [`Dep`] read during the run is recorded; when the run finishes the watcher
//! subscribes to the registries it touched for the first time and
//! unsubscribes from the ones it no longer touched. Dependencies are therefore
//! rediscovered on every run.
//!
//! ## Modes
//!
//! - **Eager** (default): evaluated on creation and re-run as soon as any
//!   dependency notifies. An optional callback receives `(new, old)`.
//! - **Lazy**: starts dirty; notifications only mark it dirty, and
//!   [`Watcher::read`] re-evaluates on demand. Reading a lazy watcher inside
//!   another evaluation forwards its dependencies to the outer collector, so
//!   computed values built on computed values propagate.
//! - **Deep**: additionally traverses the returned value so that every nested
//!   property becomes a dependency.
//!
//! ## Example
//!
//! ```ignore
//! use tether_core::watcher::{Watcher, WatcherOptions};
//!
//! let total = Watcher::new_lazy(cart.clone(), |cart| sum_prices(cart));
//! let shown = Watcher::with_callback(
//!     cart,
//!     move |_| total.read(),
//!     |new, old| { println!("{:?} -> {:?}", old, new); Ok(()) },
//!     WatcherOptions::default(),
//! )?;
//! ```

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::error::ReactiveResult;
use crate::observer::{Dep, DepId};
use crate::runtime::{CollectorGuard, is_collecting};
use crate::value::{Value, ValueId};

/// Unique identifier of a [`Watcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatcherId(u64);

impl WatcherId {
	fn new() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

/// Watcher configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherOptions {
	/// Defer evaluation until the value is read.
	pub lazy: bool,
	/// Depend on every nested property of the returned value.
	pub deep: bool,
}

/// Change callback, invoked with `(new, old)`.
pub type WatchCallback = Box<dyn Fn(&Value, &Value) -> ReactiveResult<()>>;

type Getter = Box<dyn Fn() -> ReactiveResult<Value>>;

struct WatcherInner {
	id: WatcherId,
	getter: Getter,
	callback: Option<WatchCallback>,
	lazy: bool,
	deep: bool,
	active: Cell<bool>,
	dirty: Cell<bool>,
	value: RefCell<Value>,
	deps: RefCell<IndexMap<DepId, Dep>>,
	new_deps: RefCell<IndexMap<DepId, Dep>>,
}

/// A dependency-collecting evaluator.
///
/// Cloning yields another handle to the same watcher. Registries hold
/// watchers weakly, so a watcher stops receiving notifications once every
/// handle to it is dropped.
#[derive(Clone)]
pub struct Watcher(Rc<WatcherInner>);

impl Watcher {
	/// Create a watcher evaluating `expr` against `context`.
	///
	/// Eager watchers are evaluated immediately; a failure is returned and the
	/// watcher is discarded.
	pub fn new<C, F>(context: C, expr: F, options: WatcherOptions) -> ReactiveResult<Self>
	where
		C: 'static,
		F: Fn(&C) -> ReactiveResult<Value> + 'static,
	{
		Self::create(Box::new(move || expr(&context)), None, options)
	}

	/// Like [`Watcher::new`], with a change callback.
	pub fn with_callback<C, F, CB>(
		context: C,
		expr: F,
		callback: CB,
		options: WatcherOptions,
	) -> ReactiveResult<Self>
	where
		C: 'static,
		F: Fn(&C) -> ReactiveResult<Value> + 'static,
		CB: Fn(&Value, &Value) -> ReactiveResult<()> + 'static,
	{
		Self::create(Box::new(move || expr(&context)), Some(Box::new(callback)), options)
	}

	/// Create a lazy watcher. It starts dirty and evaluates on first read.
	pub fn new_lazy<C, F>(context: C, expr: F) -> Self
	where
		C: 'static,
		F: Fn(&C) -> ReactiveResult<Value> + 'static,
	{
		Self::build(
			Box::new(move || expr(&context)),
			None,
			WatcherOptions {
				lazy: true,
				deep: false,
			},
		)
	}

	/// Create a watcher over a context-free function.
	pub fn from_fn<F>(f: F, options: WatcherOptions) -> ReactiveResult<Self>
	where
		F: Fn() -> ReactiveResult<Value> + 'static,
	{
		Self::create(Box::new(f), None, options)
	}

	fn create(
		getter: Getter,
		callback: Option<WatchCallback>,
		options: WatcherOptions,
	) -> ReactiveResult<Self> {
		let watcher = Self::build(getter, callback, options);
		if !options.lazy {
			let value = watcher.get()?;
			*watcher.0.value.borrow_mut() = value;
		}
		Ok(watcher)
	}

	fn build(getter: Getter, callback: Option<WatchCallback>, options: WatcherOptions) -> Self {
		Self(Rc::new(WatcherInner {
			id: WatcherId::new(),
			getter,
			callback,
			lazy: options.lazy,
			deep: options.deep,
			active: Cell::new(true),
			dirty: Cell::new(options.lazy),
			value: RefCell::new(Value::Undefined),
			deps: RefCell::new(IndexMap::new()),
			new_deps: RefCell::new(IndexMap::new()),
		}))
	}

	pub fn id(&self) -> WatcherId {
		self.0.id
	}

	/// Last computed value.
	pub fn value(&self) -> Value {
		self.0.value.borrow().clone()
	}

	pub fn is_dirty(&self) -> bool {
		self.0.dirty.get()
	}

	pub fn is_active(&self) -> bool {
		self.0.active.get()
	}

	pub fn is_lazy(&self) -> bool {
		self.0.lazy
	}

	/// Whether this watcher is currently subscribed to `dep`.
	pub fn depends_on(&self, dep: &Dep) -> bool {
		self.0.deps.borrow().contains_key(&dep.id())
	}

	/// Ids of the registries this watcher is subscribed to.
	pub fn dep_ids(&self) -> Vec<DepId> {
		self.0.deps.borrow().keys().copied().collect()
	}

	/// Evaluate the function while collecting dependencies.
	///
	/// On success the subscriptions are reconciled with what this run read.
	/// On failure the registries read so far are added and nothing is
	/// unsubscribed.
	pub fn get(&self) -> ReactiveResult<Value> {
		let result = {
			let _collecting = CollectorGuard::push(self.clone());
			(self.0.getter)().and_then(|value| {
				if self.0.deep {
					traverse(&value, &mut HashSet::new())?;
				}
				Ok(value)
			})
		};
		match result {
			Ok(_) => self.cleanup_deps(),
			Err(_) => self.keep_deps(),
		}
		result
	}

	/// Record `dep` as read during the current run.
	pub(crate) fn add_dep(&self, dep: &Dep) {
		let id = dep.id();
		if self.0.new_deps.borrow().contains_key(&id) {
			return;
		}
		self.0.new_deps.borrow_mut().insert(id, dep.clone());
		if !self.0.deps.borrow().contains_key(&id) {
			dep.add_sub(self);
		}
	}

	fn cleanup_deps(&self) {
		let touched = self.0.new_deps.take();
		let previous = self.0.deps.replace(touched);
		let current = self.0.deps.borrow();
		for (id, dep) in &previous {
			if !current.contains_key(id) {
				dep.remove_sub(self);
			}
		}
	}

	fn keep_deps(&self) {
		let touched = self.0.new_deps.take();
		self.0.deps.borrow_mut().extend(touched);
	}

	/// React to a dependency change.
	///
	/// Lazy watchers are marked dirty; eager watchers re-run immediately.
	pub fn update(&self) -> ReactiveResult<()> {
		self.refresh(false)
	}

	/// Like [`Watcher::update`], but an unchanged object value does not fire
	/// the callback.
	pub fn update_shallow(&self) -> ReactiveResult<()> {
		self.refresh(true)
	}

	fn refresh(&self, shallow: bool) -> ReactiveResult<()> {
		if !self.is_active() {
			return Ok(());
		}
		if self.0.lazy {
			self.0.dirty.set(true);
			Ok(())
		} else {
			self.run(shallow)
		}
	}

	fn run(&self, shallow: bool) -> ReactiveResult<()> {
		let value = self.get()?;
		let changed = value != self.value();
		let forced = (value.is_object_like() || self.0.deep) && !shallow;
		if changed || forced {
			let old = self.0.value.replace(value.clone());
			if let Some(callback) = &self.0.callback {
				callback(&value, &old)?;
			}
		}
		Ok(())
	}

	/// Recompute the value and clear the dirty flag.
	pub fn evaluate(&self) -> ReactiveResult<Value> {
		let value = self.get()?;
		*self.0.value.borrow_mut() = value.clone();
		self.0.dirty.set(false);
		Ok(value)
	}

	/// Make the current collector depend on everything this watcher depends on.
	pub fn depend(&self) {
		let deps: Vec<Dep> = self.0.deps.borrow().values().cloned().collect();
		for dep in deps {
			dep.depend();
		}
	}

	/// Read the cached value, re-evaluating first if dirty.
	pub fn read(&self) -> ReactiveResult<Value> {
		if self.is_dirty() {
			self.evaluate()?;
		}
		if is_collecting() {
			self.depend();
		}
		Ok(self.value())
	}

	/// Unsubscribe from every registry and ignore further notifications.
	pub fn teardown(&self) {
		if self.0.active.replace(false) {
			let deps = self.0.deps.take();
			for dep in deps.values() {
				dep.remove_sub(self);
			}
		}
	}

	pub(crate) fn downgrade(&self) -> WeakWatcher {
		WeakWatcher {
			id: self.id(),
			inner: Rc::downgrade(&self.0),
		}
	}
}

impl fmt::Debug for Watcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Watcher")
			.field("id", &self.id())
			.field("lazy", &self.0.lazy)
			.field("deep", &self.0.deep)
			.field("dirty", &self.is_dirty())
			.field("active", &self.is_active())
			.field("deps", &self.0.deps.borrow().len())
			.finish()
	}
}

/// Registry-side handle to a watcher.
#[derive(Clone)]
pub(crate) struct WeakWatcher {
	id: WatcherId,
	inner: Weak<WatcherInner>,
}

impl WeakWatcher {
	pub(crate) fn id(&self) -> WatcherId {
		self.id
	}

	pub(crate) fn is_alive(&self) -> bool {
		self.inner.strong_count() > 0
	}

	pub(crate) fn upgrade(&self) -> Option<Watcher> {
		self.inner.upgrade().map(Watcher)
	}
}

/// Read every nested property of `value` so that each becomes a dependency.
fn traverse(value: &Value, seen: &mut HashSet<ValueId>) -> ReactiveResult<()> {
	match value {
		Value::Object(obj) if obj.is_extensible() => {
			if obj.observer().is_some() && !seen.insert(obj.id()) {
				return Ok(());
			}
			for key in obj.keys() {
				traverse(&obj.get(&key)?, seen)?;
			}
		}
		Value::Array(arr) if !arr.is_frozen() => {
			if arr.observer().is_some() && !seen.insert(arr.id()) {
				return Ok(());
			}
			for item in arr.to_vec() {
				traverse(&item, seen)?;
			}
		}
		_ => {}
	}
	Ok(())
}
