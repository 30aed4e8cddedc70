//! Computed members.

use tether_core::{ReactiveError, ReactiveResult, Value, Watcher};

use crate::instance::{Instance, WeakInstance};
use crate::options::{ComputedDef, ComputedGetter, ComputedSetter};

enum Read {
	/// Cached behind a lazy watcher.
	Cached(Watcher),
	/// Called on every read.
	Direct(ComputedGetter),
	Missing,
}

/// A computed member bound to its instance.
pub(crate) struct ComputedMember {
	read: Read,
	write: Option<ComputedSetter>,
}

impl ComputedMember {
	/// Bind `def` to the instance behind `owner`.
	///
	/// Cached getters are wrapped in a lazy watcher, which is returned so the
	/// instance can own it.
	pub(crate) fn bind(owner: &WeakInstance, def: &ComputedDef) -> (Self, Option<Watcher>) {
		let read = match &def.get {
			Some(get) if def.cache => {
				let get = get.clone();
				Read::Cached(Watcher::new_lazy(owner.clone(), move |owner| {
					let vm = owner.upgrade().ok_or(ReactiveError::ContextReleased)?;
					get(&vm)
				}))
			}
			Some(get) => Read::Direct(get.clone()),
			None => Read::Missing,
		};
		let watcher = match &read {
			Read::Cached(watcher) => Some(watcher.clone()),
			_ => None,
		};
		(
			Self {
				read,
				write: def.set.clone(),
			},
			watcher,
		)
	}

	pub(crate) fn get(&self, vm: &Instance) -> ReactiveResult<Value> {
		match &self.read {
			Read::Cached(watcher) => watcher.read(),
			Read::Direct(get) => get(vm),
			Read::Missing => Ok(Value::Undefined),
		}
	}

	/// Without a setter, writes are ignored.
	pub(crate) fn set(&self, vm: &Instance, value: Value) -> ReactiveResult<()> {
		match &self.write {
			Some(set) => set(vm, value),
			None => Ok(()),
		}
	}

	pub(crate) fn watcher(&self) -> Option<&Watcher> {
		match &self.read {
			Read::Cached(watcher) => Some(watcher),
			_ => None,
		}
	}
}
