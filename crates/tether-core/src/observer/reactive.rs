//! Reactive property bindings.
//!
//! A [`ReactiveCell`] replaces a plain field: it owns the property's
//! [`Dep`], the cached value (or a delegation to a pre-existing accessor) and
//! the observer of the current value.

use core::cell::RefCell;
use core::fmt;
use std::rc::Rc;

use super::{Dep, Observer, observe};
use crate::debug_log;
use crate::error::ReactiveResult;
use crate::runtime::is_collecting;
use crate::value::{Object, Slot, Value};

/// Getter a cell delegates to.
pub type CellGetter = Rc<dyn Fn() -> ReactiveResult<Value>>;

/// Setter a cell delegates to.
pub type CellSetter = Rc<dyn Fn(Value) -> ReactiveResult<()>>;

/// An observable slot.
pub struct ReactiveCell {
	dep: Dep,
	value: RefCell<Value>,
	getter: Option<CellGetter>,
	setter: Option<CellSetter>,
	child: RefCell<Option<Observer>>,
}

impl ReactiveCell {
	/// Create a cell holding `value`, observing it.
	pub fn new(value: impl Into<Value>) -> Self {
		Self::with_accessors(value.into(), None, None)
	}

	/// Create a cell that reads through `getter` and writes through `setter`
	/// when they are given. `value` seeds the child observer and backs the
	/// missing half.
	pub fn with_accessors(
		value: Value,
		getter: Option<CellGetter>,
		setter: Option<CellSetter>,
	) -> Self {
		let child = observe(&value, None);
		Self {
			dep: Dep::new(),
			value: RefCell::new(value),
			getter,
			setter,
			child: RefCell::new(child),
		}
	}

	/// The property's own registry.
	pub fn dep(&self) -> &Dep {
		&self.dep
	}

	/// Observer of the current value, if it is observed.
	pub fn child(&self) -> Option<Observer> {
		self.child.borrow().clone()
	}

	/// Read the value, registering dependencies with the current collector.
	///
	/// Besides the property itself, the collector depends on the value's
	/// whole-value registry and, for arrays, on the registry of every observed
	/// element.
	pub fn get(&self) -> ReactiveResult<Value> {
		let value = self.peek()?;
		if is_collecting() {
			self.dep.depend();
			if let Some(child) = self.child() {
				child.dep().depend();
			}
			if let Value::Array(items) = &value {
				for item in items.to_vec() {
					if let Some(ob) = item.observer() {
						ob.dep().depend();
					}
				}
			}
		}
		Ok(value)
	}

	/// Read the value without tracking.
	pub fn peek(&self) -> ReactiveResult<Value> {
		match &self.getter {
			Some(getter) => getter(),
			None => Ok(self.value.borrow().clone()),
		}
	}

	/// Write the value. Strictly equal writes are ignored.
	pub fn set(&self, value: impl Into<Value>) -> ReactiveResult<()> {
		let value = value.into();
		if self.peek()? == value {
			return Ok(());
		}
		match &self.setter {
			Some(setter) => setter(value.clone())?,
			None => {
				let previous = self.value.replace(value.clone());
				drop(previous);
			}
		}
		let child = observe(&value, None);
		*self.child.borrow_mut() = child;
		self.dep.notify()
	}
}

impl fmt::Debug for ReactiveCell {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReactiveCell")
			.field("dep", &self.dep)
			.field("delegated", &self.getter.is_some())
			.finish()
	}
}

/// Turn `obj[key]` into a reactive property holding `value`.
///
/// A non-configurable property is left untouched, as is a new key on a
/// non-extensible object; both return `None`. A pre-existing accessor (or
/// reactive cell) is kept as the delegate of the new cell.
pub fn define_reactive(obj: &Object, key: &str, value: Value) -> Option<Rc<ReactiveCell>> {
	let (getter, setter): (Option<CellGetter>, Option<CellSetter>) = match obj.slot(key) {
		Some(slot) if !slot.is_configurable() => {
			debug_log!("property `{}` of object {} is not configurable", key, obj.id());
			return None;
		}
		None if !obj.is_extensible() => {
			debug_log!("object {} is not extensible, `{}` stays undefined", obj.id(), key);
			return None;
		}
		Some(Slot::Accessor { accessor, .. }) => {
			let getter = accessor.get.map(|get| {
				let weak = obj.downgrade();
				Rc::new(move || match weak.upgrade() {
					Some(target) => get(&target),
					None => Ok(Value::Undefined),
				}) as CellGetter
			});
			let setter = accessor.set.map(|set| {
				let weak = obj.downgrade();
				Rc::new(move |value: Value| match weak.upgrade() {
					Some(target) => set(&target, value),
					None => Ok(()),
				}) as CellSetter
			});
			(getter, setter)
		}
		Some(Slot::Reactive { cell, .. }) => {
			let read = cell.clone();
			let write = cell;
			(
				Some(Rc::new(move || read.get()) as CellGetter),
				Some(Rc::new(move |value: Value| write.set(value)) as CellSetter),
			)
		}
		Some(Slot::Data { .. }) | None => (None, None),
	};
	let cell = Rc::new(ReactiveCell::with_accessors(value, getter, setter));
	obj.install_reactive(key, cell.clone());
	Some(cell)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::{Accessor, PropertyFlags};
	use crate::watcher::{Watcher, WatcherOptions};
	use core::cell::Cell;
	use rstest::rstest;

	#[rstest]
	fn test_define_reactive_replaces_plain_field() {
		let obj: Object = [("count", 1)].into_iter().collect();
		let cell = define_reactive(&obj, "count", obj.peek("count")).unwrap();

		assert_eq!(cell.peek().unwrap(), Value::from(1));
		assert!(obj.reactive_cell("count").is_some());
		assert_eq!(obj.get("count").unwrap(), Value::from(1));
	}

	#[rstest]
	fn test_non_configurable_property_is_skipped() {
		let obj = Object::new();
		obj.define_data("locked", 1, PropertyFlags::default().with_configurable(false));

		assert!(define_reactive(&obj, "locked", Value::from(1)).is_none());
		assert!(obj.reactive_cell("locked").is_none());
	}

	#[rstest]
	fn test_setter_notifies_only_on_change() {
		let obj: Object = [("count", 1)].into_iter().collect();
		define_reactive(&obj, "count", Value::from(1));
		let runs = Rc::new(Cell::new(0));
		let counter = runs.clone();
		let reader = obj.clone();
		let _watcher = Watcher::from_fn(
			move || {
				counter.set(counter.get() + 1);
				reader.get("count")
			},
			WatcherOptions::default(),
		)
		.unwrap();

		obj.set("count", 1).unwrap();
		assert_eq!(runs.get(), 1);

		obj.set("count", 2).unwrap();
		assert_eq!(runs.get(), 2);
	}

	#[rstest]
	fn test_existing_accessor_is_delegated_to() {
		let obj = Object::new();
		obj.set("_raw", 3).unwrap();
		obj.define_accessor(
			"value",
			Accessor::new()
				.getter(|this| this.get("_raw"))
				.setter(|this, value| this.set("_raw", value)),
			PropertyFlags::default(),
		);
		define_reactive(&obj, "value", obj.peek("value"));

		obj.set("value", 7).unwrap();

		assert_eq!(obj.get("_raw").unwrap(), Value::from(7));
		assert_eq!(obj.get("value").unwrap(), Value::from(7));
	}

	#[rstest]
	fn test_nan_is_never_equal() {
		let cell = ReactiveCell::new(f64::NAN);
		let runs = Rc::new(Cell::new(0));
		let dep = cell.dep().clone();
		let counter = runs.clone();
		let _watcher = Watcher::from_fn(
			move || {
				dep.depend();
				counter.set(counter.get() + 1);
				Ok(Value::Undefined)
			},
			WatcherOptions::default(),
		)
		.unwrap();

		cell.set(f64::NAN).unwrap();

		assert_eq!(runs.get(), 2);
	}
}
