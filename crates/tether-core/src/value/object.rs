//! Insertion-ordered property tables.

use core::cell::{Cell, RefCell};
use core::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::{Value, ValueId};
use crate::error::ReactiveResult;
use crate::observer::{Observer, ReactiveCell};
use crate::runtime::{try_with_runtime, with_runtime};

/// Getter half of an accessor property.
pub type AccessorGet = Rc<dyn Fn(&Object) -> ReactiveResult<Value>>;

/// Setter half of an accessor property.
pub type AccessorSet = Rc<dyn Fn(&Object, Value) -> ReactiveResult<()>>;

/// A user-defined getter/setter pair.
#[derive(Clone, Default)]
pub struct Accessor {
	pub get: Option<AccessorGet>,
	pub set: Option<AccessorSet>,
}

impl Accessor {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn getter<F>(mut self, f: F) -> Self
	where
		F: Fn(&Object) -> ReactiveResult<Value> + 'static,
	{
		self.get = Some(Rc::new(f));
		self
	}

	pub fn setter<F>(mut self, f: F) -> Self
	where
		F: Fn(&Object, Value) -> ReactiveResult<()> + 'static,
	{
		self.set = Some(Rc::new(f));
		self
	}
}

impl fmt::Debug for Accessor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Accessor")
			.field("get", &self.get.is_some())
			.field("set", &self.set.is_some())
			.finish()
	}
}

/// Property attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFlags {
	pub configurable: bool,
	pub enumerable: bool,
	/// Ignored for accessor properties.
	pub writable: bool,
}

impl PropertyFlags {
	pub const fn with_configurable(mut self, configurable: bool) -> Self {
		self.configurable = configurable;
		self
	}

	pub const fn with_enumerable(mut self, enumerable: bool) -> Self {
		self.enumerable = enumerable;
		self
	}

	pub const fn with_writable(mut self, writable: bool) -> Self {
		self.writable = writable;
		self
	}
}

impl Default for PropertyFlags {
	fn default() -> Self {
		Self {
			configurable: true,
			enumerable: true,
			writable: true,
		}
	}
}

/// What kind of slot backs a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
	Data,
	Accessor,
	Reactive,
}

#[derive(Clone)]
pub(crate) enum Slot {
	Data {
		value: Value,
		flags: PropertyFlags,
	},
	Accessor {
		accessor: Accessor,
		flags: PropertyFlags,
	},
	Reactive {
		cell: Rc<ReactiveCell>,
		configurable: bool,
		enumerable: bool,
	},
}

impl Slot {
	pub(crate) fn is_configurable(&self) -> bool {
		match self {
			Self::Data { flags, .. } | Self::Accessor { flags, .. } => flags.configurable,
			Self::Reactive { configurable, .. } => *configurable,
		}
	}

	fn is_enumerable(&self) -> bool {
		match self {
			Self::Data { flags, .. } | Self::Accessor { flags, .. } => flags.enumerable,
			Self::Reactive { enumerable, .. } => *enumerable,
		}
	}

	fn kind(&self) -> PropertyKind {
		match self {
			Self::Data { .. } => PropertyKind::Data,
			Self::Accessor { .. } => PropertyKind::Accessor,
			Self::Reactive { .. } => PropertyKind::Reactive,
		}
	}

	fn seal(&mut self) {
		match self {
			Self::Data { flags, .. } => {
				flags.configurable = false;
				flags.writable = false;
			}
			Self::Accessor { flags, .. } => flags.configurable = false,
			Self::Reactive { configurable, .. } => *configurable = false,
		}
	}
}

struct ObjectInner {
	id: ValueId,
	slots: RefCell<IndexMap<String, Slot>>,
	extensible: Cell<bool>,
}

impl Drop for ObjectInner {
	fn drop(&mut self) {
		let id = self.id;
		let _ = try_with_runtime(|rt| {
			if let Ok(mut observers) = rt.observers.try_borrow_mut() {
				observers.release(id);
			}
		});
	}
}

/// Shared handle to a property table.
///
/// Clones share storage. Plain assignment through [`Object::set`] follows
/// sloppy-mode rules: writes to read-only or setter-less properties, and new
/// keys on a non-extensible object, are silently ignored.
#[derive(Clone)]
pub struct Object(Rc<ObjectInner>);

impl Object {
	pub fn new() -> Self {
		Self(Rc::new(ObjectInner {
			id: ValueId::new(),
			slots: RefCell::new(IndexMap::new()),
			extensible: Cell::new(true),
		}))
	}

	pub fn id(&self) -> ValueId {
		self.0.id
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}

	pub fn downgrade(&self) -> WeakObject {
		WeakObject(Rc::downgrade(&self.0))
	}

	/// The observer attached to this object, if any.
	pub fn observer(&self) -> Option<Observer> {
		with_runtime(|rt| rt.observers.borrow().lookup(self.id()))
	}

	/// Read `key`. Reactive properties register the current collector.
	pub fn get(&self, key: &str) -> ReactiveResult<Value> {
		match self.slot(key) {
			None => Ok(Value::Undefined),
			Some(Slot::Data { value, .. }) => Ok(value),
			Some(Slot::Accessor { accessor, .. }) => match accessor.get {
				Some(get) => get(self),
				None => Ok(Value::Undefined),
			},
			Some(Slot::Reactive { cell, .. }) => cell.get(),
		}
	}

	/// Read `key` without registering any dependency.
	///
	/// A failing accessor reads as `undefined`.
	pub(crate) fn peek(&self, key: &str) -> Value {
		match self.slot(key) {
			None => Value::Undefined,
			Some(Slot::Data { value, .. }) => value,
			Some(Slot::Accessor { accessor, .. }) => accessor
				.get
				.and_then(|get| get(self).ok())
				.unwrap_or_default(),
			Some(Slot::Reactive { cell, .. }) => cell.peek().unwrap_or_default(),
		}
	}

	/// Assign `key`.
	///
	/// Assigning a new key creates a plain (non-reactive) data property; use
	/// [`set_property`](crate::observer::set_property) to add a reactive one.
	pub fn set(&self, key: &str, value: impl Into<Value>) -> ReactiveResult<()> {
		let value = value.into();
		match self.slot(key) {
			Some(Slot::Data { flags, .. }) => {
				if flags.writable {
					let previous = {
						let mut slots = self.0.slots.borrow_mut();
						slots.insert(key.to_string(), Slot::Data { value, flags })
					};
					drop(previous);
				}
				Ok(())
			}
			Some(Slot::Accessor { accessor, .. }) => match accessor.set {
				Some(set) => set(self, value),
				None => Ok(()),
			},
			Some(Slot::Reactive { cell, .. }) => cell.set(value),
			None => {
				if self.is_extensible() {
					self.0.slots.borrow_mut().insert(
						key.to_string(),
						Slot::Data {
							value,
							flags: PropertyFlags::default(),
						},
					);
				}
				Ok(())
			}
		}
	}

	pub fn has_own(&self, key: &str) -> bool {
		self.0.slots.borrow().contains_key(key)
	}

	/// Own enumerable keys in insertion order.
	pub fn keys(&self) -> Vec<String> {
		self.0
			.slots
			.borrow()
			.iter()
			.filter(|(_, slot)| slot.is_enumerable())
			.map(|(key, _)| key.clone())
			.collect()
	}

	/// Number of own properties, enumerable or not.
	pub fn len(&self) -> usize {
		self.0.slots.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn property_kind(&self, key: &str) -> Option<PropertyKind> {
		self.0.slots.borrow().get(key).map(Slot::kind)
	}

	/// The reactive cell backing `key`, if the property has been converted.
	pub fn reactive_cell(&self, key: &str) -> Option<Rc<ReactiveCell>> {
		match self.slot(key) {
			Some(Slot::Reactive { cell, .. }) => Some(cell),
			_ => None,
		}
	}

	/// Delete `key`. Returns `false` if the property exists and is not
	/// configurable.
	pub fn remove(&self, key: &str) -> bool {
		let removed = {
			let mut slots = self.0.slots.borrow_mut();
			let configurable = match slots.get(key) {
				None => return true,
				Some(slot) => slot.is_configurable(),
			};
			if !configurable {
				return false;
			}
			slots.shift_remove(key)
		};
		drop(removed);
		true
	}

	/// Define (or redefine) a data property.
	///
	/// Returns `false` when the existing property is not configurable or the
	/// object is not extensible.
	pub fn define_data(&self, key: &str, value: impl Into<Value>, flags: PropertyFlags) -> bool {
		self.define_slot(
			key,
			Slot::Data {
				value: value.into(),
				flags,
			},
		)
	}

	/// Define (or redefine) an accessor property.
	pub fn define_accessor(&self, key: &str, accessor: Accessor, flags: PropertyFlags) -> bool {
		self.define_slot(key, Slot::Accessor { accessor, flags })
	}

	fn define_slot(&self, key: &str, slot: Slot) -> bool {
		let previous = {
			let mut slots = self.0.slots.borrow_mut();
			let allowed = match slots.get(key) {
				Some(existing) => existing.is_configurable(),
				None => self.0.extensible.get(),
			};
			if !allowed {
				return false;
			}
			slots.insert(key.to_string(), slot)
		};
		drop(previous);
		true
	}

	pub(crate) fn slot(&self, key: &str) -> Option<Slot> {
		self.0.slots.borrow().get(key).cloned()
	}

	pub(crate) fn install_reactive(&self, key: &str, cell: Rc<ReactiveCell>) {
		let previous = self.0.slots.borrow_mut().insert(
			key.to_string(),
			Slot::Reactive {
				cell,
				configurable: true,
				enumerable: true,
			},
		);
		drop(previous);
	}

	pub fn prevent_extensions(&self) {
		self.0.extensible.set(false);
	}

	pub fn is_extensible(&self) -> bool {
		self.0.extensible.get()
	}

	/// Make every property read-only and non-configurable, and forbid new
	/// keys. Frozen objects are never observed.
	pub fn freeze(&self) {
		self.prevent_extensions();
		for slot in self.0.slots.borrow_mut().values_mut() {
			slot.seal();
		}
	}

	pub fn is_frozen(&self) -> bool {
		!self.is_extensible()
			&& self.0.slots.borrow().values().all(|slot| match slot {
				Slot::Data { flags, .. } => !flags.configurable && !flags.writable,
				other => !other.is_configurable(),
			})
	}
}

impl Default for Object {
	fn default() -> Self {
		Self::new()
	}
}

impl<K, V> FromIterator<(K, V)> for Object
where
	K: Into<String>,
	V: Into<Value>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		let obj = Self::new();
		{
			let mut slots = obj.0.slots.borrow_mut();
			for (key, value) in iter {
				slots.insert(
					key.into(),
					Slot::Data {
						value: value.into(),
						flags: PropertyFlags::default(),
					},
				);
			}
		}
		obj
	}
}

impl fmt::Debug for Object {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Object")
			.field("id", &self.id())
			.field("keys", &self.keys())
			.finish()
	}
}

/// Non-owning handle to an [`Object`].
#[derive(Clone)]
pub struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
	pub fn upgrade(&self) -> Option<Object> {
		self.0.upgrade().map(Object)
	}
}

impl fmt::Debug for WeakObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("WeakObject")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_keys_keep_insertion_order() {
		let obj: Object = [("b", 1), ("a", 2), ("c", 3)].into_iter().collect();
		assert_eq!(obj.keys(), vec!["b", "a", "c"]);
	}

	#[rstest]
	fn test_set_creates_plain_property() {
		let obj = Object::new();
		obj.set("x", 1).unwrap();

		assert_eq!(obj.get("x").unwrap(), Value::from(1));
		assert_eq!(obj.property_kind("x"), Some(PropertyKind::Data));
	}

	#[rstest]
	fn test_non_writable_write_is_ignored() {
		let obj = Object::new();
		obj.define_data("x", 1, PropertyFlags::default().with_writable(false));
		obj.set("x", 2).unwrap();

		assert_eq!(obj.get("x").unwrap(), Value::from(1));
	}

	#[rstest]
	fn test_non_configurable_cannot_be_removed_or_redefined() {
		let obj = Object::new();
		obj.define_data("x", 1, PropertyFlags::default().with_configurable(false));

		assert!(!obj.remove("x"));
		assert!(!obj.define_data("x", 2, PropertyFlags::default()));
		assert_eq!(obj.get("x").unwrap(), Value::from(1));
	}

	#[rstest]
	fn test_hidden_property_is_not_enumerated() {
		let obj = Object::new();
		obj.define_data("hidden", 1, PropertyFlags::default().with_enumerable(false));
		obj.set("shown", 2).unwrap();

		assert_eq!(obj.keys(), vec!["shown"]);
		assert!(obj.has_own("hidden"));
	}

	#[rstest]
	fn test_accessor_property() {
		let obj = Object::new();
		obj.set("base", 20).unwrap();
		obj.define_accessor(
			"double",
			Accessor::new()
				.getter(|this| {
					let base = this.get("base")?.as_number().unwrap_or_default();
					Ok(Value::from(base * 2.0))
				})
				.setter(|this, value| {
					let half = value.as_number().unwrap_or_default() / 2.0;
					this.set("base", half)
				}),
			PropertyFlags::default(),
		);

		assert_eq!(obj.get("double").unwrap(), Value::from(40));
		obj.set("double", 10).unwrap();
		assert_eq!(obj.get("base").unwrap(), Value::from(5));
	}

	#[rstest]
	fn test_frozen_object_ignores_new_keys() {
		let obj: Object = [("a", 1)].into_iter().collect();
		obj.freeze();
		obj.set("b", 2).unwrap();
		obj.set("a", 3).unwrap();

		assert!(obj.is_frozen());
		assert!(!obj.has_own("b"));
		assert_eq!(obj.get("a").unwrap(), Value::from(1));
	}

	#[rstest]
	fn test_remove_keeps_order_of_remaining_keys() {
		let obj: Object = [("a", 1), ("b", 2), ("c", 3)].into_iter().collect();
		assert!(obj.remove("b"));
		assert_eq!(obj.keys(), vec!["a", "c"]);
	}
}
