//! Deep observation of value graphs.
//!
//! [`observe`] attaches an [`Observer`] to an object or array and walks it:
//! every own enumerable key of an object becomes a [`ReactiveCell`], every
//! element of an array is observed in turn, recursively. Observer identity
//! lives in a per-thread side table keyed by [`ValueId`], so observing the
//! same value twice yields the same observer.
//!
//! ## Owners
//!
//! An observer attached to an instance's data root remembers the instances
//! using it as their root ([`ViewModel`]). [`set_property`] and
//! [`delete_property`] use that list to keep the instances' proxies in sync
//! with the keys of the root.
//!
//! ## Example
//!
//! ```ignore
//! use tether_core::observer::{Observer, observe};
//! use tether_core::value::Value;
//! use serde_json::json;
//!
//! let state = Value::from_json(json!({ "todos": [{ "done": false }] }));
//! let ob = observe(&state, None).unwrap();
//! assert!(Observer::ptr_eq(&observe(&state, None).unwrap(), &ob));
//! ```

mod dep;
mod reactive;

use core::cell::RefCell;
use core::fmt;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use slotmap::SlotMap;

pub use dep::{Dep, DepId};
pub use reactive::{CellGetter, CellSetter, ReactiveCell, define_reactive};

use crate::debug_log;
use crate::error::ReactiveResult;
use crate::runtime::{ConversionGuard, with_runtime};
use crate::value::{Array, Object, Value, ValueId, WeakArray, WeakObject};

/// An owner of a data root.
///
/// Implemented by instances so the observer of their root can keep the
/// proxied keys in sync and force a refresh when keys are added or removed.
pub trait ViewModel {
	/// Expose `key` of the data root as a member.
	fn proxy_key(&self, key: &str);

	/// Remove the member proxied for `key`.
	fn unproxy_key(&self, key: &str);

	/// Refresh every watcher owned by this view model.
	fn digest(&self) -> ReactiveResult<()>;
}

slotmap::new_key_type! {
	/// Arena index of an observer.
	pub struct ObserverKey;
}

/// Side table: value identity to observer.
#[derive(Default)]
pub(crate) struct ObserverTable {
	arena: SlotMap<ObserverKey, Observer>,
	index: HashMap<ValueId, ObserverKey>,
}

impl ObserverTable {
	pub(crate) fn len(&self) -> usize {
		self.arena.len()
	}

	pub(crate) fn lookup(&self, id: ValueId) -> Option<Observer> {
		self.index
			.get(&id)
			.and_then(|key| self.arena.get(*key))
			.cloned()
	}

	fn insert(&mut self, id: ValueId, value: WeakValue) -> Observer {
		let key = self.arena.insert_with_key(|key| Observer::new(key, value));
		self.index.insert(id, key);
		self.arena[key].clone()
	}

	pub(crate) fn release(&mut self, id: ValueId) {
		if let Some(key) = self.index.remove(&id) {
			self.arena.remove(key);
		}
	}
}

#[derive(Clone)]
enum WeakValue {
	Object(WeakObject),
	Array(WeakArray),
}

impl WeakValue {
	fn upgrade(&self) -> Option<Value> {
		match self {
			Self::Object(obj) => obj.upgrade().map(Value::Object),
			Self::Array(arr) => arr.upgrade().map(Value::Array),
		}
	}
}

struct ObserverInner {
	key: ObserverKey,
	value: WeakValue,
	dep: Dep,
	vms: RefCell<Vec<Weak<dyn ViewModel>>>,
}

/// The observation record of one object or array.
#[derive(Clone)]
pub struct Observer(Rc<ObserverInner>);

impl Observer {
	fn new(key: ObserverKey, value: WeakValue) -> Self {
		Self(Rc::new(ObserverInner {
			key,
			value,
			dep: Dep::new(),
			vms: RefCell::new(Vec::new()),
		}))
	}

	pub fn key(&self) -> ObserverKey {
		self.0.key
	}

	/// The whole-value registry (array mutations, added or removed keys).
	pub fn dep(&self) -> &Dep {
		&self.0.dep
	}

	/// The observed value, if it is still alive.
	pub fn value(&self) -> Option<Value> {
		self.0.value.upgrade()
	}

	fn walk(&self) {
		match self.value() {
			Some(Value::Object(obj)) => {
				for key in obj.keys() {
					let value = obj.peek(&key);
					define_reactive(&obj, &key, value);
				}
			}
			Some(Value::Array(arr)) => observe_array(&arr),
			_ => {}
		}
	}

	/// Make `key` of the observed object reactive with `value`.
	pub fn convert(&self, key: &str, value: Value) -> Option<Rc<ReactiveCell>> {
		match self.value() {
			Some(Value::Object(obj)) => define_reactive(&obj, key, value),
			_ => None,
		}
	}

	pub fn add_vm(&self, vm: &Rc<dyn ViewModel>) {
		let weak = Rc::downgrade(vm);
		let mut vms = self.0.vms.borrow_mut();
		vms.retain(|existing| existing.strong_count() > 0);
		if !vms.iter().any(|existing| Weak::ptr_eq(existing, &weak)) {
			vms.push(weak);
		}
	}

	pub fn remove_vm(&self, vm: &Rc<dyn ViewModel>) {
		let weak = Rc::downgrade(vm);
		self.0
			.vms
			.borrow_mut()
			.retain(|existing| !Weak::ptr_eq(existing, &weak));
	}

	/// Live owners, in attachment order.
	pub fn vms(&self) -> Vec<Rc<dyn ViewModel>> {
		self.0.vms.borrow().iter().filter_map(Weak::upgrade).collect()
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}
}

impl PartialEq for Observer {
	fn eq(&self, other: &Self) -> bool {
		Self::ptr_eq(self, other)
	}
}

impl fmt::Debug for Observer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Observer")
			.field("key", &self.key())
			.field("dep", self.dep())
			.field("vms", &self.0.vms.borrow().len())
			.finish()
	}
}

/// Observe `value`, returning its observer.
///
/// An already observed value returns its existing observer. Otherwise a new
/// one is created only for extensible objects and arrays (a frozen value is
/// never extensible), and only while conversion is enabled (see
/// [`without_conversion`]). `vm`, if given, is attached as an owner of the
/// value.
pub fn observe(value: &Value, vm: Option<&Rc<dyn ViewModel>>) -> Option<Observer> {
	let (id, weak, convertible) = match value {
		Value::Object(obj) => (obj.id(), WeakValue::Object(obj.downgrade()), obj.is_extensible()),
		Value::Array(arr) => (arr.id(), WeakValue::Array(arr.downgrade()), arr.is_extensible()),
		_ => return None,
	};
	let existing = with_runtime(|rt| rt.observers.borrow().lookup(id));
	let ob = match existing {
		Some(ob) => ob,
		None => {
			if !convertible || !with_runtime(|rt| rt.should_convert()) {
				debug_log!("value {} left unobserved", id);
				return None;
			}
			let ob = with_runtime(|rt| rt.observers.borrow_mut().insert(id, weak));
			ob.walk();
			ob
		}
	};
	if let Some(vm) = vm {
		ob.add_vm(vm);
	}
	Some(ob)
}

/// Run `f` with conversion of new values disabled.
///
/// Existing observers are still reused; no new observer is created until `f`
/// returns (or unwinds).
pub fn without_conversion<F, R>(f: F) -> R
where
	F: FnOnce() -> R,
{
	let _guard = ConversionGuard::disable();
	f()
}

/// Add or assign `key` on `target` reactively.
///
/// An existing key is assigned normally. A new key on an observed object
/// becomes reactive, the object's whole-value registry is notified and every
/// owning view model proxies the key and digests.
pub fn set_property(target: &Object, key: &str, value: impl Into<Value>) -> ReactiveResult<()> {
	let value = value.into();
	if target.has_own(key) {
		return target.set(key, value);
	}
	let Some(ob) = target.observer() else {
		return target.set(key, value);
	};
	ob.convert(key, value);
	ob.dep().notify()?;
	for vm in ob.vms().iter().rev() {
		vm.proxy_key(key);
		vm.digest()?;
	}
	Ok(())
}

/// Delete `key` from `target` reactively.
///
/// Returns `false` when the key exists but cannot be deleted.
pub fn delete_property(target: &Object, key: &str) -> ReactiveResult<bool> {
	if !target.has_own(key) {
		return Ok(true);
	}
	if !target.remove(key) {
		return Ok(false);
	}
	if let Some(ob) = target.observer() {
		ob.dep().notify()?;
		for vm in ob.vms().iter().rev() {
			vm.unproxy_key(key);
			vm.digest()?;
		}
	}
	Ok(true)
}

/// Observe an array's elements.
pub fn observe_array(arr: &Array) {
	for item in arr.to_vec() {
		observe(&item, None);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::value::PropertyKind;
	use crate::watcher::{Watcher, WatcherOptions};
	use core::cell::Cell;
	use rstest::rstest;
	use serde_json::json;

	#[derive(Default)]
	struct RecordingVm {
		proxied: RefCell<Vec<String>>,
		unproxied: RefCell<Vec<String>>,
		digests: Cell<usize>,
	}

	impl ViewModel for RecordingVm {
		fn proxy_key(&self, key: &str) {
			self.proxied.borrow_mut().push(key.to_string());
		}

		fn unproxy_key(&self, key: &str) {
			self.unproxied.borrow_mut().push(key.to_string());
		}

		fn digest(&self) -> ReactiveResult<()> {
			self.digests.set(self.digests.get() + 1);
			Ok(())
		}
	}

	#[rstest]
	fn test_observe_is_idempotent() {
		let value = Value::from_json(json!({ "a": { "b": 1 } }));
		let first = observe(&value, None).unwrap();
		let second = observe(&value, None).unwrap();

		assert_eq!(first, second);
		assert_eq!(value.observer(), Some(first));
	}

	#[rstest]
	fn test_observe_converts_nested_graph() {
		let value = Value::from_json(json!({ "a": { "b": [ { "c": 1 } ] } }));
		observe(&value, None);

		let root = value.as_object().unwrap();
		assert_eq!(root.property_kind("a"), Some(PropertyKind::Reactive));
		let a = root.get("a").unwrap();
		assert_eq!(a.as_object().unwrap().property_kind("b"), Some(PropertyKind::Reactive));
		let b = a.as_object().unwrap().get("b").unwrap();
		let first = b.as_array().unwrap().get(0).unwrap();
		assert!(first.observer().is_some());
		assert_eq!(first.as_object().unwrap().property_kind("c"), Some(PropertyKind::Reactive));
	}

	#[rstest]
	#[case(Value::from(1))]
	#[case(Value::from("text"))]
	#[case(Value::Null)]
	fn test_scalars_are_not_observed(#[case] value: Value) {
		assert!(observe(&value, None).is_none());
	}

	#[rstest]
	fn test_frozen_values_are_not_observed() {
		let obj = Object::new();
		obj.freeze();
		let arr = Array::new();
		arr.freeze();

		assert!(observe(&Value::from(obj), None).is_none());
		assert!(observe(&Value::from(arr), None).is_none());
	}

	#[rstest]
	fn test_non_extensible_array_is_not_observed() {
		let arr: Array = [1, 2].into_iter().collect();
		arr.prevent_extensions();

		assert!(!arr.is_extensible());
		assert!(!arr.is_frozen());
		assert!(observe(&Value::from(arr.clone()), None).is_none());
		assert_eq!(arr.push(3), Ok(3));
	}

	#[rstest]
	fn test_self_referencing_object() {
		let obj = Object::new();
		obj.set("me", Value::from(obj.clone())).unwrap();

		let ob = observe(&Value::from(obj.clone()), None).unwrap();
		let me = obj.get("me").unwrap();
		assert_eq!(me.observer(), Some(ob));

		obj.remove("me");
	}

	#[rstest]
	fn test_without_conversion_reuses_existing_observers() {
		let observed = Value::from_json(json!({ "x": 1 }));
		let ob = observe(&observed, None).unwrap();
		let fresh = Value::from_json(json!({ "y": 2 }));

		without_conversion(|| {
			assert_eq!(observe(&observed, None), Some(ob.clone()));
			assert!(observe(&fresh, None).is_none());
		});
		assert!(observe(&fresh, None).is_some());
	}

	#[rstest]
	fn test_observer_released_with_value() {
		let before = with_runtime(|rt| rt.observer_count());
		{
			let value = Value::from_json(json!({ "a": {}, "b": [] }));
			observe(&value, None);
			assert_eq!(with_runtime(|rt| rt.observer_count()), before + 3);
		}
		assert_eq!(with_runtime(|rt| rt.observer_count()), before);
	}

	#[rstest]
	fn test_set_property_on_root_proxies_and_digests() {
		let vm = Rc::new(RecordingVm::default());
		let as_vm: Rc<dyn ViewModel> = vm.clone();
		let root = Object::new();
		observe(&Value::from(root.clone()), Some(&as_vm));

		set_property(&root, "added", 1).unwrap();

		assert_eq!(root.property_kind("added"), Some(PropertyKind::Reactive));
		assert_eq!(*vm.proxied.borrow(), vec!["added".to_string()]);
		assert_eq!(vm.digests.get(), 1);

		assert!(delete_property(&root, "added").unwrap());
		assert!(!root.has_own("added"));
		assert_eq!(*vm.unproxied.borrow(), vec!["added".to_string()]);
		assert_eq!(vm.digests.get(), 2);
	}

	#[rstest]
	fn test_set_property_notifies_whole_value_dependents() {
		let state = Value::from_json(json!({ "user": {} }));
		observe(&state, None);
		let root = state.as_object().unwrap().clone();

		let runs = Rc::new(Cell::new(0));
		let counter = runs.clone();
		let reader = root.clone();
		let _watcher = Watcher::from_fn(
			move || {
				counter.set(counter.get() + 1);
				reader.get("user")
			},
			WatcherOptions::default(),
		)
		.unwrap();

		let user = root.get("user").unwrap();
		set_property(user.as_object().unwrap(), "name", "Ada").unwrap();

		assert_eq!(runs.get(), 2);
	}

	#[rstest]
	fn test_remove_vm() {
		let vm: Rc<dyn ViewModel> = Rc::new(RecordingVm::default());
		let value = Value::from(Object::new());
		let ob = observe(&value, Some(&vm)).unwrap();
		observe(&value, Some(&vm));

		assert_eq!(ob.vms().len(), 1);
		ob.remove_vm(&vm);
		assert!(ob.vms().is_empty());
	}
}
