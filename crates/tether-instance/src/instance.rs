//! The instance: a data root plus the members proxied onto it.

use core::cell::{Cell, RefCell};
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tether_core::value::Opaque;
use tether_core::{
	Function, Object, ReactiveCell, ReactiveError, ReactiveResult, Value, ViewModel, Watcher,
	WatcherOptions,
};

use crate::computed::ComputedMember;
use crate::options::InstanceOptions;

/// Unique identifier of an [`Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(u64);

impl InstanceId {
	fn new() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

/// Whether `key` is reserved for internal members.
///
/// Keys starting with `$` or `_` are never proxied from the data root.
pub fn is_reserved(key: &str) -> bool {
	key.starts_with('$') || key.starts_with('_')
}

#[derive(Clone)]
pub(crate) enum Member {
	/// Forwards to the same-named key of the data root.
	Proxy,
	Prop(Rc<ReactiveCell>),
	Meta(Rc<ReactiveCell>),
	Method(Function),
	Computed(Rc<ComputedMember>),
	/// Plain assignment of a key that was not a reactive member.
	Plain(Value),
}

/// What kind of member backs a key of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
	Proxy,
	Prop,
	Meta,
	Method,
	Computed,
	Plain,
}

impl Member {
	fn kind(&self) -> MemberKind {
		match self {
			Self::Proxy => MemberKind::Proxy,
			Self::Prop(_) => MemberKind::Prop,
			Self::Meta(_) => MemberKind::Meta,
			Self::Method(_) => MemberKind::Method,
			Self::Computed(_) => MemberKind::Computed,
			Self::Plain(_) => MemberKind::Plain,
		}
	}
}

pub(crate) struct InstanceInner {
	id: InstanceId,
	el: Option<String>,
	pub(crate) data: RefCell<Object>,
	pub(crate) members: RefCell<IndexMap<String, Member>>,
	pub(crate) watchers: RefCell<Vec<Watcher>>,
	destroyed: Cell<bool>,
}

impl InstanceInner {
	/// Drop watchers that were torn down outside [`Instance::unwatch`].
	fn prune_watchers(&self) {
		self.watchers.borrow_mut().retain(Watcher::is_active);
	}
}

impl ViewModel for InstanceInner {
	fn proxy_key(&self, key: &str) {
		if !is_reserved(key) {
			let previous = self
				.members
				.borrow_mut()
				.insert(key.to_string(), Member::Proxy);
			drop(previous);
		}
	}

	fn unproxy_key(&self, key: &str) {
		if !is_reserved(key) {
			let previous = self.members.borrow_mut().shift_remove(key);
			drop(previous);
		}
	}

	fn digest(&self) -> ReactiveResult<()> {
		self.prune_watchers();
		let watchers = self.watchers.borrow().clone();
		for watcher in &watchers {
			watcher.update_shallow()?;
		}
		Ok(())
	}
}

/// A data-bound instance.
///
/// Every non-reserved key of the data root is readable and writable directly
/// on the instance. Props, meta members, methods and computed members live
/// alongside the proxied keys. Cloning yields another handle to the same
/// instance.
///
/// # Example
///
/// ```ignore
/// use tether_instance::{Instance, InstanceOptions};
/// use serde_json::json;
///
/// let vm = Instance::new(InstanceOptions::new().data(Value::from_json(json!({ "a": 1 }))));
/// vm.set("a", 2)?;
/// assert_eq!(vm.data().get("a")?, Value::from(2));
/// ```
#[derive(Clone)]
pub struct Instance(pub(crate) Rc<InstanceInner>);

impl Instance {
	/// Create an instance and bind its state, in order: props, meta, methods,
	/// data, computed.
	pub fn new(options: InstanceOptions) -> Self {
		let vm = Self(Rc::new(InstanceInner {
			id: InstanceId::new(),
			el: options.el.clone(),
			data: RefCell::new(Object::new()),
			members: RefCell::new(IndexMap::new()),
			watchers: RefCell::new(Vec::new()),
			destroyed: Cell::new(false),
		}));
		vm.init_state(&options);
		vm
	}

	pub fn id(&self) -> InstanceId {
		self.0.id
	}

	pub fn el(&self) -> Option<&str> {
		self.0.el.as_deref()
	}

	pub fn downgrade(&self) -> WeakInstance {
		WeakInstance(Rc::downgrade(&self.0))
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}

	pub(crate) fn as_view_model(&self) -> Rc<dyn ViewModel> {
		self.0.clone()
	}

	/// The current data root.
	pub fn data(&self) -> Object {
		self.0.data.borrow().clone()
	}

	/// Read a member.
	pub fn get(&self, key: &str) -> ReactiveResult<Value> {
		match self.member(key) {
			None => Ok(Value::Undefined),
			Some(Member::Proxy) => self.data().get(key),
			Some(Member::Prop(cell) | Member::Meta(cell)) => cell.get(),
			Some(Member::Method(method)) => Ok(Value::Function(method)),
			Some(Member::Computed(computed)) => computed.get(self),
			Some(Member::Plain(value)) => Ok(value),
		}
	}

	/// Write a member.
	///
	/// Proxied keys write through to the data root. A computed member without
	/// a setter ignores the write. Anything else becomes a plain member.
	pub fn set(&self, key: &str, value: impl Into<Value>) -> ReactiveResult<()> {
		let value = value.into();
		match self.member(key) {
			Some(Member::Proxy) => self.data().set(key, value),
			Some(Member::Prop(cell) | Member::Meta(cell)) => cell.set(value),
			Some(Member::Computed(computed)) => computed.set(self, value),
			Some(Member::Method(_) | Member::Plain(_)) | None => {
				self.define_member(key, Member::Plain(value));
				Ok(())
			}
		}
	}

	/// Call the method (or function-valued member) `key`.
	pub fn call(&self, key: &str, args: &[Value]) -> ReactiveResult<Value> {
		self.get(key)?.call(args)
	}

	pub fn has_own(&self, key: &str) -> bool {
		self.0.members.borrow().contains_key(key)
	}

	/// Member keys in definition order.
	pub fn keys(&self) -> Vec<String> {
		self.0.members.borrow().keys().cloned().collect()
	}

	pub fn member_kind(&self, key: &str) -> Option<MemberKind> {
		self.0.members.borrow().get(key).map(Member::kind)
	}

	/// The lazy watcher behind a cached computed member.
	pub fn computed_watcher(&self, key: &str) -> Option<Watcher> {
		match self.member(key) {
			Some(Member::Computed(computed)) => computed.watcher().cloned(),
			_ => None,
		}
	}

	pub(crate) fn member(&self, key: &str) -> Option<Member> {
		self.0.members.borrow().get(key).cloned()
	}

	pub(crate) fn define_member(&self, key: &str, member: Member) {
		let previous = self
			.0
			.members
			.borrow_mut()
			.insert(key.to_string(), member);
		drop(previous);
	}

	/// Create a watcher evaluating `expr` against this instance.
	///
	/// The watcher is owned by the instance: it is refreshed by
	/// [`digest`](Self::digest) and torn down by [`destroy`](Self::destroy).
	pub fn watch<F>(&self, expr: F, options: WatcherOptions) -> ReactiveResult<Watcher>
	where
		F: Fn(&Instance) -> ReactiveResult<Value> + 'static,
	{
		let watcher = Watcher::new(self.downgrade(), bind_expr(expr), options)?;
		self.own(watcher.clone());
		Ok(watcher)
	}

	/// Like [`watch`](Self::watch), with a `(new, old)` change callback.
	pub fn watch_with<F, CB>(
		&self,
		expr: F,
		callback: CB,
		options: WatcherOptions,
	) -> ReactiveResult<Watcher>
	where
		F: Fn(&Instance) -> ReactiveResult<Value> + 'static,
		CB: Fn(&Instance, &Value, &Value) -> ReactiveResult<()> + 'static,
	{
		let owner = self.downgrade();
		let watcher = Watcher::with_callback(
			self.downgrade(),
			bind_expr(expr),
			move |new, old| {
				let vm = owner.upgrade().ok_or(ReactiveError::ContextReleased)?;
				callback(&vm, new, old)
			},
			options,
		)?;
		self.own(watcher.clone());
		Ok(watcher)
	}

	pub(crate) fn own(&self, watcher: Watcher) {
		self.0.prune_watchers();
		self.0.watchers.borrow_mut().push(watcher);
	}

	/// Tear `watcher` down and stop owning it.
	pub fn unwatch(&self, watcher: &Watcher) {
		watcher.teardown();
		let id = watcher.id();
		self.0.watchers.borrow_mut().retain(|owned| owned.id() != id);
	}

	/// Number of live watchers owned by this instance.
	pub fn watcher_count(&self) -> usize {
		self.0.prune_watchers();
		self.0.watchers.borrow().len()
	}

	/// Refresh every owned watcher, whether or not its dependencies changed.
	pub fn digest(&self) -> ReactiveResult<()> {
		self.0.digest()
	}

	/// Assign `key`, adding it to the data root reactively when it is new.
	pub fn set_property(&self, key: &str, value: impl Into<Value>) -> ReactiveResult<()> {
		if self.has_own(key) {
			return self.set(key, value);
		}
		tether_core::set_property(&self.data(), key, value)
	}

	/// Remove `key` from the instance and from the data root.
	///
	/// Keys the instance never proxied (reserved keys, keys shadowed by a
	/// prop) are still removed from the root. Returns `false` when the root
	/// holds `key` but it cannot be deleted.
	pub fn delete_property(&self, key: &str) -> ReactiveResult<bool> {
		let removed = self.0.members.borrow_mut().shift_remove(key);
		drop(removed);
		let data = self.data();
		if !data.has_own(key) {
			return Ok(true);
		}
		if data.observer().is_some() {
			return tether_core::delete_property(&data, key);
		}
		let deleted = data.remove(key);
		self.digest()?;
		Ok(deleted)
	}

	/// Tear down every owned watcher and detach from the data root.
	pub fn destroy(&self) {
		if self.0.destroyed.replace(true) {
			return;
		}
		if let Some(ob) = self.data().observer() {
			ob.remove_vm(&self.as_view_model());
		}
		let watchers = self.0.watchers.take();
		for watcher in watchers.iter().rev() {
			watcher.teardown();
		}
	}

	pub fn is_destroyed(&self) -> bool {
		self.0.destroyed.get()
	}
}

fn bind_expr<F>(expr: F) -> impl Fn(&WeakInstance) -> ReactiveResult<Value> + 'static
where
	F: Fn(&Instance) -> ReactiveResult<Value> + 'static,
{
	move |owner: &WeakInstance| {
		let vm = owner.upgrade().ok_or(ReactiveError::ContextReleased)?;
		expr(&vm)
	}
}

impl fmt::Debug for Instance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Instance")
			.field("id", &self.id())
			.field("el", &self.0.el)
			.field("keys", &self.keys())
			.field("watchers", &self.watcher_count())
			.finish()
	}
}

/// Instances are host values: stored in a data graph they are never observed.
impl From<Instance> for Value {
	fn from(vm: Instance) -> Self {
		Value::Opaque(Opaque::new(vm))
	}
}

/// Non-owning handle to an [`Instance`].
#[derive(Clone)]
pub struct WeakInstance(Weak<InstanceInner>);

impl WeakInstance {
	pub fn upgrade(&self) -> Option<Instance> {
		self.0.upgrade().map(Instance)
	}
}

impl fmt::Debug for WeakInstance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("WeakInstance")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn instance(data: serde_json::Value) -> Instance {
		Instance::new(InstanceOptions::new().data(Value::from_json(data)))
	}

	#[rstest]
	#[case("$index", true)]
	#[case("_private", true)]
	#[case("name", false)]
	#[case("a$b", false)]
	#[case("", false)]
	fn test_is_reserved(#[case] key: &str, #[case] reserved: bool) {
		assert_eq!(is_reserved(key), reserved);
	}

	#[rstest]
	fn test_proxied_keys_read_and_write_through() {
		let vm = instance(json!({ "a": 1 }));

		assert_eq!(vm.member_kind("a"), Some(MemberKind::Proxy));
		vm.set("a", 2).unwrap();
		assert_eq!(vm.data().get("a").unwrap(), Value::from(2));
		vm.data().set("a", 3).unwrap();
		assert_eq!(vm.get("a").unwrap(), Value::from(3));
	}

	#[rstest]
	fn test_unknown_key_becomes_plain_member() {
		let vm = instance(json!({}));
		vm.set("extra", 1).unwrap();

		assert_eq!(vm.member_kind("extra"), Some(MemberKind::Plain));
		assert!(!vm.data().has_own("extra"));
	}

	#[rstest]
	fn test_watch_is_owned_and_released_context_errors() {
		let vm = instance(json!({ "a": 1 }));
		let watcher = vm
			.watch(|vm| vm.get("a"), WatcherOptions::default())
			.unwrap();

		assert_eq!(watcher.value(), Value::from(1));
		assert_eq!(vm.watcher_count(), 1);

		drop(vm);
		assert_eq!(watcher.evaluate(), Err(ReactiveError::ContextReleased));
	}

	#[rstest]
	fn test_instance_value_is_opaque() {
		let vm = instance(json!({}));
		let value = Value::from(vm.clone());

		assert!(tether_core::observe(&value, None).is_none());
		assert!(matches!(value, Value::Opaque(_)));
	}
}
