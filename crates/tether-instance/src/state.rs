//! State binding and the data-root lifecycle.
//!
//! Setup binds, in order: props, meta members, methods, the data root and
//! computed members. Later, [`Instance::set_data`] swaps the whole root:
//!
//! 1. keys of the old root missing from the new one are unproxied;
//! 2. keys of the new root that are not already members are proxied;
//! 3. the instance detaches from the old root's observer and attaches to the
//!    new one;
//! 4. every owned watcher is refreshed (a digest), whether or not its own
//!    dependencies changed, since a watcher may depend on the identity of the
//!    root rather than on its keys.

use std::rc::Rc;

use tether_core::{
	Function, Object, ReactiveCell, ReactiveError, ReactiveResult, Value, ViewModel, observe,
	warn_log, without_conversion,
};

use crate::computed::ComputedMember;
use crate::instance::{Instance, Member};
use crate::options::{DataSource, InstanceOptions};

impl Instance {
	pub(crate) fn init_state(&self, options: &InstanceOptions) {
		self.init_props(options);
		self.init_meta(options);
		self.init_methods(options);
		self.init_data(options);
		self.init_computed(options);
	}

	/// Props are linked against the host element, so without `el` there is
	/// nothing to link.
	fn init_props(&self, options: &InstanceOptions) {
		if options.props.is_empty() {
			return;
		}
		if options.el.is_none() {
			warn_log!("Props will not be compiled if no `el` option is provided at instantiation.");
			return;
		}
		for (key, value) in &options.props {
			let cell = without_conversion(|| ReactiveCell::new(value.clone()));
			self.define_member(key, Member::Prop(Rc::new(cell)));
		}
	}

	fn init_meta(&self, options: &InstanceOptions) {
		for (key, value) in &options.meta {
			self.define_member(key, Member::Meta(Rc::new(ReactiveCell::new(value.clone()))));
		}
	}

	/// Methods are bound once, so the returned function keeps its receiver.
	fn init_methods(&self, options: &InstanceOptions) {
		for (key, method) in &options.methods {
			let owner = self.downgrade();
			let method = method.clone();
			let bound = Function::new(move |args| {
				let vm = owner.upgrade().ok_or(ReactiveError::ContextReleased)?;
				method(&vm, args)
			});
			self.define_member(key, Member::Method(bound));
		}
	}

	fn init_data(&self, options: &InstanceOptions) {
		let data = match options.data.as_ref().map(DataSource::resolve) {
			None => Object::new(),
			Some(Value::Object(obj)) => obj,
			Some(_) => {
				warn_log!("data functions should return an object.");
				Object::new()
			}
		};
		*self.0.data.borrow_mut() = data.clone();
		for key in data.keys() {
			if matches!(self.member(&key), Some(Member::Prop(_))) {
				warn_log!(
					"Data field \"{}\" is already defined as a prop. To provide default value for a prop, use the \"default\" prop option.",
					key
				);
			} else {
				self.0.proxy_key(&key);
			}
		}
		observe(&Value::Object(data), Some(&self.as_view_model()));
	}

	fn init_computed(&self, options: &InstanceOptions) {
		let owner = self.downgrade();
		for (key, def) in &options.computed {
			let (member, watcher) = ComputedMember::bind(&owner, def);
			if let Some(watcher) = watcher {
				self.own(watcher);
			}
			self.define_member(key, Member::Computed(Rc::new(member)));
		}
	}

	/// Replace the data root. Setting the current root again does nothing.
	pub fn set_data(&self, data: Object) -> ReactiveResult<()> {
		let old = self.data();
		if Object::ptr_eq(&old, &data) {
			return Ok(());
		}
		self.swap_data(old, data)
	}

	/// Replace the data root with an empty object.
	pub fn clear_data(&self) -> ReactiveResult<()> {
		self.set_data(Object::new())
	}

	fn swap_data(&self, old: Object, new: Object) -> ReactiveResult<()> {
		*self.0.data.borrow_mut() = new.clone();
		for key in old.keys() {
			if !new.has_own(&key) {
				self.0.unproxy_key(&key);
			}
		}
		for key in new.keys() {
			if !self.has_own(&key) {
				self.0.proxy_key(&key);
			}
		}
		let vm = self.as_view_model();
		if let Some(ob) = old.observer() {
			ob.remove_vm(&vm);
		}
		observe(&Value::Object(new), Some(&vm));
		self.digest()
	}
}

#[cfg(test)]
mod tests {
	use crate::instance::MemberKind;
	use crate::{ComputedDef, Instance, InstanceOptions};
	use rstest::rstest;
	use serde_json::json;
	use tether_core::Value;
	use tracing_test::traced_test;

	#[test]
	#[traced_test]
	fn test_non_object_data_warns_and_falls_back() {
		let vm = Instance::new(InstanceOptions::new().data_fn(|| Value::from(42)));

		assert!(vm.data().is_empty());
		assert!(vm.data().observer().is_some());
		#[cfg(debug_assertions)]
		assert!(logs_contain("data functions should return an object."));
	}

	#[test]
	#[traced_test]
	fn test_props_without_el_warn_and_are_skipped() {
		let vm = Instance::new(InstanceOptions::new().prop("title", "hello"));

		assert!(!vm.has_own("title"));
		#[cfg(debug_assertions)]
		assert!(logs_contain("Props will not be compiled if no `el` option is provided"));
	}

	#[test]
	#[traced_test]
	fn test_data_key_shadowed_by_prop_warns() {
		let vm = Instance::new(
			InstanceOptions::new()
				.el("#app")
				.prop("title", "from prop")
				.data(Value::from_json(json!({ "title": "from data", "body": "" }))),
		);

		assert_eq!(vm.member_kind("title"), Some(MemberKind::Prop));
		assert_eq!(vm.get("title").unwrap(), Value::from("from prop"));
		assert_eq!(vm.member_kind("body"), Some(MemberKind::Proxy));
		#[cfg(debug_assertions)]
		assert!(logs_contain("Data field \"title\" is already defined as a prop"));
	}

	#[rstest]
	fn test_props_are_not_converted() {
		let config = Value::from_json(json!({ "theme": "dark" }));
		let vm = Instance::new(InstanceOptions::new().el("#app").prop("config", config.clone()));

		assert_eq!(vm.member_kind("config"), Some(MemberKind::Prop));
		assert!(config.observer().is_none());
	}

	#[rstest]
	fn test_setup_order_lets_data_override_methods() {
		let vm = Instance::new(
			InstanceOptions::new()
				.method("name", |_, _| Ok(Value::from("method")))
				.data(Value::from_json(json!({ "name": "data" })))
				.computed("label", ComputedDef::getter(|vm| vm.get("name"))),
		);

		assert_eq!(vm.member_kind("name"), Some(MemberKind::Proxy));
		assert_eq!(vm.get("label").unwrap(), Value::from("data"));
	}

	#[rstest]
	fn test_set_same_root_is_noop() {
		let runs = std::rc::Rc::new(std::cell::Cell::new(0));
		let vm = Instance::new(InstanceOptions::new().data(Value::from_json(json!({ "a": 1 }))));
		let counter = runs.clone();
		vm.watch(
			move |vm| {
				counter.set(counter.get() + 1);
				vm.get("a")
			},
			Default::default(),
		)
		.unwrap();

		vm.set_data(vm.data()).unwrap();

		assert_eq!(runs.get(), 1);
	}

	#[rstest]
	fn test_clear_data_unproxies_everything() {
		let vm = Instance::new(InstanceOptions::new().data(Value::from_json(json!({ "a": 1, "b": 2 }))));
		vm.clear_data().unwrap();

		assert!(vm.keys().is_empty());
		assert_eq!(vm.get("a").unwrap(), Value::Undefined);
	}
}
