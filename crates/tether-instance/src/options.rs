//! Instance options.
//!
//! [`InstanceOptions`] is a builder describing everything an instance binds at
//! setup: props, meta members, methods, the data root and computed members.
//!
//! ```ignore
//! use tether_instance::{ComputedDef, InstanceOptions};
//! use serde_json::json;
//!
//! let options = InstanceOptions::new()
//!     .data_fn(|| Value::from_json(json!({ "first": "Ada", "last": "Lovelace" })))
//!     .computed("full", ComputedDef::getter(|vm| {
//!         Ok(Value::from(format!("{} {}",
//!             vm.get("first")?.to_display_string(),
//!             vm.get("last")?.to_display_string())))
//!     }))
//!     .method("greet", |vm, _| Ok(Value::from(format!("hi {}", vm.get("full")?.to_display_string()))));
//! ```

use std::rc::Rc;

use indexmap::IndexMap;
use tether_core::{ReactiveResult, Value};

use crate::instance::Instance;

/// A method body. Receives the instance it is bound to.
pub type MethodFn = Rc<dyn Fn(&Instance, &[Value]) -> ReactiveResult<Value>>;

/// Getter of a computed member.
pub type ComputedGetter = Rc<dyn Fn(&Instance) -> ReactiveResult<Value>>;

/// Setter of a computed member.
pub type ComputedSetter = Rc<dyn Fn(&Instance, Value) -> ReactiveResult<()>>;

/// Where the initial data root comes from.
#[derive(Clone)]
pub enum DataSource {
	/// A ready-made value. Anything but an object is replaced by `{}`.
	Value(Value),
	/// A producer invoked once at setup.
	Factory(Rc<dyn Fn() -> Value>),
}

impl DataSource {
	pub(crate) fn resolve(&self) -> Value {
		match self {
			Self::Value(value) => value.clone(),
			Self::Factory(factory) => factory(),
		}
	}
}

/// A computed member definition.
#[derive(Clone)]
pub struct ComputedDef {
	pub get: Option<ComputedGetter>,
	pub set: Option<ComputedSetter>,
	/// Cache the getter's result behind a lazy watcher. Defaults to `true`.
	pub cache: bool,
}

impl ComputedDef {
	/// A cached, read-only computed member.
	pub fn getter<F>(get: F) -> Self
	where
		F: Fn(&Instance) -> ReactiveResult<Value> + 'static,
	{
		Self {
			get: Some(Rc::new(get)),
			..Self::default()
		}
	}

	pub fn with_setter<F>(mut self, set: F) -> Self
	where
		F: Fn(&Instance, Value) -> ReactiveResult<()> + 'static,
	{
		self.set = Some(Rc::new(set));
		self
	}

	/// Call the getter on every read instead of caching.
	pub fn uncached(mut self) -> Self {
		self.cache = false;
		self
	}
}

impl Default for ComputedDef {
	fn default() -> Self {
		Self {
			get: None,
			set: None,
			cache: true,
		}
	}
}

/// Builder for [`Instance::new`](crate::Instance::new).
#[derive(Clone, Default)]
pub struct InstanceOptions {
	pub(crate) el: Option<String>,
	pub(crate) props: IndexMap<String, Value>,
	pub(crate) meta: IndexMap<String, Value>,
	pub(crate) methods: IndexMap<String, MethodFn>,
	pub(crate) data: Option<DataSource>,
	pub(crate) computed: IndexMap<String, ComputedDef>,
}

impl InstanceOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Host element selector. Props are only linked when one is given.
	pub fn el(mut self, selector: impl Into<String>) -> Self {
		self.el = Some(selector.into());
		self
	}

	/// Declare a prop with its initial value.
	pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.props.insert(key.into(), value.into());
		self
	}

	/// Define a reactive meta member (e.g. `$index`).
	pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.meta.insert(key.into(), value.into());
		self
	}

	pub fn method<F>(mut self, key: impl Into<String>, method: F) -> Self
	where
		F: Fn(&Instance, &[Value]) -> ReactiveResult<Value> + 'static,
	{
		self.methods.insert(key.into(), Rc::new(method));
		self
	}

	/// Use `data` as the data root.
	pub fn data(mut self, data: impl Into<Value>) -> Self {
		self.data = Some(DataSource::Value(data.into()));
		self
	}

	/// Produce the data root by calling `factory` at setup.
	pub fn data_fn<F>(mut self, factory: F) -> Self
	where
		F: Fn() -> Value + 'static,
	{
		self.data = Some(DataSource::Factory(Rc::new(factory)));
		self
	}

	pub fn computed(mut self, key: impl Into<String>, def: ComputedDef) -> Self {
		self.computed.insert(key.into(), def);
		self
	}
}
