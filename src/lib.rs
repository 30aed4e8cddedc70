//! # Tether
//!
//! A fine-grained reactive data engine.
//!
//! Tether turns a plain data graph of objects, arrays and scalars into an
//! observable one. Watchers evaluate functions over that graph, record exactly
//! which properties they read, and re-run (or, when lazy, mark themselves
//! dirty) when one of those properties changes. On top of the engine, an
//! [`Instance`] binds a data root together with props, meta members, methods
//! and cached computed members.
//!
//! ## Feature Flags
//!
//! - `instance` (default) - Per-instance data binding lifecycle
//! - `debug-hooks` - Trace-level logging of silent skips and dependency bookkeeping
//! - `full` - All features enabled
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use tether::prelude::*;
//! use serde_json::json;
//!
//! let vm = Instance::new(
//!     InstanceOptions::new()
//!         .data(Value::from_json(json!({ "items": [1, 2, 3] })))
//!         .computed("total", ComputedDef::getter(|vm| {
//!             let items = vm.get("items")?;
//!             let sum = items
//!                 .as_array()
//!                 .map(|arr| arr.to_vec().iter().filter_map(Value::as_number).sum::<f64>())
//!                 .unwrap_or(0.0);
//!             Ok(Value::from(sum))
//!         })),
//! );
//!
//! vm.get("items")?.as_array().unwrap().push(4)?;
//! assert_eq!(vm.get("total")?, Value::from(10));
//! ```
//!
//! ## Modules
//!
//! - [`core`]: values, observers, dependency registries and watchers
//! - [`instance`]: data-bound instances (requires the `instance` feature)

pub mod core;
#[cfg(feature = "instance")]
pub mod instance;

pub use tether_core::{
	Array, Dep, Function, Object, Observer, ReactiveCell, ReactiveError, ReactiveResult, Value,
	ViewModel, Watcher, WatcherOptions, define_reactive, delete_property, observe, set_property,
	without_conversion,
};

#[cfg(feature = "instance")]
pub use tether_instance::{ComputedDef, DataSource, Instance, InstanceOptions};

/// Prelude module for convenient imports
pub mod prelude {
	pub use tether_core::prelude::*;

	#[cfg(feature = "instance")]
	pub use tether_instance::{ComputedDef, DataSource, Instance, InstanceOptions, MemberKind};
}
