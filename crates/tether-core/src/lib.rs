//! # Tether Core
//!
//! Fine-grained dependency tracking over a plain data graph.
//!
//! Observing a value converts every property into a reactive cell: reads made
//! while a [`Watcher`] is evaluating register a dependency, and writes notify
//! every watcher that depends on the property. Dependencies are rediscovered
//! on every evaluation.
//!
//! ## Modules
//!
//! - [`value`]: the dynamic value graph (objects, observable arrays, scalars)
//! - [`observer`]: dependency registries, reactive cells, deep observation
//! - [`watcher`]: eager and lazy (cached) evaluators
//! - [`runtime`]: per-thread collector stack, conversion flag, observer table
//! - [`config`]: runtime configuration
//! - [`error`]: error types
//!
//! ## Example
//!
//! ```ignore
//! use tether_core::prelude::*;
//! use serde_json::json;
//!
//! let state = Value::from_json(json!({ "count": 1 }));
//! observe(&state, None);
//! let obj = state.as_object().unwrap().clone();
//!
//! let double = Watcher::new(obj.clone(), |s| {
//!     let count = s.get("count")?.as_number().unwrap_or_default();
//!     Ok(Value::from(count * 2.0))
//! }, WatcherOptions::default())?;
//!
//! obj.set("count", 5)?;
//! assert_eq!(double.value(), Value::from(10));
//! ```
//!
//! ## Threading
//!
//! All state is thread-local and every handle is `!Send`. Each thread owns an
//! independent runtime; evaluation is synchronous and never yields.

pub mod config;
pub mod error;
pub mod logging;
pub mod observer;
pub mod runtime;
pub mod value;
pub mod watcher;

pub use error::{ReactiveError, ReactiveResult};
pub use observer::{
	Dep, Observer, ReactiveCell, ViewModel, define_reactive, delete_property, observe, set_property,
	without_conversion,
};
pub use value::{Array, Function, Object, Value};
pub use watcher::{Watcher, WatcherOptions};

#[doc(hidden)]
pub mod __private {
	pub use tracing;
}

/// Prelude module for convenient imports
pub mod prelude {
	pub use crate::error::{ReactiveError, ReactiveResult};
	pub use crate::observer::{
		Dep, Observer, ReactiveCell, ViewModel, define_reactive, delete_property, observe,
		set_property, without_conversion,
	};
	pub use crate::value::{Accessor, Array, Function, Object, Opaque, PropertyFlags, Value};
	pub use crate::watcher::{WatchCallback, Watcher, WatcherOptions};
}
