//! # Tether Instance
//!
//! The per-instance data-binding lifecycle built on `tether-core`.
//!
//! An [`Instance`] owns a data root and exposes each of its non-reserved keys
//! as a member, next to props, meta members, bound methods and computed
//! members. Swapping the data root keeps the proxied keys in sync and forces
//! every watcher owned by the instance to refresh.
//!
//! ## Example
//!
//! ```ignore
//! use tether_instance::{ComputedDef, Instance, InstanceOptions};
//! use tether_core::Value;
//! use serde_json::json;
//!
//! let vm = Instance::new(
//!     InstanceOptions::new()
//!         .data(Value::from_json(json!({ "count": 1 })))
//!         .computed("double", ComputedDef::getter(|vm| {
//!             let count = vm.get("count")?.as_number().unwrap_or_default();
//!             Ok(Value::from(count * 2.0))
//!         })),
//! );
//!
//! vm.set("count", 4)?;
//! assert_eq!(vm.get("double")?, Value::from(8));
//! ```

mod computed;
mod instance;
mod options;
mod state;

pub use instance::{Instance, InstanceId, MemberKind, WeakInstance, is_reserved};
pub use options::{ComputedDef, ComputedGetter, ComputedSetter, DataSource, InstanceOptions, MethodFn};
