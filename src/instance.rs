//! Data-bound instances.
//!
//! # Examples
//!
//! ```rust,no_run
//! # #[cfg(feature = "instance")]
//! use tether::instance::{Instance, InstanceOptions, is_reserved};
//! ```

pub use tether_instance::*;
