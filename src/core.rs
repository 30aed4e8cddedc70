//! The reactive engine.
//!
//! # Examples
//!
//! ```rust,no_run
//! use tether::core::config::{Config, set_config};
//! use tether::core::value::PropertyFlags;
//!
//! set_config(Config { silent: true });
//! let flags = PropertyFlags::default().with_enumerable(false);
//! ```

pub use tether_core::*;
