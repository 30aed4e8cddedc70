//! Runtime configuration.
//!
//! Configuration is per thread, like the rest of the runtime state. It can be
//! built in code or deserialized from any serde format:
//!
//! ```ignore
//! use tether_core::config::{Config, set_config};
//!
//! let config: Config = serde_json::from_str(r#"{ "silent": true }"#)?;
//! set_config(config);
//! ```

use core::cell::RefCell;

use serde::{Deserialize, Serialize};

/// Engine-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Suppress configuration warnings even in debug builds.
	pub silent: bool,
}

thread_local! {
	static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Install `config` for the current thread.
pub fn set_config(config: Config) {
	CONFIG.with(|current| *current.borrow_mut() = config);
}

/// Run `f` with the current thread's configuration.
pub fn with_config<F, R>(f: F) -> R
where
	F: FnOnce(&Config) -> R,
{
	CONFIG.with(|current| f(&current.borrow()))
}

/// Whether configuration warnings are currently suppressed.
pub fn is_silent() -> bool {
	CONFIG
		.try_with(|current| current.borrow().silent)
		.unwrap_or(true)
}
