//! Logging macros for the reactive engine.
//!
//! Both macros forward to [`tracing`] and compile to no-ops when their
//! conditions are not met, so optimized builds carry no logging overhead.
//!
//! | Macro | Debug Assertions | Feature Required | Level |
//! |-------|------------------|------------------|-------|
//! | `warn_log!` | Required | None | `WARN` |
//! | `debug_log!` | Required | `debug-hooks` | `TRACE` |
//!
//! `warn_log!` carries configuration warnings (a data factory returning a
//! non-object, a data key shadowed by a prop, props declared without a host
//! element). It additionally honours [`Config::silent`](crate::config::Config).
//!
//! ## Example
//!
//! ```ignore
//! use tether_core::{debug_log, warn_log};
//!
//! warn_log!("data functions should return an object.");
//! debug_log!("skipping non-configurable property `{}`", key);
//! ```

/// Logs a configuration warning (requires `debug_assertions`).
#[macro_export]
#[cfg(debug_assertions)]
macro_rules! warn_log {
	($($arg:tt)*) => {{
		if !$crate::config::is_silent() {
			$crate::__private::tracing::warn!($($arg)*);
		}
	}};
}

/// No-op warn_log in release builds
#[macro_export]
#[cfg(not(debug_assertions))]
macro_rules! warn_log {
	($($arg:tt)*) => {{}};
}

/// Logs internal bookkeeping (requires `debug-hooks` feature + `debug_assertions`).
#[macro_export]
#[cfg(all(debug_assertions, feature = "debug-hooks"))]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		$crate::__private::tracing::trace!($($arg)*);
	}};
}

/// No-op debug_log when conditions are not met
#[macro_export]
#[cfg(not(all(debug_assertions, feature = "debug-hooks")))]
macro_rules! debug_log {
	($($arg:tt)*) => {{}};
}
