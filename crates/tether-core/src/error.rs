//! Error types for the reactive engine.
//!
//! Configuration problems are never errors: they are reported through
//! [`warn_log!`](crate::warn_log) and a safe default is substituted. The
//! variants below cover the failures that propagate to whoever triggered an
//! evaluation (initial setup, a notification-triggered refresh, or an explicit
//! `evaluate()` call).

use thiserror::Error;

/// Errors that can occur while reading, writing or re-evaluating reactive state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
	/// A watcher function, computed getter/setter, accessor or method failed.
	#[error("Evaluation error: {0}")]
	Evaluation(String),

	/// A mutating operation was attempted on a frozen array.
	#[error("Cannot mutate a frozen array")]
	Frozen,

	/// The context a watcher or bound method was created for has been dropped.
	#[error("Owning context has been released")]
	ContextReleased,

	/// A value that is not a function was called.
	#[error("Value is not callable: {0}")]
	NotCallable(String),
}

impl ReactiveError {
	/// Shorthand for [`ReactiveError::Evaluation`].
	pub fn evaluation(message: impl Into<String>) -> Self {
		Self::Evaluation(message.into())
	}
}

/// Result type alias for reactive operations.
pub type ReactiveResult<T> = Result<T, ReactiveError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_evaluation_error_message() {
		let error = ReactiveError::evaluation("boom");
		assert_eq!(error.to_string(), "Evaluation error: boom");
	}

	#[rstest]
	#[case(ReactiveError::Frozen, "Cannot mutate a frozen array")]
	#[case(ReactiveError::ContextReleased, "Owning context has been released")]
	#[case(ReactiveError::NotCallable("number".to_string()), "Value is not callable: number")]
	fn test_error_display(#[case] error: ReactiveError, #[case] expected: &str) {
		assert_eq!(error.to_string(), expected);
	}
}
