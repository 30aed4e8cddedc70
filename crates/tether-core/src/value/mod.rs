//! Dynamic value graph
//!
//! The engine operates on a plain data graph: scalars, insertion-ordered
//! objects and dynamic arrays, plus two non-plain leaves (functions and opaque
//! host values). [`Object`] and [`Array`] are shared handles; cloning one
//! yields another handle to the same storage, and equality between them is
//! identity.
//!
//! ## Example
//!
//! ```ignore
//! use tether_core::value::Value;
//! use serde_json::json;
//!
//! let data = Value::from_json(json!({ "user": { "name": "Ada" }, "tags": [1, 2] }));
//! let user = data.as_object().unwrap().get("user")?;
//! ```

mod array;
mod object;

use core::any::Any;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashSet;
use std::rc::Rc;

pub use array::{Array, WeakArray};
pub use object::{Accessor, AccessorGet, AccessorSet, Object, PropertyFlags, PropertyKind, WeakObject};
pub(crate) use object::Slot;

use crate::error::{ReactiveError, ReactiveResult};
use crate::observer::Observer;

/// Process-unique identity of an object or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(u64);

impl ValueId {
	/// Create a new unique ValueId
	pub(crate) fn new() -> Self {
		static COUNTER: AtomicU64 = AtomicU64::new(0);
		Self(COUNTER.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for ValueId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

type NativeFn = dyn Fn(&[Value]) -> ReactiveResult<Value>;

/// A callable value.
#[derive(Clone)]
pub struct Function(Rc<NativeFn>);

impl Function {
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(&[Value]) -> ReactiveResult<Value> + 'static,
	{
		Self(Rc::new(f))
	}

	pub fn call(&self, args: &[Value]) -> ReactiveResult<Value> {
		(self.0)(args)
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}
}

impl fmt::Debug for Function {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Function")
	}
}

/// A non-plain host value. Never observed.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
	pub fn new<T: Any>(value: T) -> Self {
		Self(Rc::new(value))
	}

	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.0.downcast_ref::<T>()
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}
}

impl fmt::Debug for Opaque {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Opaque")
	}
}

/// A dynamically typed value.
///
/// `PartialEq` is strict equality: scalars compare by value (`NaN` is not
/// equal to itself), strings by content, everything else by identity.
#[derive(Debug, Clone, Default)]
pub enum Value {
	#[default]
	Undefined,
	Null,
	Bool(bool),
	Number(f64),
	String(Rc<str>),
	Object(Object),
	Array(Array),
	Function(Function),
	Opaque(Opaque),
}

impl Value {
	pub fn is_undefined(&self) -> bool {
		matches!(self, Self::Undefined)
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	/// Objects and arrays: the values that may carry an observer.
	pub fn is_object_like(&self) -> bool {
		matches!(self, Self::Object(_) | Self::Array(_))
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_number(&self) -> Option<f64> {
		match self {
			Self::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&Object> {
		match self {
			Self::Object(obj) => Some(obj),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&Array> {
		match self {
			Self::Array(arr) => Some(arr),
			_ => None,
		}
	}

	pub fn as_function(&self) -> Option<&Function> {
		match self {
			Self::Function(f) => Some(f),
			_ => None,
		}
	}

	/// JavaScript-style truthiness, used by conditional expressions.
	pub fn is_truthy(&self) -> bool {
		match self {
			Self::Undefined | Self::Null => false,
			Self::Bool(b) => *b,
			Self::Number(n) => *n != 0.0 && !n.is_nan(),
			Self::String(s) => !s.is_empty(),
			_ => true,
		}
	}

	pub fn type_name(&self) -> &'static str {
		match self {
			Self::Undefined => "undefined",
			Self::Null => "null",
			Self::Bool(_) => "boolean",
			Self::Number(_) => "number",
			Self::String(_) => "string",
			Self::Object(_) => "object",
			Self::Array(_) => "array",
			Self::Function(_) => "function",
			Self::Opaque(_) => "opaque",
		}
	}

	/// The observer attached to this value, if it has been observed.
	pub fn observer(&self) -> Option<Observer> {
		match self {
			Self::Object(obj) => obj.observer(),
			Self::Array(arr) => arr.observer(),
			_ => None,
		}
	}

	/// Call this value with `args`.
	pub fn call(&self, args: &[Value]) -> ReactiveResult<Value> {
		match self {
			Self::Function(f) => f.call(args),
			other => Err(ReactiveError::NotCallable(other.type_name().to_string())),
		}
	}

	/// String conversion used for default sort order and array joins.
	pub fn to_display_string(&self) -> String {
		match self {
			Self::Undefined => "undefined".to_string(),
			Self::Null => "null".to_string(),
			Self::Bool(b) => b.to_string(),
			Self::Number(n) => format_number(*n),
			Self::String(s) => s.to_string(),
			Self::Object(_) => "[object Object]".to_string(),
			Self::Array(arr) => arr
				.to_vec()
				.iter()
				.map(|item| match item {
					Self::Undefined | Self::Null => String::new(),
					other => other.to_display_string(),
				})
				.collect::<Vec<_>>()
				.join(","),
			Self::Function(_) => "function".to_string(),
			Self::Opaque(_) => "[object Opaque]".to_string(),
		}
	}

	/// Build a fresh (unobserved) graph from JSON.
	pub fn from_json(json: serde_json::Value) -> Self {
		match json {
			serde_json::Value::Null => Self::Null,
			serde_json::Value::Bool(b) => Self::Bool(b),
			serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
			serde_json::Value::String(s) => Self::from(s),
			serde_json::Value::Array(items) => {
				Self::Array(items.into_iter().map(Self::from_json).collect())
			}
			serde_json::Value::Object(map) => Self::Object(
				map.into_iter()
					.map(|(key, value)| (key, Self::from_json(value)))
					.collect(),
			),
		}
	}

	/// Snapshot this value as JSON.
	///
	/// Reads go through property getters, so calling this inside a watcher
	/// makes every visited property a dependency. Functions, opaque values and
	/// `undefined` object members are skipped; cycles are an error.
	pub fn to_json(&self) -> ReactiveResult<serde_json::Value> {
		to_json_inner(self, &mut HashSet::new())
	}
}

fn to_json_inner(
	value: &Value,
	stack: &mut HashSet<ValueId>,
) -> ReactiveResult<serde_json::Value> {
	Ok(match value {
		Value::Undefined | Value::Null | Value::Function(_) | Value::Opaque(_) => {
			serde_json::Value::Null
		}
		Value::Bool(b) => serde_json::Value::Bool(*b),
		Value::Number(n) => number_to_json(*n),
		Value::String(s) => serde_json::Value::String(s.to_string()),
		Value::Array(arr) => {
			if !stack.insert(arr.id()) {
				return Err(ReactiveError::evaluation("Converting circular structure to JSON"));
			}
			let items = arr
				.to_vec()
				.iter()
				.map(|item| to_json_inner(item, stack))
				.collect::<ReactiveResult<Vec<_>>>()?;
			stack.remove(&arr.id());
			serde_json::Value::Array(items)
		}
		Value::Object(obj) => {
			if !stack.insert(obj.id()) {
				return Err(ReactiveError::evaluation("Converting circular structure to JSON"));
			}
			let mut map = serde_json::Map::new();
			for key in obj.keys() {
				let member = obj.get(&key)?;
				if matches!(member, Value::Undefined | Value::Function(_) | Value::Opaque(_)) {
					continue;
				}
				map.insert(key, to_json_inner(&member, stack)?);
			}
			stack.remove(&obj.id());
			serde_json::Value::Object(map)
		}
	})
}

fn number_to_json(n: f64) -> serde_json::Value {
	if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
		serde_json::Value::from(n as i64)
	} else {
		serde_json::Number::from_f64(n)
			.map(serde_json::Value::Number)
			.unwrap_or(serde_json::Value::Null)
	}
}

fn format_number(n: f64) -> String {
	if n.is_nan() {
		"NaN".to_string()
	} else if n.is_infinite() {
		if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
	} else if n.fract() == 0.0 && n.abs() < 1e21 {
		format!("{}", n as i64)
	} else {
		n.to_string()
	}
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Number(a), Self::Number(b)) => a == b,
			(Self::String(a), Self::String(b)) => a == b,
			(Self::Object(a), Self::Object(b)) => Object::ptr_eq(a, b),
			(Self::Array(a), Self::Array(b)) => Array::ptr_eq(a, b),
			(Self::Function(a), Self::Function(b)) => Function::ptr_eq(a, b),
			(Self::Opaque(a), Self::Opaque(b)) => Opaque::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl From<bool> for Value {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<f64> for Value {
	fn from(value: f64) -> Self {
		Self::Number(value)
	}
}

macro_rules! impl_from_integer {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for Value {
				fn from(value: $ty) -> Self {
					Self::Number(value as f64)
				}
			}
		)*
	};
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(Rc::from(value))
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self::String(Rc::from(value))
	}
}

impl From<Object> for Value {
	fn from(value: Object) -> Self {
		Self::Object(value)
	}
}

impl From<Array> for Value {
	fn from(value: Array) -> Self {
		Self::Array(value)
	}
}

impl From<Function> for Value {
	fn from(value: Function) -> Self {
		Self::Function(value)
	}
}

impl From<Opaque> for Value {
	fn from(value: Opaque) -> Self {
		Self::Opaque(value)
	}
}

impl<T: Into<Value>> From<Option<T>> for Value {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

impl From<serde_json::Value> for Value {
	fn from(value: serde_json::Value) -> Self {
		Self::from_json(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_strict_equality_of_scalars() {
		assert_eq!(Value::from(1), Value::from(1.0));
		assert_eq!(Value::from("a"), Value::from("a".to_string()));
		assert_ne!(Value::from(1), Value::from("1"));
		assert_ne!(Value::Undefined, Value::Null);
		assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));
	}

	#[rstest]
	fn test_objects_compare_by_identity() {
		let a = Object::new();
		let b = Object::new();

		assert_eq!(Value::from(a.clone()), Value::from(a.clone()));
		assert_ne!(Value::from(a), Value::from(b));
	}

	#[rstest]
	fn test_json_round_trip_preserves_shape() {
		let source = json!({ "name": "Ada", "age": 36, "tags": ["x", null], "nested": { "ok": true } });
		let value = Value::from_json(source.clone());

		assert_eq!(value.to_json().unwrap(), source);
	}

	#[rstest]
	fn test_to_json_rejects_cycles() {
		let obj = Object::new();
		obj.set("self", Value::from(obj.clone())).unwrap();

		assert!(Value::from(obj.clone()).to_json().is_err());

		// Break the cycle so the object can be freed.
		obj.remove("self");
	}

	#[rstest]
	#[case(Value::Undefined, "undefined")]
	#[case(Value::from(3), "3")]
	#[case(Value::from(2.5), "2.5")]
	#[case(Value::Number(f64::NAN), "NaN")]
	#[case(Value::from(true), "true")]
	#[case(Value::from_json(json!([1, null, "b"])), "1,,b")]
	fn test_display_string(#[case] value: Value, #[case] expected: &str) {
		assert_eq!(value.to_display_string(), expected);
	}

	#[rstest]
	fn test_call_non_function_fails() {
		let err = Value::from(1).call(&[]).unwrap_err();
		assert_eq!(err, ReactiveError::NotCallable("number".to_string()));
	}

	#[rstest]
	fn test_function_call() {
		let add = Function::new(|args| {
			let sum = args.iter().filter_map(Value::as_number).sum::<f64>();
			Ok(Value::from(sum))
		});

		assert_eq!(Value::from(add).call(&[1.into(), 2.into()]).unwrap(), Value::from(3));
	}

	#[rstest]
	fn test_opaque_downcast() {
		let opaque = Opaque::new(42_u8);
		assert_eq!(opaque.downcast_ref::<u8>(), Some(&42));
		assert!(opaque.downcast_ref::<u16>().is_none());
	}
}
