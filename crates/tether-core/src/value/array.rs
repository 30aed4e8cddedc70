//! Observable sequences.
//!
//! [`Array`] wraps a dynamic vector and routes every mutating operation
//! through a single interception point. Once the array has an observer, each
//! mutation observes the newly inserted elements and then notifies the array's
//! whole-value registry, so anything that read the array through a reactive
//! property is refreshed.

use core::cell::{Cell, RefCell};
use core::cmp::Ordering;
use core::fmt;
use std::rc::{Rc, Weak};

use super::{Value, ValueId};
use crate::debug_log;
use crate::error::{ReactiveError, ReactiveResult};
use crate::observer::{Observer, observe};
use crate::runtime::{try_with_runtime, with_runtime};

struct ArrayInner {
	id: ValueId,
	items: RefCell<Vec<Value>>,
	extensible: Cell<bool>,
	frozen: Cell<bool>,
}

impl Drop for ArrayInner {
	fn drop(&mut self) {
		let id = self.id;
		let _ = try_with_runtime(|rt| {
			if let Ok(mut observers) = rt.observers.try_borrow_mut() {
				observers.release(id);
			}
		});
	}
}

/// Shared handle to a dynamic vector.
#[derive(Clone)]
pub struct Array(Rc<ArrayInner>);

impl Array {
	pub fn new() -> Self {
		Self::from_vec(Vec::new())
	}

	pub fn from_vec(items: Vec<Value>) -> Self {
		Self(Rc::new(ArrayInner {
			id: ValueId::new(),
			items: RefCell::new(items),
			extensible: Cell::new(true),
			frozen: Cell::new(false),
		}))
	}

	pub fn id(&self) -> ValueId {
		self.0.id
	}

	pub fn ptr_eq(a: &Self, b: &Self) -> bool {
		Rc::ptr_eq(&a.0, &b.0)
	}

	pub fn downgrade(&self) -> WeakArray {
		WeakArray(Rc::downgrade(&self.0))
	}

	/// The observer attached to this array, if any.
	pub fn observer(&self) -> Option<Observer> {
		with_runtime(|rt| rt.observers.borrow().lookup(self.id()))
	}

	pub fn len(&self) -> usize {
		self.0.items.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn get(&self, index: usize) -> Option<Value> {
		self.0.items.borrow().get(index).cloned()
	}

	/// Snapshot of the current elements.
	pub fn to_vec(&self) -> Vec<Value> {
		self.0.items.borrow().clone()
	}

	pub fn index_of(&self, value: &Value) -> Option<usize> {
		self.0.items.borrow().iter().position(|item| item == value)
	}

	/// Keep the array out of observation. Mutation is still allowed; an
	/// existing observer is kept.
	pub fn prevent_extensions(&self) {
		self.0.extensible.set(false);
	}

	pub fn is_extensible(&self) -> bool {
		self.0.extensible.get()
	}

	/// Make the array non-extensible and reject every further mutation.
	pub fn freeze(&self) {
		self.0.extensible.set(false);
		self.0.frozen.set(true);
	}

	pub fn is_frozen(&self) -> bool {
		self.0.frozen.get()
	}

	/// Append `value`, returning the new length.
	pub fn push(&self, value: impl Into<Value>) -> ReactiveResult<usize> {
		let value = value.into();
		self.intercept(|items| {
			items.push(value.clone());
			(items.len(), vec![value])
		})
	}

	pub fn pop(&self) -> ReactiveResult<Option<Value>> {
		self.intercept(|items| (items.pop(), Vec::new()))
	}

	/// Prepend `value`, returning the new length.
	pub fn unshift(&self, value: impl Into<Value>) -> ReactiveResult<usize> {
		let value = value.into();
		self.intercept(|items| {
			items.insert(0, value.clone());
			(items.len(), vec![value])
		})
	}

	pub fn shift(&self) -> ReactiveResult<Option<Value>> {
		self.intercept(|items| {
			if items.is_empty() {
				(None, Vec::new())
			} else {
				(Some(items.remove(0)), Vec::new())
			}
		})
	}

	/// Remove `delete_count` elements at `start` and insert `insert` in their
	/// place. Out-of-range bounds are clamped. Returns the removed elements.
	pub fn splice(
		&self,
		start: usize,
		delete_count: usize,
		insert: Vec<Value>,
	) -> ReactiveResult<Vec<Value>> {
		self.intercept(|items| {
			let start = start.min(items.len());
			let end = start + delete_count.min(items.len() - start);
			let removed = items.splice(start..end, insert.iter().cloned()).collect();
			(removed, insert)
		})
	}

	/// Sort by string conversion; `undefined` elements go last.
	pub fn sort(&self) -> ReactiveResult<()> {
		self.sort_by(default_compare)
	}

	/// Stable sort with a caller-supplied ordering.
	///
	/// The comparator runs against a snapshot, so it may read this array.
	pub fn sort_by<F>(&self, mut compare: F) -> ReactiveResult<()>
	where
		F: FnMut(&Value, &Value) -> Ordering,
	{
		if self.is_frozen() {
			return Err(ReactiveError::Frozen);
		}
		let mut sorted = self.to_vec();
		sorted.sort_by(|a, b| compare(a, b));
		self.intercept(|items| {
			*items = sorted;
			((), Vec::new())
		})
	}

	pub fn reverse(&self) -> ReactiveResult<()> {
		self.intercept(|items| {
			items.reverse();
			((), Vec::new())
		})
	}

	/// Assign `index`, growing the array with `undefined` as needed.
	/// Returns the replaced element.
	pub fn set_index(&self, index: usize, value: impl Into<Value>) -> ReactiveResult<Value> {
		let value = value.into();
		self.intercept(|items| {
			if index >= items.len() {
				items.resize(index + 1, Value::Undefined);
			}
			let replaced = core::mem::replace(&mut items[index], value.clone());
			(replaced, vec![value])
		})
	}

	/// Remove the first element strictly equal to `value`.
	///
	/// Nothing is notified when no element matches.
	pub fn remove_item(&self, value: &Value) -> ReactiveResult<Option<Value>> {
		match self.index_of(value) {
			Some(index) => Ok(self.splice(index, 1, Vec::new())?.into_iter().next()),
			None => Ok(None),
		}
	}

	/// Run a mutation, then observe what it inserted and notify dependents.
	fn intercept<R>(
		&self,
		mutate: impl FnOnce(&mut Vec<Value>) -> (R, Vec<Value>),
	) -> ReactiveResult<R> {
		if self.is_frozen() {
			return Err(ReactiveError::Frozen);
		}
		let (result, inserted) = {
			let mut items = self.0.items.borrow_mut();
			mutate(&mut items)
		};
		if let Some(ob) = self.observer() {
			debug_log!("array {} mutated, {} element(s) inserted", self.id(), inserted.len());
			for item in &inserted {
				observe(item, None);
			}
			ob.dep().notify()?;
		}
		Ok(result)
	}
}

fn default_compare(a: &Value, b: &Value) -> Ordering {
	match (a.is_undefined(), b.is_undefined()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => a.to_display_string().cmp(&b.to_display_string()),
	}
}

impl Default for Array {
	fn default() -> Self {
		Self::new()
	}
}

impl From<Vec<Value>> for Array {
	fn from(items: Vec<Value>) -> Self {
		Self::from_vec(items)
	}
}

impl<V: Into<Value>> FromIterator<V> for Array {
	fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
		Self::from_vec(iter.into_iter().map(Into::into).collect())
	}
}

impl fmt::Debug for Array {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Array")
			.field("id", &self.id())
			.field("len", &self.len())
			.finish()
	}
}

/// Non-owning handle to an [`Array`].
#[derive(Clone)]
pub struct WeakArray(Weak<ArrayInner>);

impl WeakArray {
	pub fn upgrade(&self) -> Option<Array> {
		self.0.upgrade().map(Array)
	}
}

impl fmt::Debug for WeakArray {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("WeakArray")
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn numbers(arr: &Array) -> Vec<f64> {
		arr.to_vec().iter().filter_map(Value::as_number).collect()
	}

	#[rstest]
	fn test_push_and_pop() {
		let arr: Array = [1, 2, 3].into_iter().collect();

		assert_eq!(arr.push(4).unwrap(), 4);
		assert_eq!(numbers(&arr), vec![1.0, 2.0, 3.0, 4.0]);
		assert_eq!(arr.pop().unwrap(), Some(Value::from(4)));
	}

	#[rstest]
	fn test_shift_on_empty_array() {
		let arr = Array::new();
		assert_eq!(arr.shift().unwrap(), None);
	}

	#[rstest]
	#[case(1, 1, vec![9], vec![1.0, 9.0, 3.0], vec![2.0])]
	#[case(10, 2, vec![9], vec![1.0, 2.0, 3.0, 9.0], vec![])]
	#[case(0, 10, vec![], vec![], vec![1.0, 2.0, 3.0])]
	fn test_splice(
		#[case] start: usize,
		#[case] delete_count: usize,
		#[case] insert: Vec<i32>,
		#[case] expected: Vec<f64>,
		#[case] expected_removed: Vec<f64>,
	) {
		let arr: Array = [1, 2, 3].into_iter().collect();
		let removed = arr
			.splice(start, delete_count, insert.into_iter().map(Value::from).collect())
			.unwrap();

		assert_eq!(numbers(&arr), expected);
		assert_eq!(
			removed.iter().filter_map(Value::as_number).collect::<Vec<_>>(),
			expected_removed
		);
	}

	#[rstest]
	fn test_default_sort_is_lexicographic_with_undefined_last() {
		let arr = Array::from_vec(vec![
			Value::Undefined,
			Value::from(10),
			Value::from(9),
			Value::from(1),
		]);
		arr.sort().unwrap();

		assert_eq!(
			arr.to_vec(),
			vec![Value::from(1), Value::from(10), Value::from(9), Value::Undefined]
		);
	}

	#[rstest]
	fn test_set_index_grows_array() {
		let arr: Array = [1].into_iter().collect();
		let replaced = arr.set_index(3, 7).unwrap();

		assert_eq!(replaced, Value::Undefined);
		assert_eq!(arr.len(), 4);
		assert_eq!(arr.get(3), Some(Value::from(7)));
		assert_eq!(arr.get(2), Some(Value::Undefined));
	}

	#[rstest]
	fn test_remove_item_uses_strict_equality() {
		let arr: Array = ["a", "b", "a"].into_iter().collect();

		assert_eq!(arr.remove_item(&Value::from("a")).unwrap(), Some(Value::from("a")));
		assert_eq!(arr.to_vec(), vec![Value::from("b"), Value::from("a")]);
		assert_eq!(arr.remove_item(&Value::from("z")).unwrap(), None);
	}

	#[rstest]
	fn test_frozen_array_rejects_mutation() {
		let arr: Array = [1, 2].into_iter().collect();
		arr.freeze();

		assert_eq!(arr.push(3), Err(ReactiveError::Frozen));
		assert_eq!(arr.sort(), Err(ReactiveError::Frozen));
		assert_eq!(arr.len(), 2);
		assert!(!arr.is_extensible());
	}
}
