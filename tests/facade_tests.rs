//! Facade integration tests
//!
//! Verifies:
//! - The prelude exposes the engine and the instance layer together
//! - Array mutations on an instance's data flow into cached computed members

use rstest::rstest;
use serde_json::json;
use tether::prelude::*;

fn total(vm: &Instance) -> ReactiveResult<Value> {
	let items = vm.get("items")?;
	let sum = items
		.as_array()
		.map(|arr| arr.to_vec().iter().filter_map(Value::as_number).sum::<f64>())
		.unwrap_or(0.0);
	Ok(Value::from(sum))
}

#[rstest]
fn test_computed_over_array_mutations() {
	let vm = Instance::new(
		InstanceOptions::new()
			.data(Value::from_json(json!({ "items": [1, 2, 3] })))
			.computed("total", ComputedDef::getter(total)),
	);
	assert_eq!(vm.get("total").unwrap(), Value::from(6));

	let items = vm.get("items").unwrap();
	let items = items.as_array().unwrap();
	items.push(4).unwrap();
	assert_eq!(vm.get("total").unwrap(), Value::from(10));

	items.splice(0, 2, vec![]).unwrap();
	assert_eq!(vm.get("total").unwrap(), Value::from(7));
}

#[rstest]
fn test_engine_without_instance() {
	let state = Value::from_json(json!({ "count": 1 }));
	observe(&state, None);
	let obj = state.as_object().unwrap().clone();

	let double = Watcher::new(
		obj.clone(),
		|s: &Object| Ok(Value::from(s.get("count")?.as_number().unwrap_or_default() * 2.0)),
		WatcherOptions::default(),
	)
	.unwrap();
	obj.set("count", 5).unwrap();

	assert_eq!(double.value(), Value::from(10));
}
