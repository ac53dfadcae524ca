use std::collections::BTreeMap;
use std::collections::BTreeSet;

use derive_more::Deref;
use derive_more::DerefMut;
use float_cmp::approx_eq;
use serde::Deserialize;
use serde_json::Value;

/// Raw user supplied parameter values, keyed by parameter name.
#[derive(Debug, Clone, Default, Deserialize, Deref, DerefMut, PartialEq, Eq)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, String>);

impl<K, V> FromIterator<(K, V)> for Parameters
where
	K: Into<String>,
	V: Into<String>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(
			iter.into_iter()
				.map(|(key, value)| (key.into(), value.into()))
				.collect(),
		)
	}
}

/// Named values visible to rules, with an optional parent collection.
///
/// Lookups check this collection first and then walk up the parent chain,
/// so a child shadows any parent entry with the same key.
#[derive(Debug, Clone, Default)]
pub struct VariableCollection {
	values: BTreeMap<String, Value>,
	parent: Option<Box<VariableCollection>>,
}

impl VariableCollection {
	/// An empty collection with no parent.
	pub fn root() -> Self {
		Self::default()
	}

	/// The process environment, with each key rendered through `format`
	/// (`{0}` is replaced by the variable name).
	pub fn environment(format: &str) -> Self {
		let mut collection = Self::root();
		for (key, value) in std::env::vars() {
			collection.set(format_key(format, &key), Value::String(value));
		}
		collection
	}

	/// User parameters with inferred literal types, keys rendered through
	/// `format`.
	pub fn from_parameters(parameters: &Parameters, format: &str) -> Self {
		let mut collection = Self::root();
		for (key, value) in parameters.iter() {
			collection.set(format_key(format, key), infer_literal(value));
		}
		collection
	}

	#[must_use]
	pub fn with_parent(mut self, parent: VariableCollection) -> Self {
		self.parent = Some(Box::new(parent));
		self
	}

	/// Attach `ancestor` above the topmost parent of this chain.
	pub fn attach_root(&mut self, ancestor: VariableCollection) {
		match self.parent.as_deref_mut() {
			Some(parent) => parent.attach_root(ancestor),
			None => self.parent = Some(Box::new(ancestor)),
		}
	}

	pub fn parent(&self) -> Option<&VariableCollection> {
		self.parent.as_deref()
	}

	pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
		self.values.insert(key.into(), value.into());
	}

	/// Look `key` up in this collection, then in each parent.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.values
			.get(key)
			.or_else(|| self.parent.as_deref().and_then(|parent| parent.get(key)))
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Every visible key, nearest collection first, each key once.
	pub fn keys(&self) -> Vec<&str> {
		let mut seen = BTreeSet::new();
		let mut keys = Vec::new();
		let mut current = Some(self);

		while let Some(collection) = current {
			for key in collection.values.keys() {
				if seen.insert(key.as_str()) {
					keys.push(key.as_str());
				}
			}
			current = collection.parent.as_deref();
		}

		keys
	}
}

fn format_key(format: &str, key: &str) -> String {
	if format.is_empty() {
		return key.to_string();
	}

	format.replace("{0}", key)
}

/// Turn a parameter literal into a typed value: booleans, `null`, floats,
/// integers (decimal or `0x` hex) and quoted strings are recognized, anything
/// else stays a string.
pub fn infer_literal(literal: &str) -> Value {
	if literal.contains('"') {
		let inner = literal
			.strip_prefix('"')
			.and_then(|rest| rest.strip_suffix('"'))
			.unwrap_or(literal);
		return Value::String(inner.to_string());
	}

	if literal.eq_ignore_ascii_case("true") {
		return Value::Bool(true);
	}

	if literal.eq_ignore_ascii_case("false") {
		return Value::Bool(false);
	}

	if literal.eq_ignore_ascii_case("null") {
		return Value::Null;
	}

	if literal.contains('.') {
		if let Some(number) = literal
			.parse::<f64>()
			.ok()
			.and_then(serde_json::Number::from_f64)
		{
			return Value::Number(number);
		}
	}

	if let Ok(number) = literal.parse::<i64>() {
		return Value::from(number);
	}

	let hex = literal
		.strip_prefix("0x")
		.or_else(|| literal.strip_prefix("0X"));
	if let Some(number) = hex.and_then(|digits| i64::from_str_radix(digits, 16).ok()) {
		return Value::from(number);
	}

	Value::String(literal.to_string())
}

/// Whether a value counts as true inside a condition.
pub fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(value) => *value,
		Value::Number(number) => number
			.as_f64()
			.is_some_and(|number| !approx_eq!(f64, number, 0.0, ulps = 2)),
		Value::String(string) => !string.is_empty(),
		Value::Array(items) => !items.is_empty(),
		Value::Object(map) => !map.is_empty(),
	}
}

/// The text a value renders as when substituted into output.
pub fn display_value(value: &Value) -> String {
	match value {
		Value::String(string) => string.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}
