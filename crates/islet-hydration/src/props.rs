//! Prop revival.
//!
//! The server serializes island props as a JSON object whose values are
//! `[type, value]` tuples, so that values JSON cannot express (dates, maps,
//! sets, big integers, URLs, typed arrays, infinities) survive the trip.
//!
//! | Tag | Revived as |
//! |-----|------------|
//! | 0 | plain value; objects are revived field by field |
//! | 1 | array of tuples |
//! | 2 | regular expression source |
//! | 3 | date (ISO-8601 string) |
//! | 4 | map, as an array of `[key, value]` tuple pairs |
//! | 5 | set, as an array of tuples |
//! | 6 | big integer (decimal string) |
//! | 7 | URL |
//! | 8, 9, 10 | `u8`, `u16`, `u32` arrays |
//! | 11 | infinity, signed by the value |
//!
//! Unknown tags and malformed tuples revive to [`PropValue::Undefined`]
//! rather than failing the whole island.

use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use url::Url;

/// Revived props, keyed by prop name.
pub type Props = BTreeMap<String, PropValue>;

/// A revived prop value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
	/// No value (unknown tag or malformed tuple).
	Undefined,
	/// JSON `null`.
	Null,
	/// A boolean.
	Bool(bool),
	/// A finite number.
	Number(Number),
	/// Positive (`false`) or negative (`true`) infinity.
	Infinity {
		/// Sign of the infinity.
		negative: bool,
	},
	/// A string.
	String(String),
	/// An array.
	Array(Vec<PropValue>),
	/// An object.
	Object(BTreeMap<String, PropValue>),
	/// A regular expression, as its source.
	RegExp(String),
	/// A date, as its ISO-8601 representation.
	Date(String),
	/// A map with arbitrary keys, in insertion order.
	Map(Vec<(PropValue, PropValue)>),
	/// A set, in insertion order.
	Set(Vec<PropValue>),
	/// A big integer, as its decimal digits.
	BigInt(String),
	/// A URL.
	Url(Url),
	/// A `Uint8Array`.
	Uint8Array(Vec<u8>),
	/// A `Uint16Array`.
	Uint16Array(Vec<u16>),
	/// A `Uint32Array`.
	Uint32Array(Vec<u32>),
}

impl PropValue {
	/// Returns the string payload of `String` values.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the value as `i64` when it is an integral number.
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Number(n) => n.as_i64(),
			_ => None,
		}
	}

	/// Whether the value is [`PropValue::Undefined`].
	pub fn is_undefined(&self) -> bool {
		matches!(self, Self::Undefined)
	}
}

/// Revives the parsed `props` attribute.
///
/// The top level is an object of tuples. A non-object top level is returned
/// as an empty prop set.
pub fn revive_props(raw: &Value) -> Props {
	match raw {
		Value::Object(fields) => revive_fields(fields),
		_ => Props::new(),
	}
}

fn revive_fields(fields: &Map<String, Value>) -> BTreeMap<String, PropValue> {
	fields
		.iter()
		.map(|(key, value)| (key.clone(), revive_tuple(value)))
		.collect()
}

/// Revives one `[type, value]` tuple.
pub fn revive_tuple(raw: &Value) -> PropValue {
	let Some([tag, value]) = raw.as_array().map(Vec::as_slice) else {
		return PropValue::Undefined;
	};
	let Some(tag) = tag.as_u64() else {
		return PropValue::Undefined;
	};

	match tag {
		0 => revive_plain(value),
		1 => PropValue::Array(revive_array(value)),
		2 => value
			.as_str()
			.map_or(PropValue::Undefined, |s| PropValue::RegExp(s.to_string())),
		3 => value
			.as_str()
			.map_or(PropValue::Undefined, |s| PropValue::Date(s.to_string())),
		4 => PropValue::Map(
			revive_array(value)
				.into_iter()
				.map(|entry| match entry {
					PropValue::Array(mut pair) if pair.len() == 2 => {
						let v = pair.pop().unwrap_or(PropValue::Undefined);
						let k = pair.pop().unwrap_or(PropValue::Undefined);
						(k, v)
					}
					other => (other, PropValue::Undefined),
				})
				.collect(),
		),
		5 => PropValue::Set(revive_array(value)),
		6 => match value {
			Value::String(s) => PropValue::BigInt(s.clone()),
			Value::Number(n) => PropValue::BigInt(n.to_string()),
			_ => PropValue::Undefined,
		},
		7 => value
			.as_str()
			.and_then(|s| Url::parse(s).ok())
			.map_or(PropValue::Undefined, PropValue::Url),
		8 => typed_array(value).map_or(PropValue::Undefined, PropValue::Uint8Array),
		9 => typed_array(value).map_or(PropValue::Undefined, PropValue::Uint16Array),
		10 => typed_array(value).map_or(PropValue::Undefined, PropValue::Uint32Array),
		11 => PropValue::Infinity {
			negative: value.as_f64().is_some_and(|sign| sign < 0.0),
		},
		_ => PropValue::Undefined,
	}
}

fn revive_plain(value: &Value) -> PropValue {
	match value {
		Value::Null => PropValue::Null,
		Value::Bool(b) => PropValue::Bool(*b),
		Value::Number(n) => PropValue::Number(n.clone()),
		Value::String(s) => PropValue::String(s.clone()),
		Value::Object(fields) => PropValue::Object(revive_fields(fields)),
		// Arrays are always tagged 1; a bare array under tag 0 is kept as-is.
		Value::Array(items) => PropValue::Array(items.iter().map(revive_plain).collect()),
	}
}

fn revive_array(value: &Value) -> Vec<PropValue> {
	value
		.as_array()
		.map(|items| items.iter().map(revive_tuple).collect())
		.unwrap_or_default()
}

fn typed_array<T: TryFrom<u64>>(value: &Value) -> Option<Vec<T>> {
	value
		.as_array()?
		.iter()
		.map(|item| item.as_u64().and_then(|n| T::try_from(n).ok()))
		.collect()
}
