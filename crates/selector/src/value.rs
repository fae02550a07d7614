use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One registration property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
	Bool(bool),
	Integer(i64),
	String(String),
	List(Vec<String>),
}

impl PropertyValue {
	/// Returns the value as a string slice when it is a plain string.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Returns the value as an integer, parsing strings leniently.
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Integer(n) => Some(*n),
			Self::String(s) => s.trim().parse().ok(),
			_ => None,
		}
	}

	/// Interprets the value as a boolean flag (`true` or `"true"`).
	pub fn is_true(&self) -> bool {
		match self {
			Self::Bool(b) => *b,
			Self::String(s) => s.trim().eq_ignore_ascii_case("true"),
			_ => false,
		}
	}

	/// Flattens the value to a list of strings.
	pub fn to_strings(&self) -> Vec<String> {
		match self {
			Self::List(items) => items.clone(),
			other => vec![other.to_string()],
		}
	}
}

impl fmt::Display for PropertyValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bool(b) => write!(f, "{b}"),
			Self::Integer(n) => write!(f, "{n}"),
			Self::String(s) => f.write_str(s),
			Self::List(items) => write!(f, "[{}]", items.join(", ")),
		}
	}
}

impl From<&str> for PropertyValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for PropertyValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl From<i64> for PropertyValue {
	fn from(value: i64) -> Self {
		Self::Integer(value)
	}
}

impl From<i32> for PropertyValue {
	fn from(value: i32) -> Self {
		Self::Integer(i64::from(value))
	}
}

impl From<bool> for PropertyValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<Vec<String>> for PropertyValue {
	fn from(value: Vec<String>) -> Self {
		Self::List(value)
	}
}

impl From<Vec<&str>> for PropertyValue {
	fn from(value: Vec<&str>) -> Self {
		Self::List(value.into_iter().map(str::to_string).collect())
	}
}

/// Immutable-by-convention registration property map.
///
/// Keys keep their original spelling; lookups through [`Properties::get`]
/// are ASCII case-insensitive as selector attribute names are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert.
	#[must_use]
	pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
		self.insert(key, value);
		self
	}

	pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Option<PropertyValue> {
		self.0.insert(key.into(), value.into())
	}

	/// Case-insensitive lookup; an exact-case hit is preferred.
	pub fn get(&self, key: &str) -> Option<&PropertyValue> {
		self.0
			.get(key)
			.or_else(|| self.0.iter().find(|(k, _)| k.eq_ignore_ascii_case(key)).map(|(_, v)| v))
	}

	pub fn get_str(&self, key: &str) -> Option<&str> {
		self.get(key).and_then(PropertyValue::as_str)
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<K, V> FromIterator<(K, V)> for Properties
where
	K: Into<String>,
	V: Into<PropertyValue>,
{
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lookup_is_case_insensitive() {
		let props = Properties::new().with("Service.Ranking", 7);
		assert_eq!(props.get("service.ranking").and_then(PropertyValue::as_i64), Some(7));
		assert!(props.contains_key("SERVICE.RANKING"));
		assert!(props.get("service.id").is_none());
	}

	#[test]
	fn string_integers_parse_leniently() {
		assert_eq!(PropertyValue::from(" 42 ").as_i64(), Some(42));
		assert_eq!(PropertyValue::from("x").as_i64(), None);
		assert_eq!(PropertyValue::from(true).as_i64(), None);
	}

	#[test]
	fn deserializes_typed_values_from_toml() {
		let props: Properties = toml::from_str(
			r#"
			"service.id" = 12
			"whiteboard.resource" = true
			"whiteboard.name" = "orders"
			objectClass = ["com.acme.Orders", "java.lang.Object"]
			"#,
		)
		.unwrap();
		assert_eq!(props.get("service.id"), Some(&PropertyValue::Integer(12)));
		assert!(props.get("whiteboard.resource").is_some_and(PropertyValue::is_true));
		assert_eq!(props.get_str("whiteboard.name"), Some("orders"));
		assert_eq!(props.get("objectclass").map(PropertyValue::to_strings).map(|v| v.len()), Some(2));
	}
}
