use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::parser::{self, SelectorError};
use crate::value::{Properties, PropertyValue};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Filter {
	And(Vec<Filter>),
	Or(Vec<Filter>),
	Not(Box<Filter>),
	Item { key: String, op: Op },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
	Equal(String),
	Approx(String),
	Greater(String),
	Less(String),
	Present,
	Substring {
		initial: Option<String>,
		any: Vec<String>,
		last: Option<String>,
	},
}

/// A parsed LDAP filter, cheap to clone.
///
/// Equality follows the parsed structure, so two selectors that
/// differ only in insignificant whitespace compare equal.
#[derive(Clone)]
pub struct Selector {
	source: Arc<str>,
	root: Arc<Filter>,
}

impl Selector {
	/// Parses a filter string.
	pub fn parse(source: &str) -> Result<Self, SelectorError> {
		let root = parser::parse(source)?;
		Ok(Self {
			source: Arc::from(source.trim()),
			root: Arc::new(root),
		})
	}

	/// Builds `(key=value)` with the value escaped.
	pub fn equals(key: &str, value: &str) -> Self {
		let mut escaped = String::with_capacity(value.len());
		for ch in value.chars() {
			if matches!(ch, '(' | ')' | '*' | '\\') {
				escaped.push('\\');
			}
			escaped.push(ch);
		}
		Self {
			source: Arc::from(format!("({key}={escaped})")),
			root: Arc::new(Filter::Item {
				key: key.to_string(),
				op: Op::Equal(value.to_string()),
			}),
		}
	}

	/// Original filter text.
	pub fn as_str(&self) -> &str {
		&self.source
	}

	/// Returns `(key, value)` when the whole selector is a single equality item.
	pub fn as_equality(&self) -> Option<(&str, &str)> {
		match &*self.root {
			Filter::Item { key, op: Op::Equal(value) } => Some((key, value)),
			_ => None,
		}
	}

	/// Tests the selector against a property map.
	pub fn matches(&self, props: &Properties) -> bool {
		eval(&self.root, props)
	}
}

impl PartialEq for Selector {
	fn eq(&self, other: &Self) -> bool {
		self.root == other.root
	}
}

impl Eq for Selector {}

impl fmt::Debug for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Selector").field(&&*self.source).finish()
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.source)
	}
}

impl FromStr for Selector {
	type Err = SelectorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

fn eval(filter: &Filter, props: &Properties) -> bool {
	match filter {
		Filter::And(items) => items.iter().all(|f| eval(f, props)),
		Filter::Or(items) => items.iter().any(|f| eval(f, props)),
		Filter::Not(inner) => !eval(inner, props),
		Filter::Item { key, op } => match props.get(key) {
			Some(value) => eval_value(op, value),
			None => false,
		},
	}
}

fn eval_value(op: &Op, value: &PropertyValue) -> bool {
	match value {
		PropertyValue::List(items) => match op {
			Op::Present => true,
			_ => items.iter().any(|item| eval_str(op, item)),
		},
		PropertyValue::Integer(n) => eval_int(op, *n),
		PropertyValue::Bool(b) => eval_bool(op, *b),
		PropertyValue::String(s) => eval_str(op, s),
	}
}

fn eval_str(op: &Op, actual: &str) -> bool {
	match op {
		Op::Present => true,
		Op::Equal(expected) => actual == expected,
		Op::Approx(expected) => normalize_approx(actual) == normalize_approx(expected),
		Op::Greater(expected) => actual >= expected.as_str(),
		Op::Less(expected) => actual <= expected.as_str(),
		Op::Substring { initial, any, last } => substring_match(actual, initial.as_deref(), any, last.as_deref()),
	}
}

fn eval_int(op: &Op, actual: i64) -> bool {
	let parse = |s: &str| s.trim().parse::<i64>().ok();
	match op {
		Op::Present => true,
		Op::Equal(expected) | Op::Approx(expected) => parse(expected) == Some(actual),
		Op::Greater(expected) => parse(expected).is_some_and(|e| actual >= e),
		Op::Less(expected) => parse(expected).is_some_and(|e| actual <= e),
		Op::Substring { .. } => eval_str(op, &actual.to_string()),
	}
}

fn eval_bool(op: &Op, actual: bool) -> bool {
	match op {
		Op::Present => true,
		Op::Equal(expected) | Op::Approx(expected) => expected.trim().eq_ignore_ascii_case(if actual { "true" } else { "false" }),
		Op::Greater(_) | Op::Less(_) => false,
		Op::Substring { .. } => eval_str(op, if actual { "true" } else { "false" }),
	}
}

fn normalize_approx(s: &str) -> String {
	s.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect()
}

fn substring_match(actual: &str, initial: Option<&str>, any: &[String], last: Option<&str>) -> bool {
	let mut rest = actual;
	if let Some(prefix) = initial {
		let Some(stripped) = rest.strip_prefix(prefix) else {
			return false;
		};
		rest = stripped;
	}
	for part in any {
		let Some(idx) = rest.find(part.as_str()) else {
			return false;
		};
		rest = &rest[idx + part.len()..];
	}
	match last {
		Some(suffix) => rest.ends_with(suffix),
		None => true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn props() -> Properties {
		Properties::new()
			.with("whiteboard.name", "orders")
			.with("service.ranking", 10)
			.with("secure", true)
			.with("objectClass", vec!["com.acme.Orders", "com.acme.Audited"])
			.with("description", "Order  Service")
	}

	fn check(filter: &str) -> bool {
		Selector::parse(filter).unwrap().matches(&props())
	}

	#[test]
	fn equality_and_presence() {
		assert!(check("(whiteboard.name=orders)"));
		assert!(!check("(whiteboard.name=invoices)"));
		assert!(check("(WHITEBOARD.NAME=orders)"));
		assert!(check("(secure=*)"));
		assert!(!check("(missing=*)"));
	}

	#[test]
	fn integers_compare_numerically() {
		assert!(check("(service.ranking=10)"));
		assert!(check("(service.ranking>=9)"));
		assert!(!check("(service.ranking>=11)"));
		assert!(check("(service.ranking<=10)"));
		assert!(!check("(service.ranking>=abc)"));
	}

	#[test]
	fn booleans_support_equality_only() {
		assert!(check("(secure=true)"));
		assert!(check("(secure=TRUE)"));
		assert!(!check("(secure=false)"));
		assert!(!check("(secure>=false)"));
	}

	#[test]
	fn lists_match_any_element() {
		assert!(check("(objectClass=com.acme.Audited)"));
		assert!(check("(objectClass=com.acme.*)"));
		assert!(!check("(objectClass=org.*)"));
	}

	#[test]
	fn approximate_ignores_case_and_whitespace() {
		assert!(check("(description~=orderservice)"));
		assert!(!check("(description=orderservice)"));
	}

	#[test]
	fn substrings() {
		assert!(check("(whiteboard.name=o*s)"));
		assert!(check("(whiteboard.name=*rde*)"));
		assert!(check("(whiteboard.name=or*d*rs)"));
		assert!(!check("(whiteboard.name=*x*)"));
		assert!(!check("(whiteboard.name=orders*s)"));
	}

	#[test]
	fn composites() {
		assert!(check("(&(whiteboard.name=orders)(service.ranking>=5))"));
		assert!(!check("(&(whiteboard.name=orders)(service.ranking>=50))"));
		assert!(check("(|(whiteboard.name=x)(secure=true))"));
		assert!(check("(!(whiteboard.name=x))"));
		assert!(check("( & (whiteboard.name=orders) ( secure=true ) )"));
	}

	#[test]
	fn structural_equality_ignores_whitespace() {
		let a = Selector::parse("(&(a=1)(b=2))").unwrap();
		let b = Selector::parse(" (& (a=1) (b=2)) ").unwrap();
		assert_eq!(a, b);
		assert_ne!(a, Selector::parse("(&(a=1)(b=3))").unwrap());
	}

	#[test]
	fn equals_builder_escapes_and_roundtrips() {
		let sel = Selector::equals("whiteboard.name", "a(b)*");
		assert_eq!(sel.as_str(), "(whiteboard.name=a\\(b\\)\\*)");
		assert_eq!(sel, Selector::parse(sel.as_str()).unwrap());
		assert_eq!(sel.as_equality(), Some(("whiteboard.name", "a(b)*")));
	}
}
