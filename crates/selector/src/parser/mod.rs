//! Recursive-descent parser for LDAP filter strings.

use crate::filter::{Filter, Op};


/// Selector parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector at position {position}: {message}")]
pub struct SelectorError {
	/// Human-readable description of the parse error.
	pub message: String,
	/// Byte offset in the input where the error occurred.
	pub position: usize,
}

/// Maintains the parser's state for recursive descent parsing.
struct Parser<'a> {
	input: &'a str,
	position: usize,
}

impl<'a> Parser<'a> {
	fn new(input: &'a str) -> Self {
		Self { input, position: 0 }
	}

	fn peek(&self) -> Option<char> {
		self.input.chars().next()
	}

	fn next(&mut self) -> Option<char> {
		let ch = self.peek()?;
		self.position += ch.len_utf8();
		self.input = &self.input[ch.len_utf8()..];
		Some(ch)
	}

	fn skip_whitespace(&mut self) {
		while self.peek().is_some_and(char::is_whitespace) {
			self.next();
		}
	}

	/// Consumes the next character if it matches the expected one.
	fn take(&mut self, expected: char) -> Result<(), SelectorError> {
		match self.next() {
			Some(ch) if ch == expected => Ok(()),
			Some(ch) => Err(SelectorError {
				message: format!("expected '{expected}', found '{ch}'"),
				position: self.position - ch.len_utf8(),
			}),
			None => Err(self.error(format!("expected '{expected}', found end of input"))),
		}
	}

	fn error(&self, message: String) -> SelectorError {
		SelectorError {
			message,
			position: self.position,
		}
	}
}

/// Parses a complete filter string; trailing input is rejected.
pub(crate) fn parse(s: &str) -> Result<Filter, SelectorError> {
	let mut parser = Parser::new(s);
	parser.skip_whitespace();
	let filter = parse_filter(&mut parser)?;
	parser.skip_whitespace();

	if let Some(ch) = parser.peek() {
		return Err(parser.error(format!("expected end of input, found '{ch}'")));
	}

	Ok(filter)
}

/// Grammar: `filter = "(" filtercomp ")"`
fn parse_filter(parser: &mut Parser) -> Result<Filter, SelectorError> {
	parser.take('(')?;
	parser.skip_whitespace();

	let filter = match parser.peek() {
		Some('&') => {
			parser.next();
			Filter::And(parse_filter_list(parser)?)
		}
		Some('|') => {
			parser.next();
			Filter::Or(parse_filter_list(parser)?)
		}
		Some('!') => {
			parser.next();
			parser.skip_whitespace();
			Filter::Not(Box::new(parse_filter(parser)?))
		}
		Some(_) => parse_item(parser)?,
		None => return Err(parser.error("unexpected end of input".to_string())),
	};

	parser.skip_whitespace();
	parser.take(')')?;
	Ok(filter)
}

/// Grammar: `filterlist = filter+`
fn parse_filter_list(parser: &mut Parser) -> Result<Vec<Filter>, SelectorError> {
	let mut filters = Vec::new();
	loop {
		parser.skip_whitespace();
		if parser.peek() != Some('(') {
			break;
		}
		filters.push(parse_filter(parser)?);
	}

	if filters.is_empty() {
		return Err(parser.error("expected at least one nested filter".to_string()));
	}
	Ok(filters)
}

/// Grammar: `item = attr op value`
fn parse_item(parser: &mut Parser) -> Result<Filter, SelectorError> {
	let start = parser.position;
	let mut attr = String::new();
	while let Some(ch) = parser.peek() {
		if matches!(ch, '=' | '~' | '<' | '>' | '(' | ')') {
			break;
		}
		attr.push(ch);
		parser.next();
	}

	let key = attr.trim().to_string();
	if key.is_empty() {
		return Err(SelectorError {
			message: "missing attribute name".to_string(),
			position: start,
		});
	}

	let kind = match parser.next() {
		Some('=') => OpKind::Equal,
		Some('~') => {
			parser.take('=')?;
			OpKind::Approx
		}
		Some('>') => {
			parser.take('=')?;
			OpKind::Greater
		}
		Some('<') => {
			parser.take('=')?;
			OpKind::Less
		}
		Some(ch) => return Err(parser.error(format!("unexpected '{ch}' after attribute '{key}'"))),
		None => return Err(parser.error("unexpected end of input".to_string())),
	};

	let value = parse_value(parser)?;
	let op = match kind {
		OpKind::Equal => equality_or_substring(value),
		OpKind::Approx => Op::Approx(value.joined()),
		OpKind::Greater => Op::Greater(value.joined()),
		OpKind::Less => Op::Less(value.joined()),
	};

	Ok(Filter::Item { key, op })
}

enum OpKind {
	Equal,
	Approx,
	Greater,
	Less,
}

/// Raw item value split on unescaped `*`.
struct RawValue {
	parts: Vec<String>,
}

impl RawValue {
	fn has_wildcard(&self) -> bool {
		self.parts.len() > 1
	}

	/// Rejoins the parts, turning wildcards back into literal stars.
	fn joined(self) -> String {
		self.parts.join("*")
	}
}

fn parse_value(parser: &mut Parser) -> Result<RawValue, SelectorError> {
	let mut parts = vec![String::new()];
	loop {
		match parser.peek() {
			Some(')') => break,
			Some('(') => return Err(parser.error("unescaped '(' in value".to_string())),
			Some('*') => {
				parser.next();
				parts.push(String::new());
			}
			Some('\\') => {
				parser.next();
				let Some(escaped) = parser.next() else {
					return Err(parser.error("dangling escape at end of input".to_string()));
				};
				push_char(&mut parts, escaped);
			}
			Some(ch) => {
				parser.next();
				push_char(&mut parts, ch);
			}
			None => return Err(parser.error("unterminated item, expected ')'".to_string())),
		}
	}
	Ok(RawValue { parts })
}

fn push_char(parts: &mut [String], ch: char) {
	if let Some(last) = parts.last_mut() {
		last.push(ch);
	}
}

fn equality_or_substring(value: RawValue) -> Op {
	if !value.has_wildcard() {
		return Op::Equal(value.joined());
	}
	if value.parts.iter().all(String::is_empty) && value.parts.len() == 2 {
		return Op::Present;
	}

	let mut parts = value.parts;
	let last = parts.pop().filter(|s| !s.is_empty());
	let mut iter = parts.into_iter();
	let first = iter.next().filter(|s| !s.is_empty());
	let any = iter.filter(|s| !s.is_empty()).collect();
	Op::Substring {
		initial: first,
		any,
		last,
	}
}
