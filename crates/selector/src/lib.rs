//! Typed property maps and the selectors evaluated against them.
//!
//! Every provider registration carries a [`Properties`] map, and every
//! targeting decision in the reconciler (application select, extension
//! select, whiteboard target) is a [`Selector`] tested against one.
//!
//! Selectors use RFC 1960 LDAP filter syntax:
//!
//! ```text
//! filter     = "(" filtercomp ")"
//! filtercomp = and | or | not | item
//! and        = "&" filter+
//! or         = "|" filter+
//! not        = "!" filter
//! item       = attr ( "=" | "~=" | ">=" | "<=" ) value
//! ```
//!
//! A value of exactly `*` tests presence; any other unescaped `*` makes the
//! item a substring match.

mod filter;
mod parser;
mod value;

pub use filter::Selector;
pub use parser::SelectorError;
pub use value::{Properties, PropertyValue};
