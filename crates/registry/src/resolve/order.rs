//! The global total order over providers.
//!
//! Every collision rule and every reported list uses this order, so it must
//! be total, antisymmetric and transitive (see `tests::total_order_is_consistent`).

use std::cmp::Ordering;

use crate::provider::{ProviderCore, ProviderKind};

/// Orders two providers: higher priority first, then registered ids ascending
/// ahead of providers without one, then name, then the generated token.
pub(crate) fn cmp_core(a: &ProviderCore, b: &ProviderCore) -> Ordering {
	b.priority
		.cmp(&a.priority)
		.then_with(|| a.id.cmp_stable(&b.id))
		.then_with(|| a.name.cmp(&b.name))
		.then_with(|| a.id.cmp(&b.id))
}

/// [`cmp_core`] extended with the provider kind, for pools mixing kinds.
pub(crate) fn cmp_pooled(a: (&ProviderCore, ProviderKind), b: (&ProviderCore, ProviderKind)) -> Ordering {
	cmp_core(a.0, b.0).then_with(|| a.1.cmp(&b.1))
}
