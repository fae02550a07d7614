//! Pure attachment and satisfiability predicates.

use switchyard_selector::{Properties, Selector};

use crate::provider::{ApplicationProvider, ContentProvider, Provider};

/// Decides whether `content` may attach to `app`.
///
/// `is_effective_default` tells whether `app` is the application currently
/// acting as the default for this pass.
pub fn can_attach(content: &ContentProvider, app: &ApplicationProvider, is_effective_default: bool) -> bool {
	if content.targets_default() {
		return is_effective_default;
	}
	match content.application_select() {
		Some(select) => select.matches(app.properties()),
		None => !app.is_default() && !app.is_shadowing_default(),
	}
}

/// Tests the provider's container selector against the runtime properties.
pub fn can_handle_runtime(provider: &dyn Provider, runtime: &Properties) -> bool {
	provider.container_selector().is_none_or(|selector| selector.matches(runtime))
}

/// True when `selector` is met by the owning application's properties or by
/// the runtime properties. Such a requirement can never break.
pub fn satisfied_by_context(selector: &Selector, owner: &Properties, runtime: &Properties) -> bool {
	selector.matches(owner) || selector.matches(runtime)
}

/// Keys of the siblings whose properties satisfy `selector`, in input order.
pub fn satisfying_siblings<'p, K>(selector: &Selector, siblings: impl IntoIterator<Item = (K, &'p Properties)>) -> Vec<K> {
	siblings.into_iter().filter(|(_, props)| selector.matches(props)).map(|(key, _)| key).collect()
}

/// True when every dependency selector is met by the owner, the runtime or
/// at least one sibling.
pub fn dependencies_satisfied<'p>(
	selectors: &[Selector],
	siblings: impl Iterator<Item = &'p Properties> + Clone,
	owner: &Properties,
	runtime: &Properties,
) -> bool {
	selectors.iter().all(|selector| {
		satisfied_by_context(selector, owner, runtime) || siblings.clone().any(|props| selector.matches(props))
	})
}
