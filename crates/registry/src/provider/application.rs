use std::sync::Arc;

use switchyard_selector::{Properties, PropertyValue};

use super::{FailureReason, Provider, ProviderCore, ProviderId, ProviderKind, keys};

/// An application: a mount point that content providers attach to.
#[derive(Debug, Clone)]
pub struct ApplicationProvider {
	core: ProviderCore,
	base_path: Arc<str>,
	is_default: bool,
}

impl ApplicationProvider {
	pub fn new(properties: Properties) -> Self {
		Self::with_id(ProviderId::from_properties(&properties), properties)
	}

	pub fn with_id(id: ProviderId, properties: Properties) -> Self {
		let mut core = ProviderCore::from_properties(id, ProviderKind::Application, properties, true);
		let base_path = match core.properties.get(keys::APPLICATION_BASE) {
			Some(PropertyValue::String(raw)) => normalize_base_path(raw),
			Some(other) => {
				core.fail(FailureReason::ValidationFailed, format!("{}: expected a string, found {other}", keys::APPLICATION_BASE));
				"/".to_string()
			}
			None => {
				core.fail(FailureReason::ValidationFailed, format!("missing {}", keys::APPLICATION_BASE));
				"/".to_string()
			}
		};
		let is_default = !core.name_generated && &*core.name == keys::DEFAULT_APPLICATION_NAME;

		Self {
			core,
			base_path: Arc::from(base_path),
			is_default,
		}
	}

	/// The implicit default application every pass falls back to.
	pub fn builtin_default() -> Self {
		let properties = Properties::new()
			.with(keys::NAME, keys::DEFAULT_APPLICATION_NAME)
			.with(keys::APPLICATION_BASE, "/")
			.with(keys::SERVICE_RANKING, i64::from(i32::MIN));
		Self::with_id(ProviderId::generate(), properties)
	}

	pub fn base_path(&self) -> &str {
		&self.base_path
	}

	/// True when named with the default-application marker.
	pub fn is_default(&self) -> bool {
		self.is_default
	}

	/// True when mounted at the root without being the default.
	pub fn is_shadowing_default(&self) -> bool {
		!self.is_default && &*self.base_path == "/"
	}
}

impl Provider for ApplicationProvider {
	fn core(&self) -> &ProviderCore {
		&self.core
	}

	fn kind(&self) -> ProviderKind {
		ProviderKind::Application
	}
}

/// Normalizes an application base path.
///
/// Trims whitespace, strips a trailing `/*`, forces a leading `/` and drops a
/// trailing `/` everywhere except the root.
pub fn normalize_base_path(raw: &str) -> String {
	let mut path = raw.trim();
	if let Some(stripped) = path.strip_suffix("/*") {
		path = stripped;
	} else if path == "*" {
		path = "";
	}
	let path = path.trim_end_matches('/');
	if path.starts_with('/') {
		path.to_string()
	} else {
		format!("/{path}")
	}
}
