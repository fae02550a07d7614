use std::fmt;
use std::sync::{Arc, OnceLock};

use switchyard_selector::{Properties, PropertyValue, Selector};

use super::object::{ContractType, ObjectClass, ObjectSource, ObtainError, classify};
use super::{FailureReason, Provider, ProviderCore, ProviderId, ProviderKind, Status, keys, parse_selector};

/// Resource or extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
	Resource,
	Extension,
}

impl From<ContentKind> for ProviderKind {
	fn from(kind: ContentKind) -> Self {
		match kind {
			ContentKind::Resource => ProviderKind::Resource,
			ContentKind::Extension => ProviderKind::Extension,
		}
	}
}

/// Registration scope from `service.scope`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
	#[default]
	Singleton,
	Bundle,
	Prototype,
}

impl Scope {
	fn from_properties(props: &Properties) -> Result<Self, String> {
		match props.get(keys::SERVICE_SCOPE).map(PropertyValue::to_string) {
			None => Ok(Self::Singleton),
			Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
				"singleton" => Ok(Self::Singleton),
				"bundle" => Ok(Self::Bundle),
				"prototype" => Ok(Self::Prototype),
				_ => Err(raw),
			},
		}
	}
}

/// A resource or extension to be attached to applications.
///
/// The object class is discovered on first use of [`Provider::status`] or
/// [`ContentProvider::object_class`] and cached for the provider's lifetime.
#[derive(Clone)]
pub struct ContentProvider {
	core: ProviderCore,
	kind: ContentKind,
	application_select: Option<Selector>,
	scope: Scope,
	source: Option<Arc<dyn ObjectSource>>,
	object_class: OnceLock<Result<ObjectClass, ObtainError>>,
	resolved_status: OnceLock<Status>,
}

impl ContentProvider {
	pub fn resource(properties: Properties, source: Option<Arc<dyn ObjectSource>>) -> Self {
		Self::resource_with_id(ProviderId::from_properties(&properties), properties, source)
	}

	pub fn extension(properties: Properties, source: Option<Arc<dyn ObjectSource>>) -> Self {
		Self::extension_with_id(ProviderId::from_properties(&properties), properties, source)
	}

	pub fn resource_with_id(id: ProviderId, properties: Properties, source: Option<Arc<dyn ObjectSource>>) -> Self {
		Self::build(id, ContentKind::Resource, properties, source)
	}

	pub fn extension_with_id(id: ProviderId, properties: Properties, source: Option<Arc<dyn ObjectSource>>) -> Self {
		Self::build(id, ContentKind::Extension, properties, source)
	}

	fn build(id: ProviderId, kind: ContentKind, properties: Properties, source: Option<Arc<dyn ObjectSource>>) -> Self {
		let mut core = ProviderCore::from_properties(id, kind.into(), properties, false);

		let application_select = match core.properties.get(keys::APPLICATION_SELECT) {
			Some(value) => parse_selector(&value.to_string(), keys::APPLICATION_SELECT, &mut core.status),
			None => None,
		};

		let scope = match Scope::from_properties(&core.properties) {
			Ok(scope) => scope,
			Err(raw) => {
				core.fail(FailureReason::ValidationFailed, format!("{}: unknown scope '{raw}'", keys::SERVICE_SCOPE));
				Scope::Singleton
			}
		};

		Self {
			core,
			kind,
			application_select,
			scope,
			source,
			object_class: OnceLock::new(),
			resolved_status: OnceLock::new(),
		}
	}

	pub fn content_kind(&self) -> ContentKind {
		self.kind
	}

	pub fn application_select(&self) -> Option<&Selector> {
		self.application_select.as_ref()
	}

	/// True when the application select is exactly the default-application marker.
	pub fn targets_default(&self) -> bool {
		self.application_select
			.as_ref()
			.and_then(Selector::as_equality)
			.is_some_and(|(key, value)| key.eq_ignore_ascii_case(keys::NAME) && value == keys::DEFAULT_APPLICATION_NAME)
	}

	/// True when the provider may fall back to the default application.
	pub fn accepts_default_fallback(&self) -> bool {
		self.application_select.is_none() || self.targets_default()
	}

	pub fn scope(&self) -> Scope {
		self.scope
	}

	pub fn is_singleton(&self) -> bool {
		self.scope == Scope::Singleton
	}

	/// Discovers (once) the registered object's class.
	///
	/// Without an object source the class is taken from the `objectClass`
	/// property: its first entry is the type name, all entries are interfaces.
	pub fn object_class(&self) -> Result<&ObjectClass, &ObtainError> {
		self.object_class
			.get_or_init(|| match &self.source {
				Some(source) => classify(source.as_ref()),
				None => {
					let published = self.published_types();
					Ok(ObjectClass {
						type_name: Arc::from(published.first().map_or("", String::as_str)),
						interfaces: published.iter().map(|name| Arc::from(name.as_str())).collect(),
					})
				}
			})
			.as_ref()
	}

	/// Extension contracts this provider is registered under and implements.
	pub fn contract_types(&self) -> Vec<ContractType> {
		let Ok(class) = self.object_class() else {
			return Vec::new();
		};
		let mut contracts: Vec<ContractType> = self
			.published_types()
			.iter()
			.filter_map(|name| ContractType::from_type_name(name))
			.filter(|contract| class.implements(contract.as_str()))
			.collect();
		contracts.sort_unstable();
		contracts.dedup();
		contracts
	}

	fn published_types(&self) -> Vec<String> {
		self.core
			.properties
			.get(keys::OBJECT_CLASS)
			.map(PropertyValue::to_strings)
			.unwrap_or_default()
	}

	fn classify_status(&self) -> Status {
		if !self.core.status.is_ok() {
			return self.core.status.clone();
		}
		if let Err(err) = self.object_class() {
			return Status::Failed {
				reason: FailureReason::ServiceNotGettable,
				detail: err.to_string(),
			};
		}
		if self.kind == ContentKind::Extension && self.contract_types().is_empty() {
			return Status::Failed {
				reason: FailureReason::NotAnExtensionType,
				detail: "no supported extension contract among the published types".to_string(),
			};
		}
		Status::Ok
	}
}

impl Provider for ContentProvider {
	fn core(&self) -> &ProviderCore {
		&self.core
	}

	fn kind(&self) -> ProviderKind {
		self.kind.into()
	}

	fn status(&self) -> &Status {
		self.resolved_status.get_or_init(|| self.classify_status())
	}
}

impl fmt::Debug for ContentProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContentProvider")
			.field("kind", &self.kind)
			.field("id", &self.core.id)
			.field("name", &self.core.name)
			.field("priority", &self.core.priority)
			.field("application_select", &self.application_select)
			.finish_non_exhaustive()
	}
}
