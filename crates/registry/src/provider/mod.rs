//! Provider model: the entities tracked by the store and reconciled per pass.
//!
//! # Role
//!
//! A provider is an immutable record built from one registration's property
//! map. Everything that can be decided from the properties alone (name,
//! priority, selectors, base path, contract types) is decided once here;
//! construction problems become a failed [`Status`] rather than an error, so
//! a malformed registration still shows up in the status snapshot.
//!
//! # Invariants
//!
//! - Providers are never mutated after construction; an update replaces the
//!   record under the same [`ProviderId`].
//! - A provider without a registration id receives a fresh generated token and
//!   can never collide on id with any other provider.

mod application;
mod content;
pub mod keys;
mod object;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

pub use application::{ApplicationProvider, normalize_base_path};
pub use content::{ContentKind, ContentProvider, Scope};
pub use object::{ContractType, ObjectClass, ObjectLease, ObjectSource, ObtainError, StaticObject};
use serde::Serialize;
use switchyard_selector::{Properties, PropertyValue, Selector};

#[cfg(test)]
mod tests;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Stable provider identity.
///
/// Ordering places every registered id before every generated token, matching
/// the total order used for collision resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum ProviderId {
	/// Derived from the registration's `service.id`.
	Registered(i64),
	/// Opaque token for registrations without an id.
	Generated(u64),
}

impl ProviderId {
	/// Returns a fresh generated token.
	pub fn generate() -> Self {
		Self::Generated(NEXT_TOKEN.fetch_add(1, AtomicOrdering::Relaxed))
	}

	/// Reads `service.id`, falling back to a generated token.
	pub fn from_properties(props: &Properties) -> Self {
		props
			.get(keys::SERVICE_ID)
			.and_then(PropertyValue::as_i64)
			.map_or_else(Self::generate, Self::Registered)
	}

	/// Compares by presence and value of the registered id only.
	///
	/// Two generated tokens compare equal here; callers break that tie by name.
	pub fn cmp_stable(&self, other: &Self) -> Ordering {
		match (self, other) {
			(Self::Registered(a), Self::Registered(b)) => a.cmp(b),
			(Self::Registered(_), Self::Generated(_)) => Ordering::Less,
			(Self::Generated(_), Self::Registered(_)) => Ordering::Greater,
			(Self::Generated(_), Self::Generated(_)) => Ordering::Equal,
		}
	}
}

impl fmt::Display for ProviderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Registered(id) => write!(f, "{id}"),
			Self::Generated(token) => write!(f, "g{token}"),
		}
	}
}

/// The three provider kinds tracked by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
	Application,
	Resource,
	Extension,
}

impl ProviderKind {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Application => "application",
			Self::Resource => "resource",
			Self::Extension => "extension",
		}
	}
}

impl fmt::Display for ProviderKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Why a provider is not part of the accepted deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
	ServiceNotGettable,
	Shadowed,
	ValidationFailed,
	RequiredExtensionsUnavailable,
	DuplicateName,
	RequiredApplicationUnavailable,
	NotAnExtensionType,
}

impl FailureReason {
	/// Numeric reason code exposed to introspection consumers.
	pub const fn code(self) -> u8 {
		match self {
			Self::ServiceNotGettable => 1,
			Self::Shadowed => 2,
			Self::ValidationFailed => 3,
			Self::RequiredExtensionsUnavailable => 4,
			Self::DuplicateName => 5,
			Self::RequiredApplicationUnavailable => 6,
			Self::NotAnExtensionType => 7,
		}
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ServiceNotGettable => "service-not-gettable",
			Self::Shadowed => "shadowed",
			Self::ValidationFailed => "validation-failed",
			Self::RequiredExtensionsUnavailable => "required-extensions-unavailable",
			Self::DuplicateName => "duplicate-name",
			Self::RequiredApplicationUnavailable => "required-application-unavailable",
			Self::NotAnExtensionType => "not-an-extension-type",
		}
	}
}

impl fmt::Display for FailureReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Construction-time status of a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
	Ok,
	Failed { reason: FailureReason, detail: String },
}

impl Status {
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Ok)
	}

	pub fn failure(&self) -> Option<FailureReason> {
		match self {
			Self::Ok => None,
			Self::Failed { reason, .. } => Some(*reason),
		}
	}

	fn fail(&mut self, reason: FailureReason, detail: impl Into<String>) {
		if self.is_ok() {
			*self = Self::Failed {
				reason,
				detail: detail.into(),
			};
		}
	}
}

/// Fields shared by every provider kind.
#[derive(Debug, Clone)]
pub struct ProviderCore {
	pub(crate) id: ProviderId,
	pub(crate) name: Arc<str>,
	pub(crate) name_generated: bool,
	pub(crate) priority: i32,
	pub(crate) properties: Properties,
	pub(crate) status: Status,
	pub(crate) container_selector: Option<Selector>,
	pub(crate) dependency_selectors: Vec<Selector>,
}

impl ProviderCore {
	/// Reads the common fields; `allow_default_name` permits the reserved
	/// default-application marker as an explicit name.
	pub(crate) fn from_properties(id: ProviderId, kind: ProviderKind, properties: Properties, allow_default_name: bool) -> Self {
		let mut status = Status::Ok;

		let explicit_name = properties.get(keys::NAME).map(PropertyValue::to_string);
		let (name, name_generated) = match explicit_name {
			Some(name) => {
				let reserved = name.starts_with(keys::RESERVED_NAME_PREFIX) && !(allow_default_name && name == keys::DEFAULT_APPLICATION_NAME);
				if reserved {
					status.fail(FailureReason::ValidationFailed, format!("name '{name}' uses the reserved prefix"));
				}
				if name.is_empty() {
					status.fail(FailureReason::ValidationFailed, "empty name");
				}
				(name, false)
			}
			None => (format!("{}generated.{kind}.{id}", keys::RESERVED_NAME_PREFIX), true),
		};

		let priority = properties
			.get(keys::SERVICE_RANKING)
			.and_then(PropertyValue::as_i64)
			.map_or(0, |rank| rank.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32);

		let container_selector = match properties.get(keys::TARGET) {
			Some(value) => parse_selector(&value.to_string(), keys::TARGET, &mut status),
			None => None,
		};

		let dependency_selectors = match properties.get(keys::EXTENSION_SELECT) {
			Some(value) => value
				.to_strings()
				.iter()
				.filter_map(|raw| parse_selector(raw, keys::EXTENSION_SELECT, &mut status))
				.collect(),
			None => Vec::new(),
		};

		Self {
			id,
			name: Arc::from(name),
			name_generated,
			priority,
			properties,
			status,
			container_selector,
			dependency_selectors,
		}
	}

	pub(crate) fn fail(&mut self, reason: FailureReason, detail: impl Into<String>) {
		self.status.fail(reason, detail);
	}
}

/// Parses one selector-valued property, recording a validation failure.
pub(crate) fn parse_selector(raw: &str, key: &str, status: &mut Status) -> Option<Selector> {
	match Selector::parse(raw) {
		Ok(selector) => Some(selector),
		Err(err) => {
			status.fail(FailureReason::ValidationFailed, format!("{key}: {err}"));
			None
		}
	}
}

/// Accessors shared by every provider kind.
pub trait Provider {
	/// Returns the shared fields.
	fn core(&self) -> &ProviderCore;

	/// Returns the provider kind.
	fn kind(&self) -> ProviderKind;

	fn id(&self) -> ProviderId {
		self.core().id
	}

	fn name(&self) -> &str {
		&self.core().name
	}

	/// Returns true when the name was generated rather than supplied.
	fn has_generated_name(&self) -> bool {
		self.core().name_generated
	}

	/// Returns the ordering priority (higher sorts first).
	fn priority(&self) -> i32 {
		self.core().priority
	}

	fn properties(&self) -> &Properties {
		&self.core().properties
	}

	fn status(&self) -> &Status {
		&self.core().status
	}

	fn container_selector(&self) -> Option<&Selector> {
		self.core().container_selector.as_ref()
	}

	fn dependency_selectors(&self) -> &[Selector] {
		&self.core().dependency_selectors
	}

	/// Compares against another provider using the global total order.
	fn total_order_cmp(&self, other: &dyn Provider) -> Ordering {
		crate::resolve::order::cmp_core(self.core(), other.core())
	}
}

/// A provider of any kind, as stored and snapshotted.
#[derive(Debug, Clone)]
pub enum ProviderRecord {
	Application(Arc<ApplicationProvider>),
	Resource(Arc<ContentProvider>),
	Extension(Arc<ContentProvider>),
}

impl ProviderRecord {
	pub fn kind(&self) -> ProviderKind {
		match self {
			Self::Application(_) => ProviderKind::Application,
			Self::Resource(_) => ProviderKind::Resource,
			Self::Extension(_) => ProviderKind::Extension,
		}
	}

	pub fn id(&self) -> ProviderId {
		self.as_provider().id()
	}

	pub fn as_provider(&self) -> &dyn Provider {
		match self {
			Self::Application(app) => app.as_ref(),
			Self::Resource(content) | Self::Extension(content) => content.as_ref(),
		}
	}
}

/// One external registration: its property map and, for content, the object
/// it publishes.
#[derive(Debug, Clone, Default)]
pub struct Registration {
	pub properties: Properties,
	pub id: Option<ProviderId>,
	pub source: Option<Arc<dyn ObjectSource>>,
}

impl Registration {
	pub fn new(properties: Properties) -> Self {
		Self {
			properties,
			id: None,
			source: None,
		}
	}

	/// Pins the provider id, used to replace a registration that has no `service.id`.
	#[must_use]
	pub fn with_id(mut self, id: ProviderId) -> Self {
		self.id = Some(id);
		self
	}

	#[must_use]
	pub fn with_source(mut self, source: Arc<dyn ObjectSource>) -> Self {
		self.source = Some(source);
		self
	}

	/// Resolves the id once so every provider built from this registration shares it.
	pub fn resolve_id(&self) -> ProviderId {
		self.id.unwrap_or_else(|| ProviderId::from_properties(&self.properties))
	}

	/// Builds every provider this registration declares.
	///
	/// A registration can be an application, a resource, an extension, or a
	/// resource and an extension at once (sharing one id).
	pub fn into_records(self) -> Vec<ProviderRecord> {
		let id = self.resolve_id();
		let props = &self.properties;
		let mut records = Vec::new();

		if props.contains_key(keys::APPLICATION_BASE) {
			records.push(ProviderRecord::Application(Arc::new(ApplicationProvider::with_id(id, props.clone()))));
		}
		if props.get(keys::RESOURCE).is_some_and(PropertyValue::is_true) {
			records.push(ProviderRecord::Resource(Arc::new(ContentProvider::resource_with_id(
				id,
				props.clone(),
				self.source.clone(),
			))));
		}
		if props.get(keys::EXTENSION).is_some_and(PropertyValue::is_true) {
			records.push(ProviderRecord::Extension(Arc::new(ContentProvider::extension_with_id(
				id,
				props.clone(),
				self.source.clone(),
			))));
		}
		records
	}
}
