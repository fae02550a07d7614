//! Reconciliation: from a store snapshot to one consistent assignment.
//!
//! # Role
//!
//! [`Reconciler::run`] is a pure function of a [`StoreSnapshot`] and the
//! runtime properties. It filters providers by the runtime, applies the
//! collision rules, attaches content to applications, resolves dependencies
//! per application, and reports the accepted applications together with every
//! failed provider and its reason.
//!
//! # Invariants
//!
//! - Deterministic: the same snapshot and runtime properties always produce
//!   the same [`Resolution`], whatever the store's iteration order (see
//!   `tests::shuffled_insertion_is_deterministic`).
//! - Accepted applications have unique base paths, and accepted providers
//!   have unique names across all kinds.
//! - At most one accepted application is the effective default; every
//!   runner-up appears as failed.
//! - Every attached content provider satisfies its dependency selectors
//!   against the siblings that survived.
//! - A provider is reported failed at most once; content still attached to
//!   any application is never reported failed.
//!
//! [`StoreSnapshot`]: crate::store::StoreSnapshot

pub mod collision;
pub mod deps;
pub mod matcher;
pub(crate) mod order;
mod pass;

use std::sync::Arc;

pub use pass::Reconciler;

use crate::provider::{ApplicationProvider, ContentProvider, FailureReason, Provider, ProviderId, ProviderKind, ProviderRecord};


/// Content attached to an accepted application.
#[derive(Debug, Clone)]
pub struct AttachedContent {
	pub provider: Arc<ContentProvider>,
	pub revision: u64,
}

/// An application accepted by the pass, with the content that survived.
#[derive(Debug, Clone)]
pub struct AcceptedApplication {
	pub application: Arc<ApplicationProvider>,
	pub revision: u64,
	pub resources: Vec<AttachedContent>,
	pub extensions: Vec<AttachedContent>,
}

impl AcceptedApplication {
	pub fn base_path(&self) -> &str {
		self.application.base_path()
	}

	/// Structural fingerprint used to decide whether a live deployment must reload.
	pub fn fingerprint(&self) -> Fingerprint {
		let mut content: Vec<(ProviderKind, ProviderId, u64)> = self
			.resources
			.iter()
			.chain(&self.extensions)
			.map(|attached| (attached.provider.kind(), attached.provider.id(), attached.revision))
			.collect();
		content.sort_unstable();
		Fingerprint {
			application: self.application.id(),
			revision: self.revision,
			content,
		}
	}
}

/// Identity of an accepted application and its content, by revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
	pub application: ProviderId,
	pub revision: u64,
	pub content: Vec<(ProviderKind, ProviderId, u64)>,
}

/// A provider excluded from the deployment.
#[derive(Debug, Clone)]
pub struct Failure {
	pub provider: ProviderRecord,
	pub reason: FailureReason,
	pub detail: String,
}

impl Failure {
	pub fn id(&self) -> ProviderId {
		self.provider.id()
	}

	pub fn name(&self) -> &str {
		self.provider.as_provider().name()
	}
}

/// The outcome of one pass.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
	/// Change count of the snapshot this pass ran on.
	pub change_count: u64,
	/// Accepted applications, ordered by base path.
	pub applications: Vec<AcceptedApplication>,
	pub default_application: Option<ProviderId>,
	/// Failures per kind, each in the global total order.
	pub failed_applications: Vec<Failure>,
	pub failed_resources: Vec<Failure>,
	pub failed_extensions: Vec<Failure>,
}

impl Resolution {
	pub fn application(&self, base_path: &str) -> Option<&AcceptedApplication> {
		self.applications.iter().find(|app| app.base_path() == base_path)
	}

	/// Looks up a failure by kind and id.
	pub fn failure(&self, kind: ProviderKind, id: ProviderId) -> Option<&Failure> {
		let list = match kind {
			ProviderKind::Application => &self.failed_applications,
			ProviderKind::Resource => &self.failed_resources,
			ProviderKind::Extension => &self.failed_extensions,
		};
		list.iter().find(|failure| failure.id() == id)
	}
}
