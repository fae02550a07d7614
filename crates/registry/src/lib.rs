//! Provider registry and reconciliation.
//!
//! Registrations enter through the [`ProviderStore`] as immutable provider
//! records. A [`Reconciler`] turns a point-in-time [`StoreSnapshot`] into a
//! [`Resolution`]: the applications to deploy, the content attached to each,
//! and every provider left out together with the reason.
//!
//! # Modules
//!
//! - [`provider`] - Provider kinds, identity, status and object classification
//! - [`store`] - Concurrent store with atomic snapshot publication
//! - [`resolve`] - Matching, collision rules, attachment and dependency fixpoint

pub mod provider;
pub mod resolve;
pub mod store;

pub use provider::{
	ApplicationProvider, ContentKind, ContentProvider, ContractType, FailureReason, ObjectClass, ObjectLease, ObjectSource, ObtainError, Provider,
	ProviderId, ProviderKind, ProviderRecord, Registration, Scope, StaticObject, Status, keys,
};
pub use resolve::{AcceptedApplication, AttachedContent, Failure, Fingerprint, Reconciler, Resolution};
pub use store::{ChangeListener, ProviderStore, StoreSnapshot, Stored};
pub use switchyard_selector::{Properties, PropertyValue, Selector, SelectorError};
