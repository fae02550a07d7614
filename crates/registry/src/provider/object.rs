//! Registered objects and their classification.
//!
//! # Role
//!
//! Content providers publish an object the container will eventually use. The
//! reconciler only needs its type metadata, so it acquires a short-lived
//! [`ObjectLease`], reads the class, and lets the lease drop. The result is
//! cached on the provider.
//!
//! # Invariants
//!
//! - A lease is released on every exit path, including a panic while the
//!   class is being read, because release is the lease's `Drop`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Failure to obtain a registered object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("object not obtainable: {0}")]
pub struct ObtainError(pub String);

/// Type metadata read from a registered object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectClass {
	/// Fully qualified concrete type name.
	pub type_name: Arc<str>,
	/// Every interface the concrete type implements.
	pub interfaces: Vec<Arc<str>>,
}

impl ObjectClass {
	pub fn new(type_name: &str, interfaces: &[&str]) -> Self {
		Self {
			type_name: Arc::from(type_name),
			interfaces: interfaces.iter().map(|name| Arc::from(*name)).collect(),
		}
	}

	/// Returns true if the type is, or implements, `name` (compared by simple name).
	pub fn implements(&self, name: &str) -> bool {
		let wanted = simple_name(name);
		simple_name(&self.type_name) == wanted || self.interfaces.iter().any(|iface| simple_name(iface) == wanted)
	}
}

/// A held reference to a registered object. Dropping it releases the object.
pub trait ObjectLease {
	fn object_class(&self) -> ObjectClass;
}

/// Where a content provider's object comes from.
pub trait ObjectSource: Send + Sync + fmt::Debug {
	/// Acquires the object; the returned lease must be dropped to release it.
	fn acquire(&self) -> Result<Box<dyn ObjectLease + '_>, ObtainError>;
}

/// Acquires, reads the class, and releases.
pub(crate) fn classify(source: &dyn ObjectSource) -> Result<ObjectClass, ObtainError> {
	let lease = source.acquire()?;
	Ok(lease.object_class())
}

/// Object source with fixed metadata that counts outstanding leases.
#[derive(Debug)]
pub struct StaticObject {
	class: Option<ObjectClass>,
	outstanding: AtomicUsize,
	acquired: AtomicUsize,
}

impl StaticObject {
	pub fn new(class: ObjectClass) -> Arc<Self> {
		Arc::new(Self {
			class: Some(class),
			outstanding: AtomicUsize::new(0),
			acquired: AtomicUsize::new(0),
		})
	}

	/// A source whose every acquisition fails.
	pub fn unobtainable() -> Arc<Self> {
		Arc::new(Self {
			class: None,
			outstanding: AtomicUsize::new(0),
			acquired: AtomicUsize::new(0),
		})
	}

	/// Leases currently held.
	pub fn outstanding(&self) -> usize {
		self.outstanding.load(Ordering::SeqCst)
	}

	/// Total successful acquisitions.
	pub fn acquisitions(&self) -> usize {
		self.acquired.load(Ordering::SeqCst)
	}
}

impl ObjectSource for StaticObject {
	fn acquire(&self) -> Result<Box<dyn ObjectLease + '_>, ObtainError> {
		let Some(class) = &self.class else {
			return Err(ObtainError("source refused acquisition".to_string()));
		};
		self.outstanding.fetch_add(1, Ordering::SeqCst);
		self.acquired.fetch_add(1, Ordering::SeqCst);
		Ok(Box::new(StaticLease { owner: self, class }))
	}
}

struct StaticLease<'a> {
	owner: &'a StaticObject,
	class: &'a ObjectClass,
}

impl ObjectLease for StaticLease<'_> {
	fn object_class(&self) -> ObjectClass {
		self.class.clone()
	}
}

impl Drop for StaticLease<'_> {
	fn drop(&mut self) {
		let prev = self.owner.outstanding.fetch_sub(1, Ordering::SeqCst);
		debug_assert!(prev > 0, "lease count underflow");
	}
}

/// Extension contracts a container knows how to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ContractType {
	ContainerRequestFilter,
	ContainerResponseFilter,
	ReaderInterceptor,
	WriterInterceptor,
	MessageBodyReader,
	MessageBodyWriter,
	ContextResolver,
	ExceptionMapper,
	ParamConverterProvider,
	Feature,
	DynamicFeature,
}

impl ContractType {
	pub const ALL: [Self; 11] = [
		Self::ContainerRequestFilter,
		Self::ContainerResponseFilter,
		Self::ReaderInterceptor,
		Self::WriterInterceptor,
		Self::MessageBodyReader,
		Self::MessageBodyWriter,
		Self::ContextResolver,
		Self::ExceptionMapper,
		Self::ParamConverterProvider,
		Self::Feature,
		Self::DynamicFeature,
	];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ContainerRequestFilter => "ContainerRequestFilter",
			Self::ContainerResponseFilter => "ContainerResponseFilter",
			Self::ReaderInterceptor => "ReaderInterceptor",
			Self::WriterInterceptor => "WriterInterceptor",
			Self::MessageBodyReader => "MessageBodyReader",
			Self::MessageBodyWriter => "MessageBodyWriter",
			Self::ContextResolver => "ContextResolver",
			Self::ExceptionMapper => "ExceptionMapper",
			Self::ParamConverterProvider => "ParamConverterProvider",
			Self::Feature => "Feature",
			Self::DynamicFeature => "DynamicFeature",
		}
	}

	/// Matches a (possibly package-qualified) type name by its simple name.
	pub fn from_type_name(name: &str) -> Option<Self> {
		let simple = simple_name(name);
		Self::ALL.into_iter().find(|contract| contract.as_str() == simple)
	}
}

impl fmt::Display for ContractType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

fn simple_name(name: &str) -> &str {
	let name = name.trim();
	name.rsplit(['.', ':']).next().unwrap_or(name)
}
