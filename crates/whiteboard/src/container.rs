//! The container abstraction the driver deploys into.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use switchyard_registry::{AcceptedApplication, Provider};
use thiserror::Error;

/// Opaque failure reported by a container operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ContainerError {
	pub message: String,
}

impl ContainerError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
	Create,
	Reload,
	Destroy,
}

impl Operation {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Create => "create",
			Self::Reload => "reload",
			Self::Destroy => "destroy",
		}
	}
}

/// Something that can host an application at a path.
///
/// All calls are made from the engine's single worker, one at a time, so
/// implementations need no internal coordination between structural changes.
/// Handles stay owned by the driver; a failed `destroy` leaves the handle live
/// so the next pass retries it.
#[async_trait]
pub trait Container: Send + Sync + 'static {
	type Handle: Send + Sync + 'static;

	async fn create(&self, path: &str, application: &AcceptedApplication) -> Result<Self::Handle, ContainerError>;

	async fn reload(&self, handle: &mut Self::Handle, application: &AcceptedApplication) -> Result<(), ContainerError>;

	async fn destroy(&self, handle: &mut Self::Handle) -> Result<(), ContainerError>;
}

/// One call observed by a [`MemoryContainer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerCall {
	pub operation: Operation,
	pub path: String,
	/// Application name; empty for destroy.
	pub application: String,
	/// Attached resource then extension names, as deployed.
	pub content: Vec<String>,
}

#[derive(Debug)]
pub struct MemoryHandle {
	pub path: String,
	pub instance: u64,
}

/// In-process container that records and logs every call.
///
/// Failures can be injected per operation and path.
#[derive(Debug, Default)]
pub struct MemoryContainer {
	calls: Mutex<Vec<ContainerCall>>,
	failing: Mutex<Vec<(Operation, String)>>,
	instances: AtomicU64,
}

impl MemoryContainer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes `operation` on `path` fail until [`Self::heal`] is called.
	pub fn fail_on(&self, operation: Operation, path: impl Into<String>) {
		self.failing.lock().push((operation, path.into()));
	}

	pub fn heal(&self) {
		self.failing.lock().clear();
	}

	pub fn calls(&self) -> Vec<ContainerCall> {
		self.calls.lock().clone()
	}

	/// Returns and forgets the calls recorded so far.
	pub fn take_calls(&self) -> Vec<ContainerCall> {
		std::mem::take(&mut *self.calls.lock())
	}

	fn check(&self, operation: Operation, path: &str) -> Result<(), ContainerError> {
		let failing = self.failing.lock().iter().any(|(op, p)| *op == operation && p == path);
		if failing {
			Err(ContainerError::new(format!("injected {} failure at {path}", operation.as_str())))
		} else {
			Ok(())
		}
	}

	fn record(&self, operation: Operation, path: &str, application: Option<&AcceptedApplication>) {
		let (name, content) = match application {
			Some(app) => (
				app.application.name().to_string(),
				app.resources
					.iter()
					.chain(&app.extensions)
					.map(|attached| attached.provider.name().to_string())
					.collect(),
			),
			None => (String::new(), Vec::new()),
		};
		tracing::info!(operation = operation.as_str(), path, application = %name, content = ?content, "container.call");
		self.calls.lock().push(ContainerCall {
			operation,
			path: path.to_string(),
			application: name,
			content,
		});
	}
}

#[async_trait]
impl Container for MemoryContainer {
	type Handle = MemoryHandle;

	async fn create(&self, path: &str, application: &AcceptedApplication) -> Result<MemoryHandle, ContainerError> {
		self.check(Operation::Create, path)?;
		self.record(Operation::Create, path, Some(application));
		Ok(MemoryHandle {
			path: path.to_string(),
			instance: self.instances.fetch_add(1, Ordering::Relaxed) + 1,
		})
	}

	async fn reload(&self, handle: &mut MemoryHandle, application: &AcceptedApplication) -> Result<(), ContainerError> {
		self.check(Operation::Reload, &handle.path)?;
		self.record(Operation::Reload, &handle.path, Some(application));
		Ok(())
	}

	async fn destroy(&self, handle: &mut MemoryHandle) -> Result<(), ContainerError> {
		self.check(Operation::Destroy, &handle.path)?;
		self.record(Operation::Destroy, &handle.path, None);
		Ok(())
	}
}
