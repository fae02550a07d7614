#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use switchyard_whiteboard::registry::{AcceptedApplication, Properties, keys};
use switchyard_whiteboard::{Container, ContainerError, MemoryContainer, MemoryHandle, Operation, WhiteboardConfig};

pub fn config() -> WhiteboardConfig {
	WhiteboardConfig {
		name: "test".to_string(),
		shutdown_timeout_ms: 1_000,
		..WhiteboardConfig::default()
	}
}

pub fn app(id: i64, base: &str, name: &str) -> Properties {
	Properties::new()
		.with(keys::SERVICE_ID, id)
		.with(keys::APPLICATION_BASE, base)
		.with(keys::NAME, name)
}

pub fn resource(id: i64, name: &str, select: &str) -> Properties {
	Properties::new()
		.with(keys::SERVICE_ID, id)
		.with(keys::RESOURCE, true)
		.with(keys::NAME, name)
		.with(keys::APPLICATION_SELECT, select)
}

pub fn extension(id: i64, name: &str, select: &str) -> Properties {
	Properties::new()
		.with(keys::SERVICE_ID, id)
		.with(keys::EXTENSION, true)
		.with(keys::NAME, name)
		.with(keys::APPLICATION_SELECT, select)
		.with(keys::OBJECT_CLASS, vec!["javax.ws.rs.ext.ExceptionMapper"])
}

pub fn ops(container: &MemoryContainer) -> Vec<(Operation, String)> {
	container.take_calls().into_iter().map(|call| (call.operation, call.path)).collect()
}

/// A [`MemoryContainer`] whose calls take (virtual) time.
#[derive(Debug, Default)]
pub struct SlowContainer {
	pub inner: MemoryContainer,
	pub create_delay: Duration,
	pub destroy_delay: Duration,
}

impl SlowContainer {
	pub fn new(create_delay: Duration, destroy_delay: Duration) -> Arc<Self> {
		Arc::new(Self {
			inner: MemoryContainer::new(),
			create_delay,
			destroy_delay,
		})
	}
}

#[async_trait]
impl Container for SlowContainer {
	type Handle = MemoryHandle;

	async fn create(&self, path: &str, application: &AcceptedApplication) -> Result<MemoryHandle, ContainerError> {
		tokio::time::sleep(self.create_delay).await;
		self.inner.create(path, application).await
	}

	async fn reload(&self, handle: &mut MemoryHandle, application: &AcceptedApplication) -> Result<(), ContainerError> {
		tokio::time::sleep(self.create_delay).await;
		self.inner.reload(handle, application).await
	}

	async fn destroy(&self, handle: &mut MemoryHandle) -> Result<(), ContainerError> {
		tokio::time::sleep(self.destroy_delay).await;
		self.inner.destroy(handle).await
	}
}
