//! Introspection snapshot and its publication.
//!
//! [`RuntimeStatus`] is the externally visible record of one pass: accepted
//! applications with their content, and every failed provider with its reason
//! code. The [`StatusBoard`] publishes it atomically; readers never block the
//! worker.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};
use switchyard_registry::{AcceptedApplication, Failure, Provider, Resolution};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStatus {
	pub name: String,
	pub base: String,
	pub id: String,
	pub resources: Vec<String>,
	pub extensions: Vec<String>,
}

impl From<&AcceptedApplication> for ApplicationStatus {
	fn from(app: &AcceptedApplication) -> Self {
		Self {
			name: app.application.name().to_string(),
			base: app.base_path().to_string(),
			id: app.application.id().to_string(),
			resources: app.resources.iter().map(|c| c.provider.name().to_string()).collect(),
			extensions: app.extensions.iter().map(|c| c.provider.name().to_string()).collect(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedStatus {
	pub name: String,
	pub id: String,
	pub reason: String,
	pub code: u8,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub detail: String,
}

impl From<&Failure> for FailedStatus {
	fn from(failure: &Failure) -> Self {
		Self {
			name: failure.name().to_string(),
			id: failure.id().to_string(),
			reason: failure.reason.as_str().to_string(),
			code: failure.reason.code(),
			detail: failure.detail.clone(),
		}
	}
}

/// Serializable outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStatus {
	/// Counter observers poll for new snapshots. It advances on every store
	/// mutation and every runtime property replacement.
	pub change_count: u64,
	/// Sequence number of the pass that produced this status.
	pub pass: u64,
	pub default_application: Option<String>,
	pub applications: Vec<ApplicationStatus>,
	pub failed_applications: Vec<FailedStatus>,
	pub failed_resources: Vec<FailedStatus>,
	pub failed_extensions: Vec<FailedStatus>,
}

impl RuntimeStatus {
	pub fn from_resolution(resolution: &Resolution, change_count: u64, pass: u64) -> Self {
		let failed = |list: &[Failure]| -> Vec<FailedStatus> { list.iter().map(FailedStatus::from).collect() };
		Self {
			change_count,
			pass,
			default_application: resolution.default_application.map(|id| id.to_string()),
			applications: resolution.applications.iter().map(ApplicationStatus::from).collect(),
			failed_applications: failed(&resolution.failed_applications),
			failed_resources: failed(&resolution.failed_resources),
			failed_extensions: failed(&resolution.failed_extensions),
		}
	}

	pub fn application(&self, base: &str) -> Option<&ApplicationStatus> {
		self.applications.iter().find(|app| app.base == base)
	}
}

/// Publication state carried by the board's watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
	/// No pass has completed yet.
	Pending,
	/// The status of this pass is published.
	Published { pass: u64 },
	/// The engine shut down; nothing will be published again.
	Unpublished,
}

/// Atomically published [`RuntimeStatus`].
#[derive(Debug)]
pub struct StatusBoard {
	current: ArcSwapOption<RuntimeStatus>,
	state: watch::Sender<BoardState>,
}

impl Default for StatusBoard {
	fn default() -> Self {
		Self::new()
	}
}

impl StatusBoard {
	pub fn new() -> Self {
		Self {
			current: ArcSwapOption::empty(),
			state: watch::Sender::new(BoardState::Pending),
		}
	}

	pub fn current(&self) -> Option<Arc<RuntimeStatus>> {
		self.current.load_full()
	}

	/// Change count of the published status, for pollers.
	pub fn change_count(&self) -> Option<u64> {
		self.current.load().as_ref().map(|status| status.change_count)
	}

	pub fn subscribe(&self) -> watch::Receiver<BoardState> {
		self.state.subscribe()
	}

	pub fn publish(&self, status: RuntimeStatus) {
		let pass = status.pass;
		self.current.store(Some(Arc::new(status)));
		self.state.send_replace(BoardState::Published { pass });
	}

	pub fn unpublish(&self) {
		self.current.store(None);
		self.state.send_replace(BoardState::Unpublished);
	}

	/// Waits until a status covering at least `change_count` is published.
	/// Returns `None` once the board is unpublished.
	pub async fn wait_for_change_count(&self, change_count: u64) -> Option<Arc<RuntimeStatus>> {
		let mut rx = self.state.subscribe();
		loop {
			let state = *rx.borrow_and_update();
			match state {
				BoardState::Unpublished => return None,
				BoardState::Pending => {}
				BoardState::Published { .. } => {
					if let Some(status) = self.current().filter(|status| status.change_count >= change_count) {
						return Some(status);
					}
				}
			}
			rx.changed().await.ok()?;
		}
	}
}
