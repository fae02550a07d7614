//! Deployment driver: reflects accepted applications onto a container.
//!
//! # Role
//!
//! Owns the only cross-pass deployment state, `live`: path to container
//! handle plus the [`Fingerprint`] it was deployed with. Each pass hands the
//! driver the accepted applications; the driver diffs them against `live` and
//! issues the create / reload / destroy calls that close the gap.
//!
//! # Mental Model
//!
//! Per path: `absent -> live` (create), `live -> live` (reload when the
//! fingerprint changed), `live -> absent` (destroy). A path whose application
//! identity changed is destroyed and created again as two separate calls.
//!
//! # Invariants
//!
//! - A failed call leaves the path in the state it had before the call, and is
//!   retried by the next pass because the diff still shows the mismatch.
//! - One failing path never prevents the remaining paths from being processed.
//! - A failed reload falls back to destroy + create for that path.

use std::collections::BTreeMap;
use std::sync::Arc;

use switchyard_registry::{AcceptedApplication, Fingerprint, Provider, ProviderId};

use crate::container::{Container, ContainerError, Operation};


/// Container calls issued by one [`DeploymentDriver::apply`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverReport {
	pub created: Vec<String>,
	pub reloaded: Vec<String>,
	pub destroyed: Vec<String>,
	pub failed: Vec<(String, Operation, ContainerError)>,
}

impl DriverReport {
	/// True when the pass issued no container call at all.
	pub fn is_noop(&self) -> bool {
		self.created.is_empty() && self.reloaded.is_empty() && self.destroyed.is_empty() && self.failed.is_empty()
	}
}

enum Step {
	Create,
	Reload,
	Keep,
}

struct Live<H> {
	handle: H,
	application: ProviderId,
	fingerprint: Fingerprint,
}

pub struct DeploymentDriver<C: Container> {
	container: Arc<C>,
	live: BTreeMap<String, Live<C::Handle>>,
}

impl<C: Container> std::fmt::Debug for DeploymentDriver<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeploymentDriver").field("live", &self.live.keys().collect::<Vec<_>>()).finish()
	}
}

impl<C: Container> DeploymentDriver<C> {
	pub fn new(container: Arc<C>) -> Self {
		Self {
			container,
			live: BTreeMap::new(),
		}
	}

	pub fn container(&self) -> &Arc<C> {
		&self.container
	}

	/// Paths with a live handle, in path order.
	pub fn live_paths(&self) -> impl Iterator<Item = &str> {
		self.live.keys().map(String::as_str)
	}

	/// Reconciles `live` against the accepted applications.
	pub async fn apply(&mut self, applications: &[AcceptedApplication]) -> DriverReport {
		let mut report = DriverReport::default();
		let accepted: BTreeMap<&str, &AcceptedApplication> = applications.iter().map(|app| (app.base_path(), app)).collect();

		let stale: Vec<String> = self
			.live
			.iter()
			.filter(|(path, live)| accepted.get(path.as_str()).is_none_or(|app| app.application.id() != live.application))
			.map(|(path, _)| path.clone())
			.collect();
		for path in stale {
			self.destroy(&path, &mut report).await;
		}

		for (path, app) in accepted {
			let fingerprint = app.fingerprint();
			let step = match self.live.get(path) {
				None => Step::Create,
				// The old application's destroy failed above; it stays until a later pass.
				Some(live) if live.application != fingerprint.application => Step::Keep,
				Some(live) if live.fingerprint == fingerprint => Step::Keep,
				Some(_) => Step::Reload,
			};
			match step {
				Step::Create => self.create(path, app, fingerprint, &mut report).await,
				Step::Reload => self.reload(path, app, fingerprint, &mut report).await,
				Step::Keep => {}
			}
		}

		report
	}

	/// Destroys every live handle. Failures are reported and the handle dropped.
	pub async fn teardown(&mut self) -> DriverReport {
		let mut report = DriverReport::default();
		let paths: Vec<String> = self.live.keys().cloned().collect();
		for path in paths {
			self.destroy(&path, &mut report).await;
		}
		self.live.clear();
		report
	}

	async fn create(&mut self, path: &str, app: &AcceptedApplication, fingerprint: Fingerprint, report: &mut DriverReport) {
		match self.container.create(path, app).await {
			Ok(handle) => {
				tracing::info!(path, application = %app.application.name(), "whiteboard.deploy.created");
				self.live.insert(
					path.to_string(),
					Live {
						handle,
						application: fingerprint.application,
						fingerprint,
					},
				);
				report.created.push(path.to_string());
			}
			Err(err) => fail(report, path, Operation::Create, err),
		}
	}

	async fn reload(&mut self, path: &str, app: &AcceptedApplication, fingerprint: Fingerprint, report: &mut DriverReport) {
		let Some(live) = self.live.get_mut(path) else {
			return;
		};
		match self.container.reload(&mut live.handle, app).await {
			Ok(()) => {
				tracing::info!(path, application = %app.application.name(), "whiteboard.deploy.reloaded");
				live.fingerprint = fingerprint;
				report.reloaded.push(path.to_string());
			}
			Err(err) => {
				fail(report, path, Operation::Reload, err);
				if self.destroy(path, report).await {
					self.create(path, app, fingerprint, report).await;
				}
			}
		}
	}

	/// Returns whether the path is now absent.
	async fn destroy(&mut self, path: &str, report: &mut DriverReport) -> bool {
		let Some(live) = self.live.get_mut(path) else {
			return true;
		};
		match self.container.destroy(&mut live.handle).await {
			Ok(()) => {
				self.live.remove(path);
				tracing::info!(path, "whiteboard.deploy.destroyed");
				report.destroyed.push(path.to_string());
				true
			}
			Err(err) => {
				fail(report, path, Operation::Destroy, err);
				false
			}
		}
	}
}

fn fail(report: &mut DriverReport, path: &str, op: Operation, err: ContainerError) {
	tracing::warn!(path, operation = op.as_str(), error = %err, "whiteboard.deploy.failed");
	report.failed.push((path.to_string(), op, err));
}
