use std::sync::Arc;

use async_trait::async_trait;
use switchyard_registry::{ProviderStore, Reconciler};
use switchyard_worker::Ticket;
use switchyard_worker::supervisor::{ActorContext, ActorFlow, WorkerActor};
use tokio::sync::{Mutex, oneshot};

use super::PassEvent;
use crate::config::RuntimeProperties;
use crate::container::Container;
use crate::driver::{DeploymentDriver, DriverReport};
use crate::status::{RuntimeStatus, StatusBoard};

/// State shared by every generation of the reconciler actor.
pub(super) struct Engine<C: Container> {
	pub store: Arc<ProviderStore>,
	pub runtime: RuntimeProperties,
	pub board: Arc<StatusBoard>,
	pub reconciler: Reconciler,
	pub driver: Mutex<DeploymentDriver<C>>,
}

impl<C: Container> Engine<C> {
	/// Store change count plus runtime property revision. Both only grow, so
	/// the sum is monotonic.
	pub(super) fn change_count(&self) -> u64 {
		self.store.change_count() + self.runtime.revision()
	}

	async fn run_pass(&self, pass: u64) -> PassEvent {
		let revision = self.runtime.revision();
		let runtime = self.runtime.load();
		let snapshot = self.store.snapshot();
		let resolution = self.reconciler.run(&snapshot, &runtime);
		let change_count = resolution.change_count + revision;
		let report = self.driver.lock().await.apply(&resolution.applications).await;
		self.board.publish(RuntimeStatus::from_resolution(&resolution, change_count, pass));

		let failed = resolution.failed_applications.len() + resolution.failed_resources.len() + resolution.failed_extensions.len();
		tracing::debug!(
			pass,
			change_count,
			runtime_revision = revision,
			accepted = resolution.applications.len(),
			failed,
			created = report.created.len(),
			reloaded = report.reloaded.len(),
			destroyed = report.destroyed.len(),
			container_failures = report.failed.len(),
			"whiteboard.pass.completed"
		);
		PassEvent {
			pass,
			change_count,
			report,
		}
	}

	async fn teardown(&self) -> DriverReport {
		self.board.unpublish();
		let report = self.driver.lock().await.teardown().await;
		tracing::debug!(destroyed = report.destroyed.len(), failures = report.failed.len(), "whiteboard.teardown");
		report
	}
}

pub(super) enum Command {
	/// Run one pass; the ticket is released when it completes.
	Pass(Ticket),
	/// Unpublish the status, destroy every live deployment, then stop.
	Shutdown(oneshot::Sender<DriverReport>),
}

pub(super) struct ReconcilerActor<C: Container> {
	pub engine: Arc<Engine<C>>,
}

#[async_trait]
impl<C: Container> WorkerActor for ReconcilerActor<C> {
	type Cmd = Command;
	type Evt = PassEvent;

	async fn handle(&mut self, cmd: Command, ctx: &mut ActorContext<PassEvent>) -> Result<ActorFlow, String> {
		match cmd {
			Command::Pass(ticket) => {
				let event = self.engine.run_pass(ticket.serial()).await;
				drop(ticket);
				ctx.emit(event);
				Ok(ActorFlow::Continue)
			}
			Command::Shutdown(reply) => {
				let report = self.engine.teardown().await;
				let _ = reply.send(report);
				Ok(ActorFlow::Stop)
			}
		}
	}
}
