//! The whiteboard engine.
//!
//! # Role
//!
//! [`Whiteboard`] accepts registrations from any thread, and runs every
//! reconciliation pass and every container call on one supervised actor.
//!
//! # Mental Model
//!
//! ```text
//! register/update/unregister ─▶ ProviderStore ─listener─▶ Debouncer
//! runtime properties replaced ───────────────────────────▶ Debouncer
//! Debouncer::next ─▶ pump ─▶ Command::Pass(ticket) ─▶ reconciler actor
//! reconciler actor: snapshot ─▶ Reconciler::run ─▶ DeploymentDriver ─▶ StatusBoard
//! ```
//!
//! # Invariants
//!
//! - Mutating calls never run the matcher or the driver inline; they only
//!   update the store and request a pass.
//! - Passes never overlap, and a mutation made while a pass runs is followed
//!   by another pass.
//! - After [`Whiteboard::shutdown`] no further pass runs; the status is
//!   unpublished and every live deployment destroyed, best effort within the
//!   configured timeout.

mod actor;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use switchyard_registry::{Properties, ProviderId, ProviderStore, Reconciler, Registration};
use switchyard_worker::supervisor::{ActorHandle, ActorSpec, RestartPolicy, ShutdownMode, spawn_supervised_actor};
use switchyard_worker::{ActorEventReceiver, Debouncer, Request, TaskClass};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;

use self::actor::{Command, Engine, ReconcilerActor};
use crate::config::{RuntimeProperties, WhiteboardConfig};
use crate::container::Container;
use crate::driver::{DeploymentDriver, DriverReport};
use crate::error::WhiteboardError;
use crate::status::{RuntimeStatus, StatusBoard};

/// Broadcast after every completed pass.
#[derive(Debug, Clone)]
pub struct PassEvent {
	pub pass: u64,
	pub change_count: u64,
	pub report: DriverReport,
}

pub struct Whiteboard<C: Container> {
	name: String,
	engine: Arc<Engine<C>>,
	debouncer: Debouncer,
	actor: Arc<ActorHandle<Command, PassEvent>>,
	pump: JoinHandle<()>,
	shutdown_timeout: Duration,
	closed: AtomicBool,
}

impl<C: Container> std::fmt::Debug for Whiteboard<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Whiteboard")
			.field("name", &self.name)
			.field("debouncer", &self.debouncer)
			.field("closed", &self.closed.load(Ordering::Acquire))
			.finish_non_exhaustive()
	}
}

impl<C: Container> Whiteboard<C> {
	/// Starts the engine on the current tokio runtime with a fresh store.
	///
	/// An initial pass is requested right away so the built-in default
	/// application is deployed even before the first registration.
	pub fn start(config: WhiteboardConfig, container: Arc<C>) -> Result<Self, WhiteboardError> {
		Self::start_with_store(config, container, Arc::new(ProviderStore::new()))
	}

	/// Starts the engine over an existing store.
	pub fn start_with_store(config: WhiteboardConfig, container: Arc<C>, store: Arc<ProviderStore>) -> Result<Self, WhiteboardError> {
		config.validate()?;
		if tokio::runtime::Handle::try_current().is_err() {
			return Err(WhiteboardError::NoRuntime);
		}

		let engine = Arc::new(Engine {
			store,
			runtime: RuntimeProperties::new(config.initial_runtime_properties()),
			board: Arc::new(StatusBoard::new()),
			reconciler: Reconciler::new(),
			driver: Mutex::new(DeploymentDriver::new(container)),
		});
		let debouncer = Debouncer::new(config.debounce());

		let factory_engine = Arc::clone(&engine);
		let actor = Arc::new(spawn_supervised_actor(
			ActorSpec::new(format!("whiteboard.{}", config.name), TaskClass::Control, move || ReconcilerActor {
				engine: Arc::clone(&factory_engine),
			})
			.capacity(4)
			.restart(RestartPolicy::OnFailure {
				max_restarts: 16,
				backoff: Duration::from_millis(10),
			}),
		));

		let pump = {
			let debouncer = debouncer.clone();
			let actor = Arc::clone(&actor);
			switchyard_worker::spawn(TaskClass::Background, async move {
				while let Some(ticket) = debouncer.next().await {
					if actor.send(Command::Pass(ticket)).await.is_err() {
						break;
					}
				}
				tracing::trace!("whiteboard.pump.exit");
			})
		};

		let on_store_change = debouncer.clone();
		engine.store.set_listener(Arc::new(move |change_count: u64| {
			let outcome = on_store_change.request();
			tracing::trace!(change_count, outcome = ?outcome, "whiteboard.store.changed");
		}));
		let on_runtime_change = debouncer.clone();
		engine.runtime.set_listener(Arc::new(move || {
			let outcome = on_runtime_change.request();
			tracing::debug!(outcome = ?outcome, "whiteboard.runtime.changed");
		}));

		debouncer.request();
		tracing::info!(name = %config.name, debounce_ms = config.debounce_ms, "whiteboard.started");

		let shutdown_timeout = config.shutdown_timeout();
		Ok(Self {
			name: config.name,
			engine,
			debouncer,
			actor,
			pump,
			shutdown_timeout,
			closed: AtomicBool::new(false),
		})
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn store(&self) -> &Arc<ProviderStore> {
		&self.engine.store
	}

	pub fn board(&self) -> &Arc<StatusBoard> {
		&self.engine.board
	}

	pub fn runtime_properties(&self) -> &RuntimeProperties {
		&self.engine.runtime
	}

	/// Number of passes started so far.
	pub fn passes(&self) -> u64 {
		self.debouncer.passes()
	}

	pub fn status(&self) -> Option<Arc<RuntimeStatus>> {
		self.engine.board.current()
	}

	pub fn subscribe_passes(&self) -> ActorEventReceiver<PassEvent> {
		self.actor.subscribe()
	}

	/// Adds a registration. Returns its provider id.
	pub fn register(&self, registration: Registration) -> ProviderId {
		self.engine.store.register(registration).0
	}

	/// Replaces the registration stored under `id`.
	pub fn update(&self, id: ProviderId, registration: Registration) {
		self.engine.store.update(id, registration);
	}

	/// Removes the registration stored under `id`. Returns whether it existed.
	pub fn unregister(&self, id: ProviderId) -> bool {
		self.engine.store.unregister(id).is_some()
	}

	/// Replaces the runtime properties and schedules a pass.
	pub fn set_runtime_properties(&self, properties: Properties) {
		self.engine.runtime.replace(properties);
	}

	/// Schedules a pass without any store change.
	pub fn request_pass(&self) -> Request {
		self.debouncer.request()
	}

	/// Combined change counter: store mutations plus runtime property
	/// replacements. Published statuses carry the value their pass observed.
	pub fn change_count(&self) -> u64 {
		self.engine.change_count()
	}

	/// Waits for a status that reflects every store change and runtime
	/// property replacement made so far.
	pub async fn settled(&self) -> Option<Arc<RuntimeStatus>> {
		let target = self.engine.change_count();
		self.engine.board.wait_for_change_count(target).await
	}

	/// Stops scheduling, then unpublishes the status and destroys every live
	/// deployment on the worker, waiting up to the configured timeout.
	///
	/// On timeout the teardown keeps running in the background.
	pub async fn shutdown(&self) -> Result<DriverReport, WhiteboardError> {
		if self.closed.swap(true, Ordering::AcqRel) {
			return Err(WhiteboardError::ShutDown);
		}
		self.detach();

		let timeout = self.shutdown_timeout;
		let (reply, report) = oneshot::channel();
		let teardown = async {
			self.actor.send(Command::Shutdown(reply)).await.map_err(|_| WhiteboardError::ShutDown)?;
			report.await.map_err(|_| WhiteboardError::ShutDown)
		};
		match tokio::time::timeout(timeout, teardown).await {
			Ok(Ok(report)) => {
				let actor = self.actor.shutdown(ShutdownMode::Graceful { timeout }).await;
				tracing::info!(
					name = %self.name,
					destroyed = report.destroyed.len(),
					actor_completed = actor.completed,
					actor_exit = ?actor.last_exit,
					"whiteboard.stopped"
				);
				Ok(report)
			}
			Ok(Err(err)) => Err(err),
			Err(_) => {
				tracing::warn!(name = %self.name, ?timeout, "whiteboard.shutdown.timed_out");
				let actor = Arc::clone(&self.actor);
				switchyard_worker::spawn(TaskClass::Background, async move {
					let report = actor.shutdown_graceful_or_force(timeout).await;
					tracing::debug!(completed = report.completed, "whiteboard.shutdown.background_done");
				});
				Err(WhiteboardError::ShutdownTimedOut(timeout))
			}
		}
	}

	fn detach(&self) {
		self.debouncer.close();
		self.engine.store.clear_listener();
		self.engine.runtime.clear_listener();
	}
}

impl<C: Container> Drop for Whiteboard<C> {
	fn drop(&mut self) {
		if !self.closed.swap(true, Ordering::AcqRel) {
			self.detach();
			self.actor.cancel();
		}
		self.pump.abort();
	}
}
