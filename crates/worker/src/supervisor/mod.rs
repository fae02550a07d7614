//! Supervised actors.
//!
//! # Role
//!
//! An actor owns mutable state and processes commands from its mailbox one at
//! a time. The supervisor task runs successive *generations* of the actor:
//! when a generation fails (startup error, handler error or panic) and the
//! restart policy allows it, a fresh instance is built by the factory and keeps
//! draining the same mailbox.
//!
//! # Invariants
//!
//! - Commands are handled sequentially; no two handlers of one actor overlap.
//! - Cancelling the handle preempts startup, receive and handle alike.
//! - Each generation gets a child cancellation token, cancelled before the
//!   next generation starts.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::TaskClass;
use crate::mailbox::{Mailbox, MailboxReceiver, MailboxSendError, MailboxSender};
use crate::token::{GenerationClock, GenerationToken};

mod join_ctrl;

use join_ctrl::JoinCtrl;

/// What the actor loop does after one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorFlow {
	Continue,
	Stop,
}

/// Why one actor generation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorExit {
	Stopped,
	MailboxClosed,
	Cancelled,
	StartupFailed(String),
	HandlerFailed(String),
	Panicked,
	JoinFailed(String),
}

impl ActorExit {
	pub fn is_failure(&self) -> bool {
		matches!(self, Self::StartupFailed(_) | Self::HandlerFailed(_) | Self::Panicked | Self::JoinFailed(_))
	}
}

#[derive(Debug, Clone)]
pub enum RestartPolicy {
	Never,
	OnFailure { max_restarts: usize, backoff: Duration },
}

impl RestartPolicy {
	fn delay(&self, exit: &ActorExit, restarts: usize) -> Option<Duration> {
		match self {
			Self::Never => None,
			Self::OnFailure { max_restarts, backoff } => (exit.is_failure() && restarts < *max_restarts).then_some(*backoff),
		}
	}
}

impl Default for RestartPolicy {
	fn default() -> Self {
		Self::OnFailure {
			max_restarts: 3,
			backoff: Duration::from_millis(50),
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub enum ShutdownMode {
	/// Cancel in-flight work and wait for the supervisor to exit.
	Immediate,
	/// Close the mailbox, let queued commands drain, and wait up to `timeout`.
	Graceful { timeout: Duration },
}

#[derive(Debug, Clone)]
pub struct ShutdownReport {
	pub completed: bool,
	pub last_exit: Option<ActorExit>,
}

impl ShutdownReport {
	pub fn timed_out(&self) -> bool {
		!self.completed
	}
}

/// Actor behavior run by the supervisor.
#[async_trait]
pub trait WorkerActor: Send + 'static {
	type Cmd: Send + 'static;
	type Evt: Clone + Send + 'static;

	async fn on_start(&mut self, _ctx: &mut ActorContext<Self::Evt>) -> Result<(), String> {
		Ok(())
	}

	async fn on_stop(&mut self, _ctx: &mut ActorContext<Self::Evt>) {}

	async fn handle(&mut self, cmd: Self::Cmd, ctx: &mut ActorContext<Self::Evt>) -> Result<ActorFlow, String>;
}

pub struct ActorContext<Evt> {
	events: broadcast::Sender<Evt>,
	token: GenerationToken,
}

impl<Evt: Clone + Send + 'static> ActorContext<Evt> {
	/// Broadcasts an event. Events with no subscriber are dropped.
	pub fn emit(&self, evt: Evt) {
		let _ = self.events.send(evt);
	}

	pub fn generation(&self) -> u64 {
		self.token.generation()
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}
}

type Factory<A> = Arc<dyn Fn() -> A + Send + Sync>;

/// Builder for one supervised actor.
pub struct ActorSpec<A: WorkerActor> {
	name: String,
	class: TaskClass,
	capacity: usize,
	restart: RestartPolicy,
	event_buffer: usize,
	factory: Factory<A>,
}

impl<A: WorkerActor> ActorSpec<A> {
	pub fn new(name: impl Into<String>, class: TaskClass, factory: impl Fn() -> A + Send + Sync + 'static) -> Self {
		Self {
			name: name.into(),
			class,
			capacity: 128,
			restart: RestartPolicy::default(),
			event_buffer: 64,
			factory: Arc::new(factory),
		}
	}

	/// # Panics
	///
	/// Panics if `capacity` is zero.
	#[must_use]
	pub fn capacity(mut self, capacity: usize) -> Self {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		self.capacity = capacity;
		self
	}

	#[must_use]
	pub fn restart(mut self, restart: RestartPolicy) -> Self {
		self.restart = restart;
		self
	}

	#[must_use]
	pub fn event_buffer(mut self, size: usize) -> Self {
		self.event_buffer = size.max(1);
		self
	}
}

#[derive(Default)]
struct ActorState {
	generation: AtomicU64,
	restarts: AtomicUsize,
	last_exit: Mutex<Option<ActorExit>>,
}

impl ActorState {
	fn record(&self, exit: ActorExit) {
		*self.last_exit.lock() = Some(exit);
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorSendError;

impl From<MailboxSendError> for ActorSendError {
	fn from(_: MailboxSendError) -> Self {
		ActorSendError
	}
}

impl std::fmt::Display for ActorSendError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("actor mailbox closed")
	}
}

impl std::error::Error for ActorSendError {}

/// Handle to a supervised actor. Dropping it cancels the actor.
pub struct ActorHandle<Cmd: Send + 'static, Evt: Clone + Send + 'static> {
	name: String,
	tx: MailboxSender<Cmd>,
	events: broadcast::Sender<Evt>,
	cancel: CancellationToken,
	state: Arc<ActorState>,
	join: JoinCtrl,
}

impl<Cmd: Send + 'static, Evt: Clone + Send + 'static> Drop for ActorHandle<Cmd, Evt> {
	fn drop(&mut self) {
		self.cancel.cancel();
		self.tx.close();
	}
}

impl<Cmd: Send + 'static, Evt: Clone + Send + 'static> ActorHandle<Cmd, Evt> {
	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn generation(&self) -> u64 {
		self.state.generation.load(Ordering::Acquire)
	}

	pub fn restart_count(&self) -> usize {
		self.state.restarts.load(Ordering::Acquire)
	}

	pub fn subscribe(&self) -> crate::ActorEventReceiver<Evt> {
		self.events.subscribe()
	}

	pub async fn send(&self, cmd: Cmd) -> Result<(), ActorSendError> {
		self.tx.send(cmd).await?;
		Ok(())
	}

	/// Cancels the actor and closes its mailbox so later sends fail fast.
	pub fn cancel(&self) {
		self.cancel.cancel();
		self.tx.close();
	}

	pub fn last_exit(&self) -> Option<ActorExit> {
		self.state.last_exit.lock().clone()
	}

	pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
		let completed = match mode {
			ShutdownMode::Immediate => {
				self.cancel();
				self.join.join().await;
				true
			}
			ShutdownMode::Graceful { timeout } => {
				self.tx.close();
				self.join.join_within(timeout).await
			}
		};
		ShutdownReport {
			completed,
			last_exit: self.last_exit(),
		}
	}

	/// Graceful shutdown, escalated to immediate when it times out.
	pub async fn shutdown_graceful_or_force(&self, timeout: Duration) -> ShutdownReport {
		let report = self.shutdown(ShutdownMode::Graceful { timeout }).await;
		if report.completed {
			return report;
		}
		tracing::warn!(actor = %self.name, "worker.actor.shutdown_forced");
		self.shutdown(ShutdownMode::Immediate).await
	}
}

/// Spawns the supervisor task for `spec` and returns its handle.
pub fn spawn_supervised_actor<A: WorkerActor>(spec: ActorSpec<A>) -> ActorHandle<A::Cmd, A::Evt> {
	let (tx, rx) = Mailbox::backpressure(spec.capacity);
	let (events, _) = broadcast::channel(spec.event_buffer);
	let cancel = CancellationToken::new();
	let state = Arc::new(ActorState::default());

	let supervisor = {
		let name = spec.name.clone();
		let class = spec.class;
		let factory = spec.factory;
		let restart = spec.restart;
		let events = events.clone();
		let cancel = cancel.clone();
		let state = Arc::clone(&state);
		crate::spawn(TaskClass::Background, async move {
			let clock = GenerationClock::default();
			let mut restarts = 0usize;
			loop {
				if cancel.is_cancelled() {
					state.record(ActorExit::Cancelled);
					break;
				}
				let generation = clock.next();
				state.generation.store(generation, Ordering::Release);
				let scope = cancel.child_token();
				let token = GenerationToken::new(generation, scope.clone());

				let instance = crate::spawn(class, run_generation(factory(), rx.clone(), events.clone(), token));
				let exit = match instance.await {
					Ok(exit) => exit,
					Err(err) if err.is_panic() => ActorExit::Panicked,
					Err(err) if err.is_cancelled() => ActorExit::Cancelled,
					Err(err) => ActorExit::JoinFailed(err.to_string()),
				};
				scope.cancel();
				state.record(exit.clone());
				tracing::debug!(actor = %name, generation, restarts, exit = ?exit, "worker.actor.exit");

				if cancel.is_cancelled() {
					break;
				}
				let Some(backoff) = restart.delay(&exit, restarts) else {
					break;
				};
				restarts += 1;
				state.restarts.store(restarts, Ordering::Release);
				tokio::select! {
					_ = cancel.cancelled() => {
						state.record(ActorExit::Cancelled);
						break;
					}
					_ = tokio::time::sleep(backoff) => {}
				}
			}
		})
	};

	ActorHandle {
		name: spec.name,
		tx,
		events,
		cancel,
		state,
		join: JoinCtrl::new(supervisor),
	}
}

async fn run_generation<A: WorkerActor>(mut actor: A, rx: MailboxReceiver<A::Cmd>, events: broadcast::Sender<A::Evt>, token: GenerationToken) -> ActorExit {
	let mut ctx = ActorContext { events, token: token.clone() };

	tokio::select! {
		biased;
		_ = token.cancelled() => return ActorExit::Cancelled,
		started = actor.on_start(&mut ctx) => {
			if let Err(err) = started {
				return ActorExit::StartupFailed(err);
			}
		}
	}

	let exit = loop {
		let cmd = tokio::select! {
			biased;
			_ = token.cancelled() => break ActorExit::Cancelled,
			cmd = rx.recv() => match cmd {
				Some(cmd) => cmd,
				None => break ActorExit::MailboxClosed,
			},
		};
		let flow = tokio::select! {
			biased;
			_ = token.cancelled() => break ActorExit::Cancelled,
			flow = actor.handle(cmd, &mut ctx) => flow,
		};
		match flow {
			Ok(ActorFlow::Continue) => {}
			Ok(ActorFlow::Stop) => break ActorExit::Stopped,
			Err(err) => break ActorExit::HandlerFailed(err),
		}
	};

	actor.on_stop(&mut ctx).await;
	exit
}

#[cfg(test)]
mod tests;
