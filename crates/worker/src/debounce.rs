//! Debounced pass scheduling.
//!
//! # Role
//!
//! Turns an unbounded stream of change notifications into a sequence of
//! passes that never overlap. Producers call [`Debouncer::request`] from any
//! thread; one consumer awaits [`Debouncer::next`] and holds the returned
//! [`Ticket`] while its pass runs.
//!
//! # Mental Model
//!
//! ```text
//! Idle ──request──▶ Queued ──interval elapsed──▶ Running { dirty: false }
//!   ▲                  ▲                              │ request
//!   │                  │                              ▼
//!   └── ticket drop ───┴──── ticket drop ◀──── Running { dirty: true }
//! ```
//!
//! # Invariants
//!
//! - At most one ticket is outstanding.
//! - A request made while a pass runs is never lost: the pass's ticket drop
//!   queues the next pass.
//! - A queued pass waits one full interval after it was picked up, so any
//!   burst of requests inside that window collapses into a single pass, and
//!   consecutive passes are at least one interval apart.
//! - [`Debouncer::close`] is terminal.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Scheduler state, as seen by [`Debouncer::phase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Idle,
	Queued,
	Running { dirty: bool },
	Closed,
}

/// What a [`Debouncer::request`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
	/// A new pass was queued.
	Queued,
	/// A pass was already queued and will observe this change.
	AlreadyQueued,
	/// A pass is running; another one follows it.
	MarkedDirty,
	Closed,
}

struct State {
	phase: Phase,
	issued: u64,
}

struct Shared {
	interval: Duration,
	state: Mutex<State>,
	wake: Notify,
	closed: CancellationToken,
}

/// Cloneable handle to one scheduler.
#[derive(Clone)]
pub struct Debouncer {
	shared: Arc<Shared>,
}

impl std::fmt::Debug for Debouncer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Debouncer").field("interval", &self.shared.interval).field("phase", &self.phase()).finish()
	}
}

impl Debouncer {
	pub fn new(interval: Duration) -> Self {
		Self {
			shared: Arc::new(Shared {
				interval,
				state: Mutex::new(State { phase: Phase::Idle, issued: 0 }),
				wake: Notify::new(),
				closed: CancellationToken::new(),
			}),
		}
	}

	pub fn interval(&self) -> Duration {
		self.shared.interval
	}

	pub fn phase(&self) -> Phase {
		self.shared.state.lock().phase
	}

	/// Number of tickets handed out so far.
	pub fn passes(&self) -> u64 {
		self.shared.state.lock().issued
	}

	/// Asks for a pass. Cheap and non-blocking.
	pub fn request(&self) -> Request {
		let mut state = self.shared.state.lock();
		let outcome = match state.phase {
			Phase::Idle => {
				state.phase = Phase::Queued;
				Request::Queued
			}
			Phase::Queued => Request::AlreadyQueued,
			Phase::Running { .. } => {
				state.phase = Phase::Running { dirty: true };
				Request::MarkedDirty
			}
			Phase::Closed => Request::Closed,
		};
		drop(state);
		if outcome == Request::Queued {
			self.shared.wake.notify_one();
		}
		tracing::trace!(outcome = ?outcome, "worker.debounce.request");
		outcome
	}

	/// Waits for the next due pass. Returns `None` once closed.
	///
	/// Meant for a single consumer; a second concurrent caller would wait for
	/// the first one's ticket to drop.
	pub async fn next(&self) -> Option<Ticket> {
		loop {
			match self.phase() {
				Phase::Closed => return None,
				Phase::Queued => {
					tokio::select! {
						biased;
						_ = self.shared.closed.cancelled() => return None,
						_ = tokio::time::sleep(self.shared.interval) => {}
					}
					let mut state = self.shared.state.lock();
					if state.phase == Phase::Queued {
						state.phase = Phase::Running { dirty: false };
						state.issued = state.issued.wrapping_add(1);
						let serial = state.issued;
						drop(state);
						tracing::trace!(serial, "worker.debounce.fire");
						return Some(Ticket {
							shared: Arc::clone(&self.shared),
							serial,
						});
					}
				}
				Phase::Idle | Phase::Running { .. } => {
					tokio::select! {
						biased;
						_ = self.shared.closed.cancelled() => return None,
						_ = self.shared.wake.notified() => {}
					}
				}
			}
		}
	}

	/// Stops scheduling. A running pass finishes; nothing runs after it.
	pub fn close(&self) {
		self.shared.state.lock().phase = Phase::Closed;
		self.shared.closed.cancel();
	}
}

/// Permission to run one pass. Dropping it completes the pass.
#[derive(Debug)]
pub struct Ticket {
	shared: Arc<Shared>,
	serial: u64,
}

impl std::fmt::Debug for Shared {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Shared").field("interval", &self.interval).finish_non_exhaustive()
	}
}

impl Ticket {
	/// 1-based sequence number of this pass.
	pub fn serial(&self) -> u64 {
		self.serial
	}
}

impl Drop for Ticket {
	fn drop(&mut self) {
		let mut state = self.shared.state.lock();
		let requeue = match state.phase {
			Phase::Running { dirty: true } => {
				state.phase = Phase::Queued;
				true
			}
			Phase::Running { dirty: false } => {
				state.phase = Phase::Idle;
				false
			}
			Phase::Idle | Phase::Queued | Phase::Closed => false,
		};
		drop(state);
		if requeue {
			self.shared.wake.notify_one();
		}
	}
}
