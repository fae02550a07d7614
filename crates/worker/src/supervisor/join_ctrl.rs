use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Joins the supervisor task on behalf of any number of shutdown callers.
///
/// The first caller to find the handle awaits it. Others wait on the `done`
/// flag. A caller that times out puts the handle back for the next one.
pub(super) struct JoinCtrl {
	handle: Mutex<Option<JoinHandle<()>>>,
	done: watch::Sender<bool>,
}

impl JoinCtrl {
	pub(super) fn new(handle: JoinHandle<()>) -> Self {
		Self {
			handle: Mutex::new(Some(handle)),
			done: watch::Sender::new(false),
		}
	}

	pub(super) async fn join(&self) {
		let mut done = self.done.subscribe();
		loop {
			let taken = self.handle.lock().await.take();
			match taken {
				Some(handle) => {
					let _ = handle.await;
					self.done.send_replace(true);
					return;
				}
				None => {
					if *done.borrow_and_update() {
						return;
					}
					if done.changed().await.is_err() {
						return;
					}
				}
			}
		}
	}

	/// Returns `false` when `timeout` elapsed first.
	pub(super) async fn join_within(&self, timeout: Duration) -> bool {
		let deadline = tokio::time::Instant::now() + timeout;
		let mut done = self.done.subscribe();
		loop {
			let taken = self.handle.lock().await.take();
			match taken {
				Some(mut handle) => {
					tokio::select! {
						_ = &mut handle => {
							self.done.send_replace(true);
							return true;
						}
						_ = tokio::time::sleep_until(deadline) => {
							*self.handle.lock().await = Some(handle);
							// Wake waiters so one of them can pick the handle up.
							self.done.send_modify(|_| {});
							return false;
						}
					}
				}
				None => {
					if *done.borrow_and_update() {
						return true;
					}
					tokio::select! {
						changed = done.changed() => if changed.is_err() { return false },
						_ = tokio::time::sleep_until(deadline) => return false,
					}
				}
			}
		}
	}
}
