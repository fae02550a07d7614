//! Bounded actor mailboxes.
//!
//! # Role
//!
//! A mailbox is the only way commands reach a supervised actor. It is shared by
//! every generation of that actor, so commands queued before a restart are
//! still delivered afterwards.
//!
//! # Invariants
//!
//! - Nothing is dropped: `send` waits for capacity, `try_send` reports `Full`.
//! - Once closed, sends fail and receivers drain what is left, then see `None`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxSendError {
	Closed,
	Full,
}

impl fmt::Display for MailboxSendError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Closed => f.write_str("mailbox closed"),
			Self::Full => f.write_str("mailbox full"),
		}
	}
}

impl std::error::Error for MailboxSendError {}

struct Queue<T> {
	items: VecDeque<T>,
	closed: bool,
}

struct Shared<T> {
	capacity: usize,
	queue: Mutex<Queue<T>>,
	readable: Notify,
	writable: Notify,
}

impl<T> Shared<T> {
	fn close(&self) {
		self.queue.lock().closed = true;
		self.readable.notify_waiters();
		self.writable.notify_waiters();
	}

	fn push(&self, msg: T) -> Result<(), (MailboxSendError, T)> {
		let mut queue = self.queue.lock();
		if queue.closed {
			return Err((MailboxSendError::Closed, msg));
		}
		if queue.items.len() >= self.capacity {
			return Err((MailboxSendError::Full, msg));
		}
		queue.items.push_back(msg);
		drop(queue);
		self.readable.notify_one();
		Ok(())
	}
}

/// Constructor for a connected sender/receiver pair.
pub struct Mailbox;

impl Mailbox {
	/// Creates a mailbox whose senders wait for capacity.
	///
	/// # Panics
	///
	/// Panics if `capacity` is zero.
	pub fn backpressure<T>(capacity: usize) -> (MailboxSender<T>, MailboxReceiver<T>) {
		assert!(capacity > 0, "mailbox capacity must be > 0");
		let shared = Arc::new(Shared {
			capacity,
			queue: Mutex::new(Queue {
				items: VecDeque::with_capacity(capacity),
				closed: false,
			}),
			readable: Notify::new(),
			writable: Notify::new(),
		});
		(MailboxSender { shared: Arc::clone(&shared) }, MailboxReceiver { shared })
	}
}

pub struct MailboxSender<T> {
	shared: Arc<Shared<T>>,
}

impl<T> Clone for MailboxSender<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> MailboxSender<T> {
	/// Enqueues without waiting. A full mailbox reports `Full`.
	pub fn try_send(&self, msg: T) -> Result<(), MailboxSendError> {
		self.shared.push(msg).map_err(|(err, _)| err)
	}

	/// Enqueues, waiting for capacity.
	pub async fn send(&self, mut msg: T) -> Result<(), MailboxSendError> {
		loop {
			let writable = self.shared.writable.notified();
			tokio::pin!(writable);
			writable.as_mut().enable();
			match self.shared.push(msg) {
				Ok(()) => return Ok(()),
				Err((MailboxSendError::Full, back)) => msg = back,
				Err((err, _)) => return Err(err),
			}
			writable.await;
		}
	}

	/// Closes the mailbox. Queued commands are still delivered.
	pub fn close(&self) {
		self.shared.close();
	}

	pub fn is_closed(&self) -> bool {
		self.shared.queue.lock().closed
	}

	pub fn len(&self) -> usize {
		self.shared.queue.lock().items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

pub struct MailboxReceiver<T> {
	shared: Arc<Shared<T>>,
}

impl<T> Clone for MailboxReceiver<T> {
	fn clone(&self) -> Self {
		Self {
			shared: Arc::clone(&self.shared),
		}
	}
}

impl<T> MailboxReceiver<T> {
	/// Receives the next command, or `None` once closed and drained.
	pub async fn recv(&self) -> Option<T> {
		loop {
			let readable = self.shared.readable.notified();
			tokio::pin!(readable);
			readable.as_mut().enable();
			{
				let mut queue = self.shared.queue.lock();
				if let Some(msg) = queue.items.pop_front() {
					drop(queue);
					self.shared.writable.notify_one();
					return Some(msg);
				}
				if queue.closed {
					return None;
				}
			}
			readable.await;
		}
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[tokio::test]
	async fn backpressure_try_send_reports_full() {
		let (tx, rx) = Mailbox::backpressure(2);
		assert_eq!(tx.try_send(1u32), Ok(()));
		assert_eq!(tx.try_send(2), Ok(()));
		assert_eq!(tx.try_send(3), Err(MailboxSendError::Full));

		tx.close();
		assert_eq!(rx.recv().await, Some(1));
		assert_eq!(rx.recv().await, Some(2));
		assert_eq!(rx.recv().await, None);
	}

	#[tokio::test]
	async fn backpressure_send_waits_for_capacity() {
		let (tx, rx) = Mailbox::backpressure(1);
		tx.send(1u32).await.unwrap();

		let waiting = tx.clone();
		let task = tokio::spawn(async move { waiting.send(2).await });
		tokio::task::yield_now().await;
		assert!(!task.is_finished());

		assert_eq!(rx.recv().await, Some(1));
		let sent = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
		assert_eq!(sent, Ok(()));
		assert_eq!(rx.recv().await, Some(2));
	}

	#[tokio::test]
	async fn backpressure_waiter_sees_close() {
		let (tx, _rx) = Mailbox::backpressure(1);
		tx.send(1u32).await.unwrap();

		let waiting = tx.clone();
		let task = tokio::spawn(async move { waiting.send(2).await });
		tokio::task::yield_now().await;
		tx.close();

		let sent = tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
		assert_eq!(sent, Err(MailboxSendError::Closed));
	}

	#[tokio::test]
	async fn recv_wakes_on_send() {
		let (tx, rx) = Mailbox::backpressure(4);
		let task = tokio::spawn(async move { rx.recv().await });
		tokio::task::yield_now().await;
		tx.try_send(7u32).unwrap();
		assert_eq!(tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap(), Some(7));
	}

	#[tokio::test]
	async fn send_after_close_fails() {
		let (tx, rx) = Mailbox::backpressure::<u32>(4);
		tx.close();
		assert!(tx.is_closed());
		assert_eq!(tx.send(1).await, Err(MailboxSendError::Closed));
		assert_eq!(rx.recv().await, None);
	}
}
