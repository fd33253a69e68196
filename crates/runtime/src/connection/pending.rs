//! Correlation table: request id → completion handle.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;

use hass_protocol::{InboundFrame, ReplyKind};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// Why a pending request was settled without a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
	/// The transport dropped.
	Lost,
	/// The session was closed.
	Closed,
}

/// Outcome delivered to a waiting request.
pub type Reply = std::result::Result<InboundFrame, Disconnect>;

struct PendingEntry {
	/// Registration serial, so a stale guard never evicts a newer entry under the same id.
	serial: u64,
	expects: ReplyKind,
	created: Instant,
	tx: oneshot::Sender<Reply>,
}

type EntryMap = Arc<Mutex<HashMap<u64, PendingEntry>>>;

/// Outstanding requests keyed by correlation id.
///
/// Each entry is settled exactly once: by [`resolve`](Self::resolve), by
/// [`fail_all`](Self::fail_all), or removed when its [`ReplyFuture`] is dropped.
#[derive(Default)]
pub struct PendingRequests {
	entries: EntryMap,
	serial: AtomicU64,
}

impl PendingRequests {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a completion handle for `id`.
	///
	/// Fails with [`Error::DuplicateId`] while another registration for `id`
	/// is outstanding.
	pub fn register(&self, id: u64, expects: ReplyKind) -> Result<ReplyFuture> {
		let serial = self.serial.fetch_add(1, Ordering::Relaxed);
		let (tx, rx) = oneshot::channel();

		{
			let mut entries = self.entries.lock();
			if entries.contains_key(&id) {
				return Err(Error::DuplicateId(id));
			}
			entries.insert(
				id,
				PendingEntry {
					serial,
					expects,
					created: Instant::now(),
					tx,
				},
			);
		}

		Ok(ReplyFuture {
			rx,
			guard: CancelGuard {
				id,
				serial,
				entries: Arc::clone(&self.entries),
				completed: false,
			},
		})
	}

	/// Settles the request `id` with `frame`.
	///
	/// Returns false when nothing is waiting for `id` (late or duplicate
	/// reply); the frame is dropped.
	pub fn resolve(&self, id: u64, frame: InboundFrame) -> bool {
		let Some(entry) = self.entries.lock().remove(&id) else {
			tracing::debug!(id, kind = frame.type_name(), "Reply for unknown request dropped");
			return false;
		};

		if !entry.expects.accepts(&frame) {
			tracing::debug!(
				id,
				expected = ?entry.expects,
				got = frame.type_name(),
				"Reply type differs from the expected one"
			);
		}
		tracing::trace!(
			id,
			elapsed_ms = entry.created.elapsed().as_millis() as u64,
			"Request settled"
		);
		// Waiter may have given up already
		let _ = entry.tx.send(Ok(frame));
		true
	}

	/// Settles every outstanding request with `reason`. Returns how many were failed.
	pub fn fail_all(&self, reason: Disconnect) -> usize {
		let drained: Vec<PendingEntry> = {
			let mut entries = self.entries.lock();
			entries.drain().map(|(_, entry)| entry).collect()
		};
		let count = drained.len();
		for entry in drained {
			let _ = entry.tx.send(Err(reason));
		}
		count
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	pub fn contains(&self, id: u64) -> bool {
		self.entries.lock().contains_key(&id)
	}
}

/// Removes the entry when its future is dropped before settling.
struct CancelGuard {
	id: u64,
	serial: u64,
	entries: EntryMap,
	completed: bool,
}

impl Drop for CancelGuard {
	fn drop(&mut self) {
		if self.completed {
			return;
		}

		let mut entries = self.entries.lock();
		if entries.get(&self.id).is_some_and(|entry| entry.serial == self.serial) {
			entries.remove(&self.id);
			tracing::debug!(id = self.id, "CancelGuard: removed abandoned request");
		}
	}
}

/// Completion handle returned by [`PendingRequests::register`].
pub struct ReplyFuture {
	rx: oneshot::Receiver<Reply>,
	guard: CancelGuard,
}

impl ReplyFuture {
	/// Correlation id this future waits on.
	pub fn id(&self) -> u64 {
		self.guard.id
	}
}

impl Future for ReplyFuture {
	type Output = Reply;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.rx).poll(cx) {
			Poll::Ready(result) => {
				self.guard.completed = true;
				// Sender dropped without settling: the table itself went away
				Poll::Ready(result.unwrap_or(Err(Disconnect::Closed)))
			}
			Poll::Pending => Poll::Pending,
		}
	}
}
