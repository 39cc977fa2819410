// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Timer-driven wakeups that never run work on the timer's own context.
//!
//! - [`TimerBridge`]: turns timer fires into at most one queued drain task
//! - [`Heartbeat`]: a repeating fire source on a dedicated thread

use std::{
	fmt,
	sync::{
		Arc,
		atomic::{AtomicU64, AtomicUsize, Ordering},
	},
	thread::{self, JoinHandle},
	time::Duration,
};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use tracing::{debug, warn};

use crate::{dispatcher::Dispatcher, role::Role};

type FireHandler = Arc<dyn Fn(usize) + Send + Sync + 'static>;

/// Coalesces timer fires into drain tasks on a role.
///
/// Fires arriving before the role gets around to draining collapse into the
/// one drain task already queued; the handler then sees how many fires it
/// covers.
#[derive(Clone)]
pub struct TimerBridge {
	dispatcher: Dispatcher,
	role: Role,
	pending: Arc<AtomicUsize>,
	wake_requests: Arc<AtomicU64>,
	handler: FireHandler,
}

impl TimerBridge {
	pub fn new<F>(dispatcher: Dispatcher, role: Role, handler: F) -> Self
	where
		F: Fn(usize) + Send + Sync + 'static,
	{
		Self {
			dispatcher,
			role,
			pending: Arc::new(AtomicUsize::new(0)),
			wake_requests: Arc::new(AtomicU64::new(0)),
			handler: Arc::new(handler),
		}
	}

	pub fn role(&self) -> Role {
		self.role
	}

	/// Record a fire. Called from the timer context, never the role's thread.
	///
	/// Only the fire that moves the count off zero queues a drain task.
	/// Returns whether this fire queued one.
	pub fn on_fire(&self) -> bool {
		if self.pending.fetch_add(1, Ordering::AcqRel) != 0 {
			return false;
		}

		let pending = Arc::clone(&self.pending);
		let handler = Arc::clone(&self.handler);
		let posted = self.dispatcher.post_async(self.role, move || {
			// Reset before handling so a fire racing in now queues a new drain.
			let fired = pending.swap(0, Ordering::AcqRel);
			handler(fired);
		});

		match posted {
			Ok(()) => {
				self.wake_requests.fetch_add(1, Ordering::Relaxed);
				true
			}
			Err(err) => {
				self.release_fire();
				warn!(role = %self.role, error = %err, "timer fire dropped");
				false
			}
		}
	}

	/// Withdraw the fire whose drain task was rejected. Fires that raced in
	/// meanwhile stay counted.
	fn release_fire(&self) {
		self.pending.fetch_sub(1, Ordering::AcqRel);
	}

	/// Fires not yet handled by the role.
	pub fn pending_count(&self) -> usize {
		self.pending.load(Ordering::Acquire)
	}

	/// Drain tasks queued so far.
	pub fn wake_requests(&self) -> u64 {
		self.wake_requests.load(Ordering::Relaxed)
	}

	pub fn is_target_shut_down(&self) -> bool {
		self.dispatcher.is_shut_down(self.role)
	}
}

impl fmt::Debug for TimerBridge {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TimerBridge")
			.field("role", &self.role)
			.field("pending", &self.pending_count())
			.field("wake_requests", &self.wake_requests())
			.finish()
	}
}

/// Fires a [`TimerBridge`] at a fixed interval until cancelled, dropped, or
/// the bridge's role shuts down.
pub struct Heartbeat {
	stop_tx: Sender<()>,
	join_handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
	pub fn start(bridge: TimerBridge, interval: Duration) -> Self {
		let (stop_tx, stop_rx) = bounded::<()>(1);
		let name = format!("heartbeat-{}", bridge.role());

		let join_handle = thread::Builder::new()
			.name(name)
			.spawn(move || {
				debug!(role = %bridge.role(), ?interval, "heartbeat started");
				loop {
					match stop_rx.recv_timeout(interval) {
						Err(RecvTimeoutError::Timeout) => {
							bridge.on_fire();
							if bridge.is_target_shut_down() {
								debug!(role = %bridge.role(), "heartbeat target shut down");
								break;
							}
						}
						Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
					}
				}
				debug!(role = %bridge.role(), "heartbeat stopped");
			})
			.expect("failed to spawn heartbeat thread");

		Self {
			stop_tx,
			join_handle: Some(join_handle),
		}
	}

	/// Stop firing and wait for the heartbeat thread to exit.
	pub fn cancel(mut self) {
		self.stop();
	}

	fn stop(&mut self) {
		let _ = self.stop_tx.try_send(());
		if let Some(handle) = self.join_handle.take() {
			let _ = handle.join();
		}
	}
}

impl Drop for Heartbeat {
	fn drop(&mut self) {
		self.stop();
	}
}
