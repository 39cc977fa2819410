// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Wake primitives used to nudge a role's thread out of its idle wait.
//!
//! A host plugs in whatever its native loop understands: a posted window
//! message, a pipe write, a condition variable. Two portable implementations
//! are provided:
//! - [`CondvarWake`]: a latched flag guarded by a condition variable
//! - [`ChannelWake`]: a bounded(1) channel, the moral equivalent of a
//!   self-pipe or a custom window message

use std::{
	fmt,
	time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::{Condvar, Mutex};

/// Platform wake primitive for one role.
///
/// Wakes are latched: a wake requested while the thread is not waiting is
/// observed by its next wait. Multiple pending requests collapse into one.
pub trait Wake: Send + Sync {
	/// Ask the owning thread to run its pump. Callable from any thread.
	fn request_wake(&self);

	/// Block the owning thread until woken or until `timeout` elapses.
	///
	/// Returns `true` if a wake was consumed, `false` on timeout.
	fn wait_for_wake(&self, timeout: Option<Duration>) -> bool;
}

/// Condition-variable backed wake.
#[derive(Default)]
pub struct CondvarWake {
	pending: Mutex<bool>,
	cond: Condvar,
}

impl CondvarWake {
	pub fn new() -> Self {
		Self::default()
	}
}

impl Wake for CondvarWake {
	fn request_wake(&self) {
		let mut pending = self.pending.lock();
		*pending = true;
		self.cond.notify_one();
	}

	fn wait_for_wake(&self, timeout: Option<Duration>) -> bool {
		let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
		let mut pending = self.pending.lock();
		while !*pending {
			match deadline {
				Some(deadline) => {
					if self.cond.wait_until(&mut pending, deadline).timed_out() {
						break;
					}
				}
				None => self.cond.wait(&mut pending),
			}
		}
		let woken = *pending;
		*pending = false;
		woken
	}
}

impl fmt::Debug for CondvarWake {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CondvarWake").field("pending", &*self.pending.lock()).finish()
	}
}

/// Channel backed wake. At most one wake message is ever in flight.
#[derive(Debug)]
pub struct ChannelWake {
	tx: Sender<()>,
	rx: Receiver<()>,
}

impl ChannelWake {
	pub fn new() -> Self {
		let (tx, rx) = bounded(1);
		Self {
			tx,
			rx,
		}
	}
}

impl Default for ChannelWake {
	fn default() -> Self {
		Self::new()
	}
}

impl Wake for ChannelWake {
	fn request_wake(&self) {
		// Full means a wake is already in flight.
		let _ = self.tx.try_send(());
	}

	fn wait_for_wake(&self, timeout: Option<Duration>) -> bool {
		match timeout {
			Some(timeout) => match self.rx.recv_timeout(timeout) {
				Ok(()) => true,
				Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
			},
			None => self.rx.recv().is_ok(),
		}
	}
}
