// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! One-shot completion handle for synchronous posts.
//!
//! The handle is split into a [`CompletionSignal`] owned by the executing
//! thread and a [`CompletionWaiter`] owned by the posting thread. Both sides
//! share the slot, so either side may go away first:
//! - a waiter that timed out leaves the signal writing into a slot nobody reads
//! - a signal dropped without being signaled (task discarded on shutdown)
//!   completes the slot with [`DispatchError::TargetUnavailable`]

use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use crate::{
	error::{DispatchError, Result},
	role::Role,
};

struct Slot<T> {
	result: Mutex<Option<Result<T>>>,
	signaled: Condvar,
}

impl<T> Slot<T> {
	fn complete(&self, result: Result<T>) {
		let mut guard = self.result.lock();
		if guard.is_none() {
			*guard = Some(result);
		}
		self.signaled.notify_all();
	}
}

/// Create a connected signal/waiter pair for a call targeting `role`.
pub fn completion<T>(role: Role) -> (CompletionSignal<T>, CompletionWaiter<T>) {
	let slot = Arc::new(Slot {
		result: Mutex::new(None),
		signaled: Condvar::new(),
	});
	(
		CompletionSignal {
			slot: Some(Arc::clone(&slot)),
			role,
		},
		CompletionWaiter {
			slot,
			role,
		},
	)
}

/// Executor side of a completion. Signaled exactly once.
pub struct CompletionSignal<T> {
	slot: Option<Arc<Slot<T>>>,
	role: Role,
}

impl<T> CompletionSignal<T> {
	pub fn signal(mut self, result: Result<T>) {
		if let Some(slot) = self.slot.take() {
			slot.complete(result);
		}
	}
}

impl<T> Drop for CompletionSignal<T> {
	fn drop(&mut self) {
		if let Some(slot) = self.slot.take() {
			slot.complete(Err(DispatchError::TargetUnavailable {
				role: self.role,
			}));
		}
	}
}

/// Caller side of a completion.
pub struct CompletionWaiter<T> {
	slot: Arc<Slot<T>>,
	role: Role,
}

impl<T> CompletionWaiter<T> {
	/// Block until signaled, or until `timeout` elapses.
	///
	/// On timeout the signal side stays valid; signaling it later is a no-op.
	pub fn wait(self, timeout: Option<Duration>) -> Result<T> {
		let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
		let mut guard = self.slot.result.lock();
		loop {
			if let Some(result) = guard.take() {
				return result;
			}
			match (deadline, timeout) {
				(Some(deadline), Some(timeout)) => {
					if self.slot.signaled.wait_until(&mut guard, deadline).timed_out() {
						return guard.take().unwrap_or(Err(DispatchError::Timeout {
							role: self.role,
							timeout,
						}));
					}
				}
				_ => self.slot.signaled.wait(&mut guard),
			}
		}
	}

	pub fn is_signaled(&self) -> bool {
		self.slot.result.lock().is_some()
	}
}
