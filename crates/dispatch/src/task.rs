// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The unit of work moved between threads.

use std::{
	fmt,
	panic::{self, AssertUnwindSafe},
	time::Instant,
};

use crate::{error::DispatchError, role::Role};

/// Type-erased work closure. Owns everything it captured.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// A unit of work destined for the thread owning `target`.
///
/// A task is consumed by [`Task::run`], so it executes at most once.
pub struct Task {
	action: Action,
	origin: Option<Role>,
	target: Role,
	due: Option<Instant>,
	seq: u64,
}

impl Task {
	pub fn new<F>(target: Role, action: F) -> Self
	where
		F: FnOnce() + Send + 'static,
	{
		Self {
			action: Box::new(action),
			origin: None,
			target,
			due: None,
			seq: 0,
		}
	}

	pub fn with_origin(mut self, origin: Option<Role>) -> Self {
		self.origin = origin;
		self
	}

	pub fn with_due(mut self, due: Instant) -> Self {
		self.due = Some(due);
		self
	}

	pub(crate) fn with_seq(mut self, seq: u64) -> Self {
		self.seq = seq;
		self
	}

	/// The role of the thread that posted this task, if it was a bound thread.
	pub fn origin(&self) -> Option<Role> {
		self.origin
	}

	pub fn target(&self) -> Role {
		self.target
	}

	/// When the task becomes eligible to run. `None` means ready now.
	pub fn due(&self) -> Option<Instant> {
		self.due
	}

	/// Arrival order assigned by the dispatcher.
	pub fn seq(&self) -> u64 {
		self.seq
	}

	/// Invoke the action, isolating a panic into [`DispatchError::TaskFailed`].
	pub fn run(self) -> Result<(), DispatchError> {
		let target = self.target;
		panic::catch_unwind(AssertUnwindSafe(self.action)).map_err(|payload| DispatchError::from_panic(target, payload))
	}
}

impl fmt::Debug for Task {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Task")
			.field("origin", &self.origin)
			.field("target", &self.target)
			.field("due", &self.due)
			.field("seq", &self.seq)
			.finish()
	}
}
