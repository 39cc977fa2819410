// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Bridge from a script VM's platform task-runner contract onto a role.
//!
//! A VM hands its foreground work to a task runner it does not own. The
//! [`TaskRunnerAdapter`] forwards that work into the [`Dispatcher`] queue of
//! the role hosting the VM, and keeps the VM's idle tasks in a queue of its
//! own that the role's pump drains between native rounds through
//! [`ExternalRunner`].

use std::{
	collections::VecDeque,
	panic::{self, AssertUnwindSafe},
	mem,
	sync::{Arc, Weak},
	time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::warn;

use crate::{
	dispatcher::Dispatcher,
	error::DispatchError,
	pump::{ExternalRunner, Flow},
	role::Role,
	task::Action,
};

/// Idle work; receives the deadline it should finish by.
pub type IdleAction = Box<dyn FnOnce(Instant) + Send + 'static>;

/// The task-runner interface a VM expects from its embedder.
///
/// Posting never fails from the VM's point of view: work posted after the
/// hosting role shut down is dropped and logged.
pub trait TaskRunner: Send + Sync {
	fn post_task(&self, task: Action);

	/// Our pumps never nest, so this is the same as `post_task`.
	fn post_non_nestable_task(&self, task: Action);

	fn post_delayed_task(&self, task: Action, delay: Duration);

	fn post_idle_task(&self, task: IdleAction);

	fn idle_tasks_enabled(&self) -> bool;

	fn non_nestable_tasks_enabled(&self) -> bool;
}

#[derive(Default)]
struct IdleQueue {
	tasks: VecDeque<IdleAction>,
	closed: bool,
}

/// [`TaskRunner`] for a VM living on `role`.
///
/// Idle tasks still queued when the role shuts down are dropped and counted
/// in the role's `dropped` stat.
#[derive(Clone)]
pub struct TaskRunnerAdapter {
	dispatcher: Dispatcher,
	role: Role,
	idle: Arc<Mutex<IdleQueue>>,
	idle_slice: Duration,
}

impl TaskRunnerAdapter {
	/// Default time granted to each idle task.
	pub const DEFAULT_IDLE_SLICE: Duration = Duration::from_millis(16);

	pub fn new(dispatcher: Dispatcher, role: Role) -> Self {
		let idle = Arc::new(Mutex::new(IdleQueue::default()));
		// Weak: queued idle tasks may hold the dispatcher.
		let hook_idle = Arc::downgrade(&idle);
		dispatcher.on_shutdown(role, move || close_idle(&hook_idle, role));

		Self {
			dispatcher,
			role,
			idle,
			idle_slice: Self::DEFAULT_IDLE_SLICE,
		}
	}

	pub fn idle_slice(mut self, slice: Duration) -> Self {
		self.idle_slice = slice;
		self
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn pending_idle(&self) -> usize {
		self.idle.lock().tasks.len()
	}

	fn dropped(&self, err: DispatchError) {
		warn!(role = %self.role, error = %err, "vm task dropped");
	}
}

impl TaskRunner for TaskRunnerAdapter {
	fn post_task(&self, task: Action) {
		if let Err(err) = self.dispatcher.post_async(self.role, task) {
			self.dropped(err);
		}
	}

	fn post_non_nestable_task(&self, task: Action) {
		self.post_task(task);
	}

	fn post_delayed_task(&self, task: Action, delay: Duration) {
		if let Err(err) = self.dispatcher.post_delayed(self.role, delay, task) {
			self.dropped(err);
		}
	}

	fn post_idle_task(&self, task: IdleAction) {
		{
			// The shutdown hook needs this lock, so a role seen open here
			// has not dropped the idle queue yet and will drop this task too.
			let mut idle = self.idle.lock();
			if idle.closed || self.dispatcher.is_shut_down(self.role) {
				drop(idle);
				self.dispatcher.record_dropped(self.role, 1);
				self.dropped(DispatchError::TargetUnavailable {
					role: self.role,
				});
				return;
			}
			idle.tasks.push_back(task);
		}
		self.dispatcher.request_wake(self.role);
	}

	fn idle_tasks_enabled(&self) -> bool {
		!self.dispatcher.is_shut_down(self.role)
	}

	fn non_nestable_tasks_enabled(&self) -> bool {
		true
	}
}

impl ExternalRunner for TaskRunnerAdapter {
	fn run_once(&mut self) -> Flow {
		let Some(task) = self.idle.lock().tasks.pop_front() else {
			return Flow::Park;
		};

		let deadline = Instant::now() + self.idle_slice;
		if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(deadline))) {
			let err = DispatchError::from_panic(self.role, payload);
			warn!(role = %self.role, error = %err, "idle task failed");
		}

		if self.idle.lock().tasks.is_empty() {
			Flow::Park
		} else {
			Flow::Continue
		}
	}
}

/// Close the idle queue of a role that shut down and drop what it held.
fn close_idle(idle: &Weak<Mutex<IdleQueue>>, role: Role) -> usize {
	let Some(idle) = idle.upgrade() else {
		return 0;
	};
	let tasks = {
		let mut idle = idle.lock();
		idle.closed = true;
		mem::take(&mut idle.tasks)
	};
	if !tasks.is_empty() {
		warn!(role = %role, tasks = tasks.len(), "idle tasks dropped on shutdown");
	}
	tasks.len()
}
