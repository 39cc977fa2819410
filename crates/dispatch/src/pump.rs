// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-thread event-loop integration.
//!
//! A [`LoopPump`] lives on the thread owning its role and is the only place
//! that role's tasks execute. Hosts either hand the thread to [`LoopPump::run`]
//! or call [`LoopPump::run_on_wake`] from their own native loop whenever the
//! role's [`Wake`](crate::Wake) fires.

use std::{
	marker::PhantomData,
	time::{Duration, Instant},
};

use tracing::{debug, trace};

use crate::{dispatcher::Dispatcher, error::Result, role::Role};

/// What an external runner wants after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	/// Ran a unit of work and has more queued.
	Continue,

	/// Ran a unit of work; give the native queue a turn before asking again.
	Yield,

	/// Nothing to do. The pump may sleep until woken.
	Park,

	/// The runner is finished; the pump leaves the external loop.
	Stop,
}

/// A foreign task source sharing the thread with the native queue, such as
/// a script VM's own foreground task queue.
pub trait ExternalRunner {
	/// Run at most one unit of foreign work.
	fn run_once(&mut self) -> Flow;
}

/// Counters for one pump round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PumpStats {
	pub executed: usize,
	pub failed: usize,
}

/// Drains one role's queue on the role's own thread.
///
/// Neither `Send` nor `Sync`: a pump is created by, and only used from, the
/// thread it serves.
pub struct LoopPump {
	dispatcher: Dispatcher,
	role: Role,
	_thread_bound: PhantomData<*const ()>,
}

impl LoopPump {
	/// Bind the calling thread to `role` and return its pump.
	pub fn attach(dispatcher: Dispatcher, role: Role) -> Result<Self> {
		dispatcher.bind_current(role)?;
		Ok(Self {
			dispatcher,
			role,
			_thread_bound: PhantomData,
		})
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.dispatcher
	}

	/// Run everything that is ready: queued tasks in FIFO order, then delayed
	/// tasks whose due time has passed.
	///
	/// Each task runs outside the queue lock, so tasks may post again; those
	/// posts are picked up by the next round. A failing task is logged and
	/// does not stop the round. Synchronous callers are released as soon as
	/// their own task finishes.
	pub fn run_on_wake(&self) -> PumpStats {
		let queue = self.dispatcher.queue(self.role);
		let mut tasks = queue.drain_all();
		tasks.extend(queue.drain_due(Instant::now()));

		let mut stats = PumpStats::default();
		if tasks.is_empty() {
			return stats;
		}

		trace!(role = %self.role, tasks = tasks.len(), "pump round");
		for task in tasks {
			stats.executed += 1;
			if !self.dispatcher.execute(task) {
				stats.failed += 1;
			}
		}
		stats
	}

	/// Sleep until woken, the next delayed task falls due, or the idle cap
	/// passes. Returns immediately if work is already ready.
	pub fn wait_for_work(&self) -> bool {
		let queue = self.dispatcher.queue(self.role);
		let now = Instant::now();
		let next_due = queue.next_due();
		if queue.has_ready() || next_due.is_some_and(|due| due <= now) {
			return true;
		}
		self.dispatcher.wake(self.role).wait_for_wake(Some(self.idle_timeout(next_due, now)))
	}

	/// Run the role's loop until the role is shut down.
	pub fn run(&self) {
		debug!(role = %self.role, "pump started");
		loop {
			self.run_on_wake();
			if self.dispatcher.is_shut_down(self.role) {
				break;
			}
			self.wait_for_work();
		}
		debug!(role = %self.role, "pump stopped");
	}

	/// Interleave the native queue with an external runner until the role is
	/// shut down or the runner stops.
	///
	/// Each round drains the native queue completely, then gives the runner
	/// [`DispatcherConfig::external_budget`](crate::DispatcherConfig::external_budget)
	/// iterations. Neither source can starve the other.
	pub fn pump_external_loop(&self, runner: &mut dyn ExternalRunner) {
		let budget = self.dispatcher.config().external_budget.max(1);
		debug!(role = %self.role, budget, "external pump started");
		loop {
			self.run_on_wake();
			if self.dispatcher.is_shut_down(self.role) {
				break;
			}

			let mut parked = false;
			for _ in 0..budget {
				match runner.run_once() {
					Flow::Continue => {}
					Flow::Yield => break,
					Flow::Park => {
						parked = true;
						break;
					}
					Flow::Stop => {
						debug!(role = %self.role, "external runner stopped");
						return;
					}
				}
			}

			if parked {
				self.wait_for_work();
			}
		}
		debug!(role = %self.role, "external pump stopped");
	}

	fn idle_timeout(&self, next_due: Option<Instant>, now: Instant) -> Duration {
		let cap = self.dispatcher.config().max_idle_wait;
		match next_due {
			Some(due) => due.saturating_duration_since(now).min(cap),
			None => cap,
		}
	}
}
