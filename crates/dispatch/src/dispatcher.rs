// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! The cross-thread dispatch façade.
//!
//! Producers post closures to a [`Role`]; the thread owning that role runs
//! them from its [`LoopPump`](crate::LoopPump). The dispatcher never runs a
//! task on the posting thread, except for `post_sync` issued by the owning
//! thread itself, which runs inline.

use std::{
	panic::{self, AssertUnwindSafe},
	mem,
	sync::{
		Arc,
		atomic::{AtomicU64, Ordering},
	},
	time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use crate::{
	completion::completion,
	config::{DispatcherConfig, ShutdownPolicy},
	error::{DispatchError, Result},
	queue::CrossThreadQueue,
	registry::ThreadRegistry,
	role::{Role, RoleTable},
	task::Task,
	wake::{CondvarWake, Wake},
};

/// Delays are clamped so the due time cannot overflow.
const MAX_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Default)]
struct Counters {
	posted: AtomicU64,
	executed: AtomicU64,
	failed: AtomicU64,
	dropped: AtomicU64,
}

/// Snapshot of the per-role counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchStats {
	/// Tasks accepted into the queue.
	pub posted: u64,
	/// Tasks run, including the ones that failed.
	pub executed: u64,
	/// Tasks that panicked.
	pub failed: u64,
	/// Tasks rejected after shutdown or discarded by it.
	pub dropped: u64,
}

/// Runs once when its role shuts down; returns how many tasks it discarded.
type ShutdownHook = Box<dyn FnOnce() -> usize + Send + 'static>;

struct Lane {
	queue: CrossThreadQueue,
	wake: Arc<dyn Wake>,
	counters: Arc<Counters>,
	shutdown_hooks: Mutex<Vec<ShutdownHook>>,
}

struct Inner {
	registry: ThreadRegistry,
	lanes: RoleTable<Lane>,
	/// `waiting[a] == Some(b)`: the thread owning `a` is blocked in a
	/// synchronous call to `b`.
	waiting: Mutex<RoleTable<Option<Role>>>,
	config: DispatcherConfig,
	seq: AtomicU64,
}

/// Handle to the process-wide dispatcher.
///
/// Cloning creates another reference to the same dispatcher. The host
/// constructs exactly one and hands clones to whatever needs to post.
#[derive(Clone)]
pub struct Dispatcher {
	inner: Arc<Inner>,
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
	config: DispatcherConfig,
	wakes: RoleTable<Option<Arc<dyn Wake>>>,
}

impl DispatcherBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn config(mut self, config: DispatcherConfig) -> Self {
		self.config = config;
		self
	}

	/// Use a host-specific wake primitive for `role`. Roles without one get
	/// a [`CondvarWake`].
	pub fn wake(mut self, role: Role, wake: Arc<dyn Wake>) -> Self {
		self.wakes[role] = Some(wake);
		self
	}

	pub fn build(mut self) -> Dispatcher {
		let lanes = RoleTable::from_fn(|role| Lane {
			queue: CrossThreadQueue::new(role),
			wake: self.wakes[role].take().unwrap_or_else(|| Arc::new(CondvarWake::new())),
			counters: Arc::new(Counters::default()),
			shutdown_hooks: Mutex::new(Vec::new()),
		});

		Dispatcher {
			inner: Arc::new(Inner {
				registry: ThreadRegistry::new(),
				lanes,
				waiting: Mutex::new(RoleTable::default()),
				config: self.config,
				seq: AtomicU64::new(0),
			}),
		}
	}
}

impl Default for Dispatcher {
	fn default() -> Self {
		Self::new(DispatcherConfig::default())
	}
}

impl Dispatcher {
	pub fn new(config: DispatcherConfig) -> Self {
		DispatcherBuilder::new().config(config).build()
	}

	pub fn builder() -> DispatcherBuilder {
		DispatcherBuilder::new()
	}

	pub fn config(&self) -> &DispatcherConfig {
		&self.inner.config
	}

	pub fn registry(&self) -> &ThreadRegistry {
		&self.inner.registry
	}

	/// Bind `role` to the calling thread. Called once by each host thread at
	/// startup.
	pub fn bind_current(&self, role: Role) -> Result<()> {
		self.inner.registry.bind_current(role).inspect_err(|err| error!(role = %role, error = %err, "failed to bind role"))
	}

	/// Queue `f` to run on the thread owning `role`, after everything already
	/// queued for it.
	///
	/// Posting from the owning thread still queues, so ordering relative to
	/// earlier posts is preserved.
	pub fn post_async<F>(&self, role: Role, f: F) -> Result<()>
	where
		F: FnOnce() + Send + 'static,
	{
		self.check_bound(role)?;
		let task = self.task(role, f);
		self.enqueue(task)
	}

	/// Queue `f` to run on the thread owning `role` once `delay` has passed.
	///
	/// Delayed tasks run in due-time order, ties broken by arrival.
	pub fn post_delayed<F>(&self, role: Role, delay: Duration, f: F) -> Result<()>
	where
		F: FnOnce() + Send + 'static,
	{
		if delay.is_zero() {
			return self.post_async(role, f);
		}
		self.check_bound(role)?;

		let due = Instant::now() + delay.min(MAX_DELAY);
		let task = self.task(role, f).with_due(due);
		let lane = &self.inner.lanes[role];
		match lane.queue.push_delayed(task) {
			Ok(earliest) => {
				lane.counters.posted.fetch_add(1, Ordering::Relaxed);
				if earliest {
					// The owning thread may be sleeping towards a later deadline.
					lane.wake.request_wake();
				}
				Ok(())
			}
			Err(err) => Err(self.rejected(role, err)),
		}
	}

	/// Run `f` on the thread owning `role` and return its result, waiting at
	/// most the configured [`DispatcherConfig::sync_timeout`].
	pub fn post_sync<T, F>(&self, role: Role, f: F) -> Result<T>
	where
		T: Send + 'static,
		F: FnOnce() -> T + Send + 'static,
	{
		self.post_sync_with(role, self.inner.config.sync_timeout, f)
	}

	/// Like [`post_sync`](Self::post_sync) with an explicit timeout.
	///
	/// A timed out call does not cancel the task; it still runs later and its
	/// result is discarded. Treat [`DispatchError::Timeout`] as an unknown
	/// outcome.
	pub fn post_sync_timeout<T, F>(&self, role: Role, timeout: Duration, f: F) -> Result<T>
	where
		T: Send + 'static,
		F: FnOnce() -> T + Send + 'static,
	{
		self.post_sync_with(role, Some(timeout), f)
	}

	fn post_sync_with<T, F>(&self, role: Role, timeout: Option<Duration>, f: F) -> Result<T>
	where
		T: Send + 'static,
		F: FnOnce() -> T + Send + 'static,
	{
		self.check_bound(role)?;
		let lane = &self.inner.lanes[role];

		if self.inner.registry.is_current_thread(role) {
			if lane.queue.is_closed() {
				return Err(DispatchError::TargetUnavailable {
					role,
				});
			}
			trace!(role = %role, "running synchronous task inline");
			lane.counters.executed.fetch_add(1, Ordering::Relaxed);
			return run_isolated(role, &lane.counters, f);
		}

		let origin = self.inner.registry.current_role();
		let _waiting = match origin {
			Some(origin) => Some(self.enter_wait(origin, role)?),
			None => None,
		};

		let (signal, waiter) = completion(role);
		let counters = Arc::clone(&lane.counters);
		let task = self.task(role, move || {
			signal.signal(run_isolated(role, &counters, f));
		});
		self.enqueue(task)?;

		waiter.wait(timeout).inspect_err(|err| {
			if matches!(err, DispatchError::Timeout { .. }) {
				debug!(role = %role, error = %err, "synchronous call abandoned");
			}
		})
	}

	/// Close `role`: later posts fail with [`DispatchError::TargetUnavailable`]
	/// and queued work is handled per [`DispatcherConfig::shutdown_policy`].
	///
	/// Blocked synchronous callers whose task is discarded are released with
	/// `TargetUnavailable`. A task the pump already took off the queue still
	/// completes. Returns the number of discarded tasks.
	pub fn shutdown(&self, role: Role) -> Result<usize> {
		let lane = &self.inner.lanes[role];
		let on_owner = self.inner.registry.is_current_thread(role);
		let (ready, delayed) = lane.queue.close();

		let mut dropped = delayed.len();
		match self.inner.config.shutdown_policy {
			ShutdownPolicy::Drain if on_owner => {
				debug!(role = %role, tasks = ready.len(), "draining before shutdown");
				for task in ready {
					self.execute(task);
				}
			}
			ShutdownPolicy::Drain | ShutdownPolicy::Discard => dropped += ready.len(),
		}

		// Hooks run outside the lock; they may post, which now fails fast.
		let hooks = mem::take(&mut *lane.shutdown_hooks.lock());
		for hook in hooks {
			dropped += hook();
		}
		lane.counters.dropped.fetch_add(dropped as u64, Ordering::Relaxed);

		// Dropping the tasks releases their completion signals.
		drop(delayed);
		lane.wake.request_wake();

		debug!(role = %role, dropped, "role shut down");
		Ok(dropped)
	}

	/// Run `hook` when `role` shuts down, after its queue closed. Work held
	/// outside the dispatcher queue, such as a VM's idle tasks, is released
	/// this way. The returned count is added to the discarded total.
	///
	/// A hook registered after the role shut down is dropped unrun.
	pub fn on_shutdown<F>(&self, role: Role, hook: F)
	where
		F: FnOnce() -> usize + Send + 'static,
	{
		let lane = &self.inner.lanes[role];
		let mut hooks = lane.shutdown_hooks.lock();
		if !lane.queue.is_closed() {
			hooks.push(Box::new(hook));
		}
	}

	pub fn is_shut_down(&self, role: Role) -> bool {
		self.inner.lanes[role].queue.is_closed()
	}

	/// Number of queued tasks, ready and delayed.
	pub fn pending(&self, role: Role) -> usize {
		self.inner.lanes[role].queue.len()
	}

	pub fn stats(&self, role: Role) -> DispatchStats {
		let counters = &self.inner.lanes[role].counters;
		DispatchStats {
			posted: counters.posted.load(Ordering::Relaxed),
			executed: counters.executed.load(Ordering::Relaxed),
			failed: counters.failed.load(Ordering::Relaxed),
			dropped: counters.dropped.load(Ordering::Relaxed),
		}
	}

	/// Nudge the thread owning `role` out of its idle wait.
	pub fn request_wake(&self, role: Role) {
		self.inner.lanes[role].wake.request_wake();
	}

	/// Count work rejected outside the dispatcher queue.
	pub(crate) fn record_dropped(&self, role: Role, count: usize) {
		self.inner.lanes[role].counters.dropped.fetch_add(count as u64, Ordering::Relaxed);
	}

	pub(crate) fn queue(&self, role: Role) -> &CrossThreadQueue {
		&self.inner.lanes[role].queue
	}

	pub(crate) fn wake(&self, role: Role) -> &Arc<dyn Wake> {
		&self.inner.lanes[role].wake
	}

	/// Run one task on the current thread. Returns `false` if it failed.
	pub(crate) fn execute(&self, task: Task) -> bool {
		let role = task.target();
		let seq = task.seq();
		let counters = &self.inner.lanes[role].counters;
		counters.executed.fetch_add(1, Ordering::Relaxed);

		match task.run() {
			Ok(()) => {
				trace!(role = %role, seq, "task executed");
				true
			}
			Err(err) => {
				counters.failed.fetch_add(1, Ordering::Relaxed);
				warn!(role = %role, seq, error = %err, "task failed");
				false
			}
		}
	}

	fn task<F>(&self, role: Role, f: F) -> Task
	where
		F: FnOnce() + Send + 'static,
	{
		Task::new(role, f)
			.with_origin(self.inner.registry.current_role())
			.with_seq(self.inner.seq.fetch_add(1, Ordering::Relaxed))
	}

	fn enqueue(&self, task: Task) -> Result<()> {
		let role = task.target();
		let lane = &self.inner.lanes[role];
		match lane.queue.push(task) {
			Ok(was_empty) => {
				lane.counters.posted.fetch_add(1, Ordering::Relaxed);
				if was_empty {
					lane.wake.request_wake();
				}
				Ok(())
			}
			Err(err) => Err(self.rejected(role, err)),
		}
	}

	fn rejected(&self, role: Role, err: DispatchError) -> DispatchError {
		self.inner.lanes[role].counters.dropped.fetch_add(1, Ordering::Relaxed);
		warn!(role = %role, error = %err, "task dropped");
		err
	}

	fn check_bound(&self, role: Role) -> Result<()> {
		match self.inner.registry.resolve(role) {
			Ok(_) => Ok(()),
			Err(err) => {
				if self.inner.config.panic_on_unbound {
					panic!("{err}");
				}
				error!(role = %role, "post to unbound role");
				Err(err)
			}
		}
	}

	/// Record that `origin`'s thread is about to block on `target`, failing if
	/// `target` is (transitively) blocked on `origin`.
	fn enter_wait(&self, origin: Role, target: Role) -> Result<WaitingGuard<'_>> {
		let mut waiting = self.inner.waiting.lock();
		let mut cursor = Some(target);
		for _ in 0..Role::COUNT {
			let Some(role) = cursor else {
				break;
			};
			if role == origin {
				warn!(origin = %origin, target = %target, "synchronous call cycle detected");
				return Err(DispatchError::Deadlock {
					origin,
					target,
				});
			}
			cursor = waiting[role];
		}
		waiting[origin] = Some(target);
		Ok(WaitingGuard {
			dispatcher: self,
			origin,
		})
	}
}

struct WaitingGuard<'a> {
	dispatcher: &'a Dispatcher,
	origin: Role,
}

impl Drop for WaitingGuard<'_> {
	fn drop(&mut self) {
		self.dispatcher.inner.waiting.lock()[self.origin] = None;
	}
}

/// Run a synchronous task body, isolating a panic into `TaskFailed`.
fn run_isolated<T, F>(role: Role, counters: &Counters, f: F) -> Result<T>
where
	F: FnOnce() -> T,
{
	panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
		counters.failed.fetch_add(1, Ordering::Relaxed);
		let err = DispatchError::from_panic(role, payload);
		warn!(role = %role, error = %err, "synchronous task failed");
		err
	})
}
