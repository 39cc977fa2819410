// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::time::Duration;

/// What [`Dispatcher::shutdown`](crate::Dispatcher::shutdown) does with work
/// that is still queued for the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
	/// Drop every queued task. Synchronous callers receive
	/// [`DispatchError::TargetUnavailable`](crate::DispatchError::TargetUnavailable).
	#[default]
	Discard,
	/// Run the ready tasks before closing when shutdown is called on the
	/// owning thread; delayed tasks are dropped. From any other thread this
	/// behaves like `Discard`.
	Drain,
}

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
	/// Default wait for `post_sync`. `None` waits until the task completes
	/// or the role shuts down.
	///
	/// Default: None
	pub sync_timeout: Option<Duration>,

	/// Default: [`ShutdownPolicy::Discard`]
	pub shutdown_policy: ShutdownPolicy,

	/// Panic instead of returning `UnboundRole` when posting to a role that
	/// has no thread.
	///
	/// Default: enabled in debug builds
	pub panic_on_unbound: bool,

	/// External runner iterations per round of `pump_external_loop`.
	///
	/// Default: 1
	pub external_budget: usize,

	/// Longest idle wait of a pump with nothing scheduled.
	///
	/// Default: 100ms
	pub max_idle_wait: Duration,
}

impl Default for DispatcherConfig {
	fn default() -> Self {
		Self {
			sync_timeout: None,
			shutdown_policy: ShutdownPolicy::Discard,
			panic_on_unbound: cfg!(debug_assertions),
			external_budget: 1,
			max_idle_wait: Duration::from_millis(100),
		}
	}
}

impl DispatcherConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn sync_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.sync_timeout = timeout;
		self
	}

	pub fn shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
		self.shutdown_policy = policy;
		self
	}

	pub fn panic_on_unbound(mut self, enabled: bool) -> Self {
		self.panic_on_unbound = enabled;
		self
	}

	/// Clamped to at least one iteration.
	pub fn external_budget(mut self, budget: usize) -> Self {
		self.external_budget = budget.max(1);
		self
	}

	pub fn max_idle_wait(mut self, wait: Duration) -> Self {
		self.max_idle_wait = wait;
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = DispatcherConfig::default();
		assert_eq!(config.sync_timeout, None);
		assert_eq!(config.shutdown_policy, ShutdownPolicy::Discard);
		assert_eq!(config.panic_on_unbound, cfg!(debug_assertions));
		assert_eq!(config.external_budget, 1);
	}

	#[test]
	fn test_builder_setters() {
		let config = DispatcherConfig::new()
			.sync_timeout(Some(Duration::from_secs(1)))
			.shutdown_policy(ShutdownPolicy::Drain)
			.panic_on_unbound(false)
			.external_budget(0)
			.max_idle_wait(Duration::from_millis(5));

		assert_eq!(config.sync_timeout, Some(Duration::from_secs(1)));
		assert_eq!(config.shutdown_policy, ShutdownPolicy::Drain);
		assert!(!config.panic_on_unbound);
		assert_eq!(config.external_budget, 1);
		assert_eq!(config.max_idle_wait, Duration::from_millis(5));
	}
}
