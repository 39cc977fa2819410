// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::subsystem::TracingSubsystem;

/// Builder for configuring the tracing subsystem
#[derive(Debug, Clone)]
pub struct TracingBuilder {
	filter: Option<String>,
	json: bool,
	ansi: bool,
	thread_names: bool,
	target: bool,
}

impl Default for TracingBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl TracingBuilder {
	pub fn new() -> Self {
		Self {
			filter: None,
			json: false,
			ansi: true,
			thread_names: true,
			target: false,
		}
	}

	/// Use `filter` instead of `RUST_LOG`.
	///
	/// Accepts the `EnvFilter` directive syntax, e.g. `info,hostbridge_dispatch=trace`.
	pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
		self.filter = Some(filter.into());
		self
	}

	/// Emit one JSON object per event
	pub fn json(mut self, enabled: bool) -> Self {
		self.json = enabled;
		self
	}

	pub fn ansi(mut self, enabled: bool) -> Self {
		self.ansi = enabled;
		self
	}

	/// Include the thread name in every line. On by default since the role
	/// threads are named after their role.
	pub fn thread_names(mut self, enabled: bool) -> Self {
		self.thread_names = enabled;
		self
	}

	pub fn target(mut self, enabled: bool) -> Self {
		self.target = enabled;
		self
	}

	pub fn build(self) -> TracingSubsystem {
		TracingSubsystem::new(self.filter, self.json, self.ansi, self.thread_names, self.target)
	}
}
