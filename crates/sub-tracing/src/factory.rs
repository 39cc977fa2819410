// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::{builder::TracingBuilder, subsystem::TracingSubsystem};

/// Configuration function for the tracing subsystem
pub type TracingConfigurator = Box<dyn FnOnce(TracingBuilder) -> TracingBuilder + Send>;

/// Creates a [`TracingSubsystem`], optionally adjusting the builder first.
///
/// Lets a host collect its logging settings early (e.g. while parsing the
/// command line) and install the subscriber later.
pub struct TracingSubsystemFactory {
	configurator: Option<TracingConfigurator>,
}

impl TracingSubsystemFactory {
	pub fn new() -> Self {
		Self {
			configurator: None,
		}
	}

	pub fn with_configurator<F>(configurator: F) -> Self
	where
		F: FnOnce(TracingBuilder) -> TracingBuilder + Send + 'static,
	{
		Self {
			configurator: Some(Box::new(configurator)),
		}
	}

	pub fn create(self) -> TracingSubsystem {
		match self.configurator {
			Some(configurator) => configurator(TracingBuilder::new()),
			None => TracingBuilder::default(),
		}
		.build()
	}
}

impl Default for TracingSubsystemFactory {
	fn default() -> Self {
		Self::new()
	}
}
