// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Tracing subsystem implementation

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::TracingError;

/// Directives used when neither an explicit filter nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the process-wide `tracing` subscriber
pub struct TracingSubsystem {
	filter: Option<String>,
	json: bool,
	ansi: bool,
	thread_names: bool,
	target: bool,
	running: AtomicBool,
}

impl TracingSubsystem {
	pub(crate) fn new(filter: Option<String>, json: bool, ansi: bool, thread_names: bool, target: bool) -> Self {
		Self {
			filter,
			json,
			ansi,
			thread_names,
			target,
			running: AtomicBool::new(false),
		}
	}

	pub fn filter(&self) -> Option<&str> {
		self.filter.as_deref()
	}

	pub fn is_json(&self) -> bool {
		self.json
	}

	pub fn is_running(&self) -> bool {
		self.running.load(Ordering::Acquire)
	}

	/// Resolve the filter: the explicit one, else `RUST_LOG`, else [`DEFAULT_FILTER`].
	pub fn env_filter(&self) -> Result<EnvFilter, TracingError> {
		match &self.filter {
			Some(filter) => EnvFilter::try_new(filter).map_err(|err| TracingError::InvalidFilter {
				filter: filter.clone(),
				reason: err.to_string(),
			}),
			None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
		}
	}

	/// Install the subscriber globally. Fails if one is already installed.
	pub fn start(&self) -> Result<(), TracingError> {
		if self.running.load(Ordering::Acquire) {
			return Ok(());
		}

		let filter = self.env_filter()?;
		let layer = fmt::layer().with_ansi(self.ansi).with_thread_names(self.thread_names).with_target(self.target);
		let installed = if self.json {
			tracing_subscriber::registry().with(filter).with(layer.json()).try_init()
		} else {
			tracing_subscriber::registry().with(filter).with(layer).try_init()
		};
		installed.map_err(|_| TracingError::AlreadyInitialized)?;

		self.running.store(true, Ordering::Release);
		debug!(json = self.json, "tracing subsystem started");
		Ok(())
	}
}
