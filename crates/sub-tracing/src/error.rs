// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TracingError {
	#[error("invalid log filter `{filter}`: {reason}")]
	InvalidFilter {
		filter: String,
		reason: String,
	},

	#[error("a global tracing subscriber is already installed")]
	AlreadyInitialized,
}
