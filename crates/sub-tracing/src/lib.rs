// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Process-wide `tracing` subscriber for hostbridge hosts.

pub mod builder;
pub mod error;
pub mod factory;
pub mod subsystem;

pub use builder::TracingBuilder;
pub use error::TracingError;
pub use factory::{TracingConfigurator, TracingSubsystemFactory};
pub use subsystem::{DEFAULT_FILTER, TracingSubsystem};
