// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{any::Any, thread::ThreadId, time::Duration};

use thiserror::Error;

use crate::role::Role;

pub type Result<T> = std::result::Result<T, DispatchError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
	#[error("role {role} has no thread bound to it")]
	UnboundRole {
		role: Role,
	},

	#[error("role {role} is already bound to thread {bound:?}, refusing to rebind to {requested:?}")]
	AlreadyBound {
		role: Role,
		bound: ThreadId,
		requested: ThreadId,
	},

	#[error("role {role} is shut down")]
	TargetUnavailable {
		role: Role,
	},

	#[error("synchronous call to role {role} did not complete within {timeout:?}")]
	Timeout {
		role: Role,
		timeout: Duration,
	},

	#[error("task on role {role} failed: {reason}")]
	TaskFailed {
		role: Role,
		reason: String,
	},

	#[error("synchronous call from {origin} to {target} would wait on a thread that is waiting on {origin}")]
	Deadlock {
		origin: Role,
		target: Role,
	},
}

impl DispatchError {
	/// Build a [`DispatchError::TaskFailed`] from a caught panic payload.
	pub(crate) fn from_panic(role: Role, payload: Box<dyn Any + Send>) -> Self {
		let reason = if let Some(s) = payload.downcast_ref::<&'static str>() {
			(*s).to_string()
		} else if let Some(s) = payload.downcast_ref::<String>() {
			s.clone()
		} else {
			"task panicked".to_string()
		};
		DispatchError::TaskFailed {
			role,
			reason,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_panic_payload_str() {
		let err = DispatchError::from_panic(Role::Core, Box::new("boom"));
		assert_eq!(
			err,
			DispatchError::TaskFailed {
				role: Role::Core,
				reason: "boom".to_string()
			}
		);
	}

	#[test]
	fn test_panic_payload_string() {
		let err = DispatchError::from_panic(Role::Ui, Box::new(format!("bad {}", 42)));
		assert_eq!(err.to_string(), "task on role ui failed: bad 42");
	}

	#[test]
	fn test_panic_payload_opaque() {
		let err = DispatchError::from_panic(Role::Ui, Box::new(7u32));
		assert!(matches!(err, DispatchError::TaskFailed { reason, .. } if reason == "task panicked"));
	}
}
