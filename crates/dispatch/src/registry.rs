// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Role to native thread binding.

use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
	error::{DispatchError, Result},
	role::{Role, RoleTable},
};

/// Maps each [`Role`] to the native thread that owns it.
///
/// Every role is bound at most once, by the thread itself at startup.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
	table: Mutex<RoleTable<Option<ThreadId>>>,
}

impl ThreadRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Bind `role` to `thread_id`. Rebinding the same thread is a no-op.
	pub fn bind(&self, role: Role, thread_id: ThreadId) -> Result<()> {
		let mut table = self.table.lock();
		match table[role] {
			Some(bound) if bound == thread_id => Ok(()),
			Some(bound) => Err(DispatchError::AlreadyBound {
				role,
				bound,
				requested: thread_id,
			}),
			None => {
				table[role] = Some(thread_id);
				debug!(role = %role, thread = ?thread_id, "role bound");
				Ok(())
			}
		}
	}

	/// Bind `role` to the calling thread.
	pub fn bind_current(&self, role: Role) -> Result<()> {
		self.bind(role, thread::current().id())
	}

	pub fn resolve(&self, role: Role) -> Result<ThreadId> {
		self.table.lock()[role].ok_or(DispatchError::UnboundRole {
			role,
		})
	}

	/// Whether the calling thread owns `role`. An unbound role is never current.
	pub fn is_current_thread(&self, role: Role) -> bool {
		self.resolve(role).is_ok_and(|id| id == thread::current().id())
	}

	/// The role owned by the calling thread, if any.
	pub fn current_role(&self) -> Option<Role> {
		let current = thread::current().id();
		let table = self.table.lock();
		table.iter().find(|(_, id)| **id == Some(current)).map(|(role, _)| role)
	}
}
