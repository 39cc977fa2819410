// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Logical thread roles.
//!
//! An embedding host runs a small fixed set of OS threads, each pinned to one
//! role for the lifetime of the process.

use std::{
	fmt,
	fmt::{Display, Formatter},
	ops::{Index, IndexMut},
};

/// The logical role a native thread plays in the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
	/// The thread owning the native windowing/event loop.
	Ui,
	/// The thread owning the engine state.
	Core,
}

impl Role {
	pub const COUNT: usize = 2;

	pub const ALL: [Role; Role::COUNT] = [Role::Ui, Role::Core];

	#[inline]
	pub(crate) fn index(self) -> usize {
		match self {
			Role::Ui => 0,
			Role::Core => 1,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Role::Ui => "ui",
			Role::Core => "core",
		}
	}
}

impl Display for Role {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Fixed-size storage holding one value per [`Role`].
#[derive(Debug, Clone, Default)]
pub struct RoleTable<T> {
	slots: [T; Role::COUNT],
}

impl<T> RoleTable<T> {
	pub fn from_fn(f: impl FnMut(Role) -> T) -> Self {
		Self {
			slots: Role::ALL.map(f),
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
		Role::ALL.into_iter().zip(self.slots.iter())
	}
}

impl<T> Index<Role> for RoleTable<T> {
	type Output = T;

	#[inline]
	fn index(&self, role: Role) -> &T {
		&self.slots[role.index()]
	}
}

impl<T> IndexMut<Role> for RoleTable<T> {
	#[inline]
	fn index_mut(&mut self, role: Role) -> &mut T {
		&mut self.slots[role.index()]
	}
}
