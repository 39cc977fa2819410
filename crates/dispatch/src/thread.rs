// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Dedicated OS threads for roles.
//!
//! The spawned thread binds itself to its role before the spawn call
//! returns, so the caller can post to the role immediately.

use std::thread::{self, JoinHandle};

use crossbeam_channel::bounded;
use tracing::debug;

use crate::{
	dispatcher::Dispatcher,
	error::{DispatchError, Result},
	pump::LoopPump,
	role::Role,
};

/// Handle to a thread owning a role.
pub struct RoleThread {
	role: Role,
	dispatcher: Dispatcher,
	join_handle: Option<JoinHandle<()>>,
}

impl RoleThread {
	pub fn role(&self) -> Role {
		self.role
	}

	/// Shut the role down and wait for its thread to exit.
	///
	/// Returns the number of tasks discarded by the shutdown.
	pub fn stop(mut self) -> Result<usize> {
		let dropped = self.dispatcher.shutdown(self.role)?;
		self.join();
		Ok(dropped)
	}

	fn join(&mut self) {
		if let Some(handle) = self.join_handle.take() {
			if handle.join().is_err() {
				debug!(role = %self.role, "role thread panicked");
			}
		}
	}
}

impl Drop for RoleThread {
	fn drop(&mut self) {
		if self.join_handle.is_some() {
			let _ = self.dispatcher.shutdown(self.role);
			self.join();
		}
	}
}

/// Shuts the role down once its thread stops pumping, whether the body
/// returned or unwound.
struct CloseOnExit {
	dispatcher: Dispatcher,
	role: Role,
}

impl Drop for CloseOnExit {
	fn drop(&mut self) {
		if !self.dispatcher.is_shut_down(self.role) {
			debug!(role = %self.role, "role thread exited while open, shutting role down");
			let _ = self.dispatcher.shutdown(self.role);
		}
	}
}

/// Spawn a thread for `role` that runs [`LoopPump::run`] until the role shuts
/// down.
pub fn spawn_role_thread(dispatcher: &Dispatcher, role: Role, name: &str) -> Result<RoleThread> {
	spawn_role_thread_with(dispatcher, role, name, |pump| pump.run())
}

/// Spawn a thread for `role` and hand its pump to `body`, e.g. to drive
/// [`LoopPump::pump_external_loop`] instead of the plain loop.
///
/// The role is shut down when `body` returns or panics, so posts made after
/// the thread stopped fail with [`DispatchError::TargetUnavailable`] instead
/// of queueing work nobody will run.
///
/// Fails with the bind error if `role` is already owned by another thread.
pub fn spawn_role_thread_with<F>(dispatcher: &Dispatcher, role: Role, name: &str, body: F) -> Result<RoleThread>
where
	F: FnOnce(LoopPump) + Send + 'static,
{
	let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
	let thread_dispatcher = dispatcher.clone();
	let thread_name = name.to_string();

	let handle = thread::Builder::new()
		.name(thread_name.clone())
		.spawn(move || {
			let pump = match LoopPump::attach(thread_dispatcher, role) {
				Ok(pump) => {
					let _ = ready_tx.send(Ok(()));
					pump
				}
				Err(err) => {
					let _ = ready_tx.send(Err(err));
					return;
				}
			};
			let _closer = CloseOnExit {
				dispatcher: pump.dispatcher().clone(),
				role,
			};
			debug!(role = %role, thread = %thread_name, "role thread starting");
			body(pump);
			debug!(role = %role, thread = %thread_name, "role thread stopped");
		})
		.expect("failed to spawn role thread");

	let started = ready_rx.recv().unwrap_or(Err(DispatchError::TargetUnavailable {
		role,
	}));
	match started {
		Ok(()) => Ok(RoleThread {
			role,
			dispatcher: dispatcher.clone(),
			join_handle: Some(handle),
		}),
		Err(err) => {
			let _ = handle.join();
			Err(err)
		}
	}
}
