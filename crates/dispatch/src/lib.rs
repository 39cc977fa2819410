// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Cross-thread task dispatch for single-process embedding hosts.
//!
//! A host runs a small fixed set of threads, each owning one [`Role`]. Code on
//! any thread posts closures to a role through the [`Dispatcher`]; the owning
//! thread runs them from its [`LoopPump`], inside its own native loop:
//!
//! ```ignore
//! let dispatcher = Dispatcher::default();
//! dispatcher.bind_current(Role::Ui)?;
//! let core = spawn_role_thread(&dispatcher, Role::Core, "core")?;
//!
//! dispatcher.post_async(Role::Core, || engine_tick())?;
//! let six = dispatcher.post_sync(Role::Core, || 5 + 1)?;
//!
//! core.stop()?;
//! dispatcher.shutdown(Role::Ui)?;
//! ```

pub mod completion;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod pump;
pub mod queue;
pub mod registry;
pub mod role;
pub mod runner;
pub mod task;
pub mod thread;
pub mod timer;
pub mod wake;

pub use completion::{CompletionSignal, CompletionWaiter, completion};
pub use config::{DispatcherConfig, ShutdownPolicy};
pub use dispatcher::{DispatchStats, Dispatcher, DispatcherBuilder};
pub use error::{DispatchError, Result};
pub use pump::{ExternalRunner, Flow, LoopPump, PumpStats};
pub use queue::CrossThreadQueue;
pub use registry::ThreadRegistry;
pub use role::{Role, RoleTable};
pub use runner::{IdleAction, TaskRunner, TaskRunnerAdapter};
pub use task::{Action, Task};
pub use thread::{RoleThread, spawn_role_thread, spawn_role_thread_with};
pub use timer::{Heartbeat, TimerBridge};
pub use wake::{ChannelWake, CondvarWake, Wake};
