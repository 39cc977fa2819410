// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use std::{
	process::ExitCode,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::{Duration, Instant},
};

use clap::Parser;
use hostbridge_dispatch::{
	ChannelWake, DispatchError, Dispatcher, DispatcherConfig, Heartbeat, LoopPump, Result, Role, TimerBridge,
	spawn_role_thread,
};
use hostbridge_sub_tracing::TracingSubsystemFactory;
use tracing::{debug, error, info};

/// Single-process embedding shell: the main thread owns the UI role, a
/// dedicated thread owns the core role.
#[derive(Debug, Parser)]
#[command(name = "hostbridge-shell", version)]
struct Args {
	/// Default timeout for synchronous posts; waits indefinitely when unset
	#[arg(long)]
	sync_timeout_ms: Option<u64>,

	/// Interval of the core heartbeat
	#[arg(long, default_value_t = 50)]
	heartbeat_ms: u64,

	/// Heartbeat ticks the UI waits for before shutting down
	#[arg(long, default_value_t = 5)]
	ticks: usize,

	/// Asynchronous tasks queued on the core before the synchronous call
	#[arg(long, default_value_t = 100)]
	async_tasks: usize,

	/// Log filter directives; falls back to RUST_LOG, then `info`
	#[arg(long)]
	log_filter: Option<String>,

	/// Wake role threads through a channel instead of a condvar
	#[arg(long)]
	channel_wake: bool,
}

fn increment_and_return(x: u32) -> u32 {
	x + 1
}

fn build_dispatcher(args: &Args) -> Dispatcher {
	let config = DispatcherConfig::new().sync_timeout(args.sync_timeout_ms.map(Duration::from_millis));
	let mut builder = Dispatcher::builder().config(config);
	if args.channel_wake {
		for role in Role::ALL {
			builder = builder.wake(role, Arc::new(ChannelWake::new()));
		}
	}
	builder.build()
}

fn run(args: &Args) -> Result<()> {
	let dispatcher = build_dispatcher(args);
	let ui = LoopPump::attach(dispatcher.clone(), Role::Ui)?;
	let core = spawn_role_thread(&dispatcher, Role::Core, "core")?;
	info!(async_tasks = args.async_tasks, channel_wake = args.channel_wake, "shell started");

	let completed = Arc::new(AtomicUsize::new(0));
	for _ in 0..args.async_tasks {
		let completed = Arc::clone(&completed);
		dispatcher.post_async(Role::Core, move || {
			completed.fetch_add(1, Ordering::Relaxed);
		})?;
	}

	let observed = Arc::clone(&completed);
	let (value, ran_before) =
		dispatcher.post_sync(Role::Core, move || (increment_and_return(5), observed.load(Ordering::Relaxed)))?;
	if value != 6 || ran_before != args.async_tasks {
		return Err(DispatchError::TaskFailed {
			role: Role::Core,
			reason: format!("expected 6 after {} tasks, got {} after {}", args.async_tasks, value, ran_before),
		});
	}
	info!(value, ran_before, "synchronous call returned");

	// Core handles heartbeat fires and reports each drain back to the UI.
	let ticks = Arc::new(AtomicUsize::new(0));
	let reporter = dispatcher.clone();
	let ui_ticks = Arc::clone(&ticks);
	let bridge = TimerBridge::new(dispatcher.clone(), Role::Core, move |fired| {
		let ui_ticks = Arc::clone(&ui_ticks);
		let _ = reporter.post_async(Role::Ui, move || {
			let total = ui_ticks.fetch_add(fired, Ordering::Relaxed) + fired;
			debug!(fired, total, "heartbeat");
		});
	});
	let heartbeat = Heartbeat::start(bridge.clone(), Duration::from_millis(args.heartbeat_ms));

	let patience = Duration::from_millis(args.heartbeat_ms.saturating_mul(args.ticks as u64).saturating_mul(4));
	let deadline = Instant::now() + patience + Duration::from_secs(1);
	while ticks.load(Ordering::Relaxed) < args.ticks && Instant::now() < deadline {
		ui.run_on_wake();
		ui.wait_for_work();
	}
	heartbeat.cancel();
	info!(ticks = ticks.load(Ordering::Relaxed), wake_requests = bridge.wake_requests(), "heartbeat stopped");

	let dropped_core = core.stop()?;
	let dropped_ui = dispatcher.shutdown(Role::Ui)?;
	for role in Role::ALL {
		let stats = dispatcher.stats(role);
		info!(
			role = %role,
			posted = stats.posted,
			executed = stats.executed,
			failed = stats.failed,
			dropped = stats.dropped,
			"role stats"
		);
	}
	info!(dropped_core, dropped_ui, "shell stopped");
	Ok(())
}

fn main() -> ExitCode {
	let args = Args::parse();

	let filter = args.log_filter.clone();
	let subscriber = TracingSubsystemFactory::with_configurator(move |builder| match filter {
		Some(filter) => builder.with_filter(filter),
		None => builder,
	})
	.create();
	if let Err(err) = subscriber.start() {
		eprintln!("hostbridge-shell: {err}");
		return ExitCode::FAILURE;
	}

	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!(error = %err, "shell failed");
			ExitCode::FAILURE
		}
	}
}
