// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Timer fires coalesce into a single drain task while the role is busy

use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread,
	time::Duration,
};

use crossbeam_channel::{Sender, bounded};
use hostbridge_dispatch::{Dispatcher, DispatcherConfig, Heartbeat, Role, RoleThread, TimerBridge, spawn_role_thread};

fn start_core() -> (Dispatcher, RoleThread) {
	let dispatcher = Dispatcher::new(DispatcherConfig::new().panic_on_unbound(false));
	dispatcher.bind_current(Role::Ui).unwrap();
	let core = spawn_role_thread(&dispatcher, Role::Core, "core").unwrap();
	(dispatcher, core)
}

fn block_core(dispatcher: &Dispatcher) -> Sender<()> {
	let (gate_tx, gate_rx) = bounded::<()>(0);
	let (started_tx, started_rx) = bounded::<()>(1);
	dispatcher
		.post_async(Role::Core, move || {
			started_tx.send(()).unwrap();
			let _ = gate_rx.recv();
		})
		.unwrap();
	started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
	gate_tx
}

fn counting_bridge(dispatcher: &Dispatcher) -> (TimerBridge, Arc<AtomicUsize>, Arc<AtomicUsize>) {
	let fires = Arc::new(AtomicUsize::new(0));
	let drains = Arc::new(AtomicUsize::new(0));
	let (fires_clone, drains_clone) = (Arc::clone(&fires), Arc::clone(&drains));
	let bridge = TimerBridge::new(dispatcher.clone(), Role::Core, move |fired| {
		fires_clone.fetch_add(fired, Ordering::SeqCst);
		drains_clone.fetch_add(1, Ordering::SeqCst);
	});
	(bridge, fires, drains)
}

#[test]
fn test_thousand_fires_queue_one_drain() {
	let (dispatcher, core) = start_core();
	let (bridge, fires, drains) = counting_bridge(&dispatcher);
	let gate = block_core(&dispatcher);

	for _ in 0..1000 {
		bridge.on_fire();
	}
	assert_eq!(bridge.wake_requests(), 1);
	assert_eq!(bridge.pending_count(), 1000);
	assert_eq!(dispatcher.pending(Role::Core), 1);

	gate.send(()).unwrap();
	dispatcher.post_sync(Role::Core, || ()).unwrap();

	assert_eq!(bridge.pending_count(), 0);
	assert_eq!(fires.load(Ordering::SeqCst), 1000);
	assert_eq!(drains.load(Ordering::SeqCst), 1);
	core.stop().unwrap();
}

#[test]
fn test_concurrent_fires_coalesce() {
	let (dispatcher, core) = start_core();
	let (bridge, fires, drains) = counting_bridge(&dispatcher);
	let gate = block_core(&dispatcher);

	let timers: Vec<_> = (0..4)
		.map(|_| {
			let bridge = bridge.clone();
			thread::spawn(move || {
				for _ in 0..250 {
					bridge.on_fire();
				}
			})
		})
		.collect();
	for timer in timers {
		timer.join().unwrap();
	}
	assert_eq!(bridge.wake_requests(), 1);
	assert_eq!(bridge.pending_count(), 1000);

	gate.send(()).unwrap();
	dispatcher.post_sync(Role::Core, || ()).unwrap();

	assert_eq!(fires.load(Ordering::SeqCst), 1000);
	assert_eq!(drains.load(Ordering::SeqCst), 1);
	core.stop().unwrap();
}

#[test]
fn test_fire_after_drain_queues_again() {
	let (dispatcher, core) = start_core();
	let (bridge, fires, drains) = counting_bridge(&dispatcher);

	assert!(bridge.on_fire());
	dispatcher.post_sync(Role::Core, || ()).unwrap();
	assert!(bridge.on_fire());
	dispatcher.post_sync(Role::Core, || ()).unwrap();

	assert_eq!(fires.load(Ordering::SeqCst), 2);
	assert_eq!(drains.load(Ordering::SeqCst), 2);
	assert_eq!(bridge.wake_requests(), 2);
	core.stop().unwrap();
}

#[test]
fn test_handler_runs_on_role_thread() {
	let (dispatcher, core) = start_core();
	let core_id = dispatcher.registry().resolve(Role::Core).unwrap();
	let (tx, rx) = bounded(1);
	let bridge = TimerBridge::new(dispatcher.clone(), Role::Core, move |_| {
		let _ = tx.try_send(thread::current().id());
	});

	let timer = thread::spawn(move || bridge.on_fire());
	assert!(timer.join().unwrap());
	assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), core_id);
	core.stop().unwrap();
}

#[test]
fn test_heartbeat_stops_when_role_shuts_down() {
	let (dispatcher, core) = start_core();
	let (bridge, fires, _) = counting_bridge(&dispatcher);

	let heartbeat = Heartbeat::start(bridge.clone(), Duration::from_millis(2));
	thread::sleep(Duration::from_millis(30));
	core.stop().unwrap();

	// The heartbeat notices the shutdown on its next fire and exits on its own.
	thread::sleep(Duration::from_millis(20));
	heartbeat.cancel();
	assert!(bridge.is_target_shut_down());
	assert!(fires.load(Ordering::SeqCst) > 0);
	assert!(!bridge.on_fire());
}
