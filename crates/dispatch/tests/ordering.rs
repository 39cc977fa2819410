// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Delivery order and at-most-once execution across threads

use std::{
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	thread,
	time::{Duration, Instant},
};

use crossbeam_channel::bounded;
use hostbridge_dispatch::{Dispatcher, DispatcherConfig, Role, RoleThread, spawn_role_thread};
use parking_lot::Mutex;

fn start_core() -> (Dispatcher, RoleThread) {
	let dispatcher = Dispatcher::new(DispatcherConfig::new().panic_on_unbound(false));
	dispatcher.bind_current(Role::Ui).unwrap();
	let core = spawn_role_thread(&dispatcher, Role::Core, "core").unwrap();
	(dispatcher, core)
}

#[test]
fn test_fifo_per_producer() {
	let (dispatcher, core) = start_core();
	let seen = Arc::new(Mutex::new(Vec::new()));

	for i in 0..1000 {
		let seen = Arc::clone(&seen);
		dispatcher.post_async(Role::Core, move || seen.lock().push(i)).unwrap();
	}
	dispatcher.post_sync(Role::Core, || ()).unwrap();

	assert_eq!(*seen.lock(), (0..1000).collect::<Vec<_>>());
	core.stop().unwrap();
}

#[test]
fn test_tasks_run_on_owning_thread() {
	let (dispatcher, core) = start_core();
	let core_id = dispatcher.registry().resolve(Role::Core).unwrap();

	let ran_on = dispatcher.post_sync(Role::Core, || thread::current().id()).unwrap();
	assert_eq!(ran_on, core_id);
	assert_ne!(ran_on, thread::current().id());

	let (tx, rx) = bounded(1);
	dispatcher.post_async(Role::Core, move || tx.send(thread::current().id()).unwrap()).unwrap();
	assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), core_id);

	core.stop().unwrap();
}

#[test]
fn test_exactly_once_under_concurrent_producers() {
	const PRODUCERS: usize = 8;
	const PER_PRODUCER: usize = 500;

	let (dispatcher, core) = start_core();
	let counts: Arc<Vec<AtomicUsize>> = Arc::new((0..PRODUCERS * PER_PRODUCER).map(|_| AtomicUsize::new(0)).collect());
	let order: Arc<Mutex<Vec<Vec<usize>>>> = Arc::new(Mutex::new(vec![Vec::new(); PRODUCERS]));

	let producers: Vec<_> = (0..PRODUCERS)
		.map(|producer| {
			let dispatcher = dispatcher.clone();
			let counts = Arc::clone(&counts);
			let order = Arc::clone(&order);
			thread::spawn(move || {
				for i in 0..PER_PRODUCER {
					let counts = Arc::clone(&counts);
					let order = Arc::clone(&order);
					dispatcher
						.post_async(Role::Core, move || {
							counts[producer * PER_PRODUCER + i].fetch_add(1, Ordering::SeqCst);
							order.lock()[producer].push(i);
						})
						.unwrap();
				}
			})
		})
		.collect();
	for producer in producers {
		producer.join().unwrap();
	}
	dispatcher.post_sync(Role::Core, || ()).unwrap();

	for (index, count) in counts.iter().enumerate() {
		assert_eq!(count.load(Ordering::SeqCst), 1, "task {} ran {} times", index, count.load(Ordering::SeqCst));
	}
	for sequence in order.lock().iter() {
		assert_eq!(*sequence, (0..PER_PRODUCER).collect::<Vec<_>>());
	}

	let stats = dispatcher.stats(Role::Core);
	assert_eq!(stats.posted, (PRODUCERS * PER_PRODUCER + 1) as u64);
	assert_eq!(stats.failed, 0);
	core.stop().unwrap();
}

#[test]
fn test_delayed_tasks_by_due_time_then_arrival() {
	let (dispatcher, core) = start_core();
	let seen = Arc::new(Mutex::new(Vec::new()));
	let (done_tx, done_rx) = bounded(1);
	let posted_at = Instant::now();

	let schedule = [("a", 60), ("b", 20), ("c", 20), ("d", 40)];
	for (label, delay_ms) in schedule {
		let seen = Arc::clone(&seen);
		let done_tx = done_tx.clone();
		let delay = Duration::from_millis(delay_ms);
		dispatcher
			.post_delayed(Role::Core, delay, move || {
				assert!(posted_at.elapsed() >= delay, "{} ran early", label);
				let mut seen = seen.lock();
				seen.push(label);
				if seen.len() == 4 {
					done_tx.send(()).unwrap();
				}
			})
			.unwrap();
	}

	done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
	assert_eq!(*seen.lock(), vec!["b", "c", "d", "a"]);
	assert_eq!(dispatcher.stats(Role::Core).failed, 0);
	core.stop().unwrap();
}

#[test]
fn test_delayed_task_waits_behind_ready_work() {
	let (dispatcher, core) = start_core();
	let seen = Arc::new(Mutex::new(Vec::new()));

	let delayed = Arc::clone(&seen);
	dispatcher.post_delayed(Role::Core, Duration::from_millis(10), move || delayed.lock().push("delayed")).unwrap();
	let ready = Arc::clone(&seen);
	dispatcher.post_async(Role::Core, move || ready.lock().push("ready")).unwrap();

	thread::sleep(Duration::from_millis(50));
	dispatcher.post_sync(Role::Core, || ()).unwrap();

	assert_eq!(*seen.lock(), vec!["ready", "delayed"]);
	core.stop().unwrap();
}

#[test]
fn test_zero_delay_is_plain_post() {
	let (dispatcher, core) = start_core();
	let seen = Arc::new(Mutex::new(Vec::new()));

	let first = Arc::clone(&seen);
	dispatcher.post_delayed(Role::Core, Duration::ZERO, move || first.lock().push("first")).unwrap();
	let second = Arc::clone(&seen);
	dispatcher.post_async(Role::Core, move || second.lock().push("second")).unwrap();
	dispatcher.post_sync(Role::Core, || ()).unwrap();

	assert_eq!(*seen.lock(), vec!["first", "second"]);
	core.stop().unwrap();
}
