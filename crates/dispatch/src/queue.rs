// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

//! Per-role FIFO of pending tasks.
//!
//! Any thread may push; only the owning thread drains. Draining swaps the
//! pending sequence out under the lock, and the caller runs the tasks after
//! the lock is released so a task may post again without deadlocking.

use std::{
	cmp::Ordering as CmpOrdering,
	collections::BinaryHeap,
	mem,
	time::Instant,
};

use parking_lot::Mutex;

use crate::{
	error::{DispatchError, Result},
	role::Role,
	task::Task,
};

/// A task waiting for its due time.
struct DelayedEntry {
	due: Instant,
	task: Task,
}

impl Eq for DelayedEntry {}

impl PartialEq for DelayedEntry {
	fn eq(&self, other: &Self) -> bool {
		self.due == other.due && self.task.seq() == other.task.seq()
	}
}

impl Ord for DelayedEntry {
	// BinaryHeap is a max-heap; reversed so the earliest due time (then the
	// earliest arrival) sits on top.
	fn cmp(&self, other: &Self) -> CmpOrdering {
		other.due.cmp(&self.due).then_with(|| other.task.seq().cmp(&self.task.seq()))
	}
}

impl PartialOrd for DelayedEntry {
	fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
		Some(self.cmp(other))
	}
}

#[derive(Default)]
struct QueueState {
	ready: Vec<Task>,
	delayed: BinaryHeap<DelayedEntry>,
	closed: bool,
}

/// Thread-safe task queue for one role.
pub struct CrossThreadQueue {
	role: Role,
	state: Mutex<QueueState>,
}

impl CrossThreadQueue {
	pub fn new(role: Role) -> Self {
		Self {
			role,
			state: Mutex::new(QueueState::default()),
		}
	}

	pub fn role(&self) -> Role {
		self.role
	}

	/// Append a ready task.
	///
	/// Returns whether the ready sequence was empty before the push, i.e.
	/// whether the owning thread needs a wake.
	pub fn push(&self, task: Task) -> Result<bool> {
		let mut state = self.state.lock();
		if state.closed {
			return Err(DispatchError::TargetUnavailable {
				role: self.role,
			});
		}
		let was_empty = state.ready.is_empty();
		state.ready.push(task);
		Ok(was_empty)
	}

	/// Insert a task carrying a due time. Tasks without one are pushed as ready.
	///
	/// Returns whether the task became the earliest pending deadline, in which
	/// case the owning thread has to re-arm its wait.
	pub fn push_delayed(&self, task: Task) -> Result<bool> {
		let Some(due) = task.due() else {
			return self.push(task);
		};
		let mut state = self.state.lock();
		if state.closed {
			return Err(DispatchError::TargetUnavailable {
				role: self.role,
			});
		}
		let earliest = state.delayed.peek().is_none_or(|head| due < head.due);
		state.delayed.push(DelayedEntry {
			due,
			task,
		});
		Ok(earliest)
	}

	/// Take every ready task, in arrival order.
	pub fn drain_all(&self) -> Vec<Task> {
		mem::take(&mut self.state.lock().ready)
	}

	/// Take every delayed task whose due time is at or before `now`, ordered
	/// by due time and then arrival.
	pub fn drain_due(&self, now: Instant) -> Vec<Task> {
		let mut state = self.state.lock();
		let mut due = Vec::new();
		while state.delayed.peek().is_some_and(|head| head.due <= now) {
			if let Some(entry) = state.delayed.pop() {
				due.push(entry.task);
			}
		}
		due
	}

	/// The earliest due time among delayed tasks.
	pub fn next_due(&self) -> Option<Instant> {
		self.state.lock().delayed.peek().map(|head| head.due)
	}

	/// No ready and no delayed tasks.
	pub fn is_empty(&self) -> bool {
		let state = self.state.lock();
		state.ready.is_empty() && state.delayed.is_empty()
	}

	pub fn has_ready(&self) -> bool {
		!self.state.lock().ready.is_empty()
	}

	pub fn len(&self) -> usize {
		let state = self.state.lock();
		state.ready.len() + state.delayed.len()
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	/// Reject all future pushes and hand back what was still queued: the ready
	/// tasks in arrival order and the delayed tasks in due order.
	pub fn close(&self) -> (Vec<Task>, Vec<Task>) {
		let mut state = self.state.lock();
		state.closed = true;
		let ready = mem::take(&mut state.ready);
		let delayed = mem::take(&mut state.delayed).into_sorted_vec().into_iter().rev().map(|entry| entry.task).collect();
		(ready, delayed)
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	fn task(seq: u64) -> Task {
		Task::new(Role::Core, || {}).with_seq(seq)
	}

	fn delayed(seq: u64, due: Instant) -> Task {
		Task::new(Role::Core, || {}).with_seq(seq).with_due(due)
	}

	fn seqs(tasks: &[Task]) -> Vec<u64> {
		tasks.iter().map(Task::seq).collect()
	}

	#[test]
	fn test_push_reports_empty_transition() {
		let queue = CrossThreadQueue::new(Role::Core);
		assert!(queue.push(task(0)).unwrap());
		assert!(!queue.push(task(1)).unwrap());
		assert_eq!(queue.len(), 2);

		queue.drain_all();
		assert!(queue.push(task(2)).unwrap());
	}

	#[test]
	fn test_drain_all_is_fifo_and_empties() {
		let queue = CrossThreadQueue::new(Role::Core);
		for seq in 0..5 {
			queue.push(task(seq)).unwrap();
		}

		let drained = queue.drain_all();
		assert_eq!(seqs(&drained), vec![0, 1, 2, 3, 4]);
		assert!(queue.is_empty());
		assert!(queue.drain_all().is_empty());
	}

	#[test]
	fn test_delayed_ordering_by_due_then_arrival() {
		let queue = CrossThreadQueue::new(Role::Core);
		let now = Instant::now();
		let later = now + Duration::from_millis(20);
		let sooner = now + Duration::from_millis(10);

		assert!(queue.push_delayed(delayed(0, later)).unwrap());
		assert!(queue.push_delayed(delayed(1, sooner)).unwrap());
		assert!(!queue.push_delayed(delayed(2, later)).unwrap());
		assert!(!queue.push_delayed(delayed(3, sooner)).unwrap());

		assert_eq!(queue.next_due(), Some(sooner));
		assert!(queue.drain_due(now).is_empty());
		assert!(!queue.has_ready());

		let drained = queue.drain_due(later);
		assert_eq!(seqs(&drained), vec![1, 3, 0, 2]);
		assert_eq!(queue.next_due(), None);
	}

	#[test]
	fn test_drain_due_leaves_future_tasks() {
		let queue = CrossThreadQueue::new(Role::Core);
		let now = Instant::now();
		queue.push_delayed(delayed(0, now)).unwrap();
		queue.push_delayed(delayed(1, now + Duration::from_secs(60))).unwrap();

		assert_eq!(seqs(&queue.drain_due(now)), vec![0]);
		assert_eq!(queue.len(), 1);
		assert!(!queue.is_empty());
	}

	#[test]
	fn test_close_rejects_and_returns_pending() {
		let queue = CrossThreadQueue::new(Role::Ui);
		let now = Instant::now();
		queue.push(task(0)).unwrap();
		queue.push(task(1)).unwrap();
		queue.push_delayed(delayed(2, now + Duration::from_secs(2))).unwrap();
		queue.push_delayed(delayed(3, now + Duration::from_secs(1))).unwrap();

		let (ready, delayed_tasks) = queue.close();
		assert_eq!(seqs(&ready), vec![0, 1]);
		assert_eq!(seqs(&delayed_tasks), vec![3, 2]);
		assert!(queue.is_closed());
		assert!(queue.is_empty());

		assert_eq!(
			queue.push(task(4)).unwrap_err(),
			DispatchError::TargetUnavailable {
				role: Role::Ui
			}
		);
		assert!(queue.push_delayed(delayed(5, now)).is_err());
	}
}
