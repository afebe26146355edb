// Copyright (C) 2025 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The cooperative command queue: three logical queues (immediate, timed
//! wait, semaphore) drained by the scheduler tick. Producers enqueue from
//! any thread via the scheduler channel; the queues themselves are owned by
//! the game loop.

pub mod scheduler;

pub use scheduler::{Scheduler, SchedulerClient, SchedulerError, SchedulerMessage};

use ahash::AHasher;
use crate::eval::Evaluator;
use crate::world::World;
use marsh_common::Dbref;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::hash::BuildHasherDefault;
use std::time::Instant;
use tracing::warn;

pub type TaskId = u64;

/// One deferred unit of work: a command to run under an identity, with the
/// argument and register snapshot that were live when it was queued. This is
/// the persisted "continuation" — there are no language-level coroutines
/// behind `@wait`.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: TaskId,
    /// The object whose code runs.
    pub executor: Dbref,
    /// Who set it off (`%#`).
    pub cause: Dbref,
    /// The object that invoked the attribute, for attribute-sourced entries.
    pub caller: Dbref,
    pub command: String,
    /// Positional arguments, `%0`..`%9`.
    pub args: Vec<String>,
    /// Saved `%q` registers.
    pub registers: Vec<String>,
    /// Attribute-sourced text is `%`-substituted and `;`-split at execution;
    /// direct player input is not.
    pub subst: bool,
}

struct WaitHeapEntry {
    wait_until: Instant,
    seq: u64,
    entry: QueueEntry,
}

// Reversed ordering turns the std max-heap into a min-heap on
// (wait_until, seq): earliest deadline first, insertion order breaking ties.
impl Ord for WaitHeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .wait_until
            .cmp(&self.wait_until)
            .then(other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for WaitHeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for WaitHeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.wait_until == other.wait_until && self.seq == other.seq
    }
}

impl Eq for WaitHeapEntry {}

struct SemEntry {
    obj: Dbref,
    attr: u16,
    entry: QueueEntry,
}

/// The three logical queues plus admission bookkeeping.
pub struct Queues {
    immediate: VecDeque<QueueEntry>,
    wait: BinaryHeap<WaitHeapEntry>,
    /// Semaphore waiters in insertion order.
    semaphores: Vec<SemEntry>,
    next_id: TaskId,
    seq: u64,
    /// Per-executor cap on the immediate queue.
    max_per_obj: usize,
    immediate_counts: HashMap<Dbref, usize, BuildHasherDefault<AHasher>>,
}

impl Queues {
    #[must_use]
    pub fn new(max_per_obj: usize) -> Self {
        Self {
            immediate: VecDeque::new(),
            wait: BinaryHeap::new(),
            semaphores: Vec::new(),
            next_id: 1,
            seq: 0,
            max_per_obj,
            immediate_counts: Default::default(),
        }
    }

    /// Build an entry with a fresh task id.
    pub fn make_entry(
        &mut self,
        executor: Dbref,
        cause: Dbref,
        caller: Dbref,
        command: impl Into<String>,
        args: Vec<String>,
        registers: Vec<String>,
        subst: bool,
    ) -> QueueEntry {
        let id = self.next_id;
        self.next_id += 1;
        QueueEntry {
            id,
            executor,
            cause,
            caller,
            command: command.into(),
            args,
            registers,
            subst,
        }
    }

    /// Admit to the immediate queue. Over-cap entries are dropped with a log
    /// line; the producer is not notified.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        let count = self.immediate_counts.entry(entry.executor).or_insert(0);
        if *count >= self.max_per_obj {
            warn!(executor = ?entry.executor, task = entry.id, "immediate queue cap exceeded, dropping entry");
            return false;
        }
        *count += 1;
        self.immediate.push_back(entry);
        true
    }

    pub fn pop_immediate(&mut self) -> Option<QueueEntry> {
        let entry = self.immediate.pop_front()?;
        if let Some(c) = self.immediate_counts.get_mut(&entry.executor) {
            *c = c.saturating_sub(1);
        }
        Some(entry)
    }

    /// `@wait N`: park until the deadline.
    pub fn defer(&mut self, entry: QueueEntry, wait_until: Instant) {
        let seq = self.seq;
        self.seq += 1;
        self.wait.push(WaitHeapEntry {
            wait_until,
            seq,
            entry,
        });
    }

    /// `@wait obj/attr`: park on a semaphore.
    pub fn wait_on_semaphore(&mut self, entry: QueueEntry, obj: Dbref, attr: u16) {
        self.semaphores.push(SemEntry { obj, attr, entry });
    }

    /// Move every entry whose deadline has passed to the tail of the
    /// immediate queue, in non-decreasing deadline order.
    pub fn promote_ready(&mut self, now: Instant) -> usize {
        let mut promoted = 0;
        while let Some(head) = self.wait.peek() {
            if head.wait_until > now {
                break;
            }
            let head = self.wait.pop().expect("peeked");
            self.enqueue(head.entry);
            promoted += 1;
        }
        promoted
    }

    /// Wake at most `count` waiters on `(obj, attr)`, in insertion order.
    /// Returns how many woke.
    pub fn notify_semaphore(&mut self, obj: Dbref, attr: u16, count: usize) -> usize {
        let mut woken = 0;
        let mut remaining = Vec::with_capacity(self.semaphores.len());
        for se in self.semaphores.drain(..) {
            if woken < count && se.obj == obj && se.attr == attr {
                woken += 1;
                let count_entry = self.immediate_counts.entry(se.entry.executor).or_insert(0);
                *count_entry += 1;
                self.immediate.push_back(se.entry);
            } else {
                remaining.push(se);
            }
        }
        self.semaphores = remaining;
        woken
    }

    /// `@halt obj`: drop the executor's entries from all three queues.
    pub fn halt_player(&mut self, executor: Dbref) -> usize {
        let mut dropped = 0;

        let before = self.immediate.len();
        self.immediate.retain(|e| e.executor != executor);
        dropped += before - self.immediate.len();
        self.immediate_counts.remove(&executor);

        let drained: Vec<WaitHeapEntry> = std::mem::take(&mut self.wait).into_vec();
        let before = drained.len();
        let kept: Vec<WaitHeapEntry> = drained
            .into_iter()
            .filter(|w| w.entry.executor != executor)
            .collect();
        dropped += before - kept.len();
        self.wait = kept.into_iter().collect();

        let before = self.semaphores.len();
        self.semaphores.retain(|s| s.entry.executor != executor);
        dropped += before - self.semaphores.len();

        dropped
    }

    /// `@drain obj[/attr]`: drop the object's semaphore entries (optionally
    /// filtered to one attribute) and its wait entries.
    pub fn drain_object(&mut self, obj: Dbref, attr: Option<u16>) -> usize {
        let before = self.semaphores.len();
        self.semaphores
            .retain(|s| !(s.obj == obj && attr.is_none_or(|a| a == s.attr)));
        let mut dropped = before - self.semaphores.len();

        let drained: Vec<WaitHeapEntry> = std::mem::take(&mut self.wait).into_vec();
        let before = drained.len();
        let kept: Vec<WaitHeapEntry> = drained
            .into_iter()
            .filter(|w| w.entry.executor != obj)
            .collect();
        dropped += before - kept.len();
        self.wait = kept.into_iter().collect();

        dropped
    }

    pub fn halt_all(&mut self) {
        self.immediate.clear();
        self.immediate_counts.clear();
        self.wait.clear();
        self.semaphores.clear();
    }

    #[must_use]
    pub fn immediate_len(&self) -> usize {
        self.immediate.len()
    }

    #[must_use]
    pub fn wait_len(&self) -> usize {
        self.wait.len()
    }

    #[must_use]
    pub fn semaphore_len(&self) -> usize {
        self.semaphores.len()
    }
}

/// Everything a command handler can touch, threaded by the game loop
/// through dispatch: the world, the queues, and the evaluator seam.
pub struct Ctx<'a> {
    pub world: &'a mut World,
    pub queues: &'a mut Queues,
    pub evaluator: &'a dyn Evaluator,
}

#[cfg(test)]
mod tests {
    use super::*;
    use marsh_common::NOTHING;
    use std::time::Duration;

    fn entry(q: &mut Queues, executor: Dbref, cmd: &str) -> QueueEntry {
        q.make_entry(executor, executor, executor, cmd, vec![], vec![], false)
    }

    #[test]
    fn test_promote_ready_order_and_boundary() {
        let mut q = Queues::new(100);
        let p = Dbref::mk_id(5);
        let now = Instant::now();
        let e1 = entry(&mut q, p, "one");
        let e2 = entry(&mut q, p, "two");
        let e3 = entry(&mut q, p, "three");
        // Same deadline: insertion order must hold.
        q.defer(e2, now);
        q.defer(e3, now);
        // Later deadline stays parked.
        q.defer(e1, now + Duration::from_secs(5));

        assert_eq!(q.promote_ready(now), 2);
        assert_eq!(q.wait_len(), 1);
        assert_eq!(q.pop_immediate().unwrap().command, "two");
        assert_eq!(q.pop_immediate().unwrap().command, "three");
        assert!(q.pop_immediate().is_none());

        assert_eq!(q.promote_ready(now + Duration::from_secs(6)), 1);
        assert_eq!(q.pop_immediate().unwrap().command, "one");
    }

    #[test]
    fn test_notify_semaphore_fifo_and_count_limit() {
        let mut q = Queues::new(100);
        let p = Dbref::mk_id(5);
        let sem = Dbref::mk_id(9);
        for name in ["a", "b", "c"] {
            let e = entry(&mut q, p, name);
            q.wait_on_semaphore(e, sem, 41);
        }
        let other = entry(&mut q, p, "other");
        q.wait_on_semaphore(other, sem, 42);

        assert_eq!(q.notify_semaphore(sem, 41, 2), 2);
        assert_eq!(q.pop_immediate().unwrap().command, "a");
        assert_eq!(q.pop_immediate().unwrap().command, "b");
        // "c" and the other-attribute waiter remain.
        assert_eq!(q.semaphore_len(), 2);
        // Asking for more than remain wakes only what matches.
        assert_eq!(q.notify_semaphore(sem, 41, 10), 1);
        assert_eq!(q.pop_immediate().unwrap().command, "c");
    }

    #[test]
    fn test_admission_cap_drops() {
        let mut q = Queues::new(2);
        let p = Dbref::mk_id(5);
        let spammer_entries: Vec<QueueEntry> = (0..3).map(|i| {
            let cmd = format!("cmd{i}");
            entry(&mut q, p, &cmd)
        }).collect();
        let mut admitted = 0;
        for e in spammer_entries {
            if q.enqueue(e) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 2);
        // Other executors are unaffected.
        let o = Dbref::mk_id(6);
        let e = entry(&mut q, o, "ok");
        assert!(q.enqueue(e));
    }

    #[test]
    fn test_halt_player_spans_all_queues() {
        let mut q = Queues::new(100);
        let p = Dbref::mk_id(5);
        let o = Dbref::mk_id(6);
        let sem = Dbref::mk_id(9);
        let e = entry(&mut q, p, "imm");
        q.enqueue(e);
        let e = entry(&mut q, p, "wait");
        q.defer(e, Instant::now() + Duration::from_secs(60));
        let e = entry(&mut q, p, "sem");
        q.wait_on_semaphore(e, sem, 41);
        let e = entry(&mut q, o, "keep");
        q.enqueue(e);

        assert_eq!(q.halt_player(p), 3);
        assert_eq!(q.immediate_len(), 1);
        assert_eq!(q.wait_len(), 0);
        assert_eq!(q.semaphore_len(), 0);
        assert_eq!(q.pop_immediate().unwrap().executor, o);
    }

    #[test]
    fn test_drain_object_filters_attr() {
        let mut q = Queues::new(100);
        let p = Dbref::mk_id(5);
        let sem = Dbref::mk_id(9);
        let e = entry(&mut q, p, "a41");
        q.wait_on_semaphore(e, sem, 41);
        let e = entry(&mut q, p, "a42");
        q.wait_on_semaphore(e, sem, 42);

        assert_eq!(q.drain_object(sem, Some(41)), 1);
        assert_eq!(q.semaphore_len(), 1);
        assert_eq!(q.drain_object(sem, None), 1);
        assert_eq!(q.semaphore_len(), 0);
    }

    #[test]
    fn test_halt_all() {
        let mut q = Queues::new(100);
        let p = Dbref::mk_id(5);
        let e = entry(&mut q, p, "x");
        q.enqueue(e);
        let e = entry(&mut q, p, "y");
        q.defer(e, Instant::now());
        q.halt_all();
        assert_eq!(q.immediate_len() + q.wait_len() + q.semaphore_len(), 0);
        // Cap bookkeeping reset too.
        let e = entry(&mut q, NOTHING, "z");
        assert!(q.enqueue(e));
    }
}
