//! Deferred state transitions.
//!
//! Anything that would otherwise need a wall-clock timer (invincibility
//! expiry, respawns) is an entry here instead, drained at the top of each
//! tick. Entries fire in `(due_tick, insertion order)` order, so
//! two tasks due the same tick run in the order they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::game::state::PlayerId;

/// A deferred action owned by the tick loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// End a player's spawn-protection window
    ClearInvincibility(PlayerId),
    /// Bring an eliminated player back at a fresh spawn
    RespawnPlayer(PlayerId),
    /// (Re)create the arena bot
    SpawnBot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    due_tick: u64,
    seq: u64,
    task: Task,
}

// BinaryHeap is a max-heap; reverse the comparison to pop the earliest entry.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.due_tick, other.seq).cmp(&(self.due_tick, self.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of `(due_tick, task)` entries
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Entry>,
    seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to fire once `current_tick` reaches `due_tick`
    pub fn push(&mut self, due_tick: u64, task: Task) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Entry {
            due_tick,
            seq,
            task,
        });
    }

    /// Pop the next task due at or before `current_tick`, if any
    pub fn pop_due(&mut self, current_tick: u64) -> Option<Task> {
        if self
            .heap
            .peek()
            .is_some_and(|entry| entry.due_tick <= current_tick)
        {
            self.heap.pop().map(|entry| entry.task)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
