//! # Message Queue
//!
//! Bounded FIFO of fixed-size messages for inter-task communication.
//! Messages are stored *by copy* — a sender and a receiver never share
//! mutable memory through the queue.
//!
//! This module is the passive data structure: a circular buffer plus two
//! FIFO wait lists (tasks blocked sending into a full queue, tasks
//! blocked receiving from an empty one). The blocking protocol itself —
//! parking the caller, timeouts, retries after wake — lives in the
//! scheduler, which owns the queues.
//!
//! Wake order on both wait lists is FIFO by blocking time, independent
//! of task priority, so a lower-priority waiter is never starved of a
//! freed slot. Priority applies again once the woken tasks compete for
//! the CPU.

use crate::config::{MAX_TASKS, MESSAGE_DATA_LEN, QUEUE_DEPTH};

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A queue message: an identifier byte plus a fixed text buffer, the
/// last byte conventionally a newline terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub id: u8,
    pub data: [u8; MESSAGE_DATA_LEN],
}

impl Message {
    pub const fn empty() -> Self {
        Self {
            id: 0,
            data: [0u8; MESSAGE_DATA_LEN],
        }
    }

    /// Build a message from a text payload, truncated to fit with the
    /// final byte forced to `\n` per the demo wire convention.
    pub fn from_text(id: u8, text: &str) -> Self {
        let mut msg = Self::empty();
        msg.id = id;
        let src = text.as_bytes();
        let n = src.len().min(MESSAGE_DATA_LEN - 1);
        msg.data[..n].copy_from_slice(&src[..n]);
        msg.data[MESSAGE_DATA_LEN - 1] = b'\n';
        msg
    }

    /// The text payload up to the first NUL or the newline terminator.
    pub fn text(&self) -> &str {
        let end = self
            .data
            .iter()
            .position(|&b| b == 0 || b == b'\n')
            .unwrap_or(self.data.len());
        core::str::from_utf8(&self.data[..end]).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Wait list
// ---------------------------------------------------------------------------

/// FIFO list of task ids blocked on one side of a queue. Capacity is
/// `MAX_TASKS` — every task in the system could block on the same queue,
/// so pushing can never legitimately fail.
#[derive(Debug)]
pub struct WaitList {
    tasks: [usize; MAX_TASKS],
    len: usize,
}

impl WaitList {
    pub const fn new() -> Self {
        Self {
            tasks: [0; MAX_TASKS],
            len: 0,
        }
    }

    /// Append a task at the back (it blocked most recently).
    pub fn push_back(&mut self, task: usize) {
        // A task blocks on at most one resource, so overflow means the
        // kernel's bookkeeping is corrupt.
        assert!(self.len < MAX_TASKS, "wait list overflow");
        self.tasks[self.len] = task;
        self.len += 1;
    }

    /// Remove and return the task that has waited longest.
    pub fn pop_front(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let head = self.tasks[0];
        self.tasks.copy_within(1..self.len, 0);
        self.len -= 1;
        Some(head)
    }

    /// Remove a specific task (timeout expiry or deletion). Returns
    /// whether it was present.
    pub fn remove(&mut self, task: usize) -> bool {
        match self.tasks[..self.len].iter().position(|&t| t == task) {
            Some(i) => {
                self.tasks.copy_within(i + 1..self.len, i);
                self.len -= 1;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, task: usize) -> bool {
        self.tasks[..self.len].contains(&task)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

// ---------------------------------------------------------------------------
// Message queue
// ---------------------------------------------------------------------------

/// Bounded circular buffer of [`Message`] with attached wait lists.
///
/// Invariants: `count <= capacity` always; messages leave in exactly the
/// order they were accepted.
pub struct MessageQueue {
    buffer: [Message; QUEUE_DEPTH],
    capacity: usize,
    head: usize,
    count: usize,
    /// Tasks blocked because the queue was full, oldest first.
    pub send_waiters: WaitList,
    /// Tasks blocked because the queue was empty, oldest first.
    pub receive_waiters: WaitList,
    active: bool,
}

impl MessageQueue {
    /// An unallocated queue slot.
    pub const fn empty() -> Self {
        Self {
            buffer: [Message::empty(); QUEUE_DEPTH],
            capacity: 0,
            head: 0,
            count: 0,
            send_waiters: WaitList::new(),
            receive_waiters: WaitList::new(),
            active: false,
        }
    }

    /// Initialize this slot as a live queue of the given capacity.
    /// Callers validate `capacity` against `1..=QUEUE_DEPTH` before
    /// allocating a slot; an out-of-range request is a creation error,
    /// never a silent clamp.
    pub fn init(&mut self, capacity: usize) {
        debug_assert!(capacity >= 1 && capacity <= QUEUE_DEPTH);
        self.capacity = capacity;
        self.head = 0;
        self.count = 0;
        self.send_waiters = WaitList::new();
        self.receive_waiters = WaitList::new();
        self.active = true;
    }

    /// Copy `msg` in at the back. Returns `false` (and copies nothing)
    /// if the queue is full — the capacity bound is never exceeded.
    pub fn try_send(&mut self, msg: &Message) -> bool {
        if self.count >= self.capacity {
            return false;
        }
        let tail = (self.head + self.count) % self.capacity;
        self.buffer[tail] = *msg;
        self.count += 1;
        true
    }

    /// Dequeue the oldest message, if any.
    pub fn try_receive(&mut self) -> Option<Message> {
        if self.count == 0 {
            return None;
        }
        let msg = self.buffer[self.head];
        self.head = (self.head + 1) % self.capacity;
        self.count -= 1;
        Some(msg)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
