//! The request queue feeding path workers.
//!
//! Paths are dequeued FIFO. [`push_front`](PathQueue::push_front) puts a path
//! at the head, so it is the very next one handed out; heavy use of it can
//! starve the paths behind.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::error::EngineError;
use crate::path::Path;

#[derive(Default)]
struct QueueState {
    items: VecDeque<Path>,
    blocked: bool,
    /// Receivers currently idle: waiting for work or stopped by a block.
    blocked_receivers: usize,
}

/// A multi-consumer queue with block and terminate controls.
///
/// A receiver counts as blocked while it waits in [`pop`](Self::pop), or
/// after [`pop_no_block`](Self::pop_no_block) returned nothing. When the
/// queue is blocked and every receiver is blocked, no receiver is working on
/// a path.
pub struct PathQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    all_blocked: Condvar,
    receivers: usize,
    terminating: AtomicBool,
}

impl PathQueue {
    /// A queue consumed by `receivers` workers.
    pub fn new(receivers: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Condvar::new(),
            all_blocked: Condvar::new(),
            receivers: receivers.max(1),
            terminating: AtomicBool::new(false),
        }
    }

    /// Enqueue behind everything already waiting. Fails once the queue is
    /// terminated.
    pub fn push(&self, path: Path) -> Result<(), EngineError> {
        self.insert(path, false)
    }

    /// Enqueue ahead of everything already waiting.
    pub fn push_front(&self, path: Path) -> Result<(), EngineError> {
        self.insert(path, true)
    }

    fn insert(&self, path: Path, front: bool) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if self.is_terminating() {
            return Err(EngineError::QueueTerminated);
        }
        if front {
            state.items.push_front(path);
        } else {
            state.items.push_back(path);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Take the next path, waiting while the queue is empty or blocked.
    ///
    /// Returns [`EngineError::QueueTerminated`] once the queue is terminated.
    pub fn pop(&self) -> Result<Path, EngineError> {
        let mut state = self.state.lock();
        loop {
            if self.is_terminating() {
                return Err(EngineError::QueueTerminated);
            }
            if !state.blocked {
                if let Some(path) = state.items.pop_front() {
                    return Ok(path);
                }
            }
            state.blocked_receivers += 1;
            if state.blocked && state.blocked_receivers == self.receivers {
                self.all_blocked.notify_all();
            }
            self.available.wait(&mut state);
            state.blocked_receivers -= 1;
        }
    }

    /// Take the next path without waiting.
    ///
    /// `blocked_before` is whether the caller's previous call returned
    /// nothing; it keeps the blocked receiver count exact across calls.
    pub fn pop_no_block(&self, blocked_before: bool) -> Result<Option<Path>, EngineError> {
        if self.is_terminating() {
            return Err(EngineError::QueueTerminated);
        }
        let mut state = self.state.lock();
        let next = if state.blocked { None } else { state.items.pop_front() };
        match (&next, blocked_before) {
            (None, false) => {
                state.blocked_receivers += 1;
                if state.blocked && state.blocked_receivers == self.receivers {
                    self.all_blocked.notify_all();
                }
            }
            (Some(_), true) => state.blocked_receivers -= 1,
            _ => {}
        }
        Ok(next)
    }

    /// Stop handing out paths. Receivers finish what they are working on.
    pub fn block(&self) {
        self.state.lock().blocked = true;
    }

    pub fn unblock(&self) {
        self.state.lock().blocked = false;
        self.available.notify_all();
    }

    pub fn is_blocked(&self) -> bool {
        self.state.lock().blocked
    }

    /// Wake every receiver with a termination signal. Cannot be undone.
    pub fn terminate(&self) {
        let _state = self.state.lock();
        self.terminating.store(true, Ordering::Release);
        self.available.notify_all();
        self.all_blocked.notify_all();
    }

    #[inline]
    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::Acquire)
    }

    /// Whether the queue is blocked and no receiver is working.
    pub fn all_receivers_blocked(&self) -> bool {
        let state = self.state.lock();
        state.blocked && state.blocked_receivers == self.receivers
    }

    /// Wait until [`all_receivers_blocked`](Self::all_receivers_blocked)
    /// holds, the queue terminates, or `timeout` passes. Returns whether all
    /// receivers are blocked.
    pub fn wait_for_all_blocked(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        while !(state.blocked && state.blocked_receivers == self.receivers) {
            if self.is_terminating() || self.all_blocked.wait_for(&mut state, timeout).timed_out() {
                return state.blocked && state.blocked_receivers == self.receivers;
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Remove every queued path.
    pub(crate) fn drain(&self) -> Vec<Path> {
        self.state.lock().items.drain(..).collect()
    }
}
