//! Finished paths on their way back to the owning thread.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;

use crate::path::{ENGINE_OWNER, Path, PathState};

/// Lock-free inbox written by workers, drained by the owning thread.
///
/// A drain that runs out of time moves whatever is still in the inbox to an
/// overflow list, which the next drain consumes first. Delivery order is
/// therefore the order in which paths finished.
#[derive(Default)]
pub struct ReturnQueue {
    incoming: SegQueue<Path>,
    overflow: Mutex<VecDeque<Path>>,
}

impl ReturnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: Path) {
        self.incoming.push(path);
    }

    pub fn len(&self) -> usize {
        self.incoming.len() + self.overflow.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next(&self) -> Option<Path> {
        let from_overflow = self.overflow.lock().pop_front();
        from_overflow.or_else(|| self.incoming.pop())
    }

    /// Deliver finished paths for at most `time_slice`, but always at least
    /// `min_count` of them (if that many are waiting). Returns how many were
    /// delivered.
    pub fn drain(&self, time_slice: Duration, min_count: usize) -> usize {
        let deadline = Instant::now() + time_slice;
        let mut count = 0;
        while let Some(path) = self.next() {
            return_path(&path);
            count += 1;
            if count >= min_count && Instant::now() >= deadline {
                let mut overflow = self.overflow.lock();
                while let Some(p) = self.incoming.pop() {
                    overflow.push_back(p);
                }
                break;
            }
        }
        count
    }

    /// Deliver every finished path, with no time limit.
    pub fn drain_all(&self) -> usize {
        let mut count = 0;
        while let Some(path) = self.next() {
            return_path(&path);
            count += 1;
        }
        count
    }
}

/// Mark the path returned, run its callback once and drop the engine's
/// claim.
fn return_path(path: &Path) {
    path.advance(PathState::Returned);
    let callback = path.data().callback.take();
    if let Some(callback) = callback {
        callback(path);
    }
    path.release(ENGINE_OWNER, true);
}
