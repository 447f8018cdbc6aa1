//! Running searches: worker threads, or a ticker driven by the caller.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use navq_core::GraphSet;
use navq_paths::{PathHandler, SearchContext};

use crate::config::PathLog;
use crate::engine::Shared;
use crate::error::EngineError;
use crate::path::{Path, PathData, PathState};

thread_local! {
    static WORKER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is a path worker.
pub fn on_worker_thread() -> bool {
    WORKER_THREAD.with(Cell::get)
}

// ---------------------------------------------------------------------------
// Search phases
// ---------------------------------------------------------------------------

/// Bind the handler to `path` and run the search up to its first step.
fn begin(handler: &mut PathHandler, graphs: &GraphSet, path: &Path) {
    path.advance(PathState::Processing);
    let mut data = path.data();
    let Some(tag) = data.tag else {
        data.search.fail("path was queued without a request id");
        return;
    };
    if data.search.is_done() {
        return;
    }
    handler.initialize_for_path(tag.tag, tag.era, graphs.node_capacity());
    let mut ctx = SearchContext { graphs, handler };
    data.search.prepare(&mut ctx);
    data.search.initialize(&mut ctx);
}

/// Advance the search until `deadline`. Returns whether it is done.
///
/// A terminating queue fails the search instead.
fn step(shared: &Shared, handler: &mut PathHandler, graphs: &GraphSet, path: &Path, deadline: Instant) -> bool {
    let mut data = path.data();
    if data.search.is_done() {
        return true;
    }
    if shared.queue.is_terminating() {
        data.search.fail("the path queue was terminated during the search");
        return true;
    }
    let mut ctx = SearchContext { graphs, handler };
    data.search.calculate_step(&mut ctx, deadline);
    data.search.is_done()
}

/// Run `search` on `path`, failing the path if it panics. Returns whether
/// it panicked.
fn guarded(path: &Path, search: impl FnOnce()) -> bool {
    if panic::catch_unwind(AssertUnwindSafe(search)).is_ok() {
        return false;
    }
    path.fail("the search panicked");
    true
}

/// Clean up a searched path, run its immediate callback and hand it to the
/// return queue.
pub(crate) fn finish(shared: &Shared, path: &Path) {
    let immediate = {
        let mut data = path.data();
        data.search.cleanup();
        log_result(shared.config.path_log, &data);
        data.immediate_callback.take()
    };
    if let Some(callback) = immediate {
        callback(path);
    }
    path.advance(PathState::ReturnQueue);
    shared.returns.push(path.clone());
}

fn log_result(level: PathLog, data: &PathData) {
    if level == PathLog::None {
        return;
    }
    let s = &data.search;
    let id = data.tag.map_or(0, |t| t.id);
    if s.error() {
        log::warn!(
            "{} path #{id} failed after {:.2} ms, {} nodes searched: {}",
            s.kind().name(),
            s.duration().as_secs_f64() * 1000.0,
            s.searched_nodes(),
            s.error_log()
        );
        return;
    }
    match level {
        PathLog::Normal => log::debug!(
            "{} path #{id} {:?}: {} nodes in {:.2} ms",
            s.kind().name(),
            s.state(),
            s.path().len(),
            s.duration().as_secs_f64() * 1000.0
        ),
        PathLog::Heavy => log::info!(
            "{} path #{id} {:?}: length {}, {} nodes searched in {:.2} ms, ends at {:?}",
            s.kind().name(),
            s.state(),
            s.path().len(),
            s.searched_nodes(),
            s.duration().as_secs_f64() * 1000.0,
            s.vector_path().last(),
        ),
        PathLog::None | PathLog::OnlyErrors => {}
    }
}

// ---------------------------------------------------------------------------
// Worker threads
// ---------------------------------------------------------------------------

/// Spawn `count` worker threads, each with its own handler.
pub(crate) fn spawn_workers(shared: &Arc<Shared>, count: usize) -> Result<Vec<JoinHandle<()>>, EngineError> {
    (0..count)
        .map(|id| {
            let shared = Arc::clone(shared);
            thread::Builder::new()
                .name(format!("navq-worker-{id}"))
                .spawn(move || worker_main(shared, id))
                .map_err(|e| EngineError::Spawn {
                    id,
                    reason: e.to_string(),
                })
        })
        .collect()
}

fn worker_main(shared: Arc<Shared>, id: usize) {
    WORKER_THREAD.with(|w| w.set(true));
    let result = panic::catch_unwind(AssertUnwindSafe(|| worker_loop(&shared, id)));
    if result.is_err() {
        log::error!("path worker {id} panicked, terminating the path queue");
        shared.queue.terminate();
    }
}

fn worker_loop(shared: &Shared, id: usize) {
    let mut handler = PathHandler::new(id);
    let step_time = shared.config.thread_step_time();
    while let Ok(path) = shared.queue.pop() {
        let panicked = guarded(&path, || {
            let graphs = shared.graphs.read();
            begin(&mut handler, &graphs, &path);
            while !step(shared, &mut handler, &graphs, &path, Instant::now() + step_time) {}
        });
        finish(shared, &path);
        if panicked {
            log::error!("path worker {id} panicked during a search, terminating the path queue");
            shared.queue.terminate();
            break;
        }
    }
    log::debug!("path worker {id} exiting");
}

// ---------------------------------------------------------------------------
// Cooperative ticker
// ---------------------------------------------------------------------------

/// Runs searches on the caller's thread in bounded slices.
///
/// A path in progress is kept across ticks. The ticker only reports itself
/// blocked to the queue when it has no path in progress, so graph mutations
/// always happen between two searches.
pub(crate) struct Ticker {
    handler: PathHandler,
    current: Option<Path>,
    blocked: bool,
}

impl Ticker {
    pub(crate) fn new() -> Self {
        Self {
            handler: PathHandler::new(0),
            current: None,
            blocked: false,
        }
    }

    /// Search for up to `budget`. Returns paths that finished their search;
    /// the caller must pass them to [`finish`].
    pub(crate) fn tick(&mut self, shared: &Shared, budget: Duration) -> Vec<Path> {
        let deadline = Instant::now() + budget;
        let mut done = Vec::new();
        let graphs = shared.graphs.read();

        loop {
            if self.current.is_none() {
                match shared.queue.pop_no_block(self.blocked) {
                    Ok(Some(path)) => {
                        self.blocked = false;
                        let handler = &mut self.handler;
                        if guarded(&path, || begin(handler, &graphs, &path)) {
                            self.recover(shared);
                            done.push(path);
                            break;
                        }
                        self.current = Some(path);
                    }
                    Ok(None) => {
                        self.blocked = true;
                        break;
                    }
                    Err(_) => break,
                }
            }
            let Some(path) = self.current.as_ref() else {
                break;
            };
            let handler = &mut self.handler;
            let mut finished = false;
            if guarded(path, || finished = step(shared, handler, &graphs, path, deadline)) {
                self.recover(shared);
                done.extend(self.current.take());
                break;
            }
            if finished {
                done.extend(self.current.take());
            }
            if Instant::now() >= deadline {
                break;
            }
        }
        done
    }

    /// Drop the scratch state of a search that panicked and stop taking
    /// new paths.
    fn recover(&mut self, shared: &Shared) {
        log::error!("a path search panicked, terminating the path queue");
        self.handler = PathHandler::new(0);
        shared.queue.terminate();
    }

    /// Fail the path in progress, if any. Used on shutdown.
    pub(crate) fn abandon(&mut self) -> Option<Path> {
        let path = self.current.take()?;
        path.fail("the engine shut down during the search");
        Some(path)
    }
}
