//! The [`Engine`]: owns the graphs and drives path requests through the
//! queue, the searchers and the return queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use navq_core::{GraphSet, GraphUpdate};
use navq_paths::{SearchKind, SearchParams};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::graph_updates::GraphUpdates;
use crate::id::PathIdAllocator;
use crate::path::{ENGINE_OWNER, Path, PathState};
use crate::pool::PathPool;
use crate::processor::{self, Ticker, on_worker_thread};
use crate::queue::PathQueue;
use crate::return_queue::ReturnQueue;
use crate::work_items::{WorkItem, WorkItems, in_work_item};

/// How long a blocked thread waits before re-checking for termination.
const WAIT_INTERVAL: Duration = Duration::from_millis(50);

/// State shared between the engine and its worker threads.
pub(crate) struct Shared {
    pub(crate) config: EngineConfig,
    pub(crate) graphs: RwLock<GraphSet>,
    pub(crate) queue: PathQueue,
    pub(crate) returns: ReturnQueue,
    pub(crate) work_items: WorkItems,
    graph_updates: GraphUpdates,
    /// Graph locks currently held.
    graph_locks: AtomicUsize,
    submitted: AtomicU64,
    returned: AtomicU64,
}

impl Shared {
    /// Let paths flow again if nothing needs the queue blocked.
    fn unblock_if_idle(&self) {
        if self.graph_locks.load(Ordering::Acquire) == 0 && self.work_items.is_empty() {
            self.queue.unblock();
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum RunState {
    NotStarted,
    Running,
    ShutDown,
}

/// Counters describing what an engine did so far.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Worker threads; 0 in cooperative mode.
    pub threads: usize,
    pub paths_submitted: u64,
    /// Paths whose deferred callback ran.
    pub paths_returned: u64,
    /// Paths waiting for a searcher.
    pub paths_queued: usize,
    pub work_items_processed: u64,
    pub graph_updates_applied: u64,
    /// Path requests allocated by the pool.
    pub paths_allocated: usize,
}

/// A pathfinding engine.
///
/// Construct it with the graphs to search, call [`start`](Self::start), then
/// create paths with [`path`](Self::path) and hand them to
/// [`submit`](Self::submit). Finished paths are delivered by
/// [`tick`](Self::tick), which the owner calls regularly (once per frame,
/// typically); in cooperative mode `tick` also runs the searches.
///
/// Graphs are only mutated while no search runs: through work items, graph
/// updates or a [`GraphLock`].
pub struct Engine {
    shared: Arc<Shared>,
    pool: PathPool,
    threads: usize,
    run_state: Mutex<RunState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    ticker: Mutex<Option<Ticker>>,
    ids: Mutex<PathIdAllocator>,
    block_depth: AtomicUsize,
}

impl Engine {
    pub fn new(config: EngineConfig, graphs: GraphSet) -> Self {
        let threads = config.threads.resolve();
        Self {
            shared: Arc::new(Shared {
                config,
                graphs: RwLock::new(graphs),
                queue: PathQueue::new(threads.max(1)),
                returns: ReturnQueue::new(),
                work_items: WorkItems::default(),
                graph_updates: GraphUpdates::new(),
                graph_locks: AtomicUsize::new(0),
                submitted: AtomicU64::new(0),
                returned: AtomicU64::new(0),
            }),
            pool: PathPool::new(),
            threads,
            run_state: Mutex::new(RunState::NotStarted),
            workers: Mutex::new(Vec::new()),
            ticker: Mutex::new(None),
            ids: Mutex::new(PathIdAllocator::new()),
            block_depth: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Number of worker threads. 0 in cooperative mode.
    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn is_cooperative(&self) -> bool {
        self.threads == 0
    }

    fn run_state(&self) -> RunState {
        *self.run_state.lock()
    }

    /// Spawn the worker threads, or set up the cooperative searcher.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut state = self.run_state.lock();
        match *state {
            RunState::Running => return Err(EngineError::AlreadyStarted),
            RunState::ShutDown => return Err(EngineError::QueueTerminated),
            RunState::NotStarted => {}
        }
        if self.threads == 0 {
            *self.ticker.lock() = Some(Ticker::new());
            log::info!("navq engine started in cooperative mode");
        } else {
            let handles = processor::spawn_workers(&self.shared, self.threads).inspect_err(|_| {
                self.shared.queue.terminate();
            })?;
            *self.workers.lock() = handles;
            log::info!("navq engine started with {} worker threads", self.threads);
        }
        *state = RunState::Running;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Paths
    // -----------------------------------------------------------------------

    /// Parameters new paths start with.
    pub fn default_params(&self) -> SearchParams {
        let config = &self.shared.config;
        SearchParams {
            heuristic: config.heuristic,
            heuristic_scale: config.heuristic_scale,
            max_nearest_distance: config.max_nearest_node_distance,
            ..SearchParams::default()
        }
    }

    /// A pooled path with the configured default parameters.
    pub fn path(&self, kind: impl Into<SearchKind>) -> Path {
        self.pool.get(kind, self.default_params())
    }

    pub fn path_with(&self, kind: impl Into<SearchKind>, params: SearchParams) -> Path {
        self.pool.get(kind, params)
    }

    /// Queue `path` for searching. With `push_front` it is the next path
    /// handed to a searcher.
    ///
    /// The engine claims the path until its deferred callback has run. A
    /// path that did not come from this engine's pool is not searched: it
    /// fails and is returned with an error.
    ///
    /// # Panics
    ///
    /// Panics if the path was already submitted.
    pub fn submit(&self, path: &Path, push_front: bool) -> Result<(), EngineError> {
        match self.run_state() {
            RunState::NotStarted => return Err(EngineError::NotStarted),
            RunState::ShutDown => return Err(EngineError::QueueTerminated),
            RunState::Running => {}
        }
        if self.shared.queue.is_terminating() {
            return Err(EngineError::QueueTerminated);
        }
        assert_eq!(path.state(), PathState::Created, "path was already submitted");
        if !self.pool.owns(path) {
            path.fail("path was not created by this engine");
        }

        let tag = self.ids.lock().next();
        path.data().tag = Some(tag);
        path.claim(ENGINE_OWNER);
        path.advance(PathState::PathQueue);
        let queued = if push_front {
            self.shared.queue.push_front(path.clone())
        } else {
            self.shared.queue.push(path.clone())
        };
        if let Err(e) = queued {
            path.release(ENGINE_OWNER, true);
            return Err(e);
        }
        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Run one frame of engine work on the calling thread: pending graph
    /// updates and work items, searches (cooperative mode only), then a
    /// time-sliced drain of finished paths.
    ///
    /// Does nothing when called from inside a work item.
    pub fn tick(&self) {
        if self.run_state() != RunState::Running || in_work_item() {
            return;
        }
        let config = &self.shared.config;
        let interval = if config.batch_graph_updates {
            config.graph_update_batching_interval
        } else {
            Duration::ZERO
        };
        self.schedule_graph_updates(interval);
        self.perform_blocking_actions(false);
        self.tick_paths(config.max_frame_time);
        self.drain_returns(false);
    }

    /// Block until `path` has been searched and its callbacks have run.
    ///
    /// Calls nest (a callback may block on another path); past the
    /// configured depth a warning is logged each time.
    ///
    /// # Panics
    ///
    /// Panics if the path was never submitted, or when called from a work
    /// item or a worker thread.
    pub fn block_until_calculated(&self, path: &Path) -> Result<(), EngineError> {
        assert!(
            !in_work_item(),
            "block_until_calculated cannot be called from a work item"
        );
        assert!(
            !on_worker_thread(),
            "block_until_calculated cannot be called from a path worker thread"
        );
        let state = path.state();
        assert_ne!(state, PathState::Created, "path was never submitted");
        if state == PathState::Returned || path.is_stale() {
            return Ok(());
        }

        let depth = self.block_depth.fetch_add(1, Ordering::AcqRel) + 1;
        let _depth = DepthGuard(&self.block_depth);
        if depth > self.shared.config.max_block_depth_warning {
            log::warn!("block_until_calculated nested {depth} levels deep");
        }

        while path.state() < PathState::ReturnQueue {
            if self.shared.queue.is_terminating() {
                return Err(EngineError::QueueTerminated);
            }
            self.perform_blocking_actions(false);
            if self.is_cooperative() {
                self.tick_paths(self.shared.config.max_frame_time);
            } else {
                path.wait_for_state(PathState::ReturnQueue, WAIT_INTERVAL);
            }
        }
        while !path.is_stale() && path.state() < PathState::Returned {
            if self.drain_returns(true) == 0 {
                thread::yield_now();
            }
        }
        Ok(())
    }

    fn tick_paths(&self, budget: Duration) {
        let done = {
            let mut ticker = self.ticker.lock();
            match ticker.as_mut() {
                Some(t) => t.tick(&self.shared, budget),
                None => return,
            }
        };
        for path in &done {
            processor::finish(&self.shared, path);
        }
    }

    fn drain_returns(&self, all: bool) -> usize {
        let returns = &self.shared.returns;
        let n = if all {
            returns.drain_all()
        } else {
            returns.drain(self.shared.config.return_time_slice, self.shared.config.min_returns_per_drain)
        };
        self.shared.returned.fetch_add(n as u64, Ordering::Relaxed);
        n
    }

    // -----------------------------------------------------------------------
    // Graph mutation
    // -----------------------------------------------------------------------

    /// Read access to the graphs. Work items and graph locks wait while the
    /// guard is held.
    pub fn graphs(&self) -> RwLockReadGuard<'_, GraphSet> {
        self.shared.graphs.read()
    }

    /// Queue a work item. It runs on the thread calling [`tick`](Self::tick)
    /// once no search is in progress.
    ///
    /// Items added from inside a work item run in the same pass.
    pub fn add_work_item(&self, item: WorkItem) {
        self.shared.work_items.push(item);
        if self.run_state() == RunState::ShutDown && !in_work_item() {
            log::warn!("work item added after the engine shut down, running it now");
            self.flush_work_items();
        }
    }

    /// Queue a graph update, applied by a work item followed by a flood fill
    /// when walkability changed. With batching enabled, updates are
    /// collected and applied together by [`tick`](Self::tick).
    pub fn update_graphs(&self, update: GraphUpdate) {
        self.shared.graph_updates.push(update);
        if !self.shared.config.batch_graph_updates {
            self.schedule_graph_updates(Duration::ZERO);
        }
    }

    /// Apply every pending graph update now, waiting for running searches.
    pub fn flush_graph_updates(&self) {
        self.schedule_graph_updates(Duration::ZERO);
        self.flush_work_items();
    }

    fn schedule_graph_updates(&self, interval: Duration) {
        let updates = &self.shared.graph_updates;
        if let Some(batch) = updates.take_due(interval) {
            self.shared.work_items.push(updates.work_item(batch));
        }
    }

    /// Run every pending work item to completion, waiting for running
    /// searches.
    ///
    /// From inside a work item this does nothing: the running pass picks the
    /// new items up.
    pub fn flush_work_items(&self) {
        if in_work_item() {
            return;
        }
        self.perform_blocking_actions(true);
    }

    /// Run pending work items once no search is in progress. Returns whether
    /// all of them finished.
    fn perform_blocking_actions(&self, force: bool) -> bool {
        if in_work_item() || on_worker_thread() {
            return false;
        }
        let shared = &self.shared;
        if shared.work_items.is_empty() {
            return true;
        }
        shared.queue.block();
        if !self.wait_for_safe_point(force) {
            return false;
        }
        self.drain_returns(true);
        let done = {
            let mut graphs = shared.graphs.write();
            shared.work_items.process(&mut graphs, force)
        };
        if done {
            shared.unblock_if_idle();
        }
        done
    }

    /// With the queue blocked, wait until no searcher is working on a path.
    /// Without `force`, only check once (driving the cooperative searcher a
    /// single tick).
    fn wait_for_safe_point(&self, force: bool) -> bool {
        if self.run_state() != RunState::Running {
            return true;
        }
        let queue = &self.shared.queue;
        loop {
            if queue.is_terminating() {
                return false;
            }
            let blocked = if self.is_cooperative() {
                if !queue.all_receivers_blocked() {
                    self.tick_paths(self.shared.config.max_frame_time);
                }
                queue.all_receivers_blocked()
            } else {
                queue.wait_for_all_blocked(if force { WAIT_INTERVAL } else { Duration::ZERO })
            };
            if blocked || !force {
                return blocked;
            }
        }
    }

    /// Stop all searches and take exclusive access to the graphs.
    ///
    /// Finished paths are delivered before this returns. Searches resume when
    /// the lock is released or dropped. Inside a work item the lock is
    /// granted immediately; use the [`WorkContext`](crate::WorkContext) for
    /// graph access there.
    pub fn pause_for_mutation(&self) -> Result<GraphLock, EngineError> {
        if on_worker_thread() {
            return Err(EngineError::LockFromWorkerThread);
        }
        self.shared.graph_locks.fetch_add(1, Ordering::AcqRel);
        let lock = GraphLock {
            shared: Arc::clone(&self.shared),
            released: false,
        };
        if in_work_item() {
            return Ok(lock);
        }
        self.shared.queue.block();
        if !self.wait_for_safe_point(true) {
            return Err(EngineError::QueueTerminated);
        }
        log::debug!("graph lock acquired");
        self.drain_returns(true);
        Ok(lock)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub fn stats(&self) -> EngineStats {
        let shared = &self.shared;
        EngineStats {
            threads: self.threads,
            paths_submitted: shared.submitted.load(Ordering::Relaxed),
            paths_returned: shared.returned.load(Ordering::Relaxed),
            paths_queued: shared.queue.len(),
            work_items_processed: shared.work_items.processed(),
            graph_updates_applied: shared.graph_updates.applied(),
            paths_allocated: self.pool.created(),
        }
    }

    /// Stop the engine.
    ///
    /// Pending work items and graph updates are applied first. Paths still
    /// queued or in progress fail, and every path's callbacks run before this
    /// returns. Calling it again does nothing.
    pub fn shutdown(&self) {
        if self.run_state() != RunState::Running {
            *self.run_state.lock() = RunState::ShutDown;
            return;
        }
        self.flush_graph_updates();

        let shared = &self.shared;
        shared.queue.terminate();
        for handle in self.workers.lock().drain(..) {
            if handle.join().is_err() {
                log::error!("path worker thread panicked during shutdown");
            }
        }

        let abandoned = self.ticker.lock().take().and_then(|mut t| t.abandon());
        let pending = shared.queue.drain();
        if !pending.is_empty() {
            log::error!("path queue terminated with {} paths pending", pending.len());
        }
        for path in pending {
            path.advance(PathState::Processing);
            path.fail("the engine shut down before the path was searched");
            processor::finish(shared, &path);
        }
        if let Some(path) = abandoned {
            processor::finish(shared, &path);
        }
        self.drain_returns(true);

        *self.run_state.lock() = RunState::ShutDown;
        let stats = self.stats();
        log::info!(
            "navq engine shut down: {} paths submitted, {} returned, {} work items processed",
            stats.paths_submitted,
            stats.paths_returned,
            stats.work_items_processed
        );
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.run_state() == RunState::Running {
            self.shutdown();
        }
    }
}

struct DepthGuard<'a>(&'a AtomicUsize);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Graph lock
// ---------------------------------------------------------------------------

/// Exclusive access to the graphs, from [`Engine::pause_for_mutation`].
///
/// Several locks may be held at once; searches resume when the last one is
/// released.
pub struct GraphLock {
    shared: Arc<Shared>,
    released: bool,
}

impl GraphLock {
    pub fn graphs(&self) -> RwLockReadGuard<'_, GraphSet> {
        self.shared.graphs.read()
    }

    /// # Panics
    ///
    /// Panics inside a work item, which already holds the graphs.
    pub fn graphs_mut(&self) -> RwLockWriteGuard<'_, GraphSet> {
        assert!(
            !in_work_item(),
            "use the work item's context to mutate graphs inside a work item"
        );
        self.shared.graphs.write()
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        if self.shared.graph_locks.fetch_sub(1, Ordering::AcqRel) == 1 {
            log::debug!("graph lock released");
            self.shared.unblock_if_idle();
        }
    }
}

impl Drop for GraphLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use navq_core::{GridGraph, Int3, Neighbours};
    use navq_paths::{CompleteState, ShortestPath};

    use super::*;
    use crate::config::ThreadCount;

    fn engine(threads: ThreadCount) -> Engine {
        let mut graphs = GraphSet::new();
        graphs
            .add_graph(GridGraph::from_ascii(".....\n.....\n.....", 1000, Neighbours::Four).unwrap())
            .unwrap();
        graphs.flood_fill();
        Engine::new(EngineConfig::default().with_threads(threads), graphs)
    }

    fn shortest(e: &Engine) -> Path {
        e.path(ShortestPath::new(Int3::ZERO, Int3::from_world(4, 0, 2)))
    }

    #[test]
    fn submit_requires_start() {
        let e = engine(ThreadCount::None);
        assert_eq!(e.submit(&shortest(&e), false), Err(EngineError::NotStarted));
        e.start().unwrap();
        assert_eq!(e.start(), Err(EngineError::AlreadyStarted));
        e.shutdown();
        assert_eq!(e.submit(&shortest(&e), false), Err(EngineError::QueueTerminated));
    }

    #[test]
    fn cooperative_block_until_calculated() {
        let e = engine(ThreadCount::None);
        e.start().unwrap();
        let p = shortest(&e);
        p.claim(1);
        e.submit(&p, false).unwrap();
        assert_eq!(p.id(), Some(1));
        e.block_until_calculated(&p).unwrap();
        assert_eq!(p.state(), PathState::Returned);
        assert_eq!(p.complete_state(), CompleteState::Complete);
        assert_eq!(p.nodes().len(), 7);
        assert_eq!(e.stats().paths_returned, 1);
        p.release(1, false);
    }

    #[test]
    fn threaded_block_until_calculated() {
        let e = engine(ThreadCount::Fixed(2));
        e.start().unwrap();
        let p = shortest(&e);
        p.claim(1);
        e.submit(&p, false).unwrap();
        e.block_until_calculated(&p).unwrap();
        assert_eq!(p.complete_state(), CompleteState::Complete);
        p.release(1, false);
        e.shutdown();
    }

    #[test]
    #[should_panic(expected = "already submitted")]
    fn resubmitting_panics() {
        let e = engine(ThreadCount::None);
        e.start().unwrap();
        let p = shortest(&e);
        e.submit(&p, false).unwrap();
        let _ = e.submit(&p, false);
    }

    #[test]
    fn graph_lock_blocks_searches_until_released() {
        let e = engine(ThreadCount::None);
        e.start().unwrap();
        let lock = e.pause_for_mutation().unwrap();
        let p = shortest(&e);
        p.claim(1);
        e.submit(&p, false).unwrap();
        e.tick();
        assert_eq!(p.state(), PathState::PathQueue);
        lock.graphs_mut()
            .graph_mut(0)
            .and_then(|g| g.as_grid_mut())
            .unwrap()
            .set_walkable(2, 1, false);
        lock.release();
        e.block_until_calculated(&p).unwrap();
        assert_eq!(p.complete_state(), CompleteState::Complete);
        p.release(1, false);
    }
}
