//! Graph mutations deferred until no search is running.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use navq_core::GraphSet;
use parking_lot::Mutex;

type InitFn = Box<dyn FnOnce(&mut WorkContext<'_>) + Send>;
type UpdateFn = Box<dyn FnMut(&mut WorkContext<'_>, bool) -> bool + Send>;

/// A unit of graph mutation.
///
/// `init` runs once, then `update` runs until it returns `true`. The second
/// argument of `update` is `force`: when set the engine is waiting for the
/// item and will call it again immediately, so it should finish as soon as
/// possible. Otherwise it is called once per tick. Work items cannot be
/// cancelled.
pub struct WorkItem {
    init: Option<InitFn>,
    update: UpdateFn,
}

impl WorkItem {
    pub fn new(update: impl FnMut(&mut WorkContext<'_>, bool) -> bool + Send + 'static) -> Self {
        Self {
            init: None,
            update: Box::new(update),
        }
    }

    pub fn with_init(
        init: impl FnOnce(&mut WorkContext<'_>) + Send + 'static,
        update: impl FnMut(&mut WorkContext<'_>, bool) -> bool + Send + 'static,
    ) -> Self {
        Self {
            init: Some(Box::new(init)),
            update: Box::new(update),
        }
    }

    /// A work item that completes in one call.
    pub fn once(f: impl FnOnce(&mut WorkContext<'_>) + Send + 'static) -> Self {
        let mut f = Some(f);
        Self::new(move |ctx, _| {
            if let Some(f) = f.take() {
                f(ctx);
            }
            true
        })
    }
}

/// What a work item may touch while it runs.
pub struct WorkContext<'a> {
    graphs: &'a mut GraphSet,
    flood_fill_queued: &'a mut bool,
}

impl WorkContext<'_> {
    pub fn graphs(&self) -> &GraphSet {
        &*self.graphs
    }

    pub fn graphs_mut(&mut self) -> &mut GraphSet {
        &mut *self.graphs
    }

    /// Recompute connected areas once every queued work item is done.
    pub fn queue_flood_fill(&mut self) {
        *self.flood_fill_queued = true;
    }

    /// Recompute connected areas now if they are stale.
    pub fn ensure_valid_flood_fill(&mut self) {
        if *self.flood_fill_queued || !self.graphs.areas_valid() {
            self.graphs.flood_fill();
            *self.flood_fill_queued = false;
        }
    }
}

thread_local! {
    static IN_WORK_ITEM: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is running a work item.
pub fn in_work_item() -> bool {
    IN_WORK_ITEM.with(Cell::get)
}

struct WorkItemScope {
    outer: bool,
}

impl WorkItemScope {
    fn enter() -> Self {
        Self {
            outer: IN_WORK_ITEM.with(|f| f.replace(true)),
        }
    }
}

impl Drop for WorkItemScope {
    fn drop(&mut self) {
        IN_WORK_ITEM.with(|f| f.set(self.outer));
    }
}

/// Pending work items.
#[derive(Default)]
pub(crate) struct WorkItems {
    queue: Mutex<VecDeque<WorkItem>>,
    flood_fill_queued: AtomicBool,
    processed: AtomicU64,
}

impl WorkItems {
    pub(crate) fn push(&self, item: WorkItem) {
        self.queue.lock().push_back(item);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub(crate) fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Run queued items against `graphs`. Items added while processing are
    /// run in the same pass. Returns `true` when nothing is left.
    ///
    /// Without `force`, an item that does not finish stays at the head of
    /// the queue until the next call.
    pub(crate) fn process(&self, graphs: &mut GraphSet, force: bool) -> bool {
        let _scope = WorkItemScope::enter();
        let mut flood = self.flood_fill_queued.swap(false, Ordering::AcqRel);
        let mut empty = true;

        loop {
            let next = self.queue.lock().pop_front();
            let Some(mut item) = next else {
                break;
            };
            let mut ctx = WorkContext {
                graphs: &mut *graphs,
                flood_fill_queued: &mut flood,
            };
            if let Some(init) = item.init.take() {
                init(&mut ctx);
            }
            let done = loop {
                if (item.update)(&mut ctx, force) {
                    break true;
                }
                if !force {
                    break false;
                }
            };
            if done {
                self.processed.fetch_add(1, Ordering::Relaxed);
            } else {
                self.queue.lock().push_front(item);
                empty = false;
                break;
            }
        }

        if empty && flood {
            graphs.flood_fill();
            flood = false;
        }
        self.flood_fill_queued.store(flood, Ordering::Release);
        empty
    }
}
