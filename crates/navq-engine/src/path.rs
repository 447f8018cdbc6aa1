//! [`Path`]: a shared handle to one search request.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use navq_core::{Int3, NodeIndex};
use navq_paths::{CompleteState, Search, SearchKind, SearchParams};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::id::SearchTag;
use crate::pool::PoolInner;

/// Owner token the engine claims paths with while they are in flight.
/// Reserved: user code must not claim with it.
pub const ENGINE_OWNER: u64 = u64::MAX;

/// A completion callback.
pub type PathCallback = Box<dyn FnOnce(&Path) + Send>;

/// Where a path is in the engine's pipeline. Only ever moves forward.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PathState {
    #[default]
    Created,
    /// Submitted, waiting for a worker.
    PathQueue,
    Processing,
    /// Searched, waiting for the owning thread to drain it.
    ReturnQueue,
    /// Callbacks have run.
    Returned,
}

/// Mutable request data, guarded by the path's lock.
pub(crate) struct PathData {
    pub(crate) search: Search,
    pub(crate) tag: Option<SearchTag>,
    claims: Vec<u64>,
    released: bool,
    pub(crate) immediate_callback: Option<PathCallback>,
    pub(crate) callback: Option<PathCallback>,
}

impl PathData {
    fn new(search: Search) -> Self {
        Self {
            search,
            tag: None,
            claims: Vec::new(),
            released: false,
            immediate_callback: None,
            callback: None,
        }
    }
}

pub(crate) struct PathShared {
    generation: AtomicU64,
    pipeline: Mutex<PathState>,
    changed: Condvar,
    data: Mutex<PathData>,
    pool: Weak<PoolInner>,
}

impl PathShared {
    pub(crate) fn new(search: Search, pool: Weak<PoolInner>) -> Self {
        Self {
            generation: AtomicU64::new(0),
            pipeline: Mutex::new(PathState::Created),
            changed: Condvar::new(),
            data: Mutex::new(PathData::new(search)),
            pool,
        }
    }

    /// Prepare a pooled instance for a new request. Returns its new
    /// generation.
    pub(crate) fn reuse(&self, kind: SearchKind, params: SearchParams) -> u64 {
        {
            let mut data = self.data.lock();
            data.search.reset(kind);
            *data.search.params_mut() = params;
            data.tag = None;
            data.claims.clear();
            data.released = false;
            data.immediate_callback = None;
            data.callback = None;
        }
        *self.pipeline.lock() = PathState::Created;
        self.generation.load(Ordering::Acquire)
    }
}

/// A search request shared between the caller and the engine.
///
/// Cloning the handle does not copy the request. Paths created by an
/// [`Engine`](crate::Engine) come from a pool: once every claim has been
/// released, and at least one of the releases was not silent, the request
/// goes back to the pool and all remaining handles become stale. Using a
/// stale handle panics.
#[derive(Clone)]
pub struct Path {
    shared: Arc<PathShared>,
    generation: u64,
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("generation", &self.generation)
            .field("state", &*self.shared.pipeline.lock())
            .finish_non_exhaustive()
    }
}

impl Path {
    /// A standalone, unpooled request with default parameters.
    pub fn new(kind: impl Into<SearchKind>) -> Self {
        Self::with_params(kind, SearchParams::default())
    }

    pub fn with_params(kind: impl Into<SearchKind>, params: SearchParams) -> Self {
        Self::from_shared(Arc::new(PathShared::new(Search::with_params(kind, params), Weak::new())), 0)
    }

    pub(crate) fn from_shared(shared: Arc<PathShared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Whether the request went back to the pool since this handle was made.
    pub fn is_stale(&self) -> bool {
        self.shared.generation.load(Ordering::Acquire) != self.generation
    }

    pub(crate) fn pool(&self) -> &Weak<PoolInner> {
        &self.shared.pool
    }

    /// Lock the request data, or `None` if the handle is stale. The
    /// generation is checked under the lock, which is also held while a
    /// release bumps it.
    pub(crate) fn try_data(&self) -> Option<MutexGuard<'_, PathData>> {
        let data = self.shared.data.lock();
        (self.shared.generation.load(Ordering::Acquire) == self.generation).then_some(data)
    }

    /// Lock the request data.
    pub(crate) fn data(&self) -> MutexGuard<'_, PathData> {
        match self.try_data() {
            Some(data) => data,
            None => panic!("stale path handle: the request was returned to the pool"),
        }
    }

    /// Whether two handles refer to the same request.
    pub fn same_as(&self, other: &Path) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.generation == other.generation
    }

    // -----------------------------------------------------------------------
    // Pipeline state
    // -----------------------------------------------------------------------

    pub fn state(&self) -> PathState {
        *self.shared.pipeline.lock()
    }

    /// Move the path forward to `state`. Moving to an earlier or equal state
    /// does nothing.
    pub(crate) fn advance(&self, state: PathState) {
        let mut current = self.shared.pipeline.lock();
        if state > *current {
            *current = state;
            self.shared.changed.notify_all();
        }
    }

    /// Wait until the path reaches at least `state` or `timeout` passes.
    pub(crate) fn wait_for_state(&self, state: PathState, timeout: Duration) -> bool {
        let mut current = self.shared.pipeline.lock();
        if *current < state {
            self.shared.changed.wait_for(&mut current, timeout);
        }
        *current >= state
    }

    // -----------------------------------------------------------------------
    // Claims
    // -----------------------------------------------------------------------

    /// Register `owner` as interested in this path.
    ///
    /// # Panics
    ///
    /// Panics if `owner` already holds a claim, or if the handle is stale.
    pub fn claim(&self, owner: u64) {
        let mut data = self.data();
        assert!(
            !data.claims.contains(&owner),
            "path is already claimed by owner {owner}"
        );
        data.claims.push(owner);
    }

    /// Drop the claim held by `owner`.
    ///
    /// A silent release never makes the path eligible for pooling on its
    /// own: at least one release must be non-silent.
    ///
    /// # Panics
    ///
    /// Panics if `owner` holds no claim, or if the handle is stale.
    pub fn release(&self, owner: u64, silent: bool) {
        let pool = {
            let mut data = self.data();
            let Some(i) = data.claims.iter().position(|&o| o == owner) else {
                panic!("path released by owner {owner} without a matching claim");
            };
            data.claims.swap_remove(i);
            if !silent {
                data.released = true;
            }
            if !data.claims.is_empty() || !data.released {
                return;
            }
            let Some(pool) = self.shared.pool.upgrade() else {
                return;
            };
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            pool
        };
        pool.recycle(Arc::clone(&self.shared));
    }

    /// Number of claims currently held.
    pub fn claim_count(&self) -> usize {
        self.data().claims.len()
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    /// Called on the owning thread when the engine drains the path.
    pub fn set_callback(&self, f: impl FnOnce(&Path) + Send + 'static) {
        self.data().callback = Some(Box::new(f));
    }

    /// Called on the worker that searched the path, as soon as it is done.
    pub fn set_immediate_callback(&self, f: impl FnOnce(&Path) + Send + 'static) {
        self.data().immediate_callback = Some(Box::new(f));
    }

    // -----------------------------------------------------------------------
    // Request and results
    // -----------------------------------------------------------------------

    /// Request ID, once submitted.
    pub fn id(&self) -> Option<u16> {
        self.data().tag.map(|t| t.id)
    }

    /// Run `f` on the underlying search.
    pub fn with_search<R>(&self, f: impl FnOnce(&Search) -> R) -> R {
        f(&self.data().search)
    }

    /// Edit the search before submission.
    ///
    /// # Panics
    ///
    /// Panics if the path was already submitted.
    pub fn with_search_mut<R>(&self, f: impl FnOnce(&mut Search) -> R) -> R {
        assert_eq!(self.state(), PathState::Created, "cannot edit a submitted path");
        f(&mut self.data().search)
    }

    pub fn complete_state(&self) -> CompleteState {
        self.data().search.state()
    }

    /// Whether the search failed. Only meaningful once the path has been
    /// searched.
    pub fn error(&self) -> bool {
        self.data().search.error()
    }

    pub fn error_log(&self) -> String {
        self.data().search.error_log().to_owned()
    }

    pub fn nodes(&self) -> Vec<NodeIndex> {
        self.data().search.path().to_vec()
    }

    pub fn vector_path(&self) -> Vec<Int3> {
        self.data().search.vector_path().to_vec()
    }

    pub fn searched_nodes(&self) -> u32 {
        self.data().search.searched_nodes()
    }

    pub fn duration(&self) -> Duration {
        self.data().search.duration()
    }

    /// Fail the path. An error is sticky: the search cannot succeed
    /// afterwards.
    pub fn fail(&self, msg: &str) {
        self.data().search.fail(msg);
    }
}
