use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use navq_paths::{Search, SearchKind, SearchParams};
use parking_lot::Mutex;

use crate::path::{Path, PathShared};

pub(crate) struct PoolInner {
    free: Mutex<Vec<Arc<PathShared>>>,
    created: AtomicUsize,
}

impl PoolInner {
    pub(crate) fn recycle(&self, shared: Arc<PathShared>) {
        self.free.lock().push(shared);
    }
}

/// Recycles path requests so that their buffers are reused.
#[derive(Clone)]
pub struct PathPool {
    inner: Arc<PoolInner>,
}

impl Default for PathPool {
    fn default() -> Self {
        Self::new()
    }
}

impl PathPool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                created: AtomicUsize::new(0),
            }),
        }
    }

    /// A fresh request: pipeline state `Created`, no claims, no callbacks
    /// and no results.
    pub fn get(&self, kind: impl Into<SearchKind>, params: SearchParams) -> Path {
        let kind = kind.into();
        let recycled = self.inner.free.lock().pop();
        match recycled {
            Some(shared) => {
                let generation = shared.reuse(kind, params);
                Path::from_shared(shared, generation)
            }
            None => {
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                let shared = PathShared::new(Search::with_params(kind, params), Arc::downgrade(&self.inner));
                Path::from_shared(Arc::new(shared), 0)
            }
        }
    }

    /// Whether `path` was handed out by this pool.
    pub fn owns(&self, path: &Path) -> bool {
        std::ptr::eq(path.pool().as_ptr(), Arc::as_ptr(&self.inner))
    }

    /// Requests allocated so far.
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::Relaxed)
    }

    /// Requests waiting for reuse.
    pub fn available(&self) -> usize {
        self.inner.free.lock().len()
    }
}
