use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use navq_core::GraphUpdate;
use parking_lot::Mutex;

use crate::work_items::WorkItem;

struct Pending {
    updates: Vec<GraphUpdate>,
    last_scheduled: Instant,
}

/// Graph updates waiting to be turned into a work item.
pub(crate) struct GraphUpdates {
    pending: Mutex<Pending>,
    applied: Arc<AtomicU64>,
}

impl GraphUpdates {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(Pending {
                updates: Vec::new(),
                last_scheduled: Instant::now(),
            }),
            applied: Arc::new(AtomicU64::new(0)),
        }
    }

    pub(crate) fn push(&self, update: GraphUpdate) {
        self.pending.lock().updates.push(update);
    }

    pub(crate) fn applied(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }

    /// Take pending updates if at least `interval` passed since the last
    /// batch. A zero interval takes them whenever there are any.
    pub(crate) fn take_due(&self, interval: Duration) -> Option<Vec<GraphUpdate>> {
        let mut pending = self.pending.lock();
        if pending.updates.is_empty() || pending.last_scheduled.elapsed() < interval {
            return None;
        }
        pending.last_scheduled = Instant::now();
        Some(std::mem::take(&mut pending.updates))
    }

    /// A work item applying `updates` in order, followed by a flood fill if
    /// walkability changed.
    pub(crate) fn work_item(&self, updates: Vec<GraphUpdate>) -> WorkItem {
        let applied = Arc::clone(&self.applied);
        WorkItem::once(move |ctx| {
            let mut walkability_changed = false;
            for update in &updates {
                walkability_changed |= ctx.graphs_mut().apply_update(update);
            }
            applied.fetch_add(updates.len() as u64, Ordering::Relaxed);
            log::debug!(
                "applied {} graph updates, walkability changed: {walkability_changed}",
                updates.len()
            );
            if walkability_changed {
                ctx.queue_flood_fill();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use navq_core::{Bounds, Int3};

    use super::*;

    fn update() -> GraphUpdate {
        GraphUpdate::new(Bounds::new(Int3::ZERO, Int3::ZERO)).with_walkable(false)
    }

    #[test]
    fn batches_wait_for_the_interval() {
        let u = GraphUpdates::new();
        u.push(update());
        assert!(u.take_due(Duration::from_secs(3600)).is_none());
        let batch = u.take_due(Duration::ZERO).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(u.take_due(Duration::ZERO).is_none());
    }
}
