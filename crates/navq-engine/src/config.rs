//! Engine configuration.

use std::time::Duration;

use navq_paths::Heuristic;

/// Number of path worker threads.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThreadCount {
    /// No threads: searches run inside [`Engine::tick`](crate::Engine::tick).
    None,
    Fixed(usize),
    /// One less than the available parallelism, between 1 and 16.
    #[default]
    Automatic,
}

impl ThreadCount {
    /// Number of threads to spawn. 0 means cooperative mode.
    pub fn resolve(self) -> usize {
        match self {
            Self::None => 0,
            Self::Fixed(n) => n,
            Self::Automatic => std::thread::available_parallelism()
                .map_or(1, |n| n.get().saturating_sub(1))
                .clamp(1, 16),
        }
    }
}

/// How much is logged about finished paths.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathLog {
    None,
    /// Failed paths only.
    OnlyErrors,
    /// Failures as warnings, successes at debug level.
    #[default]
    Normal,
    /// Every path at info level, with search statistics.
    Heavy,
}

/// Settings for an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct EngineConfig {
    pub threads: ThreadCount,
    /// Time budget of one cooperative tick, and the step deadline used by
    /// worker threads (which never use less than 10 ms).
    pub max_frame_time: Duration,
    /// Time spent draining finished paths per tick.
    pub return_time_slice: Duration,
    /// Finished paths drained per tick even when the time slice is spent.
    pub min_returns_per_drain: usize,
    /// Points further than this from the graph fail to snap to a node.
    pub max_nearest_node_distance: u32,
    /// Heuristic given to new paths.
    pub heuristic: Heuristic,
    pub heuristic_scale: f32,
    pub path_log: PathLog,
    /// Collect graph updates and apply them together at most once per
    /// `graph_update_batching_interval`.
    pub batch_graph_updates: bool,
    pub graph_update_batching_interval: Duration,
    /// Nesting depth of `block_until_calculated` above which a warning is
    /// logged.
    pub max_block_depth_warning: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: ThreadCount::default(),
            max_frame_time: Duration::from_millis(10),
            return_time_slice: Duration::from_millis(1),
            min_returns_per_drain: 5,
            max_nearest_node_distance: 100 * navq_core::INT_PRECISION as u32,
            heuristic: Heuristic::default(),
            heuristic_scale: 1.0,
            path_log: PathLog::default(),
            batch_graph_updates: false,
            graph_update_batching_interval: Duration::from_millis(200),
            max_block_depth_warning: 5,
        }
    }
}

impl EngineConfig {
    /// A configuration with no worker threads.
    pub fn cooperative() -> Self {
        Self {
            threads: ThreadCount::None,
            ..Self::default()
        }
    }

    pub fn with_threads(mut self, threads: ThreadCount) -> Self {
        self.threads = threads;
        self
    }

    /// Step deadline for worker threads.
    pub(crate) fn thread_step_time(&self) -> Duration {
        self.max_frame_time.max(Duration::from_millis(10))
    }
}
