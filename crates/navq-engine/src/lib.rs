//! **navq-engine**: schedules path requests over navq graphs.
//!
//! A [`Path`] travels through a fixed pipeline:
//!
//! 1. [`Engine::submit`] queues it on the [`PathQueue`];
//! 2. a searcher takes it and runs its search, either on a worker thread or
//!    from [`Engine::tick`] when the engine is cooperative;
//! 3. its immediate callback runs on the searching thread and the path goes
//!    to the [`ReturnQueue`];
//! 4. `tick` drains the return queue on the owning thread, running deferred
//!    callbacks within a time slice.
//!
//! Graphs are shared by all searches and only mutated while none runs, by
//! [`WorkItem`]s, [`GraphUpdate`](navq_core::GraphUpdate)s applied through
//! [`Engine::update_graphs`], or under a [`GraphLock`].
//!
//! ```no_run
//! use navq_core::{GraphSet, GridGraph, Int3, Neighbours};
//! use navq_engine::{Engine, EngineConfig};
//! use navq_paths::ShortestPath;
//!
//! let mut graphs = GraphSet::new();
//! graphs.add_graph(GridGraph::new(32, 32, 1000, Neighbours::Eight).unwrap()).unwrap();
//! graphs.flood_fill();
//!
//! let engine = Engine::new(EngineConfig::default(), graphs);
//! engine.start().unwrap();
//! let path = engine.path(ShortestPath::new(Int3::ZERO, Int3::from_world(20, 0, 31)));
//! path.set_callback(|p| println!("{} nodes", p.nodes().len()));
//! engine.submit(&path, false).unwrap();
//! engine.block_until_calculated(&path).unwrap();
//! ```

mod config;
mod engine;
mod error;
mod graph_updates;
mod id;
mod path;
mod pool;
mod processor;
mod queue;
mod return_queue;
mod work_items;

pub use config::{EngineConfig, PathLog, ThreadCount};
pub use engine::{Engine, EngineStats, GraphLock};
pub use error::EngineError;
pub use id::{PathIdAllocator, SearchTag};
pub use path::{ENGINE_OWNER, Path, PathCallback, PathState};
pub use pool::PathPool;
pub use processor::on_worker_thread;
pub use queue::PathQueue;
pub use return_queue::ReturnQueue;
pub use work_items::{WorkContext, WorkItem, in_work_item};
