#![allow(dead_code)]

use std::time::{Duration, Instant};

use navq_core::{GraphSet, GridGraph, Int3, Neighbours};
use navq_engine::{Engine, EngineConfig, Path, PathState, ThreadCount};
use navq_paths::ShortestPath;

pub fn graphs(map: &str, neighbours: Neighbours) -> GraphSet {
    let mut graphs = GraphSet::new();
    graphs
        .add_graph(GridGraph::from_ascii(map, 1000, neighbours).unwrap())
        .unwrap();
    graphs.flood_fill();
    graphs
}

pub fn open_graphs(width: usize, depth: usize) -> GraphSet {
    let mut graphs = GraphSet::new();
    graphs
        .add_graph(GridGraph::new(width, depth, 1000, Neighbours::Eight).unwrap())
        .unwrap();
    graphs.flood_fill();
    graphs
}

pub fn started(threads: ThreadCount, graphs: GraphSet) -> Engine {
    let engine = Engine::new(EngineConfig::default().with_threads(threads), graphs);
    engine.start().unwrap();
    engine
}

pub fn cell(x: i32, z: i32) -> Int3 {
    Int3::from_world(x, 0, z)
}

pub fn shortest(engine: &Engine, from: (i32, i32), to: (i32, i32)) -> Path {
    engine.path(ShortestPath::new(cell(from.0, from.1), cell(to.0, to.1)))
}

/// Tick until every path is returned.
pub fn tick_until_returned(engine: &Engine, paths: &[Path]) {
    let deadline = Instant::now() + Duration::from_secs(20);
    while !paths.iter().all(|p| p.state() == PathState::Returned) {
        assert!(Instant::now() < deadline, "paths were not returned in time");
        engine.tick();
        std::thread::sleep(Duration::from_millis(1));
    }
}
