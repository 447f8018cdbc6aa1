mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{cell, graphs, open_graphs, shortest, started, tick_until_returned};
use navq_core::{GraphNode, Neighbours};
use navq_engine::{Engine, EngineConfig, EngineError, Path, PathState, ThreadCount};
use navq_paths::{CompleteState, ShortestPath, TagRules, TraversalProvider};

const WALLED: &str = "
.....
#####
.....
";

fn both_modes() -> [ThreadCount; 2] {
    [ThreadCount::None, ThreadCount::Fixed(2)]
}

#[test]
fn diagonal_grid_path_is_complete() {
    for threads in both_modes() {
        let engine = started(threads, open_graphs(5, 5));
        let path = shortest(&engine, (0, 0), (4, 4));
        engine.submit(&path, false).unwrap();
        tick_until_returned(&engine, std::slice::from_ref(&path));
        assert_eq!(path.complete_state(), CompleteState::Complete);
        assert_eq!(path.nodes().len(), 5, "{threads:?}");
        assert_eq!(path.vector_path().last(), Some(&cell(4, 4)));
        assert!(path.searched_nodes() > 0);
        engine.shutdown();
    }
}

#[test]
fn unreachable_target_fails_with_a_log() {
    for threads in both_modes() {
        let engine = started(threads, graphs(WALLED, Neighbours::Eight));
        let path = shortest(&engine, (0, 0), (0, 2));
        engine.submit(&path, false).unwrap();
        engine.block_until_calculated(&path).unwrap();
        assert!(path.error());
        assert!(!path.error_log().is_empty());
        assert!(path.nodes().is_empty());
        assert!(path.vector_path().is_empty());
    }
}

#[test]
fn callbacks_run_exactly_once() {
    for threads in both_modes() {
        let engine = started(threads, open_graphs(8, 8));
        let immediate = Arc::new(AtomicUsize::new(0));
        let deferred = Arc::new(AtomicUsize::new(0));
        let paths: Vec<_> = (0..20)
            .map(|i| {
                let p = shortest(&engine, (0, 0), (i % 8, 7));
                let (a, b) = (Arc::clone(&immediate), Arc::clone(&deferred));
                p.set_immediate_callback(move |p| {
                    assert_eq!(p.state(), PathState::Processing);
                    a.fetch_add(1, Ordering::SeqCst);
                });
                p.set_callback(move |p| {
                    assert_eq!(p.state(), PathState::Returned);
                    b.fetch_add(1, Ordering::SeqCst);
                });
                engine.submit(&p, false).unwrap();
                p
            })
            .collect();
        tick_until_returned(&engine, &paths);
        for _ in 0..5 {
            engine.tick();
        }
        assert_eq!(immediate.load(Ordering::SeqCst), 20);
        assert_eq!(deferred.load(Ordering::SeqCst), 20);
        assert!(paths.iter().all(|p| p.claim_count() == 0));
        let stats = engine.stats();
        assert_eq!((stats.paths_submitted, stats.paths_returned), (20, 20));
    }
}

#[test]
fn failed_paths_still_get_callbacks() {
    let engine = started(ThreadCount::None, graphs(WALLED, Neighbours::Four));
    let calls = Arc::new(AtomicUsize::new(0));
    let path = shortest(&engine, (4, 0), (4, 2));
    let c = Arc::clone(&calls);
    path.set_callback(move |p| {
        assert!(p.error());
        c.fetch_add(1, Ordering::SeqCst);
    });
    engine.submit(&path, false).unwrap();
    engine.block_until_calculated(&path).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn submit_outside_the_running_window() {
    let engine = Engine::new(EngineConfig::cooperative(), open_graphs(3, 3));
    let early = shortest(&engine, (0, 0), (2, 2));
    assert_eq!(engine.submit(&early, false), Err(EngineError::NotStarted));
    assert_eq!(early.state(), PathState::Created);

    engine.start().unwrap();
    engine.shutdown();
    engine.shutdown();
    assert_eq!(engine.submit(&early, false), Err(EngineError::QueueTerminated));
    assert_eq!(engine.start(), Err(EngineError::QueueTerminated));
}

#[test]
fn cooperative_shutdown_fails_pending_paths() {
    let engine = started(ThreadCount::None, open_graphs(6, 6));
    let calls = Arc::new(AtomicUsize::new(0));
    let paths: Vec<_> = (0..3)
        .map(|i| {
            let p = shortest(&engine, (0, 0), (5, i));
            let c = Arc::clone(&calls);
            p.set_callback(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });
            engine.submit(&p, false).unwrap();
            p
        })
        .collect();
    engine.shutdown();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    for p in &paths {
        assert_eq!(p.state(), PathState::Returned);
        assert!(p.error());
        assert!(p.error_log().contains("shut down"), "{}", p.error_log());
    }
}

#[test]
fn threaded_shutdown_fails_paths_held_back_by_a_graph_lock() {
    let engine = started(ThreadCount::Fixed(3), open_graphs(6, 6));
    let lock = engine.pause_for_mutation().unwrap();
    let paths: Vec<_> = (0..4)
        .map(|i| {
            let p = shortest(&engine, (0, 0), (i, 5));
            engine.submit(&p, false).unwrap();
            p
        })
        .collect();
    engine.shutdown();
    drop(lock);
    for p in &paths {
        assert_eq!(p.state(), PathState::Returned);
        assert!(p.error());
    }
    assert_eq!(engine.stats().paths_returned, 4);
}

#[test]
fn block_until_calculated_nests_inside_callbacks() {
    let engine = Arc::new(started(ThreadCount::None, open_graphs(6, 6)));
    let inner = engine.path(ShortestPath::new(cell(0, 0), cell(5, 5)));
    let outer = shortest(&engine, (5, 0), (0, 5));
    {
        let (engine, inner) = (Arc::clone(&engine), inner.clone());
        outer.set_callback(move |_| {
            engine.submit(&inner, true).unwrap();
            engine.block_until_calculated(&inner).unwrap();
        });
    }
    engine.submit(&outer, false).unwrap();
    engine.block_until_calculated(&outer).unwrap();
    assert_eq!(inner.state(), PathState::Returned);
    assert_eq!(inner.complete_state(), CompleteState::Complete);
    engine.shutdown();
}

#[test]
fn paths_from_elsewhere_fail_without_a_search() {
    let engine = started(ThreadCount::None, open_graphs(3, 3));
    let foreign = Path::new(ShortestPath::new(cell(0, 0), cell(2, 2)));
    engine.submit(&foreign, false).unwrap();
    engine.block_until_calculated(&foreign).unwrap();
    assert!(foreign.error());
    assert_eq!(foreign.searched_nodes(), 0);
    assert!(foreign.error_log().contains("not created by this engine"));
}

struct Exploding;

impl TraversalProvider for Exploding {
    fn can_traverse(&self, _rules: &TagRules, _node: &GraphNode) -> bool {
        panic!("traversal check exploded");
    }
}

#[test]
fn a_panicking_search_still_returns_its_path() {
    for threads in [ThreadCount::None, ThreadCount::Fixed(1)] {
        let engine = started(threads, open_graphs(4, 4));
        let mut params = engine.default_params();
        params.traversal = Some(Arc::new(Exploding));
        let path = engine.path_with(ShortestPath::new(cell(0, 0), cell(3, 3)), params);
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        path.set_callback(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        engine.submit(&path, false).unwrap();
        engine.block_until_calculated(&path).unwrap();
        assert_eq!(path.state(), PathState::Returned, "{threads:?}");
        assert!(path.error());
        assert!(path.error_log().contains("panicked"), "{}", path.error_log());
        assert_eq!(path.claim_count(), 0);

        let later = shortest(&engine, (0, 0), (1, 1));
        assert_eq!(engine.submit(&later, false), Err(EngineError::QueueTerminated));
        engine.shutdown();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
