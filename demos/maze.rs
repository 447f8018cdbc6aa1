//! Paths through an ASCII maze, searched on worker threads and then
//! cooperatively.
//!
//! Run: cargo run --bin maze [-- -v]

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use navq_core::{Bounds, GraphSet, GridGraph, GraphUpdate, Int3, Neighbours};
use navq_engine::{Engine, EngineConfig, PathLog, ThreadCount};
use navq_paths::{Heuristic, ShortestPath};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::filter::LevelFilter;

const MAZE: &str = "
........#.........#.....
.######.#.#######.#.###.
.#......#.#.....#...#...
.#.######.#.###.#####.#.
.#........#...#.......#.
.##########.#.#########.
............#.....5555..
.############.###.#####.
.#...........#....#.....
.#.#########.#.####.###.
...#.........#......#...
";

const REQUESTS: usize = 200;

fn graphs() -> Result<GraphSet, Box<dyn Error>> {
    let mut graphs = GraphSet::new();
    graphs.add_graph(GridGraph::from_ascii(MAZE, 1000, Neighbours::Eight)?)?;
    graphs.flood_fill();
    Ok(graphs)
}

fn walkable_cells(graphs: &GraphSet) -> Vec<Int3> {
    let mut cells = Vec::new();
    graphs.for_each_node(|n| {
        if n.walkable {
            cells.push(n.position);
        }
    });
    cells
}

/// Submit `REQUESTS` random paths and wait for all of them.
fn run(engine: &Engine, seed: u64) -> Result<(), Box<dyn Error>> {
    let cells = walkable_cells(&engine.graphs());
    let mut rng = StdRng::seed_from_u64(seed);
    let found = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let mut paths = Vec::with_capacity(REQUESTS);
    for _ in 0..REQUESTS {
        let from = cells[rng.random_range(0..cells.len())];
        let to = cells[rng.random_range(0..cells.len())];
        let path = engine.path(ShortestPath::new(from, to));
        let found = Arc::clone(&found);
        path.set_callback(move |p| {
            if !p.error() {
                found.fetch_add(1, Ordering::Relaxed);
            }
        });
        engine.submit(&path, false)?;
        paths.push(path);
    }
    for path in &paths {
        engine.tick();
        engine.block_until_calculated(path)?;
    }

    let stats = engine.stats();
    println!(
        "{:>11}: {} of {REQUESTS} paths found in {:.1} ms ({} requests allocated)",
        if engine.is_cooperative() { "cooperative" } else { "threaded" },
        found.load(Ordering::Relaxed),
        start.elapsed().as_secs_f64() * 1000.0,
        stats.paths_allocated,
    );
    Ok(())
}

/// Draw the maze with `path` marked on it.
fn render(graphs: &GraphSet, path: &[Int3]) -> String {
    let Some(grid) = graphs.graph(0).and_then(|g| g.as_grid()) else {
        return String::new();
    };
    let mut out = String::new();
    for z in 0..grid.depth() as i32 {
        for x in 0..grid.width() as i32 {
            let ch = match grid.node_at(x, z) {
                Some(_) if path.contains(&Int3::from_world(x, 0, z)) => '*',
                Some(n) if !n.walkable => '#',
                Some(n) if n.penalty > 0 => '~',
                _ => '.',
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

fn main() -> Result<(), Box<dyn Error>> {
    let verbose = std::env::args().any(|a| a == "-v");
    // The subscriber also forwards `log` records from the engine.
    tracing_subscriber::fmt()
        .with_max_level(if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO })
        .with_writer(std::io::stderr)
        .init();

    let threaded = Engine::new(
        EngineConfig {
            path_log: PathLog::OnlyErrors,
            ..EngineConfig::default()
        },
        graphs()?,
    );
    threaded.start()?;
    run(&threaded, 1)?;
    threaded.shutdown();

    let cooperative = Engine::new(
        EngineConfig {
            threads: ThreadCount::None,
            heuristic: Heuristic::DiagonalManhattan,
            path_log: PathLog::OnlyErrors,
            ..EngineConfig::default()
        },
        graphs()?,
    );
    cooperative.start()?;
    run(&cooperative, 1)?;

    // Wall off the middle of a path, then search again.
    let from = Int3::from_world(0, 0, 0);
    let to = Int3::from_world(23, 0, 10);
    let before = cooperative.path(ShortestPath::new(from, to));
    cooperative.submit(&before, true)?;
    cooperative.block_until_calculated(&before)?;

    let route = before.vector_path();
    if let Some(&middle) = route.get(route.len() / 2) {
        log::info!("blocking {middle} on the route");
        cooperative.update_graphs(GraphUpdate::new(Bounds::new(middle, middle)).with_walkable(false));
        cooperative.flush_graph_updates();
    }
    let after = cooperative.path(ShortestPath::new(from, to));
    cooperative.submit(&after, true)?;
    cooperative.block_until_calculated(&after)?;

    println!("\nbefore the update: {} nodes", before.nodes().len());
    print!("{}", render(&cooperative.graphs(), &before.vector_path()));
    if after.error() {
        println!("\nafter the update: {}", after.error_log());
    } else {
        println!("\nafter the update: {} nodes", after.nodes().len());
    }
    print!("{}", render(&cooperative.graphs(), &after.vector_path()));
    cooperative.shutdown();
    Ok(())
}
