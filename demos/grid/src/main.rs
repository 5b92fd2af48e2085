//! grid: commuters on a synthetic street grid.
//!
//! Builds a 6 × 6 two-way grid, generates a seeded population that drives
//! east then north/south to work in the morning and back in the evening, and
//! runs it through the partitioned queue simulation.
//!
//! Outputs (under `output/grid/`):
//!
//! | File                 | Contents                                     |
//! |----------------------|----------------------------------------------|
//! | `events.csv`         | Every simulation event in delivery order     |
//! | `step_summaries.csv` | One row per processed step                   |
//! | `link_delays.csv`    | Delay against free flow per link and 15 min  |
//! | `summary.json`       | End reason, counters and delay totals        |
//!
//! Configuration is read from `demos/grid/config.toml` when present.  Set
//! `RUST_LOG=debug` for per-step logging.

mod network;

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use qs_agent::{Activity, Agent, Itinerary, Leg, Segment};
use qs_core::{AgentId, NodeId, SimConfig};
use qs_events::{EventBus, EventHandler};
use qs_output::{CsvEventWriter, DelayAnalyzer, DelaySummary, StepSummaryWriter};
use qs_sim::{EndReason, SimBuilder};

use network::{GRID_SIZE, Grid, build_grid};

// ── Constants ─────────────────────────────────────────────────────────────────

const AGENT_COUNT:     u32  = 2_000;
const SEED:            u64  = 42;
const CONFIG_PATH:     &str = "demos/grid/config.toml";
const OUTPUT_DIR:      &str = "output/grid";
const DELAY_BIN_SECS:  u64  = 900;

const MORNING_START:   u64 = 6 * 3_600 + 1_800; // 06:30
const MORNING_SPREAD:  u64 = 2 * 3_600;
const WORK_SECS:       u64 = 8 * 3_600;

// ── Population ────────────────────────────────────────────────────────────────

/// One commuter: home street, work street and the two legs between them.
///
/// The outbound drive goes east along the home row to the work column, then
/// along that column to the work row.  The return drive retraces it, U-turning
/// onto the work street's reverse first and back onto the home street last.
fn commuter(grid: &Grid, id: u32, rng: &mut SmallRng) -> Option<Agent> {
    let n = GRID_SIZE;
    let row = rng.gen_range(0..n);
    let col = rng.gen_range(0..n - 1);
    let work_col = rng.gen_range(col + 1..n);
    let mut work_row = rng.gen_range(0..n);
    if work_col == col + 1 && work_row == row {
        work_row = (row + 1) % n;
    }

    let mut path: Vec<NodeId> = (col..=work_col).map(|c| Grid::node(row, c)).collect();
    if work_row > row {
        path.extend((row + 1..=work_row).map(|r| Grid::node(r, work_col)));
    } else {
        path.extend((work_row..row).rev().map(|r| Grid::node(r, work_col)));
    }

    let outbound = grid.route(&path)?;
    let home = *outbound.first()?;
    let work = *outbound.last()?;

    let mut back_path = path.clone();
    back_path.reverse();
    let mut inbound = vec![work];
    inbound.extend(grid.route(&back_path)?);
    inbound.push(home);

    let leave = MORNING_START + rng.gen_range(0..MORNING_SPREAD);
    let itinerary = Itinerary::new(vec![
        Segment::Activity(Activity::new("home", home).ending_at(leave)),
        Segment::Leg(Leg::car(outbound)),
        Segment::Activity(Activity::new("work", work).lasting(WORK_SECS)),
        Segment::Leg(Leg::car(inbound)),
        Segment::Activity(Activity::new("home", home)),
    ])
    .ok()?;
    Some(Agent::new(AgentId(id), itinerary, 0))
}

// ── Summary ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct RunSummary {
    end:                String,
    unfinished:         usize,
    final_time:         u64,
    steps:              u64,
    events:             u64,
    capacity_warnings:  usize,
    boundary_transfers: u64,
    finished_agents:    usize,
    unreachable_agents: usize,
    wall_secs:          f64,
    delay:              DelaySummary,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // 1. Config.
    let config_path = Path::new(CONFIG_PATH);
    let config = if config_path.exists() {
        SimConfig::from_toml_file(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        tracing::warn!(path = %config_path.display(), "config not found, using defaults");
        SimConfig { partition_count: 4, ..SimConfig::default() }
    };
    println!(
        "Config: Δt = {} s, {} partitions, stop at {} s",
        config.time_step_secs, config.partition_count, config.max_sim_time_secs
    );

    // 2. Network.
    let grid = build_grid()?;
    println!(
        "Network: {} nodes, {} links",
        grid.graph.node_count(),
        grid.graph.link_count()
    );

    // 3. Population.
    let mut rng = SmallRng::seed_from_u64(SEED);
    let agents: Vec<Agent> = (0..AGENT_COUNT)
        .filter_map(|id| commuter(&grid, id, &mut rng))
        .collect();
    println!("Population: {} commuters", agents.len());
    println!();

    // 4. Output.
    let out_dir = Path::new(OUTPUT_DIR);
    std::fs::create_dir_all(out_dir)?;
    let mut events = CsvEventWriter::create(out_dir)?;
    let mut delays = DelayAnalyzer::new(&grid.graph, DELAY_BIN_SECS);
    let mut steps = StepSummaryWriter::create(out_dir)?;

    // 5. Build and run.
    let mut sim = SimBuilder::new(config, grid.graph).agents(agents).build()?;
    let t0 = Instant::now();
    let report = {
        let mut bus = EventBus::new(vec![
            &mut events as &mut dyn EventHandler,
            &mut delays as &mut dyn EventHandler,
        ]);
        sim.run(&mut bus, &mut steps)?
    };
    let elapsed = t0.elapsed();

    let event_rows = events.rows();
    events.finish()?;
    steps.finish()?;
    delays.write_link_delays_csv(out_dir)?;

    // 6. Summary.
    let (end, unfinished) = match report.end {
        EndReason::AllFinished => ("all_finished", 0),
        EndReason::MaxTimeReached { unfinished } => ("max_time_reached", unfinished),
        EndReason::Cancelled => ("cancelled", sim.live_agents()),
    };
    let summary = RunSummary {
        end: end.to_owned(),
        unfinished,
        final_time: report.final_time,
        steps: report.steps,
        events: report.events_emitted,
        capacity_warnings: report.capacity_warnings.len(),
        boundary_transfers: report.boundary_transfers,
        finished_agents: report.finished_agents,
        unreachable_agents: report.unreachable_agents,
        wall_secs: elapsed.as_secs_f64(),
        delay: delays.summary(),
    };
    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(out_dir.join("summary.json"), &json)?;

    println!("Simulation complete in {:.3} s ({end})", elapsed.as_secs_f64());
    println!("  events.csv         : {event_rows} rows");
    println!("  step_summaries.csv : {} rows", report.steps);
    println!(
        "  trips              : {} ({:.1} s mean delay per link)",
        summary.delay.trips, summary.delay.mean_link_delay
    );
    println!();

    // 7. Most delayed links.
    let mut worst: Vec<_> = sim
        .graph()
        .links()
        .iter()
        .filter_map(|l| delays.average_link_delay(l.id).map(|d| (l.id, d)))
        .collect();
    worst.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    println!("{:<8} {:>14}", "Link", "Mean delay (s)");
    println!("{}", "-".repeat(23));
    for (link, delay) in worst.into_iter().take(10) {
        println!("{:<8} {:>14.1}", link.0, delay);
    }

    Ok(())
}
