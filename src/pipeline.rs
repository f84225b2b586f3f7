//! Whole-week optimization pipeline.
//!
//! Stages run in order: weekly schedule expansion, depot selection, then one
//! routing sub-problem per (open depot, weekday). Matrices are built up front
//! against the shared distance cache; the independent sub-problems are then
//! solved in parallel, each with its own matrices and solver state, and the
//! results are aggregated in stable (depot key, weekday) order so repeated
//! runs produce identical output.

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{validate_depots, Depot, Exclusion, SiteCatalog};
use crate::config::{NetworkConfig, SolverConfig};
use crate::depots::select_depots;
use crate::error::Result;
use crate::filter::apply_profit_filter;
use crate::matrix::build_cost_matrices;
use crate::oracle::CachedOracle;
use crate::pnl::{aggregate, NetworkPnl};
use crate::schedule::build_weekly_schedule;
use crate::solver::{DailyProblem, DailySolution, DailyVrpSolver};

/// Invocation envelope: restrictions and overrides from the command line.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Weekdays under the holiday policy
    pub holidays: Vec<usize>,
    /// Solve only this weekday
    pub restrict_day: Option<usize>,
    /// Solve only this depot key
    pub restrict_depot: Option<String>,
    /// Solver budgets (seed, time, solution limit)
    pub solver: SolverConfig,
    /// Draw a progress bar over the sub-problems
    pub show_progress: bool,
}

/// Final output of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySolution {
    pub dailies: Vec<DailySolution>,
    pub pnl: NetworkPnl,
    pub open_depots: Vec<String>,
    pub exclusions: Vec<Exclusion>,
    /// Matrix cells that used the straight-line fallback across all
    /// sub-problems; nonzero means the distance oracle was incomplete
    pub fallback_cells: usize,
    pub routes_filtered: usize,
}

/// Stable per-sub-problem seed so a restricted run solves a given
/// (depot, weekday) exactly like the full run does.
fn sub_seed(base: u64, depot_key: &str, weekday: usize) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in depot_key.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    base ^ hash ^ (weekday as u64)
}

/// Run the full optimization: schedule, depot selection, daily routing,
/// profitability filtering and the weekly P&L rollup.
pub fn run_pipeline(
    catalog: &SiteCatalog,
    depots: &[Depot],
    oracle: &mut CachedOracle,
    config: &NetworkConfig,
    options: &PipelineOptions,
) -> Result<WeeklySolution> {
    validate_depots(depots)?;

    let schedule = build_weekly_schedule(catalog, &options.holidays);
    let selection = select_depots(catalog, depots, config)?;

    let open_depots: Vec<String> = selection
        .open
        .iter()
        .map(|&d| depots[d].key.clone())
        .collect();
    log::info!(
        "{} of {} depots stay open: {}",
        open_depots.len(),
        depots.len(),
        open_depots.join(", ")
    );

    // Assemble one sub-problem per (open depot, weekday), in stable order.
    // Matrices are built here, sequentially, against the shared cache.
    let mut problems: Vec<DailyProblem> = Vec::new();
    let mut fallback_cells = 0;
    for &d in &selection.open {
        let depot = &depots[d];
        if let Some(only) = &options.restrict_depot {
            if only != &depot.key {
                continue;
            }
        }
        for weekday in 0..7 {
            if let Some(only) = options.restrict_day {
                if only != weekday {
                    continue;
                }
            }

            let nodes: Vec<_> = schedule
                .day(weekday)
                .iter()
                .filter(|n| selection.assignment[n.site_idx] == Some(d))
                .cloned()
                .collect();

            let mut points = vec![depot.coord];
            points.extend(
                nodes
                    .iter()
                    .map(|n| catalog.sites[n.site_idx].coord.expect("scheduled site has coord")),
            );
            let (matrices, fallback) = build_cost_matrices(&points, oracle, config);
            fallback_cells += fallback;

            problems.push(DailyProblem {
                depot_key: depot.key.clone(),
                weekday,
                nodes,
                matrices,
                num_vehicles: depot.max_trucks,
                capacity_lbs: config.target_daily_payload_lbs,
                max_route_minutes: config.effective_driving_minutes,
                fixed_cost_cents: config.truck_fixed_cost_solver_cents,
            });
        }
    }

    let bar = if options.show_progress {
        let bar = ProgressBar::new(problems.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} sub-problems {elapsed}")
                .expect("static template"),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    // Independent sub-problems, each with its own matrices and solver state.
    // `collect` keeps the assembled (depot key, weekday) order.
    let mut routes_filtered = 0;
    let dailies: Vec<DailySolution> = problems
        .par_iter()
        .map(|problem| {
            let solver = DailyVrpSolver::new(SolverConfig {
                seed: sub_seed(options.solver.seed, &problem.depot_key, problem.weekday),
                ..options.solver
            });
            let mut solution = solver.solve(problem);
            let removed = apply_profit_filter(&mut solution);
            bar.inc(1);
            (solution, removed)
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|(solution, removed)| {
            routes_filtered += removed;
            solution
        })
        .collect();
    bar.finish_and_clear();

    let pnl = aggregate(&dailies, config);

    Ok(WeeklySolution {
        dailies,
        pnl,
        open_depots,
        exclusions: catalog.exclusions(),
        fallback_cells,
        routes_filtered,
    })
}
