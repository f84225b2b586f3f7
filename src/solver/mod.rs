//! Daily profit-aware route solver.
//!
//! One sub-problem covers one depot on one weekday: a capacitated VRP where
//! every stop is optional at a price. Each visit carries a drop penalty equal
//! to its positive net contribution in cents, so minimizing
//!
//! ```text
//! sum(arc costs) + sum(activation cost per dispatched truck) + sum(penalties of dropped visits)
//! ```
//!
//! is exactly profit maximization: a visit is served iff its marginal routing
//! cost stays below its contribution. The initial solution comes from
//! cheapest-arc insertion (`construction`), improved by guided local search
//! (`local_search`).

pub mod construction;
pub mod local_search;

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::config::SolverConfig;
use crate::matrix::CostMatrices;
use crate::schedule::VisitNode;

use self::local_search::GuidedLocalSearch;

/// One (depot, weekday) routing sub-problem. Matrix index 0 is the depot;
/// matrix index `i` (1-based) corresponds to `nodes[i - 1]`.
#[derive(Debug, Clone)]
pub struct DailyProblem {
    pub depot_key: String,
    pub weekday: usize,
    pub nodes: Vec<VisitNode>,
    pub matrices: CostMatrices,
    pub num_vehicles: usize,
    pub capacity_lbs: i64,
    pub max_route_minutes: i64,
    /// Activation cost charged once per dispatched vehicle (cents)
    pub fixed_cost_cents: i64,
}

impl DailyProblem {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop penalty for matrix node `i`: the visit's positive net
    /// contribution in cents, or zero. Never negative.
    #[inline]
    pub fn penalty(&self, i: usize) -> i64 {
        ((self.nodes[i - 1].net_contribution * 100.0).round() as i64).max(0)
    }

    #[inline]
    pub fn demand(&self, i: usize) -> i64 {
        self.nodes[i - 1].demand_lbs
    }

    #[inline]
    pub fn service(&self, i: usize) -> i64 {
        self.nodes[i - 1].service_minutes
    }
}

/// Why a visit was left unserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Serving the visit would cost more than it contributes
    NotWorthRouting,
    /// The sub-problem produced no feasible routes within its budget
    NoFeasibleSolution,
    /// The visit's whole route failed the profitability check
    RouteNotCostJustified,
}

/// A visit that ended up unserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroppedVisit {
    pub node: VisitNode,
    pub reason: DropReason,
}

/// One truck's day: stops in visit order, with totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub stops: Vec<VisitNode>,
    pub total_lbs: i64,
    pub total_km: f64,
    pub total_minutes: i64,
    pub arc_cost_cents: i64,
    pub fixed_cost_cents: i64,
    /// Sum of positive per-visit contributions along the route (cents)
    pub revenue_cents: i64,
}

/// Search counters for one sub-problem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolveStats {
    pub objective_cents: i64,
    pub solutions_found: usize,
    pub iterations: usize,
    /// Wall-clock seconds; kept out of serialized output so identical runs
    /// export identical bytes
    #[serde(skip)]
    pub elapsed_secs: f64,
}

/// Solver output for one (depot, weekday).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySolution {
    pub depot_key: String,
    pub weekday: usize,
    pub routes: Vec<Route>,
    pub dropped: Vec<DroppedVisit>,
    pub stats: SolveStats,
}

impl DailySolution {
    pub fn served_visits(&self) -> usize {
        self.routes.iter().map(|r| r.stops.len()).sum()
    }
}

/// Mutable routing state over matrix node indices. Each vehicle's route holds
/// customer indices (1-based); the depot endpoints are implicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RoutingState {
    pub routes: Vec<Vec<usize>>,
}

impl RoutingState {
    pub fn new(num_vehicles: usize) -> Self {
        RoutingState {
            routes: vec![Vec::new(); num_vehicles],
        }
    }

    pub fn assigned_flags(&self, n: usize) -> Vec<bool> {
        let mut assigned = vec![false; n + 1];
        for route in &self.routes {
            for &i in route {
                assigned[i] = true;
            }
        }
        assigned
    }

    pub fn dropped_nodes(&self, problem: &DailyProblem) -> Vec<usize> {
        let assigned = self.assigned_flags(problem.node_count());
        (1..=problem.node_count()).filter(|&i| !assigned[i]).collect()
    }

    pub fn route_load(&self, problem: &DailyProblem, v: usize) -> i64 {
        self.routes[v].iter().map(|&i| problem.demand(i)).sum()
    }

    /// Travel plus service minutes of vehicle `v`'s round trip.
    pub fn route_minutes(&self, problem: &DailyProblem, v: usize) -> i64 {
        route_minutes_of(&self.routes[v], problem)
    }

    pub fn route_arc_cost(&self, problem: &DailyProblem, v: usize) -> i64 {
        route_arc_cost_of(&self.routes[v], problem)
    }

    /// True objective in cents: arcs, activations and drop penalties.
    pub fn objective(&self, problem: &DailyProblem) -> i64 {
        let mut total = 0;
        for (v, route) in self.routes.iter().enumerate() {
            if route.is_empty() {
                continue;
            }
            total += self.route_arc_cost(problem, v) + problem.fixed_cost_cents;
        }
        for i in self.dropped_nodes(problem) {
            total += problem.penalty(i);
        }
        total
    }
}

/// Minutes of a route given as customer indices (depot endpoints implicit).
pub(crate) fn route_minutes_of(route: &[usize], problem: &DailyProblem) -> i64 {
    if route.is_empty() {
        return 0;
    }
    let m = &problem.matrices;
    let mut minutes = m.time(0, route[0]);
    for w in route.windows(2) {
        minutes += m.time(w[0], w[1]);
    }
    minutes += m.time(route[route.len() - 1], 0);
    minutes + route.iter().map(|&i| problem.service(i)).sum::<i64>()
}

pub(crate) fn route_arc_cost_of(route: &[usize], problem: &DailyProblem) -> i64 {
    if route.is_empty() {
        return 0;
    }
    let m = &problem.matrices;
    let mut cost = m.arc_cost(0, route[0]);
    for w in route.windows(2) {
        cost += m.arc_cost(w[0], w[1]);
    }
    cost + m.arc_cost(route[route.len() - 1], 0)
}

fn route_km_of(route: &[usize], problem: &DailyProblem) -> f64 {
    if route.is_empty() {
        return 0.0;
    }
    let m = &problem.matrices;
    let mut km = m.dist(0, route[0]);
    for w in route.windows(2) {
        km += m.dist(w[0], w[1]);
    }
    km + m.dist(route[route.len() - 1], 0)
}

/// Profit-aware daily VRP solver: cheapest insertion start, guided local
/// search improvement, bounded by wall clock and a solution count.
pub struct DailyVrpSolver {
    pub config: SolverConfig,
}

impl DailyVrpSolver {
    pub fn new(config: SolverConfig) -> Self {
        DailyVrpSolver { config }
    }

    pub fn solve(&self, problem: &DailyProblem) -> DailySolution {
        let start = Instant::now();

        if problem.nodes.is_empty() {
            return DailySolution {
                depot_key: problem.depot_key.clone(),
                weekday: problem.weekday,
                routes: Vec::new(),
                dropped: Vec::new(),
                stats: SolveStats::default(),
            };
        }

        let mut state = construction::cheapest_insertion(problem);
        let gls = GuidedLocalSearch::new(self.config);
        let mut stats = gls.improve(problem, &mut state, start);

        stats.objective_cents = state.objective(problem);
        stats.elapsed_secs = start.elapsed().as_secs_f64();

        self.build_solution(problem, &state, stats)
    }

    fn build_solution(
        &self,
        problem: &DailyProblem,
        state: &RoutingState,
        stats: SolveStats,
    ) -> DailySolution {
        let mut routes = Vec::new();
        for (v, indices) in state.routes.iter().enumerate() {
            if indices.is_empty() {
                continue;
            }
            let stops: Vec<VisitNode> = indices.iter().map(|&i| problem.nodes[i - 1].clone()).collect();
            let total_lbs = state.route_load(problem, v);
            let total_minutes = state.route_minutes(problem, v);

            debug_assert!(total_lbs <= problem.capacity_lbs, "route over capacity");
            debug_assert!(total_minutes <= problem.max_route_minutes, "route over time");

            routes.push(Route {
                revenue_cents: indices.iter().map(|&i| problem.penalty(i)).sum(),
                arc_cost_cents: state.route_arc_cost(problem, v),
                fixed_cost_cents: problem.fixed_cost_cents,
                total_km: route_km_of(indices, problem),
                total_lbs,
                total_minutes,
                stops,
            });
        }

        let no_routes = routes.is_empty();
        let dropped = state
            .dropped_nodes(problem)
            .iter()
            .map(|&i| DroppedVisit {
                node: problem.nodes[i - 1].clone(),
                reason: if no_routes && problem.penalty(i) > 0 {
                    DropReason::NoFeasibleSolution
                } else {
                    DropReason::NotWorthRouting
                },
            })
            .collect();

        DailySolution {
            depot_key: problem.depot_key.clone(),
            weekday: problem.weekday,
            routes,
            dropped,
            stats,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::geo::GeoPoint;
    use crate::matrix::build_cost_matrices;
    use crate::oracle::CachedOracle;

    /// Build a sub-problem from depot plus stop coordinates using the
    /// straight-line fallback matrices and default operating numbers.
    pub fn problem_from_points(
        depot: GeoPoint,
        stops: Vec<(GeoPoint, i64, i64, f64)>, // (coord, demand, service_min, net_contribution)
        num_vehicles: usize,
    ) -> DailyProblem {
        let config = NetworkConfig::default();
        let mut points = vec![depot];
        let mut nodes = Vec::new();
        for (idx, (coord, demand_lbs, service_minutes, net)) in stops.into_iter().enumerate() {
            points.push(coord);
            nodes.push(VisitNode {
                site_idx: idx,
                site_id: idx as u32 + 1,
                demand_lbs,
                service_minutes,
                net_contribution: net,
            });
        }
        let mut oracle = CachedOracle::in_memory(None);
        let (matrices, _) = build_cost_matrices(&points, &mut oracle, &config);
        DailyProblem {
            depot_key: "anchor".to_string(),
            weekday: 0,
            nodes,
            matrices,
            num_vehicles,
            capacity_lbs: config.target_daily_payload_lbs,
            max_route_minutes: config.effective_driving_minutes,
            fixed_cost_cents: config.truck_fixed_cost_solver_cents,
        }
    }

    /// A coordinate whose road-factored distance from `origin` is `road_km`.
    pub fn point_at_road_km(origin: GeoPoint, road_km: f64) -> GeoPoint {
        let straight = road_km / NetworkConfig::default().road_factor;
        GeoPoint::new(origin.lat + straight / 111.19, origin.lon)
    }
}
