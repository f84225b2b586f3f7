//! Guided local search improvement for the daily solver.
//!
//! Repeated first-improvement descents over serve/unserve, relocation, swap
//! and segment-reversal moves, evaluated on an augmented objective that adds
//! `lambda x penalty_count` to every arc. At each local minimum the arcs of
//! the current solution with the highest cost-per-penalty utility get their
//! count incremented, deforming the landscape away from recurring features.
//! The best solution by the true objective is kept and restored at the end.

use std::time::{Duration, Instant};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::config::SolverConfig;

use super::construction::insertion_time_delta;
use super::{route_minutes_of, DailyProblem, RoutingState, SolveStats};

pub struct GuidedLocalSearch {
    /// Scale of the arc penalty weight relative to mean arc cost
    pub lambda_factor: f64,
    /// Rounds without a new best before giving up early
    pub stale_rounds_limit: usize,
    config: SolverConfig,
}

impl GuidedLocalSearch {
    pub fn new(config: SolverConfig) -> Self {
        GuidedLocalSearch {
            lambda_factor: 0.2,
            stale_rounds_limit: 60,
            config,
        }
    }

    /// Improve `state` in place until the time budget, the solution limit or
    /// the stale-round limit is hit. Returns search counters.
    pub(crate) fn improve(
        &self,
        problem: &DailyProblem,
        state: &mut RoutingState,
        start: Instant,
    ) -> SolveStats {
        let mut stats = SolveStats::default();
        let n = problem.node_count();
        if n == 0 {
            return stats;
        }

        let deadline = start + Duration::from_secs_f64(self.config.time_limit_secs.max(0.0));
        let mut penalties = vec![vec![0i64; n + 1]; n + 1];
        let mut lambda = 0i64;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed ^ (problem.weekday as u64) << 8);

        let mut best = state.clone();
        let mut best_obj = best.objective(problem);
        let mut stale = 0usize;

        loop {
            stats.iterations += 1;
            self.descend(problem, state, &penalties, lambda, deadline, &mut rng);

            let obj = state.objective(problem);
            if obj < best_obj {
                best_obj = obj;
                best = state.clone();
                stats.solutions_found += 1;
                stale = 0;
            } else {
                stale += 1;
            }

            if Instant::now() >= deadline
                || stats.solutions_found >= self.config.solution_limit
                || stale >= self.stale_rounds_limit
            {
                break;
            }

            if lambda == 0 {
                lambda = initial_lambda(problem, state, self.lambda_factor);
            }
            penalize_used_arcs(problem, state, &mut penalties);
        }

        *state = best;
        stats
    }

    /// First-improvement descent to a local minimum of the augmented
    /// objective.
    fn descend(
        &self,
        problem: &DailyProblem,
        state: &mut RoutingState,
        penalties: &[Vec<i64>],
        lambda: i64,
        deadline: Instant,
        rng: &mut ChaCha8Rng,
    ) {
        loop {
            if Instant::now() >= deadline {
                return;
            }
            let improved = try_serve(problem, state, penalties, lambda)
                || try_relocate(problem, state, penalties, lambda, rng)
                || try_swap(problem, state, penalties, lambda)
                || try_reverse(problem, state, penalties, lambda)
                || try_unserve(problem, state, penalties, lambda);
            if !improved {
                return;
            }
        }
    }
}

#[inline]
fn aug_arc(problem: &DailyProblem, penalties: &[Vec<i64>], lambda: i64, i: usize, j: usize) -> i64 {
    problem.matrices.arc_cost(i, j) + lambda * penalties[i][j]
}

/// Augmented cost of a route's round trip (activation cost excluded).
fn aug_route_cost(
    problem: &DailyProblem,
    penalties: &[Vec<i64>],
    lambda: i64,
    route: &[usize],
) -> i64 {
    if route.is_empty() {
        return 0;
    }
    let mut cost = aug_arc(problem, penalties, lambda, 0, route[0]);
    for w in route.windows(2) {
        cost += aug_arc(problem, penalties, lambda, w[0], w[1]);
    }
    cost + aug_arc(problem, penalties, lambda, route[route.len() - 1], 0)
}

fn route_fits(problem: &DailyProblem, route: &[usize]) -> bool {
    let load: i64 = route.iter().map(|&i| problem.demand(i)).sum();
    load <= problem.capacity_lbs && route_minutes_of(route, problem) <= problem.max_route_minutes
}

/// Pick up a dropped visit when its cheapest augmented insertion still beats
/// its drop penalty.
fn try_serve(
    problem: &DailyProblem,
    state: &mut RoutingState,
    penalties: &[Vec<i64>],
    lambda: i64,
) -> bool {
    for node in state.dropped_nodes(problem) {
        let penalty = problem.penalty(node);
        if penalty == 0 {
            continue;
        }

        let mut best: Option<(i64, usize, usize)> = None;
        let mut probed_empty = false;
        for (v, route) in state.routes.iter().enumerate() {
            if route.is_empty() {
                if probed_empty {
                    continue;
                }
                probed_empty = true;
            }
            if state.route_load(problem, v) + problem.demand(node) > problem.capacity_lbs {
                continue;
            }
            let minutes = state.route_minutes(problem, v);
            let activation = if route.is_empty() {
                problem.fixed_cost_cents
            } else {
                0
            };
            for pos in 0..=route.len() {
                let extra = insertion_time_delta(problem, route, pos, node) + problem.service(node);
                if minutes + extra > problem.max_route_minutes {
                    continue;
                }
                let prev = if pos == 0 { 0 } else { route[pos - 1] };
                let next = if pos == route.len() { 0 } else { route[pos] };
                let delta = aug_arc(problem, penalties, lambda, prev, node)
                    + aug_arc(problem, penalties, lambda, node, next)
                    - aug_arc(problem, penalties, lambda, prev, next)
                    + activation;
                if best.map_or(true, |(bd, bv, bp)| (delta, v, pos) < (bd, bv, bp)) {
                    best = Some((delta, v, pos));
                }
            }
        }

        if let Some((delta, v, pos)) = best {
            if delta < penalty {
                state.routes[v].insert(pos, node);
                return true;
            }
        }
    }
    false
}

/// Drop a served visit whose removal saves more than its penalty.
fn try_unserve(
    problem: &DailyProblem,
    state: &mut RoutingState,
    penalties: &[Vec<i64>],
    lambda: i64,
) -> bool {
    for v in 0..state.routes.len() {
        for pos in 0..state.routes[v].len() {
            let node = state.routes[v][pos];
            let mut shorter = state.routes[v].clone();
            shorter.remove(pos);

            let saving = aug_route_cost(problem, penalties, lambda, &state.routes[v])
                - aug_route_cost(problem, penalties, lambda, &shorter)
                + if shorter.is_empty() {
                    problem.fixed_cost_cents
                } else {
                    0
                };
            if problem.penalty(node) < saving {
                state.routes[v] = shorter;
                return true;
            }
        }
    }
    false
}

/// Move one visit to a better position in any route.
fn try_relocate(
    problem: &DailyProblem,
    state: &mut RoutingState,
    penalties: &[Vec<i64>],
    lambda: i64,
    rng: &mut ChaCha8Rng,
) -> bool {
    let num_vehicles = state.routes.len();
    let mut sources: Vec<usize> = (0..num_vehicles).collect();
    sources.shuffle(rng);

    for &v in &sources {
        for pos in 0..state.routes[v].len() {
            let node = state.routes[v][pos];
            let mut donor = state.routes[v].clone();
            donor.remove(pos);
            let donor_cost = aug_route_cost(problem, penalties, lambda, &donor);
            let old_v_cost = aug_route_cost(problem, penalties, lambda, &state.routes[v]);

            for w in 0..num_vehicles {
                if w == v {
                    // reinsertion within the same, already-shortened route
                    for qpos in 0..=donor.len() {
                        if qpos == pos {
                            continue;
                        }
                        let mut candidate = donor.clone();
                        candidate.insert(qpos, node);
                        if !route_fits(problem, &candidate) {
                            continue;
                        }
                        let delta = aug_route_cost(problem, penalties, lambda, &candidate)
                            - old_v_cost;
                        if delta < 0 {
                            state.routes[v] = candidate;
                            return true;
                        }
                    }
                    continue;
                }

                let recipient_was_empty = state.routes[w].is_empty();
                if state.route_load(problem, w) + problem.demand(node) > problem.capacity_lbs {
                    continue;
                }
                let old_w_cost = aug_route_cost(problem, penalties, lambda, &state.routes[w]);
                for qpos in 0..=state.routes[w].len() {
                    let mut candidate = state.routes[w].clone();
                    candidate.insert(qpos, node);
                    if !route_fits(problem, &candidate) {
                        continue;
                    }
                    let mut delta = donor_cost - old_v_cost
                        + aug_route_cost(problem, penalties, lambda, &candidate)
                        - old_w_cost;
                    if donor.is_empty() {
                        delta -= problem.fixed_cost_cents;
                    }
                    if recipient_was_empty {
                        delta += problem.fixed_cost_cents;
                    }
                    if delta < 0 {
                        state.routes[w] = candidate;
                        state.routes[v] = donor.clone();
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Exchange two visits between different routes.
fn try_swap(
    problem: &DailyProblem,
    state: &mut RoutingState,
    penalties: &[Vec<i64>],
    lambda: i64,
) -> bool {
    let num_vehicles = state.routes.len();
    for v in 0..num_vehicles {
        for w in v + 1..num_vehicles {
            for pa in 0..state.routes[v].len() {
                for pb in 0..state.routes[w].len() {
                    let mut route_a = state.routes[v].clone();
                    let mut route_b = state.routes[w].clone();
                    std::mem::swap(&mut route_a[pa], &mut route_b[pb]);
                    if !route_fits(problem, &route_a) || !route_fits(problem, &route_b) {
                        continue;
                    }
                    let delta = aug_route_cost(problem, penalties, lambda, &route_a)
                        + aug_route_cost(problem, penalties, lambda, &route_b)
                        - aug_route_cost(problem, penalties, lambda, &state.routes[v])
                        - aug_route_cost(problem, penalties, lambda, &state.routes[w]);
                    if delta < 0 {
                        state.routes[v] = route_a;
                        state.routes[w] = route_b;
                        return true;
                    }
                }
            }
        }
    }
    false
}

/// Reverse a segment within one route.
fn try_reverse(
    problem: &DailyProblem,
    state: &mut RoutingState,
    penalties: &[Vec<i64>],
    lambda: i64,
) -> bool {
    for v in 0..state.routes.len() {
        let len = state.routes[v].len();
        if len < 2 {
            continue;
        }
        let old_cost = aug_route_cost(problem, penalties, lambda, &state.routes[v]);
        for i in 0..len - 1 {
            for j in i + 1..len {
                let mut candidate = state.routes[v].clone();
                candidate[i..=j].reverse();
                // load is unchanged; minutes can shift when times are asymmetric
                if route_minutes_of(&candidate, problem) > problem.max_route_minutes {
                    continue;
                }
                let delta = aug_route_cost(problem, penalties, lambda, &candidate) - old_cost;
                if delta < 0 {
                    state.routes[v] = candidate;
                    return true;
                }
            }
        }
    }
    false
}

/// Penalty weight from the first local optimum: a fraction of the mean used
/// arc cost. Zero while the solution has no arcs.
fn initial_lambda(problem: &DailyProblem, state: &RoutingState, factor: f64) -> i64 {
    let mut total = 0i64;
    let mut arcs = 0i64;
    for (v, route) in state.routes.iter().enumerate() {
        if route.is_empty() {
            continue;
        }
        total += state.route_arc_cost(problem, v);
        arcs += route.len() as i64 + 1;
    }
    if arcs == 0 {
        return 0;
    }
    ((factor * total as f64 / arcs as f64).round() as i64).max(1)
}

/// Increment the penalty count of the current solution's maximum-utility
/// arcs, where utility is true arc cost over (1 + count).
fn penalize_used_arcs(problem: &DailyProblem, state: &RoutingState, penalties: &mut [Vec<i64>]) {
    let mut arcs: Vec<(usize, usize)> = Vec::new();
    for route in state.routes.iter().filter(|r| !r.is_empty()) {
        arcs.push((0, route[0]));
        for w in route.windows(2) {
            arcs.push((w[0], w[1]));
        }
        arcs.push((route[route.len() - 1], 0));
    }
    if arcs.is_empty() {
        return;
    }

    let utility = |(i, j): (usize, usize), penalties: &[Vec<i64>]| {
        problem.matrices.arc_cost(i, j) as f64 / (1.0 + penalties[i][j] as f64)
    };
    let max = arcs
        .iter()
        .map(|&a| utility(a, penalties))
        .fold(f64::MIN, f64::max);
    for &(i, j) in &arcs {
        if utility((i, j), penalties) >= max - 1e-9 {
            penalties[i][j] += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeoPoint;
    use crate::solver::test_support::{point_at_road_km, problem_from_points};

    const DEPOT: GeoPoint = GeoPoint { lat: 40.0, lon: -74.0 };

    fn search() -> GuidedLocalSearch {
        GuidedLocalSearch::new(SolverConfig {
            time_limit_secs: 2.0,
            solution_limit: 500,
            seed: 7,
        })
    }

    #[test]
    fn test_serve_move_picks_up_profitable_drop() {
        let a = point_at_road_km(DEPOT, 4.0);
        let problem = problem_from_points(DEPOT, vec![(a, 200, 5, 50.0)], 1);
        let mut state = RoutingState::new(1);

        let stats = search().improve(&problem, &mut state, Instant::now());
        assert_eq!(state.routes[0], vec![1]);
        assert!(stats.solutions_found >= 1);
    }

    #[test]
    fn test_unserve_move_sheds_money_loser() {
        let near = point_at_road_km(DEPOT, 3.0);
        let far = point_at_road_km(DEPOT, 45.0);
        let problem =
            problem_from_points(DEPOT, vec![(near, 200, 5, 80.0), (far, 200, 5, 2.0)], 1);
        // start with both on one route, the far one at a loss
        let mut state = RoutingState::new(1);
        state.routes[0] = vec![1, 2];

        search().improve(&problem, &mut state, Instant::now());
        assert_eq!(state.routes[0], vec![1]);
        assert_eq!(state.dropped_nodes(&problem), vec![2]);
    }

    #[test]
    fn test_descent_never_worsens_true_objective() {
        let stops: Vec<_> = (0..10)
            .map(|i| {
                (
                    GeoPoint::new(40.0 + 0.015 * (i % 5) as f64, -74.0 - 0.02 * (i / 5) as f64),
                    400,
                    8,
                    15.0,
                )
            })
            .collect();
        let problem = problem_from_points(DEPOT, stops, 3);
        let mut state = crate::solver::construction::cheapest_insertion(&problem);
        let initial = state.objective(&problem);

        search().improve(&problem, &mut state, Instant::now());
        assert!(state.objective(&problem) <= initial);
    }

    #[test]
    fn test_relocation_consolidates_split_routes() {
        // two neighbors wastefully assigned one truck each
        let a = point_at_road_km(DEPOT, 6.0);
        let b = point_at_road_km(DEPOT, 6.2);
        let problem =
            problem_from_points(DEPOT, vec![(a, 500, 5, 80.0), (b, 500, 5, 80.0)], 2);
        let mut state = RoutingState::new(2);
        state.routes[0] = vec![1];
        state.routes[1] = vec![2];

        search().improve(&problem, &mut state, Instant::now());
        let used = state.routes.iter().filter(|r| !r.is_empty()).count();
        assert_eq!(used, 1, "neighbors should share one truck");
    }
}
