//! Cheapest-arc insertion start for the daily solver.
//!
//! Visits are considered in descending penalty order (most valuable first)
//! and each is placed at its cheapest feasible position across the fleet,
//! activating a fresh truck when that is the cheapest option. A visit whose
//! cheapest feasible insertion still costs at least its drop penalty stays
//! unserved; zero-penalty visits are never placed.

use super::{DailyProblem, RoutingState};

/// Arc-cost delta of inserting customer `node` at `pos` in `route`.
#[inline]
pub(crate) fn insertion_arc_delta(
    problem: &DailyProblem,
    route: &[usize],
    pos: usize,
    node: usize,
) -> i64 {
    let m = &problem.matrices;
    let prev = if pos == 0 { 0 } else { route[pos - 1] };
    let next = if pos == route.len() { 0 } else { route[pos] };
    m.arc_cost(prev, node) + m.arc_cost(node, next) - m.arc_cost(prev, next)
}

/// Travel-time delta of the same insertion, excluding service time.
#[inline]
pub(crate) fn insertion_time_delta(
    problem: &DailyProblem,
    route: &[usize],
    pos: usize,
    node: usize,
) -> i64 {
    let m = &problem.matrices;
    let prev = if pos == 0 { 0 } else { route[pos - 1] };
    let next = if pos == route.len() { 0 } else { route[pos] };
    m.time(prev, node) + m.time(node, next) - m.time(prev, next)
}

/// Cheapest feasible insertion of `node` across all vehicles:
/// `(total delta incl. activation, vehicle, position)`. Empty vehicles are
/// interchangeable, so only the first one is probed.
pub(crate) fn best_insertion(
    problem: &DailyProblem,
    state: &RoutingState,
    node: usize,
) -> Option<(i64, usize, usize)> {
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
            let extra_minutes = insertion_time_delta(problem, route, pos, node) + problem.service(node);
            if minutes + extra_minutes > problem.max_route_minutes {
                continue;
            }
            let delta = insertion_arc_delta(problem, route, pos, node) + activation;
            if best.map_or(true, |(bd, bv, bp)| (delta, v, pos) < (bd, bv, bp)) {
                best = Some((delta, v, pos));
            }
        }
    }

    best
}

/// Build the initial routing state by cheapest-arc greedy insertion.
pub(crate) fn cheapest_insertion(problem: &DailyProblem) -> RoutingState {
    let mut state = RoutingState::new(problem.num_vehicles);

    let mut order: Vec<usize> = (1..=problem.node_count()).collect();
    order.sort_by_key(|&i| (std::cmp::Reverse(problem.penalty(i)), i));

    for node in order {
        let penalty = problem.penalty(node);
        if penalty == 0 {
            continue;
        }
        if let Some((delta, v, pos)) = best_insertion(problem, &state, node) {
            if delta < penalty {
                state.routes[v].insert(pos, node);
            }
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::geo::GeoPoint;
    use crate::solver::test_support::{point_at_road_km, problem_from_points};

    const DEPOT: GeoPoint = GeoPoint { lat: 40.0, lon: -74.0 };

    #[test]
    fn test_insertion_deltas_against_recomputation() {
        let a = point_at_road_km(DEPOT, 4.0);
        let b = point_at_road_km(DEPOT, 9.0);
        let c = GeoPoint::new(40.02, -74.05);
        let problem = problem_from_points(
            DEPOT,
            vec![(a, 100, 5, 10.0), (b, 100, 5, 10.0), (c, 100, 5, 10.0)],
            1,
        );

        let route = vec![1, 2];
        for pos in 0..=route.len() {
            let mut extended = route.clone();
            extended.insert(pos, 3);
            assert_eq!(
                insertion_arc_delta(&problem, &route, pos, 3),
                crate::solver::route_arc_cost_of(&extended, &problem)
                    - crate::solver::route_arc_cost_of(&route, &problem)
            );
            assert_eq!(
                insertion_time_delta(&problem, &route, pos, 3) + problem.service(3),
                crate::solver::route_minutes_of(&extended, &problem)
                    - crate::solver::route_minutes_of(&route, &problem)
            );
        }
    }

    #[test]
    fn test_greedy_start_respects_capacity() {
        let config = NetworkConfig::default();
        let stops: Vec<_> = (0..6)
            .map(|i| (point_at_road_km(DEPOT, 3.0 + i as f64), 1500, 10, 80.0))
            .collect();
        let problem = problem_from_points(DEPOT, stops, 4);

        let state = cheapest_insertion(&problem);
        for v in 0..problem.num_vehicles {
            assert!(state.route_load(&problem, v) <= config.target_daily_payload_lbs);
            assert!(state.route_minutes(&problem, v) <= config.effective_driving_minutes);
        }
        // 6 x 1500 lbs needs at least 3 trucks
        let used = state.routes.iter().filter(|r| !r.is_empty()).count();
        assert!(used >= 3);
    }

    #[test]
    fn test_zero_penalty_nodes_stay_dropped() {
        let a = point_at_road_km(DEPOT, 3.0);
        let problem = problem_from_points(DEPOT, vec![(a, 100, 5, 0.0)], 1);
        let state = cheapest_insertion(&problem);
        assert_eq!(state.dropped_nodes(&problem), vec![1]);
    }

    #[test]
    fn test_expensive_insertion_leaves_node_dropped() {
        // $1 net cannot pay for a 40 road-km round trip
        let far = point_at_road_km(DEPOT, 20.0);
        let problem = problem_from_points(DEPOT, vec![(far, 100, 5, 1.0)], 1);
        let state = cheapest_insertion(&problem);
        assert_eq!(state.dropped_nodes(&problem), vec![1]);
    }
}
