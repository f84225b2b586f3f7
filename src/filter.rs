//! Route profitability filter.
//!
//! Safety net behind the solver: the drop-penalty mechanism prices each visit
//! individually, so a route can still come out marginally unprofitable as a
//! whole (activation cost spread over low-value stops). Any route whose
//! collected contributions do not cover its full cost is deleted outright and
//! its stops reported as dropped. Routes are judged independently; nothing is
//! re-optimized afterwards.

use crate::solver::{DailySolution, DropReason, DroppedVisit};

/// Delete every route of `solution` whose revenue fails to cover its cost.
/// Returns the number of routes removed. All comparisons are in cents.
pub fn apply_profit_filter(solution: &mut DailySolution) -> usize {
    let routes = std::mem::take(&mut solution.routes);
    let mut removed = 0;

    for route in routes {
        let cost_cents = route.arc_cost_cents + route.fixed_cost_cents;
        if route.revenue_cents < cost_cents {
            log::info!(
                "depot {} weekday {}: dropping route with {} stops (revenue {}c < cost {}c)",
                solution.depot_key,
                solution.weekday,
                route.stops.len(),
                route.revenue_cents,
                cost_cents
            );
            removed += 1;
            for node in route.stops {
                solution.dropped.push(DroppedVisit {
                    node,
                    reason: DropReason::RouteNotCostJustified,
                });
            }
        } else {
            solution.routes.push(route);
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::VisitNode;
    use crate::solver::{Route, SolveStats};

    fn node(site_id: u32) -> VisitNode {
        VisitNode {
            site_idx: 0,
            site_id,
            demand_lbs: 100,
            service_minutes: 5,
            net_contribution: 10.0,
        }
    }

    fn route(site_ids: &[u32], revenue_cents: i64, arc_cost_cents: i64) -> Route {
        Route {
            stops: site_ids.iter().copied().map(node).collect(),
            total_lbs: 100 * site_ids.len() as i64,
            total_km: 10.0,
            total_minutes: 60,
            arc_cost_cents,
            fixed_cost_cents: 500,
            revenue_cents,
        }
    }

    fn daily(routes: Vec<Route>) -> DailySolution {
        DailySolution {
            depot_key: "anchor".to_string(),
            weekday: 0,
            routes,
            dropped: Vec::new(),
            stats: SolveStats::default(),
        }
    }

    #[test]
    fn test_marginal_route_is_deleted() {
        // revenue 900 < 600 arcs + 500 activation
        let mut solution = daily(vec![route(&[1, 2], 900, 600)]);
        assert_eq!(apply_profit_filter(&mut solution), 1);
        assert!(solution.routes.is_empty());
        assert_eq!(solution.dropped.len(), 2);
        for dropped in &solution.dropped {
            assert_eq!(dropped.reason, DropReason::RouteNotCostJustified);
        }
    }

    #[test]
    fn test_covering_route_is_kept() {
        let mut solution = daily(vec![route(&[1], 2500, 1980)]);
        assert_eq!(apply_profit_filter(&mut solution), 0);
        assert_eq!(solution.routes.len(), 1);
        assert!(solution.dropped.is_empty());
    }

    #[test]
    fn test_break_even_route_survives() {
        let mut solution = daily(vec![route(&[1], 1100, 600)]);
        assert_eq!(apply_profit_filter(&mut solution), 0);
        assert_eq!(solution.routes.len(), 1);
    }

    #[test]
    fn test_routes_are_judged_independently() {
        let mut solution = daily(vec![route(&[1], 5000, 600), route(&[2, 3], 100, 600)]);
        assert_eq!(apply_profit_filter(&mut solution), 1);
        assert_eq!(solution.routes.len(), 1);
        assert_eq!(solution.routes[0].stops[0].site_id, 1);
        let dropped_ids: Vec<u32> = solution.dropped.iter().map(|d| d.node.site_id).collect();
        assert_eq!(dropped_ids, vec![2, 3]);
    }
}
