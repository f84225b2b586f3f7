//! Weekly profit-and-loss rollup.
//!
//! Turns the week's daily solutions into depot and network totals. Vehicle
//! identity within a depot is the route slot index, so a truck dispatched on
//! several days accumulates one weekly driver-hours ledger (with overtime
//! above the threshold) and one weekly fixed cost.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::NetworkConfig;
use crate::solver::DailySolution;

/// Weekly P&L lines for one depot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepotPnl {
    pub depot_key: String,
    pub revenue: f64,
    pub driver_cost: f64,
    pub variable_cost: f64,
    pub fixed_cost: f64,
    pub net: f64,
    pub lbs_collected: i64,
    pub km_driven: f64,
    pub routes: usize,
    pub trucks_used: usize,
    pub served_visits: usize,
    pub dropped_visits: usize,
}

/// Weekly P&L for the whole network, with per-depot breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkPnl {
    pub per_depot: Vec<DepotPnl>,
    pub revenue: f64,
    pub driver_cost: f64,
    pub variable_cost: f64,
    pub fixed_cost: f64,
    pub net: f64,
    pub lbs_collected: i64,
    pub km_driven: f64,
    pub routes: usize,
    pub trucks_used: usize,
    pub served_visits: usize,
    pub dropped_visits: usize,
}

/// Driver cost for one truck's weekly minutes: straight wage up to the
/// overtime threshold, multiplied wage above it.
fn driver_cost_for_minutes(minutes: i64, config: &NetworkConfig) -> f64 {
    let hours = minutes as f64 / 60.0;
    let regular = hours.min(config.ot_weekly_threshold_hours);
    let overtime = (hours - config.ot_weekly_threshold_hours).max(0.0);
    regular * config.driver_wage_per_hour
        + overtime * config.driver_wage_per_hour * config.ot_multiplier
}

/// Roll the week's daily solutions into per-depot and network totals.
pub fn aggregate(dailies: &[DailySolution], config: &NetworkConfig) -> NetworkPnl {
    // Stable depot order regardless of input order.
    let mut by_depot: BTreeMap<&str, Vec<&DailySolution>> = BTreeMap::new();
    for daily in dailies {
        by_depot.entry(&daily.depot_key).or_default().push(daily);
    }

    let mut network = NetworkPnl::default();

    for (depot_key, days) in by_depot {
        let mut pnl = DepotPnl {
            depot_key: depot_key.to_string(),
            ..DepotPnl::default()
        };
        // weekly minutes per truck slot
        let mut slot_minutes: Vec<i64> = Vec::new();

        for daily in days {
            for (slot, route) in daily.routes.iter().enumerate() {
                if slot_minutes.len() <= slot {
                    slot_minutes.resize(slot + 1, 0);
                }
                slot_minutes[slot] += route.total_minutes;

                pnl.lbs_collected += route.total_lbs;
                pnl.km_driven += route.total_km;
                pnl.routes += 1;
                pnl.served_visits += route.stops.len();
            }
            pnl.dropped_visits += daily.dropped.len();
        }

        pnl.revenue = pnl.lbs_collected as f64 * config.revenue_per_lb;
        pnl.variable_cost = pnl.km_driven * config.variable_cost_per_km;
        pnl.driver_cost = slot_minutes
            .iter()
            .map(|&m| driver_cost_for_minutes(m, config))
            .sum();
        pnl.trucks_used = slot_minutes.len();
        pnl.fixed_cost = pnl.trucks_used as f64 * config.truck_fixed_weekly;
        pnl.net = pnl.revenue - pnl.driver_cost - pnl.variable_cost - pnl.fixed_cost;

        network.revenue += pnl.revenue;
        network.driver_cost += pnl.driver_cost;
        network.variable_cost += pnl.variable_cost;
        network.fixed_cost += pnl.fixed_cost;
        network.net += pnl.net;
        network.lbs_collected += pnl.lbs_collected;
        network.km_driven += pnl.km_driven;
        network.routes += pnl.routes;
        network.trucks_used += pnl.trucks_used;
        network.served_visits += pnl.served_visits;
        network.dropped_visits += pnl.dropped_visits;
        network.per_depot.push(pnl);
    }

    network
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::VisitNode;
    use crate::solver::{Route, SolveStats};

    fn route(lbs: i64, km: f64, minutes: i64) -> Route {
        Route {
            stops: vec![VisitNode {
                site_idx: 0,
                site_id: 1,
                demand_lbs: lbs,
                service_minutes: 10,
                net_contribution: 20.0,
            }],
            total_lbs: lbs,
            total_km: km,
            total_minutes: minutes,
            arc_cost_cents: 1000,
            fixed_cost_cents: 500,
            revenue_cents: 2000,
        }
    }

    fn daily(depot_key: &str, weekday: usize, routes: Vec<Route>) -> DailySolution {
        DailySolution {
            depot_key: depot_key.to_string(),
            weekday,
            routes,
            dropped: Vec::new(),
            stats: SolveStats::default(),
        }
    }

    #[test]
    fn test_revenue_follows_collected_pounds() {
        let config = NetworkConfig::default();
        let dailies = vec![daily("anchor", 0, vec![route(1000, 20.0, 120)])];
        let pnl = aggregate(&dailies, &config);
        assert!((pnl.revenue - 1000.0 * config.revenue_per_lb).abs() < 1e-9);
        assert!((pnl.variable_cost - 20.0 * config.variable_cost_per_km).abs() < 1e-9);
    }

    #[test]
    fn test_one_weekly_fixed_cost_per_dispatched_truck() {
        let config = NetworkConfig::default();
        // the same slot dispatched all 7 days is one truck, not seven
        let dailies: Vec<_> = (0..7)
            .map(|w| daily("anchor", w, vec![route(500, 10.0, 300)]))
            .collect();
        let pnl = aggregate(&dailies, &config);
        assert_eq!(pnl.trucks_used, 1);
        assert!((pnl.fixed_cost - config.truck_fixed_weekly).abs() < 1e-9);
    }

    #[test]
    fn test_overtime_above_weekly_threshold() {
        let config = NetworkConfig::default();
        // 7 days x 420 min = 49 h on one slot: 40 regular + 9 overtime
        let dailies: Vec<_> = (0..7)
            .map(|w| daily("anchor", w, vec![route(500, 10.0, 420)]))
            .collect();
        let pnl = aggregate(&dailies, &config);
        let expected = 40.0 * config.driver_wage_per_hour
            + 9.0 * config.driver_wage_per_hour * config.ot_multiplier;
        assert!((pnl.driver_cost - expected).abs() < 1e-6, "got {}", pnl.driver_cost);
    }

    #[test]
    fn test_two_slots_avoid_overtime() {
        let config = NetworkConfig::default();
        // the same 49 hours split over two slots stays under the threshold
        let dailies: Vec<_> = (0..7)
            .map(|w| daily("anchor", w, vec![route(500, 10.0, 210), route(500, 10.0, 210)]))
            .collect();
        let pnl = aggregate(&dailies, &config);
        let expected = 49.0 * config.driver_wage_per_hour;
        assert!((pnl.driver_cost - expected).abs() < 1e-6);
        assert_eq!(pnl.trucks_used, 2);
        assert!((pnl.fixed_cost - 2.0 * config.truck_fixed_weekly).abs() < 1e-9);
    }

    #[test]
    fn test_depots_aggregate_separately_and_total() {
        let config = NetworkConfig::default();
        let dailies = vec![
            daily("anchor", 0, vec![route(1000, 20.0, 120)]),
            daily("north", 0, vec![route(500, 10.0, 60)]),
        ];
        let pnl = aggregate(&dailies, &config);
        assert_eq!(pnl.per_depot.len(), 2);
        // BTreeMap order: anchor before north
        assert_eq!(pnl.per_depot[0].depot_key, "anchor");
        assert_eq!(pnl.per_depot[1].depot_key, "north");
        assert_eq!(pnl.lbs_collected, 1500);
        let depot_net_sum: f64 = pnl.per_depot.iter().map(|d| d.net).sum();
        assert!((pnl.net - depot_net_sum).abs() < 1e-9);
    }
}
