//! Depot selection: greedy network closure with reassignment.
//!
//! Sites start at their nearest depot by straight-line distance. The closure
//! loop then repeatedly simulates shutting the least-profitable non-anchor
//! depot, moving its sites to their next-nearest open depot, and commits the
//! closure only when the estimated total network net improves. The warehouse
//! anchor is never a candidate. Estimates here are straight-line
//! approximations; exact routing costs come later from the daily solver.

use ordered_float::OrderedFloat;

use crate::catalog::{Depot, SiteCatalog};
use crate::config::NetworkConfig;
use crate::error::{OptimizeError, Result};
use crate::geo::haversine_km;

/// Output of the closure loop: open depot indices (ascending key order) and
/// a per-site depot assignment. Sites without a coordinate stay unassigned.
#[derive(Debug, Clone)]
pub struct DepotSelection {
    pub open: Vec<usize>,
    pub assignment: Vec<Option<usize>>,
}

impl DepotSelection {
    pub fn is_open(&self, depot_idx: usize) -> bool {
        self.open.contains(&depot_idx)
    }
}

/// Estimated weekly routing cost of serving one site from one depot:
/// road-factored straight-line distance priced per km plus driver time at the
/// average speed, for every weekly visit. The road factor approximates the
/// amortization of a chained route over its stops.
fn weekly_site_cost(site_km: f64, weekly_visits: u32, config: &NetworkConfig) -> f64 {
    let road_km = config.road_factor * site_km;
    let drive_hours = road_km / config.average_speed_kmh;
    let per_visit = road_km * config.variable_cost_per_km + drive_hours * config.driver_wage_per_hour;
    per_visit * weekly_visits as f64
}

/// Estimated weekly net of one depot under a given assignment.
fn depot_net(
    depot_idx: usize,
    depots: &[Depot],
    catalog: &SiteCatalog,
    assignment: &[Option<usize>],
    config: &NetworkConfig,
) -> f64 {
    let depot = &depots[depot_idx];
    let mut revenue = 0.0;
    let mut variable = 0.0;

    for (site, assigned) in catalog.sites.iter().zip(assignment) {
        if *assigned != Some(depot_idx) {
            continue;
        }
        let coord = site.coord.expect("assigned site has a coordinate");
        let visits = site.frequency.weekly_visits();
        revenue += site.revenue_per_visit * visits as f64;
        variable += weekly_site_cost(haversine_km(depot.coord, coord), visits, config);
    }

    let fixed = depot.max_trucks as f64 * config.truck_fixed_weekly;
    revenue - fixed - variable
}

fn total_net(
    open: &[usize],
    depots: &[Depot],
    catalog: &SiteCatalog,
    assignment: &[Option<usize>],
    config: &NetworkConfig,
) -> f64 {
    open.iter()
        .map(|&d| depot_net(d, depots, catalog, assignment, config))
        .sum()
}

/// Nearest depot among `open` for a coordinate; ties break on depot key.
fn nearest_open(
    coord: crate::geo::GeoPoint,
    open: &[usize],
    depots: &[Depot],
) -> Option<usize> {
    open.iter()
        .copied()
        .min_by_key(|&d| (OrderedFloat(haversine_km(depots[d].coord, coord)), depots[d].key.clone()))
}

fn assign_all(
    catalog: &SiteCatalog,
    open: &[usize],
    depots: &[Depot],
) -> Vec<Option<usize>> {
    catalog
        .sites
        .iter()
        .map(|site| site.coord.and_then(|c| nearest_open(c, open, depots)))
        .collect()
}

/// Run the greedy closure loop and return the surviving depots with the
/// final site assignment.
pub fn select_depots(
    catalog: &SiteCatalog,
    depots: &[Depot],
    config: &NetworkConfig,
) -> Result<DepotSelection> {
    let anchor = depots
        .iter()
        .position(|d| d.anchor)
        .ok_or_else(|| OptimizeError::Input("no anchor depot".to_string()))?;

    // Stable order: depot indices sorted by key.
    let mut open: Vec<usize> = (0..depots.len()).collect();
    open.sort_by(|&a, &b| depots[a].key.cmp(&depots[b].key));

    let mut assignment = assign_all(catalog, &open, depots);

    loop {
        let current_total = total_net(&open, depots, catalog, &assignment, config);

        let candidate = open
            .iter()
            .copied()
            .filter(|&d| d != anchor)
            .min_by_key(|&d| {
                (
                    OrderedFloat(depot_net(d, depots, catalog, &assignment, config)),
                    depots[d].key.clone(),
                )
            });
        let Some(candidate) = candidate else {
            break; // only the anchor remains
        };

        // Simulate the closure: candidate's sites move to their next-nearest
        // open depot; everyone else stays put.
        let remaining: Vec<usize> = open.iter().copied().filter(|&d| d != candidate).collect();
        let mut simulated = assignment.clone();
        for (site, assigned) in catalog.sites.iter().zip(simulated.iter_mut()) {
            if *assigned == Some(candidate) {
                *assigned = site.coord.and_then(|c| nearest_open(c, &remaining, depots));
            }
        }

        let simulated_total = total_net(&remaining, depots, catalog, &simulated, config);
        if simulated_total > current_total {
            log::info!(
                "closing depot {} (network net {:.0} -> {:.0})",
                depots[candidate].key,
                current_total,
                simulated_total
            );
            open = remaining;
            assignment = simulated;
        } else {
            break;
        }
    }

    for (site, assigned) in catalog.sites.iter().zip(&assignment) {
        match assigned {
            Some(d) if open.contains(d) => {}
            None if site.coord.is_none() => {}
            _ => {
                return Err(OptimizeError::InternalInvariant(format!(
                    "site {} not resolvable to an open depot",
                    site.site_id
                )))
            }
        }
    }

    Ok(DepotSelection { open, assignment })
}
