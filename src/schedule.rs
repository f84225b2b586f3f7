//! Weekly visit plan.
//!
//! Expands each site's frequency code into the visit nodes required on each
//! weekday (0 = Monday .. 6 = Sunday). Expansion is a pure function of the
//! catalog: no randomness, so the plan is identical across runs.

use serde::{Deserialize, Serialize};

use crate::catalog::{FrequencyCode, SiteCatalog};

/// One visit to one site on one day, as the route solver sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitNode {
    /// Index of the site in the catalog
    pub site_idx: usize,
    pub site_id: u32,
    /// Load collected by this visit (lbs)
    pub demand_lbs: i64,
    /// Bin unload time at the stop (minutes)
    pub service_minutes: i64,
    /// Revenue minus structural cost for this visit ($, may be negative)
    pub net_contribution: f64,
}

/// Visit nodes needed on each weekday.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub days: [Vec<VisitNode>; 7],
}

impl WeeklySchedule {
    pub fn day(&self, weekday: usize) -> &[VisitNode] {
        &self.days[weekday]
    }

    pub fn total_visits(&self) -> usize {
        self.days.iter().map(Vec::len).sum()
    }
}

/// Weekdays a frequency code is served on.
fn visit_days(frequency: FrequencyCode, site_id: u32) -> Vec<usize> {
    match frequency {
        FrequencyCode::D1 | FrequencyCode::D2 => (0..7).collect(),
        FrequencyCode::D3 => vec![1, 3],
        FrequencyCode::D4 => vec![0, 2, 4],
        FrequencyCode::D5 => vec![(site_id % 7) as usize],
    }
}

/// Expand the catalog into the seven-day visit plan.
///
/// On weekdays listed in `holidays` only sites with a positive net
/// contribution are kept; the rest are skipped for that day but still served
/// on their other scheduled days. Sites without a coordinate produce nothing.
pub fn build_weekly_schedule(catalog: &SiteCatalog, holidays: &[usize]) -> WeeklySchedule {
    let mut schedule = WeeklySchedule::default();

    for (site_idx, site) in catalog.sites.iter().enumerate() {
        if site.coord.is_none() {
            continue;
        }
        let net = site.net_contribution_per_visit();

        for weekday in visit_days(site.frequency, site.site_id) {
            if holidays.contains(&weekday) && net <= 0.0 {
                continue;
            }

            match site.frequency {
                FrequencyCode::D2 => {
                    // Two visits split the daily load; the first carries the
                    // ceiling half so the pair always sums to the full day.
                    let first = (site.daily_demand_lbs + 1) / 2;
                    let second = site.daily_demand_lbs - first;
                    for demand_lbs in [first, second] {
                        schedule.days[weekday].push(VisitNode {
                            site_idx,
                            site_id: site.site_id,
                            demand_lbs,
                            service_minutes: site.service_minutes,
                            net_contribution: net,
                        });
                    }
                }
                _ => {
                    schedule.days[weekday].push(VisitNode {
                        site_idx,
                        site_id: site.site_id,
                        demand_lbs: site.daily_demand_lbs,
                        service_minutes: site.service_minutes,
                        net_contribution: net,
                    });
                }
            }
        }
    }

    schedule
}
