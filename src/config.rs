//! Operating configuration for the pickup network.
//!
//! Every cost rate, fleet limit and solver budget is injected through
//! `NetworkConfig` so no optimization stage hardcodes an operating value.
//! Defaults carry the current fleet contract numbers.

use serde::{Deserialize, Serialize};

/// Cost rates, fleet limits and solver budgets for one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Variable vehicle cost per driven km ($/km)
    pub variable_cost_per_km: f64,
    /// Driver wage ($/h)
    pub driver_wage_per_hour: f64,
    /// Average road speed used when no measured travel time exists (km/h)
    pub average_speed_kmh: f64,
    /// Straight-line to road-distance fudge factor
    pub road_factor: f64,
    /// Weekly fixed cost of keeping one truck on the road (lease, insurance) ($)
    pub truck_fixed_weekly: f64,
    /// Nominal activation cost charged by the route solver when a truck is
    /// dispatched at all on a day (cents); keeps marginal trucks parked
    pub truck_fixed_cost_solver_cents: i64,
    /// Payload target per truck per day (lbs)
    pub target_daily_payload_lbs: i64,
    /// Legal payload ceiling for any single visit (lbs)
    pub max_legal_payload_lbs: i64,
    /// Shift length available for driving plus service (minutes)
    pub effective_driving_minutes: i64,
    /// Unload time per collection bin (minutes)
    pub service_minutes_per_bin: i64,
    /// Resale revenue per collected pound ($/lb)
    pub revenue_per_lb: f64,
    /// Weekly hours per driver before overtime applies
    pub ot_weekly_threshold_hours: f64,
    /// Overtime wage multiplier
    pub ot_multiplier: f64,
    /// Wall-clock budget per daily routing sub-problem (seconds)
    pub solver_time_limit_secs: f64,
    /// Maximum improved solutions per sub-problem before stopping
    pub solver_solution_limit: usize,
    /// Random seed for all stochastic search
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            variable_cost_per_km: 0.39,
            driver_wage_per_hour: 24.0,
            average_speed_kmh: 40.0,
            road_factor: 1.3,
            truck_fixed_weekly: 636.0,
            truck_fixed_cost_solver_cents: 500,
            target_daily_payload_lbs: 4000,
            max_legal_payload_lbs: 10_000,
            effective_driving_minutes: 660,
            service_minutes_per_bin: 5,
            revenue_per_lb: 0.06,
            ot_weekly_threshold_hours: 40.0,
            ot_multiplier: 1.5,
            solver_time_limit_secs: 10.0,
            solver_solution_limit: 2000,
            seed: 42,
        }
    }
}

impl NetworkConfig {
    /// Integer cent cost of traversing one arc: per-km variable cost plus
    /// driver time at the hourly wage, each rounded to cents separately.
    #[inline]
    pub fn arc_cost_cents(&self, dist_km: f64, time_min: i64) -> i64 {
        let km_cents = (dist_km * self.variable_cost_per_km * 100.0).round() as i64;
        let wage_cents = (time_min as f64 / 60.0 * self.driver_wage_per_hour * 100.0).round() as i64;
        km_cents + wage_cents
    }

    /// Driving minutes for a distance at the configured average speed.
    #[inline]
    pub fn drive_minutes(&self, dist_km: f64) -> i64 {
        (dist_km / self.average_speed_kmh * 60.0).round() as i64
    }

    /// Search budgets for one daily sub-problem.
    pub fn solver(&self) -> SolverConfig {
        SolverConfig {
            time_limit_secs: self.solver_time_limit_secs,
            solution_limit: self.solver_solution_limit,
            seed: self.seed,
        }
    }
}

/// Search budgets for the daily route solver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverConfig {
    pub time_limit_secs: f64,
    pub solution_limit: usize,
    pub seed: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        NetworkConfig::default().solver()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arc_cost_combines_distance_and_wage() {
        let config = NetworkConfig::default();
        // 20 km, 30 min: 20 * 0.39 * 100 = 780 cents, 0.5 h * 24 * 100 = 1200 cents
        assert_eq!(config.arc_cost_cents(20.0, 30), 1980);
    }

    #[test]
    fn test_drive_minutes_at_average_speed() {
        let config = NetworkConfig::default();
        assert_eq!(config.drive_minutes(40.0), 60);
        assert_eq!(config.drive_minutes(10.0), 15);
    }

    #[test]
    fn test_zero_arc_is_free() {
        let config = NetworkConfig::default();
        assert_eq!(config.arc_cost_cents(0.0, 0), 0);
    }
}
