//! Distance, travel-time and arc-cost matrices for one routing sub-problem.
//!
//! Point 0 is the depot; the rest are the day's visit stops. The three
//! matrices are built together so the solver can rely on them being
//! dimensionally consistent. Pairs the oracle cannot answer silently use the
//! straight-line fallback, so the matrices look the same to the solver either
//! way.

use crate::config::NetworkConfig;
use crate::geo::{haversine_km, GeoPoint};
use crate::oracle::CachedOracle;

/// Square matrices over the sub-problem's points: km, integer minutes and
/// integer cent arc costs. Diagonals are zero.
#[derive(Debug, Clone)]
pub struct CostMatrices {
    pub dist_km: Vec<Vec<f64>>,
    pub time_min: Vec<Vec<i64>>,
    pub arc_cost_cents: Vec<Vec<i64>>,
}

impl CostMatrices {
    pub fn dim(&self) -> usize {
        self.dist_km.len()
    }

    #[inline]
    pub fn dist(&self, i: usize, j: usize) -> f64 {
        self.dist_km[i][j]
    }

    #[inline]
    pub fn time(&self, i: usize, j: usize) -> i64 {
        self.time_min[i][j]
    }

    #[inline]
    pub fn arc_cost(&self, i: usize, j: usize) -> i64 {
        self.arc_cost_cents[i][j]
    }
}

/// Build the matrices for `points`, asking the oracle for every pair first.
/// Returns the matrices and the number of cells that used the straight-line
/// fallback (0 when the oracle answered everything).
pub fn build_cost_matrices(
    points: &[GeoPoint],
    oracle: &mut CachedOracle,
    config: &NetworkConfig,
) -> (CostMatrices, usize) {
    let n = points.len();
    let mut dist_km = vec![vec![0.0; n]; n];
    let mut time_min = vec![vec![0i64; n]; n];
    let mut arc_cost_cents = vec![vec![0i64; n]; n];

    oracle.prime(points);

    let mut fallback_cells = 0;
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let (d, t) = match oracle.leg(points[i], points[j]) {
                Some(leg) => (leg.dist_km, leg.time_min),
                None => {
                    fallback_cells += 1;
                    let d = haversine_km(points[i], points[j]) * config.road_factor;
                    (d, config.drive_minutes(d))
                }
            };
            dist_km[i][j] = d;
            time_min[i][j] = t;
            arc_cost_cents[i][j] = config.arc_cost_cents(d, t);
        }
    }

    if fallback_cells > 0 {
        log::debug!(
            "{} of {} matrix cells used straight-line fallback",
            fallback_cells,
            n * n - n
        );
    }

    (
        CostMatrices {
            dist_km,
            time_min,
            arc_cost_cents,
        },
        fallback_cells,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{DistanceOracle, Leg};

    #[test]
    fn test_fallback_matrices_are_consistent() {
        let config = NetworkConfig::default();
        let points = vec![
            GeoPoint::new(40.0, -74.0),
            GeoPoint::new(40.09, -74.0), // ~10 km north
        ];
        let mut oracle = CachedOracle::in_memory(None);
        let (m, fallback) = build_cost_matrices(&points, &mut oracle, &config);

        assert_eq!(m.dim(), 2);
        assert_eq!(fallback, 2);
        assert_eq!(m.dist(0, 0), 0.0);
        assert_eq!(m.arc_cost(1, 1), 0);

        // ~10 km straight line -> ~13 road km, ~20 min at 40 km/h
        assert!((m.dist(0, 1) - 13.0).abs() < 0.1, "got {}", m.dist(0, 1));
        assert_eq!(m.time(0, 1), config.drive_minutes(m.dist(0, 1)));
        assert_eq!(
            m.arc_cost(0, 1),
            config.arc_cost_cents(m.dist(0, 1), m.time(0, 1))
        );
    }

    #[test]
    fn test_partial_oracle_mixes_sources() {
        /// Answers only pairs whose origin is the first point.
        struct FirstRowOracle;
        impl DistanceOracle for FirstRowOracle {
            fn distance_matrix(
                &mut self,
                origins: &[GeoPoint],
                destinations: &[GeoPoint],
            ) -> Vec<Vec<Option<Leg>>> {
                origins
                    .iter()
                    .map(|&a| {
                        destinations
                            .iter()
                            .map(|&b| {
                                (a.lat == 40.0 && a != b).then_some(Leg {
                                    dist_km: 99.0,
                                    time_min: 99,
                                })
                            })
                            .collect()
                    })
                    .collect()
            }
        }

        let config = NetworkConfig::default();
        let points = vec![GeoPoint::new(40.0, -74.0), GeoPoint::new(40.5, -74.0)];
        let mut oracle = CachedOracle::in_memory(Some(Box::new(FirstRowOracle)));
        let (m, fallback) = build_cost_matrices(&points, &mut oracle, &config);

        assert_eq!(m.dist(0, 1), 99.0);
        assert_eq!(m.time(0, 1), 99);
        // reverse direction fell back to straight-line
        assert_eq!(fallback, 1);
        assert!(m.dist(1, 0) < 99.0);
    }
}
