//! Driving-distance oracle seam and pair cache.
//!
//! The external routing service is an external collaborator behind the
//! `DistanceOracle` trait; it answers origin x destination blocks of at most
//! 10 x 10 and may return partial results. Measured legs are cached in a JSON
//! dictionary keyed by coordinate pair; both orderings of a pair may be
//! cached independently. Missing legs are filled by the Haversine fallback at
//! matrix-construction time, never here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::geo::GeoPoint;

/// Collaborator-enforced request block limit.
pub const MAX_BATCH: usize = 10;

/// Cache writes are flushed after this many new pairs.
const FLUSH_EVERY: usize = 500;

/// One measured leg between two points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Leg {
    pub dist_km: f64,
    pub time_min: i64,
}

/// A live driving-distance service. Cells the service cannot answer are
/// `None`; callers fall back to straight-line estimates.
pub trait DistanceOracle {
    fn distance_matrix(
        &mut self,
        origins: &[GeoPoint],
        destinations: &[GeoPoint],
    ) -> Vec<Vec<Option<Leg>>>;
}

fn pair_key(a: GeoPoint, b: GeoPoint) -> String {
    format!("{:.6},{:.6}|{:.6},{:.6}", a.lat, a.lon, b.lat, b.lon)
}

/// Pair cache with an optional live oracle behind it.
pub struct CachedOracle {
    entries: BTreeMap<String, Leg>,
    path: Option<PathBuf>,
    pending: usize,
    live: Option<Box<dyn DistanceOracle>>,
}

impl CachedOracle {
    /// Cache-only oracle; every uncached pair will use the fallback.
    pub fn cache_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_backend(path, None)
    }

    pub fn with_backend<P: AsRef<Path>>(
        path: P,
        live: Option<Box<dyn DistanceOracle>>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let file = std::fs::File::open(&path)?;
            serde_json::from_reader(file)?
        } else {
            BTreeMap::new()
        };
        Ok(CachedOracle {
            entries,
            path: Some(path),
            pending: 0,
            live,
        })
    }

    /// In-memory oracle without a cache file.
    pub fn in_memory(live: Option<Box<dyn DistanceOracle>>) -> Self {
        CachedOracle {
            entries: BTreeMap::new(),
            path: None,
            pending: 0,
            live,
        }
    }

    /// Ensure every ordered pair over `points` has been asked of the live
    /// oracle once. Requests go out in blocks of at most 10 x 10 and only for
    /// blocks with at least one uncached pair. Unanswered cells stay absent.
    pub fn prime(&mut self, points: &[GeoPoint]) {
        if self.live.is_none() {
            return;
        }

        let blocks: Vec<(usize, usize)> = {
            let mut blocks = Vec::new();
            let mut o = 0;
            while o < points.len() {
                let mut d = 0;
                while d < points.len() {
                    blocks.push((o, d));
                    d += MAX_BATCH;
                }
                o += MAX_BATCH;
            }
            blocks
        };

        for (o_start, d_start) in blocks {
            let origins = &points[o_start..(o_start + MAX_BATCH).min(points.len())];
            let destinations = &points[d_start..(d_start + MAX_BATCH).min(points.len())];

            let any_missing = origins.iter().any(|&a| {
                destinations
                    .iter()
                    .any(|&b| a != b && !self.entries.contains_key(&pair_key(a, b)))
            });
            if !any_missing {
                continue;
            }

            let live = self.live.as_mut().expect("checked above");
            let rows = live.distance_matrix(origins, destinations);
            for (i, row) in rows.iter().enumerate() {
                for (j, cell) in row.iter().enumerate() {
                    if let Some(leg) = cell {
                        self.entries.insert(pair_key(origins[i], destinations[j]), *leg);
                        self.pending += 1;
                    }
                }
            }
            if self.pending >= FLUSH_EVERY {
                if let Err(e) = self.flush() {
                    log::warn!("distance cache flush failed: {}", e);
                }
            }
        }
    }

    /// Cached leg for an ordered pair, if any.
    pub fn leg(&self, a: GeoPoint, b: GeoPoint) -> Option<Leg> {
        self.entries.get(&pair_key(a, b)).copied()
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(path) = &self.path {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer(file, &self.entries)?;
        }
        self.pending = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for CachedOracle {
    fn drop(&mut self) {
        if self.pending > 0 {
            let _ = self.flush();
        }
    }
}
