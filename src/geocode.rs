//! Address resolution with a persistent cache.
//!
//! The live geocoding service is an external collaborator behind the
//! `Geocoder` trait; the optimizer only consumes resolved coordinates. The
//! cache is a JSON dictionary keyed by address string, written incrementally
//! so an interrupted run loses little work.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::SiteCatalog;
use crate::error::Result;
use crate::geo::GeoPoint;

/// Cache writes are flushed after this many new entries.
const FLUSH_EVERY: usize = 50;

/// A live address resolution backend.
pub trait Geocoder {
    fn geocode(&mut self, address: &str) -> Option<GeoPoint>;
    fn name(&self) -> &str;
}

/// Table-backed geocoder. Useful as a deterministic backend and in tests.
#[derive(Debug, Default)]
pub struct StaticGeocoder {
    table: HashMap<String, GeoPoint>,
}

impl StaticGeocoder {
    pub fn new(entries: impl IntoIterator<Item = (String, GeoPoint)>) -> Self {
        StaticGeocoder {
            table: entries.into_iter().collect(),
        }
    }
}

impl Geocoder for StaticGeocoder {
    fn geocode(&mut self, address: &str) -> Option<GeoPoint> {
        self.table.get(address).copied()
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// One cached resolution attempt. Failed lookups are cached too so a bad
/// address is not retried on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeEntry {
    pub lat: f64,
    pub lon: f64,
    pub resolved: bool,
    pub source: String,
}

/// Address cache with a live backend behind it. With no backend the cache is
/// the only source (the `--skip-geocode` mode).
pub struct CachedGeocoder {
    entries: BTreeMap<String, GeocodeEntry>,
    path: Option<PathBuf>,
    pending: usize,
    live: Option<Box<dyn Geocoder>>,
}

impl CachedGeocoder {
    /// Cache-only resolver; nothing is looked up live.
    pub fn cache_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_backend(path, None)
    }

    pub fn with_backend<P: AsRef<Path>>(path: P, live: Option<Box<dyn Geocoder>>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let file = std::fs::File::open(&path)?;
            serde_json::from_reader(file)?
        } else {
            BTreeMap::new()
        };
        Ok(CachedGeocoder {
            entries,
            path: Some(path),
            pending: 0,
            live,
        })
    }

    /// In-memory resolver without a cache file.
    pub fn in_memory(live: Option<Box<dyn Geocoder>>) -> Self {
        CachedGeocoder {
            entries: BTreeMap::new(),
            path: None,
            pending: 0,
            live,
        }
    }

    /// Resolve one address: cache first, then the live backend if present.
    pub fn resolve(&mut self, address: &str) -> Option<GeoPoint> {
        if let Some(entry) = self.entries.get(address) {
            return entry
                .resolved
                .then(|| GeoPoint::new(entry.lat, entry.lon));
        }

        let live = self.live.as_mut()?;
        let result = live.geocode(address);
        let source = live.name().to_string();
        let entry = match result {
            Some(point) => GeocodeEntry {
                lat: point.lat,
                lon: point.lon,
                resolved: true,
                source,
            },
            None => GeocodeEntry {
                lat: 0.0,
                lon: 0.0,
                resolved: false,
                source,
            },
        };
        self.entries.insert(address.to_string(), entry);
        self.pending += 1;
        if self.pending >= FLUSH_EVERY {
            if let Err(e) = self.flush() {
                log::warn!("geocode cache flush failed: {}", e);
            }
        }
        result
    }

    /// Write pending entries to disk.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(path) = &self.path {
            let file = std::fs::File::create(path)?;
            serde_json::to_writer_pretty(file, &self.entries)?;
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

impl Drop for CachedGeocoder {
    fn drop(&mut self) {
        if self.pending > 0 {
            let _ = self.flush();
        }
    }
}

/// Resolve coordinates for every site in the catalog. Returns the number of
/// sites left without a coordinate; each is logged and excluded from routing.
pub fn resolve_catalog(catalog: &mut SiteCatalog, geocoder: &mut CachedGeocoder) -> usize {
    let mut unresolved = 0;
    for site in &mut catalog.sites {
        if site.coord.is_some() {
            continue;
        }
        match geocoder.resolve(&site.address) {
            Some(point) => site.coord = Some(point),
            None => {
                log::warn!(
                    "site {} ('{}') could not be geocoded; excluded from routing",
                    site.site_id,
                    site.address
                );
                unresolved += 1;
            }
        }
    }
    unresolved
}
