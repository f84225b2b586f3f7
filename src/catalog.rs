//! Site catalog and depot roster.
//!
//! Sites are loaded once from the Site_Table export and are immutable
//! afterwards, except that coordinates are resolved in place by the geocoding
//! step before any routing runs. Depot assignment is kept outside the catalog
//! (see `depots`) so the closure loop can mutate it freely.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::NetworkConfig;
use crate::error::{OptimizeError, Result};
use crate::geo::GeoPoint;

/// Weekly visit pattern of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyCode {
    /// One visit every day of the week
    D1,
    /// Two visits every day of the week
    D2,
    /// Tuesday and Thursday
    D3,
    /// Monday, Wednesday and Friday
    D4,
    /// One visit per week on a rotating weekday
    D5,
}

impl FrequencyCode {
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "D1" => Some(FrequencyCode::D1),
            "D2" => Some(FrequencyCode::D2),
            "D3" => Some(FrequencyCode::D3),
            "D4" => Some(FrequencyCode::D4),
            "D5" => Some(FrequencyCode::D5),
            _ => None,
        }
    }

    /// Number of visits this pattern generates per week.
    pub fn weekly_visits(&self) -> u32 {
        match self {
            FrequencyCode::D1 => 7,
            FrequencyCode::D2 => 14,
            FrequencyCode::D3 => 2,
            FrequencyCode::D4 => 3,
            FrequencyCode::D5 => 1,
        }
    }
}

/// A service site. Immutable after load apart from coordinate resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Unique site identifier
    pub site_id: u32,
    /// Opaque street address handed to the geocoder
    pub address: String,
    /// Resolved coordinate; `None` excludes the site from routing
    pub coord: Option<GeoPoint>,
    /// Weekly visit pattern
    pub frequency: FrequencyCode,
    /// Number of collection bins on site
    pub bins: u32,
    /// Pounds collected on one visited day (split across visits for D2)
    pub daily_demand_lbs: i64,
    /// Revenue booked per visit ($)
    pub revenue_per_visit: f64,
    /// (annual rent + annual waste) / annual visits ($)
    pub structural_cost_per_visit: f64,
    /// Bin unload time per visit (minutes)
    pub service_minutes: i64,
}

impl Site {
    /// Revenue per visit minus structural cost per visit. May be negative.
    #[inline]
    pub fn net_contribution_per_visit(&self) -> f64 {
        self.revenue_per_visit - self.structural_cost_per_visit
    }

    /// Largest single-visit load this site can put on a truck.
    pub fn demand_per_visit_lbs(&self) -> i64 {
        match self.frequency {
            // Two visits split the day; the first visit carries the ceiling half.
            FrequencyCode::D2 => (self.daily_demand_lbs + 1) / 2,
            _ => self.daily_demand_lbs,
        }
    }
}

/// Why a site takes no part in routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExclusionReason {
    /// Address could not be resolved to a coordinate
    Ungeocoded,
}

/// An excluded site together with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exclusion {
    pub site_id: u32,
    pub reason: ExclusionReason,
}

/// A truck depot. `key` orders depots wherever a stable order is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Depot {
    pub key: String,
    pub name: String,
    pub address: String,
    pub coord: GeoPoint,
    pub max_trucks: usize,
    /// The warehouse anchor; never eligible for closure
    pub anchor: bool,
}

/// The full site catalog for one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteCatalog {
    pub sites: Vec<Site>,
}

impl SiteCatalog {
    pub fn new(sites: Vec<Site>) -> Self {
        SiteCatalog { sites }
    }

    /// Load the catalog from a CSV export of the Site_Table sheet.
    ///
    /// Data rows start at spreadsheet row 3; the two leading rows are
    /// banner/header and are skipped. Duplicate site ids keep the first
    /// occurrence.
    pub fn from_csv_path<P: AsRef<Path>>(path: P, config: &NetworkConfig) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            OptimizeError::Input(format!("cannot open {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_csv_reader(file, config)
    }

    /// Load the catalog from any CSV reader (used directly by tests).
    pub fn from_csv_reader<R: std::io::Read>(reader: R, config: &NetworkConfig) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut sites: Vec<Site> = Vec::new();

        for (row_idx, record) in csv_reader.records().enumerate() {
            let record = record?;
            // Rows 1 and 2 of the sheet are banner and column headers.
            if row_idx < 2 {
                continue;
            }
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }

            let site = parse_site_row(&record, row_idx + 1, config)?;

            if sites.iter().any(|s| s.site_id == site.site_id) {
                log::warn!("duplicate site id {} at row {}; keeping first", site.site_id, row_idx + 1);
                continue;
            }
            sites.push(site);
        }

        if sites.is_empty() {
            return Err(OptimizeError::Input("no data rows in site table".to_string()));
        }

        Ok(SiteCatalog { sites })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Sites that cannot be routed, with reasons.
    pub fn exclusions(&self) -> Vec<Exclusion> {
        self.sites
            .iter()
            .filter(|s| s.coord.is_none())
            .map(|s| Exclusion {
                site_id: s.site_id,
                reason: ExclusionReason::Ungeocoded,
            })
            .collect()
    }
}

fn field<'a>(record: &'a csv::StringRecord, idx: usize, row: usize, name: &str) -> Result<&'a str> {
    record
        .get(idx)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| OptimizeError::Input(format!("row {}: missing {}", row, name)))
}

fn parse_num<T: std::str::FromStr>(value: &str, row: usize, name: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| OptimizeError::Input(format!("row {}: invalid {} '{}'", row, name, value)))
}

/// Site_Table columns (0-indexed): 1=Site_ID, 2=Address, 3=FrequencyCode,
/// 4=Bins, 5=Annual_Lbs, 6=RentAnnual, 7=WasteAnnual, 8=Annual_Visits,
/// 9=Lbs_Per_Visit, 10=RevenuePerVisit. Columns 11 and 12 are unused.
fn parse_site_row(record: &csv::StringRecord, row: usize, config: &NetworkConfig) -> Result<Site> {
    let site_id: u32 = parse_num(field(record, 1, row, "Site_ID")?, row, "Site_ID")?;
    let address = field(record, 2, row, "Address")?.to_string();

    let freq_code = field(record, 3, row, "FrequencyCode")?;
    let frequency = FrequencyCode::parse(freq_code)
        .ok_or_else(|| OptimizeError::Input(format!("row {}: unknown frequency code '{}'", row, freq_code)))?;

    let bins: u32 = parse_num(field(record, 4, row, "Bins")?, row, "Bins")?;
    let rent: f64 = parse_num(field(record, 6, row, "RentAnnual")?, row, "RentAnnual")?;
    let waste: f64 = parse_num(field(record, 7, row, "WasteAnnual")?, row, "WasteAnnual")?;
    let annual_visits: u32 = parse_num(field(record, 8, row, "Annual_Visits")?, row, "Annual_Visits")?;
    let lbs_per_visit: f64 = parse_num(field(record, 9, row, "Lbs_Per_Visit")?, row, "Lbs_Per_Visit")?;
    let revenue_per_visit: f64 = parse_num(field(record, 10, row, "RevenuePerVisit")?, row, "RevenuePerVisit")?;

    if bins == 0 && lbs_per_visit > 0.0 {
        return Err(OptimizeError::Input(format!(
            "row {}: site {} has demand but no bins",
            row, site_id
        )));
    }

    // D2 rows carry the per-visit half; the catalog stores the full daily load.
    let daily_demand_lbs = match frequency {
        FrequencyCode::D2 => (lbs_per_visit * 2.0).round() as i64,
        _ => lbs_per_visit.round() as i64,
    };

    let structural_cost_per_visit = if annual_visits > 0 {
        (rent + waste) / annual_visits as f64
    } else {
        0.0
    };

    let site = Site {
        site_id,
        address,
        coord: None,
        frequency,
        bins,
        daily_demand_lbs,
        revenue_per_visit,
        structural_cost_per_visit,
        service_minutes: bins as i64 * config.service_minutes_per_bin,
    };

    if site.demand_per_visit_lbs() > config.max_legal_payload_lbs {
        return Err(OptimizeError::Input(format!(
            "row {}: site {} per-visit demand {} lbs exceeds legal payload {} lbs",
            row,
            site_id,
            site.demand_per_visit_lbs(),
            config.max_legal_payload_lbs
        )));
    }

    Ok(site)
}

/// Load the depot roster from a JSON file. Exactly one depot must be the
/// anchor, and depot keys must be unique.
pub fn load_depots<P: AsRef<Path>>(path: P) -> Result<Vec<Depot>> {
    let file = File::open(path.as_ref()).map_err(|e| {
        OptimizeError::Input(format!("cannot open {}: {}", path.as_ref().display(), e))
    })?;
    let depots: Vec<Depot> = serde_json::from_reader(file)?;
    validate_depots(&depots)?;
    Ok(depots)
}

pub fn validate_depots(depots: &[Depot]) -> Result<()> {
    if depots.is_empty() {
        return Err(OptimizeError::Input("depot roster is empty".to_string()));
    }
    let anchors = depots.iter().filter(|d| d.anchor).count();
    if anchors != 1 {
        return Err(OptimizeError::Input(format!(
            "expected exactly one anchor depot, found {}",
            anchors
        )));
    }
    for depot in depots {
        if depot.max_trucks == 0 {
            return Err(OptimizeError::Input(format!(
                "depot {} has no trucks",
                depot.key
            )));
        }
        if depots.iter().filter(|d| d.key == depot.key).count() > 1 {
            return Err(OptimizeError::Input(format!(
                "duplicate depot key {}",
                depot.key
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE_TABLE: &str = "\
Site Table Export,,,,,,,,,,,,
,Site_ID,Address,FrequencyCode,Bins,Annual_Lbs,RentAnnual,WasteAnnual,Annual_Visits,Lbs_Per_Visit,RevenuePerVisit,ServiceMinutes,AnnualSiteValue
,101,10 Main St,D1,2,182500,1200,300,365,500,30,10,9000
,102,22 Oak Ave,D2,4,1460000,0,730,730,2000,55,20,30000
,103,5 Pine Rd,D5,1,10400,520,0,52,200,12,5,400
";

    #[test]
    fn test_parse_site_table() {
        let catalog =
            SiteCatalog::from_csv_reader(SITE_TABLE.as_bytes(), &NetworkConfig::default()).unwrap();
        assert_eq!(catalog.len(), 3);

        let s1 = &catalog.sites[0];
        assert_eq!(s1.site_id, 101);
        assert_eq!(s1.frequency, FrequencyCode::D1);
        assert_eq!(s1.daily_demand_lbs, 500);
        assert_eq!(s1.service_minutes, 10);
        // (1200 + 300) / 365
        assert!((s1.structural_cost_per_visit - 4.1095).abs() < 1e-3);

        // D2 row stores the full daily load
        let s2 = &catalog.sites[1];
        assert_eq!(s2.daily_demand_lbs, 4000);
        assert_eq!(s2.demand_per_visit_lbs(), 2000);
    }

    #[test]
    fn test_duplicate_site_keeps_first() {
        let data = "\
banner,,,,,,,,,,,,
header,,,,,,,,,,,,
,7,A St,D1,1,0,0,0,365,100,10,5,0
,7,B St,D1,1,0,0,0,365,999,99,5,0
";
        let catalog =
            SiteCatalog::from_csv_reader(data.as_bytes(), &NetworkConfig::default()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.sites[0].address, "A St");
    }

    #[test]
    fn test_zero_bins_with_demand_is_fatal() {
        let data = "\
banner,,,,,,,,,,,,
header,,,,,,,,,,,,
,7,A St,D1,0,0,0,0,365,100,10,5,0
";
        let err = SiteCatalog::from_csv_reader(data.as_bytes(), &NetworkConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_overweight_visit_is_fatal() {
        let data = "\
banner,,,,,,,,,,,,
header,,,,,,,,,,,,
,7,A St,D1,1,0,0,0,365,20000,10,5,0
";
        let err = SiteCatalog::from_csv_reader(data.as_bytes(), &NetworkConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_net_contribution_may_be_negative() {
        let site = Site {
            site_id: 1,
            address: String::new(),
            coord: None,
            frequency: FrequencyCode::D1,
            bins: 1,
            daily_demand_lbs: 100,
            revenue_per_visit: 5.0,
            structural_cost_per_visit: 10.0,
            service_minutes: 5,
        };
        assert_eq!(site.net_contribution_per_visit(), -5.0);
    }

    #[test]
    fn test_anchor_count_enforced() {
        let depot = |key: &str, anchor: bool| Depot {
            key: key.to_string(),
            name: key.to_string(),
            address: String::new(),
            coord: GeoPoint::new(0.0, 0.0),
            max_trucks: 1,
            anchor,
        };
        assert!(validate_depots(&[depot("a", true), depot("b", false)]).is_ok());
        assert!(validate_depots(&[depot("a", false), depot("b", false)]).is_err());
        assert!(validate_depots(&[depot("a", true), depot("b", true)]).is_err());
    }
}
