//! Pickup Network Optimizer Library
//!
//! Weekly profit optimizer for a donation-pickup truck network: decides which
//! depots stay open, which sites are worth serving, and how daily truck
//! routes are composed so the network's weekly net contribution is maximized.
//!
//! # Pipeline
//!
//! - Frequency codes expand into a seven-day visit plan (`schedule`)
//! - A greedy closure loop picks the open depots (`depots`)
//! - Each (depot, weekday) becomes a capacitated routing problem with
//!   optional, penalty-priced stops (`solver`), over integer cent cost
//!   matrices (`matrix`)
//! - Marginal routes are deleted by a profitability filter (`filter`) and the
//!   week rolls up into a network P&L (`pnl`)
//!
//! # Example
//!
//! ```no_run
//! use pickup_route_optimizer::catalog::{load_depots, SiteCatalog};
//! use pickup_route_optimizer::config::NetworkConfig;
//! use pickup_route_optimizer::oracle::CachedOracle;
//! use pickup_route_optimizer::pipeline::{run_pipeline, PipelineOptions};
//!
//! let config = NetworkConfig::default();
//! let catalog = SiteCatalog::from_csv_path("sites.csv", &config).unwrap();
//! let depots = load_depots("depots.json").unwrap();
//! let mut oracle = CachedOracle::cache_only("distance_cache.json").unwrap();
//!
//! let options = PipelineOptions::default();
//! let solution = run_pipeline(&catalog, &depots, &mut oracle, &config, &options).unwrap();
//! println!("Weekly net: {:.2}", solution.pnl.net);
//! ```

pub mod catalog;
pub mod config;
pub mod depots;
pub mod error;
pub mod filter;
pub mod geo;
pub mod geocode;
pub mod matrix;
pub mod oracle;
pub mod pipeline;
pub mod pnl;
pub mod schedule;
pub mod solver;

pub use catalog::{Depot, Site, SiteCatalog};
pub use config::NetworkConfig;
pub use pipeline::WeeklySolution;
pub use solver::DailySolution;
