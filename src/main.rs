//! Pickup network optimizer - command line interface.
//!
//! Loads the Site_Table export and the depot roster, resolves coordinates
//! from the geocode cache, runs the weekly optimization and prints the
//! network P&L. Optional JSON and CSV exports carry the full solution.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use pickup_route_optimizer::catalog::{load_depots, SiteCatalog};
use pickup_route_optimizer::config::NetworkConfig;
use pickup_route_optimizer::error::Result;
use pickup_route_optimizer::geocode::{resolve_catalog, CachedGeocoder};
use pickup_route_optimizer::oracle::CachedOracle;
use pickup_route_optimizer::pipeline::{run_pipeline, PipelineOptions, WeeklySolution};

#[derive(Parser)]
#[command(name = "pickup-route-optimizer")]
#[command(version = "1.0")]
#[command(about = "Weekly profit optimizer for a donation-pickup truck network")]
struct Cli {
    /// CSV export of the Site_Table sheet
    #[arg(short, long)]
    input: PathBuf,

    /// Depot roster JSON (exactly one anchor)
    #[arg(short, long)]
    depots: PathBuf,

    /// Restrict to one weekday (0 = Monday .. 6 = Sunday)
    #[arg(long)]
    day: Option<usize>,

    /// Restrict to one depot key
    #[arg(long)]
    depot: Option<String>,

    /// Override the per-sub-problem solver time budget (seconds)
    #[arg(long)]
    solver_time: Option<f64>,

    /// Use the geocode cache only; never call a live service
    #[arg(long)]
    skip_geocode: bool,

    /// Weekdays under the holiday policy, comma separated (0..6)
    #[arg(long, value_delimiter = ',')]
    holidays: Vec<usize>,

    /// Write the weekly solution as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write per-route stop details as CSV
    #[arg(long)]
    routes_csv: Option<PathBuf>,

    /// Geocode cache file
    #[arg(long, default_value = "geocode_cache.json")]
    geocode_cache: PathBuf,

    /// Distance pair cache file
    #[arg(long, default_value = "distance_cache.json")]
    distance_cache: PathBuf,

    /// Random seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let started = Instant::now();
    if cli.verbose {
        println!("Run started {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    }

    let mut config = NetworkConfig::default();
    if let Some(seconds) = cli.solver_time {
        config.solver_time_limit_secs = seconds;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(day) = cli.day {
        if day > 6 {
            eprintln!("--day must be in 0..6");
            return Ok(ExitCode::from(1));
        }
    }

    println!("Loading site table from {:?}...", cli.input);
    let mut catalog = SiteCatalog::from_csv_path(&cli.input, &config)?;
    let depots = load_depots(&cli.depots)?;
    println!("Loaded {} sites, {} depots", catalog.len(), depots.len());

    if !cli.skip_geocode {
        log::debug!("no live geocoding backend configured; resolving from cache only");
    }
    let mut geocoder = CachedGeocoder::cache_only(&cli.geocode_cache)?;
    let unresolved = resolve_catalog(&mut catalog, &mut geocoder);
    geocoder.flush()?;
    if unresolved > 0 {
        println!("{} sites without coordinates are excluded from routing", unresolved);
    }

    let mut oracle = CachedOracle::cache_only(&cli.distance_cache)?;

    let options = PipelineOptions {
        holidays: cli.holidays.clone(),
        restrict_day: cli.day,
        restrict_depot: cli.depot.clone(),
        solver: config.solver(),
        show_progress: true,
    };

    let solution = run_pipeline(&catalog, &depots, &mut oracle, &config, &options)?;
    oracle.flush()?;

    if solution.open_depots.is_empty() {
        eprintln!("No depots remain open");
        return Ok(ExitCode::from(2));
    }

    print_report(&solution, cli.verbose);
    println!("\nTotal time: {:.1}s", started.elapsed().as_secs_f64());

    if let Some(path) = &cli.output {
        let json = serde_json::to_string_pretty(&solution)?;
        std::fs::write(path, json)?;
        println!("Solution saved to {:?}", path);
    }
    if let Some(path) = &cli.routes_csv {
        export_routes_csv(&solution, path)?;
        println!("Route details saved to {:?}", path);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_report(solution: &WeeklySolution, verbose: bool) {
    println!("\n========== Weekly Network Results ==========");
    println!("Open depots: {}", solution.open_depots.join(", "));
    println!("Excluded sites: {}", solution.exclusions.len());
    if solution.fallback_cells > 0 {
        println!(
            "Degraded distances: {} matrix cells used the straight-line fallback",
            solution.fallback_cells
        );
    }
    if solution.routes_filtered > 0 {
        println!("Routes removed as not cost-justified: {}", solution.routes_filtered);
    }

    println!(
        "\n{:<12} {:>10} {:>10} {:>10} {:>10} {:>10} {:>8} {:>8}",
        "Depot", "Revenue", "Driver", "Vehicle", "Fixed", "Net", "Routes", "Dropped"
    );
    println!("{}", "-".repeat(84));
    for depot in &solution.pnl.per_depot {
        println!(
            "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>8} {:>8}",
            depot.depot_key,
            depot.revenue,
            depot.driver_cost,
            depot.variable_cost,
            depot.fixed_cost,
            depot.net,
            depot.routes,
            depot.dropped_visits
        );
    }
    println!("{}", "-".repeat(84));
    println!(
        "{:<12} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>8} {:>8}",
        "network",
        solution.pnl.revenue,
        solution.pnl.driver_cost,
        solution.pnl.variable_cost,
        solution.pnl.fixed_cost,
        solution.pnl.net,
        solution.pnl.routes,
        solution.pnl.dropped_visits
    );
    println!(
        "\nCollected: {} lbs over {:.1} km with {} trucks",
        solution.pnl.lbs_collected, solution.pnl.km_driven, solution.pnl.trucks_used
    );

    if verbose {
        for daily in &solution.dailies {
            println!("\n[{} / weekday {}]", daily.depot_key, daily.weekday);
            for (i, route) in daily.routes.iter().enumerate() {
                let stops: Vec<String> =
                    route.stops.iter().map(|s| s.site_id.to_string()).collect();
                println!(
                    "  truck {}: {} stops, {} lbs, {} min, {:.1} km | {}",
                    i,
                    route.stops.len(),
                    route.total_lbs,
                    route.total_minutes,
                    route.total_km,
                    stops.join(" -> ")
                );
            }
            for dropped in &daily.dropped {
                println!("  dropped site {} ({:?})", dropped.node.site_id, dropped.reason);
            }
        }
    }
}

fn export_routes_csv(solution: &WeeklySolution, path: &PathBuf) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "depot",
        "weekday",
        "truck",
        "stop_seq",
        "site_id",
        "demand_lbs",
        "service_minutes",
        "net_contribution",
    ])?;
    for daily in &solution.dailies {
        for (truck, route) in daily.routes.iter().enumerate() {
            for (seq, stop) in route.stops.iter().enumerate() {
                writer.write_record([
                    daily.depot_key.clone(),
                    daily.weekday.to_string(),
                    truck.to_string(),
                    seq.to_string(),
                    stop.site_id.to_string(),
                    stop.demand_lbs.to_string(),
                    stop.service_minutes.to_string(),
                    format!("{:.2}", stop.net_contribution),
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}
