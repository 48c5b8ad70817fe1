//! Command-line journey planner.
//!
//! ```text
//! transit-planner <network.json> <from> <to> <YYYY-MM-DD> <HH:MM> [--arrive-by]
//! ```
//!
//! `from` and `to` are station ids or `lat,lon` positions. Settings are
//! read from the JSON file named by `TRANSIT_CONFIG`, if set; the route
//! cost index is cached in `TRANSIT_CACHE_DIR` (default `.transit-cache`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use transit_planner::cache::{CacheError, FileDataCache};
use transit_planner::cost_index::{CostIndexConfig, CostIndexError, RouteCostIndex};
use transit_planner::domain::{
    InvalidId, LatLong, Location, StationId, TimeError, TimeOfDay, TransitData,
};
use transit_planner::filter::EntityFilter;
use transit_planner::graph::{GraphBuildError, GraphConfig, NodeContentCache, TransitGraph};
use transit_planner::planner::{
    JourneyRequest, PlanError, RouteCalculator, SearchConfig, rank_journeys,
    rank_latest_departure,
};

const USAGE: &str =
    "usage: transit-planner <network.json> <from> <to> <YYYY-MM-DD> <HH:MM> [--arrive-by]";

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("{}", USAGE)]
    Usage,

    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    Date(String),

    #[error("invalid position {0:?}, expected lat,lon")]
    Position(String),

    #[error(transparent)]
    Time(#[from] TimeError),

    #[error(transparent)]
    Id(#[from] InvalidId),

    #[error(transparent)]
    Build(#[from] GraphBuildError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Index(#[from] CostIndexError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("search task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Settings file contents; every section is optional.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct Settings {
    graph: GraphConfig,
    search: SearchConfig,
    cost_index: CostIndexConfig,
}

fn init_logger() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let text = std::fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| AppError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_location(arg: &str) -> Result<Location, AppError> {
    let Some((lat, lon)) = arg.split_once(',') else {
        return Ok(Location::Station(StationId::new(arg)?));
    };
    match (lat.trim().parse(), lon.trim().parse()) {
        (Ok(lat), Ok(lon)) => Ok(Location::Position(LatLong::new(lat, lon))),
        _ => Err(AppError::Position(arg.to_string())),
    }
}

fn parse_request(args: &[String]) -> Result<(PathBuf, JourneyRequest), AppError> {
    let (positional, flags): (Vec<&String>, Vec<&String>) =
        args.iter().partition(|a| !a.starts_with("--"));
    let [network, from, to, date, time] = positional[..] else {
        return Err(AppError::Usage);
    };
    let arrive_by = match flags[..] {
        [] => false,
        [flag] if flag == "--arrive-by" => true,
        _ => return Err(AppError::Usage),
    };

    let start = parse_location(from)?;
    let destination = parse_location(to)?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::Date(date.clone()))?;
    let time = TimeOfDay::parse_hhmm(time)?;
    let request = if arrive_by {
        JourneyRequest::arrive_by(start, destination, date, time)
    } else {
        JourneyRequest::depart_after(start, destination, date, time)
    };
    Ok((PathBuf::from(network), request))
}

async fn run(args: Vec<String>) -> Result<(), AppError> {
    let (network, request) = parse_request(&args)?;
    let settings: Settings = match std::env::var_os("TRANSIT_CONFIG") {
        Some(path) => read_json(Path::new(&path))?,
        None => Settings::default(),
    };

    let data: TransitData = read_json(&network)?;
    let graph = TransitGraph::build(&data, EntityFilter::include_all(), settings.graph)?;
    info!(
        nodes = graph.store().node_count(),
        relationships = graph.store().relationship_count(),
        "graph built"
    );

    let cache_dir =
        std::env::var_os("TRANSIT_CACHE_DIR").map_or_else(|| ".transit-cache".into(), PathBuf::from);
    let cache = FileDataCache::new(cache_dir)?;
    let cost_index = RouteCostIndex::load_or_build(&graph, &settings.cost_index, &cache)?;

    let calculator = Arc::new(RouteCalculator::new(
        Arc::new(graph),
        Arc::new(cost_index),
        Arc::new(NodeContentCache::new()),
        settings.search,
    ));

    let arrive_by = request.arrive_by;
    let journeys = tokio::task::spawn_blocking(move || {
        calculator
            .plan_journey(&request)?
            .collect::<Result<Vec<_>, PlanError>>()
    })
    .await??;

    let journeys = if arrive_by {
        rank_latest_departure(journeys)
    } else {
        rank_journeys(journeys)
    };
    if journeys.is_empty() {
        println!("No journeys found.");
    }
    for (i, journey) in journeys.iter().enumerate() {
        println!("Option {}:", i + 1);
        println!("{journey}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
