//! Journey planner over the time-expanded graph.
//!
//! [`RouteCalculator`] answers "how do I get from here to there, leaving
//! after (or arriving before) this time?". Each request runs a best-first
//! traversal of the graph, pruned by the route cost index so that routes
//! which cannot reach the destination within the allowed number of changes
//! are never boarded.

mod calculator;
mod config;
mod rank;
mod traversal;

pub use calculator::{JourneyRequest, Journeys, PlanError, RouteCalculator};
pub use config::SearchConfig;
pub use rank::{rank_journeys, rank_latest_departure};
