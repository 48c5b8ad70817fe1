//! Search configuration for the journey planner.

use chrono::Duration;

/// Configuration parameters for journey search.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of route changes allowed, unless a request says
    /// otherwise.
    pub max_changes: usize,

    /// Maximum number of journeys to return.
    pub max_results: usize,

    /// Maximum total journey time (minutes).
    /// Journeys longer than this are pruned during search.
    pub max_journey_mins: i64,

    /// Longest wait for a departure after a change (minutes).
    pub max_wait_mins: i64,

    /// Longest wait for the first departure of a journey (minutes).
    /// Arrive-by searches step back through start windows of this size.
    pub max_initial_wait_mins: i64,

    /// Minimum time between alighting and the next departure (minutes).
    pub min_change_mins: i64,

    /// Maximum walking time to consider (minutes).
    pub max_walk_mins: i64,

    /// Walking speed in metres per second, for walks to and from positions.
    pub walking_speed_mps: f64,

    /// How far from a position to look for stations (metres).
    pub walk_range_metres: f64,

    /// Only change vehicles at stations flagged as interchanges.
    pub interchanges_only_at_designated: bool,
}

impl SearchConfig {
    /// Returns the maximum journey time as a Duration.
    pub fn max_journey(&self) -> Duration {
        Duration::minutes(self.max_journey_mins)
    }

    /// Returns the maximum wait after a change as a Duration.
    pub fn max_wait(&self) -> Duration {
        Duration::minutes(self.max_wait_mins)
    }

    /// Returns the maximum initial wait as a Duration.
    pub fn max_initial_wait(&self) -> Duration {
        Duration::minutes(self.max_initial_wait_mins)
    }

    /// Returns the minimum change time as a Duration.
    pub fn min_change(&self) -> Duration {
        Duration::minutes(self.min_change_mins)
    }

    /// Returns the maximum walk time as a Duration.
    pub fn max_walk(&self) -> Duration {
        Duration::minutes(self.max_walk_mins)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_changes: 3,
            max_results: 5,
            max_journey_mins: 240, // 4 hours
            max_wait_mins: 30,
            max_initial_wait_mins: 60,
            min_change_mins: 1,
            max_walk_mins: 15,
            walking_speed_mps: 1.2,
            walk_range_metres: 800.0,
            interchanges_only_at_designated: false,
        }
    }
}
