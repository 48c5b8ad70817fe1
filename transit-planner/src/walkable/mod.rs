//! Walkable connections between stations.
//!
//! Some stations are close enough to walk between, enabling connections
//! that don't appear in any timetable (a tram stop beside a rail station,
//! two bus stops either side of a junction). This module holds the explicit
//! walk links of a network and finds stations within walking range of an
//! arbitrary position.

use std::collections::BTreeMap;

use chrono::Duration;

use crate::domain::{LatLong, Station, StationId, WalkLinkRecord};

/// A collection of walkable connections between stations.
///
/// Connections are symmetric: if you can walk from A to B, you can walk from B to A
/// in the same time.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WalkableConnections {
    /// Walk minutes keyed by origin then destination, stored in both directions.
    connections: BTreeMap<StationId, BTreeMap<StationId, u32>>,
}

impl WalkableConnections {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a walkable connection between two stations.
    ///
    /// The connection is stored symmetrically. Adding the same pair again
    /// keeps the shorter time.
    pub fn add(&mut self, from: StationId, to: StationId, minutes: u32) {
        if from == to {
            return;
        }
        self.insert(from.clone(), to.clone(), minutes);
        self.insert(to, from, minutes);
    }

    fn insert(&mut self, from: StationId, to: StationId, minutes: u32) {
        let entry = self.connections.entry(from).or_default().entry(to).or_insert(minutes);
        *entry = (*entry).min(minutes);
    }

    /// Get the walk duration between two stations, if walkable.
    pub fn get(&self, from: &StationId, to: &StationId) -> Option<Duration> {
        self.minutes(from, to).map(|mins| Duration::minutes(mins as i64))
    }

    /// Walk time in whole minutes.
    pub fn minutes(&self, from: &StationId, to: &StationId) -> Option<u32> {
        self.connections.get(from)?.get(to).copied()
    }

    /// Check if two stations are walkable.
    pub fn is_walkable(&self, from: &StationId, to: &StationId) -> bool {
        self.minutes(from, to).is_some()
    }

    /// Get all stations walkable from a given station.
    pub fn walkable_from(&self, from: &StationId) -> Vec<(StationId, Duration)> {
        self.connections
            .get(from)
            .map(|links| {
                links
                    .iter()
                    .map(|(to, mins)| (to.clone(), Duration::minutes(*mins as i64)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Iterate over every link once per direction as (from, to, minutes).
    pub fn iter(&self) -> impl Iterator<Item = (&StationId, &StationId, u32)> {
        self.connections
            .iter()
            .flat_map(|(from, links)| links.iter().map(move |(to, mins)| (from, to, *mins)))
    }

    /// Returns the number of walkable pairs (counting A→B and B→A as one).
    pub fn len(&self) -> usize {
        self.connections.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    /// Returns true if there are no walkable connections.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Builder for creating walkable connections.
///
/// Links longer than the configured maximum, and links touching a station
/// the builder was told to skip, are dropped.
#[derive(Debug)]
pub struct WalkableConnectionsBuilder {
    inner: WalkableConnections,
    max_minutes: u32,
}

impl Default for WalkableConnectionsBuilder {
    fn default() -> Self {
        Self {
            inner: WalkableConnections::default(),
            max_minutes: u32::MAX,
        }
    }
}

impl WalkableConnectionsBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop links longer than `minutes`.
    pub fn max_minutes(mut self, minutes: u32) -> Self {
        self.max_minutes = minutes;
        self
    }

    /// Add a walkable connection.
    pub fn add(mut self, from: StationId, to: StationId, minutes: u32) -> Self {
        if minutes <= self.max_minutes {
            self.inner.add(from, to, minutes);
        }
        self
    }

    /// Add every input link whose ends satisfy `keep`.
    pub fn add_records<'a>(
        mut self,
        records: impl IntoIterator<Item = &'a WalkLinkRecord>,
        keep: impl Fn(&StationId) -> bool,
    ) -> Self {
        for link in records {
            if keep(&link.from) && keep(&link.to) {
                self = self.add(link.from.clone(), link.to.clone(), link.minutes);
            }
        }
        self
    }

    /// Build the walkable connections.
    pub fn build(self) -> WalkableConnections {
        self.inner
    }
}

/// Minutes needed to walk `metres` at `speed_mps`, rounded up to the next
/// whole minute after rounding to the nearest second.
pub fn walking_minutes(metres: f64, speed_mps: f64) -> u32 {
    if speed_mps <= 0.0 || !metres.is_finite() {
        return u32::MAX;
    }
    let secs = (metres / speed_mps).round().max(0.0) as u64;
    u32::try_from(secs.div_ceil(60)).unwrap_or(u32::MAX)
}

/// Stations within `range_metres` of `position`, nearest first, with the
/// walking time to each.
pub fn nearby_stations<'a>(
    position: &LatLong,
    stations: impl IntoIterator<Item = &'a Station>,
    range_metres: f64,
    speed_mps: f64,
) -> Vec<(StationId, u32)> {
    let mut found: Vec<(f64, &StationId)> = stations
        .into_iter()
        .map(|s| (position.distance_metres(&s.position), &s.id))
        .filter(|(metres, _)| *metres <= range_metres)
        .collect();
    found.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    found
        .into_iter()
        .map(|(metres, id)| (id.clone(), walking_minutes(metres, speed_mps)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> StationId {
        StationId::new(s).unwrap()
    }

    #[test]
    fn empty_connections() {
        let wc = WalkableConnections::new();
        assert!(wc.is_empty());
        assert_eq!(wc.len(), 0);
        assert!(wc.get(&sid("PIC"), &sid("VIC")).is_none());
    }

    #[test]
    fn add_and_lookup() {
        let mut wc = WalkableConnections::new();
        wc.add(sid("PIC"), sid("PGD"), 5);

        assert!(!wc.is_empty());
        assert_eq!(wc.len(), 1);

        // Forward lookup
        assert_eq!(wc.get(&sid("PIC"), &sid("PGD")), Some(Duration::minutes(5)));

        // Reverse lookup (symmetric)
        assert_eq!(wc.get(&sid("PGD"), &sid("PIC")), Some(Duration::minutes(5)));

        assert!(wc.get(&sid("VIC"), &sid("PIC")).is_none());
    }

    #[test]
    fn shorter_time_wins() {
        let mut wc = WalkableConnections::new();
        wc.add(sid("PIC"), sid("PGD"), 9);
        wc.add(sid("PGD"), sid("PIC"), 4);
        assert_eq!(wc.minutes(&sid("PIC"), &sid("PGD")), Some(4));
        assert_eq!(wc.len(), 1);
    }

    #[test]
    fn self_links_ignored() {
        let mut wc = WalkableConnections::new();
        wc.add(sid("PIC"), sid("PIC"), 0);
        assert!(wc.is_empty());
    }

    #[test]
    fn walkable_from() {
        let mut wc = WalkableConnections::new();
        wc.add(sid("PIC"), sid("PGD"), 5);
        wc.add(sid("PIC"), sid("MKT"), 3);

        let from_pic = wc.walkable_from(&sid("PIC"));
        assert_eq!(from_pic.len(), 2);
        assert_eq!(wc.iter().count(), 4);

        assert!(wc.walkable_from(&sid("VIC")).is_empty());
    }

    #[test]
    fn builder_drops_long_and_skipped_links() {
        let records = vec![
            WalkLinkRecord { from: sid("A"), to: sid("B"), minutes: 5 },
            WalkLinkRecord { from: sid("A"), to: sid("C"), minutes: 30 },
            WalkLinkRecord { from: sid("B"), to: sid("X"), minutes: 2 },
        ];
        let wc = WalkableConnectionsBuilder::new()
            .max_minutes(15)
            .add_records(&records, |s| s.as_str() != "X")
            .build();

        assert_eq!(wc.len(), 1);
        assert!(wc.is_walkable(&sid("B"), &sid("A")));
        assert!(!wc.is_walkable(&sid("A"), &sid("C")));
        assert!(!wc.is_walkable(&sid("B"), &sid("X")));
    }

    #[test]
    fn walking_time_rounds_up() {
        assert_eq!(walking_minutes(0.0, 1.4), 0);
        assert_eq!(walking_minutes(84.0, 1.4), 1);
        assert_eq!(walking_minutes(85.0, 1.4), 2);
        assert_eq!(walking_minutes(168.0, 1.4), 2);
        assert_eq!(walking_minutes(720.0, 1.2), 10);
        assert_eq!(walking_minutes(100.0, 0.0), u32::MAX);
    }

    #[test]
    fn nearby_sorted_by_distance() {
        let here = LatLong::new(53.4808, -2.2426);
        let near = Station::new(sid("NEAR"), "Near", LatLong::new(53.4810, -2.2426));
        let mid = Station::new(sid("MID"), "Mid", LatLong::new(53.4830, -2.2426));
        let far = Station::new(sid("FAR"), "Far", LatLong::new(53.5200, -2.2426));

        let found = nearby_stations(&here, [&far, &mid, &near], 1000.0, 1.4);
        let ids: Vec<_> = found.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["NEAR", "MID"]);
        assert!(found[0].1 <= found[1].1);
    }
}
