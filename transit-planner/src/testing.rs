//! Shared fixtures for unit tests.

use chrono::NaiveDate;

use crate::domain::{
    Agency, AgencyId, DaysOfWeek, LatLong, Route, RouteId, ServiceCalendar, ServiceId,
    ServiceRecord, StationId, StopRecord, StopTime, TimeOfDay, TransitData, TransportMode,
    TripId, TripRecord, WalkLinkRecord,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Friday 15 March 2024, the date most fixtures query.
pub fn friday() -> NaiveDate {
    date(2024, 3, 15)
}

pub fn sid(s: &str) -> StationId {
    StationId::new(s).unwrap()
}

pub fn rid(s: &str) -> RouteId {
    RouteId::new(s).unwrap()
}

pub fn aid(s: &str) -> AgencyId {
    AgencyId::new(s).unwrap()
}

pub fn t(s: &str) -> TimeOfDay {
    TimeOfDay::parse_hhmm(s).unwrap()
}

/// Fluent construction of small [`TransitData`] networks.
#[derive(Default)]
pub struct Network {
    data: TransitData,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn agency(mut self, id: &str) -> Self {
        self.data.agencies.push(Agency {
            id: aid(id),
            name: format!("{id} Transport"),
        });
        self
    }

    /// A station at a position on a north-south line, `km` north of the origin.
    pub fn station(mut self, id: &str, km: f64) -> Self {
        self.data.stations.push(StopRecord {
            id: sid(id),
            name: format!("{id} Street"),
            position: LatLong::new(53.4 + km / 111.2, -2.24),
        });
        self
    }

    pub fn route(mut self, id: &str, agency: &str, mode: TransportMode) -> Self {
        self.data.routes.push(Route {
            id: rid(id),
            name: format!("Line {id}"),
            agency: aid(agency),
            mode,
        });
        self
    }

    pub fn service(mut self, id: &str, calendar: ServiceCalendar) -> Self {
        self.data.services.push(ServiceRecord {
            id: ServiceId::new(id).unwrap(),
            calendar,
        });
        self
    }

    /// A service running every day of 2024.
    pub fn daily(self, id: &str) -> Self {
        self.service(
            id,
            ServiceCalendar::new(DaysOfWeek::ALL, date(2024, 1, 1), date(2024, 12, 31)),
        )
    }

    /// A trip whose arrival and departure coincide at every stop.
    pub fn trip(self, id: &str, route: &str, service: &str, stops: &[(&str, &str)]) -> Self {
        let stops: Vec<_> = stops.iter().map(|(s, time)| (*s, *time, *time)).collect();
        self.trip_with_dwell(id, route, service, &stops)
    }

    /// A trip given as (station, arrival, departure) triples.
    pub fn trip_with_dwell(
        mut self,
        id: &str,
        route: &str,
        service: &str,
        stops: &[(&str, &str, &str)],
    ) -> Self {
        self.data.trips.push(TripRecord {
            id: TripId::new(id).unwrap(),
            route: rid(route),
            service: ServiceId::new(service).unwrap(),
            stops: stops
                .iter()
                .map(|(s, arr, dep)| StopTime {
                    station: sid(s),
                    arrival: t(arr),
                    departure: t(dep),
                })
                .collect(),
        });
        self
    }

    pub fn walk(mut self, from: &str, to: &str, minutes: u32) -> Self {
        self.data.walk_links.push(WalkLinkRecord {
            from: sid(from),
            to: sid(to),
            minutes,
        });
        self
    }

    pub fn build(self) -> TransitData {
        self.data
    }
}

/// Three routes in a chain: R1 (A-X) meets R2 (X-Y) at X, R2 meets R3 (Y-C)
/// at Y. R1 and R2 are Metrolink trams, R3 is a bus run by another agency.
///
/// Weekday timetable from 08:50, all trips on service `WK`.
pub fn chain_network() -> TransitData {
    let weekdays = ServiceCalendar::new(DaysOfWeek::WEEKDAYS, date(2024, 3, 1), date(2024, 3, 31));
    Network::new()
        .agency("MET")
        .agency("BUS")
        .station("A", 0.0)
        .station("X", 2.0)
        .station("Y", 4.0)
        .station("C", 6.0)
        .route("R1", "MET", TransportMode::Tram)
        .route("R2", "MET", TransportMode::Tram)
        .route("R3", "BUS", TransportMode::Bus)
        .service("WK", weekdays)
        .trip("R1-0850", "R1", "WK", &[("A", "08:50"), ("X", "09:00")])
        .trip("R1-0905", "R1", "WK", &[("A", "09:05"), ("X", "09:15")])
        .trip("R1-0920", "R1", "WK", &[("A", "09:20"), ("X", "09:30")])
        .trip("R2-0910", "R2", "WK", &[("X", "09:10"), ("Y", "09:25")])
        .trip("R2-0940", "R2", "WK", &[("X", "09:40"), ("Y", "09:55")])
        .trip("R2-1010", "R2", "WK", &[("X", "10:10"), ("Y", "10:25")])
        .trip("R3-1005", "R3", "WK", &[("Y", "10:05"), ("C", "10:20")])
        .trip("R3-1035", "R3", "WK", &[("Y", "10:35"), ("C", "10:50")])
        .build()
}
