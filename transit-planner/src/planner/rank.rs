//! Journey ranking for search results.
//!
//! Ranks journeys by a combination of factors to present the most useful
//! options first.

use crate::domain::Journey;

/// Rank journeys by preference.
///
/// Journeys are ranked by:
/// 1. Arrival time (earlier is better)
/// 2. Number of changes (fewer is better)
/// 3. Total duration (shorter is better)
///
/// Returns journeys sorted best-first.
pub fn rank_journeys(mut journeys: Vec<Journey>) -> Vec<Journey> {
    journeys.sort_by(|a, b| {
        a.arrival_time()
            .cmp(&b.arrival_time())
            .then_with(|| a.change_count().cmp(&b.change_count()))
            .then_with(|| a.total_duration().cmp(&b.total_duration()))
    });
    journeys
}

/// Rank journeys for an arrive-by query.
///
/// Latest departure first, then earliest arrival, then fewest changes.
pub fn rank_latest_departure(mut journeys: Vec<Journey>) -> Vec<Journey> {
    journeys.sort_by(|a, b| {
        b.departure_time()
            .cmp(&a.departure_time())
            .then_with(|| a.arrival_time().cmp(&b.arrival_time()))
            .then_with(|| a.change_count().cmp(&b.change_count()))
    });
    journeys
}


#[cfg(test)]
mod proptests {
    use super::tests::make_journey;
    use super::*;
    use crate::domain::TimeOfDay;
    use proptest::prelude::*;

    fn at(mins: u16) -> TimeOfDay {
        TimeOfDay::from_minutes(mins as i32).unwrap()
    }

    /// Strategy for generating a single-leg journey
    fn journey_strategy() -> impl Strategy<Value = Journey> {
        (
            0u32..1000, // id
            0u16..1380, // dep_mins (0:00 - 23:00)
            10u16..120, // duration (10 mins - 2 hours)
        )
            .prop_map(|(id, dep, duration)| {
                let trip = format!("T{id}");
                make_journey(&[(trip.as_str(), "PIC", at(dep), "ALT", at(dep + duration))])
            })
    }

    /// Strategy for two-leg journeys changing at COR.
    fn two_leg_strategy() -> impl Strategy<Value = Journey> {
        (
            0u32..1000,
            0u16..1200, // dep_mins
            15u16..60,  // leg1_duration
            5u16..30,   // connection_wait
            15u16..60,  // leg2_duration
        )
            .prop_map(|(id, dep, d1, wait, d2)| {
                let change = dep + d1;
                let (first, second) = (format!("T{id}A"), format!("T{id}B"));
                make_journey(&[
                    (first.as_str(), "PIC", at(dep), "COR", at(change)),
                    (second.as_str(), "COR", at(change + wait), "ALT", at(change + wait + d2)),
                ])
            })
    }

    /// Strategy for generating a list of journeys, fuzzing over the share of
    /// journeys with a change.
    fn journeys_strategy() -> impl Strategy<Value = Vec<Journey>> {
        (0.0f64..1.0).prop_flat_map(|change_bias| {
            prop::collection::vec(
                prop::bool::weighted(change_bias).prop_flat_map(|has_change| {
                    if has_change {
                        two_leg_strategy().boxed()
                    } else {
                        journey_strategy().boxed()
                    }
                }),
                0..15,
            )
        })
    }

    proptest! {
        #[test]
        fn rank_journeys_is_sorted(journeys in journeys_strategy()) {
            let ranked = rank_journeys(journeys);

            for window in ranked.windows(2) {
                let a = &window[0];
                let b = &window[1];
                let a_key = (a.arrival_time(), a.change_count(), a.total_duration());
                let b_key = (b.arrival_time(), b.change_count(), b.total_duration());
                prop_assert!(a_key <= b_key, "Not sorted: {:?} before {:?}", a_key, b_key);
            }
        }

        #[test]
        fn rank_journeys_preserves_elements(journeys in journeys_strategy()) {
            let original_len = journeys.len();
            prop_assert_eq!(rank_journeys(journeys).len(), original_len);
        }

        #[test]
        fn latest_departure_is_sorted(journeys in journeys_strategy()) {
            let ranked = rank_latest_departure(journeys);
            for window in ranked.windows(2) {
                prop_assert!(window[0].departure_time() >= window[1].departure_time());
            }
        }
    }
}
