use super::occupancy::ZoneOccupancy;
use crate::imports::*;

/// Smallest delay, at most `max_delay`, such that `candidate` delayed by it overlaps nothing in
/// `existing`.
///
/// Each conflict pushes the candidate interval just past the end of the interval it overlaps,
/// so the delay only grows and the search ends after at most one step per existing interval.
pub fn min_conflict_free_delay(
    existing: &ZoneOccupancy,
    candidate: &ZoneOccupancy,
    max_delay: si::Time,
) -> Option<si::Time> {
    let mut delay = si::Time::ZERO;
    loop {
        let mut required = delay;
        for (zone, interval) in candidate.iter() {
            let shifted = interval.shifted(delay);
            for occupied in existing.get(zone) {
                if occupied.overlaps(&shifted) {
                    required = required.max(occupied.end - interval.begin);
                }
            }
        }
        if required == delay {
            return Some(delay);
        }
        trace!("conflict, delaying by {} s", required.get::<si::second>());
        if required > max_delay {
            return None;
        }
        delay = required;
    }
}
