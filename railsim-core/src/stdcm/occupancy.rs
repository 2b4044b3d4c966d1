use crate::config::SimulationConfig;
use crate::imports::*;
use crate::physics::Trajectory;
use crate::simulation::simulate;
use crate::timetable::Timetable;
use crate::track::{Infra, TrainPath, ZoneKey};
use crate::train::RollingStock;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Half-open time interval `[begin, end)` during which a zone is occupied
pub struct OccupancyInterval {
    pub begin: si::Time,
    pub end: si::Time,
}

impl OccupancyInterval {
    pub fn new(begin: si::Time, end: si::Time) -> Self {
        Self { begin, end }
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    pub fn shifted(&self, delay: si::Time) -> Self {
        Self::new(self.begin + delay, self.end + delay)
    }
}

/// Occupied time intervals of every zone.  Intervals of a zone are kept sorted and merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneOccupancy {
    zones: IntMap<ZoneKey, Vec<OccupancyInterval>>,
}

impl ZoneOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, zone: ZoneKey, interval: OccupancyInterval) {
        let intervals = self.zones.entry(zone).or_default();
        let at = intervals.partition_point(|i| i.begin < interval.begin);
        intervals.insert(at, interval);
        let mut merged: Vec<OccupancyInterval> = Vec::with_capacity(intervals.len());
        for i in intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if i.begin <= last.end => last.end = last.end.max(i.end),
                _ => merged.push(i),
            }
        }
        *intervals = merged;
    }

    /// Adds every interval of `other`
    pub fn merge(&mut self, other: &ZoneOccupancy) {
        for (zone, interval) in other.iter() {
            self.add(zone, interval);
        }
    }

    /// Sorted, disjoint intervals of `zone`
    pub fn get(&self, zone: ZoneKey) -> &[OccupancyInterval] {
        self.zones.get(&zone).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every `(zone, interval)` pair, in no particular zone order
    pub fn iter(&self) -> impl Iterator<Item = (ZoneKey, OccupancyInterval)> + '_ {
        self.zones
            .iter()
            .flat_map(|(zone, intervals)| intervals.iter().map(move |i| (*zone, *i)))
    }

    /// Zones with at least one interval
    pub fn zones(&self) -> Vec<ZoneKey> {
        let mut zones: Vec<ZoneKey> = self.zones.keys().copied().collect();
        zones.sort();
        zones
    }

    pub fn len(&self) -> usize {
        self.zones.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shifted(&self, delay: si::Time) -> Self {
        Self {
            zones: self
                .zones
                .iter()
                .map(|(zone, intervals)| {
                    (*zone, intervals.iter().map(|i| i.shifted(delay)).collect())
                })
                .collect(),
        }
    }

    /// Whether any zone is occupied by both `self` and `other` at the same time
    pub fn intersects(&self, other: &ZoneOccupancy) -> bool {
        other
            .iter()
            .any(|(zone, interval)| self.get(zone).iter().any(|i| i.overlaps(&interval)))
    }
}

/// Zones of `path` occupied by a train of length `train_length` running `trajectory`, from its
/// head entering a zone to its tail leaving it plus `release_time`.  Times are shifted by
/// `start_time`.  The train leaves the model at the end of the trajectory.
pub fn occupancy_from_trajectory(
    path: &TrainPath,
    trajectory: &Trajectory,
    train_length: si::Length,
    start_time: si::Time,
    release_time: si::Time,
) -> ZoneOccupancy {
    let mut occupancy = ZoneOccupancy::new();
    for zone in &path.profiles.zones {
        let Some(entry) = trajectory.arrival_time_at(zone.begin) else {
            continue;
        };
        let tail_clear = (zone.end + train_length).min(path.length);
        let exit = trajectory
            .departure_time_at(tail_clear)
            .unwrap_or_else(|| trajectory.total_time());
        occupancy.add(
            zone.key,
            OccupancyInterval::new(start_time + entry, start_time + exit + release_time),
        );
    }
    occupancy
}

/// Simulates every schedule of `timetable` in parallel and merges their occupancies
pub fn timetable_occupancy(
    infra: &Infra,
    timetable: &Timetable,
    rolling_stocks: &HashMap<String, RollingStock>,
    config: &SimulationConfig,
) -> Result<ZoneOccupancy, Error> {
    let schedules: Vec<_> = timetable.iter().collect();
    let occupancies = schedules
        .par_iter()
        .map(|(id, schedule)| {
            let rolling_stock = rolling_stocks
                .get(&schedule.rolling_stock_id)
                .ok_or_else(|| {
                    Error::Other(format!(
                        "train schedule {id} uses unknown rolling stock `{}`",
                        schedule.rolling_stock_id
                    ))
                })?;
            let run = simulate(infra, rolling_stock, schedule, config)?;
            Ok(occupancy_from_trajectory(
                &run.path,
                &run.final_output,
                rolling_stock.length,
                schedule.start_time,
                config.zone_release_time,
            ))
        })
        .collect::<Result<Vec<_>, Error>>()?;
    let mut merged = ZoneOccupancy::new();
    for occupancy in &occupancies {
        merged.merge(occupancy);
    }
    debug!(
        "{} occupied intervals from {} train schedules",
        merged.len(),
        schedules.len()
    );
    Ok(merged)
}
