//! STDCM: slot search for a new train inside an existing timetable.
//!
//! Every combination of concrete step locations is simulated at full speed (plus the optional
//! margin), then delayed until its zone occupancy clears every existing train.  The feasible
//! candidate leaving first wins, ties going to the earliest enumerated combination.

mod conflicts;
mod occupancy;
mod request;

pub use conflicts::min_conflict_free_delay;
pub use occupancy::*;
pub use request::*;

use crate::config::SimulationConfig;
use crate::imports::*;
use crate::margins::{distribute, AllowanceDistribution, MarginValue, TimeTarget};
use crate::physics::{Stop, Trajectory};
use crate::simulation::prepare;
use crate::track::{Infra, PathLocation, TrackOffset, TrainPath};
use crate::train::RollingStock;
use rayon::prelude::*;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
/// Conflict-free run of the new train
pub struct StdcmCandidate {
    /// Chosen location of every step
    pub locations: Vec<TrackOffset>,
    /// From the timetable origin
    pub departure_time: si::Time,
    /// Arrival at every step, from the timetable origin
    pub arrival_times: Vec<si::Time>,
    pub path: TrainPath,
    /// Times relative to departure
    pub trajectory: Trajectory,
    /// Zones occupied by the run, from the timetable origin
    pub occupancy: ZoneOccupancy,
}

#[derive(Debug, Clone, PartialEq, IsVariant)]
pub enum StdcmOutcome {
    Found(Box<StdcmCandidate>),
    /// No conflict-free slot inside the window
    NotFound,
}

/// Step id given to the `i`-th step when building candidate paths
fn step_id(i: usize) -> String {
    format!("step.{i}")
}

/// Cartesian product of `choices`, in lexicographic order, at most `limit` items
fn combinations(choices: &[Vec<TrackOffset>], limit: usize) -> Vec<Vec<TrackOffset>> {
    let mut combos = vec![];
    if choices.iter().any(Vec::is_empty) {
        return combos;
    }
    let mut odometer = vec![0; choices.len()];
    while combos.len() < limit {
        combos.push(
            odometer
                .iter()
                .zip(choices)
                .map(|(i, choice)| choice[*i])
                .collect(),
        );
        // advance from the last step
        let mut digit = choices.len();
        loop {
            if digit == 0 {
                return combos;
            }
            digit -= 1;
            odometer[digit] += 1;
            if odometer[digit] < choices[digit].len() {
                break;
            }
            odometer[digit] = 0;
        }
    }
    combos
}

/// Whether `err` only rules out one location combination
fn rules_out_combination(err: &Error) -> bool {
    matches!(
        err,
        Error::InvalidPath(_)
            | Error::UnreachableConstraint(_)
            | Error::MarginsInfeasible(_)
            | Error::SimulationError(_)
    )
}

/// Searches a conflict-free slot for `request` among the zones occupied in `occupancy`.
///
/// [StdcmOutcome::NotFound] is a regular outcome.  Once `deadline` passes, no new combination
/// is evaluated; candidates already found still compete.
pub fn search(
    infra: &Infra,
    occupancy: &ZoneOccupancy,
    rolling_stock: &RollingStock,
    request: &StdcmRequest,
    config: &SimulationConfig,
    deadline: Option<Instant>,
) -> Result<StdcmOutcome, Error> {
    config
        .validate()
        .map_err(|err| Error::InitError(format!("simulation config:\n{err}")))?;
    request
        .validate()
        .map_err(|err| Error::InitError(format!("STDCM request:\n{err}")))?;
    let choices = request
        .steps
        .iter()
        .map(|step| step.location.resolve(infra))
        .collect::<Result<Vec<_>, Error>>()?;
    let total: usize = choices.iter().map(Vec::len).product();
    let combos = combinations(&choices, config.stdcm_max_combinations);
    if combos.len() < total {
        warn!(
            "STDCM: exploring {} of {total} location combinations",
            combos.len()
        );
    }

    let results = combos
        .par_iter()
        .enumerate()
        .map(|(i, locations)| {
            if deadline.map_or(false, |deadline| Instant::now() >= deadline) {
                return Ok(None);
            }
            match evaluate(infra, occupancy, rolling_stock, request, config, locations) {
                Ok(candidate) => Ok(candidate.map(|candidate| (i, candidate))),
                Err(err) if rules_out_combination(&err) => {
                    debug!("STDCM: combination {i} ruled out: {err}");
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let best = results.into_iter().flatten().min_by(|(i, a), (j, b)| {
        a.departure_time
            .partial_cmp(&b.departure_time)
            .unwrap_or(Ordering::Equal)
            .then(i.cmp(j))
    });
    Ok(match best {
        Some((i, candidate)) => {
            info!(
                "STDCM: combination {i} leaves at {} s",
                candidate.departure_time.get::<si::second>()
            );
            StdcmOutcome::Found(Box::new(candidate))
        }
        None => {
            info!("STDCM: no conflict-free slot");
            StdcmOutcome::NotFound
        }
    })
}

/// Simulates one location combination and delays it past every conflict
fn evaluate(
    infra: &Infra,
    occupancy: &ZoneOccupancy,
    rolling_stock: &RollingStock,
    request: &StdcmRequest,
    config: &SimulationConfig,
    locations: &[TrackOffset],
) -> Result<Option<StdcmCandidate>, Error> {
    let path_locations: Vec<PathLocation> = locations
        .iter()
        .enumerate()
        .map(|(i, loc)| PathLocation::new(step_id(i), vec![*loc]))
        .collect();
    let path = TrainPath::find(infra, &path_locations)?;
    let offsets = (0..locations.len())
        .map(|i| {
            path.step_offset(&step_id(i))
                .ok_or_else(|| Error::InvalidPath(format!("path has no step {i}")))
        })
        .collect::<Result<Vec<_>, Error>>()?;
    let stops: Vec<Stop> = request
        .steps
        .iter()
        .zip(&offsets)
        .filter_map(|(step, offset)| {
            step.dwell().map(|duration| Stop {
                offset: *offset,
                duration,
            })
        })
        .collect();

    let ctx = prepare(
        &path,
        rolling_stock,
        &stops,
        &[],
        request.comfort,
        request.speed_limit_tag.as_deref(),
        config,
    )?;
    let mut speeds = ctx.run(0.0, ctx.ceilings())?;
    if let Some(margin) = request.margin.filter(|m| *m != MarginValue::None) {
        let end = ctx.len() - 1;
        let running_time = ctx.running_time(&speeds, 0, end)? * uc::S;
        let target = TimeTarget {
            begin: 0,
            end,
            running_time: running_time + margin.extra_time(running_time, path.length),
        };
        speeds = distribute(
            &ctx,
            &speeds,
            0.0,
            &[target],
            AllowanceDistribution::Standard,
            config,
        )?;
    }
    let trajectory = Trajectory::from_speeds(&ctx, &speeds)?;
    let arrivals = offsets
        .iter()
        .map(|offset| {
            trajectory.arrival_time_at(*offset).ok_or_else(|| {
                Error::SimulationError(format!(
                    "no arrival at {} m",
                    offset.get::<si::meter>()
                ))
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let window = request.time_window;
    let (mut earliest, mut latest) = (window.earliest_departure, window.latest_departure);
    if let Some((idx, timing)) = request.timing() {
        let (arrive_from, arrive_to) = timing.bounds();
        earliest = earliest.max(arrive_from - arrivals[idx]);
        latest = latest.min(arrive_to - arrivals[idx]);
    }
    if latest < earliest {
        return Ok(None);
    }

    let relative = occupancy_from_trajectory(
        &path,
        &trajectory,
        rolling_stock.length,
        si::Time::ZERO,
        config.zone_release_time,
    );
    let Some(delay) =
        min_conflict_free_delay(occupancy, &relative.shifted(earliest), latest - earliest)
    else {
        return Ok(None);
    };
    let departure_time = earliest + delay;
    Ok(Some(StdcmCandidate {
        locations: locations.to_vec(),
        departure_time,
        arrival_times: arrivals.iter().map(|t| departure_time + *t).collect(),
        occupancy: relative.shifted(departure_time),
        trajectory,
        path,
    }))
}
