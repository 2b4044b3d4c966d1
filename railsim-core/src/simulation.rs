//! Train schedule runs: the fastest `base` trajectory, the `provisional` one carrying the
//! schedule's margins, and the `final_output` one also meeting fixed arrival times.

use crate::config::SimulationConfig;
use crate::imports::*;
use crate::margins::{distribute, distribute_under, MarginValue, TimeTarget};
use crate::physics::{EffortRestriction, PhysicsContext, Stop, Trajectory};
use crate::speed_limits::{Mrsp, SignalingConstraints};
use crate::timetable::TrainSchedule;
use crate::track::{Infra, PathLocation, TrainPath};
use crate::train::{Comfort, RollingStock};
use rayon::prelude::*;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Parallel arrays of one simulated trajectory, times relative to departure
pub struct ReportTrain {
    pub positions: Vec<si::Length>,
    pub speeds: Vec<si::Velocity>,
    pub times: Vec<si::Time>,
    pub energy_consumption: si::Energy,
}

impl From<&Trajectory> for ReportTrain {
    fn from(trajectory: &Trajectory) -> Self {
        Self {
            positions: trajectory.positions().to_vec(),
            speeds: trajectory.speeds().to_vec(),
            times: trajectory.times().to_vec(),
            energy_consumption: trajectory.energy_consumption,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SerdeAPI)]
pub struct SimulationReport {
    pub base: ReportTrain,
    pub provisional: ReportTrain,
    pub final_output: ReportTrain,
}

impl Init for SimulationReport {}

#[derive(Debug, Clone, PartialEq)]
/// Full result of [simulate]
pub struct SimulationRun {
    pub path: TrainPath,
    pub base: Trajectory,
    pub provisional: Trajectory,
    pub final_output: Trajectory,
}

impl SimulationRun {
    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            base: (&self.base).into(),
            provisional: (&self.provisional).into(),
            final_output: (&self.final_output).into(),
        }
    }
}

/// Builds the MRSP of `path` with every stop as an End of Authority, then samples everything
/// the passes need
#[allow(clippy::too_many_arguments)]
pub(crate) fn prepare<'a>(
    path: &'a TrainPath,
    rolling_stock: &'a RollingStock,
    stops: &[Stop],
    restrictions: &[EffortRestriction],
    comfort: Comfort,
    speed_limit_tag: Option<&str>,
    config: &SimulationConfig,
) -> Result<PhysicsContext<'a>, Error> {
    let constraints = SignalingConstraints {
        stops: stops.iter().map(|stop| stop.offset).collect(),
        end_of_authorities: vec![],
    };
    let mrsp = Mrsp::build(path, rolling_stock, speed_limit_tag, &constraints)?;
    PhysicsContext::new(
        path,
        &mrsp,
        rolling_stock,
        comfort,
        stops,
        restrictions,
        config,
    )
}

/// Resolves the path items of `schedule` and joins them into a path
pub fn schedule_path(infra: &Infra, schedule: &TrainSchedule) -> Result<TrainPath, Error> {
    let locations = schedule
        .path
        .iter()
        .map(|item| {
            Ok(PathLocation::new(
                item.id.clone(),
                item.location.resolve(infra)?,
            ))
        })
        .collect::<Result<Vec<_>, Error>>()?;
    TrainPath::find(infra, &locations)
}

fn step_offset(path: &TrainPath, id: &str) -> Result<si::Length, Error> {
    path.step_offset(id)
        .ok_or_else(|| Error::InvalidPath(format!("path has no step `{id}`")))
}

fn grid_index(ctx: &PhysicsContext, path: &TrainPath, id: &str) -> Result<usize, Error> {
    let offset = step_offset(path, id)?;
    ctx.index_of(offset).ok_or_else(|| {
        Error::SimulationError(format!(
            "step `{id}` at {} m is not on the position grid",
            offset.get::<si::meter>()
        ))
    })
}

/// Stops of `schedule` on `path`, in schedule order.  Items with a zero dwell pass through.
fn schedule_stops(path: &TrainPath, schedule: &TrainSchedule) -> Result<Vec<Stop>, Error> {
    schedule
        .schedule
        .iter()
        .filter_map(|item| item.dwell().map(|duration| (item, duration)))
        .map(|(item, duration)| {
            Ok(Stop {
                offset: step_offset(path, &item.at)?,
                duration,
            })
        })
        .collect()
}

fn effort_restrictions(
    path: &TrainPath,
    rolling_stock: &RollingStock,
    schedule: &TrainSchedule,
) -> Result<Vec<EffortRestriction>, Error> {
    let mut restrictions = vec![];
    for item in &schedule.power_restrictions {
        let Some(ratio) = rolling_stock.power_restriction(&item.value) else {
            warn!(
                "rolling stock `{}` has no power restriction `{}`, ignoring it",
                rolling_stock.name, item.value
            );
            continue;
        };
        restrictions.push(EffortRestriction {
            begin: step_offset(path, &item.from)?,
            end: step_offset(path, &item.to)?,
            ratio,
        });
    }
    Ok(restrictions)
}

/// Runs `schedule` with `rolling_stock` on `infra`.
///
/// `provisional` stretches each margin range of `base` by its allowance. `final_output`
/// additionally stretches every range between consecutive scheduled arrivals so that the
/// train arrives exactly on time.
pub fn simulate(
    infra: &Infra,
    rolling_stock: &RollingStock,
    schedule: &TrainSchedule,
    config: &SimulationConfig,
) -> Result<SimulationRun, Error> {
    config
        .validate()
        .map_err(|err| Error::InitError(format!("simulation config:\n{err}")))?;
    schedule.validate().map_err(|err| {
        Error::InitError(format!("train schedule `{}`:\n{err}", schedule.train_name))
    })?;
    let path = schedule_path(infra, schedule)?;
    let stops = schedule_stops(&path, schedule)?;
    let restrictions = effort_restrictions(&path, rolling_stock, schedule)?;
    let ctx = prepare(
        &path,
        rolling_stock,
        &stops,
        &restrictions,
        schedule.comfort,
        schedule.speed_limit_tag.as_deref(),
        config,
    )?;
    let initial_speed = schedule.initial_speed.get::<si::meter_per_second>();

    let base = ctx.run(initial_speed, ctx.ceilings())?;
    let margin_targets = margin_targets(&ctx, &path, schedule, &base)?;
    let provisional = if margin_targets.is_empty() {
        base.clone()
    } else {
        let speeds = distribute(
            &ctx,
            &base,
            initial_speed,
            &margin_targets,
            schedule.constraint_distribution,
            config,
        )?;
        info!(
            "`{}`: margins distributed over {} ranges",
            schedule.train_name,
            margin_targets.len()
        );
        speeds
    };

    let arrival_targets = arrival_targets(&ctx, &path, schedule, &base, &provisional, config)?;
    let final_output = if arrival_targets.is_empty() {
        provisional.clone()
    } else {
        distribute_under(
            &ctx,
            &provisional,
            &provisional,
            initial_speed,
            &arrival_targets,
            schedule.constraint_distribution,
            config,
        )?
    };

    let base = Trajectory::from_speeds(&ctx, &base)?;
    let provisional = Trajectory::from_speeds(&ctx, &provisional)?;
    let final_output = Trajectory::from_speeds(&ctx, &final_output)?;
    info!(
        "`{}`: {} m in {} s (base {} s)",
        schedule.train_name,
        path.length.get::<si::meter>().format_eng(Some(5)),
        final_output.total_time().get::<si::second>().format_eng(Some(5)),
        base.total_time().get::<si::second>().format_eng(Some(5)),
    );
    Ok(SimulationRun {
        path,
        base,
        provisional,
        final_output,
    })
}

/// One running time target per margin range that carries an allowance
fn margin_targets(
    ctx: &PhysicsContext,
    path: &TrainPath,
    schedule: &TrainSchedule,
    base: &[f64],
) -> Result<Vec<TimeTarget>, Error> {
    let margins = &schedule.margins;
    if margins.is_none() {
        return Ok(vec![]);
    }
    let mut bounds = vec![0];
    for boundary in &margins.boundaries {
        bounds.push(grid_index(ctx, path, boundary)?);
    }
    bounds.push(ctx.len() - 1);

    let grid = ctx.grid();
    let mut targets = vec![];
    for (w, value) in bounds.windows(2).zip(&margins.values) {
        if *value == MarginValue::None {
            continue;
        }
        let (begin, end) = (w[0], w[1]);
        let running_time = ctx.running_time(base, begin, end)? * uc::S;
        let distance = (grid[end] - grid[begin]) * uc::M;
        targets.push(TimeTarget {
            begin,
            end,
            running_time: running_time + value.extra_time(running_time, distance),
        });
    }
    Ok(targets)
}

/// One running time target per range between consecutive scheduled arrivals
fn arrival_targets(
    ctx: &PhysicsContext,
    path: &TrainPath,
    schedule: &TrainSchedule,
    base: &[f64],
    provisional: &[f64],
    config: &SimulationConfig,
) -> Result<Vec<TimeTarget>, Error> {
    let mut arrivals = vec![];
    for item in &schedule.schedule {
        if let Some(arrival) = item.arrival {
            arrivals.push((grid_index(ctx, path, &item.at)?, arrival, &item.at));
        }
    }
    arrivals.sort_by_key(|(idx, _, _)| *idx);

    let tolerance = config.time_tolerance.get::<si::second>();
    let mut targets = vec![];
    let (mut begin, mut departure) = (0, si::Time::ZERO);
    for (end, arrival, at) in arrivals {
        let dwell: si::Time = ctx
            .stops()
            .iter()
            .filter(|(idx, _)| begin <= *idx && *idx < end)
            .map(|(_, dwell)| *dwell)
            .fold(si::Time::ZERO, |acc, d| acc + d);
        let target = (arrival - departure - dwell).get::<si::second>();
        let base_time = ctx.running_time(base, begin, end)?;
        if base_time > target + tolerance {
            return Err(Error::UnreachableConstraint(format!(
                "cannot arrive at `{at}` at {} s: the fastest run needs {} s more",
                arrival.get::<si::second>(),
                base_time - target
            )));
        }
        let provisional_time = ctx.running_time(provisional, begin, end)?;
        if provisional_time > target + tolerance {
            return Err(Error::MarginsInfeasible(format!(
                "margins make the train arrive at `{at}` {} s after {} s",
                provisional_time - target,
                arrival.get::<si::second>()
            )));
        }
        targets.push(TimeTarget {
            begin,
            end,
            running_time: target * uc::S,
        });
        begin = end;
        departure = arrival;
    }
    Ok(targets)
}

/// Runs every schedule in parallel on the shared `infra`, looking rolling stocks up by
/// `rolling_stock_id`.  Results come back in the order of `schedules`.
pub fn simulate_batch(
    infra: Arc<Infra>,
    rolling_stocks: &HashMap<String, RollingStock>,
    schedules: &[TrainSchedule],
    config: &SimulationConfig,
) -> Vec<Result<SimulationReport, Error>> {
    schedules
        .par_iter()
        .map(|schedule| {
            let rolling_stock = rolling_stocks
                .get(&schedule.rolling_stock_id)
                .ok_or_else(|| {
                    Error::Other(format!(
                        "unknown rolling stock `{}`",
                        schedule.rolling_stock_id
                    ))
                })?;
            Ok(simulate(&infra, rolling_stock, schedule, config)?.report())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::margins::{AllowanceDistribution, Margins};
    use crate::testing::*;
    use crate::timetable::{PowerRestrictionItem, ScheduleItem};

    fn run(schedule: &TrainSchedule) -> Result<SimulationRun, Error> {
        simulate(
            &small_infra(),
            &RollingStock::valid(),
            schedule,
            &SimulationConfig::default(),
        )
    }

    fn with_margins(value: MarginValue, distribution: AllowanceDistribution) -> TrainSchedule {
        TrainSchedule {
            margins: Margins::uniform(value),
            constraint_distribution: distribution,
            ..TrainSchedule::valid()
        }
    }

    /// Running time of `trajectory`, dwell excluded
    fn running_time(trajectory: &Trajectory, dwell: f64) -> f64 {
        trajectory.total_time().get::<si::second>() - dwell
    }

    #[test]
    fn test_no_margins() {
        init_logging();
        let run = run(&TrainSchedule::valid()).unwrap();
        assert_eq!(run.path.length, 4800.0 * uc::M);
        let report = run.report();
        assert_eq!(report.base, report.final_output);
        assert_eq!(report.base, report.provisional);
        // stop at `b`, dwell included
        let stop = run.base.arrival_time_at(2400.0 * uc::M).unwrap();
        let leave = run.base.departure_time_at(2400.0 * uc::M).unwrap();
        assert!(almost_eq_uom(&(leave - stop), &(60.0 * uc::S), None));
        assert_eq!(report.base.speeds.last(), Some(&si::Velocity::ZERO));
    }

    #[test]
    fn test_mareco_margins() {
        let schedule = with_margins(
            MarginValue::Percentage(3.0),
            AllowanceDistribution::Mareco,
        );
        let run = run(&schedule).unwrap();
        let report = run.report();
        assert_ne!(
            report.base.energy_consumption,
            report.final_output.energy_consumption
        );
        assert!(report.final_output.energy_consumption < report.base.energy_consumption);
        assert_eq!(report.provisional, report.final_output);
        assert!(almost_eq(
            running_time(&run.final_output, 60.0),
            running_time(&run.base, 60.0) * 1.03,
            None
        ));
    }

    #[test]
    fn test_margins_per_range() {
        let schedule = TrainSchedule {
            margins: Margins {
                boundaries: vec!["b".into()],
                values: vec![MarginValue::None, MarginValue::MinPer100Km(20.0)],
            },
            ..TrainSchedule::valid()
        };
        let run = run(&schedule).unwrap();
        let stop = 2400.0 * uc::M;
        // first range untouched
        assert_eq!(
            run.final_output.arrival_time_at(stop),
            run.base.arrival_time_at(stop)
        );
        // 20 min/100 km over 2.4 km is 28.8 s
        let extra = run.final_output.total_time() - run.base.total_time();
        assert!(almost_eq(extra.get::<si::second>(), 28.8, Some(1e-2)));
    }

    #[test]
    fn test_fixed_arrival() {
        let stop = 2400.0 * uc::M;
        let base = run(&TrainSchedule::valid()).unwrap().base;
        let on_time = base.arrival_time_at(stop).unwrap();
        let arrival = base.total_time() + 30.0 * uc::S;
        let mut schedule = TrainSchedule::valid();
        schedule.schedule[0].arrival = Some(on_time);
        schedule.schedule[1].arrival = Some(arrival);
        let run = run(&schedule).unwrap();
        assert_eq!(run.provisional, run.base);
        assert!(almost_eq_uom(
            &run.final_output.total_time(),
            &arrival,
            Some(1e-4)
        ));
        // already on time at `b`: only the range after it is stretched
        assert!(almost_eq_uom(
            &run.final_output.arrival_time_at(stop).unwrap(),
            &on_time,
            Some(1e-6)
        ));
    }

    #[test]
    fn test_unreachable_arrival() {
        let base = run(&TrainSchedule::valid()).unwrap().base;
        let mut schedule = TrainSchedule::valid();
        schedule.schedule[1].arrival = Some(base.total_time() - 10.0 * uc::S);
        assert!(matches!(
            run(&schedule),
            Err(Error::UnreachableConstraint(_))
        ));

        // margins alone make the train late
        let mut schedule = with_margins(
            MarginValue::Percentage(10.0),
            AllowanceDistribution::Standard,
        );
        schedule.schedule[1].arrival = Some(base.total_time() + uc::S);
        assert!(matches!(run(&schedule), Err(Error::MarginsInfeasible(_))));
    }

    #[test]
    fn test_terminus_dwell_and_unknown_restriction() {
        let mut schedule = TrainSchedule::valid();
        schedule.schedule[1] = ScheduleItem {
            at: "c".into(),
            arrival: None,
            stop_for: Some(120.0 * uc::S),
        };
        let with_dwell = run(&schedule).unwrap();
        let without = run(&TrainSchedule::valid()).unwrap();
        assert!(almost_eq_uom(
            &(with_dwell.base.total_time() - without.base.total_time()),
            &(120.0 * uc::S),
            None
        ));

        schedule.power_restrictions = vec![PowerRestrictionItem {
            from: "a".into(),
            to: "b".into(),
            value: "UNKNOWN".into(),
        }];
        assert_eq!(run(&schedule).unwrap().base, with_dwell.base);
    }

    #[test]
    fn test_stop_just_before_terminus() {
        let mut schedule = TrainSchedule::valid();
        schedule.path[1].location = crate::track::StepLocation::TrackOffset {
            track: "track.2".into(),
            offset: 1899.5 * uc::M,
        };
        let run = run(&schedule).unwrap();
        assert_eq!(run.path.length, 4800.0 * uc::M);
        let stop = run.base.arrival_time_at(4799.5 * uc::M).unwrap();
        assert!(almost_eq_uom(
            &(run.base.total_time() - stop),
            &(60.0 * uc::S),
            None
        ));
        assert_eq!(run.base.speeds().last(), Some(&si::Velocity::ZERO));
        assert_eq!(run.base, run.final_output);
    }

    #[test]
    fn test_invalid_config() {
        let config = SimulationConfig {
            position_step: si::Length::ZERO,
            ..Default::default()
        };
        let result = simulate(
            &small_infra(),
            &RollingStock::valid(),
            &TrainSchedule::valid(),
            &config,
        );
        assert!(matches!(result, Err(Error::InitError(_))));
    }

    #[test]
    fn test_unresolved_location() {
        let mut schedule = TrainSchedule::valid();
        schedule.path[1].location = crate::track::StepLocation::Uic { uic: 999 };
        assert!(matches!(run(&schedule), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_simulate_batch() {
        let infra = Arc::new(small_infra());
        let stocks = HashMap::from([("valid".to_string(), RollingStock::valid())]);
        let schedules = vec![
            TrainSchedule::valid(),
            with_margins(MarginValue::Percentage(5.0), AllowanceDistribution::Standard),
            TrainSchedule {
                rolling_stock_id: "missing".into(),
                ..TrainSchedule::valid()
            },
        ];
        let results = simulate_batch(infra, &stocks, &schedules, &SimulationConfig::default());
        assert_eq!(results.len(), 3);
        let plain = results[0].as_ref().unwrap();
        let stretched = results[1].as_ref().unwrap();
        assert_eq!(plain.base, stretched.base);
        assert!(
            stretched.final_output.times.last() > plain.final_output.times.last()
        );
        assert!(matches!(results[2], Err(Error::Other(_))));
    }

    #[test]
    fn test_report_serde() {
        let report = run(&TrainSchedule::valid()).unwrap().report();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"final_output\""));
        let back = SimulationReport::from_json(json, false).unwrap();
        assert_eq!(back.base.positions.len(), report.base.positions.len());
    }
}
