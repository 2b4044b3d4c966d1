use super::duration::iso8601;
use crate::imports::*;
use crate::margins::{AllowanceDistribution, Margins};
use crate::track::StepLocation;
use crate::train::Comfort;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Named location the train passes through
pub struct PathItem {
    pub id: String,
    #[serde(flatten)]
    pub location: StepLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Timing attached to a path item.  A zero or missing `stop_for` passes through without
/// stopping.
pub struct ScheduleItem {
    /// Id of the [PathItem] this applies to
    pub at: String,
    /// Fixed arrival time, relative to departure
    #[serde(default, with = "iso8601::option")]
    pub arrival: Option<si::Time>,
    #[serde(default, with = "iso8601::option")]
    pub stop_for: Option<si::Time>,
}

impl ScheduleItem {
    /// Dwell time, if the train stops here
    pub fn dwell(&self) -> Option<si::Time> {
        self.stop_for.filter(|d| *d > si::Time::ZERO)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Effort restriction code applying between two path items
pub struct PowerRestrictionItem {
    pub from: String,
    pub to: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SerdeAPI)]
/// Train schedule as stored in a [Timetable](super::Timetable)
pub struct TrainSchedule {
    pub train_name: String,
    pub rolling_stock_id: String,
    /// Departure, relative to the timetable origin
    #[serde(default, with = "iso8601")]
    pub start_time: si::Time,
    pub path: Vec<PathItem>,
    #[serde(default)]
    pub schedule: Vec<ScheduleItem>,
    #[serde(default)]
    pub margins: Margins,
    #[serde(default)]
    pub constraint_distribution: AllowanceDistribution,
    #[serde(default)]
    pub comfort: Comfort,
    #[serde(default)]
    pub initial_speed: si::Velocity,
    #[serde(default)]
    pub speed_limit_tag: Option<String>,
    #[serde(default)]
    pub power_restrictions: Vec<PowerRestrictionItem>,
}

impl TrainSchedule {
    /// Position of the path item named `id`
    pub fn path_index(&self, id: &str) -> Option<usize> {
        self.path.iter().position(|item| item.id == id)
    }

    /// Schedule item attached to path item `id`
    pub fn schedule_at(&self, id: &str) -> Option<&ScheduleItem> {
        self.schedule.iter().find(|item| item.at == id)
    }
}

impl Init for TrainSchedule {
    fn init(&mut self) -> Result<(), Error> {
        self.validate().map_err(|err| {
            Error::InitError(format!("train schedule `{}`:\n{err}", self.train_name))
        })
    }
}

impl ObjState for TrainSchedule {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        if self.path.len() < 2 {
            errors.push(anyhow!(
                "Path must have at least two items, got {}!",
                self.path.len()
            ));
        }
        let ids: HashSet<&str> = self.path.iter().map(|item| item.id.as_str()).collect();
        if ids.len() != self.path.len() {
            errors.push(anyhow!("Path item ids must be unique!"));
        }
        si_chk_num_gez_fin(&mut errors, &self.start_time, "Start time");
        si_chk_num_gez_fin(&mut errors, &self.initial_speed, "Initial speed");
        early_err!(errors, "Train schedule");

        let mut scheduled: HashSet<&str> = HashSet::new();
        for item in &self.schedule {
            if !ids.contains(item.at.as_str()) {
                errors.push(anyhow!(
                    "Schedule item references unknown path item `{}`!",
                    item.at
                ));
            }
            if !scheduled.insert(item.at.as_str()) {
                errors.push(anyhow!("Path item `{}` is scheduled twice!", item.at));
            }
            if let Some(stop_for) = &item.stop_for {
                si_chk_num_gez_fin(&mut errors, stop_for, &format!("Stop duration at `{}`", item.at));
            }
            if let Some(arrival) = &item.arrival {
                si_chk_num_gtz_fin(&mut errors, arrival, &format!("Arrival at `{}`", item.at));
                if self.path_index(&item.at) == Some(0) {
                    errors.push(anyhow!("Arrival cannot be set on the first path item!"));
                }
            }
        }
        let arrivals: Vec<(usize, si::Time)> = self
            .schedule
            .iter()
            .filter_map(|item| Some((self.path_index(&item.at)?, item.arrival?)))
            .collect();
        let mut sorted = arrivals.clone();
        sorted.sort_by_key(|(idx, _)| *idx);
        if !sorted.windows(2).all(|w| w[0].1 < w[1].1) {
            errors.push(anyhow!("Arrival times must increase along the path!"));
        }

        if let Err(margin_errors) = self.margins.validate() {
            errors.append_with_name(margin_errors, "Margins");
        }
        let mut last = 0;
        for boundary in &self.margins.boundaries {
            match self.path_index(boundary) {
                Some(idx) if idx > last && idx + 1 < self.path.len() => last = idx,
                Some(_) => errors.push(anyhow!(
                    "Margin boundary `{boundary}` must be an intermediate path item, in path order!"
                )),
                None => errors.push(anyhow!(
                    "Margin boundary references unknown path item `{boundary}`!"
                )),
            }
        }

        for restriction in &self.power_restrictions {
            match (
                self.path_index(&restriction.from),
                self.path_index(&restriction.to),
            ) {
                (Some(from), Some(to)) if from < to => {}
                (Some(_), Some(_)) => errors.push(anyhow!(
                    "Power restriction `{}` must go forward along the path!",
                    restriction.value
                )),
                _ => errors.push(anyhow!(
                    "Power restriction `{}` references an unknown path item!",
                    restriction.value
                )),
            }
        }
        errors.make_err()
    }
}

impl Valid for TrainSchedule {
    fn valid() -> Self {
        let at = |id: &str, track: &str, offset: f64| PathItem {
            id: id.into(),
            location: StepLocation::TrackOffset {
                track: track.into(),
                offset: offset * uc::M,
            },
        };
        Self {
            train_name: "valid".into(),
            rolling_stock_id: "valid".into(),
            start_time: si::Time::ZERO,
            path: vec![
                at("a", "track.0", 100.0),
                at("b", "track.1", 500.0),
                at("c", "track.2", 1900.0),
            ],
            schedule: vec![
                ScheduleItem {
                    at: "b".into(),
                    arrival: None,
                    stop_for: Some(60.0 * uc::S),
                },
                ScheduleItem {
                    at: "c".into(),
                    arrival: None,
                    stop_for: Some(si::Time::ZERO),
                },
            ],
            margins: Margins::default(),
            constraint_distribution: AllowanceDistribution::Standard,
            comfort: Comfort::Standard,
            initial_speed: si::Velocity::ZERO,
            speed_limit_tag: None,
            power_restrictions: vec![],
        }
    }
}

impl Default for TrainSchedule {
    fn default() -> Self {
        Self {
            train_name: String::new(),
            rolling_stock_id: String::new(),
            start_time: si::Time::ZERO,
            path: vec![],
            schedule: vec![],
            margins: Default::default(),
            constraint_distribution: Default::default(),
            comfort: Default::default(),
            initial_speed: si::Velocity::ZERO,
            speed_limit_tag: None,
            power_restrictions: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::margins::MarginValue;
    use crate::testing::*;

    impl Cases for TrainSchedule {
        fn real_cases() -> Vec<Self> {
            vec![
                Self::valid(),
                Self {
                    margins: Margins {
                        boundaries: vec!["b".into()],
                        values: vec![MarginValue::Percentage(3.0), MarginValue::None],
                    },
                    constraint_distribution: AllowanceDistribution::Mareco,
                    ..Self::valid()
                },
                Self {
                    power_restrictions: vec![PowerRestrictionItem {
                        from: "a".into(),
                        to: "b".into(),
                        value: "C1".into(),
                    }],
                    ..Self::valid()
                },
            ]
        }
        fn invalid_cases() -> Vec<Self> {
            let mut unknown_at = Self::valid();
            unknown_at.schedule[0].at = "z".into();
            let mut negative_stop = Self::valid();
            negative_stop.schedule[0].stop_for = Some(-uc::S);
            let mut late_then_early = Self::valid();
            late_then_early.schedule[0].arrival = Some(600.0 * uc::S);
            late_then_early.schedule[1].arrival = Some(300.0 * uc::S);
            vec![
                Self {
                    path: Self::valid().path[..1].to_vec(),
                    schedule: vec![],
                    ..Self::valid()
                },
                unknown_at,
                negative_stop,
                late_then_early,
                Self {
                    margins: Margins {
                        boundaries: vec!["c".into()],
                        values: vec![MarginValue::Percentage(3.0), MarginValue::None],
                    },
                    ..Self::valid()
                },
                Self {
                    power_restrictions: vec![PowerRestrictionItem {
                        from: "b".into(),
                        to: "a".into(),
                        value: "C1".into(),
                    }],
                    ..Self::valid()
                },
            ]
        }
    }

    check_cases!(TrainSchedule);

    #[test]
    fn test_dwell() {
        let schedule = TrainSchedule::valid();
        assert_eq!(schedule.schedule[0].dwell(), Some(60.0 * uc::S));
        // a zero stop passes through
        assert_eq!(schedule.schedule[1].dwell(), None);
    }

    #[test]
    fn test_json_document() {
        let json = r#"{
            "train_name": "train.0",
            "rolling_stock_id": "valid",
            "start_time": "PT1H",
            "path": [
                {"id": "a", "uic": 1},
                {"id": "b", "track": "track.2", "offset": 1900.0}
            ],
            "schedule": [{"at": "b", "stop_for": "PT0S", "arrival": "PT10M"}],
            "margins": {"boundaries": [], "values": ["5%"]},
            "constraint_distribution": "MARECO",
            "comfort": "AIR_CONDITIONING",
            "initial_speed": 0.0,
            "speed_limit_tag": "MA100",
            "power_restrictions": []
        }"#;
        let schedule = TrainSchedule::from_json(json, false).unwrap();
        assert_eq!(schedule.start_time, 3600.0 * uc::S);
        assert_eq!(schedule.path[0].location, StepLocation::Uic { uic: 1 });
        assert_eq!(schedule.schedule[0].arrival, Some(600.0 * uc::S));
        assert_eq!(schedule.constraint_distribution, AllowanceDistribution::Mareco);
        assert_eq!(schedule.comfort, Comfort::AirConditioning);
        let back = TrainSchedule::from_json(schedule.to_json().unwrap(), false).unwrap();
        assert_eq!(back, schedule);
    }
}
