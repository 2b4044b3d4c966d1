use crate::imports::*;
use crate::margins::MarginValue;
use crate::timetable::duration::iso8601;
use crate::track::StepLocation;
use crate::train::Comfort;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Arrival window at a step, around `arrival_time` from the timetable origin
pub struct TimingData {
    #[serde(with = "iso8601")]
    pub arrival_time: si::Time,
    /// Milliseconds
    #[serde(default)]
    pub arrival_time_tolerance_before: u64,
    /// Milliseconds
    #[serde(default)]
    pub arrival_time_tolerance_after: u64,
}

impl TimingData {
    /// Earliest and latest accepted arrival
    pub fn bounds(&self) -> (si::Time, si::Time) {
        let ms = |tolerance: u64| tolerance as f64 * 1e-3 * uc::S;
        (
            self.arrival_time - ms(self.arrival_time_tolerance_before),
            self.arrival_time + ms(self.arrival_time_tolerance_after),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdcmStep {
    pub location: StepLocation,
    /// Dwell at the step; none or zero passes through
    #[serde(default, with = "iso8601::option")]
    pub duration: Option<si::Time>,
    #[serde(default)]
    pub timing_data: Option<TimingData>,
}

impl StdcmStep {
    pub fn dwell(&self) -> Option<si::Time> {
        self.duration.filter(|d| *d > si::Time::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Departure times accepted for the new train, from the timetable origin
pub struct TimeWindow {
    #[serde(with = "iso8601")]
    pub earliest_departure: si::Time,
    #[serde(with = "iso8601")]
    pub latest_departure: si::Time,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SerdeAPI)]
pub struct StdcmRequest {
    pub rolling_stock_id: String,
    pub steps: Vec<StdcmStep>,
    #[serde(default)]
    pub comfort: Comfort,
    /// Allowance spread linearly over the whole run
    #[serde(default)]
    pub margin: Option<MarginValue>,
    pub time_window: TimeWindow,
    #[serde(default)]
    pub speed_limit_tag: Option<String>,
}

impl StdcmRequest {
    /// Index and timing of the constrained step, if any
    pub fn timing(&self) -> Option<(usize, &TimingData)> {
        self.steps
            .iter()
            .enumerate()
            .find_map(|(i, step)| step.timing_data.as_ref().map(|timing| (i, timing)))
    }
}

impl Init for StdcmRequest {
    fn init(&mut self) -> Result<(), Error> {
        self.validate()
            .map_err(|err| Error::InitError(format!("STDCM request:\n{err}")))
    }
}

impl ObjState for StdcmRequest {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        if self.steps.len() < 2 {
            errors.push(anyhow!(
                "STDCM request needs at least two steps, got {}!",
                self.steps.len()
            ));
        }
        let timed = self
            .steps
            .iter()
            .filter(|step| step.timing_data.is_some())
            .count();
        if timed > 1 {
            errors.push(anyhow!(
                "Timing data may be attached to one step only, got {timed}!"
            ));
        }
        for (i, step) in self.steps.iter().enumerate() {
            if let Some(duration) = &step.duration {
                si_chk_num_gez_fin(&mut errors, duration, &format!("Step {i} duration"));
            }
        }
        let window = &self.time_window;
        si_chk_num_fin(&mut errors, &window.earliest_departure, "Earliest departure");
        si_chk_num_fin(&mut errors, &window.latest_departure, "Latest departure");
        if window.latest_departure < window.earliest_departure {
            errors.push(anyhow!("Time window ends before it begins!"));
        }
        errors.make_err()
    }
}

impl Default for StdcmRequest {
    fn default() -> Self {
        Self {
            rolling_stock_id: String::new(),
            steps: vec![],
            comfort: Comfort::Standard,
            margin: None,
            time_window: TimeWindow {
                earliest_departure: si::Time::ZERO,
                latest_departure: si::Time::ZERO,
            },
            speed_limit_tag: None,
        }
    }
}

impl Valid for StdcmRequest {
    /// From `uic` 1 to `uic` 3 with a one-minute stop at `uic` 2, leaving within two hours
    fn valid() -> Self {
        let step = |uic: u32, duration: Option<si::Time>| StdcmStep {
            location: StepLocation::Uic { uic },
            duration,
            timing_data: None,
        };
        Self {
            rolling_stock_id: "valid".into(),
            steps: vec![
                step(1, None),
                step(2, Some(60.0 * uc::S)),
                step(3, None),
            ],
            time_window: TimeWindow {
                earliest_departure: si::Time::ZERO,
                latest_departure: 7200.0 * uc::S,
            },
            ..Default::default()
        }
    }
}
