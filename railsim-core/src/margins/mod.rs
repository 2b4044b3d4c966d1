//! Allowance distribution: extra running time spread over ranges of a path.
//!
//! Ranges are solved one after the other, from the path start. Once a range is solved, its
//! speeds become the ceilings of every later run so that it is never disturbed again.

mod linear;
mod mareco;
mod solver;

pub use mareco::coasting_end_speed;

use crate::config::SimulationConfig;
use crate::imports::*;
use crate::physics::PhysicsContext;
use std::str::FromStr;

/// Allowance over one range, as written in schedule documents: `"3%"`, `"5min/100km"` or
/// `"none"`
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MarginValue {
    #[default]
    None,
    /// Percentage of the base running time
    Percentage(f64),
    /// Minutes per 100 km of range length
    MinPer100Km(f64),
}

impl MarginValue {
    /// Running time to add to a range of `distance` whose base running time is `running_time`
    pub fn extra_time(&self, running_time: si::Time, distance: si::Length) -> si::Time {
        match self {
            Self::None => si::Time::ZERO,
            Self::Percentage(pct) => running_time * (*pct / 100.0),
            Self::MinPer100Km(min) => {
                *min * uc::MIN * (distance.get::<si::kilometer>() / 100.0)
            }
        }
    }
}

impl FromStr for MarginValue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let value = if s.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        } else if let Some(pct) = s.strip_suffix('%') {
            Self::Percentage(pct.trim().parse()?)
        } else if let Some(min) = s.strip_suffix("min/100km") {
            Self::MinPer100Km(min.trim().parse()?)
        } else {
            bail!("Invalid margin value {s:?}, expected `X%`, `Ymin/100km` or `none`")
        };
        match value {
            Self::Percentage(x) | Self::MinPer100Km(x) if !(x.is_finite() && x >= 0.0) => {
                bail!("Margin value {s:?} must be finite and non-negative")
            }
            _ => Ok(value),
        }
    }
}

impl TryFrom<String> for MarginValue {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for MarginValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Percentage(pct) => write!(f, "{pct}%"),
            Self::MinPer100Km(min) => write!(f, "{min}min/100km"),
        }
    }
}

impl From<MarginValue> for String {
    fn from(value: MarginValue) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
/// Allowance per range.  Ranges are delimited by `boundaries`, given as path step ids, so there
/// is one more value than boundaries.
pub struct Margins {
    #[serde(default)]
    pub boundaries: Vec<String>,
    #[serde(default)]
    pub values: Vec<MarginValue>,
}

impl Margins {
    /// Same allowance over the whole path
    pub fn uniform(value: MarginValue) -> Self {
        Self {
            boundaries: vec![],
            values: vec![value],
        }
    }

    /// True if no range gets any allowance
    pub fn is_none(&self) -> bool {
        self.values.iter().all(|v| *v == MarginValue::None)
    }
}

impl ObjState for Margins {
    fn is_fake(&self) -> bool {
        self.values.is_empty() && self.boundaries.is_empty()
    }

    fn validate(&self) -> ValidationResults {
        early_fake_ok!(self);
        let mut errors = ValidationErrors::new();
        if self.values.len() != self.boundaries.len() + 1 {
            errors.push(anyhow!(
                "There must be one margin value more than boundaries, got {} values for {} \
                 boundaries!",
                self.values.len(),
                self.boundaries.len()
            ));
        }
        let unique: HashSet<&str> = self.boundaries.iter().map(String::as_str).collect();
        if unique.len() != self.boundaries.len() {
            errors.push(anyhow!("Margin boundaries must be unique!"));
        }
        errors.make_err()
    }
}

/// How extra running time is spread over a range
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AllowanceDistribution {
    /// Speeds scaled by a common factor
    #[default]
    Standard,
    /// Speed capping plus coasting before braking, minimizing traction energy
    Mareco,
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Grid range `[begin, end]` whose running time (dwell excluded) must become `running_time`
pub struct TimeTarget {
    pub begin: usize,
    pub end: usize,
    pub running_time: si::Time,
}

/// Brings the running time of every target range of `speeds` to its target.
///
/// Targets must be sorted and must not overlap. Fails with [Error::MarginsInfeasible] if a range
/// cannot be slowed down enough above `config.mareco_min_speed`.
pub fn distribute(
    ctx: &PhysicsContext,
    speeds: &[f64],
    initial_speed: f64,
    targets: &[TimeTarget],
    distribution: AllowanceDistribution,
    config: &SimulationConfig,
) -> Result<Vec<f64>, Error> {
    distribute_under(
        ctx,
        ctx.ceilings(),
        speeds,
        initial_speed,
        targets,
        distribution,
        config,
    )
}

/// [distribute] with every rerun additionally capped by `ceilings`, e.g. a profile that already
/// carries allowances outside the target ranges
pub fn distribute_under(
    ctx: &PhysicsContext,
    ceilings: &[f64],
    speeds: &[f64],
    initial_speed: f64,
    targets: &[TimeTarget],
    distribution: AllowanceDistribution,
    config: &SimulationConfig,
) -> Result<Vec<f64>, Error> {
    let mut ceilings: Vec<f64> = ctx
        .ceilings()
        .iter()
        .zip(ceilings)
        .map(|(c, extra)| c.min(*extra))
        .collect();
    let mut speeds = speeds.to_vec();
    for target in targets {
        if target.begin >= target.end || target.end >= speeds.len() {
            return Err(Error::SimulationError(format_dbg!(target)));
        }
        let range = RangeProblem {
            ctx,
            ceilings: &ceilings,
            speeds: &speeds,
            begin: target.begin,
            end: target.end,
            target: target.running_time.get::<si::second>(),
            initial_speed,
        };
        let current = range.time(&speeds)?;
        if current + config.time_tolerance.get::<si::second>() < range.target {
            speeds = match distribution {
                AllowanceDistribution::Standard => linear::solve(&range, config)?,
                AllowanceDistribution::Mareco => mareco::solve(&range, config)?,
            };
        }
        for (c, v) in ceilings.iter_mut().zip(&speeds).take(target.end + 1) {
            *c = c.min(*v);
        }
    }
    Ok(speeds)
}

/// One range being stretched, with the state left by the ranges solved before it
struct RangeProblem<'a> {
    ctx: &'a PhysicsContext<'a>,
    ceilings: &'a [f64],
    speeds: &'a [f64],
    begin: usize,
    end: usize,
    /// Target running time, s
    target: f64,
    initial_speed: f64,
}

impl<'a> RangeProblem<'a> {
    /// Reruns the whole grid with the range capped by `cap`.  The cap never goes below the
    /// braking curve from the range entry speed, so that the train may slow down inside the
    /// range rather than before it.
    fn run_capped<F: Fn(usize) -> f64>(&self, cap: F) -> Result<Vec<f64>, Error> {
        let entry = self
            .ctx
            .braking_curve(self.speeds[self.begin], self.begin, self.end);
        let mut ceilings = self.ceilings.to_vec();
        for i in self.begin + 1..=self.end {
            ceilings[i] = ceilings[i].min(cap(i).max(entry[i - self.begin]));
        }
        self.ctx.run(self.initial_speed, &ceilings)
    }

    /// Running time over the range, s
    fn time(&self, speeds: &[f64]) -> Result<f64, Error> {
        self.ctx.running_time(speeds, self.begin, self.end)
    }

    /// Highest speed of the range in the current profile
    fn max_speed(&self) -> f64 {
        self.speeds[self.begin..=self.end]
            .iter()
            .copied()
            .fold(0.0, f64::max)
    }

    fn infeasible(&self, detail: &str) -> Error {
        let grid = self.ctx.grid();
        Error::MarginsInfeasible(format!(
            "cannot reach a running time of {:.1} s between {} m and {} m: {detail}",
            self.target, grid[self.begin], grid[self.end]
        ))
    }
}
