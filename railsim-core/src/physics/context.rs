use crate::config::SimulationConfig;
use crate::imports::*;
use crate::speed_limits::Mrsp;
use crate::track::TrainPath;
use crate::train::{grades_on_grid, Comfort, RollingStock};

/// Grid points closer than this are merged
const GRID_EPS_M: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Scheduled stop at a path offset
pub struct Stop {
    pub offset: si::Length,
    /// Dwell time; zero still stops the train
    pub duration: si::Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Effort scaling over `[begin, end)` of the path
pub struct EffortRestriction {
    pub begin: si::Length,
    pub end: si::Length,
    pub ratio: si::Ratio,
}

/// Everything the forward and backward passes read, sampled once on a shared position grid.
///
/// Speeds are plain `f64` in m/s over the grid; each pass is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct PhysicsContext<'a> {
    pub rolling_stock: &'a RollingStock,
    pub path: &'a TrainPath,
    /// Head positions, m
    grid: Vec<f64>,
    /// MRSP ceiling at each grid point, m/s
    ceilings: Vec<f64>,
    /// Equivalent grade under the train at each grid point
    grades: Vec<si::Ratio>,
    /// Effort scaling over each segment `[grid[i], grid[i + 1]]`
    effort_ratios: Vec<f64>,
    /// Grid indices of stops, sorted, with their dwell
    stops: Vec<(usize, si::Time)>,
    effort_speeds: Vec<f64>,
    effort_forces: Vec<f64>,
    inertia_kg: f64,
    comfort_acceleration: Option<f64>,
}

/// Ascending, deduplicated grid of `[0, length]`: uniform points every `step` plus every point
/// of `extra` inside the path
fn build_grid(length: f64, step: f64, extra: &[f64]) -> Vec<f64> {
    let mut fixed: Vec<f64> = extra
        .iter()
        .copied()
        .filter(|x| (0.0..=length).contains(x))
        .chain([0.0, length])
        .collect();
    fixed.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    fixed.dedup_by(|a, b| (*a - *b).abs() < GRID_EPS_M);

    let n = (length / step).floor() as usize;
    let near_fixed = |x: f64| {
        let i = fixed.partition_point(|f| *f < x);
        [i.checked_sub(1), Some(i)]
            .into_iter()
            .flatten()
            .filter_map(|j| fixed.get(j))
            .any(|f| (f - x).abs() < GRID_EPS_M)
    };
    let mut grid: Vec<f64> = (1..=n)
        .map(|i| i as f64 * step)
        .filter(|x| *x < length && !near_fixed(*x))
        .chain(fixed.iter().copied())
        .collect();
    grid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    grid
}

impl<'a> PhysicsContext<'a> {
    /// Samples ceilings, grades and effort restrictions of `path` on a grid refined at every
    /// MRSP breakpoint, stop and path step.
    pub fn new(
        path: &'a TrainPath,
        mrsp: &Mrsp,
        rolling_stock: &'a RollingStock,
        comfort: Comfort,
        stops: &[Stop],
        restrictions: &[EffortRestriction],
        config: &SimulationConfig,
    ) -> Result<Self, Error> {
        let length = path.length.get::<si::meter>();
        let mut extra: Vec<f64> = mrsp
            .breakpoints()
            .into_iter()
            .chain(stops.iter().map(|s| s.offset))
            .chain(path.steps.iter().map(|s| s.path_offset))
            .chain(restrictions.iter().flat_map(|r| [r.begin, r.end]))
            .map(|x| x.get::<si::meter>())
            .collect();
        extra.retain(|x| x.is_finite());
        let grid = build_grid(length, config.position_step.get::<si::meter>(), &extra);

        let ceilings: Vec<f64> = grid
            .iter()
            .map(|x| mrsp.ceiling_at(*x * uc::M).get::<si::meter_per_second>())
            .collect();
        let grid_len: Vec<si::Length> = grid.iter().map(|x| *x * uc::M).collect();
        let grades = grades_on_grid(
            config.train_res_method,
            &path.profiles.grades,
            &grid_len,
            rolling_stock.length,
        )
        .map_err(Error::simulation)?;

        let effort_ratios: Vec<f64> = grid
            .windows(2)
            .map(|w| {
                let mid = (w[0] + w[1]) * 0.5 * uc::M;
                restrictions
                    .iter()
                    .filter(|r| r.begin <= mid && mid < r.end)
                    .map(|r| r.ratio.get::<si::ratio>())
                    .fold(1.0, f64::min)
            })
            .collect();

        let mut stop_idxs = vec![];
        for stop in stops {
            let idx = nearest_idx(&grid, stop.offset.get::<si::meter>()).ok_or_else(|| {
                Error::SimulationError(format!(
                    "stop at {} m is outside the path",
                    stop.offset.get::<si::meter>()
                ))
            })?;
            stop_idxs.push((idx, stop.duration));
        }
        stop_idxs.sort_by_key(|(idx, _)| *idx);

        let curve = rolling_stock
            .effort_curve(comfort)
            .map_err(|err| Error::InitError(format!("{err:?}")))?;
        Ok(Self {
            rolling_stock,
            path,
            grid,
            ceilings,
            grades,
            effort_ratios,
            stops: stop_idxs,
            effort_speeds: curve
                .speeds
                .iter()
                .map(|v| v.get::<si::meter_per_second>())
                .collect(),
            effort_forces: curve
                .max_efforts
                .iter()
                .map(|f| f.get::<si::newton>())
                .collect(),
            inertia_kg: rolling_stock.inertia().get::<si::kilogram>(),
            comfort_acceleration: rolling_stock
                .comfort_acceleration
                .map(|a| a.get::<si::meter_per_second_squared>()),
        })
    }

    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// MRSP ceiling at each grid point, m/s
    pub fn ceilings(&self) -> &[f64] {
        &self.ceilings
    }

    pub fn grade(&self, i: usize) -> si::Ratio {
        self.grades[i]
    }

    /// Grid indices of stops with their dwell times
    pub fn stops(&self) -> &[(usize, si::Time)] {
        &self.stops
    }

    pub fn is_stop(&self, i: usize) -> bool {
        self.stops.iter().any(|(idx, _)| *idx == i)
    }

    /// Grid index of path offset `offset`, if it is a grid point
    pub fn index_of(&self, offset: si::Length) -> Option<usize> {
        nearest_idx(&self.grid, offset.get::<si::meter>())
            .filter(|i| (self.grid[*i] - offset.get::<si::meter>()).abs() < GRID_EPS_M)
    }

    fn dx(&self, i: usize) -> f64 {
        self.grid[i + 1] - self.grid[i]
    }

    fn resistance(&self, v: f64) -> f64 {
        self.rolling_stock
            .resistance_at(v * uc::MPS)
            .get::<si::newton>()
    }

    fn grade_force(&self, i: usize) -> f64 {
        self.rolling_stock
            .grade_force(self.grades[i])
            .get::<si::newton>()
    }

    /// Maximum tractive effort at `v` over segment `i`, N
    fn max_effort(&self, v: f64, i: usize) -> Result<f64, Error> {
        let effort = interp1d(v, &self.effort_speeds, &self.effort_forces)
            .map_err(Error::simulation)?;
        Ok(effort * self.effort_ratios.get(i).copied().unwrap_or(1.0))
    }

    /// Acceleration under full traction at `v` over segment `i`
    fn traction_accel(&self, v: f64, i: usize) -> Result<f64, Error> {
        let accel = (self.max_effort(v, i)? + self.grade_force(i) - self.resistance(v))
            / self.inertia_kg;
        Ok(match self.comfort_acceleration {
            Some(cap) => accel.min(cap),
            None => accel,
        })
    }

    /// Acceleration with no traction and no braking at `v` over segment `i`
    pub fn coasting_accel(&self, v: f64, i: usize) -> f64 {
        (self.grade_force(i) - self.resistance(v)) / self.inertia_kg
    }

    /// Deceleration available when braking at `v` over segment `i`
    fn braking_decel(&self, v: f64, i: usize) -> f64 {
        self.rolling_stock
            .braking_decel(v * uc::MPS, self.grades[i])
            .get::<si::meter_per_second_squared>()
    }

    /// Full-traction speeds capped by `ceilings`, restarting from zero at every stop.
    ///
    /// Fails with [Error::UnreachableConstraint] if `initial_speed` exceeds the first ceiling,
    /// and with [Error::SimulationError] if the train stalls.
    pub fn forward_pass(&self, initial_speed: f64, ceilings: &[f64]) -> Result<Vec<f64>, Error> {
        let n = self.grid.len();
        if initial_speed > ceilings[0] * (1.0 + utils::REL_TOL) + utils::REL_TOL {
            return Err(Error::UnreachableConstraint(format!(
                "initial speed {initial_speed} m/s exceeds the speed limit {} m/s at the path start",
                ceilings[0]
            )));
        }
        let mut speeds = vec![0.0; n];
        speeds[0] = if self.is_stop(0) {
            0.0
        } else {
            initial_speed.min(ceilings[0])
        };
        for i in 0..n - 1 {
            let v = speeds[i];
            let accel = self.traction_accel(v, i)?;
            let v2 = v * v + 2.0 * accel * self.dx(i);
            if v2 <= 0.0 && ceilings[i + 1] > 0.0 {
                return Err(Error::SimulationError(format!(
                    "train stalls between {} m and {} m (acceleration {accel} m/s2 at {v} m/s)",
                    self.grid[i],
                    self.grid[i + 1]
                )));
            }
            speeds[i + 1] = if self.is_stop(i + 1) {
                0.0
            } else {
                v2.max(0.0).sqrt().min(ceilings[i + 1])
            };
        }
        Ok(speeds)
    }

    /// Highest speeds from which service braking reaches every stop and the path end at zero
    /// speed, capped by `ceilings`.
    ///
    /// Fails with [Error::UnreachableConstraint] if braking is required where the rolling stock
    /// cannot decelerate.
    pub fn backward_pass(&self, ceilings: &[f64]) -> Result<Vec<f64>, Error> {
        let n = self.grid.len();
        let mut speeds = vec![0.0; n];
        for i in (0..n - 1).rev() {
            if self.is_stop(i) {
                speeds[i] = 0.0;
                continue;
            }
            let next = speeds[i + 1];
            let decel = self.braking_decel(next, i);
            if decel <= 0.0 {
                if next < ceilings[i] {
                    return Err(Error::UnreachableConstraint(format!(
                        "no braking deceleration available at {} m to slow down to {next} m/s",
                        self.grid[i]
                    )));
                }
                speeds[i] = ceilings[i];
                continue;
            }
            speeds[i] = (next * next + 2.0 * decel * self.dx(i))
                .sqrt()
                .min(ceilings[i]);
        }
        Ok(speeds)
    }

    /// Position-wise minimum of the forward and backward passes.
    ///
    /// Fails with [Error::UnreachableConstraint] if `initial_speed` already exceeds the
    /// braking curve at the path start.
    pub fn run(&self, initial_speed: f64, ceilings: &[f64]) -> Result<Vec<f64>, Error> {
        let backward = self.backward_pass(ceilings)?;
        if initial_speed > backward[0] * (1.0 + utils::REL_TOL) + utils::REL_TOL {
            return Err(Error::UnreachableConstraint(format!(
                "initial speed {initial_speed} m/s is above the braking curve ({} m/s) at the \
                 path start",
                backward[0]
            )));
        }
        let forward = self.forward_pass(initial_speed, ceilings)?;
        Ok(forward
            .into_iter()
            .zip(backward)
            .map(|(f, b)| f.min(b))
            .collect())
    }

    /// Whether segment `i` joins two points where the train is held at rest: a stop or the
    /// path start on one side, a stop or the path end on the other.  Such a segment is shorter
    /// than the grid step and is not travelled.
    fn is_standing(&self, speeds: &[f64], i: usize) -> bool {
        speeds[i] + speeds[i + 1] <= 0.0
            && (i == 0 || self.is_stop(i))
            && (i + 2 == self.grid.len() || self.is_stop(i + 1))
    }

    /// Travel time over segment `i`, s
    pub fn segment_time(&self, speeds: &[f64], i: usize) -> Result<f64, Error> {
        let v_sum = speeds[i] + speeds[i + 1];
        if v_sum <= 0.0 {
            if self.is_standing(speeds, i) {
                return Ok(0.0);
            }
            return Err(Error::SimulationError(format!(
                "train is stopped between {} m and {} m",
                self.grid[i],
                self.grid[i + 1]
            )));
        }
        Ok(2.0 * self.dx(i) / v_sum)
    }

    /// Running time from grid index `from` to `to`, excluding dwell, s
    pub fn running_time(&self, speeds: &[f64], from: usize, to: usize) -> Result<f64, Error> {
        (from..to).map(|i| self.segment_time(speeds, i)).sum()
    }

    /// Force applied by the train over segment `i`: positive for traction, negative for
    /// braking, N
    pub fn segment_force(&self, speeds: &[f64], i: usize) -> f64 {
        if self.is_standing(speeds, i) {
            return 0.0;
        }
        let (v0, v1) = (speeds[i], speeds[i + 1]);
        let accel = (v1 * v1 - v0 * v0) / (2.0 * self.dx(i));
        self.inertia_kg * accel + self.resistance((v0 + v1) * 0.5) - self.grade_force(i)
    }

    /// Speeds at grid indices `from..=to` when braking from `v` at `from`, zero once stopped
    pub fn braking_curve(&self, v: f64, from: usize, to: usize) -> Vec<f64> {
        let mut curve = Vec::with_capacity(to.saturating_sub(from) + 1);
        let mut v = v;
        curve.push(v);
        for i in from..to {
            let decel = self.braking_decel(v, i);
            v = (v * v - 2.0 * decel * self.dx(i)).max(0.0).sqrt();
            curve.push(v);
        }
        curve
    }

    /// Speed at grid index `i` from which coasting reaches `v_next` at `i + 1`, if the train
    /// would not stop before
    pub fn coast_back(&self, v_next: f64, i: usize) -> Option<f64> {
        let v2 = v_next * v_next - 2.0 * self.coasting_accel(v_next, i) * self.dx(i);
        (v2 > 0.0).then(|| v2.sqrt())
    }
}

/// Index of the grid point closest to `x`, if `x` lies on the grid span
fn nearest_idx(grid: &[f64], x: f64) -> Option<usize> {
    let (first, last) = (*grid.first()?, *grid.last()?);
    if x < first - GRID_EPS_M || x > last + GRID_EPS_M {
        return None;
    }
    let i = grid.partition_point(|g| *g < x);
    [i.checked_sub(1), Some(i)]
        .into_iter()
        .flatten()
        .filter(|j| *j < grid.len())
        .min_by(|a, b| {
            (grid[*a] - x)
                .abs()
                .partial_cmp(&(grid[*b] - x).abs())
                .unwrap_or(Ordering::Equal)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_grid() {
        let grid = build_grid(10.0, 3.0, &[4.0, 6.0005, 12.0]);
        assert_eq!(grid, vec![0.0, 3.0, 4.0, 6.0005, 9.0, 10.0]);
        let grid = build_grid(10.0, 2.5, &[]);
        assert_eq!(grid, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    }

    #[test]
    fn test_nearest_idx() {
        let grid = [0.0, 1.0, 2.0];
        assert_eq!(nearest_idx(&grid, 1.2), Some(1));
        assert_eq!(nearest_idx(&grid, 1.6), Some(2));
        assert_eq!(nearest_idx(&grid, 3.0), None);
    }
}
