use super::context::PhysicsContext;
use crate::imports::*;
use crate::train::{TrainState, TrainStateHistoryVec};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, SerdeAPI)]
/// Simulated run: one state per grid point, plus a repeated point at the end of each dwell
pub struct Trajectory {
    pub states: TrainStateHistoryVec,
    /// Traction energy; braking does not count
    pub energy_consumption: si::Energy,
}

impl Init for Trajectory {}

impl Trajectory {
    /// Integrates times, forces and energy of grid speeds `speeds`
    pub fn from_speeds(ctx: &PhysicsContext, speeds: &[f64]) -> Result<Self, Error> {
        let grid = ctx.grid();
        if speeds.len() != grid.len() {
            return Err(Error::SimulationError(format_dbg!((speeds.len(), grid.len()))));
        }
        let mut states = TrainStateHistoryVec::new();
        let mut time = 0.0;
        let mut energy = 0.0;
        let mut stops = ctx.stops().iter().peekable();
        for i in 0..grid.len() {
            let (accel, force) = if i + 1 < grid.len() {
                let dx = grid[i + 1] - grid[i];
                let accel = (speeds[i + 1].powi(2) - speeds[i].powi(2)) / (2.0 * dx);
                (accel, ctx.segment_force(speeds, i))
            } else {
                (0.0, 0.0)
            };
            let state = TrainState {
                offset: grid[i] * uc::M,
                time: time * uc::S,
                speed: speeds[i] * uc::MPS,
                speed_limit: ctx.ceilings()[i] * uc::MPS,
                grade: ctx.grade(i),
                accel: accel * uc::MPS2,
                force: force * uc::N,
                energy: energy * uc::J,
            };
            states.push(state);
            while let Some((_, dwell)) = stops.next_if(|(idx, _)| *idx == i) {
                if *dwell > si::Time::ZERO {
                    time += dwell.get::<si::second>();
                    states.push(TrainState {
                        time: time * uc::S,
                        ..state
                    });
                }
            }
            if i + 1 < grid.len() {
                time += ctx.segment_time(speeds, i)?;
                energy += force.max(0.0) * (grid[i + 1] - grid[i]);
            }
        }
        Ok(Self {
            states,
            energy_consumption: energy * uc::J,
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn positions(&self) -> &[si::Length] {
        &self.states.offset
    }

    pub fn speeds(&self) -> &[si::Velocity] {
        &self.states.speed
    }

    pub fn times(&self) -> &[si::Time] {
        &self.states.time
    }

    /// Time from departure to arrival at the end of the path, dwell included
    pub fn total_time(&self) -> si::Time {
        self.states.time.last().copied().unwrap_or(si::Time::ZERO)
    }

    /// Time the head first reaches `offset`, interpolated between states
    pub fn arrival_time_at(&self, offset: si::Length) -> Option<si::Time> {
        let pos = &self.states.offset;
        let i = pos.partition_point(|x| *x < offset);
        if i == pos.len() {
            return None;
        }
        if pos[i] == offset || i == 0 {
            return Some(self.states.time[i]);
        }
        Some(self.interp_time(i - 1, offset))
    }

    /// Time the head last leaves `offset`: after any dwell there
    pub fn departure_time_at(&self, offset: si::Length) -> Option<si::Time> {
        let pos = &self.states.offset;
        let i = pos.partition_point(|x| *x <= offset);
        if i == 0 {
            return None;
        }
        if pos[i - 1] == offset || i == pos.len() {
            return Some(self.states.time[i - 1]);
        }
        Some(self.interp_time(i - 1, offset))
    }

    /// Time at `offset` within the segment starting at state `i`, from the trapezoidal speed
    fn interp_time(&self, i: usize, offset: si::Length) -> si::Time {
        let x0 = self.states.offset[i];
        let v0 = self.states.speed[i].get::<si::meter_per_second>();
        let a = self.states.accel[i].get::<si::meter_per_second_squared>();
        let dx = (offset - x0).get::<si::meter>();
        let v = (v0 * v0 + 2.0 * a * dx).max(0.0).sqrt();
        let dt = if v0 + v > 0.0 { 2.0 * dx / (v0 + v) } else { 0.0 };
        self.states.time[i] + dt * uc::S
    }

    /// Same trajectory delayed by `delay`
    pub fn shifted(&self, delay: si::Time) -> Self {
        let mut shifted = self.clone();
        for t in shifted.states.time.iter_mut() {
            *t += delay;
        }
        shifted
    }
}
