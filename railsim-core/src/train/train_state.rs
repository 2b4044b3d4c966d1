use crate::imports::*;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize, HistoryVec)]
/// Train state at one point of a trajectory
pub struct TrainState {
    /// Head position from the path start
    pub offset: si::Length,
    /// Time since departure
    pub time: si::Time,
    pub speed: si::Velocity,
    /// Ceiling speed the trajectory was built against
    pub speed_limit: si::Velocity,
    /// Equivalent grade under the train
    pub grade: si::Ratio,
    /// Acceleration over the following segment
    pub accel: si::Acceleration,
    /// Tractive (positive) or braking (negative) force over the following segment
    pub force: si::Force,
    /// Cumulative traction energy
    pub energy: si::Energy,
}

impl ObjState for TrainState {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        si_chk_num_gez_fin(&mut errors, &self.offset, "Offset");
        si_chk_num_gez_fin(&mut errors, &self.time, "Time");
        si_chk_num_gez_fin(&mut errors, &self.speed, "Speed");
        si_chk_num_fin(&mut errors, &self.accel, "Acceleration");
        errors.make_err()
    }
}
