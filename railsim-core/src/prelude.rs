pub use crate::config::SimulationConfig;
pub use crate::error::{Error, RailsimResult};
pub use crate::margins::{
    coasting_end_speed, distribute, AllowanceDistribution, MarginValue, Margins, TimeTarget,
};
pub use crate::physics::{integrate, EffortRestriction, PhysicsContext, Stop, Trajectory};
pub use crate::simulation::{
    schedule_path, simulate, simulate_batch, ReportTrain, SimulationReport, SimulationRun,
};
pub use crate::speed_limits::{Mrsp, SignalingConstraints};
pub use crate::stdcm::{
    occupancy_from_trajectory, search as stdcm_search, timetable_occupancy, OccupancyInterval,
    StdcmCandidate, StdcmOutcome, StdcmRequest, StdcmStep, TimeWindow, TimingData, ZoneOccupancy,
};
pub use crate::timetable::{
    PathItem, PowerRestrictionItem, ScheduleId, ScheduleItem, Timetable, TrainSchedule,
};
pub use crate::track::{
    Infra, InfraBuilder, InfraCache, PathLocation, RawInfra, StepLocation, TrackOffset,
    TrainPath,
};
pub use crate::train::{Comfort, GammaType, RollingStock, TrainState, TrainStateHistoryVec};
pub use crate::traits::{Init, SerdeAPI};
pub use crate::utils::IdAllocator;
pub use crate::validate::{ObjState, Valid, ValidationErrors};
