//! Engine tuning shared by simulation runs and slot searches.

use crate::imports::*;
use crate::train::TrainResMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SerdeAPI)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Spacing of the uniform part of the position grid
    #[serde(default = "SimulationConfig::default_position_step")]
    pub position_step: si::Length,
    /// Convergence tolerance on range running times when distributing margins
    #[serde(default = "SimulationConfig::default_time_tolerance")]
    pub time_tolerance: si::Time,
    /// Iteration cap for the root finder used by margin distribution
    #[serde(default = "SimulationConfig::default_max_solver_iters")]
    pub max_solver_iters: u64,
    /// Lowest ceiling speed MARECO may try
    #[serde(default = "SimulationConfig::default_mareco_min_speed")]
    pub mareco_min_speed: si::Velocity,
    /// How gradient is sampled under the train
    #[serde(default)]
    pub train_res_method: TrainResMethod,
    /// Time a zone stays occupied after the tail of a train has cleared it
    #[serde(default)]
    pub zone_release_time: si::Time,
    /// Cap on enumerated location combinations in a slot search
    #[serde(default = "SimulationConfig::default_stdcm_max_combinations")]
    pub stdcm_max_combinations: usize,
}

impl SimulationConfig {
    fn default_position_step() -> si::Length {
        uc::M
    }
    fn default_time_tolerance() -> si::Time {
        0.01 * uc::S
    }
    fn default_max_solver_iters() -> u64 {
        100
    }
    fn default_mareco_min_speed() -> si::Velocity {
        uc::MPS
    }
    fn default_stdcm_max_combinations() -> usize {
        256
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            position_step: Self::default_position_step(),
            time_tolerance: Self::default_time_tolerance(),
            max_solver_iters: Self::default_max_solver_iters(),
            mareco_min_speed: Self::default_mareco_min_speed(),
            train_res_method: Default::default(),
            zone_release_time: si::Time::ZERO,
            stdcm_max_combinations: Self::default_stdcm_max_combinations(),
        }
    }
}

impl Valid for SimulationConfig {}

impl ObjState for SimulationConfig {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        si_chk_num_gtz_fin(&mut errors, &self.position_step, "Position step");
        si_chk_num_gtz_fin(&mut errors, &self.time_tolerance, "Time tolerance");
        si_chk_num_gtz_fin(&mut errors, &self.mareco_min_speed, "MARECO min speed");
        si_chk_num_gez_fin(&mut errors, &self.zone_release_time, "Zone release time");
        if self.max_solver_iters == 0 {
            errors.push(anyhow!("Max solver iters must be greater than zero!"));
        }
        if self.stdcm_max_combinations == 0 {
            errors.push(anyhow!("STDCM max combinations must be greater than zero!"));
        }
        errors.make_err()
    }
}

impl Init for SimulationConfig {
    fn init(&mut self) -> Result<(), Error> {
        self.validate()
            .map_err(|errs| Error::InitError(format!("{}\n{errs}", format_dbg!())))
    }
}
