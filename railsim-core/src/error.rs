//! Custom error types

use crate::timetable::ScheduleId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed infrastructure, rejected at load
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    /// Path steps cannot be resolved or connected on the infra
    #[error("invalid path: {0}")]
    InvalidPath(String),
    /// Rolling stock cannot meet a required braking, stop or arrival constraint
    #[error("unreachable constraint: {0}")]
    UnreachableConstraint(String),
    /// Requested allowance cannot be absorbed
    #[error("margins infeasible: {0}")]
    MarginsInfeasible(String),
    #[error("unknown train schedule: {0}")]
    UnknownSchedule(ScheduleId),
    #[error("`Init::init` failed: {0}")]
    InitError(String),
    #[error("`SerdeAPI` failed: {0}")]
    SerdeError(String),
    #[error("{0}")]
    SimulationError(String),
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wraps an [anyhow::Error] as a [Error::SimulationError], keeping the whole context chain
    pub(crate) fn simulation(err: anyhow::Error) -> Self {
        Self::SimulationError(format!("{err:?}"))
    }
}

pub type RailsimResult<T> = Result<T, Error>;
