//! Train movement simulation and scheduling core.
//!
//! Given a rail infrastructure graph, a rolling stock and a train schedule, this crate computes
//! a physically valid speed/position/time trajectory:
//! - [track]: immutable infra graph, path finding and merged path profiles
//! - [speed_limits]: most restrictive speed profile (MRSP) including ETCS braking overlays
//! - [physics]: forward/backward passes over a position grid
//! - [margins]: allowance distribution (linear and MARECO)
//! - [timetable]: train schedules and their store
//! - [simulation]: base, provisional and final runs of a schedule, alone or in batches
//! - [stdcm]: conflict-free slot search for a new train in an existing timetable

#[macro_use]
pub mod utils;
pub mod config;
pub mod error;
mod imports;
pub mod lin_search_hint;
pub mod margins;
pub mod physics;
pub mod prelude;
pub mod si;
pub mod simulation;
pub mod speed_limits;
pub mod stdcm;
pub mod timetable;
pub mod track;
pub mod train;
pub mod traits;
pub mod uc;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;
