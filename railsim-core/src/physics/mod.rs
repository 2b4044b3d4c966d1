//! Train kinematics over a position grid.
//!
//! A run is the position-wise minimum of two independent passes over the same grid: a forward
//! pass under full traction and a backward pass under service braking from every stop.

mod context;
mod trajectory;

pub use context::*;
pub use trajectory::*;

use crate::imports::*;

/// Fastest trajectory under the MRSP sampled in `ctx`
pub fn integrate(ctx: &PhysicsContext, initial_speed: si::Velocity) -> Result<Trajectory, Error> {
    let speeds = ctx.run(
        initial_speed.get::<si::meter_per_second>(),
        ctx.ceilings(),
    )?;
    let trajectory = Trajectory::from_speeds(ctx, &speeds)?;
    debug!(
        "integrated {} grid points, running time {} s",
        ctx.len(),
        trajectory.total_time().get::<si::second>().format_eng(Some(5))
    );
    Ok(trajectory)
}
