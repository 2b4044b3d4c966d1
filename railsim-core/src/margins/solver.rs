use crate::config::SimulationConfig;
use crate::imports::*;
use argmin::core::{CostFunction, Executor, State};
use argmin::solver::brent::BrentRoot;

/// Scalar function whose root is searched
struct Residual<F> {
    f: F,
}

impl<F> CostFunction for Residual<F>
where
    F: Fn(f64) -> Result<f64, Error>,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok((self.f)(*param)?)
    }
}

/// Root of `f` in `[lo, hi]` by Brent's method.  `f(lo)` and `f(hi)` must not share a sign.
/// Stops once `|f|` is within `config.time_tolerance`.
pub(super) fn find_root<F>(
    f: F,
    lo: f64,
    hi: f64,
    config: &SimulationConfig,
) -> Result<f64, Error>
where
    F: Fn(f64) -> Result<f64, Error>,
{
    let tol = config.time_tolerance.get::<si::second>();
    let res = Executor::new(Residual { f }, BrentRoot::new(lo, hi, 1e-9))
        .configure(|state| state.max_iters(config.max_solver_iters).target_cost(tol))
        .run()
        .map_err(|err| match err.downcast::<Error>() {
            Ok(err) => err,
            Err(err) => Error::simulation(err),
        })?;
    let state = res.state();
    debug!(
        "root {:?} in [{lo}, {hi}] after {} iterations, residual {}",
        state.get_best_param(),
        state.get_iter(),
        state.get_best_cost()
    );
    state
        .get_best_param()
        .copied()
        .ok_or_else(|| Error::SimulationError(format!("no root found in [{lo}, {hi}]")))
}
