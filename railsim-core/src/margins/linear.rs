use super::solver::find_root;
use super::RangeProblem;
use crate::config::SimulationConfig;
use crate::imports::*;

/// Scales the speeds of the range by the factor giving the target running time
pub(super) fn solve(range: &RangeProblem, config: &SimulationConfig) -> Result<Vec<f64>, Error> {
    let run = |k: f64| range.run_capped(|i| k * range.speeds[i]);
    let residual = |k: f64| -> Result<f64, Error> { Ok(range.time(&run(k)?)? - range.target) };

    let k_min = config.mareco_min_speed.get::<si::meter_per_second>() / range.max_speed();
    let mut lo = 0.5;
    while residual(lo)? < 0.0 {
        if lo <= k_min {
            return Err(range.infeasible(&format!(
                "speeds scaled by {lo} are still too fast"
            )));
        }
        lo = (lo * 0.5).max(k_min);
    }
    let k = find_root(residual, lo, 1.0, config)?;
    debug!("linear allowance factor {k}");
    run(k)
}
