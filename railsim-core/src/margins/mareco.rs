use super::solver::find_root;
use super::RangeProblem;
use crate::config::SimulationConfig;
use crate::imports::*;
use crate::physics::PhysicsContext;
use crate::train::RollingStock;

/// Speed at which coasting should hand over to braking for a cruising speed `v1`:
/// `vf = wle·v1 / (wle + R(v1)·v1)` with `wle = v1²·R'(v1)`
pub fn coasting_end_speed(rolling_stock: &RollingStock, v1: si::Velocity) -> si::Velocity {
    let v = v1.get::<si::meter_per_second>();
    let wle = v * v * rolling_stock.resistance_derivative(v1);
    let r = rolling_stock.resistance_at(v1).get::<si::newton>();
    if wle + r * v <= 0.0 {
        return si::Velocity::ZERO;
    }
    (wle * v / (wle + r * v)) * uc::MPS
}

/// Caps the range at the cruising speed giving the target running time, coasting before every
/// braking phase.  Falls back to capping alone when coasting by itself already overshoots the
/// target.
pub(super) fn solve(range: &RangeProblem, config: &SimulationConfig) -> Result<Vec<f64>, Error> {
    let v_lo = config.mareco_min_speed.get::<si::meter_per_second>();
    let v_hi = range.max_speed();
    if v_hi <= v_lo {
        return Err(range.infeasible(&format!("range is already below {v_lo} m/s")));
    }
    let capped = |v1: f64| range.run_capped(|_| v1);
    let coasting = |v1: f64| -> Result<Vec<f64>, Error> {
        let mut speeds = capped(v1)?;
        add_coasting(range, &mut speeds, v1);
        Ok(speeds)
    };
    let residual_capped =
        |v1: f64| -> Result<f64, Error> { Ok(range.time(&capped(v1)?)? - range.target) };
    let residual_coasting =
        |v1: f64| -> Result<f64, Error> { Ok(range.time(&coasting(v1)?)? - range.target) };

    if residual_capped(v_lo)? < 0.0 {
        return Err(range.infeasible(&format!("capping at {v_lo} m/s is still too fast")));
    }
    if residual_coasting(v_hi)? > 0.0 {
        warn!(
            "coasting alone overshoots the target running time of {:.1} s, capping only",
            range.target
        );
        let v1 = find_root(residual_capped, v_lo, v_hi, config)?;
        return capped(v1);
    }
    let v1 = find_root(residual_coasting, v_lo, v_hi, config)?;
    debug!(
        "MARECO cruising speed {v1} m/s, coasting down to {} m/s",
        coasting_end_speed(range.ctx.rolling_stock, v1 * uc::MPS).get::<si::meter_per_second>()
    );
    coasting(v1)
}

/// Replaces the run-up to every braking phase of the range with a coasting curve
fn add_coasting(range: &RangeProblem, speeds: &mut [f64], v1: f64) {
    let ctx = range.ctx;
    let vf = coasting_end_speed(ctx.rolling_stock, v1 * uc::MPS).get::<si::meter_per_second>();
    let is_braking =
        |speeds: &[f64], i: usize| speeds[i + 1] < speeds[i] && ctx.segment_force(speeds, i) < 0.0;
    let mut i = range.begin;
    while i < range.end {
        if !is_braking(speeds, i) {
            i += 1;
            continue;
        }
        let start = i;
        while i < range.end && is_braking(speeds, i) {
            i += 1;
        }
        let from = (start..=i).find(|j| speeds[*j] <= vf).unwrap_or(i);
        coast_into(ctx, speeds, range.begin, from);
    }
}

/// Coasts backward from grid index `from` until the curve meets `speeds`.  Leaves `speeds`
/// untouched if the curve never meets it after `begin`.
fn coast_into(ctx: &PhysicsContext, speeds: &mut [f64], begin: usize, from: usize) {
    let mut curve = vec![];
    let mut v = speeds[from];
    for i in (begin..from).rev() {
        let Some(prev) = ctx.coast_back(v, i) else {
            return;
        };
        if prev >= speeds[i] {
            for (j, v) in curve {
                speeds[j] = v;
            }
            return;
        }
        curve.push((i, prev));
        v = prev;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coasting_end_speed() {
        let rs = RollingStock::valid();
        let v1 = 30.0 * uc::MPS;
        let vf = coasting_end_speed(&rs, v1);
        assert!(vf > si::Velocity::ZERO && vf < v1);
        // wle = v1² R'(v1), vf = wle v1 / (wle + R v1)
        let r_prime = rs.resistance_derivative(v1);
        let wle = 900.0 * r_prime;
        let r = rs.resistance_at(v1).get::<si::newton>();
        assert!(almost_eq(
            vf.get::<si::meter_per_second>(),
            wle * 30.0 / (wle + r * 30.0),
            None
        ));
        // a faster cruise hands over to braking later
        assert!(coasting_end_speed(&rs, 40.0 * uc::MPS) > vf);
    }
}
