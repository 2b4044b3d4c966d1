use crate::imports::*;
use crate::train::EtcsBrakeParams;

/// What an ETCS braking overlay protects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IsVariant)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverlayKind {
    /// End of Authority: the train must be stopped at the target
    Eoa,
    /// Limit of Authority: the train must be at or below the lower limit at the target
    Loa,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Guidance braking curve ending at `target` with `target_speed`
pub struct BrakingOverlay {
    pub kind: OverlayKind,
    pub target: si::Length,
    pub target_speed: si::Velocity,
    pub params: EtcsBrakeParams,
}

impl BrakingOverlay {
    pub fn new(
        kind: OverlayKind,
        target: si::Length,
        target_speed: si::Velocity,
        params: EtcsBrakeParams,
    ) -> Result<Self, Error> {
        if params.decel_above <= si::Acceleration::ZERO
            || params.decel_below <= si::Acceleration::ZERO
        {
            return Err(Error::UnreachableConstraint(format!(
                "ETCS guidance deceleration must be positive to protect {kind:?} at {} m",
                target.get::<si::meter>()
            )));
        }
        Ok(Self {
            kind,
            target,
            target_speed,
            params,
        })
    }

    /// Highest speed at `offset` from which guidance braking reaches the target speed at the
    /// target, or `None` past the target
    pub fn speed_at(&self, offset: si::Length) -> Option<si::Velocity> {
        if offset > self.target {
            return None;
        }
        let dist = (self.target - offset).get::<si::meter>();
        let vt = self.target_speed.get::<si::meter_per_second>();
        let vth = self.params.guidance_threshold.get::<si::meter_per_second>();
        let a_below = self.params.decel_below.get::<si::meter_per_second_squared>();
        let a_above = self.params.decel_above.get::<si::meter_per_second_squared>();
        let speed = if vt >= vth {
            (vt * vt + 2.0 * a_above * dist).sqrt()
        } else {
            let dist_below = (vth * vth - vt * vt) / (2.0 * a_below);
            if dist <= dist_below {
                (vt * vt + 2.0 * a_below * dist).sqrt()
            } else {
                (vth * vth + 2.0 * a_above * (dist - dist_below)).sqrt()
            }
        };
        Some(speed * uc::MPS)
    }

    /// Distance before the target at which the curve crosses `speed`
    pub fn distance_from(&self, speed: si::Velocity) -> si::Length {
        let v = speed.get::<si::meter_per_second>();
        let vt = self.target_speed.get::<si::meter_per_second>();
        if v <= vt {
            return si::Length::ZERO;
        }
        let vth = self.params.guidance_threshold.get::<si::meter_per_second>();
        let a_below = self.params.decel_below.get::<si::meter_per_second_squared>();
        let a_above = self.params.decel_above.get::<si::meter_per_second_squared>();
        let dist = if vt >= vth {
            (v * v - vt * vt) / (2.0 * a_above)
        } else if v <= vth {
            (v * v - vt * vt) / (2.0 * a_below)
        } else {
            (vth * vth - vt * vt) / (2.0 * a_below) + (v * v - vth * vth) / (2.0 * a_above)
        };
        dist * uc::M
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eoa(target: f64) -> BrakingOverlay {
        BrakingOverlay::new(
            OverlayKind::Eoa,
            target * uc::M,
            si::Velocity::ZERO,
            EtcsBrakeParams::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_two_slope_curve() {
        let overlay = eoa(10_000.0);
        assert_eq!(overlay.speed_at(10_000.0 * uc::M), Some(si::Velocity::ZERO));
        assert_eq!(overlay.speed_at(10_001.0 * uc::M), None);
        // below the threshold the curve follows 0.6 m/s2
        let v = overlay.speed_at(9_700.0 * uc::M).unwrap();
        assert!(almost_eq(
            v.get::<si::meter_per_second>(),
            (2.0 * 0.6 * 300.0f64).sqrt(),
            None
        ));
        // the threshold is crossed where braking at 0.6 m/s2 from 61.11 m/s ends
        let d_th = 61.11f64.powi(2) / 1.2;
        let at_th = overlay.speed_at(10_000.0 * uc::M - d_th * uc::M).unwrap();
        assert!(almost_eq(at_th.get::<si::meter_per_second>(), 61.11, None));
        // above it the slope is 0.35 m/s2
        let v = overlay
            .speed_at(10_000.0 * uc::M - (d_th + 1000.0) * uc::M)
            .unwrap();
        assert!(almost_eq(
            v.get::<si::meter_per_second>(),
            (61.11f64.powi(2) + 0.7 * 1000.0).sqrt(),
            None
        ));
    }

    #[test]
    fn test_distance_is_inverse_of_speed() {
        let overlay = eoa(10_000.0);
        for v in [20.0, 61.11, 75.0] {
            let d = overlay.distance_from(v * uc::MPS);
            let back = overlay.speed_at(10_000.0 * uc::M - d).unwrap();
            assert!(almost_eq(back.get::<si::meter_per_second>(), v, None));
        }
    }

    #[test]
    fn test_non_positive_decel_is_unreachable() {
        let params = EtcsBrakeParams {
            decel_below: si::Acceleration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            BrakingOverlay::new(OverlayKind::Eoa, uc::M, si::Velocity::ZERO, params),
            Err(Error::UnreachableConstraint(_))
        ));
    }
}
