use super::train_res::DavisResistance;
use crate::imports::*;

/// Comfort mode of a run.  Modes missing from a rolling stock fall back to `Standard`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comfort {
    #[default]
    Standard,
    AirConditioning,
    Heating,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
/// Maximum tractive effort as a function of speed, linearly interpolated
pub struct EffortCurve {
    pub speeds: Vec<si::Velocity>,
    pub max_efforts: Vec<si::Force>,
}

impl EffortCurve {
    pub fn effort_at(&self, speed: si::Velocity) -> anyhow::Result<si::Force> {
        let x: Vec<f64> = self
            .speeds
            .iter()
            .map(|v| v.get::<si::meter_per_second>())
            .collect();
        let y: Vec<f64> = self.max_efforts.iter().map(|f| f.get::<si::newton>()).collect();
        Ok(interp1d(speed.get::<si::meter_per_second>(), &x, &y)
            .with_context(|| format_dbg!())?
            * uc::N)
    }
}

impl ObjState for EffortCurve {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        if self.speeds.is_empty() {
            errors.push(anyhow!("Effort curve must not be empty!"));
        }
        if self.speeds.len() != self.max_efforts.len() {
            errors.push(anyhow!(
                "Effort curve has {} speeds but {} efforts!",
                self.speeds.len(),
                self.max_efforts.len()
            ));
        }
        if !self.speeds.windows(2).all(|w| w[0] < w[1]) {
            errors.push(anyhow!("Effort curve speeds must be strictly increasing!"));
        }
        for effort in &self.max_efforts {
            si_chk_num_gez_fin(&mut errors, effort, "Max effort");
        }
        errors.make_err()
    }
}

/// How `gamma` turns into a deceleration
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GammaType {
    /// `gamma` is the deceleration, whatever the gradient
    #[default]
    Const,
    /// `gamma` times inertia is the braking force; gradient and resistance add to it
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Two-slope guidance deceleration used for ETCS braking curves
pub struct EtcsBrakeParams {
    /// Speed above which `decel_above` applies
    pub guidance_threshold: si::Velocity,
    pub decel_above: si::Acceleration,
    pub decel_below: si::Acceleration,
}

impl Default for EtcsBrakeParams {
    fn default() -> Self {
        Self {
            guidance_threshold: 61.11 * uc::MPS,
            decel_above: 0.35 * uc::MPS2,
            decel_below: 0.6 * uc::MPS2,
        }
    }
}

impl EtcsBrakeParams {
    pub fn decel_at(&self, speed: si::Velocity) -> si::Acceleration {
        if speed > self.guidance_threshold {
            self.decel_above
        } else {
            self.decel_below
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, SerdeAPI)]
/// Physical characteristics of a train
pub struct RollingStock {
    pub name: String,
    pub mass: si::Mass,
    /// Rotating-mass factor applied to `mass` for acceleration
    #[serde(default = "RollingStock::default_inertia_coefficient")]
    pub inertia_coefficient: f64,
    pub length: si::Length,
    pub max_speed: si::Velocity,
    pub resistance: DavisResistance,
    /// Tractive effort curves by comfort mode; `STANDARD` is required
    pub effort_curves: HashMap<Comfort, EffortCurve>,
    /// Service braking rate, see [GammaType]
    pub gamma: si::Acceleration,
    #[serde(default)]
    pub gamma_type: GammaType,
    /// Cap on acceleration for passenger comfort
    #[serde(default)]
    pub comfort_acceleration: Option<si::Acceleration>,
    #[serde(default)]
    pub etcs_brake_params: Option<EtcsBrakeParams>,
    /// Effort ratios by power restriction code
    #[serde(default)]
    pub power_restrictions: HashMap<String, si::Ratio>,
}

impl RollingStock {
    fn default_inertia_coefficient() -> f64 {
        1.05
    }

    /// Mass including rotating inertia
    pub fn inertia(&self) -> si::Mass {
        self.mass * self.inertia_coefficient
    }

    pub fn weight(&self) -> si::Force {
        self.mass * uc::ACC_GRAV
    }

    pub fn effort_curve(&self, comfort: Comfort) -> anyhow::Result<&EffortCurve> {
        self.effort_curves
            .get(&comfort)
            .or_else(|| self.effort_curves.get(&Comfort::Standard))
            .with_context(|| format!("Rolling stock `{}` has no STANDARD effort curve", self.name))
    }

    /// Running resistance at `speed`, always opposing motion
    pub fn resistance_at(&self, speed: si::Velocity) -> si::Force {
        self.resistance.force(speed, self.weight())
    }

    /// Derivative of running resistance with respect to speed, in N·s/m
    pub fn resistance_derivative(&self, speed: si::Velocity) -> f64 {
        self.resistance.derivative(speed, self.weight())
    }

    /// Gravity component along the track for equivalent grade `grade`.  Negative uphill.
    pub fn grade_force(&self, grade: si::Ratio) -> si::Force {
        -self.weight() * grade.get::<si::ratio>().atan().sin()
    }

    /// Deceleration available when braking at `speed` on equivalent grade `grade`
    pub fn braking_decel(&self, speed: si::Velocity, grade: si::Ratio) -> si::Acceleration {
        match self.gamma_type {
            GammaType::Const => self.gamma,
            GammaType::Max => {
                self.gamma + (self.resistance_at(speed) - self.grade_force(grade)) / self.inertia()
            }
        }
    }

    /// Effort ratio of power restriction `code`, if the rolling stock knows it
    pub fn power_restriction(&self, code: &str) -> Option<si::Ratio> {
        self.power_restrictions.get(code).copied()
    }
}

impl Init for RollingStock {
    fn init(&mut self) -> Result<(), Error> {
        self.validate().map_err(|err| {
            Error::InitError(format!("rolling stock `{}`:\n{err}", self.name))
        })
    }
}

impl ObjState for RollingStock {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        si_chk_num_gtz_fin(&mut errors, &self.mass, "Mass");
        si_chk_num_gtz_fin(&mut errors, &self.length, "Length");
        si_chk_num_gtz_fin(&mut errors, &self.max_speed, "Max speed");
        si_chk_num_gtz_fin(&mut errors, &self.gamma, "Gamma");
        if !(self.inertia_coefficient.is_finite() && self.inertia_coefficient >= 1.0) {
            errors.push(anyhow!(
                "Inertia coefficient = {} must be at least 1!",
                self.inertia_coefficient
            ));
        }
        if let Some(acc) = &self.comfort_acceleration {
            si_chk_num_gtz_fin(&mut errors, acc, "Comfort acceleration");
        }
        if let Some(etcs) = &self.etcs_brake_params {
            si_chk_num_gtz_fin(&mut errors, &etcs.decel_above, "ETCS decel above");
            si_chk_num_gtz_fin(&mut errors, &etcs.decel_below, "ETCS decel below");
        }
        validate_field_real(&mut errors, &self.resistance, "Resistance");
        if !self.effort_curves.contains_key(&Comfort::Standard) {
            errors.push(anyhow!("A STANDARD effort curve is required!"));
        }
        for (comfort, curve) in &self.effort_curves {
            validate_field_real(&mut errors, curve, &format!("{comfort:?} effort curve"));
        }
        for (code, ratio) in &self.power_restrictions {
            if !(0.0 < ratio.get::<si::ratio>() && ratio.get::<si::ratio>() <= 1.0) {
                errors.push(anyhow!(
                    "Power restriction `{code}` ratio must be in (0, 1]!"
                ));
            }
        }
        errors.make_err()
    }
}

impl Valid for RollingStock {
    /// 400 t, 400 m long, 80 m/s passenger train with a 300 kN / 5 MW effort curve
    fn valid() -> Self {
        let speeds = [0.0, 10.0, 20.0, 40.0, 60.0, 80.0];
        let efforts = [300.0, 300.0, 250.0, 125.0, 83.3, 62.5];
        Self {
            name: "valid".into(),
            mass: 400.0 * uc::TONNE,
            inertia_coefficient: Self::default_inertia_coefficient(),
            length: 400.0 * uc::M,
            max_speed: 80.0 * uc::MPS,
            resistance: DavisResistance::valid(),
            effort_curves: HashMap::from([(
                Comfort::Standard,
                EffortCurve {
                    speeds: speeds.iter().map(|v| *v * uc::MPS).collect(),
                    max_efforts: efforts.iter().map(|f| *f * uc::KN).collect(),
                },
            )]),
            gamma: 0.5 * uc::MPS2,
            gamma_type: GammaType::Const,
            comfort_acceleration: None,
            etcs_brake_params: None,
            power_restrictions: HashMap::from([("C1".to_string(), 0.5 * uc::R)]),
        }
    }
}
