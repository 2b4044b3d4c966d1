use crate::imports::*;
use crate::track::GradePoint;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Davis-style running resistance `rolling·W + davis_b·v·W + drag_area·ρ·v²`
pub struct DavisResistance {
    /// Speed-independent resistance as a fraction of weight
    pub rolling: si::Ratio,
    /// Linear speed term as a fraction of weight per unit speed
    pub davis_b: si::InverseVelocity,
    /// Aerodynamic term, multiplied by air density and the square of speed
    pub drag_area: si::Area,
}

impl DavisResistance {
    pub fn force(&self, speed: si::Velocity, weight: si::Force) -> si::Force {
        let speed = speed.abs();
        self.rolling * weight
            + self.davis_b * speed * weight
            + self.drag_area * uc::rho_air() * speed * speed
    }

    /// d(force)/d(speed) in N·s/m
    pub fn derivative(&self, speed: si::Velocity, weight: si::Force) -> f64 {
        self.davis_b.get::<si::second_per_meter>() * weight.get::<si::newton>()
            + 2.0
                * self.drag_area.get::<si::square_meter>()
                * uc::rho_air().get::<si::kilogram_per_cubic_meter>()
                * speed.get::<si::meter_per_second>().abs()
    }

    pub(crate) fn valid() -> Self {
        Self {
            rolling: 0.0025 * uc::R,
            davis_b: 3.0e-5 * uc::SPM,
            drag_area: 8.0 * uc::M2,
        }
    }
}

impl ObjState for DavisResistance {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        si_chk_num_gez_fin(&mut errors, &self.rolling, "Rolling resistance");
        si_chk_num_gez_fin(&mut errors, &self.davis_b, "Davis b");
        si_chk_num_gez_fin(&mut errors, &self.drag_area, "Drag area");
        errors.make_err()
    }
}

/// Where the equivalent grade is sampled under the train
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainResMethod {
    /// Grade under the head
    Point,
    /// Grade averaged over the train length
    #[default]
    Strap,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Point {
    idx: usize,
}

impl Point {
    pub fn new(vals: &[GradePoint], offset: si::Length) -> anyhow::Result<Self> {
        Ok(Self {
            idx: vals.calc_idx(offset, 0, &Dir::Fwd)?,
        })
    }

    pub fn calc_grade(
        &mut self,
        vals: &[GradePoint],
        offset: si::Length,
        dir: &Dir,
    ) -> anyhow::Result<si::Ratio> {
        self.idx = vals.calc_idx(offset, self.idx, dir)?;
        Ok(vals[self.idx].grade)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Strap {
    idx_front: usize,
    idx_back: usize,
}

/// Tail offset, clipped to the path start
fn offset_back(vals: &[GradePoint], offset: si::Length, length: si::Length) -> si::Length {
    let first = vals.first().map(|v| v.offset).unwrap_or(si::Length::ZERO);
    (offset - length).max(first)
}

impl Strap {
    pub fn new(vals: &[GradePoint], offset: si::Length, length: si::Length) -> anyhow::Result<Self> {
        let idx_back = vals.calc_idx(offset_back(vals, offset, length), 0, &Dir::Fwd)?;
        Ok(Self {
            idx_back,
            idx_front: vals.calc_idx(offset, idx_back, &Dir::Fwd)?,
        })
    }

    pub fn calc_grade(
        &mut self,
        vals: &[GradePoint],
        offset: si::Length,
        length: si::Length,
        dir: &Dir,
    ) -> anyhow::Result<si::Ratio> {
        let back = offset_back(vals, offset, length);
        self.idx_front = vals.calc_idx(offset, self.idx_front, dir)?;
        self.idx_back = vals.calc_idx(back, self.idx_back, dir)?;
        if self.idx_front == self.idx_back || offset <= back {
            return Ok(vals[self.idx_front].grade);
        }
        Ok(vals.calc_grade_strap(self.idx_front, self.idx_back, offset, back))
    }
}

#[ext(CalcGradeStrap)]
impl [GradePoint] {
    /// Mean grade between `back` and `offset`, from the cumulative grade integrals
    fn calc_grade_strap(
        &self,
        idx_front: usize,
        idx_back: usize,
        offset: si::Length,
        back: si::Length,
    ) -> si::Ratio {
        debug_assert!(offset > back);
        (self[idx_front].grade_cum_at(offset) - self[idx_back].grade_cum_at(back))
            / (offset - back)
    }
}

/// Grade sampler along a path, caching its search position between calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeCursor {
    Point(Point),
    Strap(Strap),
}

impl GradeCursor {
    pub fn new(
        method: TrainResMethod,
        vals: &[GradePoint],
        offset: si::Length,
        length: si::Length,
    ) -> anyhow::Result<Self> {
        Ok(match method {
            TrainResMethod::Point => Self::Point(Point::new(vals, offset)?),
            TrainResMethod::Strap => Self::Strap(Strap::new(vals, offset, length)?),
        })
    }

    /// Equivalent grade for a train of `length` with its head at `offset`
    pub fn calc_grade(
        &mut self,
        vals: &[GradePoint],
        offset: si::Length,
        length: si::Length,
        dir: &Dir,
    ) -> anyhow::Result<si::Ratio> {
        match self {
            Self::Point(point) => point.calc_grade(vals, offset, dir),
            Self::Strap(strap) => strap.calc_grade(vals, offset, length, dir),
        }
    }
}

/// Grade sampled at every offset of a sorted grid
pub fn grades_on_grid(
    method: TrainResMethod,
    vals: &[GradePoint],
    grid: &[si::Length],
    length: si::Length,
) -> anyhow::Result<Vec<si::Ratio>> {
    if vals.is_empty() {
        return Ok(vec![si::Ratio::ZERO; grid.len()]);
    }
    let first = grid.first().copied().unwrap_or(si::Length::ZERO);
    let mut cursor = GradeCursor::new(method, vals, first, length)?;
    grid.iter()
        .map(|x| cursor.calc_grade(vals, *x, length, &Dir::Fwd))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat for 1 km, then 10 per-mille up to 2 km
    fn vals() -> Vec<GradePoint> {
        vec![
            GradePoint {
                offset: 0.0 * uc::M,
                grade: 0.0 * uc::R,
                grade_cum: 0.0 * uc::M,
            },
            GradePoint {
                offset: 1000.0 * uc::M,
                grade: 0.01 * uc::R,
                grade_cum: 0.0 * uc::M,
            },
            GradePoint {
                offset: 2000.0 * uc::M,
                grade: 0.01 * uc::R,
                grade_cum: 10.0 * uc::M,
            },
        ]
    }

    #[test]
    fn test_point_and_strap() {
        let vals = vals();
        let length = 400.0 * uc::M;
        let grid: Vec<si::Length> = [500.0, 1100.0, 1400.0, 2000.0]
            .iter()
            .map(|x| *x * uc::M)
            .collect();

        let point = grades_on_grid(TrainResMethod::Point, &vals, &grid, length).unwrap();
        assert_eq!(point[0], 0.0 * uc::R);
        assert_eq!(point[1], 0.01 * uc::R);

        let strap = grades_on_grid(TrainResMethod::Strap, &vals, &grid, length).unwrap();
        assert_eq!(strap[0], 0.0 * uc::R);
        // a quarter of the train is on the climb
        assert!(almost_eq(strap[1].get::<si::ratio>(), 0.0025, None));
        assert!(almost_eq(strap[2].get::<si::ratio>(), 0.01, None));
        assert!(almost_eq(strap[3].get::<si::ratio>(), 0.01, None));
    }

    #[test]
    fn test_strap_near_path_start() {
        let vals = vals();
        let mut strap = Strap::new(&vals, 0.0 * uc::M, 400.0 * uc::M).unwrap();
        assert_eq!(
            strap
                .calc_grade(&vals, 0.0 * uc::M, 400.0 * uc::M, &Dir::Fwd)
                .unwrap(),
            0.0 * uc::R
        );
    }

    #[test]
    fn test_resistance() {
        let res = DavisResistance::valid();
        let weight = 1.0e6 * uc::N;
        assert!(almost_eq_uom(
            &res.force(si::Velocity::ZERO, weight),
            &(2500.0 * uc::N),
            None
        ));
        let v = 50.0 * uc::MPS;
        let expected = 2500.0 + 3.0e-5 * 50.0 * 1.0e6 + 8.0 * 1.225 * 2500.0;
        assert!(almost_eq(res.force(v, weight).get::<si::newton>(), expected, None));
        assert!(almost_eq(
            res.derivative(v, weight),
            3.0e-5 * 1.0e6 + 2.0 * 8.0 * 1.225 * 50.0,
            None
        ));
    }
}
