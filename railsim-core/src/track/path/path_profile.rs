use super::train_path::TrackRange;
use crate::imports::*;
use crate::track::infra::Infra;
use crate::track::topology::Direction;
use crate::track::track_section::SignalingSystem;
use crate::track::zone::ZoneKey;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Gradient in per-mille over `[begin, end)` of the path, positive uphill in travel direction
pub struct PathSlope {
    pub begin: si::Length,
    pub end: si::Length,
    pub gradient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathCurve {
    pub begin: si::Length,
    pub end: si::Length,
    /// Zero means straight track
    pub radius: si::Length,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSpeedSection {
    pub begin: si::Length,
    pub end: si::Length,
    pub speed_limit: Option<si::Velocity>,
    pub speed_limit_by_tag: HashMap<String, si::Velocity>,
}

impl PathSpeedSection {
    pub fn limit_for(&self, tag: Option<&str>) -> Option<si::Velocity> {
        tag.and_then(|tag| self.speed_limit_by_tag.get(tag).copied())
            .or(self.speed_limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathSignaling {
    pub begin: si::Length,
    pub end: si::Length,
    pub system: SignalingSystem,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Zone crossed by the path over `[begin, end]`
pub struct PathZone {
    pub begin: si::Length,
    pub end: si::Length,
    pub key: ZoneKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathOperationalPoint {
    pub id: String,
    pub offset: si::Length,
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Serialize, Deserialize)]
/// Equivalent grade (slope plus curve) starting at `offset` along the path
pub struct GradePoint {
    pub offset: si::Length,
    /// Non-dimensional equivalent grade
    pub grade: si::Ratio,
    /// Integral of `grade` over distance from the path start up to `offset`
    pub grade_cum: si::Length,
}

impl GradePoint {
    /// Integral of the grade from the path start up to `offset`
    pub fn grade_cum_at(&self, offset: si::Length) -> si::Length {
        self.grade_cum + self.grade * (offset - self.offset)
    }
}

impl GetOffset for GradePoint {
    fn get_offset(&self) -> si::Length {
        self.offset
    }
}

impl ObjState for [GradePoint] {
    fn is_fake(&self) -> bool {
        self.is_empty()
    }

    fn validate(&self) -> ValidationResults {
        early_fake_ok!(self);
        let mut errors = ValidationErrors::new();
        if self.len() < 2 {
            errors.push(anyhow!("There must be at least two grade points!"));
        }
        if !self.windows(2).all(|w| w[0].offset < w[1].offset) {
            errors.push(anyhow!("Offsets must be sorted and unique!"));
        }
        if !self.windows(2).all(|w| {
            almost_eq_uom(&w[0].grade_cum_at(w[1].offset), &w[1].grade_cum, None)
        }) {
            errors.push(anyhow!(
                "Cumulative grade must equal the integral of grade over offset!"
            ));
        }
        errors.make_err()
    }
}

/// Profiles of a path, each covering `[0, length]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathProfiles {
    /// Contiguous, starts at 0 and ends at the path length
    pub slopes: Vec<PathSlope>,
    /// Contiguous, starts at 0 and ends at the path length
    pub curves: Vec<PathCurve>,
    /// One point per slope/curve change plus a final point at the path length
    pub grades: Vec<GradePoint>,
    /// Possibly overlapping
    pub speed_sections: Vec<PathSpeedSection>,
    pub signaling: Vec<PathSignaling>,
    pub zones: Vec<PathZone>,
    /// Operational point parts crossed by the path, by offset
    pub operational_points: Vec<PathOperationalPoint>,
}

/// Path interval covered by track interval `[a, b]` of `range`, which starts at path offset
/// `start`
fn to_path(
    range: &TrackRange,
    start: si::Length,
    a: si::Length,
    b: si::Length,
) -> Option<(si::Length, si::Length)> {
    let a = a.max(range.begin);
    let b = b.min(range.end);
    if a >= b {
        return None;
    }
    Some(match range.direction {
        Direction::StartToStop => (start + a - range.begin, start + b - range.begin),
        Direction::StopToStart => (start + range.end - b, start + range.end - a),
    })
}

/// Sorts `items` and fills the gaps of `[0, length]` with `default`, merging equal neighbors
fn fill_contiguous<T: Copy + PartialEq>(
    mut items: Vec<(si::Length, si::Length, T)>,
    length: si::Length,
    default: T,
) -> Vec<(si::Length, si::Length, T)> {
    items.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let mut out: Vec<(si::Length, si::Length, T)> = vec![];
    let push = |out: &mut Vec<(si::Length, si::Length, T)>,
                begin: si::Length,
                end: si::Length,
                val: T| {
        if end <= begin {
            return;
        }
        match out.last_mut() {
            Some(last) if last.2 == val && last.1 == begin => last.1 = end,
            _ => out.push((begin, end, val)),
        }
    };
    let mut cursor = si::Length::ZERO;
    for (begin, end, val) in items {
        if begin > cursor {
            push(&mut out, cursor, begin, default);
            cursor = begin;
        }
        push(&mut out, cursor, end.min(length), val);
        cursor = cursor.max(end);
    }
    push(&mut out, cursor, length, default);
    out
}

impl PathProfiles {
    pub(crate) fn build(infra: &Infra, ranges: &[TrackRange], length: si::Length) -> Self {
        let mut slopes = vec![];
        let mut curves = vec![];
        let mut speed_sections = vec![];
        let mut signaling = vec![];
        let mut zones = vec![];
        let mut operational_points = vec![];

        let mut start = si::Length::ZERO;
        for range in ranges {
            let Some(track) = infra.track(range.track) else {
                continue;
            };
            let sign = match range.direction {
                Direction::StartToStop => 1.0,
                Direction::StopToStart => -1.0,
            };
            for slope in &track.slopes {
                if let Some((a, b)) = to_path(range, start, slope.begin, slope.end) {
                    slopes.push((a, b, sign * slope.gradient));
                }
            }
            for curve in &track.curves {
                if let Some((a, b)) = to_path(range, start, curve.begin, curve.end) {
                    curves.push((a, b, curve.radius));
                }
            }
            for section in &track.speed_sections {
                if let Some((begin, end)) = to_path(range, start, section.begin, section.end) {
                    speed_sections.push(PathSpeedSection {
                        begin,
                        end,
                        speed_limit: section.speed_limit,
                        speed_limit_by_tag: section.speed_limit_by_tag.clone(),
                    });
                }
            }
            signaling.push((start, start + range.length(), track.signaling));

            let mut bounds = vec![range.begin];
            bounds.extend(
                track
                    .zone_boundaries()
                    .into_iter()
                    .filter(|b| range.begin < *b && *b < range.end),
            );
            bounds.push(range.end);
            for w in bounds.windows(2) {
                if let Some((begin, end)) = to_path(range, start, w[0], w[1]) {
                    zones.push(PathZone {
                        begin,
                        end,
                        key: ZoneKey::new(range.track, track.zone_at(w[0]) as u32),
                    });
                }
            }

            for part in &track.operational_points {
                if range.contains(part.position) {
                    operational_points.push(PathOperationalPoint {
                        id: part.operational_point.clone(),
                        offset: start + range.dist_from_entry(part.position),
                    });
                }
            }
            start += range.length();
        }
        zones.sort_by(|a, b| a.begin.partial_cmp(&b.begin).unwrap_or(Ordering::Equal));
        operational_points
            .sort_by(|a, b| a.offset.partial_cmp(&b.offset).unwrap_or(Ordering::Equal));

        let slopes: Vec<PathSlope> = fill_contiguous(slopes, length, 0.0)
            .into_iter()
            .map(|(begin, end, gradient)| PathSlope {
                begin,
                end,
                gradient,
            })
            .collect();
        let curves: Vec<PathCurve> = fill_contiguous(curves, length, si::Length::ZERO)
            .into_iter()
            .map(|(begin, end, radius)| PathCurve { begin, end, radius })
            .collect();
        let signaling = fill_contiguous(signaling, length, SignalingSystem::default())
            .into_iter()
            .map(|(begin, end, system)| PathSignaling { begin, end, system })
            .collect();
        let grades = grade_points(&slopes, &curves, length);

        Self {
            slopes,
            curves,
            grades,
            speed_sections,
            signaling,
            zones,
            operational_points,
        }
    }

    /// Whether any part of the path runs under `system`
    pub fn has_signaling(&self, system: SignalingSystem) -> bool {
        self.signaling.iter().any(|s| s.system == system)
    }

    /// Signaling system in effect at `offset`
    pub fn signaling_at(&self, offset: si::Length) -> SignalingSystem {
        self.signaling
            .iter()
            .find(|s| s.begin <= offset && offset < s.end)
            .or(self.signaling.last())
            .map(|s| s.system)
            .unwrap_or_default()
    }
}

/// Equivalent gradient in per-mille added by a curve of `radius`
pub fn curve_gradient(radius: si::Length) -> f64 {
    let radius = radius.get::<si::meter>().abs();
    if radius > 0.0 {
        800.0 / radius
    } else {
        0.0
    }
}

/// Merges slopes and curves into cumulative grade points
fn grade_points(slopes: &[PathSlope], curves: &[PathCurve], length: si::Length) -> Vec<GradePoint> {
    let mut offsets: Vec<si::Length> = slopes
        .iter()
        .map(|s| s.begin)
        .chain(curves.iter().map(|c| c.begin))
        .collect();
    offsets.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    offsets.dedup();

    let gradient_at = |offset: si::Length| {
        let slope = slopes
            .iter()
            .find(|s| s.begin <= offset && offset < s.end)
            .map(|s| s.gradient)
            .unwrap_or_default();
        let curve = curves
            .iter()
            .find(|c| c.begin <= offset && offset < c.end)
            .map(|c| curve_gradient(c.radius))
            .unwrap_or_default();
        (slope + curve) / 1000.0
    };

    let mut grades: Vec<GradePoint> = Vec::with_capacity(offsets.len() + 1);
    for offset in offsets.into_iter().filter(|o| *o < length) {
        let grade_cum = grades
            .last()
            .map(|g| g.grade_cum_at(offset))
            .unwrap_or(si::Length::ZERO);
        grades.push(GradePoint {
            offset,
            grade: gradient_at(offset) * uc::R,
            grade_cum,
        });
    }
    if let Some(last) = grades.last().copied() {
        grades.push(GradePoint {
            offset: length,
            grade: last.grade,
            grade_cum: last.grade_cum_at(length),
        });
    }
    grades
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::builder::InfraBuilder;
    use crate::track::path::{PathLocation, TrainPath};
    use crate::track::track_section::SpeedSection;
    use crate::utils::IdAllocator;

    /// Two 1 km tracks, each with a slope and a curve, travelled in reverse
    fn reverse_path() -> TrainPath {
        let mut builder = InfraBuilder::new("profiles", IdAllocator::new("track"));
        let t0 = builder.add_track(1000.0 * uc::M);
        let t1 = builder.add_track(1000.0 * uc::M);
        builder.chain(&[t0, t1]);
        builder.add_slope(t0, 200.0 * uc::M, 400.0 * uc::M, 10.0);
        builder.add_slope(t1, 0.0 * uc::M, 1000.0 * uc::M, -5.0);
        builder.add_curve(t1, 500.0 * uc::M, 600.0 * uc::M, 800.0 * uc::M);
        builder.add_detector(t0, 500.0 * uc::M);
        builder.add_speed_section(
            t0,
            SpeedSection {
                begin: 0.0 * uc::M,
                end: 100.0 * uc::M,
                speed_limit: Some(10.0 * uc::MPS),
                ..Default::default()
            },
        );
        builder.set_signaling(t0, SignalingSystem::Etcs);
        builder.add_operational_point("op", None, &[(t0, 250.0 * uc::M)]);
        let infra = Infra::load(builder.build()).unwrap();
        let locs = [
            PathLocation::new(
                "from",
                vec![infra.resolve_location("track.1", 1000.0 * uc::M).unwrap()],
            ),
            PathLocation::new(
                "to",
                vec![infra.resolve_location("track.0", 0.0 * uc::M).unwrap()],
            ),
        ];
        TrainPath::find(&infra, &locs).unwrap()
    }

    fn meters(x: si::Length) -> f64 {
        x.get::<si::meter>()
    }

    #[test]
    fn test_slopes_are_contiguous_and_mirrored() {
        let path = reverse_path();
        let slopes = &path.profiles.slopes;
        assert_eq!(meters(slopes[0].begin), 0.0);
        assert!(slopes.windows(2).all(|w| w[0].end == w[1].begin));
        assert_eq!(slopes.last().unwrap().end, path.length);
        // track.1 travelled backward: -5 becomes +5
        assert_eq!(slopes[0].gradient, 5.0);
        assert_eq!(meters(slopes[0].end), 1000.0);
        // track.0 slope [200, 400] maps to [1600, 1800] and flips sign
        let climb = slopes.iter().find(|s| s.gradient == -10.0).unwrap();
        assert_eq!((meters(climb.begin), meters(climb.end)), (1600.0, 1800.0));
    }

    #[test]
    fn test_curves_and_grades() {
        let path = reverse_path();
        let curves = &path.profiles.curves;
        assert!(curves.windows(2).all(|w| w[0].end == w[1].begin));
        let curve = curves
            .iter()
            .find(|c| c.radius > si::Length::ZERO)
            .unwrap();
        assert_eq!((meters(curve.begin), meters(curve.end)), (400.0, 500.0));

        let grades = &path.profiles.grades;
        assert!(grades.as_slice().validate().is_ok());
        // 5 per-mille slope plus 1 per-mille of curve
        let in_curve = grades.iter().find(|g| meters(g.offset) == 400.0).unwrap();
        assert!(almost_eq(in_curve.grade.get::<si::ratio>(), 0.006, None));
        assert_eq!(grades.last().unwrap().offset, path.length);
    }

    #[test]
    fn test_zones_signaling_and_ops() {
        let path = reverse_path();
        let zones = &path.profiles.zones;
        assert_eq!(zones.len(), 3);
        assert_eq!(meters(zones[1].begin), 1000.0);
        assert_eq!(meters(zones[1].end), 1500.0);
        assert_eq!(zones[1].key.zone, 1);
        assert_eq!(zones[2].key.zone, 0);

        assert_eq!(path.profiles.signaling_at(500.0 * uc::M), SignalingSystem::Bal);
        assert_eq!(path.profiles.signaling_at(1500.0 * uc::M), SignalingSystem::Etcs);
        assert!(path.profiles.has_signaling(SignalingSystem::Etcs));

        assert_eq!(path.profiles.operational_points.len(), 1);
        assert_eq!(meters(path.profiles.operational_points[0].offset), 1750.0);

        let section = &path.profiles.speed_sections[0];
        assert_eq!((meters(section.begin), meters(section.end)), (1900.0, 2000.0));
    }

    #[test]
    fn test_fill_contiguous() {
        let filled = fill_contiguous(
            vec![(2.0 * uc::M, 4.0 * uc::M, 1), (4.0 * uc::M, 5.0 * uc::M, 1)],
            10.0 * uc::M,
            0,
        );
        let vals: Vec<(f64, f64, i32)> = filled
            .into_iter()
            .map(|(a, b, v)| (meters(a), meters(b), v))
            .collect();
        assert_eq!(vals, vec![(0.0, 2.0, 0), (2.0, 5.0, 1), (5.0, 10.0, 0)]);
    }
}
