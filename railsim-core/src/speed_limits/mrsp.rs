use super::etcs::*;
use crate::imports::*;
use crate::track::{SignalingSystem, TrainPath};
use crate::train::RollingStock;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Constant ceiling over `[begin, end)`
pub struct MrspSegment {
    pub begin: si::Length,
    pub end: si::Length,
    pub speed: si::Velocity,
}

/// Positions the signaling system requires the train to stop at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalingConstraints {
    /// Scheduled stops, as path offsets
    pub stops: Vec<si::Length>,
    /// Extra End of Authority positions, as path offsets
    pub end_of_authorities: Vec<si::Length>,
}

#[readonly::make]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Most restrictive speed profile: static envelope plus ETCS braking overlays
pub struct Mrsp {
    /// Contiguous over `[0, length]`, adjacent segments have different speeds
    pub segments: Vec<MrspSegment>,
    pub overlays: Vec<BrakingOverlay>,
    /// `(begin, end)` ranges where overlays apply
    pub etcs_ranges: Vec<(si::Length, si::Length)>,
    pub length: si::Length,
}

impl Init for Mrsp {}
impl SerdeAPI for Mrsp {}

impl Mrsp {
    /// Builds the profile of `path` for `rolling_stock` carrying `tag`.
    ///
    /// A limit applies while any part of the train is inside it, so each speed section is
    /// extended by the train length past its end.  On ETCS ranges, guidance braking curves
    /// protect every stop, End of Authority and the path end (EoA), and every drop of the
    /// static envelope (LoA).
    pub fn build(
        path: &TrainPath,
        rolling_stock: &RollingStock,
        tag: Option<&str>,
        constraints: &SignalingConstraints,
    ) -> Result<Self, Error> {
        let length = path.length;
        let train_length = rolling_stock.length;
        let limits: Vec<(si::Length, si::Length, si::Velocity)> = path
            .profiles
            .speed_sections
            .iter()
            .filter_map(|section| {
                section
                    .limit_for(tag)
                    .map(|v| (section.begin, (section.end + train_length).min(length), v))
            })
            .collect();
        let segments = envelope(&limits, rolling_stock.max_speed, length);

        let etcs_ranges: Vec<(si::Length, si::Length)> = path
            .profiles
            .signaling
            .iter()
            .filter(|s| s.system == SignalingSystem::Etcs)
            .map(|s| (s.begin, s.end))
            .collect();
        let in_etcs = |x: si::Length| etcs_ranges.iter().any(|(b, e)| *b <= x && x <= *e);

        let mut overlays = vec![];
        if !etcs_ranges.is_empty() {
            let params = rolling_stock.etcs_brake_params.ok_or_else(|| {
                Error::UnreachableConstraint(format!(
                    "path crosses ETCS sections but rolling stock `{}` has no ETCS braking \
                     parameters",
                    rolling_stock.name
                ))
            })?;
            let mut eoas: Vec<si::Length> = constraints
                .stops
                .iter()
                .chain(constraints.end_of_authorities.iter())
                .copied()
                .chain(std::iter::once(length))
                .filter(|x| in_etcs(*x))
                .collect();
            eoas.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
            eoas.dedup();
            for target in eoas {
                overlays.push(BrakingOverlay::new(
                    OverlayKind::Eoa,
                    target,
                    si::Velocity::ZERO,
                    params,
                )?);
            }
            for w in segments.windows(2) {
                if w[1].speed < w[0].speed && in_etcs(w[1].begin) {
                    overlays.push(BrakingOverlay::new(
                        OverlayKind::Loa,
                        w[1].begin,
                        w[1].speed,
                        params,
                    )?);
                }
            }
            debug!(
                "{} ETCS braking overlays over {} ranges",
                overlays.len(),
                etcs_ranges.len()
            );
        }

        Ok(Self {
            segments,
            overlays,
            etcs_ranges,
            length,
        })
    }

    /// Static ceiling at `offset`, taken from the segment starting at or before it
    pub fn static_at(&self, offset: si::Length) -> si::Velocity {
        let idx = self
            .segments
            .partition_point(|s| s.begin <= offset)
            .saturating_sub(1);
        self.segments
            .get(idx)
            .map(|s| s.speed)
            .unwrap_or(si::Velocity::ZERO)
    }

    /// Lowest braking overlay speed at `offset`, if any overlay applies there
    pub fn overlay_at(&self, offset: si::Length) -> Option<si::Velocity> {
        if !self
            .etcs_ranges
            .iter()
            .any(|(b, e)| *b <= offset && offset <= *e)
        {
            return None;
        }
        self.overlays
            .iter()
            .filter_map(|o| o.speed_at(offset))
            .reduce(si::Velocity::min)
    }

    /// Ceiling speed at `offset`: right-continuous static envelope capped by overlays
    pub fn at(&self, offset: si::Length) -> si::Velocity {
        let speed = self.static_at(offset);
        self.overlay_at(offset).map_or(speed, |o| o.min(speed))
    }

    /// Ceiling a train may have exactly at `offset`.  At a breakpoint this is the lower of the
    /// two adjacent segments.
    pub fn ceiling_at(&self, offset: si::Length) -> si::Velocity {
        let mut speed = self.at(offset);
        if let Some(prev) = self
            .segments
            .iter()
            .find(|s| s.end == offset && s.begin < offset)
        {
            speed = speed.min(prev.speed);
        }
        speed
    }

    /// Segment boundaries and overlay targets, sorted and unique
    pub fn breakpoints(&self) -> Vec<si::Length> {
        let mut points: Vec<si::Length> = self
            .segments
            .iter()
            .flat_map(|s| [s.begin, s.end])
            .chain(self.overlays.iter().map(|o| o.target))
            .collect();
        points.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        points.dedup();
        points
    }
}

/// Minimum over `limits` and `max_speed` at every point of `[0, length]`, merged into segments
fn envelope(
    limits: &[(si::Length, si::Length, si::Velocity)],
    max_speed: si::Velocity,
    length: si::Length,
) -> Vec<MrspSegment> {
    let mut bounds: Vec<si::Length> = limits
        .iter()
        .flat_map(|(b, e, _)| [*b, *e])
        .filter(|x| si::Length::ZERO < *x && *x < length)
        .collect();
    bounds.push(si::Length::ZERO);
    bounds.push(length);
    bounds.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    bounds.dedup();

    let mut segments: Vec<MrspSegment> = vec![];
    for w in bounds.windows(2) {
        let mid = (w[0] + w[1]) * 0.5;
        let speed = limits
            .iter()
            .filter(|(b, e, _)| *b <= mid && mid < *e)
            .map(|(_, _, v)| *v)
            .fold(max_speed, si::Velocity::min);
        match segments.last_mut() {
            Some(last) if last.speed == speed => last.end = w[1],
            _ => segments.push(MrspSegment {
                begin: w[0],
                end: w[1],
                speed,
            }),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::track::*;
    use crate::train::EtcsBrakeParams;
    use crate::utils::IdAllocator;

    /// 5 km straight path with a 20 m/s section over [1000, 2000] and a tagged 15 m/s override
    fn path(signaling: SignalingSystem) -> TrainPath {
        let mut builder = InfraBuilder::new("mrsp", IdAllocator::new("track"));
        let t0 = builder.add_track(5000.0 * uc::M);
        builder.add_speed_section(
            t0,
            SpeedSection {
                begin: 1000.0 * uc::M,
                end: 2000.0 * uc::M,
                speed_limit: Some(20.0 * uc::MPS),
                speed_limit_by_tag: HashMap::from([("slow".to_string(), 15.0 * uc::MPS)]),
            },
        );
        builder.set_signaling(t0, signaling);
        path_between(builder.build(), ("track.0", 0.0), ("track.0", 5000.0))
    }

    #[test]
    fn test_static_envelope_extends_by_train_length() {
        let rs = RollingStock::valid();
        let mrsp = Mrsp::build(
            &path(SignalingSystem::Bal),
            &rs,
            None,
            &SignalingConstraints::default(),
        )
        .unwrap();
        assert!(mrsp.overlays.is_empty());
        assert_eq!(mrsp.segments.len(), 3);
        assert_eq!(mrsp.static_at(999.0 * uc::M), rs.max_speed);
        assert_eq!(mrsp.static_at(1000.0 * uc::M), 20.0 * uc::MPS);
        // the 400 m train keeps the limit until its tail leaves the section
        assert_eq!(mrsp.static_at(2399.0 * uc::M), 20.0 * uc::MPS);
        assert_eq!(mrsp.static_at(2400.0 * uc::M), rs.max_speed);
        assert_eq!(mrsp.ceiling_at(2400.0 * uc::M), 20.0 * uc::MPS);
        assert_eq!(mrsp.ceiling_at(1000.0 * uc::M), 20.0 * uc::MPS);
        assert_eq!(mrsp.at(5000.0 * uc::M), rs.max_speed);
    }

    #[test]
    fn test_tag_override() {
        let rs = RollingStock::valid();
        let mrsp = Mrsp::build(
            &path(SignalingSystem::Bal),
            &rs,
            Some("slow"),
            &SignalingConstraints::default(),
        )
        .unwrap();
        assert_eq!(mrsp.at(1500.0 * uc::M), 15.0 * uc::MPS);
    }

    #[test]
    fn test_etcs_requires_params() {
        let rs = RollingStock::valid();
        assert!(matches!(
            Mrsp::build(
                &path(SignalingSystem::Etcs),
                &rs,
                None,
                &SignalingConstraints::default()
            ),
            Err(Error::UnreachableConstraint(_))
        ));
    }

    #[test]
    fn test_etcs_overlays() {
        let mut rs = RollingStock::valid();
        rs.etcs_brake_params = Some(EtcsBrakeParams::default());
        let constraints = SignalingConstraints {
            stops: vec![3500.0 * uc::M],
            ..Default::default()
        };
        let mrsp = Mrsp::build(&path(SignalingSystem::Etcs), &rs, None, &constraints).unwrap();
        let kinds: Vec<OverlayKind> = mrsp.overlays.iter().map(|o| o.kind).collect();
        assert_eq!(
            kinds,
            vec![OverlayKind::Eoa, OverlayKind::Eoa, OverlayKind::Loa]
        );
        assert_eq!(mrsp.at(3500.0 * uc::M), si::Velocity::ZERO);
        assert_eq!(mrsp.at(5000.0 * uc::M), si::Velocity::ZERO);
        // LoA: 20 m/s at 1000 m, from 80 m/s the curve starts well before
        let before = mrsp.at(900.0 * uc::M);
        assert!(before > 20.0 * uc::MPS && before < rs.max_speed);
        let v = mrsp.at(3400.0 * uc::M).get::<si::meter_per_second>();
        assert!(almost_eq(v, (2.0 * 0.6 * 100.0f64).sqrt(), None));
        assert!(mrsp.breakpoints().contains(&(3500.0 * uc::M)));
    }
}
