use super::path_profile::*;
use crate::imports::*;
use crate::track::infra::{Infra, TrackOffset};
use crate::track::topology::Direction;
use crate::track::track_idx::TrackIdx;
use pathfinding::prelude::dijkstra;

/// Location of a path step as written in schedule and STDCM documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepLocation {
    TrackOffset { track: String, offset: si::Length },
    /// Every part of the operational points carrying this code
    Uic { uic: u32 },
}

impl StepLocation {
    /// All track locations this step may stand for, main-track parts first
    pub fn resolve(&self, infra: &Infra) -> Result<Vec<TrackOffset>, Error> {
        match self {
            Self::TrackOffset { track, offset } => infra
                .resolve_location(track, *offset)
                .map(|loc| vec![loc])
                .ok_or_else(|| {
                    Error::InvalidPath(format!(
                        "location {} m on track `{track}` is not on infra `{}`",
                        offset.get::<si::meter>(),
                        infra.id
                    ))
                }),
            Self::Uic { uic } => {
                let locations = infra.resolve_uic(*uic);
                if locations.is_empty() {
                    Err(Error::InvalidPath(format!(
                        "no operational point with uic {uic} on infra `{}`",
                        infra.id
                    )))
                } else {
                    Ok(locations.to_vec())
                }
            }
        }
    }
}

/// Named path step with its candidate track locations
#[derive(Debug, Clone, PartialEq)]
pub struct PathLocation {
    pub id: String,
    pub candidates: Vec<TrackOffset>,
}

impl PathLocation {
    pub fn new<S: Into<String>>(id: S, candidates: Vec<TrackOffset>) -> Self {
        Self {
            id: id.into(),
            candidates,
        }
    }
}

/// Portion `[begin, end]` (track coordinates) of a track section travelled in `direction`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackRange {
    pub track: TrackIdx,
    pub direction: Direction,
    pub begin: si::Length,
    pub end: si::Length,
}

impl TrackRange {
    /// Range travelled from track offset `from` to `to` in `direction`
    fn between(track: TrackIdx, direction: Direction, from: si::Length, to: si::Length) -> Self {
        Self {
            track,
            direction,
            begin: from.min(to),
            end: from.max(to),
        }
    }

    pub fn length(&self) -> si::Length {
        self.end - self.begin
    }

    /// Track offset reached `dist` after entering the range
    pub fn track_offset_at(&self, dist: si::Length) -> si::Length {
        match self.direction {
            Direction::StartToStop => self.begin + dist,
            Direction::StopToStart => self.end - dist,
        }
    }

    /// Distance from the range entry to track offset `offset`
    pub fn dist_from_entry(&self, offset: si::Length) -> si::Length {
        match self.direction {
            Direction::StartToStop => offset - self.begin,
            Direction::StopToStart => self.end - offset,
        }
    }

    pub fn contains(&self, offset: si::Length) -> bool {
        self.begin <= offset && offset <= self.end
    }

    /// Appends `other` to `self` if it continues it on the same track
    fn try_extend(&mut self, other: &Self) -> bool {
        if self.track != other.track || self.direction != other.direction {
            return false;
        }
        match self.direction {
            Direction::StartToStop if self.end == other.begin => self.end = other.end,
            Direction::StopToStart if self.begin == other.end => self.begin = other.begin,
            _ => return false,
        }
        true
    }
}

/// Step of a [TrainPath] with its chosen location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub id: String,
    pub location: TrackOffset,
    /// Distance from the path start
    pub path_offset: si::Length,
}

impl GetOffset for PathStep {
    fn get_offset(&self) -> si::Length {
        self.path_offset
    }
}

#[readonly::make]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Route of a train through the infra, with profiles merged along it
pub struct TrainPath {
    pub ranges: Vec<TrackRange>,
    pub steps: Vec<PathStep>,
    pub length: si::Length,
    pub profiles: PathProfiles,
}

impl Init for TrainPath {}
impl SerdeAPI for TrainPath {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Node {
    Start,
    /// Origin candidate left in a direction
    Origin(usize, Direction),
    /// Entry endpoint of a track travelled in a direction
    Entry(TrackIdx, Direction),
    /// Target candidate reached in a direction
    Target(usize, Direction),
}

fn to_mm(length: si::Length) -> u64 {
    length.get::<si::millimeter>().round().max(0.0) as u64
}

struct Leg {
    ranges: Vec<TrackRange>,
    origin: usize,
    target: usize,
    direction: Direction,
    length: si::Length,
}

/// Shortest directed route from any of `origins`, leaving in one of `directions`, to any of
/// `targets`
fn find_leg(
    infra: &Infra,
    origins: &[TrackOffset],
    directions: &[Direction],
    targets: &[TrackOffset],
) -> Option<Leg> {
    let track_length = |track: TrackIdx| {
        infra
            .track(track)
            .map(|t| t.length)
            .unwrap_or(si::Length::ZERO)
    };
    let entries = |track: TrackIdx, dir: Direction, cost: u64| {
        let mut next: Vec<_> = infra.neighbors(track, dir).into_iter().collect();
        next.sort_by_key(|ep| (ep.track, ep.endpoint.is_end()));
        next.into_iter().map(move |ep| {
            (
                Node::Entry(ep.track, Direction::entering_through(ep.endpoint)),
                cost,
            )
        })
    };
    let successors = |node: &Node| -> Vec<(Node, u64)> {
        match *node {
            Node::Start => (0..origins.len())
                .flat_map(|i| directions.iter().map(move |dir| (Node::Origin(i, *dir), 0)))
                .collect(),
            Node::Origin(i, dir) => {
                let origin = origins[i];
                let mut next: Vec<(Node, u64)> = targets
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.track == origin.track)
                    .filter_map(|(j, t)| {
                        let dist = match dir {
                            Direction::StartToStop => t.offset - origin.offset,
                            Direction::StopToStart => origin.offset - t.offset,
                        };
                        (dist >= si::Length::ZERO).then(|| (Node::Target(j, dir), to_mm(dist)))
                    })
                    .collect();
                let remaining = match dir {
                    Direction::StartToStop => track_length(origin.track) - origin.offset,
                    Direction::StopToStart => origin.offset,
                };
                next.extend(entries(origin.track, dir, to_mm(remaining)));
                next
            }
            Node::Entry(track, dir) => {
                let length = track_length(track);
                let mut next: Vec<(Node, u64)> = targets
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.track == track)
                    .map(|(j, t)| {
                        let dist = match dir {
                            Direction::StartToStop => t.offset,
                            Direction::StopToStart => length - t.offset,
                        };
                        (Node::Target(j, dir), to_mm(dist))
                    })
                    .collect();
                next.extend(entries(track, dir, to_mm(length)));
                next
            }
            Node::Target(..) => vec![],
        }
    };

    let (nodes, _cost) = dijkstra(&Node::Start, successors, |node| {
        matches!(node, Node::Target(..))
    })?;

    let (origin, mut dir) = match nodes.get(1) {
        Some(Node::Origin(i, dir)) => (*i, *dir),
        _ => return None,
    };
    let mut track = origins[origin].track;
    let mut cursor = origins[origin].offset;
    let mut ranges = vec![];
    for node in &nodes[2..] {
        match *node {
            Node::Entry(next_track, next_dir) => {
                let exit = match dir {
                    Direction::StartToStop => track_length(track),
                    Direction::StopToStart => si::Length::ZERO,
                };
                ranges.push(TrackRange::between(track, dir, cursor, exit));
                track = next_track;
                dir = next_dir;
                cursor = match dir {
                    Direction::StartToStop => si::Length::ZERO,
                    Direction::StopToStart => track_length(track),
                };
            }
            Node::Target(j, _) => {
                ranges.push(TrackRange::between(track, dir, cursor, targets[j].offset));
                let length = ranges.iter().map(TrackRange::length).sum();
                return Some(Leg {
                    ranges,
                    origin,
                    target: j,
                    direction: dir,
                    length,
                });
            }
            Node::Start | Node::Origin(..) => return None,
        }
    }
    None
}

impl TrainPath {
    /// Joins consecutive `locations` by shortest routes.  The first step may be left in either
    /// direction; each later leg continues in the direction the previous one arrived in.
    ///
    /// Fails with [Error::InvalidPath] if fewer than two steps are given, a candidate lies
    /// outside the infra, no route exists, or the step offsets are not strictly increasing.
    pub fn find(infra: &Infra, locations: &[PathLocation]) -> Result<Self, Error> {
        if locations.len() < 2 {
            return Err(Error::InvalidPath(format!(
                "a path needs at least two steps, got {}",
                locations.len()
            )));
        }
        for loc in locations {
            if loc.candidates.is_empty() {
                return Err(Error::InvalidPath(format!(
                    "step `{}` has no location",
                    loc.id
                )));
            }
            for candidate in &loc.candidates {
                let on_track = infra.track(candidate.track).map(|t| {
                    si::Length::ZERO <= candidate.offset && candidate.offset <= t.length
                });
                if on_track != Some(true) {
                    return Err(Error::InvalidPath(format!(
                        "step `{}` location {candidate:?} is outside the infra",
                        loc.id
                    )));
                }
            }
        }

        let both = [Direction::StartToStop, Direction::StopToStart];
        let mut origins = locations[0].candidates.clone();
        let mut directions: Vec<Direction> = both.to_vec();
        let mut ranges: Vec<TrackRange> = vec![];
        let mut steps: Vec<PathStep> = vec![];
        let mut length = si::Length::ZERO;
        for pair in locations.windows(2) {
            let leg = find_leg(infra, &origins, &directions, &pair[1].candidates).ok_or_else(
                || {
                    Error::InvalidPath(format!(
                        "no route from step `{}` to step `{}`",
                        pair[0].id, pair[1].id
                    ))
                },
            )?;
            if steps.is_empty() {
                steps.push(PathStep {
                    id: pair[0].id.clone(),
                    location: origins[leg.origin],
                    path_offset: si::Length::ZERO,
                });
            }
            length += leg.length;
            let target = pair[1].candidates[leg.target];
            steps.push(PathStep {
                id: pair[1].id.clone(),
                location: target,
                path_offset: length,
            });
            for range in leg.ranges {
                push_range(&mut ranges, range);
            }
            origins = vec![target];
            directions = vec![leg.direction];
        }

        if let Some(w) = steps.windows(2).find(|w| w[1].path_offset <= w[0].path_offset) {
            return Err(Error::InvalidPath(format!(
                "step `{}` at {} m does not come after step `{}` at {} m",
                w[1].id,
                w[1].path_offset.get::<si::meter>(),
                w[0].id,
                w[0].path_offset.get::<si::meter>()
            )));
        }

        let profiles = PathProfiles::build(infra, &ranges, length);
        debug!(
            "path of {} m through {} ranges",
            length.get::<si::meter>().format_eng(Some(5)),
            ranges.len()
        );
        Ok(Self {
            ranges,
            steps,
            length,
            profiles,
        })
    }

    /// Path offset of the step named `id`
    pub fn step_offset(&self, id: &str) -> Option<si::Length> {
        self.steps
            .iter()
            .find(|step| step.id == id)
            .map(|step| step.path_offset)
    }

    /// Track location at `path_offset`, clamped to the path
    pub fn locate(&self, path_offset: si::Length) -> Option<(TrackRange, TrackOffset)> {
        let mut start = si::Length::ZERO;
        for range in &self.ranges {
            let end = start + range.length();
            if path_offset <= end {
                let dist = (path_offset - start).max(si::Length::ZERO);
                return Some((
                    *range,
                    TrackOffset {
                        track: range.track,
                        offset: range.track_offset_at(dist),
                    },
                ));
            }
            start = end;
        }
        let last = self.ranges.last()?;
        Some((
            *last,
            TrackOffset {
                track: last.track,
                offset: last.track_offset_at(last.length()),
            },
        ))
    }
}

/// Pushes `range`, skipping empty ranges and merging it into the previous one when contiguous
fn push_range(ranges: &mut Vec<TrackRange>, range: TrackRange) {
    if range.length() <= si::Length::ZERO {
        return;
    }
    if let Some(last) = ranges.last_mut() {
        if last.try_extend(&range) {
            return;
        }
    }
    ranges.push(range);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use crate::track::builder::InfraBuilder;
    use crate::track::topology::{ApplicableDirection, Endpoint};
    use crate::utils::IdAllocator;

    fn loc(infra: &Infra, id: &str, track: &str, offset: f64) -> PathLocation {
        PathLocation::new(
            id,
            vec![infra.resolve_location(track, offset * uc::M).unwrap()],
        )
    }

    #[test]
    fn test_single_track() {
        let infra = small_infra();
        let path = TrainPath::find(
            &infra,
            &[
                loc(&infra, "a", "track.0", 100.0),
                loc(&infra, "b", "track.0", 600.0),
            ],
        )
        .unwrap();
        assert_eq!(path.length, 500.0 * uc::M);
        assert_eq!(path.ranges.len(), 1);
        assert_eq!(path.ranges[0].direction, Direction::StartToStop);
        assert_eq!(path.steps[1].path_offset, 500.0 * uc::M);
    }

    #[test]
    fn test_reverse_direction() {
        let infra = small_infra();
        let path = TrainPath::find(
            &infra,
            &[
                loc(&infra, "a", "track.1", 300.0),
                loc(&infra, "b", "track.0", 1500.0),
            ],
        )
        .unwrap();
        assert_eq!(path.ranges.len(), 2);
        assert!(path
            .ranges
            .iter()
            .all(|r| r.direction == Direction::StopToStart));
        assert!(almost_eq_uom(&path.length, &(800.0 * uc::M), None));
    }

    #[test]
    fn test_multi_leg_keeps_direction() {
        let infra = small_infra();
        let path = TrainPath::find(
            &infra,
            &[
                loc(&infra, "a", "track.0", 0.0),
                loc(&infra, "b", "track.0", 1500.0),
                loc(&infra, "c", "track.2", 1000.0),
            ],
        )
        .unwrap();
        let offsets: Vec<f64> = path
            .steps
            .iter()
            .map(|s| s.path_offset.get::<si::meter>())
            .collect();
        assert_eq!(offsets, vec![0.0, 1500.0, 4000.0]);
        // ranges on the same track are merged across legs
        assert_eq!(path.ranges.len(), 3);
        assert_eq!(path.step_offset("c"), Some(4000.0 * uc::M));
        let (_, at) = path.locate(2500.0 * uc::M).unwrap();
        assert_eq!(at.track, infra.track_idx("track.1").unwrap());
        assert!(almost_eq_uom(&at.offset, &(500.0 * uc::M), None));
    }

    #[test]
    fn test_backtracking_step_is_rejected() {
        let infra = small_infra();
        // the second leg would have to turn back on track.0
        let res = TrainPath::find(
            &infra,
            &[
                loc(&infra, "a", "track.0", 500.0),
                loc(&infra, "b", "track.0", 1000.0),
                loc(&infra, "c", "track.0", 700.0),
            ],
        );
        assert!(matches!(res, Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_same_location_twice_is_rejected() {
        let infra = small_infra();
        let res = TrainPath::find(
            &infra,
            &[
                loc(&infra, "a", "track.0", 500.0),
                loc(&infra, "b", "track.0", 500.0),
            ],
        );
        assert!(matches!(res, Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_one_way_link() {
        let mut builder = InfraBuilder::new("one_way", IdAllocator::new("track"));
        let t0 = builder.add_track(100.0 * uc::M);
        let t1 = builder.add_track(100.0 * uc::M);
        builder.add_link(
            (t0, Endpoint::End),
            (t1, Endpoint::Begin),
            ApplicableDirection::Normal,
        );
        let infra = Infra::load(builder.build()).unwrap();
        assert!(TrainPath::find(
            &infra,
            &[
                loc(&infra, "a", "track.0", 10.0),
                loc(&infra, "b", "track.1", 10.0)
            ]
        )
        .is_ok());
        assert!(matches!(
            TrainPath::find(
                &infra,
                &[
                    loc(&infra, "a", "track.1", 10.0),
                    loc(&infra, "b", "track.0", 10.0)
                ]
            ),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn test_uic_candidates() {
        let infra = small_infra();
        let path = TrainPath::find(
            &infra,
            &[
                PathLocation::new(
                    "west",
                    StepLocation::Uic { uic: 1 }.resolve(&infra).unwrap(),
                ),
                PathLocation::new(
                    "east",
                    StepLocation::Uic { uic: 3 }.resolve(&infra).unwrap(),
                ),
            ],
        )
        .unwrap();
        assert!(path.length > si::Length::ZERO);
        assert!(StepLocation::Uic { uic: 999 }.resolve(&infra).is_err());
    }

    #[test]
    fn test_step_location_serde() {
        let loc: StepLocation = serde_json::from_str(r#"{"uic": 87}"#).unwrap();
        assert_eq!(loc, StepLocation::Uic { uic: 87 });
        let loc: StepLocation =
            serde_json::from_str(r#"{"track": "track.0", "offset": 12.5}"#).unwrap();
        assert!(matches!(loc, StepLocation::TrackOffset { .. }));
    }
}
