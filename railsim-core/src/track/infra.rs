use super::topology::*;
use super::track_idx::TrackIdx;
use super::track_section::*;
use crate::imports::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalPoint {
    pub id: String,
    #[serde(default)]
    pub uic: Option<u32>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, SerdeAPI)]
/// Infrastructure document as consumed once per load
pub struct RawInfra {
    pub id: String,
    pub track_sections: Vec<TrackSection>,
    #[serde(default)]
    pub track_links: Vec<TrackLink>,
    #[serde(default)]
    pub operational_points: Vec<OperationalPoint>,
}

impl Init for RawInfra {
    fn init(&mut self) -> Result<(), Error> {
        for track in self.track_sections.iter_mut() {
            track.sort_waypoints();
            track.sort_signals();
        }
        Ok(())
    }
}

/// Location on a loaded track section
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackOffset {
    pub track: TrackIdx,
    pub offset: si::Length,
}

#[readonly::make]
#[derive(Debug, Clone, PartialEq, Serialize)]
/// Immutable, indexed track topology.  Build with [Infra::load].
pub struct Infra {
    pub id: String,
    tracks: Vec<TrackSection>,
    #[serde(skip)]
    track_idxs: HashMap<String, TrackIdx>,
    #[serde(skip)]
    neighbors: IntMap<TrackEndpoint, IntSet<TrackEndpoint>>,
    operational_points: Vec<OperationalPoint>,
    #[serde(skip)]
    uic_locations: HashMap<u32, Vec<TrackOffset>>,
}

impl Infra {
    /// Validates `raw` and builds the indexed graph.
    ///
    /// Fails with [Error::InvalidTopology] if track labels are duplicated, links reference
    /// unknown tracks, parts reference unknown operational points, or positioned objects fall
    /// outside their track.
    pub fn load(mut raw: RawInfra) -> Result<Self, Error> {
        raw.init()?;
        let mut errors = ValidationErrors::new();

        let mut track_idxs: HashMap<String, TrackIdx> = HashMap::new();
        for (i, track) in raw.track_sections.iter().enumerate() {
            if let Err(track_errors) = track.validate() {
                errors.append_with_name(track_errors, &format!("Track `{}`", track.id));
            }
            let idx = TrackIdx::try_from(i)
                .map_err(|err| Error::InvalidTopology(format!("{err:?}")))?;
            if track_idxs.insert(track.id.clone(), idx).is_some() {
                errors.push(anyhow!("Duplicate track id `{}`!", track.id));
            }
        }

        let mut waypoint_ids: HashSet<&str> = HashSet::new();
        for wp in raw.track_sections.iter().flat_map(|t| t.route_waypoints.iter()) {
            if !waypoint_ids.insert(wp.id()) {
                errors.push(anyhow!("Duplicate waypoint id `{}`!", wp.id()));
            }
        }

        let op_ids: HashSet<&str> = raw.operational_points.iter().map(|op| op.id.as_str()).collect();
        for part in raw
            .track_sections
            .iter()
            .flat_map(|t| t.operational_points.iter())
        {
            if !op_ids.contains(part.operational_point.as_str()) {
                errors.push(anyhow!(
                    "Operational point part references unknown operational point `{}`!",
                    part.operational_point
                ));
            }
        }

        let mut neighbors: IntMap<TrackEndpoint, IntSet<TrackEndpoint>> = IntMap::default();
        for link in &raw.track_links {
            let resolve = |ep: &RawTrackEndpoint| {
                track_idxs
                    .get(&ep.track)
                    .map(|idx| TrackEndpoint::new(*idx, ep.endpoint))
            };
            match (resolve(&link.begin), resolve(&link.end)) {
                (Some(begin), Some(end)) => {
                    register_link(&mut neighbors, begin, end, link.navigability)
                }
                _ => errors.push(anyhow!(
                    "Link `{}` references an unknown track (`{}` or `{}`)!",
                    link.id,
                    link.begin.track,
                    link.end.track
                )),
            }
        }

        errors
            .make_err()
            .map_err(|errs| Error::InvalidTopology(format!("infra `{}`:\n{errs}", raw.id)))?;

        let mut uic_parts: HashMap<u32, Vec<(bool, TrackOffset)>> = HashMap::new();
        let uic_by_op: HashMap<&str, u32> = raw
            .operational_points
            .iter()
            .filter_map(|op| op.uic.map(|uic| (op.id.as_str(), uic)))
            .collect();
        for (i, track) in raw.track_sections.iter().enumerate() {
            for part in &track.operational_points {
                if let Some(uic) = uic_by_op.get(part.operational_point.as_str()) {
                    uic_parts.entry(*uic).or_default().push((
                        part.siding,
                        TrackOffset {
                            track: TrackIdx::new(i as u32),
                            offset: part.position,
                        },
                    ));
                }
            }
        }
        let uic_locations: HashMap<u32, Vec<TrackOffset>> = uic_parts
            .into_iter()
            .map(|(uic, mut parts)| {
                parts.sort_by_key(|(siding, _)| *siding);
                (uic, parts.into_iter().map(|(_, loc)| loc).collect())
            })
            .collect();

        info!(
            "loaded infra `{}`: {} track sections, {} links",
            raw.id,
            raw.track_sections.len(),
            raw.track_links.len()
        );
        Ok(Self {
            id: raw.id,
            tracks: raw.track_sections,
            track_idxs,
            neighbors,
            operational_points: raw.operational_points,
            uic_locations,
        })
    }

    /// Endpoints reachable when leaving `track` travelling in `direction`
    pub fn neighbors(&self, track: TrackIdx, direction: Direction) -> IntSet<TrackEndpoint> {
        self.neighbors
            .get(&TrackEndpoint::new(track, direction.exit()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn track(&self, idx: TrackIdx) -> Option<&TrackSection> {
        self.tracks.get(idx.idx())
    }

    pub fn track_idx(&self, label: &str) -> Option<TrackIdx> {
        self.track_idxs.get(label).copied()
    }

    pub fn tracks(&self) -> &[TrackSection] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Waypoints of `track`, sorted by position
    pub fn waypoints(&self, idx: TrackIdx) -> &[Waypoint] {
        self.track(idx)
            .map(|t| t.route_waypoints.as_slice())
            .unwrap_or_default()
    }

    /// Signals of `track`, sorted by position
    pub fn signals(&self, idx: TrackIdx) -> &[Signal] {
        self.track(idx)
            .map(|t| t.signals.as_slice())
            .unwrap_or_default()
    }

    pub fn operational_points(&self) -> &[OperationalPoint] {
        &self.operational_points
    }

    /// Every track location of operational points carrying `uic`, main-track parts first
    pub fn resolve_uic(&self, uic: u32) -> &[TrackOffset] {
        self.uic_locations
            .get(&uic)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolves a label-based location, checking the offset lies on the track
    pub fn resolve_location(&self, track: &str, offset: si::Length) -> Option<TrackOffset> {
        let idx = self.track_idx(track)?;
        let length = self.track(idx)?.length;
        (si::Length::ZERO <= offset && offset <= length).then_some(TrackOffset { track: idx, offset })
    }
}

/// Adds `end` to the neighbors of `begin` unless the link is reverse-only, and `begin` to the
/// neighbors of `end` unless it is normal-only
fn register_link(
    neighbors: &mut IntMap<TrackEndpoint, IntSet<TrackEndpoint>>,
    begin: TrackEndpoint,
    end: TrackEndpoint,
    navigability: ApplicableDirection,
) {
    if navigability != ApplicableDirection::Reverse {
        neighbors.entry(begin).or_default().insert(end);
    }
    if navigability != ApplicableDirection::Normal {
        neighbors.entry(end).or_default().insert(begin);
    }
}

#[cfg(test)]
mod tests;
