use super::track_idx::TrackIdx;
use crate::imports::*;

/// Track-circuit zone: the portion of a track section between two consecutive waypoints.
/// `zone` counts from the track's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneKey {
    pub track: TrackIdx,
    pub zone: u32,
}

impl ZoneKey {
    pub fn new(track: TrackIdx, zone: u32) -> Self {
        Self { track, zone }
    }
}

impl std::hash::Hash for ZoneKey {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u64(((self.track.idx() as u64) << 32) + self.zone as u64);
    }
}
impl nohash_hasher::IsEnabled for ZoneKey {}

impl fmt::Display for ZoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.track, self.zone)
    }
}
