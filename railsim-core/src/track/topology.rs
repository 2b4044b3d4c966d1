//! Endpoints, directions and links between track sections

use super::track_idx::TrackIdx;
use crate::imports::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IsVariant)]
#[serde(rename_all = "UPPERCASE")]
pub enum Endpoint {
    Begin,
    End,
}

impl Endpoint {
    pub fn opposite(self) -> Self {
        match self {
            Self::Begin => Self::End,
            Self::End => Self::Begin,
        }
    }
}

/// Direction of travel along a track section
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    /// From offset 0 toward the track length
    #[default]
    StartToStop,
    StopToStart,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::StartToStop => Self::StopToStart,
            Self::StopToStart => Self::StartToStop,
        }
    }

    /// Endpoint through which a train travelling in `self` leaves the track
    pub fn exit(self) -> Endpoint {
        match self {
            Self::StartToStop => Endpoint::End,
            Self::StopToStart => Endpoint::Begin,
        }
    }

    /// Direction of travel of a train entering a track through `endpoint`
    pub fn entering_through(endpoint: Endpoint) -> Self {
        match endpoint {
            Endpoint::Begin => Self::StartToStop,
            Endpoint::End => Self::StopToStart,
        }
    }
}

/// Directions in which a link may be traversed.  `Normal` goes from `begin` to `end`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplicableDirection {
    Normal,
    Reverse,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// An endpoint of a loaded track section
pub struct TrackEndpoint {
    pub track: TrackIdx,
    pub endpoint: Endpoint,
}

impl TrackEndpoint {
    pub fn new(track: TrackIdx, endpoint: Endpoint) -> Self {
        Self { track, endpoint }
    }
}

impl std::hash::Hash for TrackEndpoint {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u64(((self.track.idx() as u64) << 1) + self.endpoint.is_end() as u64);
    }
}
impl nohash_hasher::IsEnabled for TrackEndpoint {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Endpoint of a track section referenced by label, as found in infra documents
pub struct RawTrackEndpoint {
    pub track: String,
    pub endpoint: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Connection between two track section endpoints
pub struct TrackLink {
    pub id: String,
    pub begin: RawTrackEndpoint,
    pub end: RawTrackEndpoint,
    #[serde(default)]
    pub navigability: ApplicableDirection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_exit() {
        assert_eq!(Direction::StartToStop.exit(), Endpoint::End);
        assert_eq!(Direction::StopToStart.exit(), Endpoint::Begin);
        assert_eq!(
            Direction::entering_through(Endpoint::End),
            Direction::StopToStart
        );
        assert_eq!(Direction::StartToStop.opposite(), Direction::StopToStart);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&Direction::StartToStop).unwrap(),
            "\"START_TO_STOP\""
        );
        assert_eq!(
            serde_json::from_str::<ApplicableDirection>("\"REVERSE\"").unwrap(),
            ApplicableDirection::Reverse
        );
        assert_eq!(serde_json::to_string(&Endpoint::Begin).unwrap(), "\"BEGIN\"");
    }

    #[test]
    fn test_endpoint_hash_is_distinct() {
        let mut set: IntSet<TrackEndpoint> = Default::default();
        set.insert(TrackEndpoint::new(TrackIdx::new(0), Endpoint::Begin));
        set.insert(TrackEndpoint::new(TrackIdx::new(0), Endpoint::End));
        set.insert(TrackEndpoint::new(TrackIdx::new(1), Endpoint::Begin));
        set.insert(TrackEndpoint::new(TrackIdx::new(0), Endpoint::End));
        assert_eq!(set.len(), 3);
    }
}
