use crate::imports::*;

/// Dense index of a track section within a loaded [Infra](super::Infra), in document order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackIdx(u32);

impl TrackIdx {
    pub fn new(idx: u32) -> Self {
        Self(idx)
    }

    pub fn idx(&self) -> usize {
        self.0 as usize
    }
}

// keys of `IntMap`/`IntSet` must hash with a single write
impl std::hash::Hash for TrackIdx {
    fn hash<H: std::hash::Hasher>(&self, hasher: &mut H) {
        hasher.write_u32(self.0);
    }
}
impl nohash_hasher::IsEnabled for TrackIdx {}

impl fmt::Display for TrackIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<usize> for TrackIdx {
    type Error = anyhow::Error;
    fn try_from(idx: usize) -> anyhow::Result<Self> {
        Ok(Self(u32::try_from(idx).with_context(|| {
            format!("infra has more than {} track sections", u32::MAX)
        })?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_of_track() {
        assert_eq!(TrackIdx::new(7).idx(), 7);
        assert_eq!(TrackIdx::try_from(3usize).unwrap(), TrackIdx::new(3));
        assert!(TrackIdx::try_from(u32::MAX as usize + 1).is_err());
        let tracks: IntSet<TrackIdx> = [TrackIdx::new(1), TrackIdx::new(1)].into_iter().collect();
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_serde() {
        let idx = TrackIdx::new(42);
        assert_eq!(serde_json::to_string(&idx).unwrap(), "42");
        assert_eq!(serde_json::from_str::<TrackIdx>("42").unwrap(), idx);
        assert!(serde_json::from_str::<TrackIdx>("-1").is_err());
        assert!(serde_json::from_str::<TrackIdx>("4294967296").is_err());
    }
}
