use super::topology::Direction;
use crate::imports::*;

/// Waypoints delimit track-circuit zones.  The set of kinds is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Waypoint {
    BufferStop { id: String, position: si::Length },
    Detector { id: String, position: si::Length },
}

impl Waypoint {
    pub fn id(&self) -> &str {
        match self {
            Self::BufferStop { id, .. } | Self::Detector { id, .. } => id,
        }
    }

    pub fn position(&self) -> si::Length {
        match self {
            Self::BufferStop { position, .. } | Self::Detector { position, .. } => *position,
        }
    }

    pub fn is_buffer_stop(&self) -> bool {
        matches!(self, Self::BufferStop { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub position: si::Length,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Location of an operational point on one track section
pub struct OperationalPointPart {
    /// Id of the [OperationalPoint](super::OperationalPoint) this part belongs to
    pub operational_point: String,
    pub position: si::Length,
    /// Siding parts are resolved after main-track parts
    #[serde(default)]
    pub siding: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
/// Gradient in per-mille over `[begin, end]`, positive uphill in the start-to-stop direction
pub struct Slope {
    pub begin: si::Length,
    pub end: si::Length,
    pub gradient: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub begin: si::Length,
    pub end: si::Length,
    /// Curve radius; zero means straight track
    pub radius: si::Length,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedSection {
    pub begin: si::Length,
    pub end: si::Length,
    /// Limit applying to every train, if any
    #[serde(default)]
    pub speed_limit: Option<si::Velocity>,
    /// Limits overriding `speed_limit` for trains carrying a matching tag
    #[serde(default)]
    pub speed_limit_by_tag: HashMap<String, si::Velocity>,
}

impl SpeedSection {
    /// Limit applying to a train with `tag`
    pub fn limit_for(&self, tag: Option<&str>) -> Option<si::Velocity> {
        tag.and_then(|tag| self.speed_limit_by_tag.get(tag).copied())
            .or(self.speed_limit)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalingSystem {
    #[default]
    Bal,
    Etcs,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
/// Unit of track between switches
pub struct TrackSection {
    /// Stable external identifier
    pub id: String,
    pub length: si::Length,
    #[serde(default)]
    pub slopes: Vec<Slope>,
    #[serde(default)]
    pub curves: Vec<Curve>,
    #[serde(default)]
    pub speed_sections: Vec<SpeedSection>,
    #[serde(default)]
    pub route_waypoints: Vec<Waypoint>,
    #[serde(default)]
    pub signals: Vec<Signal>,
    #[serde(default)]
    pub operational_points: Vec<OperationalPointPart>,
    #[serde(default)]
    pub signaling: SignalingSystem,
}

impl TrackSection {
    /// Stable ascending sort of waypoints by position
    pub fn sort_waypoints(&mut self) {
        self.route_waypoints
            .sort_by(|a, b| a.position().partial_cmp(&b.position()).unwrap_or(Ordering::Equal));
    }

    /// Stable ascending sort of signals by position
    pub fn sort_signals(&mut self) {
        self.signals
            .sort_by(|a, b| a.position.partial_cmp(&b.position).unwrap_or(Ordering::Equal));
    }

    pub fn contains_buffer_stop(&self) -> bool {
        self.route_waypoints.iter().any(Waypoint::is_buffer_stop)
    }

    /// Positions strictly inside the track that split it into zones, ascending and unique
    pub fn zone_boundaries(&self) -> Vec<si::Length> {
        let mut bounds: Vec<si::Length> = self
            .route_waypoints
            .iter()
            .map(Waypoint::position)
            .filter(|pos| *pos > si::Length::ZERO && *pos < self.length)
            .collect();
        bounds.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        bounds.dedup();
        bounds
    }

    /// Index of the zone containing `offset`.  A position on a boundary belongs to the zone
    /// after it.
    pub fn zone_at(&self, offset: si::Length) -> usize {
        self.zone_boundaries().partition_point(|b| *b <= offset)
    }

    fn chk_range(
        &self,
        errors: &mut ValidationErrors,
        begin: si::Length,
        end: si::Length,
        name: &str,
    ) {
        if !(si::Length::ZERO <= begin && begin <= end && end <= self.length) {
            errors.push(anyhow!(
                "{name} range [{}, {}] m must be ordered and within track `{}` of length {} m!",
                begin.get::<si::meter>().format_eng(Some(5)),
                end.get::<si::meter>().format_eng(Some(5)),
                self.id,
                self.length.get::<si::meter>().format_eng(Some(5)),
            ));
        }
    }

    fn chk_position(&self, errors: &mut ValidationErrors, position: si::Length, name: &str) {
        if !(si::Length::ZERO <= position && position <= self.length) {
            errors.push(anyhow!(
                "{name} at {} m is outside track `{}` of length {} m!",
                position.get::<si::meter>().format_eng(Some(5)),
                self.id,
                self.length.get::<si::meter>().format_eng(Some(5)),
            ));
        }
    }
}

impl ObjState for TrackSection {
    fn validate(&self) -> ValidationResults {
        let mut errors = ValidationErrors::new();
        if self.id.is_empty() {
            errors.push(anyhow!("Track id must not be empty!"));
        }
        si_chk_num_gtz_fin(&mut errors, &self.length, "Track length");
        early_err!(errors, "Track section");

        for wp in &self.route_waypoints {
            self.chk_position(&mut errors, wp.position(), &format!("Waypoint `{}`", wp.id()));
        }
        for sig in &self.signals {
            self.chk_position(&mut errors, sig.position, &format!("Signal `{}`", sig.id));
        }
        for op in &self.operational_points {
            self.chk_position(
                &mut errors,
                op.position,
                &format!("Operational point part `{}`", op.operational_point),
            );
        }
        for slope in &self.slopes {
            self.chk_range(&mut errors, slope.begin, slope.end, "Slope");
            if !slope.gradient.is_finite() {
                errors.push(anyhow!("Slope gradient must be finite!"));
            }
        }
        for curve in &self.curves {
            self.chk_range(&mut errors, curve.begin, curve.end, "Curve");
        }
        for section in &self.speed_sections {
            self.chk_range(&mut errors, section.begin, section.end, "Speed section");
            for speed in section
                .speed_limit
                .iter()
                .chain(section.speed_limit_by_tag.values())
            {
                si_chk_num_gtz(&mut errors, speed, "Speed limit");
            }
        }
        errors.make_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track() -> TrackSection {
        TrackSection {
            id: "track.0".into(),
            length: 1000.0 * uc::M,
            route_waypoints: vec![
                Waypoint::Detector {
                    id: "d2".into(),
                    position: 600.0 * uc::M,
                },
                Waypoint::BufferStop {
                    id: "bs".into(),
                    position: 0.0 * uc::M,
                },
                Waypoint::Detector {
                    id: "d1".into(),
                    position: 300.0 * uc::M,
                },
                Waypoint::Detector {
                    id: "d1bis".into(),
                    position: 300.0 * uc::M,
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_sort_waypoints_is_stable() {
        let mut track = track();
        track.sort_waypoints();
        let ids: Vec<&str> = track.route_waypoints.iter().map(Waypoint::id).collect();
        assert_eq!(ids, vec!["bs", "d1", "d1bis", "d2"]);
        assert!(track.contains_buffer_stop());
    }

    #[test]
    fn test_zones() {
        let track = track();
        assert_eq!(track.zone_boundaries(), vec![300.0 * uc::M, 600.0 * uc::M]);
        assert_eq!(track.zone_at(0.0 * uc::M), 0);
        assert_eq!(track.zone_at(300.0 * uc::M), 1);
        assert_eq!(track.zone_at(999.0 * uc::M), 2);
    }

    #[test]
    fn test_validate() {
        assert!(track().validate().is_ok());
        let mut bad = track();
        bad.signals.push(Signal {
            id: "s".into(),
            position: 1200.0 * uc::M,
            direction: Direction::StartToStop,
        });
        bad.slopes.push(Slope {
            begin: 500.0 * uc::M,
            end: 400.0 * uc::M,
            gradient: 5.0,
        });
        let errs = bad.validate().unwrap_err();
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn test_speed_limit_for_tag() {
        let section = SpeedSection {
            begin: 0.0 * uc::M,
            end: 10.0 * uc::M,
            speed_limit: Some(30.0 * uc::MPS),
            speed_limit_by_tag: HashMap::from([("MA100".to_string(), 20.0 * uc::MPS)]),
        };
        assert_eq!(section.limit_for(Some("MA100")), Some(20.0 * uc::MPS));
        assert_eq!(section.limit_for(Some("other")), Some(30.0 * uc::MPS));
        assert_eq!(section.limit_for(None), Some(30.0 * uc::MPS));
    }

    #[test]
    fn test_waypoint_serde_tag() {
        let wp: Waypoint =
            serde_json::from_str(r#"{"type": "buffer_stop", "id": "bs", "position": 0.0}"#)
                .unwrap();
        assert!(wp.is_buffer_stop());
    }
}
