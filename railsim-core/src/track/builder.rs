//! Programmatic infra generation for fixtures and synthetic scenarios

use super::infra::{OperationalPoint, RawInfra};
use super::topology::*;
use super::track_section::*;
use crate::imports::*;
use crate::utils::IdAllocator;

/// Handle to a track section added to an [InfraBuilder]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackRef(usize);

#[derive(Debug, Clone)]
pub struct InfraBuilder {
    id: String,
    track_ids: IdAllocator,
    link_ids: IdAllocator,
    waypoint_ids: IdAllocator,
    signal_ids: IdAllocator,
    tracks: Vec<TrackSection>,
    links: Vec<TrackLink>,
    operational_points: Vec<OperationalPoint>,
}

impl InfraBuilder {
    /// # Arguments
    /// - `id`: infra id
    /// - `track_ids`: allocator for track labels, e.g. `IdAllocator::new("track")`
    pub fn new<S: Into<String>>(id: S, track_ids: IdAllocator) -> Self {
        Self {
            id: id.into(),
            track_ids,
            link_ids: IdAllocator::new("link"),
            waypoint_ids: IdAllocator::new("waypoint"),
            signal_ids: IdAllocator::new("signal"),
            tracks: vec![],
            links: vec![],
            operational_points: vec![],
        }
    }

    pub fn add_track(&mut self, length: si::Length) -> TrackRef {
        self.tracks.push(TrackSection {
            id: self.track_ids.next_label(),
            length,
            ..Default::default()
        });
        TrackRef(self.tracks.len() - 1)
    }

    pub fn label(&self, track: TrackRef) -> &str {
        &self.tracks[track.0].id
    }

    pub fn track_mut(&mut self, track: TrackRef) -> &mut TrackSection {
        &mut self.tracks[track.0]
    }

    pub fn add_buffer_stop(&mut self, track: TrackRef, position: si::Length) -> String {
        let id = self.waypoint_ids.next_label();
        self.tracks[track.0].route_waypoints.push(Waypoint::BufferStop {
            id: id.clone(),
            position,
        });
        id
    }

    pub fn add_detector(&mut self, track: TrackRef, position: si::Length) -> String {
        let id = self.waypoint_ids.next_label();
        self.tracks[track.0].route_waypoints.push(Waypoint::Detector {
            id: id.clone(),
            position,
        });
        id
    }

    pub fn add_signal(
        &mut self,
        track: TrackRef,
        position: si::Length,
        direction: Direction,
    ) -> String {
        let id = self.signal_ids.next_label();
        self.tracks[track.0].signals.push(Signal {
            id: id.clone(),
            position,
            direction,
        });
        id
    }

    pub fn add_slope(&mut self, track: TrackRef, begin: si::Length, end: si::Length, gradient: f64) {
        self.tracks[track.0].slopes.push(Slope {
            begin,
            end,
            gradient,
        });
    }

    pub fn add_curve(
        &mut self,
        track: TrackRef,
        begin: si::Length,
        end: si::Length,
        radius: si::Length,
    ) {
        self.tracks[track.0].curves.push(Curve { begin, end, radius });
    }

    pub fn add_speed_section(&mut self, track: TrackRef, section: SpeedSection) {
        self.tracks[track.0].speed_sections.push(section);
    }

    pub fn set_signaling(&mut self, track: TrackRef, signaling: SignalingSystem) {
        self.tracks[track.0].signaling = signaling;
    }

    /// Adds an operational point with one part per `(track, position)`
    pub fn add_operational_point<S: Into<String>>(
        &mut self,
        id: S,
        uic: Option<u32>,
        parts: &[(TrackRef, si::Length)],
    ) {
        let id = id.into();
        for (track, position) in parts {
            self.tracks[track.0]
                .operational_points
                .push(OperationalPointPart {
                    operational_point: id.clone(),
                    position: *position,
                    siding: false,
                });
        }
        self.operational_points.push(OperationalPoint {
            name: id.clone(),
            id,
            uic,
        });
    }

    pub fn add_link(
        &mut self,
        begin: (TrackRef, Endpoint),
        end: (TrackRef, Endpoint),
        navigability: ApplicableDirection,
    ) -> String {
        let id = self.link_ids.next_label();
        self.links.push(TrackLink {
            id: id.clone(),
            begin: RawTrackEndpoint {
                track: self.label(begin.0).to_string(),
                endpoint: begin.1,
            },
            end: RawTrackEndpoint {
                track: self.label(end.0).to_string(),
                endpoint: end.1,
            },
            navigability,
        });
        id
    }

    /// Chains tracks end to begin with bidirectional links
    pub fn chain(&mut self, tracks: &[TrackRef]) {
        for pair in tracks.windows(2) {
            self.add_link(
                (pair[0], Endpoint::End),
                (pair[1], Endpoint::Begin),
                ApplicableDirection::Both,
            );
        }
    }

    pub fn build(self) -> RawInfra {
        RawInfra {
            id: self.id,
            track_sections: self.tracks,
            track_links: self.links,
            operational_points: self.operational_points,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_come_from_allocator() {
        let mut builder = InfraBuilder::new("a", IdAllocator::new("track"));
        let t0 = builder.add_track(100.0 * uc::M);
        let t1 = builder.add_track(100.0 * uc::M);
        assert_eq!(builder.label(t0), "track.0");
        assert_eq!(builder.label(t1), "track.1");

        // a second builder starts from its own allocator
        let mut other = InfraBuilder::new("b", IdAllocator::new("track"));
        let u0 = other.add_track(50.0 * uc::M);
        assert_eq!(other.label(u0), "track.0");
    }

    #[test]
    fn test_build() {
        let mut builder = InfraBuilder::new("small", IdAllocator::new("track"));
        let t0 = builder.add_track(100.0 * uc::M);
        let t1 = builder.add_track(200.0 * uc::M);
        builder.add_buffer_stop(t0, 0.0 * uc::M);
        builder.add_detector(t0, 50.0 * uc::M);
        builder.chain(&[t0, t1]);
        builder.add_operational_point("op.a", Some(87), &[(t1, 10.0 * uc::M)]);
        let raw = builder.build();
        assert_eq!(raw.track_sections.len(), 2);
        assert_eq!(raw.track_links.len(), 1);
        assert_eq!(raw.track_links[0].begin.track, "track.0");
        assert_eq!(raw.operational_points[0].uic, Some(87));
    }
}
