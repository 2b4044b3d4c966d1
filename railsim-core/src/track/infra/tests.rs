use super::*;
use crate::track::builder::InfraBuilder;
use crate::utils::IdAllocator;

/// Two tracks joined by `navigability`, with an operational point on each
fn two_tracks(navigability: ApplicableDirection) -> RawInfra {
    let mut builder = InfraBuilder::new("two_tracks", IdAllocator::new("track"));
    let t0 = builder.add_track(1000.0 * uc::M);
    let t1 = builder.add_track(500.0 * uc::M);
    builder.add_buffer_stop(t0, 0.0 * uc::M);
    builder.add_detector(t0, 700.0 * uc::M);
    builder.add_detector(t0, 200.0 * uc::M);
    builder.add_buffer_stop(t1, 500.0 * uc::M);
    builder.add_link((t0, Endpoint::End), (t1, Endpoint::Begin), navigability);
    builder.add_operational_point("op.west", Some(1), &[(t0, 100.0 * uc::M)]);
    builder.add_operational_point(
        "op.east",
        Some(2),
        &[(t1, 400.0 * uc::M), (t0, 900.0 * uc::M)],
    );
    builder.build()
}

fn endpoint(infra: &Infra, label: &str, endpoint: Endpoint) -> TrackEndpoint {
    TrackEndpoint::new(infra.track_idx(label).unwrap(), endpoint)
}

#[test]
fn test_load() {
    let infra = Infra::load(two_tracks(ApplicableDirection::Both)).unwrap();
    assert_eq!(infra.len(), 2);
    assert_eq!(infra.id, "two_tracks");
    let t0 = infra.track_idx("track.0").unwrap();
    let positions: Vec<f64> = infra
        .waypoints(t0)
        .iter()
        .map(|wp| wp.position().get::<si::meter>())
        .collect();
    assert_eq!(positions, vec![0.0, 200.0, 700.0]);
    assert!(infra.track_idx("missing").is_none());
}

#[test]
fn test_neighbors_both() {
    let infra = Infra::load(two_tracks(ApplicableDirection::Both)).unwrap();
    let t0 = infra.track_idx("track.0").unwrap();
    let t1 = infra.track_idx("track.1").unwrap();

    let fwd = infra.neighbors(t0, Direction::StartToStop);
    assert_eq!(fwd.len(), 1);
    assert!(fwd.contains(&endpoint(&infra, "track.1", Endpoint::Begin)));

    let bwd = infra.neighbors(t1, Direction::StopToStart);
    assert!(bwd.contains(&endpoint(&infra, "track.0", Endpoint::End)));

    // nothing is linked at the outer ends
    assert!(infra.neighbors(t0, Direction::StopToStart).is_empty());
    assert!(infra.neighbors(t1, Direction::StartToStop).is_empty());
}

#[test]
fn test_neighbors_one_way() {
    let normal = Infra::load(two_tracks(ApplicableDirection::Normal)).unwrap();
    let t0 = normal.track_idx("track.0").unwrap();
    let t1 = normal.track_idx("track.1").unwrap();
    assert_eq!(normal.neighbors(t0, Direction::StartToStop).len(), 1);
    assert!(normal.neighbors(t1, Direction::StopToStart).is_empty());

    let reverse = Infra::load(two_tracks(ApplicableDirection::Reverse)).unwrap();
    assert!(reverse.neighbors(t0, Direction::StartToStop).is_empty());
    assert_eq!(reverse.neighbors(t1, Direction::StopToStart).len(), 1);
}

#[test]
fn test_resolve_uic() {
    let infra = Infra::load(two_tracks(ApplicableDirection::Both)).unwrap();
    assert_eq!(infra.resolve_uic(1).len(), 1);
    assert_eq!(infra.resolve_uic(2).len(), 2);
    assert!(infra.resolve_uic(3).is_empty());
    let loc = infra.resolve_uic(1)[0];
    assert_eq!(loc.track, infra.track_idx("track.0").unwrap());
    assert_eq!(loc.offset, 100.0 * uc::M);
}

#[test]
fn test_resolve_location() {
    let infra = Infra::load(two_tracks(ApplicableDirection::Both)).unwrap();
    assert!(infra.resolve_location("track.1", 250.0 * uc::M).is_some());
    assert!(infra.resolve_location("track.1", 600.0 * uc::M).is_none());
    assert!(infra.resolve_location("track.9", 0.0 * uc::M).is_none());
}

#[test]
fn test_unknown_link_track() {
    let mut raw = two_tracks(ApplicableDirection::Both);
    raw.track_links[0].end.track = "nowhere".into();
    assert!(matches!(Infra::load(raw), Err(Error::InvalidTopology(_))));
}

#[test]
fn test_waypoint_out_of_range() {
    let mut raw = two_tracks(ApplicableDirection::Both);
    raw.track_sections[1].route_waypoints.push(Waypoint::Detector {
        id: "too_far".into(),
        position: 501.0 * uc::M,
    });
    match Infra::load(raw) {
        Err(Error::InvalidTopology(msg)) => assert!(msg.contains("too_far"), "{msg}"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_unknown_operational_point() {
    let mut raw = two_tracks(ApplicableDirection::Both);
    raw.operational_points.retain(|op| op.id != "op.east");
    assert!(matches!(Infra::load(raw), Err(Error::InvalidTopology(_))));
}

#[test]
fn test_duplicate_track_id() {
    let mut raw = two_tracks(ApplicableDirection::Both);
    raw.track_sections[1].id = "track.0".into();
    assert!(matches!(Infra::load(raw), Err(Error::InvalidTopology(_))));
}

#[test]
fn test_raw_infra_from_yaml() {
    let yaml = r#"
id: tiny
track_sections:
  - id: a
    length: 100.0
    route_waypoints:
      - type: detector
        id: d.1
        position: 60.0
      - type: buffer_stop
        id: bs.1
        position: 0.0
  - id: b
    length: 50.0
track_links:
  - id: l
    begin: {track: a, endpoint: END}
    end: {track: b, endpoint: BEGIN}
"#;
    let raw = RawInfra::from_yaml(yaml, false).unwrap();
    // `init` sorts waypoints
    assert_eq!(raw.track_sections[0].route_waypoints[0].id(), "bs.1");
    let infra = Infra::load(raw).unwrap();
    let a = infra.track_idx("a").unwrap();
    assert_eq!(infra.neighbors(a, Direction::StartToStop).len(), 1);
}
