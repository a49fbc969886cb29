// tests/navigation_tests.rs
// End-to-end guidance scenarios driven through the public API.

use approx::assert_relative_eq;
use mockall::mock;
use route_guidance::{
    Clock, Edge, EdgeType, GuidanceConfig, GuidanceError, GuidanceManager, GuideStatus, Map,
    Motion, MoveStatus, Node, NodeType, Path, TopometricPose,
};
use rstest::{fixture, rstest};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

mock! {
    pub TestClock {}
    impl Clock for TestClock {
        fn now(&self) -> Instant;
    }
}

fn edge(id: u64, a: u64, b: u64, length: f64, edge_type: EdgeType) -> Edge {
    Edge {
        id,
        node_id1: a,
        node_id2: b,
        length,
        edge_type,
    }
}

// A(1) -> B(2) -> C(3): junctions at A and B, left turn at B.
// X(9) hangs off A and is never on the plan.
#[fixture]
fn corner_map() -> Map {
    let mut map = Map::new();
    map.add_node(Node::new(1, 0.0, 0.0, NodeType::Junction)).unwrap();
    map.add_node(Node::new(2, 0.0, 10.0, NodeType::Junction)).unwrap();
    map.add_node(Node::new(3, 10.0, 10.0, NodeType::Basic)).unwrap();
    map.add_node(Node::new(9, -10.0, 0.0, NodeType::Basic)).unwrap();
    map.add_edge(edge(11, 1, 2, 10.0, EdgeType::Sidewalk)).unwrap();
    map.add_edge(edge(12, 2, 3, 10.0, EdgeType::Sidewalk)).unwrap();
    map.add_edge(edge(13, 1, 9, 10.0, EdgeType::Sidewalk)).unwrap();
    map
}

fn manager_for(map: Map, config: GuidanceConfig, final_turn: i32) -> GuidanceManager {
    let path = Path::from_node_sequence(&map, &[1, 2, 3]).unwrap();
    let mut manager = GuidanceManager::new(config);
    manager.initiate_new_guidance(path, map, final_turn).unwrap();
    manager
}

fn short_approach() -> GuidanceConfig {
    GuidanceConfig {
        approach_threshold: 2.0,
        ..Default::default()
    }
}

#[rstest]
fn test_corner_route_end_to_end(corner_map: Map) {
    let mut m = manager_for(corner_map, short_approach(), 0);

    // standing on A facing B
    let status = m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    assert_eq!(status, GuideStatus::Initial);
    assert_eq!(m.move_status(), MoveStatus::OnNode);
    let g = m.guidance();
    assert_eq!(g.actions.len(), 1);
    assert_eq!(g.actions[0].motion, Motion::GoForward);
    assert_eq!(g.actions[0].node_type, NodeType::Junction);
    assert_eq!(g.heading_node_id, 2);
    assert_eq!(m.guide_index(), Some(0));

    // mid-edge: keep going
    let status = m.update(TopometricPose::new(1, 0, 5.0), 0.9).unwrap();
    assert_eq!(status, GuideStatus::Normal);
    assert_eq!(m.move_status(), MoveStatus::OnEdge);
    assert_relative_eq!(m.remain_distance(), 5.0);
    assert_eq!(
        m.guidance().msg,
        "[Guide] [ON_EDGE] GO_FORWARD on SIDEWALK about 5.0m until next JUNCTION(Node ID : 2)"
    );

    // one meter before B: announce the left turn and the leg after it
    let status = m.update(TopometricPose::new(1, 0, 9.0), 0.9).unwrap();
    assert_eq!(status, GuideStatus::Normal);
    assert_eq!(m.move_status(), MoveStatus::ApproachingNode);
    let motions: Vec<Motion> = m.guidance().actions.iter().map(|a| a.motion).collect();
    assert_eq!(motions, vec![Motion::TurnLeft, Motion::GoForward]);
    assert_eq!(m.guidance().actions[0].degree, 90);
    assert!(m
        .guidance()
        .msg
        .starts_with("[Guide] [APPROACHING_NODE] After 1.0m TURN_LEFT for 90 degree on JUNCTION"));

    // on B, pointing down B-C
    let status = m.update(TopometricPose::new(2, 1, 0.0), 0.9).unwrap();
    assert_eq!(status, GuideStatus::Normal);
    assert_eq!(m.guide_index(), Some(1));
    let motions: Vec<Motion> = m.guidance().actions.iter().map(|a| a.motion).collect();
    assert_eq!(motions, vec![Motion::TurnLeft, Motion::GoForward]);
    assert_eq!(m.guidance().heading_node_id, 3);

    // at C
    let status = m.update(TopometricPose::new(3, 0, 0.0), 0.9).unwrap();
    assert_eq!(status, GuideStatus::Arrived);
    let g = m.guidance();
    assert_eq!(g.actions.last().map(|a| a.motion), Some(Motion::Stop));
    assert_eq!(g.msg, "[GUIDANCE] Arrived!");
    assert_eq!(g.heading_node_id, 0);

    // one archive per guide index change: 0 -> 1 -> 2
    assert_eq!(m.past_guidances().count(), 2);
}

#[rstest]
fn test_approach_on_last_leg_keeps_going(corner_map: Map) {
    let mut m = manager_for(corner_map, short_approach(), 0);
    m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    m.update(TopometricPose::new(2, 1, 9.5), 0.9).unwrap();
    assert_eq!(m.move_status(), MoveStatus::ApproachingNode);
    let motions: Vec<Motion> = m.guidance().actions.iter().map(|a| a.motion).collect();
    assert_eq!(motions, vec![Motion::GoForward]);
}

#[rstest]
fn test_final_turn_precedes_stop(corner_map: Map) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), -90);
    m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    m.update(TopometricPose::new(3, 0, 0.0), 0.9).unwrap();
    let g = m.guidance();
    let motions: Vec<Motion> = g.actions.iter().map(|a| a.motion).collect();
    // C is a plain node, so the turn is not a directional motion
    assert_eq!(motions, vec![Motion::GoForward, Motion::Stop]);
    assert_eq!(g.msg, "GO_FORWARD for -90 degree on POI and [GUIDANCE] Arrived!");
}

#[rstest]
fn test_final_turn_back_at_destination(corner_map: Map) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), 180);
    m.update(TopometricPose::new(3, 0, 0.0), 0.9).unwrap();
    let motions: Vec<Motion> = m.guidance().actions.iter().map(|a| a.motion).collect();
    assert_eq!(motions, vec![Motion::TurnBack, Motion::Stop]);
}

#[rstest]
fn test_leaving_destination_drops_plan(corner_map: Map) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), 0);
    m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    assert_eq!(m.update(TopometricPose::new(3, 0, 0.0), 0.9).unwrap(), GuideStatus::Arrived);
    // staying on the destination keeps reporting arrival
    assert_eq!(m.update(TopometricPose::new(3, 0, 0.5), 0.9).unwrap(), GuideStatus::Arrived);

    assert_eq!(m.update(TopometricPose::new(2, 1, 3.0), 0.9).unwrap(), GuideStatus::NoPath);
    assert!(!m.has_plan());
    assert!(m.guidance().actions.is_empty());
    assert_eq!(m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap(), GuideStatus::NoPath);
}

#[rstest]
fn test_initial_wrong_direction_turns_back(corner_map: Map) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), 0);
    // on A, but facing the off-path edge toward X
    let status = m.update(TopometricPose::new(1, 1, 0.0), 0.9).unwrap();
    assert_eq!(status, GuideStatus::Initial);
    let motions: Vec<Motion> = m.guidance().actions.iter().map(|a| a.motion).collect();
    assert_eq!(motions, vec![Motion::TurnBack, Motion::GoForward]);
    assert_eq!(m.guidance().actions[0].degree, 180);
    assert_eq!(m.guidance().heading_node_id, 2);
}

#[rstest]
fn test_initial_low_confidence_is_silent(corner_map: Map) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), 0);
    let status = m.update(TopometricPose::new(1, 0, 0.0), 0.3).unwrap();
    assert_eq!(status, GuideStatus::Initial);
    assert!(m.guidance().actions.is_empty());
    assert_eq!(m.guidance().msg, "");
}

#[rstest]
fn test_crosswalk_defers_approach_until_halfway() {
    let mut map = Map::new();
    map.add_node(Node::new(1, 0.0, 0.0, NodeType::Junction)).unwrap();
    map.add_node(Node::new(2, 0.0, 10.0, NodeType::Junction)).unwrap();
    map.add_node(Node::new(3, 10.0, 10.0, NodeType::Basic)).unwrap();
    map.add_edge(edge(11, 1, 2, 10.0, EdgeType::Crosswalk)).unwrap();
    map.add_edge(edge(12, 2, 3, 10.0, EdgeType::Sidewalk)).unwrap();
    let config = GuidanceConfig {
        approach_threshold: 8.0,
        ..Default::default()
    };
    let mut m = manager_for(map, config, 0);
    m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    assert_eq!(m.guidance().actions[0].motion, Motion::CrossForward);

    // 7m left of a 10m crosswalk: still crossing
    m.update(TopometricPose::new(1, 0, 3.0), 0.9).unwrap();
    assert_eq!(m.move_status(), MoveStatus::OnEdge);

    m.update(TopometricPose::new(1, 0, 6.0), 0.9).unwrap();
    assert_eq!(m.move_status(), MoveStatus::ApproachingNode);
    assert_eq!(m.guidance().actions[0].motion, Motion::TurnLeft);
}

#[test]
fn test_junction_guide_tracks_next_junction() {
    // 1(J) - 2 - 3(J) - 4: node 2 is not a decision point
    let mut map = Map::new();
    map.add_node(Node::new(1, 0.0, 0.0, NodeType::Junction)).unwrap();
    map.add_node(Node::new(2, 0.0, 10.0, NodeType::Basic)).unwrap();
    map.add_node(Node::new(3, 0.0, 20.0, NodeType::Junction)).unwrap();
    map.add_node(Node::new(4, 10.0, 20.0, NodeType::Basic)).unwrap();
    map.add_edge(edge(21, 1, 2, 10.0, EdgeType::Sidewalk)).unwrap();
    map.add_edge(edge(22, 2, 3, 12.0, EdgeType::Sidewalk)).unwrap();
    map.add_edge(edge(23, 3, 4, 10.0, EdgeType::Sidewalk)).unwrap();
    let path = Path::from_node_sequence(&map, &[1, 2, 3, 4]).unwrap();

    let config = GuidanceConfig {
        junction_guide: true,
        ..Default::default()
    };
    let mut m = GuidanceManager::new(config);
    m.initiate_new_guidance(path.clone(), map.clone(), 0).unwrap();
    m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    m.update(TopometricPose::new(1, 0, 5.0), 0.9).unwrap();
    // 10 + 12 - 5
    assert_relative_eq!(m.remain_distance(), 17.0);

    let mut plain = GuidanceManager::new(GuidanceConfig::default());
    plain.initiate_new_guidance(path, map, 0).unwrap();
    plain.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    plain.update(TopometricPose::new(1, 0, 5.0), 0.9).unwrap();
    assert_relative_eq!(plain.remain_distance(), 5.0);
}

#[rstest]
fn test_off_path_timeout_with_scripted_clock(corner_map: Map) {
    let offset = Arc::new(Mutex::new(Duration::ZERO));
    let base = Instant::now();
    let shared = Arc::clone(&offset);
    let mut clock = MockTestClock::new();
    clock
        .expect_now()
        .returning(move || base + *shared.lock().unwrap());

    let mut m = GuidanceManager::with_clock(GuidanceConfig::default(), clock);
    let path = Path::from_node_sequence(&corner_map, &[1, 2, 3]).unwrap();
    m.initiate_new_guidance(path, corner_map, 0).unwrap();
    m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();

    let stray = TopometricPose::new(9, 0, 4.0);
    let mut statuses = Vec::new();
    for secs in [0, 1, 3, 5, 8] {
        *offset.lock().unwrap() = Duration::from_secs(secs);
        statuses.push(m.update(stray, 0.6).unwrap());
    }
    assert_eq!(
        statuses,
        vec![
            GuideStatus::OopDetect,
            GuideStatus::OopDetect,
            GuideStatus::OopDetect,
            GuideStatus::Oop,
            GuideStatus::Oop,
        ]
    );
    // the guide index is kept while off the plan
    assert_eq!(m.guide_index(), Some(0));

    *offset.lock().unwrap() = Duration::from_secs(9);
    assert_eq!(m.update(TopometricPose::new(1, 0, 1.5), 0.9).unwrap(), GuideStatus::Normal);
}

#[rstest]
#[case(0.05, GuideStatus::Lost)]
#[case(0.09, GuideStatus::Lost)]
#[case(0.1, GuideStatus::OopDetect)]
fn test_off_path_confidence_split(corner_map: Map, #[case] conf: f64, #[case] expected: GuideStatus) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), 0);
    m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    assert_eq!(m.update(TopometricPose::new(9, 0, 2.0), conf).unwrap(), expected);
}

#[rstest]
fn test_zero_node_pose_is_rejected(corner_map: Map) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), 0);
    let err = m.update(TopometricPose::new(0, 0, 0.0), 0.9).unwrap_err();
    assert!(matches!(err, GuidanceError::InvalidInput(_)));
    assert_eq!(m.guide_status(), GuideStatus::Unknown);
    assert!(m.guidance().actions.is_empty());
}

#[rstest]
fn test_bad_edge_index_empties_guidance(corner_map: Map) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), 0);
    m.update(TopometricPose::new(1, 0, 0.0), 0.9).unwrap();
    let err = m.update(TopometricPose::new(1, 7, 0.0), 0.9).unwrap_err();
    assert!(matches!(err, GuidanceError::InconsistentGraph(_)));
    assert!(m.guidance().actions.is_empty());
    assert!(m.guidance().msg.is_empty());
}

#[test]
fn test_update_without_plan_is_nopath() {
    let mut m = GuidanceManager::new(GuidanceConfig::default());
    assert_eq!(m.update(TopometricPose::new(4, 0, 1.0), 0.9).unwrap(), GuideStatus::NoPath);
    assert_eq!(m.guidance().guide_status, GuideStatus::NoPath);
}

#[rstest]
fn test_rejected_plan_keeps_previous(corner_map: Map) {
    let mut m = manager_for(corner_map.clone(), GuidanceConfig::default(), 0);
    let bogus = Path::new(vec![route_guidance::PathPoint {
        node_id: 42,
        edge_id: 0,
    }]);
    assert!(m.initiate_new_guidance(bogus, corner_map.clone(), 0).is_err());
    assert!(m.initiate_new_guidance(Path::default(), corner_map, 0).is_err());
    assert!(m.has_plan());
    assert_eq!(m.extended_path().len(), 3);
}

#[rstest]
fn test_heading_and_lost_value_exposed(corner_map: Map) {
    let mut m = manager_for(corner_map, GuidanceConfig::default(), 0);
    let pose = TopometricPose::new(1, 0, 0.0).with_heading(90.5_f64.to_radians());
    m.update(pose, 0.95).unwrap();
    assert_eq!(m.current_heading_degree(), 90);
    assert_eq!(m.lost_value(), 0.0);
    m.update(TopometricPose::new(1, 0, 2.0), 0.3).unwrap();
    assert_eq!(m.lost_value(), 100.0);
}
