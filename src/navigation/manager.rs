//! Guidance state machine
//!
//! [`GuidanceManager`] consumes one topometric pose and confidence per update,
//! classifies the agent's progress against the accepted plan and produces the
//! next [`Guidance`]. Updates are synchronous and must not overlap; callers
//! sharing a manager across threads wrap it in a `Mutex`.

use super::extended_path::ExtendedPath;
use super::formatter::{guidance_message, turn_phrase};
use super::guidance::{is_forward, motion_for, Action, GuideStatus, Guidance, MoveStatus};
use crate::localization::{Clock, LostValueFilter, SystemClock, TopometricPose};
use crate::map::{EdgeType, Id, Map, Path};
use crate::{GuidanceConfig, GuidanceError, Result};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::time::Instant;

/// Per-plan session state, cleared whenever a plan is accepted or abandoned
#[derive(Clone, Debug)]
struct GuidanceSession {
    /// Position in the extended path matching the agent's node; `None` until resolved
    guide_idx: Option<usize>,
    guide_status: GuideStatus,
    move_status: MoveStatus,
    pose: TopometricPose,
    cur_edge_id: Id,
    confidence: f64,
    remain_distance: f64,
    cur_head_degree: i32,
    oop_start: Option<Instant>,
    arrival: bool,
    lost: LostValueFilter,
    current: Guidance,
    past_guides: VecDeque<Guidance>,
}

impl GuidanceSession {
    fn new(config: &GuidanceConfig) -> Self {
        GuidanceSession {
            guide_idx: None,
            guide_status: GuideStatus::NoPath,
            move_status: MoveStatus::OnNode,
            pose: TopometricPose::default(),
            cur_edge_id: 0,
            confidence: 0.0,
            remain_distance: 0.0,
            cur_head_degree: 0,
            oop_start: None,
            arrival: false,
            lost: LostValueFilter::new(config.lost_filter.clone()),
            current: Guidance::default(),
            past_guides: VecDeque::with_capacity(config.history_limit.min(100)),
        }
    }

    fn reset(&mut self) {
        self.guide_idx = None;
        self.guide_status = GuideStatus::NoPath;
        self.move_status = MoveStatus::OnNode;
        self.pose = TopometricPose::default();
        self.cur_edge_id = 0;
        self.confidence = 0.0;
        self.remain_distance = 0.0;
        self.cur_head_degree = 0;
        self.oop_start = None;
        self.arrival = false;
        self.lost.reset();
        self.current = Guidance::default();
        self.past_guides.clear();
    }
}

/// Pose-driven guidance state machine for one navigation session
pub struct GuidanceManager<C: Clock = SystemClock> {
    config: GuidanceConfig,
    clock: C,
    map: Map,
    path: Path,
    extended_path: ExtendedPath,
    session: GuidanceSession,
}

impl GuidanceManager<SystemClock> {
    /// Creates a manager timed by the wall clock
    pub fn new(config: GuidanceConfig) -> Self {
        GuidanceManager::with_clock(config, SystemClock)
    }
}

impl<C: Clock> GuidanceManager<C> {
    /// Creates a manager with an explicit time source
    pub fn with_clock(config: GuidanceConfig, clock: C) -> Self {
        let session = GuidanceSession::new(&config);
        GuidanceManager {
            config,
            clock,
            map: Map::new(),
            path: Path::default(),
            extended_path: ExtendedPath::default(),
            session,
        }
    }

    /// Accepts a new plan and starts a fresh session.
    ///
    /// The plan is only replaced when the extended path builds successfully.
    pub fn initiate_new_guidance(&mut self, path: Path, map: Map, final_turn: i32) -> Result<()> {
        if path.is_empty() {
            error!("initiate_new_guidance: no path input");
            return Err(GuidanceError::InvalidInput("no path input".to_string()));
        }
        if map.is_empty() {
            error!("initiate_new_guidance: empty map");
            return Err(GuidanceError::InvalidInput("empty map".to_string()));
        }
        let extended_path = ExtendedPath::build(&path, &map, final_turn).map_err(|e| {
            error!("initiate_new_guidance: plan rejected: {}", e);
            e
        })?;

        self.map = map;
        self.path = path;
        self.extended_path = extended_path;
        self.session.reset();
        self.session.guide_status = GuideStatus::Initial;
        info!(
            "New guidance accepted: {} waypoints to node {}",
            self.path.len(),
            self.extended_path.last().map_or(0, |e| e.cur_node_id)
        );
        Ok(())
    }

    /// Drops the current plan; further updates report NOPATH
    pub fn clear_plan(&mut self) {
        self.path = Path::default();
        self.extended_path = ExtendedPath::default();
        self.session.reset();
    }

    /// Whether a plan is currently accepted
    pub fn has_plan(&self) -> bool {
        !self.extended_path.is_empty()
    }

    /// Processes one pose update and refreshes the current guidance.
    ///
    /// Off-path, lost and no-plan conditions are reported through the returned
    /// status with an empty guidance; errors are returned for invalid poses and
    /// map inconsistencies, after which the guidance is empty as well.
    pub fn update(&mut self, pose: TopometricPose, confidence: f64) -> Result<GuideStatus> {
        if pose.node_id == 0 {
            error!("update: empty pose (node id 0)");
            self.session.guide_status = GuideStatus::Unknown;
            self.set_empty_guide();
            return Err(GuidanceError::InvalidInput("pose node id is 0".to_string()));
        }

        match self.run_cycle(&pose, confidence) {
            Ok(()) => Ok(self.session.guide_status),
            // the STOP guidance stays in place
            Err(GuidanceError::PoseUnavailable) => Err(GuidanceError::PoseUnavailable),
            Err(e) => {
                error!("update: guidance cycle failed: {}", e);
                self.set_empty_guide();
                Err(e)
            }
        }
    }

    fn run_cycle(&mut self, pose: &TopometricPose, confidence: f64) -> Result<()> {
        let status = self.set_guide_status(pose, confidence);
        // after classification, so a plan reset does not discard this sample
        self.session.lost.update(confidence);
        if !status.is_failure() {
            self.apply_pose(pose)?;
        }
        self.set_guidance_with_guide_status()
    }

    fn set_guide_status(&mut self, pose: &TopometricPose, confidence: f64) -> GuideStatus {
        self.session.confidence = confidence;
        let previous = self.session.guide_status;

        let Some(last_node_id) = self.extended_path.last().map(|e| e.cur_node_id) else {
            if previous != GuideStatus::NoPath {
                warn!("No path to guide along");
            }
            self.session.guide_status = GuideStatus::NoPath;
            return GuideStatus::NoPath;
        };

        let status = if pose.node_id == last_node_id {
            if !self.session.arrival {
                info!("Arrived at destination node {}", last_node_id);
            }
            self.session.arrival = true;
            GuideStatus::Arrived
        } else if self.session.arrival {
            warn!(
                "Moved on from destination to node {}; clearing plan",
                pose.node_id
            );
            self.clear_plan();
            GuideStatus::NoPath
        } else if self.session.guide_idx.is_none() {
            GuideStatus::Initial
        } else if self.extended_path.contains_node(pose.node_id) {
            self.session.oop_start = None;
            GuideStatus::Normal
        } else if confidence >= self.config.oop_min_confidence {
            // confidently somewhere else: off the plan once the timer runs out
            let now = self.clock.now();
            let start = *self.session.oop_start.get_or_insert(now);
            let elapsed = now.saturating_duration_since(start).as_secs_f64();
            if elapsed >= self.config.oop_timeout_secs {
                if previous != GuideStatus::Oop {
                    warn!("Node {} is out of path", pose.node_id);
                }
                GuideStatus::Oop
            } else {
                if previous != GuideStatus::OopDetect {
                    warn!("Node {} out of path detected", pose.node_id);
                }
                GuideStatus::OopDetect
            }
        } else {
            if previous != GuideStatus::Lost {
                warn!("Lost: unknown node {} (confidence {:.2})", pose.node_id, confidence);
            }
            GuideStatus::Lost
        };

        self.session.guide_status = status;
        status
    }

    /// Updates guide index, remaining distance, heading and move status from a pose
    fn apply_pose(&mut self, pose: &TopometricPose) -> Result<()> {
        self.session.pose = *pose;

        let node = self.map.find_node(pose.node_id).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("pose node {} is not in map", pose.node_id))
        })?;
        let cur_edge_id = *node.edge_ids.get(pose.edge_idx).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!(
                "node {} has no edge index {}",
                pose.node_id, pose.edge_idx
            ))
        })?;
        let cur_edge = self.map.find_edge(cur_edge_id).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("edge {} is not in map", cur_edge_id))
        })?;
        let (edge_length, edge_type) = (cur_edge.length, cur_edge.edge_type);

        match self.extended_path.position_of_node(pose.node_id) {
            Some(idx) => {
                if self.session.guide_idx.is_some_and(|prev| prev != idx) {
                    self.archive_current_guidance();
                }
                self.session.guide_idx = Some(idx);
            }
            None => match self.session.guide_status {
                GuideStatus::Initial | GuideStatus::OopDetect => {}
                status => {
                    return Err(GuidanceError::UnknownState(format!(
                        "node {} is not on the path in status {:?}",
                        pose.node_id, status
                    )));
                }
            },
        }

        let idx = self.session.guide_idx;
        let on_tracked_edge = idx
            .and_then(|i| self.extended_path.get(i))
            .is_some_and(|ep| ep.cur_edge_id == cur_edge_id);

        let mut tracked_distance = edge_length;
        if self.config.junction_guide && on_tracked_edge {
            tracked_distance += idx
                .and_then(|i| self.extended_path.get(i + 1))
                .map_or(0.0, |ep| ep.remain_distance_to_next_junction);
        }

        self.session.cur_edge_id = cur_edge_id;
        self.session.remain_distance = tracked_distance - pose.dist;
        self.session.cur_head_degree = pose.heading_degree();
        self.session.move_status = self.classify_move(pose.dist, on_tracked_edge, edge_length, edge_type);

        debug!(
            "apply_pose: node {} edge {} idx {:?} remain {:.2} {:?}",
            pose.node_id, cur_edge_id, idx, self.session.remain_distance, self.session.move_status
        );
        Ok(())
    }

    fn classify_move(&self, dist: f64, on_tracked_edge: bool, edge_length: f64, edge_type: EdgeType) -> MoveStatus {
        let remain = self.session.remain_distance;
        if !dist.is_finite() {
            MoveStatus::StopWait
        } else if dist < self.config.on_node_distance {
            MoveStatus::OnNode
        } else if remain < self.config.approach_threshold && on_tracked_edge {
            // keep the current instruction until halfway across a crosswalk
            if edge_type == EdgeType::Crosswalk && remain > edge_length / 2.0 {
                MoveStatus::OnEdge
            } else {
                MoveStatus::ApproachingNode
            }
        } else {
            MoveStatus::OnEdge
        }
    }

    fn set_guidance_with_guide_status(&mut self) -> Result<()> {
        match self.session.guide_status {
            GuideStatus::Initial => self.set_initial_guide(),
            GuideStatus::Normal | GuideStatus::OopDetect => self.set_normal_guide(),
            GuideStatus::Arrived => self.set_arrival_guide(),
            GuideStatus::Oop | GuideStatus::Lost | GuideStatus::NoPath | GuideStatus::Unknown => {
                self.set_empty_guide();
                Ok(())
            }
        }
    }

    fn new_guide(&self) -> Guidance {
        Guidance {
            guide_status: self.session.guide_status,
            moving_status: self.session.move_status,
            distance_to_remain: self.session.remain_distance,
            ..Default::default()
        }
    }

    fn set_initial_guide(&mut self) -> Result<()> {
        let first = self
            .extended_path
            .first()
            .cloned()
            .ok_or_else(|| GuidanceError::UnknownState("initial guidance without a plan".to_string()))?;

        let mut guide = self.new_guide();
        guide.heading_node_id = first.next_node_id;

        if self.session.move_status == MoveStatus::StopWait {
            warn!("No pose info; holding position");
            guide.actions.push(Action::stop());
            guide.distance_to_remain = 0.0;
            guide.msg = "No pose info".to_string();
            self.session.current = guide;
            return Err(GuidanceError::PoseUnavailable);
        }

        if self.session.confidence > self.config.initial_guide_confidence {
            let cur_node_id = self.session.pose.node_id;
            let cur_edge_id = self.session.cur_edge_id;
            let next_node_id = self
                .map
                .find_edge(cur_edge_id)
                .and_then(|e| e.other_end(cur_node_id))
                .ok_or_else(|| {
                    GuidanceError::InconsistentGraph(format!(
                        "edge {} is not incident to node {}",
                        cur_edge_id, cur_node_id
                    ))
                })?;
            let edge_on_path = self.extended_path.position_of_edge(cur_edge_id);

            let wrong_way = !self.extended_path.contains_node(next_node_id)
                || (edge_on_path.is_some() && next_node_id == first.cur_node_id);
            if wrong_way {
                warn!(
                    "Initial guidance: wrong direction on edge {} toward node {}",
                    cur_edge_id, next_node_id
                );
                guide.actions.push(self.action_turn(cur_node_id, cur_edge_id, 180)?);
                self.session.remain_distance = self.session.pose.dist;
                guide.distance_to_remain = self.session.remain_distance;
            }

            // element the agent is heading for
            let next_ep = edge_on_path
                .and_then(|k| self.extended_path.get(k + 1))
                .cloned()
                .unwrap_or(first);

            if self.session.move_status == MoveStatus::ApproachingNode && !next_ep.is_terminal() {
                if !is_forward(next_ep.cur_degree) {
                    guide.actions.push(self.action_turn(
                        next_ep.cur_node_id,
                        next_ep.cur_edge_id,
                        next_ep.cur_degree,
                    )?);
                }
                guide.actions.push(self.action_go(next_ep.next_node_id, next_ep.cur_edge_id)?);
                guide.heading_node_id = next_ep.cur_node_id;
            } else if next_ep.cur_node_id == cur_node_id && !next_ep.is_terminal() {
                guide.actions.push(self.action_go(next_ep.next_node_id, next_ep.cur_edge_id)?);
                guide.heading_node_id = next_ep.next_node_id;
            } else {
                guide.actions.push(self.action_go(next_ep.cur_node_id, cur_edge_id)?);
                guide.heading_node_id = next_ep.cur_node_id;
            }
        }

        guide.msg = guidance_message(&guide);
        self.session.current = guide;
        Ok(())
    }

    fn set_normal_guide(&mut self) -> Result<()> {
        let idx = self.session.guide_idx.ok_or_else(|| {
            GuidanceError::UnknownState("normal guidance without a guide index".to_string())
        })?;
        if idx + 1 >= self.extended_path.len() {
            return Err(GuidanceError::UnknownState(
                "normal guidance cannot be given for the last path node".to_string(),
            ));
        }
        let elements = self.extended_path.elements();
        let cur = elements[idx].clone();
        let next = elements[idx + 1].clone();

        let mut guide = self.new_guide();
        guide.heading_node_id = cur.next_node_id;

        match self.session.move_status {
            MoveStatus::OnNode => {
                if !is_forward(cur.cur_degree) {
                    guide.actions.push(self.action_turn(cur.cur_node_id, cur.cur_edge_id, cur.cur_degree)?);
                }
                guide.actions.push(self.action_go(cur.next_node_id, cur.cur_edge_id)?);
            }
            MoveStatus::OnEdge => {
                // no turn is announced mid-edge
                guide.actions.push(self.action_go(cur.next_node_id, cur.cur_edge_id)?);
            }
            MoveStatus::ApproachingNode => {
                if next.cur_edge_id == 0 || next.next_node_id == 0 {
                    guide.actions.push(self.action_go(cur.next_node_id, cur.cur_edge_id)?);
                } else {
                    if !is_forward(next.cur_degree) {
                        guide.actions.push(self.action_turn(
                            next.cur_node_id,
                            next.cur_edge_id,
                            next.cur_degree,
                        )?);
                    }
                    guide.actions.push(self.action_go(next.next_node_id, next.cur_edge_id)?);
                }
            }
            MoveStatus::StopWait => {
                warn!("No pose info; holding position");
                guide.actions.push(Action::stop());
                guide.distance_to_remain = 0.0;
                guide.msg = "No pose info".to_string();
                self.session.current = guide;
                return Err(GuidanceError::PoseUnavailable);
            }
        }

        guide.msg = guidance_message(&guide);
        self.session.current = guide;
        Ok(())
    }

    fn set_arrival_guide(&mut self) -> Result<()> {
        let dest_id = self
            .extended_path
            .last()
            .map(|e| e.cur_node_id)
            .ok_or_else(|| GuidanceError::UnknownState("arrival without a plan".to_string()))?;
        let final_turn = self.extended_path.final_turn();

        let mut guide = self.new_guide();
        guide.guide_status = GuideStatus::Arrived;
        guide.heading_node_id = 0;
        guide.distance_to_remain = 0.0;

        let mut msg = String::new();
        if !is_forward(final_turn) {
            let dest = self.map.find_node(dest_id).ok_or_else(|| {
                GuidanceError::InconsistentGraph(format!("undefined last node {}", dest_id))
            })?;
            let action = Action::new(
                motion_for(dest.node_type, EdgeType::Sidewalk, final_turn),
                dest.node_type,
                EdgeType::Sidewalk,
                final_turn,
            );
            msg = format!("{} and ", turn_phrase(&action, dest.node_type));
            guide.actions.push(action);
        }
        guide.actions.push(Action::stop());
        guide.msg = msg + "[GUIDANCE] Arrived!";

        self.session.current = guide;
        Ok(())
    }

    fn set_empty_guide(&mut self) {
        self.session.current = Guidance {
            guide_status: self.session.guide_status,
            moving_status: self.session.move_status,
            ..Default::default()
        };
    }

    fn action_turn(&self, node_id: Id, edge_id: Id, degree: i32) -> Result<Action> {
        let node = self.map.find_node(node_id).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("turn node {} is not in map", node_id))
        })?;
        let edge = self.map.find_edge(edge_id).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("turn edge {} is not in map", edge_id))
        })?;
        Ok(Action::new(
            motion_for(node.node_type, edge.edge_type, degree),
            node.node_type,
            edge.edge_type,
            degree,
        ))
    }

    fn action_go(&self, next_node_id: Id, edge_id: Id) -> Result<Action> {
        let node = self.map.find_node(next_node_id).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("go node {} is not in map", next_node_id))
        })?;
        let edge = self.map.find_edge(edge_id).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("go edge {} is not in map", edge_id))
        })?;
        Ok(Action::new(
            motion_for(node.node_type, edge.edge_type, 0),
            node.node_type,
            edge.edge_type,
            0,
        ))
    }

    fn archive_current_guidance(&mut self) {
        if self.config.history_limit == 0 {
            return;
        }
        while self.session.past_guides.len() >= self.config.history_limit {
            self.session.past_guides.pop_front();
        }
        self.session.past_guides.push_back(self.session.current.clone());
    }

    /// Updates the lost-score from an explicit confidence pair
    pub fn make_lost_value(&mut self, prev_conf: f64, cur_conf: f64) -> f64 {
        self.session.lost.make_lost_value(prev_conf, cur_conf)
    }

    /// Guidance produced by the latest update
    pub fn guidance(&self) -> &Guidance {
        &self.session.current
    }

    /// Guidances archived each time the guide index moved, oldest first
    pub fn past_guidances(&self) -> impl Iterator<Item = &Guidance> {
        self.session.past_guides.iter()
    }

    /// Latest guide status
    pub fn guide_status(&self) -> GuideStatus {
        self.session.guide_status
    }

    /// Latest move status
    pub fn move_status(&self) -> MoveStatus {
        self.session.move_status
    }

    /// Extended-path index of the agent, once resolved
    pub fn guide_index(&self) -> Option<usize> {
        self.session.guide_idx
    }

    /// Meters left to the tracked node or junction
    pub fn remain_distance(&self) -> f64 {
        self.session.remain_distance
    }

    /// Latest pose heading in whole degrees
    pub fn current_heading_degree(&self) -> i32 {
        self.session.cur_head_degree
    }

    /// Smoothed lost-score in [0, 100]
    pub fn lost_value(&self) -> f64 {
        self.session.lost.lost_value()
    }

    /// Latest confidence sample
    pub fn confidence(&self) -> f64 {
        self.session.confidence
    }

    /// Annotated plan
    pub fn extended_path(&self) -> &ExtendedPath {
        &self.extended_path
    }

    /// Accepted path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Map of the accepted plan
    pub fn map(&self) -> &Map {
        &self.map
    }

    /// Active configuration
    pub fn config(&self) -> &GuidanceConfig {
        &self.config
    }
}
