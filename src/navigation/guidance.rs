// src/navigation/guidance.rs
// Guidance output types and the rules that pick a motion command for a node.

use crate::map::{EdgeType, Id, NodeType};
use serde::{Deserialize, Serialize};

/// Progress of the agent against the current plan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuideStatus {
    /// Plan accepted, agent not yet resolved onto it
    Initial,
    /// Following the plan
    Normal,
    /// Reached the destination
    Arrived,
    /// Off the plan for less than the hysteresis timeout
    OopDetect,
    /// Off the plan for longer than the hysteresis timeout
    Oop,
    /// Localizer does not know where the agent is
    Lost,
    /// No plan to follow
    NoPath,
    /// Invalid pose or unexpected state
    Unknown,
}

impl GuideStatus {
    /// Statuses for which no guidance is produced
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            GuideStatus::Oop | GuideStatus::Lost | GuideStatus::NoPath | GuideStatus::Unknown
        )
    }
}

/// Progress along the currently occupied edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveStatus {
    /// Within the on-node distance of the last node
    OnNode,
    /// Travelling along the edge
    OnEdge,
    /// Close to the next node
    ApproachingNode,
    /// No usable progress information
    StopWait,
}

impl MoveStatus {
    /// Every move status
    pub const ALL: [MoveStatus; 4] = [
        MoveStatus::OnNode,
        MoveStatus::OnEdge,
        MoveStatus::ApproachingNode,
        MoveStatus::StopWait,
    ];

    /// Display name used in guidance messages
    pub fn name(self) -> &'static str {
        match self {
            MoveStatus::OnNode => "ON_NODE",
            MoveStatus::OnEdge => "ON_EDGE",
            MoveStatus::ApproachingNode => "APPROACHING_NODE",
            MoveStatus::StopWait => "STOP_WAIT",
        }
    }
}

/// Motion command attached to a guidance action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Motion {
    /// Keep going
    GoForward,
    /// Cross straight ahead
    CrossForward,
    /// Enter straight ahead
    EnterForward,
    /// Turn left
    TurnLeft,
    /// Cross to the left
    CrossLeft,
    /// Enter on the left
    EnterLeft,
    /// Turn right
    TurnRight,
    /// Cross to the right
    CrossRight,
    /// Enter on the right
    EnterRight,
    /// Turn around
    TurnBack,
    /// Stop moving
    Stop,
}

impl Motion {
    /// Every motion
    pub const ALL: [Motion; 11] = [
        Motion::GoForward,
        Motion::CrossForward,
        Motion::EnterForward,
        Motion::TurnLeft,
        Motion::CrossLeft,
        Motion::EnterLeft,
        Motion::TurnRight,
        Motion::CrossRight,
        Motion::EnterRight,
        Motion::TurnBack,
        Motion::Stop,
    ];

    /// Display name used in guidance messages
    pub fn name(self) -> &'static str {
        match self {
            Motion::GoForward => "GO_FORWARD",
            Motion::CrossForward => "CROSS_FORWARD",
            Motion::EnterForward => "ENTER_FORWARD",
            Motion::TurnLeft => "TURN_LEFT",
            Motion::CrossLeft => "CROSS_LEFT",
            Motion::EnterLeft => "ENTER_LEFT",
            Motion::TurnRight => "TURN_RIGHT",
            Motion::CrossRight => "CROSS_RIGHT",
            Motion::EnterRight => "ENTER_RIGHT",
            Motion::TurnBack => "TURN_BACK",
            Motion::Stop => "STOP",
        }
    }

    /// Motions that keep the current direction
    pub fn is_forward(self) -> bool {
        matches!(
            self,
            Motion::GoForward | Motion::CrossForward | Motion::EnterForward
        )
    }
}

/// Movement caution level for the traversed edge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// No particular caution
    MoveNormal,
    /// Caution for level changes
    MoveCaution,
    /// Caution for children
    MoveCautionChildren,
    /// Caution for vehicles
    MoveCautionCar,
}

impl Mode {
    /// Caution level for travelling an edge of `edge_type`
    pub fn for_edge(edge_type: EdgeType) -> Mode {
        match edge_type {
            EdgeType::Sidewalk => Mode::MoveNormal,
            EdgeType::Road | EdgeType::Crosswalk => Mode::MoveCautionCar,
            EdgeType::Elevator | EdgeType::Escalator | EdgeType::Stair => Mode::MoveCaution,
        }
    }
}

/// Coarse direction of a turn angle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnDirection {
    /// Within 45 degrees of straight
    Forward,
    /// Counter-clockwise turn
    Left,
    /// Clockwise turn
    Right,
    /// Reversal
    Back,
}

impl TurnDirection {
    /// Classifies a signed turn angle in degrees.
    ///
    /// [-45, 45] is forward, (45, 135] left, [-135, -45) right, anything else back.
    pub fn from_degree(degree: i32) -> TurnDirection {
        if (-45..=45).contains(&degree) {
            TurnDirection::Forward
        } else if degree > 45 && degree <= 135 {
            TurnDirection::Left
        } else if (-135..-45).contains(&degree) {
            TurnDirection::Right
        } else {
            TurnDirection::Back
        }
    }
}

/// True when a turn angle needs no turn announcement
pub fn is_forward(degree: i32) -> bool {
    TurnDirection::from_degree(degree) == TurnDirection::Forward
}

/// Picks the motion for passing a node of `node_type` via an edge of `edge_type`
pub fn motion_for(node_type: NodeType, edge_type: EdgeType, degree: i32) -> Motion {
    let direction = TurnDirection::from_degree(degree);
    let crosswalk = edge_type == EdgeType::Crosswalk;
    match node_type {
        NodeType::Junction => match direction {
            TurnDirection::Forward if crosswalk => Motion::CrossForward,
            TurnDirection::Forward => Motion::GoForward,
            TurnDirection::Left if crosswalk => Motion::CrossLeft,
            TurnDirection::Left => Motion::TurnLeft,
            TurnDirection::Right if crosswalk => Motion::CrossRight,
            TurnDirection::Right => Motion::TurnRight,
            TurnDirection::Back => Motion::TurnBack,
        },
        NodeType::Door => match direction {
            TurnDirection::Forward => Motion::EnterForward,
            TurnDirection::Left => Motion::EnterLeft,
            TurnDirection::Right => Motion::EnterRight,
            // there is no "enter backwards"
            TurnDirection::Back => Motion::TurnBack,
        },
        _ => match direction {
            TurnDirection::Back => Motion::TurnBack,
            _ => Motion::GoForward,
        },
    }
}

/// One step of a guidance instruction
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Motion command
    pub motion: Motion,
    /// Type of the node the action refers to
    pub node_type: NodeType,
    /// Type of the edge travelled
    pub edge_type: EdgeType,
    /// Turn angle in degrees (0 for GO actions)
    pub degree: i32,
    /// Caution level derived from the edge type
    pub mode: Mode,
}

impl Action {
    /// Action with the mode derived from `edge_type`
    pub fn new(motion: Motion, node_type: NodeType, edge_type: EdgeType, degree: i32) -> Self {
        Action {
            motion,
            node_type,
            edge_type,
            degree,
            mode: Mode::for_edge(edge_type),
        }
    }

    /// Terminal STOP action
    pub fn stop() -> Self {
        Action::new(Motion::Stop, NodeType::Basic, EdgeType::Sidewalk, 0)
    }
}

/// Guidance produced by one update cycle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Guidance {
    /// Plan progress when the guidance was produced
    pub guide_status: GuideStatus,
    /// Edge progress when the guidance was produced
    pub moving_status: MoveStatus,
    /// Ordered actions; only the first two are rendered into `msg`
    pub actions: Vec<Action>,
    /// Node the agent is heading to (0 = none)
    pub heading_node_id: Id,
    /// Meters left to the tracked node or junction
    pub distance_to_remain: f64,
    /// Rendered instruction ("" when there are no actions)
    pub msg: String,
}

impl Default for Guidance {
    fn default() -> Self {
        Guidance {
            guide_status: GuideStatus::Unknown,
            moving_status: MoveStatus::OnNode,
            actions: Vec::new(),
            heading_node_id: 0,
            distance_to_remain: 0.0,
            msg: String::new(),
        }
    }
}

impl Guidance {
    /// Whether any action uses `motion`
    pub fn contains_motion(&self, motion: Motion) -> bool {
        self.actions.iter().any(|a| a.motion == motion)
    }
}
