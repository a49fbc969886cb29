// src/navigation/formatter.rs
// Renders guidance into the instruction text shown on screen or spoken by TTS.
// Pure functions over the name tables of Motion, EdgeType, NodeType and MoveStatus.

use super::guidance::{Action, Guidance, Motion, MoveStatus};
use crate::map::{Id, NodeType};

/// Turn announced at a node: "<motion> for <degree> degree on <node type>"
pub fn turn_phrase(action: &Action, node_type: NodeType) -> String {
    format!(
        "{} for {} degree on {}",
        action.motion.name(),
        action.degree,
        node_type.name()
    )
}

/// Turn announced ahead of time; TURN_BACK ignores the distance
pub fn turn_phrase_with_distance(action: &Action, node_type: NodeType, dist: f64) -> String {
    if action.motion == Motion::TurnBack {
        return action.motion.name().to_string();
    }
    format!(
        "After {:.1}m {} for {} degree on {}",
        dist,
        action.motion.name(),
        action.degree,
        node_type.name()
    )
}

/// Forward motion with the distance until the next node
pub fn forward_phrase_with_distance(action: &Action, node_id: Id, dist: f64) -> String {
    format!(
        "{} on {} about {:.1}m until next {}(Node ID : {})",
        action.motion.name(),
        action.edge_type.name(),
        dist,
        action.node_type.name(),
        node_id
    )
}

/// Forward motion that starts once the next node is reached
pub fn forward_phrase_after(action: &Action, node_id: Id, dist: f64) -> String {
    format!(
        "{} on {} after {:.1}m on {}(Node ID : {})",
        action.motion.name(),
        action.edge_type.name(),
        dist,
        action.node_type.name(),
        node_id
    )
}

/// Forward motion without distance
pub fn forward_phrase(action: &Action) -> String {
    format!("{} on {}", action.motion.name(), action.edge_type.name())
}

fn action_phrase(guidance: &Guidance, index: usize, action: &Action) -> String {
    if action.motion.is_forward() {
        if index > 0 {
            forward_phrase(action)
        } else if guidance.moving_status == MoveStatus::ApproachingNode {
            forward_phrase_after(action, guidance.heading_node_id, guidance.distance_to_remain)
        } else {
            forward_phrase_with_distance(action, guidance.heading_node_id, guidance.distance_to_remain)
        }
    } else if action.motion == Motion::Stop {
        "Stop!".to_string()
    } else if guidance.moving_status == MoveStatus::OnNode {
        turn_phrase(action, action.node_type)
    } else {
        turn_phrase_with_distance(action, action.node_type, guidance.distance_to_remain)
    }
}

/// Full instruction: "[Guide] [<move status>] <first>" plus " and <second>".
///
/// Actions beyond the second are not rendered; no actions render as "".
pub fn guidance_message(guidance: &Guidance) -> String {
    let phrases: Vec<String> = guidance
        .actions
        .iter()
        .take(2)
        .enumerate()
        .map(|(i, a)| action_phrase(guidance, i, a))
        .collect();
    if phrases.is_empty() {
        return String::new();
    }
    format!(
        "[Guide] [{}] {}",
        guidance.moving_status.name(),
        phrases.join(" and ")
    )
}
