// src/localization/pose.rs

use crate::map::Id;
use serde::{Deserialize, Serialize};

/// Confidence value a localizer reports when it cannot tell where the agent is
pub const UNKNOWN_CONFIDENCE: f64 = -1.0;

/// Position of the agent expressed against the topological map
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TopometricPose {
    /// Last node passed (0 = no pose)
    pub node_id: Id,
    /// Index into the node's incident edge list selecting the occupied edge
    pub edge_idx: usize,
    /// Meters travelled past `node_id` along the occupied edge
    pub dist: f64,
    /// Heading in radians
    pub head: f64,
}

impl TopometricPose {
    /// Pose with zero heading
    pub fn new(node_id: Id, edge_idx: usize, dist: f64) -> Self {
        TopometricPose {
            node_id,
            edge_idx,
            dist,
            head: 0.0,
        }
    }

    /// Sets the heading in radians
    pub fn with_heading(mut self, head: f64) -> Self {
        self.head = head;
        self
    }

    /// Heading truncated to whole degrees
    pub fn heading_degree(&self) -> i32 {
        self.head.to_degrees() as i32
    }
}
