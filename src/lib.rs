//! Route Guidance - navigation guidance core for pedestrian and robot agents
//!
//! This library turns a planned route over a topological map and a stream of
//! topometric pose estimates into turn-by-turn guidance ("turn left then go
//! 20m"), and tracks whether the agent follows the plan, strays off it, or is lost.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

/// Localizer inputs: poses, clock and confidence smoothing
pub mod localization;
/// Topological map, planned paths and road graphs
pub mod map;
/// Extended paths, guidance types and the guidance state machine
pub mod navigation;

// Re-export commonly used items for easier access
pub use localization::{Clock, LostValueFilter, SystemClock, TopometricPose};
pub use map::{Edge, EdgeType, Id, Map, Node, NodeType, Path, PathPoint, RoadGraph};
pub use navigation::{
    Action, ExtendedPath, ExtendedPathElement, GuidanceManager, GuideStatus, Guidance, Mode,
    Motion, MoveStatus,
};

use serde::{Deserialize, Serialize};

/// Main configuration structure for the guidance core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// Remaining distance (meters) under which the agent is approaching the next node
    pub approach_threshold: f64,
    /// Distance (meters) past a node under which the agent still counts as on it
    pub on_node_distance: f64,
    /// Seconds an off-path node must persist before OOP_DETECT becomes OOP
    pub oop_timeout_secs: f64,
    /// Minimum confidence for an off-path sample to count as "elsewhere" rather than lost
    pub oop_min_confidence: f64,
    /// Confidence required before initial guidance emits directional actions
    pub initial_guide_confidence: f64,
    /// Track remaining distance to the next junction instead of the next node
    pub junction_guide: bool,
    /// Capacity of the guidance audit trail
    pub history_limit: usize,
    /// Lost-score filter parameters
    pub lost_filter: LostFilterConfig,
}

/// Parameters of the lost-score smoothing filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LostFilterConfig {
    /// Confidence at or below which the agent is fully lost
    pub lower_limit: f64,
    /// Confidence at or above which the agent is fully localized
    pub upper_limit: f64,
    /// Midpoint separating the "confident" and "uncertain" sides
    pub middle_value: f64,
    /// Weight applied when confidence crosses the midpoint or keeps sliding
    pub weight: f64,
    /// Weight applied to same-side adjustments toward the midpoint
    pub small_weight: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        GuidanceConfig {
            approach_threshold: 10.0,
            on_node_distance: 1.0,
            oop_timeout_secs: 5.0,
            oop_min_confidence: 0.1,
            initial_guide_confidence: 0.5,
            junction_guide: false,
            history_limit: 100,
            lost_filter: LostFilterConfig::default(),
        }
    }
}

impl Default for LostFilterConfig {
    fn default() -> Self {
        LostFilterConfig {
            lower_limit: 0.4,
            upper_limit: 0.85,
            middle_value: 0.7,
            weight: 150.0,
            small_weight: 75.0,
        }
    }
}

impl GuidanceConfig {
    /// Parses a configuration from YAML text; missing keys take their defaults
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: GuidanceConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file in YAML format
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: GuidanceConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        log::info!("Loaded guidance config from {}", path.as_ref().display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.approach_threshold < 0.0 || self.on_node_distance < 0.0 {
            return Err(GuidanceError::Config(
                "distance thresholds must be non-negative".to_string(),
            ));
        }
        if self.oop_timeout_secs < 0.0 {
            return Err(GuidanceError::Config(
                "oop_timeout_secs must be non-negative".to_string(),
            ));
        }
        let lf = &self.lost_filter;
        if !(lf.lower_limit < lf.middle_value && lf.middle_value < lf.upper_limit) {
            return Err(GuidanceError::Config(format!(
                "lost filter limits must satisfy lower < middle < upper (got {}, {}, {})",
                lf.lower_limit, lf.middle_value, lf.upper_limit
            )));
        }
        Ok(())
    }
}

/// Guidance core error types
#[derive(Debug, thiserror::Error)]
pub enum GuidanceError {
    /// Empty or zero-id path, pose or map entry
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A node or edge reference does not resolve in the map
    #[error("Inconsistent graph: {0}")]
    InconsistentGraph(String),
    /// A road-graph file record could not be parsed
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number in the source text
        line: usize,
        /// What was wrong with the record
        reason: String,
    },
    /// State dispatch reached a state the current guide builder cannot handle
    #[error("Unknown state: {0}")]
    UnknownState(String),
    /// The pose carries no usable progress information
    #[error("No pose info")]
    PoseUnavailable,
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
    /// File access error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for GuidanceError {
    fn from(e: serde_yaml::Error) -> Self {
        GuidanceError::Config(e.to_string())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, GuidanceError>;
