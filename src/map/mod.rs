// src/map/mod.rs
// Topological map model shared by the guidance core: nodes, edges, the map that
// owns them, and planned paths over it. Raw map data comes from an external map
// service; this module only stores and validates it.

/// Directed road graph with text persistence
pub mod road_graph;

pub use road_graph::{DirectedGraph, GraphEdge, GraphNode, Keyed, Point2Id, RoadGraph};

use crate::{GuidanceError, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of nodes and edges; 0 is reserved for "none"
pub type Id = u64;

/// Node categories known to the guidance core
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Plain waypoint on a street or corridor
    Basic,
    /// Decision point where streets meet
    Junction,
    /// Building entrance
    Door,
    /// Elevator landing
    Elevator,
    /// Escalator landing
    Escalator,
}

impl NodeType {
    /// Every node type, in declaration order
    pub const ALL: [NodeType; 5] = [
        NodeType::Basic,
        NodeType::Junction,
        NodeType::Door,
        NodeType::Elevator,
        NodeType::Escalator,
    ];

    /// Display name used in guidance messages
    pub fn name(self) -> &'static str {
        match self {
            NodeType::Basic => "POI",
            NodeType::Junction => "JUNCTION",
            NodeType::Door => "DOOR",
            NodeType::Elevator => "ELEVATOR",
            NodeType::Escalator => "ESCALATOR",
        }
    }

    /// Junctions and doors are the decision points of a route
    pub fn is_decision_point(self) -> bool {
        matches!(self, NodeType::Junction | NodeType::Door)
    }
}

/// Edge categories known to the guidance core
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    /// Pedestrian sidewalk
    Sidewalk,
    /// Road shared with vehicles
    Road,
    /// Pedestrian crossing
    Crosswalk,
    /// Elevator shaft
    Elevator,
    /// Escalator
    Escalator,
    /// Stairs
    Stair,
}

impl EdgeType {
    /// Every edge type, in declaration order
    pub const ALL: [EdgeType; 6] = [
        EdgeType::Sidewalk,
        EdgeType::Road,
        EdgeType::Crosswalk,
        EdgeType::Elevator,
        EdgeType::Escalator,
        EdgeType::Stair,
    ];

    /// Display name used in guidance messages
    pub fn name(self) -> &'static str {
        match self {
            EdgeType::Sidewalk => "SIDEWALK",
            EdgeType::Road => "ROAD",
            EdgeType::Crosswalk => "CROSSWALK",
            EdgeType::Elevator => "ELEVATOR",
            EdgeType::Escalator => "ESCALATOR",
            EdgeType::Stair => "STAIR",
        }
    }
}

/// Map node with geodetic position and incident edges
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node id (non-zero)
    pub id: Id,
    /// Latitude, used as planar y
    pub lat: f64,
    /// Longitude, used as planar x
    pub lon: f64,
    /// Node category
    pub node_type: NodeType,
    /// Incident edge ids; a pose's `edge_idx` indexes into this list
    pub edge_ids: Vec<Id>,
}

impl Node {
    /// Creates a node without incident edges
    pub fn new(id: Id, lat: f64, lon: f64, node_type: NodeType) -> Self {
        Node {
            id,
            lat,
            lon,
            node_type,
            edge_ids: Vec::new(),
        }
    }
}

/// Undirected map edge between two nodes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Edge id (non-zero)
    pub id: Id,
    /// First endpoint
    pub node_id1: Id,
    /// Second endpoint
    pub node_id2: Id,
    /// Length in meters
    pub length: f64,
    /// Edge category
    pub edge_type: EdgeType,
}

impl Edge {
    /// The endpoint opposite to `node_id`, or `None` if the edge is not incident to it
    pub fn other_end(&self, node_id: Id) -> Option<Id> {
        if self.node_id1 == node_id {
            Some(self.node_id2)
        } else if self.node_id2 == node_id {
            Some(self.node_id1)
        } else {
            None
        }
    }
}

/// Node and edge collections of a topological map
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Map {
    nodes: HashMap<Id, Node>,
    edges: HashMap<Id, Edge>,
}

impl Map {
    /// Creates an empty map
    pub fn new() -> Self {
        Map::default()
    }

    /// Inserts a node; ids must be unique and non-zero
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if node.id == 0 {
            return Err(GuidanceError::InvalidInput("node id 0 is reserved".to_string()));
        }
        if self.nodes.contains_key(&node.id) {
            return Err(GuidanceError::InvalidInput(format!(
                "duplicate node id {}",
                node.id
            )));
        }
        self.nodes.insert(node.id, node);
        Ok(())
    }

    /// Inserts an edge and registers it on both endpoints' incident lists
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        if edge.id == 0 {
            return Err(GuidanceError::InvalidInput("edge id 0 is reserved".to_string()));
        }
        if self.edges.contains_key(&edge.id) {
            return Err(GuidanceError::InvalidInput(format!(
                "duplicate edge id {}",
                edge.id
            )));
        }
        if edge.length < 0.0 {
            return Err(GuidanceError::InvalidInput(format!(
                "edge {} has negative length {}",
                edge.id, edge.length
            )));
        }
        for end in [edge.node_id1, edge.node_id2] {
            if !self.nodes.contains_key(&end) {
                return Err(GuidanceError::InconsistentGraph(format!(
                    "edge {} references missing node {}",
                    edge.id, end
                )));
            }
        }

        if let Some(n) = self.nodes.get_mut(&edge.node_id1) {
            n.edge_ids.push(edge.id);
        }
        if edge.node_id2 != edge.node_id1 {
            if let Some(n) = self.nodes.get_mut(&edge.node_id2) {
                n.edge_ids.push(edge.id);
            }
        }
        self.edges.insert(edge.id, edge);
        Ok(())
    }

    /// Node by id
    pub fn find_node(&self, id: Id) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Edge by id
    pub fn find_edge(&self, id: Id) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// Finds the edge connecting two nodes, in either direction
    pub fn find_edge_between(&self, a: Id, b: Id) -> Option<&Edge> {
        let node = self.nodes.get(&a)?;
        node.edge_ids
            .iter()
            .filter_map(|eid| self.edges.get(eid))
            .find(|e| e.other_end(a) == Some(b))
    }

    /// Changes the type of an existing node
    pub fn set_node_type(&mut self, id: Id, node_type: NodeType) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("no node {} to retype", id))
        })?;
        node.node_type = node_type;
        Ok(())
    }

    /// Changes the type of an existing edge
    pub fn set_edge_type(&mut self, id: Id, edge_type: EdgeType) -> Result<()> {
        let edge = self.edges.get_mut(&id).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("no edge {} to retype", id))
        })?;
        edge.edge_type = edge_type;
        Ok(())
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// True when the map has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Builds a map from a road graph.
    ///
    /// Graph points become BASIC nodes (`x` as longitude, `y` as latitude) and
    /// every connected pair becomes one SIDEWALK edge whose length is the cost of
    /// the first direction seen. Edge ids are assigned from 1 in traversal order.
    pub fn from_road_graph(graph: &RoadGraph) -> Result<Self> {
        let mut map = Map::new();
        for node in graph.nodes() {
            map.add_node(Node::new(node.data.id, node.data.y, node.data.x, NodeType::Basic))?;
        }

        let mut next_edge_id: Id = 1;
        for node in graph.nodes() {
            let from = node.data.id;
            for edge in &node.edges {
                if from == edge.to || map.find_edge_between(from, edge.to).is_some() {
                    continue;
                }
                map.add_edge(Edge {
                    id: next_edge_id,
                    node_id1: from,
                    node_id2: edge.to,
                    length: edge.cost,
                    edge_type: EdgeType::Sidewalk,
                })?;
                next_edge_id += 1;
            }
        }
        debug!(
            "Converted road graph into map: {} nodes, {} edges",
            map.node_count(),
            map.edge_count()
        );
        Ok(map)
    }
}

/// One waypoint of a planned path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathPoint {
    /// Waypoint node
    pub node_id: Id,
    /// Edge taken from this node toward the next waypoint (0 on the last waypoint)
    pub edge_id: Id,
}

/// Planned route as an ordered waypoint list
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Path {
    /// Waypoints from start to destination
    pub pts: Vec<PathPoint>,
}

impl Path {
    /// Wraps an explicit waypoint list
    pub fn new(pts: Vec<PathPoint>) -> Self {
        Path { pts }
    }

    /// Builds a path through `node_ids`, picking the connecting edge of each consecutive pair
    pub fn from_node_sequence(map: &Map, node_ids: &[Id]) -> Result<Self> {
        if node_ids.is_empty() {
            return Err(GuidanceError::InvalidInput("empty node sequence".to_string()));
        }
        let mut pts = Vec::with_capacity(node_ids.len());
        for pair in node_ids.windows(2) {
            let edge = map.find_edge_between(pair[0], pair[1]).ok_or_else(|| {
                GuidanceError::InconsistentGraph(format!(
                    "no edge between nodes {} and {}",
                    pair[0], pair[1]
                ))
            })?;
            pts.push(PathPoint {
                node_id: pair[0],
                edge_id: edge.id,
            });
        }
        if let Some(&last) = node_ids.last() {
            pts.push(PathPoint {
                node_id: last,
                edge_id: 0,
            });
        }
        Ok(Path { pts })
    }

    /// Number of waypoints
    pub fn len(&self) -> usize {
        self.pts.len()
    }

    /// True when there are no waypoints
    pub fn is_empty(&self) -> bool {
        self.pts.is_empty()
    }
}

/// Checks that every waypoint resolves in the map.
///
/// The last waypoint's edge is never traversed, so it may be 0 or absent.
pub fn validate_path(path: &Path, map: &Map) -> Result<()> {
    if path.is_empty() {
        return Err(GuidanceError::InvalidInput("no path input".to_string()));
    }
    let last = path.len() - 1;
    for (i, pt) in path.pts.iter().enumerate() {
        if map.find_node(pt.node_id).is_none() {
            warn!("No node {} found on map", pt.node_id);
            return Err(GuidanceError::InconsistentGraph(format!(
                "path node {} is not in map",
                pt.node_id
            )));
        }
        if i < last && map.find_edge(pt.edge_id).is_none() {
            warn!("No edge {} found on map", pt.edge_id);
            return Err(GuidanceError::InconsistentGraph(format!(
                "path edge {} is not in map",
                pt.edge_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_map() -> Map {
        let mut map = Map::new();
        map.add_node(Node::new(1, 0.0, 0.0, NodeType::Junction)).unwrap();
        map.add_node(Node::new(2, 0.0, 1.0, NodeType::Basic)).unwrap();
        map.add_node(Node::new(3, 0.0, 2.0, NodeType::Basic)).unwrap();
        map.add_edge(Edge {
            id: 10,
            node_id1: 1,
            node_id2: 2,
            length: 5.0,
            edge_type: EdgeType::Sidewalk,
        })
        .unwrap();
        map.add_edge(Edge {
            id: 11,
            node_id1: 3,
            node_id2: 2,
            length: 7.0,
            edge_type: EdgeType::Crosswalk,
        })
        .unwrap();
        map
    }

    #[test]
    fn test_edge_registered_on_both_ends() {
        let map = line_map();
        assert_eq!(map.find_node(2).unwrap().edge_ids, vec![10, 11]);
        assert_eq!(map.find_node(3).unwrap().edge_ids, vec![11]);
    }

    #[test]
    fn test_find_edge_between_ignores_direction() {
        let map = line_map();
        assert_eq!(map.find_edge_between(2, 3).map(|e| e.id), Some(11));
        assert_eq!(map.find_edge_between(3, 2).map(|e| e.id), Some(11));
        assert!(map.find_edge_between(1, 3).is_none());
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut map = line_map();
        let err = map
            .add_edge(Edge {
                id: 12,
                node_id1: 3,
                node_id2: 99,
                length: 1.0,
                edge_type: EdgeType::Road,
            })
            .unwrap_err();
        assert!(matches!(err, GuidanceError::InconsistentGraph(_)));
        assert!(map.find_node(3).unwrap().edge_ids.len() == 1);
    }

    #[test]
    fn test_path_from_node_sequence() {
        let map = line_map();
        let path = Path::from_node_sequence(&map, &[1, 2, 3]).unwrap();
        assert_eq!(
            path.pts,
            vec![
                PathPoint { node_id: 1, edge_id: 10 },
                PathPoint { node_id: 2, edge_id: 11 },
                PathPoint { node_id: 3, edge_id: 0 },
            ]
        );
        assert!(validate_path(&path, &map).is_ok());
    }

    #[test]
    fn test_validate_path_rejects_unknown_edge() {
        let map = line_map();
        let path = Path::new(vec![
            PathPoint { node_id: 1, edge_id: 77 },
            PathPoint { node_id: 2, edge_id: 0 },
        ]);
        assert!(matches!(
            validate_path(&path, &map),
            Err(GuidanceError::InconsistentGraph(_))
        ));
    }

    #[test]
    fn test_name_tables_are_distinct() {
        let mut names: Vec<_> = NodeType::ALL.iter().map(|t| t.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), NodeType::ALL.len());

        let mut names: Vec<_> = EdgeType::ALL.iter().map(|t| t.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), EdgeType::ALL.len());
    }
}
