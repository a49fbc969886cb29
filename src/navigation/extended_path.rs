//! Path augmentation
//!
//! Converts a planned path into an [`ExtendedPath`]: every waypoint gets its
//! turn angle, a junction flag, distances to the surrounding junctions and a
//! pointer to the next junction ahead. The distance and pointer annotations are
//! computed by three separate passes over the finished element list.

use crate::map::{validate_path, Id, Map, Node, Path};
use crate::{GuidanceError, Result};
use log::debug;
use nalgebra::Vector2;

/// One annotated waypoint of an extended path
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtendedPathElement {
    /// Node of this waypoint
    pub cur_node_id: Id,
    /// Edge leaving this node along the plan
    pub cur_edge_id: Id,
    /// Next waypoint node (0 on the terminal element)
    pub next_node_id: Id,
    /// Edge leaving the next waypoint
    pub next_edge_id: Id,
    /// Signed turn angle at this node in degrees (positive = left)
    pub cur_degree: i32,
    /// Whether the node is a decision point
    pub is_junction: bool,
    /// Meters from this node to the next junction ahead (0 at a junction)
    pub remain_distance_to_next_junction: f64,
    /// Meters from the previous junction to this node (0 at a junction)
    pub past_distance_from_prev_junction: f64,
    /// Node of the next junction strictly ahead
    pub next_guide_node_id: Id,
    /// Edge leaving the next junction strictly ahead
    pub next_guide_edge_id: Id,
}

impl ExtendedPathElement {
    fn new(cur_node_id: Id, cur_edge_id: Id, next_node_id: Id, next_edge_id: Id, degree: i32) -> Self {
        ExtendedPathElement {
            cur_node_id,
            cur_edge_id,
            next_node_id,
            next_edge_id,
            cur_degree: degree,
            ..Default::default()
        }
    }

    /// The synthetic element standing for the destination
    pub fn is_terminal(&self) -> bool {
        self.next_node_id == 0
    }
}

/// Annotated plan: one element per waypoint, the last one synthetic
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtendedPath {
    elements: Vec<ExtendedPathElement>,
    final_turn: i32,
}

impl ExtendedPath {
    /// Builds the extended path for `path` over `map`.
    ///
    /// `final_turn` is the turn to announce on arrival at the destination.
    pub fn build(path: &Path, map: &Map, final_turn: i32) -> Result<Self> {
        if path.is_empty() {
            return Err(GuidanceError::InvalidInput("empty path".to_string()));
        }
        validate_path(path, map)?;

        let mut elements = annotate_waypoints(path, map)?;

        let last_id = path.pts[path.len() - 1].node_id;
        let last_node = lookup_node(map, last_id)?;
        // never traversed; any incident edge will do
        let placeholder_edge = last_node.edge_ids.first().copied().unwrap_or(0);
        let mut terminal = ExtendedPathElement::new(last_id, placeholder_edge, 0, 0, final_turn);
        terminal.next_guide_node_id = last_id;
        elements.push(terminal);

        accumulate_remain_distance(&mut elements, map)?;
        accumulate_past_distance(&mut elements, map)?;
        propagate_next_guide(&mut elements);

        debug!("Built extended path with {} elements", elements.len());
        Ok(ExtendedPath {
            elements,
            final_turn,
        })
    }

    /// Number of elements, terminal included
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when no plan has been built
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at `idx`
    pub fn get(&self, idx: usize) -> Option<&ExtendedPathElement> {
        self.elements.get(idx)
    }

    /// First element
    pub fn first(&self) -> Option<&ExtendedPathElement> {
        self.elements.first()
    }

    /// Terminal element
    pub fn last(&self) -> Option<&ExtendedPathElement> {
        self.elements.last()
    }

    /// All elements in path order
    pub fn elements(&self) -> &[ExtendedPathElement] {
        &self.elements
    }

    /// Turn announced on arrival
    pub fn final_turn(&self) -> i32 {
        self.final_turn
    }

    /// Index of the first element at `node_id`
    pub fn position_of_node(&self, node_id: Id) -> Option<usize> {
        self.elements.iter().position(|e| e.cur_node_id == node_id)
    }

    /// Index of the first element leaving along `edge_id`; the terminal element never matches
    pub fn position_of_edge(&self, edge_id: Id) -> Option<usize> {
        self.elements
            .iter()
            .position(|e| !e.is_terminal() && e.cur_edge_id == edge_id)
    }

    /// Whether the plan visits `node_id`
    pub fn contains_node(&self, node_id: Id) -> bool {
        self.position_of_node(node_id).is_some()
    }

    /// Whether the plan travels along `edge_id`
    pub fn contains_edge(&self, edge_id: Id) -> bool {
        self.position_of_edge(edge_id).is_some()
    }
}

fn lookup_node(map: &Map, id: Id) -> Result<&Node> {
    map.find_node(id)
        .ok_or_else(|| GuidanceError::InconsistentGraph(format!("node {} is not in map", id)))
}

fn edge_length(map: &Map, id: Id) -> Result<f64> {
    map.find_edge(id)
        .map(|e| e.length)
        .ok_or_else(|| GuidanceError::InconsistentGraph(format!("edge {} is not in map", id)))
}

/// One element per waypoint except the last, with turn angle and junction flag
fn annotate_waypoints(path: &Path, map: &Map) -> Result<Vec<ExtendedPathElement>> {
    let pts = &path.pts;
    let mut elements = Vec::with_capacity(pts.len());
    for i in 0..pts.len().saturating_sub(1) {
        let cur = lookup_node(map, pts[i].node_id)?;
        let degree = if i > 0 {
            let prev = lookup_node(map, pts[i - 1].node_id)?;
            let next = lookup_node(map, pts[i + 1].node_id)?;
            turn_degree(prev, cur, next)
        } else {
            0
        };
        let mut element = ExtendedPathElement::new(
            pts[i].node_id,
            pts[i].edge_id,
            pts[i + 1].node_id,
            pts[i + 1].edge_id,
            degree,
        );
        element.is_junction = cur.node_type.is_decision_point();
        elements.push(element);
    }
    Ok(elements)
}

/// Signed turn angle at `cur` when travelling `prev -> cur -> next`
pub fn turn_degree(prev: &Node, cur: &Node, next: &Node) -> i32 {
    let p = Vector2::new(prev.lon, prev.lat);
    let c = Vector2::new(cur.lon, cur.lat);
    let n = Vector2::new(next.lon, next.lat);
    signed_angle(c - p, n - c)
}

/// Angle from `incoming` to `outgoing` in whole degrees, in (-180, 180].
///
/// Positive for a counter-clockwise (left) turn; 0 when either vector is degenerate.
pub fn signed_angle(incoming: Vector2<f64>, outgoing: Vector2<f64>) -> i32 {
    let norms = incoming.norm() * outgoing.norm();
    if norms == 0.0 {
        return 0;
    }
    let cos = (incoming.dot(&outgoing) / norms).clamp(-1.0, 1.0);
    let cross = incoming.perp(&outgoing);
    // drop float noise below a micro-degree before truncating
    let degrees = (cos.acos().to_degrees() * 1e6).round() / 1e6;
    let magnitude = degrees.trunc() as i32;
    if cross < 0.0 { -magnitude } else { magnitude }
}

/// Backward pass: meters from each node to the next junction ahead.
///
/// Junction elements hold 0; the running sum restarts there.
pub fn accumulate_remain_distance(elements: &mut [ExtendedPathElement], map: &Map) -> Result<()> {
    let mut accumulated = 0.0;
    for i in (0..elements.len()).rev() {
        if elements[i].is_junction {
            accumulated = 0.0;
        } else if !elements[i].is_terminal() {
            accumulated += edge_length(map, elements[i].cur_edge_id)?;
        }
        elements[i].remain_distance_to_next_junction = accumulated;
    }
    Ok(())
}

/// Forward pass: meters from the previous junction to each node.
///
/// Junction elements hold 0; the running sum restarts there.
pub fn accumulate_past_distance(elements: &mut [ExtendedPathElement], map: &Map) -> Result<()> {
    let mut accumulated = 0.0;
    for i in 0..elements.len() {
        if elements[i].is_junction {
            accumulated = 0.0;
        } else if i > 0 {
            accumulated += edge_length(map, elements[i - 1].cur_edge_id)?;
        }
        elements[i].past_distance_from_prev_junction = accumulated;
    }
    Ok(())
}

/// Backward pass: tags every element with the next junction strictly ahead of it.
///
/// Elements with no junction ahead point at the destination.
pub fn propagate_next_guide(elements: &mut [ExtendedPathElement]) {
    let Some(last) = elements.last() else {
        return;
    };
    let mut guide_node = last.cur_node_id;
    let mut guide_edge: Id = 0;
    let n = elements.len();
    for e in elements[..n - 1].iter_mut().rev() {
        e.next_guide_node_id = guide_node;
        e.next_guide_edge_id = guide_edge;
        if e.is_junction {
            guide_node = e.cur_node_id;
            guide_edge = e.cur_edge_id;
        }
    }
}
