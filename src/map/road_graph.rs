// src/map/road_graph.rs
// Generic directed graph storage plus the road graph used by map tooling.
// Road graphs are stored as line-oriented text: `N,id,x,y` defines a node and
// `E,id1,id2,cost` one directed edge (negative cost = Euclidean distance).

use super::Id;
use crate::{GuidanceError, Result};
use log::{error, info};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

/// Node payloads carry their own unique key
pub trait Keyed {
    /// Unique node id
    fn key(&self) -> Id;
}

/// Planar point with an id; x and y are in meters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point2Id {
    /// Point id
    pub id: Id,
    /// East coordinate
    pub x: f64,
    /// North coordinate
    pub y: f64,
}

impl Keyed for Point2Id {
    fn key(&self) -> Id {
        self.id
    }
}

/// Outgoing edge of a graph node
#[derive(Clone, Debug, PartialEq)]
pub struct GraphEdge<C> {
    /// Target node id
    pub to: Id,
    /// Traversal cost
    pub cost: C,
}

/// Graph node with its outgoing edges
#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode<D, C> {
    /// Node payload
    pub data: D,
    /// Outgoing edges in insertion order
    pub edges: Vec<GraphEdge<C>>,
}

/// Directed, weighted graph keyed by node id; nodes keep insertion order
#[derive(Clone, Debug)]
pub struct DirectedGraph<D, C> {
    nodes: Vec<GraphNode<D, C>>,
    index: HashMap<Id, usize>,
}

/// Road map graph: planar points joined by directed, cost-weighted edges
pub type RoadGraph = DirectedGraph<Point2Id, f64>;

impl<D, C> Default for DirectedGraph<D, C> {
    fn default() -> Self {
        DirectedGraph {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<D: Keyed, C> DirectedGraph<D, C> {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node; fails if its key is already present
    pub fn insert_node(&mut self, data: D) -> Result<()> {
        let key = data.key();
        if self.index.contains_key(&key) {
            return Err(GuidanceError::InvalidInput(format!("duplicate node id {}", key)));
        }
        self.index.insert(key, self.nodes.len());
        self.nodes.push(GraphNode {
            data,
            edges: Vec::new(),
        });
        Ok(())
    }

    /// Inserts a directed edge between two existing nodes
    pub fn insert_edge(&mut self, from: Id, to: Id, cost: C) -> Result<()> {
        if !self.index.contains_key(&to) {
            return Err(GuidanceError::InconsistentGraph(format!(
                "edge target {} is not in graph",
                to
            )));
        }
        let idx = *self.index.get(&from).ok_or_else(|| {
            GuidanceError::InconsistentGraph(format!("edge source {} is not in graph", from))
        })?;
        self.nodes[idx].edges.push(GraphEdge { to, cost });
        Ok(())
    }

    /// Node by id
    pub fn get_node(&self, id: Id) -> Option<&GraphNode<D, C>> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Linear scan over the outgoing edges of `from`
    pub fn get_edge(&self, from: Id, to: Id) -> Option<&GraphEdge<C>> {
        self.get_node(from)?.edges.iter().find(|e| e.to == to)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode<D, C>> {
        self.nodes.iter()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of directed edges
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum()
    }

    /// True when the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Removes every node and edge
    pub fn remove_all(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }
}

impl<D: Keyed + Clone, C: Clone> DirectedGraph<D, C> {
    /// Replaces `dest` with a deep copy: all nodes first, then all edges
    pub fn copy_to(&self, dest: &mut Self) -> Result<()> {
        dest.remove_all();
        for node in &self.nodes {
            dest.insert_node(node.data.clone())?;
        }
        for node in &self.nodes {
            for edge in &node.edges {
                dest.insert_edge(node.data.key(), edge.to, edge.cost.clone())?;
            }
        }
        Ok(())
    }
}

impl RoadGraph {
    /// Adds a point node
    pub fn add_node(&mut self, id: Id, x: f64, y: f64) -> Result<()> {
        self.insert_node(Point2Id { id, x, y })
    }

    /// Adds a directed edge; a negative cost is replaced by the Euclidean distance
    pub fn add_edge(&mut self, from: Id, to: Id, cost: f64) -> Result<()> {
        let cost = if cost < 0.0 {
            self.distance(from, to)?
        } else {
            cost
        };
        self.insert_edge(from, to, cost)
    }

    /// Adds both directions between `a` and `b` with the same cost
    pub fn add_road(&mut self, a: Id, b: Id, cost: f64) -> Result<()> {
        let cost = if cost < 0.0 { self.distance(a, b)? } else { cost };
        self.insert_edge(a, b, cost)?;
        self.insert_edge(b, a, cost)
    }

    fn distance(&self, a: Id, b: Id) -> Result<f64> {
        let p = self.point(a)?;
        let q = self.point(b)?;
        Ok((q.x - p.x).hypot(q.y - p.y))
    }

    fn point(&self, id: Id) -> Result<Point2Id> {
        self.get_node(id)
            .map(|n| n.data)
            .ok_or_else(|| GuidanceError::InconsistentGraph(format!("node {} is not in graph", id)))
    }

    /// Loads a graph file, replacing the current contents.
    ///
    /// Any failure leaves the graph empty.
    pub fn load<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<()> {
        self.remove_all();
        let file = File::open(path.as_ref())?;
        self.read_from(BufReader::new(file))?;
        info!(
            "Loaded road graph {}: {} nodes, {} edges",
            path.as_ref().display(),
            self.node_count(),
            self.edge_count()
        );
        Ok(())
    }

    /// Parses graph records from a reader, replacing the current contents
    pub fn read_from<R: BufRead>(&mut self, reader: R) -> Result<()> {
        self.remove_all();
        let mut graph = RoadGraph::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if let Err(e) = graph.parse_record(i + 1, &line) {
                error!("Road graph load aborted: {}", e);
                return Err(e);
            }
        }
        *self = graph;
        Ok(())
    }

    fn parse_record(&mut self, line_no: usize, line: &str) -> Result<()> {
        let malformed = |reason: String| GuidanceError::MalformedRecord {
            line: line_no,
            reason,
        };

        let mut tokens = line.split(',').map(str::trim);
        let tag = match tokens.next().and_then(|t| t.chars().next()) {
            Some(c) => c.to_ascii_uppercase(),
            None => return Ok(()),
        };

        match tag {
            'N' => {
                let id: Id = parse_field(tokens.next(), "node id").map_err(malformed)?;
                let x: f64 = parse_field(tokens.next(), "x").map_err(malformed)?;
                let y: f64 = parse_field(tokens.next(), "y").map_err(malformed)?;
                self.add_node(id, x, y)
                    .map_err(|_| malformed(format!("duplicate node id {}", id)))
            }
            'E' => {
                let from: Id = parse_field(tokens.next(), "source id").map_err(malformed)?;
                let to: Id = parse_field(tokens.next(), "target id").map_err(malformed)?;
                let cost: f64 = parse_field(tokens.next(), "cost").map_err(malformed)?;
                self.add_edge(from, to, cost)
                    .map_err(|_| malformed(format!("edge {} -> {} references an undefined node", from, to)))
            }
            // comments and unknown record kinds
            _ => Ok(()),
        }
    }

    /// Saves the graph in the text format read by [`RoadGraph::load`]
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        if self.is_empty() {
            return Err(GuidanceError::InvalidInput("cannot save an empty road graph".to_string()));
        }
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes two header comments, every node, then every node's outgoing edges
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "# NODE, ID, X [m], Y [m]")?;
        writeln!(writer, "# EDGE, ID(from_ptr), ID(to_ptr), Cost")?;
        for node in self.nodes() {
            writeln!(writer, "NODE, {}, {}, {}", node.data.id, node.data.x, node.data.y)?;
        }
        for node in self.nodes() {
            for edge in &node.edges {
                writeln!(writer, "EDGE, {}, {}, {}", node.data.id, edge.to, edge.cost)?;
            }
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(token: Option<&str>, what: &str) -> std::result::Result<T, String> {
    let token = token.ok_or_else(|| format!("missing {}", what))?;
    token
        .parse()
        .map_err(|_| format!("invalid {} '{}'", what, token))
}
