//! In-memory node/edge store.
//!
//! The store is a deterministic container: nodes and edges keep insertion order, ids are unique,
//! and per-node incidence lists are maintained as edges are added so degree queries stay O(1).

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type NodeIndex = usize;
pub type EdgeIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

fn default_node_size() -> f64 {
    Node::DEFAULT_SIZE
}

fn default_edge_weight() -> f64 {
    1.0
}

fn default_directed() -> bool {
    true
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// Circle radius.
    #[serde(default = "default_node_size")]
    pub size: f64,
    /// Explicit mass. When absent the layout uses `1 + degree`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    /// Fixed nodes exert forces but never move.
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
    /// Explicit label bounding box; otherwise measured from `label`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_size: Option<Size>,
}

impl Node {
    pub const DEFAULT_SIZE: f64 = 1.0;

    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            x: 0.0,
            y: 0.0,
            size: Self::DEFAULT_SIZE,
            mass: None,
            fixed: false,
            label: String::new(),
            label_size: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = size;
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_label_size(mut self, width: f64, height: f64) -> Self {
        self.label_size = Some(Size::new(width, height));
        self
    }

    pub fn fixed(mut self) -> Self {
        self.fixed = true;
        self
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Text used for label metrics: the label, or the id when the label is empty.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default = "default_edge_weight")]
    pub weight: f64,
    #[serde(default = "default_directed")]
    pub directed: bool,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight: 1.0,
            directed: true,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn undirected(mut self) -> Self {
        self.directed = false;
        self
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// Flat serialized form of a [`Graph`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    endpoints: Vec<(NodeIndex, NodeIndex)>,
    id_to_idx: FxHashMap<String, NodeIndex>,
    out_edges: Vec<Vec<EdgeIndex>>,
    in_edges: Vec<Vec<EdgeIndex>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        let mut id_to_idx = FxHashMap::default();
        id_to_idx.reserve(nodes);
        Self {
            nodes: Vec::with_capacity(nodes),
            edges: Vec::with_capacity(edges),
            endpoints: Vec::with_capacity(edges),
            id_to_idx,
            out_edges: Vec::with_capacity(nodes),
            in_edges: Vec::with_capacity(nodes),
        }
    }

    /// Inserts a node. Fails without touching the store when the id is taken or the explicit
    /// mass is not strictly positive.
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeIndex> {
        if self.id_to_idx.contains_key(node.id.as_str()) {
            return Err(Error::DuplicateId { id: node.id });
        }
        if let Some(mass) = node.mass {
            if !(mass.is_finite() && mass > 0.0) {
                return Err(Error::InvalidMass { id: node.id, mass });
            }
        }
        if !(node.size.is_finite() && node.size >= 0.0) {
            tracing::warn!(id = %node.id, size = node.size, "clamping invalid node size to 0");
            node.size = 0.0;
        }
        if !(node.x.is_finite() && node.y.is_finite()) {
            tracing::warn!(id = %node.id, "resetting non-finite node position to the origin");
            node.x = 0.0;
            node.y = 0.0;
        }

        let idx = self.nodes.len();
        self.id_to_idx.insert(node.id.clone(), idx);
        self.nodes.push(node);
        self.out_edges.push(Vec::new());
        self.in_edges.push(Vec::new());
        Ok(idx)
    }

    /// Inserts an edge. Both endpoints must already exist; on failure the store is unchanged.
    pub fn add_edge(&mut self, mut edge: Edge) -> Result<EdgeIndex> {
        let missing = |id: &str| Error::InvalidReference {
            edge: format!("{} -> {}", edge.source, edge.target),
            missing: id.to_string(),
        };
        let Some(&s) = self.id_to_idx.get(edge.source.as_str()) else {
            return Err(missing(&edge.source));
        };
        let Some(&t) = self.id_to_idx.get(edge.target.as_str()) else {
            return Err(missing(&edge.target));
        };
        if !(edge.weight.is_finite() && edge.weight >= 0.0) {
            tracing::warn!(
                source = %edge.source,
                target = %edge.target,
                weight = edge.weight,
                "clamping invalid edge weight to 0"
            );
            edge.weight = 0.0;
        }

        let idx = self.edges.len();
        self.edges.push(edge);
        self.endpoints.push((s, t));
        self.out_edges[s].push(idx);
        self.in_edges[t].push(idx);
        Ok(idx)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx)
    }

    pub fn edge(&self, idx: EdgeIndex) -> Option<&Edge> {
        self.edges.get(idx)
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_idx.get(id).copied()
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Source and target indices of an edge.
    pub fn endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.endpoints[edge]
    }

    pub fn out_edges(&self, idx: NodeIndex) -> &[EdgeIndex] {
        &self.out_edges[idx]
    }

    pub fn in_edges(&self, idx: NodeIndex) -> &[EdgeIndex] {
        &self.in_edges[idx]
    }

    pub fn out_degree(&self, idx: NodeIndex) -> usize {
        self.out_edges[idx].len()
    }

    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.in_edges[idx].len()
    }

    /// Total degree; a self-loop counts twice.
    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.out_degree(idx) + self.in_degree(idx)
    }

    /// Distinct neighbors in either direction, excluding the node itself.
    pub fn neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.out_edges[idx]
            .iter()
            .map(|&e| self.endpoints[e].1)
            .chain(self.in_edges[idx].iter().map(|&e| self.endpoints[e].0))
            .filter(|&n| n != idx)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Effective mass used by the layout: the explicit mass, or `1 + degree`.
    pub fn mass(&self, idx: NodeIndex) -> f64 {
        self.nodes[idx]
            .mass
            .unwrap_or_else(|| 1.0 + self.degree(idx) as f64)
    }

    pub fn positions(&self) -> BTreeMap<String, Point> {
        self.nodes
            .iter()
            .map(|n| (n.id.clone(), n.position()))
            .collect()
    }

    pub(crate) fn set_position(&mut self, idx: NodeIndex, p: Point) {
        let n = &mut self.nodes[idx];
        n.x = p.x;
        n.y = p.y;
    }
}

impl TryFrom<GraphDocument> for Graph {
    type Error = Error;

    fn try_from(doc: GraphDocument) -> Result<Self> {
        let mut g = Graph::with_capacity(doc.nodes.len(), doc.edges.len());
        for n in doc.nodes {
            g.add_node(n)?;
        }
        for e in doc.edges {
            g.add_edge(e)?;
        }
        Ok(g)
    }
}

impl From<Graph> for GraphDocument {
    fn from(g: Graph) -> Self {
        Self {
            nodes: g.nodes,
            edges: g.edges,
        }
    }
}
