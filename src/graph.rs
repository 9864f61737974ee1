//! Node/edge view of a [`ParsedSchema`].
//!
//! [`build`] is rebuilt from scratch on every schema change; there is no incremental diffing.
//! Node ids are entity names and edge ids are `"<model>-<field>-<target>"`. Edges are not
//! checked against the node set, so a relation to an unknown name yields a dangling edge
//! (see [`Graph::dangling_edges`]).

use petgraph::{graph::NodeIndex, Directed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::schema::{Enum, Field, Model, ParsedSchema};

/// Horizontal spacing between default node columns.
pub const COLUMN_WIDTH: i64 = 300;
/// Vertical spacing between default node rows.
pub const ROW_HEIGHT: i64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Model,
    Enum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// Node payload, shaped after what the renderer displays for each kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeData {
    Model { label: String, fields: Vec<Field> },
    Enum { label: String, values: Vec<String> },
}

impl NodeData {
    pub fn label(&self) -> &str {
        match self {
            NodeData::Model { label, .. } | NodeData::Enum { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub position: Position,
    pub data: NodeData,
}

impl Node {
    fn model(index: usize, model: &Model) -> Self {
        Node {
            id: model.name.clone(),
            kind: NodeKind::Model,
            position: Position {
                x: index as i64 * COLUMN_WIDTH,
                y: index as i64 * ROW_HEIGHT,
            },
            data: NodeData::Model {
                label: model.name.clone(),
                fields: model.fields.clone(),
            },
        }
    }

    /// Enums sit on a single row below every model.
    fn enumeration(index: usize, model_count: usize, enum_def: &Enum) -> Self {
        Node {
            id: enum_def.name.clone(),
            kind: NodeKind::Enum,
            position: Position {
                x: index as i64 * COLUMN_WIDTH,
                y: (model_count as i64 + 1) * ROW_HEIGHT,
            },
            data: NodeData::Enum {
                label: enum_def.name.clone(),
                values: enum_def.values.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Connection point on the source node: `"<model>-<field>"`.
    pub source_handle: String,
    pub label: String,
    pub edge_type: String,
    pub animated: bool,
}

impl Edge {
    fn relation(model: &Model, field: &Field) -> Self {
        Edge {
            id: format!("{}-{}-{}", model.name, field.name, field.raw_type),
            source: model.name.clone(),
            target: field.raw_type.clone(),
            source_handle: format!("{}-{}", model.name, field.name),
            label: field.name.clone(),
            edge_type: "smoothstep".to_string(),
            animated: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Builds the default graph: one node per model, one per enum, one edge per relation field.
pub fn build(schema: &ParsedSchema) -> Graph {
    let model_count = schema.models.len();
    let nodes = schema
        .models
        .iter()
        .enumerate()
        .map(|(index, model)| Node::model(index, model))
        .chain(
            schema
                .enums
                .iter()
                .enumerate()
                .map(|(index, enum_def)| Node::enumeration(index, model_count, enum_def)),
        )
        .collect();

    let edges = schema
        .models
        .iter()
        .flat_map(|model| model.relations().map(move |field| Edge::relation(model, field)))
        .collect();

    Graph { nodes, edges }
}

impl Graph {
    /// Looks up a node by id. A model and an enum sharing a name collide; the one
    /// registered last (enums come after models) wins.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().rev().find(|n| n.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// Edges whose target names no node.
    pub fn dangling_edges(&self) -> Vec<&Edge> {
        self.edges
            .iter()
            .filter(|edge| self.node(&edge.target).is_none())
            .collect()
    }

    /// Projects the graph onto a petgraph graph keyed by node id. Dangling edge targets get
    /// a placeholder node so every edge survives the projection.
    pub fn to_petgraph(&self) -> (petgraph::Graph<String, String, Directed>, BTreeMap<String, NodeIndex>) {
        let mut graph = petgraph::Graph::new();
        let mut id_to_index = BTreeMap::new();

        for node in self.nodes.iter() {
            if !id_to_index.contains_key(&node.id) {
                let index = graph.add_node(node.id.clone());
                id_to_index.insert(node.id.clone(), index);
            }
        }

        for edge in self.edges.iter() {
            for id in [&edge.source, &edge.target] {
                if !id_to_index.contains_key(id) {
                    let index = graph.add_node(id.clone());
                    id_to_index.insert(id.clone(), index);
                }
            }
            let source_idx = id_to_index[&edge.source];
            let target_idx = id_to_index[&edge.target];
            graph.add_edge(source_idx, target_idx, edge.label.clone());
        }

        (graph, id_to_index)
    }

    /// Ids of the nodes `id` points at through relation edges, sorted.
    pub fn neighbors(&self, id: &str) -> Vec<String> {
        let (graph, id_to_index) = self.to_petgraph();
        let Some(index) = id_to_index.get(id) else {
            return Vec::new();
        };
        let mut neighbors: Vec<String> = graph
            .neighbors_directed(*index, petgraph::Direction::Outgoing)
            .map(|n| graph[n].clone())
            .collect();
        neighbors.sort();
        neighbors.dedup();
        neighbors
    }
}
