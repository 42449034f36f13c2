//! Workflow designer graph: structure checks, diffing between saves and the
//! graph generated from ordered workflow steps.

use crate::error::{Result, TrackerError};
use crate::models::WorkflowStep;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

pub const START_NODE_ID: &str = "start";
pub const END_NODE_ID: &str = "end";

const COLUMN_X: f64 = 250.0;
const START_Y: f64 = 25.0;
const FIRST_STEP_Y: f64 = 125.0;
const STEP_SPACING: f64 = 125.0;
const EMPTY_END_Y: f64 = 175.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Start,
    End,
    Step,
    Decision,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A designer node. Fields the editor adds beyond these are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "empty_object")]
    pub data: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkflowGraph {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, x: f64, y: f64, data: Value) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Position { x, y },
            data,
            extra: Map::new(),
        }
    }
}

impl GraphEdge {
    /// Edge with the conventional `e-<source>-<target>` id
    pub fn between(source: &str, target: &str) -> Self {
        Self {
            id: format!("e-{source}-{target}"),
            source: source.to_string(),
            target: target.to_string(),
            extra: Map::new(),
        }
    }
}

impl WorkflowGraph {
    /// Graph given to every new workflow: start wired straight to end.
    pub fn default_graph() -> Self {
        Self {
            nodes: vec![start_node(), end_node(EMPTY_END_Y)],
            edges: vec![GraphEdge::between(START_NODE_ID, END_NODE_ID)],
        }
    }

    /// Linear graph start -> step_<id> ... -> end, one node per step in
    /// order. `system_names` resolves the optional system of each step.
    pub fn from_steps(steps: &[WorkflowStep], system_names: &HashMap<i64, String>) -> Self {
        let mut nodes = vec![start_node()];
        let mut edges = Vec::with_capacity(steps.len() + 1);
        let mut previous = START_NODE_ID.to_string();

        for (i, step) in steps.iter().enumerate() {
            let node_id = format!("step_{}", step.id);
            let mut data = Map::new();
            data.insert("label".into(), json!(step.name));
            data.insert("description".into(), json!(step.description));
            for (key, value) in [
                ("inputs", &step.inputs),
                ("outputs", &step.outputs),
                ("personnel", &step.personnel),
                ("estimated_time", &step.estimated_time),
                ("notes", &step.notes),
            ] {
                if !value.is_empty() {
                    data.insert(key.into(), json!(value));
                }
            }
            if let Some(system_id) = step.system_id {
                if let Some(name) = system_names.get(&system_id) {
                    data.insert("system".into(), json!(name));
                }
                data.insert("system_id".into(), json!(system_id));
            }

            let y = FIRST_STEP_Y + i as f64 * STEP_SPACING;
            nodes.push(GraphNode::new(
                node_id.clone(),
                NodeKind::Step,
                COLUMN_X,
                y,
                Value::Object(data),
            ));
            edges.push(GraphEdge::between(&previous, &node_id));
            previous = node_id;
        }

        let end_y = if steps.is_empty() {
            EMPTY_END_Y
        } else {
            FIRST_STEP_Y + steps.len() as f64 * STEP_SPACING
        };
        nodes.push(end_node(end_y));
        edges.push(GraphEdge::between(&previous, END_NODE_ID));

        Self { nodes, edges }
    }

    /// Check the structural rules the designer enforces.
    pub fn validate(&self) -> Result<()> {
        let mut graph: DiGraph<NodeKind, ()> = DiGraph::new();
        let mut node_indices: HashMap<&str, NodeIndex> = HashMap::new();

        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(TrackerError::InvalidGraph("node id must not be empty".into()));
            }
            let index = graph.add_node(node.kind);
            if node_indices.insert(node.id.as_str(), index).is_some() {
                return Err(TrackerError::InvalidGraph(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let mut edge_ids = HashSet::new();
        let mut connections = HashSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(TrackerError::InvalidGraph(format!(
                    "duplicate edge id '{}'",
                    edge.id
                )));
            }
            let source = node_indices.get(edge.source.as_str()).ok_or_else(|| {
                TrackerError::InvalidGraph(format!(
                    "edge '{}' references unknown source '{}'",
                    edge.id, edge.source
                ))
            })?;
            let target = node_indices.get(edge.target.as_str()).ok_or_else(|| {
                TrackerError::InvalidGraph(format!(
                    "edge '{}' references unknown target '{}'",
                    edge.id, edge.target
                ))
            })?;
            if source == target {
                return Err(TrackerError::InvalidGraph(format!(
                    "edge '{}' connects '{}' to itself",
                    edge.id, edge.source
                )));
            }
            if !connections.insert((*source, *target)) {
                return Err(TrackerError::InvalidGraph(format!(
                    "'{}' is already connected to '{}'",
                    edge.source, edge.target
                )));
            }
            graph.add_edge(*source, *target, ());
        }

        for node in &self.nodes {
            let index = node_indices[node.id.as_str()];
            match node.kind {
                NodeKind::Start
                    if graph
                        .neighbors_directed(index, Direction::Incoming)
                        .next()
                        .is_some() =>
                {
                    return Err(TrackerError::InvalidGraph(format!(
                        "start node '{}' cannot have incoming edges",
                        node.id
                    )));
                }
                NodeKind::End
                    if graph
                        .neighbors_directed(index, Direction::Outgoing)
                        .next()
                        .is_some() =>
                {
                    return Err(TrackerError::InvalidGraph(format!(
                        "end node '{}' cannot have outgoing edges",
                        node.id
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Differences going from `self` to `next`.
    pub fn diff(&self, next: &WorkflowGraph) -> GraphDiff {
        let old_nodes: HashMap<&str, &GraphNode> =
            self.nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let new_nodes: HashMap<&str, &GraphNode> =
            next.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut diff = GraphDiff::default();
        for node in &next.nodes {
            match old_nodes.get(node.id.as_str()) {
                None => diff.added_nodes.push(node.id.clone()),
                Some(old) if *old != node => diff.changed_nodes.push(node.id.clone()),
                Some(_) => {}
            }
        }
        for node in &self.nodes {
            if !new_nodes.contains_key(node.id.as_str()) {
                diff.removed_nodes.push(node.id.clone());
            }
        }

        // An edge whose endpoints moved counts as removed and re-added.
        let old_edges: HashMap<&str, &GraphEdge> =
            self.edges.iter().map(|e| (e.id.as_str(), e)).collect();
        let new_edges: HashMap<&str, &GraphEdge> =
            next.edges.iter().map(|e| (e.id.as_str(), e)).collect();
        for edge in &next.edges {
            if old_edges.get(edge.id.as_str()) != Some(&edge) {
                diff.added_edges.push(edge.id.clone());
            }
        }
        for edge in &self.edges {
            if new_edges.get(edge.id.as_str()) != Some(&edge) {
                diff.removed_edges.push(edge.id.clone());
            }
        }

        diff
    }
}

fn start_node() -> GraphNode {
    GraphNode::new(
        START_NODE_ID,
        NodeKind::Start,
        COLUMN_X,
        START_Y,
        json!({"label": "Start Workflow"}),
    )
}

fn end_node(y: f64) -> GraphNode {
    GraphNode::new(
        END_NODE_ID,
        NodeKind::End,
        COLUMN_X,
        y,
        json!({"label": "End Workflow"}),
    )
}

/// Node and edge ids that differ between two saves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GraphDiff {
    pub added_nodes: Vec<String>,
    pub removed_nodes: Vec<String>,
    pub changed_nodes: Vec<String>,
    pub added_edges: Vec<String>,
    pub removed_edges: Vec<String>,
}

impl GraphDiff {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.changed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} node(s) added, {} removed, {} changed; {} edge(s) added, {} removed",
            self.added_nodes.len(),
            self.removed_nodes.len(),
            self.changed_nodes.len(),
            self.added_edges.len(),
            self.removed_edges.len()
        )
    }
}

/// Result of a designer save or version restore
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub saved: bool,
    pub version: i64,
    pub diff: GraphDiff,
    pub message: String,
}

/// Body of a designer save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveGraphRequest {
    #[serde(flatten)]
    pub graph: WorkflowGraph,
    #[serde(default)]
    pub saved_by: Option<String>,
}

impl ToSql for WorkflowGraph {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let text = serde_json::to_string(self)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(ToSqlOutput::from(text))
    }
}

impl FromSql for WorkflowGraph {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        serde_json::from_str(value.as_str()?).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
