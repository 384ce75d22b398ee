use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::layout::NodeSizes;
use crate::model::{Direction, FlowEdge, FlowGraph, FlowNode, Position};

/// A previously computed layout, persisted per graph to skip relayout on reload.
/// Advisory only: it is ignored once the node or edge set has changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSnapshot {
    #[serde(default)]
    pub graph_id: Option<String>,
    #[serde(default)]
    pub direction: Direction,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
    #[serde(default)]
    pub node_heights: BTreeMap<String, f32>,
}

impl LayoutSnapshot {
    pub fn capture(
        graph_id: Option<String>,
        graph: &FlowGraph,
        sizes: &NodeSizes,
        direction: Direction,
    ) -> Self {
        let node_heights = graph
            .nodes
            .iter()
            .filter_map(|node| sizes.get(&node.id).map(|size| (node.id.clone(), size.height)))
            .collect();
        Self {
            graph_id,
            direction,
            nodes: graph.nodes.clone(),
            edges: graph.edges.clone(),
            node_heights,
        }
    }

    /// True when the snapshot has exactly the node ids and edge endpoints of `graph`.
    pub fn matches(&self, graph: &FlowGraph) -> bool {
        if self.nodes.len() != graph.nodes.len() || self.edges.len() != graph.edges.len() {
            return false;
        }
        let ours: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        if ours.len() != self.nodes.len() || !graph.nodes.iter().all(|n| ours.contains(n.id.as_str())) {
            return false;
        }
        let our_edges: HashSet<(&str, &str)> = self
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        graph
            .edges
            .iter()
            .all(|e| our_edges.contains(&(e.source.as_str(), e.target.as_str())))
    }

    pub fn positions(&self) -> HashMap<String, Position> {
        self.nodes
            .iter()
            .map(|node| (node.id.clone(), node.position))
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Missing or unreadable snapshots are treated as absent.
    pub fn load_optional(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load(path) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable layout snapshot");
                None
            }
        }
    }
}
