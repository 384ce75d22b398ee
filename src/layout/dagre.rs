use std::collections::{HashMap, HashSet};

use dagre_rust::{
    GraphConfig as DagreConfig, GraphEdge as DagreEdge, GraphNode as DagreNode,
    layout as dagre_layout,
};
use graphlib_rust::{Graph as DagreGraph, GraphOption};

use crate::error::LayoutError;
use crate::model::{Direction, Position};

use super::{LayoutAlgorithm, LayoutInput};

/// Layered layout through `dagre_rust`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DagreLayout;

impl LayoutAlgorithm for DagreLayout {
    fn name(&self) -> &'static str {
        "dagre"
    }

    fn run(&self, input: &LayoutInput) -> Result<HashMap<String, Position>, LayoutError> {
        let mut dagre_graph: DagreGraph<DagreConfig, DagreNode, DagreEdge> =
            DagreGraph::new(Some(GraphOption {
                directed: Some(true),
                multigraph: Some(false),
                compound: Some(false),
            }));

        let mut graph_config = DagreConfig::default();
        graph_config.rankdir = Some(dagre_rankdir(input.direction).to_string());
        graph_config.nodesep = Some(input.node_spacing);
        graph_config.ranksep = Some(input.rank_spacing);
        graph_config.marginx = Some(0.0);
        graph_config.marginy = Some(0.0);
        dagre_graph.set_graph(graph_config);

        let node_set: HashSet<&str> = input.nodes.iter().map(|n| n.id.as_str()).collect();
        for node in &input.nodes {
            let mut dagre_node = DagreNode::default();
            dagre_node.width = node.size.width;
            dagre_node.height = node.size.height;
            dagre_graph.set_node(node.id.clone(), Some(dagre_node));
        }

        let mut edge_set: HashSet<(&str, &str)> = HashSet::new();
        for (from, to) in &input.edges {
            if !node_set.contains(from.as_str()) || !node_set.contains(to.as_str()) {
                continue;
            }
            if from == to || !edge_set.insert((from.as_str(), to.as_str())) {
                continue;
            }
            let edge_label = DagreEdge::default();
            let _ = dagre_graph.set_edge(from, to, Some(edge_label), None);
        }

        dagre_layout::run_layout(&mut dagre_graph);

        let mut positions = HashMap::with_capacity(input.nodes.len());
        for node in &input.nodes {
            let Some(dagre_node) = dagre_graph.node(&node.id) else {
                return Err(LayoutError::MissingPosition(node.id.clone()));
            };
            positions.insert(
                node.id.clone(),
                Position::new(
                    dagre_node.x - node.size.width / 2.0,
                    dagre_node.y - node.size.height / 2.0,
                ),
            );
        }
        Ok(positions)
    }
}

fn dagre_rankdir(direction: Direction) -> &'static str {
    match direction {
        Direction::Down => "tb",
        Direction::Up => "bt",
        Direction::Right => "lr",
        Direction::Left => "rl",
    }
}
