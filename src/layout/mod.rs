mod dagre;
mod engine;
mod layered;
mod ranking;
pub(crate) mod text;

use std::collections::HashMap;

use crate::config::{LayoutAlgorithmKind, LayoutConfig};
use crate::error::LayoutError;
use crate::model::{Direction, FlowGraph, FlowNode, FlowNodeKind, Position, Size};

pub use dagre::DagreLayout;
pub use engine::{
    LayoutEngine, LayoutOptions, LayoutOutcome, LayoutSignature, LayoutStatus, RequestToken,
};
pub use layered::LayeredLayout;
pub use text::estimate_node_size;

/// A positioning backend. Returned positions are the top-left corner of each node.
pub trait LayoutAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, input: &LayoutInput) -> Result<HashMap<String, Position>, LayoutError>;
}

pub fn algorithm_for(kind: LayoutAlgorithmKind) -> Box<dyn LayoutAlgorithm> {
    match kind {
        LayoutAlgorithmKind::Dagre => Box::new(DagreLayout),
        LayoutAlgorithmKind::Layered => Box::new(LayeredLayout::default()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizedNode {
    pub id: String,
    pub size: Size,
}

/// Owned snapshot of everything one layout request needs.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutInput {
    pub nodes: Vec<SizedNode>,
    pub edges: Vec<(String, String)>,
    pub direction: Direction,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub order_passes: usize,
}

impl LayoutInput {
    pub fn new(
        graph: &FlowGraph,
        sizes: &NodeSizes,
        config: &LayoutConfig,
        direction: Direction,
    ) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| SizedNode {
                id: node.id.clone(),
                size: sizes.resolve(node, config),
            })
            .collect();
        let edges = graph
            .edges
            .iter()
            .map(|edge| (edge.source.clone(), edge.target.clone()))
            .collect();
        Self {
            nodes,
            edges,
            direction,
            node_spacing: config.node_spacing,
            rank_spacing: config.rank_spacing,
            order_passes: config.order_passes,
        }
    }
}

/// Node sizes measured by the rendering surface after paint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSizes {
    measured: HashMap<String, Size>,
}

impl NodeSizes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a measurement. Returns true when it differs from the previous one.
    pub fn insert(&mut self, id: impl Into<String>, size: Size) -> bool {
        let id = id.into();
        let changed = self.measured.get(&id) != Some(&size);
        self.measured.insert(id, size);
        changed
    }

    pub fn get(&self, id: &str) -> Option<Size> {
        self.measured.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.measured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measured.is_empty()
    }

    /// Fills in heights from a persisted snapshot for nodes not yet measured.
    pub fn seed_heights<'a>(
        &mut self,
        heights: impl IntoIterator<Item = (&'a String, &'a f32)>,
        config: &LayoutConfig,
    ) {
        for (id, height) in heights {
            if self.measured.contains_key(id) || !height.is_finite() || *height <= 0.0 {
                continue;
            }
            let width = if id.starts_with("question-") {
                config.question_size.width
            } else {
                config.article_size.width
            };
            self.measured.insert(id.clone(), Size::new(width, *height));
        }
    }

    pub fn resolve(&self, node: &FlowNode, config: &LayoutConfig) -> Size {
        match self.measured.get(&node.id) {
            Some(size) if size.width > 0.0 && size.height > 0.0 => *size,
            _ => estimate_node_size(node, config),
        }
    }

    /// Every node of `graph` with its measured or estimated size.
    pub fn resolved(&self, graph: &FlowGraph, config: &LayoutConfig) -> Self {
        let measured = graph
            .nodes
            .iter()
            .map(|node| (node.id.clone(), self.resolve(node, config)))
            .collect();
        Self { measured }
    }
}

/// Copies positions onto the graph, rejecting malformed algorithm output.
pub fn apply_positions(
    graph: &FlowGraph,
    positions: &HashMap<String, Position>,
) -> Result<FlowGraph, LayoutError> {
    if positions.len() != graph.nodes.len() {
        return Err(LayoutError::NodeCountMismatch {
            expected: graph.nodes.len(),
            actual: positions.len(),
        });
    }
    let mut positioned = graph.clone();
    for node in &mut positioned.nodes {
        let Some(position) = positions.get(&node.id) else {
            return Err(LayoutError::MissingPosition(node.id.clone()));
        };
        if !position.x.is_finite() || !position.y.is_finite() {
            return Err(LayoutError::NonFinitePosition(node.id.clone()));
        }
        node.position = *position;
    }
    Ok(positioned)
}

pub(crate) fn is_article(node: &FlowNode) -> bool {
    node.kind == FlowNodeKind::Article
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentNode, FlowEdge, FlowPayload};

    fn graph() -> FlowGraph {
        let node = |id: &str| FlowNode {
            id: id.to_string(),
            kind: FlowNodeKind::Article,
            position: Position::default(),
            payload: FlowPayload::Article(ContentNode::new(id, "text")),
        };
        FlowGraph::new(
            vec![node("article-a"), node("article-b")],
            vec![FlowEdge::new("article-a", "article-b")],
        )
    }

    #[test]
    fn apply_positions_rejects_missing_and_non_finite() {
        let graph = graph();
        let mut positions = HashMap::new();
        positions.insert("article-a".to_string(), Position::new(0.0, 0.0));
        assert_eq!(
            apply_positions(&graph, &positions),
            Err(LayoutError::NodeCountMismatch {
                expected: 2,
                actual: 1
            })
        );
        positions.insert("article-x".to_string(), Position::new(0.0, 0.0));
        assert_eq!(
            apply_positions(&graph, &positions),
            Err(LayoutError::MissingPosition("article-b".to_string()))
        );
        positions.remove("article-x");
        positions.insert("article-b".to_string(), Position::new(f32::NAN, 1.0));
        assert_eq!(
            apply_positions(&graph, &positions),
            Err(LayoutError::NonFinitePosition("article-b".to_string()))
        );
    }

    #[test]
    fn measured_sizes_override_estimates() {
        let graph = graph();
        let config = LayoutConfig::default();
        let mut sizes = NodeSizes::new();
        assert!(sizes.insert("article-a", Size::new(100.0, 333.0)));
        assert!(!sizes.insert("article-a", Size::new(100.0, 333.0)));
        let input = LayoutInput::new(&graph, &sizes, &config, Direction::Down);
        assert_eq!(input.nodes[0].size, Size::new(100.0, 333.0));
        assert_eq!(input.nodes[1].id, "article-b");
        assert_eq!(input.nodes[1].size.width, config.article_size.width);
    }

    #[test]
    fn seeded_heights_do_not_replace_measurements() {
        let config = LayoutConfig::default();
        let mut sizes = NodeSizes::new();
        sizes.insert("article-a", Size::new(10.0, 10.0));
        let heights: HashMap<String, f32> = [
            ("article-a".to_string(), 99.0),
            ("question-q".to_string(), 70.0),
        ]
        .into_iter()
        .collect();
        sizes.seed_heights(&heights, &config);
        assert_eq!(sizes.get("article-a"), Some(Size::new(10.0, 10.0)));
        assert_eq!(
            sizes.get("question-q"),
            Some(Size::new(config.question_size.width, 70.0))
        );
    }
}
