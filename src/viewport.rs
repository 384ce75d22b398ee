//! Render-cost controls: force tuning from graph density and viewport culling
//! for large graphs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::{LayoutConfig, ViewportConfig};
use crate::layout::NodeSizes;
use crate::model::{FlowEdge, FlowGraph, FlowNode};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDensity {
    pub density: f32,
    pub recommended_link_distance: f32,
    pub recommended_charge_strength: f32,
}

/// Pan/zoom transform of the rendering surface: screen = graph * zoom + (x, y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenDimensions {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn expand(self, margin: f32) -> Self {
        Self {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    /// Touching edges count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.x + other.width
            && other.x <= self.x + self.width
            && self.y <= other.y + other.height
            && other.y <= self.y + self.height
    }
}

impl Viewport {
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split(',').map(|p| p.trim().parse::<f32>());
        let x = parts.next()?.ok()?;
        let y = parts.next()?.ok()?;
        let zoom = match parts.next() {
            Some(value) => value.ok()?,
            None => 1.0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { x, y, zoom })
    }

    /// The part of the graph plane currently on screen.
    pub fn visible_rect(&self, screen: ScreenDimensions) -> Rect {
        let zoom = if self.zoom.is_finite() && self.zoom > 0.0 {
            self.zoom
        } else {
            1.0
        };
        Rect {
            x: -self.x / zoom,
            y: -self.y / zoom,
            width: screen.width / zoom,
            height: screen.height / zoom,
        }
    }
}

/// Fraction of the undirected complete graph present, mapped onto force-layout tuning.
/// Denser graphs get shorter links and weaker repulsion.
pub fn calculate_graph_density(node_count: usize, edge_count: usize) -> GraphDensity {
    calculate_graph_density_with(node_count, edge_count, &ViewportConfig::default())
}

pub fn calculate_graph_density_with(
    node_count: usize,
    edge_count: usize,
    config: &ViewportConfig,
) -> GraphDensity {
    let density = if node_count <= 1 {
        0.0
    } else {
        let possible = node_count as f64 * (node_count as f64 - 1.0) / 2.0;
        (edge_count as f64 / possible) as f32
    };
    let t = density.clamp(0.0, 1.0);
    GraphDensity {
        density,
        recommended_link_distance: lerp(config.sparse_link_distance, config.dense_link_distance, t),
        recommended_charge_strength: lerp(
            config.sparse_charge_strength,
            config.dense_charge_strength,
            t,
        ),
    }
}

pub fn graph_density(graph: &FlowGraph, config: &ViewportConfig) -> GraphDensity {
    calculate_graph_density_with(graph.nodes.len(), graph.edges.len(), config)
}

fn footprint(node: &FlowNode, sizes: &NodeSizes, layout: &LayoutConfig) -> Rect {
    let size = sizes.resolve(node, layout);
    Rect {
        x: node.position.x,
        y: node.position.y,
        width: size.width,
        height: size.height,
    }
}

fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Bounds the render set for large graphs. Small graphs pass through untouched.
///
/// Above the threshold the active node and its direct neighbours always survive,
/// plus up to `max_visible_nodes` further nodes overlapping the (margin-expanded)
/// viewport, in input order. Edges survive when both endpoints do.
///
/// Node footprints are estimated from their text; use
/// [`optimize_graph_for_performance_with`] when measured sizes are known.
pub fn optimize_graph_for_performance(
    nodes: &[FlowNode],
    edges: &[FlowEdge],
    active_node_id: Option<&str>,
    viewport: Viewport,
    screen: ScreenDimensions,
    config: &ViewportConfig,
) -> FlowGraph {
    optimize_graph_for_performance_with(
        nodes,
        edges,
        active_node_id,
        viewport,
        screen,
        &NodeSizes::new(),
        &LayoutConfig::default(),
        config,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn optimize_graph_for_performance_with(
    nodes: &[FlowNode],
    edges: &[FlowEdge],
    active_node_id: Option<&str>,
    viewport: Viewport,
    screen: ScreenDimensions,
    sizes: &NodeSizes,
    layout: &LayoutConfig,
    config: &ViewportConfig,
) -> FlowGraph {
    if nodes.len() <= config.cull_threshold {
        return FlowGraph::new(nodes.to_vec(), edges.to_vec());
    }

    let mut pinned: HashSet<&str> = HashSet::new();
    if let Some(active) = active_node_id {
        pinned.insert(active);
        for edge in edges {
            if edge.source == active {
                pinned.insert(edge.target.as_str());
            } else if edge.target == active {
                pinned.insert(edge.source.as_str());
            }
        }
    }

    let visible = viewport
        .visible_rect(screen)
        .expand(config.viewport_margin.max(0.0));
    let mut kept: HashSet<&str> =
        HashSet::with_capacity(nodes.len().min(config.max_visible_nodes + pinned.len()));
    let mut extra = 0usize;
    for node in nodes {
        let id = node.id.as_str();
        if pinned.contains(id) {
            kept.insert(id);
        } else if extra < config.max_visible_nodes
            && visible.intersects(&footprint(node, sizes, layout))
        {
            kept.insert(id);
            extra += 1;
        }
    }

    let culled_nodes: Vec<FlowNode> = nodes
        .iter()
        .filter(|node| kept.contains(node.id.as_str()))
        .cloned()
        .collect();
    let culled_edges: Vec<FlowEdge> = edges
        .iter()
        .filter(|edge| kept.contains(edge.source.as_str()) && kept.contains(edge.target.as_str()))
        .cloned()
        .collect();
    tracing::trace!(
        nodes = nodes.len(),
        kept = culled_nodes.len(),
        edges = culled_edges.len(),
        "culled graph to viewport"
    );
    FlowGraph::new(culled_nodes, culled_edges)
}
