use std::sync::Arc;

use crate::error::BuildIssue;
use crate::flow::project;
use crate::model::{Dataset, FlowGraph};
use crate::tree::build_tree_with_report;

/// Unpositioned flow graph for one dataset plus whatever the builder had to repair.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlowBuild {
    pub graph: FlowGraph,
    pub issues: Vec<BuildIssue>,
}

pub fn build_flow(dataset: &Dataset) -> FlowBuild {
    let report = build_tree_with_report(&dataset.articles, &dataset.questions);
    let graph = project(report.tree.as_ref());
    tracing::debug!(
        graph = ?dataset.graph_id,
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        issues = report.issues.len(),
        "projected flow graph"
    );
    FlowBuild {
        graph,
        issues: report.issues,
    }
}

/// Recomputes the flow graph only when handed a different dataset snapshot.
/// Identity is the `Arc` allocation, not structural equality.
#[derive(Debug, Default)]
pub struct FlowMemo {
    last: Option<(Arc<Dataset>, Arc<FlowBuild>)>,
}

impl FlowMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, dataset: &Arc<Dataset>) -> Arc<FlowBuild> {
        if let Some((source, build)) = &self.last {
            if Arc::ptr_eq(source, dataset) {
                return Arc::clone(build);
            }
        }
        let build = Arc::new(build_flow(dataset));
        self.last = Some((Arc::clone(dataset), Arc::clone(&build)));
        build
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}
