#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod layout;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod snapshot;
pub mod theme;
pub mod tree;
pub mod viewport;

#[cfg(feature = "cli")]
pub use cli::run;
pub use error::{BuildIssue, LayoutError, SnapshotError};
pub use flow::project;
pub use layout::{LayoutEngine, LayoutOptions, LayoutOutcome, LayoutStatus, NodeSizes};
pub use model::{Dataset, Direction, FlowEdge, FlowGraph, FlowNode, TreeArticleNode};
pub use pipeline::{FlowBuild, FlowMemo, build_flow};
pub use tree::{build_tree, build_tree_with_report};
pub use viewport::{calculate_graph_density, optimize_graph_for_performance};
