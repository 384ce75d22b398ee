use crate::config::{Config, load_config};
use crate::error::BuildIssue;
use crate::layout::{LayoutEngine, LayoutOptions, LayoutOutcome, NodeSizes};
use crate::model::{Dataset, Direction, FlowGraph};
use crate::pipeline::FlowMemo;
use crate::render::{RenderOptions, render_svg, write_output_png, write_output_svg};
use crate::snapshot::LayoutSnapshot;
use crate::viewport::{
    GraphDensity, ScreenDimensions, Viewport, graph_density, optimize_graph_for_performance_with,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "branchflow",
    version,
    about = "Lay out a branching article graph and render it"
)]
pub struct Args {
    /// Dataset JSON file (articles + questions) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config file (JSON or JSON5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Layout direction: DOWN, UP, LEFT, RIGHT (or TB, BT, RL, LR)
    #[arg(short = 'd', long = "direction")]
    pub direction: Option<String>,

    /// Flow node id to highlight and always keep visible, e.g. article-42
    #[arg(long = "active")]
    pub active: Option<String>,

    /// Layout snapshot to restore from and write back to
    #[arg(long = "snapshot")]
    pub snapshot: Option<PathBuf>,

    /// Viewport transform as x,y[,zoom]; enables culling of large graphs
    #[arg(long = "viewport", allow_hyphen_values = true)]
    pub viewport: Option<String>,

    /// Screen width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Screen height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    graph_id: Option<&'a str>,
    direction: Direction,
    density: GraphDensity,
    issues: Vec<String>,
    graph: &'a FlowGraph,
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run_with(args))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("BRANCHFLOW_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub async fn run_with(args: Args) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    let direction = match args.direction.as_deref() {
        Some(token) => Direction::from_token(token)
            .ok_or_else(|| anyhow::anyhow!("Unknown direction `{token}`"))?,
        None => config.layout.direction,
    };
    let viewport = match args.viewport.as_deref() {
        Some(raw) => Some(
            Viewport::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("Viewport must be x,y[,zoom], got `{raw}`"))?,
        ),
        None => None,
    };

    let dataset = Arc::new(read_dataset(args.input.as_deref())?);
    let mut memo = FlowMemo::new();
    let build = memo.get(&dataset);
    if build.graph.is_empty() && !dataset.articles.is_empty() {
        tracing::warn!("dataset produced an empty graph");
    }

    let engine = LayoutEngine::from_config(config.layout.clone());
    let snapshot = args
        .snapshot
        .as_deref()
        .and_then(LayoutSnapshot::load_optional);
    let sizes = NodeSizes::new();
    let outcome = engine
        .restore_or_layout(
            snapshot.as_ref(),
            &build.graph,
            &sizes,
            LayoutOptions::new(direction),
        )
        .await;
    let positioned = match outcome {
        LayoutOutcome::Ready(graph) => graph,
        LayoutOutcome::Failed(err) => return Err(err).context("layout failed"),
        LayoutOutcome::Superseded => anyhow::bail!("layout was superseded"),
    };

    let resolved = sizes.resolved(&positioned, &config.layout);
    if let Some(path) = args.snapshot.as_deref() {
        LayoutSnapshot::capture(dataset.graph_id.clone(), &positioned, &resolved, direction)
            .save(path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    }

    let density = graph_density(&positioned, &config.viewport);
    tracing::debug!(
        density = density.density,
        link_distance = density.recommended_link_distance,
        charge = density.recommended_charge_strength,
        "graph density"
    );
    let visible = match viewport {
        Some(viewport) => optimize_graph_for_performance_with(
            &positioned.nodes,
            &positioned.edges,
            args.active.as_deref(),
            viewport,
            screen(&config),
            &resolved,
            &config.layout,
            &config.viewport,
        ),
        None => positioned,
    };

    write_output(
        &args,
        &config,
        &dataset,
        &build.issues,
        &visible,
        &resolved,
        direction,
        density,
    )
}

#[allow(clippy::too_many_arguments)]
fn write_output(
    args: &Args,
    config: &Config,
    dataset: &Dataset,
    issues: &[BuildIssue],
    graph: &FlowGraph,
    sizes: &NodeSizes,
    direction: Direction,
    density: GraphDensity,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => {
            let report = JsonReport {
                graph_id: dataset.graph_id.as_deref(),
                direction,
                density,
                issues: issues.iter().map(ToString::to_string).collect(),
                graph,
            };
            let json = serde_json::to_string_pretty(&report)?;
            match args.output.as_deref() {
                Some(path) => std::fs::write(path, json)?,
                None => println!("{json}"),
            }
        }
        OutputFormat::Svg | OutputFormat::Png => {
            let options = RenderOptions {
                direction,
                active_node_id: args.active.as_deref(),
            };
            let svg = render_svg(graph, sizes, &config.theme, &config.layout, options);
            if args.output_format == OutputFormat::Svg {
                write_output_svg(&svg, args.output.as_deref())?;
            } else {
                let output = ensure_output(&args.output, "png")?;
                write_output_png(&svg, &output, &config.render)?;
            }
        }
    }
    Ok(())
}

fn screen(config: &Config) -> ScreenDimensions {
    ScreenDimensions {
        width: config.render.width,
        height: config.render.height,
    }
}

fn read_dataset(path: Option<&Path>) -> Result<Dataset> {
    let content = match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Dataset::from_json(&content).context("invalid dataset JSON")
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_dataset(dir: &Path) -> PathBuf {
        let path = dir.join("dataset.json");
        std::fs::write(
            &path,
            r#"{
                "graphId": "demo",
                "articles": [
                    {"id": "a", "body": "Start here"},
                    {"id": "b", "body": "Then this"}
                ],
                "questions": [
                    {"id": "q1", "question": "What next?", "parentNodeId": "a", "childNodeId": "b"},
                    {"id": "q2", "question": "Open?", "parentNodeId": "b"}
                ]
            }"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn parses_flags() {
        let args = Args::try_parse_from([
            "branchflow",
            "-i",
            "data.json",
            "-e",
            "json",
            "-d",
            "LR",
            "--active",
            "article-a",
            "--viewport",
            "-10,20,1.5",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.direction.as_deref(), Some("LR"));
        assert_eq!(args.viewport.as_deref(), Some("-10,20,1.5"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn writes_json_report_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_dataset(dir.path());
        let output = dir.path().join("out.json");
        let snapshot = dir.path().join("layout.json");
        let args = Args::try_parse_from([
            "branchflow",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-e",
            "json",
            "--snapshot",
            snapshot.to_str().unwrap(),
        ])
        .unwrap();
        run_with(args).await.unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report["graphId"], "demo");
        assert_eq!(report["graph"]["nodes"].as_array().unwrap().len(), 4);
        let saved = LayoutSnapshot::load(&snapshot).unwrap();
        assert_eq!(saved.nodes.len(), 4);
        assert_eq!(saved.node_heights.len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn writes_svg_with_active_highlight() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_dataset(dir.path());
        let output = dir.path().join("out.svg");
        let args = Args::try_parse_from([
            "branchflow",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "-d",
            "right",
            "--active",
            "question-q1",
        ])
        .unwrap();
        run_with(args).await.unwrap();
        let svg = std::fs::read_to_string(&output).unwrap();
        assert!(svg.contains("What next?"));
        assert!(svg.contains("id=\"question-q1\""));
    }

    #[tokio::test]
    async fn rejects_unknown_direction() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_dataset(dir.path());
        let args = Args::try_parse_from([
            "branchflow",
            "-i",
            input.to_str().unwrap(),
            "-d",
            "diagonal",
        ])
        .unwrap();
        let err = run_with(args).await.unwrap_err();
        assert!(err.to_string().contains("diagonal"));
    }
}
