use crate::config::{LayoutConfig, RenderConfig};
use crate::layout::NodeSizes;
use crate::layout::text::wrap_text;
use crate::model::{Direction, FlowGraph, FlowNode, FlowNodeKind, Size};
use crate::theme::Theme;
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

const CANVAS_PADDING: f32 = 24.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions<'a> {
    pub direction: Direction,
    pub active_node_id: Option<&'a str>,
}

pub fn render_svg(
    graph: &FlowGraph,
    sizes: &NodeSizes,
    theme: &Theme,
    config: &LayoutConfig,
    options: RenderOptions<'_>,
) -> String {
    let boxes: HashMap<&str, (&FlowNode, Size)> = graph
        .nodes
        .iter()
        .map(|node| (node.id.as_str(), (node, sizes.resolve(node, config))))
        .collect();

    let (min_x, min_y, max_x, max_y) = bounds(graph, &boxes);
    let offset_x = CANVAS_PADDING - min_x;
    let offset_y = CANVAS_PADDING - min_y;
    let width = (max_x - min_x + CANVAS_PADDING * 2.0).max(200.0);
    let height = (max_y - min_y + CANVAS_PADDING * 2.0).max(200.0);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.2}\" height=\"{height:.2}\" viewBox=\"0 0 {width:.2} {height:.2}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));
    svg.push_str("<defs>");
    svg.push_str(&format!(
        "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"6\" markerHeight=\"6\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.line_color
    ));
    svg.push_str("</defs>");
    svg.push_str(&format!(
        "<g transform=\"translate({offset_x:.2} {offset_y:.2})\">"
    ));

    for edge in &graph.edges {
        let (Some(source), Some(target)) = (
            boxes.get(edge.source.as_str()),
            boxes.get(edge.target.as_str()),
        ) else {
            continue;
        };
        let points = [
            exit_point(source.0, source.1, options.direction),
            entry_point(target.0, target.1, options.direction),
        ];
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\" marker-end=\"url(#arrow)\" />",
            points_to_path(&points),
            theme.line_color
        ));
    }

    for node in &graph.nodes {
        let Some((_, size)) = boxes.get(node.id.as_str()) else {
            continue;
        };
        let active = options.active_node_id == Some(node.id.as_str());
        let (fill, border, radius) = match node.kind {
            FlowNodeKind::Article => (&theme.article_fill, &theme.article_border, 10.0),
            FlowNodeKind::Question => (
                &theme.question_fill,
                &theme.question_border,
                size.height / 2.0,
            ),
        };
        let (stroke, stroke_width) = if active {
            (&theme.active_border, 2.4)
        } else {
            (border, 1.4)
        };
        svg.push_str(&format!(
            "<rect id=\"{}\" x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"{radius:.2}\" ry=\"{radius:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{stroke_width}\"/>",
            escape_xml(&node.id),
            node.position.x,
            node.position.y,
            size.width,
            size.height,
            fill,
            stroke
        ));
        let center_x = node.position.x + size.width / 2.0;
        let center_y = node.position.y + size.height / 2.0;
        svg.push_str(&text_block_svg(center_x, center_y, node, *size, theme, config));
    }

    svg.push_str("</g></svg>");
    svg
}

fn bounds(graph: &FlowGraph, boxes: &HashMap<&str, (&FlowNode, Size)>) -> (f32, f32, f32, f32) {
    if graph.nodes.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for (node, size) in boxes.values() {
        min_x = min_x.min(node.position.x);
        min_y = min_y.min(node.position.y);
        max_x = max_x.max(node.position.x + size.width);
        max_y = max_y.max(node.position.y + size.height);
    }
    (min_x, min_y, max_x, max_y)
}

fn exit_point(node: &FlowNode, size: Size, direction: Direction) -> (f32, f32) {
    let (x, y) = (node.position.x, node.position.y);
    match direction {
        Direction::Down => (x + size.width / 2.0, y + size.height),
        Direction::Up => (x + size.width / 2.0, y),
        Direction::Right => (x + size.width, y + size.height / 2.0),
        Direction::Left => (x, y + size.height / 2.0),
    }
}

fn entry_point(node: &FlowNode, size: Size, direction: Direction) -> (f32, f32) {
    let (x, y) = (node.position.x, node.position.y);
    match direction {
        Direction::Down => (x + size.width / 2.0, y),
        Direction::Up => (x + size.width / 2.0, y + size.height),
        Direction::Right => (x, y + size.height / 2.0),
        Direction::Left => (x + size.width, y + size.height / 2.0),
    }
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

fn text_block_svg(
    x: f32,
    y: f32,
    node: &FlowNode,
    size: Size,
    theme: &Theme,
    config: &LayoutConfig,
) -> String {
    let approx_char_width = theme.font_size * 0.55;
    let inner_width = (size.width - config.node_padding_x * 2.0).max(approx_char_width);
    let max_chars = ((inner_width / approx_char_width).floor() as usize).max(1);
    let line_height = theme.font_size * config.label_line_height;
    let max_lines = (((size.height - config.node_padding_y * 2.0) / line_height).floor() as usize).max(1);

    let mut lines = wrap_text(node.payload.text(), max_chars);
    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            last.push('…');
        }
    }

    let fill = match node.kind {
        FlowNodeKind::Article => theme.text_color.as_str(),
        FlowNodeKind::Question => theme.muted_text_color.as_str(),
    };
    let total_height = lines.len() as f32 * line_height;
    let start_y = y - total_height / 2.0 + theme.font_size;
    let mut text = String::new();
    text.push_str(&format!(
        "<text x=\"{x:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">",
        escape_xml(&theme.font_family),
        theme.font_size,
        fill
    ));
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_height };
        text.push_str(&format!(
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(line)
        ));
    }
    text.push_str("</text>");
    text
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = "Inter".to_string();
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;
    if let Some(color) = parse_hex_color(&render_cfg.background) {
        pixmap.fill(color);
    }

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

#[cfg(feature = "png")]
fn parse_hex_color(value: &str) -> Option<resvg::tiny_skia::Color> {
    let hex = value.trim().strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some(resvg::tiny_skia::Color::from_rgba8(
        channel(0..2)?,
        channel(2..4)?,
        channel(4..6)?,
        255,
    ))
}

pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
