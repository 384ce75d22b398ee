use crate::model::{Direction, Size};
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LayoutAlgorithmKind {
    #[default]
    Dagre,
    Layered,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub algorithm: LayoutAlgorithmKind,
    pub direction: Direction,
    pub node_spacing: f32,
    pub rank_spacing: f32,
    pub order_passes: usize,
    /// Placeholder sizes used until the rendering surface reports a measurement.
    pub article_size: Size,
    pub question_size: Size,
    pub max_article_height: f32,
    pub label_font_size: f32,
    pub label_line_height: f32,
    pub max_label_width_chars: usize,
    pub node_padding_x: f32,
    pub node_padding_y: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            algorithm: LayoutAlgorithmKind::Dagre,
            direction: Direction::Down,
            node_spacing: 50.0,
            rank_spacing: 50.0,
            order_passes: 4,
            article_size: Size::new(320.0, 120.0),
            question_size: Size::new(240.0, 48.0),
            max_article_height: 480.0,
            label_font_size: 14.0,
            label_line_height: 1.5,
            max_label_width_chars: 44,
            node_padding_x: 16.0,
            node_padding_y: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewportConfig {
    /// Graphs with at most this many nodes are never culled.
    pub cull_threshold: usize,
    pub viewport_margin: f32,
    pub max_visible_nodes: usize,
    pub sparse_link_distance: f32,
    pub dense_link_distance: f32,
    pub sparse_charge_strength: f32,
    pub dense_charge_strength: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            cull_threshold: 50,
            viewport_margin: 200.0,
            max_visible_nodes: 40,
            sparse_link_distance: 180.0,
            dense_link_distance: 60.0,
            sparse_charge_strength: -800.0,
            dense_charge_strength: -150.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub viewport: ViewportConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SizeFile {
    width: Option<f32>,
    height: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    algorithm: Option<LayoutAlgorithmKind>,
    direction: Option<String>,
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    order_passes: Option<usize>,
    article_size: Option<SizeFile>,
    question_size: Option<SizeFile>,
    max_article_height: Option<f32>,
    label_font_size: Option<f32>,
    max_label_width_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViewportConfigFile {
    cull_threshold: Option<usize>,
    viewport_margin: Option<f32>,
    max_visible_nodes: Option<usize>,
    sparse_link_distance: Option<f32>,
    dense_link_distance: Option<f32>,
    sparse_charge_strength: Option<f32>,
    dense_charge_strength: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    article_fill: Option<String>,
    article_border: Option<String>,
    question_fill: Option<String>,
    question_border: Option<String>,
    text_color: Option<String>,
    line_color: Option<String>,
    active_border: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    viewport: Option<ViewportConfigFile>,
    width: Option<f32>,
    height: Option<f32>,
}

/// Loads a JSON (or JSON5) config file over the defaults. `None` gives the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = json5::from_str(contents)?;
    let mut config = Config::default();

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "modern" => config.theme = Theme::modern(),
            "classic" | "default" => config.theme = Theme::classic(),
            other => tracing::warn!(theme = other, "unknown theme name, keeping default"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        let theme = &mut config.theme;
        if let Some(v) = vars.font_family {
            theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            theme.font_size = v;
        }
        if let Some(v) = vars.article_fill {
            theme.article_fill = v;
        }
        if let Some(v) = vars.article_border {
            theme.article_border = v;
        }
        if let Some(v) = vars.question_fill {
            theme.question_fill = v;
        }
        if let Some(v) = vars.question_border {
            theme.question_border = v;
        }
        if let Some(v) = vars.text_color {
            theme.text_color = v;
        }
        if let Some(v) = vars.line_color {
            theme.line_color = v;
        }
        if let Some(v) = vars.active_border {
            theme.active_border = v;
        }
        if let Some(v) = vars.background {
            theme.background = v;
        }
    }
    config.render.background = config.theme.background.clone();

    if let Some(layout) = parsed.layout {
        let target = &mut config.layout;
        if let Some(v) = layout.algorithm {
            target.algorithm = v;
        }
        if let Some(v) = layout.direction.as_deref() {
            target.direction = Direction::from_token(v)
                .ok_or_else(|| anyhow::anyhow!("unknown layout direction `{v}`"))?;
        }
        if let Some(v) = layout.node_spacing {
            target.node_spacing = v.max(0.0);
        }
        if let Some(v) = layout.rank_spacing {
            target.rank_spacing = v.max(0.0);
        }
        if let Some(v) = layout.order_passes {
            target.order_passes = v;
        }
        if let Some(size) = layout.article_size {
            apply_size(&mut target.article_size, size);
        }
        if let Some(size) = layout.question_size {
            apply_size(&mut target.question_size, size);
        }
        if let Some(v) = layout.max_article_height {
            target.max_article_height = v;
        }
        if let Some(v) = layout.label_font_size {
            target.label_font_size = v.max(1.0);
        }
        if let Some(v) = layout.max_label_width_chars {
            target.max_label_width_chars = v.max(1);
        }
    }

    if let Some(viewport) = parsed.viewport {
        let target = &mut config.viewport;
        if let Some(v) = viewport.cull_threshold {
            target.cull_threshold = v;
        }
        if let Some(v) = viewport.viewport_margin {
            target.viewport_margin = v;
        }
        if let Some(v) = viewport.max_visible_nodes {
            target.max_visible_nodes = v;
        }
        if let Some(v) = viewport.sparse_link_distance {
            target.sparse_link_distance = v;
        }
        if let Some(v) = viewport.dense_link_distance {
            target.dense_link_distance = v;
        }
        if let Some(v) = viewport.sparse_charge_strength {
            target.sparse_charge_strength = v;
        }
        if let Some(v) = viewport.dense_charge_strength {
            target.dense_charge_strength = v;
        }
    }

    if let Some(v) = parsed.width {
        config.render.width = v;
    }
    if let Some(v) = parsed.height {
        config.render.height = v;
    }

    Ok(config)
}

fn apply_size(target: &mut Size, file: SizeFile) {
    if let Some(width) = file.width {
        target.width = width.max(1.0);
    }
    if let Some(height) = file.height {
        target.height = height.max(1.0);
    }
}
