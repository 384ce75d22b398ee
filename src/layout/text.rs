use crate::config::LayoutConfig;
use crate::model::{FlowNode, Size};

use super::is_article;

/// Placeholder size for a node the rendering surface has not measured yet.
/// Width is fixed per node kind; height grows with the wrapped text.
pub fn estimate_node_size(node: &FlowNode, config: &LayoutConfig) -> Size {
    let base = if is_article(node) {
        config.article_size
    } else {
        config.question_size
    };
    let text = node.payload.text();
    let inner_width = (base.width - config.node_padding_x * 2.0).max(1.0);
    let max_chars = max_chars_for_width(inner_width, config).min(config.max_label_width_chars.max(1));
    let line_count = wrap_text(text, max_chars).len().max(1);
    let text_height = line_count as f32 * config.label_font_size * config.label_line_height;
    let height = (text_height + config.node_padding_y * 2.0).max(base.height);
    let height = if is_article(node) {
        height.min(config.max_article_height.max(base.height))
    } else {
        height
    };
    Size::new(base.width, height)
}

fn max_chars_for_width(width: f32, config: &LayoutConfig) -> usize {
    let approx_char_width = config.label_font_size * 0.55;
    ((width / approx_char_width).floor() as usize).max(1)
}

pub(crate) fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for raw in split_lines(text) {
        lines.extend(wrap_line(&raw, max_chars));
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

fn wrap_line(line: &str, max_chars: usize) -> Vec<String> {
    if line.chars().count() <= max_chars {
        return vec![line.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if candidate.chars().count() > max_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            // Hard-split words longer than a whole line.
            let mut chars: Vec<char> = word.chars().collect();
            while chars.len() > max_chars {
                let rest = chars.split_off(max_chars);
                lines.push(chars.into_iter().collect());
                chars = rest;
            }
            current = chars.into_iter().collect();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentNode, FlowNodeKind, FlowPayload, Position, QuestionEdge};

    fn article_node(body: &str) -> FlowNode {
        FlowNode {
            id: "article-a".to_string(),
            kind: FlowNodeKind::Article,
            position: Position::default(),
            payload: FlowPayload::Article(ContentNode::new("a", body)),
        }
    }

    #[test]
    fn wraps_long_lines() {
        let lines = wrap_text("this is a long label", 8);
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= 8));
    }

    #[test]
    fn hard_splits_long_words() {
        let lines = wrap_text("abcdefghijkl", 5);
        assert_eq!(lines, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn longer_text_gives_taller_article() {
        let config = LayoutConfig::default();
        let short = estimate_node_size(&article_node("short"), &config);
        let long = estimate_node_size(&article_node(&"lorem ipsum ".repeat(60)), &config);
        assert_eq!(short.width, config.article_size.width);
        assert_eq!(short.height, config.article_size.height);
        assert!(long.height > short.height);
        assert!(long.height <= config.max_article_height);
    }

    #[test]
    fn question_uses_question_placeholder() {
        let config = LayoutConfig::default();
        let node = FlowNode {
            id: "question-q".to_string(),
            kind: FlowNodeKind::Question,
            position: Position::default(),
            payload: FlowPayload::Question(QuestionEdge::new("q", "Why?", "a", None)),
        };
        assert_eq!(estimate_node_size(&node, &config), config.question_size);
    }
}
