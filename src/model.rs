use serde::{Deserialize, Serialize};
use std::path::Path;

const ARTICLE_PREFIX: &str = "article-";
const QUESTION_PREFIX: &str = "question-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "DOWN" | "TB" | "TD" => Some(Self::Down),
            "UP" | "BT" => Some(Self::Up),
            "RIGHT" | "LR" => Some(Self::Right),
            "LEFT" | "RL" => Some(Self::Left),
            _ => None,
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

/// A unit of material in the branching content graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentNode {
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub takeaways: Vec<String>,
    #[serde(default)]
    pub is_root: bool,
}

impl ContentNode {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            summary: String::new(),
            takeaways: Vec::new(),
            is_root: false,
        }
    }

    /// Text shown on the diagram: the summary when present, the body otherwise.
    pub fn display_text(&self) -> &str {
        if self.summary.trim().is_empty() {
            &self.body
        } else {
            &self.summary
        }
    }
}

/// A directed question from one article to the article answering it.
/// `child_node_id` is `None` while the question is unanswered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEdge {
    pub id: String,
    #[serde(alias = "questionText")]
    pub question: String,
    pub parent_node_id: String,
    #[serde(default)]
    pub child_node_id: Option<String>,
    #[serde(default)]
    pub is_implicit: bool,
}

impl QuestionEdge {
    pub fn new(
        id: impl Into<String>,
        question: impl Into<String>,
        parent: impl Into<String>,
        child: Option<&str>,
    ) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            parent_node_id: parent.into(),
            child_node_id: child.map(str::to_string),
            is_implicit: false,
        }
    }
}

/// Snapshot handed over by the content repository for one graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub graph_id: Option<String>,
    #[serde(default)]
    pub articles: Vec<ContentNode>,
    #[serde(default)]
    pub questions: Vec<QuestionEdge>,
}

impl Dataset {
    pub fn new(articles: Vec<ContentNode>, questions: Vec<QuestionEdge>) -> Self {
        Self {
            graph_id: None,
            articles,
            questions,
        }
    }

    pub fn from_json(input: &str) -> serde_json::Result<Self> {
        serde_json::from_str(input)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&contents)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeArticleNode {
    pub id: String,
    pub data: ContentNode,
    pub outgoing_questions: Vec<TreeQuestionNode>,
}

/// `child_article` holds the answer's subtree the first time an article is reached.
/// Later answers pointing at the same article only carry `linked_article_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeQuestionNode {
    pub id: String,
    pub data: QuestionEdge,
    pub child_article: Option<Box<TreeArticleNode>>,
    pub linked_article_id: Option<String>,
}

impl TreeQuestionNode {
    /// Id of the answering article, expanded here or elsewhere in the tree.
    pub fn answer_id(&self) -> Option<&str> {
        match self.child_article.as_deref() {
            Some(child) => Some(child.id.as_str()),
            None => self.linked_article_id.as_deref(),
        }
    }
}

impl TreeArticleNode {
    /// Every article of the subtree in preorder.
    pub fn articles(&self) -> Vec<&TreeArticleNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            for question in node.outgoing_questions.iter().rev() {
                if let Some(child) = question.child_article.as_deref() {
                    stack.push(child);
                }
            }
        }
        out
    }

    pub fn article_count(&self) -> usize {
        self.articles().len()
    }

    pub fn question_count(&self) -> usize {
        self.articles()
            .iter()
            .map(|article| article.outgoing_questions.len())
            .sum()
    }

    pub fn article_ids(&self) -> Vec<String> {
        self.articles()
            .into_iter()
            .map(|article| article.id.clone())
            .collect()
    }
}

// Deep answer chains would otherwise be dropped one stack frame per level.
impl Drop for TreeArticleNode {
    fn drop(&mut self) {
        let mut pending: Vec<Box<TreeArticleNode>> = self
            .outgoing_questions
            .iter_mut()
            .filter_map(|question| question.child_article.take())
            .collect();
        while let Some(mut node) = pending.pop() {
            pending.extend(
                node.outgoing_questions
                    .iter_mut()
                    .filter_map(|question| question.child_article.take()),
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowNodeKind {
    Article,
    Question,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum FlowPayload {
    Article(ContentNode),
    Question(QuestionEdge),
}

impl FlowPayload {
    pub fn text(&self) -> &str {
        match self {
            Self::Article(article) => article.display_text(),
            Self::Question(question) => &question.question,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub kind: FlowNodeKind,
    pub position: Position,
    pub payload: FlowPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl FlowEdge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            id: format!("{source}->{target}"),
            source: source.to_string(),
            target: target.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowGraph {
    pub fn new(nodes: Vec<FlowNode>, edges: Vec<FlowEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

pub fn article_flow_id(id: &str) -> String {
    format!("{ARTICLE_PREFIX}{id}")
}

pub fn question_flow_id(id: &str) -> String {
    format!("{QUESTION_PREFIX}{id}")
}
