use std::collections::{HashMap, HashSet};

use im::HashSet as PathSet;

use crate::error::BuildIssue;
use crate::model::{ContentNode, QuestionEdge, TreeArticleNode, TreeQuestionNode};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreeBuild {
    pub tree: Option<TreeArticleNode>,
    pub issues: Vec<BuildIssue>,
}

struct Indexes<'a> {
    nodes_by_id: HashMap<&'a str, &'a ContentNode>,
    by_parent: HashMap<&'a str, Vec<&'a QuestionEdge>>,
    child_ids: HashSet<&'a str>,
}

impl<'a> Indexes<'a> {
    fn new(articles: &'a [ContentNode], questions: &'a [QuestionEdge]) -> Self {
        let mut nodes_by_id = HashMap::with_capacity(articles.len());
        for article in articles {
            nodes_by_id.entry(article.id.as_str()).or_insert(article);
        }
        let mut by_parent: HashMap<&str, Vec<&QuestionEdge>> = HashMap::new();
        let mut child_ids = HashSet::new();
        for question in questions {
            by_parent
                .entry(question.parent_node_id.as_str())
                .or_default()
                .push(question);
            if let Some(child) = question.child_node_id.as_deref() {
                child_ids.insert(child);
            }
        }
        Self {
            nodes_by_id,
            by_parent,
            child_ids,
        }
    }

    fn outgoing(&self, article_id: &str) -> &[&'a QuestionEdge] {
        self.by_parent
            .get(article_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Builds the article tree, dropping diagnostics. Returns `None` when no root exists.
pub fn build_tree(articles: &[ContentNode], questions: &[QuestionEdge]) -> Option<TreeArticleNode> {
    build_tree_with_report(articles, questions).tree
}

pub fn build_tree_with_report(articles: &[ContentNode], questions: &[QuestionEdge]) -> TreeBuild {
    if articles.is_empty() {
        return TreeBuild::default();
    }

    let indexes = Indexes::new(articles, questions);
    let mut issues = Vec::new();

    let candidates: Vec<&ContentNode> = articles
        .iter()
        .filter(|article| !indexes.child_ids.contains(article.id.as_str()))
        .collect();
    let Some(root) = candidates.first().copied() else {
        tracing::warn!(articles = articles.len(), "article graph has no root");
        return TreeBuild {
            tree: None,
            issues: vec![BuildIssue::MissingRoot],
        };
    };
    if candidates.len() > 1 {
        let issue = BuildIssue::AmbiguousRoot {
            chosen: root.id.clone(),
            candidates: candidates.iter().map(|c| c.id.clone()).collect(),
        };
        tracing::warn!("{issue}");
        issues.push(issue);
    }

    let tree = build_from(root, &indexes, &mut issues);
    for issue in &issues {
        if matches!(issue, BuildIssue::AmbiguousRoot { .. }) {
            continue;
        }
        tracing::debug!("{issue}");
    }
    if let Some(tree) = &tree {
        tracing::debug!(
            articles = tree.article_count(),
            questions = tree.question_count(),
            issues = issues.len(),
            "built article tree"
        );
    }
    TreeBuild { tree, issues }
}

enum Answer<'a> {
    Open,
    Expanded(usize),
    Linked(&'a str),
}

struct Draft<'a> {
    article: &'a ContentNode,
    questions: Vec<(&'a QuestionEdge, Answer<'a>)>,
}

// `path` holds the ancestors of the draft, itself included; each branch gets its own copy.
struct Frame<'a> {
    draft: usize,
    next: usize,
    path: PathSet<&'a str>,
}

// Depth-first over an explicit stack so chain depth never grows the call stack.
// An article is expanded the first time it is reached; later answers link to it.
fn build_from<'a>(
    root: &'a ContentNode,
    indexes: &Indexes<'a>,
    issues: &mut Vec<BuildIssue>,
) -> Option<TreeArticleNode> {
    let mut drafts = vec![Draft {
        article: root,
        questions: Vec::new(),
    }];
    let mut expanded: HashSet<&str> = HashSet::from([root.id.as_str()]);
    let mut stack = vec![Frame {
        draft: 0,
        next: 0,
        path: PathSet::unit(root.id.as_str()),
    }];

    while let Some(frame) = stack.last_mut() {
        let parent = drafts[frame.draft].article;
        let Some(question) = indexes.outgoing(&parent.id).get(frame.next).copied() else {
            stack.pop();
            continue;
        };
        frame.next += 1;

        let mut descend = None;
        let answer = match question.child_node_id.as_deref() {
            None => Answer::Open,
            Some(child_id) if frame.path.contains(child_id) => {
                issues.push(BuildIssue::CycleDetected {
                    question_id: question.id.clone(),
                    article_id: child_id.to_string(),
                });
                Answer::Open
            }
            Some(child_id) => match indexes.nodes_by_id.get_key_value(child_id) {
                None => {
                    issues.push(BuildIssue::DanglingReference {
                        question_id: question.id.clone(),
                        child_id: child_id.to_string(),
                    });
                    Answer::Open
                }
                Some((&id, _)) if expanded.contains(id) => Answer::Linked(id),
                Some((&id, &child)) => {
                    expanded.insert(id);
                    let index = drafts.len();
                    drafts.push(Draft {
                        article: child,
                        questions: Vec::new(),
                    });
                    descend = Some(Frame {
                        draft: index,
                        next: 0,
                        path: frame.path.update(id),
                    });
                    Answer::Expanded(index)
                }
            },
        };
        drafts[frame.draft].questions.push((question, answer));
        if let Some(child) = descend {
            stack.push(child);
        }
    }

    assemble(drafts)
}

// Drafts are in preorder, so every child sits after its parent. Folding from the back
// finishes each subtree before its parent needs it.
fn assemble(drafts: Vec<Draft<'_>>) -> Option<TreeArticleNode> {
    let mut built: Vec<Option<TreeArticleNode>> = Vec::with_capacity(drafts.len());
    built.resize_with(drafts.len(), || None);
    for (index, draft) in drafts.into_iter().enumerate().rev() {
        let outgoing_questions = draft
            .questions
            .into_iter()
            .map(|(question, answer)| {
                let (child_article, linked_article_id) = match answer {
                    Answer::Open => (None, None),
                    Answer::Expanded(child) => (built[child].take().map(Box::new), None),
                    Answer::Linked(id) => (None, Some(id.to_string())),
                };
                TreeQuestionNode {
                    id: question.id.clone(),
                    data: question.clone(),
                    child_article,
                    linked_article_id,
                }
            })
            .collect();
        built[index] = Some(TreeArticleNode {
            id: draft.article.id.clone(),
            data: draft.article.clone(),
            outgoing_questions,
        });
    }
    built.into_iter().next().flatten()
}
