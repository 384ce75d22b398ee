use std::collections::HashSet;

use crate::model::{
    FlowEdge, FlowGraph, FlowNode, FlowNodeKind, FlowPayload, Position, TreeArticleNode,
    TreeQuestionNode, article_flow_id, question_flow_id,
};

/// Flattens an article tree into renderer nodes and edges in depth-first preorder.
/// Positions are left at the origin; the layout engine fills them in.
///
/// Flow ids are unique in the output. An answer pointing at an article emitted
/// earlier (a diamond in the source data) becomes an edge to that article.
pub fn project(tree: Option<&TreeArticleNode>) -> FlowGraph {
    let mut graph = FlowGraph::default();
    let Some(root) = tree else {
        return graph;
    };
    let mut emitted = HashSet::new();
    let mut stack = Vec::new();
    if let Some(frame) = emit_article(root, &mut graph, &mut emitted) {
        stack.push(frame);
    }

    while let Some((article_id, questions)) = stack.last_mut() {
        let Some(question) = questions.next() else {
            stack.pop();
            continue;
        };
        let article_id = article_id.clone();
        let question_id = question_flow_id(&question.id);
        if !emitted.insert(question_id.clone()) {
            tracing::debug!(question = %question.id, "skipping duplicate question id");
            continue;
        }
        graph.nodes.push(FlowNode {
            id: question_id.clone(),
            kind: FlowNodeKind::Question,
            position: Position::default(),
            payload: FlowPayload::Question(question.data.clone()),
        });
        graph.edges.push(FlowEdge::new(&article_id, &question_id));

        let Some(answer) = question.answer_id() else {
            continue;
        };
        graph
            .edges
            .push(FlowEdge::new(&question_id, &article_flow_id(answer)));
        if let Some(child) = question.child_article.as_deref() {
            if let Some(frame) = emit_article(child, &mut graph, &mut emitted) {
                stack.push(frame);
            }
        }
    }
    graph
}

type Frame<'t> = (String, std::slice::Iter<'t, TreeQuestionNode>);

// Pushes the article node once; a repeat yields no frame so its subtree is not walked again.
fn emit_article<'t>(
    article: &'t TreeArticleNode,
    graph: &mut FlowGraph,
    emitted: &mut HashSet<String>,
) -> Option<Frame<'t>> {
    let article_id = article_flow_id(&article.id);
    if !emitted.insert(article_id.clone()) {
        return None;
    }
    graph.nodes.push(FlowNode {
        id: article_id.clone(),
        kind: FlowNodeKind::Article,
        position: Position::default(),
        payload: FlowPayload::Article(article.data.clone()),
    });
    Some((article_id, article.outgoing_questions.iter()))
}
