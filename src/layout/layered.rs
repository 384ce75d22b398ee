use std::collections::HashMap;

use crate::error::LayoutError;
use crate::model::{Direction, Position, Size};

use super::ranking::{compute_ranks, count_crossings, order_rank_nodes};
use super::{LayoutAlgorithm, LayoutInput};

/// Built-in layered layout: longest-path ranks, dummy nodes on long edges,
/// median crossing reduction and barycentric coordinate assignment.
#[derive(Debug, Clone, Default)]
pub struct LayeredLayout {
    /// Overrides the per-request ordering pass count when set.
    pub order_passes: Option<usize>,
}

const DUMMY_PREFIX: &str = "__dummy_";

impl LayoutAlgorithm for LayeredLayout {
    fn name(&self) -> &'static str {
        "layered"
    }

    fn run(&self, input: &LayoutInput) -> Result<HashMap<String, Position>, LayoutError> {
        let horizontal = input.direction.is_horizontal();
        let node_ids: Vec<String> = input.nodes.iter().map(|n| n.id.clone()).collect();
        let mut sizes: HashMap<String, Size> = input
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.size))
            .collect();
        let mut order_map: HashMap<String, usize> = node_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();

        let ranks = compute_ranks(&node_ids, &input.edges);
        let max_rank = ranks.values().copied().max().unwrap_or(0);
        let mut rank_nodes: Vec<Vec<String>> = vec![Vec::new(); max_rank + 1];
        for node_id in &node_ids {
            let rank = ranks.get(node_id).copied().unwrap_or(0);
            rank_nodes[rank].push(node_id.clone());
        }

        // Split edges spanning several ranks into unit segments through dummies.
        let mut expanded_edges: Vec<(String, String)> = Vec::new();
        let mut dummy_counter = 0usize;
        for (from, to) in &input.edges {
            let (Some(&from_rank), Some(&to_rank)) = (ranks.get(from), ranks.get(to)) else {
                continue;
            };
            if to_rank <= from_rank {
                continue;
            }
            let mut prev = from.clone();
            for step in 1..(to_rank - from_rank) {
                let dummy_id = format!("{DUMMY_PREFIX}{dummy_counter}__");
                dummy_counter += 1;
                order_map.insert(dummy_id.clone(), order_map.len());
                sizes.insert(dummy_id.clone(), Size::new(0.0, 0.0));
                rank_nodes[from_rank + step].push(dummy_id.clone());
                expanded_edges.push((prev, dummy_id.clone()));
                prev = dummy_id;
            }
            expanded_edges.push((prev, to.clone()));
        }

        let passes = self.order_passes.unwrap_or(input.order_passes);
        order_rank_nodes(&mut rank_nodes, &expanded_edges, &order_map, passes);
        tracing::trace!(
            ranks = rank_nodes.len(),
            dummies = dummy_counter,
            crossings = count_crossings(&rank_nodes, &expanded_edges),
            "layered ordering done"
        );

        let main_extent = |size: &Size| if horizontal { size.width } else { size.height };
        let cross_extent = |size: &Size| if horizontal { size.height } else { size.width };

        // Main axis: ranks stacked with rank spacing, nodes aligned on the rank start.
        let mut main_pos: HashMap<String, f32> = HashMap::new();
        let mut main_cursor = 0.0f32;
        for bucket in &rank_nodes {
            let mut max_main = 0.0f32;
            for node_id in bucket {
                main_pos.insert(node_id.clone(), main_cursor);
                if let Some(size) = sizes.get(node_id) {
                    max_main = max_main.max(main_extent(size));
                }
            }
            main_cursor += max_main + input.rank_spacing;
        }

        let mut incoming: HashMap<String, Vec<String>> = HashMap::new();
        let mut outgoing: HashMap<String, Vec<String>> = HashMap::new();
        for (from, to) in &expanded_edges {
            incoming.entry(to.clone()).or_default().push(from.clone());
            outgoing.entry(from.clone()).or_default().push(to.clone());
        }

        // Cross axis: centre each node on its neighbours, then push apart to keep spacing.
        let mut cross_pos: HashMap<String, f32> = HashMap::new();
        let mut place_rank = |bucket: &[String], neighbors: &HashMap<String, Vec<String>>| {
            if bucket.is_empty() {
                return;
            }
            let mut entries: Vec<(String, f32, f32)> = Vec::with_capacity(bucket.len());
            let mut fallback_cursor = 0.0f32;
            for node_id in bucket {
                let half = sizes.get(node_id).map(|s| cross_extent(s) / 2.0).unwrap_or(0.0);
                let anchors: Vec<f32> = neighbors
                    .get(node_id)
                    .map(|list| list.iter().filter_map(|n| cross_pos.get(n).copied()).collect())
                    .unwrap_or_default();
                let desired = if anchors.is_empty() {
                    cross_pos
                        .get(node_id)
                        .copied()
                        .unwrap_or(fallback_cursor + half)
                } else {
                    anchors.iter().sum::<f32>() / anchors.len() as f32
                };
                fallback_cursor += half * 2.0 + input.node_spacing;
                entries.push((node_id.clone(), desired, half));
            }

            let desired_mean = entries.iter().map(|(_, d, _)| *d).sum::<f32>() / entries.len() as f32;
            let mut assigned: Vec<(String, f32)> = Vec::with_capacity(entries.len());
            let mut prev: Option<(f32, f32)> = None;
            for (node_id, desired, half) in entries {
                let center = match prev {
                    Some((prev_center, prev_half)) => {
                        desired.max(prev_center + prev_half + half + input.node_spacing)
                    }
                    None => desired,
                };
                assigned.push((node_id, center));
                prev = Some((center, half));
            }
            let actual_mean =
                assigned.iter().map(|(_, c)| *c).sum::<f32>() / assigned.len() as f32;
            let delta = desired_mean - actual_mean;
            for (node_id, center) in assigned {
                cross_pos.insert(node_id, center + delta);
            }
        };

        for _ in 0..2 {
            for bucket in &rank_nodes {
                place_rank(bucket, &incoming);
            }
            for bucket in rank_nodes.iter().rev() {
                place_rank(bucket, &outgoing);
            }
        }

        let mut positions = HashMap::with_capacity(input.nodes.len());
        for node in &input.nodes {
            let main = main_pos.get(&node.id).copied().unwrap_or(0.0);
            let center = cross_pos.get(&node.id).copied().unwrap_or(0.0);
            let position = if horizontal {
                Position::new(main, center - node.size.height / 2.0)
            } else {
                Position::new(center - node.size.width / 2.0, main)
            };
            positions.insert(node.id.clone(), position);
        }

        mirror_for_direction(input, &mut positions);
        normalize(&mut positions);
        Ok(positions)
    }
}

fn mirror_for_direction(input: &LayoutInput, positions: &mut HashMap<String, Position>) {
    if !matches!(input.direction, Direction::Up | Direction::Left) {
        return;
    }
    let mut max_x = 0.0f32;
    let mut max_y = 0.0f32;
    for node in &input.nodes {
        if let Some(pos) = positions.get(&node.id) {
            max_x = max_x.max(pos.x + node.size.width);
            max_y = max_y.max(pos.y + node.size.height);
        }
    }
    for node in &input.nodes {
        if let Some(pos) = positions.get_mut(&node.id) {
            if input.direction == Direction::Left {
                pos.x = max_x - pos.x - node.size.width;
            } else {
                pos.y = max_y - pos.y - node.size.height;
            }
        }
    }
}

fn normalize(positions: &mut HashMap<String, Position>) {
    let min_x = positions.values().map(|p| p.x).fold(f32::MAX, f32::min);
    let min_y = positions.values().map(|p| p.y).fold(f32::MAX, f32::min);
    if !min_x.is_finite() || !min_y.is_finite() {
        return;
    }
    for pos in positions.values_mut() {
        pos.x -= min_x;
        pos.y -= min_y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::SizedNode;

    fn input(direction: Direction) -> LayoutInput {
        let node = |id: &str, w: f32, h: f32| SizedNode {
            id: id.to_string(),
            size: Size::new(w, h),
        };
        let edge = |a: &str, b: &str| (a.to_string(), b.to_string());
        LayoutInput {
            nodes: vec![
                node("article-a", 200.0, 100.0),
                node("question-1", 120.0, 40.0),
                node("article-b", 200.0, 80.0),
                node("question-2", 120.0, 40.0),
                node("article-c", 200.0, 60.0),
            ],
            edges: vec![
                edge("article-a", "question-1"),
                edge("question-1", "article-b"),
                edge("article-a", "question-2"),
                edge("question-2", "article-c"),
            ],
            direction,
            node_spacing: 30.0,
            rank_spacing: 40.0,
            order_passes: 4,
        }
    }

    fn overlaps(a: (Position, Size), b: (Position, Size)) -> bool {
        a.0.x < b.0.x + b.1.width
            && a.0.x + a.1.width > b.0.x
            && a.0.y < b.0.y + b.1.height
            && a.0.y + a.1.height > b.0.y
    }

    #[test]
    fn parents_precede_children_top_down() {
        let input = input(Direction::Down);
        let positions = LayeredLayout::default().run(&input).unwrap();
        assert_eq!(positions.len(), 5);
        for (from, to) in &input.edges {
            assert!(positions[from].y < positions[to].y, "{from} -> {to}");
        }
    }

    #[test]
    fn siblings_do_not_overlap() {
        let input = input(Direction::Down);
        let positions = LayeredLayout::default().run(&input).unwrap();
        for (i, a) in input.nodes.iter().enumerate() {
            for b in &input.nodes[i + 1..] {
                assert!(
                    !overlaps((positions[&a.id], a.size), (positions[&b.id], b.size)),
                    "{} overlaps {}",
                    a.id,
                    b.id
                );
            }
        }
    }

    #[test]
    fn direction_controls_primary_axis() {
        let right = LayeredLayout::default().run(&input(Direction::Right)).unwrap();
        assert!(right["article-a"].x < right["question-1"].x);
        let up = LayeredLayout::default().run(&input(Direction::Up)).unwrap();
        assert!(up["article-a"].y > up["question-1"].y);
        let left = LayeredLayout::default().run(&input(Direction::Left)).unwrap();
        assert!(left["article-a"].x > left["question-1"].x);
    }

    #[test]
    fn positions_are_normalized_to_origin() {
        let positions = LayeredLayout::default().run(&input(Direction::Down)).unwrap();
        let min_x = positions.values().map(|p| p.x).fold(f32::MAX, f32::min);
        let min_y = positions.values().map(|p| p.y).fold(f32::MAX, f32::min);
        assert_eq!(min_x, 0.0);
        assert_eq!(min_y, 0.0);
    }

    #[test]
    fn long_edges_get_dummy_nodes_but_not_positions() {
        let mut input = input(Direction::Down);
        input.edges.push(("article-a".to_string(), "article-c".to_string()));
        let positions = LayeredLayout::default().run(&input).unwrap();
        assert_eq!(positions.len(), input.nodes.len());
        assert!(positions.keys().all(|id| !id.starts_with(DUMMY_PREFIX)));
    }
}
