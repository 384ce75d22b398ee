use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Longest-path ranks over a topological order that follows `node_ids` order on ties.
/// Edges that point backwards in that order (cycles) do not constrain ranks.
pub(super) fn compute_ranks(
    node_ids: &[String],
    edges: &[(String, String)],
) -> HashMap<String, usize> {
    let order_key: HashMap<&str, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    let mut adj: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut indeg: HashMap<&str, usize> = node_ids.iter().map(|id| (id.as_str(), 0)).collect();

    for (from, to) in edges {
        if !order_key.contains_key(from.as_str()) || !order_key.contains_key(to.as_str()) {
            continue;
        }
        adj.entry(from.as_str()).or_default().push(to.as_str());
        if let Some(deg) = indeg.get_mut(to.as_str()) {
            *deg += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<(usize, &str)>> = node_ids
        .iter()
        .filter(|id| indeg.get(id.as_str()).copied() == Some(0))
        .map(|id| Reverse((order_key[id.as_str()], id.as_str())))
        .collect();

    let mut order: Vec<&str> = Vec::with_capacity(node_ids.len());
    let mut processed: HashSet<&str> = HashSet::new();
    loop {
        while let Some(Reverse((_key, id))) = ready.pop() {
            if !processed.insert(id) {
                continue;
            }
            order.push(id);
            for next in adj.get(id).map(Vec::as_slice).unwrap_or_default() {
                if processed.contains(next) {
                    continue;
                }
                if let Some(deg) = indeg.get_mut(next) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.push(Reverse((order_key[next], *next)));
                    }
                }
            }
        }

        if processed.len() >= node_ids.len() {
            break;
        }

        // Cycle: restart from the earliest unprocessed node, its remaining
        // incoming edges become back edges.
        match node_ids.iter().find(|id| !processed.contains(id.as_str())) {
            Some(id) => ready.push(Reverse((order_key[id.as_str()], id.as_str()))),
            None => break,
        }
    }

    let order_index: HashMap<&str, usize> =
        order.iter().enumerate().map(|(idx, id)| (*id, idx)).collect();

    let mut ranks: HashMap<String, usize> = HashMap::new();
    for node in &order {
        let rank = *ranks.entry(node.to_string()).or_insert(0);
        let from_idx = order_index[node];
        for next in adj.get(node).map(Vec::as_slice).unwrap_or_default() {
            let to_idx = order_index.get(next).copied().unwrap_or(from_idx);
            if to_idx <= from_idx {
                continue;
            }
            let entry = ranks.entry(next.to_string()).or_insert(0);
            *entry = (*entry).max(rank + 1);
        }
    }

    ranks
}

/// Crossing reduction. Ranks are re-sorted by the median slot of each node's neighbours,
/// sweeping down against parents and back up against children. Ties keep the current
/// slot, then `input_order`.
pub(super) fn order_rank_nodes(
    rank_nodes: &mut [Vec<String>],
    edges: &[(String, String)],
    input_order: &HashMap<String, usize>,
    passes: usize,
) {
    if rank_nodes.len() <= 1 {
        return;
    }
    let ids: Vec<String> = rank_nodes.iter().flatten().cloned().collect();
    let index: HashMap<&str, usize> = ids
        .iter()
        .enumerate()
        .map(|(idx, id)| (id.as_str(), idx))
        .collect();
    let tie: Vec<usize> = ids
        .iter()
        .map(|id| input_order.get(id).copied().unwrap_or(usize::MAX))
        .collect();

    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for (from, to) in edges {
        if let (Some(&from), Some(&to)) = (index.get(from.as_str()), index.get(to.as_str())) {
            children[from].push(to);
            parents[to].push(from);
        }
    }

    let mut ranks: Vec<Vec<usize>> = rank_nodes
        .iter()
        .map(|bucket| bucket.iter().map(|id| index[id.as_str()]).collect())
        .collect();
    let mut slot = vec![0usize; ids.len()];
    for bucket in &ranks {
        for (idx, &node) in bucket.iter().enumerate() {
            slot[node] = idx;
        }
    }

    let last = ranks.len() - 1;
    for _ in 0..passes.max(1) {
        for rank in 1..=last {
            sort_by_median(&mut ranks[rank], &parents, &mut slot, &tie);
        }
        for rank in (0..last).rev() {
            sort_by_median(&mut ranks[rank], &children, &mut slot, &tie);
        }
    }

    for (bucket, ordered) in rank_nodes.iter_mut().zip(&ranks) {
        *bucket = ordered.iter().map(|&node| ids[node].clone()).collect();
    }
}

fn sort_by_median(
    bucket: &mut [usize],
    neighbours: &[Vec<usize>],
    slot: &mut [usize],
    tie: &[usize],
) {
    if bucket.len() <= 1 {
        return;
    }
    let mut keyed: Vec<(f32, usize, usize, usize)> = bucket
        .iter()
        .map(|&node| {
            let key = median_slot(&neighbours[node], slot).unwrap_or(slot[node] as f32);
            (key, slot[node], tie[node], node)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));
    for (idx, &(_, _, _, node)) in keyed.iter().enumerate() {
        bucket[idx] = node;
        slot[node] = idx;
    }
}

fn median_slot(neighbours: &[usize], slot: &[usize]) -> Option<f32> {
    if neighbours.is_empty() {
        return None;
    }
    let mut slots: Vec<usize> = neighbours.iter().map(|&node| slot[node]).collect();
    slots.sort_unstable();
    let mid = slots.len() / 2;
    Some(if slots.len() % 2 == 1 {
        slots[mid] as f32
    } else {
        (slots[mid - 1] + slots[mid]) as f32 / 2.0
    })
}

/// Number of edge crossings between consecutive ranks for the given ordering.
pub(super) fn count_crossings(rank_nodes: &[Vec<String>], edges: &[(String, String)]) -> usize {
    let mut rank_of: HashMap<&str, (usize, usize)> = HashMap::new();
    for (rank, bucket) in rank_nodes.iter().enumerate() {
        for (idx, id) in bucket.iter().enumerate() {
            rank_of.insert(id.as_str(), (rank, idx));
        }
    }
    let mut by_rank: HashMap<usize, Vec<(usize, usize)>> = HashMap::new();
    for (from, to) in edges {
        let (Some(&(fr, fi)), Some(&(tr, ti))) = (rank_of.get(from.as_str()), rank_of.get(to.as_str()))
        else {
            continue;
        };
        if tr == fr + 1 {
            by_rank.entry(fr).or_default().push((fi, ti));
        }
    }
    let mut crossings = 0;
    for segments in by_rank.values() {
        for (i, a) in segments.iter().enumerate() {
            for b in &segments[i + 1..] {
                if (a.0 < b.0 && a.1 > b.1) || (a.0 > b.0 && a.1 < b.1) {
                    crossings += 1;
                }
            }
        }
    }
    crossings
}
