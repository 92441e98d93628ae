//! Personalized PageRank by power iteration over a weighted adjacency list.

use hippograph_core::{Error, Result};

/// Weighted out-neighbors per vertex; vertices are dense positions `0..n`.
pub type Adjacency = Vec<Vec<(usize, f64)>>;

/// Run personalized PageRank.
///
/// `reset` is the teleport distribution (normalized here; NaN and negative
/// entries count as zero). With probability `damping` the walk follows an
/// out-edge proportionally to its weight, otherwise it teleports. Mass on
/// vertices without out-edges is redistributed along `reset`.
pub fn personalized_pagerank(
    adjacency: &Adjacency,
    reset: &[f64],
    damping: f64,
    max_iterations: usize,
    tolerance: f64,
) -> Result<Vec<f64>> {
    let n = adjacency.len();
    if reset.len() != n {
        return Err(Error::Graph(format!(
            "reset vector has {} entries for {} vertices",
            reset.len(),
            n
        )));
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let cleaned: Vec<f64> = reset
        .iter()
        .map(|&w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
        .collect();
    let total: f64 = cleaned.iter().sum();
    if total <= 0.0 {
        return Err(Error::Graph("reset vector sums to zero".into()));
    }
    let teleport: Vec<f64> = cleaned.iter().map(|w| w / total).collect();

    let out_weight: Vec<f64> = adjacency
        .iter()
        .map(|edges| edges.iter().map(|(_, w)| *w).sum())
        .collect();

    let mut rank = teleport.clone();
    for _ in 0..max_iterations {
        let mut next = vec![0.0; n];
        let mut dangling = 0.0;

        for (u, edges) in adjacency.iter().enumerate() {
            if out_weight[u] <= 0.0 {
                dangling += rank[u];
                continue;
            }
            let share = damping * rank[u] / out_weight[u];
            for &(v, w) in edges {
                next[v] += share * w;
            }
        }

        let jump = (1.0 - damping) + damping * dangling;
        for (x, t) in next.iter_mut().zip(teleport.iter()) {
            *x += jump * t;
        }

        let delta: f64 = next.iter().zip(rank.iter()).map(|(a, b)| (a - b).abs()).sum();
        rank = next;
        if delta < tolerance {
            break;
        }
    }

    Ok(rank)
}

/// Build an adjacency list from `(source, target, weight)` position triples.
///
/// Undirected graphs traverse every edge both ways. Non-finite and
/// non-positive weights are dropped.
pub fn build_adjacency(n: usize, edges: &[(usize, usize, f64)], directed: bool) -> Adjacency {
    let mut adjacency: Adjacency = vec![Vec::new(); n];
    for &(s, t, w) in edges {
        if !(w.is_finite() && w > 0.0) || s >= n || t >= n {
            continue;
        }
        adjacency[s].push((t, w));
        if !directed && s != t {
            adjacency[t].push((s, w));
        }
    }
    adjacency
}
