//! Reference batch DBSCAN, used as the test oracle.
//!
//! The textbook algorithm over a complete point set, with the same distance
//! predicate as the streaming engine. Quadratic and memory-unbounded; it
//! exists to check the incremental engine, not to process real streams.

use crate::hit::{CLUSTER_NOISE, CLUSTER_UNDEFINED};

/// Label every point with its cluster index, or [`CLUSTER_NOISE`].
///
/// Labels are assigned in scan order, starting at zero. Two labelings that
/// differ only by cluster renumbering describe the same partition.
pub fn dbscan_batch(points: &[(f64, i32)], eps: f64, min_pts: usize) -> Vec<i32> {
    let mut labels = vec![CLUSTER_UNDEFINED; points.len()];
    let mut next_cluster = 0;

    for i in 0..points.len() {
        if labels[i] != CLUSTER_UNDEFINED {
            continue;
        }
        let neighbourhood = region_query(points, i, eps);
        if neighbourhood.len() < min_pts {
            // Not enough support to be core; may be reclassified later.
            labels[i] = CLUSTER_NOISE;
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[i] = cluster;

        let mut seeds: Vec<usize> = neighbourhood.into_iter().filter(|&j| j != i).collect();
        while let Some(j) = seeds.pop() {
            if labels[j] == CLUSTER_NOISE {
                // Noise becomes a border point of this cluster.
                labels[j] = cluster;
                continue;
            }
            if labels[j] != CLUSTER_UNDEFINED {
                continue;
            }
            labels[j] = cluster;
            let reachable = region_query(points, j, eps);
            if reachable.len() >= min_pts {
                seeds.extend(reachable);
            }
        }
    }

    labels
}

/// Indices of all points strictly within `eps` of point `i`, including `i`.
fn region_query(points: &[(f64, i32)], i: usize, eps: f64) -> Vec<usize> {
    let (ti, ci) = points[i];
    points
        .iter()
        .enumerate()
        .filter(|&(_, &(t, c))| {
            let dt = t - ti;
            let dc = f64::from(c) - f64::from(ci);
            (dt * dt + dc * dc).sqrt() < eps
        })
        .map(|(j, _)| j)
        .collect()
}
