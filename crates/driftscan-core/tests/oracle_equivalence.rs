//! Equivalence of the streaming engine with the batch reference DBSCAN.
//!
//! For each input the stream is fed in time order, flushed, and the emitted
//! partition compared against `batch::dbscan_batch` up to cluster
//! relabeling. Points the oracle calls noise must be absent from every
//! emitted cluster.

use std::collections::HashMap;

use driftscan_core::{batch, CompletedCluster, DbscanConfig, IncrementalDbscan, CLUSTER_NOISE};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Exact lookup key for a point; times flow unchanged through the engine.
fn key(time: f64, chan: i32) -> (u64, i32) {
    (time.to_bits(), chan)
}

fn run_engine(points: &[(f64, i32)], eps: f64, min_pts: usize) -> Vec<CompletedCluster> {
    let mut engine = IncrementalDbscan::new(DbscanConfig::new(eps, min_pts));
    let mut clusters = Vec::new();
    for &(time, chan) in points {
        engine.ingest_point(time, chan).unwrap();
        engine.trim();
        clusters.extend(engine.drain());
    }
    engine.flush();
    clusters.extend(engine.drain());
    clusters
}

/// Check that the emitted clusters and the oracle labels induce the same
/// partition of `points`, up to cluster renumbering.
fn assert_partitions_match(points: &[(f64, i32)], clusters: &[CompletedCluster], labels: &[i32]) {
    let mut engine_label: HashMap<(u64, i32), i32> = HashMap::new();
    for cluster in clusters {
        for hit in &cluster.hits {
            let previous = engine_label.insert(key(hit.time, hit.chan), cluster.index);
            assert!(
                previous.is_none(),
                "hit ({}, {}) emitted in two clusters",
                hit.time,
                hit.chan
            );
        }
    }

    let mut oracle_to_engine: HashMap<i32, i32> = HashMap::new();
    let mut engine_to_oracle: HashMap<i32, i32> = HashMap::new();
    for (i, &(time, chan)) in points.iter().enumerate() {
        let oracle = labels[i];
        let engine = engine_label.get(&key(time, chan)).copied();
        match (oracle, engine) {
            (CLUSTER_NOISE, None) => {}
            (CLUSTER_NOISE, Some(e)) => {
                panic!("point {i} ({time}, {chan}): oracle noise, engine cluster {e}")
            }
            (o, None) => panic!("point {i} ({time}, {chan}): oracle cluster {o}, engine noise"),
            (o, Some(e)) => {
                let mapped = *oracle_to_engine.entry(o).or_insert(e);
                assert_eq!(
                    mapped, e,
                    "point {i} ({time}, {chan}): oracle cluster {o} maps to both {mapped} and {e}"
                );
                let mapped_back = *engine_to_oracle.entry(e).or_insert(o);
                assert_eq!(
                    mapped_back, o,
                    "point {i} ({time}, {chan}): engine cluster {e} maps to both {mapped_back} and {o}"
                );
            }
        }
    }
}

fn assert_equivalent(points: &[(f64, i32)], eps: f64, min_pts: usize) {
    let labels = batch::dbscan_batch(points, eps, min_pts);
    let clusters = run_engine(points, eps, min_pts);
    assert_partitions_match(points, &clusters, &labels);

    // Emitted invariants: unique indexes, time-sorted membership.
    let mut seen = std::collections::HashSet::new();
    for cluster in &clusters {
        assert!(seen.insert(cluster.index), "duplicate index {}", cluster.index);
        assert!(
            cluster.hits.windows(2).all(|w| w[0].time <= w[1].time),
            "cluster {} not time-sorted",
            cluster.index
        );
        let max_time = cluster
            .hits
            .iter()
            .map(|h| h.time)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(cluster.latest_time, max_time);
    }
}

/// A stream with strictly increasing times, so every `(time, chan)` pair is
/// a unique key for the comparison.
fn seeded_stream(seed: u64, n: usize, max_dt: f64, channels: i32) -> Vec<(f64, i32)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut time = 0.0;
    (0..n)
        .map(|_| {
            time += rng.gen_range(0.001..max_dt);
            (time, rng.gen_range(0..channels))
        })
        .collect()
}

#[test]
fn burst_pattern_matches_oracle() {
    let mut points: Vec<(f64, i32)> = vec![
        (2.6, 103),
        (5.3, 104),
        (6.1, 105),
        (6.8, 106),
        (7.3, 107),
        (7.9, 108),
        (8.0, 109),
        (8.3, 101),
        (8.7, 110),
        (16.1, 105),
        (16.8, 106),
        (17.3, 107),
        (17.9, 108),
        (18.0, 109),
        (18.7, 110),
    ];
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    assert_equivalent(&points, 5.0, 2);
}

#[test]
fn sparse_streams_match_oracle() {
    for seed in 0..6 {
        let points = seeded_stream(seed, 250, 3.0, 60);
        assert_equivalent(&points, 5.0, 2);
    }
}

#[test]
fn dense_streams_match_oracle() {
    for seed in 10..16 {
        let points = seeded_stream(seed, 300, 0.8, 25);
        assert_equivalent(&points, 4.0, 2);
    }
}

#[test]
fn wide_eps_streams_match_oracle() {
    for seed in 20..24 {
        let points = seeded_stream(seed, 200, 5.0, 40);
        assert_equivalent(&points, 10.0, 2);
    }
}

#[test]
fn every_point_core_matches_oracle() {
    // min_pts = 1 makes every point core; isolated points become
    // singleton clusters rather than noise on both sides.
    for seed in 30..33 {
        let points = seeded_stream(seed, 120, 4.0, 50);
        assert_equivalent(&points, 3.0, 1);
    }
}

#[test]
fn trim_does_not_change_the_partition() {
    // Same stream, with and without aggressive trimming.
    let points = seeded_stream(7, 400, 2.0, 30);
    let eps = 5.0;

    let trimmed = run_engine(&points, eps, 2);
    let mut engine = IncrementalDbscan::new(DbscanConfig::new(eps, 2));
    let mut untrimmed = Vec::new();
    for &(time, chan) in &points {
        engine.ingest_point(time, chan).unwrap();
        untrimmed.extend(engine.drain());
    }
    engine.flush();
    untrimmed.extend(engine.drain());

    let labels = batch::dbscan_batch(&points, eps, 2);
    assert_partitions_match(&points, &trimmed, &labels);
    assert_partitions_match(&points, &untrimmed, &labels);
}
