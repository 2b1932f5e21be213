//! The incremental DBSCAN state machine.
//!
//! One [`IncrementalDbscan`] instance consumes a time-ordered hit stream and
//! continuously emits clusters with the same membership a batch DBSCAN would
//! compute over the full stream, while holding only a sliding window of
//! recent hits.
//!
//! Per arriving hit the engine:
//! 1. appends it to the buffer and discovers its neighbours by scanning the
//!    window in reverse time order;
//! 2. walks the active clusters in index order, attaching the hit where it
//!    neighbours a member, sweeping newly reachable hits into each cluster,
//!    and marking clusters complete once they fall more than `eps` behind;
//! 3. merges the clusters the new hit bridged;
//! 4. spawns a fresh cluster when the hit is core but unclaimed;
//! 5. emits every cluster that just completed.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::arena::HitArena;
use crate::buffer::HitBuffer;
use crate::cluster::{Cluster, CompletedCluster};
use crate::config::{DbscanConfig, TRIM_LOOKBACK_FACTOR};
use crate::errors::{DriftscanError, Result};
use crate::hit::{Completeness, Connectedness, Hit, HitId, CLUSTER_NOISE, CLUSTER_UNDEFINED};

/// Callback receiving finalized clusters as they complete.
pub type ClusterConsumer = Box<dyn FnMut(CompletedCluster)>;

/// Lifecycle counters for one engine instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    /// Hits accepted by `ingest`.
    pub hits_ingested: u64,
    /// Hits evicted by `trim` or `flush`.
    pub hits_trimmed: u64,
    /// Clusters created.
    pub clusters_spawned: u64,
    /// Clusters absorbed into a lower-indexed cluster.
    pub clusters_merged: u64,
    /// Clusters finalized and emitted.
    pub clusters_completed: u64,
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {} ingested, {} trimmed; clusters: {} spawned, {} merged, {} completed",
            self.hits_ingested,
            self.hits_trimmed,
            self.clusters_spawned,
            self.clusters_merged,
            self.clusters_completed
        )
    }
}

/// Streaming DBSCAN over monotone time-ordered `(time, channel)` hits.
///
/// Not safe for concurrent ingest; producers feeding one engine must
/// serialize. Independent instances share no state.
pub struct IncrementalDbscan {
    config: DbscanConfig,
    arena: HitArena,
    buffer: HitBuffer,
    active: BTreeMap<i32, Cluster>,
    latest_time: f64,
    next_cluster_index: i32,
    completed: VecDeque<CompletedCluster>,
    consumer: Option<ClusterConsumer>,
    stats: EngineStats,
}

impl IncrementalDbscan {
    /// An engine that queues finalized clusters for [`drain`](Self::drain).
    pub fn new(config: DbscanConfig) -> Self {
        let arena = HitArena::new(config.arena_capacity);
        Self {
            config,
            arena,
            buffer: HitBuffer::new(),
            active: BTreeMap::new(),
            latest_time: f64::NEG_INFINITY,
            next_cluster_index: 0,
            completed: VecDeque::new(),
            consumer: None,
            stats: EngineStats::default(),
        }
    }

    /// An engine that pushes finalized clusters to `consumer` instead of
    /// queueing them.
    pub fn with_consumer(config: DbscanConfig, consumer: ClusterConsumer) -> Self {
        let mut engine = Self::new(config);
        engine.consumer = Some(consumer);
        engine
    }

    /// Largest time ingested so far.
    pub fn latest_time(&self) -> f64 {
        self.latest_time
    }

    /// Number of clusters not yet finalized.
    pub fn num_active_clusters(&self) -> usize {
        self.active.len()
    }

    /// Number of hits currently held in the window.
    pub fn num_live_hits(&self) -> usize {
        self.arena.len()
    }

    /// Lifecycle counters.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Construct a hit in the arena and ingest it.
    pub fn ingest_point(&mut self, time: f64, chan: i32) -> Result<()> {
        self.ingest_hit(Hit::new(time, chan))
    }

    /// Ingest one hit. Fails with `OutOfOrder` if its time is strictly
    /// before the latest ingested time, and with `ArenaExhausted` if a
    /// fixed-capacity arena stays full after a trim; the clustering state is
    /// unchanged in both cases.
    pub fn ingest_hit(&mut self, hit: Hit) -> Result<()> {
        if hit.time < self.latest_time {
            return Err(DriftscanError::out_of_order(hit.time, self.latest_time));
        }
        if self.arena.is_full() {
            self.trim();
        }
        let time = hit.time;
        let id = self.arena.insert(hit)?;

        self.buffer.push(time, id);
        self.latest_time = time;
        self.stats.hits_ingested += 1;

        self.discover_neighbours(id, time);
        let (touched, finalized) = self.walk_clusters(id);
        self.merge_touched(&touched);
        self.spawn_cluster(id);
        for index in finalized {
            self.finalize_cluster(index);
        }
        Ok(())
    }

    /// Find the new hit's neighbours in the window.
    ///
    /// Scans newest-to-oldest: entries later than `time + eps` are skipped
    /// (equal-time arrivals may sit behind the new hit), and the scan stops
    /// at the first entry earlier than `time - eps`. Cost is proportional to
    /// the local density of the `[time - eps, time + eps]` band.
    fn discover_neighbours(&mut self, id: HitId, time: f64) {
        let eps = self.config.eps;
        let min_pts = self.config.min_pts;
        for (t, other) in self.buffer.iter_rev() {
            if t > time + eps {
                continue;
            }
            if t < time - eps {
                break;
            }
            self.arena.try_add_neighbour(id, other, eps, min_pts);
        }
    }

    /// Step 2 of the ingest cycle: walk active clusters in ascending index
    /// order. Returns the clusters the new hit joined and the clusters that
    /// fell `eps` behind the stream on this step.
    fn walk_clusters(&mut self, new_hit: HitId) -> (Vec<i32>, Vec<i32>) {
        let eps = self.config.eps;
        let min_pts = self.config.min_pts;
        let latest = self.latest_time;
        let arena = &mut self.arena;

        let mut touched = Vec::new();
        let mut finalized = Vec::new();
        let mut stragglers = Vec::new();

        for (&index, cluster) in self.active.iter_mut() {
            if cluster.completeness == Completeness::Complete {
                // Emptied by an earlier merge; collect it.
                stragglers.push(index);
                continue;
            }

            if cluster.maybe_attach(new_hit, arena, eps, min_pts) {
                touched.push(index);
            }

            // Sweep in any hit the new arrival made density-reachable. This
            // runs whether or not the hit attached: a hit that joined one
            // cluster can still have bridged another cluster to hits that
            // were previously unreachable.
            if let Some(seed) = cluster.latest_core_point {
                expand_reachable(cluster, seed, arena, min_pts);
            }

            if cluster.latest_time < latest - eps {
                cluster.completeness = Completeness::Complete;
                finalized.push(index);
            }
        }

        for index in stragglers {
            self.active.remove(&index);
        }
        (touched, finalized)
    }

    /// Step 3: merge every cluster the new hit bridged into the one with
    /// the lowest index. Losers keep their slot in the active set, emptied
    /// and complete, until the next walk removes them.
    fn merge_touched(&mut self, touched: &[i32]) {
        if touched.len() < 2 {
            return;
        }
        let survivor_index = touched[0];
        for &loser_index in &touched[1..] {
            let Some(mut loser) = self.active.remove(&loser_index) else {
                continue;
            };
            if let Some(survivor) = self.active.get_mut(&survivor_index) {
                survivor.steal(&mut loser, &mut self.arena);
                log::debug!(
                    "merged cluster {} into cluster {} ({} hits)",
                    loser_index,
                    survivor_index,
                    survivor.len()
                );
                self.stats.clusters_merged += 1;
            }
            self.active.insert(loser_index, loser);
        }
    }

    /// Step 4: a core hit no existing cluster claimed seeds a new cluster
    /// from its neighbourhood.
    fn spawn_cluster(&mut self, new_hit: HitId) {
        {
            let hit = self.arena.get(new_hit);
            if hit.cluster_id != CLUSTER_UNDEFINED {
                return;
            }
            if hit.degree() + 1 < self.config.min_pts {
                return;
            }
        }
        self.arena.get_mut(new_hit).connectedness = Connectedness::Core;

        let index = self.next_cluster_index;
        self.next_cluster_index += 1;
        let mut cluster = Cluster::new(index);
        cluster.add_hit(new_hit, &mut self.arena);
        let neighbours = self.arena.get(new_hit).neighbours().to_vec();
        for id in neighbours {
            cluster.add_hit(id, &mut self.arena);
        }
        expand_reachable(&mut cluster, new_hit, &mut self.arena, self.config.min_pts);

        log::debug!("spawned cluster {} with {} hits", index, cluster.len());
        self.stats.clusters_spawned += 1;
        self.active.insert(index, cluster);
    }

    /// Step 5: remove a just-completed cluster from the active set and
    /// deliver it on the output channel.
    fn finalize_cluster(&mut self, index: i32) {
        let Some(cluster) = self.active.remove(&index) else {
            return;
        };
        for &id in cluster.hits() {
            self.arena.get_mut(id).completeness = Completeness::Complete;
        }
        self.emit(cluster);
    }

    fn emit(&mut self, cluster: Cluster) {
        log::debug!(
            "cluster {} complete: {} hits, latest time {}",
            cluster.index,
            cluster.len(),
            cluster.latest_time
        );
        self.stats.clusters_completed += 1;
        let completed = cluster.into_completed(&self.arena);
        match &mut self.consumer {
            Some(consumer) => consumer(completed),
            None => self.completed.push_back(completed),
        }
    }

    /// Evict every hit that can no longer influence any active cluster.
    ///
    /// The cutoff trails the earliest hit still needed by an incomplete
    /// cluster (or the stream head when none is active) by
    /// [`TRIM_LOOKBACK_FACTOR`] times `eps`. Idempotent; may be called after
    /// any ingest.
    pub fn trim(&mut self) {
        let earliest_needed = self
            .active
            .values()
            .filter(|c| c.completeness == Completeness::Incomplete)
            .filter_map(|c| c.earliest_time(&self.arena))
            .fold(f64::INFINITY, f64::min);
        let earliest_needed = if earliest_needed.is_finite() {
            earliest_needed
        } else {
            self.latest_time
        };
        let cutoff = earliest_needed - TRIM_LOOKBACK_FACTOR * self.config.eps;

        for id in self.buffer.evict_before(cutoff) {
            self.evict_hit(id);
        }
    }

    /// Drop one hit from the window: unlink it from every live neighbour,
    /// settle its labels, and reclaim the arena slot.
    fn evict_hit(&mut self, id: HitId) {
        let neighbours = std::mem::take(&mut self.arena.get_mut(id).neighbours);
        for other in neighbours {
            self.arena.get_mut(other).remove_neighbour(id);
        }
        let hit = self.arena.get_mut(id);
        if hit.cluster_id == CLUSTER_UNDEFINED {
            hit.cluster_id = CLUSTER_NOISE;
            if hit.connectedness == Connectedness::Undefined {
                hit.connectedness = Connectedness::Noise;
            }
        }
        hit.completeness = Completeness::Complete;
        self.arena.remove(id);
        self.stats.hits_trimmed += 1;
    }

    /// Pull finalized clusters queued since the last call. Empty when the
    /// engine was constructed with a push consumer.
    pub fn drain(&mut self) -> Vec<CompletedCluster> {
        self.completed.drain(..).collect()
    }

    /// Force-finalize the stream: complete and emit every active cluster in
    /// index order, settle the remaining hits as noise, and empty the
    /// window. Equivalent to ingesting a point far beyond all finite data.
    /// The engine keeps its latest time and stays usable for a later stream
    /// segment.
    pub fn flush(&mut self) {
        for (index, mut cluster) in std::mem::take(&mut self.active) {
            if cluster.completeness == Completeness::Complete {
                // Emptied merge loser; nothing to deliver.
                continue;
            }
            cluster.completeness = Completeness::Complete;
            for &id in cluster.hits() {
                self.arena.get_mut(id).completeness = Completeness::Complete;
            }
            log::debug!("flush completing cluster {}", index);
            self.emit(cluster);
        }
        for id in self.buffer.drain_all() {
            self.evict_hit(id);
        }
    }
}

/// Density-reachability expansion: grow `cluster` with every hit reachable
/// from `seed` through unclaimed core points.
///
/// The frontier is a stack seeded with the neighbours of `seed`. A popped
/// noise hit is reclassified as an edge member and not descended from; a hit
/// already placed in a cluster is skipped; an unclaimed hit joins the
/// cluster and, when it qualifies as core, contributes its own neighbours to
/// the frontier. Duplicate frontier entries are harmless: a hit placed once
/// fails the unclaimed check on the next pop.
fn expand_reachable(cluster: &mut Cluster, seed: HitId, arena: &mut HitArena, min_pts: usize) {
    let mut frontier = arena.get(seed).neighbours().to_vec();
    while let Some(q) = frontier.pop() {
        let (connectedness, cluster_id) = {
            let hit = arena.get(q);
            (hit.connectedness, hit.cluster_id)
        };

        if connectedness == Connectedness::Noise {
            cluster.add_hit(q, arena);
            arena.get_mut(q).connectedness = Connectedness::Edge;
            continue;
        }
        if cluster_id != CLUSTER_UNDEFINED {
            continue;
        }

        cluster.add_hit(q, arena);
        if arena.get(q).degree() + 1 >= min_pts {
            let hit = arena.get_mut(q);
            hit.connectedness = Connectedness::Core;
            frontier.extend_from_slice(hit.neighbours());
        }
    }
}
