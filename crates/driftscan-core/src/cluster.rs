//! Cluster records under formation and their finalized output form.

use serde::{Deserialize, Serialize};

use crate::arena::HitArena;
use crate::hit::{Completeness, Connectedness, HitId};

/// A connected density-component under formation.
///
/// The cluster owns its membership list; each member hit carries the cluster
/// index as a back-reference. Membership is kept time-sorted and unique.
#[derive(Debug)]
pub struct Cluster {
    /// Globally unique index, assigned in creation order.
    pub index: i32,
    /// `Complete` once no future hit can be a neighbour of any member.
    pub completeness: Completeness,
    /// Largest time over member hits.
    pub latest_time: f64,
    /// The core member with the greatest time, if any.
    pub latest_core_point: Option<HitId>,
    hits: Vec<HitId>,
}

impl Cluster {
    pub(crate) fn new(index: i32) -> Self {
        Self {
            index,
            completeness: Completeness::Incomplete,
            latest_time: f64::NEG_INFINITY,
            latest_core_point: None,
            hits: Vec::new(),
        }
    }

    /// Number of member hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Member hits, time-sorted.
    pub fn hits(&self) -> &[HitId] {
        &self.hits
    }

    /// Time of the oldest member.
    pub fn earliest_time(&self, arena: &HitArena) -> Option<f64> {
        self.hits.first().map(|&id| arena.get(id).time)
    }

    /// Insert `id` into the membership, keeping it time-sorted and unique,
    /// and update the cluster bookkeeping: the member's back-reference, the
    /// latest time, and the latest core point.
    pub(crate) fn add_hit(&mut self, id: HitId, arena: &mut HitArena) {
        let time = arena.get(id).time;
        let mut k = self.hits.partition_point(|&m| arena.get(m).time < time);
        let mut present = false;
        // Walk the run of members with equal time; insert after it.
        while k < self.hits.len() && arena.get(self.hits[k]).time <= time {
            if self.hits[k] == id {
                present = true;
                break;
            }
            k += 1;
        }
        if !present {
            self.hits.insert(k, id);
        }

        let is_core = arena.get(id).connectedness == Connectedness::Core;
        arena.get_mut(id).cluster_id = self.index;
        if time > self.latest_time {
            self.latest_time = time;
        }
        if is_core {
            let newer = self
                .latest_core_point
                .map_or(true, |c| time > arena.get(c).time);
            if newer {
                self.latest_core_point = Some(id);
            }
        }
    }

    /// Attach `new_hit` if it neighbours any member.
    ///
    /// Precondition: `new_hit` is at least as late as every member. Only
    /// members within `eps` of the new hit's time can be neighbours, so the
    /// scan starts at the lower bound of `new_hit.time - eps`. Each matched
    /// member is reclassified core or edge by the degree test.
    ///
    /// Returns whether the hit was added.
    pub(crate) fn maybe_attach(
        &mut self,
        new_hit: HitId,
        arena: &mut HitArena,
        eps: f64,
        min_pts: usize,
    ) -> bool {
        let new_time = arena.get(new_hit).time;
        let start = self
            .hits
            .partition_point(|&m| arena.get(m).time < new_time - eps);

        let mut do_add = false;
        for k in start..self.hits.len() {
            let member = self.hits[k];
            if arena.try_add_neighbour(member, new_hit, eps, min_pts) {
                do_add = true;
                let hit = arena.get_mut(member);
                if hit.neighbours().len() + 1 >= min_pts {
                    hit.connectedness = Connectedness::Core;
                } else if hit.connectedness != Connectedness::Core {
                    hit.connectedness = Connectedness::Edge;
                }
            }
        }

        if do_add {
            self.add_hit(new_hit, arena);
        }
        do_add
    }

    /// Move every hit from `other` into this cluster and mark `other`
    /// complete so the next engine pass removes it.
    pub(crate) fn steal(&mut self, other: &mut Cluster, arena: &mut HitArena) {
        for id in std::mem::take(&mut other.hits) {
            self.add_hit(id, arena);
        }
        other.latest_core_point = None;
        other.completeness = Completeness::Complete;
    }

    /// Materialize the membership for emission. The live hits may be
    /// trimmed afterwards; the completed record stands on its own.
    pub(crate) fn into_completed(self, arena: &HitArena) -> CompletedCluster {
        let hits = self
            .hits
            .iter()
            .map(|&id| {
                let hit = arena.get(id);
                CompletedHit {
                    time: hit.time,
                    chan: hit.chan,
                }
            })
            .collect();
        CompletedCluster {
            index: self.index,
            latest_time: self.latest_time,
            hits,
        }
    }
}

/// A finalized cluster as delivered on the output channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedCluster {
    /// The cluster's engine-assigned index.
    pub index: i32,
    /// Largest time over member hits.
    pub latest_time: f64,
    /// Member hits, time-sorted.
    pub hits: Vec<CompletedHit>,
}

/// One member of a finalized cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompletedHit {
    pub time: f64,
    pub chan: i32,
}
