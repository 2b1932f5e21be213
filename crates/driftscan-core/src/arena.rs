//! Hit storage arena with stable indices.

use crate::errors::{DriftscanError, Result};
use crate::hit::{euclidean, Connectedness, Hit, HitId};

/// Engine-owned storage for live hits.
///
/// Slots are recycled through a free list, so a [`HitId`] stays valid for
/// exactly the lifetime of its hit. With a fixed capacity the arena behaves
/// as a reusable ring; without one it grows on demand.
#[derive(Debug)]
pub struct HitArena {
    slots: Vec<Option<Hit>>,
    free: Vec<u32>,
    capacity: Option<usize>,
}

impl HitArena {
    /// An arena holding at most `capacity` live hits, or unbounded if `None`.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    /// Number of live hits.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// True when no hits are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when a fixed-capacity arena has no slot left.
    pub fn is_full(&self) -> bool {
        match self.capacity {
            Some(cap) => self.free.is_empty() && self.slots.len() >= cap,
            None => false,
        }
    }

    /// Store a hit, returning its stable handle.
    pub fn insert(&mut self, hit: Hit) -> Result<HitId> {
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(hit);
            return Ok(HitId(slot));
        }
        if let Some(cap) = self.capacity {
            if self.slots.len() >= cap {
                return Err(DriftscanError::arena_exhausted(cap));
            }
        }
        self.slots.push(Some(hit));
        Ok(HitId((self.slots.len() - 1) as u32))
    }

    /// Release a hit's slot for reuse.
    pub fn remove(&mut self, id: HitId) -> Option<Hit> {
        let hit = self.slots[id.index()].take();
        if hit.is_some() {
            self.free.push(id.0);
        }
        hit
    }

    /// Borrow a live hit. Panics on a vacant slot: handles are only valid
    /// while their hit is live.
    pub fn get(&self, id: HitId) -> &Hit {
        self.slots[id.index()].as_ref().expect("vacant hit slot")
    }

    /// Mutably borrow a live hit.
    pub fn get_mut(&mut self, id: HitId) -> &mut Hit {
        self.slots[id.index()].as_mut().expect("vacant hit slot")
    }

    /// Mutably borrow two distinct live hits at once.
    pub fn pair_mut(&mut self, a: HitId, b: HitId) -> (&mut Hit, &mut Hit) {
        let (ai, bi) = (a.index(), b.index());
        assert_ne!(ai, bi, "pair_mut requires distinct hits");
        if ai < bi {
            let (lo, hi) = self.slots.split_at_mut(bi);
            (
                lo[ai].as_mut().expect("vacant hit slot"),
                hi[0].as_mut().expect("vacant hit slot"),
            )
        } else {
            let (lo, hi) = self.slots.split_at_mut(ai);
            (
                hi[0].as_mut().expect("vacant hit slot"),
                lo[bi].as_mut().expect("vacant hit slot"),
            )
        }
    }

    /// Record `a` and `b` as neighbours if they are distinct hits strictly
    /// closer than `eps`. Neighbourliness is symmetric; both adjacency lists
    /// are updated, and each side is upgraded to `Core` once it has
    /// `min_pts` hits (including itself) within `eps`.
    ///
    /// Returns whether the pair is neighbouring, independently of whether
    /// the link was already known.
    pub fn try_add_neighbour(&mut self, a: HitId, b: HitId, eps: f64, min_pts: usize) -> bool {
        if a == b {
            return false;
        }
        let (ha, hb) = self.pair_mut(a, b);
        if euclidean(ha, hb) >= eps {
            return false;
        }
        if !ha.neighbours.contains(&b) {
            ha.neighbours.push(b);
            hb.neighbours.push(a);
        }
        if ha.neighbours.len() + 1 >= min_pts {
            ha.connectedness = Connectedness::Core;
        }
        if hb.neighbours.len() + 1 >= min_pts {
            hb.connectedness = Connectedness::Core;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_reuse_slots() {
        let mut arena = HitArena::new(None);
        let a = arena.insert(Hit::new(1.0, 10)).unwrap();
        let b = arena.insert(Hit::new(2.0, 11)).unwrap();
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a).chan, 10);

        arena.remove(a);
        assert_eq!(arena.len(), 1);
        let c = arena.insert(Hit::new(3.0, 12)).unwrap();
        // The freed slot is recycled.
        assert_eq!(c, a);
        assert_eq!(arena.get(c).chan, 12);
        assert_eq!(arena.get(b).chan, 11);
    }

    #[test]
    fn test_fixed_capacity_exhaustion() {
        let mut arena = HitArena::new(Some(2));
        arena.insert(Hit::new(1.0, 0)).unwrap();
        let b = arena.insert(Hit::new(2.0, 1)).unwrap();
        assert!(arena.is_full());
        let err = arena.insert(Hit::new(3.0, 2)).unwrap_err();
        assert!(matches!(err, DriftscanError::ArenaExhausted { capacity: 2 }));

        arena.remove(b);
        assert!(!arena.is_full());
        assert!(arena.insert(Hit::new(3.0, 2)).is_ok());
    }

    #[test]
    fn test_neighbour_links_are_symmetric() {
        let mut arena = HitArena::new(None);
        let a = arena.insert(Hit::new(0.0, 0)).unwrap();
        let b = arena.insert(Hit::new(1.0, 0)).unwrap();
        assert!(arena.try_add_neighbour(a, b, 2.0, 3));
        assert_eq!(arena.get(a).neighbours(), &[b]);
        assert_eq!(arena.get(b).neighbours(), &[a]);

        // Repeating the call reports the pair without duplicating the link.
        assert!(arena.try_add_neighbour(b, a, 2.0, 3));
        assert_eq!(arena.get(a).degree(), 1);
        assert_eq!(arena.get(b).degree(), 1);
    }

    #[test]
    fn test_neighbour_threshold_is_strict() {
        let mut arena = HitArena::new(None);
        let a = arena.insert(Hit::new(0.0, 0)).unwrap();
        let b = arena.insert(Hit::new(2.0, 0)).unwrap();
        // Distance exactly eps is not neighbouring.
        assert!(!arena.try_add_neighbour(a, b, 2.0, 2));
        assert_eq!(arena.get(a).degree(), 0);
    }

    #[test]
    fn test_core_upgrade_on_both_sides() {
        let mut arena = HitArena::new(None);
        let a = arena.insert(Hit::new(0.0, 0)).unwrap();
        let b = arena.insert(Hit::new(0.5, 0)).unwrap();
        arena.try_add_neighbour(a, b, 2.0, 2);
        assert_eq!(arena.get(a).connectedness, Connectedness::Core);
        assert_eq!(arena.get(b).connectedness, Connectedness::Core);
    }

    #[test]
    fn test_self_pair_is_rejected() {
        let mut arena = HitArena::new(None);
        let a = arena.insert(Hit::new(0.0, 0)).unwrap();
        assert!(!arena.try_add_neighbour(a, a, 2.0, 2));
    }
}
