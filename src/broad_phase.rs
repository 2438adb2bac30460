//! Broad Phase
//!
//! Proxy bookkeeping on top of the dynamic AABB tree: a move buffer of
//! proxies whose fat AABBs changed, and the sorted/deduplicated pair sweep
//! that turns those moves into candidate contact keys.

use crate::dynamic_tree::{DynamicTree, LeafData};
use crate::math::{Aabb, Vec2};

/// Canonical (sorted) pair of proxy ids identifying one potential contact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactKey {
    min: u32,
    max: u32,
}

impl ContactKey {
    /// Build a key from two proxy ids, in either order.
    #[inline]
    #[must_use]
    pub fn new(a: u32, b: u32) -> Self {
        if a < b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// The smaller proxy id.
    #[inline]
    #[must_use]
    pub fn min(&self) -> u32 {
        self.min
    }

    /// The larger proxy id.
    #[inline]
    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }
}

/// The broad phase: a dynamic tree plus the move buffer driving pair
/// discovery.
pub struct BroadPhase {
    /// The spatial index. Public so the world can run queries and ray casts
    /// directly against it.
    pub tree: DynamicTree,
    /// Proxies that moved (or were created) since the last pair sweep.
    moved: Vec<u32>,
}

impl BroadPhase {
    /// Create a broad phase whose tree fattens leaves by `margin`.
    #[must_use]
    pub fn new(margin: f32) -> Self {
        Self {
            tree: DynamicTree::new(margin),
            moved: Vec::with_capacity(64),
        }
    }

    /// Insert a proxy and queue it for pair discovery.
    pub fn create_proxy(&mut self, aabb: Aabb, data: LeafData) -> u32 {
        let id = self.tree.insert(aabb, data);
        self.moved.push(id);
        id
    }

    /// Remove a proxy and forget any queued move.
    pub fn destroy_proxy(&mut self, proxy_id: u32) {
        self.moved.retain(|&id| id != proxy_id);
        self.tree.remove(proxy_id);
    }

    /// Queue a proxy for pair discovery without moving it (used when filter
    /// or sensor state changed).
    pub fn touch_proxy(&mut self, proxy_id: u32) {
        self.moved.push(proxy_id);
    }

    /// Move a proxy; queues it when the tree leaf actually changed.
    /// Returns true in that case.
    pub fn update_proxy(&mut self, proxy_id: u32, aabb: Aabb, displacement: Vec2) -> bool {
        let moved = self.tree.update(proxy_id, aabb, displacement);
        if moved {
            self.moved.push(proxy_id);
        }
        moved
    }

    /// Number of proxies queued for the next pair sweep.
    #[inline]
    #[must_use]
    pub fn pending_moves(&self) -> usize {
        self.moved.len()
    }

    /// Sweep the move buffer into candidate pair keys.
    ///
    /// Keys are unique and exclude self-pairs and same-body pairs. The move
    /// buffer is drained.
    pub fn update_pairs(&mut self) -> Vec<ContactKey> {
        let mut keys = Vec::new();

        for &pid in &self.moved {
            let body0 = self.tree.leaf_data(pid).body;
            let aabb = self.tree.get_aabb(pid);
            self.tree.query(&aabb, |other| {
                // A proxy cannot pair with itself, nor with its own body.
                if other != pid && self.tree.leaf_data(other).body != body0 {
                    keys.push(ContactKey::new(pid, other));
                }
                true
            });
        }
        self.moved.clear();

        keys.sort_unstable();
        keys.dedup();
        keys
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyId;
    use crate::fixture::FixtureId;

    fn data(body: u32, fixture: u32) -> LeafData {
        LeafData {
            body: BodyId(body),
            fixture: FixtureId(fixture),
            child: 0,
        }
    }

    fn aabb(x: f32, y: f32, half: f32) -> Aabb {
        Aabb::new(Vec2::new(x - half, y - half), Vec2::new(x + half, y + half))
    }

    #[test]
    fn test_overlapping_proxies_pair_once() {
        let mut bp = BroadPhase::new(0.1);
        let a = bp.create_proxy(aabb(0.0, 0.0, 1.0), data(0, 0));
        let b = bp.create_proxy(aabb(1.0, 0.0, 1.0), data(1, 1));
        bp.create_proxy(aabb(100.0, 0.0, 1.0), data(2, 2));

        let pairs = bp.update_pairs();
        assert_eq!(pairs, vec![ContactKey::new(a, b)]);
    }

    #[test]
    fn test_same_body_never_pairs() {
        let mut bp = BroadPhase::new(0.1);
        bp.create_proxy(aabb(0.0, 0.0, 1.0), data(7, 0));
        bp.create_proxy(aabb(0.5, 0.0, 1.0), data(7, 1));

        assert!(bp.update_pairs().is_empty(), "Fixtures of one body don't collide");
    }

    #[test]
    fn test_move_buffer_drained() {
        let mut bp = BroadPhase::new(0.1);
        bp.create_proxy(aabb(0.0, 0.0, 1.0), data(0, 0));
        bp.create_proxy(aabb(1.0, 0.0, 1.0), data(1, 1));

        assert!(!bp.update_pairs().is_empty());
        assert!(bp.update_pairs().is_empty(), "No moves, no pairs");
    }

    #[test]
    fn test_update_requeues() {
        let mut bp = BroadPhase::new(0.1);
        let a = bp.create_proxy(aabb(0.0, 0.0, 1.0), data(0, 0));
        let b = bp.create_proxy(aabb(50.0, 0.0, 1.0), data(1, 1));
        assert!(bp.update_pairs().is_empty());

        // Move proxy b onto a.
        bp.update_proxy(b, aabb(0.5, 0.0, 1.0), Vec2::ZERO);
        let pairs = bp.update_pairs();
        assert_eq!(pairs, vec![ContactKey::new(a, b)]);
    }

    #[test]
    fn test_touch_proxy_requeues_without_motion() {
        let mut bp = BroadPhase::new(0.1);
        let a = bp.create_proxy(aabb(0.0, 0.0, 1.0), data(0, 0));
        let b = bp.create_proxy(aabb(1.0, 0.0, 1.0), data(1, 1));
        bp.update_pairs();

        bp.touch_proxy(a);
        let pairs = bp.update_pairs();
        assert_eq!(pairs, vec![ContactKey::new(a, b)]);
    }

    #[test]
    fn test_destroy_forgets_queued_move() {
        let mut bp = BroadPhase::new(0.1);
        let a = bp.create_proxy(aabb(0.0, 0.0, 1.0), data(0, 0));
        bp.create_proxy(aabb(1.0, 0.0, 1.0), data(1, 1));
        bp.destroy_proxy(a);

        assert!(bp.update_pairs().is_empty());
        assert_eq!(bp.tree.proxy_count(), 1);
    }

    #[test]
    fn test_key_ordering() {
        assert_eq!(ContactKey::new(5, 2), ContactKey::new(2, 5));
        assert_eq!(ContactKey::min(&ContactKey::new(2, 5)), 2);
        assert_eq!(ContactKey::max(&ContactKey::new(2, 5)), 5);
    }
}
