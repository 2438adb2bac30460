//! Dynamic AABB Tree (Incremental BVH)
//!
//! A self-balancing binary tree of AABBs for broadphase collision detection
//! with dynamic bodies. Supports O(log n) insert, remove, and update.
//!
//! # Features
//!
//! - **Incremental updates**: Insert/remove/move proxies without full rebuild
//! - **Fat AABBs**: Enlarged margins plus displacement pre-stretch reduce
//!   re-insertions for moving bodies
//! - **Tree rotations**: AVL-style balancing for O(log n) query performance
//! - **Ray casts**: Segment traversal with per-leaf fraction clipping
//! - **Origin shift**: Subtracts an offset from every stored AABB

use crate::body::BodyId;
use crate::fixture::FixtureId;
use crate::math::{Aabb, Vec2};
use crate::shapes::RayCastInput;

/// Null node sentinel
pub const NULL_NODE: u32 = u32::MAX;

/// Back-reference carried by every leaf: which shape child it stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafData {
    /// Owning body
    pub body: BodyId,
    /// Owning fixture
    pub fixture: FixtureId,
    /// Shape child index within the fixture
    pub child: u32,
}

/// A node in the dynamic AABB tree
#[derive(Clone, Debug)]
struct TreeNode {
    /// Fat AABB (enlarged for movement prediction)
    aabb: Aabb,
    /// Parent node index (NULL_NODE if root)
    parent: u32,
    /// Left child (NULL_NODE if leaf)
    left: u32,
    /// Right child (NULL_NODE if leaf)
    right: u32,
    /// Height (0 for leaf, -1 for free)
    height: i32,
    /// Leaf payload (None for internal nodes)
    leaf: Option<LeafData>,
}

impl TreeNode {
    fn new_internal() -> Self {
        Self {
            aabb: Aabb::default(),
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: 0,
            leaf: None,
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }
}

/// Dynamic AABB tree for the incremental broadphase.
pub struct DynamicTree {
    /// Node pool
    nodes: Vec<TreeNode>,
    /// Free list (indices of unused nodes)
    free_list: Vec<u32>,
    /// Root node index
    root: u32,
    /// AABB fattening margin applied at insert and update
    pub margin: f32,
}

impl DynamicTree {
    /// Create a new empty tree with the given fattening margin.
    #[must_use]
    pub fn new(margin: f32) -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: NULL_NODE,
            margin,
        }
    }

    /// Insert a new leaf for `aabb`, fattened by the tree margin.
    /// Returns the proxy (node) id.
    pub fn insert(&mut self, aabb: Aabb, data: LeafData) -> u32 {
        let node_id = self.alloc_node();
        self.nodes[node_id as usize] = TreeNode {
            aabb: aabb.fattened(self.margin),
            parent: NULL_NODE,
            left: NULL_NODE,
            right: NULL_NODE,
            height: 0,
            leaf: Some(data),
        };
        self.insert_leaf(node_id);
        node_id
    }

    /// Remove a proxy by its id.
    pub fn remove(&mut self, proxy_id: u32) {
        debug_assert!(self.nodes[proxy_id as usize].is_leaf());
        self.remove_leaf(proxy_id);
        self.free_node(proxy_id);
    }

    /// Update a proxy's AABB after its shape moved.
    ///
    /// `displacement` pre-stretches the stored box in the movement direction
    /// so the next few updates are no-ops. Returns true if the leaf was
    /// re-inserted (i.e. the tight AABB escaped the stored fat AABB).
    pub fn update(&mut self, proxy_id: u32, aabb: Aabb, displacement: Vec2) -> bool {
        debug_assert!(self.nodes[proxy_id as usize].is_leaf());

        if self.nodes[proxy_id as usize].aabb.contains(&aabb) {
            return false;
        }

        self.remove_leaf(proxy_id);
        self.nodes[proxy_id as usize].aabb = aabb.fattened(self.margin).displaced(displacement);
        self.insert_leaf(proxy_id);
        true
    }

    /// Leaf payload of a proxy.
    #[inline]
    #[must_use]
    pub fn leaf_data(&self, proxy_id: u32) -> LeafData {
        self.nodes[proxy_id as usize]
            .leaf
            .expect("proxy is not a leaf")
    }

    /// The stored (fat) AABB of a proxy.
    #[inline]
    #[must_use]
    pub fn get_aabb(&self, proxy_id: u32) -> Aabb {
        self.nodes[proxy_id as usize].aabb
    }

    /// Whether the stored AABBs of two proxies overlap.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, a: u32, b: u32) -> bool {
        self.get_aabb(a).overlaps(&self.get_aabb(b))
    }

    /// Visit every proxy whose fat AABB overlaps `aabb`. The visitor returns
    /// false to stop the enumeration.
    pub fn query<F: FnMut(u32) -> bool>(&self, aabb: &Aabb, mut visitor: F) {
        if self.root == NULL_NODE {
            return;
        }

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }
            let node = &self.nodes[node_id as usize];
            if !node.aabb.overlaps(aabb) {
                continue;
            }
            if node.is_leaf() {
                if !visitor(node_id) {
                    return;
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Cast a segment through the tree.
    ///
    /// The visitor receives the current clipped input and a leaf proxy id and
    /// returns a new maximum fraction: 0 terminates the cast, the incoming
    /// `max_fraction` continues unchanged, and anything smaller clips the
    /// segment for the rest of the traversal. The maximum fraction only ever
    /// decreases.
    pub fn ray_cast<F: FnMut(&RayCastInput, u32) -> f32>(
        &self,
        input: &RayCastInput,
        mut visitor: F,
    ) {
        let p1 = input.p1;
        let p2 = input.p2;
        let r = p2 - p1;
        if r.length_squared() <= 0.0 {
            return;
        }
        let r = r.normalize();

        // v is perpendicular to the segment; the node test below is a
        // separating-axis check against that perpendicular.
        let v = Vec2::new(-r.y, r.x);
        let abs_v = v.abs();

        let mut max_fraction = input.max_fraction;
        let mut segment_aabb = {
            let t = p1 + max_fraction * (p2 - p1);
            Aabb::from_points(p1, t)
        };

        let mut stack = Vec::with_capacity(64);
        stack.push(self.root);

        while let Some(node_id) = stack.pop() {
            if node_id == NULL_NODE {
                continue;
            }
            let node = &self.nodes[node_id as usize];
            if !node.aabb.overlaps(&segment_aabb) {
                continue;
            }

            let c = node.aabb.center();
            let h = node.aabb.extents();
            let separation = (v.dot(p1 - c)).abs() - abs_v.dot(h);
            if separation > 0.0 {
                continue;
            }

            if node.is_leaf() {
                let sub_input = RayCastInput {
                    p1,
                    p2,
                    max_fraction,
                };
                let value = visitor(&sub_input, node_id);
                if value == 0.0 {
                    return;
                }
                if value > 0.0 {
                    max_fraction = value;
                    let t = p1 + max_fraction * (p2 - p1);
                    segment_aabb = Aabb::from_points(p1, t);
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
    }

    /// Subtract `offset` from every node's AABB.
    pub fn shift_origin(&mut self, offset: Vec2) {
        for node in &mut self.nodes {
            if node.height >= 0 {
                node.aabb.shift_origin(offset);
            }
        }
    }

    /// Number of active proxies (leaf nodes).
    #[must_use]
    pub fn proxy_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.height >= 0 && n.is_leaf())
            .count()
    }

    /// Tree height.
    #[must_use]
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    /// Drop every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
        self.root = NULL_NODE;
    }

    // =========== Internal methods ===========

    fn alloc_node(&mut self) -> u32 {
        if let Some(id) = self.free_list.pop() {
            id
        } else {
            let id = self.nodes.len() as u32;
            self.nodes.push(TreeNode::new_internal());
            id
        }
    }

    fn free_node(&mut self, node_id: u32) {
        let node = &mut self.nodes[node_id as usize];
        node.height = -1;
        node.leaf = None;
        node.left = NULL_NODE;
        node.right = NULL_NODE;
        node.parent = NULL_NODE;
        self.free_list.push(node_id);
    }

    fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NULL_NODE;
            return;
        }

        // Find the best sibling using the surface-area heuristic.
        let leaf_aabb = self.nodes[leaf as usize].aabb;
        let mut sibling = self.root;

        while !self.nodes[sibling as usize].is_leaf() {
            let left = self.nodes[sibling as usize].left;
            let right = self.nodes[sibling as usize].right;

            let area = self.nodes[sibling as usize].aabb.perimeter();
            let combined_area = leaf_aabb
                .union(&self.nodes[sibling as usize].aabb)
                .perimeter();

            let cost = 2.0 * combined_area;
            let inheritance_cost = 2.0 * (combined_area - area);

            let cost_left = self.child_insertion_cost(left, &leaf_aabb, inheritance_cost);
            let cost_right = self.child_insertion_cost(right, &leaf_aabb, inheritance_cost);

            if cost < cost_left && cost < cost_right {
                break;
            }

            sibling = if cost_left < cost_right { left } else { right };
        }

        // Create a new parent joining the sibling and the leaf.
        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.alloc_node();
        self.nodes[new_parent as usize] = TreeNode::new_internal();
        self.nodes[new_parent as usize].parent = old_parent;
        self.nodes[new_parent as usize].aabb =
            leaf_aabb.union(&self.nodes[sibling as usize].aabb);
        self.nodes[new_parent as usize].height = self.nodes[sibling as usize].height + 1;

        if old_parent != NULL_NODE {
            if self.nodes[old_parent as usize].left == sibling {
                self.nodes[old_parent as usize].left = new_parent;
            } else {
                self.nodes[old_parent as usize].right = new_parent;
            }
        } else {
            self.root = new_parent;
        }

        self.nodes[new_parent as usize].left = sibling;
        self.nodes[new_parent as usize].right = leaf;
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        self.fix_upwards(new_parent);
    }

    fn child_insertion_cost(&self, child: u32, leaf_aabb: &Aabb, inheritance: f32) -> f32 {
        let combined = leaf_aabb.union(&self.nodes[child as usize].aabb);
        if self.nodes[child as usize].is_leaf() {
            combined.perimeter() + inheritance
        } else {
            let old_area = self.nodes[child as usize].aabb.perimeter();
            (combined.perimeter() - old_area) + inheritance
        }
    }

    fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grand_parent = self.nodes[parent as usize].parent;
        let sibling = if self.nodes[parent as usize].left == leaf {
            self.nodes[parent as usize].right
        } else {
            self.nodes[parent as usize].left
        };

        if grand_parent != NULL_NODE {
            // Reconnect the sibling to the grandparent.
            if self.nodes[grand_parent as usize].left == parent {
                self.nodes[grand_parent as usize].left = sibling;
            } else {
                self.nodes[grand_parent as usize].right = sibling;
            }
            self.nodes[sibling as usize].parent = grand_parent;
            self.free_node(parent);

            self.fix_upwards(grand_parent);
        } else {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL_NODE;
            self.free_node(parent);
        }
    }

    fn fix_upwards(&mut self, start: u32) {
        let mut node_id = start;
        while node_id != NULL_NODE {
            node_id = self.balance(node_id);

            let left = self.nodes[node_id as usize].left;
            let right = self.nodes[node_id as usize].right;

            if left != NULL_NODE && right != NULL_NODE {
                let lh = self.nodes[left as usize].height;
                let rh = self.nodes[right as usize].height;
                self.nodes[node_id as usize].height = 1 + lh.max(rh);
                self.nodes[node_id as usize].aabb = self.nodes[left as usize]
                    .aabb
                    .union(&self.nodes[right as usize].aabb);
            }

            node_id = self.nodes[node_id as usize].parent;
        }
    }

    /// AVL-style tree rotation for balancing.
    fn balance(&mut self, node_id: u32) -> u32 {
        if self.nodes[node_id as usize].is_leaf() || self.nodes[node_id as usize].height < 2 {
            return node_id;
        }

        let left = self.nodes[node_id as usize].left;
        let right = self.nodes[node_id as usize].right;

        let balance_factor =
            self.nodes[right as usize].height - self.nodes[left as usize].height;

        if balance_factor > 1 {
            self.rotate_left(node_id)
        } else if balance_factor < -1 {
            self.rotate_right(node_id)
        } else {
            node_id
        }
    }

    fn rotate_left(&mut self, node_id: u32) -> u32 {
        let right = self.nodes[node_id as usize].right;
        let right_left = self.nodes[right as usize].left;
        let right_right = self.nodes[right as usize].right;
        let parent = self.nodes[node_id as usize].parent;

        // The right child becomes the new subtree root.
        self.nodes[right as usize].left = node_id;
        self.nodes[right as usize].parent = parent;
        self.nodes[node_id as usize].parent = right;

        if parent != NULL_NODE {
            if self.nodes[parent as usize].left == node_id {
                self.nodes[parent as usize].left = right;
            } else {
                self.nodes[parent as usize].right = right;
            }
        } else {
            self.root = right;
        }

        let rl_h = self.height_of(right_left);
        let rr_h = self.height_of(right_right);

        if rl_h > rr_h {
            self.nodes[right as usize].right = right_left;
            self.nodes[node_id as usize].right = right_right;
            if right_right != NULL_NODE {
                self.nodes[right_right as usize].parent = node_id;
            }
            if right_left != NULL_NODE {
                self.nodes[right_left as usize].parent = right;
            }
        } else {
            self.nodes[node_id as usize].right = right_left;
            if right_left != NULL_NODE {
                self.nodes[right_left as usize].parent = node_id;
            }
        }

        self.refresh_node(node_id);
        self.refresh_node(right);
        right
    }

    fn rotate_right(&mut self, node_id: u32) -> u32 {
        let left = self.nodes[node_id as usize].left;
        let left_left = self.nodes[left as usize].left;
        let left_right = self.nodes[left as usize].right;
        let parent = self.nodes[node_id as usize].parent;

        self.nodes[left as usize].right = node_id;
        self.nodes[left as usize].parent = parent;
        self.nodes[node_id as usize].parent = left;

        if parent != NULL_NODE {
            if self.nodes[parent as usize].left == node_id {
                self.nodes[parent as usize].left = left;
            } else {
                self.nodes[parent as usize].right = left;
            }
        } else {
            self.root = left;
        }

        let ll_h = self.height_of(left_left);
        let lr_h = self.height_of(left_right);

        if lr_h > ll_h {
            self.nodes[left as usize].left = left_right;
            self.nodes[node_id as usize].left = left_left;
            if left_left != NULL_NODE {
                self.nodes[left_left as usize].parent = node_id;
            }
            if left_right != NULL_NODE {
                self.nodes[left_right as usize].parent = left;
            }
        } else {
            self.nodes[node_id as usize].left = left_right;
            if left_right != NULL_NODE {
                self.nodes[left_right as usize].parent = node_id;
            }
        }

        self.refresh_node(node_id);
        self.refresh_node(left);
        left
    }

    fn height_of(&self, node_id: u32) -> i32 {
        if node_id == NULL_NODE {
            -1
        } else {
            self.nodes[node_id as usize].height
        }
    }

    /// Recompute a node's AABB and height from its children.
    fn refresh_node(&mut self, node_id: u32) {
        let left = self.nodes[node_id as usize].left;
        let right = self.nodes[node_id as usize].right;
        if left != NULL_NODE && right != NULL_NODE {
            self.nodes[node_id as usize].aabb = self.nodes[left as usize]
                .aabb
                .union(&self.nodes[right as usize].aabb);
            self.nodes[node_id as usize].height =
                1 + self.nodes[left as usize].height.max(self.nodes[right as usize].height);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
