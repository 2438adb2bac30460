//! Collision Filtering (Category/Mask System)
//!
//! Bitmask-based collision filtering for controlling which fixtures can
//! interact, plus signed group overrides.
//!
//! # Usage
//!
//! ```
//! use impulse2d::filter::Filter;
//!
//! // Category 0 = terrain, category 1 = debris that ignores other debris.
//! let terrain = Filter::new(1 << 0, u16::MAX);
//! let debris  = Filter::new(1 << 1, !(1 << 1));
//! assert!(Filter::can_collide(&terrain, &debris));
//! assert!(!Filter::can_collide(&debris, &debris));
//! ```

/// Collision filter carried by every fixture.
///
/// Two fixtures may collide iff their group says so, or, when the groups
/// don't decide, `(a.category & b.mask) != 0 && (b.category & a.mask) != 0`.
/// A shared positive group always collides; a shared negative group never
/// does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Filter {
    /// Which category bit(s) this fixture belongs to.
    pub category: u16,
    /// Which categories this fixture may collide with.
    pub mask: u16,
    /// Signed collision group override (0 = none).
    pub group: i16,
}

impl Filter {
    /// Default filter: category 1, collides with everything, no group.
    pub const DEFAULT: Self = Self {
        category: 1,
        mask: u16::MAX,
        group: 0,
    };

    /// Filter that collides with nothing.
    pub const NONE: Self = Self {
        category: 0,
        mask: 0,
        group: 0,
    };

    /// Create a filter from category and mask bits.
    #[inline]
    #[must_use]
    pub const fn new(category: u16, mask: u16) -> Self {
        Self {
            category,
            mask,
            group: 0,
        }
    }

    /// Attach a signed collision group.
    #[inline]
    #[must_use]
    pub const fn with_group(mut self, group: i16) -> Self {
        self.group = group;
        self
    }

    /// Check whether two filters allow collision.
    #[inline]
    #[must_use]
    pub fn can_collide(a: &Self, b: &Self) -> bool {
        if a.group == b.group && a.group != 0 {
            return a.group > 0;
        }
        (a.category & b.mask) != 0 && (b.category & a.mask) != 0
    }
}

impl Default for Filter {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_collides_with_itself() {
        let f = Filter::default();
        assert!(Filter::can_collide(&f, &f));
    }

    #[test]
    fn test_mask_is_bidirectional() {
        // a can see b, but b cannot see a => no collision.
        let a = Filter::new(1 << 0, 1 << 1);
        let b = Filter::new(1 << 1, 0);
        assert!(!Filter::can_collide(&a, &b));
        assert!(!Filter::can_collide(&b, &a));
    }

    #[test]
    fn test_positive_group_overrides_mask() {
        let a = Filter::new(1 << 0, 0).with_group(3);
        let b = Filter::new(1 << 1, 0).with_group(3);
        assert!(Filter::can_collide(&a, &b), "Shared positive group always collides");
    }

    #[test]
    fn test_negative_group_overrides_mask() {
        let a = Filter::default().with_group(-2);
        let b = Filter::default().with_group(-2);
        assert!(!Filter::can_collide(&a, &b), "Shared negative group never collides");
    }

    #[test]
    fn test_different_groups_fall_back_to_masks() {
        let a = Filter::default().with_group(-1);
        let b = Filter::default().with_group(-2);
        assert!(Filter::can_collide(&a, &b));
    }

    #[test]
    fn test_none_filter() {
        let none = Filter::NONE;
        assert!(!Filter::can_collide(&none, &Filter::default()));
    }
}
