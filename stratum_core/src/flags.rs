// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Side-effect flags recorded on fibers during render and consumed by commit.

use core::fmt;
use core::ops::{BitOr, BitOrAssign};

/// A bitset of pending side effects on a fiber.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u32);

impl Flags {
    /// No effects.
    pub const NONE: Self = Self(0);
    /// Insert or move the fiber's host nodes.
    pub const PLACEMENT: Self = Self(1 << 1);
    /// Sync props or text content into an existing host node.
    pub const UPDATE: Self = Self(1 << 2);
    /// The fiber's deletion list is non-empty.
    pub const CHILD_DELETION: Self = Self(1 << 4);
    /// A passive effect needs to run after commit.
    pub const PASSIVE: Self = Self(1 << 11);
    /// Attach or detach a ref.
    pub const REF: Self = Self(1 << 9);
    /// An offscreen subtree toggled between hidden and visible.
    pub const VISIBILITY: Self = Self(1 << 13);
    /// A suspense boundary caught a suspension and renders its fallback.
    pub const DID_CAPTURE: Self = Self(1 << 7);
    /// A suspense boundary was chosen to catch a suspension during unwind.
    pub const SHOULD_CAPTURE: Self = Self(1 << 16);

    /// Effects applied by the mutation walk of commit.
    pub const MUTATION_MASK: Self = Self(
        Self::PLACEMENT.0 | Self::UPDATE.0 | Self::CHILD_DELETION.0 | Self::REF.0 | Self::VISIBILITY.0,
    );
    /// Effects that require the post-commit passive flush.
    pub const PASSIVE_MASK: Self = Self(Self::PASSIVE.0 | Self::CHILD_DELETION.0);
    /// Effects applied after the tree flip.
    pub const LAYOUT_MASK: Self = Self::REF;

    /// Returns `true` if no flag is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if every flag of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any flag of `other` is set.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Sets every flag of `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears every flag of `other`.
    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for Flags {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Flags {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Flags, &str); 8] = [
            (Flags::PLACEMENT, "PLACEMENT"),
            (Flags::UPDATE, "UPDATE"),
            (Flags::CHILD_DELETION, "CHILD_DELETION"),
            (Flags::PASSIVE, "PASSIVE"),
            (Flags::REF, "REF"),
            (Flags::VISIBILITY, "VISIBILITY"),
            (Flags::DID_CAPTURE, "DID_CAPTURE"),
            (Flags::SHOULD_CAPTURE, "SHOULD_CAPTURE"),
        ];
        let mut set = f.debug_set();
        for (flag, name) in NAMES {
            if self.contains(flag) {
                set.entry(&format_args!("{name}"));
            }
        }
        set.finish()
    }
}

/// Tags on a hook effect describing when it runs.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EffectTag(u8);

impl EffectTag {
    /// The effect's dependencies changed and it must run this commit.
    pub const HAS_EFFECT: Self = Self(0b01);
    /// The effect runs in the deferred passive flush.
    pub const PASSIVE: Self = Self(0b10);

    /// Returns `true` if every tag of `other` is set.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for EffectTag {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for EffectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EffectTag({:#04b})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn masks_cover_expected_flags() {
        assert!(Flags::MUTATION_MASK.contains(Flags::PLACEMENT | Flags::VISIBILITY));
        assert!(!Flags::MUTATION_MASK.intersects(Flags::PASSIVE));
        assert!(Flags::PASSIVE_MASK.contains(Flags::CHILD_DELETION));
        assert!(!Flags::MUTATION_MASK.intersects(Flags::DID_CAPTURE | Flags::SHOULD_CAPTURE));
    }

    #[test]
    fn insert_and_remove() {
        let mut flags = Flags::NONE;
        flags.insert(Flags::UPDATE | Flags::REF);
        assert!(flags.contains(Flags::UPDATE));
        flags.remove(Flags::UPDATE);
        assert!(!flags.contains(Flags::UPDATE));
        assert!(flags.contains(Flags::REF));
    }

    #[test]
    fn debug_prints_set_names() {
        let flags = Flags::PLACEMENT | Flags::UPDATE;
        assert_eq!(format!("{flags:?}"), "{PLACEMENT, UPDATE}");
    }
}
