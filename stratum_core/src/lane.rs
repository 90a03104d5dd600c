// Copyright 2026 the Stratum Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Priority lanes.
//!
//! A [`Lanes`] value is a small bitset. Each bit is one discrete update
//! priority; a lower bit position means a higher priority. All operations are
//! plain integer bit twiddling and cannot fail.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};

use crate::scheduler::PriorityLevel;

/// A set of update priorities.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lanes(u32);

impl Lanes {
    /// The empty set.
    pub const NONE: Self = Self(0);
    /// Discrete user input and explicit synchronous updates.
    pub const SYNC: Self = Self(0b0_0001);
    /// Continuous input such as drags and scrolls.
    pub const INPUT_CONTINUOUS: Self = Self(0b0_0010);
    /// Ordinary updates.
    pub const DEFAULT: Self = Self(0b0_0100);
    /// Updates issued inside a transition.
    pub const TRANSITION: Self = Self(0b0_1000);
    /// Work that runs only when nothing else is pending.
    pub const IDLE: Self = Self(0b1_0000);

    /// Creates a lane set from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if no lane is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Union of two lane sets.
    #[inline]
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Isolates the highest-priority (lowest set) bit.
    #[inline]
    #[must_use]
    pub const fn highest_priority(self) -> Self {
        Self(self.0 & self.0.wrapping_neg())
    }

    /// Returns `true` if every lane of `subset` is also in `self`.
    ///
    /// The empty set is a subset of everything, so updates tagged
    /// [`Lanes::NONE`] are covered by any render.
    #[inline]
    #[must_use]
    pub const fn is_subset(self, subset: Self) -> bool {
        self.0 & subset.0 == subset.0
    }

    /// Removes every lane of `subset` from `self`.
    #[inline]
    #[must_use]
    pub const fn remove(self, subset: Self) -> Self {
        Self(self.0 & !subset.0)
    }

    /// Returns `true` if `self` and `other` share at least one lane.
    #[inline]
    #[must_use]
    pub const fn includes_any(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Maps the highest-priority lane of this set to a scheduler priority.
    ///
    /// Lanes without a dedicated level fall back to [`PriorityLevel::Idle`].
    #[must_use]
    pub const fn to_priority(self) -> PriorityLevel {
        match self.highest_priority() {
            Self::SYNC => PriorityLevel::Immediate,
            Self::INPUT_CONTINUOUS => PriorityLevel::UserBlocking,
            Self::DEFAULT => PriorityLevel::Normal,
            _ => PriorityLevel::Idle,
        }
    }

    /// Maps a scheduler priority to the lane an update issued at that
    /// priority should use.
    #[must_use]
    pub const fn from_priority(level: PriorityLevel) -> Self {
        match level {
            PriorityLevel::Immediate => Self::SYNC,
            PriorityLevel::UserBlocking => Self::INPUT_CONTINUOUS,
            PriorityLevel::Normal => Self::DEFAULT,
            PriorityLevel::Low | PriorityLevel::Idle => Self::IDLE,
        }
    }
}

impl BitOr for Lanes {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl BitOrAssign for Lanes {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl BitAnd for Lanes {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Lanes, &str); 5] = [
            (Lanes::SYNC, "SYNC"),
            (Lanes::INPUT_CONTINUOUS, "INPUT_CONTINUOUS"),
            (Lanes::DEFAULT, "DEFAULT"),
            (Lanes::TRANSITION, "TRANSITION"),
            (Lanes::IDLE, "IDLE"),
        ];
        if self.is_empty() {
            return f.write_str("Lanes(NONE)");
        }
        f.write_str("Lanes(")?;
        let mut first = true;
        let mut rest = *self;
        for (lane, name) in NAMES {
            if self.includes_any(lane) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
                rest = rest.remove(lane);
            }
        }
        if !rest.is_empty() {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{:#b}", rest.0)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;

    #[test]
    fn highest_priority_isolates_lowest_bit() {
        let set = Lanes::DEFAULT | Lanes::SYNC | Lanes::IDLE;
        assert_eq!(set.highest_priority(), Lanes::SYNC);
        assert_eq!(
            (Lanes::TRANSITION | Lanes::DEFAULT).highest_priority(),
            Lanes::DEFAULT
        );
        assert_eq!(Lanes::NONE.highest_priority(), Lanes::NONE);
    }

    #[test]
    fn subset_and_remove() {
        let set = Lanes::SYNC | Lanes::DEFAULT;
        assert!(set.is_subset(Lanes::SYNC));
        assert!(set.is_subset(Lanes::NONE));
        assert!(!set.is_subset(Lanes::SYNC | Lanes::TRANSITION));
        assert_eq!(set.remove(Lanes::SYNC), Lanes::DEFAULT);
        assert_eq!(set.remove(Lanes::IDLE), set);
    }

    #[test]
    fn includes_any_requires_overlap() {
        let set = Lanes::SYNC | Lanes::DEFAULT;
        assert!(set.includes_any(Lanes::DEFAULT | Lanes::IDLE));
        assert!(!set.includes_any(Lanes::TRANSITION));
        assert!(!set.includes_any(Lanes::NONE));
    }

    #[test]
    fn priority_mapping_round_trips_for_mapped_lanes() {
        for lane in [Lanes::SYNC, Lanes::INPUT_CONTINUOUS, Lanes::DEFAULT] {
            assert_eq!(Lanes::from_priority(lane.to_priority()), lane);
        }
    }

    #[test]
    fn unmapped_lanes_fall_back_to_idle() {
        assert_eq!(Lanes::TRANSITION.to_priority(), PriorityLevel::Idle);
        assert_eq!(Lanes::NONE.to_priority(), PriorityLevel::Idle);
        assert_eq!(Lanes::from_priority(PriorityLevel::Low), Lanes::IDLE);
    }

    #[test]
    fn debug_lists_lane_names() {
        assert_eq!(format!("{:?}", Lanes::NONE), "Lanes(NONE)");
        assert_eq!(
            format!("{:?}", Lanes::SYNC | Lanes::DEFAULT),
            "Lanes(SYNC|DEFAULT)"
        );
    }
}
