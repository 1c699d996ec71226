//! Fixed-width component bit set.
//!
//! A [`ComponentMask`] holds one bit per [`ComponentTypeId`]. Its width is
//! what bounds the registry to [`MAX_COMPONENT_TYPES`](crate::MAX_COMPONENT_TYPES)
//! types, and it is also the per-slot field written by the codec.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::component::ComponentTypeId;

/// A set of component type ids, stored as a `u64`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentMask(u64);

impl ComponentMask {
    /// The empty set.
    pub const EMPTY: ComponentMask = ComponentMask(0);

    /// Number of bits in the mask.
    pub const BITS: usize = u64::BITS as usize;

    /// An empty mask.
    #[inline]
    pub const fn empty() -> Self {
        Self::EMPTY
    }

    /// Reconstruct from raw bits.
    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bit representation.
    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// A copy of `self` with `id` added.
    #[inline]
    #[must_use]
    pub const fn with(self, id: ComponentTypeId) -> Self {
        Self(self.0 | id.bit())
    }

    /// Add `id` to the set.
    #[inline]
    pub fn insert(&mut self, id: ComponentTypeId) {
        self.0 |= id.bit();
    }

    /// Remove `id` from the set.
    #[inline]
    pub fn remove(&mut self, id: ComponentTypeId) {
        self.0 &= !id.bit();
    }

    /// Whether `id` is in the set.
    #[inline]
    pub const fn contains(self, id: ComponentTypeId) -> bool {
        self.0 & id.bit() != 0
    }

    /// Whether every id in `other` is also in `self`.
    #[inline]
    pub const fn contains_all(self, other: ComponentMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Ids in `self` that are not in `other`.
    #[inline]
    #[must_use]
    pub const fn difference(self, other: ComponentMask) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether the set is empty.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of ids in the set.
    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the contained ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = ComponentTypeId> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let index = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(ComponentTypeId(index))
        })
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.index())).finish()
    }
}

impl fmt::Display for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl From<ComponentTypeId> for ComponentMask {
    fn from(id: ComponentTypeId) -> Self {
        Self(id.bit())
    }
}

impl FromIterator<ComponentTypeId> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, ComponentMask::with)
    }
}

impl BitOr for ComponentMask {
    type Output = ComponentMask;

    fn bitor(self, rhs: ComponentMask) -> ComponentMask {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<ComponentTypeId> for ComponentMask {
    type Output = ComponentMask;

    fn bitor(self, rhs: ComponentTypeId) -> ComponentMask {
        self.with(rhs)
    }
}

impl BitOrAssign<ComponentTypeId> for ComponentMask {
    fn bitor_assign(&mut self, rhs: ComponentTypeId) {
        self.insert(rhs);
    }
}

impl BitAnd for ComponentMask {
    type Output = ComponentMask;

    fn bitand(self, rhs: ComponentMask) -> ComponentMask {
        Self(self.0 & rhs.0)
    }
}
