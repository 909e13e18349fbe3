/*
This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
If a copy of the MPL was not distributed with this file,
You can obtain one at https://mozilla.org/MPL/2.0/.
*/
//! Identifiers for key types.
//!
//! These are, broadly speaking, simple newtype wrappers whose main purpose is to
//! future-proof the library and keep the underlying representation out of the public API.
//!
//! Barring exceptional circumstances, all identifiers are `Copy` and cheap to hash.

use bevy::reflect::Reflect;

#[cfg(any(feature = "serialize"))]
use serde::{Serialize, Deserialize};


/// Identifies a bindable struct (a node or the Context) within a `ScriptGraph`.
///
/// Property paths use this to say *which* struct they are rooted at.
///
/// IDs are derived deterministically from the owning graph's seed and the node's
/// arena slot, so a duplicated graph ends up with exactly the same IDs as its template
/// and every path authored against the template stays valid for the copy.
///
/// The all-zero value is reserved as the 'invalid' marker and is never produced
/// by `BindingId::from_slot()`; neither is `BindingId::CONTEXT`.
#[derive(Reflect, Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
#[cfg_attr(any(feature = "serialize"), serde(transparent))]
pub struct BindingId(u64);

impl BindingId {
    /// Reserved; never identifies anything.
    pub const INVALID: Self = Self(0);

    /// Reserved; identifies the Context bag of the graph resolving the path.
    pub const CONTEXT: Self = Self(1);

    /// Builds the ID for the node in arena slot `slot` of a graph seeded with `graph_seed`.
    pub fn from_slot(graph_seed: u64, slot: u32) -> Self {
        // splitmix64 finalizer over the seed and slot
        let mut z = graph_seed ^ (u64::from(slot) + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;

        match z {
            0 | 1 => Self(z + 2),
            _ => Self(z),
        }
    }

    /// Rebuilds an ID from a raw value, e.g. one read back from a save.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u64 {
        self.0
    }

    pub const fn is_valid(&self) -> bool {
        self.0 != Self::INVALID.0
    }

    pub const fn is_context(&self) -> bool {
        self.0 == Self::CONTEXT.0
    }
}

impl Default for BindingId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl core::fmt::Display for BindingId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Self::INVALID => write!(f, "Invalid"),
            Self::CONTEXT => write!(f, "Context"),
            Self(raw) => write!(f, "{:016x}", raw),
        }
    }
}


/// Derives a graph seed from its name (FNV-1a).
///
/// Two graphs with the same name share the same ID space, which is exactly
/// what we want for a template and its runtime duplicates.
pub fn graph_seed_from_name(name: &str) -> u64 {
    let mut hash: u64 = 0xCBF2_9CE4_8422_2325;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}


/// A stable index of a node inside one `ScriptGraph` arena.
///
/// NodeIds are only meaningful for the graph that produced them
/// (and for graphs duplicated from it, which keep the same layout).
#[derive(Reflect, Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(any(feature = "serialize"), derive(Serialize, Deserialize))]
#[cfg_attr(any(feature = "serialize"), serde(transparent))]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

impl core::fmt::Display for NodeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}


/// Identity of a listener on a broadcast channel.
///
/// Used to remove everything a given subscriber added in one go.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl From<u64> for SubscriberId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
